use std::{collections::BTreeSet, sync::Arc};

use uuid::Uuid;

use crate::{
    db::{DbError, DbPool},
    models::{
        AccessRule, AccessRuleQuery, AccessRuleSpec, CreateAccessRule, RuleDefinitionError,
        RuleSubject, UpdateAccessRule,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum AccessRuleError {
    #[error("Access rule not found")]
    NotFound,

    #[error("{} '{}' not found", .0.kind(), .0.id())]
    SubjectNotFound(RuleSubject),

    #[error("Connection '{0}' not found")]
    ConnectionNotFound(Uuid),

    #[error("Invalid access rule: {0}")]
    InvalidDefinition(#[from] RuleDefinitionError),

    #[error("Database error: {0}")]
    Database(DbError),
}

impl From<DbError> for AccessRuleError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => AccessRuleError::NotFound,
            other => AccessRuleError::Database(other),
        }
    }
}

/// Service layer for resource access rules.
///
/// Every write checks the rule body, the subject and any connection scope
/// before it reaches the store.
#[derive(Clone)]
pub struct AccessRuleService {
    db: Arc<DbPool>,
}

impl AccessRuleService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn list(&self, query: &AccessRuleQuery) -> Result<Vec<AccessRule>, AccessRuleError> {
        Ok(self.db.access_rules().list(query).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<AccessRule, AccessRuleError> {
        self.db
            .access_rules()
            .get_by_id(id)
            .await?
            .ok_or(AccessRuleError::NotFound)
    }

    pub async fn create(
        &self,
        input: CreateAccessRule,
        created_by: Uuid,
    ) -> Result<AccessRule, AccessRuleError> {
        let subject = RuleSubject::try_from(input.subject)?;
        input.rule.check()?;
        self.ensure_subject(subject).await?;
        self.ensure_connections(std::slice::from_ref(&input.rule))
            .await?;

        let rule = self
            .db
            .access_rules()
            .create(subject, &input.rule, Some(created_by))
            .await?;
        tracing::info!(
            rule_id = %rule.id,
            subject = subject.kind(),
            subject_id = %subject.id(),
            "Access rule created"
        );
        Ok(rule)
    }

    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateAccessRule,
    ) -> Result<AccessRule, AccessRuleError> {
        input.check()?;
        let existing = self.get(id).await?;
        let spec = input.apply_to(&existing);
        spec.check()?;
        self.ensure_connections(std::slice::from_ref(&spec)).await?;

        Ok(self.db.access_rules().update(id, &spec).await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<AccessRule, AccessRuleError> {
        let existing = self.get(id).await?;
        self.db.access_rules().delete(id).await?;
        Ok(existing)
    }

    /// Atomically replace every rule of a role or user.
    ///
    /// All specs are checked before anything is written; one bad spec leaves
    /// the existing rules untouched.
    pub async fn replace_for_subject(
        &self,
        subject: RuleSubject,
        specs: Vec<AccessRuleSpec>,
        created_by: Uuid,
    ) -> Result<Vec<AccessRule>, AccessRuleError> {
        for spec in &specs {
            spec.check()?;
        }
        self.ensure_subject(subject).await?;
        self.ensure_connections(&specs).await?;

        let rules = self
            .db
            .access_rules()
            .replace_for_subject(subject, &specs, Some(created_by))
            .await?;
        tracing::info!(
            subject = subject.kind(),
            subject_id = %subject.id(),
            count = rules.len(),
            "Access rules replaced"
        );
        Ok(rules)
    }

    async fn ensure_subject(&self, subject: RuleSubject) -> Result<(), AccessRuleError> {
        let exists = match subject {
            RuleSubject::Role(id) => self.db.roles().get_by_id(id).await?.is_some(),
            RuleSubject::User(id) => self.db.users().get_by_id(id).await?.is_some(),
        };
        if exists {
            Ok(())
        } else {
            Err(AccessRuleError::SubjectNotFound(subject))
        }
    }

    async fn ensure_connections(&self, specs: &[AccessRuleSpec]) -> Result<(), AccessRuleError> {
        let ids: BTreeSet<Uuid> = specs.iter().filter_map(|s| s.connection_id).collect();
        for id in ids {
            if self.db.connections().get_by_id(id).await?.is_none() {
                return Err(AccessRuleError::ConnectionNotFound(id));
            }
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "database-sqlite"))]
mod tests {
    use super::*;
    use crate::{
        db::tests::harness::create_seeded_db,
        models::{AccessType, SubjectRef},
    };

    async fn setup() -> (Arc<DbPool>, AccessRuleService, Uuid) {
        let db = create_seeded_db().await;
        let analyst = db.roles().get_by_name("analyst").await.unwrap().unwrap().id;
        (db.clone(), AccessRuleService::new(db), analyst)
    }

    fn spec(database: &str, table: &str) -> AccessRuleSpec {
        AccessRuleSpec {
            database_pattern: database.into(),
            table_pattern: table.into(),
            access_type: AccessType::Read,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_rejects_bad_subjects() {
        let (_db, service, analyst) = setup().await;
        let actor = Uuid::new_v4();

        let both = CreateAccessRule {
            subject: SubjectRef {
                role_id: Some(analyst),
                user_id: Some(Uuid::new_v4()),
            },
            rule: spec("sales", "*"),
        };
        assert!(matches!(
            service.create(both, actor).await,
            Err(AccessRuleError::InvalidDefinition(
                RuleDefinitionError::AmbiguousSubject
            ))
        ));

        let neither = CreateAccessRule {
            subject: SubjectRef::default(),
            rule: spec("sales", "*"),
        };
        assert!(matches!(
            service.create(neither, actor).await,
            Err(AccessRuleError::InvalidDefinition(
                RuleDefinitionError::MissingSubject
            ))
        ));

        let ghost = CreateAccessRule {
            subject: SubjectRef {
                role_id: Some(Uuid::new_v4()),
                user_id: None,
            },
            rule: spec("sales", "*"),
        };
        assert!(matches!(
            service.create(ghost, actor).await,
            Err(AccessRuleError::SubjectNotFound(RuleSubject::Role(_)))
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_connection() {
        let (_db, service, analyst) = setup().await;
        let connection_id = Uuid::new_v4();

        let input = CreateAccessRule {
            subject: SubjectRef {
                role_id: Some(analyst),
                user_id: None,
            },
            rule: AccessRuleSpec {
                connection_id: Some(connection_id),
                ..spec("sales", "*")
            },
        };
        let err = service.create(input, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AccessRuleError::ConnectionNotFound(id) if id == connection_id));
    }

    #[tokio::test]
    async fn test_update_keeps_subject_and_checks_body() {
        let (_db, service, analyst) = setup().await;
        let rule = service
            .create(
                CreateAccessRule {
                    subject: SubjectRef {
                        role_id: Some(analyst),
                        user_id: None,
                    },
                    rule: spec("sales", "*"),
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap();

        let updated = service
            .update(
                rule.id,
                UpdateAccessRule {
                    table_pattern: Some("orders".into()),
                    priority: Some(50),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.subject, RuleSubject::Role(analyst));
        assert_eq!(updated.database_pattern, "sales");
        assert_eq!(updated.table_pattern, "orders");
        assert_eq!(updated.priority, 50);

        let err = service
            .update(
                rule.id,
                UpdateAccessRule {
                    priority: Some(5000),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AccessRuleError::InvalidDefinition(RuleDefinitionError::PriorityOutOfRange(5000))
        ));
    }

    #[tokio::test]
    async fn test_replace_checks_every_spec_first() {
        let (db, service, analyst) = setup().await;
        let subject = RuleSubject::Role(analyst);
        service
            .replace_for_subject(subject, vec![spec("sales", "*")], Uuid::new_v4())
            .await
            .unwrap();

        let err = service
            .replace_for_subject(
                subject,
                vec![spec("finance", "*"), spec("bad name", "*")],
                Uuid::new_v4(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessRuleError::InvalidDefinition(_)));

        let rules = db
            .access_rules()
            .list(&AccessRuleQuery {
                role_id: Some(analyst),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].database_pattern, "sales");
    }

    #[tokio::test]
    async fn test_delete_missing_rule() {
        let (_db, service, _) = setup().await;
        assert!(matches!(
            service.delete(Uuid::new_v4()).await,
            Err(AccessRuleError::NotFound)
        ));
    }
}
