use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{AccessRule, AccessRuleQuery, AccessRuleSpec, RuleSubject},
};

#[async_trait]
pub trait AccessRuleRepo: Send + Sync {
    async fn create(
        &self,
        subject: RuleSubject,
        spec: &AccessRuleSpec,
        created_by: Option<Uuid>,
    ) -> DbResult<AccessRule>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<AccessRule>>;
    async fn list(&self, query: &AccessRuleQuery) -> DbResult<Vec<AccessRule>>;
    /// Overwrite the body of an existing rule.
    async fn update(&self, id: Uuid, spec: &AccessRuleSpec) -> DbResult<AccessRule>;
    async fn delete(&self, id: Uuid) -> DbResult<()>;

    /// Every rule that can apply to a principal on a connection: rules on any of
    /// `role_ids` union rules on `user_id`, scoped to no connection or to
    /// `connection_id`. A `None` connection only matches unscoped rules.
    async fn list_applicable(
        &self,
        role_ids: &[Uuid],
        user_id: Uuid,
        connection_id: Option<Uuid>,
    ) -> DbResult<Vec<AccessRule>>;

    /// Atomically replace all rules for a subject with `specs`.
    async fn replace_for_subject(
        &self,
        subject: RuleSubject,
        specs: &[AccessRuleSpec],
        created_by: Option<Uuid>,
    ) -> DbResult<Vec<AccessRule>>;
}
