//! Resource access evaluation.
//!
//! For a principal, a `(connection?, database, table?)` resource and a
//! requested access level:
//!
//! 1. A principal holding a bypass role is allowed without loading rules.
//! 2. Role rules ∪ user rules are loaded once, restricted to connection-agnostic
//!    rules plus rules scoped to the resource's connection.
//! 3. Rules whose patterns match the resource and whose access level is
//!    compatible with the request are candidates.
//! 4. Candidates are ordered by priority desc, specificity desc, deny before
//!    allow, then rule id. The first one decides.
//! 5. No candidate means deny.
//!
//! Access compatibility: an allow rule applies when its level is at least the
//! requested level (admin ⊇ write ⊇ read). A deny rule applies when the
//! requested level is at least the rule's level, so denying `read` also denies
//! `write`, but denying `admin` leaves `read` alone.

use std::{cmp::Ordering, sync::Arc};

use serde::Serialize;
use uuid::Uuid;

use super::{
    AuthzError,
    pattern::{glob_matches, is_match_all, specificity},
};
use crate::{
    auth::Principal,
    db::repos::AccessRuleRepo,
    models::{AccessRule, AccessType, ResourceRef},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allowed,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// The principal holds a bypass role
    Bypass,
    /// A rule decided
    MatchedRule,
    /// Nothing matched, fail closed
    NoMatchingRule,
}

/// Outcome of one evaluation. Only `decision` is shown to end users; the rest
/// is for audit entries and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub decision: Decision,
    pub rule_id: Option<Uuid>,
    pub reason: DecisionReason,
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allowed
    }

    fn bypass() -> Self {
        Self {
            decision: Decision::Allowed,
            rule_id: None,
            reason: DecisionReason::Bypass,
        }
    }

    fn no_match() -> Self {
        Self {
            decision: Decision::Denied,
            rule_id: None,
            reason: DecisionReason::NoMatchingRule,
        }
    }
}

#[derive(Clone)]
pub struct ResourceAccessEvaluator {
    rules: Arc<dyn AccessRuleRepo>,
    bypass_roles: Arc<[String]>,
}

impl ResourceAccessEvaluator {
    pub fn new(rules: Arc<dyn AccessRuleRepo>, bypass_roles: Vec<String>) -> Self {
        Self {
            rules,
            bypass_roles: bypass_roles.into(),
        }
    }

    /// Whether the principal holds a bypass role.
    ///
    /// Reads the role list signed into the access token, not the store. A
    /// user moved out of a bypass role keeps the bypass until that token
    /// expires, so `access_token_ttl_secs` bounds how long it lingers.
    pub fn is_bypass(&self, principal: &Principal) -> bool {
        principal
            .roles
            .iter()
            .any(|role| self.bypass_roles.iter().any(|b| *b == role.name))
    }

    pub async fn evaluate(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
        requested: AccessType,
    ) -> Result<AccessDecision, AuthzError> {
        if self.is_bypass(principal) {
            tracing::debug!(
                user_id = %principal.user_id,
                resource = %resource.display_name(),
                access = %requested,
                "Bypass role, skipping rule evaluation"
            );
            return Ok(AccessDecision::bypass());
        }

        let rules = self.load(principal, resource.connection_id).await?;
        let decision = decide(&rules, resource, requested);

        tracing::debug!(
            user_id = %principal.user_id,
            resource = %resource.display_name(),
            connection_id = ?resource.connection_id,
            access = %requested,
            decision = ?decision.decision,
            rule_id = ?decision.rule_id,
            candidates = rules.len(),
            "Evaluated resource access"
        );

        Ok(decision)
    }

    /// Databases from `candidates` the principal may read, in input order.
    pub async fn filter_databases(
        &self,
        principal: &Principal,
        connection_id: Option<Uuid>,
        candidates: Vec<String>,
    ) -> Result<Vec<String>, AuthzError> {
        if self.is_bypass(principal) {
            return Ok(candidates);
        }

        let rules = self.load(principal, connection_id).await?;
        let total = candidates.len();
        let allowed: Vec<String> = candidates
            .into_iter()
            .filter(|database| {
                let resource = ResourceRef {
                    connection_id,
                    database: database.clone(),
                    table: None,
                };
                decide(&rules, &resource, AccessType::Read).is_allowed()
            })
            .collect();

        tracing::debug!(
            user_id = %principal.user_id,
            total,
            allowed = allowed.len(),
            "Filtered database listing"
        );
        Ok(allowed)
    }

    /// Tables of `database` from `candidates` the principal may read, in input order.
    pub async fn filter_tables(
        &self,
        principal: &Principal,
        connection_id: Option<Uuid>,
        database: &str,
        candidates: Vec<String>,
    ) -> Result<Vec<String>, AuthzError> {
        if self.is_bypass(principal) {
            return Ok(candidates);
        }

        let rules = self.load(principal, connection_id).await?;
        let total = candidates.len();
        let allowed: Vec<String> = candidates
            .into_iter()
            .filter(|table| {
                let resource = ResourceRef {
                    connection_id,
                    database: database.to_string(),
                    table: Some(table.clone()),
                };
                decide(&rules, &resource, AccessType::Read).is_allowed()
            })
            .collect();

        tracing::debug!(
            user_id = %principal.user_id,
            database,
            total,
            allowed = allowed.len(),
            "Filtered table listing"
        );
        Ok(allowed)
    }

    async fn load(
        &self,
        principal: &Principal,
        connection_id: Option<Uuid>,
    ) -> Result<Vec<AccessRule>, AuthzError> {
        self.rules
            .list_applicable(&principal.role_ids(), principal.user_id, connection_id)
            .await
            .map_err(AuthzError::store_unavailable)
    }
}

/// Decide access from an already-loaded rule set. Pure and deterministic.
pub fn decide(rules: &[AccessRule], resource: &ResourceRef, requested: AccessType) -> AccessDecision {
    rules
        .iter()
        .filter(|rule| applies(rule, resource, requested))
        .min_by(|a, b| precedence(a, b))
        .map(|rule| AccessDecision {
            decision: if rule.is_allowed {
                Decision::Allowed
            } else {
                Decision::Denied
            },
            rule_id: Some(rule.id),
            reason: DecisionReason::MatchedRule,
        })
        .unwrap_or_else(AccessDecision::no_match)
}

fn applies(rule: &AccessRule, resource: &ResourceRef, requested: AccessType) -> bool {
    // Unspecified resource connection only sees connection-agnostic rules
    let connection_ok = match rule.connection_id {
        None => true,
        Some(scope) => resource.connection_id == Some(scope),
    };
    if !connection_ok || !glob_matches(&rule.database_pattern, &resource.database) {
        return false;
    }

    // Table-scoped rules never grant or deny whole-database access
    let table_ok = match &resource.table {
        Some(table) => glob_matches(&rule.table_pattern, table),
        None => is_match_all(&rule.table_pattern),
    };
    if !table_ok {
        return false;
    }

    if rule.is_allowed {
        rule.access_type >= requested
    } else {
        requested >= rule.access_type
    }
}

fn rule_specificity(rule: &AccessRule) -> u8 {
    specificity(&rule.database_pattern)
        + specificity(&rule.table_pattern)
        + u8::from(rule.connection_id.is_some())
}

/// `Less` means `a` takes precedence over `b`.
fn precedence(a: &AccessRule, b: &AccessRule) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| rule_specificity(b).cmp(&rule_specificity(a)))
        .then_with(|| a.is_allowed.cmp(&b.is_allowed))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering as AtomicOrdering;

    use super::*;
    use crate::{
        auth::test_support::principal,
        authz::test_support::{MockRuleRepo, rule},
        models::RuleSubject,
    };

    struct Fixture {
        analyst: Uuid,
        repo: Arc<MockRuleRepo>,
        evaluator: ResourceAccessEvaluator,
    }

    fn fixture(analyst: Uuid, rules: Vec<AccessRule>) -> Fixture {
        let repo = Arc::new(MockRuleRepo::new(rules));
        Fixture {
            analyst,
            evaluator: ResourceAccessEvaluator::new(repo.clone(), vec!["admin".to_string()]),
            repo,
        }
    }

    fn analyst_principal(analyst: Uuid) -> Principal {
        principal(&[(analyst, "analyst")], &[])
    }

    #[tokio::test]
    async fn test_no_rules_is_denied() {
        let f = fixture(Uuid::new_v4(), vec![]);
        let decision = f
            .evaluator
            .evaluate(
                &analyst_principal(f.analyst),
                &ResourceRef::table("sales", "orders"),
                AccessType::Read,
            )
            .await
            .unwrap();

        assert_eq!(decision.decision, Decision::Denied);
        assert_eq!(decision.reason, DecisionReason::NoMatchingRule);
        assert!(decision.rule_id.is_none());
    }

    #[tokio::test]
    async fn test_analyst_scenario() {
        let analyst = Uuid::new_v4();
        let mut user = analyst_principal(analyst);
        let role_rule = rule(RuleSubject::Role(analyst), "sales", "*", AccessType::Read, true, 0);
        let user_rule = rule(
            RuleSubject::User(user.user_id),
            "sales",
            "secret_salaries",
            AccessType::Read,
            false,
            100,
        );
        let f = fixture(analyst, vec![role_rule.clone(), user_rule.clone()]);

        let secret = f
            .evaluator
            .evaluate(&user, &ResourceRef::table("sales", "secret_salaries"), AccessType::Read)
            .await
            .unwrap();
        assert_eq!(secret.decision, Decision::Denied);
        assert_eq!(secret.rule_id, Some(user_rule.id));

        let orders = f
            .evaluator
            .evaluate(&user, &ResourceRef::table("sales", "orders"), AccessType::Read)
            .await
            .unwrap();
        assert_eq!(orders.decision, Decision::Allowed);
        assert_eq!(orders.rule_id, Some(role_rule.id));

        // Another analyst is unaffected by the personal rule
        user.user_id = Uuid::new_v4();
        let other = f
            .evaluator
            .evaluate(&user, &ResourceRef::table("sales", "secret_salaries"), AccessType::Read)
            .await
            .unwrap();
        assert!(other.is_allowed());
    }

    #[test]
    fn test_priority_wins() {
        let subject = RuleSubject::Role(Uuid::new_v4());
        let resource = ResourceRef::table("sales", "orders");
        let high_allow = rule(subject, "sales", "*", AccessType::Read, true, 10);
        let low_deny = rule(subject, "sales", "*", AccessType::Read, false, 5);

        let decision = decide(&[high_allow.clone(), low_deny.clone()], &resource, AccessType::Read);
        assert_eq!(decision.decision, Decision::Allowed);

        let swapped = [
            AccessRule {
                priority: 5,
                ..high_allow
            },
            AccessRule {
                priority: 10,
                ..low_deny
            },
        ];
        assert_eq!(decide(&swapped, &resource, AccessType::Read).decision, Decision::Denied);
    }

    #[test]
    fn test_specificity_breaks_priority_tie() {
        let subject = RuleSubject::Role(Uuid::new_v4());
        let broad_allow = rule(subject, "sales", "*", AccessType::Read, true, 0);
        let narrow_deny = rule(subject, "sales", "orders", AccessType::Read, false, 0);
        let rules = [broad_allow, narrow_deny.clone()];

        let decision = decide(&rules, &ResourceRef::table("sales", "orders"), AccessType::Read);
        assert_eq!(decision.decision, Decision::Denied);
        assert_eq!(decision.rule_id, Some(narrow_deny.id));

        // The narrow rule doesn't reach other tables
        let decision = decide(&rules, &ResourceRef::table("sales", "customers"), AccessType::Read);
        assert_eq!(decision.decision, Decision::Allowed);
    }

    #[test]
    fn test_narrow_allow_beats_broad_deny_at_equal_priority() {
        let subject = RuleSubject::Role(Uuid::new_v4());
        let rules = [
            rule(subject, "*", "*", AccessType::Read, false, 0),
            rule(subject, "sales", "orders", AccessType::Read, true, 0),
        ];
        let decision = decide(&rules, &ResourceRef::table("sales", "orders"), AccessType::Read);
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_deny_breaks_full_tie() {
        let subject = RuleSubject::Role(Uuid::new_v4());
        let allow = rule(subject, "sales", "orders", AccessType::Read, true, 3);
        let deny = rule(subject, "sales", "orders", AccessType::Read, false, 3);
        let resource = ResourceRef::table("sales", "orders");

        for rules in [[allow.clone(), deny.clone()], [deny.clone(), allow.clone()]] {
            let decision = decide(&rules, &resource, AccessType::Read);
            assert_eq!(decision.decision, Decision::Denied);
            assert_eq!(decision.rule_id, Some(deny.id));
        }
    }

    #[test]
    fn test_decision_is_deterministic_under_reordering() {
        let subject = RuleSubject::Role(Uuid::new_v4());
        let a = rule(subject, "sales*", "*", AccessType::Read, true, 1);
        let b = rule(subject, "*", "orders", AccessType::Read, true, 1);
        let resource = ResourceRef::table("sales", "orders");

        let forward = decide(&[a.clone(), b.clone()], &resource, AccessType::Read);
        let backward = decide(&[b, a], &resource, AccessType::Read);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_access_level_containment() {
        let subject = RuleSubject::Role(Uuid::new_v4());
        let customers = ResourceRef::table("sales", "customers");

        let admin = [rule(subject, "sales", "*", AccessType::Admin, true, 0)];
        assert!(decide(&admin, &customers, AccessType::Read).is_allowed());
        assert!(decide(&admin, &customers, AccessType::Write).is_allowed());

        let read_only = [rule(subject, "sales", "*", AccessType::Read, true, 0)];
        assert!(decide(&read_only, &customers, AccessType::Read).is_allowed());
        let write = decide(&read_only, &customers, AccessType::Write);
        assert_eq!(write.reason, DecisionReason::NoMatchingRule);
    }

    #[test]
    fn test_deny_levels() {
        let subject = RuleSubject::Role(Uuid::new_v4());
        let customers = ResourceRef::table("sales", "customers");
        let grant_admin = rule(subject, "sales", "*", AccessType::Admin, true, 0);

        // Denying read denies everything above it
        let deny_read = rule(subject, "sales", "*", AccessType::Read, false, 10);
        let rules = [grant_admin.clone(), deny_read];
        assert!(!decide(&rules, &customers, AccessType::Read).is_allowed());
        assert!(!decide(&rules, &customers, AccessType::Admin).is_allowed());

        // Denying admin leaves read and write alone
        let deny_admin = rule(subject, "sales", "*", AccessType::Admin, false, 10);
        let rules = [grant_admin, deny_admin];
        assert!(decide(&rules, &customers, AccessType::Read).is_allowed());
        assert!(decide(&rules, &customers, AccessType::Write).is_allowed());
        assert!(!decide(&rules, &customers, AccessType::Admin).is_allowed());
    }

    #[test]
    fn test_database_level_requests() {
        let subject = RuleSubject::Role(Uuid::new_v4());
        let whole_db = ResourceRef::database("sales");

        let table_scoped = [rule(subject, "sales", "orders", AccessType::Read, true, 0)];
        assert!(!decide(&table_scoped, &whole_db, AccessType::Read).is_allowed());

        let db_scoped = [rule(subject, "sales", "*", AccessType::Read, true, 0)];
        assert!(decide(&db_scoped, &whole_db, AccessType::Read).is_allowed());
        assert!(
            decide(&db_scoped, &ResourceRef::table("sales", "anything"), AccessType::Read)
                .is_allowed()
        );
    }

    #[test]
    fn test_patterns_are_case_sensitive_and_whole_string() {
        let subject = RuleSubject::Role(Uuid::new_v4());
        let rules = [rule(subject, "sales", "*", AccessType::Read, true, 0)];

        assert!(!decide(&rules, &ResourceRef::database("Sales"), AccessType::Read).is_allowed());
        assert!(!decide(&rules, &ResourceRef::database("sales_eu"), AccessType::Read).is_allowed());
    }

    #[tokio::test]
    async fn test_connection_scoping() {
        let analyst = Uuid::new_v4();
        let conn_1 = Uuid::new_v4();
        let conn_2 = Uuid::new_v4();
        let scoped = AccessRule {
            connection_id: Some(conn_1),
            ..rule(RuleSubject::Role(analyst), "sales", "*", AccessType::Read, true, 0)
        };
        let f = fixture(analyst, vec![scoped.clone()]);
        let user = analyst_principal(analyst);
        let sales = ResourceRef::database("sales");

        let on_1 = f
            .evaluator
            .evaluate(&user, &sales.clone().on_connection(conn_1), AccessType::Read)
            .await
            .unwrap();
        assert!(on_1.is_allowed());

        let on_2 = f
            .evaluator
            .evaluate(&user, &sales.clone().on_connection(conn_2), AccessType::Read)
            .await
            .unwrap();
        assert!(!on_2.is_allowed());

        let unspecified = f
            .evaluator
            .evaluate(&user, &sales, AccessType::Read)
            .await
            .unwrap();
        assert!(!unspecified.is_allowed());

        // The pure decision enforces scoping even if the store over-returns
        let elsewhere = ResourceRef::database("sales").on_connection(conn_2);
        assert!(!decide(&[scoped], &elsewhere, AccessType::Read).is_allowed());
    }

    #[test]
    fn test_connection_scope_adds_specificity() {
        let subject = RuleSubject::Role(Uuid::new_v4());
        let conn = Uuid::new_v4();
        let global_allow = rule(subject, "sales", "*", AccessType::Read, true, 0);
        let scoped_deny = AccessRule {
            connection_id: Some(conn),
            ..rule(subject, "sales", "*", AccessType::Read, false, 0)
        };
        let rules = [global_allow.clone(), scoped_deny];

        let scoped = ResourceRef::database("sales").on_connection(conn);
        assert!(!decide(&rules, &scoped, AccessType::Read).is_allowed());
        let elsewhere = decide(&rules, &ResourceRef::database("sales"), AccessType::Read);
        assert_eq!(elsewhere.rule_id, Some(global_allow.id));
    }

    #[tokio::test]
    async fn test_bypass_performs_no_lookups() {
        let f = fixture(Uuid::new_v4(), vec![]);
        let admin = principal(&[(Uuid::new_v4(), "admin")], &[]);

        let decision = f
            .evaluator
            .evaluate(&admin, &ResourceRef::table("anything", "at_all"), AccessType::Admin)
            .await
            .unwrap();
        assert_eq!(decision.reason, DecisionReason::Bypass);
        assert!(decision.is_allowed());

        let databases = f
            .evaluator
            .filter_databases(&admin, None, vec!["a".into(), "b".into()])
            .await
            .unwrap();
        assert_eq!(databases, vec!["a", "b"]);

        assert_eq!(f.repo.calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bypass_follows_token_roles_over_stored_rules() {
        let mut admin = principal(&[(Uuid::new_v4(), "admin")], &[]);
        let deny_all = rule(
            RuleSubject::User(admin.user_id),
            "*",
            "*",
            AccessType::Read,
            false,
            1000,
        );
        let f = fixture(Uuid::new_v4(), vec![deny_all]);
        let resource = ResourceRef::table("sales", "orders");

        let decision = f
            .evaluator
            .evaluate(&admin, &resource, AccessType::Read)
            .await
            .unwrap();
        assert_eq!(decision.reason, DecisionReason::Bypass);

        // A token issued after the role change no longer carries the bypass.
        admin.roles.clear();
        let decision = f
            .evaluator
            .evaluate(&admin, &resource, AccessType::Read)
            .await
            .unwrap();
        assert!(!decision.is_allowed());
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let repo = Arc::new(MockRuleRepo::failing());
        let evaluator = ResourceAccessEvaluator::new(repo, vec!["admin".to_string()]);
        let user = analyst_principal(Uuid::new_v4());

        let result = evaluator
            .evaluate(&user, &ResourceRef::database("sales"), AccessType::Read)
            .await;
        assert!(matches!(result, Err(AuthzError::StoreUnavailable(_))));

        let listing = evaluator
            .filter_databases(&user, None, vec!["sales".into()])
            .await;
        assert!(listing.is_err());
    }

    #[tokio::test]
    async fn test_filter_databases_and_tables() {
        let analyst = Uuid::new_v4();
        let subject = RuleSubject::Role(analyst);
        let f = fixture(
            analyst,
            vec![
                rule(subject, "sales*", "*", AccessType::Read, true, 0),
                rule(subject, "sales", "secret_*", AccessType::Read, false, 10),
                rule(subject, "hr", "headcount", AccessType::Read, true, 0),
            ],
        );
        let user = analyst_principal(analyst);

        let databases = f
            .evaluator
            .filter_databases(
                &user,
                None,
                vec!["hr".into(), "sales".into(), "marketing".into(), "sales_eu".into()],
            )
            .await
            .unwrap();
        // `hr` only has a table-scoped grant, so it is not listable as a database
        assert_eq!(databases, vec!["sales", "sales_eu"]);

        let tables = f
            .evaluator
            .filter_tables(
                &user,
                None,
                "sales",
                vec!["orders".into(), "secret_salaries".into(), "customers".into()],
            )
            .await
            .unwrap();
        assert_eq!(tables, vec!["orders", "customers"]);

        let hr_tables = f
            .evaluator
            .filter_tables(&user, None, "hr", vec!["headcount".into(), "payroll".into()])
            .await
            .unwrap();
        assert_eq!(hr_tables, vec!["headcount"]);

        // One store read per batch
        assert_eq!(f.repo.calls.load(AtomicOrdering::SeqCst), 3);
    }
}
