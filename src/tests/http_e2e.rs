use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use rstest::rstest;
use serde_json::{Value, json};
use tokio_util::task::TaskTracker;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    AppState, build_app,
    config::{AdminConfig, BootstrapAdminConfig},
    db::tests::harness::create_seeded_db,
    models::{AuditLog, AuditLogQuery},
};

const ADMIN_USERNAME: &str = "root";
const ADMIN_PASSWORD: &str = "bootstrap-password";

const TEST_CONFIG: &str = r#"
[auth.tokens]
secret = "an-hmac-secret-that-is-long-enough-for-tests"
"#;

struct TestApp {
    app: Router,
    state: AppState,
}

impl TestApp {
    async fn new() -> Self {
        let config = AdminConfig::from_str(TEST_CONFIG).expect("test config parses");
        let db = create_seeded_db().await;
        let state = AppState::new(Arc::new(config), db, TaskTracker::new()).unwrap();

        state
            .services
            .users
            .bootstrap_admin(&BootstrapAdminConfig {
                username: ADMIN_USERNAME.into(),
                password: ADMIN_PASSWORD.into(),
                email: None,
            })
            .await
            .expect("bootstrap admin")
            .expect("store was empty");

        Self {
            app: build_app(state.clone()),
            state,
        }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": username, "password": password })),
        )
        .await
    }

    async fn admin_token(&self) -> String {
        let (status, body) = self.login(ADMIN_USERNAME, ADMIN_PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn role_id(&self, token: &str, name: &str) -> String {
        let (status, body) = self.send("GET", "/admin/v1/roles", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["name"] == name)
            .map(|r| r["id"].as_str().unwrap().to_string())
            .unwrap_or_else(|| panic!("role {name} not seeded"))
    }

    /// Create a user holding `role` and return `(user_id, access_token)`.
    async fn user_with_role(&self, admin: &str, username: &str, role: &str) -> (String, String) {
        let role_id = self.role_id(admin, role).await;
        let (status, user) = self
            .send(
                "POST",
                "/admin/v1/users",
                Some(admin),
                Some(json!({
                    "username": username,
                    "password": "correct-horse-battery",
                    "role_id": role_id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{user}");

        let (status, body) = self.login(username, "correct-horse-battery").await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (
            user["id"].as_str().unwrap().to_string(),
            body["access_token"].as_str().unwrap().to_string(),
        )
    }

    /// Audit writes run in the background; poll until one with `action` lands.
    async fn wait_for_audit(&self, action: &str) -> Vec<AuditLog> {
        for _ in 0..50 {
            let page = self
                .state
                .services
                .audit_logs
                .list(AuditLogQuery {
                    action: Some(action.to_string()),
                    ..Default::default()
                })
                .await
                .unwrap();
            if !page.items.is_empty() {
                return page.items;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("no audit entry with action {action}");
    }
}

#[tokio::test]
async fn test_health_reports_store() {
    let app = TestApp::new().await;
    let (status, body) = app.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["healthy"], true);
}

#[tokio::test]
async fn test_login_returns_token_pair() {
    let app = TestApp::new().await;
    let (status, body) = app.login(ADMIN_USERNAME, ADMIN_PASSWORD).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["access_token"].as_str().is_some());
    assert!(body["refresh_token"].as_str().is_some());
    assert!(body["expires_in"].as_i64().unwrap() > 0);
    assert_eq!(body["user"]["username"], ADMIN_USERNAME);

    let entries = app.wait_for_audit("auth.login").await;
    assert_eq!(entries[0].status.as_str(), "success");
}

#[rstest]
#[case::wrong_password(ADMIN_USERNAME, "not-the-password")]
#[case::unknown_user("nobody", ADMIN_PASSWORD)]
#[tokio::test]
async fn test_login_failure_is_generic_and_audited(
    #[case] username: &str,
    #[case] password: &str,
) {
    let app = TestApp::new().await;
    let (status, body) = app.login(username, password).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "invalid_credentials");

    let entries = app.wait_for_audit("auth.login_failed").await;
    assert_eq!(entries[0].details["username"], username);
    assert!(entries[0].actor_id.is_none());
}

#[tokio::test]
async fn test_refresh_rotates_token() {
    let app = TestApp::new().await;
    let (_, login) = app.login(ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let refresh_token = login["refresh_token"].as_str().unwrap();

    let (status, rotated) = app
        .send(
            "POST",
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{rotated}");
    assert_ne!(rotated["refresh_token"], login["refresh_token"]);

    // The old refresh token was consumed by the rotation
    let (status, body) = app
        .send(
            "POST",
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh_token })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "invalid_refresh_token");
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let app = TestApp::new().await;
    let (_, login) = app.login(ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let access = login["access_token"].as_str().unwrap();

    let (status, _) = app.send("POST", "/auth/logout", Some(access), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(
            "POST",
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": login["refresh_token"] })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_lists_current_permissions() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;

    let (status, body) = app.send("GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], ADMIN_USERNAME);
    let permissions: Vec<&str> = body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert!(permissions.contains(&"users:create"));
    assert!(permissions.contains(&"audit:view"));
}

#[tokio::test]
async fn test_session_endpoint_never_fails() {
    let app = TestApp::new().await;

    let (status, body) = app.send("GET", "/auth/session", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "authenticated": false }));

    let (status, body) = app
        .send("GET", "/auth/session", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], false);

    let token = app.admin_token().await;
    let (_, body) = app.send("GET", "/auth/session", Some(&token), None).await;
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["username"], ADMIN_USERNAME);
}

#[rstest]
#[case::missing(None, "missing_credentials")]
#[case::malformed(Some("not-a-token"), "malformed")]
#[tokio::test]
async fn test_rejected_token_is_audited(#[case] token: Option<&str>, #[case] reason: &str) {
    let app = TestApp::new().await;
    let (status, body) = app.send("GET", "/admin/v1/users", token, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["type"], "authentication_error");

    let entries = app.wait_for_audit("auth.token_rejected").await;
    assert_eq!(entries[0].error_message.as_deref(), Some(reason));
    assert_eq!(entries[0].details["path"], "/admin/v1/users");
}

#[tokio::test]
async fn test_missing_permission_is_forbidden_and_audited() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (user_id, viewer) = app.user_with_role(&admin, "vera", "viewer").await;

    let (status, body) = app.send("GET", "/admin/v1/users", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["type"], "permission_error");

    let entries = app.wait_for_audit("authz.permission_denied").await;
    assert_eq!(entries[0].actor_id.map(|id| id.to_string()), Some(user_id));
}

#[tokio::test]
async fn test_system_role_cannot_be_modified() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let analyst = app.role_id(&admin, "analyst").await;

    let (status, _) = app
        .send(
            "DELETE",
            &format!("/admin/v1/roles/{analyst}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (_, me) = app.send("GET", "/auth/me", Some(&admin), None).await;
    let id = me["user"]["id"].as_str().unwrap();

    let (status, _) = app
        .send("DELETE", &format!("/admin/v1/users/{id}"), Some(&admin), None)
        .await;
    assert_ne!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_access_rules_drive_checks_and_listings() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let analyst_role = app.role_id(&admin, "analyst").await;
    let (_, analyst) = app.user_with_role(&admin, "ana", "analyst").await;

    // Role-wide read on sales, with a user-specific deny on one table
    let (status, body) = app
        .send(
            "PUT",
            &format!("/admin/v1/roles/{analyst_role}/access-rules"),
            Some(&admin),
            Some(json!({ "rules": [
                { "database_pattern": "sales", "table_pattern": "*", "access_type": "read" },
                { "database_pattern": "sales", "table_pattern": "salaries",
                  "access_type": "read", "is_allowed": false },
            ]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let check = |table: &'static str| {
        json!({ "database": "sales", "table": table, "access_type": "read" })
    };

    let (status, body) = app
        .send("POST", "/admin/v1/access/check", Some(&analyst), Some(check("orders")))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["allowed"], true);
    assert!(body.get("rule_id").is_none());

    let (_, body) = app
        .send("POST", "/admin/v1/access/check", Some(&analyst), Some(check("salaries")))
        .await;
    assert_eq!(body["allowed"], false);
    assert_eq!(body["decision"], "denied");

    let (_, body) = app
        .send(
            "POST",
            "/admin/v1/access/check",
            Some(&analyst),
            Some(json!({ "database": "sales", "table": "orders", "access_type": "write" })),
        )
        .await;
    assert_eq!(body["allowed"], false);

    let (status, body) = app
        .send(
            "POST",
            "/admin/v1/access/databases",
            Some(&analyst),
            Some(json!({ "databases": ["sales", "hr", "marketing"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["databases"], json!(["sales"]));

    let (_, body) = app
        .send(
            "POST",
            "/admin/v1/access/tables",
            Some(&analyst),
            Some(json!({ "database": "sales", "tables": ["orders", "salaries", "customers"] })),
        )
        .await;
    assert_eq!(body["tables"], json!(["orders", "customers"]));
}

#[tokio::test]
async fn test_bypass_role_sees_everything() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, body) = app
        .send(
            "POST",
            "/admin/v1/access/databases",
            Some(&admin),
            Some(json!({ "databases": ["sales", "hr"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["databases"], json!(["sales", "hr"]));
}

#[tokio::test]
async fn test_invalid_rule_pattern_is_rejected() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let analyst_role = app.role_id(&admin, "analyst").await;

    let (status, _) = app
        .send(
            "POST",
            "/admin/v1/access-rules",
            Some(&admin),
            Some(json!({
                "role_id": analyst_role,
                "database_pattern": "sales drop",
                "table_pattern": "*",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rule_for_unknown_subject_is_not_found() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, _) = app
        .send(
            "POST",
            "/admin/v1/access-rules",
            Some(&admin),
            Some(json!({ "user_id": Uuid::new_v4(), "database_pattern": "sales" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_role_change_ends_sessions() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (user_id, _) = app.user_with_role(&admin, "otto", "viewer").await;
    let (_, login) = app.login("otto", "correct-horse-battery").await;

    let guest = app.role_id(&admin, "guest").await;
    let (status, body) = app
        .send(
            "PUT",
            &format!("/admin/v1/users/{user_id}/role"),
            Some(&admin),
            Some(json!({ "role_id": guest })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, _) = app
        .send(
            "POST",
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": login["refresh_token"] })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_audit_log_is_queryable() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.wait_for_audit("auth.login").await;

    let (status, body) = app
        .send(
            "GET",
            "/admin/v1/audit-logs?action=auth.",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = body["data"].as_array().unwrap();
    assert!(!data.is_empty());
    assert!(data.iter().all(|e| e["action"].as_str().unwrap().starts_with("auth.")));
}
