mod common;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use common::{ADMIN_PASSWORD, OPERATOR_PASSWORD};
use rbac_admin::{AdminRepository, MemoryRepository, create_router, models::AdminLog};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub state: rbac_admin::AppState,
    pub repo: Arc<MemoryRepository>,
    pub client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let body: Value = self
            .client
            .post(self.url("/admin/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("req fail")
            .json()
            .await
            .unwrap();
        body["data"]["auth"]["access_token"]
            .as_str()
            .expect("login returned no token")
            .to_string()
    }

    async fn get(&self, path: &str, token: &str) -> (u16, Value) {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("req fail");
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .header("user-agent", "api-tests")
            .json(&body)
            .send()
            .await
            .expect("req fail");
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    /// Audit records are written on a detached task after the response.
    async fn wait_for_logs(&self, count: usize) -> Vec<AdminLog> {
        for _ in 0..50 {
            let logs = self.repo.logs();
            if logs.len() >= count {
                return logs;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.repo.logs()
    }
}

async fn spawn_app() -> TestApp {
    let (state, repo, _, _) = common::seeded_state().await;
    let router = create_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        address,
        state,
        repo,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/health")).send().await.expect("req fail");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_login_then_menus() {
    let app = spawn_app().await;
    let token = app.login("admin", ADMIN_PASSWORD).await;

    let (status, body) = app.get("/admin/auth/menus", &token).await;

    assert_eq!(status, 200);
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["menus"][0]["path"], "/system");
    assert_eq!(body["data"]["menus"][0]["component"], "RouteView");
    assert_eq!(body["data"]["perms"].as_array().unwrap().len(), 16);
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/admin/account/detail"))
        .send()
        .await
        .expect("req fail");
    let status = response.status().as_u16();
    let body: Value = response.json().await.unwrap();

    assert_eq!(status, 401);
    assert_eq!(body["code"], 401);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_guard_rejects_then_admits_after_grant() {
    let app = spawn_app().await;
    let token = app.login("operator", OPERATOR_PASSWORD).await;

    let (denied, body) = app
        .get("/admin/admins/lists?page=1&page_size=10", &token)
        .await;
    assert_eq!(denied, 403);
    assert_eq!(body["code"], 403);

    app.state.rbac.give_admin_role(2, 0, "6").await.unwrap();

    let (allowed, body) = app
        .get("/admin/admins/lists?page=1&page_size=10", &token)
        .await;
    assert_eq!(allowed, 200);
    assert_eq!(body["data"]["total"], 2);
    assert!(body["data"]["rows"][0].get("password").is_none());
}

#[tokio::test]
async fn test_invalid_query_is_validation_error() {
    let app = spawn_app().await;
    let token = app.login("admin", ADMIN_PASSWORD).await;

    let (status, body) = app
        .get("/admin/admins/lists?page=1&page_size=7", &token)
        .await;

    assert_eq!(status, 422);
    assert_eq!(body["message"], "page_size must be one of 10, 20, 30, 50, 100");
}

#[tokio::test]
async fn test_mutation_writes_audit_record() {
    let app = spawn_app().await;
    let token = app.login("admin", ADMIN_PASSWORD).await;

    let (status, body) = app
        .post(
            "/admin/rbac/create-role",
            &token,
            json!({ "name": "support", "display_name": "Support", "description": "Desk" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Role created");

    let logs = app.wait_for_logs(1).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].admin_id, 1);
    assert_eq!(logs[0].admin_name, "admin");
    assert_eq!(logs[0].route, "/admin/rbac/create-role");
    assert_eq!(logs[0].ip, "127.0.0.1");
    assert_eq!(logs[0].useragent, "api-tests");
    let param: Value = serde_json::from_str(&logs[0].param).unwrap();
    assert_eq!(param["name"], "support");
}

#[tokio::test]
async fn test_audit_record_masks_passwords() {
    let app = spawn_app().await;
    let token = app.login("admin", ADMIN_PASSWORD).await;

    let (status, _) = app
        .post(
            "/admin/admins/create",
            &token,
            json!({ "username": "auditor", "password": "hunter22", "password2": "hunter22" }),
        )
        .await;
    assert_eq!(status, 200);

    let logs = app.wait_for_logs(1).await;
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].param.contains("hunter22"));
    let param: Value = serde_json::from_str(&logs[0].param).unwrap();
    assert_eq!(param["username"], "auditor");
    assert_eq!(param["password"], "******");
}

#[tokio::test]
async fn test_denied_mutation_is_not_audited() {
    let app = spawn_app().await;
    let token = app.login("operator", OPERATOR_PASSWORD).await;

    let (status, _) = app
        .post("/admin/rbac/delete-role", &token, json!({ "role_id": 1 }))
        .await;
    assert_eq!(status, 403);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(app.repo.logs().is_empty());
}

#[tokio::test]
async fn test_read_only_routes_are_not_audited() {
    let app = spawn_app().await;
    let token = app.login("admin", ADMIN_PASSWORD).await;

    let (status, _) = app.get("/admin/rbac/permissions", &token).await;
    assert_eq!(status, 200);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(app.repo.logs().is_empty());
}

#[tokio::test]
async fn test_delete_own_account_over_http() {
    let app = spawn_app().await;
    let token = app.login("admin", ADMIN_PASSWORD).await;

    let (status, body) = app
        .post("/admin/admins/delete", &token, json!({ "admin_id": 1 }))
        .await;

    assert_eq!(status, 409);
    assert_eq!(body["code"], 409);
}

#[tokio::test]
async fn test_disabled_admin_token_stops_working() {
    let app = spawn_app().await;
    let admin_token = app.login("admin", ADMIN_PASSWORD).await;
    let operator_token = app.login("operator", OPERATOR_PASSWORD).await;

    let (status, _) = app
        .post(
            "/admin/admins/update-status",
            &admin_token,
            json!({ "admin_id": 2, "status": 1 }),
        )
        .await;
    assert_eq!(status, 200);

    let (status, body) = app.get("/admin/account/detail", &operator_token).await;
    assert_eq!(status, 401);
    assert_eq!(body["message"], "Account is disabled");
}

#[tokio::test]
async fn test_account_update_and_detail() {
    let app = spawn_app().await;
    let token = app.login("operator", OPERATOR_PASSWORD).await;

    let (status, _) = app
        .post(
            "/admin/account/update-account",
            &token,
            json!({ "email": "ops@example.com", "avatar": "", "nickname": "Ops" }),
        )
        .await;
    assert_eq!(status, 200);

    let (status, body) = app.get("/admin/account/detail", &token).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["email"], "ops@example.com");
    assert_eq!(body["data"]["nickname"], "Ops");
}

#[tokio::test]
async fn test_admin_id_header_without_token_is_rejected() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/admin/admins/create"))
        .header("x-admin-id", "1")
        .json(&json!({ "username": "intruder", "password": "x", "password2": "x" }))
        .send()
        .await
        .expect("req fail");
    let status = response.status().as_u16();
    let body: Value = response.json().await.unwrap();

    assert_eq!(status, 401);
    assert_eq!(body["message"], "Missing bearer token");
    assert!(app.repo.find_admin_by_username("intruder").await.unwrap().is_none());
}

#[tokio::test]
async fn test_token_rejected_after_logout() {
    let app = spawn_app().await;
    let token = app.login("admin", ADMIN_PASSWORD).await;

    let (status, body) = app.post("/admin/auth/logout", &token, json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Successfully logged out");

    let (status, body) = app.get("/admin/auth/menus", &token).await;
    assert_eq!(status, 401);
    assert_eq!(body["message"], "Token has been revoked");
}

#[tokio::test]
async fn test_refresh_replaces_the_old_token() {
    let app = spawn_app().await;
    let old_token = app.login("operator", OPERATOR_PASSWORD).await;

    let (status, body) = app.post("/admin/auth/refresh", &old_token, json!({})).await;
    assert_eq!(status, 200);
    let new_token = body["data"]["access_token"]
        .as_str()
        .expect("refresh returned no token")
        .to_string();

    let (old_status, _) = app.get("/admin/account/detail", &old_token).await;
    let (new_status, body) = app.get("/admin/account/detail", &new_token).await;

    assert_eq!(old_status, 401);
    assert_eq!(new_status, 200);
    assert_eq!(body["data"]["username"], "operator");
}
