mod common;

use common::{ADMIN_PASSWORD, OPERATOR_PASSWORD, seeded_state};
use rbac_admin::{
    AdminRepository, AppError,
    auth::verify_password,
    models::{AccountProfile, AdminListQuery, AdminStatus},
};

fn list_query(status: Option<u8>) -> AdminListQuery {
    AdminListQuery {
        page: 1,
        page_size: 10,
        status,
        sort_field: None,
        sort_order: None,
    }
}

// --- Accounts managed by other admins ---

#[tokio::test]
async fn test_create_admin_hashes_password() {
    let (state, repo, _, _) = seeded_state().await;

    let created = state.admins.create("auditor", "secret", "secret").await.unwrap();

    let stored = repo.find_admin(created.id).await.unwrap().unwrap();
    assert_ne!(stored.password, "secret");
    assert!(verify_password("secret", &stored.password));
    assert_eq!(stored.status, AdminStatus::Enabled);
}

#[tokio::test]
async fn test_create_admin_rejects_duplicate_username() {
    let (state, _, _, _) = seeded_state().await;

    let result = state.admins.create("operator", "x", "x").await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_create_admin_rejects_mismatched_confirmation() {
    let (state, _, _, _) = seeded_state().await;

    let result = state.admins.create("auditor", "one", "two").await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_delete_own_account_is_conflict() {
    let (state, repo, root, _) = seeded_state().await;

    let result = state.admins.delete(root.id, root.id).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(repo.find_admin(root.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_other_admin() {
    let (state, repo, root, operator) = seeded_state().await;

    state.admins.delete(root.id, operator.id).await.unwrap();

    assert!(repo.find_admin(operator.id).await.unwrap().is_none());
    assert!(matches!(
        state.admins.delete(root.id, operator.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let (state, _, _, operator) = seeded_state().await;
    state
        .admins
        .update_status(operator.id, AdminStatus::Disabled)
        .await
        .unwrap();

    let everyone = state.admins.list(&list_query(None)).await.unwrap();
    let enabled = state.admins.list(&list_query(Some(0))).await.unwrap();
    let disabled = state.admins.list(&list_query(Some(1))).await.unwrap();
    let all_again = state.admins.list(&list_query(Some(2))).await.unwrap();

    assert_eq!(everyone.total, 2);
    assert_eq!(all_again.total, 2);
    assert_eq!(enabled.rows.len(), 1);
    assert_eq!(disabled.rows[0].id, operator.id);
}

#[tokio::test]
async fn test_list_defaults_to_newest_first_and_honours_sort() {
    let (state, _, root, operator) = seeded_state().await;

    let default_order = state.admins.list(&list_query(None)).await.unwrap();
    let ascending = state
        .admins
        .list(&AdminListQuery {
            sort_field: Some("id".to_string()),
            sort_order: Some("ascend".to_string()),
            ..list_query(None)
        })
        .await
        .unwrap();
    let unknown_field = state
        .admins
        .list(&AdminListQuery {
            sort_field: Some("password".to_string()),
            sort_order: Some("ascend".to_string()),
            ..list_query(None)
        })
        .await
        .unwrap();

    let ids = |rows: &[rbac_admin::models::Admin]| rows.iter().map(|a| a.id).collect::<Vec<_>>();
    assert_eq!(ids(&default_order.rows), vec![operator.id, root.id]);
    assert_eq!(ids(&ascending.rows), vec![root.id, operator.id]);
    // Unknown fields fall back to id; only the direction is taken.
    assert_eq!(ids(&unknown_field.rows), vec![root.id, operator.id]);
    assert_eq!(default_order.page_total, 1);
}

#[tokio::test]
async fn test_update_password_of_missing_admin() {
    let (state, _, _, _) = seeded_state().await;

    let result = state.admins.update_password(999, "a", "a").await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

// --- Own account ---

#[tokio::test]
async fn test_update_account_password_checks_old_password() {
    let (state, repo, _, operator) = seeded_state().await;

    let wrong = state
        .admins
        .update_account_password(&operator, "not-it", "new-password", "new-password")
        .await;
    assert!(matches!(wrong, Err(AppError::Validation(_))));

    state
        .admins
        .update_account_password(&operator, OPERATOR_PASSWORD, "new-password", "new-password")
        .await
        .unwrap();

    let stored = repo.find_admin(operator.id).await.unwrap().unwrap();
    assert!(verify_password("new-password", &stored.password));
}

#[tokio::test]
async fn test_update_account_profile() {
    let (state, repo, root, _) = seeded_state().await;

    state
        .admins
        .update_account(
            root.id,
            AccountProfile {
                email: "root@example.com".to_string(),
                avatar: String::new(),
                nickname: "Root".to_string(),
            },
        )
        .await
        .unwrap();

    let stored = repo.find_admin(root.id).await.unwrap().unwrap();
    let detail = state.admins.detail(&stored);
    assert_eq!(detail.email, "root@example.com");
    assert_eq!(detail.nickname, "Root");
    assert_eq!(detail.profile, "");
}

#[tokio::test]
async fn test_bootstrap_admin_is_created_once() {
    let repo = common::seeded_repo();
    let state = common::state_with(repo);

    let first = state.admins.ensure_bootstrap_admin(ADMIN_PASSWORD).await.unwrap();
    let second = state.admins.ensure_bootstrap_admin("other").await.unwrap();

    assert_eq!(first.map(|a| a.username), Some("admin".to_string()));
    assert!(second.is_none());
}

// --- Login ---

#[tokio::test]
async fn test_login_records_time_and_ip() {
    let (state, repo, _, operator) = seeded_state().await;

    let admin = state
        .auth
        .login("operator", OPERATOR_PASSWORD, "10.0.0.7")
        .await
        .unwrap();

    assert_eq!(admin.id, operator.id);
    let stored = repo.find_admin(operator.id).await.unwrap().unwrap();
    assert_eq!(stored.last_login_ip, "10.0.0.7");
    assert!(stored.last_login_time.is_some());
}

#[tokio::test]
async fn test_login_rejects_bad_credentials_uniformly() {
    let (state, _, _, _) = seeded_state().await;

    let wrong_password = state.auth.login("operator", "nope", "ip").await.unwrap_err();
    let unknown_user = state.auth.login("ghost", "nope", "ip").await.unwrap_err();

    assert!(matches!(wrong_password, AppError::Unauthorized(_)));
    assert_eq!(wrong_password.to_string(), unknown_user.to_string());
}

#[tokio::test]
async fn test_login_rejects_disabled_account() {
    let (state, _, _, operator) = seeded_state().await;
    state
        .admins
        .update_status(operator.id, AdminStatus::Disabled)
        .await
        .unwrap();

    let result = state.auth.login("operator", OPERATOR_PASSWORD, "ip").await;

    match result {
        Err(AppError::Unauthorized(msg)) => assert_eq!(msg, "Account is disabled"),
        other => panic!("expected a disabled-account rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_login_with_token_returns_admin_info() {
    let (state, _, _, _) = seeded_state().await;

    let response = state
        .auth
        .login_with_token("admin", ADMIN_PASSWORD, "ip")
        .await
        .unwrap();

    assert_eq!(response.auth.token_type, "Bearer");
    assert_eq!(response.admin_info.username, "admin");
    let claims = state.tokens.verify(&response.auth.access_token).unwrap();
    assert_eq!(claims.sub, 1);
}
