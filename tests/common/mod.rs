//! Shared fixtures for the integration tests. Everything runs against the
//! in-memory store, so no database is needed.
#![allow(dead_code)]

use std::sync::Arc;

use rbac_admin::{
    AppConfig, AppState, MemoryRepository,
    models::{Admin, PermissionNode, PermissionType},
};

pub const ADMIN_PASSWORD: &str = "admin-password";
pub const OPERATOR_PASSWORD: &str = "operator-password";

pub fn node(id: i64, parent_id: i64, kind: PermissionType, sort: i32) -> PermissionNode {
    PermissionNode {
        id,
        parent_id,
        kind,
        title: format!("node-{}", id),
        sort,
        ..Default::default()
    }
}

fn action(id: i64, parent_id: i64, perms: &str, sort: i32) -> PermissionNode {
    PermissionNode {
        perms: perms.to_string(),
        ..node(id, parent_id, PermissionType::Action, sort)
    }
}

fn menu(id: i64, path: &str, component: &str, sort: i32) -> PermissionNode {
    PermissionNode {
        path: path.to_string(),
        component: component.to_string(),
        ..node(id, 2, PermissionType::Menu, sort)
    }
}

/// The default console hierarchy shipped with the seed migration.
pub fn seed_permissions() -> Vec<PermissionNode> {
    vec![
        PermissionNode {
            path: "/system".to_string(),
            icon: "solution".to_string(),
            ..node(2, 0, PermissionType::Directory, 1)
        },
        menu(3, "/system/users", "SystemUserPage", 0),
        menu(4, "/system/roles", "SystemRolePage", 3),
        menu(5, "/system/menus", "SystemMenuPage", 3),
        action(6, 3, "system:user:search", 0),
        action(7, 3, "system:user:insert", 1),
        action(8, 3, "system:user:change-status", 3),
        action(9, 4, "system:role:search", 0),
        action(36, 3, "system:user:change-password", 4),
        action(37, 4, "system:role:insert", 0),
        action(38, 4, "system:role:edit", 0),
        action(39, 4, "system:role:delete", 0),
        action(40, 5, "system:menu:insert", 1),
        action(93, 4, "system:role:give-perms", 0),
        action(96, 3, "system:user:delete", 3),
        action(102, 5, "system:menu:edit", 2),
        action(103, 5, "system:menu:delete", 3),
        action(104, 5, "system:menu:search", 0),
        action(121, 3, "system:user:give-role", 5),
        action(122, 3, "system:user:edit", 2),
    ]
}

/// Default config with the cheapest bcrypt cost; admin 1 is the super admin.
pub fn test_config() -> AppConfig {
    AppConfig {
        bcrypt_cost: 4,
        ..AppConfig::default()
    }
}

pub fn seeded_repo() -> Arc<MemoryRepository> {
    Arc::new(MemoryRepository::new().with_permissions(seed_permissions()))
}

pub fn state_with(repo: Arc<MemoryRepository>) -> AppState {
    AppState::new(test_config(), repo)
}

pub async fn create_admin(state: &AppState, username: &str, password: &str) -> Admin {
    state
        .admins
        .create(username, password, password)
        .await
        .expect("failed to create test admin")
}

/// A seeded store holding the super admin `admin` (id 1) and a plain
/// `operator` (id 2) without any grants.
pub async fn seeded_state() -> (AppState, Arc<MemoryRepository>, Admin, Admin) {
    let repo = seeded_repo();
    let state = state_with(repo.clone());
    let root = create_admin(&state, "admin", ADMIN_PASSWORD).await;
    let operator = create_admin(&state, "operator", OPERATOR_PASSWORD).await;
    (state, repo, root, operator)
}
