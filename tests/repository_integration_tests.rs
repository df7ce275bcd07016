use chrono::{Duration, Utc};
use rbac_admin::{
    AdminLogRepository, AdminRepository, PostgresRepository, RbacRepository,
    models::{
        Admin, AdminFilter, AdminLogFilter, AdminStatus, NewAdmin, NewAdminLog, PermissionInput,
        PermissionType, Role, RoleInput,
    },
    response::{PageRequest, SortOrder},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Holds the pool for one test. Every test writes rows with unique names, so
/// tests can share one database and run concurrently.
struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    /// Connects to `DATABASE_URL` and applies the migrations. Returns `None`
    /// (and the calling test returns early) when no database is configured.
    async fn setup() -> Option<Self> {
        dotenv::dotenv().ok();

        let Ok(db_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL is not set; skipping Postgres repository test");
            return None;
        };

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        Some(DbTestContext { pool })
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

async fn create_test_admin(repo: &PostgresRepository) -> Admin {
    repo.create_admin(NewAdmin {
        username: unique("admin"),
        password: "not-a-real-hash".to_string(),
        ..Default::default()
    })
    .await
    .expect("Failed to create test admin")
}

async fn create_test_role(repo: &PostgresRepository) -> Role {
    let name = unique("role");
    repo.create_role(RoleInput {
        display_name: name.clone(),
        name,
        description: "integration test role".to_string(),
    })
    .await
    .expect("Failed to create test role")
}

async fn create_test_menu(repo: &PostgresRepository, parent_id: i64) -> i64 {
    repo.create_permission(PermissionInput {
        parent_id,
        kind: PermissionType::Menu,
        title: unique("menu"),
        ..Default::default()
    })
    .await
    .expect("Failed to create test permission")
    .id
}

// --- Migrations ---

#[tokio::test]
async fn test_migrations_seed_default_menus() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();

    let system = repo.find_permission(2).await.unwrap().expect("seeded /system");
    let all = repo.all_permissions().await.unwrap();

    assert_eq!(system.path, "/system");
    assert_eq!(system.kind, PermissionType::Directory);
    assert!(all.iter().any(|n| n.perms == "system:user:insert" && n.parent_id == 3));
}

// --- Grants ---

#[tokio::test]
async fn test_replace_admin_grants_does_not_accumulate() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let admin = create_test_admin(&repo).await;
    let first_role = create_test_role(&repo).await;
    let second_role = create_test_role(&repo).await;

    repo.replace_admin_grants(admin.id, Some(first_role.id), &[6, 7])
        .await
        .unwrap();
    // A second assignment hits the `ON CONFLICT (admin_id)` upsert.
    repo.replace_admin_grants(admin.id, Some(second_role.id), &[7, 9])
        .await
        .unwrap();

    assert_eq!(repo.admin_permission_ids(admin.id).await.unwrap(), vec![7, 9]);
    assert_eq!(repo.admin_role_id(admin.id).await.unwrap(), Some(second_role.id));

    repo.replace_admin_grants(admin.id, None, &[]).await.unwrap();

    assert!(repo.admin_permission_ids(admin.id).await.unwrap().is_empty());
    assert_eq!(repo.admin_role_id(admin.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_replace_role_permissions_replaces_set() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let role = create_test_role(&repo).await;

    repo.replace_role_permissions(role.id, &[6, 7, 8]).await.unwrap();
    repo.replace_role_permissions(role.id, &[9, 6]).await.unwrap();

    assert_eq!(repo.role_permission_ids(role.id).await.unwrap(), vec![6, 9]);
}

// --- Cascades ---

#[tokio::test]
async fn test_delete_permissions_removes_nodes_and_grants() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let admin = create_test_admin(&repo).await;
    let role = create_test_role(&repo).await;
    let parent = create_test_menu(&repo, 2).await;
    let child = create_test_menu(&repo, parent).await;
    repo.replace_role_permissions(role.id, &[parent, child, 6])
        .await
        .unwrap();
    repo.replace_admin_grants(admin.id, None, &[child, 7])
        .await
        .unwrap();

    let removed = repo.delete_permissions(&[parent, child]).await.unwrap();

    assert_eq!(removed, 2);
    assert!(repo.find_permission(parent).await.unwrap().is_none());
    assert!(repo.find_permission(child).await.unwrap().is_none());
    assert_eq!(repo.role_permission_ids(role.id).await.unwrap(), vec![6]);
    assert_eq!(repo.admin_permission_ids(admin.id).await.unwrap(), vec![7]);
}

#[tokio::test]
async fn test_delete_role_detaches_admins() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let admin = create_test_admin(&repo).await;
    let role = create_test_role(&repo).await;
    repo.replace_role_permissions(role.id, &[6]).await.unwrap();
    repo.replace_admin_grants(admin.id, Some(role.id), &[]).await.unwrap();
    assert_eq!(repo.count_role_admins(role.id).await.unwrap(), 1);

    assert!(repo.delete_role(role.id).await.unwrap());

    assert!(repo.find_role(role.id).await.unwrap().is_none());
    assert_eq!(repo.admin_role_id(admin.id).await.unwrap(), None);
    assert!(repo.role_permission_ids(role.id).await.unwrap().is_empty());
    assert!(!repo.delete_role(role.id).await.unwrap());
}

#[tokio::test]
async fn test_delete_admin_removes_grants() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let admin = create_test_admin(&repo).await;
    let role = create_test_role(&repo).await;
    repo.replace_admin_grants(admin.id, Some(role.id), &[6]).await.unwrap();

    assert!(repo.delete_admin(admin.id).await.unwrap());

    assert!(repo.find_admin(admin.id).await.unwrap().is_none());
    assert!(repo.admin_permission_ids(admin.id).await.unwrap().is_empty());
    assert_eq!(repo.count_role_admins(role.id).await.unwrap(), 0);
}

// --- Listing ---

#[tokio::test]
async fn test_list_admins_filters_and_orders() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let first = create_test_admin(&repo).await;
    let second = create_test_admin(&repo).await;
    repo.update_status(second.id, AdminStatus::Disabled).await.unwrap();

    let disabled = AdminFilter {
        status: Some(AdminStatus::Disabled),
        ..Default::default()
    };
    let (rows, total) = repo
        .list_admins(&disabled, PageRequest::new(1, 100))
        .await
        .unwrap();
    assert!(total >= 1);
    assert!(rows.iter().all(|a| a.status == AdminStatus::Disabled));
    assert!(rows.iter().all(|a| a.id != first.id));

    let ascending = AdminFilter {
        order_by: Some("id"),
        order: SortOrder::Asc,
        ..Default::default()
    };
    let (rows, total) = repo
        .list_admins(&ascending, PageRequest::new(1, 100))
        .await
        .unwrap();
    assert!(total >= 2);
    assert!(rows.windows(2).all(|pair| pair[0].id < pair[1].id));

    // Default ordering is `id DESC`; the page size caps the rows.
    let (rows, _) = repo
        .list_admins(&AdminFilter::default(), PageRequest::new(1, 1))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].id >= second.id);
}

#[tokio::test]
async fn test_list_logs_filters_by_admin_newest_first() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let admin = create_test_admin(&repo).await;
    for route in ["/admin/rbac/create-role", "/admin/rbac/edit-role"] {
        repo.insert_log(NewAdminLog {
            admin_id: admin.id,
            admin_name: admin.username.clone(),
            route: route.to_string(),
            param: "{}".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    }

    let filter = AdminLogFilter {
        admin_id: Some(admin.id),
        ..Default::default()
    };
    let (rows, total) = repo.list_logs(&filter, PageRequest::new(1, 10)).await.unwrap();

    assert_eq!(total, 2);
    assert_eq!(rows[0].route, "/admin/rbac/edit-role");
    assert_eq!(rows[1].route, "/admin/rbac/create-role");
}

// --- Token revocation ---

#[tokio::test]
async fn test_revoked_token_is_recorded_once() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let admin = create_test_admin(&repo).await;
    let jti = Uuid::new_v4();
    let expires_at = Utc::now() + Duration::minutes(30);

    assert!(!repo.is_token_revoked(jti).await.unwrap());

    repo.revoke_token(jti, admin.id, expires_at).await.unwrap();
    repo.revoke_token(jti, admin.id, expires_at).await.unwrap();

    assert!(repo.is_token_revoked(jti).await.unwrap());
    assert!(!repo.is_token_revoked(Uuid::new_v4()).await.unwrap());
}
