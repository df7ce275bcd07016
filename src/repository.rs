use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    models::{
        AccountProfile, Admin, AdminFilter, AdminLog, AdminLogFilter, AdminStatus, NewAdmin,
        NewAdminLog, PermissionInput, PermissionNode, Role, RoleInput, RoleOption,
    },
    response::PageRequest,
};

/// Store results keep the driver error; services lift it into `AppError::Persistence`.
pub type RepoResult<T> = Result<T, sqlx::Error>;

const ADMIN_COLUMNS: &str = "id, username, password, nickname, email, avatar, status, \
     last_login_time, last_login_ip, created_at, updated_at";

const PERMISSION_COLUMNS: &str =
    "id, parent_id, type, title, path, component, perms, icon, sort, hidden, is_frame";

const ROLE_COLUMNS: &str = "id, name, display_name, description, created_at, updated_at";

const LOG_COLUMNS: &str = "id, admin_id, admin_name, route, param, ip, useragent, created_at";

/// AdminRepository
///
/// Persistence contract for admin accounts.
#[async_trait]
pub trait AdminRepository: Send + Sync {
    async fn find_admin(&self, id: i64) -> RepoResult<Option<Admin>>;
    async fn find_admin_by_username(&self, username: &str) -> RepoResult<Option<Admin>>;
    async fn create_admin(&self, admin: NewAdmin) -> RepoResult<Admin>;
    /// Removes the account together with its role assignment and direct grants.
    /// Returns false when no such admin exists.
    async fn delete_admin(&self, id: i64) -> RepoResult<bool>;
    async fn update_password(&self, id: i64, password_hash: &str) -> RepoResult<bool>;
    async fn update_status(&self, id: i64, status: AdminStatus) -> RepoResult<bool>;
    async fn update_profile(&self, id: i64, profile: AccountProfile) -> RepoResult<bool>;
    async fn record_login(&self, id: i64, at: DateTime<Utc>, ip: &str) -> RepoResult<()>;
    /// One page of admins plus the unpaged total.
    async fn list_admins(&self, filter: &AdminFilter, page: PageRequest)
    -> RepoResult<(Vec<Admin>, i64)>;

    // --- Token revocation ---
    /// Records `jti` as revoked until `expires_at`. Entries already past their
    /// expiry are purged on the way.
    async fn revoke_token(&self, jti: Uuid, admin_id: i64, expires_at: DateTime<Utc>)
    -> RepoResult<()>;
    async fn is_token_revoked(&self, jti: Uuid) -> RepoResult<bool>;
}

/// RbacRepository
///
/// Roles, the permission hierarchy and the grant tables linking them to admins.
/// Every `replace_*` and `delete_*` operation is atomic.
#[async_trait]
pub trait RbacRepository: Send + Sync {
    // --- Permission nodes ---
    async fn all_permissions(&self) -> RepoResult<Vec<PermissionNode>>;
    async fn find_permission(&self, id: i64) -> RepoResult<Option<PermissionNode>>;
    async fn create_permission(&self, input: PermissionInput) -> RepoResult<PermissionNode>;
    async fn update_permission(&self, id: i64, input: PermissionInput) -> RepoResult<bool>;
    /// Deletes the given nodes and every grant referencing them.
    async fn delete_permissions(&self, ids: &[i64]) -> RepoResult<u64>;

    // --- Roles ---
    async fn list_roles(&self, page: PageRequest) -> RepoResult<(Vec<Role>, i64)>;
    async fn all_roles(&self) -> RepoResult<Vec<RoleOption>>;
    async fn find_role(&self, id: i64) -> RepoResult<Option<Role>>;
    async fn find_role_by_name(&self, name: &str) -> RepoResult<Option<Role>>;
    async fn create_role(&self, input: RoleInput) -> RepoResult<Role>;
    async fn update_role(&self, id: i64, input: RoleInput) -> RepoResult<bool>;
    /// Deletes the role, its permission grants and any admin assignments to it.
    async fn delete_role(&self, id: i64) -> RepoResult<bool>;
    async fn count_role_admins(&self, role_id: i64) -> RepoResult<i64>;

    // --- Grants ---
    async fn role_permission_ids(&self, role_id: i64) -> RepoResult<Vec<i64>>;
    async fn admin_role_id(&self, admin_id: i64) -> RepoResult<Option<i64>>;
    async fn admin_permission_ids(&self, admin_id: i64) -> RepoResult<Vec<i64>>;
    async fn replace_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> RepoResult<()>;
    /// Sets (or with `None` clears) the admin's role and replaces their direct grants.
    async fn replace_admin_grants(
        &self,
        admin_id: i64,
        role_id: Option<i64>,
        permission_ids: &[i64],
    ) -> RepoResult<()>;
}

/// AdminLogRepository
///
/// Append-only audit storage.
#[async_trait]
pub trait AdminLogRepository: Send + Sync {
    async fn insert_log(&self, entry: NewAdminLog) -> RepoResult<()>;
    async fn list_logs(&self, filter: &AdminLogFilter, page: PageRequest)
    -> RepoResult<(Vec<AdminLog>, i64)>;
}

pub type AdminRepositoryState = Arc<dyn AdminRepository>;
pub type RbacRepositoryState = Arc<dyn RbacRepository>;
pub type AdminLogRepositoryState = Arc<dyn AdminLogRepository>;

/// PostgresRepository
///
/// Implements all three repositories over one connection pool.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdminRepository for PostgresRepository {
    async fn find_admin(&self, id: i64) -> RepoResult<Option<Admin>> {
        sqlx::query_as::<_, Admin>(&format!("SELECT {} FROM admins WHERE id = $1", ADMIN_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_admin_by_username(&self, username: &str) -> RepoResult<Option<Admin>> {
        sqlx::query_as::<_, Admin>(&format!(
            "SELECT {} FROM admins WHERE username = $1",
            ADMIN_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_admin(&self, admin: NewAdmin) -> RepoResult<Admin> {
        sqlx::query_as::<_, Admin>(&format!(
            r#"
            INSERT INTO admins (username, password, nickname, email, avatar)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            ADMIN_COLUMNS
        ))
        .bind(admin.username)
        .bind(admin.password)
        .bind(admin.nickname)
        .bind(admin.email)
        .bind(admin.avatar)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_admin(&self, id: i64) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_admins WHERE admin_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM admin_permissions WHERE admin_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM admins WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepoResult<bool> {
        let result =
            sqlx::query("UPDATE admins SET password = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(password_hash)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_status(&self, id: i64, status: AdminStatus) -> RepoResult<bool> {
        let result = sqlx::query("UPDATE admins SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_profile(&self, id: i64, profile: AccountProfile) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE admins
            SET email = $2, avatar = $3, nickname = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(profile.email)
        .bind(profile.avatar)
        .bind(profile.nickname)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>, ip: &str) -> RepoResult<()> {
        sqlx::query("UPDATE admins SET last_login_time = $2, last_login_ip = $3 WHERE id = $1")
            .bind(id)
            .bind(at)
            .bind(ip)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// list_admins
    ///
    /// `order_by` must come from `sort_column`; it is pushed into the SQL text
    /// verbatim. Values go through `push_bind`.
    async fn list_admins(
        &self,
        filter: &AdminFilter,
        page: PageRequest,
    ) -> RepoResult<(Vec<Admin>, i64)> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM admins");
        if let Some(status) = filter.status {
            count.push(" WHERE status = ");
            count.push_bind(status);
        }
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM admins", ADMIN_COLUMNS));
        if let Some(status) = filter.status {
            builder.push(" WHERE status = ");
            builder.push_bind(status);
        }
        builder.push(format!(
            " ORDER BY {} {}, id DESC",
            filter.order_by.unwrap_or("id"),
            filter.order.as_sql()
        ));
        builder.push(" LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let rows = builder.build_query_as::<Admin>().fetch_all(&self.pool).await?;
        Ok((rows, total))
    }

    async fn revoke_token(
        &self,
        jti: Uuid,
        admin_id: i64,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < NOW()")
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO revoked_tokens (jti, admin_id, expires_at) VALUES ($1, $2, $3)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(jti)
        .bind(admin_id)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    async fn is_token_revoked(&self, jti: Uuid) -> RepoResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE jti = $1)")
            .bind(jti)
            .fetch_one(&self.pool)
            .await
    }
}

#[async_trait]
impl RbacRepository for PostgresRepository {
    async fn all_permissions(&self) -> RepoResult<Vec<PermissionNode>> {
        sqlx::query_as::<_, PermissionNode>(&format!(
            "SELECT {} FROM permissions ORDER BY sort ASC, id ASC",
            PERMISSION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn find_permission(&self, id: i64) -> RepoResult<Option<PermissionNode>> {
        sqlx::query_as::<_, PermissionNode>(&format!(
            "SELECT {} FROM permissions WHERE id = $1",
            PERMISSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_permission(&self, input: PermissionInput) -> RepoResult<PermissionNode> {
        sqlx::query_as::<_, PermissionNode>(&format!(
            r#"
            INSERT INTO permissions
                (parent_id, type, title, path, component, perms, icon, sort, hidden, is_frame)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            PERMISSION_COLUMNS
        ))
        .bind(input.parent_id)
        .bind(input.kind)
        .bind(input.title)
        .bind(input.path)
        .bind(input.component)
        .bind(input.perms)
        .bind(input.icon)
        .bind(input.sort)
        .bind(input.hidden)
        .bind(input.is_frame)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_permission(&self, id: i64, input: PermissionInput) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE permissions
            SET parent_id = $2, type = $3, title = $4, path = $5, component = $6,
                perms = $7, icon = $8, sort = $9, hidden = $10, is_frame = $11
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(input.parent_id)
        .bind(input.kind)
        .bind(input.title)
        .bind(input.path)
        .bind(input.component)
        .bind(input.perms)
        .bind(input.icon)
        .bind(input.sort)
        .bind(input.hidden)
        .bind(input.is_frame)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_permissions(&self, ids: &[i64]) -> RepoResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_permissions WHERE permission_id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM admin_permissions WHERE permission_id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM permissions WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn list_roles(&self, page: PageRequest) -> RepoResult<(Vec<Role>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles")
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query_as::<_, Role>(&format!(
            "SELECT {} FROM roles ORDER BY id DESC LIMIT $1 OFFSET $2",
            ROLE_COLUMNS
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok((rows, total))
    }

    async fn all_roles(&self) -> RepoResult<Vec<RoleOption>> {
        sqlx::query_as::<_, RoleOption>("SELECT id, display_name FROM roles ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
    }

    async fn find_role(&self, id: i64) -> RepoResult<Option<Role>> {
        sqlx::query_as::<_, Role>(&format!("SELECT {} FROM roles WHERE id = $1", ROLE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_role_by_name(&self, name: &str) -> RepoResult<Option<Role>> {
        sqlx::query_as::<_, Role>(&format!("SELECT {} FROM roles WHERE name = $1", ROLE_COLUMNS))
            .bind(name)
            .fetch_optional(&self.pool)
            .await
    }

    async fn create_role(&self, input: RoleInput) -> RepoResult<Role> {
        sqlx::query_as::<_, Role>(&format!(
            "INSERT INTO roles (name, display_name, description) VALUES ($1, $2, $3) RETURNING {}",
            ROLE_COLUMNS
        ))
        .bind(input.name)
        .bind(input.display_name)
        .bind(input.description)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_role(&self, id: i64, input: RoleInput) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE roles
            SET name = $2, display_name = $3, description = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(input.name)
        .bind(input.display_name)
        .bind(input.description)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_role(&self, id: i64) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_admins WHERE role_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_role_admins(&self, role_id: i64) -> RepoResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM role_admins WHERE role_id = $1")
            .bind(role_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn role_permission_ids(&self, role_id: i64) -> RepoResult<Vec<i64>> {
        sqlx::query_scalar(
            "SELECT permission_id FROM role_permissions WHERE role_id = $1 ORDER BY permission_id",
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn admin_role_id(&self, admin_id: i64) -> RepoResult<Option<i64>> {
        sqlx::query_scalar("SELECT role_id FROM role_admins WHERE admin_id = $1")
            .bind(admin_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn admin_permission_ids(&self, admin_id: i64) -> RepoResult<Vec<i64>> {
        sqlx::query_scalar(
            "SELECT permission_id FROM admin_permissions WHERE admin_id = $1 ORDER BY permission_id",
        )
        .bind(admin_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn replace_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        if !permission_ids.is_empty() {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO role_permissions (role_id, permission_id) ");
            builder.push_values(permission_ids, |mut row, permission_id| {
                row.push_bind(role_id).push_bind(*permission_id);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await
    }

    async fn replace_admin_grants(
        &self,
        admin_id: i64,
        role_id: Option<i64>,
        permission_ids: &[i64],
    ) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        match role_id {
            Some(role_id) => {
                sqlx::query(
                    r#"
                    INSERT INTO role_admins (admin_id, role_id) VALUES ($1, $2)
                    ON CONFLICT (admin_id) DO UPDATE SET role_id = EXCLUDED.role_id
                    "#,
                )
                .bind(admin_id)
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
            }
            None => {
                sqlx::query("DELETE FROM role_admins WHERE admin_id = $1")
                    .bind(admin_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        sqlx::query("DELETE FROM admin_permissions WHERE admin_id = $1")
            .bind(admin_id)
            .execute(&mut *tx)
            .await?;

        if !permission_ids.is_empty() {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO admin_permissions (admin_id, permission_id) ");
            builder.push_values(permission_ids, |mut row, permission_id| {
                row.push_bind(admin_id).push_bind(*permission_id);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await
    }
}

#[async_trait]
impl AdminLogRepository for PostgresRepository {
    async fn insert_log(&self, entry: NewAdminLog) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_log (admin_id, admin_name, route, param, ip, useragent)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.admin_id)
        .bind(entry.admin_name)
        .bind(entry.route)
        .bind(entry.param)
        .bind(entry.ip)
        .bind(entry.useragent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_logs(
        &self,
        filter: &AdminLogFilter,
        page: PageRequest,
    ) -> RepoResult<(Vec<AdminLog>, i64)> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM admin_log");
        if let Some(admin_id) = filter.admin_id {
            count.push(" WHERE admin_id = ");
            count.push_bind(admin_id);
        }
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM admin_log", LOG_COLUMNS));
        if let Some(admin_id) = filter.admin_id {
            builder.push(" WHERE admin_id = ");
            builder.push_bind(admin_id);
        }
        builder.push(format!(
            " ORDER BY {} {}, id DESC",
            filter.order_by.unwrap_or("id"),
            filter.order.as_sql()
        ));
        builder.push(" LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let rows = builder.build_query_as::<AdminLog>().fetch_all(&self.pool).await?;
        Ok((rows, total))
    }
}
