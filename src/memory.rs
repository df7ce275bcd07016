use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    models::{
        AccountProfile, Admin, AdminFilter, AdminLog, AdminLogFilter, AdminStatus, NewAdmin,
        NewAdminLog, PermissionInput, PermissionNode, Role, RoleInput, RoleOption,
    },
    repository::{AdminLogRepository, AdminRepository, RbacRepository, RepoResult},
    response::{PageRequest, SortOrder},
};

#[derive(Default)]
struct Tables {
    admins: BTreeMap<i64, Admin>,
    roles: BTreeMap<i64, Role>,
    permissions: BTreeMap<i64, PermissionNode>,
    role_permissions: HashMap<i64, BTreeSet<i64>>,
    // admin id -> role id
    role_admins: HashMap<i64, i64>,
    admin_permissions: HashMap<i64, BTreeSet<i64>>,
    logs: Vec<AdminLog>,
    // jti -> expiry
    revoked_tokens: HashMap<Uuid, DateTime<Utc>>,
    next_admin_id: i64,
    next_role_id: i64,
    next_permission_id: i64,
    next_log_id: i64,
}

impl Tables {
    fn next_id(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }
}

/// MemoryRepository
///
/// In-process implementation of every repository trait, used by the test suite
/// and for running the router without a database. All tables live behind one
/// mutex so multi-table operations are atomic like their Postgres counterparts.
pub struct MemoryRepository {
    tables: Mutex<Tables>,
    /// When true, `insert_log` fails with a simulated store error.
    pub fail_log_writes: bool,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            fail_log_writes: false,
        }
    }

    pub fn new_failing_logs() -> Self {
        Self {
            fail_log_writes: true,
            ..Self::new()
        }
    }

    /// Loads permission rows as-is, keeping their ids.
    pub fn with_permissions(self, nodes: Vec<PermissionNode>) -> Self {
        if let Ok(mut tables) = self.tables.lock() {
            for node in nodes {
                tables.next_permission_id = tables.next_permission_id.max(node.id);
                tables.permissions.insert(node.id, node);
            }
        }
        self
    }

    /// Snapshot of every stored audit record, oldest first.
    pub fn logs(&self) -> Vec<AdminLog> {
        self.tables
            .lock()
            .map(|tables| tables.logs.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| sqlx::Error::Protocol("memory store lock poisoned".to_string()))
    }
}

fn page_of<T: Clone>(rows: &[T], page: PageRequest) -> Vec<T> {
    rows.iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .cloned()
        .collect()
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

#[async_trait]
impl AdminRepository for MemoryRepository {
    async fn find_admin(&self, id: i64) -> RepoResult<Option<Admin>> {
        Ok(self.lock()?.admins.get(&id).cloned())
    }

    async fn find_admin_by_username(&self, username: &str) -> RepoResult<Option<Admin>> {
        Ok(self
            .lock()?
            .admins
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn create_admin(&self, admin: NewAdmin) -> RepoResult<Admin> {
        let mut tables = self.lock()?;
        if tables.admins.values().any(|a| a.username == admin.username) {
            return Err(sqlx::Error::Protocol(format!(
                "duplicate username {}",
                admin.username
            )));
        }
        let now = Utc::now();
        let id = Tables::next_id(&mut tables.next_admin_id);
        let row = Admin {
            id,
            username: admin.username,
            password: admin.password,
            nickname: admin.nickname,
            email: admin.email,
            avatar: admin.avatar,
            status: AdminStatus::Enabled,
            last_login_time: None,
            last_login_ip: String::new(),
            created_at: now,
            updated_at: now,
        };
        tables.admins.insert(id, row.clone());
        Ok(row)
    }

    async fn delete_admin(&self, id: i64) -> RepoResult<bool> {
        let mut tables = self.lock()?;
        tables.role_admins.remove(&id);
        tables.admin_permissions.remove(&id);
        Ok(tables.admins.remove(&id).is_some())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepoResult<bool> {
        let mut tables = self.lock()?;
        Ok(match tables.admins.get_mut(&id) {
            Some(admin) => {
                admin.password = password_hash.to_string();
                admin.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn update_status(&self, id: i64, status: AdminStatus) -> RepoResult<bool> {
        let mut tables = self.lock()?;
        Ok(match tables.admins.get_mut(&id) {
            Some(admin) => {
                admin.status = status;
                admin.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn update_profile(&self, id: i64, profile: AccountProfile) -> RepoResult<bool> {
        let mut tables = self.lock()?;
        Ok(match tables.admins.get_mut(&id) {
            Some(admin) => {
                admin.email = profile.email;
                admin.avatar = profile.avatar;
                admin.nickname = profile.nickname;
                admin.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>, ip: &str) -> RepoResult<()> {
        if let Some(admin) = self.lock()?.admins.get_mut(&id) {
            admin.last_login_time = Some(at);
            admin.last_login_ip = ip.to_string();
        }
        Ok(())
    }

    async fn list_admins(
        &self,
        filter: &AdminFilter,
        page: PageRequest,
    ) -> RepoResult<(Vec<Admin>, i64)> {
        let tables = self.lock()?;
        let mut rows: Vec<Admin> = tables
            .admins
            .values()
            .filter(|a| filter.status.is_none_or(|s| a.status == s))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let primary = match filter.order_by.unwrap_or("id") {
                "created_at" => a.created_at.cmp(&b.created_at),
                "last_login_time" => a.last_login_time.cmp(&b.last_login_time),
                _ => a.id.cmp(&b.id),
            };
            directed(primary, filter.order).then_with(|| b.id.cmp(&a.id))
        });

        Ok((page_of(&rows, page), rows.len() as i64))
    }

    async fn revoke_token(
        &self,
        jti: Uuid,
        _admin_id: i64,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        let mut tables = self.lock()?;
        let now = Utc::now();
        tables.revoked_tokens.retain(|_, expiry| *expiry >= now);
        tables.revoked_tokens.insert(jti, expires_at);
        Ok(())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> RepoResult<bool> {
        Ok(self.lock()?.revoked_tokens.contains_key(&jti))
    }
}

#[async_trait]
impl RbacRepository for MemoryRepository {
    async fn all_permissions(&self) -> RepoResult<Vec<PermissionNode>> {
        let mut nodes: Vec<PermissionNode> = self.lock()?.permissions.values().cloned().collect();
        nodes.sort_by_key(|n| (n.sort, n.id));
        Ok(nodes)
    }

    async fn find_permission(&self, id: i64) -> RepoResult<Option<PermissionNode>> {
        Ok(self.lock()?.permissions.get(&id).cloned())
    }

    async fn create_permission(&self, input: PermissionInput) -> RepoResult<PermissionNode> {
        let mut tables = self.lock()?;
        let id = Tables::next_id(&mut tables.next_permission_id);
        let node = PermissionNode {
            id,
            parent_id: input.parent_id,
            kind: input.kind,
            title: input.title,
            path: input.path,
            component: input.component,
            perms: input.perms,
            icon: input.icon,
            sort: input.sort,
            hidden: input.hidden,
            is_frame: input.is_frame,
        };
        tables.permissions.insert(id, node.clone());
        Ok(node)
    }

    async fn update_permission(&self, id: i64, input: PermissionInput) -> RepoResult<bool> {
        let mut tables = self.lock()?;
        Ok(match tables.permissions.get_mut(&id) {
            Some(node) => {
                node.parent_id = input.parent_id;
                node.kind = input.kind;
                node.title = input.title;
                node.path = input.path;
                node.component = input.component;
                node.perms = input.perms;
                node.icon = input.icon;
                node.sort = input.sort;
                node.hidden = input.hidden;
                node.is_frame = input.is_frame;
                true
            }
            None => false,
        })
    }

    async fn delete_permissions(&self, ids: &[i64]) -> RepoResult<u64> {
        let mut tables = self.lock()?;
        for grants in tables.role_permissions.values_mut() {
            grants.retain(|id| !ids.contains(id));
        }
        for grants in tables.admin_permissions.values_mut() {
            grants.retain(|id| !ids.contains(id));
        }
        Ok(ids
            .iter()
            .filter(|id| tables.permissions.remove(*id).is_some())
            .count() as u64)
    }

    async fn list_roles(&self, page: PageRequest) -> RepoResult<(Vec<Role>, i64)> {
        let tables = self.lock()?;
        let rows: Vec<Role> = tables.roles.values().rev().cloned().collect();
        Ok((page_of(&rows, page), rows.len() as i64))
    }

    async fn all_roles(&self) -> RepoResult<Vec<RoleOption>> {
        Ok(self
            .lock()?
            .roles
            .values()
            .map(|r| RoleOption {
                id: r.id,
                display_name: r.display_name.clone(),
            })
            .collect())
    }

    async fn find_role(&self, id: i64) -> RepoResult<Option<Role>> {
        Ok(self.lock()?.roles.get(&id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> RepoResult<Option<Role>> {
        Ok(self.lock()?.roles.values().find(|r| r.name == name).cloned())
    }

    async fn create_role(&self, input: RoleInput) -> RepoResult<Role> {
        let mut tables = self.lock()?;
        let now = Utc::now();
        let id = Tables::next_id(&mut tables.next_role_id);
        let role = Role {
            id,
            name: input.name,
            display_name: input.display_name,
            description: input.description,
            created_at: now,
            updated_at: now,
        };
        tables.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn update_role(&self, id: i64, input: RoleInput) -> RepoResult<bool> {
        let mut tables = self.lock()?;
        Ok(match tables.roles.get_mut(&id) {
            Some(role) => {
                role.name = input.name;
                role.display_name = input.display_name;
                role.description = input.description;
                role.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn delete_role(&self, id: i64) -> RepoResult<bool> {
        let mut tables = self.lock()?;
        tables.role_admins.retain(|_, role_id| *role_id != id);
        tables.role_permissions.remove(&id);
        Ok(tables.roles.remove(&id).is_some())
    }

    async fn count_role_admins(&self, role_id: i64) -> RepoResult<i64> {
        Ok(self
            .lock()?
            .role_admins
            .values()
            .filter(|r| **r == role_id)
            .count() as i64)
    }

    async fn role_permission_ids(&self, role_id: i64) -> RepoResult<Vec<i64>> {
        Ok(self
            .lock()?
            .role_permissions
            .get(&role_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn admin_role_id(&self, admin_id: i64) -> RepoResult<Option<i64>> {
        Ok(self.lock()?.role_admins.get(&admin_id).copied())
    }

    async fn admin_permission_ids(&self, admin_id: i64) -> RepoResult<Vec<i64>> {
        Ok(self
            .lock()?
            .admin_permissions
            .get(&admin_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn replace_role_permissions(&self, role_id: i64, permission_ids: &[i64]) -> RepoResult<()> {
        self.lock()?
            .role_permissions
            .insert(role_id, permission_ids.iter().copied().collect());
        Ok(())
    }

    async fn replace_admin_grants(
        &self,
        admin_id: i64,
        role_id: Option<i64>,
        permission_ids: &[i64],
    ) -> RepoResult<()> {
        let mut tables = self.lock()?;
        match role_id {
            Some(role_id) => tables.role_admins.insert(admin_id, role_id),
            None => tables.role_admins.remove(&admin_id),
        };
        tables
            .admin_permissions
            .insert(admin_id, permission_ids.iter().copied().collect());
        Ok(())
    }
}

#[async_trait]
impl AdminLogRepository for MemoryRepository {
    async fn insert_log(&self, entry: NewAdminLog) -> RepoResult<()> {
        if self.fail_log_writes {
            return Err(sqlx::Error::Protocol("simulated log write failure".to_string()));
        }
        let mut tables = self.lock()?;
        let id = Tables::next_id(&mut tables.next_log_id);
        tables.logs.push(AdminLog {
            id,
            admin_id: entry.admin_id,
            admin_name: entry.admin_name,
            route: entry.route,
            param: entry.param,
            ip: entry.ip,
            useragent: entry.useragent,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_logs(
        &self,
        filter: &AdminLogFilter,
        page: PageRequest,
    ) -> RepoResult<(Vec<AdminLog>, i64)> {
        let tables = self.lock()?;
        let mut rows: Vec<AdminLog> = tables
            .logs
            .iter()
            .filter(|l| filter.admin_id.is_none_or(|id| l.admin_id == id))
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let primary = match filter.order_by.unwrap_or("id") {
                "created_at" => a.created_at.cmp(&b.created_at),
                "admin_id" => a.admin_id.cmp(&b.admin_id),
                _ => a.id.cmp(&b.id),
            };
            directed(primary, filter.order).then_with(|| b.id.cmp(&a.id))
        });

        Ok((page_of(&rows, page), rows.len() as i64))
    }
}
