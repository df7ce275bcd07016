//! Role-based access control.
//!
//! An admin's effective permission set is the union of the grants of their
//! (single, optional) role and their direct grants. Menus, perms strings and
//! the route guard are all derived from that set by pruning the full
//! hierarchy with `tree::filter_tree`; the configured super admin
//! short-circuits every check and sees the whole hierarchy.

use std::collections::{BTreeSet, HashSet};

use crate::{
    error::{AppError, AppResult},
    models::{
        AdminPermissionsResponse, PermissionInput, PermissionNode, PermissionType, Role, RoleInput,
        RolePermissionsResponse,
    },
    repository::{AdminRepositoryState, RbacRepositoryState},
    response::{PageRequest, Paginated},
    tree::{self, MenuRoute, PermissionTree, ROOT_PARENT_ID},
};

/// parse_permission_ids
///
/// Parses the console's comma-separated id list. Entries are trimmed, empty
/// entries dropped and duplicates removed keeping the first occurrence, so
/// `"7,7,,9"` yields `[7, 9]`.
///
/// # Errors
/// `Validation` for an entry that is not a positive integer.
pub fn parse_permission_ids(raw: &str) -> AppResult<Vec<i64>> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let id = entry
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| AppError::validation(format!("invalid permission id {:?}", entry)))?;
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn ensure_depth(depth: usize) -> AppResult<()> {
    if depth > tree::MAX_DEPTH {
        return Err(AppError::MalformedHierarchy(format!(
            "permissions may be nested at most {} levels deep",
            tree::MAX_DEPTH
        )));
    }
    Ok(())
}

/// RbacService
#[derive(Clone)]
pub struct RbacService {
    rbac: RbacRepositoryState,
    admins: AdminRepositoryState,
    super_admin_id: Option<i64>,
}

impl RbacService {
    pub fn new(
        rbac: RbacRepositoryState,
        admins: AdminRepositoryState,
        super_admin_id: Option<i64>,
    ) -> Self {
        Self {
            rbac,
            admins,
            super_admin_id,
        }
    }

    pub fn is_super_admin(&self, admin_id: i64) -> bool {
        self.super_admin_id == Some(admin_id)
    }

    // --- Effective permissions ---

    /// Role grants plus direct grants of `admin_id`.
    pub async fn effective_permission_ids(&self, admin_id: i64) -> AppResult<HashSet<i64>> {
        let mut ids: HashSet<i64> = self
            .rbac
            .admin_permission_ids(admin_id)
            .await?
            .into_iter()
            .collect();
        if let Some(role_id) = self.rbac.admin_role_id(admin_id).await? {
            ids.extend(self.rbac.role_permission_ids(role_id).await?);
        }
        Ok(ids)
    }

    /// The full hierarchy pruned to what `admin_id` may see: every granted node
    /// plus its ancestors. The super admin keeps the whole tree.
    pub async fn get_auth_tree(&self, admin_id: i64) -> AppResult<Vec<PermissionTree>> {
        let full = self.get_perms_tree().await?;
        if self.is_super_admin(admin_id) {
            return Ok(full);
        }
        let granted = self.effective_permission_ids(admin_id).await?;
        Ok(tree::filter_tree(full, &granted))
    }

    /// get_auth_menus
    ///
    /// The directory and menu nodes of the admin's pruned tree, in pre-order. A
    /// granted action therefore makes the menu holding it visible.
    pub async fn get_auth_menus(&self, admin_id: i64) -> AppResult<Vec<PermissionNode>> {
        let visible = self.get_auth_tree(admin_id).await?;
        Ok(tree::flatten_tree(&visible)
            .into_iter()
            .filter(|n| n.kind.is_navigable())
            .collect())
    }

    /// The admin's pruned tree mapped onto frontend routes; `menu_routes` drops
    /// the action nodes.
    pub async fn get_auth_menu_routes(&self, admin_id: i64) -> AppResult<Vec<MenuRoute>> {
        let visible = self.get_auth_tree(admin_id).await?;
        Ok(tree::menu_routes(&visible))
    }

    /// get_auth_perms
    ///
    /// Sorted, distinct, non-empty `perms` strings of the admin's action grants.
    pub async fn get_auth_perms(&self, admin_id: i64) -> AppResult<Vec<String>> {
        let all = self.rbac.all_permissions().await?;
        let granted = if self.is_super_admin(admin_id) {
            None
        } else {
            Some(self.effective_permission_ids(admin_id).await?)
        };

        let perms: BTreeSet<String> = all
            .into_iter()
            .filter(|n| n.kind == PermissionType::Action && !n.perms.is_empty())
            .filter(|n| granted.as_ref().is_none_or(|ids| ids.contains(&n.id)))
            .map(|n| n.perms)
            .collect();
        Ok(perms.into_iter().collect())
    }

    /// Whether `admin_id` holds the `perms` identifier `perm`.
    pub async fn has_perm(&self, admin_id: i64, perm: &str) -> AppResult<bool> {
        if self.is_super_admin(admin_id) {
            return Ok(true);
        }
        Ok(self.get_auth_perms(admin_id).await?.iter().any(|p| p == perm))
    }

    /// The whole hierarchy, unfiltered.
    pub async fn get_perms_tree(&self) -> AppResult<Vec<PermissionTree>> {
        let all = self.rbac.all_permissions().await?;
        tree::build_tree(&all, ROOT_PARENT_ID)
    }

    /// The full tree plus the ids granted to `role_id`, for the grant dialog.
    pub async fn role_permissions(&self, role_id: i64) -> AppResult<RolePermissionsResponse> {
        self.require_role(role_id).await?;
        Ok(RolePermissionsResponse {
            permissions: self.get_perms_tree().await?,
            role_perms: self.rbac.role_permission_ids(role_id).await?,
        })
    }

    /// Everything the "assign role" dialog needs for `admin_id`.
    pub async fn admin_permissions(&self, admin_id: i64) -> AppResult<AdminPermissionsResponse> {
        if self.admins.find_admin(admin_id).await?.is_none() {
            return Err(AppError::not_found(format!("Admin {} does not exist", admin_id)));
        }
        Ok(AdminPermissionsResponse {
            roles: self.rbac.all_roles().await?,
            perms: self.get_perms_tree().await?,
            admin_perms: self.rbac.admin_permission_ids(admin_id).await?,
            role_id: self.rbac.admin_role_id(admin_id).await?.unwrap_or(0),
        })
    }

    // --- Roles ---

    pub async fn roles(&self, page: PageRequest) -> AppResult<Paginated<Role>> {
        let (rows, total) = self.rbac.list_roles(page).await?;
        Ok(Paginated::new(rows, total, page.page, page.page_size))
    }

    async fn require_role(&self, role_id: i64) -> AppResult<Role> {
        self.rbac
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Role {} does not exist", role_id)))
    }

    pub async fn create_role(&self, input: RoleInput) -> AppResult<Role> {
        if self.rbac.find_role_by_name(&input.name).await?.is_some() {
            return Err(AppError::conflict(format!("Role {} already exists", input.name)));
        }
        let role = self.rbac.create_role(input).await?;
        tracing::info!(role_id = role.id, "role created");
        Ok(role)
    }

    pub async fn edit_role(&self, role_id: i64, input: RoleInput) -> AppResult<()> {
        self.require_role(role_id).await?;
        if let Some(other) = self.rbac.find_role_by_name(&input.name).await? {
            if other.id != role_id {
                return Err(AppError::conflict(format!("Role {} already exists", input.name)));
            }
        }
        self.rbac.update_role(role_id, input).await?;
        Ok(())
    }

    /// delete_role
    ///
    /// With `cascade`, admins holding the role lose it; without, a role still in
    /// use is a `Conflict`.
    pub async fn delete_role(&self, role_id: i64, cascade: bool) -> AppResult<()> {
        self.require_role(role_id).await?;
        let holders = self.rbac.count_role_admins(role_id).await?;
        if holders > 0 && !cascade {
            return Err(AppError::conflict(format!(
                "Role is still assigned to {} admin(s)",
                holders
            )));
        }
        self.rbac.delete_role(role_id).await?;
        tracing::info!(role_id, detached = holders, "role deleted");
        Ok(())
    }

    // --- Permission nodes ---

    /// Flat listing of every node, ordered by `sort` then `id`.
    pub async fn permissions(&self) -> AppResult<Vec<PermissionNode>> {
        Ok(self.rbac.all_permissions().await?)
    }

    async fn require_permission(&self, id: i64) -> AppResult<PermissionNode> {
        self.rbac
            .find_permission(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Permission {} does not exist", id)))
    }

    async fn ensure_parent(&self, parent_id: i64) -> AppResult<()> {
        if parent_id != ROOT_PARENT_ID {
            self.require_permission(parent_id).await?;
        }
        Ok(())
    }

    /// create_permission
    ///
    /// The parent must exist (or be the root) and the new node may not sit
    /// deeper than `MAX_DEPTH`.
    pub async fn create_permission(&self, input: PermissionInput) -> AppResult<PermissionNode> {
        self.ensure_parent(input.parent_id).await?;
        let all = self.rbac.all_permissions().await?;
        ensure_depth(tree::depth_of(&all, input.parent_id) + 1)?;
        Ok(self.rbac.create_permission(input).await?)
    }

    /// edit_permission
    ///
    /// Rejects moving a node under itself or any of its descendants, and moves
    /// that would push any node of the subtree below `MAX_DEPTH`.
    pub async fn edit_permission(&self, id: i64, input: PermissionInput) -> AppResult<()> {
        self.require_permission(id).await?;
        self.ensure_parent(input.parent_id).await?;

        if input.parent_id == id {
            return Err(AppError::MalformedHierarchy(format!(
                "permission {} cannot be its own parent",
                id
            )));
        }
        let all = self.rbac.all_permissions().await?;
        if tree::descendants(&all, id).contains(&input.parent_id) {
            return Err(AppError::MalformedHierarchy(format!(
                "permission {} cannot move under its descendant {}",
                id, input.parent_id
            )));
        }
        ensure_depth(tree::depth_of(&all, input.parent_id) + tree::subtree_height(&all, id))?;

        self.rbac.update_permission(id, input).await?;
        Ok(())
    }

    /// delete_permission
    ///
    /// A node with children needs `cascade`, which removes the whole subtree and
    /// its grants in one transaction.
    pub async fn delete_permission(&self, id: i64, cascade: bool) -> AppResult<u64> {
        self.require_permission(id).await?;
        let all = self.rbac.all_permissions().await?;
        let below = tree::descendants(&all, id);
        if !below.is_empty() && !cascade {
            return Err(AppError::HasChildren(format!(
                "Permission {} still has {} child node(s)",
                id,
                below.len()
            )));
        }

        let mut ids: Vec<i64> = below.into_iter().collect();
        ids.push(id);
        let removed = self.rbac.delete_permissions(&ids).await?;
        tracing::info!(permission_id = id, removed, "permission deleted");
        Ok(removed)
    }

    // --- Grants ---

    async fn ensure_permissions_exist(&self, ids: &[i64]) -> AppResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let known: HashSet<i64> = self
            .rbac
            .all_permissions()
            .await?
            .into_iter()
            .map(|n| n.id)
            .collect();
        let missing: Vec<String> = ids
            .iter()
            .filter(|id| !known.contains(*id))
            .map(i64::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::not_found(format!(
                "Permission(s) {} do not exist",
                missing.join(",")
            )));
        }
        Ok(())
    }

    /// Replaces the role's grant set with `permissions` (comma-separated ids).
    pub async fn give_role_permission(&self, role_id: i64, permissions: &str) -> AppResult<Vec<i64>> {
        self.require_role(role_id).await?;
        let ids = parse_permission_ids(permissions)?;
        self.ensure_permissions_exist(&ids).await?;
        self.rbac.replace_role_permissions(role_id, &ids).await?;
        Ok(ids)
    }

    /// give_admin_role
    ///
    /// Replaces the admin's role (`0` clears it) and direct grants together.
    pub async fn give_admin_role(
        &self,
        admin_id: i64,
        role_id: i64,
        permissions: &str,
    ) -> AppResult<Vec<i64>> {
        if self.admins.find_admin(admin_id).await?.is_none() {
            return Err(AppError::not_found(format!("Admin {} does not exist", admin_id)));
        }
        let role = if role_id == 0 {
            None
        } else {
            Some(self.require_role(role_id).await?.id)
        };
        let ids = parse_permission_ids(permissions)?;
        self.ensure_permissions_exist(&ids).await?;
        self.rbac.replace_admin_grants(admin_id, role, &ids).await?;
        Ok(ids)
    }
}
