use crate::{
    auth::{hash_password, verify_password},
    error::{AppError, AppResult},
    models::{
        AccountDetail, AccountProfile, Admin, AdminFilter, AdminListQuery, AdminStatus, NewAdmin,
    },
    repository::AdminRepositoryState,
    response::{PageRequest, Paginated, SortOrder, sort_column},
};

/// Columns `admins/lists` may be sorted by.
pub const ADMIN_SORT_FIELDS: &[&str] = &["id", "created_at", "last_login_time"];

/// Username of the account created by `ensure_bootstrap_admin`.
pub const BOOTSTRAP_USERNAME: &str = "admin";

/// AdminService
///
/// Account management for other admins plus the caller's own account page.
#[derive(Clone)]
pub struct AdminService {
    admins: AdminRepositoryState,
    bcrypt_cost: u32,
}

impl AdminService {
    pub fn new(admins: AdminRepositoryState, bcrypt_cost: u32) -> Self {
        Self {
            admins,
            bcrypt_cost,
        }
    }

    pub async fn create(&self, username: &str, password: &str, password2: &str) -> AppResult<Admin> {
        ensure_confirmed(password, password2)?;

        if self.admins.find_admin_by_username(username).await?.is_some() {
            return Err(AppError::conflict(format!(
                "Username {} is already taken",
                username
            )));
        }

        let admin = self
            .admins
            .create_admin(NewAdmin {
                username: username.to_string(),
                password: hash_password(password, self.bcrypt_cost)?,
                ..Default::default()
            })
            .await?;

        tracing::info!(admin_id = admin.id, "admin created");
        Ok(admin)
    }

    /// delete
    ///
    /// An admin can never delete their own account, whatever the target's state.
    pub async fn delete(&self, caller_id: i64, id: i64) -> AppResult<()> {
        if caller_id == id {
            return Err(AppError::conflict("You cannot delete your own account"));
        }
        if !self.admins.delete_admin(id).await? {
            return Err(AppError::not_found(format!("Admin {} does not exist", id)));
        }
        tracing::info!(admin_id = id, deleted_by = caller_id, "admin deleted");
        Ok(())
    }

    pub async fn update_password(&self, id: i64, password: &str, password2: &str) -> AppResult<()> {
        ensure_confirmed(password, password2)?;
        let hashed = hash_password(password, self.bcrypt_cost)?;
        if !self.admins.update_password(id, &hashed).await? {
            return Err(AppError::not_found(format!("Admin {} does not exist", id)));
        }
        Ok(())
    }

    pub async fn update_status(&self, id: i64, status: AdminStatus) -> AppResult<()> {
        if !self.admins.update_status(id, status).await? {
            return Err(AppError::not_found(format!("Admin {} does not exist", id)));
        }
        Ok(())
    }

    /// list
    ///
    /// `status` 0/1 filters, anything else (2 or absent) lists everyone. Unknown
    /// sort fields fall back to `id desc`.
    pub async fn list(&self, query: &AdminListQuery) -> AppResult<Paginated<Admin>> {
        let filter = AdminFilter {
            status: match query.status {
                Some(0) => Some(AdminStatus::Enabled),
                Some(1) => Some(AdminStatus::Disabled),
                _ => None,
            },
            order_by: sort_column(query.sort_field.as_deref(), ADMIN_SORT_FIELDS),
            order: query
                .sort_order
                .as_deref()
                .map(SortOrder::parse)
                .unwrap_or_default(),
        };
        let page = PageRequest::new(query.page, query.page_size);
        let (rows, total) = self.admins.list_admins(&filter, page).await?;
        Ok(Paginated::new(rows, total, page.page, page.page_size))
    }

    // --- Own account ---

    pub fn detail(&self, admin: &Admin) -> AccountDetail {
        AccountDetail {
            username: admin.username.clone(),
            nickname: admin.nickname.clone(),
            email: admin.email.clone(),
            avatar: admin.avatar.clone(),
            profile: String::new(),
        }
    }

    pub async fn update_account_password(
        &self,
        admin: &Admin,
        old_password: &str,
        password: &str,
        password2: &str,
    ) -> AppResult<()> {
        ensure_confirmed(password, password2)?;
        if !verify_password(old_password, &admin.password) {
            return Err(AppError::validation("The old password is incorrect"));
        }
        self.update_password(admin.id, password, password2).await
    }

    pub async fn update_account(&self, admin_id: i64, profile: AccountProfile) -> AppResult<()> {
        if !self.admins.update_profile(admin_id, profile).await? {
            return Err(AppError::not_found(format!("Admin {} does not exist", admin_id)));
        }
        Ok(())
    }

    /// ensure_bootstrap_admin
    ///
    /// Creates the `admin` account with `password` unless it already exists.
    /// Returns the created account, if any.
    pub async fn ensure_bootstrap_admin(&self, password: &str) -> AppResult<Option<Admin>> {
        if self
            .admins
            .find_admin_by_username(BOOTSTRAP_USERNAME)
            .await?
            .is_some()
        {
            return Ok(None);
        }
        self.create(BOOTSTRAP_USERNAME, password, password)
            .await
            .map(Some)
    }
}

fn ensure_confirmed(password: &str, password2: &str) -> AppResult<()> {
    if password != password2 {
        return Err(AppError::validation("passwords do not match"));
    }
    Ok(())
}
