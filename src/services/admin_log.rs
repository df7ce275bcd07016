use crate::{
    error::AppResult,
    models::{AdminLog, AdminLogFilter, AdminLogQuery, NewAdminLog},
    repository::AdminLogRepositoryState,
    response::{PageRequest, Paginated, SortOrder, sort_column},
};

/// Columns `admins-logs/lists` may be sorted by.
pub const LOG_SORT_FIELDS: &[&str] = &["id", "created_at", "admin_id"];

/// AdminLogService
///
/// Operation audit trail. Writing is best effort: a failed insert is logged
/// and otherwise ignored.
#[derive(Clone)]
pub struct AdminLogService {
    logs: AdminLogRepositoryState,
}

impl AdminLogService {
    pub fn new(logs: AdminLogRepositoryState) -> Self {
        Self { logs }
    }

    pub async fn record(&self, entry: NewAdminLog) {
        let route = entry.route.clone();
        let admin_id = entry.admin_id;
        if let Err(e) = self.logs.insert_log(entry).await {
            tracing::warn!(admin_id, route = %route, error = ?e, "failed to write admin log");
        }
    }

    pub async fn list(&self, query: &AdminLogQuery) -> AppResult<Paginated<AdminLog>> {
        let filter = AdminLogFilter {
            admin_id: query.admin_id,
            order_by: sort_column(query.sort_field.as_deref(), LOG_SORT_FIELDS),
            order: query
                .sort_order
                .as_deref()
                .map(SortOrder::parse)
                .unwrap_or_default(),
        };
        let page = PageRequest::new(query.page, query.page_size);
        let (rows, total) = self.logs.list_logs(&filter, page).await?;
        Ok(Paginated::new(rows, total, page.page, page.page_size))
    }
}
