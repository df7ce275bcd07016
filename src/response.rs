use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;
use utoipa::ToSchema;

/// The envelope code for a successful call.
pub const SUCCESS_CODE: u16 = 200;

/// ApiResponse
///
/// Uniform JSON envelope returned by every endpoint: `{code, message, data}`.
/// `code == 200` is success; error envelopes are produced by `AppError`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: SUCCESS_CODE,
            message: "OK".to_string(),
            data,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            code: SUCCESS_CODE,
            message: message.into(),
            data,
        }
    }
}

impl ApiResponse<Value> {
    /// Success with an empty `data: []` payload, used by mutation endpoints.
    pub fn done(message: impl Into<String>) -> Self {
        Self::with_message(Value::Array(Vec::new()), message)
    }
}

/// Paginated
///
/// Page wrapper used by every list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Paginated<T> {
    pub rows: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub page_total: u32,
    pub total: i64,
}

impl<T> Paginated<T> {
    pub fn new(rows: Vec<T>, total: i64, page: u32, page_size: u32) -> Self {
        let page_total = if page_size == 0 || total <= 0 {
            0
        } else {
            ((total as u64).div_ceil(page_size as u64)) as u32
        };
        Self {
            rows,
            page,
            page_size,
            page_total,
            total,
        }
    }
}

/// Page bounds shared by the list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }
}

/// Maps the console's `sortOrder` values (`ascend` / `descend`) to SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "ascend" | "asc" => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Resolves a client-supplied sort field against a fixed column list.
/// Unknown fields are ignored so the listing falls back to its default order.
pub fn sort_column(field: Option<&str>, allowed: &[&'static str]) -> Option<&'static str> {
    let field = field?;
    allowed.iter().copied().find(|column| *column == field)
}
