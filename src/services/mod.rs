//! Business logic, one service per concern. Each service is a cheap `Clone`
//! handle over the repository trait objects it needs and is built once in
//! `main` (or by the test harness) and injected through `AppState`.

pub mod admin;
pub mod admin_log;
pub mod auth;
pub mod rbac;

pub use admin::AdminService;
pub use admin_log::AdminLogService;
pub use auth::AuthService;
pub use rbac::RbacService;
