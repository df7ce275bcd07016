//! Router Module Index
//!
//! Routes are split by the access layer they sit behind. `create_router`
//! stacks the layers: authentication around `authenticated` and `admin`, the
//! permission guard around `admin`, and the audit log around every
//! `*_logged_routes` group.

/// Routes reachable without a token: login and the health probe.
pub mod public;

/// Routes that need a valid token but no specific permission.
pub mod authenticated;

/// Admin-account and RBAC management, each route mapped to a `perms` identifier.
pub mod admin;
