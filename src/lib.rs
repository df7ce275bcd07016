use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware::from_fn_with_state,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod memory;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod response;
pub mod services;
pub mod tree;

// Routers grouped by the access layer in front of them.
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use auth::TokenService;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use memory::MemoryRepository;
pub use repository::{
    AdminLogRepository, AdminLogRepositoryState, AdminRepository, AdminRepositoryState,
    PostgresRepository, RbacRepository, RbacRepositoryState,
};
pub use services::{AdminLogService, AdminService, AuthService, RbacService};

/// ApiDoc
///
/// OpenAPI document for every handler annotated with `#[utoipa::path]`,
/// served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::login, handlers::auth::logout, handlers::auth::refresh,
        handlers::auth::menus,
        handlers::account::detail, handlers::account::update_password,
        handlers::account::update_account,
        handlers::admins::create, handlers::admins::delete, handlers::admins::update_password,
        handlers::admins::update_status, handlers::admins::lists,
        handlers::admin_logs::lists,
        handlers::rbac::roles, handlers::rbac::create_role, handlers::rbac::edit_role,
        handlers::rbac::delete_role, handlers::rbac::permissions,
        handlers::rbac::create_permission, handlers::rbac::edit_permission,
        handlers::rbac::delete_permission, handlers::rbac::give_role_permission,
        handlers::rbac::give_admin_permission, handlers::rbac::get_role_permission,
        handlers::rbac::get_admin_permission,
    ),
    components(
        schemas(
            models::Admin, models::Role, models::RoleOption, models::PermissionNode,
            models::AdminLog, models::LoginRequest, models::LoginResponse, models::AuthToken,
            models::AdminInfo, models::AccountDetail, models::AuthMenusResponse,
            models::RolePermissionsResponse, models::AdminPermissionsResponse,
            models::CreateAdminRequest, models::DeleteAdminRequest,
            models::UpdateAdminPasswordRequest, models::UpdateAdminStatusRequest,
            models::UpdateAccountPasswordRequest, models::UpdateAccountRequest,
            models::CreateRoleRequest, models::EditRoleRequest, models::DeleteRoleRequest,
            models::PermissionRequest, models::DeletePermissionRequest,
            models::GiveRolePermissionRequest, models::GiveAdminPermissionRequest,
        )
    ),
    tags(
        (name = "rbac-admin", description = "Admin console backend: auth, accounts, RBAC and audit log")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request may need, built once at startup and shared by every
/// request. Services are cheap `Clone` handles over shared repositories, so
/// cloning the state per request copies a handful of `Arc`s.
///
/// Handlers take the whole state through `State<AppState>`; middleware and the
/// `AuthAdmin` extractor pull single components through the `FromRef` impls
/// below.
#[derive(Clone)]
pub struct AppState {
    /// Admin store, read directly by the `AuthAdmin` extractor on every request
    /// (account lookup and token revocation checks).
    pub admin_repo: AdminRepositoryState,
    /// Login, logout and token rotation.
    pub auth: AuthService,
    /// Admin account management and the caller's own account.
    pub admins: AdminService,
    /// Roles, the permission hierarchy, grants and the route guard's checks.
    pub rbac: RbacService,
    /// Operation audit log.
    pub logs: AdminLogService,
    /// HS256 signer/verifier shared by `auth` and the extractor.
    pub tokens: TokenService,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// new
    ///
    /// Wires every service to one store implementing all repository traits:
    /// `PostgresRepository` in `main`, `MemoryRepository` in the tests.
    pub fn new<R>(config: AppConfig, repo: Arc<R>) -> Self
    where
        R: AdminRepository + RbacRepository + AdminLogRepository + 'static,
    {
        // 1. One store, viewed through each repository trait
        let admin_repo: AdminRepositoryState = repo.clone();
        let rbac_repo: RbacRepositoryState = repo.clone();
        let log_repo: AdminLogRepositoryState = repo;

        // 2. Token service from the configured secret and lifetime
        let tokens = TokenService::from_config(&config);

        // 3. Services over the shared repositories
        Self {
            auth: AuthService::new(admin_repo.clone(), tokens.clone()),
            admins: AdminService::new(admin_repo.clone(), config.bcrypt_cost),
            rbac: RbacService::new(rbac_repo, admin_repo.clone(), config.super_admin_id),
            logs: AdminLogService::new(log_repo),
            admin_repo,
            tokens,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors and middleware take only the component they need.

impl FromRef<AppState> for AdminRepositoryState {
    fn from_ref(app_state: &AppState) -> AdminRepositoryState {
        app_state.admin_repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(app_state: &AppState) -> TokenService {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for RbacService {
    fn from_ref(app_state: &AppState) -> RbacService {
        app_state.rbac.clone()
    }
}

impl FromRef<AppState> for AdminLogService {
    fn from_ref(app_state: &AppState) -> AdminLogService {
        app_state.logs.clone()
    }
}

/// create_router
///
/// Assembles the application's routing structure, applies the scoped access
/// layers and the global observability stack, and registers the state.
///
/// Per request, the layers run in this order: CORS, request id, trace span,
/// then for protected routes authentication, the permission guard (management
/// routes only), the audit log (mutations only) and finally the handler.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name used for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Guarded management routes
    // 2a. Mutations get the audit layer. It sits inside the guard, so rejected
    //     calls are never recorded.
    // 2b. The guard maps the matched route to its `perms` identifier and
    //     returns 403 when the caller's effective perms lack it.
    let guarded = admin::admin_routes()
        .merge(
            admin::admin_logged_routes()
                .route_layer(from_fn_with_state(state.clone(), middleware::audit_log)),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::require_permission,
        ));

    // 3. Authenticated routes
    // Everything below needs a valid, unrevoked token for an enabled account.
    // `auth_middleware` resolves the caller once and stores it in the request
    // extensions for the guard, the audit layer and the handlers.
    let protected = authenticated::authenticated_routes()
        .merge(
            authenticated::account_logged_routes()
                .route_layer(from_fn_with_state(state.clone(), middleware::audit_log)),
        )
        .merge(guarded)
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // 4. Base Router Assembly
    let base_router = Router::new()
        // Documentation: the generated OpenAPI document and Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public routes: login and health, no access layer.
        .merge(public::public_routes())
        .merge(protected)
        .with_state(state);

    // 5. Observability and Correlation Layers (outermost)
    base_router
        .layer(
            ServiceBuilder::new()
                // 5a. A fresh UUID `x-request-id` for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 5b. One span per request carrying that id; the response is
                //     logged with its latency.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 5c. The id is echoed back on the response.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 6. CORS
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span, tagged with the `x-request-id` set above so every
/// log line of one request correlates.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
