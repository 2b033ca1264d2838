use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use mailer::{GraphMailer, LogMailer, Mailer};
use query::{CalendarQuery, ControlQuery, UpcomingQuery};
use shared::{
    domain::{AuditLog, Control, EffectivenessBreakdown, KpiAggregate, User},
    protocol::{
        AddUsersRequest, AddUsersResponse, CalendarResponse, CallerResponse, ContactCard,
        ControlsPage, HealthResponse, IngestRequest, IngestResponse, MessageResponse,
        SendEmailRequest, SendEmailResponse, SyncProfileRequest, SyncProfileResponse,
        UpcomingResponse, UpdateRoleRequest,
    },
};
use storage::{seed, AdminStore, ControlStore, InMemoryAdminStore, SqliteAdminStore};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod app_state;
mod auth;
mod config;

use api::{admin, ApiContext};
use app_state::{reject, ApiResult, AppState};
use auth::{AuthProvider, Caller, DevAuthProvider, JwtAuthProvider};
use config::{load_settings, normalize_database_url, AuthMode, Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let state = build_state(&settings).await?;
    let app = build_router(Arc::new(state), &settings);

    let addr: SocketAddr = settings
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.bind_addr))?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_state(settings: &Settings) -> anyhow::Result<AppState> {
    let controls = ControlStore::new(seed::mock_controls(
        settings.mock_control_count,
        settings.mock_seed,
    ))?;
    info!(
        count = settings.mock_control_count,
        seed = settings.mock_seed,
        "loaded mock controls"
    );

    let admin: Arc<dyn AdminStore> = match settings.database_url.as_deref() {
        Some(raw) if !raw.trim().is_empty() => {
            let database_url = normalize_database_url(raw);
            let store = SqliteAdminStore::connect(&database_url)
                .await
                .map_err(|error| {
                    error!(
                        %database_url,
                        %error,
                        "failed to open SQLite database; verify parent directory exists and permissions are correct"
                    );
                    error
                })?;
            info!(%database_url, "admin directory backed by sqlite");
            Arc::new(store)
        }
        _ => {
            info!("admin directory held in memory");
            Arc::new(InMemoryAdminStore::seeded())
        }
    };

    let mailer: Arc<dyn Mailer> = match settings.mail.graph_config() {
        Some(graph) => {
            info!(from = %graph.from_address, "mail delivery through Microsoft Graph");
            Arc::new(GraphMailer::new(graph))
        }
        None => {
            warn!("mail credentials missing; emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let auth: Arc<dyn AuthProvider> = match settings.auth.mode {
        AuthMode::Dev => {
            warn!("dev authentication enabled; callers are identified by the x-user-email header");
            Arc::new(DevAuthProvider::new(
                admin.clone(),
                settings.auth.dev_default_email.clone(),
            ))
        }
        AuthMode::Jwt => {
            let secret = settings
                .auth
                .jwt_secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .context("auth.mode = \"jwt\" requires auth.jwt_secret")?;
            Arc::new(JwtAuthProvider::new(secret))
        }
    };

    Ok(AppState {
        api: ApiContext {
            controls,
            admin,
            mailer,
            dashboard_url: settings.dashboard_url.clone(),
        },
        auth,
    })
}

fn build_router(state: Arc<AppState>, settings: &Settings) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/controls", get(http_list_controls))
        .route("/controls/:id", get(http_get_control))
        .route("/kpis", get(http_kpis))
        .route("/kpis/breakdown", get(http_kpi_breakdown))
        .route("/calendar", get(http_calendar))
        .route("/calendar/upcoming", get(http_upcoming))
        .route("/me", get(me))
        .route("/admin/contacts", get(http_contacts))
        .route("/admin/support-contacts", get(http_support_contacts))
        .route("/admin/users", get(http_list_users).post(http_add_users))
        .route("/admin/users/:id/role", put(http_update_user_role))
        .route("/admin/users/:id", delete(http_remove_user))
        .route("/admin/sync-profile", post(http_sync_profile))
        .route("/admin/send-email", post(http_send_email))
        .route("/admin/logs", get(http_audit_logs))
        .route("/admin/ingest", post(http_ingest))
        .route("/admin/template", get(http_template))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(settings.max_ingest_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if settings.cors_origins.is_empty() {
        router
    } else {
        router.layer(build_cors_layer(&settings.cors_origins))
    }
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let mut parsed = Vec::new();
    for origin in origins {
        match HeaderValue::from_str(origin) {
            Ok(value) => parsed.push(value),
            Err(err) => warn!("ignoring invalid CORS origin '{origin}': {err}"),
        }
    }

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static(auth::DEV_EMAIL_HEADER),
        ])
        .allow_origin(parsed)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ok = match state.api.admin.health_check().await {
        Ok(()) => true,
        Err(error) => {
            warn!(%error, "admin store health check failed");
            false
        }
    };
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            ok,
            timestamp: Utc::now(),
        }),
    )
}

async fn http_list_controls(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ControlQuery>,
) -> Json<ControlsPage> {
    Json(api::list_controls(&state.api, &q))
}

async fn http_get_control(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Control>> {
    api::get_control(&state.api, &id).map(Json).map_err(reject)
}

async fn http_kpis(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ControlQuery>,
) -> Json<KpiAggregate> {
    Json(api::kpis(&state.api, &q))
}

async fn http_kpi_breakdown(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ControlQuery>,
) -> Json<EffectivenessBreakdown> {
    Json(api::kpi_breakdown(&state.api, &q))
}

async fn http_calendar(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CalendarQuery>,
) -> ApiResult<Json<CalendarResponse>> {
    api::calendar(&state.api, &q).map(Json).map_err(reject)
}

async fn http_upcoming(
    State(state): State<Arc<AppState>>,
    Query(q): Query<UpcomingQuery>,
) -> Json<UpcomingResponse> {
    Json(api::upcoming(&state.api, &q, Utc::now().date_naive()))
}

async fn me(caller: Caller) -> Json<CallerResponse> {
    Json(CallerResponse {
        email: caller.email,
        name: caller.name,
        role: caller.role,
    })
}

async fn http_contacts(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ContactCard>>> {
    admin::contacts(&state.api).await.map(Json).map_err(reject)
}

async fn http_support_contacts(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<ContactCard>>> {
    admin::support_contacts(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_list_users(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> ApiResult<Json<Vec<User>>> {
    admin::list_users(&state.api, &caller)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_add_users(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<AddUsersRequest>,
) -> ApiResult<Json<AddUsersResponse>> {
    admin::add_users(&state.api, &caller, req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_update_user_role(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<User>> {
    admin::update_user_role(&state.api, &caller, &id, req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_remove_user(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    admin::remove_user(&state.api, &caller, &id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_sync_profile(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<SyncProfileRequest>,
) -> ApiResult<Json<SyncProfileResponse>> {
    admin::sync_profile(&state.api, &caller, req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_send_email(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<SendEmailRequest>,
) -> ApiResult<Json<SendEmailResponse>> {
    admin::send_email(&state.api, &caller, req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_audit_logs(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> ApiResult<Json<Vec<AuditLog>>> {
    admin::list_audit_logs(&state.api, &caller)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_ingest(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<IngestRequest>,
) -> ApiResult<Json<IngestResponse>> {
    admin::ingest(&state.api, &caller, req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_template(caller: Caller) -> ApiResult<impl IntoResponse> {
    let csv = admin::template(&caller).map_err(reject)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", admin::TEMPLATE_FILENAME),
            ),
        ],
        csv,
    ))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
