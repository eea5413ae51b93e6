//! `tandem serve`: a read-only JSON status API over the plan tree.
//!
//! Runs against the database directly (server-side trust, no per-identity
//! read rule), so a dashboard or a second screen can watch the plan
//! without holding a client identity.

use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;

use tandem_store::models::{TravelPlan, UserPointer};
use tandem_store::queries::{plans as plan_db, users as user_db};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PlanDetailResponse {
    #[serde(flatten)]
    pub plan: TravelPlan,
    /// How many of the plan's days are marked completed.
    pub days_completed: usize,
}

impl From<TravelPlan> for PlanDetailResponse {
    fn from(plan: TravelPlan) -> Self {
        let days_completed = plan.daily_plans.values().filter(|d| d.completed).count();
        Self {
            plan,
            days_completed,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(pool: PgPool) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/plans", get(list_plans))
        .route("/api/plans/{id}", get(get_plan_detail))
        .route("/api/users/{identity}", get(get_user_pointer))
        .layer(CorsLayer::permissive())
        .with_state(pool)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(pool: PgPool, bind: &str, port: u16) -> Result<()> {
    let app = build_router(pool);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("tandem serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("tandem serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index(State(pool): State<PgPool>) -> Result<Html<String>, AppError> {
    let plans = plan_db::list_plans(&pool).await.map_err(AppError::internal)?;

    let rows = if plans.is_empty() {
        "<tr><td colspan=\"3\">No plans found.</td></tr>".to_string()
    } else {
        plans
            .iter()
            .map(|p| {
                format!(
                    "<tr><td><a href=\"/api/plans/{id}\">{id}</a></td><td>{members}</td><td>{days}</td></tr>",
                    id = p.id,
                    members = p.members.join(", "),
                    days = p.total_days,
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let html = format!(
        "<!doctype html><html><head><title>tandem</title></head><body>\
         <h1>Travel plans</h1>\
         <table border=\"1\" cellpadding=\"4\">\
         <tr><th>Plan</th><th>Members</th><th>Days</th></tr>\
         {rows}\
         </table></body></html>"
    );
    Ok(Html(html))
}

async fn list_plans(State(pool): State<PgPool>) -> Result<Json<Vec<TravelPlan>>, AppError> {
    let plans = plan_db::list_plans(&pool).await.map_err(AppError::internal)?;
    Ok(Json(plans))
}

async fn get_plan_detail(
    State(pool): State<PgPool>,
    Path(id): Path<String>,
) -> Result<Json<PlanDetailResponse>, AppError> {
    let plan = plan_db::get_plan(&pool, &id)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(format!("plan {id} not found")))?;

    Ok(Json(PlanDetailResponse::from(plan)))
}

async fn get_user_pointer(
    State(pool): State<PgPool>,
    Path(identity): Path<String>,
) -> Result<Json<UserPointer>, AppError> {
    let pointer = user_db::get_user_pointer(&pool, &identity)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::not_found(format!("{identity} has no plan")))?;

    Ok(Json(pointer))
}
