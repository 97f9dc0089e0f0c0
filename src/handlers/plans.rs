use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    errors::ServiceError,
    models::{all_plans, find_plan, MembershipPlan},
    services::pricing::TaxBreakdown,
    ApiResponse, AppState,
};

/// A plan plus the display-only tax split of its price.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlanView {
    #[serde(flatten)]
    pub plan: MembershipPlan,
    pub tax: TaxBreakdown,
}

fn view(state: &AppState, plan: &MembershipPlan) -> PlanView {
    PlanView {
        plan: plan.clone(),
        tax: TaxBreakdown::from_inclusive(plan.price.amount, state.gst_rate),
    }
}

/// List membership plans
#[utoipa::path(
    get,
    path = "/plans",
    responses((status = 200, description = "All plans", body = ApiResponse<Vec<PlanView>>)),
    tag = "Plans"
)]
pub async fn list_plans(State(state): State<AppState>) -> Json<ApiResponse<Vec<PlanView>>> {
    let plans = all_plans().iter().map(|p| view(&state, p)).collect();
    Json(ApiResponse::success(plans))
}

/// Get a membership plan by slug
#[utoipa::path(
    get,
    path = "/plans/{slug}",
    params(("slug" = String, Path, description = "Plan slug")),
    responses(
        (status = 200, description = "Plan", body = ApiResponse<PlanView>),
        (status = 404, description = "Unknown plan", body = crate::errors::ErrorResponse)
    ),
    tag = "Plans"
)]
pub async fn get_plan(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<PlanView>>, ServiceError> {
    let plan = find_plan(&slug).ok_or_else(|| ServiceError::NotFound(format!("plan {}", slug)))?;
    Ok(Json(ApiResponse::success(view(&state, plan))))
}

pub fn plan_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_plans))
        .route("/:slug", get(get_plan))
}
