use axum::{extract::State, http::StatusCode, routing::post, Extension, Json, Router};
use flyblue_core::catalog::{CreatedFlight, FlightRequest};
use flyblue_core::gate::Caller;
use flyblue_core::models::{City, LuggageOption, NewCity, NewLuggageOption};
use serde::Deserialize;

use crate::{error::AppError, state::AppState};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateCityRequest {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateLuggageRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub price_cents: i64,
    pub description: String,
    pub max_weight_kg: i32,
}

/// Catalog administration; mounted behind the admin middleware.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/ciudades", post(create_city))
        .route("/v1/admin/vuelos", post(create_flight))
        .route("/v1/admin/equipajes", post(create_luggage_option))
}

async fn create_city(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateCityRequest>,
) -> Result<(StatusCode, Json<City>), AppError> {
    let city = state.service.create_city(&caller, NewCity::new(&req.name, &req.code)?).await?;
    Ok((StatusCode::CREATED, Json(city)))
}

async fn create_luggage_option(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CreateLuggageRequest>,
) -> Result<(StatusCode, Json<LuggageOption>), AppError> {
    let option = NewLuggageOption::new(&req.kind, req.price_cents, &req.description, req.max_weight_kg)?;
    let option = state.service.create_luggage_option(&caller, option).await?;
    Ok((StatusCode::CREATED, Json(option)))
}

async fn create_flight(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<FlightRequest>,
) -> Result<(StatusCode, Json<CreatedFlight>), AppError> {
    let created = state.service.create_flight(&caller, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
