use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use flyblue_core::catalog::FlightDetails;
use flyblue_core::models::{City, Flight, LuggageOption, Seat};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub origen: i64,
    pub destino: i64,
    pub fecha: NaiveDate,
}

/// Catalog reads; mounted behind the user middleware.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/ciudades", get(list_cities))
        .route("/v1/equipajes", get(list_luggage_options))
        .route("/v1/vuelos", get(search_flights))
        .route("/v1/vuelos/{id}", get(get_flight))
        .route("/v1/vuelos/{id}/asientos", get(list_seats))
        .route("/v1/vuelos/{id}/stream", get(seat_stream))
}

async fn list_cities(State(state): State<AppState>) -> Result<Json<Vec<City>>, AppError> {
    Ok(Json(state.service.list_cities().await?))
}

async fn list_luggage_options(State(state): State<AppState>) -> Result<Json<Vec<LuggageOption>>, AppError> {
    Ok(Json(state.service.list_luggage_options().await?))
}

async fn search_flights(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Flight>>, AppError> {
    let flights = state
        .service
        .search_flights(query.origen, query.destino, query.fecha)
        .await?;
    Ok(Json(flights))
}

async fn get_flight(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<FlightDetails>, AppError> {
    Ok(Json(state.service.get_flight(id).await?))
}

async fn list_seats(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Vec<Seat>>, AppError> {
    Ok(Json(state.service.list_seats(id).await?))
}

/// Live seat claims for one flight. Lagged receivers skip the missed events.
async fn seat_stream(
    State(state): State<AppState>,
    Path(flight_id): Path<i64>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    state.service.get_flight(flight_id).await?;

    let rx = state.seat_events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.flight_id == flight_id => Some(Event::default().event("seat_claimed").json_data(&event)),
            _ => None,
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
