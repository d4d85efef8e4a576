use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use flyblue_api::{app, AppState, JwtCredentials};
use flyblue_core::catalog::SeatGrid;
use flyblue_core::identity::BcryptHasher;
use flyblue_core::memory::MemoryDatabase;
use flyblue_core::BookingService;
use flyblue_shared::models::events::SeatClaimedEvent;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    admin_token: String,
    seat_events: broadcast::Sender<SeatClaimedEvent>,
}

async fn setup() -> TestApp {
    let service = BookingService::new(
        Arc::new(MemoryDatabase::new()),
        Arc::new(BcryptHasher::new(4)),
        Arc::new(JwtCredentials::new("test-secret", 3600).unwrap()),
        SeatGrid::default(),
    );
    service.ensure_admin("Root", "root@example.com", "rootpw").await.unwrap();

    let state = AppState::new(service, 16);
    let seat_events = state.seat_events.clone();
    let router = app(state);
    let (status, body) = send(&router, "POST", "/v1/auth/login", None, Some(json!({
        "email": "root@example.com",
        "password": "rootpw",
    })))
    .await;
    assert_eq!(status, StatusCode::OK);

    TestApp {
        router,
        admin_token: body["token"].as_str().unwrap().to_string(),
        seat_events,
    }
}

async fn send(router: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn register_and_login(app: &TestApp, name: &str, email: &str) -> (i64, String) {
    let (status, user) = send(&app.router, "POST", "/v1/auth/register", None, Some(json!({
        "name": name,
        "email": email,
        "password": "secret",
    })))
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, login) = send(&app.router, "POST", "/v1/auth/login", None, Some(json!({
        "email": email,
        "password": "secret",
    })))
    .await;
    assert_eq!(status, StatusCode::OK);
    (user["id"].as_i64().unwrap(), login["token"].as_str().unwrap().to_string())
}

/// Creates BOG, MIA, a 50.00 luggage option and a 300.00 flight. Returns (flight id, luggage id).
async fn seed_catalog(app: &TestApp) -> (i64, i64) {
    let token = Some(app.admin_token.as_str());
    let (_, bog) = send(&app.router, "POST", "/v1/admin/ciudades", token, Some(json!({"name": "Bogota", "code": "BOG"}))).await;
    let (_, mia) = send(&app.router, "POST", "/v1/admin/ciudades", token, Some(json!({"name": "Miami", "code": "MIA"}))).await;

    let (status, luggage) = send(&app.router, "POST", "/v1/admin/equipajes", token, Some(json!({
        "type": "checked",
        "price_cents": 5000,
        "description": "23kg bag",
        "max_weight_kg": 23,
    })))
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, flight) = send(&app.router, "POST", "/v1/admin/vuelos", token, Some(json!({
        "origin_city_id": bog["id"],
        "destination_city_id": mia["id"],
        "departure": "2025-06-01T08:00:00Z",
        "arrival": "2025-06-01T11:00:00Z",
        "base_price_cents": 30000,
    })))
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(flight["code"], "BOG-MIA-20250601");
    assert_eq!(flight["seats_created"], 100);

    (flight["id"].as_i64().unwrap(), luggage["id"].as_i64().unwrap())
}

#[tokio::test]
async fn test_reservation_and_payment_flow() {
    let app = setup().await;
    let (flight_id, luggage_id) = seed_catalog(&app).await;
    let (user_id, token) = register_and_login(&app, "Ana", "ana@example.com").await;
    let token = Some(token.as_str());

    let (status, seats) = send(&app.router, "GET", &format!("/v1/vuelos/{}/asientos", flight_id), token, None).await;
    assert_eq!(status, StatusCode::OK);
    let seats = seats.as_array().unwrap();
    assert_eq!(seats.len(), 100);
    assert!(seats.iter().all(|s| s["available"] == true));
    let seat_id = seats[0]["id"].as_i64().unwrap();

    let mut claims = app.seat_events.subscribe();
    let request = json!({
        "user_id": user_id,
        "flight_id": flight_id,
        "seat_id": seat_id,
        "luggage_option_id": luggage_id,
    });
    let (status, reservation) = send(&app.router, "POST", "/v1/cliente/reservas", token, Some(request.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reservation["total_cents"], 35000);

    let event = claims.try_recv().unwrap();
    assert_eq!(event.flight_id, flight_id);
    assert_eq!(event.seat_id, seat_id);

    let (status, _) = send(&app.router, "POST", "/v1/cliente/reservas", token, Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let reservation_id = reservation["id"].as_i64().unwrap();
    let pay_uri = format!("/v1/cliente/reservas/{}/pago", reservation_id);
    let (status, payment) = send(&app.router, "POST", &pay_uri, token, None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payment["status"], "paid");
    assert_eq!(payment["amount_cents"], 35000);

    let (status, _) = send(&app.router, "POST", &pay_uri, token, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, listed) = send(&app.router, "GET", &format!("/v1/cliente/reservas/{}", user_id), token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["flight"], "BOG-MIA-2025-06-01 08:00");

    let (_, details) = send(&app.router, "GET", &format!("/v1/vuelos/{}", flight_id), token, None).await;
    assert_eq!(details["available_seats"], 99);
    assert_eq!(details["origin_city"], "Bogota");
}

#[tokio::test]
async fn test_authorization_boundaries() {
    let app = setup().await;
    let (flight_id, luggage_id) = seed_catalog(&app).await;
    let (ana_id, ana_token) = register_and_login(&app, "Ana", "ana@example.com").await;
    let (_, ben_token) = register_and_login(&app, "Ben", "ben@example.com").await;

    let (status, _) = send(&app.router, "GET", "/v1/ciudades", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, "GET", "/v1/ciudades", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, "POST", "/v1/admin/ciudades", Some(ana_token.as_str()), Some(json!({"name": "Lima", "code": "LIM"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, seats) = send(&app.router, "GET", &format!("/v1/vuelos/{}/asientos", flight_id), Some(ben_token.as_str()), None).await;
    let (status, _) = send(&app.router, "POST", "/v1/cliente/reservas", Some(ben_token.as_str()), Some(json!({
        "user_id": ana_id,
        "flight_id": flight_id,
        "seat_id": seats[0]["id"],
        "luggage_option_id": luggage_id,
    })))
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app.router, "GET", &format!("/v1/cliente/reservas/{}", ana_id), Some(ben_token.as_str()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, listed) = send(&app.router, "GET", &format!("/v1/cliente/reservas/{}", ana_id), Some(app.admin_token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn test_identity_endpoints() {
    let app = setup().await;
    let (user_id, token) = register_and_login(&app, "Ana", "ana@example.com").await;

    let (status, me) = send(&app.router, "GET", "/v1/auth/me", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user_id);
    assert_eq!(me["role"], "user");
    assert!(me.get("password_hash").is_none());

    let (status, _) = send(&app.router, "POST", "/v1/auth/register", None, Some(json!({
        "name": "Ana Again",
        "email": "ANA@example.com",
        "password": "secret",
    })))
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app.router, "POST", "/v1/auth/login", None, Some(json!({
        "email": "ana@example.com",
        "password": "wrong",
    })))
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, "POST", "/v1/auth/login", None, Some(json!({
        "email": "nobody@example.com",
        "password": "secret",
    })))
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_catalog_search_and_not_found() {
    let app = setup().await;
    let (flight_id, _) = seed_catalog(&app).await;
    let (_, token) = register_and_login(&app, "Ana", "ana@example.com").await;
    let token = Some(token.as_str());

    let (_, cities) = send(&app.router, "GET", "/v1/ciudades", token, None).await;
    let bog = cities[0]["id"].as_i64().unwrap();
    let mia = cities[1]["id"].as_i64().unwrap();

    let uri = format!("/v1/vuelos?origen={}&destino={}&fecha=2025-06-01", bog, mia);
    let (status, found) = send(&app.router, "GET", &uri, token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found[0]["id"], flight_id);

    let uri = format!("/v1/vuelos?origen={}&destino={}&fecha=2025-06-02", bog, mia);
    let (_, none) = send(&app.router, "GET", &uri, token, None).await;
    assert_eq!(none, json!([]));

    let (_, luggage) = send(&app.router, "GET", "/v1/equipajes", token, None).await;
    assert_eq!(luggage[0]["type"], "checked");

    let (status, _) = send(&app.router, "GET", "/v1/vuelos/9999", token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app.router, "GET", "/v1/vuelos/9999/stream", token, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app.router, "POST", "/v1/admin/vuelos", Some(app.admin_token.as_str()), Some(json!({
        "origin_city_id": bog,
        "destination_city_id": 4040,
        "departure": "2025-06-01T08:00:00Z",
        "arrival": "2025-06-01T11:00:00Z",
        "base_price_cents": 30000,
    })))
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app.router, "POST", "/v1/admin/vuelos", Some(app.admin_token.as_str()), Some(json!({
        "origin_city_id": bog,
        "destination_city_id": mia,
        "departure": "2025-06-01T08:00:00Z",
        "arrival": "2025-06-01T11:00:00Z",
        "base_price_cents": 10_000_000_000i64,
    })))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
