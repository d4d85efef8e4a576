use chrono::{DateTime, Utc};
use flyblue_shared::Masked;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{CoreError, CoreResult};

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(CoreError::ValidationError(format!("unknown role '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: Masked<String>,
    pub password_hash: Masked<String>,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Masked<String>,
    pub password_hash: Masked<String>,
    pub role: Role,
}

impl NewUser {
    /// `password_hash` must already be hashed; see [`crate::identity::PasswordHasher`].
    pub fn new(name: &str, email: &str, password_hash: String, role: Role) -> CoreResult<Self> {
        let name = required("name", name, 100)?;
        let email = normalize_email(email)?;
        Ok(Self {
            name,
            email: Masked(email),
            password_hash: Masked(password_hash),
            role,
        })
    }
}

pub fn normalize_email(email: &str) -> CoreResult<String> {
    let email = required("email", email, 100)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email.to_lowercase()),
        _ => Err(CoreError::ValidationError(format!("'{}' is not a valid email", email))),
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Upper bound for any catalog price, 99,999,999.99 in cents.
pub const MAX_PRICE_CENTS: i64 = 9_999_999_999;

/// Prices are whole cents in `0..=MAX_PRICE_CENTS`.
pub fn validate_price(field: &str, cents: i64) -> CoreResult<i64> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(CoreError::ValidationError(format!(
            "{} must be between 0 and {} cents",
            field, MAX_PRICE_CENTS
        )));
    }
    Ok(cents)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct City {
    pub id: i64,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct NewCity {
    pub name: String,
    pub code: String,
}

impl NewCity {
    pub fn new(name: &str, code: &str) -> CoreResult<Self> {
        Ok(Self {
            name: required("name", name, 100)?,
            code: required("code", code, 10)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LuggageOption {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub price_cents: i64,
    pub description: String,
    pub max_weight_kg: i32,
}

#[derive(Debug, Clone)]
pub struct NewLuggageOption {
    pub kind: String,
    pub price_cents: i64,
    pub description: String,
    pub max_weight_kg: i32,
}

impl NewLuggageOption {
    pub fn new(kind: &str, price_cents: i64, description: &str, max_weight_kg: i32) -> CoreResult<Self> {
        validate_price("price", price_cents)?;
        if max_weight_kg <= 0 {
            return Err(CoreError::ValidationError("max weight must be positive".into()));
        }
        Ok(Self {
            kind: required("type", kind, 20)?,
            price_cents,
            description: required("description", description, 100)?,
            max_weight_kg,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flight {
    pub id: i64,
    pub code: String,
    pub origin_city_id: i64,
    pub destination_city_id: i64,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    pub base_price_cents: i64,
}

/// Built by [`crate::catalog::create_flight`] once both cities are resolved.
#[derive(Debug, Clone)]
pub struct NewFlight {
    pub code: String,
    pub origin_city_id: i64,
    pub destination_city_id: i64,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    pub base_price_cents: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeatColumn {
    A,
    B,
    C,
    D,
    E,
}

impl SeatColumn {
    pub const ALL: [SeatColumn; 5] = [SeatColumn::A, SeatColumn::B, SeatColumn::C, SeatColumn::D, SeatColumn::E];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeatColumn::A => "A",
            SeatColumn::B => "B",
            SeatColumn::C => "C",
            SeatColumn::D => "D",
            SeatColumn::E => "E",
        }
    }
}

impl TryFrom<char> for SeatColumn {
    type Error = CoreError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        match c.to_ascii_uppercase() {
            'A' => Ok(SeatColumn::A),
            'B' => Ok(SeatColumn::B),
            'C' => Ok(SeatColumn::C),
            'D' => Ok(SeatColumn::D),
            'E' => Ok(SeatColumn::E),
            other => Err(CoreError::ValidationError(format!("seat column '{}' is not one of A-E", other))),
        }
    }
}

impl FromStr for SeatColumn {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => SeatColumn::try_from(c),
            _ => Err(CoreError::ValidationError(format!("seat column '{}' is not one of A-E", s))),
        }
    }
}

impl fmt::Display for SeatColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatPosition {
    pub row: i32,
    pub column: SeatColumn,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seat {
    pub id: i64,
    pub flight_id: i64,
    pub row: i32,
    pub column: SeatColumn,
    pub available: bool,
}

// ============================================================================
// Reservations & Payments
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    pub id: i64,
    pub user_id: i64,
    pub flight_id: i64,
    pub seat_id: i64,
    pub luggage_option_id: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone)]
pub struct NewReservation {
    pub user_id: i64,
    pub flight_id: i64,
    pub seat_id: i64,
    pub luggage_option_id: i64,
    pub total_cents: i64,
}

/// Reservation joined with its flight's route, as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationView {
    pub id: i64,
    pub origin_code: String,
    pub destination_code: String,
    pub departure: DateTime<Utc>,
    pub total_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservationSummary {
    pub id: i64,
    pub flight: String,
    pub departure: DateTime<Utc>,
    pub total_cents: i64,
}

impl From<ReservationView> for ReservationSummary {
    fn from(view: ReservationView) -> Self {
        Self {
            id: view.id,
            flight: format!(
                "{}-{}-{}",
                view.origin_code,
                view.destination_code,
                view.departure.format("%Y-%m-%d %H:%M")
            ),
            departure: view.departure,
            total_cents: view.total_cents,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(CoreError::ValidationError(format!("unknown payment status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: i64,
    pub reservation_id: i64,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub reservation_id: i64,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub paid_at: DateTime<Utc>,
}

fn required(field: &str, value: &str, max_len: usize) -> CoreResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::ValidationError(format!("{} must not be empty", field)));
    }
    if value.chars().count() > max_len {
        return Err(CoreError::ValidationError(format!("{} exceeds {} characters", field, max_len)));
    }
    Ok(value.to_string())
}
