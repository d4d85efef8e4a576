use chrono::{DateTime, Utc};

/// Published after a reservation claims a seat.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct SeatClaimedEvent {
    pub flight_id: i64,
    pub seat_id: i64,
    pub reservation_id: i64,
    pub claimed_at: DateTime<Utc>,
}
