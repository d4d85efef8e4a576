use flyblue_core::BookingService;
use flyblue_shared::models::events::SeatClaimedEvent;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BookingService>,
    pub seat_events: broadcast::Sender<SeatClaimedEvent>,
}

impl AppState {
    pub fn new(service: BookingService, channel_capacity: usize) -> Self {
        let (seat_events, _) = broadcast::channel(channel_capacity);
        Self {
            service: Arc::new(service),
            seat_events,
        }
    }
}
