use chrono::Utc;
use tracing::{info, warn};

use crate::gate::Caller;
use crate::models::{NewPayment, Payment, PaymentStatus};
use crate::repository::Session;
use crate::{CoreError, CoreResult};

/// Records the payment of one of the caller's own reservations.
///
/// This is a ledger entry: the amount is the reservation's stored total and
/// the status is always `paid`. No processor is contacted.
pub async fn process_payment(session: &mut dyn Session, caller: &Caller, reservation_id: i64) -> CoreResult<Payment> {
    let reservation = session
        .find_reservation_for_user(reservation_id, caller.id)
        .await?
        .ok_or(CoreError::NotFound("reservation"))?;

    if session.find_payment(reservation.id).await?.is_some() {
        return Err(already_paid(reservation.id));
    }

    let payment = session
        .insert_payment(&NewPayment {
            reservation_id: reservation.id,
            amount_cents: reservation.total_cents,
            status: PaymentStatus::Paid,
            paid_at: Utc::now(),
        })
        .await?
        .ok_or_else(|| {
            warn!(reservation_id = reservation.id, "Concurrent payment won the insert");
            already_paid(reservation.id)
        })?;

    info!(
        payment_id = payment.id,
        reservation_id = reservation.id,
        amount_cents = payment.amount_cents,
        "Payment recorded"
    );
    Ok(payment)
}

fn already_paid(reservation_id: i64) -> CoreError {
    CoreError::Conflict(format!("reservation {} is already paid", reservation_id))
}
