//! Покупка билетов покупателем.
//!
//! Порядок оформления: проверить выбор по свежей карте, провести оплату,
//! занять места по CAS. Если после оплаты места ушли другому покупателю,
//! оплата возвращается, а клиент получает конфликт и выбирает заново.

use crate::error::AppError;
use crate::models::{Booking, BookingStatus, Ticket, TicketStatus};
use crate::seating::allocation::check_claim;
use crate::seating::{SeatRef, SeatSelection};
use crate::services::allocation::{Allocation, BookingDraft, SeatAllocator};
use crate::services::payment::{
    CardDetails, PaymentError, PaymentOutcome, PaymentProcessor, PaymentRequest,
};
use crate::store::{BookingFilter, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

/// Покупатель из токена сессии.
#[derive(Debug, Clone)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub showtime_id: Uuid,
    #[validate(length(min = 1, message = "select at least one seat"))]
    pub seats: Vec<SeatRef>,
    #[validate(nested)]
    pub payment: CardDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub seats: Vec<SeatRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub showtime_id: Uuid,
    pub seats: Vec<SeatRef>,
    pub seat_count: usize,
    pub price_per_seat: i64,
    pub total_price: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Purchase {
    pub booking: Booking,
    pub ticket: Option<Ticket>,
}

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn Store>,
    allocator: SeatAllocator,
    payments: Arc<dyn PaymentProcessor>,
    currency: String,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn Store>,
        allocator: SeatAllocator,
        payments: Arc<dyn PaymentProcessor>,
        currency: String,
    ) -> Self {
        Self {
            store,
            allocator,
            payments,
            currency,
        }
    }

    /// Количество и сумма для кандидатного выбора по текущей карте.
    pub async fn quote(&self, showtime_id: Uuid, seats: &[SeatRef]) -> Result<Quote, AppError> {
        let showtime = self.allocator.load_showtime(showtime_id).await?;
        let selection = SeatSelection::from_seats(&showtime.seat_map, seats)?;
        Ok(Quote {
            showtime_id,
            seats: selection.seats(),
            seat_count: selection.count(),
            price_per_seat: showtime.price,
            total_price: selection.total_price(showtime.price),
        })
    }

    pub async fn checkout(
        &self,
        customer: &Customer,
        request: CheckoutRequest,
    ) -> Result<Purchase, AppError> {
        request.validate()?;
        let CheckoutRequest {
            showtime_id,
            seats,
            payment,
        } = request;

        let showtime = self.allocator.load_showtime(showtime_id).await?;
        if !showtime.is_on_sale() {
            return Err(AppError::Conflict("showtime is not on sale".into()));
        }
        // До оплаты: клиентская копия карты могла устареть
        check_claim(&showtime.seat_map, &seats)?;

        let movie = self
            .store
            .get_movie(showtime.movie_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("movie {}", showtime.movie_id)))?;

        let booking_id = Uuid::new_v4();
        let price_per_seat = showtime.price;
        let amount = price_per_seat.saturating_mul(seats.len() as i64);
        let payment_request = PaymentRequest {
            order_id: booking_id.to_string(),
            amount,
            currency: self.currency.clone(),
            description: format!("{} x {}", seats.len(), movie.title),
            email: Some(customer.email.clone()),
            card: payment,
        };

        let reference = match self.payments.authorize(&payment_request).await? {
            PaymentOutcome::Approved { reference } => reference,
            PaymentOutcome::Declined { reason } => {
                info!("Payment for booking {} declined: {}", booking_id, reason);
                return Err(PaymentError::Declined(reason).into());
            }
        };

        let draft = BookingDraft {
            booking_id,
            user_id: customer.id,
            user_name: customer.name.clone(),
            user_email: customer.email.clone(),
            movie,
            price_per_seat,
            status: BookingStatus::Paid,
            payment_reference: Some(reference.clone()),
            issue_ticket: true,
        };

        match self.allocator.claim(showtime, &seats, &draft).await {
            Ok(Allocation { booking, ticket }) => {
                info!(
                    "Booking {} paid: {} seats on showtime {}, total {}",
                    booking.id,
                    booking.seats.len(),
                    booking.showtime_id,
                    booking.total_price
                );
                Ok(Purchase { booking, ticket })
            }
            Err(err) => {
                warn!("Allocation failed after payment {}, refunding: {}", reference, err);
                if let Err(refund_err) = self.payments.refund(&reference, amount).await {
                    error!("Refund of payment {} failed: {}", reference, refund_err);
                }
                Err(err)
            }
        }
    }

    /// Отмена покупателем: места возвращаются в продажу, билеты аннулируются.
    pub async fn cancel(&self, customer: &Customer, booking_id: Uuid) -> Result<Booking, AppError> {
        let booking = self
            .store
            .get_booking(booking_id)
            .await?
            .filter(|b| b.user_id == customer.id)
            .ok_or_else(|| AppError::NotFound(format!("booking {}", booking_id)))?;
        if booking.status == BookingStatus::Refunded {
            return Err(AppError::Conflict("booking is already cancelled".into()));
        }

        let was_paid = booking.status == BookingStatus::Paid;
        let reference = booking.payment_reference.clone();
        let amount = booking.total_price;

        let cancelled = self
            .allocator
            .release(booking, BookingStatus::Refunded, Some(TicketStatus::Cancelled))
            .await?;

        if let (true, Some(reference)) = (was_paid, reference) {
            if let Err(e) = self.payments.refund(&reference, amount).await {
                error!("Refund for cancelled booking {} failed: {}", booking_id, e);
            }
        }
        Ok(cancelled)
    }

    pub async fn bookings(&self, customer: &Customer) -> Result<Vec<Booking>, AppError> {
        let filter = BookingFilter {
            showtime_id: None,
            user_id: Some(customer.id),
        };
        Ok(self.store.list_bookings(&filter).await?)
    }

    pub async fn tickets(&self, customer: &Customer) -> Result<Vec<Ticket>, AppError> {
        Ok(self.store.list_tickets(customer.id).await?)
    }

    pub async fn ticket(&self, customer: &Customer, ticket_id: Uuid) -> Result<Ticket, AppError> {
        self.store
            .get_ticket(ticket_id)
            .await?
            .filter(|t| t.user_id == customer.id)
            .ok_or_else(|| AppError::NotFound(format!("ticket {}", ticket_id)))
    }
}
