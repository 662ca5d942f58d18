pub mod booking;
pub mod event;
pub mod movie;
pub mod showtime;
pub mod ticket;
pub mod user;

pub use booking::{Booking, BookingStatus, ManualBookingInput};
pub use event::{Event, EventInput};
pub use movie::{Movie, MovieCategory, MovieInput};
pub use showtime::{Showtime, ShowtimeInput, ShowtimeStatus, ShowtimeUpdate};
pub use ticket::{Ticket, TicketStatus};
pub use user::{ProfilePictureInput, User, UserProfile, PROFILE_PICTURES};

use thiserror::Error;

/// Строка статуса из БД не совпала ни с одним вариантом.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status '{0}'")]
pub struct UnknownStatus(pub String);

// Счетчики мест в БД хранятся как INT
pub(crate) fn seat_count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
