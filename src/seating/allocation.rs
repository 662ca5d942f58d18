//! Переходы статусов мест при покупке и возврате.
//!
//! Обе функции чистые: (текущая карта, места) -> новая карта. Запись в
//! хранилище и контроль версии делает вызывающий код.

use super::{SeatMap, SeatRef, SeatStatus};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("no seats selected")]
    EmptySelection,

    #[error("seat {0} is requested more than once")]
    DuplicateSeat(SeatRef),

    #[error("seat {0} does not exist in this auditorium")]
    UnknownSeat(SeatRef),

    #[error("seat no longer available, please reselect ({})", join_seats(.seats))]
    SeatsUnavailable { seats: Vec<SeatRef> },
}

fn join_seats(seats: &[SeatRef]) -> String {
    seats.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Проверяет, что все места можно занять, не строя новую карту.
pub fn check_claim(map: &SeatMap, seats: &[SeatRef]) -> Result<(), AllocationError> {
    if seats.is_empty() {
        return Err(AllocationError::EmptySelection);
    }

    let mut seen = HashSet::with_capacity(seats.len());
    let mut unavailable = Vec::new();
    for seat in seats {
        if !seen.insert(*seat) {
            return Err(AllocationError::DuplicateSeat(*seat));
        }
        match map.status(*seat) {
            None => return Err(AllocationError::UnknownSeat(*seat)),
            Some(SeatStatus::Available) => {}
            Some(_) => unavailable.push(*seat),
        }
    }

    if unavailable.is_empty() {
        Ok(())
    } else {
        unavailable.sort();
        Err(AllocationError::SeatsUnavailable { seats: unavailable })
    }
}

/// Все или ничего: либо все места становятся `taken`, либо ошибка и
/// исходная карта не тронута.
pub fn claim_seats(map: &SeatMap, seats: &[SeatRef]) -> Result<SeatMap, AllocationError> {
    check_claim(map, seats)?;

    let mut next = map.clone();
    for seat in seats {
        next.set_status(*seat, SeatStatus::Taken)
            .map_err(|_| AllocationError::UnknownSeat(*seat))?;
    }
    Ok(next)
}

/// Возвращает занятые места в продажу. Места для колясок и уже свободные
/// не трогаются, неизвестные координаты пропускаются.
pub fn release_seats(map: &SeatMap, seats: &[SeatRef]) -> SeatMap {
    let mut next = map.clone();
    for seat in seats {
        if next.status(*seat) == Some(SeatStatus::Taken) {
            let _ = next.set_status(*seat, SeatStatus::Available);
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn claim_marks_every_requested_seat_taken() {
        let map = SeatMap::generate(8, 12);
        let seats = [SeatRef::new(2, 4), SeatRef::new(2, 5)];

        let next = claim_seats(&map, &seats).unwrap();

        assert_eq!(next.status(seats[0]), Some(SeatStatus::Taken));
        assert_eq!(next.status(seats[1]), Some(SeatStatus::Taken));
        assert_eq!(next.seats_available(), map.seats_available() - 2);
    }

    #[test]
    fn claim_is_all_or_nothing() {
        let mut map = SeatMap::generate(4, 4);
        map.set_status(SeatRef::new(1, 2), SeatStatus::Taken).unwrap();

        let err = claim_seats(&map, &[SeatRef::new(1, 1), SeatRef::new(1, 2)]).unwrap_err();

        assert_eq!(err, AllocationError::SeatsUnavailable { seats: vec![SeatRef::new(1, 2)] });
        assert_eq!(map.status(SeatRef::new(1, 1)), Some(SeatStatus::Available));
    }

    #[test]
    fn conflict_message_asks_to_reselect() {
        let err = AllocationError::SeatsUnavailable { seats: vec![SeatRef::new(3, 7)] };
        assert_eq!(err.to_string(), "seat no longer available, please reselect (3-7)");
    }

    #[test]
    fn malformed_requests_are_rejected() {
        let map = SeatMap::generate(2, 2);

        assert_eq!(claim_seats(&map, &[]), Err(AllocationError::EmptySelection));
        assert_eq!(
            claim_seats(&map, &[SeatRef::new(1, 1), SeatRef::new(1, 1)]),
            Err(AllocationError::DuplicateSeat(SeatRef::new(1, 1)))
        );
        assert_eq!(
            claim_seats(&map, &[SeatRef::new(3, 1)]),
            Err(AllocationError::UnknownSeat(SeatRef::new(3, 1)))
        );
    }

    #[test]
    fn release_leaves_handicap_seats_alone() {
        let map = claim_seats(&SeatMap::generate(2, 3), &[SeatRef::new(1, 1)]).unwrap();

        let released = release_seats(&map, &[SeatRef::new(1, 1), SeatRef::new(2, 3)]);

        assert_eq!(released.status(SeatRef::new(1, 1)), Some(SeatStatus::Available));
        assert_eq!(released.status(SeatRef::new(2, 3)), Some(SeatStatus::Handicap));
    }

    proptest! {
        #[test]
        fn overlapping_claims_cannot_both_apply(
            first in proptest::collection::btree_set((1u16..=5, 1u16..=5), 1..6),
            second in proptest::collection::btree_set((1u16..=5, 1u16..=5), 1..6),
        ) {
            let map = SeatMap::uniform(5, 5);
            let first: Vec<SeatRef> = first.into_iter().map(|(r, s)| SeatRef::new(r, s)).collect();
            let second: Vec<SeatRef> = second.into_iter().map(|(r, s)| SeatRef::new(r, s)).collect();

            let after_first = claim_seats(&map, &first).unwrap();
            let overlaps = second.iter().any(|s| first.contains(s));

            match claim_seats(&after_first, &second) {
                Ok(_) => prop_assert!(!overlaps),
                Err(AllocationError::SeatsUnavailable { .. }) => prop_assert!(overlaps),
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
        }
    }
}
