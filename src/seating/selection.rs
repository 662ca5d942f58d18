use super::{SeatMap, SeatRef, SeatStatus};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("seat {0} does not exist in this auditorium")]
    UnknownSeat(SeatRef),

    #[error("seat {seat} is {status} and cannot be selected")]
    NotSelectable { seat: SeatRef, status: SeatStatus },

    #[error("seat {0} is selected more than once")]
    Duplicate(SeatRef),
}

/// Кандидатный набор мест до оплаты. Ничего не пишет в хранилище.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeatSelection {
    seats: BTreeSet<SeatRef>,
}

impl SeatSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Собирает выбор из списка запроса: каждое место должно быть свободно
    /// и встречаться один раз.
    pub fn from_seats(map: &SeatMap, seats: &[SeatRef]) -> Result<Self, SelectionError> {
        let mut selection = Self::new();
        for seat in seats {
            if selection.contains(*seat) {
                return Err(SelectionError::Duplicate(*seat));
            }
            selection.toggle(map, *seat)?;
        }
        Ok(selection)
    }

    /// Добавляет место или убирает уже выбранное. Возвращает `true`, если
    /// место теперь в выборе.
    pub fn toggle(&mut self, map: &SeatMap, seat: SeatRef) -> Result<bool, SelectionError> {
        if self.seats.remove(&seat) {
            return Ok(false);
        }
        match map.status(seat) {
            None => Err(SelectionError::UnknownSeat(seat)),
            Some(SeatStatus::Available) => {
                self.seats.insert(seat);
                Ok(true)
            }
            Some(status) => Err(SelectionError::NotSelectable { seat, status }),
        }
    }

    pub fn contains(&self, seat: SeatRef) -> bool {
        self.seats.contains(&seat)
    }

    pub fn count(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn total_price(&self, price_per_seat: i64) -> i64 {
        price_per_seat.saturating_mul(self.seats.len() as i64)
    }

    /// Места в порядке ряд/место.
    pub fn seats(&self) -> Vec<SeatRef> {
        self.seats.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.seats.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn taken_and_handicap_seats_cannot_be_selected() {
        let mut map = SeatMap::generate(3, 4);
        map.set_status(SeatRef::new(1, 1), SeatStatus::Taken).unwrap();
        let mut selection = SeatSelection::new();

        assert_eq!(
            selection.toggle(&map, SeatRef::new(1, 1)),
            Err(SelectionError::NotSelectable { seat: SeatRef::new(1, 1), status: SeatStatus::Taken })
        );
        assert!(matches!(
            selection.toggle(&map, SeatRef::new(3, 4)),
            Err(SelectionError::NotSelectable { status: SeatStatus::Handicap, .. })
        ));
        assert_eq!(
            selection.toggle(&map, SeatRef::new(9, 9)),
            Err(SelectionError::UnknownSeat(SeatRef::new(9, 9)))
        );
        assert!(selection.is_empty());
    }

    #[test]
    fn derived_values_follow_the_selection() {
        let map = SeatMap::generate(8, 12);
        let selection =
            SeatSelection::from_seats(&map, &[SeatRef::new(2, 5), SeatRef::new(2, 4)]).unwrap();

        assert_eq!(selection.count(), 2);
        assert_eq!(selection.total_price(100), 200);
        assert_eq!(selection.seats(), vec![SeatRef::new(2, 4), SeatRef::new(2, 5)]);
    }

    #[test]
    fn duplicate_request_entries_are_rejected() {
        let map = SeatMap::generate(2, 2);
        assert_eq!(
            SeatSelection::from_seats(&map, &[SeatRef::new(1, 1), SeatRef::new(1, 1)]),
            Err(SelectionError::Duplicate(SeatRef::new(1, 1)))
        );
    }

    proptest! {
        #[test]
        fn double_toggle_restores_membership(
            preselected in proptest::collection::vec((1u16..=6, 1u16..=6), 0..10),
            row in 1u16..=6,
            seat in 1u16..=5,
        ) {
            let map = SeatMap::uniform(6, 6);
            let mut selection = SeatSelection::new();
            for (r, s) in preselected {
                let _ = selection.toggle(&map, SeatRef::new(r, s));
            }
            let before = selection.clone();

            let target = SeatRef::new(row, seat);
            selection.toggle(&map, target).unwrap();
            selection.toggle(&map, target).unwrap();

            prop_assert_eq!(selection, before);
        }

        #[test]
        fn taken_seat_is_never_added(row in 1u16..=6, seat in 1u16..=6) {
            let mut map = SeatMap::uniform(6, 6);
            let target = SeatRef::new(row, seat);
            map.set_status(target, SeatStatus::Taken).unwrap();

            let mut selection = SeatSelection::new();
            prop_assert!(selection.toggle(&map, target).is_err());
            prop_assert!(!selection.contains(target));
        }
    }
}
