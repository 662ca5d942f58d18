//! Модель зала: сетка мест одного сеанса.
//!
//! `SeatMap` хранит статусы в плоском векторе (строка за строкой), координаты
//! 1-based `(row, seat)`. В хранилище карта уходит плоским списком записей с
//! отдельными `rows`/`cols`; при чтении принимается и вложенная 2D форма.
//! Обе формы валидируются на одной границе.

pub mod allocation;
pub mod layout;
pub mod selection;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use allocation::{claim_seats, release_seats, AllocationError};
pub use layout::{AuditoriumLayout, Cell};
pub use selection::{SeatSelection, SelectionError};

/// Верхняя граница размеров зала по каждой оси.
pub const MAX_GRID_SIDE: u16 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Taken,
    Handicap,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "available",
            SeatStatus::Taken => "taken",
            SeatStatus::Handicap => "handicap",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(SeatStatus::Available),
            "taken" => Ok(SeatStatus::Taken),
            "handicap" => Ok(SeatStatus::Handicap),
            other => Err(format!("unknown seat status '{}'", other)),
        }
    }
}

/// Координаты места в зале.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeatRef {
    pub row: u16,
    pub seat: u16,
}

impl SeatRef {
    pub fn new(row: u16, seat: u16) -> Self {
        Self { row, seat }
    }
}

impl fmt::Display for SeatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.row, self.seat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatRecord {
    pub row: u16,
    pub seat: u16,
    pub status: SeatStatus,
}

impl SeatRecord {
    pub fn position(&self) -> SeatRef {
        SeatRef::new(self.row, self.seat)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeatMapError {
    #[error("seat map {rows}x{cols} exceeds the size limit")]
    TooLarge { rows: u16, cols: u16 },

    #[error("seat {seat} is outside the {rows}x{cols} grid")]
    OutOfBounds { seat: SeatRef, rows: u16, cols: u16 },

    #[error("seat {0} appears more than once in the seat map")]
    DuplicateSeat(SeatRef),

    #[error("seat map lists {found} seats, expected {expected}")]
    SeatCount { found: usize, expected: usize },

    #[error("nested seat map rows have different lengths")]
    RaggedRows,
}

/// Плоская форма карты, в которой она хранится и отдается наружу.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatSeatMap {
    #[serde(alias = "seatMapRows")]
    pub rows: u16,
    #[serde(alias = "seatMapCols")]
    pub cols: u16,
    #[serde(alias = "seatMap")]
    pub seats: Vec<SeatRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeatMapRepr {
    Flat(FlatSeatMap),
    Nested(Vec<Vec<SeatRecord>>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SeatMapRepr", into = "FlatSeatMap")]
pub struct SeatMap {
    rows: u16,
    cols: u16,
    statuses: Vec<SeatStatus>,
}

impl SeatMap {
    /// Карта нового сеанса: все места свободны, кроме двух последних мест
    /// последнего ряда (места для колясок).
    pub fn generate(rows: u16, cols: u16) -> Self {
        let mut map = Self::uniform(rows, cols);
        if rows > 0 {
            for seat in 1..=cols {
                if seat + 2 > cols {
                    let idx = map.offset(rows, seat);
                    map.statuses[idx] = SeatStatus::Handicap;
                }
            }
        }
        map
    }

    /// Сетка без выделенных мест для колясок.
    pub fn uniform(rows: u16, cols: u16) -> Self {
        Self {
            rows,
            cols,
            statuses: vec![SeatStatus::Available; usize::from(rows) * usize::from(cols)],
        }
    }

    pub fn from_records(rows: u16, cols: u16, records: &[SeatRecord]) -> Result<Self, SeatMapError> {
        if rows > MAX_GRID_SIDE || cols > MAX_GRID_SIDE {
            return Err(SeatMapError::TooLarge { rows, cols });
        }
        let expected = usize::from(rows) * usize::from(cols);
        if records.len() != expected {
            return Err(SeatMapError::SeatCount { found: records.len(), expected });
        }

        let mut slots: Vec<Option<SeatStatus>> = vec![None; expected];
        for record in records {
            let position = record.position();
            if !Self::in_bounds(rows, cols, position) {
                return Err(SeatMapError::OutOfBounds { seat: position, rows, cols });
            }
            let idx = usize::from(record.row - 1) * usize::from(cols) + usize::from(record.seat - 1);
            if slots[idx].replace(record.status).is_some() {
                return Err(SeatMapError::DuplicateSeat(position));
            }
        }

        // Длина совпала и дублей нет, значит заполнены все ячейки
        let statuses = slots.into_iter().flatten().collect();
        Ok(Self { rows, cols, statuses })
    }

    pub fn from_nested(grid: Vec<Vec<SeatRecord>>) -> Result<Self, SeatMapError> {
        let rows = u16::try_from(grid.len()).unwrap_or(u16::MAX);
        let width = grid.first().map(Vec::len).unwrap_or(0);
        if grid.iter().any(|row| row.len() != width) {
            return Err(SeatMapError::RaggedRows);
        }
        let cols = u16::try_from(width).unwrap_or(u16::MAX);
        let records: Vec<SeatRecord> = grid.into_iter().flatten().collect();
        Self::from_records(rows, cols, &records)
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn total_seats(&self) -> usize {
        self.statuses.len()
    }

    /// Пересчитывается по карте при каждом вызове, счетчику не доверяем.
    pub fn seats_available(&self) -> usize {
        self.count(SeatStatus::Available)
    }

    pub fn count(&self, status: SeatStatus) -> usize {
        self.statuses.iter().filter(|s| **s == status).count()
    }

    pub fn contains(&self, seat: SeatRef) -> bool {
        Self::in_bounds(self.rows, self.cols, seat)
    }

    pub fn status(&self, seat: SeatRef) -> Option<SeatStatus> {
        self.index(seat).map(|idx| self.statuses[idx])
    }

    /// Меняет статус места, возвращает предыдущий.
    pub fn set_status(&mut self, seat: SeatRef, status: SeatStatus) -> Result<SeatStatus, SeatMapError> {
        let idx = self.index(seat).ok_or(SeatMapError::OutOfBounds {
            seat,
            rows: self.rows,
            cols: self.cols,
        })?;
        Ok(std::mem::replace(&mut self.statuses[idx], status))
    }

    pub fn records(&self) -> impl Iterator<Item = SeatRecord> + '_ {
        self.statuses.iter().enumerate().map(move |(idx, status)| {
            let cols = usize::from(self.cols.max(1));
            SeatRecord {
                row: (idx / cols + 1) as u16,
                seat: (idx % cols + 1) as u16,
                status: *status,
            }
        })
    }

    pub fn to_flat(&self) -> FlatSeatMap {
        FlatSeatMap {
            rows: self.rows,
            cols: self.cols,
            seats: self.records().collect(),
        }
    }

    pub fn to_nested(&self) -> Vec<Vec<SeatRecord>> {
        let records: Vec<SeatRecord> = self.records().collect();
        records
            .chunks(usize::from(self.cols.max(1)))
            .map(<[SeatRecord]>::to_vec)
            .collect()
    }

    fn index(&self, seat: SeatRef) -> Option<usize> {
        self.contains(seat).then(|| self.offset(seat.row, seat.seat))
    }

    fn offset(&self, row: u16, seat: u16) -> usize {
        usize::from(row - 1) * usize::from(self.cols) + usize::from(seat - 1)
    }

    fn in_bounds(rows: u16, cols: u16, seat: SeatRef) -> bool {
        (1..=rows).contains(&seat.row) && (1..=cols).contains(&seat.seat)
    }
}

impl TryFrom<SeatMapRepr> for SeatMap {
    type Error = SeatMapError;

    fn try_from(repr: SeatMapRepr) -> Result<Self, Self::Error> {
        match repr {
            SeatMapRepr::Flat(flat) => SeatMap::from_records(flat.rows, flat.cols, &flat.seats),
            SeatMapRepr::Nested(grid) => SeatMap::from_nested(grid),
        }
    }
}

impl From<SeatMap> for FlatSeatMap {
    fn from(map: SeatMap) -> Self {
        map.to_flat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn default_grid_has_two_handicap_seats_at_the_end_of_last_row() {
        let map = SeatMap::generate(8, 12);

        assert_eq!(map.total_seats(), 96);
        assert_eq!(map.count(SeatStatus::Handicap), 2);
        assert_eq!(map.status(SeatRef::new(8, 11)), Some(SeatStatus::Handicap));
        assert_eq!(map.status(SeatRef::new(8, 12)), Some(SeatStatus::Handicap));
        assert_eq!(map.status(SeatRef::new(8, 10)), Some(SeatStatus::Available));
        assert_eq!(map.status(SeatRef::new(7, 12)), Some(SeatStatus::Available));
        assert_eq!(map.seats_available(), 94);
    }

    #[test]
    fn coordinates_outside_the_grid_are_rejected() {
        let mut map = SeatMap::generate(2, 3);

        assert_eq!(map.status(SeatRef::new(0, 1)), None);
        assert_eq!(map.status(SeatRef::new(3, 1)), None);
        assert!(matches!(
            map.set_status(SeatRef::new(1, 4), SeatStatus::Taken),
            Err(SeatMapError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn flat_form_with_legacy_field_names_is_accepted() {
        let json = serde_json::json!({
            "seatMapRows": 1,
            "seatMapCols": 2,
            "seatMap": [
                { "row": 1, "seat": 2, "status": "taken" },
                { "row": 1, "seat": 1, "status": "available" }
            ]
        });

        let map: SeatMap = serde_json::from_value(json).unwrap();
        assert_eq!(map.status(SeatRef::new(1, 1)), Some(SeatStatus::Available));
        assert_eq!(map.status(SeatRef::new(1, 2)), Some(SeatStatus::Taken));
    }

    #[test]
    fn nested_form_is_accepted_and_written_back_flat() {
        let nested = SeatMap::generate(3, 4).to_nested();
        let json = serde_json::to_value(&nested).unwrap();

        let map: SeatMap = serde_json::from_value(json).unwrap();
        assert_eq!(map, SeatMap::generate(3, 4));

        let written = serde_json::to_value(&map).unwrap();
        assert_eq!(written["rows"], 3);
        assert_eq!(written["cols"], 4);
        assert_eq!(written["seats"].as_array().map(Vec::len), Some(12));
    }

    #[test]
    fn duplicate_and_missing_seats_are_rejected() {
        let dup = vec![
            SeatRecord { row: 1, seat: 1, status: SeatStatus::Available },
            SeatRecord { row: 1, seat: 1, status: SeatStatus::Taken },
        ];
        assert_eq!(
            SeatMap::from_records(1, 2, &dup),
            Err(SeatMapError::DuplicateSeat(SeatRef::new(1, 1)))
        );

        let short = vec![SeatRecord { row: 1, seat: 1, status: SeatStatus::Available }];
        assert_eq!(
            SeatMap::from_records(1, 2, &short),
            Err(SeatMapError::SeatCount { found: 1, expected: 2 })
        );
    }

    #[test]
    fn ragged_nested_rows_are_rejected() {
        let mut grid = SeatMap::generate(2, 3).to_nested();
        grid[1].pop();
        assert_eq!(SeatMap::from_nested(grid), Err(SeatMapError::RaggedRows));
    }

    proptest! {
        #[test]
        fn generated_maps_cover_every_seat_once(rows in 1u16..30, cols in 2u16..30) {
            let map = SeatMap::generate(rows, cols);
            let records: Vec<SeatRecord> = map.records().collect();

            prop_assert_eq!(records.len(), usize::from(rows) * usize::from(cols));
            let unique: HashSet<SeatRef> = records.iter().map(SeatRecord::position).collect();
            prop_assert_eq!(unique.len(), records.len());

            for record in &records {
                let expect_handicap = record.row == rows && record.seat >= cols - 1;
                let expected = if expect_handicap { SeatStatus::Handicap } else { SeatStatus::Available };
                prop_assert_eq!(record.status, expected);
            }
        }

        #[test]
        fn available_count_tracks_every_mutation(
            rows in 1u16..12,
            cols in 1u16..12,
            edits in proptest::collection::vec((1u16..12, 1u16..12, 0u8..3), 0..40),
        ) {
            let mut map = SeatMap::generate(rows, cols);
            for (row, seat, kind) in edits {
                let status = match kind {
                    0 => SeatStatus::Available,
                    1 => SeatStatus::Taken,
                    _ => SeatStatus::Handicap,
                };
                let _ = map.set_status(SeatRef::new(row, seat), status);

                let recount = map.records().filter(|r| r.status == SeatStatus::Available).count();
                prop_assert_eq!(map.seats_available(), recount);
            }
        }

        #[test]
        fn flat_form_reads_back_identically(rows in 0u16..20, cols in 0u16..20) {
            let map = SeatMap::generate(rows, cols);
            let flat = map.to_flat();
            prop_assert_eq!(SeatMap::from_records(flat.rows, flat.cols, &flat.seats), Ok(map));
        }
    }
}
