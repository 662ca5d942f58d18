//! Визуальная раскладка залов. Только представление: статусы мест
//! берутся из карты сеанса, раскладка лишь расставляет проходы.

use super::{SeatMap, SeatRecord, SeatStatus};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Cell {
    Seat(SeatRecord),
    Spacer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditoriumLayout {
    pub name: &'static str,
    pub default_rows: u16,
    pub default_cols: u16,
    /// Проход после указанных номеров мест в каждом ряду.
    pub aisles_after: &'static [u16],
    /// Отделять места для колясок в последнем ряду пустой клеткой.
    pub separate_handicap: bool,
    /// Генерировать ли места для колясок в новых сеансах. У простой
    /// сетки неизвестного зала их нет.
    pub has_handicap_seats: bool,
}

const SAL_1: AuditoriumLayout = AuditoriumLayout {
    name: "Sal 1",
    default_rows: 8,
    default_cols: 12,
    aisles_after: &[],
    separate_handicap: false,
    has_handicap_seats: true,
};

const SAL_2: AuditoriumLayout = AuditoriumLayout {
    name: "Sal 2",
    default_rows: 6,
    default_cols: 10,
    aisles_after: &[5],
    separate_handicap: true,
    has_handicap_seats: true,
};

pub const KNOWN_AUDITORIUMS: [AuditoriumLayout; 2] = [SAL_1, SAL_2];

impl AuditoriumLayout {
    /// Раскладка по имени зала. Неизвестный зал рисуется простой сеткой
    /// с размерами по умолчанию.
    pub fn for_auditorium(name: &str, default_rows: u16, default_cols: u16) -> Self {
        KNOWN_AUDITORIUMS
            .iter()
            .find(|layout| layout.name.eq_ignore_ascii_case(name.trim()))
            .copied()
            .unwrap_or(AuditoriumLayout {
                name: "plain",
                default_rows,
                default_cols,
                aisles_after: &[],
                separate_handicap: false,
                has_handicap_seats: false,
            })
    }

    pub fn is_known(name: &str) -> bool {
        KNOWN_AUDITORIUMS
            .iter()
            .any(|layout| layout.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Карта нового сеанса для этого зала.
    pub fn seat_map(&self, rows: Option<u16>, cols: Option<u16>) -> SeatMap {
        let rows = rows.unwrap_or(self.default_rows);
        let cols = cols.unwrap_or(self.default_cols);
        if self.has_handicap_seats {
            SeatMap::generate(rows, cols)
        } else {
            SeatMap::uniform(rows, cols)
        }
    }

    pub fn render(&self, map: &SeatMap) -> Vec<Vec<Cell>> {
        map.to_nested()
            .into_iter()
            .map(|row| self.render_row(map.rows(), map.cols(), row))
            .collect()
    }

    fn render_row(&self, rows: u16, cols: u16, row: Vec<SeatRecord>) -> Vec<Cell> {
        let mut cells = Vec::with_capacity(row.len() + self.aisles_after.len() + 1);
        let mut previous: Option<SeatStatus> = None;

        for record in row {
            let opens_cluster = self.separate_handicap
                && record.row == rows
                && record.status == SeatStatus::Handicap
                && previous.is_some_and(|s| s != SeatStatus::Handicap)
                && cells.last() != Some(&Cell::Spacer);
            if opens_cluster {
                cells.push(Cell::Spacer);
            }

            cells.push(Cell::Seat(record));
            previous = Some(record.status);

            if record.seat < cols && self.aisles_after.contains(&record.seat) {
                cells.push(Cell::Spacer);
            }
        }
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seats_in(row: &[Cell]) -> usize {
        row.iter().filter(|c| matches!(c, Cell::Seat(_))).count()
    }

    #[test]
    fn first_auditorium_is_a_plain_grid() {
        let layout = AuditoriumLayout::for_auditorium("Sal 1", 8, 12);
        let map = layout.seat_map(None, None);
        let rendered = layout.render(&map);

        assert_eq!(rendered.len(), 8);
        assert!(rendered.iter().all(|row| row.len() == 12 && seats_in(row) == 12));
    }

    #[test]
    fn second_auditorium_has_an_aisle_and_a_handicap_cluster() {
        let layout = AuditoriumLayout::for_auditorium("sal 2", 8, 12);
        let map = layout.seat_map(None, None);
        let rendered = layout.render(&map);

        assert_eq!(map.rows(), 6);
        assert_eq!(map.cols(), 10);
        // Обычный ряд: 10 мест и проход после 5-го
        assert_eq!(rendered[0].len(), 11);
        assert_eq!(rendered[0][5], Cell::Spacer);
        // Последний ряд: еще и отступ перед местами для колясок
        let last = &rendered[5];
        assert_eq!(seats_in(last), 10);
        assert_eq!(last.len(), 12);
        assert_eq!(last[9], Cell::Spacer);
        assert!(matches!(last[10], Cell::Seat(SeatRecord { status: SeatStatus::Handicap, .. })));
    }

    #[test]
    fn unknown_auditorium_falls_back_to_defaults() {
        let layout = AuditoriumLayout::for_auditorium("Sal 9", 5, 7);

        assert!(!AuditoriumLayout::is_known("Sal 9"));
        assert_eq!((layout.default_rows, layout.default_cols), (5, 7));
        assert!(layout.aisles_after.is_empty());
    }

    #[test]
    fn only_known_auditoriums_reserve_handicap_seats() {
        let known = AuditoriumLayout::for_auditorium("Sal 1", 8, 12).seat_map(None, None);
        assert_eq!(known.count(SeatStatus::Handicap), 2);
        assert_eq!(known.seats_available(), 94);

        let plain = AuditoriumLayout::for_auditorium("Foyer", 4, 6).seat_map(None, None);
        assert_eq!(plain, SeatMap::uniform(4, 6));
        assert_eq!(plain.count(SeatStatus::Handicap), 0);
        assert_eq!(plain.seats_available(), 24);
    }
}
