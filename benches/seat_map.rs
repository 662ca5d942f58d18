//! Стоимость чистых операций над картой мест: занять, вернуть,
//! сериализовать в форму хранилища.
//!
//! Запуск: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use malling_bio::seating::{claim_seats, release_seats, SeatMap, SeatRef};

fn selection(count: u16, cols: u16) -> Vec<SeatRef> {
    (0..count)
        .map(|i| SeatRef::new(i / cols + 1, i % cols + 1))
        .collect()
}

fn bench_claim(c: &mut Criterion) {
    let mut group = c.benchmark_group("claim_seats");
    for (rows, cols) in [(8u16, 12u16), (30, 40), (200, 200)] {
        let map = SeatMap::uniform(rows, cols);
        let seats = selection(10, cols);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", rows, cols)),
            &(map, seats),
            |b, (map, seats)| b.iter(|| claim_seats(black_box(map), black_box(seats))),
        );
    }
    group.finish();
}

fn bench_release(c: &mut Criterion) {
    let seats = selection(10, 12);
    let taken = claim_seats(&SeatMap::uniform(8, 12), &seats).expect("seats are free");
    c.bench_function("release_seats/8x12", |b| {
        b.iter(|| release_seats(black_box(&taken), black_box(&seats)))
    });
}

fn bench_serde(c: &mut Criterion) {
    let map = SeatMap::generate(30, 40);
    let raw = serde_json::to_string(&map).expect("seat map serializes");
    c.bench_function("seat_map/to_json/30x40", |b| {
        b.iter(|| serde_json::to_string(black_box(&map)))
    });
    c.bench_function("seat_map/from_json/30x40", |b| {
        b.iter(|| serde_json::from_str::<SeatMap>(black_box(&raw)))
    });
}

criterion_group!(benches, bench_claim, bench_release, bench_serde);
criterion_main!(benches);
