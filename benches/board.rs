use std::sync::Arc;
use std::time::{Duration, Instant};

use ulid::Ulid;

use roomline::calendar::{CalendarWindow, Day};
use roomline::model::*;
use roomline::scheduler::{Board, Gesture, Point, Scheduler};
use roomline::store::MemoryStore;

const ROOMS: usize = 64;
const STAYS_PER_ROOM: i64 = 120;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.1}us, p50={:.1}us, p95={:.1}us, p99={:.1}us, max={:.1}us",
        latencies.len(),
        avg.as_secs_f64() * 1e6,
        percentile(latencies, 50.0).as_secs_f64() * 1e6,
        percentile(latencies, 95.0).as_secs_f64() * 1e6,
        percentile(latencies, 99.0).as_secs_f64() * 1e6,
        latencies[latencies.len() - 1].as_secs_f64() * 1e6,
    );
}

/// Every room booked back to back in 2-night stays with a free night between.
fn rows(base: Day) -> Vec<Reservation> {
    let mut rows = Vec::new();
    for room in 0..ROOMS {
        for n in 0..STAYS_PER_ROOM {
            let start = base.add_days(n * 3);
            rows.push(Reservation {
                id: Ulid::new(),
                room: RoomId::new(format!("R{room:03}")),
                stay: Stay::with_nights(start, 2),
                status: Status::Confirmed,
                guest: Guest::new("Bench", "Dog"),
                memo: String::new(),
                pickup: false,
            });
        }
    }
    rows
}

fn bench_board(rows: &[Reservation], base: Day) {
    println!("\n[board] conflict checks over {} stays", rows.len());
    let mut board = Board::new();
    let started = Instant::now();
    for r in rows {
        board.place(r);
    }
    println!("  indexed in {:.2}ms", started.elapsed().as_secs_f64() * 1000.0);

    let mut latencies = Vec::with_capacity(10_000);
    for i in 0..10_000i64 {
        let room = RoomId::new(format!("R{:03}", i as usize % ROOMS));
        let stay = Stay::with_nights(base.add_days(i % (STAYS_PER_ROOM * 3)), 1 + i % 4);
        let t = Instant::now();
        std::hint::black_box(board.find_conflict(&room, &stay, None));
        latencies.push(t.elapsed());
    }
    print_latency("find_conflict", &mut latencies);
}

async fn bench_scheduler(rows: Vec<Reservation>, base: Day) {
    println!("\n[scheduler] view and drag round trips");
    let catalog = RoomCatalog::new((0..ROOMS).map(|room| format!("R{room:03}")));
    let window = CalendarWindow::new(base, 31, 40.0);
    let store = Arc::new(MemoryStore::with_reservations(rows));
    let mut scheduler = Scheduler::connect(store, catalog, window.clone())
        .await
        .expect("connect failed");

    let mut latencies = Vec::with_capacity(1_000);
    let mut shifted = window.clone();
    for _ in 0..1_000 {
        shifted.shift(1);
        let t = Instant::now();
        std::hint::black_box(scheduler.current_view(&shifted));
        latencies.push(t.elapsed());
    }
    print_latency("current_view (31 days x 64 rooms)", &mut latencies);

    // Resize the first stay in every room by a night and back again.
    let targets: Vec<Reservation> = scheduler
        .reservations()
        .into_iter()
        .filter(|r| r.stay.start == base)
        .collect();
    let mut latencies = Vec::with_capacity(targets.len() * 2);
    for r in &targets {
        let edge = Point::new(window.to_coordinate(r.stay.end) - 5.0, 0.0);
        for dx in [40.0, -40.0] {
            let t = Instant::now();
            scheduler
                .begin_drag(r.id, Gesture::Resize, edge)
                .expect("begin_drag failed");
            std::hint::black_box(scheduler.end_drag(Point::new(edge.x + dx, edge.y)).expect("end_drag failed"));
            latencies.push(t.elapsed());
        }
    }
    print_latency("drag begin+end", &mut latencies);

    let t = Instant::now();
    let settled = scheduler.settle().await;
    println!(
        "  settled {} writes in {:.2}ms",
        settled.len(),
        t.elapsed().as_secs_f64() * 1000.0
    );
}

#[tokio::main]
async fn main() {
    let base = Day::from_ymd(2025, 1, 1).expect("valid date");
    println!("=== roomline board benchmark ===");
    println!("{ROOMS} rooms, {STAYS_PER_ROOM} stays per room");

    let rows = rows(base);
    bench_board(&rows, base);
    bench_scheduler(rows, base).await;
}
