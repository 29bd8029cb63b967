use std::fmt::Write as _;
use std::sync::Arc;

use tracing::info;

use roomline::calendar::Day;
use roomline::config::Config;
use roomline::scheduler::Scheduler;
use roomline::store::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    roomline::observability::init(config.metrics_port)?;

    let store = match &config.snapshot_path {
        Some(path) => {
            let json = tokio::fs::read_to_string(path).await?;
            let store = MemoryStore::from_json(&json)?;
            info!("loaded {} reservations from {}", store.len(), path.display());
            store
        }
        None => MemoryStore::new(),
    };

    let window = config.window(Day::today());
    info!("roomline board");
    info!("  rooms: {}", config.rooms.len());
    info!("  window: {}..{}", window.base, window.end());
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    let scheduler = Scheduler::connect(Arc::new(store), config.catalog(), window).await?;
    print!("{}", render(&scheduler));
    Ok(())
}

/// Text rendition of the visible board: one column per day, one line per
/// room, occupied nights marked with the first letter of the dog's name.
fn render(scheduler: &Scheduler) -> String {
    let window = scheduler.window();
    let rooms = scheduler.catalog().rooms();
    let label_width = rooms.iter().map(|r| r.as_str().len()).max().unwrap_or(0).max(4);
    let days: Vec<Day> = window.days().collect();

    let mut grid = vec![vec!['.'; days.len()]; rooms.len()];
    for placement in scheduler.current_view(window) {
        let r = &placement.reservation;
        let mark = r.guest.dog_name.chars().next().unwrap_or('#');
        for (col, day) in days.iter().enumerate() {
            if r.stay.contains_day(*day) {
                grid[placement.row][col] = mark;
            }
        }
    }

    let mut out = String::new();
    let _ = write!(out, "{:label_width$} ", "");
    for day in &days {
        let _ = write!(out, "{:>3}", day.day());
    }
    out.push('\n');
    for (room, cells) in rooms.iter().zip(grid) {
        let _ = write!(out, "{:label_width$} ", room.as_str());
        for cell in cells {
            let _ = write!(out, "{cell:>3}");
        }
        out.push('\n');
    }
    out
}
