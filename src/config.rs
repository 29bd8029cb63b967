use std::fmt;
use std::path::PathBuf;

use crate::calendar::{
    parse_date, CalendarWindow, Day, DEFAULT_HEADER_HEIGHT, DEFAULT_ROOM_COLUMN_WIDTH, DEFAULT_ROW_HEIGHT,
};
use crate::limits::*;
use crate::model::{RoomCatalog, RoomId};

pub const DEFAULT_ROOMS: &str = "1,2,3,4,5,6,7,8";
pub const DEFAULT_VISIBLE_DAYS: u32 = 14;
pub const DEFAULT_CELL_WIDTH: f64 = 48.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub var: &'static str,
    pub reason: String,
}

impl ConfigError {
    fn new(var: &'static str, reason: impl Into<String>) -> Self {
        Self {
            var,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.var, self.reason)
    }
}

impl std::error::Error for ConfigError {}

/// Startup settings, read once from `ROOMLINE_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub rooms: Vec<RoomId>,
    pub visible_days: u32,
    pub cell_width: f64,
    pub room_column_width: f64,
    pub row_height: f64,
    pub header_height: f64,
    /// `None` means today.
    pub base_date: Option<Day>,
    pub snapshot_path: Option<PathBuf>,
    pub metrics_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unset or blank variables take their
    /// default; anything else must parse and be within limits.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let rooms = parse_rooms(&var("ROOMLINE_ROOMS").unwrap_or_else(|| DEFAULT_ROOMS.into()))?;

        let visible_days = match var("ROOMLINE_VISIBLE_DAYS") {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=MAX_VISIBLE_DAYS).contains(n))
                .ok_or_else(|| {
                    ConfigError::new(
                        "ROOMLINE_VISIBLE_DAYS",
                        format!("expected 1..={MAX_VISIBLE_DAYS}, got {v:?}"),
                    )
                })?,
            None => DEFAULT_VISIBLE_DAYS,
        };

        let cell_width = match var("ROOMLINE_CELL_WIDTH") {
            Some(v) => parse_pixels("ROOMLINE_CELL_WIDTH", &v)
                .and_then(|w| {
                    if (MIN_CELL_WIDTH..=MAX_CELL_WIDTH).contains(&w) {
                        Ok(w)
                    } else {
                        Err(ConfigError::new(
                            "ROOMLINE_CELL_WIDTH",
                            format!("expected {MIN_CELL_WIDTH}..={MAX_CELL_WIDTH}, got {w}"),
                        ))
                    }
                })?,
            None => DEFAULT_CELL_WIDTH,
        };

        let room_column_width = var("ROOMLINE_ROOM_COLUMN_WIDTH")
            .map(|v| parse_pixels("ROOMLINE_ROOM_COLUMN_WIDTH", &v))
            .transpose()?
            .unwrap_or(DEFAULT_ROOM_COLUMN_WIDTH);
        let header_height = var("ROOMLINE_HEADER_HEIGHT")
            .map(|v| parse_pixels("ROOMLINE_HEADER_HEIGHT", &v))
            .transpose()?
            .unwrap_or(DEFAULT_HEADER_HEIGHT);
        let row_height = var("ROOMLINE_ROW_HEIGHT")
            .map(|v| parse_pixels("ROOMLINE_ROW_HEIGHT", &v))
            .transpose()?
            .unwrap_or(DEFAULT_ROW_HEIGHT);
        if row_height == 0.0 {
            return Err(ConfigError::new("ROOMLINE_ROW_HEIGHT", "must be positive"));
        }

        let base_date = var("ROOMLINE_BASE_DATE")
            .map(|v| parse_date(&v).map_err(|e| ConfigError::new("ROOMLINE_BASE_DATE", e.to_string())))
            .transpose()?;

        let snapshot_path = var("ROOMLINE_SNAPSHOT").map(PathBuf::from);

        let metrics_port = var("ROOMLINE_METRICS_PORT")
            .map(|v| {
                v.trim()
                    .parse::<u16>()
                    .map_err(|_| ConfigError::new("ROOMLINE_METRICS_PORT", format!("not a port: {v:?}")))
            })
            .transpose()?;

        Ok(Self {
            rooms,
            visible_days,
            cell_width,
            room_column_width,
            row_height,
            header_height,
            base_date,
            snapshot_path,
            metrics_port,
        })
    }

    pub fn catalog(&self) -> RoomCatalog {
        RoomCatalog::new(self.rooms.iter().cloned())
    }

    /// Window starting at the configured base date, or `today` if none.
    pub fn window(&self, today: Day) -> CalendarWindow {
        CalendarWindow::new(self.base_date.unwrap_or(today), self.visible_days, self.cell_width).with_geometry(
            self.room_column_width,
            self.row_height,
            self.header_height,
        )
    }
}

fn parse_rooms(raw: &str) -> Result<Vec<RoomId>, ConfigError> {
    const VAR: &str = "ROOMLINE_ROOMS";
    let mut rooms: Vec<RoomId> = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if part.chars().count() > MAX_ROOM_ID_LEN {
            return Err(ConfigError::new(VAR, format!("room id longer than {MAX_ROOM_ID_LEN}: {part:?}")));
        }
        let room = RoomId::from(part);
        if rooms.contains(&room) {
            return Err(ConfigError::new(VAR, format!("duplicate room {part:?}")));
        }
        rooms.push(room);
    }
    if rooms.is_empty() {
        return Err(ConfigError::new(VAR, "no rooms listed"));
    }
    if rooms.len() > MAX_ROOMS {
        return Err(ConfigError::new(VAR, format!("more than {MAX_ROOMS} rooms")));
    }
    Ok(rooms)
}

fn parse_pixels(var: &'static str, raw: &str) -> Result<f64, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|px| px.is_finite() && *px >= 0.0)
        .ok_or_else(|| ConfigError::new(var, format!("expected a non-negative number, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.rooms.len(), 8);
        assert_eq!(cfg.rooms[0], RoomId::from("1"));
        assert_eq!(cfg.visible_days, 14);
        assert_eq!(cfg.cell_width, 48.0);
        assert_eq!(cfg.row_height, DEFAULT_ROW_HEIGHT);
        assert!(cfg.base_date.is_none());
        assert!(cfg.snapshot_path.is_none());
        assert!(cfg.metrics_port.is_none());
    }

    #[test]
    fn reads_every_variable() {
        let cfg = config(&[
            ("ROOMLINE_ROOMS", " Sakura, Momiji ,Kaede "),
            ("ROOMLINE_VISIBLE_DAYS", "31"),
            ("ROOMLINE_CELL_WIDTH", "24.5"),
            ("ROOMLINE_ROOM_COLUMN_WIDTH", "120"),
            ("ROOMLINE_ROW_HEIGHT", "28"),
            ("ROOMLINE_HEADER_HEIGHT", "0"),
            ("ROOMLINE_BASE_DATE", "2025/12/29"),
            ("ROOMLINE_SNAPSHOT", "/tmp/rows.json"),
            ("ROOMLINE_METRICS_PORT", "9100"),
        ])
        .unwrap();
        assert_eq!(cfg.catalog(), RoomCatalog::new(["Sakura", "Momiji", "Kaede"]));
        assert_eq!(cfg.base_date, Day::from_ymd(2025, 12, 29));
        assert_eq!(cfg.snapshot_path, Some(PathBuf::from("/tmp/rows.json")));
        assert_eq!(cfg.metrics_port, Some(9100));

        let today = Day::from_ymd(2030, 1, 1).unwrap();
        let window = cfg.window(today);
        assert_eq!(window.base, Day::from_ymd(2025, 12, 29).unwrap());
        assert_eq!(window.visible_days, 31);
        assert_eq!(window.cell_width, 24.5);
        assert_eq!(window.room_column_width, 120.0);
        assert_eq!(window.row_height, 28.0);
        assert_eq!(window.header_height, 0.0);
    }

    #[test]
    fn window_falls_back_to_today() {
        let today = Day::from_ymd(2025, 6, 1).unwrap();
        assert_eq!(config(&[]).unwrap().window(today).base, today);
    }

    #[test]
    fn blank_means_unset() {
        let cfg = config(&[("ROOMLINE_VISIBLE_DAYS", "  "), ("ROOMLINE_METRICS_PORT", "")]).unwrap();
        assert_eq!(cfg.visible_days, DEFAULT_VISIBLE_DAYS);
        assert!(cfg.metrics_port.is_none());
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let cases = [
            ("ROOMLINE_ROOMS", " , ,"),
            ("ROOMLINE_ROOMS", "A,B,A"),
            ("ROOMLINE_VISIBLE_DAYS", "0"),
            ("ROOMLINE_VISIBLE_DAYS", "400"),
            ("ROOMLINE_VISIBLE_DAYS", "two weeks"),
            ("ROOMLINE_CELL_WIDTH", "2"),
            ("ROOMLINE_CELL_WIDTH", "NaN"),
            ("ROOMLINE_ROW_HEIGHT", "0"),
            ("ROOMLINE_HEADER_HEIGHT", "-4"),
            ("ROOMLINE_BASE_DATE", "2025-02-30"),
            ("ROOMLINE_METRICS_PORT", "70000"),
        ];
        for (var, value) in cases {
            let err = config(&[(var, value)]).unwrap_err();
            assert_eq!(err.var, var, "{var}={value:?}");
            assert!(err.to_string().starts_with(var));
        }
    }

    #[test]
    fn too_many_rooms() {
        let rooms: Vec<String> = (0..=MAX_ROOMS).map(|n| n.to_string()).collect();
        let err = config(&[("ROOMLINE_ROOMS", &rooms.join(","))]).unwrap_err();
        assert_eq!(err.var, "ROOMLINE_ROOMS");
    }
}
