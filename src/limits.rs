pub const MAX_ROOMS: usize = 256;
pub const MAX_ROOM_ID_LEN: usize = 64;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_MEMO_LEN: usize = 2000;
/// Longest single stay, in nights.
pub const MAX_STAY_DAYS: i64 = 366;
pub const MAX_VISIBLE_DAYS: u32 = 366;
pub const MIN_CELL_WIDTH: f64 = 8.0;
pub const MAX_CELL_WIDTH: f64 = 400.0;
/// Bound on the persistence outcome channel.
pub const OUTCOME_CHANNEL_CAPACITY: usize = 1024;
