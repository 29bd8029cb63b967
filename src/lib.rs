pub mod calendar;
pub mod config;
pub mod directory;
pub mod limits;
pub mod model;
pub mod observability;
pub mod scheduler;
pub mod store;
