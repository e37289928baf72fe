pub mod config;
pub mod content;
pub mod enrollment;
pub mod error;
pub mod feed;
pub mod store;
pub mod telemetry;
pub mod users;
