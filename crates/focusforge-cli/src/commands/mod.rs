pub mod challenge;
pub mod config;
pub mod fitness;
pub mod level;
pub mod profile;
pub mod session;
pub mod streak;
pub mod sync;
