pub mod config;
pub mod constants;
pub mod engine;
pub mod hub;
pub mod profile_store;
pub mod protocol;
pub mod rng;
pub mod server;
pub mod settlement;
pub mod types;
pub mod units;
