pub mod api;
pub mod blockchain;
pub mod client;
pub mod config;
pub mod transaction;
pub mod wallet;
