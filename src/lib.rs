pub mod cli;
pub mod core;
pub mod models;
pub mod persist;
pub mod stores;
pub mod utils;
