pub mod auth_store;
pub mod seed;
