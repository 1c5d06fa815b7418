pub mod envelope;
pub mod persister;
pub mod storage;
