pub mod cli;
pub mod codec;
pub mod config;
pub mod delivery;
pub mod harvest;
pub mod provision;
pub mod runtime;
pub mod source;
pub mod storage;
