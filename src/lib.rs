pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod repo;
pub mod security;
pub mod server;
pub mod storage;
