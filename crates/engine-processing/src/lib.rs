pub mod config;
pub mod error;
pub mod retry;
pub mod scheduler;
pub mod upload;
