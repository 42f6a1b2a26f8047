pub mod auth;
pub mod config;
pub mod dashboard;
pub mod events;
pub mod finance;
pub mod storage;
pub mod weather;
