//! Donation backend: signup/login plus a KakaoPay checkout flow with a
//! persisted donation ledger.

pub mod api;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod services;
