//! HTTP API handlers

pub mod donations;
pub mod users;
