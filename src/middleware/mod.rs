//! HTTP middleware: error response formatting and request logging

pub mod error;
pub mod logging;
