//! Web Module
//!
//! HTML browser pages, the JSON API, probes and metrics over axum.

pub mod metrics;
pub mod rest;
pub mod server;
pub mod views;

pub use metrics::*;
pub use rest::*;
pub use server::*;
pub use views::*;
