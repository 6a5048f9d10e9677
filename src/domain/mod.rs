//! Domain layer - CRD records and the port cluster adapters implement

pub mod ports;

pub use ports::*;
