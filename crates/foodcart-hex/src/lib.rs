//! foodcart-hex: application core of the food ordering service, with its
//! inbound HTTP adapter and outbound geocoder adapter.

pub mod config;
pub mod errors;

pub mod application;

pub use foodcart_types::{domain, ports};

pub mod inbound; // HTTP adapter (server + handlers)
pub mod outbound; // geocoding provider
