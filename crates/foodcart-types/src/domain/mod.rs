pub mod catalog;
pub mod geo;
pub mod order;
pub mod phone;
pub mod ranking;
