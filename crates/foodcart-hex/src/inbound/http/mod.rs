mod handlers;
mod server;

pub use server::{HttpServer, HttpServerConfig};
