//! HTTP surface: the pipeline driver and the server that hosts it.

mod pipeline;
mod server;

pub use pipeline::AppState;
pub use server::HttpServer;
