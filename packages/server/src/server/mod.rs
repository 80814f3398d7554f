// HTTP server (health endpoint) and the Telegram update loop
pub mod app;
pub mod bot;
pub mod routes;

pub use app::*;
pub use bot::run_bot;
