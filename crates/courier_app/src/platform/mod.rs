mod app;
mod config;
mod console;
mod effects;
mod history;
mod logging;

pub use app::run_app;
