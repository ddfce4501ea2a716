mod app;
mod console;
mod effects;
pub(crate) mod logging;
mod persistence;

pub use app::run_app;
