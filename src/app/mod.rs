// Application wiring.

pub mod app;

pub use app::{App, Coordinator};
