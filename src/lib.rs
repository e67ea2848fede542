#[path = "k8s/probe/liveness/mod.rs"]
pub mod liveness;
#[path = "shared/time/mod.rs"]
pub mod time;
#[cfg(test)]
mod tests;

pub mod app;
pub mod channel;
pub mod config;
pub mod controller;
pub mod http;
pub mod metrics;
pub mod revoke;
pub mod shutdown;
pub mod store;
