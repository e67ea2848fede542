// Shared test support code for integration tests.

pub mod harness;
pub mod http;

pub use harness::{eventually, TestApp};
pub use http::{call, call_json};
