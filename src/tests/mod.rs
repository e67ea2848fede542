//! Integration tests for revcache.
//!
//! End-to-end scenarios over the assembled application: admin API, revoke
//! delivery through the channel, background sweeps and config reload.

mod cases_admin_endpoints_test;
mod cases_boundedness_test;

pub mod support;
