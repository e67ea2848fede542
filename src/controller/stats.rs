//! Revoke backlog stats controller.

use axum::{routing::get, Json, Router};
use std::sync::Arc;

use crate::http::Controller;
use crate::revoke::RevokeStatsSource;

pub const STATS_PATH: &str = "/stats";

/// StatsController shows index size, pending revokes and store size as JSON.
#[derive(Clone)]
pub struct StatsController {
    source: Arc<dyn RevokeStatsSource>,
}

impl StatsController {
    pub fn new(source: Arc<dyn RevokeStatsSource>) -> Self {
        Self { source }
    }
}

impl Controller for StatsController {
    fn add_route(&self, router: Router) -> Router {
        let source = self.source.clone();
        router.route(
            STATS_PATH,
            get(move || {
                let source = source.clone();
                async move { Json(source.stats()) }
            }),
        )
    }
}
