//! Revoke publishing controller.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::channel::RevokeChannel;
use crate::http::Controller;

pub const REVOKE_PATH: &str = "/revoke";

/// Query parameters for the revoke endpoint.
#[derive(Deserialize)]
struct RevokeQuery {
    key: Option<String>,
}

#[derive(Debug, Serialize)]
struct RevokeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    revoke_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subscribers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl RevokeResponse {
    fn failed(error: impl Into<String>) -> Json<Self> {
        Json(Self {
            revoke_key: None,
            subscribers: None,
            error: Some(error.into()),
        })
    }
}

/// RevokeController publishes revoke keys to the revoke channel.
#[derive(Clone)]
pub struct RevokeController {
    channel: Arc<dyn RevokeChannel>,
}

impl RevokeController {
    pub fn new(channel: Arc<dyn RevokeChannel>) -> Self {
        Self { channel }
    }

    async fn handle_revoke(
        Query(params): Query<RevokeQuery>,
        State(controller): State<Arc<Self>>,
    ) -> impl IntoResponse {
        let Some(key) = params.key.filter(|k| !k.is_empty()) else {
            return (
                StatusCode::BAD_REQUEST,
                RevokeResponse::failed("query parameter 'key' is required"),
            );
        };

        match controller.channel.publish(&key) {
            Ok(subscribers) => {
                info!(
                    component = "revoke",
                    event = "published",
                    revoke_key = %key,
                    subscribers,
                    "revoke published"
                );
                (
                    StatusCode::OK,
                    Json(RevokeResponse {
                        revoke_key: Some(key),
                        subscribers: Some(subscribers),
                        error: None,
                    }),
                )
            }
            Err(e) => {
                warn!(
                    component = "revoke",
                    event = "publish_failed",
                    revoke_key = %key,
                    error = %e,
                    "revoke not published"
                );
                (StatusCode::SERVICE_UNAVAILABLE, RevokeResponse::failed(e.to_string()))
            }
        }
    }
}

impl Controller for RevokeController {
    fn add_route(&self, router: Router) -> Router {
        let controller = Arc::new(self.clone());
        let on_post = controller.clone();
        router.route(
            REVOKE_PATH,
            get(move |query: Query<RevokeQuery>| {
                let controller = controller.clone();
                async move { Self::handle_revoke(query, State(controller)).await }
            })
            .post(move |query: Query<RevokeQuery>| {
                let controller = on_post.clone();
                async move { Self::handle_revoke(query, State(controller)).await }
            }),
        )
    }
}
