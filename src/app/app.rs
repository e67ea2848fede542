// Main revoke cache application implementation.

use axum::Router;
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::channel::{listener, BroadcastRevokeChannel, RevokeChannel};
use crate::config::{watcher, Config, ConfigTrait, RevokeSettings};
use crate::controller;
use crate::http::{Controller, HttpServer, Server};
use crate::liveness;
use crate::revoke::{
    telemetry, Counters, ReverseIndex, RevokeCoordinator, RevokeHandler, RevokeQueueMaintainer,
    RevokeStatsSource,
};
use crate::shutdown::GracefulShutdown;
use crate::store::{in_memory, InMemoryStore};
use crate::time::SystemClock;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Coordinator over the in-memory store, caching raw response bodies.
///
/// The binary only serves the revoke side; the embedding proxy fills the
/// store by routing its calls through [`App::coordinator`].
pub type Coordinator = RevokeCoordinator<Bytes, InMemoryStore<Bytes>>;

/// Encapsulates the application state: the revoke subsystem, its channel and
/// the admin HTTP server.
#[derive(Clone)]
pub struct App {
    cfg: Config,
    cfg_path: Option<PathBuf>,
    shutdown_token: CancellationToken,
    settings: RevokeSettings,
    coordinator: Arc<Coordinator>,
    channel: Arc<BroadcastRevokeChannel>,
    probe: Arc<liveness::Probe>,
    server: Arc<HttpServer>,
}

impl App {
    /// Builds the application. Nothing runs until [`App::serve`].
    ///
    /// `cfg_path` is re-read for hot-reloadable settings when reloading is enabled.
    pub fn new(
        shutdown_token: CancellationToken,
        cfg: Config,
        cfg_path: Option<PathBuf>,
    ) -> Self {
        let settings = cfg.revoke_settings();
        let clock = Arc::new(SystemClock);
        let counters = Arc::new(Counters::new());
        let index = Arc::new(ReverseIndex::new());
        let maintainer = RevokeQueueMaintainer::new(
            &shutdown_token,
            index.clone(),
            settings.clone(),
            clock.clone(),
            counters.clone(),
        );
        let store = Arc::new(InMemoryStore::with_ttl(cfg.store_ttl()));
        let coordinator = Arc::new(RevokeCoordinator::new(
            index,
            maintainer.clone(),
            store,
            clock,
            counters,
        ));

        let channel = Arc::new(BroadcastRevokeChannel::new());

        let probe = Arc::new(liveness::Probe::new(PROBE_TIMEOUT));
        probe.watch(vec![maintainer as Arc<dyn liveness::Service>]);

        let server = HttpServer::new(
            shutdown_token.clone(),
            cfg.clone(),
            Self::controllers(&coordinator, &channel, &probe),
        );

        Self {
            cfg,
            cfg_path,
            shutdown_token,
            settings,
            coordinator,
            channel,
            probe,
            server,
        }
    }

    /// Returns all HTTP controllers for the server.
    fn controllers(
        coordinator: &Arc<Coordinator>,
        channel: &Arc<BroadcastRevokeChannel>,
        probe: &Arc<liveness::Probe>,
    ) -> Vec<Box<dyn Controller>> {
        vec![
            // Healthcheck probe endpoint
            Box::new(controller::LivenessProbeController::new(probe.clone())),
            // Metrics endpoint
            Box::new(controller::PrometheusMetricsController::new()),
            // Publishes revokes
            Box::new(controller::RevokeController::new(
                channel.clone() as Arc<dyn RevokeChannel>
            )),
            // Index, queue and store sizes
            Box::new(controller::StatsController::new(
                coordinator.clone() as Arc<dyn RevokeStatsSource>
            )),
        ]
    }

    /// Entry point for the embedding proxy: wrap every cacheable call in
    /// [`RevokeCoordinator::get_or_populate`]. Until something does, the store
    /// stays empty and `/stats` reports `store_len: 0`.
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn channel(&self) -> &Arc<BroadcastRevokeChannel> {
        &self.channel
    }

    /// Hot-reloadable revoke settings shared with the maintainer and telemetry.
    pub fn settings(&self) -> &RevokeSettings {
        &self.settings
    }

    /// Admin API router, for serving without a socket.
    pub fn router(&self) -> Router {
        self.server.router()
    }

    /// Starts the revoke subsystem in the background: maintainer sweeps, the
    /// channel listener, telemetry and the config watcher.
    pub fn start(&self, gsh: &GracefulShutdown) {
        self.coordinator.maintainer().start();

        gsh.spawn(listener::serve(
            self.coordinator.clone() as Arc<dyn RevokeHandler>,
            self.channel.subscribe(),
            self.shutdown_token.clone(),
        ));

        gsh.spawn(telemetry::logger(
            self.shutdown_token.clone(),
            self.coordinator.counters().clone(),
            self.coordinator.index().clone(),
            self.coordinator.maintainer().clone(),
            self.settings.clone(),
        ));

        if let Some(ttl) = self.coordinator.store().ttl() {
            gsh.spawn(in_memory::janitor(
                self.shutdown_token.clone(),
                self.coordinator.store().clone(),
                ttl,
            ));
        }

        if let (Some(path), Some(each)) = (self.cfg_path.clone(), self.cfg.reload_interval()) {
            gsh.spawn(watcher::watch(
                self.shutdown_token.clone(),
                path,
                self.settings.clone(),
                each,
            ));
        }
    }

    /// Starts the subsystem and the HTTP server. The app closes itself when
    /// the server stops.
    pub fn serve(&self, gsh: &GracefulShutdown) {
        self.start(gsh);

        let app = self.clone();
        gsh.spawn(async move {
            if let Err(e) = app.server.listen_and_serve().await {
                error!(
                    component = "app",
                    scope = "server",
                    event = "serve_failed",
                    error = %e,
                    "server failed to serve"
                );
            }
            app.close();
        });

        info!(component = "app", event = "started", "application lifecycle");
    }

    /// Alive while the maintainer keeps sweeping.
    pub fn is_alive(&self) -> bool {
        self.probe.is_alive()
    }

    /// True while the HTTP server accepts connections.
    pub fn is_serving(&self) -> bool {
        self.server.is_alive()
    }

    /// Stops sweeping and cancels every background task. Idempotent.
    pub fn close(&self) {
        self.coordinator.maintainer().dispose();
        self.shutdown_token.cancel();

        info!(component = "app", event = "stopped", "application lifecycle");
    }
}

impl liveness::Service for RevokeQueueMaintainer {
    fn is_alive(&self, _timeout: Duration) -> bool {
        self.is_running()
    }
}
