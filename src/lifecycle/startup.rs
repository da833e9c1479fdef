//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the request filters shared by all applications
//! - Instantiate each active plugin through the registry and initialize it
//! - Bind one acceptor per application and begin accepting traffic
//!
//! # Design Decisions
//! - Applications start in configuration order
//! - A plugin that fails to build, initialize or bind is logged and skipped
//! - Startup fails only when no application could be started

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::{PluginConfig, ServerConfig};
use crate::lifecycle::registry::{PluginContext, Registry};
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{Acceptor, ConnectionTracker, ListenerError};
use crate::request::InitError;
use crate::security::RequestFilters;

/// Error type for startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("application `{app}`: no plugin registered for class `{class}`")]
    UnknownClass { app: String, class: String },

    #[error("application `{app}`: initialization failed: {source}")]
    Init {
        app: String,
        #[source]
        source: InitError,
    },

    #[error("application `{app}`: {source}")]
    Listener {
        app: String,
        #[source]
        source: ListenerError,
    },

    #[error("no application could be started")]
    NothingStarted,
}

/// One application accepting connections.
#[derive(Debug)]
pub struct RunningApp {
    pub name: String,
    pub addr: SocketAddr,
    tracker: ConnectionTracker,
    task: JoinHandle<Result<(), ListenerError>>,
}

impl RunningApp {
    /// Connections of this application still open.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }
}

/// All started applications and their shared shutdown signal.
#[derive(Debug)]
pub struct RunningServer {
    apps: Vec<RunningApp>,
    failures: Vec<StartupError>,
    shutdown: Shutdown,
}

impl RunningServer {
    pub fn apps(&self) -> &[RunningApp] {
        &self.apps
    }

    /// Applications that were configured but did not start.
    pub fn failures(&self) -> &[StartupError] {
        &self.failures
    }

    /// Bound address of the named application.
    pub fn local_addr(&self, name: &str) -> Option<SocketAddr> {
        self.apps.iter().find(|a| a.name == name).map(|a| a.addr)
    }

    /// Stop accepting on every port. Open connections keep running.
    pub fn shutdown(&self) {
        tracing::info!(apps = self.apps.len(), "Stopping listeners");
        self.shutdown.trigger();
    }

    /// Wait for every acceptor to stop, then up to `drain` for open connections.
    pub async fn join(self, drain: Duration) {
        for app in self.apps {
            match app.task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(app = %app.name, error = %e, "Listener failed"),
                Err(e) => tracing::error!(app = %app.name, error = %e, "Listener task panicked"),
            }
            if !app.tracker.wait_for_drain(drain).await {
                tracing::warn!(
                    app = %app.name,
                    remaining = app.tracker.active_count(),
                    "Connections still open after drain deadline"
                );
            }
        }
    }
}

/// Start every active plugin of `config`.
pub async fn start(config: &ServerConfig, registry: Arc<Registry>) -> Result<RunningServer, StartupError> {
    let filters = Arc::new(RequestFilters::load(&config.security));
    let base = PluginContext {
        registry,
        handlers: Arc::from(config.handlers.clone()),
        filters,
        max_body_size: config.security.max_body_size,
        max_frame_size: config.websocket.max_frame_size,
    };
    let shutdown = Shutdown::new();

    let mut apps = Vec::new();
    let mut failures = Vec::new();
    for plugin in config.active_plugins() {
        match start_app(plugin, base.clone(), &shutdown).await {
            Ok(app) => {
                tracing::info!(app = %app.name, address = %app.addr, class = %plugin.class, "Application started");
                apps.push(app);
            }
            Err(e) => {
                tracing::error!(error = %e, "Application not started");
                failures.push(e);
            }
        }
    }

    if apps.is_empty() {
        return Err(StartupError::NothingStarted);
    }
    Ok(RunningServer {
        apps,
        failures,
        shutdown,
    })
}

async fn start_app(
    plugin: &PluginConfig,
    context: PluginContext,
    shutdown: &Shutdown,
) -> Result<RunningApp, StartupError> {
    let registry = Arc::clone(&context.registry);
    let mut handler = registry
        .create_plugin(&plugin.class, context)
        .ok_or_else(|| StartupError::UnknownClass {
            app: plugin.name.clone(),
            class: plugin.class.clone(),
        })?;
    handler.on_init(&plugin.init_map()).map_err(|source| StartupError::Init {
        app: plugin.name.clone(),
        source,
    })?;

    let listener_err = |source| StartupError::Listener {
        app: plugin.name.clone(),
        source,
    };
    let acceptor = Acceptor::bind(plugin.name.clone(), plugin.port, plugin.threads, Arc::from(handler))
        .await
        .map_err(listener_err)?;
    let addr = acceptor
        .local_addr()
        .map_err(|e| listener_err(ListenerError::Accept(e)))?;
    let tracker = acceptor.tracker();
    let task = tokio::spawn(acceptor.run(shutdown.subscribe()));

    Ok(RunningApp {
        name: plugin.name.clone(),
        addr,
        tracker,
        task,
    })
}
