//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the lockout endpoint, introspection API and proxy
//! - Wire up middleware (admission, tracing, timeout, request ID)
//! - Forward admitted requests to the upstream application
//! - Run the sweeper and apply config reloads while serving

use axum::{
    body::Body,
    extract::{FromRef, State},
    http::{
        uri::{Authority, PathAndQuery, Scheme},
        Request, StatusCode, Uri, Version,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::admin;
use crate::admission::Admission;
use crate::config::validation::validate_config;
use crate::config::{ConfigError, GuardConfig, ValidationError};
use crate::http::lockout::lockout_handler;
use crate::http::middleware::admission_middleware;
use crate::observability::metrics;
use crate::security::sweeper::Sweeper;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<Admission>,
    pub client: Client<HttpConnector, Body>,
    pub upstream: Authority,
    pub admin_api_key: Arc<str>,
    pub started_at: Instant,
}

impl FromRef<AppState> for Arc<Admission> {
    fn from_ref(state: &AppState) -> Self {
        state.admission.clone()
    }
}

/// HTTP server fronting the upstream application.
pub struct HttpServer {
    router: Router,
    config: GuardConfig,
    admission: Arc<Admission>,
}

impl HttpServer {
    /// Validate `config` and build a server with fresh stores.
    pub fn new(config: GuardConfig) -> Result<Self, ConfigError> {
        let admission = Arc::new(Admission::new(&config));
        Self::with_admission(config, admission)
    }

    /// Build a server around existing stores.
    pub fn with_admission(config: GuardConfig, admission: Arc<Admission>) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let upstream = Authority::from_str(&config.upstream.address).map_err(|_| {
            ConfigError::Validation(vec![ValidationError::BadUpstream(
                config.upstream.address.clone(),
            )])
        })?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            admission: admission.clone(),
            client,
            upstream,
            admin_api_key: Arc::from(config.admin.api_key.as_str()),
            started_at: Instant::now(),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            admission,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GuardConfig, state: AppState) -> Router {
        let mut app = Router::new().route(&config.routes.lockout_path, post(lockout_handler));
        if config.admin.enabled {
            app = app.merge(admin::setup_admin_router(state.clone()));
        }

        // Timeout sits inside admission so a 408 is still finalized with headers.
        app.fallback(proxy_handler)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn_with_state(
                state.admission.clone(),
                admission_middleware,
            ))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configs received on `config_updates` replace the admission policy.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GuardConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.address,
            "HTTP server starting"
        );

        let sweeper = Sweeper::new(self.admission.clone(), self.config.maintenance.clone());
        tokio::spawn(sweeper.run(shutdown.resubscribe()));

        let admission = self.admission.clone();
        let startup_config = self.config.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(new_config) => apply_reload(&admission, &startup_config, &new_config),
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn admission(&self) -> &Arc<Admission> {
        &self.admission
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }
}

fn apply_reload(admission: &Admission, startup: &GuardConfig, new_config: &GuardConfig) {
    if let Err(errors) = validate_config(new_config) {
        metrics::record_config_reload(false);
        tracing::error!(
            error = %ConfigError::Validation(errors),
            "Rejected config update, keeping current configuration"
        );
        return;
    }
    let ignored = restart_required(startup, new_config);
    if !ignored.is_empty() {
        tracing::warn!(
            sections = %ignored.join(", "),
            "Config changes take effect only after a restart"
        );
    }
    admission.apply_config(new_config);
    metrics::record_config_reload(true);
}

/// Settings baked into the listener, router or upstream client at startup.
fn restart_required(startup: &GuardConfig, new_config: &GuardConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if new_config.listener != startup.listener {
        changed.push("listener");
    }
    if new_config.upstream != startup.upstream {
        changed.push("upstream");
    }
    if new_config.admin != startup.admin {
        changed.push("admin");
    }
    if new_config.timeouts != startup.timeouts {
        changed.push("timeouts");
    }
    if new_config.routes.lockout_path != startup.routes.lockout_path {
        changed.push("routes.lockout_path");
    }
    if new_config.maintenance != startup.maintenance {
        changed.push("maintenance");
    }
    if new_config.observability != startup.observability {
        changed.push("observability");
    }
    changed
}

/// Forward an admitted request to the upstream application.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(state.upstream.clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };
    parts.version = Version::HTTP_11;

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        uri = %parts.uri,
        "Forwarding request"
    );

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
