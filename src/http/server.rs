//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Mount the application's routes on an Axum router
//! - Wire up middleware (encryption negotiation, timeout, tracing, request
//!   ID, CORS)
//! - Bind server to listener and shut down gracefully

use axum::{
    extract::FromRef,
    http::{HeaderName, HeaderValue, Method},
    middleware,
    Router,
};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer, ExposeHeaders},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{CorsConfig, ServiceConfig};
use crate::http::negotiation::{negotiate_encryption, Transport};
use crate::lifecycle::shutdown;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub transport: Transport,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Self {
        let transport = Transport::new(&config.cipher, &config.encryption);
        Self {
            transport,
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for Transport {
    fn from_ref(state: &AppState) -> Self {
        state.transport.clone()
    }
}

/// HTTP server hosting pipeline-backed routes.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a server serving `routes` under the given configuration.
    pub fn new(config: ServiceConfig, routes: Router<AppState>) -> Self {
        let state = AppState::new(config.clone());
        let router = Self::build_router(&config, state, routes);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState, routes: Router<AppState>) -> Router {
        let router = routes
            .layer(middleware::from_fn_with_state(
                state.transport.clone(),
                negotiate_encryption,
            ))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        if config.cors.enabled {
            router.layer(cors_layer(&config.cors))
        } else {
            router
        }
    }

    /// The fully layered router, e.g. for driving with `tower::ServiceExt`.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            encryption = self.config.encryption.enabled,
            cipher = self.config.cipher.enabled,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = if config.allow_origin.trim() == "*" {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(parse_list::<HeaderValue>(&config.allow_origin))
    };
    let headers = if config.allow_headers.trim() == "*" {
        AllowHeaders::any()
    } else {
        AllowHeaders::list(parse_list::<HeaderName>(&config.allow_headers))
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(AllowMethods::list(parse_list::<Method>(&config.allow_methods)))
        .allow_headers(headers)
        .expose_headers(ExposeHeaders::list(parse_list::<HeaderName>(&config.expose_headers)))
        .allow_credentials(config.allow_credentials)
}

/// Parse a comma-separated list, skipping (and logging) invalid entries.
fn parse_list<T>(raw: &str) -> Vec<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| match item.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(entry = item, error = %e, "Ignoring invalid CORS entry");
                None
            }
        })
        .collect()
}
