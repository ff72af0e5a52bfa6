//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use svc_pipeline::config::{CipherConfig, EncryptionConfig, ServiceConfig};
use svc_pipeline::error::{PipelineError, ValidationErrors};
use svc_pipeline::http::{AppState, HttpServer, Pipeline, Reply, RequestContext, Rules, Validate};
use svc_pipeline::lifecycle::Shutdown;

pub const KEY: &str = "0123456789abcdef";

#[derive(Debug, Serialize, Deserialize)]
pub struct Item {
    pub a: i64,
}

#[derive(Debug, Deserialize)]
pub struct Search {
    pub name: String,
}

impl Validate for Search {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Rules::new().required("name", &self.name).finish()
    }
}

/// A running test server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    #[allow(dead_code)]
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked");
    }
}

/// Config with the cipher on and the encryption feature set to `encryption`.
pub fn config(encryption: bool) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.cipher = CipherConfig {
        enabled: true,
        key: KEY.into(),
    };
    config.encryption = EncryptionConfig {
        enabled: encryption,
    };
    config
}

/// Routes covering every response shape.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/answer", get(answer))
        .route("/items", post(create_item))
        .route("/search", get(search))
        .route("/silent", post(silent))
        .route("/text", get(text))
}

async fn answer(ctx: RequestContext) -> Reply {
    Pipeline::none()
        .run(ctx, |()| async { Ok::<_, PipelineError>(42) })
        .await
}

async fn create_item(ctx: RequestContext) -> Reply {
    Pipeline::<Item>::json()
        .encrypted(true)
        .run(ctx, |item| async move { Ok::<_, PipelineError>(item) })
        .await
}

async fn search(ctx: RequestContext) -> Reply {
    Pipeline::<Search>::query()
        .validated()
        .encrypted(true)
        .run(ctx, |s| async move { Ok::<_, PipelineError>(vec![s.name]) })
        .await
}

async fn silent(ctx: RequestContext) -> Reply {
    Pipeline::none()
        .run(ctx, |()| async { Err::<u8, PipelineError>(PipelineError::NoReturn) })
        .await
}

async fn text(ctx: RequestContext) -> Reply {
    Pipeline::none()
        .encrypted(true)
        .run(ctx, |()| async { Ok::<_, PipelineError>("ok") })
        .await
}

/// Start a server on an ephemeral port.
pub async fn start_server(config: ServiceConfig) -> TestServer {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, routes());
    let rx = shutdown.subscribe();

    let handle = tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// Client that bypasses any system proxy.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
