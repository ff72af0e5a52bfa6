//! svc-pipeline demo server.
//!
//! Serves a handful of endpoints, one per binding source and response
//! shape, behind the full middleware stack:
//!
//! ```text
//!   GET    /ping            no input, raw text reply
//!   GET    /users           query binding + validation
//!   GET    /users/{id}      path value handed to the pipeline as is
//!   POST   /users           JSON binding + validation + check, encrypted reply
//!   POST   /login           form binding
//!   DELETE /users/{id}      business error with status/code overrides
//!   POST   /events          handler writes nothing
//! ```

use std::path::PathBuf;

use axum::{
    extract::Path,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use svc_pipeline::config::loader::{load_config, load_from_env};
use svc_pipeline::crypto::CipherCodec;
use svc_pipeline::error::{BusinessError, PipelineError, ValidationErrors};
use svc_pipeline::http::{
    AppState, Check, HttpServer, Pipeline, Reply, RequestContext, Rules, Validate,
};
use svc_pipeline::lifecycle::Shutdown;
use svc_pipeline::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "svc-pipeline")]
#[command(about = "Demo server for the request pipeline", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults plus environment when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct UserQuery {
    name: String,
    #[serde(default = "default_page")]
    page: u32,
}

fn default_page() -> u32 {
    1
}

impl Validate for UserQuery {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Rules::new()
            .required("name", &self.name)
            .range("page", self.page, 1, 1000)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
    age: u32,
}

impl Validate for NewUser {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Rules::new()
            .required("name", &self.name)
            .max_len("name", &self.name, 64)
            .range("age", self.age, 1, 150)
            .finish()
    }
}

impl Check for NewUser {
    fn check(&self) -> Result<(), PipelineError> {
        if self.name.eq_ignore_ascii_case("admin") {
            return Err(PipelineError::check("name is reserved"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct User {
    id: u64,
    name: String,
    age: u32,
}

#[derive(Debug, Deserialize)]
struct Login {
    username: String,
    password: String,
}

impl Validate for Login {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Rules::new()
            .required("username", &self.username)
            .min_len("password", &self.password, 8)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct Session {
    user: String,
    token: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init(&config.observability);
    tracing::info!("svc-pipeline v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        cipher = config.cipher.enabled,
        encryption = config.encryption.enabled,
        "Configuration loaded"
    );

    if let Err(e) = CipherCodec::new(&config.cipher).verify_key() {
        tracing::warn!(error = %e, "Cipher key is unusable; encrypted payloads will fail");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        signal.trigger();
    });

    let server = HttpServer::new(config, routes());
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/users", get(search_users).post(create_user))
        .route("/users/{id}", get(get_user).delete(delete_user))
        .route("/login", post(login))
        .route("/events", post(ingest_event))
}

async fn ping(ctx: RequestContext) -> Reply {
    Pipeline::none()
        .run(ctx, |()| async { Ok::<_, PipelineError>("pong") })
        .await
}

async fn search_users(ctx: RequestContext) -> Reply {
    Pipeline::<UserQuery>::query()
        .validated()
        .encrypted(true)
        .run(ctx, |q| async move {
            Ok::<_, PipelineError>(vec![User {
                id: u64::from(q.page),
                name: q.name,
                age: 30,
            }])
        })
        .await
}

async fn get_user(Path(id): Path<u64>, ctx: RequestContext) -> Reply {
    Pipeline::given(id)
        .run(ctx, |id| async move {
            if id == 0 {
                return Err(PipelineError::from(
                    BusinessError::new("user not found").with_status(StatusCode::NOT_FOUND),
                ));
            }
            Ok(User {
                id,
                name: format!("user-{id}"),
                age: 30,
            })
        })
        .await
}

async fn create_user(ctx: RequestContext) -> Reply {
    Pipeline::<NewUser>::json()
        .validated()
        .checked()
        .encrypted(true)
        .run(ctx, |req| async move {
            tracing::info!(name = %req.name, "Creating user");
            Ok::<_, PipelineError>(User {
                id: 1,
                name: req.name,
                age: req.age,
            })
        })
        .await
}

async fn login(ctx: RequestContext) -> Reply {
    Pipeline::<Login>::form()
        .validated()
        .encrypted(true)
        .run(ctx, |req| async move {
            Ok::<_, PipelineError>(Session {
                token: format!("session-{}", req.username.len()),
                user: req.username,
            })
        })
        .await
}

async fn delete_user(Path(id): Path<u64>, ctx: RequestContext) -> Reply {
    Pipeline::given(id)
        .run(ctx, |id| async move {
            Err::<(), PipelineError>(
                BusinessError::new(format!("user {id} is locked"))
                    .with_codes(StatusCode::CONFLICT, 1001)
                    .into(),
            )
        })
        .await
}

async fn ingest_event(ctx: RequestContext) -> Reply {
    let size = ctx.body().len();
    Pipeline::none()
        .run(ctx, move |()| async move {
            tracing::debug!(bytes = size, "Event ingested");
            Err::<(), PipelineError>(PipelineError::NoReturn)
        })
        .await
}
