//! Generic request pipeline.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → bind      (query / json / form / custom, or a given value)
//!     → validate  (optional, field rules)
//!     → check     (optional, business invariant)
//!     → handler   (Req → Result<Resp, PipelineError>)
//!     → Reply     (envelope, raw text, or suppressed)
//! ```
//!
//! # Design Decisions
//! - One generic run path; routes choose behaviour by the collaborators
//!   they configure, not by calling different entry points
//! - Bind, validate and check failures never reach the handler and all
//!   produce a 400 envelope
//! - [`PipelineError::NoReturn`] from the handler suppresses the reply
//! - A `String`, `&'static str` or `Cow<'static, str>` response is written as
//!   raw text; every other type, including ones that serialize to a JSON
//!   string, goes into the envelope

use std::any::Any;
use std::borrow::Cow;
use std::future::Future;

use axum::response::{IntoResponse, Response};
use axum::http::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::PipelineError;
use crate::http::binding::{bind_form, bind_json, bind_query, Check, Validate};
use crate::http::context::RequestContext;
use crate::observability::metrics;

/// Populates a request value from the context.
pub type BindFn<Req> = fn(&mut RequestContext) -> Result<Req, PipelineError>;

/// A validation or check step.
pub type StepFn<Req> = fn(&Req) -> Result<(), PipelineError>;

/// Stage at which a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Bind,
    Validate,
    Check,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Self::Bind => "bind",
            Self::Validate => "validate",
            Self::Check => "check",
        }
    }
}

enum Source<Req> {
    Given(Req),
    Bind(BindFn<Req>),
}

/// Outcome of a pipeline run.
#[derive(Debug)]
pub enum Reply {
    /// A response was produced.
    Written(Response),
    /// The handler asked for no response.
    Suppressed,
}

impl Reply {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed)
    }

    pub fn into_response_opt(self) -> Option<Response> {
        match self {
            Self::Written(res) => Some(res),
            Self::Suppressed => None,
        }
    }
}

impl IntoResponse for Reply {
    /// A suppressed reply becomes a bare 200 with no body.
    fn into_response(self) -> Response {
        match self {
            Self::Written(res) => res,
            Self::Suppressed => StatusCode::OK.into_response(),
        }
    }
}

/// Bind → validate → check → invoke → respond, generic over the request
/// type. Each step runs only if configured.
pub struct Pipeline<Req> {
    source: Source<Req>,
    validate: Option<StepFn<Req>>,
    check: Option<StepFn<Req>>,
    encrypt: bool,
}

impl Pipeline<()> {
    /// No request input.
    pub fn none() -> Self {
        Self::given(())
    }
}

impl<Req> Pipeline<Req> {
    /// Skip binding and use `req` as is.
    pub fn given(req: Req) -> Self {
        Self::from_source(Source::Given(req))
    }

    /// Bind with a custom function.
    pub fn bind_with(bind: BindFn<Req>) -> Self {
        Self::from_source(Source::Bind(bind))
    }

    fn from_source(source: Source<Req>) -> Self {
        Self {
            source,
            validate: None,
            check: None,
            encrypt: false,
        }
    }

    pub fn validate_with(mut self, validate: StepFn<Req>) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn check_with(mut self, check: StepFn<Req>) -> Self {
        self.check = Some(check);
        self
    }

    /// Opt this route into response encryption.
    pub fn encrypted(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    /// Bind, validate and check without invoking a handler.
    pub fn prepare(self, ctx: &mut RequestContext) -> Result<Req, (Stage, PipelineError)> {
        let req = match self.source {
            Source::Given(req) => req,
            Source::Bind(bind) => bind(ctx).map_err(|e| (Stage::Bind, e))?,
        };
        if let Some(validate) = self.validate {
            validate(&req).map_err(|e| (Stage::Validate, e))?;
        }
        if let Some(check) = self.check {
            check(&req).map_err(|e| (Stage::Check, e))?;
        }
        Ok(req)
    }

    /// Run the whole pipeline for one request.
    pub async fn run<Resp, F, Fut>(self, mut ctx: RequestContext, handler: F) -> Reply
    where
        F: FnOnce(Req) -> Fut,
        Fut: Future<Output = Result<Resp, PipelineError>>,
        Resp: Serialize + 'static,
    {
        let writer = ctx.writer(self.encrypt);

        let req = match self.prepare(&mut ctx) {
            Ok(req) => req,
            Err((stage, err)) => {
                tracing::debug!(
                    method = %ctx.method(),
                    path = %ctx.uri().path(),
                    stage = stage.as_str(),
                    error = %err,
                    "Request rejected"
                );
                metrics::record_response("bind_error");
                return Reply::Written(writer.bind_error(&err));
            }
        };

        let resp = match handler(req).await {
            Ok(resp) => resp,
            Err(err) if err.is_no_return() => {
                metrics::record_response("suppressed");
                return Reply::Suppressed;
            }
            Err(err) => {
                tracing::error!(
                    method = %ctx.method(),
                    path = %ctx.uri().path(),
                    error = %err,
                    "Handler failed"
                );
                metrics::record_response("server_error");
                return Reply::Written(writer.server_error(&err));
            }
        };

        if let Some(text) = plain_text(&resp) {
            metrics::record_response("text");
            return Reply::Written(writer.text(text));
        }

        match serde_json::to_value(resp) {
            Ok(Value::Null) => {
                metrics::record_response("success");
                Reply::Written(writer.success(None))
            }
            Ok(value) => {
                metrics::record_response("success");
                Reply::Written(writer.success(Some(value)))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response");
                metrics::record_response("server_error");
                Reply::Written(writer.server_error(&PipelineError::internal(e)))
            }
        }
    }
}

/// The response as raw text, if its type is a plain string.
fn plain_text<Resp: 'static>(resp: &Resp) -> Option<String> {
    let any = resp as &dyn Any;
    if let Some(text) = any.downcast_ref::<String>() {
        return Some(text.clone());
    }
    if let Some(text) = any.downcast_ref::<&'static str>() {
        return Some((*text).to_string());
    }
    any.downcast_ref::<Cow<'static, str>>().map(|text| text.to_string())
}

impl<Req: DeserializeOwned> Pipeline<Req> {
    /// Bind from the query string.
    pub fn query() -> Self {
        Self::bind_with(bind_query::<Req>)
    }

    /// Bind from a JSON body.
    pub fn json() -> Self {
        Self::bind_with(bind_json::<Req>)
    }

    /// Bind from form fields.
    pub fn form() -> Self {
        Self::bind_with(bind_form::<Req>)
    }
}

impl<Req: Validate> Pipeline<Req> {
    /// Run the request's [`Validate`] rules.
    pub fn validated(self) -> Self {
        self.validate_with(validate_step::<Req>)
    }
}

impl<Req: Check> Pipeline<Req> {
    /// Run the request's [`Check`] invariant.
    pub fn checked(self) -> Self {
        self.check_with(check_step::<Req>)
    }
}

fn validate_step<Req: Validate>(req: &Req) -> Result<(), PipelineError> {
    req.validate().map_err(PipelineError::from)
}

fn check_step<Req: Check>(req: &Req) -> Result<(), PipelineError> {
    req.check()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CipherConfig, EncryptionConfig};
    use crate::error::{BusinessError, ValidationErrors};
    use crate::http::binding::Rules;
    use crate::http::envelope::Envelope;
    use crate::http::negotiation::{
        EncryptedPayload, RequestEncryptionState, Transport, ENCRYPTION_HEADER,
    };
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method, Uri};
    use serde::Deserialize;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Deserialize)]
    struct Signup {
        name: String,
        age: u32,
    }

    impl Validate for Signup {
        fn validate(&self) -> Result<(), ValidationErrors> {
            Rules::new()
                .required("name", &self.name)
                .range("age", self.age, 1, 150)
                .finish()
        }
    }

    impl Check for Signup {
        fn check(&self) -> Result<(), PipelineError> {
            if self.name == "root" {
                return Err(PipelineError::check("name is reserved"));
            }
            Ok(())
        }
    }

    fn ctx(method: Method, uri: &'static str, body: &'static [u8]) -> RequestContext {
        RequestContext::new(
            method,
            Uri::from_static(uri),
            HeaderMap::new(),
            Bytes::from_static(body),
            Transport::plaintext(),
        )
    }

    async fn body_of(reply: Reply) -> (StatusCode, String) {
        let res = reply.into_response_opt().expect("reply was suppressed");
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_no_input_success() {
        let reply = Pipeline::none()
            .run(ctx(Method::GET, "/x", b""), |()| async { Ok::<_, PipelineError>(42) })
            .await;
        assert_eq!(
            body_of(reply).await,
            (StatusCode::OK, r#"{"code":200,"msg":"","data":42}"#.to_string())
        );
    }

    #[tokio::test]
    async fn test_unit_response_omits_data() {
        let reply = Pipeline::<Signup>::json()
            .run(ctx(Method::POST, "/x", br#"{"name":"a","age":3}"#), |_req| async {
                Ok::<_, PipelineError>(())
            })
            .await;
        assert_eq!(body_of(reply).await.1, r#"{"code":200,"msg":""}"#);
    }

    #[tokio::test]
    async fn test_bound_request_reaches_handler() {
        let reply = Pipeline::<Signup>::query()
            .validated()
            .checked()
            .run(ctx(Method::GET, "/x?name=ann&age=30", b""), |req| async move {
                Ok::<_, PipelineError>(format!("{}:{}", req.name, req.age))
            })
            .await;
        // String responses bypass the envelope.
        assert_eq!(body_of(reply).await, (StatusCode::OK, "ann:30".to_string()));
    }

    #[tokio::test]
    async fn test_string_like_types_use_envelope() {
        let reply = Pipeline::none()
            .run(ctx(Method::GET, "/x", b""), |()| async {
                Ok::<_, PipelineError>(Some("bob".to_string()))
            })
            .await;
        assert_eq!(body_of(reply).await.1, r#"{"code":200,"msg":"","data":"bob"}"#);

        let reply = Pipeline::none()
            .run(ctx(Method::GET, "/x", b""), |()| async {
                Ok::<Option<String>, PipelineError>(None)
            })
            .await;
        assert_eq!(body_of(reply).await.1, r#"{"code":200,"msg":""}"#);

        let reply = Pipeline::none()
            .run(ctx(Method::GET, "/x", b""), |()| async { Ok::<_, PipelineError>('x') })
            .await;
        assert_eq!(body_of(reply).await.1, r#"{"code":200,"msg":"","data":"x"}"#);
    }

    #[tokio::test]
    async fn test_plain_string_types_are_raw_text() {
        let reply = Pipeline::none()
            .run(ctx(Method::GET, "/x", b""), |()| async { Ok::<_, PipelineError>("ok") })
            .await;
        assert_eq!(body_of(reply).await.1, "ok");

        let reply = Pipeline::none()
            .run(ctx(Method::GET, "/x", b""), |()| async {
                Ok::<_, PipelineError>(Cow::<'static, str>::Borrowed("cow"))
            })
            .await;
        assert_eq!(body_of(reply).await.1, "cow");
    }

    #[tokio::test]
    async fn test_bind_failure_skips_handler() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let reply = Pipeline::<Signup>::json()
            .run(ctx(Method::POST, "/x", b"not json"), move |_req| async move {
                flag.store(true, Ordering::SeqCst);
                Ok::<_, PipelineError>(())
            })
            .await;
        let (status, body) = body_of(reply).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.starts_with(r#"{"code":400,"msg":"expected"#), "{body}");
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_validation_failure_joins_messages() {
        let reply = Pipeline::<Signup>::json()
            .validated()
            .run(ctx(Method::POST, "/x", br#"{"name":"","age":0}"#), |_req| async {
                Ok::<_, PipelineError>(())
            })
            .await;
        assert_eq!(
            body_of(reply).await,
            (
                StatusCode::BAD_REQUEST,
                r#"{"code":400,"msg":"name is required, age must be between 1 and 150"}"#
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_validation_skipped_when_not_configured() {
        let reply = Pipeline::<Signup>::json()
            .run(ctx(Method::POST, "/x", br#"{"name":"","age":0}"#), |_req| async {
                Ok::<_, PipelineError>(())
            })
            .await;
        assert_eq!(body_of(reply).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_check_failure_is_bad_request() {
        let reply = Pipeline::<Signup>::json()
            .validated()
            .checked()
            .run(ctx(Method::POST, "/x", br#"{"name":"root","age":40}"#), |_req| async {
                Ok::<_, PipelineError>(())
            })
            .await;
        assert_eq!(
            body_of(reply).await,
            (StatusCode::BAD_REQUEST, r#"{"code":400,"msg":"name is reserved"}"#.to_string())
        );
    }

    #[test]
    fn test_prepare_reports_stage() {
        let mut c = ctx(Method::POST, "/x", br#"{"name":"root","age":0}"#);
        let (stage, _) = Pipeline::<Signup>::json()
            .validated()
            .checked()
            .prepare(&mut c)
            .unwrap_err();
        assert_eq!(stage, Stage::Validate);

        let mut c = ctx(Method::POST, "/x", br#"{"name":"root","age":9}"#);
        let (stage, _) = Pipeline::<Signup>::json()
            .validated()
            .checked()
            .prepare(&mut c)
            .unwrap_err();
        assert_eq!(stage, Stage::Check);

        let mut c = ctx(Method::POST, "/x", b"");
        let (stage, _) = Pipeline::<Signup>::json().prepare(&mut c).unwrap_err();
        assert_eq!(stage, Stage::Bind);
    }

    #[tokio::test]
    async fn test_sentinel_suppresses_reply() {
        let reply = Pipeline::none()
            .run(ctx(Method::GET, "/x", b""), |()| async {
                Err::<u8, _>(PipelineError::NoReturn)
            })
            .await;
        assert!(reply.is_suppressed());

        let res = reply.into_response();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_handler_error_is_server_error() {
        let reply = Pipeline::none()
            .run(ctx(Method::GET, "/x", b""), |()| async {
                Err::<u8, _>(PipelineError::internal("db down"))
            })
            .await;
        assert_eq!(
            body_of(reply).await,
            (StatusCode::INTERNAL_SERVER_ERROR, r#"{"code":500,"msg":"db down"}"#.to_string())
        );
    }

    #[tokio::test]
    async fn test_business_error_overrides() {
        let reply = Pipeline::none()
            .run(ctx(Method::GET, "/x", b""), |()| async {
                let err = BusinessError::new("taken").with_codes(StatusCode::CONFLICT, 1001);
                Err::<u8, PipelineError>(err.into())
            })
            .await;
        assert_eq!(
            body_of(reply).await,
            (StatusCode::CONFLICT, r#"{"code":1001,"msg":"taken"}"#.to_string())
        );
    }

    #[tokio::test]
    async fn test_given_request_skips_binding() {
        let reply = Pipeline::given(Signup { name: "".into(), age: 0 })
            .validated()
            .run(ctx(Method::POST, "/x", b"ignored"), |_req| async {
                Ok::<_, PipelineError>(())
            })
            .await;
        assert_eq!(body_of(reply).await.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_encrypted_round_trip() {
        let transport = Transport::new(
            &CipherConfig {
                enabled: true,
                key: "0123456789abcdef".into(),
            },
            &EncryptionConfig { enabled: true },
        );
        let ciphertext = transport.codec().encrypt(br#"{"name":"zed","age":5}"#).unwrap();
        let staged = transport.codec().decrypt(ciphertext.as_bytes()).unwrap();
        let ctx = RequestContext::new(
            Method::POST,
            Uri::from_static("/x"),
            HeaderMap::new(),
            Bytes::from(ciphertext),
            transport.clone(),
        )
        .with_encryption(RequestEncryptionState::new(EncryptedPayload::Body(staged.into())));

        let reply = Pipeline::<Signup>::json()
            .validated()
            .encrypted(true)
            .run(ctx, |req| async move { Ok::<_, PipelineError>(vec![req.age]) })
            .await;

        let res = reply.into_response_opt().unwrap();
        assert_eq!(res.headers().get(ENCRYPTION_HEADER).unwrap(), "Yes");
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let plain = transport.codec().decrypt(&bytes).unwrap();
        let envelope: Envelope = serde_json::from_slice(&plain).unwrap();
        assert_eq!(envelope.code, 200);
        assert_eq!(envelope.data, Some(serde_json::json!([5])));
    }
}
