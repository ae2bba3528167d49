use std::convert::Infallible;
use std::fmt::Debug;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::http::request::Parts;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::pin;
use tracing::{debug, error, info, instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use translate_pipeline::metrics_provider::{IN_FLIGHT_REQUESTS, METRICS_PROVIDER};
use translate_pipeline::resources::Locale;
use translate_pipeline::{ClaimsPrincipal, Flow, RequestContext};

use crate::command::server::error::Error;
use crate::command::server::ServerContext;

const HEALTH_PATH: &str = "/health";
const METRICS_PATH: &str = "/metrics";
const ADMIN_PATH_PREFIX: &str = "/admin";
const ADMIN_ROLE: &str = "admin";

type ResponseBody = Full<Bytes>;

fn update_in_flight_gauge() {
    METRICS_PROVIDER.metric_http_request_in_flight.set(
        i64::try_from(IN_FLIGHT_REQUESTS.load(Ordering::Relaxed)).unwrap_or(i64::MAX),
    );
}

pub async fn serve_request<S>(
    stream: TokioIo<S>,
    context: Arc<ServerContext>,
    timeouts: Arc<[Duration; 2]>,
    remote_address: std::net::SocketAddr,
) where
    S: Unpin + AsyncWrite + AsyncRead + Send + Debug + 'static,
{
    let conn = http1::Builder::new().serve_connection(
        stream,
        service_fn(move |mut request| {
            request.extensions_mut().insert(remote_address);
            handle_request(Arc::clone(&context), request)
        }),
    );
    pin!(conn);

    IN_FLIGHT_REQUESTS.fetch_add(1, Ordering::Relaxed);
    update_in_flight_gauge();

    for (iter, sleep_duration) in timeouts.iter().enumerate() {
        debug!("iter = {iter} sleep_duration = {sleep_duration:?}");
        tokio::select! {
            res = conn.as_mut() => {
                match res {
                    Ok(()) => debug!("after polling conn, no error"),
                    Err(error) =>  debug!("error serving connection: {error}"),
                }
                break;
            }
            () = tokio::time::sleep(*sleep_duration) => {
                debug!("iter = {iter} got timeout_interval, calling conn.graceful_shutdown");
                conn.as_mut().graceful_shutdown();
            }
        }
    }

    IN_FLIGHT_REQUESTS.fetch_sub(1, Ordering::Relaxed);
    update_in_flight_gauge();
}

#[instrument(skip(context, request))]
async fn handle_request(
    context: Arc<ServerContext>,
    request: Request<Incoming>,
) -> Result<Response<ResponseBody>, Infallible> {
    let start_time = Instant::now();
    let (parts, _incoming) = request.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_owned();

    let trace_id = {
        let context = Span::current().context();
        let span = context.span();
        let span_context = span.span_context();
        if span_context.is_valid() {
            Some(span_context.trace_id().to_string())
        } else {
            None
        }
    };

    let response = match router(&context, parts).await {
        Ok(response) => response,
        Err(error) => error_to_response(&error, context.service.locale(), trace_id.as_ref()),
    };

    #[allow(clippy::cast_precision_loss)]
    let elapsed = start_time.elapsed().as_millis() as f64;
    let status = response.status();

    METRICS_PROVIDER.metric_http_request_total.inc();
    METRICS_PROVIDER.metric_http_request_duration.observe(elapsed);

    let log = if let Some(trace_id) = trace_id {
        format!("{trace_id} {elapsed:?} - {status} {method} {path}")
    } else {
        format!("{elapsed:?} - {status} {method} {path}")
    };

    if status.is_server_error() {
        error!("{log}");
    } else {
        info!("{log}");
    }

    Ok(response)
}

#[instrument(skip(context, parts))]
async fn router(context: &ServerContext, parts: Parts) -> Result<Response<ResponseBody>, Error> {
    match parts.uri.path() {
        HEALTH_PATH => Ok(json_response(StatusCode::OK, &json!({ "status": "ok" }))),
        METRICS_PATH => handle_metrics(),
        _ => handle_translated_request(context, parts).await,
    }
}

fn handle_metrics() -> Result<Response<ResponseBody>, Error> {
    let (content_type, body) = METRICS_PROVIDER.gather()?;
    let content_type = HeaderValue::from_str(&content_type)
        .map_err(|error| Error::Internal(format!("Invalid metrics content type: {error}")))?;

    let mut response = Response::new(Full::new(Bytes::from(body)));
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    Ok(response)
}

/// Runs the pipeline, then answers with the translated user or lets a scheme
/// challenge or forbid the request.
async fn handle_translated_request(
    context: &ServerContext,
    parts: Parts,
) -> Result<Response<ResponseBody>, Error> {
    let request =
        RequestContext::with_path_base(parts, &context.path_base, Arc::clone(&context.service));

    let body = match context.middleware.process(&request).await? {
        Flow::Stop => None,
        Flow::Continue => match request.user() {
            None => {
                context.service.challenge(&request, None, None).await?;
                None
            }
            Some(user)
                if request.path().starts_with(ADMIN_PATH_PREFIX) && !user.is_in_role(ADMIN_ROLE) =>
            {
                context.service.forbid(&request, None, None).await?;
                None
            }
            Some(user) => Some(user_document(&user)),
        },
    };

    let (status, headers) = request.take_response();
    let mut response = match body {
        Some(body) => json_response(status, &body),
        None => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = status;
            response
        }
    };
    response.headers_mut().extend(headers);
    Ok(response)
}

fn user_document(user: &ClaimsPrincipal) -> serde_json::Value {
    json!({
        "name": user.name(),
        "authentication_type": user.identity().and_then(|identity| identity.authentication_type.as_deref()),
        "claims": user.claims().collect::<Vec<_>>(),
    })
}

fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn error_to_response(
    error: &Error,
    locale: Locale,
    request_id: Option<&String>,
) -> Response<ResponseBody> {
    json_response(error.status_code(), &error.as_json(locale, request_id))
}
