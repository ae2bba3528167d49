use std::sync::{Arc, OnceLock};

use hyper::header::{AsHeaderName, HeaderName, HeaderValue, COOKIE, HOST, LOCATION, SET_COOKIE};
use hyper::http::request::Parts;
use hyper::{HeaderMap, Method, StatusCode};
use parking_lot::Mutex;

use crate::cookie::CookieOptions;
use crate::error::Error;
use crate::handler::HandlerProvider;
use crate::principal::ClaimsPrincipal;
use crate::resources::Locale;
use crate::service::TranslateService;

/// Path data recorded by the middleware before any handler runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslateFeature {
    pub original_path: String,
    pub original_path_base: String,
}

#[derive(Debug, Default)]
struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
}

/// Ambient state of one request flowing through the pipeline.
///
/// Carries the request head, a response status/header sink, the translated
/// user and the per-request handler instances.
pub struct RequestContext {
    parts: Parts,
    path_base: String,
    path: String,
    feature: OnceLock<TranslateFeature>,
    response: Mutex<ResponseState>,
    user: Mutex<Option<ClaimsPrincipal>>,
    handlers: HandlerProvider,
    service: Arc<TranslateService>,
}

impl RequestContext {
    pub fn new(parts: Parts, service: Arc<TranslateService>) -> Arc<Self> {
        Self::with_path_base(parts, "", service)
    }

    /// Creates a context for an application mounted under `path_base`.
    pub fn with_path_base(parts: Parts, path_base: &str, service: Arc<TranslateService>) -> Arc<Self> {
        let path_base = path_base.trim_end_matches('/').to_string();
        let full_path = parts.uri.path();
        let path = match full_path.strip_prefix(path_base.as_str()) {
            Some(rest) if !path_base.is_empty() && (rest.is_empty() || rest.starts_with('/')) => {
                rest.to_string()
            }
            _ => full_path.to_string(),
        };

        Arc::new(Self {
            parts,
            path_base,
            path,
            feature: OnceLock::new(),
            response: Mutex::new(ResponseState::default()),
            user: Mutex::new(None),
            handlers: HandlerProvider::default(),
            service,
        })
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn is_https(&self) -> bool {
        self.parts.uri.scheme_str() == Some("https")
    }

    pub fn scheme(&self) -> &str {
        if self.is_https() {
            "https"
        } else {
            "http"
        }
    }

    pub fn host(&self) -> &str {
        self.parts
            .uri
            .authority()
            .map(|authority| authority.as_str())
            .or_else(|| self.header(HOST))
            .unwrap_or("localhost")
    }

    pub fn path_base(&self) -> &str {
        &self.path_base
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_string(&self) -> Option<&str> {
        self.parts.uri.query()
    }

    pub fn query(&self, name: &str) -> Option<String> {
        let query = self.query_string()?;
        serde_urlencoded::from_str::<Vec<(String, String)>>(query)
            .ok()?
            .into_iter()
            .find_map(|(key, value)| (key == name).then_some(value))
    }

    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find_map(|(key, value)| (key == name).then(|| value.to_string()))
    }

    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.parts.extensions.get::<T>()
    }

    /// Records the original paths; the first recorded feature is kept.
    pub fn set_feature(&self, feature: TranslateFeature) {
        let _ = self.feature.set(feature);
    }

    pub fn feature(&self) -> Option<&TranslateFeature> {
        self.feature.get()
    }

    pub fn original_path(&self) -> &str {
        self.feature()
            .map_or(self.path.as_str(), |feature| feature.original_path.as_str())
    }

    pub fn original_path_base(&self) -> &str {
        self.feature().map_or(self.path_base.as_str(), |feature| {
            feature.original_path_base.as_str()
        })
    }

    /// The absolute URI of the current request.
    pub fn current_uri(&self) -> String {
        let mut uri = format!(
            "{}://{}{}{}",
            self.scheme(),
            self.host(),
            self.path_base,
            self.path
        );
        if let Some(query) = self.query_string() {
            uri.push('?');
            uri.push_str(query);
        }
        uri
    }

    /// Absolute URI for `target_path` under the original path base.
    pub fn build_redirect_uri(&self, target_path: &str) -> String {
        format!(
            "{}://{}{}{}",
            self.scheme(),
            self.host(),
            self.original_path_base(),
            target_path
        )
    }

    pub fn status(&self) -> StatusCode {
        self.response.lock().status
    }

    pub fn set_status(&self, status: StatusCode) {
        self.response.lock().status = status;
    }

    pub fn append_header(&self, name: HeaderName, value: &str) -> Result<(), Error> {
        let value = HeaderValue::from_str(value)
            .map_err(|error| Error::Failure(format!("Invalid header value for {name}: {error}")))?;
        self.response.lock().headers.append(name, value);
        Ok(())
    }

    pub fn response_headers(&self) -> HeaderMap {
        self.response.lock().headers.clone()
    }

    pub fn redirect(&self, location: &str) -> Result<(), Error> {
        let value = HeaderValue::from_str(location).map_err(|_| Error::InvalidReturnState)?;
        let mut response = self.response.lock();
        response.status = StatusCode::FOUND;
        response.headers.insert(LOCATION, value);
        Ok(())
    }

    pub fn append_cookie(&self, name: &str, value: &str, options: &CookieOptions) -> Result<(), Error> {
        self.append_header(SET_COOKIE, &options.set_cookie_value(name, value))
    }

    pub fn delete_cookie(&self, name: &str, options: &CookieOptions) -> Result<(), Error> {
        self.append_header(SET_COOKIE, &options.delete_cookie_value(name))
    }

    /// Takes the response written so far, leaving a default `200` response behind.
    pub fn take_response(&self) -> (StatusCode, HeaderMap) {
        let response = std::mem::take(&mut *self.response.lock());
        (response.status, response.headers)
    }

    pub fn user(&self) -> Option<ClaimsPrincipal> {
        self.user.lock().clone()
    }

    pub fn set_user(&self, user: Option<ClaimsPrincipal>) {
        *self.user.lock() = user;
    }

    pub fn handlers(&self) -> &HandlerProvider {
        &self.handlers
    }

    pub fn service(&self) -> &Arc<TranslateService> {
        &self.service
    }

    pub fn locale(&self) -> Locale {
        self.service.locale()
    }
}
