use std::fmt::Write as _;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::context::RequestContext;

const COOKIE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";
const EXPIRED_COOKIE_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameSiteMode {
    Unspecified,
    None,
    #[default]
    Lax,
    Strict,
}

impl SameSiteMode {
    fn as_attribute(self) -> Option<&'static str> {
        match self {
            SameSiteMode::Unspecified => None,
            SameSiteMode::None => Some("none"),
            SameSiteMode::Lax => Some("lax"),
            SameSiteMode::Strict => Some("strict"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookieSecurePolicy {
    #[default]
    SameAsRequest,
    Always,
    None,
}

/// Settings a cookie is built from before it is appended to a response.
#[derive(Clone, Debug, Default)]
pub struct CookieBuilder {
    pub name: Option<String>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub http_only: bool,
    pub same_site: SameSiteMode,
    pub secure_policy: CookieSecurePolicy,
    pub is_essential: bool,
    pub expiration: Option<Duration>,
    pub max_age: Option<Duration>,
}

impl CookieBuilder {
    /// Builds cookie options for the current request.
    ///
    /// Without an explicit path the cookie is scoped to the original path base
    /// followed by `additional_path`, falling back to `/`.
    pub fn build(
        &self,
        context: &RequestContext,
        expires_from: DateTime<Utc>,
        additional_path: Option<&str>,
    ) -> CookieOptions {
        let path = self.path.clone().unwrap_or_else(|| {
            format!(
                "{}{}",
                context.original_path_base(),
                additional_path.unwrap_or_default()
            )
        });

        let secure = match self.secure_policy {
            CookieSecurePolicy::SameAsRequest => context.is_https(),
            CookieSecurePolicy::Always => true,
            CookieSecurePolicy::None => false,
        };

        CookieOptions {
            path: if path.is_empty() { "/".to_string() } else { path },
            domain: self.domain.clone(),
            expires: self.expiration.map(|expiration| expires_from + expiration),
            max_age: self.max_age,
            secure,
            same_site: self.same_site,
            http_only: self.http_only,
            is_essential: self.is_essential,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CookieOptions {
    pub path: String,
    pub domain: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<Duration>,
    pub secure: bool,
    pub same_site: SameSiteMode,
    pub http_only: bool,
    pub is_essential: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            domain: None,
            expires: None,
            max_age: None,
            secure: false,
            same_site: SameSiteMode::Lax,
            http_only: false,
            is_essential: false,
        }
    }
}

impl CookieOptions {
    /// Renders a `Set-Cookie` header value.
    pub fn set_cookie_value(&self, name: &str, value: &str) -> String {
        let expires = self
            .expires
            .map(|expires| expires.format(COOKIE_DATE_FORMAT).to_string());
        self.render(name, value, expires.as_deref())
    }

    /// Renders a `Set-Cookie` header value that expires the cookie.
    pub fn delete_cookie_value(&self, name: &str) -> String {
        let options = CookieOptions {
            max_age: None,
            ..self.clone()
        };
        options.render(name, "", Some(EXPIRED_COOKIE_DATE))
    }

    fn render(&self, name: &str, value: &str, expires: Option<&str>) -> String {
        let mut header = format!("{name}={value}");
        if let Some(expires) = expires {
            let _ = write!(header, "; expires={expires}");
        }
        if let Some(max_age) = self.max_age {
            let _ = write!(header, "; max-age={}", max_age.num_seconds());
        }
        if let Some(domain) = &self.domain {
            let _ = write!(header, "; domain={domain}");
        }
        let _ = write!(header, "; path={}", self.path);
        if self.secure {
            header.push_str("; secure");
        }
        if let Some(same_site) = self.same_site.as_attribute() {
            let _ = write!(header, "; samesite={same_site}");
        }
        if self.http_only {
            header.push_str("; httponly");
        }
        header
    }
}
