use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};

use crate::context::RequestContext;
use crate::cookie::{CookieBuilder, CookieOptions, CookieSecurePolicy, SameSiteMode};
use crate::error::Error;
use crate::events::EventsSource;
use crate::options::{ForwardOptions, SchemeOptions};

pub const DEFAULT_CORRELATION_COOKIE_PREFIX: &str = ".Loonfactory.Correlation.";
pub const DEFAULT_RETURN_URL_PARAMETER: &str = "ReturnUrl";

/// Options of schemes driving an exchange with a remote party.
#[derive(Clone, Debug)]
pub struct RemoteTranslateOptions {
    pub forward: ForwardOptions,
    pub claims_issuer: Option<String>,
    /// Timeout for back-channel calls made by the scheme.
    pub backchannel_timeout: StdDuration,
    /// Path where the remote party returns the user agent; required.
    pub callback_path: Option<String>,
    pub access_denied_path: Option<String>,
    pub return_url_parameter: String,
    /// Scheme that persists the identity after the exchange; defaults to the sign-in default.
    pub sign_in_scheme: Option<String>,
    /// Maximum duration of the remote exchange, bounding the correlation cookie lifetime.
    pub remote_translate_timeout: Duration,
    pub events: EventsSource,
    pub save_tokens: bool,
    pub correlation_cookie: CookieBuilder,
}

impl Default for RemoteTranslateOptions {
    fn default() -> Self {
        Self {
            forward: ForwardOptions::default(),
            claims_issuer: None,
            backchannel_timeout: StdDuration::from_secs(60),
            callback_path: None,
            access_denied_path: None,
            return_url_parameter: DEFAULT_RETURN_URL_PARAMETER.to_string(),
            sign_in_scheme: None,
            remote_translate_timeout: Duration::minutes(15),
            events: EventsSource::default(),
            save_tokens: false,
            correlation_cookie: CookieBuilder {
                name: Some(DEFAULT_CORRELATION_COOKIE_PREFIX.to_string()),
                http_only: true,
                same_site: SameSiteMode::None,
                secure_policy: CookieSecurePolicy::SameAsRequest,
                is_essential: true,
                ..CookieBuilder::default()
            },
        }
    }
}

impl RemoteTranslateOptions {
    pub fn correlation_cookie_prefix(&self) -> &str {
        self.correlation_cookie
            .name
            .as_deref()
            .unwrap_or(DEFAULT_CORRELATION_COOKIE_PREFIX)
    }

    /// Cookie options for the correlation cookie, scoped to the callback path.
    ///
    /// Without a configured expiration the cookie lives as long as the remote exchange may.
    pub fn correlation_cookie_options(
        &self,
        context: &RequestContext,
        expires_from: DateTime<Utc>,
    ) -> CookieOptions {
        let mut options =
            self.correlation_cookie
                .build(context, expires_from, self.callback_path.as_deref());
        if options.expires.is_none() {
            options.expires = Some(expires_from + self.remote_translate_timeout);
        }
        options
    }
}

impl SchemeOptions for RemoteTranslateOptions {
    fn forward(&self) -> &ForwardOptions {
        &self.forward
    }

    fn claims_issuer(&self) -> Option<&str> {
        self.claims_issuer.as_deref()
    }

    fn validate(&self) -> Result<(), Error> {
        match self.callback_path.as_deref() {
            Some(path) if !path.is_empty() => Ok(()),
            _ => Err(Error::OptionMustBeProvided("CallbackPath".to_string())),
        }
    }

    fn validate_scheme(&self, scheme: &str) -> Result<(), Error> {
        self.validate()?;
        if self.sign_in_scheme.as_deref() == Some(scheme) {
            return Err(Error::RemoteSchemeCannotBeSelf(scheme.to_string()));
        }
        Ok(())
    }
}
