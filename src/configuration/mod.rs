use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::net::IpAddr;
use std::path::Path;

use serde::Deserialize;
use translate_pipeline::language_tag::LanguageTag;
use translate_pipeline::options::{ForwardOptions, SchemeDefaults, TranslateOptions};
use translate_pipeline::resources::Locale;

mod error;

pub use error::Error;

#[derive(Clone, Debug, Deserialize)]
pub struct Configuration {
    pub server: ServerConfig,
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub basic: BTreeMap<String, BasicSchemeConfig>, // scheme name <-> basic scheme configuration
    #[serde(default)]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    pub bind_address: IpAddr,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    #[serde(default = "ServerConfig::default_query_timeout")]
    pub query_timeout: u64,
    #[serde(default = "ServerConfig::default_query_timeout_grace_period")]
    pub query_timeout_grace_period: u64,
    #[serde(default)]
    pub path_base: String,
}

impl ServerConfig {
    fn default_port() -> u16 {
        8000
    }

    fn default_query_timeout() -> u64 {
        3600
    }

    fn default_query_timeout_grace_period() -> u64 {
        60
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "GlobalConfig::default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        GlobalConfig {
            max_concurrent_requests: GlobalConfig::default_max_concurrent_requests(),
        }
    }
}

impl GlobalConfig {
    fn default_max_concurrent_requests() -> usize {
        4
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TranslateConfig {
    /// BCP 47 tag selecting the language of error messages.
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(flatten)]
    pub defaults: SchemeDefaults,
    #[serde(default = "TranslateConfig::default_require_authenticated_sign_in")]
    pub require_authenticated_sign_in: bool,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        TranslateConfig {
            locale: None,
            defaults: SchemeDefaults::default(),
            require_authenticated_sign_in: Self::default_require_authenticated_sign_in(),
        }
    }
}

impl TranslateConfig {
    fn default_require_authenticated_sign_in() -> bool {
        true
    }

    pub fn locale(&self) -> Result<Locale, Error> {
        match &self.locale {
            None => Ok(Locale::default()),
            Some(tag) => LanguageTag::parse(tag)
                .map(|tag| Locale::from_language_tag(&tag))
                .ok_or_else(|| Error::InvalidLocale(tag.clone())),
        }
    }

    /// Builds pipeline options carrying the configured defaults, without any scheme.
    pub fn to_options(&self) -> Result<TranslateOptions, Error> {
        let mut options = TranslateOptions::new();
        options.defaults = self.defaults.clone();
        options.require_authenticated_sign_in = self.require_authenticated_sign_in;
        options.locale = self.locale()?;
        Ok(options)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct BasicSchemeConfig {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "BasicSchemeConfig::default_realm")]
    pub realm: String,
    #[serde(default)]
    pub claims_issuer: Option<String>,
    #[serde(default)]
    pub forward: ForwardOptions,
    #[serde(default)]
    pub identity: HashMap<String, IdentityConfig>, // identity_id <-> identity_config (username, password)
}

impl BasicSchemeConfig {
    fn default_realm() -> String {
        String::from("Translate Gateway")
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct IdentityConfig {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ObservabilityConfig {
    pub tracing: Option<TracingConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TracingConfig {
    pub endpoint: String,
    pub sampling_rate: f64,
}

impl Configuration {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_str = fs::read_to_string(path)?;
        Self::load_from_str(&config_str)
    }

    pub fn load_from_str(slice: &str) -> Result<Self, Error> {
        let config: Configuration = toml::from_str(slice)?;
        config.translate.locale()?;
        Ok(config)
    }
}
