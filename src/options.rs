use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::context::RequestContext;
use crate::error::Error;
use crate::handler::TranslateHandler;
use crate::resources::Locale;
use crate::scheme::{SchemeProvider, TranslateSchemeBuilder};

/// Pipeline operations a scheme can be resolved for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Translate,
    Challenge,
    Forbid,
    SignIn,
    SignOut,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Translate => "translate",
            Operation::Challenge => "challenge",
            Operation::Forbid => "forbid",
            Operation::SignIn => "sign-in",
            Operation::SignOut => "sign-out",
        }
    }

    pub fn metric_label(&self) -> &'static str {
        match self {
            Operation::Translate => "translate",
            Operation::Challenge => "challenge",
            Operation::Forbid => "forbid",
            Operation::SignIn => "sign_in",
            Operation::SignOut => "sign_out",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|value| !value.is_empty())
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SchemeDefaults {
    #[serde(default)]
    pub default_scheme: Option<String>,
    #[serde(default)]
    pub default_translate_scheme: Option<String>,
    #[serde(default)]
    pub default_challenge_scheme: Option<String>,
    #[serde(default)]
    pub default_forbid_scheme: Option<String>,
    #[serde(default)]
    pub default_sign_in_scheme: Option<String>,
    #[serde(default)]
    pub default_sign_out_scheme: Option<String>,
}

impl SchemeDefaults {
    /// Resolves the default scheme name for an operation, walking its fallback chain.
    pub fn resolve(&self, operation: Operation) -> Option<&str> {
        match operation {
            Operation::Translate => non_empty(self.default_translate_scheme.as_ref())
                .or_else(|| non_empty(self.default_scheme.as_ref())),
            Operation::Challenge => non_empty(self.default_challenge_scheme.as_ref())
                .or_else(|| self.resolve(Operation::Translate)),
            Operation::Forbid => non_empty(self.default_forbid_scheme.as_ref())
                .or_else(|| self.resolve(Operation::Challenge)),
            Operation::SignIn => non_empty(self.default_sign_in_scheme.as_ref())
                .or_else(|| non_empty(self.default_scheme.as_ref())),
            Operation::SignOut => non_empty(self.default_sign_out_scheme.as_ref())
                .or_else(|| self.resolve(Operation::SignIn)),
        }
    }
}

pub type ForwardSelector = Arc<dyn Fn(&RequestContext) -> Option<String> + Send + Sync>;

/// Per-operation forwarding targets of a scheme.
#[derive(Clone, Default, Deserialize)]
pub struct ForwardOptions {
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub translate: Option<String>,
    #[serde(default)]
    pub challenge: Option<String>,
    #[serde(default)]
    pub forbid: Option<String>,
    #[serde(default)]
    pub sign_in: Option<String>,
    #[serde(default)]
    pub sign_out: Option<String>,
    #[serde(skip)]
    pub default_selector: Option<ForwardSelector>,
}

impl ForwardOptions {
    /// Resolves the scheme an operation is forwarded to.
    ///
    /// The operation target wins over the selector, which wins over `default`.
    /// A target naming `own_scheme` is ignored.
    pub fn resolve(
        &self,
        operation: Operation,
        context: &RequestContext,
        own_scheme: &str,
    ) -> Option<String> {
        let specific = match operation {
            Operation::Translate => &self.translate,
            Operation::Challenge => &self.challenge,
            Operation::Forbid => &self.forbid,
            Operation::SignIn => &self.sign_in,
            Operation::SignOut => &self.sign_out,
        };

        let target = non_empty(specific.as_ref())
            .map(ToString::to_string)
            .or_else(|| {
                self.default_selector
                    .as_ref()
                    .and_then(|selector| selector(context))
                    .filter(|target| !target.is_empty())
            })
            .or_else(|| non_empty(self.default.as_ref()).map(ToString::to_string))?;

        (target != own_scheme).then_some(target)
    }
}

impl fmt::Debug for ForwardOptions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ForwardOptions")
            .field("default", &self.default)
            .field("translate", &self.translate)
            .field("challenge", &self.challenge)
            .field("forbid", &self.forbid)
            .field("sign_in", &self.sign_in)
            .field("sign_out", &self.sign_out)
            .field("default_selector", &self.default_selector.is_some())
            .finish()
    }
}

/// Configuration contract shared by every scheme's options type.
pub trait SchemeOptions: Default + Send + Sync + 'static {
    fn forward(&self) -> &ForwardOptions;

    fn claims_issuer(&self) -> Option<&str> {
        None
    }

    fn validate(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Validates the options as configured for `scheme`.
    fn validate_scheme(&self, _scheme: &str) -> Result<(), Error> {
        self.validate()
    }
}

/// Options with nothing beyond forwarding.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BaseSchemeOptions {
    #[serde(default)]
    pub forward: ForwardOptions,
    #[serde(default)]
    pub claims_issuer: Option<String>,
}

impl SchemeOptions for BaseSchemeOptions {
    fn forward(&self) -> &ForwardOptions {
        &self.forward
    }

    fn claims_issuer(&self) -> Option<&str> {
        self.claims_issuer.as_deref()
    }
}

/// Name-keyed store of scheme options.
pub struct OptionsMonitor<O> {
    named: HashMap<String, Arc<O>>,
    fallback: Arc<O>,
}

impl<O: SchemeOptions> Default for OptionsMonitor<O> {
    fn default() -> Self {
        Self {
            named: HashMap::new(),
            fallback: Arc::new(O::default()),
        }
    }
}

impl<O: SchemeOptions> OptionsMonitor<O> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(&mut self, name: &str, options: O) -> &mut Self {
        self.named.insert(name.to_string(), Arc::new(options));
        self
    }

    /// Returns the options configured for `name`, or the defaults.
    pub fn get(&self, name: &str) -> Arc<O> {
        self.named
            .get(name)
            .map_or_else(|| Arc::clone(&self.fallback), Arc::clone)
    }

    pub fn validate_all(&self) -> Result<(), Error> {
        for (name, options) in &self.named {
            options.validate_scheme(name)?;
        }
        Ok(())
    }
}

/// Scheme registrations and defaults, frozen by [`TranslateOptions::build`].
pub struct TranslateOptions {
    schemes: Vec<TranslateSchemeBuilder>,
    scheme_map: HashMap<String, usize>,
    pub defaults: SchemeDefaults,
    pub require_authenticated_sign_in: bool,
    pub locale: Locale,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            schemes: Vec::new(),
            scheme_map: HashMap::new(),
            defaults: SchemeDefaults::default(),
            require_authenticated_sign_in: true,
            locale: Locale::default(),
        }
    }
}

impl TranslateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a scheme. Names are unique and case-sensitive.
    pub fn add_scheme<F>(&mut self, name: &str, configure: F) -> Result<(), Error>
    where
        F: FnOnce(&mut TranslateSchemeBuilder),
    {
        if name.is_empty() {
            return Err(Error::InvalidSchemeName);
        }
        if self.scheme_map.contains_key(name) {
            return Err(Error::SchemeAlreadyExists(name.to_string()));
        }

        let mut builder = TranslateSchemeBuilder::new(name);
        configure(&mut builder);

        self.scheme_map.insert(name.to_string(), self.schemes.len());
        self.schemes.push(builder);
        Ok(())
    }

    pub fn add_handler<H, F>(
        &mut self,
        name: &str,
        display_name: Option<&str>,
        factory: F,
    ) -> Result<(), Error>
    where
        H: TranslateHandler + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.add_scheme(name, |builder| {
            builder.display_name(display_name).handler(factory);
        })
    }

    pub fn scheme(&self, name: &str) -> Option<&TranslateSchemeBuilder> {
        self.scheme_map.get(name).map(|index| &self.schemes[*index])
    }

    /// Registered scheme names in insertion order.
    pub fn scheme_names(&self) -> Vec<&str> {
        self.schemes.iter().map(TranslateSchemeBuilder::name).collect()
    }

    pub fn build(&self) -> Result<SchemeProvider, Error> {
        let schemes = self
            .schemes
            .iter()
            .map(TranslateSchemeBuilder::build)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SchemeProvider::new(schemes, self.defaults.clone()))
    }
}
