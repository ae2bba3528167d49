use serde::{Deserialize, Serialize};

use crate::principal::ClaimsPrincipal;
use crate::properties::TranslateProperties;

/// Proof of a successful translate: identity, session properties and the producing scheme.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranslateTicket {
    principal: ClaimsPrincipal,
    properties: TranslateProperties,
    translate_scheme: String,
}

impl TranslateTicket {
    pub fn new(
        principal: ClaimsPrincipal,
        properties: Option<TranslateProperties>,
        translate_scheme: &str,
    ) -> Self {
        Self {
            principal,
            properties: properties.unwrap_or_default(),
            translate_scheme: translate_scheme.to_string(),
        }
    }

    pub fn principal(&self) -> &ClaimsPrincipal {
        &self.principal
    }

    pub fn properties(&self) -> &TranslateProperties {
        &self.properties
    }

    pub fn translate_scheme(&self) -> &str {
        &self.translate_scheme
    }

    pub fn into_parts(self) -> (ClaimsPrincipal, TranslateProperties, String) {
        (self.principal, self.properties, self.translate_scheme)
    }
}
