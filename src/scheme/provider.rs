use std::collections::HashMap;
use std::sync::Arc;

use crate::options::{Operation, SchemeDefaults};
use crate::scheme::TranslateScheme;

/// Frozen, read-only scheme registry.
#[derive(Debug)]
pub struct SchemeProvider {
    schemes: Vec<Arc<TranslateScheme>>,
    scheme_map: HashMap<String, Arc<TranslateScheme>>,
    defaults: SchemeDefaults,
}

impl SchemeProvider {
    pub(crate) fn new(schemes: Vec<TranslateScheme>, defaults: SchemeDefaults) -> Self {
        let schemes: Vec<_> = schemes.into_iter().map(Arc::new).collect();
        let scheme_map = schemes
            .iter()
            .map(|scheme| (scheme.name().to_string(), Arc::clone(scheme)))
            .collect();

        Self {
            schemes,
            scheme_map,
            defaults,
        }
    }

    pub fn get_scheme(&self, name: &str) -> Option<Arc<TranslateScheme>> {
        self.scheme_map.get(name).cloned()
    }

    /// All schemes in registration order.
    pub fn all_schemes(&self) -> &[Arc<TranslateScheme>] {
        &self.schemes
    }

    /// Schemes whose handler participates in request handling, in registration order.
    pub fn request_handler_schemes(&self) -> impl Iterator<Item = &Arc<TranslateScheme>> {
        self.schemes
            .iter()
            .filter(|scheme| scheme.handles_requests())
    }

    pub fn scheme_names(&self) -> Vec<String> {
        self.schemes
            .iter()
            .map(|scheme| scheme.name().to_string())
            .collect()
    }

    pub fn defaults(&self) -> &SchemeDefaults {
        &self.defaults
    }

    pub fn default_scheme_name(&self, operation: Operation) -> Option<&str> {
        self.defaults.resolve(operation)
    }
}
