mod provider;

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

pub use provider::SchemeProvider;

use crate::error::Error;
use crate::handler::TranslateHandler;

/// Identifies the handler implementation backing a scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerType {
    id: TypeId,
    name: &'static str,
}

impl HandlerType {
    pub fn of<H: 'static>() -> Self {
        Self {
            id: TypeId::of::<H>(),
            name: type_name::<H>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn TranslateHandler> + Send + Sync>;

/// A named pairing of a handler implementation with display metadata.
#[derive(Clone)]
pub struct TranslateScheme {
    name: String,
    display_name: Option<String>,
    handler_type: HandlerType,
    handles_requests: bool,
    factory: HandlerFactory,
}

impl TranslateScheme {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` marks a scheme that is not meant to be shown to users.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn handler_type(&self) -> HandlerType {
        self.handler_type
    }

    /// Whether the handler participates in request handling before translation.
    pub fn handles_requests(&self) -> bool {
        self.handles_requests
    }

    pub fn create_handler(&self) -> Box<dyn TranslateHandler> {
        (self.factory)()
    }
}

impl fmt::Debug for TranslateScheme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TranslateScheme")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("handler_type", &self.handler_type.name())
            .field("handles_requests", &self.handles_requests)
            .finish_non_exhaustive()
    }
}

pub struct TranslateSchemeBuilder {
    name: String,
    display_name: Option<String>,
    handler: Option<(HandlerType, bool, HandlerFactory)>,
}

impl TranslateSchemeBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: None,
            handler: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&mut self, display_name: Option<&str>) -> &mut Self {
        self.display_name = display_name.map(ToString::to_string);
        self
    }

    /// Sets the handler type; `factory` creates one handler instance per request.
    pub fn handler<H, F>(&mut self, factory: F) -> &mut Self
    where
        H: TranslateHandler + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let factory: HandlerFactory =
            Arc::new(move || -> Box<dyn TranslateHandler> { Box::new(factory()) });
        self.handler = Some((HandlerType::of::<H>(), H::handles_requests(), factory));
        self
    }

    pub fn build(&self) -> Result<TranslateScheme, Error> {
        let Some((handler_type, handles_requests, factory)) = &self.handler else {
            return Err(Error::HandlerTypeMissing(self.name.clone()));
        };

        Ok(TranslateScheme {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            handler_type: *handler_type,
            handles_requests: *handles_requests,
            factory: Arc::clone(factory),
        })
    }
}
