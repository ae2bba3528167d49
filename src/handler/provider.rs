use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::context::RequestContext;
use crate::error::Error;
use crate::handler::TranslateHandler;
use crate::scheme::TranslateScheme;

pub type SharedHandler = Arc<tokio::sync::Mutex<Box<dyn TranslateHandler>>>;

/// Per-request cache holding one initialized handler per scheme.
#[derive(Default)]
pub struct HandlerProvider {
    handlers: Mutex<HashMap<String, SharedHandler>>,
    initializing: Mutex<HashSet<String>>,
}

impl HandlerProvider {
    /// Returns the handler for `scheme`, creating and initializing it on first use.
    pub async fn get_handler(
        &self,
        context: &Arc<RequestContext>,
        scheme: &Arc<TranslateScheme>,
    ) -> Result<SharedHandler, Error> {
        let cached = self.handlers.lock().get(scheme.name()).cloned();
        if let Some(handler) = cached {
            return Ok(handler);
        }

        // still initializing higher up this request
        if !self.initializing.lock().insert(scheme.name().to_string()) {
            return Err(Error::ReentrantCall(scheme.name().to_string()));
        }

        debug!("Creating translate handler for scheme {}", scheme.name());
        let mut handler = scheme.create_handler();
        let initialized = handler
            .initialize(Arc::clone(scheme), Arc::clone(context))
            .await;
        self.initializing.lock().remove(scheme.name());
        initialized?;

        let handler = self
            .handlers
            .lock()
            .entry(scheme.name().to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(handler)))
            .clone();
        Ok(handler)
    }

    pub fn is_created(&self, scheme: &str) -> bool {
        self.handlers.lock().contains_key(scheme)
    }
}

/// Locks a handler for exclusive use by the current call.
///
/// A handler is only ever locked by the request flow that owns it, so a busy
/// lock means the call re-entered a handler that is still running.
pub fn lock_handler<'a>(
    handler: &'a SharedHandler,
    scheme: &str,
) -> Result<tokio::sync::MutexGuard<'a, Box<dyn TranslateHandler>>, Error> {
    handler
        .try_lock()
        .map_err(|_| Error::ReentrantCall(scheme.to_string()))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::handler::{HandleTranslate, HandlerState, SchemeHandler};
    use crate::options::BaseSchemeOptions;
    use crate::result::TranslateResult;
    use crate::test_support::{build_context, build_service, counting_handler};

    /// Translates its own scheme while initializing.
    struct SelfTranslatingScheme;

    #[async_trait]
    impl HandleTranslate for SelfTranslatingScheme {
        type Options = BaseSchemeOptions;

        async fn initialize_handler(&mut self, state: &HandlerState<BaseSchemeOptions>) -> Result<(), Error> {
            let context = state.context()?;
            context
                .service()
                .translate(&context, Some(state.scheme_name()))
                .await?;
            Ok(())
        }

        async fn handle_translate(
            &mut self,
            _state: &HandlerState<BaseSchemeOptions>,
        ) -> Result<TranslateResult, Error> {
            Ok(TranslateResult::no_result())
        }
    }

    #[tokio::test]
    async fn test_get_handler_returns_same_instance() {
        let service = build_service(|options| {
            options.add_handler("count", None, counting_handler).unwrap();
        });
        let context = build_context(&service, "/");
        let scheme = service.schemes().get_scheme("count").unwrap();

        assert!(!context.handlers().is_created("count"));
        let first = context.handlers().get_handler(&context, &scheme).await.unwrap();
        let second = context.handlers().get_handler(&context, &scheme).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(context.handlers().is_created("count"));
    }

    #[tokio::test]
    async fn test_lock_handler_detects_reentrant_use() {
        let service = build_service(|options| {
            options.add_handler("count", None, counting_handler).unwrap();
        });
        let context = build_context(&service, "/");
        let scheme = service.schemes().get_scheme("count").unwrap();
        let handler = context.handlers().get_handler(&context, &scheme).await.unwrap();

        let _guard = lock_handler(&handler, "count").unwrap();
        assert_eq!(
            lock_handler(&handler, "count").err(),
            Some(Error::ReentrantCall("count".to_string()))
        );
    }

    #[tokio::test]
    async fn test_handlers_are_per_request() {
        let service = build_service(|options| {
            options.add_handler("count", None, counting_handler).unwrap();
        });
        let scheme = service.schemes().get_scheme("count").unwrap();

        let first_context = build_context(&service, "/");
        let second_context = build_context(&service, "/");
        let first = first_context
            .handlers()
            .get_handler(&first_context, &scheme)
            .await
            .unwrap();
        let second = second_context
            .handlers()
            .get_handler(&second_context, &scheme)
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_scheme_used_during_its_own_initialization_is_reentrant() {
        let service = build_service(|options| {
            options
                .add_handler("loop", None, || {
                    SchemeHandler::new(SelfTranslatingScheme, Arc::default())
                })
                .unwrap();
        });
        let context = build_context(&service, "/");

        assert_eq!(
            service.translate(&context, Some("loop")).await,
            Err(Error::ReentrantCall("loop".to_string()))
        );
        assert!(!context.handlers().is_created("loop"));
        assert!(context.handlers().initializing.lock().is_empty());
    }
}
