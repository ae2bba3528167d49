use std::sync::Arc;

use tracing::{debug, instrument};

use crate::context::{RequestContext, TranslateFeature};
use crate::error::Error;
use crate::handler::lock_handler;
use crate::options::Operation;
use crate::service::TranslateService;

/// What the host does after [`TranslateMiddleware::process`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// A scheme wrote the complete response.
    Stop,
    Continue,
}

/// Pipeline stage run by the host before its own request handling.
pub struct TranslateMiddleware {
    service: Arc<TranslateService>,
}

impl TranslateMiddleware {
    pub fn new(service: Arc<TranslateService>) -> Self {
        Self { service }
    }

    /// Offers the request to every request-handling scheme in registration order,
    /// then translates the default scheme and publishes its principal as the user.
    #[instrument(skip(self, context), fields(path = context.path()))]
    pub async fn process(&self, context: &Arc<RequestContext>) -> Result<Flow, Error> {
        context.set_feature(TranslateFeature {
            original_path: context.path().to_string(),
            original_path_base: context.path_base().to_string(),
        });

        for scheme in self.service.schemes().request_handler_schemes() {
            let handler = context.handlers().get_handler(context, scheme).await?;
            let mut handler = lock_handler(&handler, scheme.name())?;
            let Some(request_handler) = handler.as_request_handler() else {
                continue;
            };
            if request_handler.handle_request().await? {
                debug!("Request was handled by scheme {}", scheme.name());
                return Ok(Flow::Stop);
            }
        }

        if let Some(scheme) = self
            .service
            .schemes()
            .default_scheme_name(Operation::Translate)
        {
            let result = self.service.translate(context, Some(scheme)).await?;
            if let Some(principal) = result.principal() {
                context.set_user(Some(principal.clone()));
            }
        }

        Ok(Flow::Continue)
    }
}
