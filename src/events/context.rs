use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::Error;
use crate::principal::ClaimsPrincipal;
use crate::properties::TranslateProperties;
use crate::remote_options::RemoteTranslateOptions;
use crate::result::HandleRequestResult;
use crate::scheme::TranslateScheme;
use crate::ticket::TranslateTicket;

/// Request, scheme and options shared by every event context.
#[derive(Clone)]
pub struct BaseContext {
    context: Arc<RequestContext>,
    scheme: Arc<TranslateScheme>,
    options: Arc<RemoteTranslateOptions>,
}

impl BaseContext {
    pub fn new(
        context: Arc<RequestContext>,
        scheme: Arc<TranslateScheme>,
        options: Arc<RemoteTranslateOptions>,
    ) -> Self {
        Self {
            context,
            scheme,
            options,
        }
    }

    pub fn context(&self) -> &Arc<RequestContext> {
        &self.context
    }

    pub fn scheme(&self) -> &TranslateScheme {
        &self.scheme
    }

    pub fn options(&self) -> &RemoteTranslateOptions {
        &self.options
    }
}

/// Result slot of an event context; it can be set once.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventResult(Option<HandleRequestResult>);

impl EventResult {
    pub fn get(&self) -> Option<&HandleRequestResult> {
        self.0.as_ref()
    }

    /// Sets the result; a second call fails and keeps the first result.
    pub fn set(&mut self, result: HandleRequestResult) -> Result<(), Error> {
        if self.0.is_some() {
            return Err(Error::ResultAlreadySet);
        }
        self.0 = Some(result);
        Ok(())
    }

    pub fn take(&mut self) -> Option<HandleRequestResult> {
        self.0.take()
    }
}

/// Event context able to stop the pipeline or skip the current handler.
pub trait HandleRequestContext {
    fn base(&self) -> &BaseContext;

    fn event_result(&self) -> &EventResult;

    fn event_result_mut(&mut self) -> &mut EventResult;

    fn result(&self) -> Option<&HandleRequestResult> {
        self.event_result().get()
    }

    /// The caller writes the whole response; the pipeline reports `Handled`.
    fn handle_response(&mut self) -> Result<(), Error> {
        self.event_result_mut().set(HandleRequestResult::handle())
    }

    /// The current handler stops; the pipeline reports `Skipped`.
    fn skip_handler(&mut self) -> Result<(), Error> {
        self.event_result_mut().set(HandleRequestResult::skip_handler())
    }
}

/// Event context carrying a principal that can be accepted or rejected.
pub trait RemoteTranslateContext: HandleRequestContext {
    fn principal(&self) -> &ClaimsPrincipal;

    fn properties(&self) -> &TranslateProperties;

    fn success(&mut self) -> Result<(), Error> {
        let ticket = TranslateTicket::new(
            self.principal().clone(),
            Some(self.properties().clone()),
            self.base().scheme().name(),
        );
        self.event_result_mut()
            .set(HandleRequestResult::success(ticket))
    }

    fn fail(&mut self, error: Error) -> Result<(), Error> {
        self.event_result_mut().set(HandleRequestResult::fail(error))
    }

    fn fail_message(&mut self, message: &str) -> Result<(), Error> {
        self.event_result_mut()
            .set(HandleRequestResult::fail_message(message))
    }
}
