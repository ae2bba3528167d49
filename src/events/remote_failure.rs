use crate::error::Error;
use crate::events::context::{BaseContext, EventResult, HandleRequestContext};
use crate::properties::TranslateProperties;
use crate::result::HandleRequestResult;

/// Raised when the remote exchange failed. Clearing `failure` swallows it.
pub struct RemoteFailureContext {
    base: BaseContext,
    result: EventResult,
    pub failure: Option<Error>,
    pub properties: Option<TranslateProperties>,
}

impl RemoteFailureContext {
    pub fn new(base: BaseContext, failure: Error, properties: Option<TranslateProperties>) -> Self {
        Self {
            base,
            result: EventResult::default(),
            failure: Some(failure),
            properties,
        }
    }

    /// Replaces the outcome with a failure reported by the event itself.
    pub fn fail(&mut self, error: Error) -> Result<(), Error> {
        self.result.set(HandleRequestResult::fail(error))
    }
}

impl HandleRequestContext for RemoteFailureContext {
    fn base(&self) -> &BaseContext {
        &self.base
    }

    fn event_result(&self) -> &EventResult {
        &self.result
    }

    fn event_result_mut(&mut self) -> &mut EventResult {
        &mut self.result
    }
}
