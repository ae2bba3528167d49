use crate::events::context::{BaseContext, EventResult, HandleRequestContext};
use crate::properties::TranslateProperties;

/// Raised when the remote party denied the request.
pub struct AccessDeniedContext {
    base: BaseContext,
    result: EventResult,
    /// Where the user agent is redirected; defaults to the configured access denied path.
    pub access_denied_path: Option<String>,
    pub properties: Option<TranslateProperties>,
    /// Flowed to the access denied page when `return_url_parameter` is set.
    pub return_url: Option<String>,
    pub return_url_parameter: String,
}

impl AccessDeniedContext {
    pub fn new(base: BaseContext, properties: Option<TranslateProperties>) -> Self {
        let access_denied_path = base.options().access_denied_path.clone();
        let return_url_parameter = base.options().return_url_parameter.clone();
        let return_url = properties
            .as_ref()
            .and_then(|properties| properties.redirect_uri().map(ToString::to_string));

        Self {
            base,
            result: EventResult::default(),
            access_denied_path,
            properties,
            return_url,
            return_url_parameter,
        }
    }
}

impl HandleRequestContext for AccessDeniedContext {
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
