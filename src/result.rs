use crate::error::Error;
use crate::principal::ClaimsPrincipal;
use crate::properties::TranslateProperties;
use crate::ticket::TranslateTicket;

/// Outcome of a translate call.
#[derive(Clone, Debug, PartialEq)]
pub enum TranslateResult {
    Success(TranslateTicket),
    Failure {
        error: Error,
        properties: Option<TranslateProperties>,
    },
    /// The scheme had nothing to say about this request.
    NoResult,
}

impl TranslateResult {
    pub fn success(ticket: TranslateTicket) -> Self {
        TranslateResult::Success(ticket)
    }

    pub fn fail(error: Error) -> Self {
        TranslateResult::Failure {
            error,
            properties: None,
        }
    }

    pub fn fail_with_properties(error: Error, properties: TranslateProperties) -> Self {
        TranslateResult::Failure {
            error,
            properties: Some(properties),
        }
    }

    pub fn fail_message(message: &str) -> Self {
        Self::fail(Error::Failure(message.to_string()))
    }

    pub fn no_result() -> Self {
        TranslateResult::NoResult
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, TranslateResult::Success(_))
    }

    pub fn none(&self) -> bool {
        matches!(self, TranslateResult::NoResult)
    }

    pub fn ticket(&self) -> Option<&TranslateTicket> {
        match self {
            TranslateResult::Success(ticket) => Some(ticket),
            _ => None,
        }
    }

    pub fn principal(&self) -> Option<&ClaimsPrincipal> {
        self.ticket().map(TranslateTicket::principal)
    }

    /// Always present on success; a failure may carry the properties it was raised with.
    pub fn properties(&self) -> Option<&TranslateProperties> {
        match self {
            TranslateResult::Success(ticket) => Some(ticket.properties()),
            TranslateResult::Failure { properties, .. } => properties.as_ref(),
            TranslateResult::NoResult => None,
        }
    }

    pub fn failure(&self) -> Option<&Error> {
        match self {
            TranslateResult::Failure { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TranslateResult::Success(_) => "success",
            TranslateResult::Failure { .. } => "failure",
            TranslateResult::NoResult => "none",
        }
    }
}

/// Outcome of a remote request-handling step.
#[derive(Clone, Debug, PartialEq)]
pub enum HandleRequestResult {
    Translated(TranslateResult),
    /// The handler wrote the whole response; the pipeline must stop.
    Handled,
    /// The handler declined; the pipeline continues with the next stage.
    Skipped,
}

impl HandleRequestResult {
    pub fn handle() -> Self {
        HandleRequestResult::Handled
    }

    pub fn skip_handler() -> Self {
        HandleRequestResult::Skipped
    }

    pub fn success(ticket: TranslateTicket) -> Self {
        HandleRequestResult::Translated(TranslateResult::success(ticket))
    }

    pub fn fail(error: Error) -> Self {
        HandleRequestResult::Translated(TranslateResult::fail(error))
    }

    pub fn fail_with_properties(error: Error, properties: TranslateProperties) -> Self {
        HandleRequestResult::Translated(TranslateResult::fail_with_properties(error, properties))
    }

    pub fn fail_message(message: &str) -> Self {
        HandleRequestResult::Translated(TranslateResult::fail_message(message))
    }

    pub fn no_result() -> Self {
        HandleRequestResult::Translated(TranslateResult::NoResult)
    }

    pub fn handled(&self) -> bool {
        matches!(self, HandleRequestResult::Handled)
    }

    pub fn skipped(&self) -> bool {
        matches!(self, HandleRequestResult::Skipped)
    }

    pub fn result(&self) -> Option<&TranslateResult> {
        match self {
            HandleRequestResult::Translated(result) => Some(result),
            _ => None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.result().is_some_and(TranslateResult::succeeded)
    }

    pub fn none(&self) -> bool {
        self.result().is_some_and(TranslateResult::none)
    }

    pub fn ticket(&self) -> Option<&TranslateTicket> {
        self.result().and_then(TranslateResult::ticket)
    }

    pub fn principal(&self) -> Option<&ClaimsPrincipal> {
        self.result().and_then(TranslateResult::principal)
    }

    pub fn properties(&self) -> Option<&TranslateProperties> {
        self.result().and_then(TranslateResult::properties)
    }

    pub fn failure(&self) -> Option<&Error> {
        self.result().and_then(TranslateResult::failure)
    }
}

impl From<TranslateResult> for HandleRequestResult {
    fn from(result: TranslateResult) -> Self {
        HandleRequestResult::Translated(result)
    }
}
