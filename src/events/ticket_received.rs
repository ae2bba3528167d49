use crate::events::context::{BaseContext, EventResult, HandleRequestContext, RemoteTranslateContext};
use crate::principal::ClaimsPrincipal;
use crate::properties::TranslateProperties;
use crate::ticket::TranslateTicket;

/// Raised once the remote exchange produced a ticket, before it is signed in.
pub struct TicketReceivedContext {
    base: BaseContext,
    result: EventResult,
    pub principal: ClaimsPrincipal,
    pub properties: TranslateProperties,
    /// Where the user agent goes after sign-in.
    pub return_uri: Option<String>,
}

impl TicketReceivedContext {
    pub fn new(base: BaseContext, ticket: TranslateTicket) -> Self {
        let (principal, properties, _) = ticket.into_parts();
        Self {
            base,
            result: EventResult::default(),
            principal,
            properties,
            return_uri: None,
        }
    }
}

impl HandleRequestContext for TicketReceivedContext {
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

impl RemoteTranslateContext for TicketReceivedContext {
    fn principal(&self) -> &ClaimsPrincipal {
        &self.principal
    }

    fn properties(&self) -> &TranslateProperties {
        &self.properties
    }
}
