mod access_denied;
mod context;
mod remote_failure;
mod ticket_received;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub use access_denied::AccessDeniedContext;
pub use context::{BaseContext, EventResult, HandleRequestContext, RemoteTranslateContext};
pub use remote_failure::RemoteFailureContext;
pub use ticket_received::TicketReceivedContext;

use crate::context::RequestContext;
use crate::error::Error;

/// Hooks raised while a remote scheme completes an exchange.
///
/// Every hook defaults to doing nothing. A hook takes over the outcome by setting
/// a result on its context.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteTranslateEvents: Send + Sync {
    async fn access_denied(&self, _context: &mut AccessDeniedContext) -> Result<(), Error> {
        Ok(())
    }

    async fn remote_failure(&self, _context: &mut RemoteFailureContext) -> Result<(), Error> {
        Ok(())
    }

    async fn ticket_received(&self, _context: &mut TicketReceivedContext) -> Result<(), Error> {
        Ok(())
    }
}

pub struct DefaultRemoteEvents;

#[async_trait]
impl RemoteTranslateEvents for DefaultRemoteEvents {}

/// Request extension carrying events resolved per request.
#[derive(Clone)]
pub struct ScopedEvents(pub Arc<dyn RemoteTranslateEvents>);

/// Where a scheme takes its events from.
#[derive(Clone, Default)]
pub enum EventsSource {
    #[default]
    Default,
    Instance(Arc<dyn RemoteTranslateEvents>),
    /// Read from the [`ScopedEvents`] request extension.
    RequestScoped,
}

impl EventsSource {
    pub fn resolve(
        &self,
        context: &RequestContext,
        scheme: &str,
    ) -> Result<Arc<dyn RemoteTranslateEvents>, Error> {
        match self {
            EventsSource::Default => Ok(Arc::new(DefaultRemoteEvents)),
            EventsSource::Instance(events) => Ok(Arc::clone(events)),
            EventsSource::RequestScoped => context
                .extension::<ScopedEvents>()
                .map(|scoped| Arc::clone(&scoped.0))
                .ok_or_else(|| Error::EventsNotRegistered(scheme.to_string())),
        }
    }
}

impl fmt::Debug for EventsSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventsSource::Default => f.write_str("Default"),
            EventsSource::Instance(_) => f.write_str("Instance"),
            EventsSource::RequestScoped => f.write_str("RequestScoped"),
        }
    }
}
