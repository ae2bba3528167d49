#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod authorization;
pub mod context;
pub mod cookie;
pub mod error;
pub mod events;
pub mod handler;
pub mod language_tag;
pub mod metrics_provider;
pub mod middleware;
pub mod options;
pub mod principal;
pub mod properties;
pub mod remote_options;
pub mod resources;
pub mod result;
pub mod scheme;
pub mod service;
pub mod ticket;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::RequestContext;
pub use error::{Error, ErrorKind};
pub use middleware::{Flow, TranslateMiddleware};
pub use options::TranslateOptions;
pub use principal::{Claim, ClaimsIdentity, ClaimsPrincipal};
pub use properties::TranslateProperties;
pub use result::{HandleRequestResult, TranslateResult};
pub use service::TranslateService;
pub use ticket::TranslateTicket;
