mod base;
mod provider;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;

pub use base::{HandleSignIn, HandleTranslate, HandlerPhase, HandlerState, SchemeHandler, SignInSchemeHandler};
pub use provider::{lock_handler, HandlerProvider, SharedHandler};
pub use remote::{HandleRemoteTranslate, RemoteCore, RemoteHandler, RemoteState};

use crate::context::RequestContext;
use crate::error::Error;
use crate::principal::ClaimsPrincipal;
use crate::properties::TranslateProperties;
use crate::result::TranslateResult;
use crate::scheme::TranslateScheme;

/// Contract every scheme implementation satisfies.
///
/// One instance serves one request. `initialize` must run exactly once before
/// any other operation.
#[async_trait]
pub trait TranslateHandler: Send {
    async fn initialize(
        &mut self,
        scheme: Arc<TranslateScheme>,
        context: Arc<RequestContext>,
    ) -> Result<(), Error>;

    async fn translate(&mut self) -> Result<TranslateResult, Error>;

    /// Like [`Self::translate`], with any error captured into a failure result.
    async fn translate_safe(&mut self) -> TranslateResult {
        self.translate().await.unwrap_or_else(TranslateResult::fail)
    }

    async fn challenge(&mut self, properties: Option<TranslateProperties>) -> Result<(), Error>;

    async fn forbid(&mut self, properties: Option<TranslateProperties>) -> Result<(), Error>;

    fn as_request_handler(&mut self) -> Option<&mut dyn TranslateRequestHandler> {
        None
    }

    fn as_sign_in_handler(&mut self) -> Option<&mut dyn TranslateSignInHandler> {
        None
    }

    fn as_sign_out_handler(&mut self) -> Option<&mut dyn TranslateSignOutHandler> {
        None
    }

    /// Whether instances of this type take part in request handling.
    fn handles_requests() -> bool
    where
        Self: Sized,
    {
        false
    }
}

#[async_trait]
pub trait TranslateRequestHandler: TranslateHandler {
    /// Returns `true` when the request was fully handled and the pipeline must stop.
    async fn handle_request(&mut self) -> Result<bool, Error>;
}

#[async_trait]
pub trait TranslateSignOutHandler: TranslateHandler {
    async fn sign_out(&mut self, properties: Option<TranslateProperties>) -> Result<(), Error>;
}

#[async_trait]
pub trait TranslateSignInHandler: TranslateSignOutHandler {
    async fn sign_in(
        &mut self,
        principal: ClaimsPrincipal,
        properties: Option<TranslateProperties>,
    ) -> Result<(), Error>;
}
