use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::Error;
use crate::events::{
    AccessDeniedContext, BaseContext, HandleRequestContext, RemoteFailureContext,
    RemoteTranslateEvents, TicketReceivedContext,
};
use crate::handler::{
    HandleTranslate, HandlerState, SchemeHandler, TranslateHandler, TranslateRequestHandler,
};
use crate::options::{Operation, OptionsMonitor};
use crate::properties::TranslateProperties;
use crate::remote_options::RemoteTranslateOptions;
use crate::result::{HandleRequestResult, TranslateResult};
use crate::scheme::TranslateScheme;
use crate::ticket::TranslateTicket;

/// Item recording which remote scheme produced a signed-in ticket.
pub const AUTH_SCHEME_KEY: &str = ".AuthScheme";
/// Item holding the correlation nonce of a pending remote exchange.
pub const CORRELATION_PROPERTY: &str = ".xsrf";
const CORRELATION_MARKER: &str = "N";

/// Per-request state of a remote scheme, available once the handler is initialized.
pub struct RemoteState {
    state: HandlerState<RemoteTranslateOptions>,
    events: Arc<dyn RemoteTranslateEvents>,
    sign_in_scheme: Option<String>,
}

impl RemoteState {
    pub fn handler_state(&self) -> &HandlerState<RemoteTranslateOptions> {
        &self.state
    }

    pub fn options(&self) -> &RemoteTranslateOptions {
        self.state.options()
    }

    pub fn scheme_name(&self) -> &str {
        self.state.scheme_name()
    }

    pub fn context(&self) -> Result<Arc<RequestContext>, Error> {
        self.state.context()
    }

    pub fn events(&self) -> &dyn RemoteTranslateEvents {
        self.events.as_ref()
    }

    /// Scheme the remote identity is signed in to.
    pub fn sign_in_scheme(&self) -> Option<&str> {
        self.sign_in_scheme.as_deref()
    }

    pub fn event_base(&self) -> Result<BaseContext, Error> {
        Ok(BaseContext::new(
            self.context()?,
            Arc::clone(self.state.scheme()),
            self.state.shared_options(),
        ))
    }

    fn correlation_cookie_name(&self, nonce: &str) -> String {
        format!("{}{nonce}", self.options().correlation_cookie_prefix())
    }

    /// Binds the exchange to this user agent with a nonce item and a matching cookie.
    pub fn generate_correlation_id(&self, properties: &mut TranslateProperties) -> Result<(), Error> {
        let context = self.context()?;
        let nonce = Uuid::new_v4().simple().to_string();
        properties.set_string(CORRELATION_PROPERTY, Some(&nonce));

        let cookie_options = self
            .options()
            .correlation_cookie_options(&context, Utc::now());
        context.append_cookie(
            &self.correlation_cookie_name(&nonce),
            CORRELATION_MARKER,
            &cookie_options,
        )
    }

    /// Checks the correlation nonce in `properties` against the request cookies.
    ///
    /// The nonce item is consumed. The cookie is deleted once found.
    pub fn validate_correlation_id(&self, properties: &mut TranslateProperties) -> Result<bool, Error> {
        let Some(nonce) = properties
            .get_string(CORRELATION_PROPERTY)
            .map(ToString::to_string)
        else {
            warn!("'{CORRELATION_PROPERTY}' state property not found");
            return Ok(false);
        };
        properties.set_string(CORRELATION_PROPERTY, None);

        let context = self.context()?;
        let cookie_name = self.correlation_cookie_name(&nonce);
        let value = context.cookie(&cookie_name).unwrap_or_default();
        if value.is_empty() {
            warn!("'{cookie_name}' cookie not found");
            return Ok(false);
        }

        let cookie_options = self
            .options()
            .correlation_cookie_options(&context, Utc::now());
        context.delete_cookie(&cookie_name, &cookie_options)?;

        if value != CORRELATION_MARKER {
            warn!("The correlation cookie value '{value}' did not match the expected value '{CORRELATION_MARKER}'");
            return Ok(false);
        }
        Ok(true)
    }

    /// Raises the access denied event and, unless it decided the outcome,
    /// redirects to the access denied path.
    pub async fn handle_access_denied(
        &self,
        properties: Option<TranslateProperties>,
    ) -> Result<HandleRequestResult, Error> {
        info!("Access was denied by the resource owner or by the remote server");

        let mut event = AccessDeniedContext::new(self.event_base()?, properties);
        self.events.access_denied(&mut event).await?;

        if let Some(result) = event.event_result_mut().take() {
            match &result {
                HandleRequestResult::Handled => debug!("The access denied event returned Handled"),
                HandleRequestResult::Skipped => debug!("The access denied event returned Skipped"),
                HandleRequestResult::Translated(_) => {}
            }
            return Ok(result);
        }

        let Some(path) = event
            .access_denied_path
            .as_deref()
            .filter(|path| !path.is_empty())
        else {
            return Ok(HandleRequestResult::no_result());
        };

        let mut target = path.to_string();
        let return_url = event.return_url.as_deref().unwrap_or_default();
        if !return_url.is_empty() && !event.return_url_parameter.is_empty() {
            let query = serde_urlencoded::to_string(&[(event.return_url_parameter.as_str(), return_url)])
                .map_err(|error| Error::Failure(error.to_string()))?;
            target.push(if target.contains('?') { '&' } else { '?' });
            target.push_str(&query);
        }

        let context = self.context()?;
        context.redirect(&context.build_redirect_uri(&target))?;
        Ok(HandleRequestResult::handle())
    }
}

/// Scheme-specific logic of a remote exchange run by [`RemoteHandler`].
#[async_trait]
pub trait HandleRemoteTranslate: Send + 'static {
    async fn initialize_handler(&mut self, _remote: &RemoteState) -> Result<(), Error> {
        Ok(())
    }

    /// Whether the current request is the callback of this scheme.
    fn should_handle_request(&self, remote: &RemoteState) -> Result<bool, Error> {
        let context = remote.context()?;
        Ok(remote.options().callback_path.as_deref() == Some(context.path()))
    }

    /// Completes the exchange on the callback request.
    async fn handle_remote_translate(
        &mut self,
        remote: &RemoteState,
    ) -> Result<HandleRequestResult, Error>;

    /// Starts the exchange, usually by redirecting to the remote party.
    async fn handle_challenge(
        &mut self,
        remote: &RemoteState,
        _properties: &TranslateProperties,
    ) -> Result<(), Error> {
        remote.handler_state().default_challenge()
    }
}

/// Adapts [`HandleRemoteTranslate`] logic to the lifecycle of [`SchemeHandler`].
pub struct RemoteCore<H> {
    logic: H,
    remote: Option<RemoteState>,
}

impl<H> RemoteCore<H> {
    pub fn logic(&self) -> &H {
        &self.logic
    }

    pub fn remote(&self) -> Result<&RemoteState, Error> {
        self.remote.as_ref().ok_or(Error::HandlerNotInitialized)
    }
}

#[async_trait]
impl<H: HandleRemoteTranslate> HandleTranslate for RemoteCore<H> {
    type Options = RemoteTranslateOptions;

    async fn initialize_handler(
        &mut self,
        state: &HandlerState<RemoteTranslateOptions>,
    ) -> Result<(), Error> {
        let context = state.context()?;
        let events = state
            .options()
            .events
            .resolve(&context, state.scheme_name())?;

        let sign_in_scheme = state.options().sign_in_scheme.clone().or_else(|| {
            context
                .service()
                .schemes()
                .default_scheme_name(Operation::SignIn)
                .map(ToString::to_string)
        });
        if sign_in_scheme.as_deref() == Some(state.scheme_name()) {
            return Err(Error::RemoteSchemeCannotBeSelf(
                state.scheme_name().to_string(),
            ));
        }

        let remote = RemoteState {
            state: state.clone(),
            events,
            sign_in_scheme,
        };
        self.logic.initialize_handler(&remote).await?;
        self.remote = Some(remote);
        Ok(())
    }

    /// Translates through the sign-in scheme, keeping only tickets this scheme signed in.
    async fn handle_translate(
        &mut self,
        state: &HandlerState<RemoteTranslateOptions>,
    ) -> Result<TranslateResult, Error> {
        let remote = self.remote()?;
        let context = state.context()?;
        let result = context
            .service()
            .translate(&context, remote.sign_in_scheme())
            .await?;

        match result {
            TranslateResult::Success(ticket) => {
                if ticket.properties().get_string(AUTH_SCHEME_KEY) != Some(state.scheme_name()) {
                    return Ok(TranslateResult::no_result());
                }
                let (principal, properties, _) = ticket.into_parts();
                Ok(TranslateResult::success(TranslateTicket::new(
                    principal,
                    Some(properties),
                    state.scheme_name(),
                )))
            }
            other => Ok(other),
        }
    }

    async fn handle_challenge(
        &mut self,
        _state: &HandlerState<RemoteTranslateOptions>,
        properties: &TranslateProperties,
    ) -> Result<(), Error> {
        let remote = self.remote.as_ref().ok_or(Error::HandlerNotInitialized)?;
        self.logic.handle_challenge(remote, properties).await
    }

    async fn handle_forbidden(
        &mut self,
        state: &HandlerState<RemoteTranslateOptions>,
        properties: &TranslateProperties,
    ) -> Result<(), Error> {
        let remote = self.remote()?;
        let context = state.context()?;
        context
            .service()
            .forbid(&context, remote.sign_in_scheme(), Some(properties.clone()))
            .await
    }
}

/// Handler for schemes that redirect to a remote party and finish on a callback path.
pub struct RemoteHandler<H: HandleRemoteTranslate> {
    handler: SchemeHandler<RemoteCore<H>>,
}

impl<H: HandleRemoteTranslate> RemoteHandler<H> {
    pub fn new(logic: H, options_monitor: Arc<OptionsMonitor<RemoteTranslateOptions>>) -> Self {
        Self {
            handler: SchemeHandler::new(
                RemoteCore {
                    logic,
                    remote: None,
                },
                options_monitor,
            ),
        }
    }

    pub fn handler(&self) -> &SchemeHandler<RemoteCore<H>> {
        &self.handler
    }
}

#[async_trait]
impl<H: HandleRemoteTranslate> TranslateHandler for RemoteHandler<H> {
    async fn initialize(
        &mut self,
        scheme: Arc<TranslateScheme>,
        context: Arc<RequestContext>,
    ) -> Result<(), Error> {
        self.handler.initialize(scheme, context).await
    }

    async fn translate(&mut self) -> Result<TranslateResult, Error> {
        self.handler.translate().await
    }

    async fn challenge(&mut self, properties: Option<TranslateProperties>) -> Result<(), Error> {
        self.handler.challenge(properties).await
    }

    async fn forbid(&mut self, properties: Option<TranslateProperties>) -> Result<(), Error> {
        self.handler.forbid(properties).await
    }

    fn as_request_handler(&mut self) -> Option<&mut dyn TranslateRequestHandler> {
        Some(self)
    }

    fn handles_requests() -> bool {
        true
    }
}

#[async_trait]
impl<H: HandleRemoteTranslate> TranslateRequestHandler for RemoteHandler<H> {
    #[instrument(skip(self))]
    async fn handle_request(&mut self) -> Result<bool, Error> {
        let (core, _) = self.handler.split_mut()?;
        let RemoteCore { logic, remote } = core;
        let remote = remote.as_ref().ok_or(Error::HandlerNotInitialized)?;

        if !logic.should_handle_request(remote)? {
            return Ok(false);
        }

        let (error, properties) = match logic.handle_remote_translate(remote).await {
            Ok(HandleRequestResult::Handled) => return Ok(true),
            Ok(HandleRequestResult::Skipped | HandleRequestResult::Translated(TranslateResult::NoResult)) => {
                return Ok(false)
            }
            Ok(HandleRequestResult::Translated(TranslateResult::Success(ticket))) => {
                return complete_sign_in(remote, ticket).await;
            }
            Ok(HandleRequestResult::Translated(TranslateResult::Failure { error, properties })) => {
                (error, properties)
            }
            Err(error) => (error, None),
        };

        handle_remote_failure(remote, error, properties).await
    }
}

async fn handle_remote_failure(
    remote: &RemoteState,
    error: Error,
    properties: Option<TranslateProperties>,
) -> Result<bool, Error> {
    info!("Error from remote login of {}: {error}", remote.scheme_name());

    let mut event = RemoteFailureContext::new(remote.event_base()?, error, properties);
    remote.events().remote_failure(&mut event).await?;

    match event.event_result_mut().take() {
        Some(HandleRequestResult::Handled) => return Ok(true),
        Some(HandleRequestResult::Skipped) => return Ok(false),
        Some(HandleRequestResult::Translated(TranslateResult::Failure { error, .. })) => {
            return Err(Error::RemoteFailureEvent(Box::new(error)));
        }
        Some(HandleRequestResult::Translated(_)) | None => {}
    }

    match event.failure {
        Some(failure) => Err(Error::RemoteLogin(Box::new(failure))),
        None => {
            debug!("The remote failure event cleared the failure");
            Ok(false)
        }
    }
}

async fn complete_sign_in(remote: &RemoteState, ticket: TranslateTicket) -> Result<bool, Error> {
    let mut event = TicketReceivedContext::new(remote.event_base()?, ticket);
    event.return_uri = event.properties.redirect_uri().map(ToString::to_string);
    event.properties.set_redirect_uri(None);
    event
        .properties
        .set_string(AUTH_SCHEME_KEY, Some(remote.scheme_name()));

    remote.events().ticket_received(&mut event).await?;
    match event.event_result_mut().take() {
        Some(HandleRequestResult::Handled) => {
            debug!("The ticket received event returned Handled");
            return Ok(true);
        }
        Some(HandleRequestResult::Skipped) => {
            debug!("The ticket received event returned Skipped");
            return Ok(false);
        }
        Some(HandleRequestResult::Translated(_)) | None => {}
    }

    let context = remote.context()?;
    let return_uri = event
        .return_uri
        .filter(|uri| !uri.is_empty())
        .unwrap_or_else(|| "/".to_string());
    context
        .service()
        .sign_in(
            &context,
            remote.sign_in_scheme(),
            event.principal,
            Some(event.properties),
        )
        .await?;

    context.redirect(&return_uri)?;
    Ok(true)
}
