use std::sync::{Arc, Weak};

use async_trait::async_trait;
use hyper::StatusCode;
use tracing::{debug, info, instrument};

use crate::context::RequestContext;
use crate::error::Error;
use crate::handler::{TranslateHandler, TranslateSignInHandler, TranslateSignOutHandler};
use crate::metrics_provider::{TRANSLATE_ATTEMPTS, TRANSLATE_OPERATIONS};
use crate::options::{Operation, OptionsMonitor, SchemeOptions};
use crate::principal::ClaimsPrincipal;
use crate::properties::TranslateProperties;
use crate::result::TranslateResult;
use crate::scheme::TranslateScheme;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerPhase {
    Uninitialized,
    Initialized,
    Translated,
}

/// Scheme, options and request context captured by `initialize`.
pub struct HandlerState<O> {
    scheme: Arc<TranslateScheme>,
    options: Arc<O>,
    context: Weak<RequestContext>,
}

impl<O> Clone for HandlerState<O> {
    fn clone(&self) -> Self {
        Self {
            scheme: Arc::clone(&self.scheme),
            options: Arc::clone(&self.options),
            context: Weak::clone(&self.context),
        }
    }
}

impl<O: SchemeOptions> HandlerState<O> {
    pub fn new(scheme: Arc<TranslateScheme>, options: Arc<O>, context: &Arc<RequestContext>) -> Self {
        Self {
            scheme,
            options,
            context: Arc::downgrade(context),
        }
    }

    pub fn scheme(&self) -> &Arc<TranslateScheme> {
        &self.scheme
    }

    pub fn scheme_name(&self) -> &str {
        self.scheme.name()
    }

    pub fn options(&self) -> &O {
        &self.options
    }

    pub fn shared_options(&self) -> Arc<O> {
        Arc::clone(&self.options)
    }

    /// The request context; handlers only hold a weak reference to it.
    pub fn context(&self) -> Result<Arc<RequestContext>, Error> {
        self.context.upgrade().ok_or(Error::RequestEnded)
    }

    /// The configured claims issuer, or the scheme name.
    pub fn claims_issuer(&self) -> &str {
        self.options
            .claims_issuer()
            .unwrap_or_else(|| self.scheme.name())
    }

    pub fn forward_target(&self, operation: Operation) -> Result<Option<String>, Error> {
        let context = self.context()?;
        Ok(self
            .options
            .forward()
            .resolve(operation, &context, self.scheme.name()))
    }

    pub fn default_challenge(&self) -> Result<(), Error> {
        self.context()?.set_status(StatusCode::UNAUTHORIZED);
        Ok(())
    }

    pub fn default_forbidden(&self) -> Result<(), Error> {
        self.context()?.set_status(StatusCode::FORBIDDEN);
        Ok(())
    }
}

/// Scheme-specific translate logic run by [`SchemeHandler`].
#[async_trait]
pub trait HandleTranslate: Send + 'static {
    type Options: SchemeOptions;

    /// Called once options are resolved and validated.
    async fn initialize_handler(&mut self, _state: &HandlerState<Self::Options>) -> Result<(), Error> {
        Ok(())
    }

    async fn handle_translate(
        &mut self,
        state: &HandlerState<Self::Options>,
    ) -> Result<TranslateResult, Error>;

    async fn handle_challenge(
        &mut self,
        state: &HandlerState<Self::Options>,
        _properties: &TranslateProperties,
    ) -> Result<(), Error> {
        state.default_challenge()
    }

    async fn handle_forbidden(
        &mut self,
        state: &HandlerState<Self::Options>,
        _properties: &TranslateProperties,
    ) -> Result<(), Error> {
        state.default_forbidden()
    }
}

/// Sign-in and sign-out logic run by [`SignInSchemeHandler`].
#[async_trait]
pub trait HandleSignIn: HandleTranslate {
    async fn handle_sign_in(
        &mut self,
        state: &HandlerState<Self::Options>,
        principal: ClaimsPrincipal,
        properties: TranslateProperties,
    ) -> Result<(), Error>;

    async fn handle_sign_out(
        &mut self,
        state: &HandlerState<Self::Options>,
        properties: TranslateProperties,
    ) -> Result<(), Error>;
}

fn record_operation(scheme: &str, operation: Operation) {
    TRANSLATE_OPERATIONS
        .with_label_values(&[scheme, operation.metric_label()])
        .inc();
}

/// Lifecycle wrapper turning a [`HandleTranslate`] into a [`TranslateHandler`].
///
/// Translation runs at most once per instance: the first outcome, error included,
/// is returned to every later caller. Each operation is forwarded to another
/// scheme when the options name a target for it.
pub struct SchemeHandler<H: HandleTranslate> {
    inner: H,
    options_monitor: Arc<OptionsMonitor<H::Options>>,
    state: Option<HandlerState<H::Options>>,
    translate_result: Option<Result<TranslateResult, Error>>,
}

impl<H: HandleTranslate> SchemeHandler<H> {
    pub fn new(inner: H, options_monitor: Arc<OptionsMonitor<H::Options>>) -> Self {
        Self {
            inner,
            options_monitor,
            state: None,
            translate_result: None,
        }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn phase(&self) -> HandlerPhase {
        match (&self.state, &self.translate_result) {
            (None, _) => HandlerPhase::Uninitialized,
            (Some(_), None) => HandlerPhase::Initialized,
            (Some(_), Some(_)) => HandlerPhase::Translated,
        }
    }

    pub fn state(&self) -> Result<&HandlerState<H::Options>, Error> {
        self.state.as_ref().ok_or(Error::HandlerNotInitialized)
    }

    pub(crate) fn split_mut(&mut self) -> Result<(&mut H, &HandlerState<H::Options>), Error> {
        let state = self.state.as_ref().ok_or(Error::HandlerNotInitialized)?;
        Ok((&mut self.inner, state))
    }

    /// Runs the translate logic on first call and returns the memoized outcome afterwards.
    pub async fn translate_once(&mut self) -> Result<TranslateResult, Error> {
        if let Some(result) = &self.translate_result {
            return result.clone();
        }

        let state = self.state.as_ref().ok_or(Error::HandlerNotInitialized)?;
        let result = self.inner.handle_translate(state).await;

        let label = match &result {
            Ok(result) => result.label(),
            Err(_) => "error",
        };
        TRANSLATE_ATTEMPTS
            .with_label_values(&[state.scheme_name(), label])
            .inc();

        self.translate_result = Some(result.clone());
        result
    }
}

#[async_trait]
impl<H: HandleTranslate> TranslateHandler for SchemeHandler<H> {
    #[instrument(skip(self, scheme, context), fields(scheme = scheme.name()))]
    async fn initialize(
        &mut self,
        scheme: Arc<TranslateScheme>,
        context: Arc<RequestContext>,
    ) -> Result<(), Error> {
        if let Some(state) = &self.state {
            return Err(Error::HandlerAlreadyInitialized(
                state.scheme_name().to_string(),
            ));
        }

        let options = self.options_monitor.get(scheme.name());
        options.validate_scheme(scheme.name())?;

        let state = HandlerState::new(scheme, options, &context);
        self.inner.initialize_handler(&state).await?;
        self.state = Some(state);
        Ok(())
    }

    async fn translate(&mut self) -> Result<TranslateResult, Error> {
        let state = self.state.as_ref().ok_or(Error::HandlerNotInitialized)?;
        if let Some(target) = state.forward_target(Operation::Translate)? {
            debug!("Forwarding translate from {} to {target}", state.scheme_name());
            let context = state.context()?;
            return context.service().translate(&context, Some(&target)).await;
        }

        let scheme = state.scheme_name().to_string();
        let result = self.translate_once().await?;
        match &result {
            TranslateResult::Success(_) => debug!("Scheme {scheme} was translated"),
            TranslateResult::NoResult => debug!("Scheme {scheme} was not translated"),
            TranslateResult::Failure { error, .. } => {
                info!("Scheme {scheme} was not translated: {error}");
            }
        }
        Ok(result)
    }

    async fn challenge(&mut self, properties: Option<TranslateProperties>) -> Result<(), Error> {
        let state = self.state.as_ref().ok_or(Error::HandlerNotInitialized)?;
        if let Some(target) = state.forward_target(Operation::Challenge)? {
            debug!("Forwarding challenge from {} to {target}", state.scheme_name());
            let context = state.context()?;
            return context
                .service()
                .challenge(&context, Some(&target), properties)
                .await;
        }

        let properties = properties.unwrap_or_default();
        self.inner.handle_challenge(state, &properties).await?;
        debug!("Scheme {} was challenged", state.scheme_name());
        record_operation(state.scheme_name(), Operation::Challenge);
        Ok(())
    }

    async fn forbid(&mut self, properties: Option<TranslateProperties>) -> Result<(), Error> {
        let state = self.state.as_ref().ok_or(Error::HandlerNotInitialized)?;
        if let Some(target) = state.forward_target(Operation::Forbid)? {
            debug!("Forwarding forbid from {} to {target}", state.scheme_name());
            let context = state.context()?;
            return context
                .service()
                .forbid(&context, Some(&target), properties)
                .await;
        }

        let properties = properties.unwrap_or_default();
        self.inner.handle_forbidden(state, &properties).await?;
        debug!("Scheme {} was forbidden", state.scheme_name());
        record_operation(state.scheme_name(), Operation::Forbid);
        Ok(())
    }
}

/// [`SchemeHandler`] with sign-in and sign-out capabilities.
pub struct SignInSchemeHandler<H: HandleSignIn> {
    handler: SchemeHandler<H>,
}

impl<H: HandleSignIn> SignInSchemeHandler<H> {
    pub fn new(inner: H, options_monitor: Arc<OptionsMonitor<H::Options>>) -> Self {
        Self {
            handler: SchemeHandler::new(inner, options_monitor),
        }
    }

    pub fn handler(&self) -> &SchemeHandler<H> {
        &self.handler
    }
}

#[async_trait]
impl<H: HandleSignIn> TranslateHandler for SignInSchemeHandler<H> {
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

    fn as_sign_in_handler(&mut self) -> Option<&mut dyn TranslateSignInHandler> {
        Some(self)
    }

    fn as_sign_out_handler(&mut self) -> Option<&mut dyn TranslateSignOutHandler> {
        Some(self)
    }
}

#[async_trait]
impl<H: HandleSignIn> TranslateSignOutHandler for SignInSchemeHandler<H> {
    async fn sign_out(&mut self, properties: Option<TranslateProperties>) -> Result<(), Error> {
        let (inner, state) = self.handler.split_mut()?;
        if let Some(target) = state.forward_target(Operation::SignOut)? {
            debug!("Forwarding sign-out from {} to {target}", state.scheme_name());
            let context = state.context()?;
            return context
                .service()
                .sign_out(&context, Some(&target), properties)
                .await;
        }

        inner
            .handle_sign_out(state, properties.unwrap_or_default())
            .await?;
        info!("Scheme {} signed out", state.scheme_name());
        record_operation(state.scheme_name(), Operation::SignOut);
        Ok(())
    }
}

#[async_trait]
impl<H: HandleSignIn> TranslateSignInHandler for SignInSchemeHandler<H> {
    async fn sign_in(
        &mut self,
        principal: ClaimsPrincipal,
        properties: Option<TranslateProperties>,
    ) -> Result<(), Error> {
        let (inner, state) = self.handler.split_mut()?;
        if let Some(target) = state.forward_target(Operation::SignIn)? {
            debug!("Forwarding sign-in from {} to {target}", state.scheme_name());
            let context = state.context()?;
            return context
                .service()
                .sign_in(&context, Some(&target), principal, properties)
                .await;
        }

        inner
            .handle_sign_in(state, principal, properties.unwrap_or_default())
            .await?;
        info!("Scheme {} signed in", state.scheme_name());
        record_operation(state.scheme_name(), Operation::SignIn);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
