use std::sync::Arc;

use tracing::{debug, instrument};

use crate::context::RequestContext;
use crate::error::Error;
use crate::handler::{lock_handler, SharedHandler};
use crate::options::{Operation, TranslateOptions};
use crate::principal::ClaimsPrincipal;
use crate::properties::TranslateProperties;
use crate::resources::Locale;
use crate::result::TranslateResult;
use crate::scheme::{SchemeProvider, TranslateScheme};

/// Entry point of the pipeline: resolves schemes and drives their handlers.
///
/// Operations given no scheme name use the configured default for that
/// operation. Handlers are cached per request, so every operation on a
/// scheme within one request reaches the same handler instance.
pub struct TranslateService {
    schemes: SchemeProvider,
    locale: Locale,
    require_authenticated_sign_in: bool,
}

impl TranslateService {
    pub fn new(options: &TranslateOptions) -> Result<Self, Error> {
        Ok(Self {
            schemes: options.build()?,
            locale: options.locale,
            require_authenticated_sign_in: options.require_authenticated_sign_in,
        })
    }

    pub fn schemes(&self) -> &SchemeProvider {
        &self.schemes
    }

    /// Locale error messages are rendered in.
    pub fn locale(&self) -> Locale {
        self.locale
    }

    fn resolve_scheme(
        &self,
        scheme: Option<&str>,
        operation: Operation,
    ) -> Result<Arc<TranslateScheme>, Error> {
        let name = match scheme {
            Some(name) => name,
            None => self
                .schemes
                .default_scheme_name(operation)
                .ok_or(Error::NoDefaultScheme(operation))?,
        };

        self.schemes
            .get_scheme(name)
            .ok_or_else(|| Error::SchemeNotFound {
                scheme: name.to_string(),
                registered: self.schemes.scheme_names(),
            })
    }

    async fn handler_for(
        &self,
        context: &Arc<RequestContext>,
        scheme: Option<&str>,
        operation: Operation,
    ) -> Result<(Arc<TranslateScheme>, SharedHandler), Error> {
        let scheme = self.resolve_scheme(scheme, operation)?;
        debug!("Resolved scheme {} for {operation}", scheme.name());
        let handler = context.handlers().get_handler(context, &scheme).await?;
        Ok((scheme, handler))
    }

    #[instrument(skip(self, context))]
    pub async fn translate(
        &self,
        context: &Arc<RequestContext>,
        scheme: Option<&str>,
    ) -> Result<TranslateResult, Error> {
        let (scheme, handler) = self
            .handler_for(context, scheme, Operation::Translate)
            .await?;
        let mut handler = lock_handler(&handler, scheme.name())?;
        handler.translate().await
    }

    /// Translates `scheme`, reporting a handler error as a failure result.
    ///
    /// Errors resolving or reaching the handler are still returned as `Err`.
    #[instrument(skip(self, context))]
    pub async fn translate_safe(
        &self,
        context: &Arc<RequestContext>,
        scheme: Option<&str>,
    ) -> Result<TranslateResult, Error> {
        let (scheme, handler) = self
            .handler_for(context, scheme, Operation::Translate)
            .await?;
        let mut handler = lock_handler(&handler, scheme.name())?;
        Ok(handler.translate_safe().await)
    }

    #[instrument(skip(self, context, properties))]
    pub async fn challenge(
        &self,
        context: &Arc<RequestContext>,
        scheme: Option<&str>,
        properties: Option<TranslateProperties>,
    ) -> Result<(), Error> {
        let (scheme, handler) = self
            .handler_for(context, scheme, Operation::Challenge)
            .await?;
        let mut handler = lock_handler(&handler, scheme.name())?;
        handler.challenge(properties).await
    }

    #[instrument(skip(self, context, properties))]
    pub async fn forbid(
        &self,
        context: &Arc<RequestContext>,
        scheme: Option<&str>,
        properties: Option<TranslateProperties>,
    ) -> Result<(), Error> {
        let (scheme, handler) = self
            .handler_for(context, scheme, Operation::Forbid)
            .await?;
        let mut handler = lock_handler(&handler, scheme.name())?;
        handler.forbid(properties).await
    }

    /// Persists `principal` through a sign-in capable scheme.
    #[instrument(skip(self, context, principal, properties))]
    pub async fn sign_in(
        &self,
        context: &Arc<RequestContext>,
        scheme: Option<&str>,
        principal: ClaimsPrincipal,
        properties: Option<TranslateProperties>,
    ) -> Result<(), Error> {
        if self.require_authenticated_sign_in && !principal.is_authenticated() {
            return Err(Error::UnauthenticatedSignIn);
        }

        let (scheme, handler) = self
            .handler_for(context, scheme, Operation::SignIn)
            .await?;
        let mut handler = lock_handler(&handler, scheme.name())?;
        let handler = handler
            .as_sign_in_handler()
            .ok_or_else(|| Error::SignInNotSupported(scheme.name().to_string()))?;
        handler.sign_in(principal, properties).await
    }

    #[instrument(skip(self, context, properties))]
    pub async fn sign_out(
        &self,
        context: &Arc<RequestContext>,
        scheme: Option<&str>,
        properties: Option<TranslateProperties>,
    ) -> Result<(), Error> {
        let (scheme, handler) = self
            .handler_for(context, scheme, Operation::SignOut)
            .await?;
        let mut handler = lock_handler(&handler, scheme.name())?;
        let handler = handler
            .as_sign_out_handler()
            .ok_or_else(|| Error::SignOutNotSupported(scheme.name().to_string()))?;
        handler.sign_out(properties).await
    }

    /// Translates `scheme` and reads a token stored in the resulting properties.
    pub async fn get_token(
        &self,
        context: &Arc<RequestContext>,
        scheme: Option<&str>,
        token_name: &str,
    ) -> Result<Option<String>, Error> {
        let result = self.translate(context, scheme).await?;
        Ok(result
            .properties()
            .and_then(|properties| properties.get_token_value(token_name))
            .map(ToString::to_string))
    }
}
