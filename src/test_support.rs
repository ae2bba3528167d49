use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hyper::http::request::Parts;
use hyper::Request;
use parking_lot::Mutex;

use crate::context::RequestContext;
use crate::error::Error;
use crate::events::BaseContext;
use crate::handler::{
    HandleRemoteTranslate, HandleSignIn, HandleTranslate, HandlerState, RemoteHandler,
    RemoteState, SchemeHandler, SignInSchemeHandler,
};
use crate::options::{BaseSchemeOptions, OptionsMonitor, TranslateOptions};
use crate::principal::{Claim, ClaimsIdentity, ClaimsPrincipal, NAME_CLAIM_TYPE};
use crate::properties::TranslateProperties;
use crate::remote_options::RemoteTranslateOptions;
use crate::result::{HandleRequestResult, TranslateResult};
use crate::scheme::TranslateSchemeBuilder;
use crate::service::TranslateService;
use crate::ticket::TranslateTicket;

pub(crate) fn build_parts(path_and_query: &str) -> Parts {
    let (parts, ()) = Request::builder()
        .uri(path_and_query)
        .body(())
        .unwrap()
        .into_parts();
    parts
}

pub(crate) fn build_service<F>(configure: F) -> Arc<TranslateService>
where
    F: FnOnce(&mut TranslateOptions),
{
    let mut options = TranslateOptions::new();
    configure(&mut options);
    Arc::new(TranslateService::new(&options).unwrap())
}

pub(crate) fn build_context(service: &Arc<TranslateService>, path: &str) -> Arc<RequestContext> {
    RequestContext::new(build_parts(path), Arc::clone(service))
}

pub(crate) fn build_context_with_path_base(
    service: &Arc<TranslateService>,
    path_base: &str,
    path: &str,
) -> Arc<RequestContext> {
    let full_path = format!("{}{path}", path_base.trim_end_matches('/'));
    RequestContext::with_path_base(build_parts(&full_path), path_base, Arc::clone(service))
}

pub(crate) fn test_principal(authentication_type: &str) -> ClaimsPrincipal {
    ClaimsPrincipal::new(ClaimsIdentity::new(
        authentication_type,
        vec![Claim::new(NAME_CLAIM_TYPE, "alice")],
    ))
}

pub(crate) fn forward_monitor(
    scheme: &str,
    options: BaseSchemeOptions,
) -> Arc<OptionsMonitor<BaseSchemeOptions>> {
    let mut monitor = OptionsMonitor::new();
    monitor.configure(scheme, options);
    Arc::new(monitor)
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum Outcome {
    Success,
    Failure,
    NoResult,
    Error,
}

/// Translate logic counting how often it runs.
pub(crate) struct CountingScheme {
    calls: Arc<AtomicUsize>,
    outcome: Outcome,
}

#[async_trait]
impl HandleTranslate for CountingScheme {
    type Options = BaseSchemeOptions;

    async fn handle_translate(
        &mut self,
        state: &HandlerState<BaseSchemeOptions>,
    ) -> Result<TranslateResult, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            Outcome::Success => Ok(TranslateResult::success(TranslateTicket::new(
                test_principal(state.scheme_name()),
                None,
                state.scheme_name(),
            ))),
            Outcome::Failure => Ok(TranslateResult::fail_message("counting failure")),
            Outcome::NoResult => Ok(TranslateResult::no_result()),
            Outcome::Error => Err(Error::Failure("counting error".to_string())),
        }
    }
}

pub(crate) type CountingHandler = SchemeHandler<CountingScheme>;

pub(crate) fn counting_handler() -> CountingHandler {
    counting_handler_with(Arc::default(), Outcome::Success, Arc::default())
}

pub(crate) fn counting_handler_with(
    calls: Arc<AtomicUsize>,
    outcome: Outcome,
    options_monitor: Arc<OptionsMonitor<BaseSchemeOptions>>,
) -> CountingHandler {
    SchemeHandler::new(CountingScheme { calls, outcome }, options_monitor)
}

/// Factory for counting handlers sharing one call counter.
pub(crate) fn counting_factory(
    calls: &Arc<AtomicUsize>,
    outcome: Outcome,
    options_monitor: Arc<OptionsMonitor<BaseSchemeOptions>>,
) -> impl Fn() -> CountingHandler + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move || counting_handler_with(Arc::clone(&calls), outcome, Arc::clone(&options_monitor))
}

pub(crate) type SessionStore = Arc<Mutex<Option<(ClaimsPrincipal, TranslateProperties)>>>;

/// Sign-in logic keeping the signed-in identity in a store shared across requests.
pub(crate) struct SessionScheme {
    store: SessionStore,
}

#[async_trait]
impl HandleTranslate for SessionScheme {
    type Options = BaseSchemeOptions;

    async fn handle_translate(
        &mut self,
        state: &HandlerState<BaseSchemeOptions>,
    ) -> Result<TranslateResult, Error> {
        let stored = self.store.lock().clone();
        Ok(match stored {
            Some((principal, properties)) => TranslateResult::success(TranslateTicket::new(
                principal,
                Some(properties),
                state.scheme_name(),
            )),
            None => TranslateResult::no_result(),
        })
    }
}

#[async_trait]
impl HandleSignIn for SessionScheme {
    async fn handle_sign_in(
        &mut self,
        _state: &HandlerState<BaseSchemeOptions>,
        principal: ClaimsPrincipal,
        properties: TranslateProperties,
    ) -> Result<(), Error> {
        *self.store.lock() = Some((principal, properties));
        Ok(())
    }

    async fn handle_sign_out(
        &mut self,
        _state: &HandlerState<BaseSchemeOptions>,
        _properties: TranslateProperties,
    ) -> Result<(), Error> {
        *self.store.lock() = None;
        Ok(())
    }
}

pub(crate) type SessionHandler = SignInSchemeHandler<SessionScheme>;

pub(crate) fn session_factory(
    store: &SessionStore,
) -> impl Fn() -> SessionHandler + Send + Sync + 'static {
    session_factory_with(store, Arc::default())
}

pub(crate) fn session_factory_with(
    store: &SessionStore,
    options_monitor: Arc<OptionsMonitor<BaseSchemeOptions>>,
) -> impl Fn() -> SessionHandler + Send + Sync + 'static {
    let store = Arc::clone(store);
    move || {
        SignInSchemeHandler::new(
            SessionScheme {
                store: Arc::clone(&store),
            },
            Arc::clone(&options_monitor),
        )
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum RemoteOutcome {
    Success,
    Failure,
    Error,
    Handled,
    Skipped,
    NoResult,
    Denied,
    Correlated,
}

/// Remote logic with a scripted callback outcome.
#[derive(Clone)]
pub(crate) struct TestRemote {
    pub(crate) outcome: RemoteOutcome,
    pub(crate) calls: Arc<AtomicUsize>,
}

impl TestRemote {
    pub(crate) fn new(outcome: RemoteOutcome) -> Self {
        Self {
            outcome,
            calls: Arc::default(),
        }
    }
}

#[async_trait]
impl HandleRemoteTranslate for TestRemote {
    async fn handle_remote_translate(
        &mut self,
        remote: &RemoteState,
    ) -> Result<HandleRequestResult, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut properties = TranslateProperties::new();
        properties.set_redirect_uri(Some("/done"));

        match self.outcome {
            RemoteOutcome::Success => Ok(HandleRequestResult::success(TranslateTicket::new(
                test_principal(remote.scheme_name()),
                Some(properties),
                remote.scheme_name(),
            ))),
            RemoteOutcome::Failure => Ok(HandleRequestResult::fail_with_properties(
                Error::Failure("remote failure".to_string()),
                properties,
            )),
            RemoteOutcome::Error => Err(Error::Failure("remote error".to_string())),
            RemoteOutcome::Handled => Ok(HandleRequestResult::handle()),
            RemoteOutcome::Skipped => Ok(HandleRequestResult::skip_handler()),
            RemoteOutcome::NoResult => Ok(HandleRequestResult::no_result()),
            RemoteOutcome::Denied => remote.handle_access_denied(Some(properties)).await,
            RemoteOutcome::Correlated => {
                let context = remote.context()?;
                if let Some(nonce) = context.query("state") {
                    properties.set_string(crate::handler::remote::CORRELATION_PROPERTY, Some(&nonce));
                }
                if !remote.validate_correlation_id(&mut properties)? {
                    return Ok(HandleRequestResult::fail(Error::CorrelationFailed));
                }
                Ok(HandleRequestResult::success(TranslateTicket::new(
                    test_principal(remote.scheme_name()),
                    Some(properties),
                    remote.scheme_name(),
                )))
            }
        }
    }

    async fn handle_challenge(
        &mut self,
        remote: &RemoteState,
        properties: &TranslateProperties,
    ) -> Result<(), Error> {
        let mut properties = properties.clone();
        remote.generate_correlation_id(&mut properties)?;
        remote.context()?.redirect("https://idp.example.com/authorize")
    }
}

pub(crate) type RemoteTestHandler = RemoteHandler<TestRemote>;

pub(crate) fn remote_options() -> RemoteTranslateOptions {
    RemoteTranslateOptions {
        callback_path: Some("/signin-remote".to_string()),
        sign_in_scheme: Some("session".to_string()),
        ..RemoteTranslateOptions::default()
    }
}

pub(crate) fn remote_monitor(options: RemoteTranslateOptions) -> Arc<OptionsMonitor<RemoteTranslateOptions>> {
    let mut monitor = OptionsMonitor::new();
    monitor.configure("remote", options);
    Arc::new(monitor)
}

pub(crate) fn remote_handler() -> RemoteTestHandler {
    RemoteHandler::new(
        TestRemote::new(RemoteOutcome::Success),
        remote_monitor(remote_options()),
    )
}

pub(crate) fn remote_factory(
    remote: TestRemote,
    options: RemoteTranslateOptions,
) -> impl Fn() -> RemoteTestHandler + Send + Sync + 'static {
    let monitor = remote_monitor(options);
    move || RemoteHandler::new(remote.clone(), Arc::clone(&monitor))
}

pub(crate) fn remote_event_base(context: &Arc<RequestContext>) -> BaseContext {
    let mut builder = TranslateSchemeBuilder::new("remote");
    builder.handler(remote_handler);
    BaseContext::new(
        Arc::clone(context),
        Arc::new(builder.build().unwrap()),
        Arc::new(remote_options()),
    )
}
