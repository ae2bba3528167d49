use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use hyper::StatusCode;
use parking_lot::Mutex;

use super::*;
use crate::metrics_provider::TRANSLATE_ATTEMPTS;
use crate::options::{BaseSchemeOptions, ForwardOptions};
use crate::test_support::{
    build_context, build_service, counting_factory, counting_handler_with, forward_monitor,
    session_factory, session_factory_with, test_principal, Outcome, SessionStore,
};

type OperationLog = Arc<Mutex<Vec<String>>>;

/// Records every challenge, forbid, sign-in and sign-out it handles, tagged with its scheme.
struct RecordingScheme {
    log: OperationLog,
}

impl RecordingScheme {
    fn record(&self, operation: &str, state: &HandlerState<BaseSchemeOptions>) {
        self.log
            .lock()
            .push(format!("{operation}:{}", state.scheme_name()));
    }
}

#[async_trait]
impl HandleTranslate for RecordingScheme {
    type Options = BaseSchemeOptions;

    async fn handle_translate(
        &mut self,
        _state: &HandlerState<BaseSchemeOptions>,
    ) -> Result<TranslateResult, Error> {
        Ok(TranslateResult::no_result())
    }

    async fn handle_challenge(
        &mut self,
        state: &HandlerState<BaseSchemeOptions>,
        _properties: &TranslateProperties,
    ) -> Result<(), Error> {
        self.record("challenge", state);
        state.context()?.set_status(StatusCode::IM_A_TEAPOT);
        Ok(())
    }

    async fn handle_forbidden(
        &mut self,
        state: &HandlerState<BaseSchemeOptions>,
        _properties: &TranslateProperties,
    ) -> Result<(), Error> {
        self.record("forbid", state);
        state
            .context()?
            .set_status(StatusCode::PROXY_AUTHENTICATION_REQUIRED);
        Ok(())
    }
}

#[async_trait]
impl HandleSignIn for RecordingScheme {
    async fn handle_sign_in(
        &mut self,
        state: &HandlerState<BaseSchemeOptions>,
        _principal: ClaimsPrincipal,
        _properties: TranslateProperties,
    ) -> Result<(), Error> {
        self.record("sign_in", state);
        Ok(())
    }

    async fn handle_sign_out(
        &mut self,
        state: &HandlerState<BaseSchemeOptions>,
        _properties: TranslateProperties,
    ) -> Result<(), Error> {
        self.record("sign_out", state);
        Ok(())
    }
}

fn recording_factory(
    log: &OperationLog,
    options_monitor: Arc<OptionsMonitor<BaseSchemeOptions>>,
) -> impl Fn() -> SignInSchemeHandler<RecordingScheme> + Send + Sync + 'static {
    let log = Arc::clone(log);
    move || {
        SignInSchemeHandler::new(
            RecordingScheme {
                log: Arc::clone(&log),
            },
            Arc::clone(&options_monitor),
        )
    }
}

fn forwarding(forward: ForwardOptions) -> BaseSchemeOptions {
    BaseSchemeOptions {
        forward,
        claims_issuer: None,
    }
}

#[tokio::test]
async fn test_translate_runs_once_per_request() {
    let calls = Arc::new(AtomicUsize::new(0));
    let service = build_service(|options| {
        options
            .add_handler("count", None, counting_factory(&calls, Outcome::Success, Arc::default()))
            .unwrap();
    });
    let context = build_context(&service, "/");

    let first = service.translate(&context, Some("count")).await.unwrap();
    let second = service.translate(&context, Some("count")).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(first, second);
    assert!(first.succeeded());

    let next_request = build_context(&service, "/");
    service.translate(&next_request, Some("count")).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_translate_error_is_memoized() {
    let calls = Arc::new(AtomicUsize::new(0));
    let service = build_service(|options| {
        options
            .add_handler("count", None, counting_factory(&calls, Outcome::Error, Arc::default()))
            .unwrap();
    });
    let context = build_context(&service, "/");

    let expected = Err(Error::Failure("counting error".to_string()));
    assert_eq!(service.translate(&context, Some("count")).await, expected);
    assert_eq!(service.translate(&context, Some("count")).await, expected);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_translate_safe_captures_forwarded_errors() {
    let back_calls = Arc::new(AtomicUsize::new(0));
    let front_options = forward_monitor(
        "front",
        forwarding(ForwardOptions {
            translate: Some("back".to_string()),
            ..ForwardOptions::default()
        }),
    );
    let service = build_service(|options| {
        options
            .add_handler("front", None, counting_factory(&Arc::default(), Outcome::Success, Arc::clone(&front_options)))
            .unwrap();
        options
            .add_handler("back", None, counting_factory(&back_calls, Outcome::Error, Arc::default()))
            .unwrap();
    });
    let context = build_context(&service, "/");
    let scheme = service.schemes().get_scheme("front").unwrap();

    let mut handler = counting_handler_with(Arc::default(), Outcome::Success, front_options);
    handler.initialize(scheme, Arc::clone(&context)).await.unwrap();

    let result = handler.translate_safe().await;
    assert_eq!(
        result.failure(),
        Some(&Error::Failure("counting error".to_string()))
    );
    assert!(!result.succeeded());
    assert_eq!(back_calls.load(Ordering::SeqCst), 1);
    assert_eq!(handler.phase(), HandlerPhase::Initialized);
}

#[tokio::test]
async fn test_lifecycle_phases_and_initialize_once() {
    let service = build_service(|options| {
        options
            .add_handler("count", None, counting_factory(&Arc::default(), Outcome::NoResult, Arc::default()))
            .unwrap();
    });
    let context = build_context(&service, "/");
    let scheme = service.schemes().get_scheme("count").unwrap();
    let mut handler = counting_handler_with(Arc::default(), Outcome::NoResult, Arc::default());

    assert_eq!(handler.phase(), HandlerPhase::Uninitialized);
    assert_eq!(handler.translate().await, Err(Error::HandlerNotInitialized));
    assert_eq!(handler.challenge(None).await, Err(Error::HandlerNotInitialized));
    assert_eq!(handler.forbid(None).await, Err(Error::HandlerNotInitialized));

    handler
        .initialize(Arc::clone(&scheme), Arc::clone(&context))
        .await
        .unwrap();
    assert_eq!(handler.phase(), HandlerPhase::Initialized);
    assert_eq!(
        handler.initialize(scheme, Arc::clone(&context)).await,
        Err(Error::HandlerAlreadyInitialized("count".to_string()))
    );

    assert!(handler.translate().await.unwrap().none());
    assert_eq!(handler.phase(), HandlerPhase::Translated);
}

#[tokio::test]
async fn test_dropped_request_context_ends_handler() {
    let service = build_service(|options| {
        options
            .add_handler("count", None, counting_factory(&Arc::default(), Outcome::Success, Arc::default()))
            .unwrap();
    });
    let scheme = service.schemes().get_scheme("count").unwrap();
    let mut handler = counting_handler_with(Arc::default(), Outcome::Success, Arc::default());

    let context = build_context(&service, "/");
    handler.initialize(scheme, Arc::clone(&context)).await.unwrap();
    drop(context);

    assert_eq!(handler.translate().await, Err(Error::RequestEnded));
}

#[tokio::test]
async fn test_default_challenge_and_forbid_status() {
    let service = build_service(|options| {
        options
            .add_handler("count", None, counting_factory(&Arc::default(), Outcome::Success, Arc::default()))
            .unwrap();
        options.defaults.default_scheme = Some("count".to_string());
    });

    let context = build_context(&service, "/");
    service.challenge(&context, None, None).await.unwrap();
    assert_eq!(context.status(), StatusCode::UNAUTHORIZED);

    let context = build_context(&service, "/");
    service.forbid(&context, None, None).await.unwrap();
    assert_eq!(context.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_forwarded_translate_skips_local_logic() {
    let front_calls = Arc::new(AtomicUsize::new(0));
    let back_calls = Arc::new(AtomicUsize::new(0));
    let front_options = forward_monitor(
        "front",
        forwarding(ForwardOptions {
            translate: Some("back".to_string()),
            ..ForwardOptions::default()
        }),
    );
    let service = build_service(|options| {
        options
            .add_handler("front", None, counting_factory(&front_calls, Outcome::Success, front_options))
            .unwrap();
        options
            .add_handler("back", None, counting_factory(&back_calls, Outcome::Success, Arc::default()))
            .unwrap();
    });
    let context = build_context(&service, "/");

    let result = service.translate(&context, Some("front")).await.unwrap();
    assert_eq!(result.ticket().unwrap().translate_scheme(), "back");
    assert_eq!(front_calls.load(Ordering::SeqCst), 0);
    assert_eq!(back_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_challenge_forbid_and_sign_out_reach_forward_target() {
    let log = OperationLog::default();
    let front_options = forward_monitor(
        "front",
        forwarding(ForwardOptions {
            challenge: Some("back".to_string()),
            forbid: Some("back".to_string()),
            sign_out: Some("back".to_string()),
            ..ForwardOptions::default()
        }),
    );
    let service = build_service(|options| {
        options
            .add_handler("front", None, recording_factory(&log, front_options))
            .unwrap();
        options
            .add_handler("back", None, recording_factory(&log, Arc::default()))
            .unwrap();
    });

    let context = build_context(&service, "/");
    service.challenge(&context, Some("front"), None).await.unwrap();
    assert_eq!(context.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(*log.lock(), vec!["challenge:back".to_string()]);

    let context = build_context(&service, "/");
    service.forbid(&context, Some("front"), None).await.unwrap();
    assert_eq!(context.status(), StatusCode::PROXY_AUTHENTICATION_REQUIRED);
    assert_eq!(log.lock().last().map(String::as_str), Some("forbid:back"));

    service.sign_out(&context, Some("front"), None).await.unwrap();
    assert_eq!(log.lock().last().map(String::as_str), Some("sign_out:back"));

    // sign-in has no target, so it stays on the front scheme
    service
        .sign_in(&context, Some("front"), test_principal("test"), None)
        .await
        .unwrap();
    assert_eq!(
        *log.lock(),
        vec![
            "challenge:back".to_string(),
            "forbid:back".to_string(),
            "sign_out:back".to_string(),
            "sign_in:front".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_forward_to_own_scheme_is_ignored() {
    let calls = Arc::new(AtomicUsize::new(0));
    let own = forward_monitor(
        "self",
        forwarding(ForwardOptions {
            default: Some("self".to_string()),
            ..ForwardOptions::default()
        }),
    );
    let service = build_service(|options| {
        options
            .add_handler("self", None, counting_factory(&calls, Outcome::Success, own))
            .unwrap();
    });
    let context = build_context(&service, "/");

    let result = service.translate(&context, Some("self")).await.unwrap();
    assert_eq!(result.ticket().unwrap().translate_scheme(), "self");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_forward_selector_picks_target() {
    let calls = Arc::new(AtomicUsize::new(0));
    let selector: crate::options::ForwardSelector = Arc::new(|context: &RequestContext| {
        context
            .path()
            .starts_with("/api")
            .then(|| "api".to_string())
    });
    let front = forward_monitor(
        "front",
        forwarding(ForwardOptions {
            default_selector: Some(selector),
            ..ForwardOptions::default()
        }),
    );
    let service = build_service(|options| {
        options
            .add_handler("front", None, counting_factory(&Arc::default(), Outcome::NoResult, front))
            .unwrap();
        options
            .add_handler("api", None, counting_factory(&calls, Outcome::Success, Arc::default()))
            .unwrap();
    });

    let context = build_context(&service, "/api/items");
    assert!(service.translate(&context, Some("front")).await.unwrap().succeeded());

    let context = build_context(&service, "/home");
    assert!(service.translate(&context, Some("front")).await.unwrap().none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_forwarding_cycle_is_reported() {
    let service = build_service(|options| {
        let to_b = forward_monitor(
            "a",
            forwarding(ForwardOptions {
                translate: Some("b".to_string()),
                ..ForwardOptions::default()
            }),
        );
        let to_a = forward_monitor(
            "b",
            forwarding(ForwardOptions {
                translate: Some("a".to_string()),
                ..ForwardOptions::default()
            }),
        );
        options
            .add_handler("a", None, counting_factory(&Arc::default(), Outcome::Success, to_b))
            .unwrap();
        options
            .add_handler("b", None, counting_factory(&Arc::default(), Outcome::Success, to_a))
            .unwrap();
    });
    let context = build_context(&service, "/");

    assert_eq!(
        service.translate(&context, Some("a")).await,
        Err(Error::ReentrantCall("a".to_string()))
    );
}

#[tokio::test]
async fn test_sign_in_is_forwarded_per_operation() {
    let front_store = SessionStore::default();
    let back_store = SessionStore::default();
    let front_options = forward_monitor(
        "front",
        forwarding(ForwardOptions {
            sign_in: Some("back".to_string()),
            ..ForwardOptions::default()
        }),
    );
    let service = build_service(|options| {
        options
            .add_handler("front", None, session_factory_with(&front_store, front_options))
            .unwrap();
        options
            .add_handler("back", None, session_factory(&back_store))
            .unwrap();
    });
    let context = build_context(&service, "/");

    service
        .sign_in(&context, Some("front"), test_principal("test"), None)
        .await
        .unwrap();
    assert!(front_store.lock().is_none());
    assert!(back_store.lock().is_some());

    // no sign-out target, so it runs locally
    service.sign_out(&context, Some("front"), None).await.unwrap();
    assert!(back_store.lock().is_some());
}

#[tokio::test]
async fn test_translate_attempts_are_counted_once() {
    let service = build_service(|options| {
        options
            .add_handler("metered", None, counting_factory(&Arc::default(), Outcome::Failure, Arc::default()))
            .unwrap();
    });
    let context = build_context(&service, "/");

    service.translate(&context, Some("metered")).await.unwrap();
    service.translate(&context, Some("metered")).await.unwrap();
    assert_eq!(
        TRANSLATE_ATTEMPTS
            .with_label_values(&["metered", "failure"])
            .get(),
        1
    );
}

#[tokio::test]
async fn test_translate_errors_are_counted_apart_from_failures() {
    let service = build_service(|options| {
        options
            .add_handler("erroring", None, counting_factory(&Arc::default(), Outcome::Error, Arc::default()))
            .unwrap();
    });
    let context = build_context(&service, "/");

    assert!(service.translate(&context, Some("erroring")).await.is_err());
    assert!(service.translate(&context, Some("erroring")).await.is_err());
    assert_eq!(
        TRANSLATE_ATTEMPTS
            .with_label_values(&["erroring", "error"])
            .get(),
        1
    );
    assert_eq!(
        TRANSLATE_ATTEMPTS
            .with_label_values(&["erroring", "failure"])
            .get(),
        0
    );
}

#[tokio::test]
async fn test_claims_issuer_defaults_to_scheme_name() {
    let service = build_service(|options| {
        options
            .add_handler("count", None, counting_factory(&Arc::default(), Outcome::Success, Arc::default()))
            .unwrap();
    });
    let context = build_context(&service, "/");
    let scheme = service.schemes().get_scheme("count").unwrap();

    let issuer = forward_monitor(
        "count",
        BaseSchemeOptions {
            forward: ForwardOptions::default(),
            claims_issuer: Some("https://issuer.example.com".to_string()),
        },
    );
    let mut configured = counting_handler_with(Arc::default(), Outcome::Success, issuer);
    configured
        .initialize(Arc::clone(&scheme), Arc::clone(&context))
        .await
        .unwrap();
    assert_eq!(
        configured.state().unwrap().claims_issuer(),
        "https://issuer.example.com"
    );

    let mut plain = counting_handler_with(Arc::default(), Outcome::Success, Arc::default());
    plain.initialize(scheme, context).await.unwrap();
    assert_eq!(plain.state().unwrap().claims_issuer(), "count");
}
