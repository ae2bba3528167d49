use std::collections::HashMap;
use std::sync::LazyLock;

use crate::language_tag::LanguageTag;

/// Locale used to render error messages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Locale {
    #[default]
    En,
    De,
}

impl Locale {
    /// Selects the message locale matching the primary language of a tag, falling back to English.
    pub fn from_language_tag(tag: &LanguageTag) -> Self {
        match tag.language().to_ascii_lowercase().as_str() {
            "de" => Locale::De,
            _ => Locale::En,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKey {
    InvalidSchemeName,
    SchemeAlreadyExists,
    HandlerTypeMissing,
    NoDefaultScheme,
    SchemeNotFound,
    OptionMustBeProvided,
    RemoteSchemeCannotBeSelf,
    HandlerNotInitialized,
    HandlerAlreadyInitialized,
    SignInNotSupported,
    SignOutNotSupported,
    UnauthenticatedSignIn,
    InvalidTokenName,
    ResultAlreadySet,
    ReentrantCall,
    RequestEnded,
    EventsNotRegistered,
    InvalidReturnState,
    CorrelationFailed,
    RemoteFailureEvent,
    RemoteLogin,
}

static MESSAGES: LazyLock<HashMap<(Locale, MessageKey), &'static str>> = LazyLock::new(|| {
    use Locale::{De, En};
    use MessageKey::*;

    HashMap::from([
        ((En, InvalidSchemeName), "The scheme name must be a non-empty string."),
        ((En, SchemeAlreadyExists), "Scheme already exists: {0}"),
        (
            (En, HandlerTypeMissing),
            "HandlerType must be configured to build the TranslateScheme '{0}'.",
        ),
        (
            (En, NoDefaultScheme),
            "No scheme was specified, and there was no default {0} scheme found.",
        ),
        (
            (En, SchemeNotFound),
            "No translate handler is registered for the scheme '{0}'. The registered schemes are: {1}.",
        ),
        ((En, OptionMustBeProvided), "The '{0}' option must be provided."),
        (
            (En, RemoteSchemeCannotBeSelf),
            "The SignInScheme for the remote translate scheme '{0}' cannot be set to itself. If it was not explicitly set, the default sign-in scheme is used.",
        ),
        (
            (En, HandlerNotInitialized),
            "The translate handler must be initialized before use.",
        ),
        (
            (En, HandlerAlreadyInitialized),
            "The translate handler for the scheme '{0}' is already initialized.",
        ),
        (
            (En, SignInNotSupported),
            "The translate handler registered for the scheme '{0}' does not support sign-in.",
        ),
        (
            (En, SignOutNotSupported),
            "The translate handler registered for the scheme '{0}' does not support sign-out.",
        ),
        (
            (En, UnauthenticatedSignIn),
            "Signing in a principal that is not authenticated is not allowed.",
        ),
        (
            (En, InvalidTokenName),
            "The token name '{0}' is invalid: token names must be non-empty, unique and free of ';'.",
        ),
        (
            (En, ResultAlreadySet),
            "A result has already been set for this event context.",
        ),
        (
            (En, ReentrantCall),
            "The translate handler for the scheme '{0}' is already running in this request.",
        ),
        (
            (En, RequestEnded),
            "The request context of this translate handler is no longer available.",
        ),
        (
            (En, EventsNotRegistered),
            "No request-scoped remote translate events are registered for the scheme '{0}'.",
        ),
        ((En, InvalidReturnState), "Invalid return state, unable to redirect."),
        ((En, CorrelationFailed), "Correlation failed."),
        (
            (En, RemoteFailureEvent),
            "An error was returned from the RemoteFailure event.",
        ),
        (
            (En, RemoteLogin),
            "An error was encountered while handling the remote login.",
        ),
        (
            (De, InvalidSchemeName),
            "Der Schemaname muss eine nicht leere Zeichenfolge sein.",
        ),
        ((De, SchemeAlreadyExists), "Das Schema existiert bereits: {0}"),
        (
            (De, HandlerTypeMissing),
            "Für das Schema '{0}' muss ein Handlertyp konfiguriert werden.",
        ),
        (
            (De, NoDefaultScheme),
            "Es wurde kein Schema angegeben, und es wurde kein Standardschema für '{0}' gefunden.",
        ),
        (
            (De, SchemeNotFound),
            "Für das Schema '{0}' ist kein Handler registriert. Registrierte Schemata: {1}.",
        ),
        (
            (De, OptionMustBeProvided),
            "Die Option '{0}' muss angegeben werden.",
        ),
        (
            (De, RemoteSchemeCannotBeSelf),
            "Das Anmeldeschema des entfernten Schemas '{0}' darf nicht auf sich selbst verweisen.",
        ),
    ])
});

/// Renders a message template, substituting positional `{n}` placeholders.
///
/// Keys without a translation for `locale` fall back to English.
pub fn format_message(locale: Locale, key: MessageKey, args: &[&str]) -> String {
    let template = MESSAGES
        .get(&(locale, key))
        .or_else(|| MESSAGES.get(&(Locale::En, key)))
        .copied()
        .unwrap_or_default();

    let mut message = template.to_string();
    for (index, arg) in args.iter().enumerate() {
        message = message.replace(&format!("{{{index}}}"), arg);
    }
    message
}
