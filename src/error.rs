use std::fmt;

use crate::options::Operation;
use crate::resources::{format_message, Locale, MessageKey};

/// Classification of pipeline errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal setup errors, surfaced when schemes and options are registered or validated.
    Configuration,
    /// Programming errors: the pipeline was driven in an order it does not allow.
    InvalidOperation,
    /// Recoverable translate failures, usually captured into a result.
    Failure,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    InvalidSchemeName,
    SchemeAlreadyExists(String),
    HandlerTypeMissing(String),
    NoDefaultScheme(Operation),
    SchemeNotFound {
        scheme: String,
        registered: Vec<String>,
    },
    OptionMustBeProvided(String),
    RemoteSchemeCannotBeSelf(String),
    HandlerNotInitialized,
    HandlerAlreadyInitialized(String),
    SignInNotSupported(String),
    SignOutNotSupported(String),
    UnauthenticatedSignIn,
    InvalidTokenName(String),
    ResultAlreadySet,
    ReentrantCall(String),
    RequestEnded,
    EventsNotRegistered(String),
    InvalidReturnState,
    CorrelationFailed,
    RemoteFailureEvent(Box<Error>),
    RemoteLogin(Box<Error>),
    Failure(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidSchemeName
            | Error::SchemeAlreadyExists(_)
            | Error::HandlerTypeMissing(_)
            | Error::NoDefaultScheme(_)
            | Error::SchemeNotFound { .. }
            | Error::OptionMustBeProvided(_)
            | Error::RemoteSchemeCannotBeSelf(_)
            | Error::SignInNotSupported(_)
            | Error::SignOutNotSupported(_)
            | Error::EventsNotRegistered(_) => ErrorKind::Configuration,
            Error::HandlerNotInitialized
            | Error::HandlerAlreadyInitialized(_)
            | Error::UnauthenticatedSignIn
            | Error::InvalidTokenName(_)
            | Error::ResultAlreadySet
            | Error::ReentrantCall(_)
            | Error::RequestEnded => ErrorKind::InvalidOperation,
            Error::InvalidReturnState
            | Error::CorrelationFailed
            | Error::RemoteFailureEvent(_)
            | Error::RemoteLogin(_)
            | Error::Failure(_) => ErrorKind::Failure,
        }
    }

    /// Renders the error message for the given locale.
    pub fn message(&self, locale: Locale) -> String {
        match self {
            Error::InvalidSchemeName => format_message(locale, MessageKey::InvalidSchemeName, &[]),
            Error::SchemeAlreadyExists(name) => {
                format_message(locale, MessageKey::SchemeAlreadyExists, &[name])
            }
            Error::HandlerTypeMissing(name) => {
                format_message(locale, MessageKey::HandlerTypeMissing, &[name])
            }
            Error::NoDefaultScheme(operation) => {
                format_message(locale, MessageKey::NoDefaultScheme, &[operation.as_str()])
            }
            Error::SchemeNotFound { scheme, registered } => format_message(
                locale,
                MessageKey::SchemeNotFound,
                &[scheme, &registered.join(", ")],
            ),
            Error::OptionMustBeProvided(option) => {
                format_message(locale, MessageKey::OptionMustBeProvided, &[option])
            }
            Error::RemoteSchemeCannotBeSelf(name) => {
                format_message(locale, MessageKey::RemoteSchemeCannotBeSelf, &[name])
            }
            Error::HandlerNotInitialized => {
                format_message(locale, MessageKey::HandlerNotInitialized, &[])
            }
            Error::HandlerAlreadyInitialized(name) => {
                format_message(locale, MessageKey::HandlerAlreadyInitialized, &[name])
            }
            Error::SignInNotSupported(name) => {
                format_message(locale, MessageKey::SignInNotSupported, &[name])
            }
            Error::SignOutNotSupported(name) => {
                format_message(locale, MessageKey::SignOutNotSupported, &[name])
            }
            Error::UnauthenticatedSignIn => {
                format_message(locale, MessageKey::UnauthenticatedSignIn, &[])
            }
            Error::InvalidTokenName(name) => {
                format_message(locale, MessageKey::InvalidTokenName, &[name])
            }
            Error::ResultAlreadySet => format_message(locale, MessageKey::ResultAlreadySet, &[]),
            Error::ReentrantCall(name) => {
                format_message(locale, MessageKey::ReentrantCall, &[name])
            }
            Error::RequestEnded => format_message(locale, MessageKey::RequestEnded, &[]),
            Error::EventsNotRegistered(name) => {
                format_message(locale, MessageKey::EventsNotRegistered, &[name])
            }
            Error::InvalidReturnState => {
                format_message(locale, MessageKey::InvalidReturnState, &[])
            }
            Error::CorrelationFailed => format_message(locale, MessageKey::CorrelationFailed, &[]),
            Error::RemoteFailureEvent(inner) => format!(
                "{} ({})",
                format_message(locale, MessageKey::RemoteFailureEvent, &[]),
                inner.message(locale)
            ),
            Error::RemoteLogin(inner) => format!(
                "{} ({})",
                format_message(locale, MessageKey::RemoteLogin, &[]),
                inner.message(locale)
            ),
            Error::Failure(message) => message.clone(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message(Locale::default()))
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            Error::SchemeAlreadyExists("a".to_string()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            Error::OptionMustBeProvided("CallbackPath".to_string()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(Error::HandlerNotInitialized.kind(), ErrorKind::InvalidOperation);
        assert_eq!(Error::ResultAlreadySet.kind(), ErrorKind::InvalidOperation);
        assert_eq!(Error::CorrelationFailed.kind(), ErrorKind::Failure);
        assert_eq!(
            Error::Failure("bad credentials".to_string()).kind(),
            ErrorKind::Failure
        );
    }

    #[test]
    fn test_display_uses_default_locale() {
        let error = Error::NoDefaultScheme(Operation::Challenge);
        assert_eq!(
            error.to_string(),
            "No scheme was specified, and there was no default challenge scheme found."
        );
    }

    #[test]
    fn test_scheme_not_found_lists_registered_schemes() {
        let error = Error::SchemeNotFound {
            scheme: "oidc".to_string(),
            registered: vec!["basic".to_string(), "cookies".to_string()],
        };
        assert!(error.to_string().contains("basic, cookies"));
    }

    #[test]
    fn test_nested_error_message() {
        let error = Error::RemoteLogin(Box::new(Error::CorrelationFailed));
        assert_eq!(
            error.to_string(),
            "An error was encountered while handling the remote login. (Correlation failed.)"
        );
    }

    #[test]
    fn test_localized_message() {
        let error = Error::SchemeAlreadyExists("basic".to_string());
        assert_eq!(error.message(Locale::De), "Das Schema existiert bereits: basic");
    }
}
