use std::fmt;

use hyper::StatusCode;
use serde_json::json;
use translate_pipeline::resources::Locale;
use translate_pipeline::ErrorKind;

#[derive(Debug, PartialEq)]
pub enum Error {
    Initialization(String),
    Execution(String),
    Translate(translate_pipeline::Error),
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Initialization(err) | Error::Execution(err) => write!(f, "{err}"),
            Error::Translate(err) => write!(f, "Translate error: {err}"),
            Error::Internal(err) => write!(f, "Internal Server Error: {err}"),
        }
    }
}

impl From<translate_pipeline::Error> for Error {
    fn from(error: translate_pipeline::Error) -> Self {
        Error::Translate(error)
    }
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Translate(error) if error.kind() == ErrorKind::Failure => {
                StatusCode::BAD_REQUEST
            }
            Error::Initialization(_)
            | Error::Execution(_)
            | Error::Translate(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_json(&self, locale: Locale, request_id: Option<&String>) -> serde_json::Value {
        let (code, message) = match self {
            Error::Translate(error) => {
                let code = match error.kind() {
                    ErrorKind::Configuration => "SCHEME_CONFIGURATION",
                    ErrorKind::InvalidOperation => "INVALID_OPERATION",
                    ErrorKind::Failure => "TRANSLATE_FAILURE",
                };
                (code, error.message(locale))
            }
            Error::Initialization(msg) | Error::Execution(msg) | Error::Internal(msg) => {
                ("INTERNAL_SERVER_ERROR", msg.clone())
            }
        };

        if let Some(request_id) = request_id {
            json!({
                "errors": [{
                    "code": code,
                    "message": message,
                    "detail": { "request_id": request_id }
                }]
            })
        } else {
            json!({
                "errors": [{
                    "code": code,
                    "message": message,
                }]
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use translate_pipeline::options::Operation;

    use super::*;

    #[test]
    fn test_translate_failure_is_bad_request() {
        let error = Error::from(translate_pipeline::Error::RemoteLogin(Box::new(
            translate_pipeline::Error::CorrelationFailed,
        )));
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.as_json(Locale::En, None)["errors"][0]["code"], "TRANSLATE_FAILURE");
    }

    #[test]
    fn test_configuration_error_json() {
        let error = Error::from(translate_pipeline::Error::NoDefaultScheme(Operation::Challenge));
        let request_id = Some("trace-1".to_string());
        let body = error.as_json(Locale::En, request_id.as_ref());

        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["errors"][0]["code"], "SCHEME_CONFIGURATION");
        assert_eq!(
            body["errors"][0]["message"],
            "No scheme was specified, and there was no default challenge scheme found."
        );
        assert_eq!(body["errors"][0]["detail"]["request_id"], "trace-1");
    }

    #[test]
    fn test_internal_error_display() {
        let error = Error::Internal("boom".to_string());
        assert_eq!(error.to_string(), "Internal Server Error: boom");
        assert_eq!(error.as_json(Locale::En, None)["errors"][0]["message"], "boom");
    }
}
