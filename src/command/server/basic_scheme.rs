
use std::collections::HashMap;
use std::sync::Arc;

use argon2::password_hash::PasswordHashString;
use argon2::{Argon2, PasswordVerifier};
use async_trait::async_trait;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use hyper::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use hyper::StatusCode;
use tracing::{debug, instrument, warn};
use translate_pipeline::handler::{HandleTranslate, HandlerState};
use translate_pipeline::options::{ForwardOptions, SchemeOptions};
use translate_pipeline::principal::{NAME_CLAIM_TYPE, NAME_IDENTIFIER_CLAIM_TYPE, ROLE_CLAIM_TYPE};
use translate_pipeline::properties::TranslateProperties;
use translate_pipeline::{Claim, ClaimsIdentity, ClaimsPrincipal, Error, TranslateResult, TranslateTicket};

use crate::configuration::{BasicSchemeConfig, IdentityConfig};

static BASIC_PREFIX: &str = "Basic ";

#[derive(Clone, Debug)]
pub struct BasicSchemeOptions {
    pub forward: ForwardOptions,
    pub claims_issuer: Option<String>,
    pub realm: String,
}

impl Default for BasicSchemeOptions {
    fn default() -> Self {
        Self {
            forward: ForwardOptions::default(),
            claims_issuer: None,
            realm: String::from("Translate Gateway"),
        }
    }
}

impl From<&BasicSchemeConfig> for BasicSchemeOptions {
    fn from(config: &BasicSchemeConfig) -> Self {
        Self {
            forward: config.forward.clone(),
            claims_issuer: config.claims_issuer.clone(),
            realm: config.realm.clone(),
        }
    }
}

impl SchemeOptions for BasicSchemeOptions {
    fn forward(&self) -> &ForwardOptions {
        &self.forward
    }

    fn claims_issuer(&self) -> Option<&str> {
        self.claims_issuer.as_deref()
    }
}

struct BasicUser {
    id: String,
    password: PasswordHashString,
    roles: Vec<String>,
}

/// Users allowed to sign in through one basic scheme, keyed by username.
pub struct BasicIdentities {
    users: HashMap<String, BasicUser>,
}

fn build_users(identities: &HashMap<String, IdentityConfig>) -> HashMap<String, BasicUser> {
    let mut users = HashMap::new();
    for (id, config) in identities {
        let password = match PasswordHashString::new(&config.password) {
            Ok(hash) => hash,
            Err(err) => {
                warn!("Invalid password hash for user {}: {err}", config.username);
                continue;
            }
        };

        users.insert(
            config.username.clone(),
            BasicUser {
                id: id.clone(),
                password,
                roles: config.roles.clone(),
            },
        );
    }

    users
}

impl BasicIdentities {
    pub fn new(identities: &HashMap<String, IdentityConfig>) -> Self {
        Self {
            users: build_users(identities),
        }
    }

    #[instrument(skip(self, password))]
    fn validate_credentials(&self, username: &str, password: &str) -> Option<&BasicUser> {
        let Some(user) = self.users.get(username) else {
            debug!("Username not found in credentials");
            return None;
        };

        match Argon2::default().verify_password(password.as_bytes(), &user.password.password_hash()) {
            Ok(()) => Some(user),
            Err(error) => {
                debug!("Password verification failed: {error}");
                None
            }
        }
    }
}

/// Decodes the credentials of an `Authorization: Basic` header value.
///
/// `None` means the header uses another scheme; `Some(None)` a malformed basic payload.
fn basic_credentials(authorization: &str) -> Option<Option<(String, String)>> {
    let value = authorization.strip_prefix(BASIC_PREFIX)?;

    let decoded = BASE64_STANDARD
        .decode(value.trim())
        .ok()
        .and_then(|value| String::from_utf8(value).ok());
    Some(decoded.and_then(|value| {
        let (username, password) = value.split_once(':')?;
        Some((username.to_string(), password.to_string()))
    }))
}

/// Translates `Authorization: Basic` credentials checked against argon2 hashes.
pub struct BasicScheme {
    identities: Arc<BasicIdentities>,
}

impl BasicScheme {
    pub fn new(identities: Arc<BasicIdentities>) -> Self {
        Self { identities }
    }
}

#[async_trait]
impl HandleTranslate for BasicScheme {
    type Options = BasicSchemeOptions;

    async fn handle_translate(
        &mut self,
        state: &HandlerState<BasicSchemeOptions>,
    ) -> Result<TranslateResult, Error> {
        let context = state.context()?;
        let Some(authorization) = context.header(AUTHORIZATION) else {
            return Ok(TranslateResult::no_result());
        };
        let Some(credentials) = basic_credentials(authorization) else {
            return Ok(TranslateResult::no_result());
        };
        let Some((username, password)) = credentials else {
            return Ok(TranslateResult::fail_message("Invalid basic authentication header"));
        };

        let Some(user) = self.identities.validate_credentials(&username, &password) else {
            return Ok(TranslateResult::fail_message("Invalid username or password"));
        };

        let issuer = state.claims_issuer();
        let mut claims = vec![
            Claim::with_issuer(NAME_CLAIM_TYPE, &username, issuer),
            Claim::with_issuer(NAME_IDENTIFIER_CLAIM_TYPE, &user.id, issuer),
        ];
        claims.extend(
            user.roles
                .iter()
                .map(|role| Claim::with_issuer(ROLE_CLAIM_TYPE, role, issuer)),
        );

        let principal = ClaimsPrincipal::new(ClaimsIdentity::new(state.scheme_name(), claims));
        Ok(TranslateResult::success(TranslateTicket::new(
            principal,
            None,
            state.scheme_name(),
        )))
    }

    async fn handle_challenge(
        &mut self,
        state: &HandlerState<BasicSchemeOptions>,
        _properties: &TranslateProperties,
    ) -> Result<(), Error> {
        let context = state.context()?;
        context.set_status(StatusCode::UNAUTHORIZED);
        context.append_header(
            WWW_AUTHENTICATE,
            &format!(r#"Basic realm="{}", charset="UTF-8""#, state.options().realm),
        )
    }
}
