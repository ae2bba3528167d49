use serde::{Deserialize, Serialize};

pub const NAME_CLAIM_TYPE: &str = "name";
pub const ROLE_CLAIM_TYPE: &str = "role";
pub const NAME_IDENTIFIER_CLAIM_TYPE: &str = "nameidentifier";
pub const DEFAULT_ISSUER: &str = "LOCAL AUTHORITY";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_type: String,
    pub value: String,
    pub issuer: String,
}

impl Claim {
    pub fn new(claim_type: &str, value: &str) -> Self {
        Self::with_issuer(claim_type, value, DEFAULT_ISSUER)
    }

    pub fn with_issuer(claim_type: &str, value: &str, issuer: &str) -> Self {
        Self {
            claim_type: claim_type.to_string(),
            value: value.to_string(),
            issuer: issuer.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsIdentity {
    pub authentication_type: Option<String>,
    pub claims: Vec<Claim>,
    pub name_claim_type: String,
    pub role_claim_type: String,
}

impl Default for ClaimsIdentity {
    fn default() -> Self {
        Self {
            authentication_type: None,
            claims: Vec::new(),
            name_claim_type: NAME_CLAIM_TYPE.to_string(),
            role_claim_type: ROLE_CLAIM_TYPE.to_string(),
        }
    }
}

impl ClaimsIdentity {
    pub fn new(authentication_type: &str, claims: Vec<Claim>) -> Self {
        Self {
            authentication_type: Some(authentication_type.to_string()),
            claims,
            ..Self::default()
        }
    }

    /// An identity is authenticated when it carries a non-empty authentication type.
    pub fn is_authenticated(&self) -> bool {
        self.authentication_type
            .as_deref()
            .is_some_and(|value| !value.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.find_first(&self.name_claim_type)
            .map(|claim| claim.value.as_str())
    }

    pub fn find_first(&self, claim_type: &str) -> Option<&Claim> {
        self.claims
            .iter()
            .find(|claim| claim.claim_type == claim_type)
    }

    pub fn add_claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsPrincipal {
    pub identities: Vec<ClaimsIdentity>,
}

impl ClaimsPrincipal {
    pub fn new(identity: ClaimsIdentity) -> Self {
        Self {
            identities: vec![identity],
        }
    }

    /// The primary identity.
    pub fn identity(&self) -> Option<&ClaimsIdentity> {
        self.identities.first()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity().is_some_and(ClaimsIdentity::is_authenticated)
    }

    pub fn name(&self) -> Option<&str> {
        self.identity().and_then(ClaimsIdentity::name)
    }

    pub fn claims(&self) -> impl Iterator<Item = &Claim> {
        self.identities.iter().flat_map(|identity| identity.claims.iter())
    }

    pub fn find_first(&self, claim_type: &str) -> Option<&Claim> {
        self.identities
            .iter()
            .find_map(|identity| identity.find_first(claim_type))
    }

    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.claims()
            .any(|claim| claim.claim_type == claim_type && claim.value == value)
    }

    pub fn is_in_role(&self, role: &str) -> bool {
        self.identities.iter().any(|identity| {
            identity
                .claims
                .iter()
                .any(|claim| claim.claim_type == identity.role_claim_type && claim.value == role)
        })
    }
}
