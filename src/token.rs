use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::properties::TranslateProperties;

pub const TOKEN_NAMES_KEY: &str = ".TokenNames";
pub const TOKEN_KEY_PREFIX: &str = ".Token.";
const TOKEN_NAME_SEPARATOR: &str = ";";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateToken {
    pub name: String,
    pub value: String,
}

impl TranslateToken {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

fn token_key(name: &str) -> String {
    format!("{TOKEN_KEY_PREFIX}{name}")
}

impl TranslateProperties {
    fn token_names(&self) -> Vec<String> {
        self.get_string(TOKEN_NAMES_KEY)
            .map(|names| {
                names
                    .split(TOKEN_NAME_SEPARATOR)
                    .filter(|name| !name.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replaces every stored token with `tokens`, keeping their order.
    ///
    /// Names must be unique. They are validated before anything is touched, so a
    /// rejected call leaves the previously stored tokens intact.
    pub fn store_tokens(&mut self, tokens: &[TranslateToken]) -> Result<(), Error> {
        let mut seen = HashSet::with_capacity(tokens.len());
        if let Some(token) = tokens.iter().find(|token| {
            token.name.is_empty()
                || token.name.contains(TOKEN_NAME_SEPARATOR)
                || !seen.insert(token.name.as_str())
        }) {
            return Err(Error::InvalidTokenName(token.name.clone()));
        }

        for name in self.token_names() {
            self.set_string(&token_key(&name), None);
        }
        self.set_string(TOKEN_NAMES_KEY, None);

        if tokens.is_empty() {
            return Ok(());
        }

        let mut names = Vec::with_capacity(tokens.len());
        for token in tokens {
            self.set_string(&token_key(&token.name), Some(&token.value));
            names.push(token.name.as_str());
        }
        self.set_string(TOKEN_NAMES_KEY, Some(&names.join(TOKEN_NAME_SEPARATOR)));

        Ok(())
    }

    pub fn get_token_value(&self, name: &str) -> Option<&str> {
        self.get_string(&token_key(name))
    }

    /// Overwrites a previously stored token; returns `false` without mutating when it was never stored.
    pub fn update_token_value(&mut self, name: &str, value: &str) -> bool {
        let key = token_key(name);
        if !self.items().contains_key(&key) {
            return false;
        }

        self.set_string(&key, Some(value));
        true
    }

    pub fn get_tokens(&self) -> Vec<TranslateToken> {
        self.token_names()
            .into_iter()
            .filter_map(|name| {
                let value = self.get_token_value(&name)?.to_string();
                Some(TranslateToken { name, value })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_get_tokens_keeps_order() {
        let mut properties = TranslateProperties::new();
        let tokens = vec![TranslateToken::new("b", "2"), TranslateToken::new("a", "1")];

        properties.store_tokens(&tokens).unwrap();

        assert_eq!(properties.get_tokens(), tokens);
        assert_eq!(properties.get_string(TOKEN_NAMES_KEY), Some("b;a"));
        assert_eq!(properties.get_string(".Token.a"), Some("1"));
        assert_eq!(properties.get_token_value("b"), Some("2"));
    }

    #[test]
    fn test_store_tokens_clears_previous_tokens() {
        let mut properties = TranslateProperties::new();
        properties
            .store_tokens(&[TranslateToken::new("a", "1")])
            .unwrap();
        properties
            .store_tokens(&[TranslateToken::new("c", "3")])
            .unwrap();

        assert_eq!(properties.get_tokens(), vec![TranslateToken::new("c", "3")]);
        assert_eq!(properties.get_token_value("a"), None);
        assert!(!properties.items().contains_key(".Token.a"));
    }

    #[test]
    fn test_store_empty_tokens_removes_names_key() {
        let mut properties = TranslateProperties::new();
        properties
            .store_tokens(&[TranslateToken::new("a", "1")])
            .unwrap();
        properties.store_tokens(&[]).unwrap();

        assert!(properties.items().is_empty());
        assert!(properties.get_tokens().is_empty());
    }

    #[test]
    fn test_store_tokens_rejects_invalid_names() {
        let mut properties = TranslateProperties::new();
        properties
            .store_tokens(&[TranslateToken::new("a", "1")])
            .unwrap();

        let result = properties.store_tokens(&[
            TranslateToken::new("b", "2"),
            TranslateToken::new("x;y", "3"),
        ]);
        assert_eq!(result, Err(Error::InvalidTokenName("x;y".to_string())));

        let result = properties.store_tokens(&[TranslateToken::new("", "3")]);
        assert_eq!(result, Err(Error::InvalidTokenName(String::new())));

        let result = properties.store_tokens(&[
            TranslateToken::new("b", "1"),
            TranslateToken::new("b", "2"),
        ]);
        assert_eq!(result, Err(Error::InvalidTokenName("b".to_string())));

        assert_eq!(properties.get_tokens(), vec![TranslateToken::new("a", "1")]);
    }

    #[test]
    fn test_update_token_value() {
        let mut properties = TranslateProperties::new();
        assert!(!properties.update_token_value("access_token", "new"));
        assert!(properties.items().is_empty());

        properties
            .store_tokens(&[TranslateToken::new("access_token", "old")])
            .unwrap();
        assert!(properties.update_token_value("access_token", "new"));
        assert_eq!(properties.get_token_value("access_token"), Some("new"));
    }
}
