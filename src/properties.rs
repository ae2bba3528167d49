use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub const REDIRECT_URI_KEY: &str = ".redirect";
pub const IS_PERSISTENT_KEY: &str = ".persistent";
pub const ISSUED_UTC_KEY: &str = ".issued";
pub const EXPIRES_UTC_KEY: &str = ".expires";
pub const REFRESH_KEY: &str = ".refresh";

const UTC_DATE_TIME_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// State carried alongside a ticket, a challenge or a forbid call.
///
/// `items` are persisted with the ticket. `parameters` live only in memory
/// and are skipped by serialization.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TranslateProperties {
    items: BTreeMap<String, Option<String>>,
    #[serde(skip)]
    parameters: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl TranslateProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: BTreeMap<String, Option<String>>) -> Self {
        Self {
            items,
            parameters: HashMap::new(),
        }
    }

    pub fn items(&self) -> &BTreeMap<String, Option<String>> {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut BTreeMap<String, Option<String>> {
        &mut self.items
    }

    pub fn parameter_keys(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.items.get(key).and_then(|value| value.as_deref())
    }

    /// Sets an item; `None` removes it.
    pub fn set_string(&mut self, key: &str, value: Option<&str>) {
        match value {
            Some(value) => {
                self.items.insert(key.to_string(), Some(value.to_string()));
            }
            None => {
                self.items.remove(key);
            }
        }
    }

    pub fn get_parameter<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.parameters.get(key)?.downcast_ref::<T>()
    }

    pub fn set_parameter<T: Any + Send + Sync>(&mut self, key: &str, value: Option<T>) {
        match value {
            Some(value) => {
                self.parameters.insert(key.to_string(), Arc::new(value));
            }
            None => {
                self.parameters.remove(key);
            }
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        let value = self.get_string(key)?;
        if value.eq_ignore_ascii_case("true") {
            Some(true)
        } else if value.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }

    pub fn set_bool(&mut self, key: &str, value: Option<bool>) {
        let value = value.map(|value| if value { "True" } else { "False" });
        self.set_string(key, value);
    }

    pub fn get_date_time(&self, key: &str) -> Option<DateTime<Utc>> {
        let value = self.get_string(key)?;
        NaiveDateTime::parse_from_str(value, UTC_DATE_TIME_FORMAT)
            .ok()
            .map(|value| value.and_utc())
    }

    pub fn set_date_time(&mut self, key: &str, value: Option<DateTime<Utc>>) {
        let value = value.map(|value| value.format(UTC_DATE_TIME_FORMAT).to_string());
        self.set_string(key, value.as_deref());
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        self.get_string(REDIRECT_URI_KEY)
    }

    pub fn set_redirect_uri(&mut self, value: Option<&str>) {
        self.set_string(REDIRECT_URI_KEY, value);
    }

    pub fn is_persistent(&self) -> bool {
        self.get_string(IS_PERSISTENT_KEY).is_some()
    }

    pub fn set_is_persistent(&mut self, value: bool) {
        self.set_string(IS_PERSISTENT_KEY, value.then_some(""));
    }

    pub fn issued_utc(&self) -> Option<DateTime<Utc>> {
        self.get_date_time(ISSUED_UTC_KEY)
    }

    pub fn set_issued_utc(&mut self, value: Option<DateTime<Utc>>) {
        self.set_date_time(ISSUED_UTC_KEY, value);
    }

    pub fn expires_utc(&self) -> Option<DateTime<Utc>> {
        self.get_date_time(EXPIRES_UTC_KEY)
    }

    pub fn set_expires_utc(&mut self, value: Option<DateTime<Utc>>) {
        self.set_date_time(EXPIRES_UTC_KEY, value);
    }

    pub fn allow_refresh(&self) -> Option<bool> {
        self.get_bool(REFRESH_KEY)
    }

    pub fn set_allow_refresh(&mut self, value: Option<bool>) {
        self.set_bool(REFRESH_KEY, value);
    }
}

impl PartialEq for TranslateProperties {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
            && self.parameters.len() == other.parameters.len()
            && self.parameters.iter().all(|(key, value)| {
                other
                    .parameters
                    .get(key)
                    .is_some_and(|other| Arc::ptr_eq(value, other))
            })
    }
}

impl fmt::Debug for TranslateProperties {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut parameters: Vec<&str> = self.parameter_keys().collect();
        parameters.sort_unstable();

        f.debug_struct("TranslateProperties")
            .field("items", &self.items)
            .field("parameters", &parameters)
            .finish()
    }
}
