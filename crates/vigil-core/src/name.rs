//! Unique names for managed objects.
//!
//! An [`ObjectName`] is a domain plus an unordered set of `key=value`
//! properties, written `domain:key1=value1,key2=value2`. Properties are kept
//! sorted by key so two textual forms that differ only in key order denote the
//! same name, and the [`Display`](std::fmt::Display) form is canonical.
//!
//! # Patterns
//!
//! A name is a pattern when its domain contains `*` or `?`, when a property
//! value contains `*` or `?`, or when its property list ends with `*`
//! (`domain:type=Mem,*` matches any name that has `type=Mem` plus any other
//! properties). `*:*` matches every name. Patterns are only valid as query
//! arguments and can never be registered.

use crate::{ManagementError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const WILDCARD_CHARS: [char; 2] = ['*', '?'];
const RESERVED_CHARS: [char; 4] = [':', ',', '=', '"'];

/// Unique, hierarchical name of a managed object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectName {
    domain: String,
    properties: BTreeMap<String, String>,
    property_list_pattern: bool,
}

impl ObjectName {
    /// Build a name from a domain and its key properties.
    pub fn new<K, V>(
        domain: impl Into<String>,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut name = Self {
            domain: domain.into(),
            properties: BTreeMap::new(),
            property_list_pattern: false,
        };
        validate_domain(&name.domain)?;
        for (key, value) in properties {
            name.insert_property(key.into(), value.into())?;
        }
        if name.properties.is_empty() {
            return Err(ManagementError::invalid_argument(
                "name",
                "a name needs at least one key property",
            ));
        }
        Ok(name)
    }

    /// The pattern that matches every name (`*:*`).
    pub fn wildcard() -> Self {
        Self {
            domain: "*".to_string(),
            properties: BTreeMap::new(),
            property_list_pattern: true,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Key properties in canonical (lexicographic) order.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Value of a single key property.
    pub fn key_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Whether the property list is open (`,*`).
    pub fn is_property_list_pattern(&self) -> bool {
        self.property_list_pattern
    }

    pub fn is_domain_pattern(&self) -> bool {
        self.domain.contains(WILDCARD_CHARS)
    }

    pub fn is_property_value_pattern(&self) -> bool {
        self.properties.values().any(|v| v.contains(WILDCARD_CHARS))
    }

    /// Whether this name contains any wildcard and therefore denotes a set of names.
    pub fn is_pattern(&self) -> bool {
        self.property_list_pattern || self.is_domain_pattern() || self.is_property_value_pattern()
    }

    /// Check whether `candidate` is selected by this name used as a pattern.
    ///
    /// A non-pattern name matches only itself. Pattern candidates never match.
    pub fn matches(&self, candidate: &ObjectName) -> bool {
        NameMatcher::new(self).matches(candidate)
    }

    fn insert_property(&mut self, key: String, value: String) -> Result<()> {
        if key.is_empty() {
            return Err(ManagementError::invalid_argument("name", "empty property key"));
        }
        if key.contains(WILDCARD_CHARS) || key.contains(RESERVED_CHARS) {
            return Err(ManagementError::invalid_argument(
                "name",
                format!("invalid character in property key '{}'", key),
            ));
        }
        if value.is_empty() {
            return Err(ManagementError::invalid_argument(
                "name",
                format!("empty value for property '{}'", key),
            ));
        }
        if value.contains(RESERVED_CHARS) {
            return Err(ManagementError::invalid_argument(
                "name",
                format!("invalid character in value of property '{}'", key),
            ));
        }
        if self.properties.contains_key(&key) {
            return Err(ManagementError::invalid_argument(
                "name",
                format!("duplicate property key '{}'", key),
            ));
        }
        self.properties.insert(key, value);
        Ok(())
    }
}

fn validate_domain(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(ManagementError::invalid_argument("name", "empty domain"));
    }
    if domain.contains(RESERVED_CHARS) {
        return Err(ManagementError::invalid_argument(
            "name",
            format!("invalid character in domain '{}'", domain),
        ));
    }
    Ok(())
}

impl FromStr for ObjectName {
    type Err = ManagementError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(ManagementError::invalid_argument("name", "empty name"));
        }
        let (domain, rest) = s.split_once(':').ok_or_else(|| {
            ManagementError::invalid_argument("name", format!("missing ':' in '{}'", s))
        })?;
        validate_domain(domain)?;
        if rest.is_empty() {
            return Err(ManagementError::invalid_argument(
                "name",
                format!("missing key properties in '{}'", s),
            ));
        }

        let mut name = Self {
            domain: domain.to_string(),
            properties: BTreeMap::new(),
            property_list_pattern: false,
        };

        for part in rest.split(',') {
            if part == "*" {
                name.property_list_pattern = true;
                continue;
            }
            let (key, value) = part.split_once('=').ok_or_else(|| {
                ManagementError::invalid_argument(
                    "name",
                    format!("property '{}' is not of the form key=value", part),
                )
            })?;
            name.insert_property(key.to_string(), value.to_string())?;
        }

        Ok(name)
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.domain)?;
        let mut first = true;
        for (key, value) in &self.properties {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}={}", key, value)?;
            first = false;
        }
        if self.property_list_pattern {
            if !first {
                f.write_str(",")?;
            }
            f.write_str("*")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for ObjectName {
    type Error = ManagementError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ObjectName> for String {
    fn from(name: ObjectName) -> Self {
        name.to_string()
    }
}

/// A pattern compiled once and applied to many candidate names.
pub(crate) struct NameMatcher<'a> {
    pattern: &'a ObjectName,
    domain: Option<Regex>,
    values: BTreeMap<&'a str, Regex>,
}

impl<'a> NameMatcher<'a> {
    pub(crate) fn new(pattern: &'a ObjectName) -> Self {
        let domain = if pattern.is_domain_pattern() {
            glob_regex(&pattern.domain)
        } else {
            None
        };
        let values = pattern
            .properties
            .iter()
            .filter(|(_, v)| v.contains(WILDCARD_CHARS))
            .filter_map(|(k, v)| glob_regex(v).map(|re| (k.as_str(), re)))
            .collect();
        Self {
            pattern,
            domain,
            values,
        }
    }

    pub(crate) fn matches(&self, candidate: &ObjectName) -> bool {
        if candidate.is_pattern() {
            return false;
        }

        let domain_ok = match &self.domain {
            Some(re) => re.is_match(&candidate.domain),
            None => self.pattern.domain == candidate.domain,
        };
        if !domain_ok {
            return false;
        }

        if !self.pattern.property_list_pattern
            && self.pattern.properties.len() != candidate.properties.len()
        {
            return false;
        }

        self.pattern.properties.iter().all(|(key, value)| {
            match candidate.properties.get(key) {
                Some(actual) => match self.values.get(key.as_str()) {
                    Some(re) => re.is_match(actual),
                    None => value == actual,
                },
                None => false,
            }
        })
    }
}

/// Translate a `*`/`?` glob into an anchored regex.
fn glob_regex(glob: &str) -> Option<Regex> {
    let mut source = String::with_capacity(glob.len() + 8);
    let mut buf = [0u8; 4];
    source.push('^');
    for ch in glob.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    source.push('$');
    Regex::new(&source).ok()
}
