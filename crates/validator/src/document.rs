//! Service config document applicability
//!
//! A lenient view of a service config: only the method config names are read,
//! everything else is ignored. Used to decide whether a config covers a service.
//! Keys are matched regardless of case, and a `null` document is empty.

use crate::keys;
use serde::{Deserialize, Deserializer};

const FIELDS: &[&str] = &["methodConfig", "name", "service", "method"];

/// Method config names of a service config document
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServiceConfigDocument {
    #[serde(rename = "methodConfig", default, deserialize_with = "null_as_default")]
    pub method_config: Vec<MethodConfigEntry>,
}

/// One method config, scoped to a list of names
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MethodConfigEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: Vec<MethodName>,
}

/// A (service, method) pair; empty strings act as wildcards
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MethodName {
    #[serde(default, deserialize_with = "null_as_default")]
    pub service: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub method: String,
}

impl ServiceConfigDocument {
    /// Parse a service config document from raw JSON bytes
    ///
    /// Fails when the bytes are not JSON or the method configs have the wrong shape.
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        match keys::parse_object(bytes, FIELDS)? {
            Some(value) => serde_json::from_value(value),
            None => Ok(Self::default()),
        }
    }

    /// Whether any method config applies to every method of `service_name`
    ///
    /// Matches the global wildcard (`{}`) and service wildcards
    /// (`{"service": "pkg.Svc"}`). Names that pin a method never count.
    pub fn applies(&self, service_name: &str) -> bool {
        self.method_config
            .iter()
            .flat_map(|entry| entry.name.iter())
            .any(|name| {
                name.method.is_empty() && (name.service.is_empty() || name.service == service_name)
            })
    }
}

/// Read JSON `null` the same as an absent field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
