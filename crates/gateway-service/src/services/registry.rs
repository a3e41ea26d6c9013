//! Static backend registry.
//!
//! Maps the `{service}` path segment to a backend base URL. Parsed once from
//! `BACKENDS` (`name=url,name=url`) and read-only afterwards.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Backend entry '{0}' must have the form name=url")]
    MalformedEntry(String),

    #[error("Backend '{0}' has an empty name")]
    EmptyName(String),

    #[error("Backend '{name}' URL must start with http:// or https://, got '{url}'")]
    InvalidUrl { name: String, url: String },

    #[error("Backend '{0}' is declared more than once")]
    Duplicate(String),

    #[error("At least one backend must be configured")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendRegistry {
    backends: BTreeMap<String, String>,
}

impl BackendRegistry {
    /// Parse a `name=url` list separated by commas.
    ///
    /// Whitespace around entries is ignored and trailing slashes are stripped
    /// from URLs so the forwarded path can be appended verbatim.
    pub fn parse(list: &str) -> Result<Self, RegistryError> {
        let mut backends = BTreeMap::new();

        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, url) = entry
                .split_once('=')
                .ok_or_else(|| RegistryError::MalformedEntry(entry.to_string()))?;
            let name = name.trim();
            let url = url.trim().trim_end_matches('/');

            if name.is_empty() {
                return Err(RegistryError::EmptyName(entry.to_string()));
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(RegistryError::InvalidUrl {
                    name: name.to_string(),
                    url: url.to_string(),
                });
            }
            if backends.insert(name.to_string(), url.to_string()).is_some() {
                return Err(RegistryError::Duplicate(name.to_string()));
            }
        }

        if backends.is_empty() {
            return Err(RegistryError::Empty);
        }

        Ok(Self { backends })
    }

    pub fn from_pairs<I, N, U>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, U)>,
        N: Into<String>,
        U: Into<String>,
    {
        let backends = pairs
            .into_iter()
            .map(|(name, url)| {
                let url: String = url.into();
                (name.into(), url.trim_end_matches('/').to_string())
            })
            .collect();
        Self { backends }
    }

    /// Base URL registered for `name`.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.backends.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.backends.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
