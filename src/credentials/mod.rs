// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pushflow contributors

//! Registry credential binding
//!
//! Resolves the registry host, username and password from a secret store
//! before a run starts. Any unresolved reference fails the run up front.

use std::collections::HashMap;
use std::path::Path;

use crate::errors::PushflowError;
use crate::pipeline::RegistryConfig;

/// A value that never shows up in logs or debug output
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for handing to a tool's stdin
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "***")
    }
}

/// Resolved registry access
#[derive(Debug, Clone)]
pub struct Credentials {
    pub host: String,
    pub username: String,
    pub password: Secret,
}

/// Source of secret values
pub trait SecretStore: Send + Sync {
    /// Look up a secret by reference name
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Reads secrets from the process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn resolve(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Secrets held in memory
#[derive(Debug, Default, Clone)]
pub struct MapSecretStore {
    values: HashMap<String, String>,
}

impl MapSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    /// Load a dotenv-style file without touching the process environment
    pub fn from_dotenv_file(path: &Path) -> Result<Self, PushflowError> {
        let mut values = HashMap::new();
        for item in dotenvy::from_path_iter(path)? {
            let (key, value) = item?;
            values.insert(key, value);
        }
        Ok(Self { values })
    }
}

impl SecretStore for MapSecretStore {
    fn resolve(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Tries each store in order, first non-empty value wins
///
/// An empty entry in an earlier store does not hide a value in a later one.
#[derive(Default)]
pub struct ChainSecretStore {
    stores: Vec<Box<dyn SecretStore>>,
}

impl ChainSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, store: Box<dyn SecretStore>) -> Self {
        self.stores.push(store);
        self
    }
}

impl SecretStore for ChainSecretStore {
    fn resolve(&self, name: &str) -> Option<String> {
        self.stores
            .iter()
            .filter_map(|s| s.resolve(name))
            .find(|value| !value.trim().is_empty())
    }
}

/// Binds the configured secret references to values
pub struct CredentialBinder<'a> {
    config: &'a RegistryConfig,
}

impl<'a> CredentialBinder<'a> {
    pub fn new(config: &'a RegistryConfig) -> Self {
        Self { config }
    }

    /// Resolve all three references
    ///
    /// Every reference is checked so the error names all missing ones.
    /// Empty or whitespace-only values count as missing.
    pub fn bind(&self, store: &dyn SecretStore) -> Result<Credentials, PushflowError> {
        let mut missing = Vec::new();
        let mut resolve = |name: &str| -> String {
            match store.resolve(name) {
                Some(value) if !value.trim().is_empty() => value,
                _ => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        };

        let host = resolve(&self.config.host_secret);
        let username = resolve(&self.config.username_secret);
        let password = resolve(&self.config.password_secret);

        if !missing.is_empty() {
            tracing::warn!("Unresolved secrets: {}", missing.join(", "));
            return Err(PushflowError::MissingSecrets { names: missing });
        }

        tracing::debug!("Registry credentials bound for {}", host.trim());
        Ok(Credentials {
            host: host.trim().to_string(),
            username,
            password: Secret::new(password),
        })
    }
}
