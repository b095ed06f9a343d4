//! API key storage.
//!
//! The assistant never reads credentials directly; it asks a
//! [`SecretStore`]. Keys are trimmed on the way in and blank keys are
//! refused.

use std::sync::{PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};

use crate::error::SecretError;

/// Get/set access to the backend API key.
pub trait SecretStore: Send + Sync {
    /// The current key, if one is known.
    fn get(&self) -> Option<SecretString>;

    /// Replace the stored key.
    fn set(&self, secret: SecretString) -> Result<(), SecretError>;
}

fn normalize(secret: &SecretString) -> Result<SecretString, SecretError> {
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return Err(SecretError::Empty);
    }
    Ok(SecretString::from(trimmed))
}

/// Process-local store, empty until `set` is called.
#[derive(Default)]
pub struct MemorySecretStore {
    secret: RwLock<Option<SecretString>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(secret: SecretString) -> Result<Self, SecretError> {
        let store = Self::new();
        store.set(secret)?;
        Ok(store)
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self) -> Option<SecretString> {
        self.secret
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, secret: SecretString) -> Result<(), SecretError> {
        let secret = normalize(&secret)?;
        *self.secret.write().unwrap_or_else(PoisonError::into_inner) = Some(secret);
        Ok(())
    }
}

/// Reads the key from an environment variable.
///
/// `set` keeps the new key in memory for the rest of the process and
/// takes precedence over the variable; the environment is never written.
pub struct EnvSecretStore {
    var: String,
    lookup: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
    overridden: MemorySecretStore,
}

impl EnvSecretStore {
    pub fn new(var: impl Into<String>) -> Self {
        Self::with_lookup(var, |key| std::env::var(key).ok())
    }

    pub fn with_lookup(
        var: impl Into<String>,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            var: var.into(),
            lookup: Box::new(lookup),
            overridden: MemorySecretStore::new(),
        }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

impl SecretStore for EnvSecretStore {
    fn get(&self) -> Option<SecretString> {
        if let Some(secret) = self.overridden.get() {
            return Some(secret);
        }
        let value = (self.lookup)(&self.var)?;
        normalize(&SecretString::from(value)).ok()
    }

    fn set(&self, secret: SecretString) -> Result<(), SecretError> {
        self.overridden.set(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_trims_and_rejects_blank() {
        let store = MemorySecretStore::new();
        assert!(store.get().is_none());

        store.set("  sk-abc \n".into()).unwrap();
        assert_eq!(store.get().unwrap().expose_secret(), "sk-abc");

        assert_eq!(store.set("   ".into()), Err(SecretError::Empty));
        assert_eq!(store.get().unwrap().expose_secret(), "sk-abc");
    }

    #[test]
    fn env_store_reads_variable() {
        let store = EnvSecretStore::with_lookup("OPENAI_API_KEY", |key| {
            (key == "OPENAI_API_KEY").then(|| " sk-env ".to_string())
        });
        assert_eq!(store.get().unwrap().expose_secret(), "sk-env");
    }

    #[test]
    fn env_store_blank_variable_reads_as_missing() {
        let store = EnvSecretStore::with_lookup("OPENAI_API_KEY", |_| Some("  ".to_string()));
        assert!(store.get().is_none());
    }

    #[test]
    fn env_store_override_wins() {
        let store = EnvSecretStore::with_lookup("ANTHROPIC_API_KEY", |_| Some("sk-env".into()));
        store.set("sk-typed".into()).unwrap();
        assert_eq!(store.get().unwrap().expose_secret(), "sk-typed");
        assert_eq!(store.var(), "ANTHROPIC_API_KEY");
    }
}
