//! Authorization façade over a secret store
//!
//! Every operation normalizes its key, requires an authenticated subject
//! in the request scope, and asks the authorizer before delegating. List
//! results are additionally post-filtered: holding `list` on a prefix
//! grants visibility only into the keys the subject can also `read`.

use crate::error::{StoreError, StoreResult};
use crate::service::{SecretItem, SecretMeta, SecretService};
use async_trait::async_trait;
use glass_core::{normalize_key, normalize_prefix, RequestScope, Subject};
use glass_policy::{Action, Authorizer};
use std::sync::Arc;

/// Wraps a store and intercepts every operation with an authz check.
pub struct SecuredSecretStore {
    inner: Arc<dyn SecretService>,
    authorizer: Arc<dyn Authorizer>,
}

impl SecuredSecretStore {
    /// Wrap `inner` behind `authorizer`
    pub fn new(inner: Arc<dyn SecretService>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self { inner, authorizer }
    }

    fn subject<'a>(&self, scope: &'a RequestScope) -> StoreResult<&'a Subject> {
        scope
            .subject
            .as_ref()
            .ok_or_else(|| StoreError::forbidden("subject missing"))
    }

    fn authorize(&self, subject: &Subject, action: Action, key: &str) -> StoreResult<()> {
        let decision = self.authorizer.evaluate(subject, action, key);
        if !decision.allowed {
            tracing::debug!(
                subject = %subject,
                action = %action,
                key = %key,
                reason = %decision.reason,
                "authorization denied"
            );
            return Err(StoreError::Forbidden {
                reason: decision.reason,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SecretService for SecuredSecretStore {
    async fn get_secret(&self, scope: &RequestScope, key: &str) -> StoreResult<String> {
        let key = normalize_key(key);
        let subject = self.subject(scope)?;
        self.authorize(subject, Action::Read, &key)?;
        self.inner.get_secret(scope, &key).await
    }

    async fn get_secret_meta(&self, scope: &RequestScope, key: &str) -> StoreResult<SecretMeta> {
        let key = normalize_key(key);
        let subject = self.subject(scope)?;
        // Metadata is gated by the same read permission as the value
        self.authorize(subject, Action::Read, &key)?;
        self.inner.get_secret_meta(scope, &key).await
    }

    async fn put_secret(&self, scope: &RequestScope, key: &str, value: &str) -> StoreResult<i64> {
        let key = normalize_key(key);
        let subject = self.subject(scope)?;
        self.authorize(subject, Action::Write, &key)?;
        self.inner.put_secret(scope, &key, value).await
    }

    async fn list_secrets(
        &self,
        scope: &RequestScope,
        prefix: &str,
    ) -> StoreResult<Vec<SecretItem>> {
        let prefix = normalize_prefix(prefix);
        let subject = self.subject(scope)?;
        // List permission is evaluated against the prefix itself
        self.authorize(subject, Action::List, &prefix)?;

        let mut items = self.inner.list_secrets(scope, &prefix).await?;
        items.retain(|item| {
            self.authorizer
                .evaluate(subject, Action::Read, &item.key)
                .allowed
        });
        Ok(items)
    }
}
