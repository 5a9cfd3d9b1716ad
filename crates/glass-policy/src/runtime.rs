//! Request-path authorizer with a compiled-policy cache
//!
//! Compilation is cached against the document pointer it was produced
//! from: as long as the manager serves the same snapshot, evaluations take
//! the read-lock fast path. When the snapshot changes, one writer compiles
//! under the write lock (double-checked, so a racing second writer reuses
//! the fresh compile instead of repeating it).

use crate::compiled::CompiledPolicy;
use crate::manager::PolicyManager;
use crate::model::Document;
use crate::types::{Action, Authorizer, Decision};
use glass_core::Subject;
use parking_lot::RwLock;
use std::sync::Arc;

/// Supplies the current policy snapshot.
pub trait PolicySource: Send + Sync {
    fn current(&self) -> Option<Arc<Document>>;
}

impl PolicySource for PolicyManager {
    fn current(&self) -> Option<Arc<Document>> {
        PolicyManager::current(self)
    }
}

#[derive(Default)]
struct CompileCache {
    doc: Option<Arc<Document>>,
    compiled: Option<Arc<CompiledPolicy>>,
}

impl CompileCache {
    fn lookup(&self, doc: &Arc<Document>) -> Option<Arc<CompiledPolicy>> {
        match (&self.doc, &self.compiled) {
            (Some(cached), Some(compiled)) if Arc::ptr_eq(cached, doc) => {
                Some(Arc::clone(compiled))
            }
            _ => None,
        }
    }
}

/// Authorizer that recompiles only when the policy snapshot changes.
pub struct RuntimeAuthorizer {
    source: Arc<dyn PolicySource>,
    cache: RwLock<CompileCache>,
}

impl RuntimeAuthorizer {
    /// Create an authorizer over a policy source
    pub fn new(source: Arc<dyn PolicySource>) -> Self {
        Self {
            source,
            cache: RwLock::new(CompileCache::default()),
        }
    }

    fn compiled_for(&self, doc: &Arc<Document>) -> Result<Arc<CompiledPolicy>, Decision> {
        // Fast path: pointer-identical snapshot already compiled
        if let Some(compiled) = self.cache.read().lookup(doc) {
            return Ok(compiled);
        }

        let mut cache = self.cache.write();
        // Double-check: another writer may have compiled while we waited
        if let Some(compiled) = cache.lookup(doc) {
            return Ok(compiled);
        }

        match CompiledPolicy::compile(doc) {
            Ok(compiled) => {
                let compiled = Arc::new(compiled);
                cache.doc = Some(Arc::clone(doc));
                cache.compiled = Some(Arc::clone(&compiled));
                Ok(compiled)
            }
            Err(err) => {
                // Deny this request; the cached last-known-good compile
                // stays in place for the snapshot it belongs to.
                tracing::error!(error = %err, "policy compilation failed");
                Err(Decision::deny(format!("policy compile error: {}", err)))
            }
        }
    }
}

impl Authorizer for RuntimeAuthorizer {
    fn evaluate(&self, subject: &Subject, action: Action, key: &str) -> Decision {
        let Some(doc) = self.source.current() else {
            return Decision::deny("no policy available");
        };

        match self.compiled_for(&doc) {
            Ok(compiled) => compiled.evaluate(subject, action, key),
            Err(denied) => denied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Binding, Permission, PolicySubject, Role, SubjectMatch};
    use arc_swap::ArcSwapOption;

    struct StaticSource(ArcSwapOption<Document>);

    impl StaticSource {
        fn new(doc: Option<Document>) -> Arc<Self> {
            Arc::new(Self(ArcSwapOption::from(doc.map(Arc::new))))
        }

        fn set(&self, doc: Document) {
            self.0.store(Some(Arc::new(doc)));
        }
    }

    impl PolicySource for StaticSource {
        fn current(&self) -> Option<Arc<Document>> {
            self.0.load_full()
        }
    }

    fn doc_allowing(key_exact: &str) -> Document {
        Document {
            api_version: "glass.secretstore/v1alpha1".to_string(),
            kind: "Policy".to_string(),
            subjects: vec![PolicySubject {
                name: "eso".to_string(),
                matcher: SubjectMatch {
                    kind: "bearer".to_string(),
                    name: "webhook".to_string(),
                },
            }],
            roles: vec![Role {
                name: "demo-reader".to_string(),
                permissions: vec![Permission {
                    action: "read".to_string(),
                    key_exact: key_exact.to_string(),
                    ..Default::default()
                }],
            }],
            bindings: vec![Binding {
                subject: "eso".to_string(),
                roles: vec!["demo-reader".to_string()],
            }],
            ..Default::default()
        }
    }

    fn webhook() -> Subject {
        Subject::new("bearer", "webhook")
    }

    #[test]
    fn test_denies_without_policy() {
        let az = RuntimeAuthorizer::new(StaticSource::new(None));
        let dec = az.evaluate(&webhook(), Action::Read, "demo");
        assert!(!dec.allowed);
        assert_eq!(dec.reason, "no policy available");
    }

    #[test]
    fn test_evaluates_against_current_snapshot() {
        let source = StaticSource::new(Some(doc_allowing("demo")));
        let az = RuntimeAuthorizer::new(Arc::clone(&source) as Arc<dyn PolicySource>);

        assert!(az.evaluate(&webhook(), Action::Read, "demo").allowed);
        assert!(!az.evaluate(&webhook(), Action::Read, "other").allowed);

        // Swap the snapshot; the authorizer picks it up on the next call
        source.set(doc_allowing("other"));
        assert!(!az.evaluate(&webhook(), Action::Read, "demo").allowed);
        assert!(az.evaluate(&webhook(), Action::Read, "other").allowed);
    }

    #[test]
    fn test_compile_error_denies_per_request() {
        let mut bad = doc_allowing("demo");
        bad.subjects.push(bad.subjects[0].clone()); // duplicate match
        let source = StaticSource::new(Some(bad));
        let az = RuntimeAuthorizer::new(source as Arc<dyn PolicySource>);

        let dec = az.evaluate(&webhook(), Action::Read, "demo");
        assert!(!dec.allowed);
        assert!(dec.reason.starts_with("policy compile error:"));
    }

    #[test]
    fn test_compile_error_does_not_clobber_cached_compile() {
        let good = doc_allowing("demo");
        let source = StaticSource::new(Some(good.clone()));
        let az = RuntimeAuthorizer::new(Arc::clone(&source) as Arc<dyn PolicySource>);
        assert!(az.evaluate(&webhook(), Action::Read, "demo").allowed);

        let mut bad = good.clone();
        bad.subjects.push(bad.subjects[0].clone());
        source.set(bad);
        assert!(!az.evaluate(&webhook(), Action::Read, "demo").allowed);

        // Back to a healthy snapshot
        source.set(good);
        assert!(az.evaluate(&webhook(), Action::Read, "demo").allowed);
    }
}
