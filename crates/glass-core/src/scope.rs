//! Per-request scope
//!
//! Carries the authenticated subject from the HTTP middleware into the
//! service and storage layers. A scope is built once per request and
//! passed down explicitly; there is no process-global.

use crate::subject::Subject;

/// Request-scoped context attached to every service call.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    /// The authenticated subject, if authentication produced one
    pub subject: Option<Subject>,
}

impl RequestScope {
    /// Scope without an authenticated subject
    pub fn anonymous() -> Self {
        Self { subject: None }
    }

    /// Scope for an authenticated subject
    pub fn with_subject(subject: Subject) -> Self {
        Self {
            subject: Some(subject),
        }
    }

    /// Audit stamp for this scope: `kind:name`, or `unknown` when no
    /// subject is present.
    pub fn created_by(&self) -> String {
        match &self.subject {
            Some(sub) => sub.created_by(),
            None => "unknown".to_string(),
        }
    }
}
