//! Compiled policy: lookup tables plus the pure evaluator
//!
//! Compilation is one-shot per document snapshot. Evaluation allocates
//! only for the returned reason string.

use crate::error::{PolicyError, PolicyResult};
use crate::model::Document;
use crate::types::{Action, Decision};
use glass_core::{normalize_key, Subject};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct CompiledPermission {
    action: String,
    key_prefix: String,
    key_exact: String,
}

/// A policy document compiled into three lookup tables.
#[derive(Debug, Default)]
pub struct CompiledPolicy {
    /// `kind:name` match key -> subject alias
    subject_alias_by_match: HashMap<String, String>,

    /// subject alias -> role names, in binding-declaration order
    roles_by_subject: HashMap<String, Vec<String>>,

    /// role name -> permissions, in declaration order
    perms_by_role: HashMap<String, Vec<CompiledPermission>>,
}

impl CompiledPolicy {
    /// Compile a validated document.
    ///
    /// Rejects subjects whose match is blank on both sides and documents
    /// where two subjects match the same identity. A caller matching two
    /// subjects would be ambiguous.
    pub fn compile(doc: &Document) -> PolicyResult<Self> {
        let mut cp = CompiledPolicy::default();

        for sub in &doc.subjects {
            let mk = match_key(&sub.matcher.kind, &sub.matcher.name);
            if mk == ":" {
                return Err(PolicyError::Compile(format!(
                    "subject match kind/name missing for subject {:?}",
                    sub.name
                )));
            }
            if cp.subject_alias_by_match.contains_key(&mk) {
                return Err(PolicyError::Compile(format!(
                    "duplicate subject match {:?}",
                    mk
                )));
            }
            cp.subject_alias_by_match.insert(mk, sub.name.clone());
        }

        for role in &doc.roles {
            let perms = role
                .permissions
                .iter()
                .map(|p| CompiledPermission {
                    action: p.action.trim().to_lowercase(),
                    key_prefix: p.key_prefix.clone(),
                    key_exact: p.key_exact.clone(),
                })
                .collect();
            cp.perms_by_role.insert(role.name.clone(), perms);
        }

        for binding in &doc.bindings {
            cp.roles_by_subject
                .entry(binding.subject.clone())
                .or_default()
                .extend(binding.roles.iter().cloned());
        }

        Ok(cp)
    }

    /// Decide whether `subject` may perform `action` on `key`.
    ///
    /// Roles are walked in binding order, permissions in declaration
    /// order; the first matching permission allows. Everything else is a
    /// deny.
    pub fn evaluate(&self, subject: &Subject, action: Action, key: &str) -> Decision {
        let key = normalize_key(key);
        if key.is_empty() {
            return Decision::deny("empty key");
        }

        let Some(alias) = self
            .subject_alias_by_match
            .get(&match_key(&subject.kind, &subject.name))
        else {
            return Decision::deny("unknown subject");
        };

        let Some(role_names) = self.roles_by_subject.get(alias) else {
            return Decision::deny("no matching permission");
        };

        for role_name in role_names {
            let Some(perms) = self.perms_by_role.get(role_name) else {
                continue;
            };
            for perm in perms {
                if perm.action != action.as_str() {
                    continue;
                }
                if !perm.key_exact.is_empty() && key == perm.key_exact {
                    return Decision::allow(format!("role={} exact={}", role_name, perm.key_exact));
                }
                if !perm.key_prefix.is_empty() && key.starts_with(&perm.key_prefix) {
                    return Decision::allow(format!(
                        "role={} prefix={}",
                        role_name, perm.key_prefix
                    ));
                }
            }
        }

        Decision::deny("no matching permission")
    }
}

fn match_key(kind: &str, name: &str) -> String {
    format!("{}:{}", kind.trim(), name.trim())
}
