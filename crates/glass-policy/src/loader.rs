//! Policy file loading and structural validation
//!
//! A parse or validation failure prevents adoption of a document; the
//! manager keeps serving the previously loaded one.

use crate::error::{PolicyError, PolicyResult};
use crate::model::Document;
use std::collections::HashSet;
use std::path::Path;

/// Read, parse, and validate a policy document.
pub fn load_from_file(path: impl AsRef<Path>) -> PolicyResult<Document> {
    let raw = std::fs::read_to_string(path)?;
    let doc: Document = serde_yaml::from_str(&raw)?;
    validate(&doc)?;
    Ok(doc)
}

/// Structural validation of a parsed document.
pub fn validate(doc: &Document) -> PolicyResult<()> {
    if doc.api_version.trim().is_empty() {
        return Err(PolicyError::Validation("api_version missing".to_string()));
    }
    if doc.kind.trim().is_empty() {
        return Err(PolicyError::Validation("kind missing".to_string()));
    }

    let mut subject_names = HashSet::new();
    for sub in &doc.subjects {
        if sub.name.is_empty() || sub.matcher.kind.is_empty() || sub.matcher.name.is_empty() {
            return Err(PolicyError::Validation("subject missing fields".to_string()));
        }
        if !subject_names.insert(sub.name.as_str()) {
            return Err(PolicyError::Validation(format!(
                "duplicate subject name {:?}",
                sub.name
            )));
        }
    }

    let mut role_names = HashSet::new();
    for role in &doc.roles {
        if role.name.is_empty() {
            return Err(PolicyError::Validation("role name missing".to_string()));
        }
        if !role_names.insert(role.name.as_str()) {
            return Err(PolicyError::Validation(format!(
                "duplicate role name {:?}",
                role.name
            )));
        }

        for perm in &role.permissions {
            if perm.action.is_empty() {
                return Err(PolicyError::Validation(format!(
                    "permission action missing in role {:?}",
                    role.name
                )));
            }
            if perm.key_prefix.is_empty() && perm.key_exact.is_empty() {
                return Err(PolicyError::Validation(format!(
                    "permission needs key_prefix or key_exact in role {:?}",
                    role.name
                )));
            }
            if !perm.key_prefix.is_empty() && !perm.key_prefix.ends_with('/') {
                return Err(PolicyError::Validation(format!(
                    "key_prefix {:?} in role {:?} must end with '/'",
                    perm.key_prefix, role.name
                )));
            }
        }
    }

    for binding in &doc.bindings {
        if !subject_names.contains(binding.subject.as_str()) {
            return Err(PolicyError::Validation(format!(
                "binding references unknown subject {:?}",
                binding.subject
            )));
        }
        for role_name in &binding.roles {
            if !role_names.contains(role_name.as_str()) {
                return Err(PolicyError::Validation(format!(
                    "binding references unknown role {:?}",
                    role_name
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Binding, Permission, PolicySubject, Role, SubjectMatch};
    use std::path::PathBuf;

    fn write_policy(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn base_doc() -> Document {
        Document {
            api_version: "glass.secretstore/v1alpha1".to_string(),
            kind: "Policy".to_string(),
            subjects: vec![PolicySubject {
                name: "team-a".to_string(),
                matcher: SubjectMatch {
                    kind: "bearer".to_string(),
                    name: "team-a-token".to_string(),
                },
            }],
            roles: vec![Role {
                name: "team-a-reader".to_string(),
                permissions: vec![Permission {
                    action: "read".to_string(),
                    key_prefix: "team-a/".to_string(),
                    ..Default::default()
                }],
            }],
            bindings: vec![Binding {
                subject: "team-a".to_string(),
                roles: vec!["team-a-reader".to_string()],
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_load_valid_policy() {
        let (_dir, path) = write_policy(
            r#"
api_version: glass.secretstore/v1alpha1
kind: Policy
metadata:
  name: default
subjects:
  - name: team-a
    match:
      kind: bearer
      name: team-a-token
roles:
  - name: team-a-reader
    permissions:
      - action: read
        key_prefix: "team-a/"
bindings:
  - subject: team-a
    roles: [team-a-reader]
"#,
        );

        let doc = load_from_file(&path).unwrap();
        assert_eq!(doc.api_version, "glass.secretstore/v1alpha1");
        assert_eq!(doc.subjects.len(), 1);
        assert_eq!(doc.subjects[0].matcher.kind, "bearer");
        assert_eq!(doc.roles[0].permissions[0].key_prefix, "team-a/");
    }

    #[test]
    fn test_load_accepts_camel_case_aliases() {
        let (_dir, path) = write_policy(
            r#"
apiVersion: glass.secretstore/v1alpha1
kind: Policy
subjects:
  - name: team-a
    match:
      kind: bearer
      name: team-a-token
roles:
  - name: reader
    permissions:
      - action: read
        keyPrefix: "team-a/"
      - action: read
        keyExact: shared/foo
bindings:
  - subject: team-a
    roles: [reader]
"#,
        );

        let doc = load_from_file(&path).unwrap();
        assert_eq!(doc.roles[0].permissions[0].key_prefix, "team-a/");
        assert_eq!(doc.roles[0].permissions[1].key_exact, "shared/foo");
    }

    #[test]
    fn test_validate_requires_api_version_and_kind() {
        let mut doc = base_doc();
        doc.api_version = " ".to_string();
        assert!(validate(&doc).is_err());

        let mut doc = base_doc();
        doc.kind = String::new();
        assert!(validate(&doc).is_err());
    }

    #[test]
    fn test_validate_unknown_role_in_binding() {
        let mut doc = base_doc();
        doc.bindings[0].roles = vec!["does-not-exist".to_string()];
        assert!(validate(&doc).is_err());
    }

    #[test]
    fn test_validate_unknown_subject_in_binding() {
        let mut doc = base_doc();
        doc.bindings[0].subject = "stranger".to_string();
        assert!(validate(&doc).is_err());
    }

    #[test]
    fn test_validate_key_prefix_must_end_with_slash() {
        let mut doc = base_doc();
        doc.roles[0].permissions[0].key_prefix = "team-a".to_string();
        assert!(validate(&doc).is_err());
    }

    #[test]
    fn test_validate_permission_needs_prefix_or_exact() {
        let mut doc = base_doc();
        doc.roles[0].permissions[0] = Permission {
            action: "read".to_string(),
            ..Default::default()
        };
        assert!(validate(&doc).is_err());
    }

    #[test]
    fn test_validate_duplicate_subject_name() {
        let mut doc = base_doc();
        doc.subjects.push(doc.subjects[0].clone());
        assert!(validate(&doc).is_err());
    }

    #[test]
    fn test_validate_duplicate_role_name() {
        let mut doc = base_doc();
        doc.roles.push(doc.roles[0].clone());
        assert!(validate(&doc).is_err());
    }

    #[test]
    fn test_validate_subject_missing_match_fields() {
        let mut doc = base_doc();
        doc.subjects[0].matcher.name = String::new();
        assert!(validate(&doc).is_err());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let (_dir, path) = write_policy(":: not yaml ::\n\t");
        assert!(load_from_file(&path).is_err());
    }
}
