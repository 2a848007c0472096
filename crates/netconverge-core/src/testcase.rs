//! Test case model: one desired-state declaration plus its expected
//! observable state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CaseError;
use crate::exit_code::AcceptableCodes;
use crate::scope::Scope;

/// Property value instructing the agent to reset to the factory value.
///
/// Emitted verbatim into the manifest; the expected literal it resolves to
/// is supplied per resource in `resource_props`, never derived here.
pub const DEFAULT_SENTINEL: &str = "default";

/// Desired lifecycle of the resource instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Present,
    Absent,
}

impl Lifecycle {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

/// One convergence test case.
///
/// Constructed by the caller before orchestration, consumed read-only by the
/// manifest synthesizer and the verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    /// Case identifier.
    pub name: String,
    /// Human description used in step labels.
    pub description: String,
    pub lifecycle: Lifecycle,
    /// Property assignments written into the manifest. Values may be the
    /// literal [`DEFAULT_SENTINEL`].
    #[serde(default)]
    pub manifest_props: BTreeMap<String, String>,
    /// Literals expected observable in resource-query output after
    /// convergence. Must be empty when `lifecycle` is absent.
    #[serde(default)]
    pub resource_props: BTreeMap<String, String>,
    /// Raw patterns expected in device-query output (evaluated inside the
    /// scope's block when a scope is set).
    #[serde(default)]
    pub device_patterns: Vec<String>,
    /// Optional sub-context the instance lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    /// The paired present case's expectations, asserted *absent* after an
    /// absent-lifecycle apply. Keeps absent verification from passing
    /// vacuously.
    #[serde(default)]
    pub absence_props: BTreeMap<String, String>,
    /// Acceptable raw apply exit codes; defaults to `{2}` (changed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_codes: Option<Vec<i32>>,
    /// Acceptable raw query exit codes; defaults to `{0}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_codes: Option<Vec<i32>>,
}

impl TestCase {
    /// Check model invariants. Called once when a suite is compiled.
    pub fn validate(&self) -> Result<(), CaseError> {
        if self.name.trim().is_empty() {
            return Err(CaseError::EmptyName);
        }
        if self.lifecycle == Lifecycle::Absent && !self.resource_props.is_empty() {
            return Err(CaseError::AbsentWithResourceProps {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Acceptable apply exit codes for this case.
    #[must_use]
    pub fn apply_codes(&self) -> AcceptableCodes {
        match &self.apply_codes {
            Some(codes) => AcceptableCodes::new(codes.clone()),
            None => AcceptableCodes::new(vec![2]),
        }
    }

    /// Acceptable query exit codes for this case.
    #[must_use]
    pub fn query_codes(&self) -> AcceptableCodes {
        match &self.query_codes {
            Some(codes) => AcceptableCodes::new(codes.clone()),
            None => AcceptableCodes::default(),
        }
    }

    /// Step label prefix, e.g. `default_properties [ensure => present] (vrf blue)`.
    #[must_use]
    pub fn step_label(&self) -> String {
        let mut label = format!("{} [ensure => {}]", self.description, self.lifecycle.as_str());
        if let Some(scope) = &self.scope {
            label.push_str(&format!(" ({scope})"));
        }
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn present_case() -> TestCase {
        TestCase {
            name: "default_properties".into(),
            description: "1.1 Default Properties".into(),
            lifecycle: Lifecycle::Present,
            manifest_props: BTreeMap::from([("timeout".into(), DEFAULT_SENTINEL.into())]),
            resource_props: BTreeMap::from([("timeout".into(), "5".into())]),
            device_patterns: Vec::new(),
            scope: None,
            absence_props: BTreeMap::new(),
            apply_codes: None,
            query_codes: None,
        }
    }

    #[test]
    fn present_case_validates() {
        assert!(present_case().validate().is_ok());
    }

    #[test]
    fn absent_case_must_not_expect_resource_props() {
        let mut case = present_case();
        case.lifecycle = Lifecycle::Absent;
        let err = case.validate().unwrap_err();
        assert!(err.to_string().contains("absent"));

        case.resource_props.clear();
        assert!(case.validate().is_ok());
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut case = present_case();
        case.name = "  ".into();
        assert!(case.validate().is_err());
    }

    #[test]
    fn apply_codes_default_to_changed() {
        let case = present_case();
        assert!(case.apply_codes().accepts(2));
        assert!(!case.apply_codes().accepts(0));
    }

    #[test]
    fn apply_codes_override_is_honored() {
        // Preclean runs accept both no-change and changed.
        let mut case = present_case();
        case.apply_codes = Some(vec![0, 2]);
        assert!(case.apply_codes().accepts(0));
        assert!(case.apply_codes().accepts(2));
    }

    #[test]
    fn step_label_names_lifecycle_and_scope() {
        let mut case = present_case();
        case.scope = Some(Scope::new("blue"));
        assert_eq!(
            case.step_label(),
            "1.1 Default Properties [ensure => present] (blue)"
        );
    }

    #[test]
    fn case_roundtrips_through_json() {
        let case = present_case();
        let json = serde_json::to_string(&case).unwrap();
        let restored: TestCase = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.name, case.name);
        assert_eq!(restored.resource_props, case.resource_props);
        assert_eq!(restored.lifecycle, Lifecycle::Present);
    }
}
