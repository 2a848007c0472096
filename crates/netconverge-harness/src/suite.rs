//! Suite loading and compilation.
//!
//! A suite is pure data: the resource binding, the command strings, the
//! scope-naming rule, and the per-case property maps with their expected
//! literals (including every `default`-sentinel resolution). The harness
//! engine contains no per-resource knowledge; everything resource-specific
//! arrives through this file format.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use netconverge_core::{
    Assertion, CaseError, Lifecycle, PatternError, Polarity, ResourceBinding, Scope, TestCase,
};

/// Placeholder in `resource_command` replaced by the scope-qualified title.
pub const TITLE_PLACEHOLDER: &str = "{title}";

#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid suite json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Case(#[from] CaseError),
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("suite '{suite}' has no cases")]
    Empty { suite: String },
    #[error("case '{case}' requires scopes but the suite declares none")]
    ScopedWithoutScopes { case: String },
    #[error("suite worker thread panicked")]
    Worker,
}

/// Optional pre-test cleanup: a shell command plus patterns that must be
/// absent from device output before the first case runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupSpec {
    pub command: String,
    /// Acceptable exit codes for the cleanup command; defaults to `{0}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptable_codes: Option<Vec<i32>>,
    #[serde(default)]
    pub absent_patterns: Vec<String>,
}

/// Per-scope adjustments to a case's expected literals. Some properties only
/// exist in the default scope, and scoped defaults may resolve differently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeOverride {
    /// Keys dropped from `resource_props` under this scope.
    #[serde(default)]
    pub drop: Vec<String>,
    /// Keys replaced in `resource_props` under this scope.
    #[serde(default)]
    pub set: BTreeMap<String, String>,
}

fn default_present() -> Lifecycle {
    Lifecycle::Present
}

/// One case as written in the suite file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSpec {
    pub name: String,
    pub desc: String,
    #[serde(default = "default_present")]
    pub ensure: Lifecycle,
    #[serde(default)]
    pub manifest_props: BTreeMap<String, String>,
    #[serde(default)]
    pub resource_props: BTreeMap<String, String>,
    #[serde(default)]
    pub device_patterns: Vec<String>,
    /// Run once per declared scope in addition to the default scope.
    #[serde(default)]
    pub scoped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_codes: Option<Vec<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_codes: Option<Vec<i32>>,
    #[serde(default)]
    pub scope_overrides: BTreeMap<String, ScopeOverride>,
}

/// A complete suite definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSpec {
    /// Schema version.
    pub version: String,
    /// Suite name, e.g. `cisco_bgp`.
    pub suite: String,
    /// Controller host (manifest writes land here).
    pub controller: String,
    /// Managed device host (apply and query commands run here).
    pub device: String,
    pub resource: ResourceBinding,
    /// Manifest path on the controller host.
    pub manifest_path: String,
    /// Agent convergence command, e.g. `puppet agent -t`.
    pub apply_command: String,
    /// Resource query with a `{title}` placeholder.
    pub resource_command: String,
    /// Device state query, e.g. `show running-config section bgp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_command: Option<String>,
    /// Scope anchor format with a `{scope}` placeholder, e.g. `vrf {scope}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_anchor: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<SetupSpec>,
    /// Emit the final all-scope absence teardown. Defaults to on.
    #[serde(default = "default_true")]
    pub teardown: bool,
    pub cases: Vec<CaseSpec>,
}

fn default_true() -> bool {
    true
}

impl SuiteSpec {
    /// Load a suite from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, SuiteError> {
        let spec: Self = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Load a suite from a file path.
    pub fn from_file(path: &Path) -> Result<Self, SuiteError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Check suite invariants and compile every pattern once so bad regexes
    /// fail at load time, not mid-run.
    pub fn validate(&self) -> Result<(), SuiteError> {
        if self.cases.is_empty() {
            return Err(SuiteError::Empty {
                suite: self.suite.clone(),
            });
        }
        for case in &self.cases {
            if case.scoped && self.scopes.is_empty() {
                return Err(SuiteError::ScopedWithoutScopes {
                    case: case.name.clone(),
                });
            }
            for pattern in &case.device_patterns {
                Assertion::pattern(pattern, Polarity::MustMatch)?;
            }
            for context in self.contexts_for(case) {
                self.compile_case(case, context.as_ref())?.validate()?;
            }
        }
        if let Some(setup) = &self.setup {
            for pattern in &setup.absent_patterns {
                Assertion::pattern(pattern, Polarity::MustNotMatch)?;
            }
        }
        Ok(())
    }

    /// The scope contexts a case runs under: the default scope first, then
    /// each declared scope when the case is scoped.
    #[must_use]
    pub fn contexts_for(&self, case: &CaseSpec) -> Vec<Option<Scope>> {
        let mut contexts = vec![None];
        if case.scoped {
            contexts.extend(self.scopes.iter().map(|s| Some(Scope::new(s.clone()))));
        }
        contexts
    }

    /// Every scope anchor line declared by the suite.
    #[must_use]
    pub fn anchor_lines(&self) -> Vec<String> {
        match &self.scope_anchor {
            Some(fmt) => self
                .scopes
                .iter()
                .map(|s| netconverge_core::scope::anchor_line(fmt, &Scope::new(s.clone())))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Resource query command for a scope context.
    #[must_use]
    pub fn resource_command_for(&self, scope: Option<&Scope>) -> String {
        self.resource_command
            .replace(TITLE_PLACEHOLDER, &self.resource.title(scope))
    }

    /// Compile one case spec into a [`TestCase`] for a scope context.
    ///
    /// Absent cases take their absence expectations from the paired present
    /// case of the same name (or their own `resource_props`, moved), so an
    /// absent run always has something to assert the absence of.
    pub fn compile_case(
        &self,
        spec: &CaseSpec,
        scope: Option<&Scope>,
    ) -> Result<TestCase, SuiteError> {
        let resource_props = overridden_props(spec, scope);

        let (resource_props, absence_props) = match spec.ensure {
            Lifecycle::Present => (resource_props, BTreeMap::new()),
            Lifecycle::Absent => {
                let mut absence = self.paired_present_props(&spec.name, scope);
                absence.extend(resource_props);
                (BTreeMap::new(), absence)
            }
        };

        let case = TestCase {
            name: spec.name.clone(),
            description: spec.desc.clone(),
            lifecycle: spec.ensure,
            manifest_props: spec.manifest_props.clone(),
            resource_props,
            device_patterns: spec.device_patterns.clone(),
            scope: scope.cloned(),
            absence_props,
            apply_codes: spec.apply_codes.clone(),
            query_codes: spec.query_codes.clone(),
        };
        case.validate()?;
        Ok(case)
    }

    /// Expected literals of the present case paired with `name`, after scope
    /// overrides.
    fn paired_present_props(&self, name: &str, scope: Option<&Scope>) -> BTreeMap<String, String> {
        self.cases
            .iter()
            .find(|c| c.name == name && c.ensure == Lifecycle::Present)
            .map(|present| overridden_props(present, scope))
            .unwrap_or_default()
    }

    /// Union of every present case's expected literals for a scope context.
    /// Teardown asserts all of them absent after the final cleanup apply.
    #[must_use]
    pub fn teardown_absence_props(&self, scope: Option<&Scope>) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        for case in self.cases.iter().filter(|c| c.ensure == Lifecycle::Present) {
            props.extend(overridden_props(case, scope));
        }
        props
    }
}

/// A case's expected literals with its per-scope overrides applied.
fn overridden_props(spec: &CaseSpec, scope: Option<&Scope>) -> BTreeMap<String, String> {
    let mut props = spec.resource_props.clone();
    if let Some(scope) = scope
        && let Some(over) = spec.scope_overrides.get(&scope.name)
    {
        for key in &over.drop {
            props.remove(key);
        }
        for (key, value) in &over.set {
            props.insert(key.clone(), value.clone());
        }
    }
    props
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bgp_suite_json() -> &'static str {
        r#"{
            "version": "v1",
            "suite": "cisco_bgp",
            "controller": "master",
            "device": "agent",
            "resource": { "type_name": "cisco_bgp", "instance": "55" },
            "manifest_path": "/manifests/site.pp",
            "apply_command": "puppet agent -t",
            "resource_command": "puppet resource cisco_bgp '{title}'",
            "device_command": "show running-config section bgp",
            "scope_anchor": "vrf {scope}",
            "scopes": ["blue", "red"],
            "cases": [
                {
                    "name": "defaults",
                    "desc": "1.1 Default Properties",
                    "manifest_props": { "shutdown": "default" },
                    "resource_props": {
                        "ensure": "present",
                        "shutdown": "false",
                        "enforce_first_as": "true"
                    },
                    "device_patterns": ["router bgp 55"],
                    "scoped": true,
                    "scope_overrides": {
                        "blue": { "drop": ["enforce_first_as"] },
                        "red": { "drop": ["enforce_first_as"] }
                    }
                },
                {
                    "name": "defaults",
                    "desc": "1.2 Default Properties",
                    "ensure": "absent",
                    "scoped": true
                }
            ]
        }"#
    }

    #[test]
    fn suite_loads_and_validates() {
        let spec = SuiteSpec::from_json(bgp_suite_json()).expect("valid suite json");
        assert_eq!(spec.suite, "cisco_bgp");
        assert_eq!(spec.cases.len(), 2);
        assert!(spec.teardown);
    }

    #[test]
    fn contexts_start_with_the_default_scope() {
        let spec = SuiteSpec::from_json(bgp_suite_json()).unwrap();
        let contexts = spec.contexts_for(&spec.cases[0]);
        assert_eq!(contexts.len(), 3);
        assert!(contexts[0].is_none());
        assert_eq!(contexts[1].as_ref().unwrap().name, "blue");
    }

    #[test]
    fn scope_override_drops_default_only_keys() {
        let spec = SuiteSpec::from_json(bgp_suite_json()).unwrap();
        let scope = Scope::new("blue");
        let case = spec.compile_case(&spec.cases[0], Some(&scope)).unwrap();
        assert!(!case.resource_props.contains_key("enforce_first_as"));
        assert_eq!(case.resource_props.get("shutdown").unwrap(), "false");

        let unscoped = spec.compile_case(&spec.cases[0], None).unwrap();
        assert!(unscoped.resource_props.contains_key("enforce_first_as"));
    }

    #[test]
    fn absent_case_inherits_paired_present_expectations() {
        let spec = SuiteSpec::from_json(bgp_suite_json()).unwrap();
        let case = spec.compile_case(&spec.cases[1], None).unwrap();
        assert_eq!(case.lifecycle, Lifecycle::Absent);
        assert!(case.resource_props.is_empty());
        assert_eq!(case.absence_props.get("ensure").unwrap(), "present");
        assert!(case.absence_props.contains_key("enforce_first_as"));
    }

    #[test]
    fn absent_case_respects_scope_overrides_of_the_pair() {
        let spec = SuiteSpec::from_json(bgp_suite_json()).unwrap();
        let scope = Scope::new("red");
        let case = spec.compile_case(&spec.cases[1], Some(&scope)).unwrap();
        assert!(!case.absence_props.contains_key("enforce_first_as"));
        assert!(case.absence_props.contains_key("shutdown"));
    }

    #[test]
    fn resource_command_embeds_the_scoped_title() {
        let spec = SuiteSpec::from_json(bgp_suite_json()).unwrap();
        let scope = Scope::new("blue");
        assert_eq!(
            spec.resource_command_for(Some(&scope)),
            "puppet resource cisco_bgp '55 blue'"
        );
        assert_eq!(
            spec.resource_command_for(None),
            "puppet resource cisco_bgp '55'"
        );
    }

    #[test]
    fn anchor_lines_cover_every_scope() {
        let spec = SuiteSpec::from_json(bgp_suite_json()).unwrap();
        assert_eq!(spec.anchor_lines(), vec!["vrf blue", "vrf red"]);
    }

    #[test]
    fn scoped_case_without_scopes_is_rejected() {
        let json = bgp_suite_json()
            .replace(r#""scopes": ["blue", "red"],"#, r#""scopes": [],"#);
        let err = SuiteSpec::from_json(&json).unwrap_err();
        assert!(matches!(err, SuiteError::ScopedWithoutScopes { .. }));
    }

    #[test]
    fn empty_suite_is_rejected() {
        let json = r#"{
            "version": "v1", "suite": "s", "controller": "m", "device": "a",
            "resource": { "type_name": "t", "instance": "i" },
            "manifest_path": "/m.pp", "apply_command": "apply",
            "resource_command": "query '{title}'", "cases": []
        }"#;
        assert!(matches!(
            SuiteSpec::from_json(json).unwrap_err(),
            SuiteError::Empty { .. }
        ));
    }

    #[test]
    fn teardown_absence_props_union_honors_scope_overrides() {
        let spec = SuiteSpec::from_json(bgp_suite_json()).unwrap();
        let default = spec.teardown_absence_props(None);
        assert!(default.contains_key("enforce_first_as"));
        assert_eq!(default.get("ensure").unwrap(), "present");

        let scope = Scope::new("blue");
        let blue = spec.teardown_absence_props(Some(&scope));
        assert!(!blue.contains_key("enforce_first_as"));
        assert_eq!(blue.get("shutdown").unwrap(), "false");
    }

    #[test]
    fn bad_device_pattern_fails_at_load_time() {
        let json = bgp_suite_json().replace("router bgp 55", "router bgp (");
        assert!(matches!(
            SuiteSpec::from_json(&json).unwrap_err(),
            SuiteError::Pattern(_)
        ));
    }
}
