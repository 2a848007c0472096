//! Manifest synthesis: rendering a test case into the declarative text the
//! configuration-management agent consumes.
//!
//! Rendering is pure; persistence on the controller host goes through the
//! `ManifestStore` seam in `netconverge-exec`.

use serde::{Deserialize, Serialize};

use crate::scope::Scope;
use crate::testcase::{Lifecycle, TestCase};

/// Names the resource type and instance a suite drives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceBinding {
    /// Agent resource type, e.g. `cisco_bgp`.
    pub type_name: String,
    /// Instance identifier, e.g. an ASN, an interface name, or `default`
    /// for global singletons.
    pub instance: String,
}

impl ResourceBinding {
    /// Manifest title for an instance, scope-qualified when scoped
    /// (`'55 blue'` for ASN 55 in VRF blue).
    #[must_use]
    pub fn title(&self, scope: Option<&Scope>) -> String {
        match scope {
            Some(scope) => format!("{} {}", self.instance, scope.name),
            None => self.instance.clone(),
        }
    }
}

/// Render the manifest text for one test case.
///
/// Absent lifecycle emits `ensure => absent` and nothing else. Property
/// values are emitted verbatim, including the `default` sentinel, which the
/// agent resolves on the device; the harness never substitutes it.
#[must_use]
pub fn render_manifest(binding: &ResourceBinding, case: &TestCase) -> String {
    let title = binding.title(case.scope.as_ref());
    let mut body = String::new();

    match case.lifecycle {
        Lifecycle::Absent => {
            body.push_str("    ensure => absent,\n");
        }
        Lifecycle::Present => {
            body.push_str("    ensure => present,\n");
            for (key, value) in &case.manifest_props {
                body.push_str(&format!("    {key} => '{value}',\n"));
            }
        }
    }

    format!(
        "node default {{\n  {type_name} {{ '{title}':\n{body}  }}\n}}\n",
        type_name = binding.type_name,
    )
}
