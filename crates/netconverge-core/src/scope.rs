//! Scope model and scope-local text regions.
//!
//! A scope is a named sub-context isolating one resource instance from
//! another on the same device (a VRF, for example). Device output interleaves
//! every scope's configuration in one blob, so assertions issued for scope S
//! must only see S's block. The region helpers carve that block out by
//! indentation, the way `show running-config` nests scope bodies under the
//! scope header line.

use serde::{Deserialize, Serialize};

/// A named sub-context under which a resource instance is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope {
    pub name: String,
}

impl Scope {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Render a scope anchor line from a suite-supplied format, e.g.
/// `"vrf {scope}"` -> `"vrf blue"`.
#[must_use]
pub fn anchor_line(fmt: &str, scope: &Scope) -> String {
    fmt.replace("{scope}", &scope.name)
}

fn indent_width(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn is_anchor(line: &str, anchor: &str) -> bool {
    let trimmed = line.trim();
    let anchor = anchor.trim();
    trimmed == anchor
        || trimmed
            .strip_prefix(anchor)
            .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}

/// Extract the configuration block belonging to `anchor` from `text`.
///
/// The block is the anchor line plus every following line indented deeper
/// than it (blank lines included). Returns `None` when the anchor never
/// appears, which callers treat as "pattern not found".
#[must_use]
pub fn scope_region(text: &str, anchor: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.iter().position(|line| is_anchor(line, anchor))?;
    let base = indent_width(lines[start]);

    let mut block = vec![lines[start]];
    for line in &lines[start + 1..] {
        if line.trim().is_empty() || indent_width(line) > base {
            block.push(line);
        } else {
            break;
        }
    }
    Some(block.join("\n"))
}

/// Return `text` with every named-scope block removed, leaving only the
/// implicit default scope's configuration.
#[must_use]
pub fn unscoped_region(text: &str, anchors: &[String]) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut keep = vec![true; lines.len()];

    for anchor in anchors {
        let Some(start) = lines.iter().position(|line| is_anchor(line, anchor)) else {
            continue;
        };
        let base = indent_width(lines[start]);
        keep[start] = false;
        for (i, line) in lines.iter().enumerate().skip(start + 1) {
            if line.trim().is_empty() || indent_width(line) > base {
                keep[i] = false;
            } else {
                break;
            }
        }
    }

    lines
        .iter()
        .zip(&keep)
        .filter_map(|(line, keep)| keep.then_some(*line))
        .collect::<Vec<_>>()
        .join("\n")
}
