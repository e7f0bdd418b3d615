//! Sync requirements declared by policy definitions.
//!
//! A policy definition that references cluster data (e.g. "no two Ingresses
//! may share a host") only evaluates correctly when that data is synced into
//! the engine. Definitions declare this with an annotation holding a compact
//! JSON description:
//!
//! ```text
//! [
//!   [ {"groups": ["extensions", "networking.k8s.io"], "versions": ["v1"], "kinds": ["Ingress"]} ],
//!   [ {"groups": [""], "versions": ["v1"], "kinds": ["Namespace"]} ]
//! ]
//! ```
//!
//! The outer list is ANDed: every requirement must be met. Each inner list is
//! ORed: its clauses are expanded and unioned into one [`EquivalenceSet`], any
//! member of which satisfies the requirement.

use crate::{Gvk, WatchSet};
use ahash::AHashSet as HashSet;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// The annotation under which policy definitions declare sync requirements.
pub const REQUIRES_SYNC_DATA_ANNOTATION: &str = "metadata.policy-sync.io/requires-sync-data";

/// Wrapping sequences stripped from annotation values before parsing.
const WRAPPING: &[&str] = &["\\n", "\\\"", "\"", "\n", "\r", " ", "\t"];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid sync requirements: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("{name}: invalid sync requirements: {source}")]
    InvalidDefinition {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The wire form of a set of interchangeable kinds.
///
/// Expands to every `(group, version, kind)` formed by picking one element
/// from each list. An empty list expands to nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GvkClause {
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub kinds: Vec<String>,
}

/// The wire form of [`SyncRequirements`]: an ANDed list of ORed clauses.
pub type CompactSyncRequirements = Vec<Vec<GvkClause>>;

/// A set of kinds, any one of which satisfies a requirement.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EquivalenceSet(HashSet<Gvk>);

/// An ordered list of requirements, all of which must be satisfied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncRequirements(Vec<EquivalenceSet>);

/// Parses an annotation value into sync requirements.
///
/// An absent value has no requirements. Malformed values, including blank
/// values and objects with unknown fields, fail without a partial result.
pub fn resolve(value: Option<&str>) -> Result<SyncRequirements, Error> {
    let value = match value {
        Some(v) => trim_wrapping(v),
        None => return Ok(SyncRequirements::default()),
    };

    let compact = serde_json::from_str::<CompactSyncRequirements>(value).map_err(Error::Parse)?;
    Ok(SyncRequirements::expand(&compact))
}

/// Reads sync requirements from a policy definition's annotations.
pub fn resolve_annotations(
    annotations: &BTreeMap<String, String>,
) -> Result<SyncRequirements, Error> {
    resolve(
        annotations
            .get(REQUIRES_SYNC_DATA_ANNOTATION)
            .map(String::as_str),
    )
}

/// Like [`resolve_annotations`], but parse failures name the definition.
pub fn resolve_for(
    name: &str,
    annotations: &BTreeMap<String, String>,
) -> Result<SyncRequirements, Error> {
    resolve_annotations(annotations).map_err(|error| match error {
        Error::Parse(source) => Error::InvalidDefinition {
            name: name.to_string(),
            source,
        },
        error => error,
    })
}

fn trim_wrapping(mut value: &str) -> &str {
    'trim: loop {
        for w in WRAPPING {
            if let Some(rest) = value.strip_prefix(w) {
                value = rest;
                continue 'trim;
            }
            if let Some(rest) = value.strip_suffix(w) {
                value = rest;
                continue 'trim;
            }
        }
        return value;
    }
}

// === impl GvkClause ===

impl GvkClause {
    pub fn expand(&self) -> impl Iterator<Item = Gvk> + '_ {
        self.groups.iter().flat_map(move |group| {
            self.versions.iter().flat_map(move |version| {
                self.kinds
                    .iter()
                    .map(move |kind| Gvk::new(group, version, kind))
            })
        })
    }
}

// === impl EquivalenceSet ===

impl EquivalenceSet {
    pub fn contains(&self, gvk: &Gvk) -> bool {
        self.0.contains(gvk)
    }

    pub fn insert(&mut self, gvk: Gvk) -> bool {
        self.0.insert(gvk)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Gvk> {
        self.0.iter()
    }

    /// Returns true if any member of this set is in `synced`.
    ///
    /// An empty set is never satisfied.
    pub fn is_satisfied_by(&self, synced: &WatchSet) -> bool {
        self.0.iter().any(|gvk| synced.contains(gvk))
    }
}

impl FromIterator<Gvk> for EquivalenceSet {
    fn from_iter<T: IntoIterator<Item = Gvk>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Gvk> for EquivalenceSet {
    fn extend<T: IntoIterator<Item = Gvk>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

impl fmt::Display for EquivalenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, gvk) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" OR ")?;
            }
            fmt::Display::fmt(gvk, f)?;
        }
        Ok(())
    }
}

// === impl SyncRequirements ===

impl SyncRequirements {
    /// Expands the compact wire form.
    ///
    /// A requirement with no clauses becomes an empty set. It is kept rather
    /// than dropped, so the requirements can never be satisfied.
    pub fn expand(compact: &CompactSyncRequirements) -> Self {
        compact
            .iter()
            .map(|clauses| {
                clauses
                    .iter()
                    .flat_map(|clause| clause.expand())
                    .collect::<EquivalenceSet>()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EquivalenceSet> {
        self.0.iter()
    }

    /// Returns the requirements that no kind in `synced` satisfies.
    pub fn unsatisfied<'r>(&'r self, synced: &WatchSet) -> Vec<&'r EquivalenceSet> {
        self.0
            .iter()
            .filter(|set| !set.is_satisfied_by(synced))
            .collect()
    }

    pub fn is_satisfied_by(&self, synced: &WatchSet) -> bool {
        self.unsatisfied(synced).is_empty()
    }
}

impl FromIterator<EquivalenceSet> for SyncRequirements {
    fn from_iter<T: IntoIterator<Item = EquivalenceSet>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for SyncRequirements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, set) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "- {set}")?;
        }
        Ok(())
    }
}
