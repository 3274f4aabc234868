// src/dependency/literal.rs

//! Typed dependency literals and their stable wire format.
//!
//! ```text
//! file://src/main.ts     a filesystem input gated by mtime
//! task://bundle          stale whenever `bundle` is stale
//! *                      always stale
//! ```

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::errors::YesbuildError;

pub const FILE_PREFIX: &str = "file://";
pub const TASK_PREFIX: &str = "task://";
pub const ALWAYS: &str = "*";

/// A single dependency reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepLiteral {
    File(String),
    Task(String),
    Always,
}

impl DepLiteral {
    pub fn file(path: impl Into<String>) -> Self {
        DepLiteral::File(path.into())
    }

    pub fn task(name: impl Into<String>) -> Self {
        DepLiteral::Task(name.into())
    }

    pub fn is_task(&self) -> bool {
        matches!(self, DepLiteral::Task(_))
    }
}

impl fmt::Display for DepLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepLiteral::File(path) => write!(f, "{FILE_PREFIX}{path}"),
            DepLiteral::Task(name) => write!(f, "{TASK_PREFIX}{name}"),
            DepLiteral::Always => f.write_str(ALWAYS),
        }
    }
}

impl FromStr for DepLiteral {
    type Err = YesbuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ALWAYS {
            return Ok(DepLiteral::Always);
        }
        if let Some(path) = s.strip_prefix(FILE_PREFIX) {
            return Ok(DepLiteral::File(path.to_string()));
        }
        if let Some(name) = s.strip_prefix(TASK_PREFIX) {
            return Ok(DepLiteral::Task(name.to_string()));
        }
        Err(YesbuildError::ConfigError(format!(
            "Dependency {s} is not supported"
        )))
    }
}

impl Serialize for DepLiteral {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DepLiteral {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// A known dependency set.
///
/// The "undefined" state (no deps recorded yet) is modelled as
/// `Option<Dependencies>::None` by the owners of a set.
///
/// `List` is kept sorted by wire form and de-duplicated by whoever builds it;
/// [`Dependencies::equals`] relies on that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependencies {
    Always,
    List(Vec<DepLiteral>),
}

impl Dependencies {
    /// Sort by wire form and drop duplicates.
    pub fn sorted(mut literals: Vec<DepLiteral>) -> Self {
        literals.sort_by_cached_key(|l| l.to_string());
        literals.dedup();
        Dependencies::List(literals)
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Dependencies::Always)
    }

    pub fn literals(&self) -> &[DepLiteral] {
        match self {
            Dependencies::Always => &[],
            Dependencies::List(list) => list,
        }
    }

    /// Change-detection equality: length first, then element-wise.
    pub fn equals(a: Option<&Dependencies>, b: Option<&Dependencies>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(Dependencies::Always), Some(Dependencies::Always)) => true,
            (Some(Dependencies::List(a)), Some(Dependencies::List(b))) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
            }
            _ => false,
        }
    }

    /// Merge a freshly recorded set into the previous one.
    ///
    /// `task://` edges can only be produced by the build definition during
    /// configuration, so the old ones are kept while `file://` literals are
    /// fully replaced by the new pass.
    pub fn merge(old: Option<Dependencies>, new: Option<Dependencies>) -> Option<Dependencies> {
        match (old, new) {
            (Some(Dependencies::Always), _) | (_, Some(Dependencies::Always)) => {
                Some(Dependencies::Always)
            }
            (None, new) => new,
            (old, None) => old,
            (Some(Dependencies::List(old)), Some(Dependencies::List(new))) => {
                let mut merged: Vec<DepLiteral> =
                    old.into_iter().filter(DepLiteral::is_task).collect();
                merged.extend(new);
                Some(Dependencies::sorted(merged))
            }
        }
    }
}

impl Serialize for Dependencies {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Dependencies::Always => serializer.serialize_str(ALWAYS),
            Dependencies::List(list) => {
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for literal in list {
                    seq.serialize_element(literal)?;
                }
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Dependencies {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DepsVisitor;

        impl<'de> Visitor<'de> for DepsVisitor {
            type Value = Dependencies;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("\"*\" or a list of dependency literals")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                if v == ALWAYS {
                    Ok(Dependencies::Always)
                } else {
                    Err(E::custom(format!("Unrecognized deps: {v}")))
                }
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut list = Vec::new();
                while let Some(literal) = seq.next_element::<DepLiteral>()? {
                    list.push(literal);
                }
                // Stored order is trusted; it was sorted before writing.
                Ok(Dependencies::List(list))
            }
        }

        deserializer.deserialize_any(DepsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_round_trip_through_wire_form() {
        for raw in ["file://src/main.ts", "task://bundle", "*"] {
            let literal: DepLiteral = raw.parse().unwrap();
            assert_eq!(literal.to_string(), raw);
        }
    }

    #[test]
    fn unknown_prefix_is_a_config_error() {
        let err = "http://example.com".parse::<DepLiteral>().unwrap_err();
        assert!(matches!(err, YesbuildError::ConfigError(_)));
    }

    #[test]
    fn merge_keeps_old_task_edges_and_replaces_files() {
        let old = Some(Dependencies::sorted(vec![
            DepLiteral::file("src/old.ts"),
            DepLiteral::task("assets"),
        ]));
        let new = Some(Dependencies::sorted(vec![DepLiteral::file("src/new.ts")]));

        let merged = Dependencies::merge(old, new).unwrap();
        assert_eq!(
            merged.literals(),
            &[DepLiteral::file("src/new.ts"), DepLiteral::task("assets")]
        );
    }

    #[test]
    fn merge_with_always_is_always() {
        let list = Some(Dependencies::sorted(vec![DepLiteral::file("a")]));
        assert_eq!(
            Dependencies::merge(list.clone(), Some(Dependencies::Always)),
            Some(Dependencies::Always)
        );
        assert_eq!(
            Dependencies::merge(Some(Dependencies::Always), list),
            Some(Dependencies::Always)
        );
    }

    #[test]
    fn merge_with_undefined_takes_the_other_side() {
        let list = Some(Dependencies::sorted(vec![DepLiteral::file("a")]));
        assert_eq!(Dependencies::merge(None, list.clone()), list);
        assert_eq!(Dependencies::merge(list.clone(), None), list);
    }

    #[test]
    fn equality_is_element_wise() {
        let a = Dependencies::List(vec![DepLiteral::file("a"), DepLiteral::file("b")]);
        let b = Dependencies::List(vec![DepLiteral::file("b"), DepLiteral::file("a")]);
        assert!(!Dependencies::equals(Some(&a), Some(&b)));
        assert!(Dependencies::equals(Some(&a), Some(&a.clone())));
        assert!(!Dependencies::equals(Some(&a), None));
        assert!(Dependencies::equals(None, None));
    }

    #[test]
    fn serializes_always_as_bare_star() {
        let json = serde_json::to_string(&Dependencies::Always).unwrap();
        assert_eq!(json, "\"*\"");
        let back: Dependencies = serde_json::from_str(&json).unwrap();
        assert!(back.is_always());
    }
}
