//! Integer codes for categorical entities (drivers, teams)

use serde::{Deserialize, Serialize};

use crate::{EntityKind, PredictorError, Result};

/// Fixed vocabulary mapping identifiers to stable integer codes.
///
/// Codes follow sorted order of the distinct values seen at fit time. The
/// encoder is immutable once fit; re-fitting means building a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    kind: EntityKind,
    classes: Vec<String>,
}

impl CategoricalEncoder {
    /// Build a vocabulary from every value in `values`
    pub fn fit<I, S>(kind: EntityKind, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classes: Vec<String> = values.into_iter().map(|v| v.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        CategoricalEncoder { kind, classes }
    }

    /// Code for `value`, or `UnknownCategory` if it was never seen
    pub fn encode(&self, value: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map_err(|_| PredictorError::UnknownCategory {
                kind: self.kind,
                value: value.to_string(),
            })
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn contains(&self, value: &str) -> bool {
        self.encode(value).is_ok()
    }

    /// First entry of the vocabulary, used as the stand-in for unknown ids
    pub fn first(&self) -> Option<&str> {
        self.classes.first().map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_sorted_order() {
        let enc = CategoricalEncoder::fit(EntityKind::Driver, ["VER", "HAM", "LEC", "HAM"]);
        assert_eq!(enc.len(), 3);
        assert_eq!(enc.encode("HAM").unwrap(), 0);
        assert_eq!(enc.encode("LEC").unwrap(), 1);
        assert_eq!(enc.encode("VER").unwrap(), 2);
        assert_eq!(enc.decode(2), Some("VER"));
        assert_eq!(enc.first(), Some("HAM"));
    }

    #[test]
    fn test_unknown_value() {
        let enc = CategoricalEncoder::fit(EntityKind::Team, ["ferrari", "mclaren"]);
        match enc.encode("williams") {
            Err(PredictorError::UnknownCategory { kind, value }) => {
                assert_eq!(kind, EntityKind::Team);
                assert_eq!(value, "williams");
            }
            other => panic!("expected UnknownCategory, got {:?}", other),
        }
        assert!(!enc.contains("williams"));
    }

    #[test]
    fn test_empty_vocabulary() {
        let enc = CategoricalEncoder::fit(EntityKind::Driver, Vec::<String>::new());
        assert!(enc.is_empty());
        assert!(enc.first().is_none());
        assert!(enc.encode("VER").is_err());
    }

    #[test]
    fn test_fit_is_order_independent() {
        let a = CategoricalEncoder::fit(EntityKind::Driver, ["NOR", "PIA", "ALO"]);
        let b = CategoricalEncoder::fit(EntityKind::Driver, ["ALO", "NOR", "PIA"]);
        assert_eq!(a, b);
    }
}
