//! Label selector parsing and matching.
//!
//! Supports the string syntax used by replica controllers and affinity
//! terms:
//!
//! ```text
//! app=web               equality (also `==`)
//! tier!=cache           inequality
//! env in (prod, qa)     set membership
//! env notin (dev)       set exclusion
//! gpu                   key exists
//! !spot                 key does not exist
//! ```
//!
//! Requirements are comma-separated and all must hold. The empty string
//! selects everything.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("invalid label key {key:?} in selector {selector:?}")]
    InvalidKey { selector: String, key: String },
    #[error("invalid label value {value:?} in selector {selector:?}")]
    InvalidValue { selector: String, value: String },
    #[error("unbalanced parentheses in selector {0:?}")]
    UnbalancedParens(String),
    #[error("unknown set operator {op:?} in selector {selector:?}")]
    UnknownOperator { selector: String, op: String },
    #[error("empty value set in selector {0:?}")]
    EmptyValueSet(String),
    #[error("empty requirement in selector {0:?}")]
    EmptyRequirement(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
    pub values: BTreeSet<String>,
}

impl Requirement {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Equals | Operator::In => value.is_some_and(|v| self.values.contains(v)),
            Operator::NotEquals | Operator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

/// A parsed, immutable label selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Selector matching every label set.
    pub fn everything() -> Self {
        Self::default()
    }

    /// Equality selector built from a label map.
    pub fn from_map(labels: &BTreeMap<String, String>) -> Self {
        let requirements = labels
            .iter()
            .map(|(k, v)| Requirement {
                key: k.clone(),
                operator: Operator::Equals,
                values: BTreeSet::from([v.clone()]),
            })
            .collect();
        Self { requirements }
    }

    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        let trimmed = selector.trim();
        if trimmed.is_empty() {
            return Ok(Self::everything());
        }

        let mut requirements = Vec::new();
        for part in split_top_level(trimmed)? {
            requirements.push(parse_requirement(selector, part.trim())?);
        }
        Ok(Self { requirements })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            let joined = || r.values.iter().cloned().collect::<Vec<_>>().join(",");
            match r.operator {
                Operator::Equals => write!(f, "{}={}", r.key, joined())?,
                Operator::NotEquals => write!(f, "{}!={}", r.key, joined())?,
                Operator::In => write!(f, "{} in ({})", r.key, joined())?,
                Operator::NotIn => write!(f, "{} notin ({})", r.key, joined())?,
                Operator::Exists => f.write_str(&r.key)?,
                Operator::DoesNotExist => write!(f, "!{}", r.key)?,
            }
        }
        Ok(())
    }
}

/// Split on commas that are not inside a parenthesized value set.
fn split_top_level(selector: &str) -> Result<Vec<&str>, SelectorError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SelectorError::UnbalancedParens(selector.to_string()))?;
            }
            ',' if depth == 0 => {
                parts.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(SelectorError::UnbalancedParens(selector.to_string()));
    }
    parts.push(&selector[start..]);
    Ok(parts)
}

fn parse_requirement(selector: &str, part: &str) -> Result<Requirement, SelectorError> {
    if part.is_empty() {
        return Err(SelectorError::EmptyRequirement(selector.to_string()));
    }

    if let Some(open) = part.find('(') {
        let head: Vec<&str> = part[..open].split_whitespace().collect();
        let [key, op] = head.as_slice() else {
            return Err(SelectorError::UnknownOperator {
                selector: selector.to_string(),
                op: part[..open].trim().to_string(),
            });
        };
        let operator = match *op {
            "in" => Operator::In,
            "notin" => Operator::NotIn,
            other => {
                return Err(SelectorError::UnknownOperator {
                    selector: selector.to_string(),
                    op: other.to_string(),
                });
            }
        };
        let rest = part[open + 1..].trim_end();
        let inner = rest
            .strip_suffix(')')
            .ok_or_else(|| SelectorError::UnbalancedParens(selector.to_string()))?;

        let mut values = BTreeSet::new();
        for v in inner.split(',').map(str::trim).filter(|v| !v.is_empty()) {
            values.insert(check_value(selector, v)?);
        }
        if values.is_empty() {
            return Err(SelectorError::EmptyValueSet(selector.to_string()));
        }
        return Ok(Requirement {
            key: check_key(selector, key)?,
            operator,
            values,
        });
    }

    if let Some(key) = part.strip_prefix('!') {
        return Ok(Requirement {
            key: check_key(selector, key.trim())?,
            operator: Operator::DoesNotExist,
            values: BTreeSet::new(),
        });
    }

    let (key, operator, value) = if let Some((k, v)) = part.split_once("!=") {
        (k, Operator::NotEquals, v)
    } else if let Some((k, v)) = part.split_once("==") {
        (k, Operator::Equals, v)
    } else if let Some((k, v)) = part.split_once('=') {
        (k, Operator::Equals, v)
    } else {
        return Ok(Requirement {
            key: check_key(selector, part)?,
            operator: Operator::Exists,
            values: BTreeSet::new(),
        });
    };

    Ok(Requirement {
        key: check_key(selector, key.trim())?,
        operator,
        values: BTreeSet::from([check_value(selector, value.trim())?]),
    })
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

fn check_key(selector: &str, key: &str) -> Result<String, SelectorError> {
    let invalid = || SelectorError::InvalidKey {
        selector: selector.to_string(),
        key: key.to_string(),
    };
    // Optional DNS prefix: `example.com/name`.
    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            if prefix.is_empty() || !prefix.chars().all(is_label_char) {
                return Err(invalid());
            }
            name
        }
        None => key,
    };
    if name.is_empty() || name.len() > 63 || !name.chars().all(is_label_char) {
        return Err(invalid());
    }
    Ok(key.to_string())
}

fn check_value(selector: &str, value: &str) -> Result<String, SelectorError> {
    if value.len() > 63 || !value.chars().all(is_label_char) {
        return Err(SelectorError::InvalidValue {
            selector: selector.to_string(),
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}
