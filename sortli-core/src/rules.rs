//! Read-only store of recycling rules loaded from the rules document.

use std::fmt;
use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Error as SerdeJsonError;
use tracing::{debug, info, warn};

use crate::model::{BinType, RecyclingRule};

#[derive(thiserror::Error, Debug)]
/// Errors raised while loading the rules document.
pub enum RulesError {
    /// The document does not exist.
    #[error("Could not find rules file {}", path.display())]
    NotFound {
        /// Expected location.
        path: PathBuf,
    },
    /// The document exists but could not be read.
    #[error("Failed to read rules file {}: {source}", path.display())]
    Read {
        /// Document location.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: IoError,
    },
    /// The document is not valid rules JSON.
    #[error("Malformed rules file {}: {source}", path.display())]
    Parse {
        /// Document location.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: SerdeJsonError,
    },
    /// The document holds no rules.
    #[error("Rules file {} contains no rules", path.display())]
    Empty {
        /// Document location.
        path: PathBuf,
    },
}

/// Rule fields when the document is keyed by rule name.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleBody {
    #[serde(alias = "bin_type")]
    bin_type: BinType,
    #[serde(default)]
    preparation: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

impl RuleBody {
    fn into_rule(self, name: String) -> RecyclingRule {
        RecyclingRule {
            name,
            bin_type: self.bin_type,
            preparation: self.preparation,
            reason: self.reason,
        }
    }
}

/// Rules of a keyed document, in document order. Repeated names are all kept.
#[derive(Debug)]
struct KeyedRules(Vec<RecyclingRule>);

impl<'de> Deserialize<'de> for KeyedRules {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(KeyedRulesVisitor)
    }
}

struct KeyedRulesVisitor;

impl<'de> Visitor<'de> for KeyedRulesVisitor {
    type Value = KeyedRules;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an object of recycling rules keyed by name")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut rules = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((name, body)) = map.next_entry::<String, RuleBody>()? {
            rules.push(body.into_rule(name));
        }
        Ok(KeyedRules(rules))
    }
}

/// Accepted document layouts: a list of rules or an object keyed by name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RulesDocument {
    List(Vec<RecyclingRule>),
    Keyed(KeyedRules),
}

impl RulesDocument {
    fn into_rules(self) -> Vec<RecyclingRule> {
        match self {
            RulesDocument::List(rules) | RulesDocument::Keyed(KeyedRules(rules)) => rules,
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable collection of recycling rules for one run.
pub struct RulesStore {
    rules: Vec<RecyclingRule>,
}

impl RulesStore {
    /// Load and validate the rules document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::NotFound`] if the file is absent, [`RulesError::Parse`] if
    /// it is malformed and [`RulesError::Empty`] if it contains no rules.
    pub async fn load(path: &Path) -> Result<Self, RulesError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => RulesError::NotFound {
                    path: path.to_path_buf(),
                },
                _ => RulesError::Read {
                    path: path.to_path_buf(),
                    source: err,
                },
            })?;

        let document: RulesDocument =
            serde_json::from_str(&content).map_err(|err| RulesError::Parse {
                path: path.to_path_buf(),
                source: err,
            })?;

        let rules = document.into_rules();
        if rules.is_empty() {
            return Err(RulesError::Empty {
                path: path.to_path_buf(),
            });
        }

        info!(path = %path.display(), count = rules.len(), "Loaded recycling rules");
        Ok(Self { rules })
    }

    /// Build a store from rules already in memory.
    #[must_use]
    pub fn from_rules(rules: Vec<RecyclingRule>) -> Self {
        Self { rules }
    }

    /// First rule whose name matches, ignoring case.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RecyclingRule> {
        let wanted = name.trim();
        self.rules
            .iter()
            .find(|rule| rule.name.eq_ignore_ascii_case(wanted))
    }

    /// Iterator over all rules in document order.
    pub fn iter(&self) -> impl Iterator<Item = &RecyclingRule> {
        self.rules.iter()
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the store holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Compact JSON rendering of every rule, used as prompt context.
    #[must_use]
    pub fn to_context(&self) -> String {
        let context = serde_json::to_string(&self.rules).unwrap_or_else(|err| {
            warn!(error = %err, "Cannot serialize recycling rules");
            String::from("[]")
        });
        debug!(bytes = context.len(), "Serialized rules context");
        context
    }
}
