use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_STRAIN: &str = "sbw25";

const ACCEPTED_KEYS: [&str; 3] = ["strain", "feature", "organism"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("Unknown query key '{0}'. Accepted keys: 'strain', 'feature', 'organism'")]
    UnknownKey(String),
    #[error("Invalid combination of query keys: 'organism' must not be combined with 'strain'")]
    ConflictingTargets,
    #[error("Query value for '{key}' must be a string, got {found}")]
    NotAString { key: String, found: String },
    #[error("Query must be an object with 'strain', 'feature' and/or 'organism' keys")]
    NotAnObject,
}

/// A validated search against the pseudomonas.com feature list.
///
/// At most one of `strain` and `organism` is set. Values are fixed at
/// construction; use one of the factories to build a new query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Query {
    strain: Option<String>,
    feature: Option<String>,
    organism: Option<String>,
}

impl Query {
    pub fn new(
        strain: Option<&str>,
        feature: Option<&str>,
        organism: Option<&str>,
    ) -> Result<Self, QueryError> {
        if strain.is_some() && organism.is_some() {
            return Err(QueryError::ConflictingTargets);
        }

        Ok(Self {
            strain: strain.map(str::to_string),
            feature: feature.map(str::to_string),
            organism: organism.map(str::to_string),
        })
    }

    /// Builds a query from key/value pairs. Keys outside
    /// `strain`, `feature` and `organism` are rejected; missing keys are absent.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut strain = None;
        let mut feature = None;
        let mut organism = None;

        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "strain" => &mut strain,
                "feature" => &mut feature,
                "organism" => &mut organism,
                other => return Err(QueryError::UnknownKey(other.to_string())),
            };
            *slot = value.map(Into::into);
        }

        log::debug!("Converting query mapping into a typed query");
        Self::new(strain.as_deref(), feature.as_deref(), organism.as_deref())
    }

    /// Builds a query from a JSON object. `null` counts as absent, any other
    /// non-string value is rejected.
    pub fn from_value(value: &Value) -> Result<Self, QueryError> {
        let map = value.as_object().ok_or(QueryError::NotAnObject)?;

        let mut pairs = Vec::with_capacity(map.len());
        for (key, value) in map {
            if !ACCEPTED_KEYS.contains(&key.as_str()) {
                return Err(QueryError::UnknownKey(key.clone()));
            }
            let value = match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => {
                    return Err(QueryError::NotAString {
                        key: key.clone(),
                        found: json_type_name(other).to_string(),
                    });
                }
            };
            pairs.push((key.as_str(), value));
        }

        Self::from_pairs(pairs)
    }

    pub fn strain(&self) -> Option<&str> {
        self.strain.as_deref()
    }

    pub fn feature(&self) -> Option<&str> {
        self.feature.as_deref()
    }

    pub fn organism(&self) -> Option<&str> {
        self.organism.as_deref()
    }
}

impl Default for Query {
    fn default() -> Self {
        Self {
            strain: Some(DEFAULT_STRAIN.to_string()),
            feature: None,
            organism: None,
        }
    }
}

impl TryFrom<Value> for Query {
    type Error = QueryError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(&value)
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let field = |v: &Option<String>| v.as_deref().unwrap_or("-").to_string();
        write!(
            f,
            "strain={} feature={} organism={}",
            field(&self.strain),
            field(&self.feature),
            field(&self.organism)
        )
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
