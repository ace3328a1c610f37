//! Current viewing scope: District -> Block -> School.
//!
//! The scope is persisted as a camelCase JSON object so any consumer of the
//! same storage reads it the same way. The interceptor reads it leniently
//! through [`ScopeField::extract`]; [`ScopeService`] owns writes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientResult;
use crate::storage::{Storage, SCOPE_KEY};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udise_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_name: Option<String>,
    #[serde(default)]
    pub version: u64,
}

/// The six scope fields and the query parameter each one maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeField {
    DistrictCode,
    DistrictName,
    BlockCode,
    BlockName,
    UdiseCode,
    SchoolName,
}

impl ScopeField {
    pub const ALL: [ScopeField; 6] = [
        ScopeField::DistrictCode,
        ScopeField::DistrictName,
        ScopeField::BlockCode,
        ScopeField::BlockName,
        ScopeField::UdiseCode,
        ScopeField::SchoolName,
    ];

    /// Key in the persisted scope object
    pub fn storage_key(&self) -> &'static str {
        match self {
            ScopeField::DistrictCode => "districtCode",
            ScopeField::DistrictName => "districtName",
            ScopeField::BlockCode => "blockCode",
            ScopeField::BlockName => "blockName",
            ScopeField::UdiseCode => "udiseCode",
            ScopeField::SchoolName => "schoolName",
        }
    }

    /// Query parameter understood by the backend
    pub fn query_param(&self) -> &'static str {
        match self {
            ScopeField::DistrictCode => "district_code",
            ScopeField::DistrictName => "district_name",
            ScopeField::BlockCode => "block_code",
            ScopeField::BlockName => "block_name",
            ScopeField::UdiseCode => "udise_code",
            ScopeField::SchoolName => "school_name",
        }
    }

    /// Non-empty value of this field in a raw persisted scope object.
    ///
    /// Codes are sometimes stored as numbers; those are rendered as-is.
    /// `null`, empty strings and other JSON types count as absent.
    pub fn extract(&self, raw: &Map<String, Value>) -> Option<String> {
        match raw.get(self.storage_key())? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn value<'a>(&self, scope: &'a Scope) -> Option<&'a str> {
        let value = match self {
            ScopeField::DistrictCode => &scope.district_code,
            ScopeField::DistrictName => &scope.district_name,
            ScopeField::BlockCode => &scope.block_code,
            ScopeField::BlockName => &scope.block_name,
            ScopeField::UdiseCode => &scope.udise_code,
            ScopeField::SchoolName => &scope.school_name,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }
}

impl Scope {
    pub fn is_empty(&self) -> bool {
        ScopeField::ALL.iter().all(|f| f.value(self).is_none())
    }

    /// Query pairs this scope contributes, in field order
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        ScopeField::ALL
            .iter()
            .filter_map(|f| f.value(self).map(|v| (f.query_param(), v.to_string())))
            .collect()
    }
}

/// Entry of the district selector, from `/api/scope/districts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictOption {
    #[serde(deserialize_with = "code_string")]
    pub district_code: String,
    pub district_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockOption {
    #[serde(deserialize_with = "code_string")]
    pub block_code: String,
    pub block_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolOption {
    #[serde(deserialize_with = "code_string")]
    pub udise_code: String,
    pub school_name: String,
}

/// Codes arrive as strings or, from older imports, as bare numbers
fn code_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected a code, got {}", other))),
    }
}

/// Reads and writes the persisted scope.
///
/// Every change bumps `version` so consumers can tell when to refetch.
#[derive(Clone)]
pub struct ScopeService {
    storage: Arc<dyn Storage>,
}

impl ScopeService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Persisted scope; absent or malformed data reads as the empty scope
    pub fn current(&self) -> Scope {
        let raw = match self.storage.get_item(SCOPE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Scope::default(),
            Err(e) => {
                tracing::warn!("Could not read persisted scope: {}", e);
                return Scope::default();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => Scope {
                district_code: ScopeField::DistrictCode.extract(&map),
                district_name: ScopeField::DistrictName.extract(&map),
                block_code: ScopeField::BlockCode.extract(&map),
                block_name: ScopeField::BlockName.extract(&map),
                udise_code: ScopeField::UdiseCode.extract(&map),
                school_name: ScopeField::SchoolName.extract(&map),
                version: map.get("version").and_then(Value::as_u64).unwrap_or(0),
            },
            _ => {
                tracing::warn!("Ignoring malformed persisted scope");
                Scope::default()
            }
        }
    }

    fn update(&self, change: impl FnOnce(&mut Scope)) -> ClientResult<Scope> {
        let mut scope = self.current();
        change(&mut scope);
        scope.version += 1;
        self.storage.set_item(SCOPE_KEY, &serde_json::to_string(&scope)?)?;
        tracing::debug!("Scope changed to version {}", scope.version);
        Ok(scope)
    }

    /// Select a district; any block or school selection is cleared
    pub fn select_district(&self, code: &str, name: Option<&str>) -> ClientResult<Scope> {
        self.update(|scope| {
            let version = scope.version;
            *scope = Scope {
                district_code: Some(code.to_string()),
                district_name: name.map(str::to_string),
                version,
                ..Scope::default()
            };
        })
    }

    /// Select a block within the current district; any school selection is cleared
    pub fn select_block(&self, code: &str, name: Option<&str>) -> ClientResult<Scope> {
        self.update(|scope| {
            scope.block_code = Some(code.to_string());
            scope.block_name = name.map(str::to_string);
            scope.udise_code = None;
            scope.school_name = None;
        })
    }

    pub fn select_school(&self, udise_code: &str, name: Option<&str>) -> ClientResult<Scope> {
        self.update(|scope| {
            scope.udise_code = Some(udise_code.to_string());
            scope.school_name = name.map(str::to_string);
        })
    }

    pub fn clear(&self) -> ClientResult<Scope> {
        self.update(|scope| {
            let version = scope.version;
            *scope = Scope {
                version,
                ..Scope::default()
            };
        })
    }
}

impl std::fmt::Debug for ScopeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeService").finish_non_exhaustive()
    }
}
