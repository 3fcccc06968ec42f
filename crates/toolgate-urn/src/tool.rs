//! Tool URNs: `tools:<kind>:<source>:<name>`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{UrnError, UrnResult};
use crate::slug::validate_segment;

/// Leading discriminator of every tool URN.
pub const TOOL_PREFIX: &str = "tools";

/// The kind segment of a tool URN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Http,
    Function,
    Prompt,
    ExternalMcp,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Function => "function",
            Self::Prompt => "prompt",
            Self::ExternalMcp => "externalmcp",
        }
    }

    fn parse(s: &str) -> UrnResult<Self> {
        match s {
            "http" => Ok(Self::Http),
            "function" => Ok(Self::Function),
            "prompt" => Ok(Self::Prompt),
            "externalmcp" => Ok(Self::ExternalMcp),
            other => Err(UrnError::invalid(format!("unknown tool kind: {other:?}"))),
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool URN.
///
/// Segments are validated once at construction (or parse) and the outcome is
/// cached, so marshalling and database encoding repeatedly return the same
/// result without re-running the pattern checks. The zero value (all
/// segments empty) is representable and detectable via [`ToolUrn::is_zero`].
#[derive(Debug, Clone)]
pub struct ToolUrn {
    kind: String,
    source: String,
    name: String,
    validation: Result<(), UrnError>,
}

impl ToolUrn {
    /// Build a tool URN from typed parts. The result may still be invalid if
    /// `source` or `name` violate the segment rules; the error surfaces on
    /// [`ToolUrn::validate`] and every encode.
    pub fn new(kind: ToolKind, source: impl Into<String>, name: impl Into<String>) -> Self {
        Self::from_segments(kind.as_str().to_string(), source.into(), name.into())
    }

    /// The zero URN: all segments empty, invalid for every encoding.
    pub fn zero() -> Self {
        Self::from_segments(String::new(), String::new(), String::new())
    }

    fn from_segments(kind: String, source: String, name: String) -> Self {
        let validation = validate_parts(&kind, &source, &name);
        Self { kind, source, name, validation }
    }

    /// Parse the canonical `tools:<kind>:<source>:<name>` form.
    pub fn parse(s: &str) -> UrnResult<Self> {
        if s.is_empty() {
            return Err(UrnError::invalid("empty tools urn"));
        }

        let parts: Vec<&str> = s.splitn(4, ':').collect();
        if parts.len() != 4 {
            return Err(UrnError::invalid(format!(
                "tools urn must have 4 segments, got {}: {s:?}",
                parts.len()
            )));
        }

        if parts[0] != TOOL_PREFIX {
            return Err(UrnError::invalid(format!(
                "not a tools urn: expected {TOOL_PREFIX:?} prefix, got {:?}",
                parts[0]
            )));
        }

        let urn = Self::from_segments(
            parts[1].to_string(),
            parts[2].to_string(),
            parts[3].to_string(),
        );
        urn.validate()?;
        Ok(urn)
    }

    /// The cached validation outcome.
    pub fn validate(&self) -> UrnResult<()> {
        self.validation.clone()
    }

    pub fn is_zero(&self) -> bool {
        self.kind.is_empty() && self.source.is_empty() && self.name.is_empty()
    }

    pub fn kind(&self) -> UrnResult<ToolKind> {
        self.validate()?;
        ToolKind::parse(&self.kind)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn canonical(&self) -> String {
        format!("{TOOL_PREFIX}:{}:{}:{}", self.kind, self.source, self.name)
    }

    fn encode(&self) -> UrnResult<String> {
        self.validate()?;
        Ok(self.canonical())
    }
}

fn validate_parts(kind: &str, source: &str, name: &str) -> UrnResult<()> {
    ToolKind::parse(kind)?;
    validate_segment("source", source)?;
    validate_segment("name", name)?;
    Ok(())
}

impl PartialEq for ToolUrn {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.source == other.source && self.name == other.name
    }
}

impl Eq for ToolUrn {}

impl Hash for ToolUrn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.source.hash(state);
        self.name.hash(state);
    }
}

/// Renders the canonical concatenation even for invalid URNs; encoders
/// reject instead.
impl fmt::Display for ToolUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for ToolUrn {
    type Err = UrnError;

    fn from_str(s: &str) -> UrnResult<Self> {
        Self::parse(s)
    }
}

impl Serialize for ToolUrn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let s = self.encode().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&s)
    }
}

impl<'de> Deserialize<'de> for ToolUrn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}

impl ToSql for ToolUrn {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let s = self
            .encode()
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        Ok(ToSqlOutput::from(s))
    }
}

impl FromSql for ToolUrn {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Self::parse(s).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}
