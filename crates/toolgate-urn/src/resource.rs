//! Resource URNs: `resources:<kind>:<source>:<slugified_uri>`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{UrnError, UrnResult};
use crate::slug::{uri_to_slug, validate_segment};

/// Leading discriminator of every resource URN.
pub const RESOURCE_PREFIX: &str = "resources";

/// The kind segment of a resource URN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Function,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
        }
    }

    fn parse(s: &str) -> UrnResult<Self> {
        match s {
            "function" => Ok(Self::Function),
            other => Err(UrnError::invalid(format!("unknown resource kind: {other:?}"))),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource URN. Same validation-cache behavior as
/// [`crate::ToolUrn`]; the name segment is a slugified URI.
#[derive(Debug, Clone)]
pub struct ResourceUrn {
    kind: String,
    source: String,
    slug: String,
    validation: Result<(), UrnError>,
}

impl ResourceUrn {
    pub fn new(kind: ResourceKind, source: impl Into<String>, slug: impl Into<String>) -> Self {
        Self::from_segments(kind.as_str().to_string(), source.into(), slug.into())
    }

    /// Build a resource URN from a raw URI, slugifying it first.
    pub fn from_uri(kind: ResourceKind, source: impl Into<String>, uri: &str) -> UrnResult<Self> {
        let slug = uri_to_slug(uri);
        if slug.is_empty() {
            return Err(UrnError::invalid(format!(
                "uri produces an empty slug: {uri:?}"
            )));
        }

        let urn = Self::new(kind, source, slug);
        urn.validate()?;
        Ok(urn)
    }

    pub fn zero() -> Self {
        Self::from_segments(String::new(), String::new(), String::new())
    }

    fn from_segments(kind: String, source: String, slug: String) -> Self {
        let validation = validate_parts(&kind, &source, &slug);
        Self { kind, source, slug, validation }
    }

    pub fn parse(s: &str) -> UrnResult<Self> {
        if s.is_empty() {
            return Err(UrnError::invalid("empty resources urn"));
        }

        let parts: Vec<&str> = s.splitn(4, ':').collect();
        if parts.len() != 4 {
            return Err(UrnError::invalid(format!(
                "resources urn must have 4 segments, got {}: {s:?}",
                parts.len()
            )));
        }

        if parts[0] != RESOURCE_PREFIX {
            return Err(UrnError::invalid(format!(
                "not a resources urn: expected {RESOURCE_PREFIX:?} prefix, got {:?}",
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

    pub fn validate(&self) -> UrnResult<()> {
        self.validation.clone()
    }

    pub fn is_zero(&self) -> bool {
        self.kind.is_empty() && self.source.is_empty() && self.slug.is_empty()
    }

    pub fn kind(&self) -> UrnResult<ResourceKind> {
        self.validate()?;
        ResourceKind::parse(&self.kind)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    fn canonical(&self) -> String {
        format!("{RESOURCE_PREFIX}:{}:{}:{}", self.kind, self.source, self.slug)
    }

    fn encode(&self) -> UrnResult<String> {
        self.validate()?;
        Ok(self.canonical())
    }
}

fn validate_parts(kind: &str, source: &str, slug: &str) -> UrnResult<()> {
    ResourceKind::parse(kind)?;
    validate_segment("source", source)?;
    validate_segment("slugified uri", slug)?;
    Ok(())
}

impl PartialEq for ResourceUrn {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.source == other.source && self.slug == other.slug
    }
}

impl Eq for ResourceUrn {}

impl Hash for ResourceUrn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.source.hash(state);
        self.slug.hash(state);
    }
}

impl fmt::Display for ResourceUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl FromStr for ResourceUrn {
    type Err = UrnError;

    fn from_str(s: &str) -> UrnResult<Self> {
        Self::parse(s)
    }
}

impl Serialize for ResourceUrn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let s = self.encode().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&s)
    }
}

impl<'de> Deserialize<'de> for ResourceUrn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(D::Error::custom)
    }
}

impl ToSql for ResourceUrn {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let s = self
            .encode()
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        Ok(ToSqlOutput::from(s))
    }
}

impl FromSql for ResourceUrn {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Self::parse(s).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_uri_round_trip() {
        let urn =
            ResourceUrn::from_uri(ResourceKind::Function, "docs", "file:///project/src/main.rs")
                .unwrap();
        assert_eq!(urn.to_string(), "resources:function:docs:file-project-src-main-rs");

        let parsed = ResourceUrn::parse(&urn.to_string()).unwrap();
        assert_eq!(parsed, urn);
        assert_eq!(parsed.kind().unwrap(), ResourceKind::Function);
        assert_eq!(parsed.slug(), "file-project-src-main-rs");
    }

    #[test]
    fn test_from_uri_templated_path() {
        let urn = ResourceUrn::from_uri(
            ResourceKind::Function,
            "users-api",
            "https://api.example.com/users/{id}",
        )
        .unwrap();
        assert_eq!(urn.slug(), "https-api-example-com-users-id");
    }

    #[test]
    fn test_from_uri_empty_inputs() {
        assert!(ResourceUrn::from_uri(ResourceKind::Function, "src", "").is_err());
        assert!(ResourceUrn::from_uri(ResourceKind::Function, "src", "???").is_err());
    }

    #[test]
    fn test_parse_rejects_tool_prefix() {
        let err = ResourceUrn::parse("tools:function:docs:file-a").unwrap_err();
        assert!(err.to_string().contains("resources urn"));
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        assert!(ResourceUrn::parse("resources:http:docs:file-a").is_err());
    }

    #[test]
    fn test_zero() {
        let zero = ResourceUrn::zero();
        assert!(zero.is_zero());
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let urn = ResourceUrn::new(ResourceKind::Function, "docs", "readme-md");
        let json = serde_json::to_string(&urn).unwrap();
        assert_eq!(json, "\"resources:function:docs:readme-md\"");
        let back: ResourceUrn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, urn);
    }
}
