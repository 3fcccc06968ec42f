//! URN identity scheme for toolgate.
//!
//! Every tool and resource in the catalog is addressed by a four-segment,
//! colon-delimited URN that survives schema migrations of the surrounding
//! store:
//!
//! ```text
//! tools:<kind>:<source>:<name>
//! resources:<kind>:<source>:<slugified_uri>
//! ```
//!
//! URNs are plain strings on the wire and in storage (JSON, text, SQL TEXT),
//! and typed values in code. Validation runs once at construction and the
//! outcome is cached on the value, so repeated marshal/compare calls never
//! re-run the pattern check.
//!
//! The crate also owns the tool-name sanitizer ([`name::sanitize`]) and the
//! URI slugifier ([`slug::uri_to_slug`]) that keep externally visible names
//! inside the URN character set.

mod error;
pub mod name;
mod resource;
pub mod slug;
mod tool;

pub use error::{UrnError, UrnResult};
pub use name::{legacy_sanitize, sanitize, SanitizedName, PROXY_DELIMITER};
pub use resource::{ResourceKind, ResourceUrn};
pub use slug::uri_to_slug;
pub use tool::{ToolKind, ToolUrn};
