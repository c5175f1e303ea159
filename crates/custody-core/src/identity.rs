//! # Identity Newtypes
//!
//! Domain-primitive newtypes for identifiers throughout the custody engine.
//! Each identifier is a distinct type; you cannot pass an [`EntryId`] where
//! a [`CaseId`] is expected.
//!
//! ## Kinds of identifier
//!
//! - [`Principal`]: an externally authenticated caller identity. The engine
//!   never authenticates; it only compares principals against the roles fixed
//!   at construction.
//! - [`EntryId`] / [`CaseId`]: sequential identifiers allocated by the owning
//!   component from its own [`IdSequence`]. The first id is `1`.
//! - [`LedgerId`] / [`AuthorityId`]: UUID-based component identities used by
//!   the capability checks between the ledger and the authority.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// An opaque, externally authenticated caller identity.
///
/// # Validation
///
/// - Must be non-empty
/// - Must not contain whitespace or control characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Principal(String);

impl Principal {
    /// Create a principal from a string, validating format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPrincipal`] if the string is empty
    /// or contains whitespace/control characters.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValidationError::InvalidPrincipal(s));
        }
        Ok(Self(s))
    }

    /// Access the principal string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Principal {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Principal> for String {
    fn from(p: Principal) -> Self {
        p.0
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Principal {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// Sequential identifiers
// ---------------------------------------------------------------------------

/// A per-component monotonically increasing counter.
///
/// Starts at `1`; ids are never reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSequence {
    next: u64,
}

impl IdSequence {
    /// Create a sequence whose first allocation is `1`.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate the next id.
    pub fn allocate(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The id the next allocation will return.
    pub fn peek(&self) -> u64 {
        self.next
    }
}

impl Default for IdSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Sequential identifier of an escrow entry within one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(u64);

impl EntryId {
    /// Wrap a raw sequential value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw sequential value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entry:{}", self.0)
    }
}

/// Sequential identifier of an arbitration case within one authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaseId(u64);

impl CaseId {
    /// Wrap a raw sequential value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw sequential value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "case:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Component identities (UUID-based, always valid by construction)
// ---------------------------------------------------------------------------

/// Identity of one escrow ledger instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerId(Uuid);

impl LedgerId {
    /// Create a new random ledger identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LedgerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LedgerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ledger:{}", self.0)
    }
}

/// Identity of one arbitration authority instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthorityId(Uuid);

impl AuthorityId {
    /// Create a new random authority identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AuthorityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AuthorityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "authority:{}", self.0)
    }
}
