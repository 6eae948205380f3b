//! Core data model for the Concord protocol
//!
//! Records are addressed by a content-owner identifier (CCID) plus the FQDN
//! of whichever host currently serves them; the host is *not* part of an
//! object's identity (entities can migrate hosts).
//!
//! Messages and associations carry their payload twice: `rawpayload` is the
//! exact signed byte string as transmitted, `payload` is the parsed
//! convenience view. The signature was computed over `rawpayload`, so the
//! parsed view must never be re-signed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ApiError, Result};

pub(crate) mod wire;

// =============================================================================
// Identifiers
// =============================================================================

/// Content-owner identifier; stable identity independent of hosting domain
pub type Ccid = String;

/// The current host serving an entity's objects
pub type Fqdn = String;

pub type MessageId = String;
pub type AssociationId = String;
pub type CharacterId = String;

/// Stream identifier; when referenced externally, often composite `key@host`
pub type StreamId = String;

/// Opaque host-issued certificate attached to an entity
pub type Certificate = Value;

// =============================================================================
// Signed objects
// =============================================================================

/// Kind discriminator of a signed object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Message,
    Association,
    Character,
    Stream,
}

/// Metadata attached to every signed object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Client identifier of the writing application
    #[serde(default)]
    pub client: String,
}

/// The canonical envelope that gets serialized and signed.
///
/// `schema` is a versioned URI-like string identifying the body's shape;
/// unknown schemas round-trip opaquely as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedObject<B = Value> {
    pub signer: Ccid,

    #[serde(rename = "type")]
    pub object_kind: ObjectKind,

    pub schema: String,

    pub body: B,

    pub meta: ObjectMeta,

    /// RFC3339 signing timestamp
    #[serde(rename = "signedAt")]
    pub signed_at: String,

    /// Target object id, set for associations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Stream role grants, set for streams
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<Vec<Ccid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writer: Option<Vec<Ccid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reader: Option<Vec<Ccid>>,
}

impl SignedObject<Value> {
    /// Decode the opaque body into a typed schema body.
    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| ApiError::Decode(format!("body of schema {}: {}", self.schema, e)))
    }
}

// =============================================================================
// Records
// =============================================================================

/// The authoritative record of where a CCID currently lives.
///
/// Immutable snapshot per fetch; may go stale if the entity migrates hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    #[serde(default)]
    pub ccid: Ccid,

    #[serde(default)]
    pub tag: String,

    /// Current authoritative host; empty when the entity is host-local only
    #[serde(default)]
    pub domain: Fqdn,

    #[serde(default)]
    pub cdate: String,

    #[serde(default)]
    pub score: i64,

    #[serde(default)]
    pub certs: Vec<Certificate>,
}

/// A signed message posted to one or more streams
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message<B = Value> {
    pub id: MessageId,
    pub author: Ccid,
    pub schema: String,

    /// Parsed view of `rawpayload`
    pub payload: SignedObject<B>,

    /// The exact signed byte string as transmitted
    pub rawpayload: String,

    #[serde(default)]
    pub signature: String,

    #[serde(default)]
    pub streams: Vec<StreamId>,

    /// Embedded associations, decoded with the same raw/parsed split
    #[serde(default)]
    pub associations: Vec<Association>,

    #[serde(default)]
    pub cdate: String,
}

/// What kind of object an association points at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    Messages,
    Characters,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Characters => "characters",
        }
    }
}

/// A signed edge from an author to a target object (reaction, reply, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association<B = Value> {
    pub id: AssociationId,
    pub author: Ccid,
    pub schema: String,

    pub payload: SignedObject<B>,
    pub rawpayload: String,

    #[serde(default)]
    pub signature: String,

    #[serde(rename = "targetID", default)]
    pub target_id: String,

    #[serde(rename = "targetType", default)]
    pub target_type: TargetType,

    #[serde(default)]
    pub cdate: String,
}

impl<B> Association<B> {
    /// Target message id, or a domain error when the association does not
    /// point at a message.
    pub fn target_message_id(&self) -> Result<&str> {
        match self.target_type {
            TargetType::Messages => Ok(&self.target_id),
            other => Err(ApiError::Domain(format!(
                "association {} targets {}, not messages",
                self.id,
                other.as_str()
            ))),
        }
    }

    /// Target character id, or a domain error when the association does not
    /// point at a character.
    pub fn target_character_id(&self) -> Result<&str> {
        match self.target_type {
            TargetType::Characters => Ok(&self.target_id),
            other => Err(ApiError::Domain(format!(
                "association {} targets {}, not characters",
                self.id,
                other.as_str()
            ))),
        }
    }
}

/// Latest-wins mutable record keyed by `(author, schema)`, e.g. a profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character<B = Value> {
    pub id: CharacterId,
    pub author: Ccid,
    pub schema: String,

    pub payload: SignedObject<B>,
    pub rawpayload: String,

    #[serde(default)]
    pub signature: String,

    #[serde(default)]
    pub cdate: String,
}

/// Access-controlled ordered channel of object references
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream<B = Value> {
    /// Composite `key@host` reference when loaded through one
    pub id: StreamId,

    pub author: Ccid,

    #[serde(default)]
    pub maintainer: Vec<Ccid>,
    #[serde(default)]
    pub writer: Vec<Ccid>,
    #[serde(default)]
    pub reader: Vec<Ccid>,

    pub schema: String,

    /// Decoded stream body
    pub payload: B,

    #[serde(default)]
    pub cdate: String,
}

/// Lightweight reference emitted by stream range queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamElement {
    pub id: String,

    /// Two dash-joined integer components forming a decimal ordering value
    pub timestamp: String,

    #[serde(default)]
    pub owner: Option<Ccid>,
}

/// Host directory record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostProfile {
    pub fqdn: Fqdn,

    #[serde(default)]
    pub ccid: Ccid,

    #[serde(default)]
    pub pubkey: String,

    #[serde(default)]
    pub cdate: String,
}

// =============================================================================
// Write responses
// =============================================================================

/// Envelope returned by mutation routes
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope<T> {
    #[serde(default)]
    pub status: String,

    pub content: T,
}

/// Minimal view of a freshly created object
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedObject {
    pub id: String,

    #[serde(default)]
    pub author: Ccid,
}

/// View of a deleted association; reveals the target whose derived counts
/// are now stale
#[derive(Debug, Clone, Deserialize)]
pub struct DeletedAssociation {
    pub id: String,

    #[serde(rename = "targetID", default)]
    pub target_id: String,

    #[serde(rename = "targetType", default)]
    pub target_type: TargetType,
}
