//! Typed loaders and signed write operations
//!
//! One loader per entity kind. Each knows its route shape, its nested-field
//! decoding (hosts embed signed payloads as JSON strings), and its cache key.
//! Reads go through the single-flight caches; writes assemble a signed
//! object, serialize it once, sign exactly those bytes, and send the envelope
//! through the session manager.

use std::sync::Arc;

use chrono::Utc;
use ed25519_dalek::SigningKey;
use serde::Serialize;

use crate::auth::Session;
use crate::cache::SingleFlight;
use crate::config::ClientConfig;
use crate::crypto;
use crate::model::{
    Association, Character, Entity, Message, ObjectKind, ObjectMeta, SignedObject, Stream,
};
use crate::transport::{HttpTransport, Transport};
use crate::types::{ApiError, Result};

pub mod associations;
pub mod characters;
pub mod entities;
pub mod kv;
pub mod messages;
pub mod streams;

pub use streams::StreamGrants;

/// Data-access layer for one signing identity against its home host
pub struct Api {
    pub(crate) config: ClientConfig,
    pub(crate) ccid: String,
    pub(crate) signing_key: SigningKey,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) session: Session,

    pub(crate) entities: SingleFlight<Option<Entity>>,
    pub(crate) messages: SingleFlight<Option<Message>>,
    pub(crate) associations: SingleFlight<Option<Association>>,
    pub(crate) characters: SingleFlight<Option<Character>>,
    pub(crate) streams: SingleFlight<Option<Stream>>,
}

impl Api {
    /// Build an API layer over the real HTTP transport
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.request_timeout));
        Self::with_transport(config, transport)
    }

    /// Build an API layer over any transport implementation
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate().map_err(ApiError::Config)?;

        let signing_key = crypto::load_signing_key(&config.private_key)?;
        let ccid = crypto::ccid_for_key(&signing_key.verifying_key());

        let session = Session::new(
            config.host.clone(),
            ccid.clone(),
            signing_key.clone(),
            Arc::clone(&transport),
        );

        Ok(Self {
            config,
            ccid,
            signing_key,
            transport,
            session,
            entities: SingleFlight::new(),
            messages: SingleFlight::new(),
            associations: SingleFlight::new(),
            characters: SingleFlight::new(),
            streams: SingleFlight::new(),
        })
    }

    /// This identity's content-owner identifier
    pub fn ccid(&self) -> &str {
        &self.ccid
    }

    /// The user's own host
    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub(crate) fn url(&self, host: &str, path_and_query: &str) -> String {
        format!("https://{}{}{}", host, crate::API_PATH, path_and_query)
    }

    pub(crate) fn own_url(&self, path_and_query: &str) -> String {
        self.url(&self.config.host, path_and_query)
    }

    /// New signed-object envelope for this identity, stamped now
    pub(crate) fn new_signed_object<T>(&self, kind: ObjectKind, schema: &str, body: T) -> SignedObject<T> {
        SignedObject {
            signer: self.ccid.clone(),
            object_kind: kind,
            schema: schema.to_string(),
            body,
            meta: ObjectMeta {
                client: self.config.client_name.clone(),
            },
            signed_at: Utc::now().to_rfc3339(),
            target: None,
            maintainer: None,
            writer: None,
            reader: None,
        }
    }

    /// Serialize an envelope to its canonical string and sign exactly those
    /// bytes. The canonical string is what travels; it must never be
    /// re-serialized between signing and transmission.
    pub(crate) fn sign_object<T: Serialize>(&self, object: &SignedObject<T>) -> Result<(String, String)> {
        let canonical = serde_json::to_string(object)?;
        let signature = crypto::sign_payload_hex(&self.signing_key, canonical.as_bytes());
        Ok((canonical, signature))
    }
}
