//! Wire-format decoding
//!
//! Hosts embed signed payloads as JSON *strings* (the signature covers
//! exactly those bytes). Decoding keeps the original string as `rawpayload`
//! and parses it into the structured `payload` view; a response that lacks
//! the payload field entirely is "not found", while a payload that is present
//! but unparseable is a decode error.

use serde::Deserialize;
use serde_json::Value;

use crate::types::{ApiError, Result};

use super::{
    Association, Ccid, Character, Message, SignedObject, Stream, StreamId,
};

#[derive(Debug, Deserialize)]
pub(crate) struct WireMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub author: Ccid,
    #[serde(default)]
    pub schema: String,
    pub payload: Option<String>,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub streams: Vec<StreamId>,
    #[serde(default)]
    pub associations: Vec<WireAssociation>,
    #[serde(default)]
    pub cdate: String,
}

impl WireMessage {
    pub(crate) fn into_message(self) -> Result<Option<Message>> {
        let Some(raw) = self.payload else {
            return Ok(None);
        };

        let payload = parse_signed(&raw)?;

        let mut associations = Vec::with_capacity(self.associations.len());
        for wire in self.associations {
            if let Some(association) = wire.into_association()? {
                associations.push(association);
            }
        }

        Ok(Some(Message {
            id: self.id,
            author: self.author,
            schema: self.schema,
            payload,
            rawpayload: raw,
            signature: self.signature,
            streams: self.streams,
            associations,
            cdate: self.cdate,
        }))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireAssociation {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub author: Ccid,
    #[serde(default)]
    pub schema: String,
    pub payload: Option<String>,
    #[serde(default)]
    pub signature: String,
    #[serde(rename = "targetID", default)]
    pub target_id: String,
    #[serde(rename = "targetType", default)]
    pub target_type: super::TargetType,
    #[serde(default)]
    pub cdate: String,
}

impl WireAssociation {
    pub(crate) fn into_association(self) -> Result<Option<Association>> {
        let Some(raw) = self.payload else {
            return Ok(None);
        };

        let payload = parse_signed(&raw)?;

        Ok(Some(Association {
            id: self.id,
            author: self.author,
            schema: self.schema,
            payload,
            rawpayload: raw,
            signature: self.signature,
            target_id: self.target_id,
            target_type: self.target_type,
            cdate: self.cdate,
        }))
    }
}

/// Association read responses wrap the record
#[derive(Debug, Deserialize)]
pub(crate) struct WireAssociationEnvelope {
    pub association: Option<WireAssociation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireCharacter {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub author: Ccid,
    #[serde(default)]
    pub schema: String,
    pub payload: Option<String>,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub cdate: String,
}

impl WireCharacter {
    pub(crate) fn into_character(self) -> Result<Option<Character>> {
        let Some(raw) = self.payload else {
            return Ok(None);
        };

        let payload = parse_signed(&raw)?;

        Ok(Some(Character {
            id: self.id,
            author: self.author,
            schema: self.schema,
            payload,
            rawpayload: raw,
            signature: self.signature,
            cdate: self.cdate,
        }))
    }
}

/// Character query responses carry a list; latest-wins means the first entry
#[derive(Debug, Deserialize)]
pub(crate) struct WireCharacterList {
    #[serde(default)]
    pub characters: Vec<WireCharacter>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireStream {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub author: Ccid,
    #[serde(default)]
    pub maintainer: Vec<Ccid>,
    #[serde(default)]
    pub writer: Vec<Ccid>,
    #[serde(default)]
    pub reader: Vec<Ccid>,
    #[serde(default)]
    pub schema: String,
    pub payload: Option<String>,
    #[serde(default)]
    pub cdate: String,
}

impl WireStream {
    /// Decode, overriding the id with the composite reference the caller
    /// addressed the stream by (so cache keys and ids agree).
    pub(crate) fn into_stream(self, reference: Option<&str>) -> Result<Option<Stream>> {
        let Some(raw) = self.payload else {
            return Ok(None);
        };

        let signed = parse_signed(&raw)?;

        Ok(Some(Stream {
            id: reference.map(str::to_string).unwrap_or(self.id),
            author: self.author,
            maintainer: self.maintainer,
            writer: self.writer,
            reader: self.reader,
            schema: self.schema,
            payload: signed.body,
            cdate: self.cdate,
        }))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireKv {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireTokenGrant {
    pub jwt: String,
}

fn parse_signed(raw: &str) -> Result<SignedObject<Value>> {
    serde_json::from_str(raw).map_err(|e| ApiError::Decode(format!("signed payload: {}", e)))
}
