//! Typed schema bodies
//!
//! Wire field names follow the protocol's camelCase convention.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{urls, TypedBody};

/// Custom emoji reference used by notes and reactions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmojiRef {
    #[serde(rename = "imageURL", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(rename = "animURL", skip_serializing_if = "Option::is_none")]
    pub anim_url: Option<String>,
}

/// Plain text note
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimpleNote {
    pub body: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub emojis: HashMap<String, EmojiRef>,
}

impl TypedBody for SimpleNote {
    fn schema_url() -> String {
        urls::simple_note()
    }
}

/// Note that replies to another message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyMessage {
    pub body: String,

    #[serde(rename = "replyToMessageId")]
    pub reply_to_message_id: String,

    #[serde(rename = "replyToMessageAuthor")]
    pub reply_to_message_author: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub emojis: HashMap<String, EmojiRef>,
}

impl TypedBody for ReplyMessage {
    fn schema_url() -> String {
        urls::reply_message()
    }
}

/// Note that reroutes (boosts) another message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerouteMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(rename = "rerouteMessageId")]
    pub reroute_message_id: String,

    #[serde(rename = "rerouteMessageAuthor")]
    pub reroute_message_author: String,
}

impl TypedBody for RerouteMessage {
    fn schema_url() -> String {
        urls::reroute_message()
    }
}

/// Favorite edge; carries no data of its own
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Like {}

impl TypedBody for Like {
    fn schema_url() -> String {
        urls::like()
    }
}

/// Emoji reaction edge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmojiAssociation {
    pub shortcode: String,

    #[serde(rename = "imageUrl")]
    pub image_url: String,
}

impl TypedBody for EmojiAssociation {
    fn schema_url() -> String {
        urls::emoji_association()
    }
}

/// Edge linking a reply message back to its target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyAssociation {
    #[serde(rename = "messageId")]
    pub message_id: String,

    #[serde(rename = "messageAuthor")]
    pub message_author: String,
}

impl TypedBody for ReplyAssociation {
    fn schema_url() -> String {
        urls::reply_association()
    }
}

/// Edge linking a reroute message back to its target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerouteAssociation {
    #[serde(rename = "messageId")]
    pub message_id: String,

    #[serde(rename = "messageAuthor")]
    pub message_author: String,
}

impl TypedBody for RerouteAssociation {
    fn schema_url() -> String {
        urls::reroute_association()
    }
}

/// Acknowledgement edge from one user to another's profile
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserAck {}

impl TypedBody for UserAck {
    fn schema_url() -> String {
        urls::user_ack()
    }
}

/// Profile character body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub description: String,
    pub avatar: String,
    pub banner: String,
}

impl TypedBody for Profile {
    fn schema_url() -> String {
        urls::profile()
    }
}

/// Userstreams character body: where to deliver a user's notifications and
/// where their own posts land
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Userstreams {
    #[serde(rename = "homeStream", skip_serializing_if = "Option::is_none")]
    pub home_stream: Option<String>,

    #[serde(rename = "notificationStream", skip_serializing_if = "Option::is_none")]
    pub notification_stream: Option<String>,

    #[serde(rename = "associationStream", skip_serializing_if = "Option::is_none")]
    pub association_stream: Option<String>,
}

impl TypedBody for Userstreams {
    fn schema_url() -> String {
        urls::userstreams()
    }
}

/// Public topic stream body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommonStream {
    pub name: String,
    pub shortname: String,
    pub description: String,
}

impl TypedBody for CommonStream {
    fn schema_url() -> String {
        urls::common_stream()
    }
}

/// Empty body for home / notification / association plumbing streams
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UtilityStream {}

impl TypedBody for UtilityStream {
    fn schema_url() -> String {
        urls::utility_stream()
    }
}
