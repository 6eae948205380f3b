//! Schema registry
//!
//! Every signed object names its body's shape with a versioned, URI-like
//! schema string. Known schemas map to typed bodies in [`bodies`]; anything
//! else round-trips opaquely as JSON.

use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod bodies;

// =============================================================================
// Schema URLs
// =============================================================================

const BASE: &str = "https://schema.concordproto.org";

pub mod urls {
    use super::BASE;

    macro_rules! schema_url {
        ($name:ident, $path:literal) => {
            pub fn $name() -> String {
                format!("{}{}", BASE, $path)
            }
        };
    }

    schema_url!(simple_note, "/messages/simplenote/0.0.1.json");
    schema_url!(reply_message, "/messages/reply/0.0.1.json");
    schema_url!(reroute_message, "/messages/reroute/0.0.1.json");
    schema_url!(like, "/associations/like/0.0.1.json");
    schema_url!(emoji_association, "/associations/emoji/0.0.1.json");
    schema_url!(reply_association, "/associations/reply/0.0.1.json");
    schema_url!(reroute_association, "/associations/reroute/0.0.1.json");
    schema_url!(user_ack, "/associations/userack/0.0.1.json");
    schema_url!(profile, "/characters/profile/0.0.1.json");
    schema_url!(userstreams, "/characters/userstreams/0.0.1.json");
    schema_url!(common_stream, "/streams/common/0.0.1.json");
    schema_url!(utility_stream, "/streams/utility/0.0.1.json");
}

// =============================================================================
// Registry
// =============================================================================

/// Schemas this client ships typed bodies for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownSchema {
    SimpleNote,
    ReplyMessage,
    RerouteMessage,
    Like,
    EmojiAssociation,
    ReplyAssociation,
    RerouteAssociation,
    UserAck,
    Profile,
    Userstreams,
    CommonStream,
    UtilityStream,
}

/// Classify a schema URL; `None` means the body stays opaque JSON.
pub fn classify(url: &str) -> Option<KnownSchema> {
    let known = [
        (urls::simple_note(), KnownSchema::SimpleNote),
        (urls::reply_message(), KnownSchema::ReplyMessage),
        (urls::reroute_message(), KnownSchema::RerouteMessage),
        (urls::like(), KnownSchema::Like),
        (urls::emoji_association(), KnownSchema::EmojiAssociation),
        (urls::reply_association(), KnownSchema::ReplyAssociation),
        (urls::reroute_association(), KnownSchema::RerouteAssociation),
        (urls::user_ack(), KnownSchema::UserAck),
        (urls::profile(), KnownSchema::Profile),
        (urls::userstreams(), KnownSchema::Userstreams),
        (urls::common_stream(), KnownSchema::CommonStream),
        (urls::utility_stream(), KnownSchema::UtilityStream),
    ];

    known
        .into_iter()
        .find_map(|(candidate, schema)| (candidate == url).then_some(schema))
}

/// A typed schema body that knows its own schema URL
pub trait TypedBody: Serialize + DeserializeOwned {
    fn schema_url() -> String;
}
