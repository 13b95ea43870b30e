//! Private-channel authorization for the realtime client.
//!
//! The signature is `hex(HMAC-SHA256(secret, "<socket_id>:<channel_name>"))`,
//! returned as `"<app_key>:<signature>"`.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const USER_PREFIX: &str = "private-user-";
const CHAT_PREFIX: &str = "private-chat-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    User(Uuid),
    Chat(Uuid),
}

impl Channel {
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(id) = name.strip_prefix(USER_PREFIX) {
            return Uuid::parse_str(id).ok().map(Channel::User);
        }
        if let Some(id) = name.strip_prefix(CHAT_PREFIX) {
            return Uuid::parse_str(id).ok().map(Channel::Chat);
        }
        None
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::User(id) => write!(f, "{USER_PREFIX}{id}"),
            Channel::Chat(id) => write!(f, "{CHAT_PREFIX}{id}"),
        }
    }
}

/// Socket ids look like `1234.5678`.
pub fn valid_socket_id(socket_id: &str) -> bool {
    match socket_id.split_once('.') {
        Some((a, b)) => {
            !a.is_empty()
                && !b.is_empty()
                && a.bytes().all(|c| c.is_ascii_digit())
                && b.bytes().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

pub fn sign(key: &str, secret: &str, socket_id: &str, channel: &str) -> anyhow::Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("realtime hmac key: {e}"))?;
    mac.update(format!("{socket_id}:{channel}").as_bytes());
    let sig = hex::encode(mac.finalize().into_bytes());
    Ok(format!("{key}:{sig}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_channels() {
        let id = Uuid::new_v4();
        assert_eq!(Channel::parse(&Channel::User(id).to_string()), Some(Channel::User(id)));
        assert_eq!(Channel::parse(&Channel::Chat(id).to_string()), Some(Channel::Chat(id)));
        assert_eq!(Channel::parse("presence-lobby"), None);
        assert_eq!(Channel::parse("private-user-not-a-uuid"), None);
    }

    #[test]
    fn socket_id_format() {
        assert!(valid_socket_id("123.456"));
        assert!(!valid_socket_id("123"));
        assert!(!valid_socket_id("12a.456"));
        assert!(!valid_socket_id(".456"));
    }

    #[test]
    fn signature_matches_reference() {
        // Reference values from the channel-auth protocol documentation.
        let auth = sign(
            "278d425bdf160c739803",
            "7ad3773142a6692b25b8",
            "1234.1234",
            "private-foobar",
        )
        .unwrap();
        assert_eq!(
            auth,
            "278d425bdf160c739803:58df8b0c36d6982b82c3ecf6b4662e34fe8c25bba48f5369f135bf843651c3a4"
        );
    }
}
