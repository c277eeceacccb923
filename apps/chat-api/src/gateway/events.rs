//! Gateway wire protocol: tagged event enums for both directions.
//!
//! Every frame is JSON `{"t": <event name>, "d": <payload>}`. The enums are
//! closed — an unrecognized event name fails to parse and the connection is
//! closed, rather than being silently ignored.

use serde::{Deserialize, Serialize};

use crate::models::message::PersistedMessage;
use crate::models::user::UserInfo;

/// Events a client may send. `identify` is only valid as the first frame;
/// everything else requires an authenticated session.
#[derive(Debug, Deserialize)]
#[serde(tag = "t", content = "d", rename_all = "camelCase")]
pub enum ClientEvent {
    Identify {
        #[serde(default)]
        token: Option<String>,
    },
    Heartbeat,
    Join {
        conversation_id: i64,
    },
    Leave {
        conversation_id: i64,
    },
    Typing {
        conversation_id: i64,
    },
    StopTyping {
        conversation_id: i64,
    },
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "t", content = "d", rename_all = "camelCase")]
pub enum ServerEvent {
    Ready {
        user: UserInfo,
        heartbeat_interval: u64,
    },
    HeartbeatAck,
    NewMessage(PersistedMessage),
    UserTyping {
        user_id: i64,
        username: String,
    },
    UserStoppedTyping {
        user_id: i64,
    },
    /// Per-operation failure. The connection stays open.
    Error {
        code: &'static str,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_parse_from_tagged_json() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"t":"join","d":{"conversation_id":42}}"#).unwrap();
        assert!(matches!(event, ClientEvent::Join { conversation_id: 42 }));

        let event: ClientEvent = serde_json::from_str(r#"{"t":"heartbeat"}"#).unwrap();
        assert!(matches!(event, ClientEvent::Heartbeat));

        let event: ClientEvent =
            serde_json::from_str(r#"{"t":"stopTyping","d":{"conversation_id":7}}"#).unwrap();
        assert!(matches!(event, ClientEvent::StopTyping { conversation_id: 7 }));
    }

    #[test]
    fn identify_token_may_be_absent() {
        let event: ClientEvent = serde_json::from_str(r#"{"t":"identify","d":{}}"#).unwrap();
        assert!(matches!(event, ClientEvent::Identify { token: None }));
    }

    #[test]
    fn unknown_event_name_fails_to_parse() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"t":"shrug","d":{}}"#).is_err());
    }

    #[test]
    fn server_events_serialize_with_camel_case_names() {
        let json = serde_json::to_value(ServerEvent::UserStoppedTyping { user_id: 3 }).unwrap();
        assert_eq!(json["t"], "userStoppedTyping");
        assert_eq!(json["d"]["user_id"], 3);
    }
}
