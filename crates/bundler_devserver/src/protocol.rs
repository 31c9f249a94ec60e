//! The dev-server wire protocol (§6 "Dev-server wire protocol"): typed
//! messages over a persistent bidirectional channel to each connected
//! client. No teacher precedent — `good_fences` never served anything —
//! so these types follow §6's table directly; the `#[serde(tag = "type")]`
//! encoding matches how the table's `type` column reads.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Js,
    Css,
}

/// One patchable module's worth of an `update` message's `updates` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleUpdate {
    pub kind: UpdateKind,
    #[serde(rename = "chunk-id")]
    pub chunk_id: String,
    #[serde(rename = "module-ids")]
    pub module_ids: Vec<String>,
    #[serde(rename = "new-bytes")]
    pub new_bytes: String,
}

/// Server-to-client messages (§6 table, `S→C` rows).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Sent once, on session start.
    Connected { timestamp: u64 },
    /// A patchable change.
    Update { timestamp: u64, updates: Vec<ModuleUpdate> },
    /// A change that cannot be patched; the client should reload the page.
    /// Also implied by a reconnect attempt after socket closure (§6).
    FullReload { timestamp: u64 },
    /// Sent after a failed rebuild (§7 "abort the current incremental
    /// build... and broadcast an `error` message to clients").
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
        #[serde(skip_serializing_if = "Option::is_none")]
        line: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        column: Option<u32>,
    },
}

/// Client-to-server messages (§6 table, `C→S` rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    HmrAck {
        #[serde(rename = "update-timestamp")]
        update_timestamp: u64,
    },
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn connected_message_matches_wire_shape() {
        let msg = ServerMessage::Connected { timestamp: 42 };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"type": "connected", "timestamp": 42}));
    }

    #[test]
    fn update_message_uses_kebab_case_field_names() {
        let msg = ServerMessage::Update {
            timestamp: 1,
            updates: vec![ModuleUpdate {
                kind: UpdateKind::Js,
                chunk_id: "main".to_string(),
                module_ids: vec!["a".to_string()],
                new_bytes: "__define(...)".to_string(),
            }],
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "update",
                "timestamp": 1,
                "updates": [{"kind": "js", "chunk-id": "main", "module-ids": ["a"], "new-bytes": "__define(...)"}],
            })
        );
    }

    #[test]
    fn error_message_omits_absent_optional_fields() {
        let msg = ServerMessage::Error {
            message: "boom".to_string(),
            stack: None,
            file: None,
            line: None,
            column: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"type": "error", "message": "boom"}));
    }

    #[test]
    fn hmr_ack_round_trips() {
        let msg = ClientMessage::HmrAck { update_timestamp: 7 };
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, msg);
    }
}
