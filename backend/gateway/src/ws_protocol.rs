//! Messages exchanged over the live-update WebSocket.

use serde::{Deserialize, Serialize};

use voxledger_core::AccountingRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Server -> Client: full snapshot of every known record
    VoiceUpdate { data: Vec<AccountingRecord> },
    /// Client -> Server: keepalive
    Ping,
    /// Server -> Client: keepalive response
    Pong,
    /// Server -> Client: the feed could not be served
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxledger_core::Presentation;

    #[test]
    fn test_voice_update_wire_shape() {
        let rec = AccountingRecord::new("7".into(), &Presentation::named("ada"));
        let json = serde_json::to_value(WsMessage::VoiceUpdate { data: vec![rec] }).unwrap();
        assert_eq!(json["type"], "voice_update");
        assert_eq!(json["data"][0]["subject_id"], "7");
        assert_eq!(json["data"][0]["display_name"], "ada");
    }

    #[test]
    fn test_parse_ping() {
        let msg: WsMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, WsMessage::Ping));
        assert!(serde_json::from_str::<WsMessage>(r#"{"type":"shout"}"#).is_err());
    }
}
