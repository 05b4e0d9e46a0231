//! Messages from the settings surface
//!
//! The settings surface sends a complete replacement [`Settings`] object; the
//! content engine answers with an [`Ack`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::config::Settings;

/// Message type tag for a settings replacement.
pub const SETTINGS_UPDATED: &str = "settingsUpdated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "camelCase")]
#[ts(export)]
pub enum RuntimeMessage {
    SettingsUpdated { settings: Settings },
}

/// Reply to a handled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Ack {
    pub success: bool,
}

/// Parse a raw runtime message. Messages of other types are not ours and
/// yield `Ok(None)`.
pub fn parse_message(raw: &str) -> Result<Option<RuntimeMessage>, serde_json::Error> {
    let value: Value = serde_json::from_str(raw)?;
    match value.get("type").and_then(Value::as_str) {
        Some(SETTINGS_UPDATED) => serde_json::from_value(value).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings_updated() {
        let raw = r#"{"type":"settingsUpdated","settings":{"minViews":0,"hideShorts":false}}"#;
        let Some(RuntimeMessage::SettingsUpdated { settings }) = parse_message(raw).unwrap() else {
            panic!("expected settings message");
        };
        assert_eq!(settings.min_views, 0);
        assert!(!settings.hide_shorts);
        assert_eq!(settings.min_duration, 120);
    }

    #[test]
    fn test_foreign_messages_ignored() {
        assert_eq!(parse_message(r#"{"type":"ping"}"#).unwrap(), None);
        assert_eq!(parse_message(r#"{"hello":1}"#).unwrap(), None);
    }

    #[test]
    fn test_malformed_messages() {
        assert!(parse_message("not json").is_err());
        assert!(parse_message(r#"{"type":"settingsUpdated","settings":{"minViews":-5}}"#).is_err());
    }

    #[test]
    fn test_ack_wire_form() {
        assert_eq!(serde_json::to_string(&Ack { success: true }).unwrap(), r#"{"success":true}"#);
    }
}
