use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum ClientMessage {
    Spawn { key: String, x: f64, y: f64 },
    Reset,
}

/// Decodes one inbound text frame. `None` means the frame is dropped: the
/// connection stays open and nothing is sent back.
pub fn parse_client_message(raw: &str) -> Option<ClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "spawn" => {
            let key = object.get("key")?.as_str()?.trim();
            if key.is_empty() {
                return None;
            }
            let x = parse_coordinate(object.get("x"))?;
            let y = parse_coordinate(object.get("y"))?;
            Some(ClientMessage::Spawn {
                key: key.to_string(),
                x,
                y,
            })
        }
        "reset" => Some(ClientMessage::Reset),
        _ => None,
    }
}

fn parse_coordinate(value: Option<&Value>) -> Option<f64> {
    let number = value?.as_f64()?;
    number.is_finite().then_some(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_spawn_message() {
        let parsed = parse_client_message(r#"{"type":"spawn","key":"murzik","x":3.5,"y":24}"#)
            .expect("spawn message should parse");
        assert_eq!(
            parsed,
            ClientMessage::Spawn {
                key: "murzik".to_string(),
                x: 3.5,
                y: 24.0,
            }
        );
    }

    #[test]
    fn parse_reset_ignores_extra_fields() {
        let parsed = parse_client_message(r#"{"type":"reset","please":true}"#);
        assert_eq!(parsed, Some(ClientMessage::Reset));
    }

    #[test]
    fn spawn_requires_key_and_numeric_coordinates() {
        assert!(parse_client_message(r#"{"type":"spawn","x":1,"y":2}"#).is_none());
        assert!(parse_client_message(r#"{"type":"spawn","key":"","x":1,"y":2}"#).is_none());
        assert!(parse_client_message(r#"{"type":"spawn","key":7,"x":1,"y":2}"#).is_none());
        assert!(parse_client_message(r#"{"type":"spawn","key":"a","x":"1","y":2}"#).is_none());
        assert!(parse_client_message(r#"{"type":"spawn","key":"a","x":1}"#).is_none());
    }

    #[test]
    fn unknown_and_malformed_frames_are_dropped() {
        assert!(parse_client_message("not json").is_none());
        assert!(parse_client_message("[1,2,3]").is_none());
        assert!(parse_client_message(r#"{"key":"a"}"#).is_none());
        assert!(parse_client_message(r#"{"type":"emote"}"#).is_none());
        assert!(parse_client_message(r#"{"type":3}"#).is_none());
    }
}
