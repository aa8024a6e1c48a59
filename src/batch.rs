use base64::prelude::*;

use crate::message::Message;

/// Serialize a sequence of messages into the hub's batch body format.
///
/// The output must be byte-identical for the same input, so this is manual
/// string assembly rather than a JSON serializer: each element carries the
/// base64 body, and a `properties` object only when the message has at least
/// one property (never an empty `{}`). Property pairs appear in insertion
/// order. Keys and values are inserted verbatim; callers must avoid
/// characters that would break JSON string syntax.
pub fn encode_batch(messages: &[Message]) -> String {
    let mut body = String::from("[");

    for (index, message) in messages.iter().enumerate() {
        if index > 0 {
            body.push(',');
        }

        body.push_str("{\"body\":\"");
        body.push_str(&BASE64_STANDARD.encode(message.body()));
        body.push('"');

        if !message.properties().is_empty() {
            body.push_str(",\"properties\":{");
            for (i, (key, value)) in message.properties().iter().enumerate() {
                if i > 0 {
                    body.push(',');
                }
                body.push('"');
                body.push_str(key);
                body.push_str("\":\"");
                body.push_str(value);
                body.push('"');
            }
            body.push('}');
        }

        body.push('}');
    }

    body.push(']');
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn it_omits_properties_for_a_message_without_any() {
        let batch = encode_batch(&[Message::new("hello")]);
        assert_eq!(batch, r#"[{"body":"aGVsbG8="}]"#);
    }

    #[test]
    fn it_keeps_properties_in_declaration_order() {
        let message = Message::new("hello")
            .with_property("zebra", "1")
            .with_property("alpha", "2");
        let batch = encode_batch(&[message]);
        assert_eq!(
            batch,
            r#"[{"body":"aGVsbG8=","properties":{"zebra":"1","alpha":"2"}}]"#
        );
    }

    #[test]
    fn it_separates_batch_elements_with_commas() {
        let batch = encode_batch(&[
            Message::new("hello").with_property("k", "v"),
            Message::new("world"),
        ]);
        assert_eq!(
            batch,
            r#"[{"body":"aGVsbG8=","properties":{"k":"v"}},{"body":"d29ybGQ="}]"#
        );
    }

    #[test]
    fn it_encodes_an_empty_batch_and_empty_bodies() {
        assert_eq!(encode_batch(&[]), "[]");
        assert_eq!(encode_batch(&[Message::new("")]), r#"[{"body":""}]"#);
    }

    #[test]
    fn a_batch_round_trips_through_a_generic_json_parser() {
        let batch = encode_batch(&[
            Message::new("hello").with_property("k1", "v1").with_property("k2", "v2"),
            Message::new("world"),
        ]);

        let parsed: Value = serde_json::from_str(&batch).unwrap();
        let elements = parsed.as_array().unwrap();
        assert_eq!(elements.len(), 2);

        assert_eq!(elements[0]["body"], "aGVsbG8=");
        let properties = elements[0]["properties"].as_object().unwrap();
        assert_eq!(properties.len(), 2);
        assert_eq!(properties["k1"], "v1");
        assert_eq!(properties["k2"], "v2");

        assert_eq!(elements[1]["body"], "d29ybGQ=");
        assert!(elements[1].get("properties").is_none());
    }
}
