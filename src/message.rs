use crate::util::http::HeaderMap;

/// A hub message: an opaque byte body plus an ordered list of string
/// properties. Duplicate property keys are allowed and insertion order is
/// preserved, as both drive the serialized request shape.
///
/// Callers build messages for sends; the client builds them from response
/// bodies for receives, filling the optional fields below from specific
/// response headers (never from the body).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    body: Vec<u8>,
    properties: Vec<(String, String)>,

    pub message_id: Option<String>,
    pub to: Option<String>,
    pub expiry_time_utc: Option<String>,
    pub correlation_id: Option<String>,
    pub lock_token: Option<String>,
}

impl Message {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_property(key, value);
        self
    }

    pub fn add_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.push((key.into(), value.into()));
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as UTF-8 text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Fill the optional fields from response headers.
    ///
    /// The mapping is a fixed table over lowercase header names; [HeaderMap]
    /// keys are already lowercase, which is what makes the lookup
    /// case-insensitive. An `etag` value has one surrounding pair of quotes
    /// stripped before becoming the lock token.
    pub(crate) fn apply_headers(&mut self, headers: &HeaderMap) {
        for (name, value) in headers {
            let Ok(value) = value.to_str() else {
                continue;
            };
            match name.as_str() {
                "iothub-messageid" => self.message_id = Some(value.to_string()),
                "iothub-to" => self.to = Some(value.to_string()),
                "iothub-expiry" => self.expiry_time_utc = Some(value.to_string()),
                "iothub-correlationid" => self.correlation_id = Some(value.to_string()),
                "etag" => self.lock_token = Some(strip_etag_quotes(value).to_string()),
                _ => {}
            }
        }
    }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

fn strip_etag_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_from(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(
                http::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                value.parse().unwrap(),
            );
        }
        headers
    }

    #[test]
    fn it_preserves_property_order_and_duplicates() {
        let message = Message::new("x")
            .with_property("a", "1")
            .with_property("b", "2")
            .with_property("a", "3");
        assert_eq!(
            message.properties(),
            &[
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn it_maps_hub_headers_onto_message_fields() {
        let mut message = Message::new("hello");
        message.apply_headers(&headers_from(&[
            ("iothub-messageid", "m1"),
            ("iothub-to", "/devices/dev1/messages/devicebound"),
            ("iothub-expiry", "2026-01-01T00:00:00Z"),
            ("iothub-correlationid", "c1"),
            ("etag", "\"abc\""),
        ]));

        assert_eq!(message.message_id.as_deref(), Some("m1"));
        assert_eq!(
            message.to.as_deref(),
            Some("/devices/dev1/messages/devicebound")
        );
        assert_eq!(
            message.expiry_time_utc.as_deref(),
            Some("2026-01-01T00:00:00Z")
        );
        assert_eq!(message.correlation_id.as_deref(), Some("c1"));
        assert_eq!(message.lock_token.as_deref(), Some("abc"));
        assert_eq!(message.text(), Some("hello"));
    }

    #[test]
    fn it_ignores_unrelated_headers() {
        let mut message = Message::new("");
        message.apply_headers(&headers_from(&[
            ("content-type", "text/plain"),
            ("iothub-something-else", "ignored"),
        ]));
        assert_eq!(message, Message::new(""));
    }

    #[test]
    fn it_keeps_an_unquoted_etag_as_is() {
        let mut message = Message::new("");
        message.apply_headers(&headers_from(&[("etag", "abc")]));
        assert_eq!(message.lock_token.as_deref(), Some("abc"));
    }
}
