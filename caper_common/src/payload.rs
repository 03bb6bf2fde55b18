//! Form-encoded payload decoding and encoding

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::form_urlencoded;

/// Decoded submission fields keyed by name
pub type Payload = BTreeMap<String, PayloadValue>;

/// A field value; repeated keys keep every occurrence in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Single(String),
    Multiple(Vec<String>),
}

impl PayloadValue {
    /// All occurrences, in encounter order
    pub fn values(&self) -> Vec<&str> {
        match self {
            PayloadValue::Single(v) => vec![v.as_str()],
            PayloadValue::Multiple(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// Value joined with "," (how a list stringifies when written into a control)
    pub fn joined(&self) -> String {
        self.values().join(",")
    }

    /// Value joined with ", " for display
    pub fn display(&self) -> String {
        self.values().join(", ")
    }

    fn push(&mut self, value: String) {
        match self {
            PayloadValue::Single(first) => {
                *self = PayloadValue::Multiple(vec![std::mem::take(first), value]);
            }
            PayloadValue::Multiple(vs) => vs.push(value),
        }
    }
}

/// Decode a form-encoded string into a payload
///
/// `+` decodes to space, percent escapes are decoded and invalid UTF-8 is
/// replaced; malformed input yields whatever pairs could be read.
pub fn parse_payload(body: &str) -> Payload {
    let mut payload = Payload::new();

    for (key, value) in form_urlencoded::parse(body.as_bytes()) {
        match payload.get_mut(key.as_ref()) {
            Some(existing) => existing.push(value.into_owned()),
            None => {
                payload.insert(key.into_owned(), PayloadValue::Single(value.into_owned()));
            }
        }
    }

    payload
}

/// Encode key/value pairs as `key=value&key=value`
pub fn encode_pairs<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key.as_ref(), value.as_ref());
    }
    serializer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(v: &str) -> PayloadValue {
        PayloadValue::Single(v.to_string())
    }

    #[test]
    fn test_repeated_keys_become_lists() {
        let payload = parse_payload("a=1&a=2&b=x");

        assert_eq!(payload.len(), 2);
        assert_eq!(
            payload["a"],
            PayloadValue::Multiple(vec!["1".to_string(), "2".to_string()])
        );
        assert_eq!(payload["b"], single("x"));
    }

    #[test]
    fn test_third_occurrence_appends() {
        let payload = parse_payload("a=1&a=2&a=3");
        assert_eq!(payload["a"].values(), vec!["1", "2", "3"]);
        assert_eq!(payload["a"].joined(), "1,2,3");
    }

    #[test]
    fn test_empty_body_is_empty_payload() {
        assert!(parse_payload("").is_empty());
    }

    #[test]
    fn test_decodes_escapes_and_plus() {
        let payload = parse_payload(
            "_token=t&iip_lesson_record_date=04%2F01%2F2025&iip_lesson_record_description=Hello+there",
        );

        assert_eq!(payload["_token"], single("t"));
        assert_eq!(payload["iip_lesson_record_date"], single("04/01/2025"));
        assert_eq!(payload["iip_lesson_record_description"], single("Hello there"));
    }

    #[test]
    fn test_malformed_input_is_best_effort() {
        let payload = parse_payload("a=%ZZ&&=novalue&b&c=%E0%A4");

        assert_eq!(payload["a"], single("%ZZ"));
        assert_eq!(payload["b"], single(""));
        assert_eq!(payload[""], single("novalue"));
        assert!(payload.contains_key("c"));
    }

    #[test]
    fn test_encode_pairs_matches_form_encoding() {
        let body = encode_pairs([("date", "04/01/2025"), ("text", "a b&c")]);
        assert_eq!(body, "date=04%2F01%2F2025&text=a+b%26c");
        assert_eq!(parse_payload(&body)["text"], single("a b&c"));
    }
}
