// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::content::{
        ContentKind, FormatError, classify, format_json, format_json_data, is_form_url_encoded,
        is_html, is_json, is_multipart, is_plain_text, is_xml,
    };
    use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
    use serde_json::json;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_is_json() {
        assert!(is_json(&headers("application/json")));
        assert!(!is_json(&headers("application/xml")));
        assert!(!is_json(&headers("text/plain")));
        // Exact match only.
        assert!(!is_json(&headers("application/json; charset=utf-8")));
    }

    #[test]
    fn test_is_xml() {
        assert!(is_xml(&headers("application/xml")));
        assert!(!is_xml(&headers("application/json")));
        assert!(!is_xml(&headers("text/plain")));
    }

    #[test]
    fn test_is_plain_text() {
        assert!(is_plain_text(&headers("text/plain")));
        assert!(is_plain_text(&HeaderMap::new()));
        assert!(!is_plain_text(&headers("application/json")));
        assert!(!is_plain_text(&headers("application/xml")));
    }

    #[test]
    fn test_is_html() {
        let cases = [
            ("text/html; charset=utf-8", true),
            ("text/html", true),
            ("application/json", false),
        ];
        for (content_type, expected) in cases {
            assert_eq!(is_html(&headers(content_type)), expected, "{content_type}");
        }
    }

    #[test]
    fn test_is_form_url_encoded() {
        let cases = [
            ("application/x-www-form-urlencoded", true),
            ("text/plain", false),
            ("application/json", false),
        ];
        for (content_type, expected) in cases {
            assert_eq!(
                is_form_url_encoded(&headers(content_type)),
                expected,
                "{content_type}"
            );
        }
    }

    #[test]
    fn test_is_multipart() {
        let cases = [
            (
                "multipart/form-data; boundary=------------------------78c4658e492de3c4",
                true,
            ),
            ("text/plain", false),
            ("application/json", false),
        ];
        for (content_type, expected) in cases {
            assert_eq!(is_multipart(&headers(content_type)), expected, "{content_type}");
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&headers("application/json")), ContentKind::Json);
        assert_eq!(classify(&HeaderMap::new()), ContentKind::PlainText);
        assert_eq!(classify(&headers("text/html; charset=utf-8")), ContentKind::Html);
        assert_eq!(classify(&headers("application/octet-stream")), ContentKind::Other);
    }

    #[test]
    fn test_format_json_data_sorts_and_indents() {
        let formatted = format_json_data(br#"{"name": "Alice","age": 25}"#).unwrap();
        assert_eq!(
            String::from_utf8(formatted).unwrap(),
            "{\n  \"age\": 25,\n  \"name\": \"Alice\"\n}"
        );
    }

    #[test]
    fn test_format_json_data_rejects_malformed_input() {
        let err = format_json_data(b"invalid JSON").unwrap_err();
        assert!(matches!(err, FormatError::Malformed(_)));
    }

    #[test]
    fn test_format_json_accepts_non_object_values() {
        let formatted = format_json(&json!([1, {"b": 2, "a": 1}])).unwrap();
        let text = String::from_utf8(formatted).unwrap();
        assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
    }

    #[test]
    fn test_format_is_idempotent() {
        let once = format_json(&json!({"z": {"y": [3, 2, 1]}, "a": null, "m": "text"})).unwrap();
        let twice = format_json_data(&once).unwrap();
        assert_eq!(once, twice);
    }
}
