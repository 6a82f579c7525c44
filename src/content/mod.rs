// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Content-type helpers.
//!
//! Pure predicates over a header set's `content-type`.  JSON, plain text,
//! XML and form bodies are matched exactly; HTML and multipart are matched
//! by prefix so trailing parameters (`charset`, `boundary`) are tolerated.

pub mod canonical;

#[cfg(test)]
mod tests;

pub use canonical::{FormatError, format_json, format_json_data};

use reqwest::header::{CONTENT_TYPE, HeaderMap};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_PLAIN_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_XML: &str = "application/xml";
pub const CONTENT_TYPE_HTML: &str = "text/html";
pub const CONTENT_TYPE_FORM_URL_ENCODED: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_MULTIPART: &str = "multipart/form-data";

/// Broad family of a body, as declared by its headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    PlainText,
    Xml,
    Html,
    FormUrlEncoded,
    Multipart,
    Other,
}

/// The first `content-type` value, or `""` when absent or not valid text.
pub fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

pub fn is_json(headers: &HeaderMap) -> bool {
    content_type(headers) == CONTENT_TYPE_JSON
}

/// Plain text, including the case where no content-type is declared.
pub fn is_plain_text(headers: &HeaderMap) -> bool {
    let ct = content_type(headers);
    ct == CONTENT_TYPE_PLAIN_TEXT || ct.is_empty()
}

pub fn is_xml(headers: &HeaderMap) -> bool {
    content_type(headers) == CONTENT_TYPE_XML
}

pub fn is_html(headers: &HeaderMap) -> bool {
    content_type(headers).starts_with(CONTENT_TYPE_HTML)
}

pub fn is_form_url_encoded(headers: &HeaderMap) -> bool {
    content_type(headers) == CONTENT_TYPE_FORM_URL_ENCODED
}

pub fn is_multipart(headers: &HeaderMap) -> bool {
    content_type(headers).starts_with(CONTENT_TYPE_MULTIPART)
}

/// Classify a header set, checking the predicates in a fixed order.
pub fn classify(headers: &HeaderMap) -> ContentKind {
    if is_json(headers) {
        ContentKind::Json
    } else if is_plain_text(headers) {
        ContentKind::PlainText
    } else if is_xml(headers) {
        ContentKind::Xml
    } else if is_html(headers) {
        ContentKind::Html
    } else if is_form_url_encoded(headers) {
        ContentKind::FormUrlEncoded
    } else if is_multipart(headers) {
        ContentKind::Multipart
    } else {
        ContentKind::Other
    }
}
