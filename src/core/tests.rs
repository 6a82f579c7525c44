// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests {
    use crate::core::{
        ComposedResponse, HttpMethod, InboundRequest, REQUEST_INFO_HEADER, UPSTREAMS_HEADER,
    };
    use reqwest::header::{HeaderName, HeaderValue};
    use reqwest::{Method, StatusCode};
    use std::net::SocketAddr;

    #[test]
    fn test_http_method_parse_is_case_insensitive() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("Post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("PUT".parse::<HttpMethod>().unwrap(), HttpMethod::Put);
        assert!("FETCH".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_http_method_to_string() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
        assert_eq!(HttpMethod::Options.to_string(), "OPTIONS");
        assert_eq!(HttpMethod::Connect.to_string(), "CONNECT");
    }

    #[test]
    fn test_http_method_serde() {
        let method: HttpMethod = serde_json::from_str(r#""patch""#).unwrap();
        assert_eq!(method, HttpMethod::Patch);
        assert_eq!(serde_json::to_string(&method).unwrap(), r#""PATCH""#);
        assert!(serde_json::from_str::<HttpMethod>(r#""nope""#).is_err());
    }

    #[test]
    fn test_http_method_matches() {
        assert!(HttpMethod::Get.matches(&Method::GET));
        assert!(!HttpMethod::Get.matches(&Method::POST));
        let custom = Method::from_bytes(b"PURGE").unwrap();
        assert!(!HttpMethod::Get.matches(&custom));
        assert_eq!(Method::from(HttpMethod::Put), Method::PUT);
    }

    #[test]
    fn test_inbound_request_path_strips_query() {
        let request = InboundRequest::new(Method::GET, "/test?foo=bar");
        assert_eq!(request.path(), "/test");

        let request = InboundRequest::new(Method::GET, "/plain");
        assert_eq!(request.path(), "/plain");
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut request = InboundRequest::new(Method::GET, "/");
        request.remote_addr = Some("10.0.0.1:4000".parse::<SocketAddr>().unwrap());
        assert_eq!(request.client_ip(), "10.0.0.1:4000");

        request
            .headers
            .insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        assert_eq!(request.client_ip(), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_skips_empty_forwarded_for() {
        let mut request = InboundRequest::new(Method::GET, "/");
        request
            .headers
            .insert("x-forwarded-for", HeaderValue::from_static(""));
        request.remote_addr = Some("127.0.0.1:9999".parse().unwrap());
        assert_eq!(request.client_ip(), "127.0.0.1:9999");

        let bare = InboundRequest::new(Method::GET, "/");
        assert_eq!(bare.client_ip(), "");
    }

    #[test]
    fn test_opted_in_requires_non_empty_value() {
        let mut request = InboundRequest::new(Method::GET, "/");
        assert!(!request.opted_in(REQUEST_INFO_HEADER));

        request
            .headers
            .insert(REQUEST_INFO_HEADER, HeaderValue::from_static(""));
        assert!(!request.opted_in(REQUEST_INFO_HEADER));

        request
            .headers
            .insert(REQUEST_INFO_HEADER, HeaderValue::from_static("1"));
        assert!(request.opted_in(REQUEST_INFO_HEADER));
        assert!(!request.opted_in(UPSTREAMS_HEADER));
    }

    #[test]
    fn test_opted_in_is_case_insensitive() {
        let mut request = InboundRequest::new(Method::GET, "/");
        let name = HeaderName::from_bytes(b"X-Mirage-Add-Upstreams-In-Response").unwrap();
        request.headers.insert(name, HeaderValue::from_static("yes"));
        assert!(request.opted_in(UPSTREAMS_HEADER));
    }

    #[test]
    fn test_composed_response_helpers() {
        let response = ComposedResponse::method_not_allowed();
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.body.is_empty());
        assert!(response.headers.is_empty());

        assert_eq!(ComposedResponse::not_found().status, StatusCode::NOT_FOUND);
    }
}
