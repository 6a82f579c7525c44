// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end integration tests for Mirage

use reqwest::StatusCode;
use serde_json::{Value, json};
use serial_test::serial;
use std::env;
use wiremock::matchers::{body_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::start_mirage;

const REQUEST_INFO_HEADER: &str = "x-mirage-add-request-headers-in-response";
const UPSTREAMS_HEADER: &str = "x-mirage-add-upstreams-in-response";

async fn json_upstream(route: &str, body: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_static_text_route() {
    let mirage = start_mirage(json!({
        "routes": [{
            "name": "static",
            "method": "GET",
            "path": "/static",
            "response": {
                "headers": {"content-type": "text/plain", "x-mock": "yes"},
                "status_code": 200,
                "body": "just text"
            }
        }]
    }))
    .await;

    let response = reqwest::get(mirage.url("/static")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-mock"], "yes");
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(response.text().await.unwrap(), "just text");

    mirage.stop().await;
}

#[tokio::test]
async fn test_text_route_with_upstream_report() {
    let upstream = json_upstream("/users", json!({"name": "ada", "id": 1})).await;
    let upstream_url = format!("{}/users", upstream.uri());

    let mirage = start_mirage(json!({
        "routes": [{
            "name": "report",
            "method": "GET",
            "path": "/report",
            "upstreams": [{"url": upstream_url, "method": "GET"}],
            "response": {
                "headers": {"content-type": "text/plain"},
                "status_code": 200,
                "body": "hello",
                "include_upstream_responses": true
            }
        }]
    }))
    .await;

    let response = reqwest::Client::new()
        .get(mirage.url("/report"))
        .header("x-forwarded-for", "10.0.0.1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let expected = format!(
        "hello\n\n#####################\n#   Upstream calls  #\n#####################\n\
         \n\tGET - {upstream_url} - 200 OK\n\tFROM 10.0.0.1 \n\n\t\
         {{\n\t  \"id\": 1,\n\t  \"name\": \"ada\"\n\t}}"
    );
    assert_eq!(response.text().await.unwrap(), expected);

    mirage.stop().await;
}

#[tokio::test]
async fn test_json_route_merges_upstreams() {
    let upstream = json_upstream("/fizz", json!({"fizz": "buzz"})).await;
    let upstream_url = format!("{}/fizz", upstream.uri());

    let mirage = start_mirage(json!({
        "routes": [{
            "name": "aggregate",
            "method": "GET",
            "path": "/aggregate",
            "upstreams": [{
                "url": upstream_url,
                "method": "GET",
                "headers": {"content-type": "application/json"}
            }],
            "response": {
                "headers": {"content-type": "application/json"},
                "status_code": 200,
                "body": {"foo": "bar"},
                "include_upstream_responses": true
            }
        }]
    }))
    .await;

    let response = reqwest::get(mirage.url("/aggregate")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = response.text().await.unwrap();
    // Canonical form is indented with sorted keys
    assert!(text.starts_with("{\n  \"foo\": \"bar\",\n  \"upstreams\": ["));

    let body: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["foo"], "bar");
    assert_eq!(body["upstreams"][0]["body"], json!({"fizz": "buzz"}));
    assert_eq!(body["upstreams"][0]["url"], upstream_url);
    assert_eq!(body["upstreams"][0]["status_code"], 200);
    assert_eq!(
        body["upstreams"][0]["headers"]["content-type"],
        json!(["application/json"])
    );

    mirage.stop().await;
}

#[tokio::test]
async fn test_json_route_without_upstream_inclusion() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hidden"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"secret": true})))
        .expect(1)
        .mount(&upstream)
        .await;

    let mirage = start_mirage(json!({
        "routes": [{
            "name": "quiet",
            "method": "GET",
            "path": "/quiet",
            "upstreams": [{"url": format!("{}/hidden", upstream.uri()), "method": "GET"}],
            "response": {
                "headers": {"content-type": "application/json"},
                "body": "{\"ok\": true}"
            }
        }]
    }))
    .await;

    let body: Value = reqwest::get(mirage.url("/quiet"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"ok": true}));
    assert!(body.get("upstreams").is_none());

    mirage.stop().await;
}

#[tokio::test]
async fn test_opt_in_headers_add_sections() {
    let upstream = json_upstream("/data", json!({"n": 1})).await;

    let mirage = start_mirage(json!({
        "routes": [{
            "name": "opt-in",
            "method": "GET",
            "path": "/opt-in",
            "upstreams": [{"url": format!("{}/data", upstream.uri()), "method": "GET"}],
            "response": {
                "headers": {"content-type": "application/json"},
                "body": {}
            }
        }]
    }))
    .await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(mirage.url("/opt-in"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({}));

    let body: Value = client
        .get(mirage.url("/opt-in"))
        .header(REQUEST_INFO_HEADER, "1")
        .header(UPSTREAMS_HEADER, "yes")
        .header("x-forwarded-for", "192.168.1.7")
        .header("x-probe", "a")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["request"]["client_ip"], "192.168.1.7");
    assert_eq!(body["request"]["method"], "GET");
    assert_eq!(body["request"]["headers"]["x-probe"], json!(["a"]));
    assert_eq!(body["upstreams"][0]["body"], json!({"n": 1}));

    mirage.stop().await;
}

#[tokio::test]
async fn test_text_request_headers_section() {
    let mirage = start_mirage(json!({
        "routes": [{
            "name": "echo",
            "method": "GET",
            "path": "/echo",
            "response": {
                "headers": {"content-type": "text/plain"},
                "body": "tail",
                "include_request_information": true
            }
        }]
    }))
    .await;

    let text = reqwest::Client::new()
        .get(mirage.url("/echo"))
        .header("x-multi", "one")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(text.starts_with(
        "######################\n#   Request headers  #\n######################\n\n"
    ));
    assert!(text.contains("x-multi:one\n"));
    assert!(text.ends_with("\ntail"));

    mirage.stop().await;
}

#[tokio::test]
async fn test_inbound_headers_propagate_to_upstreams() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/needs-headers"))
        .and(header("x-tenant", "acme"))
        .and(header("x-api-key", "configured"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&upstream)
        .await;

    let mirage = start_mirage(json!({
        "routes": [{
            "name": "propagate",
            "method": "GET",
            "path": "/propagate",
            "upstreams": [{
                "url": format!("{}/needs-headers", upstream.uri()),
                "method": "GET",
                "include_request_headers": true,
                "headers": {"x-api-key": "configured"}
            }],
            "response": {
                "headers": {"content-type": "text/plain"},
                "include_upstream_responses": true
            }
        }]
    }))
    .await;

    let text = reqwest::Client::new()
        .get(mirage.url("/propagate"))
        .header("x-tenant", "acme")
        .header("x-api-key", "from-client")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.ends_with("\n\n\tok"));

    mirage.stop().await;
}

#[tokio::test]
async fn test_upstream_request_bodies() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/json"))
        .and(body_json(json!({"k": "v"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("PUT"))
        .and(path("/text"))
        .and(body_string("raw payload"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&upstream)
        .await;

    let mirage = start_mirage(json!({
        "routes": [{
            "name": "writes",
            "method": "POST",
            "path": "/writes",
            "upstreams": [
                {
                    "url": format!("{}/json", upstream.uri()),
                    "method": "post",
                    "headers": {"content-type": "application/json"},
                    "body": {"k": "v"}
                },
                {
                    "url": format!("{}/text", upstream.uri()),
                    "method": "PUT",
                    "headers": {"content-type": "text/plain"},
                    "body": "raw payload"
                }
            ],
            "response": {
                "headers": {"content-type": "text/plain"},
                "status_code": 202,
                "include_upstream_responses": true
            }
        }]
    }))
    .await;

    let response = reqwest::Client::new()
        .post(mirage.url("/writes"))
        .body("ignored")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let text = response.text().await.unwrap();
    let first = text.find("POST - ").unwrap();
    let second = text.find("PUT - ").unwrap();
    assert!(first < second);
    assert!(text.contains("201 Created"));
    assert!(text.contains("204 No Content"));

    mirage.stop().await;
}

#[tokio::test]
#[serial]
async fn test_env_upstream_url_is_resolved_per_request() {
    let first = json_upstream("/who", json!({"server": "first"})).await;
    let second = json_upstream("/who", json!({"server": "second"})).await;

    let mirage = start_mirage(json!({
        "routes": [{
            "name": "switch",
            "method": "GET",
            "path": "/switch",
            "upstreams": [{"url": "env:MIRAGE_E2E_UPSTREAM_URL", "method": "GET"}],
            "response": {
                "headers": {"content-type": "application/json"},
                "include_upstream_responses": true
            }
        }]
    }))
    .await;

    unsafe {
        env::set_var("MIRAGE_E2E_UPSTREAM_URL", format!("{}/who", first.uri()));
    }
    let body: Value = reqwest::get(mirage.url("/switch"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["upstreams"][0]["body"]["server"], "first");

    unsafe {
        env::set_var("MIRAGE_E2E_UPSTREAM_URL", format!("{}/who", second.uri()));
    }
    let body: Value = reqwest::get(mirage.url("/switch"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["upstreams"][0]["body"]["server"], "second");

    unsafe {
        env::remove_var("MIRAGE_E2E_UPSTREAM_URL");
    }
    mirage.stop().await;
}

#[tokio::test]
async fn test_file_backed_body() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("payload.json");
    std::fs::write(&file, r#"{"from": "file"}"#).unwrap();

    let mirage = start_mirage(json!({
        "routes": [{
            "name": "file",
            "method": "GET",
            "path": "/file",
            "response": {
                "headers": {"content-type": "application/json"},
                "body": format!("file:{}", file.display())
            }
        }]
    }))
    .await;

    let body: Value = reqwest::get(mirage.url("/file"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"from": "file"}));

    mirage.stop().await;
}
