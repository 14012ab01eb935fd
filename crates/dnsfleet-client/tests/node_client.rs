//! Integration tests for `NodeClient` against a mock node HTTP API.
//!
//! These tests use wiremock to simulate the node's auth, query log,
//! domain and blocking endpoints.

use std::time::Duration;

use dnsfleet_client::{
    AddDomainRule, BlockingParams, BlockingStatus, ClientOptions, DomainRuleFilter, ErrorKind,
    NodeApi, NodeClient, NodeConnectionConfig, QueryLogFilters, QueryLogRequest, RemoveDomainRule,
    RuleKind, RuleType,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PASSWORD: &str = "correct horse";

/// Helper to create a client pointed at the mock server.
fn client_for(server: &MockServer, options: ClientOptions) -> NodeClient {
    let addr = server.address();
    let config = NodeConnectionConfig::new(1, "den", addr.ip().to_string(), PASSWORD).with_port(addr.port());
    NodeClient::new(config, options).unwrap()
}

fn default_client(server: &MockServer) -> NodeClient {
    client_for(server, ClientOptions::default())
}

// =============================================================================
// Mock Helpers
// =============================================================================

fn session_body(sid: &str, validity: i64) -> serde_json::Value {
    json!({
        "session": {"valid": true, "totp": false, "sid": sid, "csrf": "csrf-token", "validity": validity},
        "took": 0.003
    })
}

/// Mock the login endpoint, expecting exactly `times` logins.
async fn mock_login(server: &MockServer, sid: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .and(body_json(json!({"password": PASSWORD})))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body(sid, 1800)))
        .expect(times)
        .mount(server)
        .await;
}

fn query_page(cursor: i64) -> serde_json::Value {
    json!({
        "queries": [{
            "id": 1, "time": 1_700_000_000.25, "type": "A", "status": "FORWARDED",
            "dnssec": "INSECURE", "domain": "example.org", "upstream": "1.1.1.1#53",
            "reply": {"type": "IP", "time": 0.01},
            "client": {"ip": "10.0.0.20", "name": "laptop"},
            "list_id": null, "ede": {"code": -1, "text": null}, "cname": null
        }],
        "cursor": cursor,
        "recordsTotal": 500,
        "recordsFiltered": 1,
        "draw": 0,
        "took": 0.002
    })
}

// =============================================================================
// Session Tests
// =============================================================================

#[tokio::test]
async fn test_login_then_query_with_session_header() {
    let server = MockServer::start().await;
    mock_login(&server, "sid-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/queries"))
        .and(header("X-FTL-SID", "sid-1"))
        .and(header_exists("X-Request-ID"))
        .and(header_exists("User-Agent"))
        .and(query_param("length", "50"))
        .and(query_param("domain", "example.org"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_page(4242)))
        .expect(1)
        .mount(&server)
        .await;

    let client = default_client(&server);
    let filters = QueryLogFilters {
        domain: Some("example.org".into()),
        ..QueryLogFilters::default()
    };
    let page = client
        .fetch_query_logs(&QueryLogRequest::fresh(filters, Some(50), None))
        .await
        .unwrap();

    assert_eq!(page.cursor, Some(4242));
    assert_eq!(page.queries.len(), 1);
    assert_eq!(page.queries[0].client.name.as_deref(), Some("laptop"));
}

#[tokio::test]
async fn test_session_is_reused() {
    let server = MockServer::start().await;
    mock_login(&server, "sid-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/dns/blocking"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"blocking": "enabled", "timer": null, "took": 0.0001})),
        )
        .expect(3)
        .mount(&server)
        .await;

    let client = default_client(&server);
    for _ in 0..3 {
        let state = client.blocking_status().await.unwrap();
        assert_eq!(state.status, BlockingStatus::Enabled);
    }
}

#[tokio::test]
async fn test_concurrent_calls_share_one_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(session_body("sid-1", 1800))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dns/blocking"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"blocking": "disabled", "took": 0.0})))
        .mount(&server)
        .await;

    let client = std::sync::Arc::new(default_client(&server));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = std::sync::Arc::clone(&client);
        handles.push(tokio::spawn(async move { client.blocking_status().await }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().status, BlockingStatus::Disabled);
    }
}

#[tokio::test]
async fn test_rejected_session_forces_new_login() {
    let server = MockServer::start().await;
    mock_login(&server, "sid-1", 2).await;

    Mock::given(method("GET"))
        .and(path("/api/queries"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": {"key": "unauthorized"}})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/queries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_page(1)))
        .mount(&server)
        .await;

    let client = default_client(&server);
    let err = client.fetch_query_logs(&QueryLogRequest::default()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Auth);
    assert_eq!(err.http_status, Some(401));

    // Not retried automatically; the next call logs in again
    assert!(client.fetch_query_logs(&QueryLogRequest::default()).await.is_ok());
}

#[tokio::test]
async fn test_wrong_password_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "session": {"valid": false, "sid": null, "validity": -1}, "took": 0.5
        })))
        .mount(&server)
        .await;

    let err = default_client(&server).blocking_status().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Auth);
    assert!(!err.message.contains(PASSWORD));
}

#[tokio::test]
async fn test_invalid_session_in_login_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session": {"valid": false, "sid": null, "validity": 0}, "took": 0.1
        })))
        .mount(&server)
        .await;

    let err = default_client(&server).auth_status().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Auth);
}

#[tokio::test]
async fn test_session_ttl_caps_upstream_validity() {
    let server = MockServer::start().await;
    // A 1s cap is inside the refresh leeway, so every call logs in
    mock_login(&server, "sid-1", 2).await;
    Mock::given(method("GET"))
        .and(path("/api/dns/blocking"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"blocking": "enabled", "took": 0.0})))
        .mount(&server)
        .await;

    let client = client_for(
        &server,
        ClientOptions {
            session_ttl: Duration::from_secs(1),
            ..ClientOptions::default()
        },
    );
    client.blocking_status().await.unwrap();
    client.blocking_status().await.unwrap();
}

#[tokio::test]
async fn test_auth_status_reports_validity() {
    let server = MockServer::start().await;
    mock_login(&server, "sid-1", 1).await;
    Mock::given(method("GET"))
        .and(path("/api/auth"))
        .and(header("X-FTL-SID", "sid-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body("sid-1", 1799)))
        .mount(&server)
        .await;

    let status = default_client(&server).auth_status().await.unwrap();
    assert!(status.valid);
    assert_eq!(status.validity_seconds, 1799);
    assert!((status.took_ms - 3.0).abs() < 1e-9);
}

// =============================================================================
// Error Classification Tests
// =============================================================================

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    mock_login(&server, "sid-1", 1).await;
    Mock::given(method("GET"))
        .and(path("/api/queries"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = default_client(&server)
        .fetch_query_logs(&QueryLogRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Decode);
    assert!(!err.retryable);
}

#[tokio::test]
async fn test_server_error_is_retryable_protocol_error() {
    let server = MockServer::start().await;
    mock_login(&server, "sid-1", 1).await;
    Mock::given(method("GET"))
        .and(path("/api/dns/blocking"))
        .respond_with(ResponseTemplate::new(503).set_body_string("FTL offline"))
        .mount(&server)
        .await;

    let err = default_client(&server).blocking_status().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Protocol);
    assert_eq!(err.http_status, Some(503));
    assert!(err.retryable);
}

#[tokio::test]
async fn test_slow_node_is_timeout() {
    let server = MockServer::start().await;
    mock_login(&server, "sid-1", 1).await;
    Mock::given(method("GET"))
        .and(path("/api/dns/blocking"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"blocking": "enabled", "took": 0.0}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = client_for(
        &server,
        ClientOptions {
            request_timeout: Duration::from_millis(200),
            ..ClientOptions::default()
        },
    );
    let err = client.blocking_status().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert!(err.retryable);
}

#[tokio::test]
async fn test_unreachable_node_is_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = NodeConnectionConfig::new(9, "gone", "127.0.0.1", PASSWORD).with_port(port);
    let client = NodeClient::new(config, ClientOptions::default()).unwrap();

    let err = client.blocking_status().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Transport);
}

// =============================================================================
// Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_continuation_sends_cursor_without_start() {
    let server = MockServer::start().await;
    mock_login(&server, "sid-1", 1).await;
    Mock::given(method("GET"))
        .and(path("/api/queries"))
        .and(query_param("cursor", "4242"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_page(4100)))
        .expect(1)
        .mount(&server)
        .await;

    let request = QueryLogRequest::continuation(QueryLogFilters::default(), 4242, Some(25));
    let page = default_client(&server).fetch_query_logs(&request).await.unwrap();
    assert_eq!(page.cursor, Some(4100));

    let received = server.received_requests().await.unwrap();
    let query = received.last().unwrap().url.query().unwrap_or_default().to_string();
    assert!(query.contains("length=25"));
    assert!(!query.contains("start="));
}

#[tokio::test]
async fn test_domain_rule_endpoints() {
    let server = MockServer::start().await;
    mock_login(&server, "sid-1", 1).await;

    Mock::given(method("POST"))
        .and(path("/api/domains/deny/exact"))
        .and(body_json(json!({"domain": ["ads.example"], "comment": "ads", "enabled": true})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "domains": [{
                "domain": "ads.example", "unicode": "ads.example", "type": "deny", "kind": "exact",
                "comment": "ads", "groups": [0], "enabled": true, "id": 12,
                "date_added": 1_700_000_000, "date_modified": 1_700_000_000
            }],
            "processed": {"success": [{"item": "ads.example"}], "errors": []},
            "took": 0.02
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/domains/deny"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"domains": [], "took": 0.001})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/domains/deny/exact/ads.example"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = default_client(&server);

    let added = client
        .add_domain_rule(&AddDomainRule::new(RuleType::Deny, RuleKind::Exact, ["ads.example"]).with_comment("ads"))
        .await
        .unwrap();
    assert_eq!(added.domains[0].id, 12);
    assert_eq!(added.processed.success.len(), 1);

    let listed = client
        .get_domain_rules(&DomainRuleFilter {
            rule_type: Some(RuleType::Deny),
            ..DomainRuleFilter::default()
        })
        .await
        .unwrap();
    assert!(listed.domains.is_empty());

    client
        .remove_domain_rule(&RemoveDomainRule::new(RuleType::Deny, RuleKind::Exact, "ads.example"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_add_rule_requires_created_status() {
    let server = MockServer::start().await;
    mock_login(&server, "sid-1", 1).await;
    Mock::given(method("POST"))
        .and(path("/api/domains/allow/regex"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": {"key": "bad_request"}})))
        .mount(&server)
        .await;

    let err = default_client(&server)
        .add_domain_rule(&AddDomainRule::new(RuleType::Allow, RuleKind::Regex, ["("]))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Protocol);
    assert_eq!(err.http_status, Some(400));
}

#[tokio::test]
async fn test_set_blocking_sends_timer() {
    let server = MockServer::start().await;
    mock_login(&server, "sid-1", 1).await;
    Mock::given(method("POST"))
        .and(path("/api/dns/blocking"))
        .and(body_json(json!({"blocking": false, "timer": 300})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"blocking": "disabled", "timer": 299.9, "took": 0.001})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let state = default_client(&server)
        .set_blocking(&BlockingParams::disable(Some(Duration::from_secs(300))))
        .await
        .unwrap();
    assert_eq!(state.status, BlockingStatus::Disabled);
    assert_eq!(state.timer_secs, Some(299.9));
}

#[tokio::test]
async fn test_logout_deletes_session() {
    let server = MockServer::start().await;
    mock_login(&server, "sid-1", 2).await;
    Mock::given(method("GET"))
        .and(path("/api/dns/blocking"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"blocking": "enabled", "took": 0.0})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/auth"))
        .and(header("X-FTL-SID", "sid-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = default_client(&server);
    client.blocking_status().await.unwrap();
    client.logout().await.unwrap();
    // Second logout has no session to end
    client.logout().await.unwrap();
    // Using the client again logs in again
    client.blocking_status().await.unwrap();
}

#[tokio::test]
async fn test_update_config_switches_node() {
    let old = MockServer::start().await;
    let new = MockServer::start().await;
    mock_login(&old, "old-sid", 1).await;
    mock_login(&new, "new-sid", 1).await;
    for (server, sid) in [(&old, "old-sid"), (&new, "new-sid")] {
        Mock::given(method("GET"))
            .and(path("/api/dns/blocking"))
            .and(header("X-FTL-SID", sid))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"blocking": "enabled", "took": 0.0})))
            .expect(1)
            .mount(server)
            .await;
    }

    let client = default_client(&old);
    client.blocking_status().await.unwrap();

    let addr = new.address();
    client.update_config(
        NodeConnectionConfig::new(1, "den-renamed", addr.ip().to_string(), PASSWORD).with_port(addr.port()),
    );
    assert_eq!(client.identity().name, "den-renamed");
    client.blocking_status().await.unwrap();
}

#[tokio::test]
async fn test_in_flight_call_keeps_config_it_started_with() {
    let old = MockServer::start().await;
    let new = MockServer::start().await;
    mock_login(&old, "old-sid", 1).await;
    mock_login(&new, "new-sid", 1).await;

    Mock::given(method("GET"))
        .and(path("/api/dns/blocking"))
        .and(header("X-FTL-SID", "old-sid"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"blocking": "disabled", "timer": null, "took": 0.0}))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(1)
        .mount(&old)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dns/blocking"))
        .and(header("X-FTL-SID", "new-sid"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"blocking": "enabled", "timer": null, "took": 0.0})),
        )
        .expect(1)
        .mount(&new)
        .await;

    let client = default_client(&old);
    let addr = new.address();
    let switch = async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        client.update_config(
            NodeConnectionConfig::new(1, "den", addr.ip().to_string(), PASSWORD).with_port(addr.port()),
        );
    };

    let (in_flight, ()) = tokio::join!(client.blocking_status(), switch);
    assert_eq!(in_flight.unwrap().status, BlockingStatus::Disabled);

    let after = client.blocking_status().await.unwrap();
    assert_eq!(after.status, BlockingStatus::Enabled);
}
