// ============================================
// File: crates/dnsfleet-client/src/client.rs
// ============================================
//! # Node HTTP Client
//!
//! ## Creation Reason
//! Talks to one upstream node over its JSON HTTP API, hiding login and
//! session reuse from the rest of dnsfleet.
//!
//! ## Main Functionality
//! - Lazy login with a cached session (`SessionCache`)
//! - One settings snapshot per call, swapped atomically by `update_config`
//! - Request headers: session id, request id, user agent
//! - Status checks per endpoint and error classification into `NodeError`
//!
//! ## Request Flow
//! ```text
//! call ──► snapshot config ──► ensure session ──► send ──► status check ──► decode
//!                                   │                          │
//!                                   └── POST /api/auth         └── 401/403: drop session
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A rejected session is dropped but the request is NOT re-sent; the
//!   next call logs in again
//! - Never log the password or the session id
//!
//! ## Last Modified
//! v0.1.0 - Initial client

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dnsfleet_common::NodeIdentity;
use parking_lot::RwLock;
use rand::Rng;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::{ClientOptions, NodeConnectionConfig};
use crate::error::{ClientError, Result};
use crate::models::{
    AddDomainRuleResponse, AuthResponse, AuthStatus, BlockingParams, BlockingState, BlockingWire,
    DomainRulesResponse, LoginRequest, QueryLogResponse,
};
use crate::query::QueryLogRequest;
use crate::rule::{AddDomainRule, DomainRuleFilter, RemoveDomainRule};
use crate::session::SessionCache;
use crate::traits::NodeApi;

// ============================================
// Constants
// ============================================

/// Header carrying the session id.
pub const SESSION_HEADER: &str = "X-FTL-SID";

/// Header carrying a per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

// ============================================
// Snapshot
// ============================================

/// Settings as seen by one call.
struct Snapshot {
    generation: u64,
    config: NodeConnectionConfig,
}

/// Description of one authenticated request.
struct Call<'a> {
    method: Method,
    segments: Vec<String>,
    query: Vec<(&'static str, String)>,
    body: Option<serde_json::Value>,
    expected: StatusCode,
    context: &'static str,
    snapshot: &'a Snapshot,
}

impl<'a> Call<'a> {
    fn new(snapshot: &'a Snapshot, method: Method, segments: Vec<String>, context: &'static str) -> Self {
        Self {
            method,
            segments,
            query: Vec::new(),
            body: None,
            expected: StatusCode::OK,
            context,
            snapshot,
        }
    }

    fn query(mut self, pairs: Vec<(&'static str, String)>) -> Self {
        self.query = pairs;
        self
    }

    fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    fn expect(mut self, status: StatusCode) -> Self {
        self.expected = status;
        self
    }
}

// ============================================
// NodeClient
// ============================================

/// HTTP client for one upstream node.
///
/// # Thread Safety
/// Shareable across tasks. Config swaps and session refreshes are
/// internally synchronized.
///
/// # Example
/// ```no_run
/// use dnsfleet_client::{ClientOptions, NodeApi, NodeClient, NodeConnectionConfig};
///
/// # async fn run() -> dnsfleet_client::Result<()> {
/// let config = NodeConnectionConfig::new(1, "den", "10.0.0.2", "secret");
/// let client = NodeClient::new(config, ClientOptions::default())?;
/// let status = client.blocking_status().await?;
/// println!("{:?}", status.status);
/// # Ok(())
/// # }
/// ```
pub struct NodeClient {
    snapshot: RwLock<Arc<Snapshot>>,
    http: reqwest::Client,
    session: SessionCache,
    options: ClientOptions,
}

impl NodeClient {
    /// Creates a client with its own HTTP connection pool.
    ///
    /// # Errors
    /// Returns an `Unknown` error if the HTTP client cannot be built.
    pub fn new(config: NodeConnectionConfig, options: ClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .user_agent(options.user_agent.clone())
            .build()
            .map_err(ClientError::Http)?;
        Ok(Self::with_http_client(config, options, http))
    }

    /// Creates a client on top of an existing `reqwest::Client`.
    #[must_use]
    pub fn with_http_client(
        config: NodeConnectionConfig,
        options: ClientOptions,
        http: reqwest::Client,
    ) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot {
                generation: 0,
                config,
            })),
            http,
            session: SessionCache::new(),
            options,
        }
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read())
    }

    fn endpoint(config: &NodeConnectionConfig, segments: &[String]) -> std::result::Result<Url, ClientError> {
        let mut url =
            Url::parse(&config.base_url()).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl("address cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request_id(snapshot: &Snapshot) -> String {
        let nonce: u64 = rand::thread_rng().gen();
        format!("{nonce:016x}-n{}", snapshot.config.id)
    }

    // ========================================
    // Session
    // ========================================

    async fn login(&self, snapshot: &Snapshot) -> std::result::Result<(String, Duration), ClientError> {
        let url = Self::endpoint(&snapshot.config, &["auth".to_string()])?;
        debug!(node = %snapshot.config.id, "Logging in to node");

        let response = self
            .http
            .post(url)
            .header(REQUEST_ID_HEADER, Self::request_id(snapshot))
            .json(&LoginRequest {
                password: snapshot.config.password.expose(),
            })
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::status(status.as_u16(), &body));
        }

        let auth: AuthResponse = Self::decode(response, "login response").await?;
        let sid = match auth.session.sid {
            Some(sid) if auth.session.valid && !sid.is_empty() => sid,
            _ => return Err(ClientError::SessionRejected),
        };

        let upstream = Duration::from_secs(auth.session.validity.max(0).unsigned_abs());
        let validity = upstream.min(self.options.session_ttl);
        info!(
            node = %snapshot.config.id,
            validity_secs = validity.as_secs(),
            "Logged in to node"
        );
        Ok((sid, validity))
    }

    async fn ensure_session(&self, snapshot: &Snapshot) -> std::result::Result<String, ClientError> {
        self.session
            .get_or_refresh(snapshot.generation, || self.login(snapshot))
            .await
    }

    // ========================================
    // Transport
    // ========================================

    async fn execute(&self, call: Call<'_>) -> std::result::Result<reqwest::Response, ClientError> {
        let snapshot = call.snapshot;
        let url = Self::endpoint(&snapshot.config, &call.segments)?;
        let sid = self.ensure_session(snapshot).await?;

        debug!(
            node = %snapshot.config.id,
            method = %call.method,
            path = url.path(),
            "Sending node request"
        );

        let mut builder = self
            .http
            .request(call.method, url)
            .header(SESSION_HEADER, sid.as_str())
            .header(REQUEST_ID_HEADER, Self::request_id(snapshot));
        if !call.query.is_empty() {
            builder = builder.query(&call.query);
        }
        if let Some(body) = &call.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(node = %snapshot.config.id, %status, "Node rejected session");
            self.session.invalidate(&sid);
        }
        if status != call.expected {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::status(status.as_u16(), &body));
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        context: &'static str,
    ) -> std::result::Result<T, ClientError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| ClientError::Decode { context, source })
    }

    async fn fetch<T: DeserializeOwned>(&self, call: Call<'_>) -> std::result::Result<T, ClientError> {
        let context = call.context;
        let response = self.execute(call).await?;
        Self::decode(response, context).await
    }
}

impl fmt::Debug for NodeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.current();
        f.debug_struct("NodeClient")
            .field("config", &snapshot.config)
            .field("generation", &snapshot.generation)
            .finish_non_exhaustive()
    }
}

// ============================================
// NodeApi
// ============================================

#[async_trait]
impl NodeApi for NodeClient {
    fn identity(&self) -> NodeIdentity {
        self.current().config.identity()
    }

    fn update_config(&self, config: NodeConnectionConfig) {
        {
            let mut current = self.snapshot.write();
            let generation = current.generation + 1;
            *current = Arc::new(Snapshot { generation, config });
        }
        self.session.clear();
        debug!(node = %self.current().config.id, "Node settings replaced");
    }

    async fn fetch_query_logs(&self, request: &QueryLogRequest) -> Result<QueryLogResponse> {
        let snapshot = self.current();
        let call = Call::new(&snapshot, Method::GET, vec!["queries".into()], "query log")
            .query(request.query_pairs());
        Ok(self.fetch(call).await?)
    }

    async fn get_domain_rules(&self, filter: &DomainRuleFilter) -> Result<DomainRulesResponse> {
        let snapshot = self.current();
        let call = Call::new(&snapshot, Method::GET, filter.path_segments(), "domain rules");
        Ok(self.fetch(call).await?)
    }

    async fn add_domain_rule(&self, rule: &AddDomainRule) -> Result<AddDomainRuleResponse> {
        let snapshot = self.current();
        let body = serde_json::to_value(rule.body())
            .map_err(|source| ClientError::Decode { context: "domain rule body", source })?;
        let call = Call::new(&snapshot, Method::POST, rule.path_segments(), "added domain rule")
            .body(body)
            .expect(StatusCode::CREATED);
        Ok(self.fetch(call).await?)
    }

    async fn remove_domain_rule(&self, rule: &RemoveDomainRule) -> Result<()> {
        let snapshot = self.current();
        let call = Call::new(&snapshot, Method::DELETE, rule.path_segments(), "removed domain rule")
            .expect(StatusCode::NO_CONTENT);
        self.execute(call).await?;
        Ok(())
    }

    async fn auth_status(&self) -> Result<AuthStatus> {
        let snapshot = self.current();
        let call = Call::new(&snapshot, Method::GET, vec!["auth".into()], "auth status");
        let response: AuthResponse = self.fetch(call).await?;
        Ok(AuthStatus::from_response(&response))
    }

    async fn blocking_status(&self) -> Result<BlockingState> {
        let snapshot = self.current();
        let call = Call::new(
            &snapshot,
            Method::GET,
            vec!["dns".into(), "blocking".into()],
            "blocking status",
        );
        let wire: BlockingWire = self.fetch(call).await?;
        Ok(wire.into_state())
    }

    async fn set_blocking(&self, params: &BlockingParams) -> Result<BlockingState> {
        let snapshot = self.current();
        let body = serde_json::to_value(params)
            .map_err(|source| ClientError::Decode { context: "blocking body", source })?;
        let call = Call::new(
            &snapshot,
            Method::POST,
            vec!["dns".into(), "blocking".into()],
            "blocking status",
        )
        .body(body);
        let wire: BlockingWire = self.fetch(call).await?;
        Ok(wire.into_state())
    }

    async fn logout(&self) -> Result<()> {
        let Some(sid) = self.session.take() else {
            return Ok(());
        };
        let snapshot = self.current();
        let url = Self::endpoint(&snapshot.config, &["auth".to_string()])?;

        let response = self
            .http
            .delete(url)
            .header(SESSION_HEADER, sid.as_str())
            .header(REQUEST_ID_HEADER, Self::request_id(&snapshot))
            .send()
            .await
            .map_err(ClientError::Http)?;

        match response.status() {
            // Already gone on the node side counts as logged out
            StatusCode::NO_CONTENT | StatusCode::OK | StatusCode::UNAUTHORIZED => {
                info!(node = %snapshot.config.id, "Logged out of node");
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::status(status.as_u16(), &body).into())
            }
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Scheme;

    fn client() -> NodeClient {
        NodeClient::new(
            NodeConnectionConfig::new(3, "den", "10.0.0.3", "pw").with_port(8080),
            ClientOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let cfg = NodeConnectionConfig::new(1, "a", "pi.lan", "");
        let url = NodeClient::endpoint(
            &cfg,
            &["domains".into(), "deny".into(), "regex".into(), "(^|\\.)ads/x$".into()],
        )
        .unwrap();
        assert!(url.as_str().starts_with("http://pi.lan/api/domains/deny/regex/"));
        assert!(!url.path().ends_with("/x$"));
    }

    #[test]
    fn test_endpoint_https() {
        let cfg = NodeConnectionConfig::new(1, "a", "pi.lan", "")
            .with_scheme(Scheme::Https)
            .with_port(8443);
        let url = NodeClient::endpoint(&cfg, &["dns".into(), "blocking".into()]).unwrap();
        assert_eq!(url.as_str(), "https://pi.lan:8443/api/dns/blocking");
    }

    #[test]
    fn test_update_config_bumps_generation() {
        let client = client();
        assert_eq!(client.identity().name, "den");
        client.update_config(NodeConnectionConfig::new(3, "attic", "10.0.0.4", "pw2"));
        assert_eq!(client.identity(), NodeIdentity::new(3, "attic", "10.0.0.4"));
        assert_eq!(client.current().generation, 1);
    }

    #[test]
    fn test_request_id_carries_node() {
        let client = client();
        let id = NodeClient::request_id(&client.current());
        assert!(id.ends_with("-n3"));
        assert_eq!(id.len(), 16 + 3);
    }

    #[test]
    fn test_debug_hides_password() {
        assert!(!format!("{:?}", client()).contains("pw"));
    }

    #[tokio::test]
    async fn test_logout_without_session_is_noop() {
        client().logout().await.unwrap();
    }
}
