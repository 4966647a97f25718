//! GraphQL client for the load balancer API.
//!
//! # Responsibilities
//! - Query a single load balancer with its ports, pools and origins
//! - Flatten the connection-style (`edges { node }`) response into domain types
//! - Keep not-found, auth, transport and GraphQL failures distinguishable

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::lbapi::auth::TokenSource;
use crate::lbapi::types::{LbApiError, LbApiResult, LoadBalancer, Origin, Pool, Port};
use crate::lbapi::DesiredStateSource;

const LOAD_BALANCER_QUERY: &str = "\
query GetLoadBalancer($id: ID!) {
  loadBalancer(id: $id) {
    id
    name
    ports {
      edges {
        node {
          id
          name
          number
          pools {
            id
            name
            protocol
            origins {
              edges {
                node {
                  id
                  name
                  target
                  portNumber
                  weight
                  active
                }
              }
            }
          }
        }
      }
    }
  }
}";

#[derive(Serialize)]
struct GraphQlRequest<'a> {
    query: &'static str,
    variables: Variables<'a>,
}

#[derive(Serialize)]
struct Variables<'a> {
    id: &'a str,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseData {
    load_balancer: Option<LoadBalancerNode>,
}

#[derive(Deserialize)]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    edges: Vec<Edge<T>>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { edges: Vec::new() }
    }
}

#[derive(Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Deserialize)]
struct LoadBalancerNode {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    ports: Connection<PortNode>,
}

#[derive(Deserialize)]
struct PortNode {
    id: String,
    #[serde(default)]
    name: String,
    number: u32,
    #[serde(default)]
    pools: Vec<PoolNode>,
}

#[derive(Deserialize)]
struct PoolNode {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    protocol: String,
    #[serde(default)]
    origins: Connection<OriginNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OriginNode {
    id: String,
    #[serde(default)]
    name: String,
    target: String,
    port_number: u32,
    #[serde(default)]
    weight: u32,
    #[serde(default)]
    active: bool,
}

impl From<LoadBalancerNode> for LoadBalancer {
    fn from(node: LoadBalancerNode) -> Self {
        Self {
            id: node.id,
            name: node.name,
            ports: node.ports.edges.into_iter().map(|e| e.node.into()).collect(),
        }
    }
}

impl From<PortNode> for Port {
    fn from(node: PortNode) -> Self {
        Self {
            id: node.id,
            name: node.name,
            number: node.number,
            pools: node.pools.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<PoolNode> for Pool {
    fn from(node: PoolNode) -> Self {
        Self {
            id: node.id,
            name: node.name,
            protocol: node.protocol,
            origins: node.origins.edges.into_iter().map(|e| e.node.into()).collect(),
        }
    }
}

impl From<OriginNode> for Origin {
    fn from(node: OriginNode) -> Self {
        Self {
            id: node.id,
            name: node.name,
            target: node.target,
            port_number: node.port_number,
            weight: node.weight,
            active: node.active,
        }
    }
}

/// Load balancer API client.
#[derive(Debug, Clone)]
pub struct LbApiClient {
    http: reqwest::Client,
    url: Url,
    tokens: Option<Arc<TokenSource>>,
}

impl LbApiClient {
    /// Create a client for the GraphQL endpoint at `url`.
    pub fn new(url: Url, timeout: Duration) -> LbApiResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, url: Url) -> Self {
        Self {
            http,
            url,
            tokens: None,
        }
    }

    /// Authenticate requests with bearer tokens from `tokens`.
    pub fn with_token_source(mut self, tokens: Arc<TokenSource>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Fetch a load balancer by id.
    pub async fn get_load_balancer(&self, id: &str) -> LbApiResult<LoadBalancer> {
        let body = GraphQlRequest {
            query: LOAD_BALANCER_QUERY,
            variables: Variables { id },
        };

        let mut request = self.http.post(self.url.clone()).json(&body);
        if let Some(tokens) = &self.tokens {
            request = request.bearer_auth(tokens.token().await?);
        }

        let response = request.send().await?;
        let status = response.status();

        match status {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND => return Err(LbApiError::NotFound(id.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                if let Some(tokens) = &self.tokens {
                    tokens.invalidate().await;
                }
                return Err(LbApiError::Unauthorized);
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                return Err(LbApiError::Http {
                    status: status.as_u16(),
                    body,
                });
            }
        }

        let text = response.text().await?;
        let decoded: GraphQlResponse =
            serde_json::from_str(&text).map_err(|e| LbApiError::Decode(e.to_string()))?;

        if !decoded.errors.is_empty() {
            let not_found = decoded
                .errors
                .iter()
                .any(|e| e.message.to_ascii_lowercase().contains("not found"));
            if not_found {
                return Err(LbApiError::NotFound(id.to_string()));
            }

            let messages: Vec<&str> = decoded.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(LbApiError::GraphQl(messages.join("; ")));
        }

        decoded
            .data
            .and_then(|d| d.load_balancer)
            .map(LoadBalancer::from)
            .ok_or_else(|| LbApiError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl DesiredStateSource for LbApiClient {
    async fn fetch(&self, id: &str) -> LbApiResult<LoadBalancer> {
        let lb = self.get_load_balancer(id).await?;
        tracing::debug!(
            loadbalancer.id = %lb.id,
            ports = lb.ports.len(),
            origins = lb.origin_count(),
            "Fetched desired state"
        );
        Ok(lb)
    }
}
