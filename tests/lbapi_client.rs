//! Load balancer API client against a mock GraphQL server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use haproxy_lb_manager::lbapi::{
    ClientCredentials, DesiredStateSource, LbApiClient, LbApiError, TokenSource,
};

fn client(server: &MockServer) -> LbApiClient {
    LbApiClient::new(
        Url::parse(&format!("{}/query", server.uri())).unwrap(),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn lb_response() -> serde_json::Value {
    json!({
        "data": {
            "loadBalancer": {
                "id": "loadbal-test",
                "name": "test",
                "ports": { "edges": [ { "node": {
                    "id": "loadprt-ssh",
                    "name": "ssh-service",
                    "number": 22,
                    "pools": [ {
                        "id": "loadpol-ssh",
                        "name": "ssh",
                        "protocol": "tcp",
                        "origins": { "edges": [
                            { "node": { "id": "loadogn-1", "name": "a", "target": "1.2.3.4",
                                        "portNumber": 2222, "weight": 20, "active": true } },
                            { "node": { "id": "loadogn-2", "name": "b", "target": "4.3.2.1",
                                        "portNumber": 2222, "weight": 50, "active": false } }
                        ]}
                    } ]
                }}]}
            }
        }
    })
}

#[tokio::test]
async fn test_fetch_load_balancer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_partial_json(json!({ "variables": { "id": "loadbal-test" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(lb_response()))
        .expect(1)
        .mount(&server)
        .await;

    let lb = client(&server).fetch("loadbal-test").await.unwrap();
    assert_eq!(lb.id, "loadbal-test");
    assert_eq!(lb.ports.len(), 1);
    assert_eq!(lb.ports[0].number, 22);
    assert_eq!(lb.origin_count(), 2);
    assert!(!lb.ports[0].pools[0].origins[1].active);
}

#[tokio::test]
async fn test_not_found_variants() {
    let responses = [
        ResponseTemplate::new(404),
        ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [ { "message": "load_balancer not found" } ]
        })),
        ResponseTemplate::new(200).set_body_json(json!({ "data": { "loadBalancer": null } })),
    ];

    for response in responses {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(response)
            .mount(&server)
            .await;

        let err = client(&server).fetch("loadbal-missing").await.unwrap_err();
        assert!(
            matches!(err, LbApiError::NotFound(ref id) if id == "loadbal-missing"),
            "{err:?}"
        );
    }
}

#[tokio::test]
async fn test_graphql_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [ { "message": "internal" }, { "message": "try again" } ]
        })))
        .mount(&server)
        .await;

    let err = client(&server).fetch("loadbal-test").await.unwrap_err();
    assert!(matches!(err, LbApiError::GraphQl(ref msg) if msg == "internal; try again"));
}

#[tokio::test]
async fn test_http_and_decode_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;
    let err = client(&server).fetch("loadbal-test").await.unwrap_err();
    assert!(matches!(err, LbApiError::Http { status: 502, .. }));

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;
    let err = client(&server).fetch("loadbal-test").await.unwrap_err();
    assert!(matches!(err, LbApiError::Decode(_)));
}

#[tokio::test]
async fn test_bearer_token_and_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "expires_in": 3600
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lb_response()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let tokens = Arc::new(TokenSource::new(
        reqwest::Client::new(),
        ClientCredentials {
            client_id: "lbmanager".into(),
            client_secret: "s3cret".into(),
            token_url: Url::parse(&format!("{}/oauth/token", server.uri())).unwrap(),
        },
    ));
    let c = client(&server).with_token_source(tokens);

    c.fetch("loadbal-test").await.unwrap();

    let err = c.fetch("loadbal-test").await.unwrap_err();
    assert!(matches!(err, LbApiError::Unauthorized));

    // The rejected token was dropped, so the next call fetches a new one.
    let _ = c.fetch("loadbal-test").await;
}
