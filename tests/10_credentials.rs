mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use common::{json_body, policy, router, send, FakeGateway};

fn missing_header_requests() -> Vec<(&'static str, &'static str, &'static [&'static str])> {
    vec![
        ("GET", "/p_policies", &["X-SSH-User", "X-SSH-Password"] as &[&str]),
        ("GET", "/p_policies", &["X-Cert-Location", "X-SSH-Password"] as &[&str]),
        ("GET", "/gp_policies/POL-1", &["X-Cert-Location", "X-SSH-User"] as &[&str]),
        ("PUT", "/up_policies/POL-1", &["X-Cert-Location", "X-SSH-User"] as &[&str]),
        ("PUT", "/up_policies/POL-1", &[] as &[&str]),
    ]
}

#[tokio::test]
async fn missing_credential_headers_are_rejected_without_a_session() {
    let gateway = FakeGateway::new(vec![policy(1, "POL-1")]);

    for (method, uri, present) in missing_header_requests() {
        let mut builder = Request::builder().method(method).uri(uri);
        for header in present {
            builder = builder.header(*header, "value");
        }
        let request = builder
            .header("content-type", "application/json")
            .body(json_body(json!({
                "policy_start": "2024-01-01",
                "policy_end": "2025-01-01"
            })))
            .unwrap();

        let (status, body) = send(router(gateway.clone()), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", method, uri);
        assert!(body["error"].is_string(), "{} {}: {}", method, uri, body);
    }

    assert_eq!(gateway.opened(), 0);
    assert_eq!(gateway.updates(), 0);
}

#[tokio::test]
async fn empty_credential_header_counts_as_missing() {
    let gateway = FakeGateway::new(vec![]);

    let request = Request::builder()
        .uri("/p_policies")
        .header("X-Cert-Location", "/keys/id_ed25519")
        .header("X-SSH-User", "deploy")
        .header("X-SSH-Password", "")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(router(gateway.clone()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Certificate location, SSH user, and SSH password are required"
    );
    assert_eq!(gateway.opened(), 0);
}

#[tokio::test]
async fn health_and_root_need_no_credentials() {
    let gateway = FakeGateway::new(vec![]);

    let (status, body) = send(
        router(gateway.clone()),
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(
        router(gateway.clone()),
        Request::builder().uri("/").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "policy-gateway");

    assert_eq!(gateway.opened(), 0);
}
