//! End-to-end tests of the chain API router against an in-process stub node.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use datacap_chain::api::{create_router, AppState};
use datacap_chain::common::{Error, RemoteErrorKind, Result};
use datacap_chain::node::{ConnectionFactory, ConnectionHandle, ConnectionProvider, FullNodeApi, NodeConnectionCache};
use datacap_chain::types::{Address, Cid, DataCap, NodeVersion, StartDealParams, TipSetKey, TokenAmount};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

const PROP_CID: &str = "bafyreibm6jg3ux5qumhcn2b3flc3tyu6dmlb4xa7u5bf44yegnrjhc4yeq";
const WALLET: &str = "f1d2xrzcslx7xlbbylc5c3d5lvandqw4iwl6epxba";

/// Records every call it receives.
#[derive(Default)]
struct StubNode {
    datacap: Option<DataCap>,
    status_fails: bool,
    deal_fails: bool,
    alive: AtomicBool,
    calls: AtomicUsize,
    status_queries: Mutex<Vec<(Address, TipSetKey)>>,
    proposals: Mutex<Vec<StartDealParams>>,
}

#[async_trait]
impl FullNodeApi for StubNode {
    async fn version(&self) -> Result<NodeVersion> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(NodeVersion::default())
        } else {
            Err(Error::remote("Filecoin.Version", RemoteErrorKind::Transport("connection reset".into())))
        }
    }

    async fn state_verified_client_status(&self, addr: &Address, tsk: &TipSetKey) -> Result<Option<DataCap>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.status_queries.lock().unwrap().push((addr.clone(), tsk.clone()));
        if self.status_fails {
            return Err(Error::remote(
                "Filecoin.StateVerifiedClientStatus",
                RemoteErrorKind::Rpc {
                    code: 2,
                    message: format!("actor {} not found", addr),
                },
            ));
        }
        Ok(self.datacap)
    }

    async fn client_stateless_deal(&self, params: &StartDealParams) -> Result<Cid> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // the status query must already have been answered
        assert_eq!(self.status_queries.lock().unwrap().len(), self.proposals.lock().unwrap().len() + 1);
        self.proposals.lock().unwrap().push(params.clone());
        if self.deal_fails {
            return Err(Error::remote(
                "Filecoin.ClientStatelessDeal",
                RemoteErrorKind::Rpc {
                    code: 1,
                    message: format!("wallet {} has insufficient funds", params.wallet),
                },
            ));
        }
        PROP_CID.parse()
    }
}

struct StubFactory {
    node: Arc<StubNode>,
    connect_fails: AtomicBool,
    connects: AtomicUsize,
}

#[async_trait]
impl ConnectionFactory for StubFactory {
    async fn connect(&self) -> Result<ConnectionHandle> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.connect_fails.load(Ordering::SeqCst) {
            return Err(Error::Connection("dial tcp 127.0.0.1:1234: connection refused".to_string()));
        }
        Ok(ConnectionHandle::new(self.node.clone()))
    }
}

struct Harness {
    node: Arc<StubNode>,
    factory: Arc<StubFactory>,
    cache: Arc<NodeConnectionCache>,
    app: Router,
}

fn harness(node: StubNode) -> Harness {
    node.alive.store(true, Ordering::SeqCst);
    let node = Arc::new(node);
    let factory = Arc::new(StubFactory {
        node: node.clone(),
        connect_fails: AtomicBool::new(false),
        connects: AtomicUsize::new(0),
    });
    let cache = Arc::new(NodeConnectionCache::new(factory.clone(), Duration::ZERO));
    let app = create_router(AppState::new(cache.clone()));
    Harness {
        node,
        factory,
        cache,
        app,
    }
}

fn form_request(fields: &[(&str, &str)]) -> Request<Body> {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    Request::builder()
        .method(Method::POST)
        .uri("/chain/api")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn deal_params(verified: bool) -> String {
    serde_json::json!({
        "Data": {
            "TransferType": "manual",
            "Root": {"/": "bafkqaaa"},
            "PieceCid": {"/": "bafkqaaa"},
            "PieceSize": 2032
        },
        "Wallet": WALLET,
        "Miner": "f01000",
        "EpochPrice": "0",
        "MinBlocksDuration": 518400,
        "ProviderCollateral": "0",
        "DealStartEpoch": 3000000,
        "FastRetrieval": true,
        "VerifiedDeal": verified
    })
    .to_string()
}

#[tokio::test]
async fn test_missing_method() {
    let h = harness(StubNode::default());
    for fields in [vec![], vec![("params", "{}")], vec![("method", ""), ("params", "{}")]] {
        let (status, body) = send(&h.app, form_request(&fields)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "method not found");
    }
    assert_eq!(h.factory.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_params() {
    let h = harness(StubNode::default());
    let (status, body) = send(&h.app, form_request(&[("method", "ClientStatelessDeal")])).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "params not found");
}

#[tokio::test]
async fn test_unsupported_method() {
    let h = harness(StubNode::default());
    for method in ["ClientStartDeal", "clientstatelessdeal", "StateVerifiedClientStatus"] {
        let (status, body) = send(&h.app, form_request(&[("method", method), ("params", "{}")])).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "unsupported method");
    }
    assert_eq!(h.node.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_params_not_json() {
    let h = harness(StubNode::default());
    for params in ["{not json", "[1,2,3]", r#"{"Wallet":"not-an-address"}"#] {
        let (status, body) = send(
            &h.app,
            form_request(&[("method", "ClientStatelessDeal"), ("params", params)]),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "decode params failed, is it not json format?");
    }
    assert_eq!(h.node.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_hacheck_bypasses_everything() {
    let h = harness(StubNode::default());
    for (method, uri) in [
        (Method::GET, "/hacheck"),
        (Method::GET, "/hacheck/anything"),
        (Method::POST, "/hacheck"),
        (Method::DELETE, "/hacheckz"),
    ] {
        let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let (status, body) = send(&h.app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "1");
    }
    assert_eq!(h.factory.connects.load(Ordering::SeqCst), 0);
    assert_eq!(h.node.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unverified_wallet_overrides_caller_flag() {
    let h = harness(StubNode::default());
    let (status, body) = send(
        &h.app,
        form_request(&[("method", "ClientStatelessDeal"), ("params", deal_params(true).as_str())]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json, serde_json::json!({"PropCid": PROP_CID, "Verified": false}));

    let queries = h.node.status_queries.lock().unwrap();
    assert_eq!(queries[0].0.as_str(), WALLET);
    assert!(queries[0].1.is_empty());

    let proposals = h.node.proposals.lock().unwrap();
    assert_eq!(proposals.len(), 1);
    assert!(!proposals[0].verified_deal);
    assert_eq!(proposals[0].min_blocks_duration, 518400);
}

#[tokio::test]
async fn test_verified_wallet() {
    let h = harness(StubNode {
        datacap: Some(TokenAmount::new(1 << 40)),
        ..Default::default()
    });
    let (status, body) = send(
        &h.app,
        form_request(&[("method", "ClientStatelessDeal"), ("params", deal_params(false).as_str())]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["Verified"], true);
    assert_eq!(json["PropCid"], PROP_CID);
    assert!(h.node.proposals.lock().unwrap()[0].verified_deal);
}

#[tokio::test]
async fn test_zero_datacap_still_counts_as_verified() {
    let h = harness(StubNode {
        datacap: Some(TokenAmount::new(0)),
        ..Default::default()
    });
    let (status, body) = send(
        &h.app,
        form_request(&[("method", "ClientStatelessDeal"), ("params", deal_params(false).as_str())]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"Verified\":true"));
}

#[tokio::test]
async fn test_fields_in_query_string() {
    let h = harness(StubNode::default());
    let uri = format!(
        "/chain/api?method=ClientStatelessDeal&params={}",
        urlencoding::encode(&deal_params(false))
    );
    let req = Request::builder().method(Method::POST).uri(uri).body(Body::empty()).unwrap();
    let (status, _) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_connection_is_reused_across_requests() {
    let h = harness(StubNode::default());
    for _ in 0..3 {
        let (status, _) = send(
            &h.app,
            form_request(&[("method", "ClientStatelessDeal"), ("params", deal_params(false).as_str())]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(h.factory.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_deal_failure_invalidates_connection() {
    let h = harness(StubNode {
        deal_fails: true,
        ..Default::default()
    });
    // the node went away: the liveness probe after the failure fails too
    h.node.alive.store(false, Ordering::SeqCst);

    let (status, body) = send(
        &h.app,
        form_request(&[("method", "ClientStatelessDeal"), ("params", deal_params(false).as_str())]),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "rpc error 1");
    assert!(!body.contains(WALLET));

    assert!(!h.cache.is_connected().await);
    h.cache.acquire().await.unwrap();
    assert_eq!(h.factory.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_deal_failure_keeps_live_connection() {
    let h = harness(StubNode {
        deal_fails: true,
        ..Default::default()
    });

    let (status, _) = send(
        &h.app,
        form_request(&[("method", "ClientStatelessDeal"), ("params", deal_params(false).as_str())]),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert!(h.cache.is_connected().await);
    assert_eq!(h.factory.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_route() {
    let h = harness(StubNode::default());
    let req = Request::builder().uri("/chain/other").body(Body::empty()).unwrap();
    let (status, _) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lowercase_param_keys() {
    let h = harness(StubNode::default());
    let params = serde_json::json!({
        "wallet": WALLET,
        "miner": "f01000",
        "epochprice": "0",
        "minblocksduration": 518400,
        "verifieddeal": true
    })
    .to_string();
    let (status, body) = send(
        &h.app,
        form_request(&[("method", "ClientStatelessDeal"), ("params", params.as_str())]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"Verified\":false"));
    assert_eq!(h.node.status_queries.lock().unwrap()[0].0.as_str(), WALLET);

    let proposals = h.node.proposals.lock().unwrap();
    assert_eq!(proposals[0].wallet.as_str(), WALLET);
    assert_eq!(proposals[0].miner.as_str(), "f01000");
    assert_eq!(proposals[0].min_blocks_duration, 518400);
}

#[tokio::test]
async fn test_status_failure_skips_submission() {
    let h = harness(StubNode {
        status_fails: true,
        ..Default::default()
    });
    h.node.alive.store(false, Ordering::SeqCst);

    let (status, body) = send(
        &h.app,
        form_request(&[("method", "ClientStatelessDeal"), ("params", deal_params(false).as_str())]),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "rpc error 2");

    assert_eq!(h.node.status_queries.lock().unwrap().len(), 1);
    assert!(h.node.proposals.lock().unwrap().is_empty());
    assert!(!h.cache.is_connected().await);
}

#[tokio::test]
async fn test_connect_failure_then_reconnect() {
    let h = harness(StubNode::default());
    h.factory.connect_fails.store(true, Ordering::SeqCst);

    let (status, body) = send(
        &h.app,
        form_request(&[("method", "ClientStatelessDeal"), ("params", deal_params(false).as_str())]),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "node connection failed");
    assert!(!h.cache.is_connected().await);
    assert_eq!(h.node.calls.load(Ordering::SeqCst), 0);

    h.factory.connect_fails.store(false, Ordering::SeqCst);
    let (status, _) = send(
        &h.app,
        form_request(&[("method", "ClientStatelessDeal"), ("params", deal_params(false).as_str())]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(h.cache.is_connected().await);
    assert_eq!(h.factory.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_response_is_gzipped_on_request() {
    let h = harness(StubNode::default());
    let mut req = form_request(&[("method", "ClientStatelessDeal"), ("params", deal_params(false).as_str())]);
    req.headers_mut()
        .insert(header::ACCEPT_ENCODING, "gzip".parse().unwrap());

    let response = h.app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
}

#[tokio::test]
async fn test_multipart_body() {
    let h = harness(StubNode::default());
    let boundary = "chain-api-boundary";
    let params = deal_params(false);
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"method\"\r\n\r\nClientStatelessDeal\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"params\"\r\n\r\n{p}\r\n--{b}--\r\n",
        b = boundary,
        p = params
    );
    let req = Request::builder()
        .method(Method::POST)
        .uri("/chain/api")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
        .body(Body::from(body))
        .unwrap();

    let (status, body) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(h.node.proposals.lock().unwrap()[0].wallet.as_str(), WALLET);
}

#[tokio::test]
async fn test_repeated_fields_use_first_value() {
    let h = harness(StubNode::default());
    let (status, _) = send(
        &h.app,
        form_request(&[
            ("method", "ClientStatelessDeal"),
            ("method", "ClientStartDeal"),
            ("params", deal_params(false).as_str()),
            ("params", "{not json"),
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.node.proposals.lock().unwrap().len(), 1);
}
