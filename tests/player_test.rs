//! End-to-end record/replay scenarios against a real loopback upstream

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::ext::ReasonPhrase;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tempfile::TempDir;
use tokio::net::TcpListener;

use playback::{Cassette, Player, PlaybackError};

/// A tiny upstream: `GET /users/<id>` answers `{"id":"<id>"}`, anything
/// else is a 404.
async fn spawn_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let service = service_fn(|req: Request<Incoming>| async move {
                    let path = req.uri().path().to_string();
                    let response = match path.strip_prefix("/users/") {
                        Some(id) => Response::builder()
                            .status(StatusCode::OK)
                            .header("content-type", "application/json")
                            .header("x-upstream", "loopback")
                            .body(Full::new(Bytes::from(format!("{{\"id\":\"{id}\"}}"))))
                            .unwrap(),
                        None => Response::builder()
                            .status(StatusCode::NOT_FOUND)
                            .body(Full::new(Bytes::from("no such route")))
                            .unwrap(),
                    };
                    Ok::<_, Infallible>(response)
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    addr
}

type TestClient = Client<HttpConnector, Full<Bytes>>;

fn test_client() -> TestClient {
    Client::builder(TokioExecutor::new()).build_http()
}

async fn get(client: &TestClient, addr: SocketAddr, path: &str) -> Response<Bytes> {
    let request = Request::builder()
        .method("GET")
        .uri(format!("http://{addr}{path}"))
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = client.request(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let body = body.collect().await.unwrap().to_bytes();
    Response::from_parts(parts, body)
}

async fn started_player(upstream: SocketAddr, cassette_path: &Path) -> Player {
    let mut player =
        Player::new("http://127.0.0.1:0/", &format!("http://{upstream}")).unwrap();
    player.load(Cassette::new(cassette_path).unwrap()).await;
    player.start().await.unwrap();
    player
}

// S1: record an exchange, then replay it byte-for-byte.
#[tokio::test]
async fn record_then_replay_round_trip() {
    let upstream = spawn_upstream().await;
    let dir = TempDir::new().unwrap();
    let cassette_path = dir.path().join("cassette.json");
    let mut player = started_player(upstream, &cassette_path).await;
    let addr = player.local_addr().unwrap();
    let client = test_client();

    player.record("r1").await.unwrap();
    let recorded = get(&client, addr, "/users/u1").await;
    assert_eq!(recorded.status(), StatusCode::OK);
    assert_eq!(recorded.body(), "{\"id\":\"u1\"}");
    player.stop().await.unwrap();

    player.play("r1").await.unwrap();
    let replayed = get(&client, addr, "/users/u1").await;
    assert_eq!(replayed.status(), StatusCode::OK);
    assert_eq!(replayed.body(), "{\"id\":\"u1\"}");
    assert_eq!(
        replayed.headers()["x-upstream"],
        "loopback",
        "captured headers reappear on replay"
    );
    player.stop().await.unwrap();
    player.close().await.unwrap();
}

// S2: a replay request that differs from the recording yields 454.
#[tokio::test]
async fn replay_mismatch_yields_454() {
    let upstream = spawn_upstream().await;
    let dir = TempDir::new().unwrap();
    let cassette_path = dir.path().join("cassette.json");
    let mut player = started_player(upstream, &cassette_path).await;
    let addr = player.local_addr().unwrap();
    let client = test_client();

    player.record("r1").await.unwrap();
    get(&client, addr, "/users/u1").await;
    player.stop().await.unwrap();

    player.play("r1").await.unwrap();
    let response = get(&client, addr, "/users/u2").await;
    assert_eq!(response.status().as_u16(), 454);
    assert_eq!(
        response
            .extensions()
            .get::<ReasonPhrase>()
            .map(|r| r.as_bytes().to_vec()),
        Some(b"Player request mismatch".to_vec())
    );
    let body = String::from_utf8_lossy(response.body());
    assert!(body.contains("/users/u2"), "diagnostic names the live path: {body}");
    player.close().await.unwrap();
}

// S3: reading past the recorded exchanges yields 551.
#[tokio::test]
async fn exhausted_record_yields_551() {
    let upstream = spawn_upstream().await;
    let dir = TempDir::new().unwrap();
    let cassette_path = dir.path().join("cassette.json");
    let mut player = started_player(upstream, &cassette_path).await;
    let addr = player.local_addr().unwrap();
    let client = test_client();

    player.record("r1").await.unwrap();
    get(&client, addr, "/users/u1").await;
    player.stop().await.unwrap();

    player.play("r1").await.unwrap();
    let first = get(&client, addr, "/users/u1").await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = get(&client, addr, "/users/u1").await;
    assert_eq!(second.status().as_u16(), 551);
    player.close().await.unwrap();
}

// S4/S5 live in the player unit tests; this covers the idle listener: 550.
#[tokio::test]
async fn idle_player_yields_550() {
    let upstream = spawn_upstream().await;
    let dir = TempDir::new().unwrap();
    let cassette_path = dir.path().join("cassette.json");
    let mut player = started_player(upstream, &cassette_path).await;
    let addr = player.local_addr().unwrap();
    let client = test_client();

    let response = get(&client, addr, "/users/u1").await;
    assert_eq!(response.status().as_u16(), 550);
    player.close().await.unwrap();
}

// S6: a recorded Connection: Keep-Alive matches a live request without one.
#[tokio::test]
async fn keep_alive_header_is_tolerated() {
    let upstream = spawn_upstream().await;
    let dir = TempDir::new().unwrap();
    let cassette_path = dir.path().join("cassette.json");
    let mut player = started_player(upstream, &cassette_path).await;
    let addr = player.local_addr().unwrap();
    let client = test_client();

    player.record("ka").await.unwrap();
    get(&client, addr, "/users/u1").await;
    player.stop().await.unwrap();

    // Age the cassette: give the recorded request a Connection header the
    // way older clients wrote it.
    let text = std::fs::read_to_string(&cassette_path).unwrap();
    let mut document: serde_json::Value = serde_json::from_str(&text).unwrap();
    document["ka"][0]["request"]["headers"]
        .as_object_mut()
        .unwrap()
        .insert(
            "Connection".to_string(),
            serde_json::Value::String("Keep-Alive".to_string()),
        );
    std::fs::write(&cassette_path, serde_json::to_string_pretty(&document).unwrap()).unwrap();

    player.load(Cassette::new(&cassette_path).unwrap()).await;
    player.play("ka").await.unwrap();

    let response = get(&client, addr, "/users/u1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body(), "{\"id\":\"u1\"}");
    player.close().await.unwrap();
}

// Upstream error statuses are replies, not failures: they get recorded and
// replayed like anything else.
#[tokio::test]
async fn upstream_error_status_is_recorded() {
    let upstream = spawn_upstream().await;
    let dir = TempDir::new().unwrap();
    let cassette_path = dir.path().join("cassette.json");
    let mut player = started_player(upstream, &cassette_path).await;
    let addr = player.local_addr().unwrap();
    let client = test_client();

    player.record("missing").await.unwrap();
    let recorded = get(&client, addr, "/nope").await;
    assert_eq!(recorded.status(), StatusCode::NOT_FOUND);
    player.stop().await.unwrap();

    player.play("missing").await.unwrap();
    let replayed = get(&client, addr, "/nope").await;
    assert_eq!(replayed.status(), StatusCode::NOT_FOUND);
    assert_eq!(replayed.body(), "no such route");
    player.close().await.unwrap();
}

// A record with no live upstream at all: transport failure surfaces as 552
// and nothing is appended.
#[tokio::test]
async fn unreachable_upstream_yields_552() {
    let dir = TempDir::new().unwrap();
    let cassette_path = dir.path().join("cassette.json");

    // A port that was bound and immediately dropped is as good as dead.
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);

    let mut player = started_player(dead_addr, &cassette_path).await;
    let addr = player.local_addr().unwrap();
    let client = test_client();

    player.record("r1").await.unwrap();
    let response = get(&client, addr, "/users/u1").await;
    assert_eq!(response.status().as_u16(), 552);
    player.stop().await.unwrap();

    let reloaded = Cassette::new(&cassette_path).unwrap();
    assert_eq!(reloaded.find("r1").unwrap().len(), 0);
    player.close().await.unwrap();
}

// Replay delivers exchanges in recorded order, and a fresh play of the
// same record starts over from the beginning.
#[tokio::test]
async fn replay_order_and_isolation() {
    let upstream = spawn_upstream().await;
    let dir = TempDir::new().unwrap();
    let cassette_path = dir.path().join("cassette.json");
    let mut player = started_player(upstream, &cassette_path).await;
    let addr = player.local_addr().unwrap();
    let client = test_client();

    player.record("seq").await.unwrap();
    for id in ["a", "b", "c"] {
        get(&client, addr, &format!("/users/{id}")).await;
    }
    player.stop().await.unwrap();

    for _ in 0..2 {
        player.play("seq").await.unwrap();
        for id in ["a", "b", "c"] {
            let response = get(&client, addr, &format!("/users/{id}")).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(*response.body(), format!("{{\"id\":\"{id}\"}}"));
        }
        player.stop().await.unwrap();
    }
    player.close().await.unwrap();
}

// A stopped recording survives a process "restart": a brand-new player
// replays from the same file.
#[tokio::test]
async fn cassette_survives_player_restart() {
    let upstream = spawn_upstream().await;
    let dir = TempDir::new().unwrap();
    let cassette_path = dir.path().join("cassette.json");

    {
        let mut recorder = started_player(upstream, &cassette_path).await;
        let addr = recorder.local_addr().unwrap();
        let client = test_client();
        recorder.record("persisted").await.unwrap();
        get(&client, addr, "/users/u9").await;
        recorder.close().await.unwrap();
    }

    let mut replayer = started_player(upstream, &cassette_path).await;
    let addr = replayer.local_addr().unwrap();
    let client = test_client();
    replayer.play("persisted").await.unwrap();

    let response = get(&client, addr, "/users/u9").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body(), "{\"id\":\"u9\"}");
    replayer.close().await.unwrap();
}

// S4 again at the API level, with the error kind checked.
#[tokio::test]
async fn play_unknown_record_fails() {
    let upstream = spawn_upstream().await;
    let dir = TempDir::new().unwrap();
    let cassette_path = dir.path().join("cassette.json");
    let mut player = started_player(upstream, &cassette_path).await;

    let err = player.play("none").await.unwrap_err();
    assert!(matches!(err, PlaybackError::RecordNotFound(name) if name == "none"));
    player.close().await.unwrap();
}
