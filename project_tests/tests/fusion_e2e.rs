use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use project_tests::{eventually, parse_debug, track_len, TestGateway, TEST_TOKEN};
use reqwest::StatusCode;
use serde_json::json;
use tokio_tungstenite::tungstenite::protocol::Message;

const SETTLE: Duration = Duration::from_secs(5);

fn report(track: &str, latitude: f64, longitude: f64) -> Message {
    Message::Text(
        json!({ "latitude": latitude, "longitude": longitude, "track": track })
            .to_string()
            .into(),
    )
}

#[tokio::test]
async fn reports_are_exported_per_track() {
    let gateway = TestGateway::spawn().await;
    let mut source = gateway.connect_source().await;

    source.send(report("bus1", 1.0, 2.0)).await.unwrap();
    source
        .send(Message::Text(
            json!({ "latitude": 1.5, "longitude": 2.5, "speed": 12.5, "heading": 90.0, "track": "bus1" })
                .to_string()
                .into(),
        ))
        .await
        .unwrap();

    assert!(eventually(SETTLE, || async { track_len(&gateway.export().await, "bus1") == 2 }).await);

    let export = gateway.export().await;
    let records = export["bus1"].as_array().unwrap();
    assert_eq!(records[0]["latitude"], 1.0);
    assert_eq!(records[0]["speed"], serde_json::Value::Null);
    assert_eq!(records[0]["heading"], serde_json::Value::Null);
    assert_eq!(records[1]["speed"], 12.5);
    assert_eq!(records[1]["track"], "bus1");
    assert!(records[1]["time"].as_str().is_some());

    source.close(None).await.unwrap();
    gateway.stop().await;
}

#[tokio::test]
async fn malformed_messages_do_not_close_the_connection() {
    let gateway = TestGateway::spawn().await;
    let mut source = gateway.connect_source().await;

    source.send(Message::Text("not json".into())).await.unwrap();
    source.send(Message::Text(r#"{"latitude": "north"}"#.into())).await.unwrap();
    source.send(report("bus2", 3.0, 4.0)).await.unwrap();

    assert!(eventually(SETTLE, || async { track_len(&gateway.export().await, "bus2") == 1 }).await);
    let counts = parse_debug(&gateway.debug_text().await).unwrap();
    assert_eq!(counts.positions, 1);
    assert_eq!(counts.clients, 1);

    gateway.stop().await;
}

#[tokio::test]
async fn debug_tracks_connects_and_disconnects() {
    let gateway = TestGateway::spawn().await;

    let first = gateway.connect_source().await;
    let mut second = gateway.connect_source().await;
    assert!(
        eventually(SETTLE, || async {
            parse_debug(&gateway.debug_text().await).is_some_and(|counts| counts.clients == 2)
        })
        .await
    );

    let body = gateway.debug_text().await;
    assert!(body.starts_with("fusion debug\n\n"));
    assert_eq!(body.lines().filter(|line| line.starts_with("client #")).count(), 2);

    second.close(None).await.unwrap();
    drop(first);
    assert!(
        eventually(SETTLE, || async {
            parse_debug(&gateway.debug_text().await).is_some_and(|counts| counts.clients == 0)
        })
        .await
    );

    gateway.stop().await;
}

#[tokio::test]
async fn inspection_requires_the_token() {
    let gateway = TestGateway::spawn().await;
    let client = reqwest::Client::new();

    for path in ["/debug", "/export"] {
        let anonymous = client.get(gateway.http_url(path)).send().await.unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let wrong = client.get(gateway.http_url(path)).bearer_auth("nope").send().await.unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let authorized = client
            .get(gateway.http_url(path))
            .bearer_auth(TEST_TOKEN)
            .send()
            .await
            .unwrap();
        assert_eq!(authorized.status(), StatusCode::OK);
    }

    let export = client
        .get(gateway.http_url("/export"))
        .bearer_auth(TEST_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(export.headers()["content-type"], "application/json");
    assert_eq!(export.text().await.unwrap(), "{}");

    let health = client.get(gateway.http_url("/health")).send().await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    gateway.stop().await;
}

#[tokio::test]
async fn plain_request_to_ingress_fails_without_registering() {
    let gateway = TestGateway::spawn().await;

    let response = reqwest::get(gateway.http_url("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.text().await.unwrap().is_empty());

    let counts = parse_debug(&gateway.debug_text().await).unwrap();
    assert_eq!(counts.clients, 0);

    gateway.stop().await;
}

#[tokio::test]
async fn connections_share_a_track() {
    let gateway = TestGateway::spawn().await;
    let mut a = gateway.connect_source().await;
    let mut b = gateway.connect_source().await;

    for i in 0..5 {
        a.send(report("shared", f64::from(i), 0.0)).await.unwrap();
        b.send(report("shared", f64::from(i), 1.0)).await.unwrap();
    }

    assert!(eventually(SETTLE, || async { track_len(&gateway.export().await, "shared") == 10 }).await);

    // Each source's own reports keep their order inside the shared track.
    let export = gateway.export().await;
    let records = export["shared"].as_array().unwrap();
    for longitude in [0.0, 1.0] {
        let latitudes: Vec<f64> = records
            .iter()
            .filter(|record| record["longitude"] == longitude)
            .map(|record| record["latitude"].as_f64().unwrap())
            .collect();
        assert_eq!(latitudes, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    let counts = parse_debug(&gateway.debug_text().await).unwrap();
    assert_eq!(counts.tracks, 1);
    assert_eq!(counts.positions, 10);

    gateway.stop().await;
}

#[tokio::test]
async fn concurrent_sources_lose_nothing() {
    const SOURCES: usize = 8;
    const REPORTS: usize = 50;

    let gateway = TestGateway::spawn().await;
    let mut tasks = Vec::new();
    for source in 0..SOURCES {
        let mut socket = gateway.connect_source().await;
        tasks.push(tokio::spawn(async move {
            let track = format!("vehicle-{source}");
            for i in 0..REPORTS {
                socket.send(report(&track, i as f64, 0.0)).await.unwrap();
            }
            socket.close(None).await.unwrap();
            while socket.next().await.is_some() {}
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert!(
        eventually(SETTLE, || async {
            parse_debug(&gateway.debug_text().await)
                .is_some_and(|counts| counts.positions == SOURCES * REPORTS && counts.clients == 0)
        })
        .await
    );

    let export = gateway.export().await;
    assert_eq!(export.as_object().unwrap().len(), SOURCES);
    for source in 0..SOURCES {
        assert_eq!(track_len(&export, &format!("vehicle-{source}")), REPORTS);
    }

    let summary = gateway.stop().await;
    assert_eq!(summary.record_count, SOURCES * REPORTS);
    assert_eq!(summary.track_count, SOURCES);
}
