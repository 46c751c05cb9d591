//! Streamed response bodies: incremental delivery, file streaming and
//! producer cleanup on client disconnect.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use crate::helpers::*;
use futures_util::StreamExt;
use reqwest::StatusCode;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio_onion::middleware::handler_fn;
use tokio_onion::{App, Body, Context};

#[tokio::test]
async fn test_chunks_arrive_before_producer_finishes() {
    let release = Arc::new(Notify::new());
    let gate = Arc::clone(&release);

    let app = App::builder()
        .get(
            "/events",
            handler_fn(move |ctx: &mut Context| {
                let gate = Arc::clone(&gate);
                Box::pin(async move {
                    let (tx, body) = Body::channel(4);
                    tokio::spawn(async move {
                        let _ = tx.send("first\n").await;
                        gate.notified().await;
                        let _ = tx.send("second\n").await;
                        let _ = tx.send("third\n").await;
                    });
                    ctx.insert_header("content-type", "text/event-stream")?;
                    ctx.stream(body)
                })
            }),
        )
        .build();
    let server = TestServer::start(app).await;

    let resp = server.get("/events").await;
    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "content-type", "text/event-stream");

    let mut stream = resp.bytes_stream();
    let first = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("first chunk was buffered behind the rest")
        .unwrap()
        .unwrap();
    assert_eq!(first, "first\n");

    release.notify_one();

    let mut rest = Vec::new();
    while let Some(chunk) = stream.next().await {
        rest.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(rest, b"second\nthird\n");
}

#[tokio::test]
async fn test_file_is_streamed_in_full() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let content: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
    file.write_all(&content).unwrap();
    file.flush().unwrap();
    let path = file.path().to_path_buf();

    let app = App::builder()
        .get(
            "/download",
            handler_fn(move |ctx: &mut Context| {
                let path = path.clone();
                Box::pin(async move {
                    let file = tokio::fs::File::open(&path).await?;
                    ctx.stream(Body::from_reader(file))
                })
            }),
        )
        .build();
    let server = TestServer::start(app).await;

    let resp = server.get("/download").await;
    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "content-type", "application/octet-stream");

    let bytes = resp.bytes().await.unwrap();
    assert_eq!(bytes.len(), content.len());
    assert_eq!(&bytes[..], &content[..]);
}

#[tokio::test]
async fn test_producer_stops_after_client_disconnects() {
    let (done_tx, done_rx) = oneshot::channel::<usize>();
    let done_tx = Arc::new(Mutex::new(Some(done_tx)));

    let app = App::builder()
        .get(
            "/forever",
            handler_fn(move |ctx: &mut Context| {
                let done_tx = Arc::clone(&done_tx);
                Box::pin(async move {
                    let (tx, body) = Body::channel(2);
                    tokio::spawn(async move {
                        let mut sent = 0usize;
                        while tx.send(vec![b'.'; 1024]).await.is_ok() {
                            sent += 1;
                            tokio::time::sleep(Duration::from_millis(5)).await;
                        }
                        if let Some(done) = done_tx.lock().await.take() {
                            let _ = done.send(sent);
                        }
                    });
                    ctx.stream(body)
                })
            }),
        )
        .build();
    let server = TestServer::start(app).await;

    {
        let client = reqwest::Client::new();
        let resp = client.get(server.url("/forever")).send().await.unwrap();
        let mut stream = resp.bytes_stream();
        let first = stream.next().await.unwrap().unwrap();
        assert!(!first.is_empty());
    }

    let sent = tokio::time::timeout(Duration::from_secs(5), done_rx)
        .await
        .expect("producer kept running after disconnect")
        .unwrap();
    assert!(sent >= 1);
}
