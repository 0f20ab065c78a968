//! Crate-level integration test: drives a full session — `Synthetic`
//! driver, ring buffer, VAD bypass, chunker, sender — against an
//! in-process WebSocket server, and checks the invariants spec.md §8
//! calls out (P1 sequence numbers, P5 bounded stop).
//!
//! The teacher (a Tauri app) has no equivalent crate-level test since it
//! is exercised through its frontend; this is learned from the pack's
//! client/server WebSocket pairings (see DESIGN.md).

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

use rtstt_core::config::{AppConfig, DriverKind};
use rtstt_core::session::{ControllerEvent, SessionController, SessionState};
use rtstt_core::wire;

/// Starts a minimal echo/verify server on an ephemeral port: accepts one
/// connection, decodes every binary frame, and forwards the decoded
/// sequence numbers over `tx` for the test to assert on. Replies to each
/// chunk with a one-line JSON "transcript" so the reply path is exercised
/// too.
async fn spawn_verify_server() -> (String, tokio::sync::mpsc::UnboundedReceiver<wire::WireFrame>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = match listener.accept().await {
            Ok(pair) => pair,
            Err(_) => return,
        };
        let mut ws = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(_) => return,
        };

        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Binary(bytes)) => {
                    if let Ok(frame) = wire::decode(&bytes) {
                        let is_final = frame.is_final;
                        let _ = tx.send(frame);
                        let _ = ws
                            .send(Message::Text(
                                r#"{"text":"ok","latency_ms":1}"#.to_string(),
                            ))
                            .await;
                        if is_final {
                            break;
                        }
                    }
                }
                Ok(Message::Text(_)) => {
                    // heartbeat ping; nothing to do.
                }
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
    });

    (format!("ws://{addr}"), rx)
}

fn synthetic_config(ws_url: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.ws_url = ws_url;
    config.driver = DriverKind::Synthetic;
    config.device_id = Some("sine".to_string());
    config.sample_rate = 16_000;
    config.chunk_ms = 200;
    config.heartbeat_ms = 60_000;
    config.stop_timeout_ms = 2_000;
    config
}

#[tokio::test]
async fn session_streams_contiguous_sequence_numbers_and_stops_in_budget() {
    let (ws_url, mut frames_rx) = spawn_verify_server().await;
    let config = synthetic_config(ws_url);

    let mut controller = SessionController::new(config.clone());
    let mut events = controller.take_event_receiver().unwrap();
    let event_task = tokio::spawn(async move {
        let mut replies = 0usize;
        while let Some(event) = events.recv().await {
            if let ControllerEvent::Reply(_) = event {
                replies += 1;
            }
        }
        replies
    });

    controller.start().await.expect("session should start against a live local server");

    // Let a handful of chunks flow.
    tokio::time::sleep(Duration::from_millis(700)).await;

    let stop_started = std::time::Instant::now();
    controller.stop().await.expect("stop should not error");
    assert!(
        stop_started.elapsed() <= Duration::from_millis(config.stop_timeout_ms + 500),
        "stop() must return within stop_timeout_ms (P5)"
    );
    assert_eq!(controller.state(), SessionState::Stopped);

    drop(event_task);

    // Drain whatever frames the server decoded and check monotone,
    // contiguous sequence numbers with exactly one final chunk, last
    // (spec §8 P1).
    let mut frames = Vec::new();
    while let Ok(frame) = frames_rx.try_recv() {
        frames.push(frame);
    }
    assert!(!frames.is_empty(), "expected at least one chunk to reach the server");

    for (idx, window) in frames.windows(2).enumerate() {
        assert_eq!(
            window[1].sequence_no,
            window[0].sequence_no + 1,
            "sequence numbers must be contiguous at position {idx}"
        );
    }
    let final_count = frames.iter().filter(|f| f.is_final).count();
    assert_eq!(final_count, 1, "exactly one chunk must be marked final");
    assert!(
        frames.last().unwrap().is_final,
        "the final chunk must be the last one observed"
    );

    let stats = controller.stats();
    assert!(stats.chunks_sent >= frames.len() as u64);
    assert_eq!(stats.errors, 0);
}

#[tokio::test]
async fn repeated_start_stop_cycles_leave_no_dangling_state() {
    let (ws_url, _frames_rx) = spawn_verify_server().await;

    // Only the first cycle's connection is actually accepted by the
    // single-shot verify server above; subsequent connects will fail fast
    // and the controller should still stop cleanly within budget rather
    // than hang — exercising the same bounded-stop guarantee (spec §8 P5,
    // scenario 6) under a connection that never succeeds.
    let mut config = synthetic_config(ws_url);
    config.reconnect.initial_ms = 10;
    config.reconnect.max_ms = 20;

    for _ in 0..3 {
        let mut controller = SessionController::new(config.clone());
        let _events = controller.take_event_receiver();
        controller.start().await.expect("start should succeed even if connect later fails");
        tokio::time::sleep(Duration::from_millis(50)).await;
        let started = std::time::Instant::now();
        controller.stop().await.expect("stop should not error");
        assert!(started.elapsed() <= Duration::from_millis(config.stop_timeout_ms + 500));
        assert_eq!(controller.state(), SessionState::Stopped);
    }
}

#[tokio::test]
async fn vad_on_silence_emits_only_the_final_empty_chunk() {
    let (ws_url, mut frames_rx) = spawn_verify_server().await;
    let mut config = synthetic_config(ws_url);
    config.device_id = Some("silence".to_string());
    config.vad.enabled = true;
    config.chunk_ms = 200;

    let mut controller = SessionController::new(config.clone());
    let _events = controller.take_event_receiver();
    controller.start().await.expect("session should start");

    tokio::time::sleep(Duration::from_millis(500)).await;
    controller.stop().await.expect("stop should not error");

    let mut frames = Vec::new();
    while let Ok(frame) = frames_rx.try_recv() {
        frames.push(frame);
    }

    // Spec §8 scenario 2: zero non-final chunks, one final empty chunk.
    let non_final: Vec<_> = frames.iter().filter(|f| !f.is_final).collect();
    assert!(
        non_final.is_empty(),
        "VAD on pure silence must not emit non-final chunks, saw {}",
        non_final.len()
    );
    assert_eq!(frames.iter().filter(|f| f.is_final).count(), 1);
}
