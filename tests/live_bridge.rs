//! End-to-end tests against a local WebSocket bridge
//!
//! Each test starts a tokio-tungstenite server on an ephemeral port that plays
//! the part of the simulator bridge, then drives a real `LiveTiming` session
//! against it.

use futures::{SinkExt, StreamExt};
use lapclock::{
    BridgeConfig, ClockState, ConnectionState, LiveTiming, MemoryLapStore, NoticeLevel,
    SessionContext, SessionKind, TimingView, UpdateRate,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

fn sample(speed_kmh: f64, current_time_ms: i64) -> String {
    json!({
        "connected": true,
        "physics": { "speedKmh": speed_kmh, "gear": 5, "rpms": 7800, "gas": 1.0, "brake": 0.0 },
        "graphics": { "iCurrentTime": current_time_ms },
        "static": { "carModel": "ferrari_488_gt3", "track": "monza" }
    })
    .to_string()
}

/// Serve one client: send `frames`, then either wait for the client to close
/// or, once `hang_up` fires, close from the bridge side.
async fn bridge(frames: Vec<String>, hang_up: Option<oneshot::Receiver<()>>) -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        for frame in frames {
            ws.send(Message::text(frame)).await.unwrap();
        }

        match hang_up {
            Some(hang_up) => {
                let _ = hang_up.await;
                let _ = ws.close(None).await;
            }
            None => {
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_close() {
                        break;
                    }
                }
            }
        }
    });

    (port, task)
}

fn timing(port: u16) -> LiveTiming {
    LiveTiming::builder()
        .config(BridgeConfig { port, ..Default::default() })
        .lap_store(Arc::new(MemoryLapStore::new()))
        .context(SessionContext::new("monza", "ferrari_488_gt3", SessionKind::Race))
        .spawn()
        .unwrap()
}

async fn wait_for(timing: &LiveTiming, check: impl Fn(&TimingView) -> bool) -> Arc<TimingView> {
    let mut updates = timing.updates(UpdateRate::Native);
    tokio::time::timeout(WAIT, async {
        while let Some(view) = updates.next().await {
            if check(&view) {
                return view;
            }
        }
        panic!("view stream ended");
    })
    .await
    .expect("view never reached the expected state")
}

#[tokio::test]
async fn streams_telemetry_from_bridge() {
    let (port, server) = bridge(vec![sample(142.7, 45230)], None).await;
    let timing = timing(port);
    let mut notices = timing.notices();

    timing.connect(Some("ws://127.0.0.1:8000")).await.unwrap();

    let notice = tokio::time::timeout(WAIT, notices.next()).await.unwrap().unwrap();
    assert_eq!(notice.level, NoticeLevel::Success);

    let view = wait_for(&timing, |v| v.elapsed_ms == 45230).await;
    assert_eq!(view.connection, ConnectionState::Connected);
    assert_eq!(view.clock, ClockState::RunningExternal);
    assert_eq!(view.telemetry.speed_kmh, 143);
    assert_eq!(view.sim.track.as_deref(), Some("monza"));
    assert_eq!(view.address.as_ref().map(|a| a.host()), Some("127.0.0.1"));

    timing.shutdown().await;
    tokio::time::timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn bridge_hang_up_keeps_clock_running() {
    let (hang_up, hang_up_rx) = oneshot::channel();
    let (port, server) = bridge(vec![sample(180.0, 30000)], Some(hang_up_rx)).await;
    let timing = timing(port);

    timing.connect(Some("127.0.0.1")).await.unwrap();
    wait_for(&timing, |v| v.elapsed_ms == 30000).await;

    let mut notices = timing.notices();
    hang_up.send(()).unwrap();

    let view = wait_for(&timing, |v| v.connection == ConnectionState::Disconnected).await;
    assert_eq!(view.clock, ClockState::RunningInternal);
    wait_for(&timing, |v| v.elapsed_ms > 30000).await;

    let notice = tokio::time::timeout(WAIT, notices.next()).await.unwrap().unwrap();
    assert_eq!(notice.level, NoticeLevel::Info);

    timing.shutdown().await;
    server.await.unwrap();
}

#[tokio::test]
async fn refused_connection_is_reported() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let timing = timing(port);
    let mut notices = timing.notices();

    timing.connect(Some("127.0.0.1")).await.unwrap();

    let notice = tokio::time::timeout(WAIT, notices.next()).await.unwrap().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.title, "Could not connect");
    assert_eq!(timing.view().connection, ConnectionState::Disconnected);
}

#[tokio::test]
async fn captured_laps_reach_the_store() {
    let frames = vec![sample(200.0, 91234)];
    let (port, server) = bridge(frames, None).await;
    let store = Arc::new(MemoryLapStore::new());
    let timing = LiveTiming::builder()
        .config(BridgeConfig { port, ..Default::default() })
        .lap_store(store.clone())
        .context(SessionContext::new("spa", "bmw_m4_gt3", SessionKind::Qualifying))
        .spawn()
        .unwrap();

    timing.connect(Some("127.0.0.1")).await.unwrap();
    wait_for(&timing, |v| v.elapsed_ms == 91234).await;

    let lap = timing.lap().await.unwrap().unwrap();
    assert_eq!(lap.elapsed_ms, 91234);

    let report = timing.flush().await.unwrap();
    assert_eq!(report.saved.len(), 1);

    let records = store.records().await;
    assert_eq!(records.len(), 1);
    let json = serde_json::to_value(&records[0]).unwrap();
    assert_eq!(json["circuitId"], "spa");
    assert_eq!(json["time"], 91234);
    assert_eq!(json["type"], "qualifying");
    assert_eq!(json["carModel"], "bmw_m4_gt3");

    timing.shutdown().await;
    server.await.unwrap();
}
