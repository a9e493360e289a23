//! Integration tests for the operation surface: capture, streaming,
//! file management, and observer fan-out, all driven through a scripted
//! fake device on a loopback socket.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::sleep;

use vision_client::{
    ClientConfig, ClientError, RecordingRenderer, SessionState, VisionClient, VisionObserver,
};
use vision_client::AlwaysReachable;
use vision_core::domain::{FileFilter, FileKind};
use vision_core::protocol::messages::OpCode;

// ── Fake device ───────────────────────────────────────────────────────────────

/// A reply plus an optional artificial service delay, applied before the
/// bytes are written back.
struct Reply {
    body: String,
    delay: Duration,
}

impl Reply {
    fn now(body: String) -> Option<Reply> {
        Some(Reply {
            body,
            delay: Duration::ZERO,
        })
    }

    fn after(body: String, delay: Duration) -> Option<Reply> {
        Some(Reply { body, delay })
    }
}

type Responder = dyn Fn(u32, u64, &Value) -> Option<Reply> + Send + Sync;

async fn spawn_device(responder: Arc<Responder>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let responder = Arc::clone(&responder);
            tokio::spawn(handle_connection(stream, responder));
        }
    });
    addr
}

async fn handle_connection(mut stream: tokio::net::TcpStream, responder: Arc<Responder>) {
    let mut buf: Vec<u8> = Vec::new();
    let mut tmp = [0u8; 4096];
    loop {
        let n = match stream.read(&mut tmp).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&tmp[..n]);

        loop {
            let (value, consumed) = {
                let mut iter = serde_json::Deserializer::from_slice(&buf).into_iter::<Value>();
                match iter.next() {
                    Some(Ok(value)) => (value, iter.byte_offset()),
                    _ => break,
                }
            };
            buf.drain(..consumed);

            let msg_id = value["msg_id"].as_u64().unwrap_or(0) as u32;
            let seq = value["seq"].as_u64().unwrap_or(0);
            if let Some(reply) = responder(msg_id, seq, &value) {
                if !reply.delay.is_zero() {
                    sleep(reply.delay).await;
                }
                if stream.write_all(reply.body.as_bytes()).await.is_err() {
                    return;
                }
            }
        }
    }
}

fn ok_reply(msg_id: u32, seq: u64) -> String {
    format!(r#"{{"msg_id":{msg_id},"seq":{seq},"rval":0}}"#)
}

fn session_reply(seq: u64) -> String {
    format!(r#"{{"msg_id":257,"seq":{seq},"rval":0,"param":12345}}"#)
}

fn photo_reply(seq: u64) -> String {
    format!(
        r#"{{"msg_id":769,"seq":{seq},"rval":0,"url":"http://192.168.42.1/DCIM/100MEDIA/IMG_0001.JPG","thumbnailUrl":"http://192.168.42.1/DCIM/100MEDIA/IMG_0001_THUMB.JPG","fileType":2}}"#
    )
}

fn listing_reply(seq: u64, offset: u64) -> String {
    if offset == 0 {
        let files: Vec<String> = (1..=5)
            .map(|i| {
                format!(
                    r#"{{"name":"IMG_000{i}.JPG","path":"/DCIM/100MEDIA/","size":102400,"time":"2023-05-01 12:00:0{i}","type":2,"url":"http://192.168.42.1/DCIM/100MEDIA/IMG_000{i}.JPG"}}"#
                )
            })
            .collect();
        format!(
            r#"{{"msg_id":1281,"seq":{seq},"rval":0,"total":5,"files":[{}]}}"#,
            files.join(",")
        )
    } else {
        format!(r#"{{"msg_id":1281,"seq":{seq},"rval":0,"total":5,"files":[]}}"#)
    }
}

/// Everything a cooperative device answers instantly.
fn full_responder(msg_id: u32, seq: u64, request: &Value) -> Option<Reply> {
    match msg_id {
        257 => Reply::now(session_reply(seq)),
        1 | 258 | 260 | 102 | 513 | 1282 => Reply::now(ok_reply(msg_id, seq)),
        11 => Reply::now(format!(
            r#"{{"msg_id":11,"seq":{seq},"camera_type":"F6S","firm_ver":"V1.0.0","firm_date":"2023-01-01","param_version":"1.0","serial_num":"SN12345678","verify_code":"VC12345678"}}"#
        )),
        100 => Reply::now(format!(
            r#"{{"msg_id":100,"seq":{seq},"rval":0,"total_space":32768,"free_space":16384,"health_status":"good","residual_life":"80%"}}"#
        )),
        259 => Reply::now(format!(
            r#"{{"msg_id":259,"seq":{seq},"rval":0,"url":"rtsp://192.168.42.1/ch1/sub/av_stream"}}"#
        )),
        769 => Reply::now(photo_reply(seq)),
        1281 => Reply::now(listing_reply(seq, request["offset"].as_u64().unwrap_or(0))),
        1283 => Reply::now(format!(
            r#"{{"msg_id":1283,"seq":{seq},"rval":0,"url":"http://192.168.42.1/DCIM/100MEDIA/IMG_0001.JPG"}}"#
        )),
        _ => None,
    }
}

fn test_config(addr: SocketAddr) -> ClientConfig {
    ClientConfig {
        device_addr: addr.to_string(),
        connect_timeout_ms: 500,
        request_timeout_ms: 500,
        slow_request_timeout_ms: 800,
        heartbeat_interval_secs: 600,
        ..ClientConfig::default()
    }
}

async fn connected_client(addr: SocketAddr) -> (Arc<VisionClient>, Arc<RecordingRenderer>) {
    let renderer = Arc::new(RecordingRenderer::new());
    let client = VisionClient::with_collaborators(
        test_config(addr),
        renderer.clone(),
        Arc::new(AlwaysReachable),
    )
    .unwrap();
    client.connect().await.expect("connect must succeed");
    (Arc::new(client), renderer)
}

// ── Event recording observer ──────────────────────────────────────────────────

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn count_with_prefix(&self, prefix: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    async fn wait_for(&self, needle: &str) {
        for _ in 0..200 {
            if self.events().iter().any(|e| e.starts_with(needle)) {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("no event starting with {needle:?}; saw {:?}", self.events());
    }
}

impl VisionObserver for EventLog {
    fn on_photo_taken(&self, photo: &vision_core::domain::CapturedPhoto) {
        self.push(format!("photo_taken:{}", photo.url));
    }
    fn on_photo_failed(&self, reason: &str) {
        self.push(format!("photo_failed:{reason}"));
    }
    fn on_stream_started(&self, url: &str) {
        self.push(format!("stream_started:{url}"));
    }
    fn on_stream_stopped(&self) {
        self.push("stream_stopped");
    }
    fn on_event_recorded(&self) {
        self.push("event_recorded");
    }
    fn on_event_record_failed(&self, reason: &str) {
        self.push(format!("event_record_failed:{reason}"));
    }
    fn on_sd_card_formatted(&self) {
        self.push("sd_card_formatted");
    }
    fn on_file_list(&self, files: &[vision_core::domain::DeviceFile], total: u32) {
        self.push(format!("file_list:{}:{total}", files.len()));
    }
    fn on_file_deleted(&self, name: &str) {
        self.push(format!("file_deleted:{name}"));
    }
    fn on_file_download_url(&self, url: &str) {
        self.push(format!("file_download_url:{url}"));
    }
    fn on_device_info(&self, info: &vision_core::domain::DeviceInfo) {
        self.push(format!("device_info:{}", info.camera_type));
    }
    fn on_sd_card_info(&self, _info: &vision_core::domain::SdCardInfo) {
        self.push("sd_card_info");
    }
    fn on_sd_card_removed(&self) {
        self.push("sd_card_removed");
    }
    fn on_snapshot_taken(&self, path: &str) {
        self.push(format!("snapshot_taken:{path}"));
    }
}

// ── Capture and info operations ───────────────────────────────────────────────

#[tokio::test]
async fn test_take_photo_resolves_and_notifies_observers() {
    let addr = spawn_device(Arc::new(full_responder)).await;
    let (client, _renderer) = connected_client(addr).await;
    let log = Arc::new(EventLog::default());
    client.add_observer(log.clone()).await.unwrap();

    let photo = client.take_photo().await.expect("photo must succeed");
    assert_eq!(photo.url, "http://192.168.42.1/DCIM/100MEDIA/IMG_0001.JPG");
    assert!(photo.thumbnail_url.is_some());
    log.wait_for("photo_taken").await;
}

#[tokio::test]
async fn test_info_queries_decode_domain_snapshots() {
    let addr = spawn_device(Arc::new(full_responder)).await;
    let (client, _renderer) = connected_client(addr).await;
    let log = Arc::new(EventLog::default());
    client.add_observer(log.clone()).await.unwrap();

    let device = client.device_info().await.unwrap();
    assert_eq!(device.camera_type, "F6S");
    assert_eq!(device.serial_number, "SN12345678");

    let card = client.sd_card_info().await.unwrap();
    assert_eq!(card.total_bytes, 32768 * 1024 * 1024);
    assert_eq!(card.free_bytes, 16384 * 1024 * 1024);

    log.wait_for("device_info:F6S").await;
    log.wait_for("sd_card_info").await;
}

#[tokio::test]
async fn test_record_event_and_format_sd_round_trip() {
    let addr = spawn_device(Arc::new(full_responder)).await;
    let (client, _renderer) = connected_client(addr).await;
    let log = Arc::new(EventLog::default());
    client.add_observer(log.clone()).await.unwrap();

    client.record_event().await.unwrap();
    client.format_sd_card().await.unwrap();

    log.wait_for("event_recorded").await;
    log.wait_for("sd_card_formatted").await;
}

#[tokio::test]
async fn test_device_rejection_surfaces_documented_reason() {
    let addr = spawn_device(Arc::new(|msg_id: u32, seq: u64, _: &Value| match msg_id {
        257 => Reply::now(session_reply(seq)),
        1 => Reply::now(ok_reply(1, seq)),
        513 => Reply::now(format!(r#"{{"msg_id":513,"seq":{seq},"rval":-1}}"#)),
        _ => None,
    }))
    .await;
    let (client, _renderer) = connected_client(addr).await;
    let log = Arc::new(EventLog::default());
    client.add_observer(log.clone()).await.unwrap();

    let result = client.record_event().await;
    assert!(matches!(
        result,
        Err(ClientError::DeviceRejected {
            op: OpCode::EventRecord,
            code: -1
        })
    ));
    log.wait_for("event_record_failed:SD card is full").await;
    // One operation failing never tears down the session.
    assert!(client.state().await.unwrap().is_connected());
}

#[tokio::test]
async fn test_request_timeout_resolves_without_retry() {
    let addr = spawn_device(Arc::new(|msg_id: u32, seq: u64, _: &Value| match msg_id {
        257 => Reply::now(session_reply(seq)),
        1 => Reply::now(ok_reply(1, seq)),
        _ => None,
    }))
    .await;
    let (client, _renderer) = connected_client(addr).await;
    let log = Arc::new(EventLog::default());
    client.add_observer(log.clone()).await.unwrap();

    let result = client.take_photo().await;
    assert!(matches!(
        result,
        Err(ClientError::RequestTimeout(OpCode::TakePhoto))
    ));
    log.wait_for("photo_failed:timed out").await;

    // The connection survives a single request timing out.
    assert!(client.state().await.unwrap().is_connected());
    sleep(Duration::from_millis(300)).await;
    assert_eq!(log.count_with_prefix("photo_failed"), 1, "no retry");
}

// ── Streaming ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_stream_hands_url_to_renderer() {
    let addr = spawn_device(Arc::new(full_responder)).await;
    let (client, renderer) = connected_client(addr).await;
    let log = Arc::new(EventLog::default());
    client.add_observer(log.clone()).await.unwrap();

    client.start_stream().await.unwrap();
    assert_eq!(
        client.state().await.unwrap(),
        SessionState::Connected { streaming: true }
    );
    assert_eq!(
        renderer.started_urls(),
        vec!["rtsp://192.168.42.1/ch1/sub/av_stream"]
    );
    log.wait_for("stream_started:rtsp://").await;

    client.stop_stream().await.unwrap();
    assert_eq!(
        client.state().await.unwrap(),
        SessionState::Connected { streaming: false }
    );
    assert_eq!(renderer.stop_calls(), 1);
    log.wait_for("stream_stopped").await;
}

#[tokio::test]
async fn test_second_start_stream_while_pending_is_rejected() {
    // StartStream takes 300 ms to answer; everything else is instant.
    let addr = spawn_device(Arc::new(|msg_id: u32, seq: u64, request: &Value| {
        if msg_id == 259 {
            Reply::after(
                format!(r#"{{"msg_id":259,"seq":{seq},"rval":0}}"#),
                Duration::from_millis(300),
            )
        } else {
            full_responder(msg_id, seq, request)
        }
    }))
    .await;
    let (client, renderer) = connected_client(addr).await;

    let first = tokio::spawn({
        let client = Arc::clone(&client);
        async move { client.start_stream().await }
    });
    sleep(Duration::from_millis(100)).await;

    let second = client.start_stream().await;
    assert!(matches!(
        second,
        Err(ClientError::OperationInProgress(OpCode::StartStream))
    ));

    // The first call resolves exactly once, successfully.
    first.await.unwrap().expect("first start must succeed");
    assert_eq!(renderer.started_urls().len(), 1);
}

#[tokio::test]
async fn test_snapshot_delegates_to_renderer() {
    let addr = spawn_device(Arc::new(full_responder)).await;
    let (client, _renderer) = connected_client(addr).await;
    let log = Arc::new(EventLog::default());
    client.add_observer(log.clone()).await.unwrap();

    client.start_stream().await.unwrap();
    let path = client.take_snapshot().await.unwrap();
    assert!(path.contains("snapshot"));
    log.wait_for("snapshot_taken:").await;
}

// ── File management ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_files_returns_one_chunk_per_call() {
    let addr = spawn_device(Arc::new(full_responder)).await;
    let (client, _renderer) = connected_client(addr).await;
    let log = Arc::new(EventLog::default());
    client.add_observer(log.clone()).await.unwrap();

    let first = client.list_files(FileFilter::Photo, 0, 20).await.unwrap();
    assert_eq!(first.files.len(), 5);
    assert_eq!(first.total, 5);

    let second = client.list_files(FileFilter::Photo, 5, 20).await.unwrap();
    assert!(second.files.is_empty());
    assert_eq!(second.total, 5);

    log.wait_for("file_list:5:5").await;
    log.wait_for("file_list:0:5").await;
    assert_eq!(log.count_with_prefix("file_list"), 2);
}

#[tokio::test]
async fn test_filtered_listing_passes_mixed_kinds_through() {
    // A photo-filtered request that still returns a video entry.
    let addr = spawn_device(Arc::new(|msg_id: u32, seq: u64, request: &Value| {
        if msg_id == 1281 {
            Reply::now(format!(
                r#"{{"msg_id":1281,"seq":{seq},"rval":0,"total":2,"files":[
                    {{"name":"IMG_0001.JPG","size":100,"time":"t","type":2,"url":"u1"}},
                    {{"name":"MOV_0001.MP4","size":900,"time":"t","type":1,"url":"u2"}}
                ]}}"#
            ))
        } else {
            full_responder(msg_id, seq, request)
        }
    }))
    .await;
    let (client, _renderer) = connected_client(addr).await;

    let chunk = client.list_files(FileFilter::Photo, 0, 20).await.unwrap();
    assert_eq!(chunk.files.len(), 2);
    assert_eq!(chunk.files[0].kind, FileKind::Photo);
    assert_eq!(chunk.files[1].kind, FileKind::Video);
}

#[tokio::test]
async fn test_delete_and_download_url_round_trip() {
    let addr = spawn_device(Arc::new(full_responder)).await;
    let (client, _renderer) = connected_client(addr).await;
    let log = Arc::new(EventLog::default());
    client.add_observer(log.clone()).await.unwrap();

    client.delete_file("IMG_0001.JPG").await.unwrap();
    log.wait_for("file_deleted:IMG_0001.JPG").await;

    let url = client.download_url("IMG_0001.JPG").await.unwrap();
    assert_eq!(url, "http://192.168.42.1/DCIM/100MEDIA/IMG_0001.JPG");
    log.wait_for("file_download_url:").await;
}

#[tokio::test]
async fn test_delete_file_while_disconnected_never_reaches_transport() {
    let seen = Arc::new(Mutex::new(Vec::<u32>::new()));
    let responder = {
        let seen = Arc::clone(&seen);
        Arc::new(move |msg_id: u32, seq: u64, _: &Value| {
            seen.lock().unwrap().push(msg_id);
            match msg_id {
                257 => Reply::now(session_reply(seq)),
                _ => Reply::now(ok_reply(msg_id, seq)),
            }
        })
    };
    let addr = spawn_device(responder).await;
    let client = VisionClient::new(test_config(addr)).unwrap();

    let result = client.delete_file("a.jpg").await;
    assert!(matches!(result, Err(ClientError::Disconnected)));
    sleep(Duration::from_millis(100)).await;
    assert!(seen.lock().unwrap().is_empty(), "nothing may reach the wire");
}

// ── Observer fan-out ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_removed_observer_receives_no_further_events() {
    let addr = spawn_device(Arc::new(full_responder)).await;
    let (client, _renderer) = connected_client(addr).await;

    let first = Arc::new(EventLog::default());
    let second = Arc::new(EventLog::default());
    let first_id = client.add_observer(first.clone()).await.unwrap();
    client.add_observer(second.clone()).await.unwrap();

    client.take_photo().await.unwrap();
    first.wait_for("photo_taken").await;
    second.wait_for("photo_taken").await;

    assert!(client.remove_observer(first_id).await.unwrap());
    client.take_photo().await.unwrap();

    sleep(Duration::from_millis(200)).await;
    assert_eq!(first.count_with_prefix("photo_taken"), 1);
    assert_eq!(second.count_with_prefix("photo_taken"), 2);
}

#[tokio::test]
async fn test_notification_coalesced_with_response_routes_to_event() {
    // The photo reply arrives glued to an SD-removal notification in one
    // TCP segment; both must be handled.
    let addr = spawn_device(Arc::new(|msg_id: u32, seq: u64, request: &Value| {
        if msg_id == 769 {
            Reply::now(format!(
                r#"{}{{"msg_id":7,"type":"SD_rm"}}"#,
                photo_reply(seq)
            ))
        } else {
            full_responder(msg_id, seq, request)
        }
    }))
    .await;
    let (client, _renderer) = connected_client(addr).await;
    let log = Arc::new(EventLog::default());
    client.add_observer(log.clone()).await.unwrap();

    client.take_photo().await.unwrap();
    log.wait_for("photo_taken").await;
    log.wait_for("sd_card_removed").await;
}
