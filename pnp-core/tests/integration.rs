//! Integration tests: session lifecycle, move completion, channel
//! exclusivity and the capture loop, against a scripted transport and a
//! minimal HTTP server on localhost.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pnp_core::camera::ListenerError;
use pnp_core::driver::{FIRESTEP_PATH, HELLO_PATH, MODELS_PATH};
use pnp_core::endpoint::base_url;
use pnp_core::{
    Camera, CameraConfig, ClientConfig, CommandChannel, ConnectionConfig, DriverError,
    DriverSettings, ErrorKind, FireNodeDriver, Frame, HttpImageSource, HttpRequest, LengthUnit,
    Location, MockTransport, Protocol, RawResponse, UreqTransport,
};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// ── Helpers ──────────────────────────────────────────────────────

fn models(major: u32, minor: u32) -> Value {
    json!({"firenodejs": {"version": {"major": major, "minor": minor, "patch": 0}}})
}

/// Controller that accepts everything and reports version 0.14.
fn controller(req: &HttpRequest) -> pnp_core::Result<RawResponse> {
    let body = match req.path() {
        HELLO_PATH => json!({"hello": "firenodejs"}),
        MODELS_PATH => models(0, 14),
        _ => json!({"s": 0, "r": {}}),
    };
    Ok(RawResponse::json(200, &body))
}

fn settings() -> DriverSettings {
    DriverSettings {
        enable_on_connect: false,
        connect_retry_delay: Duration::from_millis(1),
        ..DriverSettings::default()
    }
}

fn connection() -> ConnectionConfig {
    ConnectionConfig::new(Protocol::Http, "pnp.local", 8080)
}

fn driver(mock: &MockTransport, settings: DriverSettings) -> Arc<FireNodeDriver> {
    Arc::new(FireNodeDriver::with_transport(
        connection(),
        settings,
        Arc::new(mock.clone()),
    ))
}

fn mm(x: f64, y: f64, z: f64, rotation: f64) -> Location {
    Location::new(LengthUnit::Millimeters, x, y, z, rotation)
}

fn origin() -> Location {
    Location::zero(LengthUnit::Millimeters)
}

fn firestep_bodies(mock: &MockTransport) -> Vec<Value> {
    mock.requests()
        .iter()
        .filter(|r| r.path() == FIRESTEP_PATH)
        .filter_map(|r| r.json_body().cloned())
        .collect()
}

/// Answer moves with a busy status so the caller has to wait.
fn busy_moves(mock: &MockTransport) {
    mock.set_handler(|req| {
        let busy = req
            .json_body()
            .is_some_and(|b| b.get("mov").is_some() || b.get("hom").is_some());
        if busy {
            Ok(RawResponse::json(200, &json!({"s": 3})))
        } else {
            controller(req)
        }
    });
}

// ── Endpoint ─────────────────────────────────────────────────────

#[test]
fn test_base_url_shape() {
    for (protocol, host, port, expected) in [
        (Protocol::Http, "10.0.0.2", 8080, "http://10.0.0.2:8080"),
        (Protocol::Https, "pnp.local", 443, "https://pnp.local:443"),
        (Protocol::Http, "pnp.local", 0, "http://pnp.local"),
    ] {
        assert_eq!(base_url(protocol, host, port), expected);
    }
}

// ── Handshake ────────────────────────────────────────────────────

#[tokio::test]
async fn test_old_firmware_rejected() {
    let mock = MockTransport::new(|req| {
        let body = match req.path() {
            MODELS_PATH => models(0, 3),
            _ => json!({}),
        };
        Ok(RawResponse::json(200, &body))
    });
    let d = driver(&mock, settings());

    let err = d.connect().await.unwrap_err();
    assert!(matches!(
        err,
        DriverError::VersionTooOld {
            found: 3,
            required: 4
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Version);
    assert!(!d.is_connected());
    // Version errors are not retried.
    assert_eq!(mock.count_path(MODELS_PATH), 1);
}

#[tokio::test]
async fn test_handshake_retries_then_succeeds() {
    let failures = Arc::new(AtomicUsize::new(2));
    let f = failures.clone();
    let mock = MockTransport::new(move |req| {
        if req.path() == HELLO_PATH
            && f.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Ok(RawResponse::json(503, &json!({})));
        }
        controller(req)
    });
    let d = driver(&mock, settings());

    d.connect().await.unwrap();
    assert!(d.is_connected());
    assert_eq!(mock.count_path(HELLO_PATH), 3);
}

#[tokio::test]
async fn test_handshake_gives_up() {
    let mock = MockTransport::new(|_| Ok(RawResponse::headerless(200)));
    let d = driver(&mock, settings());

    let err = d.connect().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connectivity);
    let msg = err.to_string();
    assert!(msg.contains("http://pnp.local:8080"), "{msg}");
    assert!(msg.contains("version 4"), "{msg}");
    assert_eq!(mock.count_path(HELLO_PATH), 3);
    assert!(d.phase().is_disconnected());
}

// ── Motion ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_nan_component_keeps_pose() {
    let mock = MockTransport::new(controller);
    let d = driver(&mock, settings());
    d.connect().await.unwrap();

    d.move_to(&origin(), &mm(10.0, 20.0, 0.0, 0.0), 1.0)
        .await
        .unwrap();
    d.move_to(&origin(), &mm(f64::NAN, 5.0, 0.0, 0.0), 1.0)
        .await
        .unwrap();

    let here = d.location(&origin());
    assert_eq!(here.x, 10.0);
    assert_eq!(here.y, 5.0);
    let last = firestep_bodies(&mock).pop().unwrap();
    assert!(last["mov"].get("x").is_none());
}

#[tokio::test]
async fn test_rotation_epsilon() {
    let mock = MockTransport::new(controller);
    let d = driver(&mock, settings());
    d.connect().await.unwrap();
    mock.clear();

    d.move_to(&origin(), &mm(f64::NAN, f64::NAN, f64::NAN, 0.005), 1.0)
        .await
        .unwrap();
    assert_eq!(mock.request_count(), 0);

    d.move_to(&origin(), &mm(f64::NAN, f64::NAN, f64::NAN, 0.02), 1.0)
        .await
        .unwrap();
    let bodies = firestep_bodies(&mock);
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].get("mova").is_some());
}

#[tokio::test]
async fn test_inch_targets_are_sent_in_millimetres() {
    let mock = MockTransport::new(controller);
    let d = driver(&mock, settings());
    d.connect().await.unwrap();
    mock.clear();

    let target = Location::new(LengthUnit::Inches, 1.0, f64::NAN, f64::NAN, f64::NAN);
    d.move_to(&origin(), &target, 1.0).await.unwrap();
    let sent = firestep_bodies(&mock)[0]["mov"]["x"].as_f64().unwrap();
    assert!((sent - 25.4).abs() < 1e-9);
}

#[tokio::test]
async fn test_busy_move_waits_for_status_report() {
    let mock = MockTransport::new(controller);
    let d = driver(&mock, settings());
    d.connect().await.unwrap();
    busy_moves(&mock);

    let mover = tokio::spawn({
        let d = d.clone();
        async move { d.move_to(&origin(), &mm(50.0, 0.0, 0.0, 0.0), 1.0).await }
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!mover.is_finished());
    assert_eq!(d.location(&origin()).x, 0.0);

    assert!(d.process_status_report(&json!({"stat": 3})));
    tokio::time::timeout(Duration::from_secs(2), mover)
        .await
        .expect("move should finish")
        .unwrap()
        .unwrap();
    assert_eq!(d.location(&origin()).x, 50.0);
}

#[tokio::test]
async fn test_busy_move_times_out() {
    let mock = MockTransport::new(controller);
    let mut s = settings();
    s.movement_timeout = Duration::from_millis(40);
    let d = driver(&mock, s);
    d.connect().await.unwrap();
    busy_moves(&mock);

    let err = d.home().await.unwrap_err();
    assert!(matches!(err, DriverError::CommandTimedOut(_)));
    assert_eq!(err.kind(), ErrorKind::Timeout);
}

#[tokio::test]
async fn test_disconnect_cancels_pending_move() {
    let mock = MockTransport::new(controller);
    let d = driver(&mock, settings());
    d.connect().await.unwrap();
    busy_moves(&mock);

    let mover = tokio::spawn({
        let d = d.clone();
        async move { d.home().await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;

    d.disconnect().await.unwrap();
    let res = tokio::time::timeout(Duration::from_secs(2), mover)
        .await
        .expect("wait should end on disconnect")
        .unwrap();
    assert!(matches!(res, Err(DriverError::Cancelled)));
}

#[tokio::test]
async fn test_status_monitor_resolves_moves() {
    let mock = MockTransport::new(controller);
    let mut s = settings();
    s.status_poll_interval = Duration::from_millis(5);
    let d = driver(&mock, s);

    mock.set_handler(|req| match req.path() {
        "/firestep/model" => Ok(RawResponse::json(200, &json!({"stat": 3}))),
        FIRESTEP_PATH => Ok(RawResponse::json(200, &json!({"s": 3}))),
        _ => controller(req),
    });
    d.connect().await.unwrap();

    tokio::time::timeout(
        Duration::from_secs(2),
        d.move_to(&origin(), &mm(5.0, 5.0, 0.0, 0.0), 1.0),
    )
    .await
    .expect("monitor should resolve the move")
    .unwrap();

    d.disconnect().await.unwrap();
    let polls = mock.count_path("/firestep/model");
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(mock.count_path("/firestep/model"), polls);
}

// ── Actuation ────────────────────────────────────────────────────

#[tokio::test]
async fn test_pin_zero_is_a_no_op() {
    let mock = MockTransport::new(controller);
    let d = driver(&mock, settings());
    d.connect().await.unwrap();
    mock.clear();

    d.actuate(0, true).await.unwrap();
    d.actuate(-1, false).await.unwrap();
    assert_eq!(mock.request_count(), 0);

    d.actuate(7, true).await.unwrap();
    assert_eq!(firestep_bodies(&mock), vec![json!({"iod7": 1})]);
}

#[tokio::test]
async fn test_rejected_actuation_is_typed() {
    let mock = MockTransport::new(controller);
    let d = driver(&mock, settings());
    d.connect().await.unwrap();
    mock.set_handler(|_| Ok(RawResponse::json(200, &json!({"s": -11}))));

    let err = d.actuate(99, true).await.unwrap_err();
    match err {
        DriverError::CommandRejected { code, name } => {
            assert_eq!(code, -11);
            assert_eq!(name, "STATUS_NOPIN");
        }
        other => panic!("unexpected {other:?}"),
    }
}

// ── Channel exclusivity ──────────────────────────────────────────

#[tokio::test]
async fn test_channel_allows_one_request_in_flight() {
    let mock = MockTransport::new(|req| {
        if req.path() == "/camera/image.png" {
            let img = image::RgbaImage::new(4, 4);
            let mut out = std::io::Cursor::new(Vec::new());
            img.write_to(&mut out, image::ImageFormat::Png).unwrap();
            Ok(RawResponse::bytes(200, "image/png", out.into_inner()))
        } else {
            controller(req)
        }
    });
    mock.set_latency(Duration::from_millis(5));

    let channel = Arc::new(CommandChannel::new(Arc::new(mock.clone())));
    let d = Arc::new(FireNodeDriver::with_channel(
        connection(),
        settings(),
        channel.clone(),
    ));
    d.connect().await.unwrap();

    let source = Arc::new(HttpImageSource::new(channel.clone(), "/camera/image.png"));
    let cam = Camera::new(
        source,
        CameraConfig {
            refresh_interval: Duration::from_millis(1),
            ..CameraConfig::default()
        },
    );
    let noop = |_: &Frame| -> Result<(), ListenerError> { Ok(()) };
    let id = cam.start_continuous_capture(Arc::new(noop)).await;

    let mut tasks = Vec::new();
    for pin in 1..=8 {
        let d = d.clone();
        tasks.push(tokio::spawn(async move { d.actuate(pin, true).await }));
    }
    for t in tasks {
        t.await.unwrap().unwrap();
    }
    cam.stop_continuous_capture(id).await;

    assert!(mock.count_path("/camera/image.png") >= 1);
    assert_eq!(mock.max_in_flight(), 1);
}

// ── Capture ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_failing_http_source_gives_sized_placeholder() {
    let mock = MockTransport::new(|_| Ok(RawResponse::json(500, &json!({}))));
    let channel = Arc::new(CommandChannel::new(Arc::new(mock)));
    let cam = Camera::new(
        Arc::new(HttpImageSource::new(channel, "http://camera.local/still.jpg")),
        CameraConfig {
            width: 320,
            height: 240,
            ..CameraConfig::default()
        },
    );

    let frame = cam.capture().await;
    assert!(frame.placeholder);
    assert_eq!(frame.image.dimensions(), (320, 240));
}

#[tokio::test]
async fn test_no_frames_after_stop() {
    let mock = MockTransport::new(|_| Ok(RawResponse::json(500, &json!({}))));
    let channel = Arc::new(CommandChannel::new(Arc::new(mock)));
    let cam = Camera::new(
        Arc::new(HttpImageSource::new(channel, "http://camera.local/still.jpg")),
        CameraConfig {
            width: 8,
            height: 8,
            refresh_interval: Duration::from_millis(2),
        },
    );

    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    let listener = move |_: &Frame| -> Result<(), ListenerError> {
        c.fetch_add(1, Ordering::SeqCst);
        Ok(())
    };

    let id = cam.start_continuous_capture(Arc::new(listener)).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    cam.stop_continuous_capture(id).await;

    let at_stop = count.load(Ordering::SeqCst);
    assert!(at_stop > 0);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(count.load(Ordering::SeqCst), at_stop);
    assert!(!cam.is_capturing());
}

// ── Real HTTP ────────────────────────────────────────────────────

/// Requests being answered right now, and the most seen at once.
#[derive(Default)]
struct ServerLoad {
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// One-request-per-connection HTTP server answering like firenodejs.
async fn spawn_firenodejs() -> u16 {
    spawn_firenodejs_with(Duration::ZERO, Arc::new(ServerLoad::default())).await
}

/// Like [`spawn_firenodejs`], but each answer takes `delay`.
async fn spawn_firenodejs_with(delay: Duration, load: Arc<ServerLoad>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let load = load.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                loop {
                    let n = stream.read(&mut buf[read..]).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    read += n;
                    let text = String::from_utf8_lossy(&buf[..read]);
                    if let Some(end) = text.find("\r\n\r\n") {
                        let length = text[..end]
                            .lines()
                            .find_map(|l| {
                                let (k, v) = l.split_once(':')?;
                                k.eq_ignore_ascii_case("content-length")
                                    .then(|| v.trim().parse::<usize>().ok())
                                    .flatten()
                            })
                            .unwrap_or(0);
                        if read >= end + 4 + length {
                            break;
                        }
                    }
                }

                let now = load.active.fetch_add(1, Ordering::SeqCst) + 1;
                load.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                load.active.fetch_sub(1, Ordering::SeqCst);

                let request = String::from_utf8_lossy(&buf[..read]);
                let path = request.split_whitespace().nth(1).unwrap_or("/");
                let body = match path {
                    HELLO_PATH => json!({"hello": "firenodejs"}),
                    MODELS_PATH => models(0, 17),
                    _ => json!({"s": 0, "r": {}}),
                }
                .to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    port
}

#[tokio::test]
async fn test_session_over_real_http() {
    let port = spawn_firenodejs().await;
    let conn = ConnectionConfig::new(Protocol::Http, "127.0.0.1", port);
    let transport = Arc::new(UreqTransport::new(ClientConfig::from(&conn)));
    let d = FireNodeDriver::with_transport(conn, settings(), transport);

    d.connect().await.unwrap();
    assert_eq!(d.firmware_version().map(|v| v.minor), Some(17));

    d.home().await.unwrap();
    d.move_to(&origin(), &mm(1.0, 2.0, 3.0, 0.0), 0.5)
        .await
        .unwrap();
    assert_eq!(d.location(&origin()).z, 3.0);
    d.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_stopping_capture_mid_fetch_keeps_the_controller_exclusive() {
    let load = Arc::new(ServerLoad::default());
    let port = spawn_firenodejs_with(Duration::from_millis(300), load.clone()).await;
    let conn = ConnectionConfig::new(Protocol::Http, "127.0.0.1", port);
    let channel = Arc::new(CommandChannel::new(Arc::new(UreqTransport::new(
        ClientConfig::from(&conn),
    ))));
    channel.configure(conn.protocol, &conn.host, conn.port);

    let cam = Camera::new(
        Arc::new(HttpImageSource::new(channel.clone(), "/camera/image.png")),
        CameraConfig {
            refresh_interval: Duration::from_millis(1),
            ..CameraConfig::default()
        },
    );
    let noop = |_: &Frame| -> Result<(), ListenerError> { Ok(()) };
    let id = cam.start_continuous_capture(Arc::new(noop)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    cam.stop_continuous_capture(id).await;

    let resp = channel
        .post_json(FIRESTEP_PATH, json!({"iod5": 1}))
        .await
        .unwrap();
    assert_eq!(resp.status_code(), Some(0));
    assert_eq!(load.peak.load(Ordering::SeqCst), 1);
}
