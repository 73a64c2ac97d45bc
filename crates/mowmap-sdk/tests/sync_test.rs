//! Map sync against an in-process mock backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use mowmap_core::features::{DOCK_ID, MOWER_HEADING_ID, MOWER_ID};
use mowmap_core::models::{AbsolutePose, AddMowingAreaRequest, MapSnapshot};
use mowmap_core::MapError;
use mowmap_sdk::notify::Level;
use mowmap_sdk::stream::encode_frame;
use mowmap_sdk::{MapSyncService, SyncConfig};

struct Backend {
    settings: Value,
    fail_delete: Option<usize>,
    close_streams: bool,
    mistyped_pose_first: bool,
    calls: Mutex<Vec<String>>,
    config: Mutex<HashMap<String, String>>,
}

impl Backend {
    fn new() -> Self {
        let mut config = HashMap::new();
        config.insert("gui.map.offset.x".to_string(), "0.5".to_string());
        config.insert("gui.map.offset.y".to_string(), "not a number".to_string());
        Self {
            settings: json!({"OM_DATUM_LONG": "2.0", "OM_DATUM_LAT": "43.0"}),
            fail_delete: None,
            close_streams: false,
            mistyped_pose_first: false,
            calls: Mutex::new(Vec::new()),
            config: Mutex::new(config),
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn map_frame() -> Value {
    let square = |x0: f64| {
        json!({"Points": [
            {"X": x0, "Y": 0.0}, {"X": x0 + 10.0, "Y": 0.0},
            {"X": x0 + 10.0, "Y": 10.0}, {"X": x0, "Y": 10.0}
        ]})
    };
    json!({
        "MapWidth": 60.0, "MapHeight": 20.0, "MapCenterX": 20.0, "MapCenterY": 5.0,
        "WorkingArea": [
            {"Name": "front", "Area": square(0.0), "Obstacles": [{"Points": [
                {"X": 2.0, "Y": 2.0}, {"X": 3.0, "Y": 2.0}, {"X": 3.0, "Y": 3.0}
            ]}]},
            {"Name": "back", "Area": square(20.0), "Obstacles": null}
        ],
        "NavigationAreas": [{"Area": square(40.0)}],
        "DockX": 1.0, "DockY": -1.0, "DockHeading": 1.5707963267948966
    })
}

fn pose_frame(x: f64) -> Value {
    json!({
        "Flags": 3,
        "Pose": {"Pose": {"Position": {"X": x, "Y": 5.0, "Z": 0.0}}},
        "MotionHeading": 0.0
    })
}

fn frames_for(topic: &str, backend: &Backend) -> Vec<Value> {
    match topic {
        "pose" if backend.mistyped_pose_first => vec![json!({"Flags": "oops"}), pose_frame(4.0)],
        "pose" => vec![pose_frame(4.0)],
        "map" => vec![map_frame()],
        "plan" => vec![json!({"Poses": [
            {"Pose": {"Position": {"X": 0.0, "Y": 0.0}}},
            {"Pose": {"Position": {"X": 5.0, "Y": 5.0}}}
        ]})],
        _ => Vec::new(),
    }
}

async fn settings(State(backend): State<Arc<Backend>>) -> Json<Value> {
    Json(json!({ "settings": backend.settings }))
}

async fn keys_get(
    State(backend): State<Arc<Backend>>,
    Json(request): Json<HashMap<String, String>>,
) -> Json<HashMap<String, String>> {
    let config = backend.config.lock().unwrap();
    Json(
        request
            .into_keys()
            .map(|k| {
                let v = config.get(&k).cloned().unwrap_or_default();
                (k, v)
            })
            .collect(),
    )
}

async fn keys_set(
    State(backend): State<Arc<Backend>>,
    Json(request): Json<HashMap<String, String>>,
) -> Json<HashMap<String, String>> {
    backend.config.lock().unwrap().extend(request.clone());
    Json(request)
}

async fn add_area(
    State(backend): State<Arc<Backend>>,
    Json(request): Json<AddMowingAreaRequest>,
) -> Json<Value> {
    let kind = if request.is_navigation_area { "nav" } else { "area" };
    backend.record(format!(
        "add:{}:{}:{}",
        kind,
        request.area.name,
        request.area.obstacles.len()
    ));
    Json(json!({"ok": "area added"}))
}

async fn delete_area(State(backend): State<Arc<Backend>>, Path(index): Path<usize>) -> Response {
    if backend.fail_delete == Some(index) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "service call failed"})),
        )
            .into_response();
    }
    backend.record(format!("delete:{index}"));
    Json(json!({"ok": "deleted"})).into_response()
}

async fn docking(State(backend): State<Arc<Backend>>, Json(request): Json<Value>) -> Json<Value> {
    let w = request["dockingPose"]["orientation"]["w"].as_f64().unwrap_or(f64::NAN);
    backend.record(format!("dock:{w:.3}"));
    Json(json!({"ok": "docking set"}))
}

async fn subscribe(
    State(backend): State<Arc<Backend>>,
    Path(topic): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| stream_topic(socket, backend, topic))
}

async fn stream_topic(mut socket: WebSocket, backend: Arc<Backend>, topic: String) {
    for frame in frames_for(&topic, &backend) {
        let payload = encode_frame(&frame.to_string());
        if socket.send(Message::Text(payload)).await.is_err() {
            return;
        }
    }
    if backend.close_streams {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    while let Some(Ok(msg)) = socket.recv().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }
}

async fn spawn_backend(backend: Backend) -> (String, Arc<Backend>) {
    let backend = Arc::new(backend);
    let app = Router::new()
        .route("/api/settings", get(settings))
        .route("/api/config/keys/get", post(keys_get))
        .route("/api/config/keys/set", post(keys_set))
        .route("/api/openmower/map/area/add", post(add_area))
        .route("/api/openmower/map/area/:index", delete(delete_area))
        .route("/api/openmower/map/docking", post(docking))
        .route("/api/openmower/subscribe/:topic", get(subscribe))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), backend)
}

fn config_for(base_url: String) -> SyncConfig {
    SyncConfig {
        base_url,
        request_timeout: Duration::from_secs(5),
        ..SyncConfig::default()
    }
}

#[tokio::test]
async fn connect_reads_datum_and_offsets() {
    let (url, _backend) = spawn_backend(Backend::new()).await;
    let service = MapSyncService::connect(config_for(url)).await.unwrap();

    assert_eq!(service.datum().zone_label(), "31T");
    let offsets = service.offsets();
    assert_eq!(offsets.x, 0.5);
    assert_eq!(offsets.y, 0.0);
}

#[tokio::test]
async fn unset_datum_is_not_ready() {
    let mut backend = Backend::new();
    backend.settings = json!({"OM_DATUM_LONG": "2.0", "OM_DATUM_LAT": "0"});
    let (url, _backend) = spawn_backend(backend).await;

    let err = match MapSyncService::connect(config_for(url)).await {
        Ok(_) => panic!("connect should fail without a datum"),
        Err(e) => e,
    };
    assert!(matches!(err.downcast_ref::<MapError>(), Some(MapError::NotReady(_))));
}

#[tokio::test]
async fn save_adds_then_deletes_then_docks() {
    let (url, backend) = spawn_backend(Backend::new()).await;
    let service = MapSyncService::connect(config_for(url)).await.unwrap();
    service.refresh_map().await.unwrap();

    let features = service.features();
    assert!(features.contains_key("area-0-obstacle-0"));
    let report = service.save(&features).await.unwrap();
    assert_eq!(report.added, 3);
    assert_eq!(report.deleted, 3);

    assert_eq!(
        backend.calls(),
        vec![
            "add:area:front:1",
            "add:area:back:0",
            "add:nav::0",
            "delete:2",
            "delete:1",
            "delete:0",
            "dock:0.707",
        ]
    );
}

#[tokio::test]
async fn failed_delete_aborts_and_reports_progress() {
    let mut backend = Backend::new();
    backend.fail_delete = Some(1);
    let (url, backend) = spawn_backend(backend).await;
    let service = MapSyncService::connect(config_for(url)).await.unwrap();
    let mut notifications = service.notifier().subscribe();
    service.refresh_map().await.unwrap();

    let err = service.save(&service.features()).await.unwrap_err();
    assert_eq!(err.completed_adds, 3);
    assert_eq!(err.completed_deletes, 1);
    assert!(err.source.to_string().contains("service call failed"));
    assert!(!backend.calls().iter().any(|c| c.starts_with("dock")));

    let note = notifications.recv().await.unwrap();
    assert_eq!(note.level, Level::Error);
    assert_eq!(note.message, "Failed to save area");
}

#[tokio::test]
async fn offsets_are_persisted_and_reapplied() {
    let (url, backend) = spawn_backend(Backend::new()).await;
    let service = MapSyncService::connect(config_for(url)).await.unwrap();
    service.refresh_map().await.unwrap();
    let before = service.feature(DOCK_ID).unwrap();

    service
        .set_offsets(mowmap_core::Offsets::new(1.0, 1.0))
        .await
        .unwrap();

    assert_eq!(
        backend.config.lock().unwrap().get("gui.map.offset.y").map(String::as_str),
        Some("1")
    );
    assert_ne!(service.feature(DOCK_ID).unwrap(), before);
}

#[tokio::test]
async fn run_applies_frames_until_shutdown() {
    let (url, _backend) = spawn_backend(Backend::new()).await;
    let service = Arc::new(MapSyncService::connect(config_for(url)).await.unwrap());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let runner = service.clone();
    let handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

    let mut ready = false;
    for _ in 0..100 {
        if service.feature(MOWER_ID).is_some()
            && service.feature("area-1").is_some()
            && service.feature("plan").is_some()
        {
            ready = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(ready, "frames were not applied");
    assert!(service.feature(MOWER_HEADING_ID).is_some());
    assert!(service.map_bounds().is_some());

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn closed_stream_is_reported() {
    let mut backend = Backend::new();
    backend.close_streams = true;
    let (url, _backend) = spawn_backend(backend).await;
    let service = MapSyncService::connect(config_for(url)).await.unwrap();
    let mut notifications = service.notifier().subscribe();
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

    tokio::time::timeout(Duration::from_secs(5), service.run(shutdown_rx))
        .await
        .expect("run returns once a stream closes")
        .unwrap();

    let mut messages = Vec::new();
    while let Ok(note) = notifications.try_recv() {
        messages.push(note.message);
    }
    assert!(messages.contains(&"Stream connected".to_string()));
    assert!(messages.contains(&"Stream closed".to_string()));
}

#[tokio::test]
async fn save_before_any_map_frame_is_refused() {
    let (url, backend) = spawn_backend(Backend::new()).await;
    let service = MapSyncService::connect(config_for(url.clone())).await.unwrap();

    // Features from a second service that has seen the map.
    let loaded = MapSyncService::connect(config_for(url)).await.unwrap();
    loaded.refresh_map().await.unwrap();
    let features = loaded.features();

    let err = service.save(&features).await.unwrap_err();
    assert_eq!(err.completed_adds, 0);
    assert_eq!(err.completed_deletes, 0);
    assert!(matches!(
        err.source.downcast_ref::<MapError>(),
        Some(MapError::NotReady(_))
    ));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn mistyped_frame_is_skipped_and_run_continues() {
    let mut backend = Backend::new();
    backend.mistyped_pose_first = true;
    let (url, _backend) = spawn_backend(backend).await;
    let service = Arc::new(MapSyncService::connect(config_for(url)).await.unwrap());
    let mut notifications = service.notifier().subscribe();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let runner = service.clone();
    let handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

    let mut applied = false;
    for _ in 0..100 {
        if service.feature(MOWER_ID).is_some() {
            applied = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(applied, "pose after the mistyped frame was not applied");
    assert!(!handle.is_finished());

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    let mut errors = Vec::new();
    while let Ok(note) = notifications.try_recv() {
        if note.level == Level::Error {
            errors.push(note.message);
        }
    }
    assert!(errors.is_empty(), "{errors:?}");
}

#[tokio::test]
async fn editor_updates_only_touch_named_features() {
    let (url, _backend) = spawn_backend(Backend::new()).await;
    let service = MapSyncService::connect(config_for(url)).await.unwrap();
    service.refresh_map().await.unwrap();

    let pose_at = |x: f64| -> AbsolutePose { serde_json::from_value(pose_frame(x)).unwrap() };
    let mut update = service.feature("area-0").unwrap().to_geojson();
    if let Some(geojson::Geometry {
        value: geojson::Value::Polygon(rings),
        ..
    }) = update.geometry.as_mut()
    {
        rings[0][1][0] += 0.00001;
    }
    let stale_back = service.feature("area-1").unwrap().to_geojson();

    // Poses and editor updates race; the newest pose must win.
    std::thread::scope(|s| {
        s.spawn(|| {
            for i in 0..200 {
                service.apply_pose(&pose_at(i as f64)).unwrap();
            }
        });
        s.spawn(|| {
            for _ in 0..200 {
                service.apply_editor_update(std::slice::from_ref(&update));
            }
        });
    });
    let settled = service.feature(MOWER_ID).unwrap();
    service.apply_pose(&pose_at(199.0)).unwrap();
    assert_eq!(service.feature(MOWER_ID).unwrap(), settled);

    let edited = service.feature("area-0").unwrap();
    assert_eq!(edited.to_geojson().geometry, update.geometry);

    // A map frame without the second area removes it for good.
    let mut frame = map_frame();
    frame["WorkingArea"].as_array_mut().unwrap().pop();
    let map: MapSnapshot = serde_json::from_value(frame).unwrap();
    service.apply_map(map).unwrap();
    service.apply_editor_update(&[stale_back]);
    assert!(service.feature("area-1").is_none());
    assert!(service.feature(MOWER_ID).is_some());
}
