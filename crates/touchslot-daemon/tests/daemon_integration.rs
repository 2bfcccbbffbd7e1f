//! Integration tests exercising the full daemon event loop with mock
//! capture, emulation and touch output.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use touchslot_daemon::jitter::Jitter;
use touchslot_daemon::{
    setup, Allocator, Daemon, DaemonEvent, EngineOptions, Mixer, PointerBounds,
};
use touchslot_input::mock::{
    MockCapture, MockEmulation, MockEmulationHandle, MockSink, MockSinkHandle,
};
use touchslot_types::{
    codes, DeviceKind, EventBatch, KeyState, PassthroughEvent, PointerFrame, RawEvent, ScreenSize,
    SlotId, TouchOp,
};
use tracing_subscriber::EnvFilter;

struct Running {
    feed: mpsc::Sender<EventBatch>,
    events: mpsc::Sender<DaemonEvent>,
    sink: MockSinkHandle,
    emulation: MockEmulationHandle,
    handle: tokio::task::JoinHandle<()>,
}

impl Running {
    async fn shutdown(self) {
        let _ = self.events.send(DaemonEvent::Shutdown).await;
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn start(mapping_path: &Path, configure: impl FnOnce(Daemon) -> Daemon) -> Running {
    init_tracing();
    let mapping = setup::load_or_create_mapping(mapping_path).unwrap();
    let sink = MockSink::new();
    let sink_handle = sink.handle();
    let allocator = Arc::new(Allocator::new(Box::new(sink), mapping.screen));
    let (capture, feed) = MockCapture::new();
    let emulation = MockEmulation::new();
    let emulation_handle = emulation.handle();
    let profiles = setup::load_profiles(&mapping_path.with_file_name("profiles")).unwrap();

    let daemon = Daemon::new(
        allocator,
        mapping,
        profiles,
        Box::new(capture),
        Box::new(emulation),
        EngineOptions {
            jitter: Jitter::disabled(),
            ..EngineOptions::default()
        },
    )
    .with_mapping_path(mapping_path.to_path_buf());
    let mut daemon = configure(daemon);
    let events = daemon.event_sender();
    let handle = tokio::spawn(async move {
        daemon.run().await.unwrap();
    });

    Running {
        feed,
        events,
        sink: sink_handle,
        emulation: emulation_handle,
        handle,
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn key(code: u16, value: i32) -> EventBatch {
    EventBatch::new("kbd", DeviceKind::Keyboard, vec![RawEvent::key(code, value)])
}

#[tokio::test]
async fn passthrough_reaches_emulation() {
    let dir = tempfile::tempdir().unwrap();
    let running = start(&dir.path().join("mapping.json"), |d| d);

    running.feed.send(key(30, 1)).await.unwrap();
    running.feed.send(key(30, 0)).await.unwrap();
    settle().await;

    assert_eq!(
        running.emulation.emitted(),
        vec![
            PassthroughEvent::Key {
                code: 30,
                state: KeyState::Down
            },
            PassthroughEvent::Key {
                code: 30,
                state: KeyState::Up
            },
        ]
    );
    let emulation = running.emulation.clone();
    let sink = running.sink.clone();
    running.shutdown().await;
    assert!(emulation.is_shutdown());
    assert!(sink.is_shutdown());
}

#[tokio::test]
async fn startup_sends_reset_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let running = start(&dir.path().join("mapping.json"), |d| d);
    settle().await;
    assert_eq!(
        running.sink.ops().first(),
        Some(&TouchOp::ResetResolution {
            width: 3200,
            height: 1440
        })
    );
    running.shutdown().await;
}

#[tokio::test]
async fn switch_key_then_mapped_press() {
    let dir = tempfile::tempdir().unwrap();
    let running = start(&dir.path().join("mapping.json"), |d| d);

    // KEY_GRAVE switches, KEY_C is a PRESS in the template.
    running.feed.send(key(41, 1)).await.unwrap();
    running.feed.send(key(41, 0)).await.unwrap();
    running.feed.send(key(46, 1)).await.unwrap();
    settle().await;

    let ops = running.sink.ops();
    assert!(matches!(ops.last(), Some(TouchOp::Require { slot: SlotId(0), .. })));
    assert!(running.emulation.emitted().is_empty());

    running.feed.send(key(46, 0)).await.unwrap();
    settle().await;
    assert!(matches!(
        running.sink.ops().last(),
        Some(TouchOp::Release { slot: SlotId(0) })
    ));
    running.shutdown().await;
}

#[tokio::test]
async fn reload_swaps_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mapping.json");
    let running = start(&path, |d| d);
    settle().await;

    let mut doc: serde_json::Value = serde_json::from_str(setup::MAPPING_TEMPLATE).unwrap();
    doc["SCREEN"]["SIZE"] = serde_json::json!([2400, 1080]);
    std::fs::write(&path, doc.to_string()).unwrap();
    running.events.send(DaemonEvent::Reload).await.unwrap();
    settle().await;

    assert_eq!(
        running.sink.ops().last(),
        Some(&TouchOp::ResetResolution {
            width: 2400,
            height: 1080
        })
    );
    running.shutdown().await;
}

#[tokio::test]
async fn broken_reload_keeps_old_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mapping.json");
    let running = start(&path, |d| d);
    settle().await;

    std::fs::write(&path, "{ not json").unwrap();
    running.events.send(DaemonEvent::Reload).await.unwrap();
    settle().await;
    assert_eq!(running.sink.ops().len(), 1);

    // Still mapped with the old document.
    running.feed.send(key(41, 1)).await.unwrap();
    running.feed.send(key(41, 0)).await.unwrap();
    running.feed.send(key(46, 1)).await.unwrap();
    settle().await;
    assert!(matches!(running.sink.ops().last(), Some(TouchOp::Require { .. })));
    running.shutdown().await;
}

#[tokio::test]
async fn touchscreen_is_mixed_in() {
    let dir = tempfile::tempdir().unwrap();
    let running = start(&dir.path().join("mapping.json"), |d| {
        d.with_mixer(Mixer::new(ScreenSize::new(1440, 3200), (1440, 3200)))
    });

    let down = EventBatch::new(
        "panel",
        DeviceKind::Touch,
        vec![
            RawEvent::abs(codes::ABS_MT_SLOT, 0),
            RawEvent::abs(codes::ABS_MT_TRACKING_ID, 7),
            RawEvent::abs(codes::ABS_MT_POSITION_X, 720),
            RawEvent::abs(codes::ABS_MT_POSITION_Y, 1600),
        ],
    );
    let up = EventBatch::new(
        "panel",
        DeviceKind::Touch,
        vec![RawEvent::abs(codes::ABS_MT_TRACKING_ID, -1)],
    );
    running.feed.send(down).await.unwrap();
    running.feed.send(up).await.unwrap();
    settle().await;

    let ops = running.sink.ops();
    assert!(matches!(ops[1], TouchOp::Require { slot: SlotId(0), .. }));
    assert_eq!(ops[2], TouchOp::Release { slot: SlotId(0) });
    running.shutdown().await;
}

#[tokio::test]
async fn pointer_takes_over_the_mouse() {
    let dir = tempfile::tempdir().unwrap();
    let (frames_tx, mut frames) = mpsc::channel::<PointerFrame>(64);
    let running = start(&dir.path().join("mapping.json"), move |d| {
        d.with_pointer(PointerBounds::Display(ScreenSize::new(1000, 1000)), frames_tx)
    });

    let motion = EventBatch::new(
        "mouse",
        DeviceKind::Mouse,
        vec![RawEvent::rel(codes::REL_X, 40), RawEvent::rel(codes::REL_Y, 60)],
    );
    running.feed.send(motion).await.unwrap();
    running.feed.send(key(30, 1)).await.unwrap();
    settle().await;

    let frame = frames.recv().await.unwrap();
    assert_eq!((frame.x, frame.y, frame.visible), (40, 60, true));
    // The key still reaches the virtual keyboard; the motion does not.
    assert_eq!(
        running.emulation.emitted(),
        vec![PassthroughEvent::Key {
            code: 30,
            state: KeyState::Down
        }]
    );

    // Mapping on hides the cursor.
    running.feed.send(key(41, 1)).await.unwrap();
    running.feed.send(key(41, 0)).await.unwrap();
    settle().await;
    let mut last = None;
    while let Ok(frame) = frames.try_recv() {
        last = Some(frame);
    }
    assert_eq!(last.map(|f| f.visible), Some(false));
    running.shutdown().await;
}

#[tokio::test]
async fn profiles_include_relayed_gamepad() {
    let dir = tempfile::tempdir().unwrap();
    let profiles: HashMap<_, _> = setup::load_profiles(dir.path()).unwrap();
    assert!(profiles.contains_key("rjs"));
}
