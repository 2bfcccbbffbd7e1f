//! Wiring of backends, captures and side tasks around the daemon.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use touchslot_daemon::config::{BackendKind, BackendSettings};
use touchslot_daemon::{
    display, measure, pointer, setup, Allocator, Daemon, DaemonError, DaemonEvent, EngineOptions,
    Mixer, PointerBounds, Settings,
};
use touchslot_input::hid::HidSink;
use touchslot_input::merge::MergedCapture;
use touchslot_input::relay::{RelayCapture, RelaySender};
use touchslot_input::{InputCapture, InputEmulation, TouchSink};
use touchslot_types::{DeviceKind, Orientation, OrientationCell, PointerFrame, ScreenSize};
use tracing::{info, warn};

#[cfg(feature = "linux")]
use touchslot_input::linux;

use crate::RunArgs;

const CAPTURED_KINDS: [DeviceKind; 3] = [DeviceKind::Mouse, DeviceKind::Keyboard, DeviceKind::Gamepad];

/// Run the mapper until a shutdown signal.
pub async fn run(args: &RunArgs, settings: Settings) -> Result<(), DaemonError> {
    let mapping = setup::load_or_create_mapping(&args.mapping)?;
    let profiles_dir = settings
        .profiles
        .dir
        .clone()
        .unwrap_or_else(setup::default_profiles_dir);
    let profiles = setup::load_profiles(&profiles_dir)?;

    let backend = settings.backend.kind;
    let orientation = OrientationCell::default();
    if !backend.is_local() {
        let pinned = Orientation::from_index(settings.backend.rotation).ok_or_else(|| {
            DaemonError::Config(format!("invalid rotation {}", settings.backend.rotation))
        })?;
        orientation.set(pinned);
    }

    // The mixer would read back its own writes on the direct backend.
    let mix_touchscreen = settings.mixer.enabled
        && matches!(backend, BackendKind::Uinput | BackendKind::Bridge);
    let display_size = if backend.is_local() && (mix_touchscreen || settings.overlay.enabled) {
        Some(display::query_display_size().await?)
    } else {
        None
    };

    let mut capture = MergedCapture::new();
    capture.push(local_capture(&settings.daemon.pattern, &CAPTURED_KINDS)?);
    let mixer = match display_size.filter(|_| mix_touchscreen) {
        Some(size) => touchscreen_mixer(size, &mut capture)?,
        None => None,
    };
    if settings.relay.listen {
        let relay = RelayCapture::bind(SocketAddr::from(([0, 0, 0, 0], settings.relay.port))).await?;
        info!(addr = %relay.local_addr(), "listening for relayed input");
        capture.push(Box::new(relay));
    }

    let sink = open_sink(&settings.backend, orientation.clone()).await?;
    let allocator = Arc::new(Allocator::new(sink, mapping.screen));
    let options = EngineOptions {
        measure_mode: settings.daemon.measure_mode,
        auto_release: Duration::from_millis(settings.daemon.auto_release_ms),
        ..EngineOptions::default()
    };

    let mut daemon = Daemon::new(
        allocator,
        mapping,
        profiles,
        Box::new(capture),
        virtual_input()?,
        options,
    )
    .with_orientation(orientation.clone())
    .with_mapping_path(args.mapping.clone());
    if let Some(mixer) = mixer {
        daemon = daemon.with_mixer(mixer);
    }

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    if settings.overlay.enabled {
        let target: SocketAddr = settings.overlay.addr.parse().map_err(|e| {
            DaemonError::Config(format!("invalid overlay address {}: {e}", settings.overlay.addr))
        })?;
        let socket = UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], 0))).await?;
        let (frames_tx, frames_rx) = mpsc::channel::<PointerFrame>(256);
        let bounds = display_size.map_or(PointerBounds::Mapping, PointerBounds::Display);
        daemon = daemon.with_pointer(bounds, frames_tx);
        let reports = backend.is_local().then(|| orientation.clone());
        tasks.push(tokio::spawn(pointer::run_overlay_link(
            socket,
            target,
            frames_rx,
            reports,
            daemon.shutdown_signal(),
        )));
    }
    if backend.is_local() {
        tasks.push(tokio::spawn(display::run_orientation_poller(
            orientation.clone(),
            daemon.shutdown_signal(),
        )));
    }
    if settings.daemon.measure_mode {
        tasks.push(tokio::spawn(measure::run_measure_input(
            Arc::clone(daemon.engine()),
            BufReader::new(tokio::io::stdin()),
        )));
    }
    tasks.push(spawn_signal_handler(daemon.event_sender())?);

    let result = daemon.run().await;
    for task in tasks {
        task.abort();
    }
    result
}

async fn open_sink(
    backend: &BackendSettings,
    orientation: OrientationCell,
) -> Result<Box<dyn TouchSink>, DaemonError> {
    let sink: Box<dyn TouchSink> = match backend.kind {
        BackendKind::Uinput => uinput_touch(orientation)?,
        BackendKind::Bridge => bridge(backend.display, orientation).await?,
        BackendKind::Serial => {
            let path = backend.tty_path.as_deref().ok_or_else(|| {
                DaemonError::Config("serial backend needs a tty path".to_string())
            })?;
            Box::new(HidSink::serial(path, backend.baud, orientation)?)
        }
        BackendKind::Gadget => Box::new(HidSink::gadget(
            Path::new(&backend.gadget_path),
            orientation,
        )?),
        BackendKind::Direct => {
            let index = backend.direct_index.ok_or_else(|| {
                DaemonError::Config("direct backend needs an event device index".to_string())
            })?;
            direct(index, orientation)?
        }
    };
    Ok(sink)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
async fn bridge(display: u32, orientation: OrientationCell) -> Result<Box<dyn TouchSink>, DaemonError> {
    use touchslot_input::bridge::{BridgeSink, BRIDGE_SOCKET_NAME};

    let display_index = display;
    info!(display = display_index, "start the bridge helper for this display");
    Ok(Box::new(
        BridgeSink::listen_abstract(BRIDGE_SOCKET_NAME, orientation).await?,
    ))
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
async fn bridge(_display: u32, _orientation: OrientationCell) -> Result<Box<dyn TouchSink>, DaemonError> {
    Err(touchslot_input::InputError::Unavailable.into())
}

#[cfg(feature = "linux")]
fn uinput_touch(orientation: OrientationCell) -> Result<Box<dyn TouchSink>, DaemonError> {
    Ok(Box::new(linux::UinputTouch::create(orientation)?))
}

#[cfg(not(feature = "linux"))]
fn uinput_touch(_orientation: OrientationCell) -> Result<Box<dyn TouchSink>, DaemonError> {
    Err(touchslot_input::InputError::Unavailable.into())
}

#[cfg(feature = "linux")]
fn direct(index: u32, orientation: OrientationCell) -> Result<Box<dyn TouchSink>, DaemonError> {
    Ok(Box::new(linux::open_direct(index, orientation)?))
}

#[cfg(not(feature = "linux"))]
fn direct(_index: u32, _orientation: OrientationCell) -> Result<Box<dyn TouchSink>, DaemonError> {
    Err(touchslot_input::InputError::Unavailable.into())
}

#[cfg(feature = "linux")]
fn virtual_input() -> Result<Box<dyn InputEmulation>, DaemonError> {
    Ok(Box::new(linux::VirtualInput::create()?))
}

#[cfg(not(feature = "linux"))]
fn virtual_input() -> Result<Box<dyn InputEmulation>, DaemonError> {
    Err(touchslot_input::InputError::Unavailable.into())
}

#[cfg(feature = "linux")]
fn local_capture(pattern: &str, kinds: &[DeviceKind]) -> Result<Box<dyn InputCapture>, DaemonError> {
    Ok(Box::new(linux::HotplugCapture::new(pattern, kinds)?))
}

#[cfg(not(feature = "linux"))]
fn local_capture(_pattern: &str, _kinds: &[DeviceKind]) -> Result<Box<dyn InputCapture>, DaemonError> {
    Err(touchslot_input::InputError::Unavailable.into())
}

/// Capture the physical touchscreen and build a mixer scaled to it.
#[cfg(feature = "linux")]
fn touchscreen_mixer(
    display: ScreenSize,
    capture: &mut MergedCapture,
) -> Result<Option<Mixer>, DaemonError> {
    let Some((panel, range)) = linux::find_touchscreen() else {
        warn!("no touchscreen found, physical touches will not be mixed");
        return Ok(None);
    };
    info!(
        device = %panel.name,
        path = %panel.path.display(),
        max_x = range.0,
        max_y = range.1,
        "mixing physical touchscreen"
    );
    let pattern = format!("^{}$", regex::escape(&panel.name));
    capture.push(local_capture(&pattern, &[DeviceKind::Touch])?);
    Ok(Some(Mixer::new(display, range)))
}

#[cfg(not(feature = "linux"))]
fn touchscreen_mixer(
    _display: ScreenSize,
    _capture: &mut MergedCapture,
) -> Result<Option<Mixer>, DaemonError> {
    warn!("touchscreen mixing needs evdev support");
    Ok(None)
}

/// SIGHUP reloads the mapping; SIGINT and SIGTERM stop the daemon.
fn spawn_signal_handler(events: mpsc::Sender<DaemonEvent>) -> Result<JoinHandle<()>, DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = hangup.recv() => {
                    info!("SIGHUP received, reloading mapping");
                    DaemonEvent::Reload
                }
                _ = terminate.recv() => DaemonEvent::Shutdown,
                _ = tokio::signal::ctrl_c() => DaemonEvent::Shutdown,
            };
            let stop = matches!(event, DaemonEvent::Shutdown);
            if events.send(event).await.is_err() || stop {
                break;
            }
        }
    }))
}

/// Forward local devices to a remote receiver until interrupted.
pub async fn relay(target: SocketAddr, pattern: &str) -> Result<(), DaemonError> {
    let mut capture = local_capture(pattern, &CAPTURED_KINDS)?;
    let mut sender = RelaySender::connect(target).await?;
    let (tx, mut rx) = mpsc::channel(1024);
    capture.start(tx).await?;

    loop {
        tokio::select! {
            batch = rx.recv() => {
                let Some(batch) = batch else { break };
                if let Err(e) = sender.send_batch(&batch).await {
                    warn!(device = %batch.device, error = %e, "relay send failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping relay");
                break;
            }
        }
    }

    capture.shutdown().await?;
    Ok(())
}

/// Print every input device with its classified kind.
#[cfg(feature = "linux")]
pub fn devices() -> Result<(), DaemonError> {
    let found = linux::enumerate();
    if found.is_empty() {
        println!("No input devices found (is /dev/input readable?)");
    }
    for device in found {
        println!("{}\t{:<8}\t{}", device.path.display(), device.kind.to_string(), device.name);
    }
    Ok(())
}

#[cfg(not(feature = "linux"))]
pub fn devices() -> Result<(), DaemonError> {
    Err(touchslot_input::InputError::Unavailable.into())
}

/// Record a profile for the one connected gamepad matching `pattern`.
#[cfg(feature = "linux")]
pub async fn profile(pattern: &str, dir: Option<PathBuf>, force: bool) -> Result<(), DaemonError> {
    let regex = regex::Regex::new(pattern)
        .map_err(|e| DaemonError::Config(format!("invalid pattern {pattern}: {e}")))?;
    let mut found = linux::find_gamepads(&regex);
    let (pad, ranges) = match found.len() {
        0 => return Err(DaemonError::Config("no gamepad found".to_string())),
        1 => found.remove(0),
        n => {
            let names: Vec<&str> = found.iter().map(|(pad, _)| pad.name.as_str()).collect();
            return Err(DaemonError::Config(format!(
                "{n} gamepads match ({}), narrow --pattern or disconnect the others",
                names.join(", ")
            )));
        }
    };
    if pad.name.contains('/') {
        return Err(DaemonError::Config(format!(
            "gamepad name {:?} cannot be used as a file name",
            pad.name
        )));
    }

    let dir = dir.unwrap_or_else(setup::default_profiles_dir);
    let path = dir.join(format!("{}.json", pad.name));
    if path.exists() && !force {
        return Err(DaemonError::Config(format!(
            "{} already exists, pass --force to overwrite",
            path.display()
        )));
    }
    println!("Recording {} ({})", pad.name, pad.path.display());

    let mut capture = local_capture(&format!("^{}$", regex::escape(&pad.name)), &[DeviceKind::Gamepad])?;
    let (tx, mut rx) = mpsc::channel(256);
    capture.start(tx).await?;
    let recorded = crate::wizard::record(
        &mut rx,
        BufReader::new(tokio::io::stdin()),
        &ranges,
        &mut std::io::stdout(),
    )
    .await;
    capture.shutdown().await?;
    let text = recorded?
        .to_json()
        .map_err(|e| DaemonError::Config(format!("encoding profile: {e}")))?;

    std::fs::create_dir_all(&dir)?;
    std::fs::write(&path, text)?;
    info!(path = %path.display(), "gamepad profile written");
    println!("Profile: {}", path.display());
    Ok(())
}

#[cfg(not(feature = "linux"))]
#[allow(clippy::unused_async)]
pub async fn profile(_pattern: &str, _dir: Option<PathBuf>, _force: bool) -> Result<(), DaemonError> {
    Err(touchslot_input::InputError::Unavailable.into())
}
