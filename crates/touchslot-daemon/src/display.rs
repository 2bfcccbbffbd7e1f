//! Display geometry from the Android shell.
//!
//! `wm size` gives the panel size in its natural orientation and
//! `dumpsys input` reports the current rotation. Both are plain-text
//! outputs, parsed with regexes.

use std::time::Duration;

use regex::Regex;
use tokio::process::Command;
use tokio::sync::watch;
use touchslot_types::{Orientation, OrientationCell, ScreenSize};
use tracing::{debug, info, warn};

use crate::error::DaemonError;

/// How often `dumpsys input` is polled.
pub const ORIENTATION_POLL: Duration = Duration::from_secs(1);

/// Parse `wm size` output. An `Override size` line wins over the physical
/// size.
pub fn parse_wm_size(output: &str) -> Option<ScreenSize> {
    let re = Regex::new(r"(Physical|Override) size:\s*(\d+)x(\d+)").ok()?;
    let mut physical = None;
    let mut override_size = None;
    for caps in re.captures_iter(output) {
        let size = ScreenSize::new(caps[2].parse().ok()?, caps[3].parse().ok()?);
        if &caps[1] == "Override" {
            override_size = Some(size);
        } else {
            physical = Some(size);
        }
    }
    override_size.or(physical)
}

/// Parse the first `orientation=N` field of `dumpsys input`.
pub fn parse_dumpsys_orientation(output: &str) -> Option<Orientation> {
    let re = Regex::new(r"orientation=(\d+)").ok()?;
    let index: u8 = re.captures(output)?[1].parse().ok()?;
    Orientation::from_index(index)
}

async fn shell(program: &str, args: &[&str]) -> std::io::Result<String> {
    let output = Command::new(program).args(args).output().await?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Ask the window manager for the display size.
pub async fn query_display_size() -> Result<ScreenSize, DaemonError> {
    let output = shell("wm", &["size"])
        .await
        .map_err(|e| DaemonError::DisplaySize(format!("failed to run wm size: {e}")))?;
    let size = parse_wm_size(&output)
        .ok_or_else(|| DaemonError::DisplaySize(format!("unrecognised wm size output: {output:?}")))?;
    if size.width == 0 || size.height == 0 {
        return Err(DaemonError::DisplaySize(format!(
            "display reported as {}x{}",
            size.width, size.height
        )));
    }
    info!(width = size.width, height = size.height, "display size");
    Ok(size)
}

/// Display size as seen in `orientation`: width and height swap when the
/// display is turned sideways.
pub fn oriented(size: ScreenSize, orientation: Orientation) -> ScreenSize {
    if orientation.is_sideways() {
        ScreenSize::new(size.height, size.width)
    } else {
        size
    }
}

/// Keep `cell` in sync with `dumpsys input` until shutdown.
pub async fn run_orientation_poller(cell: OrientationCell, mut shutdown: watch::Receiver<bool>) {
    loop {
        match shell("dumpsys", &["input"]).await {
            Ok(output) => match parse_dumpsys_orientation(&output) {
                Some(orientation) => {
                    let previous = cell.set(orientation);
                    if previous != orientation {
                        info!(%orientation, "display orientation changed");
                    }
                }
                None => debug!("no orientation in dumpsys output"),
            },
            Err(e) => warn!(error = %e, "failed to run dumpsys input"),
        }
        tokio::select! {
            () = tokio::time::sleep(ORIENTATION_POLL) => {}
            _ = shutdown.changed() => return,
        }
        if *shutdown.borrow() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_size() {
        assert_eq!(
            parse_wm_size("Physical size: 1080x2400\n"),
            Some(ScreenSize::new(1080, 2400))
        );
    }

    #[test]
    fn override_size_wins() {
        let output = "Physical size: 1440x3200\nOverride size: 1080x2400\n";
        assert_eq!(parse_wm_size(output), Some(ScreenSize::new(1080, 2400)));
        let reversed = "Override size: 1080x2400\nPhysical size: 1440x3200\n";
        assert_eq!(parse_wm_size(reversed), Some(ScreenSize::new(1080, 2400)));
    }

    #[test]
    fn garbage_size() {
        assert_eq!(parse_wm_size("wm: not found"), None);
    }

    #[test]
    fn orientation_from_dumpsys() {
        let output = "  Viewport INTERNAL: displayId=0, uniqueId=local:0, port=129, \
                      orientation=3, logicalFrame=[0, 0, 2400, 1080]\n";
        assert_eq!(parse_dumpsys_orientation(output), Some(Orientation::ThreeQuarter));
        assert_eq!(parse_dumpsys_orientation("orientation=7"), None);
        assert_eq!(parse_dumpsys_orientation(""), None);
    }

    #[test]
    fn sideways_swaps_axes() {
        let size = ScreenSize::new(1080, 2400);
        assert_eq!(oriented(size, Orientation::Natural), size);
        assert_eq!(oriented(size, Orientation::Quarter), ScreenSize::new(2400, 1080));
    }
}
