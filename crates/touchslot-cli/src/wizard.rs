//! Interactive recording of a gamepad profile.
//!
//! Each button is recorded from its first press; each axis from the code
//! deflected furthest while the user holds it at its far end. Enter skips a
//! button, and Enter without any motion skips an axis.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;
use touchslot_daemon::profile::{AbsAxis, RECORDED_AXES, RECORDED_BUTTONS};
use touchslot_daemon::{DaemonError, GamepadProfile};
use touchslot_types::{codes, EventBatch};

/// Smallest deflection, as a fraction of half the range, that counts as
/// the user moving an axis.
const MIN_SWEEP: f64 = 0.5;

fn hint(axis: &str) -> &'static str {
    match axis {
        "LS_X" | "RS_X" => "all the way right",
        "LS_Y" | "RS_Y" => "all the way down",
        "LT" | "RT" => "fully pulled",
        "HAT0X" => "d-pad right",
        "HAT0Y" => "d-pad down",
        _ => "to its far end",
    }
}

/// Furthest signed deflection seen per axis code.
#[derive(Debug, Default)]
struct AxisSweep {
    peaks: HashMap<u16, f64>,
}

impl AxisSweep {
    fn observe(&mut self, ranges: &HashMap<u16, [i32; 2]>, code: u16, value: i32) {
        let Some(&[min, max]) = ranges.get(&code) else {
            return;
        };
        if max <= min {
            return;
        }
        let half = (f64::from(max) - f64::from(min)) / 2.0;
        let centre = f64::from(min) + half;
        let deflection = (f64::from(value) - centre) / half;
        let peak = self.peaks.entry(code).or_insert(0.0);
        if deflection.abs() > peak.abs() {
            *peak = deflection;
        }
    }

    /// The untaken code moved the most, and whether it moved toward its
    /// minimum.
    fn strongest(&self, taken: &HashSet<u16>) -> Option<(u16, bool)> {
        self.peaks
            .iter()
            .filter(|(code, peak)| !taken.contains(*code) && peak.abs() >= MIN_SWEEP)
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()).then(b.0.cmp(a.0)))
            .map(|(code, peak)| (*code, *peak < 0.0))
    }
}

struct Recorder<'a, R, W> {
    events: &'a mut mpsc::Receiver<EventBatch>,
    input: Lines<R>,
    ranges: &'a HashMap<u16, [i32; 2]>,
    out: &'a mut W,
}

impl<R, W> Recorder<'_, R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    async fn next_batch(&mut self) -> Result<Option<EventBatch>, DaemonError> {
        tokio::select! {
            biased;
            batch = self.events.recv() => match batch {
                Some(batch) => Ok(Some(batch)),
                None => Err(DaemonError::Config("gamepad went away while recording".into())),
            },
            line = self.input.next_line() => {
                line?;
                Ok(None)
            }
        }
    }

    async fn button(&mut self, taken: &HashSet<u16>) -> Result<Option<u16>, DaemonError> {
        while let Some(batch) = self.next_batch().await? {
            let pressed = batch
                .events
                .iter()
                .find(|e| e.kind == codes::EV_KEY && e.value == 1 && !taken.contains(&e.code));
            if let Some(event) = pressed {
                return Ok(Some(event.code));
            }
        }
        Ok(None)
    }

    async fn axis(&mut self, taken: &HashSet<u16>) -> Result<Option<(u16, bool)>, DaemonError> {
        let mut sweep = AxisSweep::default();
        while let Some(batch) = self.next_batch().await? {
            for event in batch.events.iter().filter(|e| e.kind == codes::EV_ABS) {
                sweep.observe(self.ranges, event.code, event.value);
            }
        }
        Ok(sweep.strongest(taken))
    }

    async fn run(mut self) -> Result<GamepadProfile, DaemonError> {
        let mut btn = HashMap::new();
        let mut taken = HashSet::new();
        for name in RECORDED_BUTTONS {
            write!(self.out, "Press {name} (Enter to skip): ")?;
            self.out.flush()?;
            match self.button(&taken).await? {
                Some(code) => {
                    writeln!(self.out, "code {code}")?;
                    taken.insert(code);
                    btn.insert(code, name.to_string());
                }
                None => writeln!(self.out, "skipped")?,
            }
        }

        let mut abs = HashMap::new();
        let mut taken = HashSet::new();
        for name in RECORDED_AXES {
            write!(
                self.out,
                "Hold {name} {}, then press Enter (Enter alone skips): ",
                hint(name)
            )?;
            self.out.flush()?;
            let Some((code, reverse)) = self.axis(&taken).await? else {
                writeln!(self.out, "skipped")?;
                continue;
            };
            let Some(&range) = self.ranges.get(&code) else {
                continue;
            };
            writeln!(
                self.out,
                "code {code}, range {range:?}{}",
                if reverse { ", reversed" } else { "" }
            )?;
            taken.insert(code);
            abs.insert(
                code,
                AbsAxis {
                    name: name.to_string(),
                    range,
                    reverse,
                },
            );
        }

        GamepadProfile::recorded(btn, abs)
            .map_err(|e| DaemonError::Config(format!("built-in gamepad profile: {e}")))
    }
}

/// Walk the user through every button and axis of one gamepad.
///
/// `events` carries the gamepad's input, `input` the user's Enter presses
/// and `ranges` the `[min, max]` of each axis code.
pub async fn record<R, W>(
    events: &mut mpsc::Receiver<EventBatch>,
    input: R,
    ranges: &HashMap<u16, [i32; 2]>,
    out: &mut W,
) -> Result<GamepadProfile, DaemonError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    Recorder {
        events,
        input: input.lines(),
        ranges,
        out,
    }
    .run()
    .await
}
