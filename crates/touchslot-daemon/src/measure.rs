//! Measure mode: precise view drags typed on stdin.
//!
//! A line is either `x` or `x step sleep_ms`. The view finger is planted,
//! then dragged horizontally `x` canonical units in `step` increments
//! with `sleep_ms` between them. Used to calibrate `MOUSE.SPEED` against a
//! game's camera.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info};

use crate::engine::Engine;

const DEFAULT_STEP: i32 = 24;
const DEFAULT_SLEEP: Duration = Duration::from_millis(16);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeasureError {
    #[error("usage: x | x step sleep_ms")]
    Usage,

    #[error("not a number: {0:?}")]
    Number(String),

    #[error("step must be positive, got {0}")]
    Step(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasureCommand {
    pub distance: i32,
    pub step: i32,
    pub sleep: Duration,
}

fn number(s: &str) -> Result<i32, MeasureError> {
    s.parse().map_err(|_| MeasureError::Number(s.to_string()))
}

pub fn parse_measure_line(line: &str) -> Result<MeasureCommand, MeasureError> {
    let args: Vec<&str> = line.split_whitespace().collect();
    let command = match args.as_slice() {
        [x] => MeasureCommand {
            distance: number(x)?,
            step: DEFAULT_STEP,
            sleep: DEFAULT_SLEEP,
        },
        [x, step, sleep] => {
            let sleep = u64::try_from(number(sleep)?).map_err(|_| MeasureError::Usage)?;
            MeasureCommand {
                distance: number(x)?,
                step: number(step)?,
                sleep: Duration::from_millis(sleep),
            }
        }
        _ => return Err(MeasureError::Usage),
    };
    if command.step <= 0 {
        return Err(MeasureError::Step(command.step));
    }
    Ok(command)
}

impl Engine {
    /// Drag the view by `command.distance`, waiting first until mapping is
    /// on. Stops early if mapping is switched off mid-drag.
    pub async fn measured_view_move(self: &Arc<Self>, command: MeasureCommand) {
        let mut mode = self.subscribe_mode();
        if !self.is_mapping_on() {
            info!("waiting for mapping to be switched on");
            let mut shutdown = self.shutdown_signal();
            tokio::select! {
                result = mode.wait_for(|on| *on) => {
                    if result.is_err() {
                        return;
                    }
                }
                _ = shutdown.changed() => return,
            }
        }

        self.view_move(0, 0).await;
        if !self.sleep(command.sleep).await {
            return;
        }
        let sign = command.distance.signum();
        let magnitude = command.distance.abs();
        for _ in 0..magnitude / command.step {
            if !self.is_mapping_on() {
                break;
            }
            self.view_move(sign * command.step, 0).await;
            if !self.sleep(command.sleep).await {
                return;
            }
        }
        self.view_move(sign * (magnitude % command.step), 0).await;
    }
}

/// Read measure commands from `input` until it closes.
pub async fn run_measure_input<R>(engine: Arc<Engine>, input: R)
where
    R: AsyncBufRead + Unpin,
{
    info!("measure mode: enter x or x step sleep_ms");
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                error!(error = %e, "failed to read measure input");
                return;
            }
        };
        match parse_measure_line(&line) {
            Ok(command) => {
                info!(
                    distance = command.distance,
                    step = command.step,
                    sleep_ms = command.sleep.as_millis(),
                    "measured view move"
                );
                engine.measured_view_move(command).await;
            }
            Err(e) => error!(input = %line, "{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_value_uses_defaults() {
        assert_eq!(
            parse_measure_line("-500"),
            Ok(MeasureCommand {
                distance: -500,
                step: 24,
                sleep: Duration::from_millis(16),
            })
        );
    }

    #[test]
    fn three_values() {
        assert_eq!(
            parse_measure_line("300 10 5"),
            Ok(MeasureCommand {
                distance: 300,
                step: 10,
                sleep: Duration::from_millis(5),
            })
        );
    }

    #[test]
    fn rejects_bad_lines() {
        assert_eq!(parse_measure_line(""), Err(MeasureError::Usage));
        assert_eq!(parse_measure_line("1 2"), Err(MeasureError::Usage));
        assert_eq!(
            parse_measure_line("abc"),
            Err(MeasureError::Number("abc".into()))
        );
        assert_eq!(parse_measure_line("100 0 5"), Err(MeasureError::Step(0)));
        assert_eq!(parse_measure_line("100 5 -1"), Err(MeasureError::Usage));
    }
}
