//! touchslot CLI: maps keyboard, mouse and gamepad input to multitouch.

mod run;
mod wizard;

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use touchslot_daemon::config::BackendKind;
use touchslot_daemon::{setup, DaemonError, Settings};
use touchslot_types::relay::DEFAULT_RELAY_PORT;
use tracing::error;

#[derive(Parser)]
#[command(
    name = "touchslot",
    about = "Drive Android touch input from keyboards, mice and gamepads",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the mapper.
    Run(RunArgs),

    /// Forward local input devices to a remote `touchslot run --relay-listen`.
    Relay {
        /// Receiver address, `ip` or `ip:port`.
        #[arg(long)]
        to: String,

        /// Regex the device name must match.
        #[arg(short, long, default_value = ".*")]
        pattern: String,
    },

    /// List input devices and how they would be classified.
    Devices,

    /// Record a profile for a connected gamepad by pressing its buttons and
    /// moving its axes.
    Profile {
        /// Regex the gamepad name must match; exactly one gamepad may match.
        #[arg(short, long, default_value = ".*")]
        pattern: String,

        /// Directory to write `<gamepad name>.json` into (default: the
        /// profiles directory next to the executable).
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Overwrite an existing profile.
        #[arg(long)]
        force: bool,
    },

    /// Write the default mapping document.
    Template {
        #[arg(default_value = "mapping.json")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Default)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct RunArgs {
    /// Mapping document; created from the template if missing.
    pub mapping: PathBuf,

    /// Runtime settings (default: settings.toml next to the mapping).
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    #[arg(long)]
    pub debug: bool,

    /// Serial HID bridge on this tty.
    #[arg(short, long)]
    pub tty: Option<String>,

    #[arg(long)]
    pub baud: Option<u32>,

    /// USB gadget HID output.
    #[arg(long)]
    pub gadget: bool,

    #[arg(long)]
    pub gadget_path: Option<String>,

    /// Inject through the accessibility bridge helper.
    #[arg(long)]
    pub bridge: bool,

    /// Display id the bridge helper targets.
    #[arg(long)]
    pub display: Option<u32>,

    /// Write touches straight to /dev/input/event<N>.
    #[arg(long, value_name = "N")]
    pub direct: Option<u32>,

    /// Fixed screen rotation for the HID backends (0-3).
    #[arg(short, long)]
    pub rotation: Option<u8>,

    /// Drive an on-screen pointer with the mouse while mapping is off.
    #[arg(long)]
    pub v_mouse: bool,

    /// Regex the captured device names must match.
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// Accept relayed input from `touchslot relay`.
    #[arg(long)]
    pub relay_listen: bool,

    #[arg(long)]
    pub port: Option<u16>,

    /// Log view motion totals and read precise drags from stdin.
    #[arg(long)]
    pub measure_mode: bool,

    /// Idle time before the view finger lifts; 0 keeps it down.
    #[arg(long)]
    pub auto_release_ms: Option<u64>,

    /// Do not re-inject the physical touchscreen.
    #[arg(long)]
    pub no_mixer: bool,

    /// Directory of gamepad profiles.
    #[arg(long)]
    pub profiles: Option<PathBuf>,
}

impl RunArgs {
    /// Load settings and apply the command-line overrides on top.
    fn settings(&self) -> Result<Settings, DaemonError> {
        let mut settings = setup::load_settings(self.settings.as_deref(), &self.mapping)?;
        self.apply(&mut settings)?;
        Ok(settings)
    }

    fn apply(&self, settings: &mut Settings) -> Result<(), DaemonError> {
        let mut chosen = Vec::new();
        if let Some(tty) = &self.tty {
            settings.backend.tty_path = Some(tty.clone());
            chosen.push(BackendKind::Serial);
        }
        if self.gadget {
            chosen.push(BackendKind::Gadget);
        }
        if self.bridge {
            chosen.push(BackendKind::Bridge);
        }
        if let Some(index) = self.direct {
            settings.backend.direct_index = Some(index);
            chosen.push(BackendKind::Direct);
        }
        match chosen.as_slice() {
            [] => {}
            [kind] => settings.backend.kind = *kind,
            _ => {
                let names: Vec<String> = chosen.iter().map(ToString::to_string).collect();
                return Err(DaemonError::Conflict(format!(
                    "only one backend may be selected, got {}",
                    names.join(" and ")
                )));
            }
        }

        if let Some(baud) = self.baud {
            settings.backend.baud = baud;
        }
        if let Some(path) = &self.gadget_path {
            settings.backend.gadget_path.clone_from(path);
        }
        if let Some(display) = self.display {
            settings.backend.display = display;
        }
        if let Some(rotation) = self.rotation {
            if rotation > 3 {
                return Err(DaemonError::Config(format!(
                    "rotation must be 0-3, got {rotation}"
                )));
            }
            settings.backend.rotation = rotation;
        }
        if let Some(pattern) = &self.pattern {
            settings.daemon.pattern.clone_from(pattern);
        }
        if let Some(ms) = self.auto_release_ms {
            settings.daemon.auto_release_ms = ms;
        }
        if let Some(dir) = &self.profiles {
            settings.profiles.dir = Some(dir.clone());
        }
        if let Some(port) = self.port {
            settings.relay.port = port;
        }
        if self.debug {
            settings.daemon.log_level = "debug".to_string();
        }
        settings.daemon.measure_mode |= self.measure_mode;
        settings.relay.listen |= self.relay_listen;
        settings.overlay.enabled |= self.v_mouse;
        if self.no_mixer {
            settings.mixer.enabled = false;
        }
        Ok(())
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

/// Parse `ip` or `ip:port`, defaulting to the relay port.
fn parse_relay_target(to: &str) -> Result<SocketAddr, DaemonError> {
    if let Ok(addr) = to.parse::<SocketAddr>() {
        return Ok(addr);
    }
    to.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DEFAULT_RELAY_PORT))
        .map_err(|_| DaemonError::Config(format!("invalid relay target: {to}")))
}

fn template(path: &Path, force: bool) -> Result<(), DaemonError> {
    if path.exists() && !force {
        return Err(DaemonError::Config(format!(
            "{} already exists, pass --force to overwrite",
            path.display()
        )));
    }
    setup::write_template(path)?;
    println!("Mapping: {}", path.display());
    Ok(())
}

fn exit_on_error(result: Result<(), DaemonError>) {
    if let Err(e) = result {
        error!(error = %e, "fatal");
        eprintln!("touchslot: {e}");
        std::process::exit(e.exit_code());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let settings = match args.settings() {
                Ok(settings) => settings,
                Err(e) => {
                    init_tracing("info");
                    exit_on_error(Err(e));
                    return Ok(());
                }
            };
            init_tracing(&settings.daemon.log_level);
            tracing::info!(mapping = %args.mapping.display(), backend = %settings.backend.kind, "starting touchslot");
            exit_on_error(run::run(&args, settings).await);
        }
        Commands::Relay { to, pattern } => {
            init_tracing("info");
            let result = match parse_relay_target(&to) {
                Ok(target) => run::relay(target, &pattern).await,
                Err(e) => Err(e),
            };
            exit_on_error(result);
        }
        Commands::Devices => {
            init_tracing("warn");
            exit_on_error(run::devices());
        }
        Commands::Profile {
            pattern,
            dir,
            force,
        } => {
            init_tracing("warn");
            exit_on_error(run::profile(&pattern, dir, force).await);
        }
        Commands::Template { path, force } => {
            init_tracing("info");
            exit_on_error(template(&path, force));
        }
    }

    Ok(())
}
