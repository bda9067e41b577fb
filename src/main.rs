use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use appvol::backend::AudioBackend;
use appvol::constants::DEFAULT_CONFIG_FILE;
use appvol::{
    host, logging, AudioController, BackendKind, FadeOutcome, MemoryMixer, SessionContainer,
    SessionEvent, SessionRecord, SessionTracker, Settings,
};

#[derive(Debug, Parser)]
#[command(name = "appvol", version, about = "Per-application volume control for the default output")]
struct Cli {
    /// Mixer backend to use (overrides the settings file)
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendKind>,

    /// Settings file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log filter, e.g. "appvol=debug"
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List applications currently playing audio
    List {
        #[arg(long)]
        json: bool,
    },
    /// Print an application's volume
    Get { name: String },
    /// Set an application's volume (every matching session)
    Set {
        name: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
    Mute { name: String },
    Unmute { name: String },
    /// Flip an application's mute state
    Toggle { name: String },
    /// System output volume
    #[command(subcommand)]
    System(SystemCommand),
    /// Move an application's volume gradually; Ctrl+C restores the original
    Fade {
        name: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
        #[arg(long)]
        steps: Option<u32>,
        #[arg(long)]
        step_ms: Option<u64>,
    },
    /// Print sessions as they appear, change and disappear
    Watch {
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Answer JSON-line requests on stdin
    Serve,
    Status,
}

#[derive(Debug, Subcommand)]
enum SystemCommand {
    Get,
    Set {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
    Mute,
    Unmute,
}

fn install_stop_flag() -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::Relaxed);
    })
    .context("failed to install the Ctrl+C handler")?;
    Ok(stop)
}

fn print_sessions(sessions: &[SessionRecord]) {
    if sessions.is_empty() {
        println!("No applications are playing audio.");
        return;
    }
    for (i, session) in sessions.iter().enumerate() {
        println!(
            "{}. {} ({}, pid {}) {}%{}",
            i + 1,
            session.display_name,
            session.name,
            session.id,
            session.volume,
            if session.muted { " [muted]" } else { "" }
        );
    }
}

fn print_event(event: &SessionEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    let (label, session) = match event {
        SessionEvent::Added(session) => ("+", session),
        SessionEvent::Removed(session) => ("-", session),
        SessionEvent::Changed(session) => ("~", session),
    };
    println!(
        "{label} {} (pid {}) {}%{}",
        session.display_name,
        session.id,
        session.volume,
        if session.muted { " [muted]" } else { "" }
    );
    Ok(())
}

fn watch<B: AudioBackend>(controller: &AudioController<B>, interval: Duration, json: bool) -> Result<()> {
    let stop = install_stop_flag()?;
    let mut tracker = SessionTracker::new();

    while !stop.load(Ordering::Relaxed) {
        for event in tracker.update(&controller.list_sessions()) {
            print_event(&event, json)?;
        }
        sleep(interval);
    }
    info!("watch stopped");
    Ok(())
}

fn fade<B: AudioBackend>(
    controller: &AudioController<B>,
    name: &str,
    percent: u8,
    steps: u32,
    step_delay: Duration,
) -> Result<()> {
    let Some(container) = SessionContainer::capture(controller, name) else {
        bail!("no active session matches \"{name}\"");
    };
    let stop = install_stop_flag()?;

    println!("Fading {name} from {}% to {percent}%", container.initial_volume());
    match container.fade_to(percent, steps, step_delay, &stop) {
        FadeOutcome::Completed => Ok(()),
        FadeOutcome::Restored => {
            println!("Interrupted, volume restored to {}%", container.initial_volume());
            Ok(())
        }
        FadeOutcome::NotFound => bail!("\"{name}\" stopped playing during the fade"),
    }
}

fn run<B: AudioBackend>(backend: B, cli: &Cli, settings: &Settings) -> Result<()> {
    let controller = AudioController::open(backend);
    if !controller.is_live() {
        eprintln!("Default output device unavailable; results will be empty.");
    }

    match &cli.command {
        Command::List { json } => {
            let sessions = controller.list_sessions();
            if *json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else {
                print_sessions(&sessions);
            }
        }
        Command::Get { name } => match controller.get_application_volume(name) {
            Some(percent) => println!("{percent}"),
            None => bail!("no active session matches \"{name}\""),
        },
        Command::Set { name, percent } => {
            ensure!(
                controller.set_application_volume(name, *percent),
                "could not set the volume of \"{name}\""
            );
        }
        Command::Mute { name } => {
            ensure!(controller.mute_application(name, true), "could not mute \"{name}\"");
        }
        Command::Unmute { name } => {
            ensure!(controller.mute_application(name, false), "could not unmute \"{name}\"");
        }
        Command::Toggle { name } => match controller.toggle_application_mute(name) {
            Some(true) => println!("muted"),
            Some(false) => println!("unmuted"),
            None => bail!("could not toggle mute of \"{name}\""),
        },
        Command::System(SystemCommand::Get) => match controller.get_system_volume() {
            Some(percent) => println!("{percent}"),
            None => bail!("system volume unavailable"),
        },
        Command::System(SystemCommand::Set { percent }) => {
            ensure!(controller.set_system_volume(*percent), "could not set the system volume");
        }
        Command::System(SystemCommand::Mute) => {
            ensure!(controller.set_system_mute(true), "could not mute the system output");
        }
        Command::System(SystemCommand::Unmute) => {
            ensure!(controller.set_system_mute(false), "could not unmute the system output");
        }
        Command::Fade {
            name,
            percent,
            steps,
            step_ms,
        } => fade(
            &controller,
            name,
            *percent,
            steps.unwrap_or(settings.fade_steps),
            Duration::from_millis(step_ms.unwrap_or(settings.fade_step_ms)),
        )?,
        Command::Watch { interval_ms, json } => watch(
            &controller,
            Duration::from_millis(interval_ms.unwrap_or(settings.poll_interval_ms)),
            *json,
        )?,
        Command::Serve => {
            let served = host::serve(&controller, std::io::stdin().lock(), std::io::stdout().lock())?;
            info!(served, "input closed");
        }
        Command::Status => println!("{}", serde_json::to_string_pretty(&controller.status())?),
    }

    Ok(())
}

#[cfg(windows)]
fn run_native(cli: &Cli, settings: &Settings) -> Result<()> {
    run(appvol::WasapiBackend::new(), cli, settings)
}

#[cfg(not(windows))]
fn run_native(_cli: &Cli, _settings: &Settings) -> Result<()> {
    bail!("the native backend is only available on Windows")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;
    logging::init(cli.log.as_deref(), &settings.log);

    match cli.backend.unwrap_or(settings.backend) {
        BackendKind::Native => run_native(&cli, &settings),
        BackendKind::Auto if cfg!(windows) => run_native(&cli, &settings),
        BackendKind::Auto | BackendKind::Memory => {
            info!("using the in-memory demo mixer");
            run(MemoryMixer::demo(), &cli, &settings)
        }
    }
}
