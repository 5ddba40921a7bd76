use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use clap::{Parser, Subcommand};
use serde::Serialize;
use simstage_core::{
    AppConfig, AudioEngine, Button, ButtonsOverlay, ControlSurface, DeltaSource, FixedStepClock,
    HeadlessRenderer, Interaction, LifecycleManager, MeterSummary, OutputMeter, SimStageError,
    SystemClock,
};
use tracing_subscriber::EnvFilter;

mod sims;

fn main() -> simstage_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            sim,
            seconds,
            config,
            events,
            report,
            debug,
            realtime,
        } => {
            let options = RunOptions {
                sim,
                seconds,
                events,
                debug,
                realtime,
            };
            let config = match config {
                Some(path) => AppConfig::load(path)?,
                None => AppConfig::default(),
            };
            let summary = run(&config, options)?;
            if let Some(path) = report {
                write_report(&path, &summary)?;
            }
            Ok(())
        }
        Commands::List => {
            for factory in sims::catalog() {
                println!("{}", factory.name());
            }
            Ok(())
        }
    }
}

struct RunOptions {
    sim: String,
    seconds: f32,
    events: Vec<ScriptedEvent>,
    debug: bool,
    realtime: bool,
}

#[derive(Debug, Serialize)]
struct RunReport {
    simulation: Option<String>,
    frames: u64,
    seconds: f32,
    audio_state: String,
    paused: bool,
    audio_enabled: bool,
    controls_visible: bool,
    meter: MeterSummary,
    timeline: Vec<ReportSample>,
}

#[derive(Debug, Serialize)]
struct ReportSample {
    time: f32,
    simulation: Option<String>,
    rms: f32,
    peak: f32,
}

fn run(config: &AppConfig, options: RunOptions) -> simstage_core::Result<RunReport> {
    let factory = sims::find(&options.sim)
        .ok_or_else(|| SimStageError::msg(format!("unknown simulation `{}`", options.sim)))?;
    tracing::info!(simulation = factory.name(), seconds = options.seconds, "starting run");

    let confirm_next = Arc::new(AtomicBool::new(true));
    let controls = {
        let confirm_next = confirm_next.clone();
        ButtonsOverlay::new(move |prompt: &str| {
            let confirmed = confirm_next.swap(true, Ordering::SeqCst);
            tracing::info!(prompt, confirmed, "confirmation requested");
            confirmed
        })
    };

    let audio = AudioEngine::headless(config.audio.clone());
    let manager = if options.realtime {
        build_manager(audio, SystemClock::new(config.frame.max_delta), controls)
    } else {
        build_manager(audio, FixedStepClock::from_fps(config.frame.fps), controls)
    };
    let mut debug = config.debug.clone();
    debug.visible |= options.debug;
    let mut manager = manager.with_debug_config(&debug);
    manager.set_simulation(factory)?;

    let frame_time = config.frame.frame_time();
    let total_frames = (options.seconds / frame_time).ceil().max(0.0) as u64;
    let block_len = ((config.audio.sample_rate as f32 * frame_time).round() as usize).max(2);
    let mut block = vec![0.0f32; block_len];
    let mut meter = OutputMeter::new(config.audio.sample_rate);
    let mut timeline = Vec::new();

    let mut events: Vec<ScriptedEvent> = options.events;
    events.sort_by(|a, b| a.at.total_cmp(&b.at));
    let mut queue: VecDeque<ScriptedEvent> = events.into();

    for frame in 0..total_frames {
        let now = frame as f32 * frame_time;
        while queue.front().is_some_and(|event| event.at <= now) {
            if let Some(event) = queue.pop_front() {
                apply_action(&mut manager, &confirm_next, event.action)?;
            }
        }

        if let Some(reading) = meter.latest() {
            let debug = manager.container().debug();
            debug.add_text_category("Output", "rms", format!("{:.4}", reading.rms));
            debug.add_text_category("Output", "peak", format!("{:.4}", reading.peak));
        }
        manager.tick()?;
        let once_a_second = frame % u64::from(config.frame.fps.max(1)) == 0;
        if once_a_second && manager.container().debug().is_visible() {
            tracing::info!(frame, "\n{}", manager.debug_text());
        }

        if manager.audio().render(&mut block) > 0 {
            let reading = meter.measure(&block)?;
            timeline.push(ReportSample {
                time: now,
                simulation: manager.current_name().map(str::to_string),
                rms: reading.rms,
                peak: reading.peak,
            });
        }

        if options.realtime {
            std::thread::sleep(Duration::from_secs_f32(frame_time));
        }
    }

    let report = RunReport {
        simulation: manager.current_name().map(str::to_string),
        frames: manager.frames(),
        seconds: options.seconds,
        audio_state: manager.audio().state().to_string(),
        paused: manager.is_paused(),
        audio_enabled: manager.is_audio_enabled(),
        controls_visible: manager.container().panels_visible(),
        meter: meter.summary().clone(),
        timeline,
    };
    manager.shutdown();
    tracing::info!(frames = report.frames, peak = report.meter.max_peak, "run finished");
    Ok(report)
}

fn build_manager(
    audio: AudioEngine,
    clock: impl DeltaSource + 'static,
    controls: impl ControlSurface + 'static,
) -> LifecycleManager {
    LifecycleManager::new(audio, HeadlessRenderer::new(), clock, controls)
}

fn apply_action(
    manager: &mut LifecycleManager,
    confirm_next: &AtomicBool,
    action: Action,
) -> simstage_core::Result<()> {
    tracing::debug!(?action, "scripted action");
    match action {
        Action::Click => manager.dispatch_interaction(Interaction::Pointer),
        Action::Key(key) => manager.dispatch_interaction(Interaction::Key(key)),
        Action::Pause => manager.pause(),
        Action::Resume => manager.resume(),
        Action::TogglePause => {
            manager.press(Button::Play)?;
        }
        Action::ToggleAudio => {
            manager.press(Button::Audio)?;
        }
        Action::Restart => {
            manager.press(Button::Restart)?;
        }
        Action::RestartDecline => {
            confirm_next.store(false, Ordering::SeqCst);
            manager.press(Button::Restart)?;
        }
        Action::Controls => {
            manager.press(Button::Controls)?;
        }
        Action::Switch(name) => {
            let factory = sims::find(&name)
                .ok_or_else(|| SimStageError::msg(format!("unknown simulation `{name}`")))?;
            manager.set_simulation(factory)?;
        }
        Action::Param { panel, key, value } => {
            let applied = manager
                .container()
                .panel(&panel)
                .and_then(|panel| panel.set(&key, value));
            if applied.is_none() {
                tracing::warn!(%panel, %key, "no such parameter");
            }
        }
    }
    Ok(())
}

fn write_report(path: &Path, report: &RunReport) -> simstage_core::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    tracing::info!(?path, "report written");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// Scripted user input applied at a given run time, written `<seconds>:<action>`.
#[derive(Debug, Clone, PartialEq)]
struct ScriptedEvent {
    at: f32,
    action: Action,
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Click,
    Key(char),
    Pause,
    Resume,
    TogglePause,
    ToggleAudio,
    Restart,
    RestartDecline,
    Controls,
    Switch(String),
    Param { panel: String, key: String, value: f32 },
}

impl FromStr for ScriptedEvent {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (at, action) = text
            .split_once(':')
            .ok_or_else(|| format!("expected `<seconds>:<action>`, got `{text}`"))?;
        let at: f32 = at
            .trim()
            .parse()
            .map_err(|_| format!("invalid event time `{at}`"))?;
        if !at.is_finite() || at < 0.0 {
            return Err(format!("event time must be non-negative, got `{at}`"));
        }
        Ok(Self {
            at,
            action: action.parse()?,
        })
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let action = match text {
            "click" => Self::Click,
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "toggle-pause" => Self::TogglePause,
            "toggle-audio" => Self::ToggleAudio,
            "restart" => Self::Restart,
            "restart-decline" => Self::RestartDecline,
            "controls" => Self::Controls,
            _ => {
                if let Some(key) = text.strip_prefix("key:") {
                    let mut chars = key.chars();
                    match (chars.next(), chars.next()) {
                        (Some(key), None) => Self::Key(key),
                        _ => return Err(format!("key events take one character, got `{key}`")),
                    }
                } else if let Some(name) = text.strip_prefix("switch:") {
                    Self::Switch(name.to_string())
                } else if let Some(spec) = text.strip_prefix("param:") {
                    parse_param(spec)?
                } else {
                    return Err(format!("unknown action `{text}`"));
                }
            }
        };
        Ok(action)
    }
}

/// `<panel>:<key>=<value>`
fn parse_param(spec: &str) -> Result<Action, String> {
    let (panel, assignment) = spec
        .split_once(':')
        .ok_or_else(|| format!("expected `param:<panel>:<key>=<value>`, got `{spec}`"))?;
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| format!("missing `=` in `{assignment}`"))?;
    let value = value
        .parse()
        .map_err(|_| format!("invalid parameter value `{value}`"))?;
    Ok(Action::Param {
        panel: panel.to_string(),
        key: key.to_string(),
        value,
    })
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Host for interactive audio-visual simulations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a simulation headless for a fixed amount of time.
    Run {
        /// Simulation to start with.
        #[arg(short, long, default_value = "drone")]
        sim: String,
        /// Run length in seconds.
        #[arg(long, default_value_t = 5.0)]
        seconds: f32,
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Scripted input such as `0.5:click`, `2:pause` or `3:switch:chimes`.
        #[arg(short, long = "event")]
        events: Vec<ScriptedEvent>,
        /// Write a JSON run report to this path.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Show the debug overlay from the start.
        #[arg(long)]
        debug: bool,
        /// Pace frames against the wall clock instead of fixed steps.
        #[arg(long)]
        realtime: bool,
    },
    /// List the available simulations.
    List,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scripted_events() {
        let event: ScriptedEvent = "1.5:switch:chimes".parse().unwrap();
        assert_eq!(event.at, 1.5);
        assert_eq!(event.action, Action::Switch("chimes".into()));

        let key: ScriptedEvent = "0:key:'".parse().unwrap();
        assert_eq!(key.action, Action::Key('\''));

        let param: ScriptedEvent = "2:param:Drone:pitch=440".parse().unwrap();
        assert_eq!(
            param.action,
            Action::Param {
                panel: "Drone".into(),
                key: "pitch".into(),
                value: 440.0
            }
        );

        let controls: ScriptedEvent = "3:controls".parse().unwrap();
        assert_eq!(controls.action, Action::Controls);

        assert!("click".parse::<ScriptedEvent>().is_err());
        assert!("-1:click".parse::<ScriptedEvent>().is_err());
        assert!("1:jump".parse::<ScriptedEvent>().is_err());
        assert!("1:key:ab".parse::<ScriptedEvent>().is_err());
    }

    #[test]
    fn scripted_run_produces_audio_and_honours_declined_restart() {
        let mut config = AppConfig::default();
        config.audio.sample_rate = 8_000;
        config.frame.fps = 20;
        let options = RunOptions {
            sim: "drone".into(),
            seconds: 2.0,
            events: vec![
                "0.1:click".parse().unwrap(),
                "0.5:pause".parse().unwrap(),
                "0.7:restart-decline".parse().unwrap(),
                "1.0:resume".parse().unwrap(),
                "1.1:controls".parse().unwrap(),
                "1.2:switch:chimes".parse().unwrap(),
            ],
            debug: true,
            realtime: false,
        };

        let report = run(&config, options).unwrap();
        assert_eq!(report.simulation.as_deref(), Some("chimes"));
        assert_eq!(report.frames, 40);
        assert!(!report.paused);
        assert!(!report.controls_visible);
        assert!(report.meter.max_peak > 0.01);
        assert!(report
            .timeline
            .iter()
            .any(|sample| sample.simulation.as_deref() == Some("chimes") && sample.peak > 0.01));
    }

    #[test]
    fn unknown_simulation_is_an_error() {
        let options = RunOptions {
            sim: "nope".into(),
            seconds: 1.0,
            events: Vec::new(),
            debug: false,
            realtime: false,
        };
        assert!(run(&AppConfig::default(), options).is_err());
    }
}
