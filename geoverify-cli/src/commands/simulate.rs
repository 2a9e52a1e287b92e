//! Simulate command - run one verification attempt against a scenario file.
//!
//! The scenario scripts the tracking engine and the coarse location source.
//! State changes and readings are printed as they arrive; the command exits
//! once the attempt settles.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use console::{style, StyledObject};
use geoverify::scenario::Scenario;
use geoverify::{
    classify, GeospatialReading, QualityTier, SessionHandle, SessionState, SessionStreams,
    StateTransition,
    VerificationOutcome, VerificationResult, VerifierConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::error::CliError;

/// Exit code for a settled attempt that did not verify.
pub const EXIT_NOT_VERIFIED: i32 = 2;

/// Arguments for the simulate command.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Scenario file (JSON) scripting the engine and location source
    #[arg(long, short)]
    pub scenario: PathBuf,

    /// Print only the final outcome
    #[arg(long, short)]
    pub quiet: bool,
}

/// Run the simulate command. Returns the process exit code.
pub fn run(args: SimulateArgs, config: VerifierConfig) -> Result<i32, CliError> {
    let scenario = Scenario::load(&args.scenario)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(format!("Failed to start runtime: {}", e)))?;

    let outcome = runtime.block_on(simulate(&scenario, config, args.quiet))?;
    print_outcome(&outcome);

    Ok(exit_code(&outcome))
}

async fn simulate(
    scenario: &Scenario,
    config: VerifierConfig,
    quiet: bool,
) -> Result<VerificationOutcome, CliError> {
    if !quiet {
        println!("Scenario: {}", style(scenario.display_name()).bold());
        println!("Press Ctrl+C to abort");
        println!();
    }

    let rig = scenario.build();
    let (handle, mut streams) =
        SessionHandle::spawn(rig.engine, rig.location, rig.capabilities, config);

    // Ctrl+C aborts the attempt; the session reports Aborted and closes.
    let abort = handle.cancellation_token();
    ctrlc::set_handler(move || abort.cancel())
        .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        new_spinner()
    };
    let out = Output { spinner, quiet };

    handle.activate();
    follow(&handle, &mut streams, |event| out.event(event)).await;
    out.spinner.finish_and_clear();

    let outcome = handle.outcome();
    handle.shutdown().await;

    outcome.ok_or_else(|| {
        warn!("Session ended without an outcome");
        CliError::Runtime("Session ended without an outcome".to_string())
    })
}

/// Something published by the session worth printing.
#[derive(Debug, Clone)]
enum SessionEvent {
    State(StateTransition),
    Reading(GeospatialReading),
}

/// Forward state changes and readings to `emit` until the outcome settles.
///
/// Everything published before the outcome is emitted, in publish order per
/// stream.
async fn follow(
    handle: &SessionHandle,
    streams: &mut SessionStreams,
    mut emit: impl FnMut(SessionEvent),
) {
    let mut states_open = true;
    let mut readings_open = true;
    loop {
        tokio::select! {
            biased;

            transition = streams.states.recv(), if states_open => match transition {
                Ok(transition) => {
                    // Scripted installs complete immediately; stand in for the
                    // user returning from the install prompt.
                    if transition.to == SessionState::Installing {
                        handle.resume();
                    }
                    emit(SessionEvent::State(transition));
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "State stream lagged"),
                Err(RecvError::Closed) => states_open = false,
            },
            reading = streams.readings.recv(), if readings_open => match reading {
                Ok(reading) => emit(SessionEvent::Reading(reading)),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Reading stream lagged"),
                Err(RecvError::Closed) => readings_open = false,
            },
            changed = streams.outcome.changed() => {
                if changed.is_err() || streams.outcome.borrow().is_some() {
                    break;
                }
            }
        }
    }

    // Published just before the outcome and still queued.
    while let Ok(reading) = streams.readings.try_recv() {
        emit(SessionEvent::Reading(reading));
    }
    while let Ok(transition) = streams.states.try_recv() {
        emit(SessionEvent::State(transition));
    }
}

/// Progress lines go above the spinner on a terminal and straight to stdout
/// otherwise.
struct Output {
    spinner: ProgressBar,
    quiet: bool,
}

impl Output {
    fn line(&self, line: String) {
        if self.quiet {
            return;
        }
        if self.spinner.is_hidden() {
            println!("{}", line);
        } else {
            self.spinner.println(line);
        }
    }

    fn event(&self, event: SessionEvent) {
        match event {
            SessionEvent::State(transition) => {
                self.spinner.set_message(transition.to.status_text());
                self.line(format_transition(&transition));
            }
            SessionEvent::Reading(reading) => self.line(format_reading(&reading)),
        }
    }
}

fn new_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(SessionState::Uninitialized.status_text());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Map an outcome to the process exit code.
pub fn exit_code(outcome: &VerificationOutcome) -> i32 {
    match outcome.result {
        VerificationResult::Verified => 0,
        _ => EXIT_NOT_VERIFIED,
    }
}

fn format_transition(transition: &StateTransition) -> String {
    let line = format!("  state  {} -> {}", transition.from, transition.to);
    match &transition.cause {
        Some(cause) => format!("{} ({})", line, style(cause).red()),
        None => line,
    }
}

fn format_reading(reading: &GeospatialReading) -> String {
    let tier = classify(reading);
    format!(
        "  {:<8} {:>11.6}, {:>11.6}  ±{:>7.1} m  {}",
        reading.source.to_string(),
        reading.latitude,
        reading.longitude,
        reading.horizontal_accuracy_m,
        styled_tier(tier)
    )
}

fn styled_tier(tier: QualityTier) -> StyledObject<&'static str> {
    let label = style(tier.label());
    match tier {
        QualityTier::Excellent | QualityTier::Good => label.green(),
        QualityTier::Fair => label.yellow(),
        QualityTier::Poor => label.red(),
        QualityTier::Invalid => label.dim(),
    }
}

fn print_outcome(outcome: &VerificationOutcome) {
    let result = outcome.result.to_string();
    let result = match outcome.result {
        VerificationResult::Verified => style(result).green().bold(),
        VerificationResult::Aborted | VerificationResult::TimedOut => style(result).yellow().bold(),
        _ => style(result).red().bold(),
    };

    println!();
    println!("Outcome:  {}", result);
    println!("Elapsed:  {:.1}s", outcome.elapsed.as_secs_f64());
    if let Some(reading) = &outcome.final_reading {
        println!(
            "Position: {:.6}, {:.6} (±{:.1} m, {})",
            reading.latitude, reading.longitude, reading.horizontal_accuracy_m, reading.source
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoverify::{EngineError, ErrorKind, ReadingSource};

    fn outcome(result: VerificationResult) -> VerificationOutcome {
        VerificationOutcome {
            result,
            final_reading: None,
            elapsed: Duration::from_secs(3),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&outcome(VerificationResult::Verified)), 0);
        assert_eq!(exit_code(&outcome(VerificationResult::TimedOut)), 2);
        assert_eq!(exit_code(&outcome(VerificationResult::Aborted)), 2);
        assert_eq!(
            exit_code(&outcome(VerificationResult::Failed(ErrorKind::Transient))),
            2
        );
    }

    #[test]
    fn test_format_transition_with_cause() {
        console::set_colors_enabled(false);
        let transition = StateTransition {
            from: SessionState::Running,
            to: SessionState::Failed,
            cause: Some(EngineError::new(ErrorKind::Authorization, "denied")),
        };
        let line = format_transition(&transition);
        assert!(line.contains("running -> failed"));
        assert!(line.contains("denied"));
    }

    #[test]
    fn test_format_reading_shows_tier() {
        console::set_colors_enabled(false);
        let (reading, _) = GeospatialReading::new(
            48.8584,
            2.2945,
            35.0,
            0.0,
            7.5,
            ReadingSource::Primary,
            Duration::from_secs(2),
            5000.0,
        );
        let line = format_reading(&reading);
        assert!(line.contains("primary"));
        assert!(line.contains("48.858400"));
        assert!(line.ends_with("good"));
    }

    async fn run_scenario(json: &str) -> (Vec<SessionEvent>, VerificationOutcome) {
        let rig = Scenario::from_json(json).unwrap().build();
        let (handle, mut streams) = SessionHandle::spawn(
            rig.engine,
            rig.location,
            rig.capabilities,
            VerifierConfig::default(),
        );
        handle.activate();

        let mut events = Vec::new();
        follow(&handle, &mut streams, |event| events.push(event)).await;
        let outcome = handle.outcome().expect("outcome");
        handle.shutdown().await;
        (events, outcome)
    }

    fn states(events: &[SessionEvent]) -> Vec<SessionState> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::State(t) => Some(t.to),
                SessionEvent::Reading(_) => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_emits_failure_transition() {
        let (events, outcome) = run_scenario(
            r#"{
                "availability": "supported",
                "frames": [
                    { "earth_state": "initializing" },
                    { "earth_state": "error_not_authorized" }
                ]
            }"#,
        )
        .await;

        assert_eq!(
            outcome.result,
            VerificationResult::Failed(ErrorKind::Authorization)
        );
        match events.last() {
            Some(SessionEvent::State(t)) => {
                assert_eq!(t.from, SessionState::Running);
                assert_eq!(t.to, SessionState::Failed);
                assert!(t.cause.is_some());
            }
            other => panic!("unexpected last event {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_emits_deciding_reading() {
        let (events, outcome) = run_scenario(
            r#"{
                "availability": "supported",
                "frames": [
                    { "pose": { "latitude": 51.50072, "longitude": -0.12462, "horizontal_accuracy_m": 6.0 }, "repeat": 2 }
                ]
            }"#,
        )
        .await;

        assert_eq!(outcome.result, VerificationResult::Verified);
        let readings: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Reading(r) => Some(*r),
                SessionEvent::State(_) => None,
            })
            .collect();
        assert_eq!(readings.len(), 2);
        let deciding = outcome.final_reading.expect("final reading");
        assert_eq!(readings[1].captured_at, deciding.captured_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_completes_scripted_install() {
        let (events, outcome) = run_scenario(
            r#"{
                "availability": "needs_install",
                "install": ["requested", "installed"],
                "frames": [
                    { "pose": { "latitude": 51.50072, "longitude": -0.12462, "horizontal_accuracy_m": 6.0 } }
                ]
            }"#,
        )
        .await;

        assert_eq!(outcome.result, VerificationResult::Verified);
        assert_eq!(
            states(&events),
            vec![
                SessionState::CheckingAvailability,
                SessionState::InstallRequired,
                SessionState::Installing,
                SessionState::Initializing,
                SessionState::Running,
            ]
        );
    }
}
