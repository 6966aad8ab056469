use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use clap::Subcommand;
use prayerwheel_core::{format_count, Database, PrayerWheel};
use serde_json::json;

use super::{now, print_events, CliResult, Context};

/// Each manual rotation is reported as its own event.
const MAX_MANUAL_SPIN: u64 = 10_000;

#[derive(Subcommand)]
pub enum WheelAction {
    /// Start spinning
    Start,
    /// Stop spinning, crediting completed rotations
    Pause,
    /// Credit completed rotations and print wheel state as JSON
    Status,
    /// Turn the wheel by hand
    Spin {
        /// Whole rotations to credit
        #[arg(default_value = "1", value_parser = clap::value_parser!(u64).range(1..=MAX_MANUAL_SPIN))]
        rotations: u64,
    },
    /// Spin in the foreground, printing each rotation as it completes
    Run {
        /// Stop after this many seconds (runs until Ctrl+C otherwise)
        #[arg(long)]
        seconds: Option<u64>,
        /// Tick interval in milliseconds
        #[arg(long, default_value = "250")]
        interval_ms: u64,
    },
    /// Snapshot state before going away
    Suspend,
    /// Credit rotations missed while suspended and start spinning
    Resume,
    /// Show what a resume would credit right now
    Pending,
}

pub fn run(action: WheelAction) -> CliResult {
    let ctx = Context::open()?;
    let now = now();
    let (mut wheel, restored) = ctx.restore(now)?;
    if !matches!(action, WheelAction::Pending) {
        print_events(&restored)?;
    }

    match action {
        WheelAction::Start => print_events(&wheel.start(now))?,
        WheelAction::Pause => print_events(&wheel.pause(now))?,
        WheelAction::Status => {
            print_events(&wheel.tick(now))?;
            print_status(&mut wheel, now)?;
        }
        WheelAction::Spin { rotations } => print_events(&wheel.spin(rotations, now))?,
        WheelAction::Run {
            seconds,
            interval_ms,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_loop(&mut wheel, seconds, interval_ms))?;
            let stopped = super::now();
            print_events(&wheel.pause(stopped))?;
            ctx.save(&mut wheel, stopped)?;
            return Ok(());
        }
        WheelAction::Suspend => print_events(&wheel.suspend(now))?,
        WheelAction::Resume => print_events(&wheel.resume(now))?,
        WheelAction::Pending => {
            let pending = wheel.compensator().preview(now);
            println!("{}", serde_json::to_string_pretty(&pending)?);
        }
    }

    ctx.save(&mut wheel, now)?;
    Ok(())
}

async fn run_loop(
    wheel: &mut PrayerWheel<&Database>,
    seconds: Option<u64>,
    interval_ms: u64,
) -> CliResult {
    let started = tokio::time::Instant::now();
    let deadline = seconds.map(|s| started + Duration::from_secs(s));
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms.max(10)));

    print_events(&wheel.start(super::now()))?;
    eprintln!(
        "Spinning {} at {} rpm | Press Ctrl+C to stop",
        wheel.devotion(),
        wheel.speed().rpm()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nStopping...");
                break;
            }
            _ = interval.tick() => {
                print_events(&wheel.tick(super::now()))?;
                if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                    break;
                }
            }
        }
    }
    tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "wheel loop finished");
    Ok(())
}

fn print_status(wheel: &mut PrayerWheel<&Database>, now: DateTime<FixedOffset>) -> CliResult {
    let devotion = wheel.devotion();
    let counter = wheel.counter(devotion, now);
    let status = json!({
        "devotion": devotion,
        "name": devotion.display_name(),
        "state": wheel.state(),
        "speed_rpm": wheel.speed().rpm(),
        "angle_degrees": wheel.angle_degrees(),
        "today_count": counter.today_count,
        "total_cycles": counter.total_cycles,
        "total_display": format_count(counter.total_cycles),
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
