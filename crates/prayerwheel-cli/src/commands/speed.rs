use clap::Subcommand;
use prayerwheel_core::RotationSpeed;

use super::{now, print_events, CliResult, Context};

#[derive(Subcommand)]
pub enum SpeedAction {
    /// Print the rotation speed in rpm
    Get,
    /// Set the rotation speed in rpm (6 to 600)
    Set { rpm: f64 },
}

pub fn run(action: SpeedAction) -> CliResult {
    let ctx = Context::open()?;
    let now = now();
    let mut wheel = ctx.wheel(now)?;

    match action {
        SpeedAction::Get => println!("{}", wheel.speed().rpm()),
        SpeedAction::Set { rpm } => {
            let speed = RotationSpeed::new(rpm)?;
            print_events(&wheel.set_speed(speed, now))?;
            ctx.save(&mut wheel, now)?;
        }
    }
    Ok(())
}
