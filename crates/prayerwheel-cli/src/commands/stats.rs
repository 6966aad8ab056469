use clap::Subcommand;
use prayerwheel_core::{format_count, DevotionType};

use super::{now, CliResult, Context};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Streak, weekly, monthly and lifetime figures as JSON
    Summary {
        #[arg(long)]
        devotion: Option<DevotionType>,
    },
    /// Per-day records for recent days as JSON
    History {
        #[arg(long)]
        devotion: Option<DevotionType>,
        /// Number of days ending today
        #[arg(long, default_value = "7")]
        days: u32,
    },
    /// Delete practice history
    Clear {
        /// Only this devotion type (all types otherwise)
        #[arg(long)]
        devotion: Option<DevotionType>,
    },
}

pub fn run(action: StatsAction) -> CliResult {
    let ctx = Context::open()?;
    let now = now();
    let mut wheel = ctx.wheel(now)?;

    match action {
        StatsAction::Summary { devotion } => {
            let devotion = ctx.devotion_or_selected(devotion)?;
            let summary = wheel.summary(devotion, now);
            let mut json = serde_json::to_value(&summary)?;
            json["total_display"] = format_count(summary.total_cycles).into();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        StatsAction::History { devotion, days } => {
            let devotion = ctx.devotion_or_selected(devotion)?;
            let records = wheel.history().recent(devotion, now.date_naive(), days);
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        StatsAction::Clear { devotion } => {
            wheel.history_mut().clear(devotion)?;
            match devotion {
                Some(devotion) => println!("history cleared for {}", devotion.key()),
                None => println!("history cleared"),
            }
        }
    }

    ctx.save(&mut wheel, now)?;
    Ok(())
}
