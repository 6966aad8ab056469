use clap::Subcommand;
use prayerwheel_core::{format_count, DevotionType};
use serde_json::json;

use super::{now, print_events, CliResult, Context};

#[derive(Subcommand)]
pub enum CounterAction {
    /// Print today and lifetime counts as JSON
    Show {
        /// Devotion type (defaults to the selected one)
        #[arg(long)]
        devotion: Option<DevotionType>,
        /// Show every devotion type
        #[arg(long, conflicts_with = "devotion")]
        all: bool,
    },
    /// Zero today and lifetime counts (history is kept)
    Reset {
        #[arg(long)]
        devotion: Option<DevotionType>,
    },
}

pub fn run(action: CounterAction) -> CliResult {
    let ctx = Context::open()?;
    let now = now();
    let mut wheel = ctx.wheel(now)?;

    match action {
        CounterAction::Show { devotion, all } => {
            let devotions = if all {
                DevotionType::ALL.to_vec()
            } else {
                vec![ctx.devotion_or_selected(devotion)?]
            };
            let rows: Vec<_> = devotions
                .into_iter()
                .map(|devotion| {
                    let counter = wheel.counter(devotion, now);
                    json!({
                        "devotion": devotion,
                        "name": devotion.display_name(),
                        "today_count": counter.today_count,
                        "total_cycles": counter.total_cycles,
                        "total_display": format_count(counter.total_cycles),
                        "last_reset_day": counter.last_reset_day,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        CounterAction::Reset { devotion } => {
            let devotion = ctx.devotion_or_selected(devotion)?;
            print_events(&wheel.reset_counter(devotion, now))?;
        }
    }

    ctx.save(&mut wheel, now)?;
    Ok(())
}
