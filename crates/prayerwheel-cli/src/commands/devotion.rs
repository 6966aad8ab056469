use clap::Subcommand;
use prayerwheel_core::DevotionType;
use serde_json::json;

use super::{now, print_events, CliResult, Context};

#[derive(Subcommand)]
pub enum DevotionAction {
    /// List devotion types as JSON
    List,
    /// Print the selected devotion type
    Get,
    /// Select a devotion type (storage key or devotional name)
    Set { devotion: DevotionType },
}

pub fn run(action: DevotionAction) -> CliResult {
    let ctx = Context::open()?;

    match action {
        DevotionAction::List => {
            let selected = ctx.devotion_or_selected(None)?;
            let rows: Vec<_> = DevotionType::ALL
                .iter()
                .map(|d| {
                    json!({
                        "key": d.key(),
                        "name": d.display_name(),
                        "selected": *d == selected,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        DevotionAction::Get => {
            println!("{}", ctx.devotion_or_selected(None)?.key());
        }
        DevotionAction::Set { devotion } => {
            let now = now();
            let mut wheel = ctx.wheel(now)?;
            print_events(&wheel.select_devotion(devotion, now))?;
            ctx.save(&mut wheel, now)?;
        }
    }
    Ok(())
}
