//! Cadence report for the content pipeline.
//!
//! Loads configuration, validates the cadence settings and prints the next
//! publish slots together with whether a draft is due now.
//!
//! Usage: `content-pipeline [COUNT]` (default 5 slots).

use anyhow::{Context, bail};
use content_pipeline_core::environment::{Clock, SystemClock};
use content_pipeline_runtime::{CadenceScheduler, Config};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_SLOT_COUNT: usize = 5;

fn main() -> anyhow::Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "content_pipeline={level},content_pipeline_runtime={level},content_pipeline_webhook={level}",
                    level = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let count = match std::env::args().nth(1) {
        Some(arg) => arg
            .parse::<usize>()
            .with_context(|| format!("slot count must be a positive integer, got {arg:?}"))?,
        None => DEFAULT_SLOT_COUNT,
    };

    let violations = config.cadence_violations();
    if !violations.is_empty() {
        for violation in &violations {
            error!(%violation, "Invalid cadence setting");
        }
        bail!("{} invalid cadence setting(s)", violations.len());
    }
    let cadence = config.cadence_config()?;
    info!(
        interval_days = cadence.interval_days(),
        publish_hour = cadence.publish_hour(),
        time_zone = %cadence.time_zone(),
        draft_lead_hours = cadence.draft_lead_hours(),
        "Cadence loaded"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let scheduler = CadenceScheduler::new(Arc::clone(&clock));
    let tz = cadence.time_zone();

    println!("Next {count} slot(s) from {}:", clock.now().to_rfc3339());
    for (index, slot) in scheduler.upcoming_slots(&cadence, count).enumerate() {
        println!(
            "{:>3}. publish {} ({})  draft from {}",
            index + 1,
            slot.publish_at.to_rfc3339(),
            slot.publish_at.with_timezone(&tz).format("%a %Y-%m-%d %H:%M %Z"),
            slot.create_at.to_rfc3339(),
        );
        if let Some(remind_at) = slot.remind_at {
            println!("     remind {}", remind_at.to_rfc3339());
        }
    }

    let due = scheduler.should_create_draft(&cadence);
    println!("Draft due now: {}", if due { "yes" } else { "no" });
    Ok(())
}
