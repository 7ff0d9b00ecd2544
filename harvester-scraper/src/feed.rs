//! Feed pagination: progressively reveal units from a source until the run
//! budget is spent or the feed stops yielding anything new.

use crate::config::ScraperConfig;
use crate::extract::RawUnit;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A paginated source of raw feed units. Implementations own the mechanics
/// of their medium (live page, snapshot file); the discovery loop only sees
/// the growing window of visible units.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Prepare the source for reading. Called once per run.
    async fn navigate(&self) -> Result<()>;

    /// Every unit currently visible, oldest first. Grows monotonically as
    /// `request_more` succeeds.
    async fn visible_units(&self) -> Result<Vec<RawUnit>>;

    /// Ask the source to reveal more units. A no-op return is fine; the
    /// discovery loop detects stagnation by count.
    async fn request_more(&self) -> Result<()>;
}

/// Drive a feed source until `max_units` are visible or `max_idle_rounds`
/// expansions in a row reveal nothing new. Returns at most `max_units`
/// units, deduplicated by permalink.
pub async fn discover(source: &dyn FeedSource, config: &ScraperConfig) -> Result<Vec<RawUnit>> {
    let run_id = Uuid::new_v4();
    info!(
        "Starting feed discovery run {} (max_units={}, max_idle_rounds={})",
        run_id, config.max_units, config.max_idle_rounds
    );

    source.navigate().await.context("Failed to open feed")?;

    let mut previous_count = 0usize;
    let mut idle_rounds = 0u32;

    loop {
        let units = source.visible_units().await?;

        if units.len() >= config.max_units {
            debug!("Run {}: unit budget reached at {}", run_id, units.len());
            break;
        }

        if units.len() > previous_count {
            debug!(
                "Run {}: {} units visible (+{})",
                run_id,
                units.len(),
                units.len() - previous_count
            );
            previous_count = units.len();
            idle_rounds = 0;
        } else {
            idle_rounds += 1;
            if idle_rounds >= config.max_idle_rounds {
                info!(
                    "Run {}: feed stagnant after {} idle rounds, stopping at {} units",
                    run_id,
                    idle_rounds,
                    units.len()
                );
                break;
            }
        }

        source.request_more().await?;
        pause(config).await;
    }

    let mut units = source.visible_units().await?;

    // Dedup across the whole visible window first, so duplicates never eat
    // into the unit budget; the budget applies to unique units
    let before = units.len();
    let mut seen = Vec::new();
    units.retain(|u| match &u.permalink {
        Some(link) => {
            if seen.contains(link) {
                false
            } else {
                seen.push(link.clone());
                true
            }
        }
        None => true,
    });
    if units.len() < before {
        warn!("Run {}: dropped {} duplicate permalinks", run_id, before - units.len());
    }
    units.truncate(config.max_units);

    info!("Run {}: collected {} units", run_id, units.len());
    Ok(units)
}

/// Randomized pause between expansions so request timing is not a clean
/// machine signature.
async fn pause(config: &ScraperConfig) {
    if config.max_delay_secs == 0 {
        return;
    }
    let secs = rand::thread_rng().gen_range(config.min_delay_secs..=config.max_delay_secs);
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

/// Feed source backed by a JSON snapshot file of raw units. Units are
/// revealed in batches so the discovery loop exercises the same pagination
/// path as a live source.
pub struct SnapshotFeedSource {
    units: Vec<RawUnit>,
    revealed: Mutex<usize>,
    batch_size: usize,
}

impl SnapshotFeedSource {
    pub fn new(units: Vec<RawUnit>, batch_size: usize) -> Self {
        Self {
            units,
            revealed: Mutex::new(0),
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_file(path: &Path, batch_size: usize) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let units: Vec<RawUnit> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid snapshot JSON in {}", path.display()))?;
        Ok(Self::new(units, batch_size))
    }
}

#[async_trait]
impl FeedSource for SnapshotFeedSource {
    async fn navigate(&self) -> Result<()> {
        let mut revealed = self.revealed.lock().unwrap();
        *revealed = self.batch_size.min(self.units.len());
        Ok(())
    }

    async fn visible_units(&self) -> Result<Vec<RawUnit>> {
        let revealed = *self.revealed.lock().unwrap();
        Ok(self.units[..revealed].to_vec())
    }

    async fn request_more(&self) -> Result<()> {
        let mut revealed = self.revealed.lock().unwrap();
        *revealed = (*revealed + self.batch_size).min(self.units.len());
        Ok(())
    }
}
