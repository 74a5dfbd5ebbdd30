//! Configuration for profiling, quality evaluation, and generation control.
//!
//! Load order: `.synopsis/config.toml` → environment variables → defaults.
//! The loaded value is read-only and shared by reference for the lifetime of
//! the pipeline.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level synopsis configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SynopsisConfig {
    pub profile: ProfileConfig,
    pub quality: QualityConfig,
    pub generation: GenerationConfig,
    pub tags: TagConfig,
}

/// Content profiling thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Content shorter than this (in chars) is treated as thin.
    pub thin_threshold: usize,
    /// Source hints that mark inherently sparse sources (slide decks, link posts).
    /// Matched case-insensitively as substrings of the caller's hint.
    pub sparse_hints: Vec<String>,
}

/// Quality evaluation floors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Score below which an artifact is invalid.
    pub validity_floor: u8,
    /// Score below which the controller asks for another round.
    pub regeneration_floor: u8,
    /// Bullet-count checks only apply to content at least this long.
    pub item_count_content_floor: usize,
    /// Hedging lexicon locales to scan. Empty means every registered locale.
    pub locales: Vec<String>,
}

/// Generation and retry control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Total attempts per `generate()` call.
    pub max_attempts: usize,
    /// Score a candidate must reach to be accepted without further attempts.
    pub min_quality_score: u8,
    /// Hard cap on content chars embedded in the prompt.
    pub content_max_length: usize,
    /// Per-call timeout for the generation service.
    pub timeout_secs: u64,
    /// Inter-attempt delays; the last entry repeats.
    pub retry_delays_ms: Vec<u64>,
    /// Delay multiplier applied after a rate-limited failure.
    pub rate_limit_multiplier: u32,
    pub max_output_tokens: u32,
    pub temperature: f32,
    /// Return the best structurally valid candidate when attempts run out.
    pub best_effort_on_exhaustion: bool,
    /// Accept any bullet-formatted candidate without critical issues, regardless
    /// of score. Intended for the window after a prompt/format migration.
    pub accept_format_migration: bool,
}

/// Tag canonicalization overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    /// Extra `synonym -> canonical` entries layered over the built-in table.
    ///
    /// Example:
    /// [tags.aliases]
    /// nextjs = "Next.js"
    pub aliases: BTreeMap<String, String>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            thin_threshold: 200,
            sparse_hints: ["slide", "speakerdeck", "slideshare", "link", "bookmark"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            validity_floor: 60,
            regeneration_floor: 70,
            item_count_content_floor: 3_000,
            locales: Vec::new(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_quality_score: 70,
            content_max_length: 150_000,
            timeout_secs: 60,
            retry_delays_ms: vec![1_000, 2_000, 4_000],
            rate_limit_multiplier: 3,
            max_output_tokens: 2_048,
            temperature: 0.3,
            best_effort_on_exhaustion: true,
            accept_format_migration: false,
        }
    }
}

impl GenerationConfig {
    /// Delay before the attempt following `attempt_index` (zero-based).
    pub fn retry_delay_ms(&self, attempt_index: usize, rate_limited: bool) -> u64 {
        let idx = attempt_index.min(self.retry_delays_ms.len().saturating_sub(1));
        let base = self.retry_delays_ms.get(idx).copied().unwrap_or(4_000);
        if rate_limited {
            base.saturating_mul(u64::from(self.rate_limit_multiplier.max(1)))
        } else {
            base
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl SynopsisConfig {
    /// Load config from `.synopsis/config.toml` under `root`, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(root: &Path) -> Result<Self> {
        let config_path = root.join(".synopsis").join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        // Alias keys are matched case-insensitively at lookup time.
        let normalized = std::mem::take(&mut config.tags.aliases)
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();
        config.tags.aliases = normalized;

        env_override(
            "SYNOPSIS_THIN_THRESHOLD",
            &mut config.profile.thin_threshold,
        );
        env_override(
            "SYNOPSIS_VALIDITY_FLOOR",
            &mut config.quality.validity_floor,
        );
        env_override(
            "SYNOPSIS_REGENERATION_FLOOR",
            &mut config.quality.regeneration_floor,
        );
        env_override(
            "SYNOPSIS_MAX_ATTEMPTS",
            &mut config.generation.max_attempts,
        );
        env_override(
            "SYNOPSIS_MIN_QUALITY_SCORE",
            &mut config.generation.min_quality_score,
        );
        env_override(
            "SYNOPSIS_CONTENT_MAX_LENGTH",
            &mut config.generation.content_max_length,
        );
        env_override(
            "SYNOPSIS_TIMEOUT_SECS",
            &mut config.generation.timeout_secs,
        );

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (name, floor) in [
            ("validity_floor", self.quality.validity_floor),
            ("regeneration_floor", self.quality.regeneration_floor),
            ("min_quality_score", self.generation.min_quality_score),
        ] {
            if floor > 100 {
                anyhow::bail!("{} ({}) must be within 0..=100", name, floor);
            }
        }
        if self.generation.max_attempts == 0 {
            anyhow::bail!("max_attempts must be at least 1");
        }
        if self.generation.retry_delays_ms.is_empty() {
            anyhow::bail!("retry_delays_ms must contain at least one delay");
        }
        if self.generation.content_max_length == 0 {
            anyhow::bail!("content_max_length must be greater than 0");
        }
        Ok(())
    }
}
