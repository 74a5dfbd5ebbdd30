//! Content profiling: derive acceptance thresholds from the source text.
//!
//! Thin sources (very short text, or sources whose hint marks them as
//! inherently sparse) get narrow summary bounds and zero tolerance for hedging.
//! Everything else is bucketed by length, with bullet minimums and per-item
//! floors that grow monotonically with the bucket.

use crate::config::ProfileConfig;
use crate::schema::{ContentProfile, LengthBucket, SpeculationTolerance, char_len};

/// Static thresholds for one non-thin length bucket.
struct BucketSpec {
    bucket: LengthBucket,
    summary: (usize, usize),
    detail: (usize, usize),
    min_bullets: usize,
    min_item_len: usize,
    speculation: SpeculationTolerance,
}

const BUCKETS: [BucketSpec; 5] = [
    BucketSpec {
        bucket: LengthBucket::VeryShort,
        summary: (80, 200),
        detail: (150, 700),
        min_bullets: 3,
        min_item_len: 15,
        speculation: SpeculationTolerance::Low,
    },
    BucketSpec {
        bucket: LengthBucket::Short,
        summary: (100, 250),
        detail: (300, 1_000),
        min_bullets: 4,
        min_item_len: 20,
        speculation: SpeculationTolerance::Normal,
    },
    BucketSpec {
        bucket: LengthBucket::Medium,
        summary: (120, 300),
        detail: (450, 1_400),
        min_bullets: 5,
        min_item_len: 25,
        speculation: SpeculationTolerance::Normal,
    },
    BucketSpec {
        bucket: LengthBucket::Long,
        summary: (150, 350),
        detail: (600, 1_800),
        min_bullets: 6,
        min_item_len: 30,
        speculation: SpeculationTolerance::Normal,
    },
    BucketSpec {
        bucket: LengthBucket::VeryLong,
        summary: (150, 400),
        detail: (800, 2_400),
        min_bullets: 7,
        min_item_len: 30,
        speculation: SpeculationTolerance::Normal,
    },
];

/// Classifies content into a [`ContentProfile`].
#[derive(Debug, Clone, Default)]
pub struct ContentProfiler {
    config: ProfileConfig,
}

impl ContentProfiler {
    pub fn new(config: ProfileConfig) -> Self {
        Self { config }
    }

    /// Profile `content`, optionally informed by a source-category hint.
    ///
    /// Pure and total: every input maps to a profile.
    pub fn profile(&self, content: &str, source_hint: Option<&str>) -> ContentProfile {
        let content_len = char_len(content.trim());

        if content_len == 0 {
            return strict_thin_profile();
        }

        if content_len < self.config.thin_threshold || self.is_sparse_source(source_hint) {
            return thin_profile(content_len);
        }

        let bucket = LengthBucket::for_len(content_len);
        let spec = BUCKETS
            .iter()
            .find(|s| s.bucket == bucket)
            .unwrap_or(&BUCKETS[BUCKETS.len() - 1]);

        ContentProfile {
            is_thin: false,
            length_bucket: bucket,
            content_len,
            min_summary_len: spec.summary.0,
            max_summary_len: spec.summary.1,
            min_detail_len: spec.detail.0,
            max_detail_len: spec.detail.1,
            min_bullet_items: spec.min_bullets,
            min_item_len: spec.min_item_len,
            speculation_tolerance: spec.speculation,
        }
    }

    fn is_sparse_source(&self, source_hint: Option<&str>) -> bool {
        let Some(hint) = source_hint else {
            return false;
        };
        let hint = hint.to_lowercase();
        self.config
            .sparse_hints
            .iter()
            .any(|h| !h.is_empty() && hint.contains(&h.to_lowercase()))
    }
}

fn thin_profile(content_len: usize) -> ContentProfile {
    ContentProfile {
        is_thin: true,
        length_bucket: LengthBucket::for_len(content_len),
        content_len,
        min_summary_len: 60,
        max_summary_len: 100,
        min_detail_len: 50,
        max_detail_len: 400,
        min_bullet_items: 1,
        min_item_len: 0,
        speculation_tolerance: SpeculationTolerance::None,
    }
}

/// Profile for empty content: nothing to ground a summary on at all.
fn strict_thin_profile() -> ContentProfile {
    ContentProfile {
        max_summary_len: 80,
        max_detail_len: 200,
        ..thin_profile(0)
    }
}
