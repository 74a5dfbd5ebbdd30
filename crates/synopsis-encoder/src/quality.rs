//! Quality evaluation: score a candidate artifact against its content profile.
//!
//! Scoring starts at 100 and applies independent, additive deductions. Each
//! deduction records a [`QualityIssue`]; the report always carries the full
//! issue list, even for accepted artifacts.

use crate::lexicon::LexiconRegistry;
use crate::parser::split_bullet;
use std::sync::Arc;
use synopsis_core::config::QualityConfig;
use synopsis_core::schema::{
    ContentProfile, IssueKind, QualityIssue, QualityReport, Severity, SpeculationTolerance,
    SummaryArtifact, char_len,
};

/// Characters accepted as the end of a summary sentence.
const TERMINAL_PUNCTUATION: &[char] = &['。', '.', '!', '?', '！', '？'];

/// Prefix length compared by the near-duplicate check.
const DUPLICATE_PREFIX_CHARS: usize = 100;

const PENALTY_SHORT: i32 = 20;
const PENALTY_THIN_SUMMARY_OVER: i32 = 15;
const PENALTY_THIN_DETAIL_OVER: i32 = 10;
const PENALTY_OVER: i32 = 5;
const PENALTY_SHORT_ITEM: i32 = 3;
const PENALTY_SHORT_ITEM_CAP: i32 = 15;
const PENALTY_ITEM_COUNT: i32 = 30;
const PENALTY_NO_BULLETS: i32 = 20;
const PENALTY_PUNCTUATION: i32 = 5;
const PENALTY_SPECULATION_CRITICAL: i32 = 40;
const PENALTY_SPECULATION_LOW_EACH: i32 = 10;
const PENALTY_SPECULATION_LOW_CAP: i32 = 30;
const PENALTY_SPECULATION_MINOR_EACH: i32 = 5;
const PENALTY_SPECULATION_MAJOR: i32 = 20;
const PENALTY_DUPLICATE_PREFIX: i32 = 25;
const PENALTY_EMPTY_BULLET: i32 = 30;
const PENALTY_FALLBACK_SUMMARY: i32 = 25;
const PENALTY_FALLBACK_DETAIL: i32 = 40;

/// Running score and issue list for one evaluation.
struct Scorecard {
    deductions: i32,
    forced_zero: bool,
    issues: Vec<QualityIssue>,
}

impl Scorecard {
    fn new() -> Self {
        Self {
            deductions: 0,
            forced_zero: false,
            issues: Vec::new(),
        }
    }

    fn deduct(&mut self, kind: IssueKind, severity: Severity, points: i32, message: String) {
        self.deductions += points;
        self.issues.push(QualityIssue::new(kind, severity, message));
    }

    fn score(&self) -> u8 {
        if self.forced_zero {
            return 0;
        }
        (100 - self.deductions).clamp(0, 100) as u8
    }
}

/// Bullet structure of a detailed summary.
struct DetailShape<'a> {
    /// Text of each marker-prefixed line (empty for a bare marker).
    bullets: Vec<&'a str>,
    empty_bullets: usize,
}

impl<'a> DetailShape<'a> {
    fn of(detail: &'a str) -> Self {
        let bullets: Vec<&str> = detail
            .lines()
            .filter_map(|line| split_bullet(line).map(|(_, text)| text))
            .collect();
        let empty_bullets = bullets.iter().filter(|b| b.is_empty()).count();
        Self {
            bullets,
            empty_bullets,
        }
    }

    fn filled(&self) -> impl Iterator<Item = &&'a str> {
        self.bullets.iter().filter(|b| !b.is_empty())
    }
}

/// Scores artifacts against a profile.
pub struct QualityEvaluator {
    config: QualityConfig,
    lexicons: Arc<LexiconRegistry>,
}

impl QualityEvaluator {
    pub fn new(config: QualityConfig, lexicons: Arc<LexiconRegistry>) -> Self {
        Self { config, lexicons }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Evaluate `artifact` against `profile`.
    pub fn evaluate(&self, artifact: &SummaryArtifact, profile: &ContentProfile) -> QualityReport {
        let mut card = Scorecard::new();
        let shape = DetailShape::of(&artifact.detailed_summary);

        check_length(&mut card, artifact, profile, &shape);
        self.check_item_count(&mut card, profile, &shape);
        check_format(&mut card, artifact, profile, &shape);
        check_punctuation(&mut card, artifact);
        self.check_speculation(&mut card, artifact, profile);
        check_duplication(&mut card, artifact, &shape);
        check_empty_bullets(&mut card, &shape);
        check_fallback(&mut card, artifact);

        let score = card.score();
        let summary_short =
            profile.is_thin && char_len(artifact.summary.trim()) < profile.min_summary_len;
        let is_valid = score >= self.config.validity_floor && !summary_short;
        let has_critical = card.issues.iter().any(|i| i.severity == Severity::Critical);
        let requires_regeneration = score < self.config.regeneration_floor || has_critical;

        tracing::debug!(
            score,
            issues = card.issues.len(),
            is_valid,
            requires_regeneration,
            bucket = %profile.length_bucket,
            thin = profile.is_thin,
            "evaluated candidate"
        );

        QualityReport {
            score,
            issues: card.issues,
            is_valid,
            requires_regeneration,
        }
    }

    fn check_item_count(&self, card: &mut Scorecard, profile: &ContentProfile, shape: &DetailShape<'_>) {
        if profile.is_thin || profile.content_len < self.config.item_count_content_floor {
            return;
        }
        let count = shape.filled().count();
        if count < profile.min_bullet_items {
            card.deduct(
                IssueKind::ItemCount,
                Severity::Critical,
                PENALTY_ITEM_COUNT,
                format!(
                    "detailed summary has {} bullet{}, expected at least {} for {} content",
                    count,
                    if count == 1 { "" } else { "s" },
                    profile.min_bullet_items,
                    profile.length_bucket
                ),
            );
        }
    }

    fn check_speculation(
        &self,
        card: &mut Scorecard,
        artifact: &SummaryArtifact,
        profile: &ContentProfile,
    ) {
        let locales = &self.config.locales;
        let mut hits = self.lexicons.find(&artifact.summary, locales);
        hits.extend(self.lexicons.find(&artifact.detailed_summary, locales));
        if hits.is_empty() {
            return;
        }

        let count = hits.len();
        hits.sort();
        hits.dedup();
        let listed = hits.join(", ");

        match profile.speculation_tolerance {
            SpeculationTolerance::None => card.deduct(
                IssueKind::Speculative,
                Severity::Critical,
                PENALTY_SPECULATION_CRITICAL,
                format!(
                    "speculative expression in thin-content summary ({}); the source cannot support inference",
                    listed
                ),
            ),
            SpeculationTolerance::Low => card.deduct(
                IssueKind::Speculative,
                Severity::Major,
                (PENALTY_SPECULATION_LOW_EACH * count as i32).min(PENALTY_SPECULATION_LOW_CAP),
                format!("{} speculative expression(s): {}", count, listed),
            ),
            SpeculationTolerance::Normal if count >= 3 => card.deduct(
                IssueKind::Speculative,
                Severity::Major,
                PENALTY_SPECULATION_MAJOR,
                format!("{} speculative expressions: {}", count, listed),
            ),
            SpeculationTolerance::Normal => card.deduct(
                IssueKind::Speculative,
                Severity::Minor,
                PENALTY_SPECULATION_MINOR_EACH * count as i32,
                format!("{} speculative expression(s): {}", count, listed),
            ),
        }
    }
}

fn check_length(
    card: &mut Scorecard,
    artifact: &SummaryArtifact,
    profile: &ContentProfile,
    shape: &DetailShape<'_>,
) {
    let summary_len = char_len(artifact.summary.trim());
    if summary_len < profile.min_summary_len {
        card.deduct(
            IssueKind::Length,
            Severity::Major,
            PENALTY_SHORT,
            format!(
                "summary is {} chars, below the minimum of {}",
                summary_len, profile.min_summary_len
            ),
        );
    } else if summary_len > profile.max_summary_len {
        let (severity, points) = if profile.is_thin {
            (Severity::Major, PENALTY_THIN_SUMMARY_OVER)
        } else {
            (Severity::Minor, PENALTY_OVER)
        };
        card.deduct(
            IssueKind::Length,
            severity,
            points,
            format!(
                "summary is {} chars, above the maximum of {}",
                summary_len, profile.max_summary_len
            ),
        );
    }

    let detail_len = char_len(artifact.detailed_summary.trim());
    if detail_len < profile.min_detail_len {
        card.deduct(
            IssueKind::Length,
            Severity::Major,
            PENALTY_SHORT,
            format!(
                "detailed summary is {} chars, below the minimum of {}",
                detail_len, profile.min_detail_len
            ),
        );
    } else if detail_len > profile.max_detail_len {
        let (severity, points) = if profile.is_thin {
            (Severity::Major, PENALTY_THIN_DETAIL_OVER)
        } else {
            (Severity::Minor, PENALTY_OVER)
        };
        card.deduct(
            IssueKind::Length,
            severity,
            points,
            format!(
                "detailed summary is {} chars, above the maximum of {}",
                detail_len, profile.max_detail_len
            ),
        );
    }

    if profile.min_item_len > 0 {
        let short_items = shape
            .filled()
            .filter(|b| char_len(b) < profile.min_item_len)
            .count();
        if short_items > 0 {
            card.deduct(
                IssueKind::Length,
                Severity::Minor,
                (PENALTY_SHORT_ITEM * short_items as i32).min(PENALTY_SHORT_ITEM_CAP),
                format!(
                    "{} bullet(s) shorter than {} chars",
                    short_items, profile.min_item_len
                ),
            );
        }
    }
}

fn check_format(
    card: &mut Scorecard,
    artifact: &SummaryArtifact,
    profile: &ContentProfile,
    shape: &DetailShape<'_>,
) {
    if !profile.is_thin && shape.bullets.is_empty() && !artifact.detailed_summary.trim().is_empty() {
        card.deduct(
            IssueKind::Format,
            Severity::Major,
            PENALTY_NO_BULLETS,
            "detailed summary has no bullet markers".to_string(),
        );
    }
}

fn check_punctuation(card: &mut Scorecard, artifact: &SummaryArtifact) {
    let ends_ok = artifact
        .summary
        .trim_end()
        .chars()
        .next_back()
        .is_some_and(|c| TERMINAL_PUNCTUATION.contains(&c));
    if !ends_ok {
        card.deduct(
            IssueKind::Punctuation,
            Severity::Minor,
            PENALTY_PUNCTUATION,
            "summary does not end with sentence-final punctuation".to_string(),
        );
    }
}

fn check_duplication(card: &mut Scorecard, artifact: &SummaryArtifact, shape: &DetailShape<'_>) {
    let summary = artifact.summary.trim();
    let detail = artifact.detailed_summary.trim();
    if summary.is_empty() || detail.is_empty() {
        return;
    }

    if summary == detail {
        card.forced_zero = true;
        card.deduct(
            IssueKind::Duplicate,
            Severity::Critical,
            100,
            "summary and detailed summary are identical".to_string(),
        );
        return;
    }

    let prefix = |s: &str| s.chars().take(DUPLICATE_PREFIX_CHARS).collect::<String>();
    let summary_prefix = prefix(summary);
    let same_as_detail = summary_prefix == prefix(detail);
    // The model often restates the summary as the first bullet.
    let same_as_first_bullet = shape
        .filled()
        .next()
        .is_some_and(|first| prefix(first) == summary_prefix);
    if same_as_detail || same_as_first_bullet {
        card.deduct(
            IssueKind::Duplicate,
            Severity::Major,
            PENALTY_DUPLICATE_PREFIX,
            format!(
                "summary and detailed summary share the same first {} characters",
                DUPLICATE_PREFIX_CHARS
            ),
        );
    }
}

fn check_empty_bullets(card: &mut Scorecard, shape: &DetailShape<'_>) {
    if shape.empty_bullets > 0 {
        card.deduct(
            IssueKind::Format,
            Severity::Critical,
            PENALTY_EMPTY_BULLET,
            format!(
                "{} bullet line(s) contain only a marker",
                shape.empty_bullets
            ),
        );
    }
}

fn check_fallback(card: &mut Scorecard, artifact: &SummaryArtifact) {
    if artifact.fallback.summary {
        card.deduct(
            IssueKind::Format,
            Severity::Major,
            PENALTY_FALLBACK_SUMMARY,
            "summary label missing; summary was synthesized from raw output".to_string(),
        );
    }
    if artifact.fallback.detail {
        card.deduct(
            IssueKind::Format,
            Severity::Critical,
            PENALTY_FALLBACK_DETAIL,
            "detailed summary missing; generation incomplete".to_string(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synopsis_core::schema::{FallbackMarks, LengthBucket};

    fn evaluator() -> QualityEvaluator {
        QualityEvaluator::new(
            QualityConfig::default(),
            Arc::new(LexiconRegistry::with_builtin()),
        )
    }

    fn medium_profile() -> ContentProfile {
        ContentProfile {
            is_thin: false,
            length_bucket: LengthBucket::Medium,
            content_len: 4_000,
            min_summary_len: 20,
            max_summary_len: 200,
            min_detail_len: 50,
            max_detail_len: 1_000,
            min_bullet_items: 3,
            min_item_len: 10,
            speculation_tolerance: SpeculationTolerance::Normal,
        }
    }

    fn good_artifact() -> SummaryArtifact {
        SummaryArtifact {
            summary: "The team shipped version two with streaming support.".to_string(),
            detailed_summary: "- Version two adds streaming responses.\n\
                               - Latency dropped by forty percent in benchmarks.\n\
                               - The old batch endpoint stays available until June."
                .to_string(),
            tags: vec!["Release".to_string()],
            fallback: FallbackMarks::default(),
        }
    }

    #[test]
    fn test_clean_artifact_scores_full() {
        let report = evaluator().evaluate(&good_artifact(), &medium_profile());
        assert_eq!(report.score, 100, "{:?}", report.issues);
        assert!(report.issues.is_empty());
        assert!(report.is_valid);
        assert!(!report.requires_regeneration);
    }

    #[test]
    fn test_missing_terminal_punctuation_is_minor() {
        let mut artifact = good_artifact();
        artifact.summary = "The team shipped version two with streaming support".to_string();
        let report = evaluator().evaluate(&artifact, &medium_profile());
        assert_eq!(report.score, 95);
        let issue = report.issues_of(IssueKind::Punctuation).next().unwrap();
        assert_eq!(issue.severity, Severity::Minor);
    }

    #[test]
    fn test_overage_severity_depends_on_thinness() {
        let mut profile = medium_profile();
        profile.max_summary_len = 30;
        let report = evaluator().evaluate(&good_artifact(), &profile);
        let issue = report.issues_of(IssueKind::Length).next().unwrap();
        assert_eq!(issue.severity, Severity::Minor);

        profile.is_thin = true;
        profile.speculation_tolerance = SpeculationTolerance::None;
        let report = evaluator().evaluate(&good_artifact(), &profile);
        let issue = report.issues_of(IssueKind::Length).next().unwrap();
        assert_eq!(issue.severity, Severity::Major);
    }

    #[test]
    fn test_no_bullets_is_major_format_issue() {
        let mut artifact = good_artifact();
        artifact.detailed_summary =
            "Version two adds streaming. Latency dropped sharply in the new benchmarks.".to_string();
        let report = evaluator().evaluate(&artifact, &medium_profile());
        assert!(
            report
                .issues_of(IssueKind::Format)
                .any(|i| i.severity == Severity::Major)
        );
    }

    #[test]
    fn test_empty_bullet_is_critical() {
        let mut artifact = good_artifact();
        artifact.detailed_summary.push_str("\n-");
        let report = evaluator().evaluate(&artifact, &medium_profile());
        assert!(report.has_critical());
        assert!(report.requires_regeneration);
    }

    #[test]
    fn test_normal_speculation_scales() {
        let mut artifact = good_artifact();
        artifact.summary = "The team probably shipped version two with streaming.".to_string();
        let report = evaluator().evaluate(&artifact, &medium_profile());
        let issue = report.issues_of(IssueKind::Speculative).next().unwrap();
        assert_eq!(issue.severity, Severity::Minor);

        artifact.summary =
            "The team probably shipped; it seems fast and might be stable.".to_string();
        let report = evaluator().evaluate(&artifact, &medium_profile());
        let issue = report.issues_of(IssueKind::Speculative).next().unwrap();
        assert_eq!(issue.severity, Severity::Major);
    }

    #[test]
    fn test_low_tolerance_speculation_is_capped() {
        let mut profile = medium_profile();
        profile.length_bucket = LengthBucket::VeryShort;
        profile.speculation_tolerance = SpeculationTolerance::Low;

        let mut artifact = good_artifact();
        artifact.summary = "The team probably shipped version two with streaming.".to_string();
        let report = evaluator().evaluate(&artifact, &profile);
        let issue = report.issues_of(IssueKind::Speculative).next().unwrap();
        assert_eq!(issue.severity, Severity::Major);
        assert_eq!(report.score, 90);

        artifact.summary =
            "The team probably shipped; perhaps it is likely fast and might be stable.".to_string();
        let report = evaluator().evaluate(&artifact, &profile);
        let issue = report.issues_of(IssueKind::Speculative).next().unwrap();
        assert_eq!(issue.severity, Severity::Major);
        assert_eq!(report.score, 70);
    }

    #[test]
    fn test_item_count_skipped_below_content_floor() {
        let mut artifact = good_artifact();
        artifact.detailed_summary =
            "- Version two adds streaming responses and cuts latency by forty percent.".to_string();
        let mut profile = medium_profile();
        profile.content_len = 2_999;
        let report = evaluator().evaluate(&artifact, &profile);
        assert_eq!(report.issues_of(IssueKind::ItemCount).count(), 0);

        profile.content_len = 3_000;
        let report = evaluator().evaluate(&artifact, &profile);
        let issue = report.issues_of(IssueKind::ItemCount).next().unwrap();
        assert_eq!(issue.severity, Severity::Critical);
    }

    #[test]
    fn test_prefix_duplicate_is_major() {
        let mut artifact = good_artifact();
        artifact.detailed_summary = format!(
            "- {}\n- Latency dropped by forty percent.\n- Batch stays until June.",
            artifact.summary
        );
        let report = evaluator().evaluate(&artifact, &medium_profile());
        let issue = report.issues_of(IssueKind::Duplicate).next().unwrap();
        assert_eq!(issue.severity, Severity::Major);
        assert!(report.score > 0);
    }

    #[test]
    fn test_fallback_detail_is_critical() {
        let mut artifact = good_artifact();
        artifact.fallback.detail = true;
        let report = evaluator().evaluate(&artifact, &medium_profile());
        assert!(report.has_critical());
        assert!(report.requires_regeneration);
    }

    #[test]
    fn test_regeneration_floor_is_independent() {
        let config = QualityConfig {
            validity_floor: 60,
            regeneration_floor: 99,
            ..QualityConfig::default()
        };
        let evaluator = QualityEvaluator::new(config, Arc::new(LexiconRegistry::with_builtin()));
        let mut artifact = good_artifact();
        artifact.summary.pop(); // drop the period: 95 points
        let report = evaluator.evaluate(&artifact, &medium_profile());
        assert_eq!(report.score, 95);
        assert!(report.is_valid);
        assert!(report.requires_regeneration);
        assert!(!report.has_critical());
    }

    #[test]
    fn test_score_never_negative() {
        let artifact = SummaryArtifact {
            summary: "maybe".to_string(),
            detailed_summary: "-\n-\nprobably perhaps possibly likely".to_string(),
            tags: Vec::new(),
            fallback: FallbackMarks {
                summary: true,
                detail: true,
            },
        };
        let mut profile = medium_profile();
        profile.content_len = 20_000;
        profile.min_bullet_items = 7;
        let report = evaluator().evaluate(&artifact, &profile);
        assert_eq!(report.score, 0);
        assert!(!report.is_valid);
    }
}
