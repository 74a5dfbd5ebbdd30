//! Request-scoped data model for one summarization run.
//!
//! Everything here is created and discarded inside a single `generate()` call;
//! only the accepted [`SummaryArtifact`] (plus its report) crosses back to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of tags carried by an artifact.
pub const MAX_TAGS: usize = 5;

/// Character length, counted in Unicode scalar values.
///
/// All length thresholds in the pipeline use this unit so CJK and Latin
/// text are measured the same way.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Length bucket of the source content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LengthBucket {
    VeryShort,
    Short,
    Medium,
    Long,
    VeryLong,
}

impl LengthBucket {
    /// Bucket for a content length in chars.
    pub fn for_len(len: usize) -> Self {
        match len {
            0..1_000 => Self::VeryShort,
            1_000..3_000 => Self::Short,
            3_000..5_000 => Self::Medium,
            5_000..10_000 => Self::Long,
            _ => Self::VeryLong,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryShort => "very-short",
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
            Self::VeryLong => "very-long",
        }
    }
}

impl fmt::Display for LengthBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much hedging language a profile tolerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeculationTolerance {
    /// Any hedging phrase is a critical issue.
    None,
    /// Each hedging phrase is a major issue.
    Low,
    /// A few hedging phrases are minor; many are major.
    Normal,
}

/// Acceptance thresholds derived from the source content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentProfile {
    pub is_thin: bool,
    pub length_bucket: LengthBucket,
    /// Source content length in chars (before any prompt truncation).
    pub content_len: usize,
    pub min_summary_len: usize,
    pub max_summary_len: usize,
    pub min_detail_len: usize,
    pub max_detail_len: usize,
    pub min_bullet_items: usize,
    /// Per-bullet length floor in chars.
    pub min_item_len: usize,
    pub speculation_tolerance: SpeculationTolerance,
}

/// One generation request: what the composer turns into a prompt.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub profile: &'a ContentProfile,
    /// Zero-based attempt index within the current `generate()` call.
    pub attempt_index: usize,
}

/// Opaque text returned by the external generation service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub text: String,
    /// Input tokens reported by the service, if any.
    pub input_tokens: Option<u64>,
    /// Output tokens reported by the service, if any.
    pub output_tokens: Option<u64>,
}

impl RawResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            input_tokens: None,
            output_tokens: None,
        }
    }
}

/// Which artifact fields the parser had to synthesize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FallbackMarks {
    pub summary: bool,
    pub detail: bool,
}

impl FallbackMarks {
    pub fn any(self) -> bool {
        self.summary || self.detail
    }
}

/// The structured result of one generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryArtifact {
    pub summary: String,
    pub detailed_summary: String,
    /// At most [`MAX_TAGS`] entries, case-insensitively unique.
    pub tags: Vec<String>,
    #[serde(skip)]
    pub fallback: FallbackMarks,
}

/// Category of a quality issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Length,
    Format,
    Punctuation,
    Speculative,
    Duplicate,
    ItemCount,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueKind::Length => "length",
            IssueKind::Format => "format",
            IssueKind::Punctuation => "punctuation",
            IssueKind::Speculative => "speculative",
            IssueKind::Duplicate => "duplicate",
            IssueKind::ItemCount => "item_count",
        };
        f.write_str(s)
    }
}

/// Issue severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Minor => "minor",
            Severity::Major => "major",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A single rubric violation found by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
}

impl QualityIssue {
    pub fn new(kind: IssueKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
        }
    }
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.severity, self.kind, self.message)
    }
}

/// Evaluation result for one candidate artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Always within `0..=100`.
    pub score: u8,
    pub issues: Vec<QualityIssue>,
    pub is_valid: bool,
    pub requires_regeneration: bool,
}

impl QualityReport {
    pub fn has_critical(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Critical)
    }

    /// Issues of a given kind.
    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &QualityIssue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }

    /// Render the issue list as a markdown section for logs.
    pub fn format_issues(&self) -> String {
        if self.issues.is_empty() {
            return String::new();
        }

        let mut out = format!(
            "## QUALITY\n\nscore {} ({} issue{}):\n",
            self.score,
            self.issues.len(),
            if self.issues.len() == 1 { "" } else { "s" },
        );
        for issue in &self.issues {
            out.push_str(&format!(
                "- {} `{}`: {}\n",
                issue.severity, issue.kind, issue.message
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_bucket_boundaries() {
        assert_eq!(LengthBucket::for_len(0), LengthBucket::VeryShort);
        assert_eq!(LengthBucket::for_len(999), LengthBucket::VeryShort);
        assert_eq!(LengthBucket::for_len(1_000), LengthBucket::Short);
        assert_eq!(LengthBucket::for_len(4_999), LengthBucket::Medium);
        assert_eq!(LengthBucket::for_len(5_000), LengthBucket::Long);
        assert_eq!(LengthBucket::for_len(10_000), LengthBucket::VeryLong);
    }

    #[test]
    fn test_char_len_counts_scalars() {
        assert_eq!(char_len("要約です。"), 5);
        assert_eq!(char_len("abc"), 3);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Major);
        assert!(Severity::Major > Severity::Minor);
    }

    #[test]
    fn test_format_issues() {
        let report = QualityReport {
            score: 55,
            issues: vec![QualityIssue::new(
                IssueKind::Punctuation,
                Severity::Minor,
                "summary does not end with terminal punctuation",
            )],
            is_valid: false,
            requires_regeneration: true,
        };
        let out = report.format_issues();
        assert!(out.contains("## QUALITY"));
        assert!(out.contains("score 55 (1 issue)"));
        assert!(out.contains("minor `punctuation`"));
    }

    #[test]
    fn test_fallback_marks_not_serialized() {
        let artifact = SummaryArtifact {
            summary: "s".to_string(),
            detailed_summary: "d".to_string(),
            tags: vec!["Rust".to_string()],
            fallback: FallbackMarks {
                summary: true,
                detail: false,
            },
        };
        let json = serde_json::to_string(&artifact).unwrap();
        assert!(!json.contains("fallback"));
        let back: SummaryArtifact = serde_json::from_str(&json).unwrap();
        assert!(!back.fallback.any());
    }
}
