use std::sync::Arc;
use synopsis_core::config::{ProfileConfig, QualityConfig};
use synopsis_core::profile::ContentProfiler;
use synopsis_core::schema::{
    ContentProfile, IssueKind, LengthBucket, Severity, SummaryArtifact, char_len,
};
use synopsis_encoder::lexicon::LexiconRegistry;
use synopsis_encoder::quality::QualityEvaluator;

fn evaluator() -> QualityEvaluator {
    QualityEvaluator::new(
        QualityConfig::default(),
        Arc::new(LexiconRegistry::with_builtin()),
    )
}

fn profile_for(content: &str) -> ContentProfile {
    ContentProfiler::new(ProfileConfig::default()).profile(content, None)
}

fn artifact(summary: &str, detail: &str) -> SummaryArtifact {
    SummaryArtifact {
        summary: summary.to_string(),
        detailed_summary: detail.to_string(),
        tags: vec!["Roadmap".to_string()],
        ..Default::default()
    }
}

const THIN_SUMMARY: &str = "The team published slides outlining its third-quarter plans.";
const THIN_DETAIL: &str = "・The slides list search, billing, and export as the three Q3 roadmap items.";

#[test]
fn test_identical_summary_and_detail_scores_zero() {
    let text = "・The release adds streaming responses and trims the binary by a third.";
    let contents = ["short deck".to_string(), "x".repeat(4_000), "y".repeat(20_000)];
    for content in &contents {
        let report = evaluator().evaluate(&artifact(text, text), &profile_for(content));
        assert_eq!(report.score, 0);
        assert!(!report.is_valid);
        assert!(report.requires_regeneration);
        assert!(
            report
                .issues_of(IssueKind::Duplicate)
                .any(|i| i.severity == Severity::Critical)
        );
    }
}

#[test]
fn test_thin_profile_rejects_hedging() {
    let profile = profile_for("Slides: our Q3 roadmap.");
    assert!(profile.is_thin);

    for detail in [
        "・The roadmap will probably slip into the fourth quarter of the year.",
        "・第3四半期のロードマップは延期されると思われる。詳細は資料に記載されている。",
    ] {
        let report = evaluator().evaluate(&artifact(THIN_SUMMARY, detail), &profile);
        let issue = report
            .issues_of(IssueKind::Speculative)
            .next()
            .expect("speculative issue");
        assert_eq!(issue.severity, Severity::Critical);
        assert!(report.requires_regeneration);
    }
}

#[test]
fn test_very_long_content_with_three_bullets_is_critical() {
    let profile = profile_for(&"word ".repeat(2_500));
    assert_eq!(profile.length_bucket, LengthBucket::VeryLong);
    assert!(!profile.is_thin);

    let summary = "The report reviews a year of infrastructure work across storage, \
                   networking, and deployment, with measured gains in each area.";
    let detail = "- Storage moved to a tiered layout that cut cold-read costs by half across regions.\n\
                  - Networking adopted a new load balancer that removed two full proxy hops per request.\n\
                  - Deployment switched to canary rollouts and reduced failed releases to nearly zero.";
    let report = evaluator().evaluate(&artifact(summary, detail), &profile);

    let issue = report
        .issues_of(IssueKind::ItemCount)
        .next()
        .expect("item count issue");
    assert_eq!(issue.severity, Severity::Critical);
    assert!(report.requires_regeneration);
}

#[test]
fn test_sixty_char_thin_summary_is_accepted() {
    assert_eq!(char_len(THIN_SUMMARY), 60);
    let profile = profile_for("Slides: our Q3 roadmap.");

    let report = evaluator().evaluate(&artifact(THIN_SUMMARY, THIN_DETAIL), &profile);
    assert!(report.is_valid, "{}", report.format_issues());
    assert!(report.score >= 60);
    assert!(!report.has_critical());
}

#[test]
fn test_thin_summary_below_minimum_is_invalid() {
    let profile = profile_for("Slides: our Q3 roadmap.");
    let report = evaluator().evaluate(&artifact("Q3 roadmap slides.", THIN_DETAIL), &profile);
    assert!(!report.is_valid);
    assert!(report.issues_of(IssueKind::Length).next().is_some());
}

#[test]
fn test_score_stays_in_range() {
    let summaries = [
        "",
        "x",
        THIN_SUMMARY,
        "It seems this might possibly be probably likely perhaps the case",
    ];
    let details = [
        "",
        "-\n-\n-",
        THIN_DETAIL,
        "no bullets here, perhaps the release might slip, it seems likely",
    ];
    let contents = [String::new(), "short".to_string(), "z".repeat(12_000)];

    for summary in summaries {
        for detail in details {
            for content in &contents {
                let profile = profile_for(content);
                let report = evaluator().evaluate(&artifact(summary, detail), &profile);
                assert!(report.score <= 100);
                if report.is_valid {
                    assert!(report.score >= QualityConfig::default().validity_floor);
                }
                if report.has_critical() {
                    assert!(report.requires_regeneration);
                }
            }
        }
    }
}
