//! Regeneration controller: attempt, evaluate, then accept, retry or give up.
//!
//! One `generate` call runs profile → compose → client → parse → gate →
//! evaluate per attempt, strictly sequentially. A transient client failure, a
//! timeout, an expired deadline, or a structural-gate rejection consumes the
//! attempt without producing a score. Only configuration errors and exhaustion
//! reach the caller.

use crate::provider::{GenerationClient, GenerationParams, ProviderError};
use crate::usage::{UsageTotals, UsageTracker};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use synopsis_core::config::{GenerationConfig, SynopsisConfig};
use synopsis_core::profile::ContentProfiler;
use synopsis_core::schema::{
    GenerationRequest, IssueKind, QualityIssue, QualityReport, Severity, SummaryArtifact,
};
use synopsis_core::tags::TagCanon;
use synopsis_encoder::lexicon::LexiconRegistry;
use synopsis_encoder::parser::{GateRejection, ResponseParser, split_bullet, structural_gate};
use synopsis_encoder::prompt::PromptComposer;
use synopsis_encoder::quality::QualityEvaluator;
use tokio::time::Instant;

/// Per-call overrides of the configured generation settings.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Total attempts, including the first.
    pub max_retries: usize,
    pub min_quality_score: u8,
    pub content_max_length: usize,
    /// Source category, e.g. `"slideshare"`; sparse sources profile as thin.
    pub source_hint: Option<String>,
    /// Abort in-flight and remaining attempts once this instant passes.
    pub deadline: Option<Instant>,
}

impl GenerateOptions {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_retries: config.max_attempts,
            min_quality_score: config.min_quality_score,
            content_max_length: config.content_max_length,
            source_hint: None,
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_source_hint(mut self, hint: impl Into<String>) -> Self {
        self.source_hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

/// Why the returned artifact was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Acceptance {
    /// Cleared the score floor with no critical issue.
    Passed,
    /// Bullet-formatted and free of critical issues while format-migration
    /// acceptance is enabled.
    FormatMigration,
    /// Attempts ran out; the best-scoring candidate was returned.
    BestEffort,
}

/// What happened on one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptStatus {
    Scored { score: u8, critical: bool },
    Rejected(GateRejection),
    Failed(ProviderError),
}

#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub index: usize,
    pub status: AttemptStatus,
    pub elapsed: Duration,
}

/// Result of a successful `generate()` call.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub artifact: SummaryArtifact,
    /// Always inspect `report.issues`: acceptance means "cleared the floor",
    /// not "flawless".
    pub report: QualityReport,
    pub attempts: Vec<AttemptRecord>,
    pub usage: UsageTotals,
    pub accepted_by: Acceptance,
}

/// Errors that reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("no acceptable summary after {attempts} attempt(s): {last_failure}")]
    QualityExhausted {
        attempts: usize,
        /// Best score seen, if any candidate passed the structural gate.
        best_score: Option<u8>,
        last_failure: String,
    },
}

/// Quality-gated summarizer over a generation client.
///
/// Holds only read-only state, so one instance can serve many concurrent
/// `generate` calls.
pub struct Summarizer<C> {
    client: C,
    config: SynopsisConfig,
    profiler: ContentProfiler,
    parser: ResponseParser,
    evaluator: QualityEvaluator,
    lexicons: Arc<LexiconRegistry>,
}

impl<C: GenerationClient> Summarizer<C> {
    /// Summarizer with the built-in lexicons and the configured tag aliases.
    pub fn new(client: C, config: SynopsisConfig) -> Self {
        let canon = Arc::new(TagCanon::from_config(&config.tags));
        let lexicons = Arc::new(LexiconRegistry::with_builtin());
        Self::with_parts(client, config, canon, lexicons)
    }

    pub fn with_parts(
        client: C,
        config: SynopsisConfig,
        canon: Arc<TagCanon>,
        lexicons: Arc<LexiconRegistry>,
    ) -> Self {
        Self {
            profiler: ContentProfiler::new(config.profile.clone()),
            parser: ResponseParser::new(canon),
            evaluator: QualityEvaluator::new(config.quality.clone(), Arc::clone(&lexicons)),
            lexicons,
            client,
            config,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &SynopsisConfig {
        &self.config
    }

    /// Default options derived from the loaded configuration.
    pub fn options(&self) -> GenerateOptions {
        GenerateOptions::from_config(&self.config.generation)
    }

    /// Summarize `content`, retrying until a candidate is accepted or
    /// attempts run out.
    pub async fn generate(
        &self,
        title: &str,
        content: &str,
        options: &GenerateOptions,
    ) -> Result<GenerationOutcome, GenerateError> {
        if options.max_retries == 0 {
            return Err(GenerateError::Config(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if options.content_max_length == 0 {
            return Err(GenerateError::Config(
                "content_max_length must be greater than 0".to_string(),
            ));
        }

        let generation = &self.config.generation;
        let profile = self
            .profiler
            .profile(content, options.source_hint.as_deref());
        let composer = PromptComposer::new(&self.lexicons, &self.config.quality.locales);

        tracing::debug!(
            bucket = %profile.length_bucket,
            thin = profile.is_thin,
            content_len = profile.content_len,
            model = self.client.model_name(),
            "profiled content"
        );

        let mut usage = UsageTracker::new();
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut best: Option<(SummaryArtifact, QualityReport)> = None;
        let mut feedback: Vec<QualityIssue> = Vec::new();
        let mut last_failure = String::new();

        for attempt_index in 0..options.max_retries {
            let started = Instant::now();
            let request = GenerationRequest {
                title,
                content,
                profile: &profile,
                attempt_index,
            };
            let prompt = composer.compose(&request, options.content_max_length, &feedback);
            tracing::debug!(
                attempt = attempt_index + 1,
                prompt_chars = prompt.user.chars().count(),
                truncated = prompt.bounds.truncated,
                "composed prompt"
            );

            let mut rate_limited = false;
            // An attempt that starts past the deadline never reaches the client.
            let expired = options.deadline.is_some_and(|d| Instant::now() >= d);
            let status = match self
                .call_client(prompt.system, &prompt.user, options.deadline)
                .await
            {
                Ok(raw) => {
                    usage.record(&raw);
                    let artifact = self.parser.parse(&raw.text, title);
                    match structural_gate(&artifact) {
                        Err(rejection) => {
                            tracing::warn!(
                                attempt = attempt_index + 1,
                                reason = %rejection,
                                "candidate rejected by structural gate"
                            );
                            last_failure = rejection.to_string();
                            feedback = vec![gate_feedback(&rejection)];
                            AttemptStatus::Rejected(rejection)
                        }
                        Ok(()) => {
                            let report = self.evaluator.evaluate(&artifact, &profile);
                            let critical = report.has_critical();

                            let accepted_by = if report.score >= options.min_quality_score
                                && !critical
                            {
                                Some(Acceptance::Passed)
                            } else if generation.accept_format_migration
                                && !critical
                                && has_bullets(&artifact.detailed_summary)
                            {
                                Some(Acceptance::FormatMigration)
                            } else {
                                None
                            };

                            if let Some(accepted_by) = accepted_by {
                                attempts.push(AttemptRecord {
                                    index: attempt_index,
                                    status: AttemptStatus::Scored {
                                        score: report.score,
                                        critical,
                                    },
                                    elapsed: started.elapsed(),
                                });
                                tracing::info!(
                                    attempt = attempt_index + 1,
                                    score = report.score,
                                    issues = report.issues.len(),
                                    accepted_by = ?accepted_by,
                                    model = self.client.model_name(),
                                    "summary accepted"
                                );
                                return Ok(GenerationOutcome {
                                    artifact,
                                    report,
                                    attempts,
                                    usage: usage.totals(),
                                    accepted_by,
                                });
                            }

                            tracing::warn!(
                                attempt = attempt_index + 1,
                                score = report.score,
                                critical,
                                "candidate below acceptance floor\n{}",
                                report.format_issues()
                            );
                            last_failure = format!(
                                "score {} below {}{}",
                                report.score,
                                options.min_quality_score,
                                if critical { " with critical issues" } else { "" }
                            );
                            feedback = report.issues.clone();
                            let score = report.score;
                            if best.as_ref().is_none_or(|(_, b)| score > b.score) {
                                best = Some((artifact, report));
                            }
                            AttemptStatus::Scored { score, critical }
                        }
                    }
                }
                Err(e) if !e.is_retryable() => {
                    usage.record_failure();
                    tracing::warn!(attempt = attempt_index + 1, error = %e, "non-retryable generation error");
                    return Err(GenerateError::Config(e.to_string()));
                }
                Err(e) => {
                    if !expired {
                        usage.record_failure();
                    }
                    tracing::warn!(
                        attempt = attempt_index + 1,
                        error = %e,
                        "generation call failed"
                    );
                    rate_limited = e.is_rate_limited();
                    last_failure = e.to_string();
                    AttemptStatus::Failed(e)
                }
            };

            attempts.push(AttemptRecord {
                index: attempt_index,
                status,
                elapsed: started.elapsed(),
            });

            if attempt_index + 1 < options.max_retries {
                self.pause(attempt_index, rate_limited, options.deadline)
                    .await;
            }
        }

        match best {
            Some((artifact, report)) if generation.best_effort_on_exhaustion => {
                tracing::info!(
                    attempts = attempts.len(),
                    score = report.score,
                    "attempts exhausted; returning best candidate"
                );
                Ok(GenerationOutcome {
                    artifact,
                    report,
                    attempts,
                    usage: usage.totals(),
                    accepted_by: Acceptance::BestEffort,
                })
            }
            best => {
                tracing::warn!(
                    attempts = attempts.len(),
                    last_failure = %last_failure,
                    "attempts exhausted without an acceptable summary"
                );
                Err(GenerateError::QualityExhausted {
                    attempts: attempts.len(),
                    best_score: best.map(|(_, report)| report.score),
                    last_failure,
                })
            }
        }
    }

    /// One client call, bounded by the configured timeout and the deadline.
    async fn call_client(
        &self,
        system: &str,
        prompt: &str,
        deadline: Option<Instant>,
    ) -> Result<synopsis_core::schema::RawResponse, ProviderError> {
        let mut budget = Duration::from_secs(self.config.generation.timeout_secs);
        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ProviderError::Cancelled);
            }
            budget = budget.min(remaining);
        }

        let params = GenerationParams {
            system,
            prompt,
            max_output_tokens: self.config.generation.max_output_tokens,
            temperature: self.config.generation.temperature,
            timeout: budget,
        };

        match tokio::time::timeout(budget, self.client.generate(&params)).await {
            Ok(result) => result,
            Err(_) if deadline.is_some_and(|d| Instant::now() >= d) => {
                Err(ProviderError::Cancelled)
            }
            Err(_) => Err(ProviderError::Timeout),
        }
    }

    /// Inter-attempt delay, lengthened after a rate-limit failure and never
    /// past the deadline.
    async fn pause(&self, attempt_index: usize, rate_limited: bool, deadline: Option<Instant>) {
        let mut delay = Duration::from_millis(
            self.config
                .generation
                .retry_delay_ms(attempt_index, rate_limited),
        );
        if let Some(deadline) = deadline {
            delay = delay.min(deadline.saturating_duration_since(Instant::now()));
        }
        if !delay.is_zero() {
            tracing::debug!(delay_ms = delay.as_millis(), rate_limited, "waiting before next attempt");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Summarize with default configuration.
pub async fn generate<C: GenerationClient>(
    client: C,
    title: &str,
    content: &str,
    options: &GenerateOptions,
) -> Result<GenerationOutcome, GenerateError> {
    Summarizer::new(client, SynopsisConfig::default())
        .generate(title, content, options)
        .await
}

fn has_bullets(detail: &str) -> bool {
    detail.lines().any(|line| split_bullet(line).is_some())
}

/// Prompt feedback for a gate rejection, so the next attempt knows what broke.
fn gate_feedback(rejection: &GateRejection) -> QualityIssue {
    let kind = match rejection {
        GateRejection::SummaryLength { .. } | GateRejection::DetailTooShort { .. } => {
            IssueKind::Length
        }
        GateRejection::TooManyTags { .. } | GateRejection::EmptyTag => IssueKind::Format,
    };
    QualityIssue::new(kind, Severity::Critical, rejection.to_string())
}
