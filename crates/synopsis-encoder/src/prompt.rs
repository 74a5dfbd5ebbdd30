//! Prompt composition: turn a generation request into model instructions.
//!
//! The numeric bounds written into the prompt are read from the same
//! [`ContentProfile`] the evaluator scores against, so the two stay in lockstep.

use crate::lexicon::LexiconRegistry;
use serde::Serialize;
use synopsis_core::schema::{
    ContentProfile, GenerationRequest, QualityIssue, SpeculationTolerance, char_len,
};

/// Output-layout instructions shared by every request.
pub const SUMMARY_SYSTEM: &str = include_str!("prompts/system.md");

/// Appended to content that was cut at the safety cap.
pub const TRUNCATION_MARKER: &str = "\n\n[... content truncated ...]";

/// Maximum number of hedging phrases spelled out in a thin-content prompt.
const MAX_BANNED_PHRASES: usize = 20;

/// Bounds embedded into the prompt, echoed for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptBounds {
    pub summary_len: (usize, usize),
    pub detail_len: (usize, usize),
    pub min_bullet_items: usize,
    pub min_item_len: usize,
    pub is_thin: bool,
    pub truncated: bool,
    pub content_chars: usize,
}

/// A composed prompt ready for the generation client.
#[derive(Debug, Clone)]
pub struct ComposedPrompt {
    pub system: &'static str,
    pub user: String,
    pub bounds: PromptBounds,
}

/// Builds prompts from title, content, and profile.
pub struct PromptComposer<'a> {
    lexicons: &'a LexiconRegistry,
    locales: &'a [String],
}

impl<'a> PromptComposer<'a> {
    pub fn new(lexicons: &'a LexiconRegistry, locales: &'a [String]) -> Self {
        Self { lexicons, locales }
    }

    /// Compose the prompt for one attempt.
    ///
    /// `feedback` carries the previous attempt's issues; it is ignored on the
    /// first attempt.
    pub fn compose(
        &self,
        request: &GenerationRequest<'_>,
        max_content_len: usize,
        feedback: &[QualityIssue],
    ) -> ComposedPrompt {
        let (content, truncated) = truncate_content(request.content, max_content_len);
        let profile = request.profile;

        let mut user = String::new();
        user.push_str("Summarize the article below.\n\n");
        user.push_str(&self.requirements(profile));

        if request.attempt_index > 0 && !feedback.is_empty() {
            user.push_str("\nThe previous attempt was rejected for these reasons; fix them:\n");
            for issue in feedback {
                user.push_str(&format!("- {}\n", issue.message));
            }
        }

        user.push_str("\n### Title\n");
        user.push_str(request.title.trim());
        user.push_str("\n\n### Article\n");
        user.push_str(&content);
        user.push('\n');

        ComposedPrompt {
            system: SUMMARY_SYSTEM,
            user,
            bounds: PromptBounds {
                summary_len: (profile.min_summary_len, profile.max_summary_len),
                detail_len: (profile.min_detail_len, profile.max_detail_len),
                min_bullet_items: profile.min_bullet_items,
                min_item_len: profile.min_item_len,
                is_thin: profile.is_thin,
                truncated,
                content_chars: char_len(&content),
            },
        }
    }

    fn requirements(&self, profile: &ContentProfile) -> String {
        let mut out = String::from("### Requirements\n");
        out.push_str(&format!(
            "- Summary: {} to {} characters.\n",
            profile.min_summary_len, profile.max_summary_len
        ));
        out.push_str(&format!(
            "- Detailed summary: {} to {} characters in total, at least {} bullet{}.\n",
            profile.min_detail_len,
            profile.max_detail_len,
            profile.min_bullet_items,
            if profile.min_bullet_items == 1 { "" } else { "s" },
        ));
        if profile.min_item_len > 0 {
            out.push_str(&format!(
                "- Each bullet: at least {} characters.\n",
                profile.min_item_len
            ));
        }

        match profile.speculation_tolerance {
            SpeculationTolerance::None => {
                out.push_str(
                    "- The source is very short. Restate only what it says; \
                     do not infer, predict, or speculate.\n",
                );
                let phrases = self.lexicons.phrases(self.locales);
                if !phrases.is_empty() {
                    let listed: Vec<String> = phrases
                        .iter()
                        .take(MAX_BANNED_PHRASES)
                        .map(|p| format!("\"{}\"", p))
                        .collect();
                    out.push_str(&format!(
                        "- Never use hedging expressions such as {}.\n",
                        listed.join(", ")
                    ));
                }
            }
            SpeculationTolerance::Low | SpeculationTolerance::Normal => {
                out.push_str(
                    "- Avoid hedging expressions (\"probably\", \"it seems\", \"と思われる\"); \
                     state facts from the article.\n",
                );
            }
        }
        out
    }
}

/// Cut `content` to at most `max_chars` chars, appending [`TRUNCATION_MARKER`].
pub fn truncate_content(content: &str, max_chars: usize) -> (String, bool) {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            let mut out = content[..byte_idx].to_string();
            out.push_str(TRUNCATION_MARKER);
            (out, true)
        }
        None => (content.to_string(), false),
    }
}
