//! Response parsing: turn loosely labelled model output into a [`SummaryArtifact`].
//!
//! Model output is never guaranteed to follow the requested layout. Parsing is
//! an explicit state machine over lines, driven by an ordered table of section
//! header rules. Parsing never fails: missing fields are synthesized and marked
//! in [`FallbackMarks`] so the evaluator can penalize them.
//!
//! A separate [`structural_gate`] rejects candidates that are not usable at all
//! (e.g. an empty response) before any scoring happens.

use regex::Regex;
use std::sync::{Arc, OnceLock};
use synopsis_core::schema::{FallbackMarks, MAX_TAGS, SummaryArtifact, char_len};
use synopsis_core::tags::TagCanon;

/// Summary length bounds enforced by the structural gate.
pub const GATE_SUMMARY_LEN: (usize, usize) = (10, 400);
/// Minimum detailed-summary length enforced by the structural gate.
pub const GATE_MIN_DETAIL_LEN: usize = 50;

/// Longest raw-text prefix used for a synthesized summary.
const FALLBACK_SUMMARY_CHARS: usize = 150;

/// Placeholder used when no detailed summary could be extracted.
pub const INCOMPLETE_DETAIL: &str = "・Generation incomplete: the detailed summary could not be extracted from the model response.\n\
・Regenerate this entry before relying on its contents.";

const MAX_TAG_CHARS: usize = 30;
const TAG_DELIMITERS: &[char] = &[',', '、', '，', ';', '；', '|', '｜'];
const TAG_TRIM: &[char] = &['"', '\'', '`', '「', '」', '『', '』', '[', ']', '(', ')'];
const HASHTAG_PREFIX: &[char] = &['#', '＃'];
const TAG_TRAILING: &[char] = &['.', '。'];
/// Markers rendered without a following space.
const TIGHT_MARKERS: &[&str] = &["・", "･", "•"];

// ---------------------------------------------------------------------------
// Section rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum ParseState {
    #[default]
    None,
    Summary,
    Detail,
    Tags,
}

type SectionHandler = fn(&mut ParseContext, &str);

struct SectionRule {
    pattern: Regex,
    handler: SectionHandler,
}

const DETAIL_LABELS: &[&str] = &[
    "detailed summary",
    "detail summary",
    "key points",
    "highlights",
    "details",
    "detail",
    "詳細な要約",
    "詳しい要約",
    "詳細要約",
    "詳細",
    "要点",
    "ポイント",
    "详细摘要",
];

const SUMMARY_LABELS: &[&str] = &[
    "short summary",
    "brief summary",
    "summary",
    "tl;dr",
    "tldr",
    "短い要約",
    "要約",
    "概要",
    "サマリー",
    "サマリ",
    "摘要",
    "résumé",
    "resumen",
    "zusammenfassung",
];

const TAG_LABELS: &[&str] = &["keywords", "tags", "tag", "キーワード", "タグ", "标签"];

/// Header pattern for a set of label spellings.
///
/// Accepts an optional markdown heading, optional `**`/`__` emphasis, an
/// optional ordinal (`1.`), and either a bracketed label (`【要約】`, colon
/// optional) or a plain label followed by a half- or full-width colon. Text
/// after the label is captured as `rest`. A plain label without a colon must
/// stand alone on its line, so prose that merely starts with "Summary" is not
/// a header.
fn header_pattern(labels: &[&str]) -> String {
    let alt = labels
        .iter()
        .map(|l| regex::escape(l).replace(' ', r"[\s_]*"))
        .collect::<Vec<_>>()
        .join("|");
    let emph = r"(?:[*_]{1,2})?";
    format!(
        concat!(
            r"(?i)^(?:#{{1,6}}\s*)?{emph}\s*(?:\d{{1,2}}[.)．]\s*)?",
            r"(?:[【\[]\s*(?:{alt})\s*[】\]]\s*{emph}\s*[:：]?",
            r"|(?:{alt})\s*{emph}\s*[:：]",
            r"|(?:{alt})\s*{emph}\s*$)",
            r"\s*(?:[*_]{{1,2}}(?:\s|$))?\s*(?P<rest>.*)$",
        ),
        alt = alt,
        emph = emph,
    )
}

/// Header rules in priority order.
fn section_rules() -> &'static [SectionRule] {
    static RULES: OnceLock<Vec<SectionRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let table: [(&[&str], SectionHandler); 3] = [
            (DETAIL_LABELS, enter_detail),
            (SUMMARY_LABELS, enter_summary),
            (TAG_LABELS, enter_tags),
        ];
        table
            .into_iter()
            .map(|(labels, handler)| SectionRule {
                pattern: Regex::new(&header_pattern(labels)).unwrap(),
                handler,
            })
            .collect()
    })
}

fn match_header(line: &str) -> Option<(SectionHandler, &str)> {
    section_rules().iter().find_map(|rule| {
        rule.pattern.captures(line).map(|caps| {
            let rest = caps.name("rest").map_or("", |m| m.as_str().trim());
            (rule.handler, trim_dangling_emphasis(rest))
        })
    })
}

fn enter_summary(ctx: &mut ParseContext, rest: &str) {
    ctx.state = ParseState::Summary;
    if !rest.is_empty() {
        ctx.push_summary(rest);
    }
}

fn enter_detail(ctx: &mut ParseContext, rest: &str) {
    ctx.state = ParseState::Detail;
    if !rest.is_empty() {
        ctx.push_detail(rest);
    }
}

fn enter_tags(ctx: &mut ParseContext, rest: &str) {
    ctx.state = ParseState::Tags;
    if !rest.is_empty() {
        ctx.push_tags(rest);
    }
}

// ---------------------------------------------------------------------------
// Parse context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct DetailLine {
    marker: Option<String>,
    text: String,
}

#[derive(Debug, Default)]
struct ParseContext {
    state: ParseState,
    summary: String,
    detail: Vec<DetailLine>,
    /// Bullets seen outside any labelled section.
    loose_bullets: Vec<DetailLine>,
    tag_tokens: Vec<String>,
}

impl ParseContext {
    fn push_summary(&mut self, line: &str) {
        self.summary = join_wrapped(&self.summary, line);
    }

    fn push_detail(&mut self, line: &str) {
        match split_bullet(line) {
            Some((marker, text)) => self.detail.push(DetailLine {
                marker: Some(marker.to_string()),
                text: text.to_string(),
            }),
            None => match self.detail.last_mut() {
                // Unmarked line: the model wrapped the previous bullet.
                Some(last) => last.text = join_wrapped(&last.text, line),
                None => self.detail.push(DetailLine {
                    marker: None,
                    text: line.to_string(),
                }),
            },
        }
    }

    fn push_tags(&mut self, line: &str) {
        let line = split_bullet(line).map_or(line, |(_, text)| text);
        self.tag_tokens.extend(split_tag_line(line).map(String::from));
    }

    fn push_loose(&mut self, line: &str) {
        if let Some((marker, text)) = split_bullet(line) {
            self.loose_bullets.push(DetailLine {
                marker: Some(marker.to_string()),
                text: text.to_string(),
            });
        } else if let Some(last) = self.loose_bullets.last_mut() {
            last.text = join_wrapped(&last.text, line);
        }
    }

    fn feed(&mut self, line: &str) {
        match self.state {
            ParseState::None => self.push_loose(line),
            ParseState::Summary => {
                // A list after summary text means the model skipped the detail label.
                if !self.summary.is_empty() && split_bullet(line).is_some() {
                    self.state = ParseState::Detail;
                    self.push_detail(line);
                } else {
                    let text = split_bullet(line).map_or(line, |(_, text)| text);
                    self.push_summary(text);
                }
            }
            ParseState::Detail => self.push_detail(line),
            ParseState::Tags => self.push_tags(line),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parses raw model output into a structurally shaped candidate.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    canon: Arc<TagCanon>,
}

impl ResponseParser {
    pub fn new(canon: Arc<TagCanon>) -> Self {
        Self { canon }
    }

    /// Parse `raw` into an artifact. Pure and total: identical input always
    /// yields an identical artifact, and no input makes it fail.
    pub fn parse(&self, raw: &str, title: &str) -> SummaryArtifact {
        let text = strip_think_blocks(raw);
        let mut ctx = ParseContext::default();

        for line in text.lines() {
            let line = line.trim();
            if line.starts_with("```") || is_rule_line(line) {
                continue;
            }
            if line.is_empty() {
                // A blank line closes the tag section so trailing prose is not read as tags.
                if ctx.state == ParseState::Tags && !ctx.tag_tokens.is_empty() {
                    ctx.state = ParseState::None;
                }
                continue;
            }
            // Inside the detail list a numbered item is an item even when its
            // text opens with a label word ("2. Details: ...").
            let in_list = ctx.state == ParseState::Detail && split_bullet(line).is_some();
            if !in_list && let Some((handler, rest)) = match_header(line) {
                handler(&mut ctx, rest);
                continue;
            }
            ctx.feed(line);
        }

        let mut fallback = FallbackMarks::default();

        let mut summary = strip_paired_emphasis(ctx.summary.trim());
        if summary.is_empty() {
            summary = fallback_summary(&text, title);
            fallback.summary = true;
        }

        let detail_lines = if ctx.detail.is_empty() {
            ctx.loose_bullets
        } else {
            ctx.detail
        };
        let mut detailed_summary = render_detail(&detail_lines);
        if detailed_summary.trim().is_empty() {
            detailed_summary = INCOMPLETE_DETAIL.to_string();
            fallback.detail = true;
        }

        let tags = normalize_tags(&ctx.tag_tokens, &self.canon);

        tracing::debug!(
            summary_chars = char_len(&summary),
            detail_lines = detailed_summary.lines().count(),
            tags = tags.len(),
            fallback_summary = fallback.summary,
            fallback_detail = fallback.detail,
            "parsed model response"
        );

        SummaryArtifact {
            summary,
            detailed_summary,
            tags,
            fallback,
        }
    }
}

fn render_detail(lines: &[DetailLine]) -> String {
    lines
        .iter()
        .map(|line| {
            let text = strip_paired_emphasis(line.text.trim());
            match &line.marker {
                Some(marker) if text.is_empty() => marker.clone(),
                Some(marker) if TIGHT_MARKERS.contains(&marker.as_str()) => {
                    format!("{}{}", marker, text)
                }
                Some(marker) => format!("{} {}", marker, text),
                None => text,
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summary synthesized from the cleaned head of the raw text.
///
/// Returns an empty string for an empty response so the structural gate
/// rejects it instead of accepting a title-only summary.
fn fallback_summary(text: &str, title: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("```") || is_rule_line(line) {
            continue;
        }
        let line = match match_header(line) {
            Some((_, rest)) => rest,
            None => line,
        };
        let line = split_bullet(line).map_or(line, |(_, t)| t);
        let line = line.trim_start_matches('#').trim();
        if !line.is_empty() {
            parts.push(line);
        }
    }

    let cleaned = parts
        .iter()
        .fold(String::new(), |acc, part| join_wrapped(&acc, part));
    let cleaned = strip_paired_emphasis(&cleaned);
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return String::new();
    }

    let head: String = cleaned.chars().take(FALLBACK_SUMMARY_CHARS).collect();
    let title = title.trim();
    if title.is_empty() {
        head
    } else {
        format!("{}: {}", title, head)
    }
}

// ---------------------------------------------------------------------------
// Line helpers
// ---------------------------------------------------------------------------

/// Split a list-marked line into `(marker, text)`.
///
/// Recognized markers: `・ ･ • ● ◦ ‣ ▪ ■` (space optional), `- * + – —`
/// (followed by whitespace), and ordinals `1.` `1)` `１．`. A `**` at the start
/// of a line is emphasis, not a marker.
pub fn split_bullet(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    let first = line.chars().next()?;
    let marker_end = first.len_utf8();
    let after = &line[marker_end..];

    match first {
        '・' | '･' | '•' | '●' | '◦' | '‣' | '▪' | '■' => Some((&line[..marker_end], after.trim())),
        '-' | '*' | '+' | '–' | '—' => {
            if after.is_empty() || after.starts_with(char::is_whitespace) {
                Some((&line[..marker_end], after.trim()))
            } else {
                None
            }
        }
        c if is_digit(c) => split_ordinal(line),
        _ => None,
    }
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit() || ('０'..='９').contains(&c)
}

fn split_ordinal(line: &str) -> Option<(&str, &str)> {
    let digits_end = line
        .char_indices()
        .find(|(_, c)| !is_digit(*c))
        .map_or(line.len(), |(i, _)| i);
    if line[..digits_end].chars().count() > 3 {
        return None;
    }
    let punct = line[digits_end..].chars().next()?;
    if !matches!(punct, '.' | ')' | '．' | '）') {
        return None;
    }
    let marker_end = digits_end + punct.len_utf8();
    let after = &line[marker_end..];
    // "1.5 million" is a number, not a list item.
    if after.is_empty() || after.starts_with(char::is_whitespace) || punct != '.' {
        Some((&line[..marker_end], after.trim()))
    } else {
        None
    }
}

/// Horizontal rules such as `---` or `***`.
fn is_rule_line(line: &str) -> bool {
    line.chars().count() >= 3 && line.chars().all(|c| matches!(c, '-' | '*' | '_' | '=' | '─' | '━'))
}

/// Remove balanced `**text**` pairs. A lone `**` is left untouched.
pub fn strip_paired_emphasis(text: &str) -> String {
    static EMPHASIS_RE: OnceLock<Regex> = OnceLock::new();
    let re = EMPHASIS_RE.get_or_init(|| Regex::new(r"\*\*([^*\n]+?)\*\*").unwrap());
    re.replace_all(text, "$1").into_owned()
}

/// Drop a trailing `**` left over from a header like `**Summary: text**`.
fn trim_dangling_emphasis(rest: &str) -> &str {
    if rest.matches("**").count() % 2 == 1
        && let Some(stripped) = rest.strip_suffix("**")
    {
        return stripped.trim_end();
    }
    rest
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x2E80..=0x9FFF | 0xF900..=0xFAFF | 0xFF00..=0xFFEF | 0x3000..=0x303F)
}

/// Join a wrapped line onto existing text, inserting a space only between
/// non-CJK characters.
fn join_wrapped(existing: &str, next: &str) -> String {
    let next = next.trim();
    if existing.is_empty() {
        return next.to_string();
    }
    if next.is_empty() {
        return existing.to_string();
    }
    let last = existing.chars().next_back().unwrap_or(' ');
    let first = next.chars().next().unwrap_or(' ');
    if is_cjk(last) || is_cjk(first) {
        format!("{}{}", existing, next)
    } else {
        format!("{} {}", existing, next)
    }
}

/// Strip `<think>...</think>` blocks that some models emit before the answer.
pub fn strip_think_blocks(text: &str) -> String {
    let mut result = text.to_string();
    while let Some(start) = result.find("<think>") {
        if let Some(end_offset) = result[start..].find("</think>") {
            let end = start + end_offset + "</think>".len();
            result = format!("{}{}", &result[..start], &result[end..]);
        } else {
            // No closing tag: everything after <think> is reasoning.
            result.truncate(start);
            break;
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

fn split_tag_line(line: &str) -> Box<dyn Iterator<Item = &str> + '_> {
    if line.contains(TAG_DELIMITERS) {
        Box::new(line.split(TAG_DELIMITERS))
    } else if line
        .split_whitespace()
        .any(|word| word.starts_with(HASHTAG_PREFIX))
    {
        // "#rust #wasm" style
        Box::new(line.split_whitespace())
    } else {
        Box::new(std::iter::once(line))
    }
}

fn is_punctuation_only(token: &str) -> bool {
    token
        .chars()
        .all(|c| c.is_ascii_punctuation() || (!c.is_alphanumeric() && !c.is_whitespace()))
}

fn keep_tag(token: &str) -> bool {
    let len = char_len(token);
    if !(1..=MAX_TAG_CHARS).contains(&len) {
        return false;
    }
    if len == 1 && token.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    !is_punctuation_only(token)
}

/// Filter, canonicalize, dedup (case-insensitive), and cap raw tag tokens.
pub fn normalize_tags(tokens: &[String], canon: &TagCanon) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for token in tokens {
        let token = strip_paired_emphasis(token);
        let token = token.trim().trim_matches(TAG_TRIM).trim();
        // "C#" and ".NET" are names; only a leading hashtag mark is decoration.
        let token = match canon.lookup(token) {
            Some(_) => token,
            None => token
                .trim_start_matches(HASHTAG_PREFIX)
                .trim_end_matches(TAG_TRAILING)
                .trim(),
        };
        if !keep_tag(token) {
            continue;
        }
        let canonical = canon.canonicalize(token);
        if tags.iter().any(|t| t.to_lowercase() == canonical.to_lowercase()) {
            continue;
        }
        tags.push(canonical);
        if tags.len() == MAX_TAGS {
            break;
        }
    }
    tags
}

// ---------------------------------------------------------------------------
// Structural gate
// ---------------------------------------------------------------------------

/// Why a candidate was rejected outright, before scoring.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateRejection {
    #[error(
        "summary length {len} outside {min}..={max}",
        min = GATE_SUMMARY_LEN.0,
        max = GATE_SUMMARY_LEN.1
    )]
    SummaryLength { len: usize },
    #[error("detailed summary length {len} below {min}", min = GATE_MIN_DETAIL_LEN)]
    DetailTooShort { len: usize },
    #[error("{count} tags exceeds the limit of {max}", max = MAX_TAGS)]
    TooManyTags { count: usize },
    #[error("tag list contains an empty tag")]
    EmptyTag,
}

/// Hard pass/fail shape check, independent of the quality score.
pub fn structural_gate(artifact: &SummaryArtifact) -> Result<(), GateRejection> {
    let summary_len = char_len(artifact.summary.trim());
    if !(GATE_SUMMARY_LEN.0..=GATE_SUMMARY_LEN.1).contains(&summary_len) {
        return Err(GateRejection::SummaryLength { len: summary_len });
    }
    let detail_len = char_len(artifact.detailed_summary.trim());
    if detail_len < GATE_MIN_DETAIL_LEN {
        return Err(GateRejection::DetailTooShort { len: detail_len });
    }
    if artifact.tags.len() > MAX_TAGS {
        return Err(GateRejection::TooManyTags {
            count: artifact.tags.len(),
        });
    }
    if artifact.tags.iter().any(|t| t.trim().is_empty()) {
        return Err(GateRejection::EmptyTag);
    }
    Ok(())
}
