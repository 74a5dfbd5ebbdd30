//! Hedging-phrase lexicons keyed by locale.
//!
//! Speculative phrasing ("probably", "と思われる") signals the model is guessing
//! beyond the source. Each locale registers its own phrase set; the evaluator
//! only sees hit counts and never depends on a particular language.

use regex::Regex;
use std::collections::BTreeMap;

/// A locale-specific set of hedging phrases.
pub trait HedgeLexicon: Send + Sync {
    /// Locale key, e.g. `"en"` or `"ja"`.
    fn locale(&self) -> &str;

    /// The phrases this lexicon detects (for prompt instructions).
    fn phrases(&self) -> &[String];

    /// Every phrase occurrence in `text`, in no particular order.
    fn find(&self, text: &str) -> Vec<String>;

    fn count(&self, text: &str) -> usize {
        self.find(text).len()
    }
}

/// Phrase list lexicon.
///
/// ASCII phrases match case-insensitively on word boundaries so "may" does not
/// fire inside "dismayed". Other phrases (CJK has no word boundaries) match as
/// plain substrings.
pub struct PhraseLexicon {
    locale: String,
    phrases: Vec<String>,
    ascii_re: Option<Regex>,
    substrings: Vec<String>,
}

impl PhraseLexicon {
    pub fn new(locale: &str, phrases: &[&str]) -> Self {
        let (ascii, other): (Vec<&str>, Vec<&str>) = phrases
            .iter()
            .copied()
            .filter(|p| !p.trim().is_empty())
            .partition(|p| p.is_ascii());

        let ascii_re = if ascii.is_empty() {
            None
        } else {
            let alternation = ascii
                .iter()
                .map(|p| regex::escape(&p.to_lowercase()))
                .collect::<Vec<_>>()
                .join("|");
            match Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(locale, error = %e, "hedge lexicon regex rejected");
                    None
                }
            }
        };

        Self {
            locale: locale.to_string(),
            phrases: phrases.iter().map(|p| (*p).to_string()).collect(),
            ascii_re,
            substrings: other.into_iter().map(String::from).collect(),
        }
    }

    /// Built-in English lexicon.
    pub fn english() -> Self {
        Self::new(
            "en",
            &[
                "probably",
                "possibly",
                "perhaps",
                "presumably",
                "apparently",
                "likely",
                "it seems",
                "seems to",
                "appears to",
                "might",
                "may be",
                "could be",
                "it is believed",
                "is thought to",
                "speculated",
                "reportedly",
            ],
        )
    }

    /// Built-in Japanese lexicon. Entries are stems so polite and plain
    /// endings (`かもしれない` / `かもしれません`) count once.
    pub fn japanese() -> Self {
        Self::new(
            "ja",
            &[
                "と思われ",
                "と考えられ",
                "かもしれ",
                "可能性があ",
                "可能性が高",
                "と推測され",
                "と見られ",
                "と予想され",
                "おそらく",
                "恐らく",
                "でしょう",
                "だろう",
                "ようです",
                "のではないか",
                "と思います",
            ],
        )
    }
}

impl HedgeLexicon for PhraseLexicon {
    fn locale(&self) -> &str {
        &self.locale
    }

    fn phrases(&self) -> &[String] {
        &self.phrases
    }

    fn find(&self, text: &str) -> Vec<String> {
        let mut hits: Vec<String> = Vec::new();
        if let Some(re) = &self.ascii_re {
            hits.extend(re.find_iter(text).map(|m| m.as_str().to_lowercase()));
        }
        for phrase in &self.substrings {
            hits.extend(text.matches(phrase.as_str()).map(String::from));
        }
        hits
    }
}

/// Locale-keyed collection of lexicons. Read-only once built.
#[derive(Default)]
pub struct LexiconRegistry {
    lexicons: BTreeMap<String, Box<dyn HedgeLexicon>>,
}

impl LexiconRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `en` and `ja` lexicons.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PhraseLexicon::english()));
        registry.register(Box::new(PhraseLexicon::japanese()));
        registry
    }

    /// Add or replace the lexicon for its locale.
    pub fn register(&mut self, lexicon: Box<dyn HedgeLexicon>) {
        self.lexicons
            .insert(lexicon.locale().to_lowercase(), lexicon);
    }

    pub fn get(&self, locale: &str) -> Option<&dyn HedgeLexicon> {
        self.lexicons.get(&locale.to_lowercase()).map(|l| l.as_ref())
    }

    pub fn locales(&self) -> Vec<&str> {
        self.lexicons.keys().map(String::as_str).collect()
    }

    fn selected<'a>(&'a self, locales: &'a [String]) -> Box<dyn Iterator<Item = &'a dyn HedgeLexicon> + 'a> {
        if locales.is_empty() {
            Box::new(self.lexicons.values().map(|l| l.as_ref()))
        } else {
            Box::new(locales.iter().filter_map(|loc| self.get(loc)))
        }
    }

    /// All hedging hits in `text` across the selected locales.
    /// An empty `locales` slice selects every registered lexicon.
    pub fn find(&self, text: &str, locales: &[String]) -> Vec<String> {
        self.selected(locales).flat_map(|l| l.find(text)).collect()
    }

    /// Phrases across the selected locales, for prompt instructions.
    pub fn phrases(&self, locales: &[String]) -> Vec<String> {
        self.selected(locales)
            .flat_map(|l| l.phrases().iter().cloned())
            .collect()
    }
}
