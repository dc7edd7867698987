//! Text normalization and language detection

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Normalize extracted text
///
/// Converts CRLF/CR to LF, collapses runs of spaces and tabs to one space,
/// collapses three or more newlines to two, then trims every line and the
/// whole text.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = HORIZONTAL_WS.replace_all(&text, " ");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");

    text.split('\n')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

const LANGUAGE_MARKERS: &[(&str, &[&str])] = &[
    (
        "en",
        &["the", "and", "is", "are", "shall", "must", "tax", "rate", "income"],
    ),
    (
        "pt",
        &["o", "a", "de", "da", "do", "imposto", "taxa", "alíquota", "renda"],
    ),
    (
        "es",
        &["el", "la", "de", "del", "impuesto", "tasa", "renta", "gravamen"],
    ),
    (
        "de",
        &["der", "die", "das", "und", "steuer", "satz", "einkommen", "betrag"],
    ),
    (
        "fr",
        &["le", "la", "de", "du", "impôt", "taux", "revenu", "taxe"],
    ),
    (
        "it",
        &["il", "la", "di", "del", "imposta", "tasso", "reddito", "aliquota"],
    ),
];

/// Guess an ISO 639-1 code from common function and tax words
///
/// Each language scores one point per marker word present in the text.
/// Ties go to the language listed first. Returns `None` when no marker
/// word occurs at all, leaving the fallback to the caller.
pub fn detect_language(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    let words: HashSet<&str> = lower.split_whitespace().collect();

    let mut best: Option<(&'static str, usize)> = None;
    for (lang, markers) in LANGUAGE_MARKERS {
        let score = markers.iter().filter(|m| words.contains(*m)).count();
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((*lang, score));
        }
    }
    best.map(|(lang, _)| lang)
}
