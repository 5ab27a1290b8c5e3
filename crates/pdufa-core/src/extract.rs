//! Heuristic field extraction from event text.
//!
//! Every field has an ordered list of rules. A rule reads the summary first
//! and the body second, and either returns a [`Finding`] or passes; the first
//! finding wins. Later fields may look at what earlier fields found (company
//! anchors on the ticker match, drug strips the company), never the reverse.
//!
//! Nothing here fails. A field without a finding gets its default and the
//! record's notes say so, so a reviewer can tell inferred values from
//! defaulted ones.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset};
use regex::Regex;

use crate::event::NormalizedEvent;
use crate::key::IdentityKey;
use crate::record::{ExtractedRecord, NOTE_SEPARATOR, UNKNOWN, source_label};

const EXCHANGES: &str = r"NASDAQ|Nasdaq|NYSE\s+American|NYSE|AMEX|OTCQB|OTCQX|OTC|TSXV|TSX|LSE";

static TICKER_IN_PARENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\(\s*(?:(?:{EXCHANGES})\s*:\s*)?([A-Z]{{1,5}})\s*\)"
    ))
    .expect("valid parenthesised ticker regex")
});
static TICKER_AFTER_EXCHANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(?:{EXCHANGES})\s*:\s*([A-Z]{{1,5}})\b"))
        .expect("valid exchange ticker regex")
});
static LEADING_TICKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Z]{3,5})\b").expect("valid leading ticker regex"));

// Capitalised phrase, optionally followed by a parenthetical (generic name).
static DRUG_BEFORE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b([A-Z][A-Za-z0-9-]*(?:\s+[A-Z0-9][A-Za-z0-9-]*)*)\s+(?:\([^)]*\)\s+)?(?:for|drug|therapy|treatment)\b",
    )
    .expect("valid drug regex")
});
static DRUG_AFTER_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:drug|therapy|treatment)\s+([A-Z][A-Za-z0-9-]*(?:\s+[A-Z0-9][A-Za-z0-9-]*)*)")
        .expect("valid drug regex")
});
static DRUG_AFTER_FOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfor\s+([A-Z][A-Za-z0-9-]*(?:\s+[A-Z0-9][A-Za-z0-9-]*)*)")
        .expect("valid drug regex")
});
static INDICATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:for\s+(?:the\s+)?treatment\s+of|indicated\s+for(?:\s+the\s+treatment\s+of)?|in\s+patients\s+with)\s+([^,;.()\[\]|—–]+)",
    )
    .expect("valid indication regex")
});

/// Regulatory shorthand that is never a ticker, company or drug.
const BOILERPLATE: &[&str] = &[
    "FDA", "PDUFA", "ADCOM", "NDA", "SNDA", "BLA", "SBLA", "MAA", "CRL", "EMA", "US", "USA",
    "DATE", "TARGET", "ACTION", "DECISION",
];

const COMPANY_DELIMITERS: &[&str] = &[" — ", " – ", " - ", ":", " PDUFA"];

// Lowercase ASCII; cut points for an indication that runs into other clauses.
const INDICATION_STOPS: &[&str] = &[" pdufa", " priority review", " accelerated approval", " - "];

const PRIORITY_KEYWORDS: &[&str] = &["priority review", "pdufa priority"];
const ACCELERATED_KEYWORDS: &[&str] = &["accelerated approval"];
const DECISION_KEYWORDS: &[&str] = &[
    "pdufa",
    "action date",
    "fda decision",
    "approval decision",
    "standard review",
];

/// A record ready for the merger, with the key it merges under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub key: IdentityKey,
    /// Summary key of a record that has a drug. A row first seen without
    /// the drug is still found through it.
    pub fallback: Option<IdentityKey>,
    pub record: ExtractedRecord,
}

/// Run every rule over `event` and build the record.
///
/// `announced_at` is the timestamp of the current extraction run.
pub fn extract(event: &NormalizedEvent, announced_at: DateTime<FixedOffset>) -> Candidate {
    let mut draft = Draft::default();
    for (field, rules) in PIPELINE {
        if let Some(finding) = rules.iter().find_map(|rule| rule(event, &draft)) {
            draft.findings.push((*field, finding));
        }
    }

    let drug = draft.text(Field::Drug);
    let key = IdentityKey::derive(event.decision_date, &drug, &event.summary_text);
    let summary_key = IdentityKey::from_summary(event.decision_date, &event.summary_text);
    let fallback = (summary_key != key).then_some(summary_key);
    let decision_type = draft
        .value(Field::DecisionType)
        .and_then(|v| v.parse().ok())
        .unwrap_or_default();
    let source = source_label(&event.source_feed);

    let record = ExtractedRecord {
        date_pdufa: event.decision_date,
        company: draft.text(Field::Company),
        ticker: draft.text(Field::Ticker),
        drug,
        indication: draft.text(Field::Indication),
        priority_review: draft.get(Field::PriorityReview).is_some(),
        decision_type,
        source,
        announced_at,
        notes: annotate(&draft, &key, fallback.as_ref()),
    };
    Candidate {
        key,
        fallback,
        record,
    }
}

// ── Pipeline ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Ticker,
    Company,
    Drug,
    Indication,
    PriorityReview,
    DecisionType,
}

impl Field {
    fn column(self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Company => "company",
            Self::Drug => "drug",
            Self::Indication => "indication",
            Self::PriorityReview => "priority_review",
            Self::DecisionType => "decision_type",
        }
    }

    fn default_value(self) -> &'static str {
        match self {
            Self::PriorityReview => "false",
            _ => UNKNOWN,
        }
    }
}

type Rule = fn(&NormalizedEvent, &Draft) -> Option<Finding>;

const TICKER_RULES: &[Rule] = &[ticker_in_parentheses, ticker_after_exchange, leading_ticker];
const COMPANY_RULES: &[Rule] = &[company_before_ticker, company_before_delimiter];
const DRUG_RULES: &[Rule] = &[drug_before_keyword, drug_after_keyword, drug_after_for];
const INDICATION_RULES: &[Rule] = &[indication_after_phrase];
const PRIORITY_RULES: &[Rule] = &[priority_keyword];
const DECISION_RULES: &[Rule] = &[decision_from_priority, accelerated_keyword, decision_keyword];

const PIPELINE: &[(Field, &[Rule])] = &[
    (Field::Ticker, TICKER_RULES),
    (Field::Company, COMPANY_RULES),
    (Field::Drug, DRUG_RULES),
    (Field::Indication, INDICATION_RULES),
    (Field::PriorityReview, PRIORITY_RULES),
    (Field::DecisionType, DECISION_RULES),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Summary,
    Body,
}

fn texts(event: &NormalizedEvent) -> [(Source, &str); 2] {
    [
        (Source::Summary, event.summary_text.as_str()),
        (Source::Body, event.body_text.as_str()),
    ]
}

fn text_of(event: &NormalizedEvent, source: Source) -> &str {
    match source {
        Source::Summary => &event.summary_text,
        Source::Body => &event.body_text,
    }
}

#[derive(Debug, Clone)]
struct Finding {
    value: String,
    how: &'static str,
    /// Where the match started, for rules that read the text around it.
    anchor: Option<(Source, usize)>,
}

impl Finding {
    fn new(value: impl Into<String>, how: &'static str) -> Self {
        Self {
            value: value.into(),
            how,
            anchor: None,
        }
    }

    fn anchored(mut self, source: Source, at: usize) -> Self {
        self.anchor = Some((source, at));
        self
    }
}

#[derive(Debug, Default)]
struct Draft {
    findings: Vec<(Field, Finding)>,
}

impl Draft {
    fn get(&self, field: Field) -> Option<&Finding> {
        self.findings
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, finding)| finding)
    }

    fn value(&self, field: Field) -> Option<&str> {
        self.get(field).map(|f| f.value.as_str())
    }

    fn text(&self, field: Field) -> String {
        self.value(field).unwrap_or(UNKNOWN).to_string()
    }
}

fn annotate(draft: &Draft, key: &IdentityKey, fallback: Option<&IdentityKey>) -> String {
    let mut segments: Vec<String> = PIPELINE
        .iter()
        .map(|(field, _)| match draft.get(*field) {
            Some(finding) => format!("{} inferred {}", field.column(), finding.how),
            None => format!("{} defaulted to {}", field.column(), field.default_value()),
        })
        .collect();
    segments.extend(std::iter::once(key).chain(fallback).map(IdentityKey::note_segment));
    segments.join(NOTE_SEPARATOR)
}

// ── Ticker ──

fn ticker_in_parentheses(event: &NormalizedEvent, _: &Draft) -> Option<Finding> {
    first_ticker(event, &TICKER_IN_PARENS, "from parenthetical")
}

fn ticker_after_exchange(event: &NormalizedEvent, _: &Draft) -> Option<Finding> {
    first_ticker(event, &TICKER_AFTER_EXCHANGE, "from exchange marker")
}

fn leading_ticker(event: &NormalizedEvent, _: &Draft) -> Option<Finding> {
    let symbol = LEADING_TICKER.captures(&event.summary_text)?.get(1)?;
    (!is_boilerplate(symbol.as_str())).then(|| {
        Finding::new(symbol.as_str(), "from leading symbol").anchored(Source::Summary, symbol.start())
    })
}

fn first_ticker(event: &NormalizedEvent, re: &Regex, how: &'static str) -> Option<Finding> {
    texts(event).into_iter().find_map(|(source, text)| {
        re.captures_iter(text).find_map(|caps| {
            let whole = caps.get(0)?;
            let symbol = caps.get(1)?.as_str();
            (!is_boilerplate(symbol))
                .then(|| Finding::new(symbol, how).anchored(source, whole.start()))
        })
    })
}

// ── Company ──

fn company_before_ticker(event: &NormalizedEvent, draft: &Draft) -> Option<Finding> {
    let ticker = draft.get(Field::Ticker)?;
    let (source, at) = ticker.anchor?;
    let preceding = &text_of(event, source)[..at];
    trailing_name(preceding, Some(&ticker.value))
        .map(|name| Finding::new(name, "from text preceding ticker"))
}

fn company_before_delimiter(event: &NormalizedEvent, draft: &Draft) -> Option<Finding> {
    let ticker = draft.value(Field::Ticker);
    texts(event)
        .into_iter()
        .find_map(|(_, text)| {
            let mut cuts: Vec<usize> = COMPANY_DELIMITERS
                .iter()
                .flat_map(|d| text.match_indices(d).map(|(i, _)| i))
                .collect();
            cuts.sort_unstable();
            cuts.into_iter()
                .find_map(|at| trailing_name(&text[..at], ticker))
        })
        .map(|name| Finding::new(name, "from text preceding delimiter"))
}

/// The run of capitalised words at the end of `text`, minus boilerplate and
/// the ticker.
fn trailing_name(text: &str, ticker: Option<&str>) -> Option<String> {
    let mut words: Vec<&str> = Vec::new();
    for word in text.split_whitespace().rev() {
        if word.ends_with(':') || is_dash(word) || !starts_capitalized(word) {
            break;
        }
        words.push(word);
    }
    words.reverse();
    let name = strip_noise(&words, ticker);
    let name = name.trim_end_matches([',', ';']).trim();
    (!name.is_empty()).then(|| name.to_string())
}

// ── Drug ──

fn drug_before_keyword(event: &NormalizedEvent, draft: &Draft) -> Option<Finding> {
    first_drug(event, draft, &DRUG_BEFORE_KEYWORD, "from phrase before treatment keyword")
}

fn drug_after_keyword(event: &NormalizedEvent, draft: &Draft) -> Option<Finding> {
    first_drug(event, draft, &DRUG_AFTER_KEYWORD, "from phrase after treatment keyword")
}

fn drug_after_for(event: &NormalizedEvent, draft: &Draft) -> Option<Finding> {
    first_drug(event, draft, &DRUG_AFTER_FOR, "from phrase after \"for\"")
}

fn first_drug(event: &NormalizedEvent, draft: &Draft, re: &Regex, how: &'static str) -> Option<Finding> {
    let ticker = draft.value(Field::Ticker);
    let company = draft.value(Field::Company);
    texts(event)
        .into_iter()
        .find_map(|(_, text)| {
            re.captures_iter(text)
                .find_map(|caps| clean_drug(caps.get(1)?.as_str(), ticker, company))
        })
        .map(|drug| Finding::new(drug, how))
}

fn clean_drug(phrase: &str, ticker: Option<&str>, company: Option<&str>) -> Option<String> {
    let mut phrase = phrase.trim();
    if let Some(rest) = company.and_then(|c| phrase.strip_prefix(c)) {
        if rest.is_empty() || rest.starts_with(' ') {
            phrase = rest.trim_start();
        }
    }
    let words: Vec<&str> = phrase.split_whitespace().collect();
    let drug = strip_noise(&words, ticker);
    let repeats = |other: Option<&str>| other.is_some_and(|o| o.eq_ignore_ascii_case(&drug));
    (!drug.is_empty() && !repeats(company) && !repeats(ticker)).then_some(drug)
}

// ── Indication ──

fn indication_after_phrase(event: &NormalizedEvent, _: &Draft) -> Option<Finding> {
    texts(event)
        .into_iter()
        .find_map(|(_, text)| {
            INDICATION
                .captures_iter(text)
                .find_map(|caps| clean_indication(caps.get(1)?.as_str()))
        })
        .map(|indication| Finding::new(indication, "from indication phrase"))
}

fn clean_indication(raw: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `raw`.
    let lower = raw.to_ascii_lowercase();
    let cut = INDICATION_STOPS
        .iter()
        .filter_map(|stop| lower.find(stop))
        .min()
        .unwrap_or(raw.len());
    let value = raw[..cut]
        .trim()
        .trim_end_matches(|c: char| !c.is_alphanumeric());
    (!value.is_empty()).then(|| value.to_string())
}

// ── Review classification ──

fn priority_keyword(event: &NormalizedEvent, _: &Draft) -> Option<Finding> {
    mentions_any(event, PRIORITY_KEYWORDS)
        .then(|| Finding::new("true", "from priority review keyword"))
}

fn decision_from_priority(_: &NormalizedEvent, draft: &Draft) -> Option<Finding> {
    draft
        .get(Field::PriorityReview)
        .map(|_| Finding::new("priority", "from priority review"))
}

fn accelerated_keyword(event: &NormalizedEvent, _: &Draft) -> Option<Finding> {
    mentions_any(event, ACCELERATED_KEYWORDS)
        .then(|| Finding::new("accelerated", "from accelerated approval keyword"))
}

fn decision_keyword(event: &NormalizedEvent, _: &Draft) -> Option<Finding> {
    mentions_any(event, DECISION_KEYWORDS).then(|| Finding::new("standard", "from decision keyword"))
}

// ── Helpers ──

fn mentions_any(event: &NormalizedEvent, needles: &[&str]) -> bool {
    texts(event).iter().any(|(_, text)| {
        let lower = text.to_lowercase();
        needles.iter().any(|needle| lower.contains(needle))
    })
}

fn is_boilerplate(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    BOILERPLATE.contains(&upper.as_str())
}

fn is_dash(word: &str) -> bool {
    matches!(word, "—" | "–" | "-")
}

fn starts_capitalized(word: &str) -> bool {
    word == "&"
        || word
            .chars()
            .next()
            .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
}

fn bare_word(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

/// Drop boilerplate and ticker words from both ends of `words`.
fn strip_noise(words: &[&str], ticker: Option<&str>) -> String {
    let is_noise = |word: &&str| {
        let bare = bare_word(word);
        (bare.is_empty() && *word != "&")
            || is_boilerplate(bare)
            || ticker.is_some_and(|t| bare == t)
    };
    let Some(start) = words.iter().position(|w| !is_noise(w)) else {
        return String::new();
    };
    let end = words
        .iter()
        .rposition(|w| !is_noise(w))
        .map_or(start, |i| i + 1);
    words[start..end].join(" ")
}
