use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};

use crate::textutil::{normalize_months, strip_markup};

static NUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("num regex"));
static RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+(?:\.\d+)?\s*[–—\-~～－]\s*\d+(?:\.\d+)?").expect("range regex")
});
static UNIT_EN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(mm|cm|dm|km|µm|um|m)\b").expect("unit regex"));
static NEG_TRIGGER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})\b", NEG_TRIGGERS.join("|"))).expect("negation regex")
});
static ITALIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<i>\s*([^<]+?)\s*</i>").expect("italic regex"));
static BINOMIAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z-]+)\s+([a-z-]{2,})\b").expect("binomial regex"));
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\s*/?\s*([A-Za-z0-9]+)[^>]*>").expect("tag regex"));

const UNIT_TABLE: &[(&str, &[&str])] = &[
    ("mm", &["mm", "毫米"]),
    ("cm", &["cm", "厘米"]),
    ("dm", &["dm", "分米"]),
    ("m", &["m", "米"]),
    ("km", &["km", "千米"]),
    ("µm", &["µm", "um", "微米"]),
    ("um", &["µm", "um", "微米"]),
];

pub const NEG_TRIGGERS: &[&str] = &[
    "not", "without", "rarely", "usually", "often", "sometimes", "absent", "lacking", "except",
];

pub const ZH_CUES: &[&str] = &[
    "不", "无", "未", "非", "缺", "没有", "罕", "稀", "很少", "常", "通常", "一般", "除外", "而非",
    "而不是",
];

pub const GUARDED_SYMBOLS: &[char] = &['±', '×'];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckKind {
    Num,
    Range,
    Unit,
    NegationCue,
    Binomial,
    Symbol,
}

impl CheckKind {
    /// Evaluation order, which is also the order flags are reported in.
    pub const ALL: [CheckKind; 6] = [
        CheckKind::Num,
        CheckKind::Range,
        CheckKind::Unit,
        CheckKind::NegationCue,
        CheckKind::Binomial,
        CheckKind::Symbol,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            CheckKind::Num => "NUM",
            CheckKind::Range => "RANGE",
            CheckKind::Unit => "UNIT",
            CheckKind::NegationCue => "NEGATION_CUE",
            CheckKind::Binomial => "BINOMIAL",
            CheckKind::Symbol => "SYMBOL",
        }
    }

    fn passes(self, seg: &CleanSegment<'_>) -> bool {
        match self {
            CheckKind::Num => numbers_pass(&seg.en_dates, &seg.zh_dates),
            CheckKind::Range => range_pass(&seg.en_plain, &seg.zh_plain),
            CheckKind::Unit => units_pass(&seg.en_plain, &seg.zh_plain),
            CheckKind::NegationCue => negation_pass(&seg.en_plain, &seg.zh_plain),
            CheckKind::Binomial => binomial_pass(seg.en_raw, seg.zh_raw),
            CheckKind::Symbol => symbols_pass(seg.en_raw, seg.zh_raw),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InfoKind {
    Tag,
}

impl InfoKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            InfoKind::Tag => "TAG",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Flag {
    Hard(CheckKind),
    Informational(InfoKind),
    Untranslated,
    OutOfScope,
}

impl Flag {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Flag::Hard(kind) => kind.label(),
            Flag::Informational(kind) => kind.label(),
            Flag::Untranslated => "UNTRANSLATED",
            Flag::OutOfScope => "OUT_OF_SCOPE",
        }
    }

    #[must_use]
    pub fn is_hard(self) -> bool {
        matches!(self, Flag::Hard(_))
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Flag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CheckOptions {
    pub normalize_months: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            normalize_months: true,
        }
    }
}

struct CleanSegment<'a> {
    en_raw: &'a str,
    zh_raw: &'a str,
    en_plain: String,
    zh_plain: String,
    en_dates: String,
    zh_dates: String,
}

impl<'a> CleanSegment<'a> {
    fn new(en: &'a str, zh: &'a str, opts: &CheckOptions) -> Self {
        let en_plain = strip_markup(en).into_owned();
        let zh_plain = strip_markup(zh).into_owned();
        // Months only count as numbers when the source already makes numeric claims.
        let months = opts.normalize_months && !extract_numbers(&en_plain).is_empty();
        let (en_dates, zh_dates) = if months {
            (normalize_months(&en_plain), normalize_months(&zh_plain))
        } else {
            (en_plain.clone(), zh_plain.clone())
        };
        Self {
            en_raw: en,
            zh_raw: zh,
            en_plain,
            zh_plain,
            en_dates,
            zh_dates,
        }
    }
}

#[must_use]
pub fn critical_flags(en: &str, zh: &str, opts: &CheckOptions) -> Vec<Flag> {
    let seg = CleanSegment::new(en, zh, opts);
    let mut flags: Vec<Flag> = CheckKind::ALL
        .iter()
        .filter(|kind| !kind.passes(&seg))
        .map(|kind| Flag::Hard(*kind))
        .collect();
    if !tags_balanced(en, zh) {
        flags.push(Flag::Informational(InfoKind::Tag));
    }
    flags
}

/// Decimal numbers not glued to a preceding letter (so `A12` or `F1` are skipped).
#[must_use]
pub fn extract_numbers(text: &str) -> Vec<String> {
    NUM_RE
        .find_iter(text)
        .filter(|m| {
            !text[..m.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphabetic())
        })
        .map(|m| m.as_str().to_string())
        .collect()
}

#[must_use]
pub fn numbers_pass(en_plain: &str, zh_plain: &str) -> bool {
    let src = extract_numbers(en_plain);
    if src.is_empty() {
        return true;
    }
    string_counter(src) == string_counter(extract_numbers(zh_plain))
}

#[must_use]
pub fn has_range(text: &str) -> bool {
    RANGE_RE.is_match(text)
}

// A source range needs some range in the target; the endpoints are NUM's business.
#[must_use]
pub fn range_pass(en_plain: &str, zh_plain: &str) -> bool {
    !has_range(en_plain) || has_range(zh_plain)
}

#[must_use]
pub fn extract_units_en(text: &str) -> Vec<String> {
    UNIT_EN_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| canonical_unit(m.as_str())))
        .collect()
}

fn canonical_unit(unit: &str) -> String {
    // Case-insensitive matching folds the micro sign onto Greek mu.
    unit.to_lowercase().replace('μ', "µ")
}

#[must_use]
pub fn units_pass(en_plain: &str, zh_plain: &str) -> bool {
    extract_units_en(en_plain).iter().all(|unit| {
        match UNIT_TABLE.iter().find(|(u, _)| *u == unit.as_str()) {
            Some((_, renderings)) => renderings.iter().any(|r| zh_plain.contains(r)),
            None => zh_plain.contains(unit.as_str()),
        }
    })
}

#[must_use]
pub fn negation_pass(en_plain: &str, zh_plain: &str) -> bool {
    !NEG_TRIGGER_RE.is_match(en_plain) || ZH_CUES.iter().any(|cue| zh_plain.contains(cue))
}

#[must_use]
pub fn italic_binomials(en_raw: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for cap in ITALIC_RE.captures_iter(en_raw) {
        let inner = strip_markup(&cap[1]).into_owned();
        for b in BINOMIAL_RE.captures_iter(&inner) {
            out.push((b[1].to_string(), b[2].to_string()));
        }
    }
    out
}

#[must_use]
pub fn binomial_pass(en_raw: &str, zh_raw: &str) -> bool {
    let bins = italic_binomials(en_raw);
    if bins.is_empty() {
        return true;
    }
    let target = strip_markup(zh_raw).to_lowercase();
    bins.iter().all(|(genus, species)| {
        let name = format!("{genus} {species}").to_lowercase();
        target.contains(&name)
    })
}

#[must_use]
pub fn symbols_pass(en_raw: &str, zh_raw: &str) -> bool {
    GUARDED_SYMBOLS
        .iter()
        .all(|sym| !en_raw.contains(*sym) || zh_raw.contains(*sym))
}

fn tag_names(text: &str) -> Vec<String> {
    TAG_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_ascii_lowercase()))
        .collect()
}

#[must_use]
pub fn tags_balanced(en_raw: &str, zh_raw: &str) -> bool {
    let src = tag_names(en_raw);
    if src.is_empty() {
        return true;
    }
    string_counter(src) == string_counter(tag_names(zh_raw))
}

fn string_counter(items: impl IntoIterator<Item = String>) -> HashMap<String, usize> {
    let mut out: HashMap<String, usize> = HashMap::new();
    for s in items {
        if s.is_empty() {
            continue;
        }
        *out.entry(s).or_insert(0) += 1;
    }
    out
}
