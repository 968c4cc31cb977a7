use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::textutil::{norm_ws, strip_markup};

pub const DEFAULT_PLACEHOLDERS: &[&str] = &["【空】", "?", "？"];

static INITIALS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[A-Z]\.){1,4}(?:\s?[A-Za-z]{2,}\.)?").expect("initials regex")
});
static SURNAME_PERIOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][A-Za-z\-]{2,}\.").expect("surname regex"));
static PAREN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").expect("paren regex"));
static FRAGMENT_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[;；，,]| and ").expect("fragment split regex"));
static NAME_CHARS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z.\- ]+").expect("name chars regex"));
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));

#[derive(Clone, Debug, Default)]
pub struct AuthorityRow {
    pub abbreviations: Vec<String>,
    pub full_names: Vec<String>,
    pub chinese_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorityRecord {
    pub row_index: usize,
    pub chinese_name: String,
    pub verifiable: bool,
}

#[must_use]
pub fn normalize_abbreviation(abbr: &str) -> String {
    abbr.chars().filter(|c| !c.is_whitespace()).collect()
}

#[must_use]
pub fn normalize_full_name(name: &str) -> String {
    let letters: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| c.is_ascii_lowercase() || *c == ' ')
        .collect();
    norm_ws(&letters)
}

#[derive(Clone, Debug, Default)]
pub struct NameKb {
    abbr_index: HashMap<String, usize>,
    fullname_index: HashMap<String, usize>,
    records: Vec<AuthorityRecord>,
}

impl NameKb {
    /// Later rows win when two rows share a key.
    #[must_use]
    pub fn build<'a>(
        rows: impl IntoIterator<Item = &'a AuthorityRow>,
        placeholders: &[String],
    ) -> Self {
        let mut kb = Self::default();
        for (row_index, row) in rows.into_iter().enumerate() {
            let chinese_name = norm_ws(&row.chinese_name);
            let verifiable =
                !chinese_name.is_empty() && !placeholders.iter().any(|p| *p == chinese_name);
            kb.records.push(AuthorityRecord {
                row_index,
                chinese_name,
                verifiable,
            });
            for abbr in &row.abbreviations {
                let key = normalize_abbreviation(abbr);
                if !key.is_empty() {
                    kb.abbr_index.insert(key, row_index);
                }
            }
            for name in &row.full_names {
                let key = normalize_full_name(name);
                if !key.is_empty() {
                    kb.fullname_index.insert(key, row_index);
                }
            }
        }
        kb
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn verifiable_count(&self) -> usize {
        self.records.iter().filter(|r| r.verifiable).count()
    }

    #[must_use]
    pub fn record(&self, row_index: usize) -> Option<&AuthorityRecord> {
        self.records.get(row_index)
    }

    #[must_use]
    pub fn resolve(&self, candidate: &Candidate) -> Option<&AuthorityRecord> {
        let index = match candidate.kind {
            CandidateKind::Abbreviation => &self.abbr_index,
            CandidateKind::FullName => &self.fullname_index,
        };
        index.get(&candidate.key).and_then(|i| self.records.get(*i))
    }

    #[must_use]
    pub fn check(&self, en_text: &str, zh_text: &str) -> PersonCheck {
        let zh = strip_markup(zh_text);
        let mut out = PersonCheck::default();
        let mut verifiable_rows: BTreeSet<usize> = BTreeSet::new();
        for cand in extract_candidates(en_text) {
            let Some(rec) = self.resolve(&cand) else {
                continue;
            };
            out.matched_ids.insert(rec.row_index);
            if !rec.verifiable {
                continue;
            }
            verifiable_rows.insert(rec.row_index);
            if !zh.contains(rec.chinese_name.as_str()) {
                out.expected_cn.insert(rec.chinese_name.clone());
                out.reasons.insert(PersonReason::CnMissing);
            }
        }
        out.verifiable_n = verifiable_rows.len();
        out.status = if verifiable_rows.is_empty() {
            PersonStatus::Na
        } else if out.expected_cn.is_empty() {
            PersonStatus::Ok
        } else {
            PersonStatus::Fail
        };
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CandidateKind {
    Abbreviation,
    FullName,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Candidate {
    pub kind: CandidateKind,
    pub key: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateRule {
    /// One to four `X.` initials, optionally followed by a short word with a period: `D.C.`, `J. Hook.`.
    Initials,
    /// A capitalized word of three or more letters ending in a period: `Hook.`, `Maxim.`.
    SurnameWithPeriod,
    /// Comma/semicolon/"and"-separated fragments of two or more words: `Joseph Dalton Hooker`.
    FullNameFragment,
}

pub const CANDIDATE_RULES: [CandidateRule; 3] = [
    CandidateRule::Initials,
    CandidateRule::SurnameWithPeriod,
    CandidateRule::FullNameFragment,
];

impl CandidateRule {
    #[must_use]
    pub fn kind(self) -> CandidateKind {
        match self {
            CandidateRule::Initials | CandidateRule::SurnameWithPeriod => {
                CandidateKind::Abbreviation
            }
            CandidateRule::FullNameFragment => CandidateKind::FullName,
        }
    }

    #[must_use]
    pub fn extract(self, text: &str) -> BTreeSet<String> {
        match self {
            CandidateRule::Initials => INITIALS_RE
                .find_iter(text)
                .map(|m| normalize_abbreviation(m.as_str()))
                .collect(),
            CandidateRule::SurnameWithPeriod => SURNAME_PERIOD_RE
                .find_iter(text)
                .map(|m| normalize_abbreviation(m.as_str()))
                .collect(),
            CandidateRule::FullNameFragment => full_name_fragments(text),
        }
    }
}

fn full_name_fragments(text: &str) -> BTreeSet<String> {
    let no_paren = PAREN_RE.replace_all(text, " ");
    let mut out = BTreeSet::new();
    for part in FRAGMENT_SPLIT_RE.split(&no_paren) {
        let cleaned = NAME_CHARS_RE.replace_all(part, " ");
        let cleaned = WS_RE.replace_all(&cleaned, " ");
        let words: Vec<&str> = cleaned
            .split_whitespace()
            .filter(|w| w.chars().any(|c| c.is_ascii_alphabetic()))
            .collect();
        if words.len() < 2 {
            continue;
        }
        let key = normalize_full_name(&words.join(" "));
        if !key.is_empty() {
            out.insert(key);
        }
    }
    out
}

#[must_use]
pub fn extract_candidates(en_text: &str) -> BTreeSet<Candidate> {
    let plain = strip_markup(en_text);
    let mut out = BTreeSet::new();
    for rule in CANDIDATE_RULES {
        for key in rule.extract(&plain) {
            out.insert(Candidate {
                kind: rule.kind(),
                key,
            });
        }
    }
    out
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PersonStatus {
    #[default]
    Na,
    Ok,
    Fail,
}

impl PersonStatus {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            PersonStatus::Na => "NA",
            PersonStatus::Ok => "OK",
            PersonStatus::Fail => "FAIL",
        }
    }
}

impl Serialize for PersonStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PersonReason {
    #[serde(rename = "CN_MISSING")]
    CnMissing,
}

impl PersonReason {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            PersonReason::CnMissing => "CN_MISSING",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PersonCheck {
    pub status: PersonStatus,
    pub verifiable_n: usize,
    pub expected_cn: BTreeSet<String>,
    pub reasons: BTreeSet<PersonReason>,
    pub matched_ids: BTreeSet<usize>,
}

impl PersonCheck {
    #[must_use]
    pub fn not_applicable() -> Self {
        Self::default()
    }
}
