use std::collections::{BTreeMap, BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::textutil::{norm_ws, strip_markup};

static PAREN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(.*?\)\s*").expect("paren regex"));
static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z]+(?:-[A-Za-z]+)*").expect("word regex"));

/// Upper bound on the n-gram window, whatever the glossary contains.
pub const MAX_NGRAM_CAP: usize = 6;
const EMPTY_KB_NGRAM: usize = 4;

#[derive(Clone, Debug, Default)]
pub struct GlossaryRow {
    pub chinese: String,
    pub english: String,
}

#[must_use]
pub fn normalize_en_term(term: &str) -> String {
    let lowered = norm_ws(term).to_lowercase();
    let unparen = PAREN_RE.replace_all(&lowered, " ");
    norm_ws(&unparen)
}

/// Heuristic de-pluralization of one token:
/// `-ies` -> `-y`, `-es` -> `` (longer than 4 chars), `-s` -> `` (not `-ss`, longer than 3 chars).
#[must_use]
pub fn singularize_token(tok: &str) -> String {
    let n = tok.chars().count();
    if n > 4 {
        if let Some(stem) = tok.strip_suffix("ies") {
            return format!("{stem}y");
        }
        if let Some(stem) = tok.strip_suffix("es") {
            return stem.to_string();
        }
    }
    if n > 3 && !tok.ends_with("ss") {
        if let Some(stem) = tok.strip_suffix('s') {
            return stem.to_string();
        }
    }
    tok.to_string()
}

#[must_use]
pub fn term_variants(term: &str) -> BTreeSet<String> {
    let base = normalize_en_term(term);
    let mut out = BTreeSet::new();
    if base.is_empty() {
        return out;
    }
    out.insert(base.replace('-', " "));
    out.insert(base.replace(' ', "-"));
    let mut toks: Vec<&str> = base.split(' ').collect();
    let last = toks.pop().map(singularize_token).unwrap_or_default();
    let singular = if toks.is_empty() {
        last
    } else {
        format!("{} {last}", toks.join(" "))
    };
    out.insert(singular);
    out.insert(base);
    out.retain(|v| !v.is_empty());
    out
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TermMetrics {
    pub hits: usize,
    pub ok: usize,
    pub recall: Option<f64>,
    pub missing: Vec<String>,
    pub found: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Clone, Debug, Default)]
pub struct TermKb {
    variants: HashMap<String, BTreeSet<String>>,
    max_ngram: usize,
}

impl TermKb {
    #[must_use]
    pub fn build<'a>(rows: impl IntoIterator<Item = &'a GlossaryRow>) -> Self {
        let mut variants: HashMap<String, BTreeSet<String>> = HashMap::new();
        for row in rows {
            let zh = norm_ws(&row.chinese);
            let en = norm_ws(&row.english);
            if zh.is_empty() || en.is_empty() {
                continue;
            }
            for v in term_variants(&en) {
                variants.entry(v).or_default().insert(zh.clone());
            }
        }
        let max_ngram = variants
            .keys()
            .map(|k| k.split(' ').count())
            .max()
            .unwrap_or(EMPTY_KB_NGRAM)
            .min(MAX_NGRAM_CAP);
        Self {
            variants,
            max_ngram,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    #[must_use]
    pub fn max_ngram(&self) -> usize {
        self.max_ngram
    }

    #[must_use]
    pub fn renderings(&self, variant: &str) -> Option<&BTreeSet<String>> {
        self.variants.get(variant)
    }

    #[must_use]
    pub fn match_terms(&self, en_text: &str) -> BTreeSet<String> {
        let plain = strip_markup(en_text);
        let tokens: Vec<String> = WORD_RE
            .find_iter(&plain)
            .map(|m| m.as_str().to_lowercase())
            .collect();
        let mut hits = BTreeSet::new();
        for n in 1..=self.max_ngram {
            if n > tokens.len() {
                break;
            }
            for window in tokens.windows(n) {
                let gram = window.join(" ");
                if self.variants.contains_key(&gram) {
                    hits.insert(gram);
                }
            }
        }
        hits
    }

    #[must_use]
    pub fn evaluate(&self, en_text: &str, zh_text: &str) -> TermMetrics {
        let hits = self.match_terms(en_text);
        if hits.is_empty() {
            return TermMetrics::default();
        }
        let zh = strip_markup(zh_text);
        let mut metrics = TermMetrics {
            hits: hits.len(),
            ..TermMetrics::default()
        };
        for term in hits {
            let found: BTreeSet<String> = self
                .variants
                .get(&term)
                .into_iter()
                .flatten()
                .filter(|z| !z.is_empty() && zh.contains(z.as_str()))
                .cloned()
                .collect();
            if found.is_empty() {
                metrics.missing.push(term);
            } else {
                metrics.ok += 1;
                metrics.found.insert(term, found);
            }
        }
        metrics.recall = Some(metrics.ok as f64 / metrics.hits as f64);
        metrics
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TermDrift {
    pub en_term: String,
    pub n_cn_variants: usize,
    pub cn_variants: BTreeMap<String, usize>,
}

#[derive(Default)]
pub struct TermDriftTracker {
    seen: BTreeMap<String, BTreeMap<String, usize>>,
}

impl TermDriftTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, found: &BTreeMap<String, BTreeSet<String>>) {
        for (term, renderings) in found {
            let counts = self.seen.entry(term.clone()).or_default();
            for zh in renderings {
                *counts.entry(zh.clone()).or_insert(0) += 1;
            }
        }
    }

    #[must_use]
    pub fn drifted(&self) -> Vec<TermDrift> {
        let mut out: Vec<TermDrift> = self
            .seen
            .iter()
            .filter(|(_, counts)| counts.len() >= 2)
            .map(|(term, counts)| TermDrift {
                en_term: term.clone(),
                n_cn_variants: counts.len(),
                cn_variants: counts.clone(),
            })
            .collect();
        out.sort_by(|a, b| {
            b.n_cn_variants
                .cmp(&a.n_cn_variants)
                .then_with(|| a.en_term.cmp(&b.en_term))
        });
        out
    }
}
