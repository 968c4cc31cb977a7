use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::Serialize;

use crate::authors::{NameKb, PersonCheck};
use crate::quality::{critical_flags, CheckKind, CheckOptions, Flag};
use crate::terminology::{TermKb, TermMetrics};
use crate::textutil::{is_blank, norm_ws};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Block {
    Key,
    Description,
}

impl Block {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Block::Key => "Key",
            Block::Description => "Description",
        }
    }

    #[must_use]
    pub fn applies_scope_gate(self) -> bool {
        matches!(self, Block::Description)
    }

    #[must_use]
    pub fn checks_person_names(self) -> bool {
        matches!(self, Block::Description)
    }

    fn entity_checks(self) -> &'static [CheckKind] {
        match self {
            Block::Key => &[CheckKind::Symbol],
            Block::Description => &[CheckKind::Binomial, CheckKind::Symbol],
        }
    }
}

#[derive(Clone, Debug)]
pub struct SegmentPair {
    pub block: Block,
    pub row_index: usize,
    pub english: String,
    pub chinese: String,
    pub category: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Clone, Debug)]
pub struct EvalOptions {
    pub out_of_scope_categories: Vec<String>,
    pub max_missing_terms: usize,
    pub checks: CheckOptions,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            out_of_scope_categories: vec!["synonym".to_string()],
            max_missing_terms: 20,
            checks: CheckOptions::default(),
        }
    }
}

impl EvalOptions {
    fn excludes(&self, category: Option<&str>) -> bool {
        let Some(cat) = category else {
            return false;
        };
        let cat = cat.trim().to_lowercase();
        self.out_of_scope_categories
            .iter()
            .any(|c| c.trim().to_lowercase() == cat)
    }
}

#[derive(Clone, Debug, Default)]
pub struct KnowledgeBases {
    pub terms: TermKb,
    pub names: NameKb,
}

#[derive(Clone, Debug, Serialize)]
pub struct Verdict {
    pub block: Block,
    pub row_index: usize,
    pub metadata: BTreeMap<String, String>,
    pub category: Option<String>,
    pub english: String,
    pub chinese: String,
    pub in_scope: bool,
    pub translated: bool,
    pub term_hits: usize,
    pub term_ok: usize,
    pub term_recall: Option<f64>,
    pub term_missing: Vec<String>,
    #[serde(skip)]
    pub term_found: BTreeMap<String, BTreeSet<String>>,
    pub flags: Vec<Flag>,
    pub critical_pass: bool,
    pub entity_pass: bool,
    pub person: PersonCheck,
}

impl Verdict {
    #[must_use]
    pub fn flag_labels(&self) -> String {
        self.flags
            .iter()
            .map(|f| f.label())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[must_use]
pub fn evaluate_row(pair: &SegmentPair, kb: &KnowledgeBases, opts: &EvalOptions) -> Verdict {
    let translated = !is_blank(&norm_ws(&pair.chinese));
    let in_scope = !(pair.block.applies_scope_gate() && opts.excludes(pair.category.as_deref()));
    let checked = translated && in_scope;

    let mut terms = if checked {
        kb.terms.evaluate(&pair.english, &pair.chinese)
    } else {
        TermMetrics::default()
    };
    terms.missing.truncate(opts.max_missing_terms);

    let flags = if !in_scope {
        vec![Flag::OutOfScope]
    } else if !translated {
        vec![Flag::Untranslated]
    } else {
        critical_flags(&pair.english, &pair.chinese, &opts.checks)
    };
    let critical_pass = checked && !flags.iter().any(|f| f.is_hard());
    let entity_pass = checked
        && pair
            .block
            .entity_checks()
            .iter()
            .all(|kind| !flags.contains(&Flag::Hard(*kind)));

    let person = if checked && pair.block.checks_person_names() {
        kb.names.check(&pair.english, &pair.chinese)
    } else {
        PersonCheck::not_applicable()
    };

    Verdict {
        block: pair.block,
        row_index: pair.row_index,
        metadata: pair.metadata.clone(),
        category: pair.category.clone(),
        english: pair.english.clone(),
        chinese: pair.chinese.clone(),
        in_scope,
        translated,
        term_hits: terms.hits,
        term_ok: terms.ok,
        term_recall: terms.recall,
        term_missing: terms.missing,
        term_found: terms.found,
        flags,
        critical_pass,
        entity_pass,
        person,
    }
}

/// Evaluate many rows in parallel; the output keeps the input order.
#[must_use]
pub fn evaluate_rows(pairs: &[SegmentPair], kb: &KnowledgeBases, opts: &EvalOptions) -> Vec<Verdict> {
    pairs
        .par_iter()
        .map(|pair| evaluate_row(pair, kb, opts))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authors::{AuthorityRow, PersonStatus, DEFAULT_PLACEHOLDERS};
    use crate::quality::InfoKind;
    use crate::terminology::GlossaryRow;

    fn kb() -> KnowledgeBases {
        let glossary = vec![
            GlossaryRow {
                chinese: "急尖".to_string(),
                english: "acute".to_string(),
            },
            GlossaryRow {
                chinese: "叶".to_string(),
                english: "leaves".to_string(),
            },
        ];
        let authors = vec![AuthorityRow {
            abbreviations: vec!["D.C.".to_string()],
            full_names: vec![],
            chinese_name: "德堪多".to_string(),
        }];
        let placeholders: Vec<String> = DEFAULT_PLACEHOLDERS.iter().map(|s| s.to_string()).collect();
        KnowledgeBases {
            terms: TermKb::build(&glossary),
            names: NameKb::build(&authors, &placeholders),
        }
    }

    fn pair(block: Block, en: &str, zh: &str, category: Option<&str>) -> SegmentPair {
        SegmentPair {
            block,
            row_index: 0,
            english: en.to_string(),
            chinese: zh.to_string(),
            category: category.map(str::to_string),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn untranslated_short_circuits() {
        let v = evaluate_row(
            &pair(Block::Description, "Leaves 3 cm, apex acute.", " \n ", Some("description")),
            &kb(),
            &EvalOptions::default(),
        );
        assert!(!v.translated);
        assert!(v.in_scope);
        assert_eq!(v.flags, vec![Flag::Untranslated]);
        assert_eq!(v.term_hits, 0);
        assert!(!v.critical_pass);
        assert!(!v.entity_pass);
        assert_eq!(v.person.status, PersonStatus::Na);
    }

    #[test]
    fn synonym_rows_are_out_of_scope() {
        let v = evaluate_row(
            &pair(Block::Description, "Rosa alba L.", "白蔷薇", Some("  Synonym ")),
            &kb(),
            &EvalOptions::default(),
        );
        assert!(!v.in_scope);
        assert!(v.translated);
        assert_eq!(v.flags, vec![Flag::OutOfScope]);
        assert!(!v.critical_pass);
    }

    #[test]
    fn key_rows_ignore_category_gate() {
        let v = evaluate_row(
            &pair(Block::Key, "Leaves 3 cm, apex acute.", "叶长3厘米，顶端急尖。", Some("synonym")),
            &kb(),
            &EvalOptions::default(),
        );
        assert!(v.in_scope);
        assert!(v.critical_pass);
        assert_eq!(v.term_hits, 2);
        assert_eq!(v.term_recall, Some(1.0));
    }

    #[test]
    fn key_entity_pass_ignores_binomials() {
        let v = evaluate_row(
            &pair(Block::Key, "<i>Rosa multiflora</i>", "<i>野蔷薇</i>", None),
            &kb(),
            &EvalOptions::default(),
        );
        assert_eq!(v.flags, vec![Flag::Hard(CheckKind::Binomial)]);
        assert!(!v.critical_pass);
        assert!(v.entity_pass);
    }

    #[test]
    fn tag_only_rows_still_pass() {
        let v = evaluate_row(
            &pair(Block::Description, "<b>Leaves</b> acute.", "叶急尖。", None),
            &kb(),
            &EvalOptions::default(),
        );
        assert_eq!(v.flags, vec![Flag::Informational(InfoKind::Tag)]);
        assert!(v.critical_pass);
        assert!(v.entity_pass);
    }

    #[test]
    fn person_names_checked_on_description_rows_only() {
        let en = "Spiraea japonica (L.) D.C.";
        let zh = "粉花绣线菊";
        let desc = evaluate_row(&pair(Block::Description, en, zh, None), &kb(), &EvalOptions::default());
        assert_eq!(desc.person.status, PersonStatus::Fail);
        let key = evaluate_row(&pair(Block::Key, en, zh, None), &kb(), &EvalOptions::default());
        assert_eq!(key.person.status, PersonStatus::Na);
    }

    #[test]
    fn missing_terms_are_truncated() {
        let opts = EvalOptions {
            max_missing_terms: 1,
            ..EvalOptions::default()
        };
        let v = evaluate_row(&pair(Block::Key, "Leaves acute.", "花。", None), &kb(), &opts);
        assert_eq!(v.term_hits, 2);
        assert_eq!(v.term_ok, 0);
        assert_eq!(v.term_missing, vec!["acute".to_string()]);
    }

    #[test]
    fn batch_preserves_order() {
        let pairs: Vec<SegmentPair> = (0..64)
            .map(|i| SegmentPair {
                row_index: i,
                ..pair(Block::Key, &format!("Petals {i}."), &format!("花瓣{i}。"), None)
            })
            .collect();
        let out = evaluate_rows(&pairs, &kb(), &EvalOptions::default());
        assert_eq!(out.len(), 64);
        assert!(out.iter().enumerate().all(|(i, v)| v.row_index == i && v.critical_pass));
    }
}
