use std::collections::BTreeMap;

use foc_autoqa::authors::{AuthorityRow, NameKb, PersonStatus, DEFAULT_PLACEHOLDERS};
use foc_autoqa::evaluate::{evaluate_row, Block, EvalOptions, KnowledgeBases, SegmentPair};
use foc_autoqa::quality::{critical_flags, CheckKind, CheckOptions, Flag, InfoKind};
use foc_autoqa::report::build_report;
use foc_autoqa::report::{KnowledgeBaseStats, ReportMeta};
use foc_autoqa::terminology::{normalize_en_term, term_variants, GlossaryRow, TermKb};

fn glossary() -> Vec<GlossaryRow> {
    [
        ("叶", "leaves"),
        ("急尖", "acute"),
        ("顶端", "apex"),
        ("托叶", "stipule"),
        ("伞房花序", "corymb"),
        ("复伞房花序", "compound corymb"),
        ("羽状复叶", "pinnately compound leaf"),
        ("离生", "free (of parts)"),
        ("心形", "cordate"),
        ("心脏形", "cordate"),
    ]
    .into_iter()
    .map(|(zh, en)| GlossaryRow {
        chinese: zh.to_string(),
        english: en.to_string(),
    })
    .collect()
}

fn authors() -> Vec<AuthorityRow> {
    let row = |abbrs: &[&str], names: &[&str], zh: &str| AuthorityRow {
        abbreviations: abbrs.iter().map(|s| s.to_string()).collect(),
        full_names: names.iter().map(|s| s.to_string()).collect(),
        chinese_name: zh.to_string(),
    };
    vec![
        row(&["D.C.", "DC."], &["Augustin Pyramus de Candolle"], "德堪多"),
        row(&["Maxim."], &["Carl Johann Maximowicz"], "马克西莫维奇"),
        row(&["Rehder"], &["Alfred Rehder"], "【空】"),
    ]
}

fn kb() -> KnowledgeBases {
    let placeholders: Vec<String> = DEFAULT_PLACEHOLDERS.iter().map(|s| s.to_string()).collect();
    KnowledgeBases {
        terms: TermKb::build(&glossary()),
        names: NameKb::build(&authors(), &placeholders),
    }
}

fn desc(en: &str, zh: &str, category: &str) -> SegmentPair {
    SegmentPair {
        block: Block::Description,
        row_index: 0,
        english: en.to_string(),
        chinese: zh.to_string(),
        category: Some(category.to_string()),
        metadata: BTreeMap::new(),
    }
}

fn hard(flags: &[Flag]) -> Vec<CheckKind> {
    flags
        .iter()
        .filter_map(|f| match f {
            Flag::Hard(kind) => Some(*kind),
            _ => None,
        })
        .collect()
}

#[test]
fn range_with_units_and_terms_passes() {
    let v = evaluate_row(
        &desc("Leaves 3–5 cm, apex acute.", "叶长3-5厘米，顶端急尖。", "description"),
        &kb(),
        &EvalOptions::default(),
    );
    assert!(v.flags.is_empty(), "unexpected flags: {}", v.flag_labels());
    assert!(v.critical_pass);
    assert!(v.entity_pass);
    assert_eq!(v.term_hits, 3);
    assert_eq!(v.term_recall, Some(1.0));
}

#[test]
fn dropped_negation_fails_critical_check() {
    let v = evaluate_row(
        &desc("Flowers white, not fragrant.", "花白色，芳香。", "description"),
        &kb(),
        &EvalOptions::default(),
    );
    assert_eq!(hard(&v.flags), vec![CheckKind::NegationCue]);
    assert!(!v.critical_pass);
    assert!(v.entity_pass);
}

#[test]
fn untranslated_italic_binomial_fails_entity_check() {
    let v = evaluate_row(
        &desc("<i>Rosa multiflora</i> is common.", "<i>野蔷薇</i>常见。", "habitat"),
        &kb(),
        &EvalOptions::default(),
    );
    assert_eq!(hard(&v.flags), vec![CheckKind::Binomial]);
    assert!(!v.critical_pass);
    assert!(!v.entity_pass);

    let kept = evaluate_row(
        &desc("<i>Rosa multiflora</i> is common.", "<i>Rosa multiflora</i>常见。", "habitat"),
        &kb(),
        &EvalOptions::default(),
    );
    assert!(kept.entity_pass);
}

#[test]
fn missing_author_rendering_fails_name_check() {
    let v = evaluate_row(
        &desc("Spiraea japonica (L.) D.C.", "粉花绣线菊", "distribution"),
        &kb(),
        &EvalOptions::default(),
    );
    assert_eq!(v.person.status, PersonStatus::Fail);
    assert_eq!(v.person.verifiable_n, 1);
    assert_eq!(
        v.person.expected_cn.iter().cloned().collect::<Vec<_>>(),
        vec!["德堪多".to_string()]
    );

    let ok = evaluate_row(
        &desc("Spiraea japonica (L.) D.C.", "粉花绣线菊（德堪多）", "distribution"),
        &kb(),
        &EvalOptions::default(),
    );
    assert_eq!(ok.person.status, PersonStatus::Ok);
}

#[test]
fn synonym_rows_are_never_checked() {
    for zh in ["", "随便什么", "Rosa alba L. 3 cm"] {
        let v = evaluate_row(
            &desc("Rosa alba L., Sp. Pl. 1: 492. 1753.", zh, "synonym"),
            &kb(),
            &EvalOptions::default(),
        );
        assert!(!v.in_scope);
        assert_eq!(v.flags, vec![Flag::OutOfScope]);
        assert!(!v.critical_pass);
        assert_eq!(v.person.status, PersonStatus::Na);
    }
}

#[test]
fn variant_generation_is_idempotent() {
    for row in glossary() {
        let normalized = normalize_en_term(&row.english);
        assert_eq!(term_variants(&normalized), term_variants(&row.english));
    }
}

#[test]
fn critical_pass_only_allows_tag_flag() {
    let cases = [
        ("<b>Leaves</b> 3 cm.", "叶3厘米。"),
        ("Leaves 3 cm.", "叶4厘米。"),
        ("Petals 5, ± orbicular.", "花瓣5，近圆形。"),
        ("Fruit 2–3 mm.", "果2毫米，3毫米。"),
        ("Stipules free.", "托叶离生。"),
        ("", "空"),
    ];
    for (en, zh) in cases {
        let v = evaluate_row(&desc(en, zh, "description"), &kb(), &EvalOptions::default());
        if v.critical_pass {
            assert!(v.translated);
            assert!(v
                .flags
                .iter()
                .all(|f| *f == Flag::Informational(InfoKind::Tag)));
        }
    }
}

#[test]
fn number_order_does_not_matter() {
    let en = "Sepals 5, petals 5, stamens 20, carpels 2.5 mm.";
    let targets = [
        "萼片5，花瓣5，雄蕊20，心皮2.5毫米。",
        "雄蕊20，心皮2.5毫米，萼片5，花瓣5。",
        "心皮2.5毫米；花瓣5；雄蕊20；萼片5。",
    ];
    for zh in targets {
        let flags = critical_flags(en, zh, &CheckOptions::default());
        assert!(!flags.contains(&Flag::Hard(CheckKind::Num)), "{zh}");
    }
}

#[test]
fn binomial_needs_italic_markup() {
    let flags = critical_flags(
        "Similar to Rosa multiflora and Prunus persica.",
        "与野蔷薇和桃相似。",
        &CheckOptions::default(),
    );
    assert!(!flags.contains(&Flag::Hard(CheckKind::Binomial)));
}

#[test]
fn unresolved_names_are_not_applicable() {
    let names = kb().names;
    for zh in ["", "林奈", "德堪多"] {
        let check = names.check("Rosa canina L., Sp. Pl. 491. 1753.", zh);
        assert_eq!(check.status, PersonStatus::Na);
        assert_eq!(check.verifiable_n, 0);
    }
    let placeholder_only = names.check("Sorbus pohuashanensis, Alfred Rehder", "花楸");
    assert_eq!(placeholder_only.status, PersonStatus::Na);
    assert_eq!(placeholder_only.verifiable_n, 0);
    assert_eq!(placeholder_only.matched_ids.len(), 1);
}

#[test]
fn full_rendering_coverage_gives_full_recall() {
    let kb = kb();
    let en = "Leaves pinnately compound, stipules free, corymbs compound; leaf blade cordate, apex acute.";
    let matched = kb.terms.match_terms(en);
    assert!(!matched.is_empty());
    let zh: String = matched
        .iter()
        .filter_map(|v| kb.terms.renderings(v))
        .flat_map(|set| set.iter().cloned())
        .collect::<Vec<_>>()
        .join("，");
    let m = kb.terms.evaluate(en, &zh);
    assert_eq!(m.hits, matched.len());
    assert_eq!(m.ok, m.hits);
    assert_eq!(m.recall, Some(1.0));
}

#[test]
fn report_over_mixed_rows() {
    let kb = kb();
    let opts = EvalOptions::default();
    let key = vec![evaluate_row(
        &SegmentPair {
            block: Block::Key,
            row_index: 0,
            english: "Leaves acute; stipules free.".to_string(),
            chinese: "叶急尖；托叶离生。".to_string(),
            category: None,
            metadata: BTreeMap::new(),
        },
        &kb,
        &opts,
    )];
    let description = vec![
        evaluate_row(&desc("Leaf blade cordate.", "叶片心形。", "leaf"), &kb, &opts),
        evaluate_row(&desc("Leaves cordate.", "叶心脏形。", "leaf"), &kb, &opts),
        evaluate_row(&desc("Flowers not fragrant.", "花芳香。", "flower"), &kb, &opts),
        evaluate_row(&desc("Rosa alba L.", "白蔷薇", "synonym"), &kb, &opts),
    ];
    let meta = ReportMeta::new(
        KnowledgeBaseStats {
            term_variants: kb.terms.len(),
            term_max_ngram: kb.terms.max_ngram(),
            authority_rows: kb.names.len(),
            authority_verifiable_rows: kb.names.verifiable_count(),
        },
        opts.out_of_scope_categories.clone(),
    );
    let report = build_report(meta, key, description, 260);

    assert_eq!(report.kpi[0].n_rows, 1);
    assert_eq!(report.kpi[0].critical_pass_rate, Some(1.0));
    assert_eq!(report.kpi[1].n_rows, 3);
    assert_eq!(report.kpi_by_category[0].label, "leaf");
    assert_eq!(report.kpi_by_category[0].n_rows, 2);
    assert_eq!(report.description_issues.len(), 1);
    assert_eq!(report.description_issues[0].flags, "NEGATION_CUE");
    assert_eq!(report.term_drift.len(), 1);
    assert_eq!(report.term_drift[0].en_term, "cordate");

    let json = serde_json::to_value(&report).expect("serialize");
    assert_eq!(json["description_rows"][2]["flags"][0], "NEGATION_CUE");
    assert_eq!(json["description_rows"][3]["person"]["status"], "NA");
}
