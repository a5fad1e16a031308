//! Tests for cross-page chain finding, merging and hints

use pagestitch_core::merge::{
    BBox, Cell, Column, DrawingPrimitive, FingerprintGenerator, FragmentIndex, HeaderInfo,
    LineSegment, MergeSettings, PageDrawings, PageInfo, RejectReason, Row, Scorer, TableFragment,
    TableMerger, TextBlock, TextBlockIndex, build_hints, detect_repeated_header_rows, find_chains,
    merge_all_tables,
};

const PAGE_W: f64 = 600.0;
const PAGE_H: f64 = 800.0;
const ROW_H: f64 = 20.0;

const SCENARIO_EDGES: [f64; 6] = [0.05, 0.15, 0.35, 0.70, 0.85, 1.0];

fn px(norm: &[f64]) -> Vec<f64> {
    norm.iter().map(|x| x * PAGE_W).collect()
}

/// Fragment whose columns sit between consecutive `edges`, rows stacked
/// from `top` downwards.
fn fragment(
    id: &str,
    page: u32,
    edges: &[f64],
    top: f64,
    rows: &[&[&str]],
    col_levels: usize,
) -> TableFragment {
    let header: Vec<String> = if col_levels > 0 {
        rows[0].iter().map(|s| s.to_string()).collect()
    } else {
        Vec::new()
    };
    let columns = edges
        .windows(2)
        .enumerate()
        .map(|(i, w)| {
            let path = header.get(i).cloned().into_iter().collect();
            Column::new(i, path).with_bounds(w[0], w[1])
        })
        .collect();
    let rows = rows
        .iter()
        .enumerate()
        .map(|(r, texts)| {
            let y0 = top + ROW_H * r as f64;
            Row::new(
                texts
                    .iter()
                    .zip(edges.windows(2))
                    .map(|(t, w)| Cell::new(*t, Some(BBox::new(w[0], y0, w[1], y0 + ROW_H))))
                    .collect(),
            )
        })
        .collect::<Vec<_>>();
    TableFragment {
        id: id.to_string(),
        page,
        bbox: BBox::new(
            edges[0],
            top,
            *edges.last().unwrap(),
            top + ROW_H * rows.len() as f64,
        ),
        columns,
        rows,
        header_info: HeaderInfo {
            col_levels,
            row_levels: 0,
            header_detected: col_levels > 0,
        },
        method: Some("lines".into()),
    }
}

fn hrule(x0: f64, x1: f64, y: f64) -> DrawingPrimitive {
    DrawingPrimitive::Line(LineSegment::new(x0, y, x1, y, 1.0))
}

fn pages(nums: &[u32]) -> Vec<PageInfo> {
    nums.iter()
        .map(|p| PageInfo::new(*p, PAGE_W, Some(PAGE_H)))
        .collect()
}

const HEADER: &[&str] = &["Date", "Item", "Unit", "Qty", "Amount"];

/// Scenario A fixture: a table that starts near the bottom of page 5 with
/// an open bottom edge and continues at the top of page 6 with an open top
/// edge.
fn scenario_a() -> (Vec<TableFragment>, PageDrawings) {
    let edges = px(&SCENARIO_EDGES);
    let f5 = fragment(
        "frag5",
        5,
        &edges,
        600.0,
        &[
            HEADER,
            &["05-01", "bolt", "pc", "40", "12.00"],
            &["05-02", "nut", "pc", "80", "6.40"],
            &["05-03", "washer", "pc", "80", "2.40"],
        ],
        1,
    );
    let f6 = fragment(
        "frag6",
        6,
        &edges,
        40.0,
        &[
            HEADER,
            &["05-04", "screw", "pc", "25", "5.00"],
            &["05-05", "rivet", "pc", "60", "3.60"],
        ],
        1,
    );
    let (x0, x1) = (edges[0], *edges.last().unwrap());
    let mut drawings = PageDrawings::new();
    // page 5: closed top, rule under header, open bottom
    drawings.insert(5, vec![hrule(x0, x1, 600.0), hrule(x0, x1, 620.0)]);
    // page 6: open top, rule under repeated header, closed bottom
    drawings.insert(6, vec![hrule(x0, x1, 60.0), hrule(x0, x1, 100.0)]);
    (vec![f5, f6], drawings)
}

fn render_chains(chains: &[Vec<String>]) -> String {
    chains
        .iter()
        .map(|c| c.join(" -> "))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_scenario_a_open_borders_form_chain() {
    let (frags, drawings) = scenario_a();
    let settings = MergeSettings::default();

    let generator = FingerprintGenerator::new(&settings);
    let fp5 = generator.generate(&frags[0], PAGE_W, drawings.get(&5).map(Vec::as_slice));
    let fp6 = generator.generate(&frags[1], PAGE_W, drawings.get(&6).map(Vec::as_slice));
    assert!(fp5.has_top_border && !fp5.has_bottom_border);
    assert!(!fp6.has_top_border && fp6.has_bottom_border);

    let candidate = Scorer::new(&settings.scoring).score(&fp5, &fp6);
    assert!(candidate.score >= 0.70, "score {}", candidate.score);
    assert_eq!(candidate.visual_details["continuation"], 1.0);

    let search = find_chains(&frags, &pages(&[5, 6]), &drawings, None, &settings);
    insta::assert_snapshot!(render_chains(&search.chains), @"frag5 -> frag6");
    assert!(search.candidates[0].accepted);
}

#[test]
fn test_scenario_b_paragraph_blocks_chain() {
    let (frags, drawings) = scenario_a();
    let settings = MergeSettings::default();
    let layout = TextBlockIndex::new(vec![TextBlock {
        page: 5,
        top: 700.0,
        bottom: 720.0,
    }]);

    let search = find_chains(&frags, &pages(&[5, 6]), &drawings, Some(&layout), &settings);
    assert!(search.chains.is_empty());
    assert_eq!(search.candidates.len(), 1);
    let record = &search.candidates[0];
    assert!(record.candidate.geometry_score > 0.99);
    assert_eq!(record.rejected, Some(RejectReason::ParagraphInterruption));
    assert!(!record.accepted);
}

#[test]
fn test_paragraph_above_continuation_blocks_chain() {
    let edges = px(&SCENARIO_EDGES);
    let (mut frags, mut drawings) = scenario_a();
    // continuation starts lower on page 6, leaving room for a paragraph
    frags[1] = fragment(
        "frag6",
        6,
        &edges,
        140.0,
        &[HEADER, &["05-04", "screw", "pc", "25", "5.00"]],
        1,
    );
    drawings.insert(6, vec![hrule(edges[0], PAGE_W, 160.0), hrule(edges[0], PAGE_W, 180.0)]);
    let settings = MergeSettings::default();

    let search = find_chains(&frags, &pages(&[5, 6]), &drawings, None, &settings);
    assert_eq!(search.chains.len(), 1);

    let layout = TextBlockIndex::new(vec![TextBlock {
        page: 6,
        top: 90.0,
        bottom: 120.0,
    }]);
    let search = find_chains(&frags, &pages(&[5, 6]), &drawings, Some(&layout), &settings);
    assert!(search.chains.is_empty());
    assert_eq!(
        search.candidates[0].rejected,
        Some(RejectReason::ParagraphInterruption)
    );
}

#[test]
fn test_running_headers_and_footers_do_not_block_chain() {
    let (frags, drawings) = scenario_a();
    let settings = MergeSettings::default();
    let layout = TextBlockIndex::new(vec![
        // page number footer on page 5
        TextBlock {
            page: 5,
            top: 770.0,
            bottom: 780.0,
        },
        // running header on page 6
        TextBlock {
            page: 6,
            top: 10.0,
            bottom: 30.0,
        },
    ]);
    let search = find_chains(&frags, &pages(&[5, 6]), &drawings, Some(&layout), &settings);
    insta::assert_snapshot!(render_chains(&search.chains), @"frag5 -> frag6");

    // without margins the same blocks count as prose
    let no_margins = MergeSettings {
        top_margin: 0.0,
        bottom_margin: 0.0,
        ..MergeSettings::default()
    };
    let search = find_chains(&frags, &pages(&[5, 6]), &drawings, Some(&layout), &no_margins);
    assert!(search.chains.is_empty());
}

#[test]
fn test_scenario_c_clipped_column_hint() {
    let prev_edges = [33.6, 99.0, 200.0, 300.0, 400.0, 560.0];
    let next_edges = [99.0, 200.0, 300.0, 400.0, 560.0];
    let prev = fragment(
        "p2",
        2,
        &prev_edges,
        500.0,
        &[&["a1", "b1", "c1", "d1", "e1"], &["a2", "b2", "c2", "d2", "e2"]],
        0,
    );
    let next = fragment(
        "p3",
        3,
        &next_edges,
        50.0,
        &[&["b3", "c3", "d3", "e3"], &["b4", "c4", "d4", "e4"]],
        0,
    );

    let fragments: FragmentIndex = [prev.clone(), next.clone()]
        .into_iter()
        .map(|f| (f.id.clone(), f))
        .collect();
    let chain = vec!["p2".to_string(), "p3".to_string()];
    let settings = MergeSettings::default();
    let hints = build_hints(
        std::slice::from_ref(&chain),
        &fragments,
        &PageDrawings::new(),
        &settings.border,
    );
    let hint = &hints[&3];
    assert_eq!(hint.expected_cols, 5);
    assert_eq!(hint.vertical_lines.first().copied(), Some(33.6));
    assert_eq!(hint.vertical_lines, prev_edges.to_vec());

    // the same hint comes out of the full pipeline
    let mut drawings = PageDrawings::new();
    drawings.insert(2, vec![hrule(33.6, 560.0, 520.0)]);
    drawings.insert(3, vec![hrule(99.0, 560.0, 70.0)]);
    let page_info = vec![
        PageInfo::new(2, 612.0, Some(792.0)),
        PageInfo::new(3, 612.0, Some(792.0)),
    ];
    let outcome = merge_all_tables(&[prev, next], &page_info, &drawings, None, &settings).unwrap();
    assert_eq!(outcome.diagnostics.chains, vec![chain]);
    assert_eq!(outcome.hints[&3].expected_cols, 5);
    assert_eq!(outcome.hints[&3].vertical_lines[0], 33.6);
    // short continuation rows are padded to the base width
    assert!(outcome.tables[0].rows.iter().all(|r| r.cells.len() == 5));
}

#[test]
fn test_scenario_d_repeated_header_dropped() {
    let (frags, drawings) = scenario_a();
    let settings = MergeSettings::default();
    assert_eq!(
        detect_repeated_header_rows(&frags[0], &frags[1], &settings.header),
        1
    );

    let outcome = merge_all_tables(&frags, &pages(&[5, 6]), &drawings, None, &settings).unwrap();
    assert_eq!(outcome.tables.len(), 1);
    let table = &outcome.tables[0];
    assert_eq!(table.merged_from, vec!["frag5", "frag6"]);
    assert_eq!(table.rows.len(), 4 + 3 - 1);
    let header_rows = table
        .rows
        .iter()
        .filter(|r| r.texts() == HEADER.to_vec())
        .count();
    assert_eq!(header_rows, 1);
    assert_eq!(table.rows[4].texts()[1], "screw");
    assert_eq!(table.method, "lines+cross_page_merge");
    assert_eq!((table.bbox.y0, table.bbox.y1), (40.0, 680.0));
    assert_eq!(table.pages, vec![5, 6]);
}

#[test]
fn test_scenario_e_page_gap_never_scored() {
    let edges = px(&SCENARIO_EDGES);
    let rows: &[&[&str]] = &[HEADER, &["05-01", "bolt", "pc", "40", "12.00"]];
    let a = fragment("p1", 1, &edges, 600.0, rows, 1);
    let b = fragment("p3", 3, &edges, 40.0, rows, 1);
    let settings = MergeSettings::default().with_threshold(0.0);
    let search = find_chains(&[a, b], &pages(&[1, 2, 3]), &PageDrawings::new(), None, &settings);
    assert!(search.candidates.is_empty());
    assert!(search.chains.is_empty());
}

#[test]
fn test_merge_row_count_property() {
    let (frags, drawings) = scenario_a();
    let settings = MergeSettings::default();
    let index: FragmentIndex = frags.iter().map(|f| (f.id.clone(), f.clone())).collect();
    let k = detect_repeated_header_rows(&frags[0], &frags[1], &settings.header);
    let merged = TableMerger::new(&settings)
        .merge(&["frag5".into(), "frag6".into()], &index, &drawings)
        .unwrap();
    assert_eq!(merged.rows.len(), frags[0].rows.len() + frags[1].rows.len() - k);
}

#[test]
fn test_three_page_chain_links_in_any_score_order() {
    let edges = px(&SCENARIO_EDGES);
    // page 1 is shifted slightly so 1->2 scores lower than 2->3
    let shifted: Vec<f64> = edges.iter().map(|x| x - 3.0).collect();
    let rows: &[&[&str]] = &[HEADER, &["05-01", "bolt", "pc", "40", "12.00"]];
    let frags = vec![
        fragment("a", 1, &shifted, 700.0, rows, 1),
        fragment("b", 2, &edges, 40.0, rows, 1),
        fragment("c", 3, &edges, 40.0, rows, 1),
    ];
    let mut settings = MergeSettings::default();
    settings.assume_open_without_drawings = true;
    let search = find_chains(&frags, &pages(&[1, 2, 3]), &PageDrawings::new(), None, &settings);

    let score = |p: &str, n: &str| {
        search
            .candidates
            .iter()
            .find(|r| r.candidate.prev_id == p && r.candidate.next_id == n)
            .map(|r| r.candidate.score)
            .unwrap()
    };
    assert!(score("a", "b") < score("b", "c"));
    insta::assert_snapshot!(render_chains(&search.chains), @"a -> b -> c");
}

#[test]
fn test_chains_do_not_branch() {
    let edges = px(&SCENARIO_EDGES);
    let rows: &[&[&str]] = &[HEADER, &["05-01", "bolt", "pc", "40", "12.00"]];
    // two equally good continuations of the same table on page 2
    let frags = vec![
        fragment("t1", 1, &edges, 600.0, rows, 1),
        fragment("t2-a", 2, &edges, 40.0, rows, 1),
        fragment("t2-b", 2, &edges, 400.0, rows, 1),
        fragment("t3", 3, &edges, 40.0, rows, 1),
    ];
    let mut settings = MergeSettings::default();
    settings.assume_open_without_drawings = true;
    let search = find_chains(&frags, &pages(&[1, 2, 3]), &PageDrawings::new(), None, &settings);

    assert_eq!(search.ambiguous, vec!["t1".to_string()]);
    let mut seen = std::collections::HashSet::new();
    for chain in &search.chains {
        assert!(chain.len() >= 2);
        for id in chain {
            assert!(seen.insert(id.clone()), "{id} appears in two chains");
        }
    }
    let mut prevs = std::collections::HashSet::new();
    let mut nexts = std::collections::HashSet::new();
    for r in search.candidates.iter().filter(|r| r.accepted) {
        assert!(prevs.insert(r.candidate.prev_id.clone()));
        assert!(nexts.insert(r.candidate.next_id.clone()));
    }
    // equal scores resolve by id: t1 continues into t2-a
    assert_eq!(search.chains[0][..2], ["t1".to_string(), "t2-a".to_string()]);
    let consumed = search
        .candidates
        .iter()
        .filter(|r| r.rejected == Some(RejectReason::AlreadyConsumed))
        .count();
    assert!(consumed >= 1);
}

#[test]
fn test_adjacent_pages_only_in_chains() {
    let edges = px(&SCENARIO_EDGES);
    let rows: &[&[&str]] = &[HEADER, &["05-01", "bolt", "pc", "40", "12.00"]];
    let frags: Vec<TableFragment> = [1u32, 2, 4, 5, 6]
        .iter()
        .map(|p| fragment(&format!("t{p}"), *p, &edges, 40.0, rows, 1))
        .collect();
    let mut settings = MergeSettings::default();
    settings.assume_open_without_drawings = true;
    let search = find_chains(
        &frags,
        &pages(&[1, 2, 3, 4, 5, 6]),
        &PageDrawings::new(),
        None,
        &settings,
    );
    let page_of = |id: &str| frags.iter().find(|f| f.id == id).unwrap().page;
    assert_eq!(search.chains.len(), 2);
    for chain in &search.chains {
        for pair in chain.windows(2) {
            assert_eq!(page_of(&pair[1]), page_of(&pair[0]) + 1);
        }
    }
}

#[test]
fn test_scores_bounded() {
    let settings = MergeSettings::default();
    let generator = FingerprintGenerator::new(&settings);
    let scorer = Scorer::new(&settings.scoring);
    let rows: &[&[&str]] = &[&["a", "b", "c"], &["1", "2", "3"]];
    let layouts: Vec<Vec<f64>> = vec![
        vec![0.0, 10.0, 20.0, 600.0],
        vec![30.0, 200.0, 400.0, 570.0],
        vec![300.0, 310.0, 320.0, 330.0],
        vec![-50.0, 100.0, 700.0, 900.0],
    ];
    let frags: Vec<TableFragment> = layouts
        .iter()
        .enumerate()
        .map(|(i, e)| fragment(&format!("f{i}"), 1, e, 100.0, rows, i % 2))
        .collect();
    let drawings = vec![hrule(0.0, 600.0, 100.0), hrule(0.0, 300.0, 140.0)];
    for a in &frags {
        for b in &frags {
            let fa = generator.generate(a, PAGE_W, Some(drawings.as_slice()));
            let fb = generator.generate(b, PAGE_W, None);
            let c = scorer.score(&fa, &fb);
            for v in [c.score, c.geometry_score, c.structure_score, c.visual_score] {
                assert!((0.0..=1.0).contains(&v), "{} vs {}: {v}", a.id, b.id);
            }
        }
    }
}

#[test]
fn test_malformed_fragment_skipped_not_fatal() {
    let (mut frags, drawings) = scenario_a();
    let mut bad = fragment("bad", 6, &px(&SCENARIO_EDGES), 300.0, &[HEADER], 1);
    bad.rows[0].cells.pop();
    frags.push(bad);
    let mut negative = fragment("neg", 6, &px(&SCENARIO_EDGES), 500.0, &[HEADER], 1);
    negative.bbox = BBox::new(100.0, 500.0, 50.0, 520.0);
    frags.push(negative);

    let outcome = merge_all_tables(
        &frags,
        &pages(&[5, 6]),
        &drawings,
        None,
        &MergeSettings::default(),
    )
    .unwrap();
    let skipped: Vec<&str> = outcome
        .diagnostics
        .skipped
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(skipped, vec!["bad", "neg"]);
    assert_eq!(outcome.merged_tables().count(), 1);
    // malformed fragments are passed through untouched
    assert!(outcome.tables.iter().any(|t| t.id == "bad" && !t.is_merged()));
}

#[test]
fn test_missing_drawings_favor_no_merge() {
    let (frags, _) = scenario_a();
    let settings = MergeSettings::default();
    let outcome =
        merge_all_tables(&frags, &pages(&[5, 6]), &PageDrawings::new(), None, &settings).unwrap();
    // closed borders still leave geometry, structure and line width: 0.825
    assert_eq!(outcome.merged_tables().count(), 1);

    let strict = MergeSettings::default().with_threshold(0.9);
    let outcome =
        merge_all_tables(&frags, &pages(&[5, 6]), &PageDrawings::new(), None, &strict).unwrap();
    assert_eq!(outcome.merged_tables().count(), 0);
    assert_eq!(outcome.tables.len(), 2);

    let (_, drawings) = scenario_a();
    let outcome = merge_all_tables(&frags, &pages(&[5, 6]), &drawings, None, &strict).unwrap();
    assert_eq!(outcome.merged_tables().count(), 1);
}

#[test]
fn test_invalid_settings_fail() {
    let (frags, drawings) = scenario_a();
    let mut settings = MergeSettings::default();
    settings.scoring.visual_split = [0.9, 0.9];
    assert!(merge_all_tables(&frags, &pages(&[5, 6]), &drawings, None, &settings).is_err());
}

#[test]
fn test_outcome_serializes_provenance() {
    let (frags, drawings) = scenario_a();
    let outcome = merge_all_tables(
        &frags,
        &pages(&[5, 6]),
        &drawings,
        None,
        &MergeSettings::default(),
    )
    .unwrap();
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["tables"][0]["merged_from"][1], "frag6");
    assert_eq!(json["tables"][0]["method"], "lines+cross_page_merge");
    assert_eq!(json["tables"][0]["bbox"][1], 40.0);
    assert_eq!(json["diagnostics"]["candidates"][0]["accepted"], true);
}

#[test]
fn test_duplicate_ids_are_passed_through() {
    let edges = px(&SCENARIO_EDGES);
    let rows: &[&[&str]] = &[HEADER, &["05-01", "bolt", "pc", "40", "12.00"]];
    let frags = vec![
        fragment("t", 1, &edges, 100.0, rows, 1),
        fragment("t", 3, &edges, 100.0, rows, 1),
    ];
    let outcome = merge_all_tables(
        &frags,
        &pages(&[1, 2, 3]),
        &PageDrawings::new(),
        None,
        &MergeSettings::default(),
    )
    .unwrap();

    let pages_out: Vec<Vec<u32>> = outcome.tables.iter().map(|t| t.pages.clone()).collect();
    assert_eq!(pages_out, vec![vec![1], vec![3]]);
    assert_eq!(outcome.diagnostics.skipped.len(), 1);
    assert_eq!(outcome.diagnostics.skipped[0].id, "t");
}

#[test]
fn test_malformed_first_duplicate_does_not_shadow_valid_one() {
    let (mut frags, drawings) = scenario_a();
    let mut bad = fragment("frag5", 5, &px(&SCENARIO_EDGES), 300.0, &[HEADER], 1);
    bad.rows[0].cells.pop();
    frags.insert(0, bad);

    let outcome = merge_all_tables(
        &frags,
        &pages(&[5, 6]),
        &drawings,
        None,
        &MergeSettings::default(),
    )
    .unwrap();
    let merged: Vec<_> = outcome.merged_tables().collect();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].rows.len(), 4 + 3 - 1);
    assert_eq!(outcome.tables.len(), 2);
}

#[test]
fn test_last_page_number_does_not_overflow() {
    let edges = px(&SCENARIO_EDGES);
    let rows: &[&[&str]] = &[HEADER, &["05-01", "bolt", "pc", "40", "12.00"]];
    let frags = vec![
        fragment("a", u32::MAX - 1, &edges, 600.0, rows, 1),
        fragment("b", u32::MAX, &edges, 40.0, rows, 1),
    ];
    let settings = MergeSettings {
        assume_open_without_drawings: true,
        ..MergeSettings::default()
    };
    let search = find_chains(
        &frags,
        &pages(&[u32::MAX - 1, u32::MAX]),
        &PageDrawings::new(),
        None,
        &settings,
    );
    insta::assert_snapshot!(render_chains(&search.chains), @"a -> b");
}
