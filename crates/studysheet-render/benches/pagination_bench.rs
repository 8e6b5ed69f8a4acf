use std::hint::black_box;
use std::time::Instant;

use studysheet::{parse_document, BodyNode, CoverSheet, FlowBlock, ListItem, ListNode, SplitMode};
use studysheet_render::{FlowMetrics, PaginationConfig, Paginator};

const FIXTURE: &str = "tests/fixtures/manual.xhtml";
const READING_SCALE: f32 = 1.15;

#[derive(Clone, Debug)]
struct CaseResult {
    fixture: String,
    case: String,
    iterations: usize,
    min_ns: u128,
    median_ns: u128,
    mean_ns: u128,
    max_ns: u128,
    pages: usize,
}

fn percentile(sorted: &[u128], percentile: f64) -> u128 {
    let idx = ((sorted.len().saturating_sub(1) as f64) * percentile).round() as usize;
    sorted[idx]
}

fn run_case<F>(
    fixture: &str,
    case: &str,
    warmup_iters: usize,
    measure_iters: usize,
    mut op: F,
) -> CaseResult
where
    F: FnMut() -> usize,
{
    for _ in 0..warmup_iters {
        black_box(op());
    }

    let mut samples = Vec::with_capacity(measure_iters);
    let mut pages = 0;
    for _ in 0..measure_iters {
        let start = Instant::now();
        pages = black_box(op());
        samples.push(start.elapsed().as_nanos());
    }
    samples.sort_unstable();
    let sum: u128 = samples.iter().copied().sum();

    CaseResult {
        fixture: fixture.to_string(),
        case: case.to_string(),
        iterations: measure_iters,
        min_ns: samples[0],
        median_ns: percentile(&samples, 0.5),
        mean_ns: sum / samples.len() as u128,
        max_ns: samples[samples.len() - 1],
        pages,
    }
}

/// Synthetic manual: alternating prose, long numbered lists and note blocks.
fn synthetic_flow(blocks: usize) -> Vec<FlowBlock> {
    (0..blocks)
        .map(|idx| {
            let id = format!("s{}", idx);
            match idx % 3 {
                0 => {
                    let text = (0..180 + (idx * 37) % 400)
                        .map(|w| format!("word{}", w))
                        .collect::<Vec<_>>()
                        .join(" ");
                    FlowBlock::new()
                        .with_id(id)
                        .with_title(format!("Reading {}", idx))
                        .with_node(BodyNode::paragraph(text))
                }
                1 => FlowBlock::new()
                    .with_id(id)
                    .with_split(SplitMode::List)
                    .with_title(format!("Questions {}", idx))
                    .with_node(BodyNode::List(ListNode {
                        ordered: true,
                        start: None,
                        items: (0..6 + idx % 20)
                            .map(|i| ListItem::new(format!("Question {} on the passage", i + 1)))
                            .collect(),
                    })),
                _ => (0..4).fold(FlowBlock::new().with_id(id), |block, n| {
                    block.with_node(BodyNode::paragraph(format!(
                        "Note {} for block {} with a short reflection prompt.",
                        n, idx
                    )))
                }),
            }
        })
        .collect()
}

fn main() {
    let quick = std::env::args().any(|arg| arg == "--quick");
    let warmup_iters = if quick { 1 } else { 3 };
    let measure_iters = if quick { 3 } else { 20 };

    println!("# studysheet pagination benchmark");
    println!(
        "# mode={} warmup_iters={} measure_iters={}",
        if quick { "quick" } else { "full" },
        warmup_iters,
        measure_iters
    );
    println!("fixture,case,iterations,min_ns,median_ns,mean_ns,max_ns,pages");

    let markup =
        std::fs::read(FIXTURE).unwrap_or_else(|e| panic!("read {}: {}", FIXTURE, e));
    let paginator = Paginator::new(PaginationConfig::default());
    let metrics = FlowMetrics::default();
    let cover = CoverSheet::default();

    let mut results = Vec::new();
    results.push(run_case(
        "manual",
        "parse_markup",
        warmup_iters,
        measure_iters,
        || {
            parse_document(&markup)
                .unwrap_or_else(|e| panic!("parse failed: {}", e))
                .flow
                .len()
        },
    ));
    results.push(run_case(
        "manual",
        "parse_and_paginate",
        warmup_iters,
        measure_iters,
        || {
            let doc = parse_document(&markup).unwrap_or_else(|e| panic!("parse failed: {}", e));
            paginator
                .paginate(doc.flow, doc.cover.as_ref(), &metrics, 1.0)
                .page_count()
        },
    ));

    for blocks in [30usize, 120, 480] {
        let flow = synthetic_flow(blocks);
        let fixture = format!("synthetic-{}", blocks);
        results.push(run_case(
            &fixture,
            "paginate_print",
            warmup_iters,
            measure_iters,
            || {
                paginator
                    .paginate(flow.clone(), Some(&cover), &metrics, 1.0)
                    .page_count()
            },
        ));
        results.push(run_case(
            &fixture,
            "paginate_reading_scale",
            warmup_iters,
            measure_iters,
            || {
                paginator
                    .paginate(flow.clone(), Some(&cover), &metrics, READING_SCALE)
                    .page_count()
            },
        ));
    }

    for result in &results {
        println!(
            "{},{},{},{},{},{},{},{}",
            result.fixture,
            result.case,
            result.iterations,
            result.min_ns,
            result.median_ns,
            result.mean_ns,
            result.max_ns,
            result.pages
        );
    }
}
