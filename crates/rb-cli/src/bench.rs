use std::cmp::Ordering;
use std::time::Instant;

use rb_core::extract::extract;
use rb_core::filter::decide;
use rb_core::{Config, FilterEngine, MemoryHost, MemoryNode, PageLocation, Settings};
use serde_json::json;

use crate::fixture::PageFixture;

pub struct BenchOptions {
    pub page_path: Option<String>,
    pub items: usize,
    pub iterations: usize,
    pub seed: u32,
}

pub const DEFAULT_SEED: u32 = 0xc0ffee;

pub fn run_bench(opts: BenchOptions) -> Result<(), String> {
    println!("============================================================");
    println!("RotBlock Benchmark");
    println!("============================================================");

    let (document, location) = match &opts.page_path {
        Some(path) => {
            let fixture = PageFixture::load(path)?;
            (fixture.build_document(), fixture.location(None))
        }
        None => {
            println!(
                "Generating synthetic page: items={}, seed={}",
                opts.items, opts.seed
            );
            (generate_page(opts.items, opts.seed), PageLocation::new("www.youtube.com", "/"))
        }
    };
    println!("Document size: {} elements", document.subtree_len());
    println!();

    let mut host = MemoryHost::new(document, location);
    let mut engine: FilterEngine<MemoryNode> = FilterEngine::default();
    engine.start(&mut host).map_err(|e| e.to_string())?;
    let items = host.watched().to_vec();
    if items.is_empty() {
        return Err("Page has no listing items".to_string());
    }

    println!("Warmup...");
    for _ in 0..10 {
        rescan_and_evaluate(&mut engine, &mut host, &items);
    }

    println!("------------------------------------------------------------");
    println!("Benchmark: extract + decide ({} items, {} iterations)", items.len(), opts.iterations);
    println!("------------------------------------------------------------");
    let config = Config::default();
    let decide_result = run_timed(opts.iterations, items.len(), || {
        let mut hidden = 0usize;
        for item in &items {
            if decide(&extract(item), &config).is_hidden() {
                hidden += 1;
            }
        }
        hidden
    });
    println!("{}", format_result("Extract + decide", &decide_result));

    println!("------------------------------------------------------------");
    println!("Benchmark: full rescan + evaluation ({} iterations)", opts.iterations);
    println!("------------------------------------------------------------");
    let rescan_result = run_timed(opts.iterations, items.len(), || {
        rescan_and_evaluate(&mut engine, &mut host, &items)
    });
    println!("{}", format_result("Full rescan", &rescan_result));

    println!("============================================================");
    println!("Summary");
    println!("============================================================");
    println!("Target: <16ms per full rescan (one frame)");
    println!("Achieved: {:.2}ms P99", rescan_result.p99_us / 1000.0);
    println!("Status: {}", if rescan_result.p99_us < 16_000.0 { "✓ PASS" } else { "✗ FAIL" });

    Ok(())
}

/// One settings-change epoch: everything is revealed, re-registered and
/// evaluated again. Returns how many items ended up hidden.
fn rescan_and_evaluate(engine: &mut FilterEngine<MemoryNode>, host: &mut MemoryHost, items: &[MemoryNode]) -> usize {
    let before = engine.stats().items_hidden;
    engine.apply_settings(host, &Settings::default());
    engine.on_visible(host, items.to_vec());
    (engine.stats().items_hidden - before) as usize
}

struct BenchResult {
    iterations: usize,
    items: usize,
    total_ms: f64,
    avg_us: f64,
    p50_us: f64,
    p95_us: f64,
    p99_us: f64,
    hidden_pct: f64,
}

fn run_timed(iterations: usize, items: usize, mut f: impl FnMut() -> usize) -> BenchResult {
    let iterations = iterations.max(1);
    let mut samples_us = Vec::with_capacity(iterations);
    let mut hidden = 0usize;

    for _ in 0..iterations {
        let start = Instant::now();
        hidden += f();
        samples_us.push(start.elapsed().as_secs_f64() * 1_000_000.0);
    }

    samples_us.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let total_us: f64 = samples_us.iter().sum();
    let evaluated = iterations * items;

    BenchResult {
        iterations,
        items,
        total_ms: total_us / 1000.0,
        avg_us: total_us / iterations as f64,
        p50_us: percentile(&samples_us, 0.50),
        p95_us: percentile(&samples_us, 0.95),
        p99_us: percentile(&samples_us, 0.99),
        hidden_pct: if evaluated > 0 { hidden as f64 / evaluated as f64 * 100.0 } else { 0.0 },
    }
}

fn format_result(name: &str, result: &BenchResult) -> String {
    format!(
        "{}:\n  Iterations: {}\n  Items:      {}\n  Total time: {:.2}ms\n  Avg:        {:.2}μs\n  P50:        {:.2}μs\n  P95:        {:.2}μs\n  P99:        {:.2}μs\n  Per item:   {:.3}μs\n  Hidden:     {:.1}%",
        name,
        result.iterations,
        result.items,
        result.total_ms,
        result.avg_us,
        result.p50_us,
        result.p95_us,
        result.p99_us,
        if result.items > 0 { result.avg_us / result.items as f64 } else { 0.0 },
        result.hidden_pct,
    )
}

fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let idx = ((values.len() as f64) * p).ceil() as usize;
    let idx = idx.saturating_sub(1).min(values.len() - 1);
    values[idx]
}

// =============================================================================
// Synthetic pages
// =============================================================================

fn create_rng(seed: u32) -> impl FnMut() -> f64 {
    let mut state = seed;
    move || {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        (state as f64) / (u32::MAX as f64)
    }
}

fn rand_int(rand: &mut impl FnMut() -> f64, min: usize, max: usize) -> usize {
    min + ((rand() * (max - min + 1) as f64).floor() as usize).min(max - min)
}

fn view_text(rand: &mut impl FnMut() -> f64) -> String {
    match rand_int(rand, 0, 4) {
        0 => format!("{} views", rand_int(rand, 0, 9_999)),
        1 => format!("{}K views", rand_int(rand, 10, 999)),
        2 => format!("{}.{}M views", rand_int(rand, 1, 99), rand_int(rand, 0, 9)),
        3 => format!("{} watching", rand_int(rand, 1, 50_000)),
        _ => format!("{},{:03} views", rand_int(rand, 1, 999), rand_int(rand, 0, 999)),
    }
}

fn duration_text(rand: &mut impl FnMut() -> f64) -> String {
    match rand_int(rand, 0, 9) {
        0 => "LIVE".to_string(),
        1..=2 => format!("0:{:02}", rand_int(rand, 5, 59)),
        3 => format!("{}:{:02}:{:02}", rand_int(rand, 1, 3), rand_int(rand, 0, 59), rand_int(rand, 0, 59)),
        _ => format!("{}:{:02}", rand_int(rand, 1, 59), rand_int(rand, 0, 59)),
    }
}

const TITLE_WORDS: &[&str] = &[
    "rust", "compiler", "reaction", "tutorial", "async", "prank", "review", "memory", "unboxing", "vlog",
];

/// A home-feed-shaped page with `items` listing items.
pub fn generate_page(items: usize, seed: u32) -> MemoryNode {
    let mut rand = create_rng(seed);
    let contents = MemoryNode::element("div").with_attr("id", "contents");

    for i in 0..items {
        let title: Vec<&str> = (0..4).map(|_| TITLE_WORDS[rand_int(&mut rand, 0, TITLE_WORDS.len() - 1)]).collect();
        let item = MemoryNode::element("ytd-rich-item-renderer")
            .with_height(320.0)
            .with_data(json!({"viewCountText": {"simpleText": view_text(&mut rand)}}))
            .with_child(
                MemoryNode::element("yt-formatted-string")
                    .with_attr("id", "video-title")
                    .with_text(&title.join(" ")),
            )
            .with_child(
                MemoryNode::element("ytd-thumbnail-overlay-time-status-renderer")
                    .with_child(MemoryNode::element("span").with_text(&duration_text(&mut rand))),
            );
        if i % 25 == 0 {
            item.append(&MemoryNode::element("a").with_attr("href", &format!("/shorts/s{}", i)));
        }
        contents.append(&item);
    }

    MemoryNode::element("html").with_child(
        MemoryNode::element("ytd-page-manager")
            .with_child(MemoryNode::element("ytd-rich-grid-renderer").with_child(contents)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb_core::{PageNode, Selector};

    #[test]
    fn test_generated_page_is_deterministic() {
        let items = Selector::parse("ytd-rich-item-renderer").unwrap();
        let a = generate_page(40, DEFAULT_SEED);
        let b = generate_page(40, DEFAULT_SEED);
        assert_eq!(a.query_all(&items).len(), 40);
        assert_eq!(a.text_content(), b.text_content());
    }

    #[test]
    fn test_percentile() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.50), 2.0);
        assert_eq!(percentile(&values, 0.99), 4.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }
}
