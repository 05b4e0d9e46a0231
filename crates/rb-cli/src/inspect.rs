//! Run the engine over a page fixture and report what it would hide.

use rb_core::extract::extract;
use rb_core::filter::decide;
use rb_core::visibility::is_hidden;
use rb_core::{Config, Decision, FilterEngine, Host, MemoryNode, PageNode, Selector, Settings};

use crate::fixture::PageFixture;

pub struct InspectOptions {
    pub page_path: String,
    pub url_path: Option<String>,
    pub settings: Settings,
    pub json: bool,
}

struct ItemReport {
    title: String,
    views: Option<u64>,
    duration: Option<u32>,
    decision: Decision,
    hidden: bool,
}

pub fn run_inspect(opts: InspectOptions) -> Result<(), String> {
    let fixture = PageFixture::load(&opts.page_path)?;
    let (mut host, document) = fixture.into_host(opts.url_path.as_deref());

    let mut engine: FilterEngine<MemoryNode> = FilterEngine::new(Config::from(&opts.settings));
    engine.start(&mut host).map_err(|e| e.to_string())?;

    // Everything is in view.
    let registered = host.watched().to_vec();
    engine.on_visible(&mut host, registered.clone());

    let config = engine.config();
    let items: Vec<ItemReport> = registered
        .iter()
        .map(|item| {
            let meta = extract(item);
            ItemReport {
                decision: decide(&meta, &config),
                hidden: is_hidden(item) || has_hidden_ancestor(item),
                title: meta.title_lower,
                views: meta.view_count,
                duration: meta.duration_secs,
            }
        })
        .collect();

    let hidden_selector = Selector::parse(rb_core::engine::HIDDEN_NODES).map_err(|e| e.to_string())?;
    let hidden_nodes = document.query_all(&hidden_selector);
    let stats = engine.stats();

    if opts.json {
        let report = serde_json::json!({
            "page": host.location().path,
            "pageKind": format!("{:?}", engine.page_kind()),
            "items": items.iter().map(|item| serde_json::json!({
                "title": item.title,
                "views": item.views,
                "durationSecs": item.duration,
                "hidden": item.hidden,
                "reason": item.decision.reason().map(|r| format!("{:?}", r)),
            })).collect::<Vec<_>>(),
            "hiddenNodes": hidden_nodes.len(),
            "itemsHidden": stats.items_hidden,
        });
        let text = serde_json::to_string_pretty(&report).map_err(|e| format!("Failed to encode report: {}", e))?;
        println!("{}", text);
        return Ok(());
    }

    println!("Page: {} ({:?})", host.location().path, engine.page_kind());
    println!("  Items:        {}", items.len());
    println!("  Hidden items: {}", stats.items_hidden);
    println!("  Hidden nodes: {}", hidden_nodes.len());
    println!();
    for item in &items {
        let marker = if item.hidden { "HIDE" } else { "show" };
        let reason = item
            .decision
            .reason()
            .map(|r| format!(" ({:?})", r))
            .unwrap_or_default();
        println!(
            "  [{}] {:<48} views={:<10} duration={}{}",
            marker,
            truncate(&item.title, 48),
            item.views.map_or_else(|| "-".to_string(), |v| v.to_string()),
            item.duration.map_or_else(|| "-".to_string(), format_duration),
            reason,
        );
    }

    Ok(())
}

fn has_hidden_ancestor(node: &MemoryNode) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        if is_hidden(&parent) {
            return true;
        }
        current = parent.parent();
    }
    false
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn format_duration(secs: u32) -> String {
    if secs >= 3600 {
        format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
    } else {
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45), "0:45");
        assert_eq!(format_duration(754), "12:34");
        assert_eq!(format_duration(3725), "1:02:05");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a considerably longer title", 10), "a consi...");
    }

    #[test]
    fn test_hidden_ancestor() {
        let shelf = MemoryNode::element("ytd-rich-shelf-renderer").with_attr("class", "rotblock-hidden");
        let item = MemoryNode::element("ytd-rich-item-renderer");
        shelf.append(&item);
        assert!(has_hidden_ancestor(&item));
        assert!(!has_hidden_ancestor(&shelf));
    }
}
