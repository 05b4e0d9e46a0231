//! Page fixtures: a location plus an element tree.
//!
//! JSON fixtures carry either a declarative `document` tree or an `html`
//! string. A saved `.html` page loads directly with the default location.

use std::fs;
use std::path::Path;

use rb_core::{MemoryHost, MemoryNode, NodeSpec, PageLocation};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PageFixture {
    #[serde(default = "default_hostname")]
    pub hostname: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(flatten)]
    pub source: PageSource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSource {
    Document(NodeSpec),
    Html(String),
}

fn default_hostname() -> String {
    rb_core::inject::TARGET_HOST.to_string()
}

fn default_path() -> String {
    "/".to_string()
}

impl PageFixture {
    pub fn parse(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| format!("Invalid page fixture: {}", e))
    }

    /// A saved page served from the default location.
    pub fn from_html(html: String) -> Self {
        Self {
            hostname: default_hostname(),
            path: default_path(),
            source: PageSource::Html(html),
        }
    }

    pub fn load(path: &str) -> Result<Self, String> {
        let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
        let is_html = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"));
        if is_html {
            Ok(Self::from_html(text))
        } else {
            Self::parse(&text)
        }
    }

    pub fn build_document(&self) -> MemoryNode {
        match &self.source {
            PageSource::Document(spec) => MemoryNode::from_spec(spec),
            PageSource::Html(html) => MemoryNode::from_html(html),
        }
    }

    pub fn location(&self, path: Option<&str>) -> PageLocation {
        PageLocation::new(&self.hostname, path.unwrap_or(&self.path))
    }

    /// Build the document and a host serving it. `path` overrides the
    /// fixture's own page path.
    pub fn into_host(self, path: Option<&str>) -> (MemoryHost, MemoryNode) {
        let document = self.build_document();
        (MemoryHost::new(document.clone(), self.location(path)), document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rb_core::{Host, PageNode, Selector};

    #[test]
    fn test_fixture_defaults() {
        let fixture = PageFixture::parse(r#"{"document": {"tag": "html"}}"#).unwrap();
        assert_eq!(fixture.hostname, "www.youtube.com");
        assert_eq!(fixture.path, "/");

        let (host, document) = fixture.into_host(Some("/results"));
        assert_eq!(host.location().path, "/results");
        assert_eq!(document.subtree_len(), 1);
    }

    #[test]
    fn test_bundled_home_fixture() {
        let fixture = PageFixture::parse(include_str!("../fixtures/home.json")).unwrap();
        let (_, document) = fixture.into_host(None);
        assert!(document.subtree_len() > 10);
    }

    #[test]
    fn test_fixture_requires_document() {
        assert!(PageFixture::parse(r#"{"path": "/"}"#).is_err());
    }

    #[test]
    fn test_html_fixture() {
        let fixture = PageFixture::parse(
            r#"{"path": "/results", "html": "<ytd-video-renderer><a id='video-title'>Rust</a></ytd-video-renderer>"}"#,
        )
        .unwrap();
        let (host, document) = fixture.into_host(None);
        assert_eq!(host.location().path, "/results");
        let item = document.query(&Selector::parse("body > ytd-video-renderer").unwrap()).unwrap();
        assert_eq!(item.text_content(), "Rust");
    }

    #[test]
    fn test_load_saved_html_page() {
        let path = std::env::temp_dir().join(format!("rb-cli-fixture-{}.html", std::process::id()));
        fs::write(&path, "<html><body><ytd-rich-item-renderer></ytd-rich-item-renderer></body></html>").unwrap();

        let fixture = PageFixture::load(&path.to_string_lossy()).unwrap();
        assert!(matches!(fixture.source, PageSource::Html(_)));
        assert_eq!(fixture.location(None), PageLocation::new("www.youtube.com", "/"));
        assert_eq!(fixture.build_document().query_all(&Selector::parse("ytd-rich-item-renderer").unwrap()).len(), 1);
        let _ = fs::remove_file(&path);
    }
}
