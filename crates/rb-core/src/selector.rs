//! CSS selectors for page nodes
//!
//! Selector lists are parsed by the `selectors` crate with scraper's HTML
//! selector implementation. Any node type implementing `selectors::Element`
//! over that implementation can be matched; [`MemoryNode`] does, and hosts
//! with a native engine hand [`Selector::source`] to the platform instead.
//!
//! [`MemoryNode`]: crate::memory::MemoryNode

use std::fmt;

use cssparser::ParserInput;
use scraper::selector::{Parser as HtmlParser, Simple};
use selectors::matching::{
    self, MatchingContext, MatchingForInvalidation, MatchingMode, NeedsSelectorFlags, QuirksMode, SelectorCaches,
};
use selectors::parser::{ParseRelative, SelectorList};

/// Error type for selector parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,
    #[error("Invalid selector '{selector}' at column {column}: {reason}")]
    Invalid {
        selector: String,
        column: u32,
        reason: String,
    },
}

/// A parsed selector list.
///
/// The source text is kept so hosts with a native selector engine
/// can hand it straight to the platform.
#[derive(Clone)]
pub struct Selector {
    source: String,
    list: SelectorList<Simple>,
}

impl Selector {
    /// Parse a selector list.
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(SelectorError::Empty);
        }

        let mut input = ParserInput::new(source);
        let mut parser = cssparser::Parser::new(&mut input);
        let list = SelectorList::parse(&HtmlParser, &mut parser, ParseRelative::No).map_err(|e| {
            SelectorError::Invalid {
                selector: source.to_string(),
                column: e.location.column,
                reason: format!("{:?}", e.kind),
            }
        })?;

        Ok(Self {
            source: source.to_string(),
            list,
        })
    }

    /// The selector text as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Does `element` match any alternative of this list?
    pub fn matches_element<E>(&self, element: &E) -> bool
    where
        E: selectors::Element<Impl = Simple>,
    {
        let mut caches = SelectorCaches::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut caches,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            MatchingForInvalidation::No,
        );
        self.list
            .slice()
            .iter()
            .any(|selector| matching::matches_selector(selector, 0, None, element, &mut context))
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Selector {}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.source).finish()
    }
}

/// Compile a selector that is part of the program.
///
/// Panics on a malformed source; every built-in selector is covered by
/// unit tests.
pub(crate) fn builtin(source: &str) -> Selector {
    Selector::parse(source).unwrap_or_else(|e| panic!("built-in selector '{}' is invalid: {}", source, e))
}

/// [`builtin`] over an ordered table.
pub(crate) fn compile_table(sources: &[&str]) -> Vec<Selector> {
    sources.iter().copied().map(builtin).collect()
}
