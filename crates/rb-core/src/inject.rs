//! Background injection policy
//!
//! The content engine is installed into a tab once the tab finishes loading a
//! target-site address. A failed injection is retried by reloading the tab,
//! at most once; if that fails too the page simply stays unfiltered.

use log::{error, info};

/// Hostname the content engine activates on.
pub const TARGET_HOST: &str = "www.youtube.com";
/// Address fragment that makes a tab eligible for injection.
pub const TARGET_SITE: &str = "youtube.com";

const STATUS_COMPLETE: &str = "complete";

/// A tab lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabUpdate<'a> {
    pub tab_id: i32,
    pub status: Option<&'a str>,
    pub url: Option<&'a str>,
}

/// Browser tab operations the background side needs. Both complete when
/// the browser reports the outcome.
#[allow(async_fn_in_trait)]
pub trait TabControl {
    async fn inject(&mut self, tab_id: i32) -> Result<(), String>;

    async fn reload(&mut self, tab_id: i32) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionOutcome {
    /// Not a finished load of a target page
    Skipped,
    Injected,
    /// Injection failed; the tab was reloaded instead
    Reloaded,
    /// Injection and reload both failed
    Failed,
}

impl InjectionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Injected => "injected",
            Self::Reloaded => "reloaded",
            Self::Failed => "failed",
        }
    }
}

pub fn should_inject(update: &TabUpdate<'_>) -> bool {
    update.status == Some(STATUS_COMPLETE) && update.url.is_some_and(|url| url.contains(TARGET_SITE))
}

/// Is `hostname` a page the content engine runs on?
pub fn is_target_host(hostname: &str) -> bool {
    hostname == TARGET_HOST
}

/// Inject into a finished target page load, reloading the tab once if the
/// injection fails.
pub async fn handle_tab_update<T: TabControl>(tabs: &mut T, update: &TabUpdate<'_>) -> InjectionOutcome {
    if !should_inject(update) {
        return InjectionOutcome::Skipped;
    }

    info!("Target page loaded in tab {}, injecting", update.tab_id);
    let Err(e) = tabs.inject(update.tab_id).await else {
        return InjectionOutcome::Injected;
    };

    error!("Failed to inject into tab {}: {}", update.tab_id, e);
    match tabs.reload(update.tab_id).await {
        Ok(()) => InjectionOutcome::Reloaded,
        Err(e) => {
            error!("Failed to reload tab {}: {}", update.tab_id, e);
            InjectionOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[derive(Default)]
    struct FakeTabs {
        inject_fails: bool,
        reload_fails: bool,
        injected: Vec<i32>,
        reloaded: Vec<i32>,
    }

    impl TabControl for FakeTabs {
        async fn inject(&mut self, tab_id: i32) -> Result<(), String> {
            self.injected.push(tab_id);
            if self.inject_fails {
                Err("cannot access contents of the page".to_string())
            } else {
                Ok(())
            }
        }

        async fn reload(&mut self, tab_id: i32) -> Result<(), String> {
            self.reloaded.push(tab_id);
            if self.reload_fails {
                Err("no tab with id".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn complete(url: &str) -> TabUpdate<'_> {
        TabUpdate {
            tab_id: 7,
            status: Some("complete"),
            url: Some(url),
        }
    }

    #[test]
    fn test_should_inject() {
        assert!(should_inject(&complete("https://www.youtube.com/")));
        assert!(should_inject(&complete("https://m.youtube.com/watch?v=1")));
        assert!(!should_inject(&complete("https://example.com/")));
        assert!(!should_inject(&TabUpdate { status: Some("loading"), ..complete("https://www.youtube.com/") }));
        assert!(!should_inject(&TabUpdate { url: None, ..complete("https://www.youtube.com/") }));
    }

    #[test]
    fn test_target_host() {
        assert!(is_target_host("www.youtube.com"));
        assert!(!is_target_host("m.youtube.com"));
    }

    #[test]
    fn test_injection_outcomes() {
        let mut tabs = FakeTabs::default();
        assert_eq!(block_on(handle_tab_update(&mut tabs, &complete("https://example.com"))), InjectionOutcome::Skipped);
        assert!(tabs.injected.is_empty());

        assert_eq!(block_on(handle_tab_update(&mut tabs, &complete("https://www.youtube.com"))), InjectionOutcome::Injected);
        assert!(tabs.reloaded.is_empty());

        let mut failing = FakeTabs { inject_fails: true, ..FakeTabs::default() };
        assert_eq!(block_on(handle_tab_update(&mut failing, &complete("https://www.youtube.com"))), InjectionOutcome::Reloaded);
        assert_eq!(failing.reloaded, vec![7]);

        let mut broken = FakeTabs { inject_fails: true, reload_fails: true, ..FakeTabs::default() };
        assert_eq!(block_on(handle_tab_update(&mut broken, &complete("https://www.youtube.com"))), InjectionOutcome::Failed);
        // At most one retry.
        assert_eq!(broken.injected.len(), 1);
        assert_eq!(broken.reloaded.len(), 1);
        assert_eq!(InjectionOutcome::Failed.as_str(), "failed");
    }
}
