//! Chromium-backed session using chromiumoxide.
//!
//! Every DOM interaction is a JavaScript evaluation against the live page;
//! user-provided fragments (selectors, labels, typed characters) are
//! escaped before injection into script literals. Structural queries go
//! through `scraper` over the rendered HTML instead of per-node JS round
//! trips.

use super::{BrowserSession, ClickOutcome, Locate, NodeSnapshot, Target};
use crate::error::SessionError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use rand::seq::SliceRandom;
use scraper::{Html, Selector};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use url::Url;

/// Hard ceiling for a single page load.
const NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// How often bounded waits re-check the page.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Desktop user agents sampled at launch so consecutive runs differ.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

/// Masks `navigator.webdriver` the way a stock browser reports it.
const WEBDRIVER_MASK_JS: &str =
    "(() => { Object.defineProperty(navigator, 'webdriver', { get: () => undefined }); return true; })()";

/// Chrome for Testing binary, relative to an unpacked platform directory.
const CFT_MAC_BINARY: &str =
    "Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing";

/// Find the Chromium binary: explicit env override, then the managed
/// install under `~/.prospector/chromium`, then the system.
pub fn find_chromium() -> Option<PathBuf> {
    std::env::var_os("PROSPECTOR_CHROMIUM_PATH")
        .map(PathBuf::from)
        .filter(|p| p.exists())
        .or_else(managed_install)
        .or_else(|| {
            ["google-chrome", "chromium", "chromium-browser"]
                .iter()
                .find_map(|name| which::which(name).ok())
        })
        .or_else(system_install)
}

fn managed_install() -> Option<PathBuf> {
    let root = dirs::home_dir()?.join(".prospector").join("chromium");
    let mut candidates = vec![root.join("chrome")];
    if cfg!(target_os = "macos") {
        candidates.extend(
            ["chrome-mac-arm64", "chrome-mac-x64"]
                .iter()
                .map(|platform| root.join(platform).join(CFT_MAC_BINARY)),
        );
    } else {
        candidates.push(root.join("chrome-linux64").join("chrome"));
    }
    candidates.into_iter().find(|p| p.exists())
}

fn system_install() -> Option<PathBuf> {
    cfg!(target_os = "macos")
        .then(|| PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"))
        .filter(|p| p.exists())
}

/// A live Chromium tab implementing the session capability layer.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    /// When set, scroll/height act on this container instead of the body.
    scroll_root: Option<String>,
}

impl ChromiumSession {
    /// Launch Chromium with the stealth profile and open a blank tab.
    pub async fn launch(headless: bool) -> Result<Self, SessionError> {
        let chrome_path = find_chromium().ok_or_else(|| {
            SessionError::Launch(
                "Chromium not found. Set PROSPECTOR_CHROMIUM_PATH or install google-chrome."
                    .to_string(),
            )
        })?;

        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let mut config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--window-size=1920,1080")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={user_agent}"));
        if headless {
            config = config.arg("--headless=new").arg("--disable-gpu");
        } else {
            config = config.with_head();
        }
        let config = config
            .build()
            .map_err(|e| SessionError::Launch(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Launch(format!("failed to launch Chromium: {e}")))?;

        // Drain CDP events for the lifetime of the browser.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::Launch(format!("failed to open tab: {e}")))?;

        tracing::info!(user_agent, headless, "browser session launched");

        Ok(Self {
            browser,
            page,
            scroll_root: None,
        })
    }

    /// Close the tab and the browser process.
    pub async fn close(mut self) -> Result<(), SessionError> {
        let _ = self.page.close().await;
        self.browser
            .close()
            .await
            .map_err(|e| SessionError::Lost(e.to_string()))?;
        Ok(())
    }

    /// Evaluate a script and deserialize its completion value.
    async fn eval<T: DeserializeOwned>(&self, js: &str) -> Result<T, SessionError> {
        let result = self
            .page
            .evaluate(js)
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?;
        result
            .into_value::<T>()
            .map_err(|e| SessionError::Script(format!("unexpected result shape: {e}")))
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        let nav = tokio::time::timeout(
            Duration::from_millis(NAVIGATION_TIMEOUT_MS),
            self.page.goto(url),
        )
        .await;

        match nav {
            Ok(Ok(_)) => {
                let _ = self.page.wait_for_navigation().await;
                // Re-apply after every document swap; defineProperty does not survive one.
                let _: bool = self.eval(WEBDRIVER_MASK_JS).await?;
                Ok(())
            }
            Ok(Err(e)) => Err(SessionError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(SessionError::Navigation {
                url: url.to_string(),
                message: format!("timed out after {NAVIGATION_TIMEOUT_MS}ms"),
            }),
        }
    }

    async fn current_url(&mut self) -> Result<String, SessionError> {
        Ok(self
            .page
            .url()
            .await
            .map_err(|e| SessionError::Lost(e.to_string()))?
            .map(|u| u.to_string())
            .unwrap_or_default())
    }

    async fn page_contains(&mut self, needle: &str) -> Result<bool, SessionError> {
        let js = format!(
            "document.body ? document.body.innerText.includes('{}') : false",
            sanitize_js_string(needle)
        );
        self.eval(&js).await
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
        let js = match &self.scroll_root {
            Some(root) => format!(
                "(() => {{ const el = document.querySelector('{}'); \
                 if (!el) return false; el.scrollTop = el.scrollHeight; return true; }})()",
                sanitize_js_string(root)
            ),
            None => {
                "(() => { window.scrollTo(0, document.body.scrollHeight); return true; })()"
                    .to_string()
            }
        };
        if self.eval::<bool>(&js).await? {
            Ok(())
        } else {
            Err(SessionError::Script("scroll container not found".to_string()))
        }
    }

    async fn content_height(&mut self) -> Result<u64, SessionError> {
        match &self.scroll_root {
            Some(root) => {
                let js = format!(
                    "(() => {{ const el = document.querySelector('{}'); \
                     return el ? el.scrollHeight : -1; }})()",
                    sanitize_js_string(root)
                );
                let height: i64 = self.eval(&js).await?;
                if height < 0 {
                    return Err(SessionError::Script(
                        "scroll container not found".to_string(),
                    ));
                }
                Ok(height as u64)
            }
            None => self.eval("document.body.scrollHeight").await,
        }
    }

    fn set_scroll_root(&mut self, selector: Option<String>) {
        self.scroll_root = selector;
    }

    async fn query_nodes(&mut self, selector: &str) -> Result<Vec<NodeSnapshot>, SessionError> {
        let html: String = self.eval("document.documentElement.outerHTML").await?;
        let base = self.current_url().await.ok().and_then(|u| Url::parse(&u).ok());

        let parsed = Selector::parse(selector)
            .map_err(|e| SessionError::Script(format!("invalid selector '{selector}': {e:?}")))?;

        let doc = Html::parse_document(&html);
        let mut nodes = Vec::new();
        for element in doc.select(&parsed) {
            let raw_text: String = element.text().collect();
            let text = raw_text.split_whitespace().collect::<Vec<_>>().join(" ");
            let href = element
                .value()
                .attr("href")
                .map(|h| absolutize(base.as_ref(), h));
            let attrs = element
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            nodes.push(NodeSnapshot { text, href, attrs });
        }
        Ok(nodes)
    }

    async fn wait_clickable(
        &mut self,
        target: &Target,
        timeout: Duration,
    ) -> Result<Locate, SessionError> {
        let js = format!(
            "(() => {{ const el = {}; return !!el && el.offsetParent !== null; }})()",
            finder_js(target)
        );
        let deadline = Instant::now() + timeout;
        loop {
            if self.eval::<bool>(&js).await? {
                return Ok(Locate::Found);
            }
            if Instant::now() >= deadline {
                return Ok(Locate::NotFound);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn click(&mut self, target: &Target) -> Result<ClickOutcome, SessionError> {
        let js = format!(
            r#"(() => {{
                const el = {};
                if (!el) return 'intercepted';
                el.scrollIntoView({{ block: 'center' }});
                const r = el.getBoundingClientRect();
                const at = document.elementFromPoint(r.x + r.width / 2, r.y + r.height / 2);
                if (at && at !== el && !el.contains(at) && !at.contains(el)) return 'intercepted';
                el.click();
                return 'clicked';
            }})()"#,
            finder_js(target)
        );
        let outcome: String = self.eval(&js).await?;
        if outcome == "clicked" {
            Ok(ClickOutcome::Clicked)
        } else {
            Ok(ClickOutcome::Intercepted)
        }
    }

    async fn dismiss_overlays(&mut self) -> Result<usize, SessionError> {
        let dismissed: usize = self
            .eval(
                r#"(() => {
                    const els = [...document.querySelectorAll("[aria-label='Close'], [aria-label*='close' i]")];
                    els.forEach(el => el.click());
                    return els.length;
                })()"#,
            )
            .await?;
        if dismissed > 0 {
            tracing::debug!(dismissed, "closed overlay affordances");
        }
        Ok(dismissed)
    }

    async fn type_char(&mut self, target: &Target, ch: char) -> Result<(), SessionError> {
        let js = format!(
            r#"(() => {{
                const el = {};
                if (!el) return false;
                el.focus();
                if (el.isContentEditable) {{
                    document.execCommand('insertText', false, '{ch}');
                }} else {{
                    el.value = (el.value || '') + '{ch}';
                    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                }}
                return true;
            }})()"#,
            finder_js(target),
            ch = sanitize_js_string(&ch.to_string())
        );
        if self.eval::<bool>(&js).await? {
            Ok(())
        } else {
            Err(SessionError::Script("typing target disappeared".to_string()))
        }
    }

    async fn press_submit_key(&mut self, target: &Target) -> Result<(), SessionError> {
        let js = format!(
            r#"(() => {{
                const el = {};
                if (!el) return false;
                el.focus();
                for (const type of ['keydown', 'keypress', 'keyup']) {{
                    el.dispatchEvent(new KeyboardEvent(type, {{
                        key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true
                    }}));
                }}
                return true;
            }})()"#,
            finder_js(target)
        );
        if self.eval::<bool>(&js).await? {
            Ok(())
        } else {
            Err(SessionError::Script("submit target disappeared".to_string()))
        }
    }
}

/// Build a JS expression that resolves a [`Target`] to an element or `null`.
fn finder_js(target: &Target) -> String {
    match target {
        Target::Css(selector) => format!(
            "document.querySelector('{}')",
            sanitize_js_string(selector)
        ),
        Target::LabeledControl(label) => format!(
            "([...document.querySelectorAll('a, button, [role=\"button\"]')]\
             .find(el => (el.textContent || '').trim().toLowerCase().includes('{}')) || null)",
            sanitize_js_string(&label.to_lowercase())
        ),
        Target::AriaLabel(label) => format!(
            "([...document.querySelectorAll('[aria-label]')]\
             .find(el => el.getAttribute('aria-label').toLowerCase().includes('{}')) || null)",
            sanitize_js_string(&label.to_lowercase())
        ),
    }
}

/// Resolve a possibly-relative href against the page URL.
fn absolutize(base: Option<&Url>, href: &str) -> String {
    match base {
        Some(base) => base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
        None => href.to_string(),
    }
}

/// Escape a string for safe injection into a JavaScript string literal.
///
/// Covers everything that could break out of a string context: backslashes,
/// all three quote characters, line terminators, and script-tag brackets.
fn sanitize_js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '`' => out.push_str("\\`"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => {}
            '<' => out.push_str("\\x3c"),
            '>' => out.push_str("\\x3e"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_escapes_quotes() {
        assert_eq!(sanitize_js_string("it's"), "it\\'s");
        assert_eq!(sanitize_js_string("a\"b"), "a\\\"b");
        assert_eq!(sanitize_js_string("plain"), "plain");
    }

    #[test]
    fn sanitize_blocks_script_breakout() {
        let out = sanitize_js_string("</script><script>alert(1)</script>");
        assert!(!out.contains("</script>"));
    }

    #[test]
    fn finder_handles_each_strategy() {
        let css = finder_js(&Target::css("a[href*='/messages/']"));
        assert!(css.starts_with("document.querySelector"));
        assert!(css.contains("\\'/messages/\\'"));

        let labeled = finder_js(&Target::labeled("Message"));
        assert!(labeled.contains("textContent"));
        assert!(labeled.contains("message"));

        let aria = finder_js(&Target::aria("Send message"));
        assert!(aria.contains("aria-label"));
        assert!(aria.contains("send message"));
    }

    #[test]
    fn explicit_chromium_path_wins_when_it_exists() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("chrome");
        std::fs::write(&binary, "").unwrap();

        std::env::set_var("PROSPECTOR_CHROMIUM_PATH", &binary);
        assert_eq!(find_chromium(), Some(binary));
        std::env::remove_var("PROSPECTOR_CHROMIUM_PATH");
    }

    #[test]
    fn absolutize_joins_relative_hrefs() {
        let base = Url::parse("https://example.com/pages/1").unwrap();
        assert_eq!(
            absolutize(Some(&base), "/groups/9"),
            "https://example.com/groups/9"
        );
        assert_eq!(absolutize(None, "/groups/9"), "/groups/9");
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn launch_and_query_live_page() {
        let mut session = ChromiumSession::launch(true)
            .await
            .expect("failed to launch browser");
        session
            .navigate("data:text/html,<h1>Hello</h1><a href='/p?x=1'>Link</a>")
            .await
            .expect("navigation failed");
        let nodes = session.query_nodes("a").await.expect("query failed");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].text, "Link");
        session.close().await.expect("close failed");
    }
}
