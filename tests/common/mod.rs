//! Fake browsing-context factory for engine and extractor tests.
//!
//! Serves fixture HTML by URL and counts open/close pairs so tests can
//! assert that no context leaks on any code path.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use snspulse::browser::{ContextProfile, Driver, PageContext};
use snspulse::error::Error;
use snspulse::model::StoredCookie;

#[derive(Default)]
pub struct FakeDriver {
    /// URL -> served HTML.
    pages: Mutex<HashMap<String, String>>,
    /// URL -> final URL after redirect.
    redirects: Mutex<HashMap<String, String>>,
    /// Fail every navigation with a transport error.
    fail_navigation: std::sync::atomic::AtomicBool,
    /// URLs whose navigation fails while others keep working.
    fail_urls: Mutex<HashSet<String>>,
    pub opened: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
    /// Cookie sets injected into created contexts, in creation order.
    pub injected: Mutex<Vec<Vec<StoredCookie>>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, html: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
    }

    pub fn redirect(&self, url: &str, target: &str) {
        self.redirects
            .lock()
            .unwrap()
            .insert(url.to_string(), target.to_string());
    }

    pub fn fail_navigation(&self) {
        self.fail_navigation.store(true, Ordering::SeqCst);
    }

    pub fn fail_url(&self, url: &str) {
        self.fail_urls.lock().unwrap().insert(url.to_string());
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn new_context(
        &self,
        profile: ContextProfile,
    ) -> snspulse::Result<Box<dyn PageContext>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.injected.lock().unwrap().push(profile.cookies.clone());
        Ok(Box::new(FakePage {
            pages: self.pages.lock().unwrap().clone(),
            redirects: self.redirects.lock().unwrap().clone(),
            fail_navigation: self.fail_navigation.load(Ordering::SeqCst),
            fail_urls: self.fail_urls.lock().unwrap().clone(),
            current: String::new(),
            closed: false,
            close_counter: self.closed.clone(),
        }))
    }
}

struct FakePage {
    pages: HashMap<String, String>,
    redirects: HashMap<String, String>,
    fail_navigation: bool,
    fail_urls: HashSet<String>,
    current: String,
    closed: bool,
    close_counter: Arc<AtomicUsize>,
}

#[async_trait]
impl PageContext for FakePage {
    async fn goto(&mut self, url: &str) -> snspulse::Result<()> {
        if self.fail_navigation || self.fail_urls.contains(url) {
            return Err(Error::Transport(format!("fake navigation failure: {url}")));
        }
        self.current = self
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        Ok(())
    }

    async fn current_url(&mut self) -> snspulse::Result<String> {
        Ok(self.current.clone())
    }

    async fn content(&mut self) -> snspulse::Result<String> {
        Ok(self
            .pages
            .get(&self.current)
            .cloned()
            .unwrap_or_else(|| "<html><body></body></html>".to_string()))
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.close_counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Profile fixture with an embedded SIGI_STATE payload: 1500 followers,
/// one pinned post and one regular post with 42 plays.
pub fn tiktok_fixture() -> String {
    r#"<html><body>
    <script id="SIGI_STATE" type="application/json">{
        "UserModule": {"stats": {"tester": {"followerCount": 1500}}},
        "ItemModule": {
            "900": {"isPinnedItem": true, "createTime": "1710000000",
                    "stats": {"playCount": 7, "diggCount": 3}},
            "901": {"createTime": "1700000000", "stats": {"playCount": 42}}
        }
    }</script>
    </body></html>"#
        .to_string()
}
