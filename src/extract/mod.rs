//! Platform extraction strategies.
//!
//! One extractor per platform, all behind a common contract: "page had no
//! data" comes back as `None` fields, while transport-level failures are
//! errors for the retry controller to absorb. Field fallbacks are ordered
//! lists of named strategies combined first-success-wins (see
//! [`fields`]), so the fallback order is data, not nested conditionals.

pub mod facebook;
pub mod fields;
pub mod instagram;
pub mod tiktok;
pub mod youtube;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::browser::Driver;
use crate::config::Settings;
use crate::model::{Platform, Snapshot};
use crate::session::SessionStore;
use crate::Result;

pub use facebook::FacebookExtractor;
pub use instagram::InstagramExtractor;
pub use tiktok::TiktokExtractor;
pub use youtube::YoutubeExtractor;

/// One platform's extraction strategy.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn platform(&self) -> Platform;

    /// Run one full extraction attempt for `username`.
    async fn extract(&self, username: &str) -> Result<Snapshot>;
}

/// Wire up every platform's extractor against the shared collaborators.
pub fn build_extractors(
    settings: &Settings,
    driver: Arc<dyn Driver>,
    sessions: Arc<SessionStore>,
    http: reqwest::Client,
) -> HashMap<Platform, Arc<dyn Extractor>> {
    let mut map: HashMap<Platform, Arc<dyn Extractor>> = HashMap::new();
    map.insert(
        Platform::Tiktok,
        Arc::new(TiktokExtractor::new(driver.clone())),
    );
    map.insert(
        Platform::Instagram,
        Arc::new(InstagramExtractor::new(driver.clone(), sessions.clone())),
    );
    map.insert(
        Platform::Youtube,
        Arc::new(YoutubeExtractor::new(http.clone(), &settings.youtube)),
    );
    map.insert(
        Platform::Facebook,
        Arc::new(FacebookExtractor::new(http, driver, sessions)),
    );
    map
}
