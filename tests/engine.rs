//! Engine facade wiring: governor, retry degradation and bulk dispatch.

mod common;

use std::sync::Arc;

use snspulse::config::{PlatformSettings, Settings};
use snspulse::model::{Platform, SessionState};
use snspulse::Engine;

use common::{tiktok_fixture, FakeDriver};

fn fast_settings(session_dir: &std::path::Path) -> Settings {
    let mut settings = Settings {
        session_dir: Some(session_dir.to_path_buf()),
        ..Settings::default()
    };
    // Single attempt and no cool-down so failure paths finish quickly.
    settings.platforms.insert(
        Platform::Tiktok,
        PlatformSettings {
            capacity: 2,
            cooldown_ms: (0, 0),
            max_attempts: 1,
            good_enough_post_fields: 3,
            paced_dispatch_ms: None,
        },
    );
    settings
}

fn engine_with(driver: Arc<FakeDriver>, dir: &tempfile::TempDir) -> Engine {
    Engine::with_driver(fast_settings(dir.path()), driver)
}

#[tokio::test]
async fn scrape_returns_parsed_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let driver = Arc::new(FakeDriver::new());
    driver.serve("https://www.tiktok.com/@tester", &tiktok_fixture());
    let engine = engine_with(driver.clone(), &dir);

    let snap = engine.scrape(Platform::Tiktok, "tester").await.unwrap();
    assert_eq!(snap.followers, Some(1500));
    assert_eq!(snap.last_post_views, Some(42));
    assert_eq!(snap.session, SessionState::Ok);
    assert_eq!(driver.open_count(), driver.close_count());
}

#[tokio::test]
async fn exhausted_transport_failures_degrade_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    let driver = Arc::new(FakeDriver::new());
    driver.fail_navigation();
    let engine = engine_with(driver.clone(), &dir);

    let snap = engine.scrape(Platform::Tiktok, "tester").await.unwrap();
    assert!(snap.is_empty());
    assert_eq!(snap.username, "tester");
    assert_eq!(driver.open_count(), driver.close_count());
}

#[tokio::test]
async fn missing_credential_is_not_degraded() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = fast_settings(dir.path());
    settings.youtube.api_key = None;
    // Point at an unroutable base so an accidental env key cannot leak
    // a real request out of the test.
    settings.youtube.api_base = Some("http://127.0.0.1:9".to_string());
    std::env::remove_var("SNSPULSE_YOUTUBE_API_KEY");
    let engine = Engine::with_driver(settings, Arc::new(FakeDriver::new()));

    let err = engine.scrape(Platform::Youtube, "creator").await.unwrap_err();
    assert!(matches!(err, snspulse::Error::MissingCredential(_)));
}

#[tokio::test]
async fn scrape_many_keeps_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let driver = Arc::new(FakeDriver::new());
    driver.serve("https://www.tiktok.com/@first", &tiktok_fixture());
    driver.serve("https://www.tiktok.com/@second", &tiktok_fixture());
    let engine = engine_with(driver.clone(), &dir);

    let accounts = vec![
        (Platform::Tiktok, "first".to_string()),
        (Platform::Tiktok, "second".to_string()),
    ];
    let results = engine.scrape_many(&accounts).await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap().username, "first");
    assert_eq!(results[1].as_ref().unwrap().username, "second");
}

#[tokio::test]
async fn backoff_does_not_hold_the_platform_slot() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings {
        session_dir: Some(dir.path().to_path_buf()),
        ..Settings::default()
    };
    settings.platforms.insert(
        Platform::Tiktok,
        PlatformSettings {
            capacity: 1,
            cooldown_ms: (0, 0),
            max_attempts: 2,
            good_enough_post_fields: 2,
            paced_dispatch_ms: None,
        },
    );

    let driver = Arc::new(FakeDriver::new());
    driver.serve("https://www.tiktok.com/@tester", &tiktok_fixture());
    driver.fail_url("https://www.tiktok.com/@flaky");
    let engine = Arc::new(Engine::with_driver(settings, driver.clone()));

    // The flaky account fails its first attempt and enters a multi-second
    // backoff before attempt two.
    let flaky_engine = engine.clone();
    let flaky = tokio::spawn(async move { flaky_engine.scrape(Platform::Tiktok, "flaky").await });
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    // During that backoff the single slot must be free for other
    // accounts; a slot held across the retry loop would block this scrape
    // for the whole window.
    let snap = tokio::time::timeout(
        std::time::Duration::from_secs(1),
        engine.scrape(Platform::Tiktok, "tester"),
    )
    .await
    .expect("slot must be free during another account's backoff")
    .unwrap();
    assert_eq!(snap.followers, Some(1500));

    let degraded = flaky.await.unwrap().unwrap();
    assert!(degraded.is_empty());
}

#[tokio::test]
async fn has_login_session_reflects_stored_cookies() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(Arc::new(FakeDriver::new()), &dir);

    assert!(!engine.has_login_session(Platform::Instagram));
    std::fs::write(dir.path().join("instagram.json"), "[]").unwrap();
    assert!(engine.has_login_session(Platform::Instagram));
}
