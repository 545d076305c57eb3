//! End-to-end release detection against stub CurseForge and Discord servers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::{CurseForgeStub, DiscordStub, catalog_client, discord_config, discord_dispatcher};
use modwatch::Error;
use modwatch::catalog::ModCatalog;
use modwatch::database::{self, repositories::ReleaseRepository, repositories::SqlxReleaseRepository};
use modwatch::catalog::{CurseForgeClient, CurseForgeConfig};
use modwatch::notification::{ChannelRouter, DiscordDispatcher, NotificationDispatcher};
use modwatch::scheduler::{CycleTrigger, ScannerConfig, UpdateScanner};

struct Harness {
    catalog: CurseForgeStub,
    discord: DiscordStub,
    scanner: Arc<UpdateScanner>,
    ledger: Arc<SqlxReleaseRepository>,
    _dir: tempfile::TempDir,
}

async fn harness(mod_ids: Vec<u64>, channel_ids: Vec<u64>) -> Harness {
    let catalog = CurseForgeStub::default();
    let discord = DiscordStub::default();
    let catalog_url = catalog.start().await;
    let discord_url = discord.start().await;

    let dir = tempfile::tempdir().unwrap();
    let pool = database::open_ledger(&dir.path().join("releases.db"))
        .await
        .unwrap();
    let ledger = Arc::new(SqlxReleaseRepository::new(pool));

    let scanner = Arc::new(UpdateScanner::new(
        Arc::new(catalog_client(&catalog_url, Duration::ZERO)),
        ledger.clone(),
        Arc::new(discord_dispatcher(&discord_url)),
        ChannelRouter::new(mod_ids.clone(), channel_ids, None),
        ScannerConfig {
            mod_ids,
            check_interval: Duration::from_secs(3600),
            pacing_delay: Duration::ZERO,
        },
    ));

    Harness {
        catalog,
        discord,
        scanner,
        ledger,
        _dir: dir,
    }
}

#[tokio::test]
async fn announces_new_releases_once() {
    let h = harness(vec![101, 102], vec![1001, 1002]).await;
    h.catalog
        .publish(101, 5001, "WindowsServer 42.zip", Some("<p>fix</p>"));
    h.catalog.add_mod(102);
    let cancel = CancellationToken::new();

    let report = h.scanner.run_cycle(CycleTrigger::Scheduled, &cancel).await;

    assert_eq!(report.checked, 2);
    assert_eq!(report.announced.len(), 1);
    assert_eq!(report.no_files, 1);
    assert!(!report.has_errors());

    let messages = h.discord.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].channel_id, 1001);

    let embed = &messages[0].body["embeds"][0];
    assert_eq!(embed["title"], "Mod 101");
    assert_eq!(
        embed["description"],
        "@everyone Mod 101 version 42 is now available!"
    );
    assert_eq!(embed["fields"][0]["name"], "Changelog");
    assert_eq!(embed["fields"][0]["value"], "fix");
    assert_eq!(embed["thumbnail"]["url"], "https://media.example/101.png");

    assert!(h.ledger.is_released("101", "42").await.unwrap());
    assert_eq!(h.ledger.count().await.unwrap(), 1);
    assert_eq!(h.discord.reactions().len(), 2);
    assert!(h.discord.crossposts().is_empty());
    assert_eq!(
        h.discord.auth_headers()[0].as_deref(),
        Some("Bot test-token")
    );
    assert!(
        h.catalog
            .api_keys()
            .iter()
            .all(|k| k.as_deref() == Some("test-key"))
    );

    let second = h.scanner.run_cycle(CycleTrigger::Scheduled, &cancel).await;
    assert!(second.announced.is_empty());
    assert_eq!(second.already_released, 1);
    assert_eq!(h.discord.messages().len(), 1);
}

#[tokio::test]
async fn new_file_after_announcement_is_announced() {
    let h = harness(vec![101], vec![1001]).await;
    h.catalog.publish(101, 5001, "WindowsServer 42.zip", None);
    let cancel = CancellationToken::new();

    h.scanner.run_cycle(CycleTrigger::Scheduled, &cancel).await;
    h.catalog.publish(101, 5002, "WindowsServer 43.zip", None);
    let report = h.scanner.run_cycle(CycleTrigger::Scheduled, &cancel).await;

    assert_eq!(report.announced[0].version, "43");
    let messages = h.discord.messages();
    assert_eq!(messages.len(), 2);
    // no changelog, no changelog field
    assert!(
        messages[1].body["embeds"][0]["fields"]
            .as_array()
            .is_none_or(|fields| fields.iter().all(|f| f["name"] != "Changelog"))
    );
}

#[tokio::test]
async fn failed_delivery_is_retried_next_cycle() {
    let h = harness(vec![101], vec![1001]).await;
    h.catalog
        .publish(101, 5001, "WindowsServer 42.zip", Some("<p>fix</p>"));
    let cancel = CancellationToken::new();

    h.discord.set_failing(true);
    let report = h.scanner.run_cycle(CycleTrigger::Scheduled, &cancel).await;
    assert_eq!(report.dispatch_failed.len(), 1);
    assert!(!h.ledger.is_released("101", "42").await.unwrap());

    h.discord.set_failing(false);
    let report = h.scanner.run_cycle(CycleTrigger::Scheduled, &cancel).await;
    assert_eq!(report.announced.len(), 1);
    assert!(h.ledger.is_released("101", "42").await.unwrap());
    assert_eq!(h.discord.messages().len(), 1);
}

#[tokio::test]
async fn unknown_mod_does_not_block_others() {
    let h = harness(vec![404, 102], vec![1001, 1002]).await;
    h.catalog.publish(102, 6001, "WindowsServer 7.zip", None);

    let report = h
        .scanner
        .run_cycle(CycleTrigger::Manual, &CancellationToken::new())
        .await;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].mod_id, 404);
    assert_eq!(report.announced.len(), 1);
    assert_eq!(h.discord.messages()[0].channel_id, 1002);
}

#[tokio::test]
async fn unknown_mod_is_not_found() {
    let stub = CurseForgeStub::default();
    let url = stub.start().await;
    let client = catalog_client(&url, Duration::ZERO);

    let err = client.get_mod_info(999).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { ref id, .. } if id == "999"));

    let err = client.get_mod_files(999).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn mod_without_files_has_no_latest_file() {
    let stub = CurseForgeStub::default();
    stub.add_mod(101);
    let url = stub.start().await;
    let client = catalog_client(&url, Duration::ZERO);

    assert!(client.get_latest_file(101).await.unwrap().is_none());
}

#[tokio::test]
async fn throttled_catalog_requests_are_retried() {
    let stub = CurseForgeStub::default();
    stub.publish(101, 5001, "WindowsServer 42.zip", Some("<b>big</b> fix"));
    stub.throttle_next(2);
    let url = stub.start().await;
    let client = catalog_client(&url, Duration::ZERO);

    let latest = client.get_latest_file(101).await.unwrap().unwrap();

    assert_eq!(latest.version, "42");
    assert_eq!(latest.changelog, "**big** fix");
    // two throttled attempts, then files and changelog
    let paths = stub.request_paths();
    assert_eq!(paths.len(), 4);
    assert!(paths[..3].iter().all(|p| p == "/mods/101/files"));
    assert_eq!(paths[3], "/mods/101/files/5001/changelog");
}

#[tokio::test]
async fn throttle_without_retry_after_waits_the_default() {
    let stub = CurseForgeStub::default();
    stub.publish(101, 5001, "WindowsServer 42.zip", None);
    stub.throttle_next_without_hint(1);
    let url = stub.start().await;
    let default_retry_after = Duration::from_millis(200);
    let client = CurseForgeClient::new(CurseForgeConfig {
        base_url: url,
        api_key: "test-key".to_string(),
        request_delay: Duration::ZERO,
        default_retry_after,
        timeout: Duration::from_secs(5),
        ..CurseForgeConfig::default()
    })
    .unwrap();

    let files = client.get_mod_files(101).await.unwrap();

    assert_eq!(files.len(), 1);
    let paths = stub.request_paths();
    assert_eq!(paths, vec!["/mods/101/files", "/mods/101/files"]);
    let instants = stub.request_instants();
    assert!(instants[1] - instants[0] >= default_retry_after);
}

#[tokio::test]
async fn catalog_requests_are_spaced() {
    let stub = CurseForgeStub::default();
    stub.publish(101, 5001, "WindowsServer 42.zip", None);
    let url = stub.start().await;
    let delay = Duration::from_millis(100);
    let client = Arc::new(catalog_client(&url, delay));

    let calls = (0..3).map(|_| {
        let client = client.clone();
        tokio::spawn(async move { client.get_mod_info(101).await })
    });
    for call in calls.collect::<Vec<_>>() {
        call.await.unwrap().unwrap();
    }

    let instants = stub.request_instants();
    assert_eq!(instants.len(), 3);
    for pair in instants.windows(2) {
        // server-side arrival times; allow a little scheduling slack
        assert!(pair[1] - pair[0] >= delay - Duration::from_millis(10));
    }
}

#[tokio::test]
async fn throttled_discord_post_is_retried() {
    let discord = DiscordStub::default();
    let url = discord.start().await;
    discord.throttle_next(1);

    let h = harness(vec![101], vec![1001]).await;
    h.catalog.publish(101, 5001, "WindowsServer 42.zip", None);
    let scanner = UpdateScanner::new(
        Arc::new(catalog_client(&h.catalog.start().await, Duration::ZERO)),
        h.ledger.clone(),
        Arc::new(discord_dispatcher(&url)),
        ChannelRouter::new(vec![101], vec![1001], None),
        ScannerConfig {
            mod_ids: vec![101],
            check_interval: Duration::from_secs(3600),
            pacing_delay: Duration::ZERO,
        },
    );

    let report = scanner
        .run_cycle(CycleTrigger::Scheduled, &CancellationToken::new())
        .await;

    assert_eq!(report.announced.len(), 1);
    assert_eq!(discord.messages().len(), 1);
}

#[tokio::test]
async fn debug_mode_routes_to_debug_channel_without_publishing() {
    let catalog = CurseForgeStub::default();
    let discord = DiscordStub::default();
    catalog.publish(101, 5001, "WindowsServer 42.zip", None);
    catalog.publish(102, 6001, "WindowsServer 7.zip", None);
    let catalog_url = catalog.start().await;
    let discord_url = discord.start().await;

    let dir = tempfile::tempdir().unwrap();
    let pool = database::open_ledger(&dir.path().join("releases.db"))
        .await
        .unwrap();
    let scanner = UpdateScanner::new(
        Arc::new(catalog_client(&catalog_url, Duration::ZERO)),
        Arc::new(SqlxReleaseRepository::new(pool)),
        Arc::new(
            DiscordDispatcher::new(modwatch::notification::DiscordConfig {
                add_reactions: false,
                publish: false,
                ..discord_config(&discord_url)
            })
            .unwrap(),
        ),
        ChannelRouter::new(vec![101, 102], vec![1001, 1002], Some(77)),
        ScannerConfig {
            mod_ids: vec![101, 102],
            check_interval: Duration::from_secs(3600),
            pacing_delay: Duration::ZERO,
        },
    );

    scanner
        .run_cycle(CycleTrigger::Scheduled, &CancellationToken::new())
        .await;

    let messages = discord.messages();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m.channel_id == 77));
    assert!(discord.reactions().is_empty());
    assert!(discord.crossposts().is_empty());
}

#[tokio::test]
async fn announcements_are_published_when_enabled() {
    let h = harness(vec![101], vec![1001]).await;
    let discord = DiscordStub::default();
    let url = discord.start().await;
    h.catalog.publish(101, 5001, "WindowsServer 42.zip", None);

    let scanner = UpdateScanner::new(
        Arc::new(catalog_client(&h.catalog.start().await, Duration::ZERO)),
        h.ledger.clone(),
        Arc::new(
            DiscordDispatcher::new(modwatch::notification::DiscordConfig {
                publish: true,
                ..discord_config(&url)
            })
            .unwrap(),
        ),
        ChannelRouter::new(vec![101], vec![1001], None),
        ScannerConfig {
            mod_ids: vec![101],
            check_interval: Duration::from_secs(3600),
            pacing_delay: Duration::ZERO,
        },
    );

    scanner
        .run_cycle(CycleTrigger::Scheduled, &CancellationToken::new())
        .await;

    assert_eq!(discord.crossposts(), vec![1001]);
}

#[tokio::test]
async fn garbled_login_response_is_retried() {
    let discord = DiscordStub::default();
    discord.garble_user_responses(2);
    let url = discord.start().await;
    let dispatcher = discord_dispatcher(&url);

    let ready = tokio::time::timeout(
        Duration::from_secs(5),
        dispatcher.wait_until_ready(&CancellationToken::new()),
    )
    .await
    .expect("dispatcher never became ready");

    assert!(ready.is_ok());
    assert_eq!(discord.user_probes(), 3);
}
