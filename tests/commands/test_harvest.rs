//! Tests for the harvest command

use std::fs;
use std::time::Duration;

use tempfile::tempdir;
use tokio::time::Instant;
use wa_contacts::commands::{HarvestOptions, HarvestOutcome};
use wa_contacts::{ClientEvent, CredentialStore, Credentials};

use crate::common::{delivery, TimedClient};
use wa_contacts::commands::harvest::run_with_client;

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[tokio::test(start_paused = true)]
async fn burst_within_window_finalizes_once_after_last_event() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("contacts.txt");
    let mut client = TimedClient::new(vec![
        (Duration::ZERO, delivery(&["1@x"])),
        (secs(1), delivery(&["2@x"])),
        (secs(1), delivery(&["3@x"])),
        (secs(2), delivery(&["4@x"])),
    ]);

    let start = Instant::now();
    let options = HarvestOptions::new(secs(5)).with_output(&output);
    let outcome = run_with_client(&mut client, &options).await.unwrap();

    // Last delivery at t=4s, so the write happens at t=9s, not t=5s.
    let elapsed = start.elapsed();
    assert!(elapsed >= secs(9) && elapsed < secs(9) + Duration::from_millis(5));
    assert!(matches!(outcome, HarvestOutcome::Written { count: 4, .. }));
    assert_eq!(fs::read_to_string(&output).unwrap(), "+1\n+2\n+3\n+4");
}

#[tokio::test(start_paused = true)]
async fn delivery_after_quiet_period_is_not_waited_for() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("contacts.txt");
    let mut client = TimedClient::new(vec![
        (Duration::ZERO, delivery(&["1@x"])),
        (secs(10), delivery(&["2@x"])),
    ]);

    let options = HarvestOptions::new(secs(3)).with_output(&output);
    run_with_client(&mut client, &options).await.unwrap();

    assert_eq!(fs::read_to_string(&output).unwrap(), "+1");
}

#[tokio::test(start_paused = true)]
async fn zero_window_finalizes_on_next_tick() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("contacts.txt");
    let mut client = TimedClient::new(vec![(secs(2), delivery(&["123@x", "456@y", "abc@z"]))]);

    let start = Instant::now();
    let options = HarvestOptions::new(Duration::ZERO).with_output(&output);
    run_with_client(&mut client, &options).await.unwrap();

    let elapsed = start.elapsed();
    assert!(elapsed >= secs(2) && elapsed < secs(2) + Duration::from_millis(5));
    assert_eq!(fs::read_to_string(&output).unwrap(), "+123\n+456");
}

#[tokio::test(start_paused = true)]
async fn ended_stream_without_deliveries_writes_nothing() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("contacts.txt");
    let mut client = TimedClient::new(vec![(
        secs(1),
        ClientEvent::Closed {
            reason: "replaced".into(),
            is_reconnecting: false,
        },
    )])
    .ending();

    let options = HarvestOptions::new(secs(1)).with_output(&output);
    let outcome = run_with_client(&mut client, &options).await.unwrap();

    assert_eq!(outcome, HarvestOutcome::NoChatsDelivered);
    assert!(!output.exists());
}

#[tokio::test(start_paused = true)]
async fn silent_connection_never_writes() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("contacts.txt");
    let mut client = TimedClient::new(Vec::new());

    let options = HarvestOptions::new(secs(1)).with_output(&output);
    let result =
        tokio::time::timeout(secs(3600), run_with_client(&mut client, &options)).await;

    assert!(result.is_err(), "harvest must keep waiting without deliveries");
    assert!(!output.exists());
}

#[tokio::test(start_paused = true)]
async fn stored_credentials_reach_client_before_connect() {
    let dir = tempdir().expect("tempdir");
    let store = CredentialStore::new(dir.path().join("credentials.json"));
    let creds = Credentials(serde_json::json!({ "clientToken": "saved" }));
    store.save(&creds).unwrap();

    let mut client = TimedClient::new(vec![(Duration::ZERO, delivery(&["1@x"]))]);
    let calls = client.calls.clone();
    let options = HarvestOptions::new(secs(1))
        .with_credentials(store)
        .with_output(dir.path().join("contacts.txt"));
    run_with_client(&mut client, &options).await.unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["load_credentials", "connect"]);
}

#[tokio::test(start_paused = true)]
async fn missing_credentials_file_connects_fresh() {
    let dir = tempdir().expect("tempdir");
    let store = CredentialStore::new(dir.path().join("credentials.json"));

    let mut client = TimedClient::new(vec![
        (
            Duration::ZERO,
            ClientEvent::CredentialsUpdated(Credentials(serde_json::json!({ "paired": true }))),
        ),
        (Duration::ZERO, delivery(&["1@x"])),
    ]);
    let calls = client.calls.clone();
    let options = HarvestOptions::new(secs(1))
        .with_credentials(store.clone())
        .with_output(dir.path().join("contacts.txt"));
    run_with_client(&mut client, &options).await.unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["connect"]);
    assert_eq!(
        store.load().unwrap(),
        Some(Credentials(serde_json::json!({ "paired": true })))
    );
}

#[tokio::test(start_paused = true)]
async fn unwritable_output_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("no_such_dir").join("contacts.txt");
    let mut client = TimedClient::new(vec![(Duration::ZERO, delivery(&["1@x"]))]);

    let options = HarvestOptions::new(secs(1)).with_output(&output);
    let err = run_with_client(&mut client, &options).await.unwrap_err();

    assert!(matches!(err, wa_contacts::Error::Io(_)));
}

#[tokio::test(start_paused = true)]
async fn delivery_before_open_is_timed_from_arrival() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("contacts.txt");
    let mut client = TimedClient::new(Vec::new())
        .before_open(vec![(Duration::ZERO, delivery(&["1@x", "2@x"]))], secs(4))
        .ending();

    let start = Instant::now();
    let options = HarvestOptions::new(secs(5)).with_output(&output);
    run_with_client(&mut client, &options).await.unwrap();

    // Delivered at t=0 while the session was still opening (open at t=4s).
    let elapsed = start.elapsed();
    assert!(elapsed >= secs(5) && elapsed < secs(5) + Duration::from_millis(5));
    assert_eq!(fs::read_to_string(&output).unwrap(), "+1\n+2");
}

#[tokio::test(start_paused = true)]
async fn stale_early_delivery_does_not_skip_later_one() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("contacts.txt");
    let mut client = TimedClient::new(Vec::new())
        .before_open(
            vec![
                (Duration::ZERO, delivery(&["1@x"])),
                (secs(9), delivery(&["2@x"])),
            ],
            secs(1),
        )
        .ending();

    let start = Instant::now();
    let options = HarvestOptions::new(secs(3)).with_output(&output);
    run_with_client(&mut client, &options).await.unwrap();

    // The second delivery (t=9s) sets the deadline, not the first.
    let elapsed = start.elapsed();
    assert!(elapsed >= secs(12) && elapsed < secs(12) + Duration::from_millis(5));
    assert_eq!(fs::read_to_string(&output).unwrap(), "+1\n+2");
}

#[tokio::test(start_paused = true)]
async fn slow_pairing_still_harvests() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("contacts.txt");
    let mut client = TimedClient::new(vec![(Duration::ZERO, delivery(&["7@x"]))])
        .before_open(Vec::new(), secs(600));

    let options = HarvestOptions::new(secs(1)).with_output(&output);
    let outcome = run_with_client(&mut client, &options).await.unwrap();

    assert!(matches!(outcome, HarvestOutcome::Written { count: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn credentials_from_failed_pairing_are_saved() {
    let dir = tempdir().expect("tempdir");
    let store = CredentialStore::new(dir.path().join("credentials.json"));
    let paired = Credentials(serde_json::json!({ "me": "100@s.whatsapp.net" }));

    let mut client = TimedClient::new(Vec::new())
        .before_open(
            vec![(secs(20), ClientEvent::CredentialsUpdated(paired.clone()))],
            secs(20),
        )
        .failing_connect();
    let options = HarvestOptions::new(secs(1))
        .with_credentials(store.clone())
        .with_output(dir.path().join("contacts.txt"));
    let err = run_with_client(&mut client, &options).await.unwrap_err();

    assert!(matches!(err, wa_contacts::Error::Connection(_)));
    assert_eq!(store.load().unwrap(), Some(paired));
    assert!(!dir.path().join("contacts.txt").exists());
}

#[tokio::test(start_paused = true)]
async fn failed_connect_leaves_unchanged_credentials_alone() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("credentials.json");
    fs::write(&path, r#"{"clientToken":"kept"}"#).unwrap();
    let store = CredentialStore::new(path.clone());

    let mut client = TimedClient::new(Vec::new()).failing_connect();
    let options = HarvestOptions::new(secs(1))
        .with_credentials(store)
        .with_output(dir.path().join("contacts.txt"));
    assert!(run_with_client(&mut client, &options).await.is_err());

    // Not rewritten, so the compact original layout survives.
    assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"clientToken":"kept"}"#);
}

#[tokio::test(start_paused = true)]
async fn huge_time_waits_instead_of_falling_back() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("contacts.txt");
    let mut client = TimedClient::new(vec![(Duration::ZERO, delivery(&["1@x"]))]).ending();

    let window = wa_contacts::config::debounce_window(1e30);
    let options = HarvestOptions::new(window).with_output(&output);
    let result = tokio::time::timeout(secs(86_400), run_with_client(&mut client, &options)).await;

    assert!(result.is_err(), "a huge window must not shrink to the 10 s fallback");
    assert!(!output.exists());
}
