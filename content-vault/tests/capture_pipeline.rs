use content_vault::capture::{FORMAT_HTML, FORMAT_PLAIN, FORMAT_URI_LIST, MIME_PNG};
use content_vault::search::filter;
use content_vault::{
    Attachment, CaptureEvent, ContentType, ContentVault, ContentVaultApi, IngestOutcome, PasteBus,
    VaultError,
};
use std::time::Duration;

fn contents(vault: &ContentVault) -> Vec<String> {
    vault.all_items().iter().map(|i| i.content().to_string()).collect()
}

async fn wait_for_len(vault: &ContentVault, len: usize) {
    for _ in 0..400 {
        if vault.len() == len {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("vault never reached {} items (has {})", len, vault.len());
}

#[tokio::test]
async fn classification_scenarios() {
    let vault = ContentVault::new_in_memory().unwrap();

    let article = vault.ingest(CaptureEvent::html("<b>hi</b>")).await;
    let link = vault.ingest(CaptureEvent::uri_list("https://x.test")).await;
    let text = vault.ingest(CaptureEvent::text("hello")).await;

    assert!(matches!(article, IngestOutcome::Added { content_type: ContentType::Article, .. }));
    assert!(matches!(link, IngestOutcome::Added { content_type: ContentType::Link, .. }));
    assert!(matches!(text, IngestOutcome::Added { content_type: ContentType::Text, .. }));

    vault.set_query("ell".to_string());
    assert_eq!(vault.items().len(), 1);
    assert_eq!(vault.items()[0].content(), "hello");

    vault.set_query("zzz".to_string());
    assert!(vault.items().is_empty());
}

#[tokio::test]
async fn html_wins_over_every_other_representation() {
    let vault = ContentVault::new_in_memory().unwrap();
    let event = CaptureEvent::new()
        .with_data(FORMAT_PLAIN, "plain")
        .with_data(FORMAT_URI_LIST, "https://x.test")
        .with_data(FORMAT_HTML, "<p>rich</p>")
        .with_file(Attachment::from_bytes(MIME_PNG, vec![1u8, 2, 3]));

    let outcome = vault.ingest(event).await;
    assert!(matches!(outcome, IngestOutcome::Added { content_type: ContentType::Article, .. }));
    assert_eq!(contents(&vault), vec!["<p>rich</p>"]);
}

#[tokio::test]
async fn empty_selected_representation_is_a_noop() {
    let vault = ContentVault::new_in_memory().unwrap();
    let feed = vault.subscribe();

    // Empty html is selected and yields nothing, even with plain text present
    let event = CaptureEvent::new()
        .with_data(FORMAT_HTML, "")
        .with_data(FORMAT_PLAIN, "ignored");
    assert_eq!(vault.ingest(event).await, IngestOutcome::Empty);
    assert_eq!(vault.ingest(CaptureEvent::new()).await, IngestOutcome::Empty);

    assert!(vault.is_empty());
    assert!(!feed.has_changed().unwrap());
}

#[tokio::test]
async fn png_file_is_stored_as_data_uri() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shot.PNG");
    std::fs::write(&path, [0x89u8, b'P', b'N', b'G']).unwrap();

    let vault = ContentVault::new_in_memory().unwrap();
    let outcome = vault
        .ingest(CaptureEvent::text("caption").with_file(Attachment::from_image_path(&path)))
        .await;

    assert!(matches!(outcome, IngestOutcome::Added { content_type: ContentType::Image, .. }));
    let items = vault.all_items();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].content(), "data:image/png;base64,iVBORw==");
}

#[tokio::test]
async fn unsupported_attachment_falls_through_to_text() {
    let vault = ContentVault::new_in_memory().unwrap();
    let event = CaptureEvent::text("caption")
        .with_file(Attachment::from_bytes("image/gif", vec![b'G', b'I', b'F']));

    let outcome = vault.ingest(event).await;
    assert!(matches!(outcome, IngestOutcome::Added { content_type: ContentType::Text, .. }));
    assert_eq!(contents(&vault), vec!["caption"]);
}

#[tokio::test]
async fn missing_image_file_fails_without_append() {
    let dir = tempfile::tempdir().unwrap();
    let vault = ContentVault::new_in_memory().unwrap();
    let event = CaptureEvent::new()
        .with_file(Attachment::from_path(MIME_PNG, dir.path().join("gone.png")));

    let outcome = vault.ingest(event).await;
    assert!(matches!(outcome, IngestOutcome::Failed { error: VaultError::Io(_) }));
    assert!(vault.is_empty());
}

#[tokio::test]
async fn appends_read_back_newest_first() {
    let vault = ContentVault::new_in_memory().unwrap();
    for n in 0..10 {
        vault.ingest(CaptureEvent::text(format!("item {}", n))).await;
    }
    let expected: Vec<String> = (0..10).rev().map(|n| format!("item {}", n)).collect();
    assert_eq!(contents(&vault), expected);

    let items = vault.all_items();
    assert!(items.windows(2).all(|pair| pair[0].created_at() >= pair[1].created_at()));
}

#[tokio::test]
async fn remove_and_clear_behave_as_noops_when_nothing_matches() {
    let vault = ContentVault::new_in_memory().unwrap();
    vault.clear_all();
    assert!(vault.is_empty());

    let id = vault.ingest(CaptureEvent::text("only")).await.added_id().unwrap();
    let before = vault.len();
    assert!(vault.remove(id));
    assert_eq!(vault.len(), before - 1);
    assert!(!vault.remove(id));
    assert_eq!(vault.len(), before - 1);
}

#[tokio::test]
async fn visible_items_match_the_pure_filter() {
    let vault = ContentVault::new_in_memory().unwrap();
    for text in ["alpha", "Beta", "ALPHABET", "gamma"] {
        vault.ingest(CaptureEvent::text(text)).await;
    }
    vault.ingest(CaptureEvent::uri_list("https://alpha.test")).await;

    for query in ["", "alpha", "BET", "link", "text", "nothing"] {
        vault.set_query(query.to_string());
        let expected = filter(&vault.all_items(), query);
        assert_eq!(vault.items().to_vec(), expected, "query {:?}", query);
    }
}

#[tokio::test]
async fn listener_ingests_until_detached() {
    let bus = PasteBus::default();
    let vault = ContentVault::new_in_memory().unwrap();

    let subscription = vault.listen(&bus);
    assert_eq!(bus.listener_count(), 1);

    bus.publish(CaptureEvent::html("<i>one</i>"));
    bus.publish(CaptureEvent::new().with_file(Attachment::from_bytes(MIME_PNG, vec![9u8])));
    bus.publish(CaptureEvent::text("three"));
    wait_for_len(&vault, 3).await;

    subscription.detach().await;
    assert_eq!(bus.listener_count(), 0);
    bus.publish(CaptureEvent::text("too late"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(vault.len(), 3);
}

#[tokio::test]
async fn two_vaults_on_one_bus_each_receive() {
    let bus = PasteBus::default();
    let first = ContentVault::new_in_memory().unwrap();
    let second = ContentVault::new_in_memory().unwrap();
    let _a = first.listen(&bus);
    let _b = second.listen(&bus);

    assert_eq!(bus.publish(CaptureEvent::text("shared")), 2);
    wait_for_len(&first, 1).await;
    wait_for_len(&second, 1).await;
    assert_ne!(first.all_items()[0].id(), second.all_items()[0].id());
}

#[tokio::test]
async fn listening_twice_ingests_each_paste_once() {
    let bus = PasteBus::default();
    let vault = ContentVault::new_in_memory().unwrap();

    let replaced = vault.listen(&bus);
    let active = vault.listen(&bus);
    assert!(!replaced.is_attached());
    replaced.detach().await;
    assert_eq!(bus.listener_count(), 1);

    bus.publish(CaptureEvent::text("one paste"));
    wait_for_len(&vault, 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(contents(&vault), vec!["one paste"]);

    active.detach().await;
    assert!(!vault.is_listening());
}

#[tokio::test]
async fn replaced_listener_stops_before_the_next_paste() {
    let bus = PasteBus::default();
    let vault = ContentVault::new_in_memory().unwrap();

    // The first subscription is kept alive but must no longer ingest
    let _stale = vault.listen(&bus);
    let _active = vault.listen(&bus);

    bus.publish(CaptureEvent::text("only once"));
    wait_for_len(&vault, 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(vault.len(), 1);
}
