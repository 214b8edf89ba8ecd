//! End-to-end tests of the archival engine on a file-backed database,
//! using the SQLite live store colocated with the archive tables.

use std::sync::Arc;

use chrono::{Duration, Utc};

use memoire_archive::{
    ArchiveConfig, ChatArchiver, Database, FieldCipher, LiveChat, LiveChatStore, LiveMessage,
    LiveMessageStore, SearchStrategyKind, SqliteLiveStore,
};

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine_at(
    path: &std::path::Path,
    strategy: SearchStrategyKind,
) -> (ChatArchiver, Arc<SqliteLiveStore>) {
    let db = Arc::new(Database::open_at(path).expect("open database"));
    let live = Arc::new(SqliteLiveStore::new(db.clone()));
    let config = ArchiveConfig {
        search_strategy: strategy,
        ..Default::default()
    };
    let archiver = ChatArchiver::new(
        db,
        FieldCipher::from_passphrase("integration-passphrase"),
        live.clone(),
        live.clone(),
        config,
    );
    archiver.initialize().expect("initialize");
    (archiver, live)
}

fn seed_conversation(live: &SqliteLiveStore, chat_id: &str, contact: &str, contents: &[&str]) {
    let now = Utc::now();
    live.save_chat(&LiveChat {
        id: chat_id.to_string(),
        contact_name: contact.to_string(),
        contact_public_key: None,
        last_message_time: Some(now),
        unread_count: 1,
        is_online: false,
        has_unsent_messages: false,
    })
    .expect("save chat");

    for (i, content) in contents.iter().enumerate() {
        let ts = now - Duration::minutes((contents.len() - i) as i64);
        live.save_message(&LiveMessage::text(
            &format!("{chat_id}-m{i}"),
            chat_id,
            content,
            ts,
        ))
        .expect("save message");
    }
}

#[test]
fn full_lifecycle_survives_reopen() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memoire.db");

    let archive_id = {
        let (archiver, live) = engine_at(&path, SearchStrategyKind::FullText);
        seed_conversation(&live, "c1", "Alice", &["on se voit demain", "parfait, à bientôt"]);

        let report = archiver.archive_chat("c1", Some("trip over".into()), None, true);
        assert!(report.success, "{report:?}");

        // The live conversation is gone.
        assert!(live.chat("c1").unwrap().is_none());
        assert!(live.messages("c1").unwrap().is_empty());

        report.archive_id.unwrap()
    };

    // Reopen the same file with a fresh engine: the archive is durable and
    // still decryptable with the same passphrase.
    let (archiver, live) = engine_at(&path, SearchStrategyKind::FullText);

    let archive = archiver
        .get_archived_chat(&archive_id)
        .unwrap()
        .expect("archive persisted across reopen");
    assert_eq!(archive.message_count, 2);
    assert_eq!(archive.messages[0].content, "on se voit demain");
    assert_eq!(archive.metadata.reason.as_deref(), Some("trip over"));

    // The trigger-maintained index survived the reopen too.
    let results = archiver.search_archives("demain", None, 10).unwrap();
    assert_eq!(results.hits.len(), 1);
    assert_eq!(results.hits[0].archive_id, archive_id);

    // Restore consumes the archive and repopulates the live store.
    let report = archiver.restore_chat(&archive_id, None, false);
    assert!(report.success, "{report:?}");
    assert_eq!(report.restored_messages, Some(2));
    assert_eq!(live.messages("c1").unwrap().len(), 2);
    assert!(archiver.get_archived_chat(&archive_id).unwrap().is_none());

    // And the index entries are gone with it.
    let results = archiver.search_archives("demain", None, 10).unwrap();
    assert!(results.hits.is_empty());
}

#[test]
fn strategy_switch_rebuilds_posting_lists() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memoire.db");

    {
        let (archiver, live) = engine_at(&path, SearchStrategyKind::FullText);
        seed_conversation(&live, "c1", "Alice", &["le chat dort sur le canapé"]);
        assert!(archiver.archive_chat("c1", None, None, true).success);
    }

    // Same file, inverted strategy: initialize() rebuilds the posting
    // lists from the persisted rows.
    let (archiver, _) = engine_at(&path, SearchStrategyKind::Inverted);
    let results = archiver.search_archives("canapé", None, 10).unwrap();
    assert_eq!(results.hits.len(), 1);
}

#[test]
fn delete_is_terminal() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memoire.db");

    let (archiver, live) = engine_at(&path, SearchStrategyKind::Inverted);
    seed_conversation(&live, "c1", "Alice", &["message un", "message deux"]);

    let archive_id = archiver
        .archive_chat("c1", None, None, true)
        .archive_id
        .unwrap();

    let report = archiver.permanently_delete_archive(&archive_id);
    assert!(report.success);

    assert!(archiver.get_archived_chat(&archive_id).unwrap().is_none());
    assert!(archiver
        .search_archives("message", None, 10)
        .unwrap()
        .hits
        .is_empty());
    // Restore after purge fails cleanly.
    let report = archiver.restore_chat(&archive_id, None, false);
    assert!(!report.success);
    assert!(report.error.as_deref().unwrap().contains("not found"));
}

#[test]
fn statistics_accumulate_across_operations() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("memoire.db");

    let (archiver, live) = engine_at(&path, SearchStrategyKind::FullText);
    seed_conversation(&live, "c1", "Alice", &["bonjour"]);
    seed_conversation(&live, "c2", "Bob", &["salut", "ça va?"]);

    assert!(archiver.archive_chat("c1", None, None, true).success);
    assert!(archiver.archive_chat("c2", None, None, true).success);
    archiver.search_archives("salut", None, 10).unwrap();

    let stats = archiver.get_archive_statistics().unwrap();
    assert_eq!(stats.total_archives, 2);
    assert_eq!(stats.total_messages, 3);
    assert!(stats.total_size_bytes > 0);
    assert_eq!(stats.archives_per_contact.len(), 2);

    let archive_timing = stats
        .operation_timings
        .iter()
        .find(|t| t.operation == memoire_archive::Operation::Archive)
        .expect("archive timings recorded");
    assert_eq!(archive_timing.count, 2);
    assert!(archive_timing.max_ms >= archive_timing.min_ms);
}
