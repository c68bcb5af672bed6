use std::sync::Arc;
use std::thread;

use birthday_bot::commands::{Dispatcher, ReplyKind, Sender};
use birthday_bot::storage::BirthdayStore;
use tempfile::TempDir;

const WRITERS: usize = 16;

#[test]
fn concurrent_puts_keep_every_record() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(BirthdayStore::open(dir.path().join("birthdays.json")));

    thread::scope(|scope| {
        for i in 0..WRITERS {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                store
                    .put(&format!("person-{i}"), &format!("2000-01-{:02}", i + 1))
                    .unwrap();
            });
        }
    });

    let reopened = BirthdayStore::open(dir.path().join("birthdays.json"));
    let registry = reopened.load();
    assert_eq!(registry.len(), WRITERS);
    for i in 0..WRITERS {
        assert_eq!(
            registry.get(&format!("person-{i}")),
            Some(format!("2000-01-{:02}", i + 1).as_str())
        );
    }
}

#[test]
fn concurrent_adds_and_deletes_through_dispatcher() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(BirthdayStore::open(dir.path().join("birthdays.json")));
    let dispatcher = Dispatcher::new(Arc::clone(&store));

    for i in 0..WRITERS {
        store.put(&format!("old-{i}"), "1999-12-31").unwrap();
    }

    thread::scope(|scope| {
        for i in 0..WRITERS {
            let dispatcher = dispatcher.clone();
            scope.spawn(move || {
                let sender = Sender::default();
                let added = dispatcher
                    .handle_text(&format!("/add new-{i} 2010-06-15"), &sender, None)
                    .unwrap();
                assert_eq!(added.kind, ReplyKind::Success);

                let deleted = dispatcher
                    .handle_text(&format!("/delete old-{i}"), &sender, None)
                    .unwrap();
                assert_eq!(deleted.kind, ReplyKind::Success);

                // Reads run under the same lock and always parse
                let listed = dispatcher.handle_text("/list", &sender, None).unwrap();
                assert_eq!(listed.kind, ReplyKind::Info);
            });
        }
    });

    let registry = store.load();
    assert_eq!(registry.len(), WRITERS);
    assert!(registry.records().all(|r| r.name.starts_with("new-")));
}
