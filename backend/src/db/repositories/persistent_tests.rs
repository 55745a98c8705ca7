use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use tempfile::TempDir;

use super::*;

fn repo_in(dir: &TempDir, file: &str) -> PersistentRepository<String, u64> {
    PersistentRepository::new("counters", dir.path().join(file), |_| 0)
}

#[test]
fn test_get_returns_default_without_inserting() {
    let dir = TempDir::new().unwrap();
    let repo: PersistentRepository<String, u64> =
        PersistentRepository::new("counters", dir.path().join("c.json"), |k: &String| {
            k.len() as u64
        });

    assert_eq!(repo.get(&"abc".to_string()), 3);
    assert!(repo.find(&"abc".to_string()).is_none());
    assert!(repo.is_empty());
    assert!(!repo.is_dirty());
}

#[test]
fn test_update_creates_from_default_and_marks_dirty() {
    let dir = TempDir::new().unwrap();
    let repo = repo_in(&dir, "c.json");

    repo.update("a".to_string(), |v| *v += 5);
    repo.update("a".to_string(), |v| *v += 1);

    assert_eq!(repo.get(&"a".to_string()), 6);
    assert!(repo.is_dirty());
}

#[test]
fn test_update_all_if_changed_only_dirties_on_change() {
    let dir = TempDir::new().unwrap();
    let repo = repo_in(&dir, "c.json");

    assert!(!repo.update_all_if_changed(|entries| entries.contains_key("a")));
    assert!(!repo.is_dirty());

    assert!(repo.update_all_if_changed(|entries| entries.insert("a".to_string(), 1).is_none()));
    assert!(repo.is_dirty());
}

#[test]
fn test_flush_then_restore_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deeper").join("c.json");

    let repo: PersistentRepository<String, u64> =
        PersistentRepository::new("counters", &path, |_| 0);
    for i in 0..25u64 {
        repo.put(format!("key-{:02}", i), i * i);
    }
    repo.flush().unwrap();
    assert!(path.exists());
    assert!(!repo.is_dirty());

    let fresh: PersistentRepository<String, u64> =
        PersistentRepository::new("counters", &path, |_| 0);
    assert_eq!(fresh.restore().unwrap(), 25);
    assert_eq!(fresh.entries(), repo.entries());
}

#[test]
fn test_restore_missing_file_starts_empty() {
    let dir = TempDir::new().unwrap();
    let repo = repo_in(&dir, "absent.json");
    assert_eq!(repo.restore().unwrap(), 0);
    assert!(repo.is_empty());
}

#[test]
fn test_restore_corrupt_file_is_persistence_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("c.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let repo = repo_in(&dir, "c.json");
    repo.put("kept".to_string(), 1);

    let err = repo.restore().unwrap_err();
    assert!(err.is_persistence());
    assert_eq!(err.context().operation.as_deref(), Some("restore"));
    // State is left as it was.
    assert_eq!(repo.get(&"kept".to_string()), 1);
}

#[test]
fn test_flush_into_unwritable_location_fails() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"file, not a directory").unwrap();

    let repo: PersistentRepository<String, u64> =
        PersistentRepository::new("counters", blocker.join("c.json"), |_| 0);
    repo.put("a".to_string(), 1);

    let err = repo.flush().unwrap_err();
    assert!(err.is_persistence());
    assert!(repo.is_dirty());
}

#[test]
fn test_flush_if_dirty_skips_clean_repository() {
    let dir = TempDir::new().unwrap();
    let repo = repo_in(&dir, "c.json");

    assert!(!repo.flush_if_dirty().unwrap());
    assert!(!dir.path().join("c.json").exists());

    repo.put("a".to_string(), 1);
    assert!(repo.flush_if_dirty().unwrap());
    assert!(!repo.flush_if_dirty().unwrap());
}

#[test]
fn test_range_is_inclusive_and_ordered() {
    let dir = TempDir::new().unwrap();
    let repo: PersistentRepository<u32, u32> =
        PersistentRepository::new("numbers", dir.path().join("n.json"), |_| 0);
    for k in [9, 1, 5, 3, 7] {
        repo.put(k, k * 10);
    }

    let keys: Vec<u32> = repo.range(3..=7).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![3, 5, 7]);
    assert!(repo.range(8..=2).is_empty());
    assert_eq!(repo.keys(), vec![1, 3, 5, 7, 9]);
}

#[test]
fn test_custom_codec_is_used() {
    struct LinesCodec;

    impl SnapshotCodec<u32, u32> for LinesCodec {
        fn encode(&self, entries: &BTreeMap<u32, u32>) -> Result<Vec<u8>, CodecError> {
            let text: Vec<String> = entries.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            Ok(text.join("\n").into_bytes())
        }

        fn decode(&self, bytes: &[u8]) -> Result<BTreeMap<u32, u32>, CodecError> {
            let text = std::str::from_utf8(bytes)?;
            let mut map = BTreeMap::new();
            for line in text.lines().filter(|l| !l.is_empty()) {
                let (k, v) = line.split_once('=').ok_or("missing '='")?;
                map.insert(k.parse()?, v.parse()?);
            }
            Ok(map)
        }
    }

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("n.txt");
    let repo = PersistentRepository::with_codec("numbers", &path, LinesCodec, |_| 0);
    repo.put(1, 2);
    repo.put(3, 4);
    repo.flush().unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "1=2\n3=4");

    let fresh = PersistentRepository::with_codec("numbers", &path, LinesCodec, |_| 0);
    fresh.restore().unwrap();
    assert_eq!(fresh.get(&3), 4);
}

#[test]
fn test_concurrent_updates_are_not_lost() {
    let dir = TempDir::new().unwrap();
    let repo = Arc::new(repo_in(&dir, "c.json"));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                for _ in 0..500 {
                    repo.update("shared".to_string(), |v| *v += 1);
                }
            })
        })
        .collect();

    let flusher = {
        let repo = Arc::clone(&repo);
        thread::spawn(move || {
            for _ in 0..20 {
                repo.flush().unwrap();
            }
        })
    };

    for h in handles {
        h.join().unwrap();
    }
    flusher.join().unwrap();

    assert_eq!(repo.get(&"shared".to_string()), 4000);
    repo.flush().unwrap();

    let fresh = repo_in(&dir, "c.json");
    fresh.restore().unwrap();
    assert_eq!(fresh.get(&"shared".to_string()), 4000);
}
