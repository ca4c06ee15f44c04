#[cfg(test)]
mod tests {
    use crate::infrastructure::{CollaboratorRecord, LeaseRecord, RegistryStore};
    use crate::infrastructure_in_memory::InMemoryRegistryStore;
    use crate::infrastructure_json::JsonFileStore;
    use crate::registry::Registry;
    use crate::types::{Capacity, Priority, ResourceSpec};

    fn sample_registry(store: Box<dyn RegistryStore + Send + Sync>) -> Registry {
        let mut reg = Registry::new(Capacity::new(64, 4), store);
        reg.register(
            "svc-a",
            "http://127.0.0.1:8001/unload_model",
            vec![ResourceSpec::new("bge-large", 20), ResourceSpec::new("rerank", 4)],
            Some(Priority::Low),
            1_000,
        )
        .unwrap();
        reg.register(
            "svc-b",
            "http://127.0.0.1:8002/unload_model",
            vec![ResourceSpec::new("qwq-32b", 30)],
            Some(Priority::High),
            2_000,
        )
        .unwrap();
        reg.release_resource("svc-a", "rerank").unwrap();
        reg
    }

    #[test]
    fn test_in_memory_store_round_trip() {
        let mut store = InMemoryRegistryStore::new();
        assert!(store.load().unwrap().is_empty());

        let records = vec![CollaboratorRecord {
            name: "svc".to_string(),
            callback: None,
            priority: Priority::Medium,
            leases: vec![LeaseRecord {
                resource: "m".to_string(),
                amount: 3,
                loaded: true,
            }],
        }];
        store.save(&records).unwrap();
        assert_eq!(store.load().unwrap(), records);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_json_store_round_trip_through_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("registry.json");

        let reg = sample_registry(Box::new(JsonFileStore::new(&path)));
        let before = reg.records();
        drop(reg);
        assert!(path.exists());

        let (reloaded, notices) =
            Registry::open(Capacity::new(64, 4), Box::new(JsonFileStore::new(&path)), 99);
        assert!(notices.is_empty());
        assert_eq!(reloaded.records(), before);
        assert_eq!(reloaded.used(), 50);
        assert_eq!(
            reloaded.collaborator("svc-b").unwrap().lease("qwq-32b").unwrap().last_used,
            99
        );
    }

    #[test]
    fn test_json_store_missing_or_empty_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let store = JsonFileStore::new(&path);
        assert!(store.load().unwrap().is_empty());

        std::fs::write(&path, "  \n").unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_json_store_accepts_minimal_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(
            &path,
            r#"[{"name": "ocr", "callback": "http://ocr/unload_model",
                 "leases": [{"resource": "tesseract", "amount": 2}]}]"#,
        )
        .unwrap();

        let records = JsonFileStore::new(&path).load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].priority, Priority::Medium);
        assert!(records[0].leases[0].loaded);
    }

    #[test]
    fn test_json_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(JsonFileStore::new(&path).load().is_err());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_store_round_trip_through_registry() {
        use crate::infrastructure_sqlite::SqliteRegistryStore;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");
        let path = path.to_str().unwrap();

        let reg = sample_registry(Box::new(SqliteRegistryStore::open(path).unwrap()));
        let before = reg.records();
        drop(reg);

        let store = SqliteRegistryStore::open(path).unwrap();
        assert_eq!(store.load().unwrap(), before);

        let (reloaded, _) = Registry::open(Capacity::new(64, 4), Box::new(store), 0);
        assert_eq!(reloaded.records(), before);
        assert_eq!(reloaded.collaborator("svc-a").unwrap().priority, Priority::Low);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_store_refuses_amounts_it_cannot_hold() {
        use crate::error::StoreError;
        use crate::infrastructure_sqlite::SqliteRegistryStore;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.db");
        let path = path.to_str().unwrap();

        let mut store = SqliteRegistryStore::open(path).unwrap();
        let good = vec![CollaboratorRecord {
            name: "svc-a".to_string(),
            callback: Some("http://127.0.0.1:8001/unload_model".to_string()),
            priority: Priority::Medium,
            leases: vec![LeaseRecord {
                resource: "bge-large".to_string(),
                amount: 1_300,
                loaded: true,
            }],
        }];
        store.save(&good).unwrap();

        let mut oversized = good.clone();
        oversized[0].leases[0].amount = u64::MAX;
        let err = store.save(&oversized).unwrap_err();
        assert!(matches!(
            err,
            StoreError::AmountOutOfRange { ref resource, amount } if resource == "bge-large" && amount == i128::from(u64::MAX)
        ));
        // The failed save rolled back
        assert_eq!(store.load().unwrap(), good);

        // A negative amount written behind the store's back is not clamped to 0
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute("UPDATE leases SET amount = -5 WHERE resource = 'bge-large'", [])
            .unwrap();
        drop(conn);
        let err = store.load().unwrap_err();
        assert!(matches!(err, StoreError::AmountOutOfRange { amount: -5, .. }));
    }
}
