use chrono::{Duration, TimeZone, Utc};
use dgp_core::store::ColumnValues;
use dgp_core::{
    DataKind, EntityKind, Oid, Scalar, SeriesStore, SqliteSeriesStore, StoreAttrs, StoreKey,
    TimeSeriesTable,
};

fn versioned_table(version: usize) -> TimeSeriesTable {
    let rows = version + 1;
    let start = Utc.with_ymd_and_hms(2018, 3, 9, 14, 0, 0).unwrap();
    let index = (0..rows)
        .map(|row| start + Duration::milliseconds(100 * row as i64))
        .collect();
    TimeSeriesTable::new(index)
        .unwrap()
        .with_column("gravity", ColumnValues::Float(vec![version as f64; rows]))
        .unwrap()
        .with_column("beam", ColumnValues::Float(vec![version as f64; rows]))
        .unwrap()
}

#[test]
fn get_on_never_written_key_is_typed_absence() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteSeriesStore::open(dir.path().join("dgpdata.sqlite3")).unwrap();
    let key = StoreKey::for_datafile(DataKind::Trajectory, Oid::new(EntityKind::DataFile));

    assert!(store.get(&key).unwrap().is_none());
    assert!(store.get_attrs(&key).unwrap().is_none());
    assert!(!store.contains(&key).unwrap());
    assert!(!store.delete(&key).unwrap());
}

#[test]
fn readers_never_observe_partially_written_tables() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteSeriesStore::open(dir.path().join("dgpdata.sqlite3")).unwrap();
    let key = StoreKey::for_datafile(DataKind::Gravity, Oid::new(EntityKind::DataFile));
    store
        .put(&key, &versioned_table(0), &StoreAttrs::new())
        .unwrap();

    std::thread::scope(|scope| {
        let writer = scope.spawn(|| {
            for version in 1..=60 {
                let mut attrs = StoreAttrs::new();
                attrs.insert("version".to_string(), Scalar::Int(version as i64));
                store.put(&key, &versioned_table(version), &attrs).unwrap();
            }
        });
        let readers: Vec<_> = (0..3)
            .map(|_| {
                scope.spawn(|| {
                    let mut last_seen = 0;
                    for _ in 0..200 {
                        let table = store.get(&key).unwrap().unwrap();
                        let version = table.len() - 1;
                        assert!(version >= last_seen);
                        for column in ["gravity", "beam"] {
                            let values = table.float_column(column).unwrap();
                            assert_eq!(values.len(), table.len());
                            assert!(values.iter().all(|value| *value == version as f64));
                        }
                        last_seen = version;
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    });

    let table = store.get(&key).unwrap().unwrap();
    assert_eq!(table.len(), 61);
    let attrs = store.get_attrs(&key).unwrap().unwrap();
    assert_eq!(attrs["version"], Scalar::Int(60));
}

#[test]
fn data_survives_reopening_the_store_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dgpdata.sqlite3");
    let key = StoreKey::for_datafile(DataKind::Gravity, Oid::new(EntityKind::DataFile));
    {
        let store = SqliteSeriesStore::open(&path).unwrap();
        store
            .put(&key, &versioned_table(4), &StoreAttrs::new())
            .unwrap();
    }

    let store = SqliteSeriesStore::open(&path).unwrap();
    assert_eq!(store.keys().unwrap(), vec![key.clone()]);
    assert_eq!(*store.get(&key).unwrap().unwrap(), versioned_table(4));
}
