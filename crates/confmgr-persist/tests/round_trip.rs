//! Save/load fidelity for typed scalars

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use confmgr_node::{ConfigPath, TypeHint, Value};
use confmgr_persist::{BackupLedger, BackupPolicy, Document, YamlStore};
use confmgr_test_utils::TempConfigDir;
use proptest::prelude::*;

fn stamp() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn datetime() -> impl Strategy<Value = NaiveDateTime> {
    (1970_i32..2100, 1_u32..=12, 1_u32..=28, 0_u32..24, 0_u32..60, 0_u32..60, 0_u32..1_000_000)
        .prop_map(|(y, mo, d, h, mi, s, us)| {
            NaiveDate::from_ymd_opt(y, mo, d)
                .unwrap()
                .and_hms_micro_opt(h, mi, s, us)
                .unwrap()
        })
}

fn scalar() -> impl Strategy<Value = (Value, Option<TypeHint>)> {
    prop_oneof![
        any::<bool>().prop_map(|b| (Value::Bool(b), None)),
        any::<i64>().prop_map(|i| (Value::Int(i), None)),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(|f| (Value::Float(f), None)),
        "[a-zA-Z0-9 :#!&*{},.é中\\[\\]'\"-]{0,24}".prop_map(|s| (Value::Str(s), None)),
        datetime().prop_map(|dt| (Value::DateTime(dt), Some(TypeHint::DateTime))),
        "[a-z/_.]{1,20}".prop_map(|p| (Value::Path(PathBuf::from(p)), Some(TypeHint::Path))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn typed_scalars_survive_save_and_load((value, hint) in scalar()) {
        let dir = TempConfigDir::new();
        let path = dir.path("config.yaml");
        let store = YamlStore::new(BackupPolicy::Disabled, Arc::new(BackupLedger::new()));

        let key: ConfigPath = "section.value".parse().unwrap();
        let mut doc = Document::empty();
        doc.data.set_path(&key, value.clone());
        if let Some(hint) = hint {
            doc.type_hints.insert(&key, hint);
        }

        store.save(&path, &doc, stamp()).unwrap();
        let loaded = store.load(&path).unwrap();
        prop_assert_eq!(loaded.document.data.get_path(&key), Some(&value));
    }
}
