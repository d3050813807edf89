//! Property tests for path addressing in configuration nodes

use confmgr_node::{ConfigNode, ConfigPath, Value};
use proptest::prelude::*;

fn key() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_-]{0,8}"
}

fn dotted() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(key(), 1..5)
}

proptest! {
    #[test]
    fn set_then_get_returns_value(segments in dotted(), n in any::<i64>()) {
        let path: ConfigPath = segments.join(".").parse().unwrap();
        let mut node = ConfigNode::new();
        node.set_path(&path, n);
        prop_assert_eq!(node.get_path(&path), Some(&Value::Int(n)));
    }

    #[test]
    fn display_parse_round_trip(segments in dotted()) {
        let text = segments.join(".");
        let path: ConfigPath = text.parse().unwrap();
        prop_assert_eq!(path.to_string(), text);
        prop_assert_eq!(path.len(), segments.len());
    }

    #[test]
    fn later_writes_win(segments in dotted(), a in any::<i64>(), b in any::<i64>()) {
        let path: ConfigPath = segments.join(".").parse().unwrap();
        let mut node = ConfigNode::new();
        node.set_path(&path, a);
        let previous = node.set_path(&path, b);
        prop_assert_eq!(previous, Some(Value::Int(a)));
        prop_assert_eq!(node.get_path(&path), Some(&Value::Int(b)));
    }
}
