//! YAML text ↔ [`Value`] conversion
//!
//! Parsing builds owned values straight from the YAML event stream, so an
//! alias (`*name`) is expanded into an independent copy of its anchor at
//! the point it is read: two keys that shared one anchored map in the file
//! are two separate subtrees in memory. Emitting never produces anchors.
//!
//! The parser is lenient where configuration files in the wild are sloppy:
//!
//! - duplicate keys in one mapping keep the first occurrence
//! - merge keys (`<<: *base`) are applied, explicit keys win
//! - custom tags (`!secret value`) are dropped, the tagged value is kept

use std::fmt;

use confmgr_node::{format_datetime, ConfigNode, Value};
use serde::de::{self, Deserialize, Deserializer, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde_yaml::{Mapping, Number};

const MERGE_KEY: &str = "<<";

/// A parsed YAML node plus what had to be discarded to build it
#[derive(Debug, Default)]
pub(crate) struct Parsed {
    pub(crate) value: Value,
    pub(crate) duplicates: Vec<String>,
}

impl Parsed {
    fn scalar(value: Value) -> Self {
        Self {
            value,
            duplicates: Vec::new(),
        }
    }
}

/// Parse YAML text into an owned value tree
pub(crate) fn parse(text: &str) -> Result<Parsed, serde_yaml::Error> {
    serde_yaml::from_str(text)
}

impl<'de> Deserialize<'de> for Parsed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ParsedVisitor)
    }
}

struct ParsedVisitor;

impl<'de> Visitor<'de> for ParsedVisitor {
    type Value = Parsed;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any YAML value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Parsed, E> {
        Ok(Parsed::scalar(Value::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Parsed, E> {
        Ok(Parsed::scalar(Value::Int(v)))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Parsed, E> {
        Ok(Parsed::scalar(
            i64::try_from(v).map_or(Value::Float(v as f64), Value::Int),
        ))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Parsed, E> {
        Ok(Parsed::scalar(Value::Float(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Parsed, E> {
        Ok(Parsed::scalar(Value::Str(v.to_string())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Parsed, E> {
        Ok(Parsed::scalar(Value::Str(v)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Parsed, E> {
        Ok(Parsed::scalar(Value::Null))
    }

    fn visit_none<E: de::Error>(self) -> Result<Parsed, E> {
        Ok(Parsed::scalar(Value::Null))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Parsed, D::Error> {
        Parsed::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Parsed, A::Error> {
        let mut items = Vec::new();
        let mut duplicates = Vec::new();
        while let Some(item) = seq.next_element::<Parsed>()? {
            duplicates.extend(item.duplicates);
            items.push(item.value);
        }
        Ok(Parsed {
            value: Value::List(items),
            duplicates,
        })
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Parsed, A::Error> {
        let mut node = ConfigNode::new();
        let mut duplicates = Vec::new();
        let mut merges = Vec::new();

        while let Some(key) = map.next_key::<Parsed>()? {
            let value = map.next_value::<Parsed>()?;
            duplicates.extend(value.duplicates);
            let key = key_text(&key.value).map_err(de::Error::custom)?;
            if key == MERGE_KEY {
                merges.push(value.value);
            } else if node.contains_key(&key) {
                duplicates.push(key);
            } else {
                node.insert(key, value.value);
            }
        }

        for merge in merges {
            match merge {
                Value::Node(base) => merge_missing(&mut node, base),
                Value::List(bases) => {
                    for base in bases {
                        match base {
                            Value::Node(base) => merge_missing(&mut node, base),
                            other => {
                                return Err(de::Error::custom(format!(
                                    "merge key expects mappings, found {}",
                                    other.kind()
                                )))
                            }
                        }
                    }
                }
                other => {
                    return Err(de::Error::custom(format!(
                        "merge key expects a mapping, found {}",
                        other.kind()
                    )))
                }
            }
        }

        Ok(Parsed {
            value: Value::Node(node),
            duplicates,
        })
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Parsed, A::Error> {
        let (tag, variant): (String, _) = data.variant()?;
        tracing::debug!(tag = %tag, "ignoring YAML tag");
        variant.newtype_variant::<Parsed>()
    }
}

fn merge_missing(node: &mut ConfigNode, base: ConfigNode) {
    for (key, value) in base {
        if !node.contains_key(&key) {
            node.insert(key, value);
        }
    }
}

fn key_text(key: &Value) -> Result<String, String> {
    match key {
        Value::Str(s) => Ok(s.clone()),
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) => Ok(key.to_string()),
        other => Err(format!("unsupported {} mapping key", other.kind())),
    }
}

/// Render a value as a `serde_yaml` tree
pub(crate) fn to_yaml(value: &Value) -> serde_yaml::Value {
    use serde_yaml::Value as Y;
    match value {
        Value::Null => Y::Null,
        Value::Bool(b) => Y::Bool(*b),
        Value::Int(i) => Y::Number(Number::from(*i)),
        Value::Float(f) => Y::Number(Number::from(*f)),
        Value::Str(s) => Y::String(s.clone()),
        Value::DateTime(dt) => Y::String(format_datetime(dt)),
        Value::Path(p) => Y::String(p.to_string_lossy().into_owned()),
        Value::List(items) => Y::Sequence(items.iter().map(to_yaml).collect()),
        Value::Node(node) => Y::Mapping(node_to_yaml(node)),
    }
}

/// Render a node as a `serde_yaml` mapping, keeping key order
pub(crate) fn node_to_yaml(node: &ConfigNode) -> Mapping {
    node.iter()
        .map(|(k, v)| (serde_yaml::Value::String(k.to_string()), to_yaml(v)))
        .collect()
}

/// Count alias markers (`*name`) in raw YAML text
///
/// Quoted scalars and comments are skipped. Used only for reporting how
/// many shared references were expanded during a load.
pub(crate) fn count_aliases(text: &str) -> usize {
    let mut count = 0;
    for line in text.lines() {
        let mut quote: Option<char> = None;
        let mut prev = ' ';
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None => match c {
                    '\'' | '"' if prev.is_whitespace() || "[{,:-".contains(prev) => quote = Some(c),
                    '#' if prev.is_whitespace() => break,
                    '*' if prev.is_whitespace() || "[{,".contains(prev) => {
                        if chars
                            .peek()
                            .is_some_and(|n| n.is_alphanumeric() || *n == '_' || *n == '-')
                        {
                            count += 1;
                        }
                    }
                    _ => {}
                },
            }
            prev = c;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use confmgr_node::ConfigPath;
    use pretty_assertions::assert_eq;

    fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
        value
            .as_node()?
            .get_path(&path.parse::<ConfigPath>().unwrap())
    }

    #[test]
    fn aliases_become_independent_copies() {
        let text = "base: &b\n  host: localhost\n  port: 80\na: *b\nb: *b\n";
        let parsed = parse(text).unwrap();
        assert_eq!(get(&parsed.value, "a.host"), Some(&Value::from("localhost")));
        assert_eq!(get(&parsed.value, "b.port"), Some(&Value::Int(80)));

        let mut root = parsed.value.as_node().unwrap().clone();
        root.set_path(&"a.host".parse().unwrap(), "changed");
        assert_eq!(
            root.get_path(&"b.host".parse().unwrap()),
            Some(&Value::from("localhost"))
        );
        assert_eq!(count_aliases(text), 2);
    }

    #[test]
    fn duplicate_keys_keep_first() {
        let parsed = parse("a: 1\nb: 2\na: 3\n").unwrap();
        assert_eq!(get(&parsed.value, "a"), Some(&Value::Int(1)));
        assert_eq!(parsed.duplicates, ["a"]);
    }

    #[test]
    fn merge_keys_fill_missing_entries() {
        let text = "base: &b\n  x: 1\n  y: 2\nchild:\n  <<: *b\n  y: 3\n";
        let parsed = parse(text).unwrap();
        assert_eq!(get(&parsed.value, "child.x"), Some(&Value::Int(1)));
        assert_eq!(get(&parsed.value, "child.y"), Some(&Value::Int(3)));
        assert!(get(&parsed.value, "child.<<").is_none());
    }

    #[test]
    fn scalars_and_tags() {
        let parsed = parse("i: -4\nf: 2.5\ns: '12'\nn: ~\nt: !secret hunter2\nbig: 18446744073709551615\n").unwrap();
        assert_eq!(get(&parsed.value, "i"), Some(&Value::Int(-4)));
        assert_eq!(get(&parsed.value, "f"), Some(&Value::Float(2.5)));
        assert_eq!(get(&parsed.value, "s"), Some(&Value::from("12")));
        assert_eq!(get(&parsed.value, "n"), Some(&Value::Null));
        assert_eq!(get(&parsed.value, "t"), Some(&Value::from("hunter2")));
        assert!(matches!(get(&parsed.value, "big"), Some(Value::Float(_))));
    }

    #[test]
    fn empty_text_is_null() {
        assert_eq!(parse("").unwrap().value, Value::Null);
        assert_eq!(parse("# only a comment\n").unwrap().value, Value::Null);
    }

    #[test]
    fn emitted_yaml_has_no_anchors() {
        let parsed = parse("base: &b {k: v}\na: *b\nb: *b\n").unwrap();
        let text = serde_yaml::to_string(&to_yaml(&parsed.value)).unwrap();
        assert!(!text.contains('&'));
        assert!(!text.contains('*'));
        assert_eq!(parse(&text).unwrap().value, parsed.value);
    }

    #[test]
    fn alias_count_skips_quotes_and_comments() {
        assert_eq!(count_aliases("a: '*not'\nb: x # *nope\nc: 2 * 3\n"), 0);
        assert_eq!(count_aliases("list: [*a, *b]\n- *c\n"), 3);
    }
}
