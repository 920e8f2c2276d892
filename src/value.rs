//! Dynamically typed values produced by the config file decoder and the
//! environment reader.
//!
//! [`RawValue`] is a closed set: every coercion in [`coerce`](crate::coerce)
//! is an exhaustive match over it. Values coming from the environment or the
//! command line are always [`RawValue::String`]; the TOML decoder produces the
//! native variants.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use toml::value::Datetime;

use crate::coerce::format_duration;
use crate::error::LayerfigError;

#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    String(String),
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Duration(Duration),
    Datetime(Datetime),
    Bytes(Vec<u8>),
    List(Vec<RawValue>),
    Table(BTreeMap<String, RawValue>),
}

impl RawValue {
    /// Short name of the variant, used in conversion error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            RawValue::String(_) => "string",
            RawValue::Bool(_) => "bool",
            RawValue::Int(_) => "int64",
            RawValue::Uint(_) => "uint64",
            RawValue::Float(_) => "float64",
            RawValue::Duration(_) => "duration",
            RawValue::Datetime(_) => "datetime",
            RawValue::Bytes(_) => "bytes",
            RawValue::List(_) => "list",
            RawValue::Table(_) => "table",
        }
    }

    /// Convert back into a TOML value so serde can drive structured decoding.
    ///
    /// Durations are rendered in their textual form; bytes become a lossy
    /// UTF-8 string.
    pub fn to_toml(&self) -> Result<toml::Value, String> {
        Ok(match self {
            RawValue::String(s) => toml::Value::String(s.clone()),
            RawValue::Bool(b) => toml::Value::Boolean(*b),
            RawValue::Int(i) => toml::Value::Integer(*i),
            RawValue::Uint(u) => toml::Value::Integer(
                i64::try_from(*u).map_err(|_| format!("{u} does not fit a TOML integer"))?,
            ),
            RawValue::Float(f) => toml::Value::Float(*f),
            RawValue::Duration(d) => toml::Value::String(format_duration(*d)),
            RawValue::Datetime(d) => toml::Value::Datetime(d.clone()),
            RawValue::Bytes(b) => toml::Value::String(String::from_utf8_lossy(b).into_owned()),
            RawValue::List(items) => toml::Value::Array(
                items
                    .iter()
                    .map(RawValue::to_toml)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            RawValue::Table(entries) => {
                let mut table = toml::Table::new();
                for (k, v) in entries {
                    table.insert(k.clone(), v.to_toml()?);
                }
                toml::Value::Table(table)
            }
        })
    }

    /// Decode this value into any deserializable type.
    ///
    /// This is the structured path used by extension parsers for sections
    /// that cannot be expressed as scalar fields (arrays of tables and so on).
    pub fn deserialize_into<T: DeserializeOwned>(&self, key: &str) -> Result<T, LayerfigError> {
        let value = self
            .to_toml()
            .map_err(|reason| LayerfigError::Extension {
                key: key.to_string(),
                reason,
            })?;
        value.try_into().map_err(|e: toml::de::Error| LayerfigError::Extension {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

impl From<toml::Value> for RawValue {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => RawValue::String(s),
            toml::Value::Integer(i) => RawValue::Int(i),
            toml::Value::Float(f) => RawValue::Float(f),
            toml::Value::Boolean(b) => RawValue::Bool(b),
            toml::Value::Datetime(d) => RawValue::Datetime(d),
            toml::Value::Array(items) => {
                RawValue::List(items.into_iter().map(RawValue::from).collect())
            }
            toml::Value::Table(table) => RawValue::Table(
                table
                    .into_iter()
                    .map(|(k, v)| (k, RawValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::String(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::String(s)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::String(s) => f.write_str(s),
            RawValue::Bool(b) => write!(f, "{b}"),
            RawValue::Int(i) => write!(f, "{i}"),
            RawValue::Uint(u) => write!(f, "{u}"),
            RawValue::Float(v) => write!(f, "{v}"),
            RawValue::Duration(d) => f.write_str(&format_duration(*d)),
            RawValue::Datetime(d) => write!(f, "{d}"),
            RawValue::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            RawValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            RawValue::Table(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k} = {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn toml_scalars_map_to_native_variants() {
        assert_eq!(RawValue::from(toml::Value::Integer(5)), RawValue::Int(5));
        assert_eq!(RawValue::from(toml::Value::Float(1.5)), RawValue::Float(1.5));
        assert_eq!(
            RawValue::from(toml::Value::Boolean(true)),
            RawValue::Bool(true)
        );
        assert_eq!(
            RawValue::from(toml::Value::String("x".into())),
            RawValue::String("x".into())
        );
    }

    #[test]
    fn datetime_stays_native() {
        let doc: toml::Table = toml::from_str("when = 1979-05-27T07:32:00Z").unwrap();
        let raw = RawValue::from(doc["when"].clone());
        assert!(matches!(raw, RawValue::Datetime(_)));
    }

    #[test]
    fn display_renders_lists_and_tables() {
        let list = RawValue::List(vec![RawValue::Int(1), RawValue::String("a".into())]);
        assert_eq!(list.to_string(), "[1, a]");

        let mut entries = BTreeMap::new();
        entries.insert("k".to_string(), RawValue::Bool(false));
        assert_eq!(RawValue::Table(entries).to_string(), "{k = false}");
    }

    #[test]
    fn deserialize_array_of_tables() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct NameValue {
            name: String,
            value: i64,
        }

        let doc: toml::Table = toml::from_str(
            r#"
[[nv]]
name = "a"
value = 1

[[nv]]
name = "b"
value = 2
"#,
        )
        .unwrap();
        let raw = RawValue::from(doc["nv"].clone());
        let decoded: Vec<NameValue> = raw.deserialize_into("nv").unwrap();
        assert_eq!(
            decoded,
            vec![
                NameValue {
                    name: "a".into(),
                    value: 1
                },
                NameValue {
                    name: "b".into(),
                    value: 2
                },
            ]
        );
    }

    #[test]
    fn deserialize_mismatch_names_key() {
        let raw = RawValue::String("not a number".into());
        let err = raw.deserialize_into::<i64>("custom.count").unwrap_err();
        assert!(err.to_string().contains("custom.count"));
    }

    #[test]
    fn huge_unsigned_cannot_become_toml() {
        assert!(RawValue::Uint(u64::MAX).to_toml().is_err());
        assert!(RawValue::Uint(7).to_toml().is_ok());
    }
}
