//! Capability classification: how a field's type can be set.
//!
//! A field is settable through one (or more) of:
//!
//! - **primitive** coercion ([`Primitive`](crate::coerce::Primitive)): strings,
//!   bools, sized integers and floats, durations, and lists of strings or ints;
//! - the **flag-value** capability ([`FlagValue`]): a `set`/`Display` pair,
//!   used for validated scalar wrappers;
//! - the **text-codec** capability ([`TextCodec`]): marshal/unmarshal to text,
//!   used for struct-shaped values that the file decoder may produce natively.
//!
//! The flag-value capability always wins over primitive dispatch, so a
//! validated integer wrapper goes through its own validator on every path.

use std::fmt;

use toml::value::Datetime;

use crate::value::RawValue;

/// Bit width of an integer destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }
}

/// The shape of a field's type as seen by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Bool,
    Int(IntWidth),
    Uint(IntWidth),
    Float32,
    Float64,
    Duration,
    StringList,
    IntList,
    /// Anything that is not a primitive. Carries the Rust type name.
    Custom(&'static str),
}

impl ValueKind {
    pub fn is_primitive(self) -> bool {
        !matches!(self, ValueKind::Custom(_))
    }

    pub fn is_list(self) -> bool {
        matches!(self, ValueKind::StringList | ValueKind::IntList)
    }

    /// Name used in error messages (`int8`, `uint32`, `[]string`, ...).
    pub fn type_name(self) -> String {
        match self {
            ValueKind::String => "string".into(),
            ValueKind::Bool => "bool".into(),
            ValueKind::Int(w) => format!("int{}", w.bits()),
            ValueKind::Uint(w) => format!("uint{}", w.bits()),
            ValueKind::Float32 => "float32".into(),
            ValueKind::Float64 => "float64".into(),
            ValueKind::Duration => "duration".into(),
            ValueKind::StringList => "[]string".into(),
            ValueKind::IntList => "[]int".into(),
            ValueKind::Custom(name) => name.into(),
        }
    }
}

/// Derived per-field tag. `flag_value` and `text_codec` may both be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub kind: ValueKind,
    pub flag_value: bool,
    pub text_codec: bool,
}

/// The path a value takes into a field, after precedence is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    FlagValue,
    Primitive(ValueKind),
    TextCodec,
    Unsupported,
}

/// Which kind of command-line flag a field gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    /// Free-form text validated by the type's own `set`.
    Value,
    Primitive(ValueKind),
}

impl Capability {
    pub fn primitive(kind: ValueKind) -> Self {
        Self {
            kind,
            flag_value: false,
            text_codec: false,
        }
    }

    pub fn custom(type_name: &'static str, flag_value: bool, text_codec: bool) -> Self {
        Self {
            kind: ValueKind::Custom(type_name),
            flag_value,
            text_codec,
        }
    }

    pub fn dispatch(&self) -> Dispatch {
        if self.flag_value {
            Dispatch::FlagValue
        } else if self.kind.is_primitive() {
            Dispatch::Primitive(self.kind)
        } else if self.text_codec {
            Dispatch::TextCodec
        } else {
            Dispatch::Unsupported
        }
    }

    /// How the field is registered on the command line, if it can be at all.
    /// Text-codec-only types have no command-line form.
    pub fn flag_kind(&self) -> Option<FlagKind> {
        match self.dispatch() {
            Dispatch::FlagValue => Some(FlagKind::Value),
            Dispatch::Primitive(kind) => Some(FlagKind::Primitive(kind)),
            Dispatch::TextCodec | Dispatch::Unsupported => None,
        }
    }

    /// Whether values from the config file or the environment can reach the field.
    pub fn storable(&self) -> bool {
        self.dispatch() != Dispatch::Unsupported
    }
}

/// A type that parses and validates its own command-line text.
///
/// `Display` is the matching renderer; it is used for defaults and help.
pub trait FlagValue: fmt::Display {
    fn set(&mut self, value: &str) -> Result<(), String>;
}

/// A type with a text serialization, used for struct-shaped values.
pub trait TextCodec {
    fn unmarshal_text(&mut self, text: &[u8]) -> Result<(), String>;

    fn marshal_text(&self) -> Result<Vec<u8>, String>;

    /// Take a value the file decoder already produced in this type's native
    /// form. Returns `false` when `raw` has some other shape, in which case
    /// the text path is used.
    fn assign_native(&mut self, _raw: &RawValue) -> bool {
        false
    }
}

impl TextCodec for Datetime {
    fn unmarshal_text(&mut self, text: &[u8]) -> Result<(), String> {
        let text = std::str::from_utf8(text).map_err(|e| e.to_string())?;
        *self = text
            .trim()
            .parse::<Datetime>()
            .map_err(|e| format!("parsing time {text:?}: {e}"))?;
        Ok(())
    }

    fn marshal_text(&self) -> Result<Vec<u8>, String> {
        Ok(self.to_string().into_bytes())
    }

    fn assign_native(&mut self, raw: &RawValue) -> bool {
        match raw {
            RawValue::Datetime(d) => {
                *self = d.clone();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_value_beats_primitive_shape() {
        let cap = Capability {
            kind: ValueKind::Int(IntWidth::W64),
            flag_value: true,
            text_codec: false,
        };
        assert_eq!(cap.dispatch(), Dispatch::FlagValue);
        assert_eq!(cap.flag_kind(), Some(FlagKind::Value));
    }

    #[test]
    fn primitive_dispatches_on_kind() {
        let cap = Capability::primitive(ValueKind::Uint(IntWidth::W16));
        assert_eq!(
            cap.dispatch(),
            Dispatch::Primitive(ValueKind::Uint(IntWidth::W16))
        );
        assert!(cap.storable());
    }

    #[test]
    fn codec_only_is_storable_but_not_a_flag() {
        let cap = Capability::custom("Datetime", false, true);
        assert_eq!(cap.dispatch(), Dispatch::TextCodec);
        assert!(cap.storable());
        assert_eq!(cap.flag_kind(), None);
    }

    #[test]
    fn flag_and_codec_prefers_flag() {
        let cap = Capability::custom("IpValue", true, true);
        assert_eq!(cap.dispatch(), Dispatch::FlagValue);
    }

    #[test]
    fn opaque_is_unsupported() {
        let cap = Capability::custom("Complex", false, false);
        assert_eq!(cap.dispatch(), Dispatch::Unsupported);
        assert!(!cap.storable());
        assert_eq!(cap.flag_kind(), None);
    }

    #[test]
    fn kind_names() {
        assert_eq!(ValueKind::Int(IntWidth::W8).type_name(), "int8");
        assert_eq!(ValueKind::Uint(IntWidth::W32).type_name(), "uint32");
        assert_eq!(ValueKind::IntList.type_name(), "[]int");
        assert!(ValueKind::IntList.is_list());
    }

    #[test]
    fn datetime_codec_roundtrips_text() {
        let mut dt: Datetime = "2000-01-01T00:00:00Z".parse().unwrap();
        dt.unmarshal_text(b"2020-02-02T10:00:00Z").unwrap();
        assert_eq!(dt.to_string(), "2020-02-02T10:00:00Z");
        assert_eq!(dt.marshal_text().unwrap(), b"2020-02-02T10:00:00Z".to_vec());
    }

    #[test]
    fn datetime_codec_reports_parse_errors() {
        let mut dt: Datetime = "2000-01-01T00:00:00Z".parse().unwrap();
        let err = dt.unmarshal_text(b"yesterday").unwrap_err();
        assert!(err.starts_with("parsing time"));
    }

    #[test]
    fn datetime_takes_native_values() {
        let mut dt: Datetime = "2000-01-01T00:00:00Z".parse().unwrap();
        let native: Datetime = "1979-05-27T07:32:00Z".parse().unwrap();
        assert!(dt.assign_native(&RawValue::Datetime(native.clone())));
        assert_eq!(dt, native);
        assert!(!dt.assign_native(&RawValue::Int(1)));
    }
}
