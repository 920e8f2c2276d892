//! Field descriptors: the explicit registration API the binder compiles.
//!
//! A [`Field`] pairs a name and an annotation with a type-erased slot that
//! knows how to read the field's default and assign coerced values into it.
//! The slot is picked by the constructor, which is where the field's
//! capability is decided:
//!
//! | constructor            | capability                   |
//! |------------------------|------------------------------|
//! | [`Field::primitive`]   | primitive scalar or list     |
//! | [`Field::flag`]        | flag-value                   |
//! | [`Field::codec`]       | text-codec                   |
//! | [`Field::flag_codec`]  | flag-value and text-codec    |
//! | [`Field::opaque`]      | none (extension-only)        |

use std::marker::PhantomData;

use crate::capability::{Capability, FlagValue, TextCodec};
use crate::coerce::Primitive;
use crate::error::LayerfigError;
use crate::value::RawValue;

/// Accessor pair from a config struct `C` to one of its fields.
///
/// Build with [`lens!`](crate::lens) or [`Lens::new`].
pub struct Lens<C, T> {
    get: fn(&C) -> &T,
    get_mut: fn(&mut C) -> &mut T,
}

impl<C, T> Lens<C, T> {
    pub fn new(get: fn(&C) -> &T, get_mut: fn(&mut C) -> &mut T) -> Self {
        Self { get, get_mut }
    }

    pub fn get<'a>(&self, cfg: &'a C) -> &'a T {
        (self.get)(cfg)
    }

    pub fn get_mut<'a>(&self, cfg: &'a mut C) -> &'a mut T {
        (self.get_mut)(cfg)
    }
}

impl<C, T> Clone for Lens<C, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, T> Copy for Lens<C, T> {}

/// Build a [`Lens`] for a (possibly nested) struct field.
///
/// ```ignore
/// let lens = lens!(AppConfig, server.port);
/// ```
#[macro_export]
macro_rules! lens {
    ($ty:ty, $($field:tt).+) => {
        $crate::Lens::<$ty, _>::new(
            |c: &$ty| &c.$($field).+,
            |c: &mut $ty| &mut c.$($field).+,
        )
    };
}

/// Type-erased access to one field of `C`.
pub(crate) trait Slot<C>: Send + Sync {
    fn capability(&self) -> Capability;

    /// The field's current value rendered for the store's default layer.
    fn render(&self, cfg: &C) -> Option<RawValue>;

    /// Coerce `raw` and assign it. `key` names the source in errors.
    fn apply(&self, cfg: &mut C, key: &str, raw: &RawValue) -> Result<(), LayerfigError>;
}

struct PrimitiveSlot<C, T>(Lens<C, T>);

impl<C, T: Primitive> Slot<C> for PrimitiveSlot<C, T> {
    fn capability(&self) -> Capability {
        Capability::primitive(T::KIND)
    }

    fn render(&self, cfg: &C) -> Option<RawValue> {
        Some(self.0.get(cfg).render())
    }

    fn apply(&self, cfg: &mut C, key: &str, raw: &RawValue) -> Result<(), LayerfigError> {
        *self.0.get_mut(cfg) = T::coerce(key, raw)?;
        Ok(())
    }
}

struct FlagSlot<C, T> {
    lens: Lens<C, T>,
    text_codec: bool,
}

impl<C, T: FlagValue> Slot<C> for FlagSlot<C, T> {
    fn capability(&self) -> Capability {
        Capability::custom(std::any::type_name::<T>(), true, self.text_codec)
    }

    fn render(&self, cfg: &C) -> Option<RawValue> {
        Some(RawValue::String(self.lens.get(cfg).to_string()))
    }

    fn apply(&self, cfg: &mut C, key: &str, raw: &RawValue) -> Result<(), LayerfigError> {
        let text = String::coerce(key, raw)?;
        self.lens
            .get_mut(cfg)
            .set(&text)
            .map_err(|reason| LayerfigError::InvalidValue {
                key: key.to_string(),
                reason,
            })
    }
}

struct CodecSlot<C, T>(Lens<C, T>);

impl<C, T: TextCodec> Slot<C> for CodecSlot<C, T> {
    fn capability(&self) -> Capability {
        Capability::custom(std::any::type_name::<T>(), false, true)
    }

    fn render(&self, cfg: &C) -> Option<RawValue> {
        let bytes = self.0.get(cfg).marshal_text().ok()?;
        Some(RawValue::String(String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn apply(&self, cfg: &mut C, key: &str, raw: &RawValue) -> Result<(), LayerfigError> {
        let target = self.0.get_mut(cfg);
        if target.assign_native(raw) {
            return Ok(());
        }
        let result = match raw {
            RawValue::String(s) => target.unmarshal_text(s.as_bytes()),
            RawValue::Bytes(b) => target.unmarshal_text(b),
            other => Err(format!(
                "unsupported value {other} of type {}",
                other.type_name()
            )),
        };
        result.map_err(|e| {
            LayerfigError::conversion(key, format!("cannot convert via unmarshaling: {e}"))
        })
    }
}

struct OpaqueSlot<C> {
    type_name: &'static str,
    _config: PhantomData<fn(&C)>,
}

impl<C> Slot<C> for OpaqueSlot<C> {
    fn capability(&self) -> Capability {
        Capability::custom(self.type_name, false, false)
    }

    fn render(&self, _cfg: &C) -> Option<RawValue> {
        None
    }

    fn apply(&self, _cfg: &mut C, key: &str, _raw: &RawValue) -> Result<(), LayerfigError> {
        Err(LayerfigError::UnsupportedType {
            context: "Internal error, cannot assign",
            field: key.to_string(),
            type_name: self.type_name.to_string(),
        })
    }
}

/// One declared configuration field of `C`.
pub struct Field<C> {
    pub(crate) name: String,
    pub(crate) tag: String,
    pub(crate) doc: String,
    pub(crate) slot: Box<dyn Slot<C>>,
}

impl<C: 'static> Field<C> {
    fn with_slot(name: &str, tag: &str, slot: Box<dyn Slot<C>>) -> Self {
        Self {
            name: name.to_string(),
            tag: tag.to_string(),
            doc: String::new(),
            slot,
        }
    }

    /// A field assigned through primitive coercion.
    pub fn primitive<T: Primitive + 'static>(name: &str, tag: &str, lens: Lens<C, T>) -> Self {
        Self::with_slot(name, tag, Box::new(PrimitiveSlot(lens)))
    }

    /// A field set through its own [`FlagValue::set`] on every path.
    pub fn flag<T: FlagValue + 'static>(name: &str, tag: &str, lens: Lens<C, T>) -> Self {
        Self::with_slot(
            name,
            tag,
            Box::new(FlagSlot {
                lens,
                text_codec: false,
            }),
        )
    }

    /// A struct-shaped field decoded natively from the file or through its
    /// text form. It cannot be exposed on the command line.
    pub fn codec<T: TextCodec + 'static>(name: &str, tag: &str, lens: Lens<C, T>) -> Self {
        Self::with_slot(name, tag, Box::new(CodecSlot(lens)))
    }

    /// A field with both capabilities; the flag-value path is used.
    pub fn flag_codec<T: FlagValue + TextCodec + 'static>(
        name: &str,
        tag: &str,
        lens: Lens<C, T>,
    ) -> Self {
        Self::with_slot(
            name,
            tag,
            Box::new(FlagSlot {
                lens,
                text_codec: true,
            }),
        )
    }

    /// A field the engine cannot set itself. Only valid with the `custom`
    /// marker, where the extension parser fills it in.
    pub fn opaque<T: 'static>(name: &str, tag: &str) -> Self {
        Self::with_slot(
            name,
            tag,
            Box::new(OpaqueSlot::<C> {
                type_name: std::any::type_name::<T>(),
                _config: PhantomData,
            }),
        )
    }

    /// Help text for the command-line flag.
    pub fn doc(mut self, doc: &str) -> Self {
        self.doc = doc.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capability(&self) -> Capability {
        self.slot.capability()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Dispatch, ValueKind};
    use crate::flags::{IntValue, PortValue};
    use toml::value::Datetime;

    struct Sample {
        count: i8,
        port: PortValue,
        level: IntValue,
        when: Datetime,
        nested: Nested,
    }

    struct Nested {
        name: String,
    }

    fn sample() -> Sample {
        Sample {
            count: 1,
            port: PortValue(80),
            level: IntValue::new("level", 0, 3),
            when: "2000-01-01T00:00:00Z".parse().unwrap(),
            nested: Nested {
                name: "n".into(),
            },
        }
    }

    #[test]
    fn primitive_slot_coerces_and_renders() {
        let field = Field::primitive("count", "||none, .count,", lens!(Sample, count));
        assert_eq!(field.capability().kind, ValueKind::Int(crate::IntWidth::W8));
        let mut cfg = sample();
        assert_eq!(field.slot.render(&cfg), Some(RawValue::Int(1)));
        field.slot.apply(&mut cfg, "count", &RawValue::from("42")).unwrap();
        assert_eq!(cfg.count, 42);
        assert!(field.slot.apply(&mut cfg, "count", &RawValue::from("300")).is_err());
        assert_eq!(cfg.count, 42);
    }

    #[test]
    fn nested_lens() {
        let field = Field::primitive("name", "||none, .name,", lens!(Sample, nested.name));
        let mut cfg = sample();
        field.slot.apply(&mut cfg, "name", &RawValue::Int(5)).unwrap();
        assert_eq!(cfg.nested.name, "5");
    }

    #[test]
    fn flag_slot_validates_on_every_path() {
        let field = Field::flag("level", "||none, .level,", lens!(Sample, level));
        assert_eq!(field.capability().dispatch(), Dispatch::FlagValue);
        let mut cfg = sample();
        field.slot.apply(&mut cfg, "level", &RawValue::Int(2)).unwrap();
        assert_eq!(cfg.level.get(), 2);
        let err = field.slot.apply(&mut cfg, "level", &RawValue::Int(9)).unwrap_err();
        assert!(err.to_string().contains("should be between 0 and 3"));
    }

    #[test]
    fn flag_codec_prefers_flag() {
        let field = Field::flag_codec("port", "||none, .port,", lens!(Sample, port));
        let cap = field.capability();
        assert!(cap.flag_value && cap.text_codec);
        let mut cfg = sample();
        assert_eq!(field.slot.render(&cfg), Some(RawValue::from("80")));
        field.slot.apply(&mut cfg, "port", &RawValue::Int(8080)).unwrap();
        assert_eq!(cfg.port, PortValue(8080));
    }

    #[test]
    fn codec_slot_native_and_text() {
        let field = Field::codec("when", "||none, .when,", lens!(Sample, when));
        assert_eq!(field.capability().dispatch(), Dispatch::TextCodec);
        let mut cfg = sample();

        let native: Datetime = "1979-05-27T07:32:00Z".parse().unwrap();
        field
            .slot
            .apply(&mut cfg, "when", &RawValue::Datetime(native.clone()))
            .unwrap();
        assert_eq!(cfg.when, native);

        field
            .slot
            .apply(&mut cfg, "when", &RawValue::from("2020-02-02T10:00:00Z"))
            .unwrap();
        assert_eq!(cfg.when.to_string(), "2020-02-02T10:00:00Z");

        let err = field
            .slot
            .apply(&mut cfg, "when", &RawValue::from("never"))
            .unwrap_err();
        assert!(err.to_string().contains("via unmarshaling: parsing time"));

        assert!(field.slot.apply(&mut cfg, "when", &RawValue::Int(3)).is_err());
    }

    #[test]
    fn opaque_slot_is_unsupported() {
        let field = Field::<Sample>::opaque::<(f64, f64)>("complex", "||custom, .complex,");
        assert_eq!(field.capability().dispatch(), Dispatch::Unsupported);
        let mut cfg = sample();
        assert!(field.slot.render(&cfg).is_none());
        assert!(field.slot.apply(&mut cfg, "complex", &RawValue::Int(1)).is_err());
    }

    #[test]
    fn doc_is_recorded() {
        let field = Field::primitive("count", "||none, .count,", lens!(Sample, count)).doc("How many");
        assert_eq!(field.doc, "How many");
        assert_eq!(field.name(), "count");
    }
}
