//! Ready-made validated value types.
//!
//! Each type implements both [`FlagValue`] and [`TextCodec`], so validation
//! runs whether the value arrives from the command line, the environment or
//! the config file.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use crate::capability::{FlagValue, TextCodec};

fn utf8(text: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(text).map_err(|e| e.to_string())
}

/// A named integer bounded to `[min, max]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntValue {
    name: String,
    value: i64,
    min: i64,
    max: i64,
}

impl IntValue {
    /// Starts at `min`.
    pub fn new(name: &str, min: i64, max: i64) -> Self {
        Self {
            name: name.to_string(),
            value: min,
            min,
            max,
        }
    }

    /// A value known to be in range, for built-in defaults.
    pub(crate) fn preset(name: &str, value: i64, min: i64, max: i64) -> Self {
        Self {
            name: name.to_string(),
            value,
            min,
            max,
        }
    }

    pub fn with_default(name: &str, value: i64, min: i64, max: i64) -> Result<Self, String> {
        let mut int = Self::new(name, min, max);
        int.set_int(value)?;
        Ok(int)
    }

    pub fn get(&self) -> i64 {
        self.value
    }

    pub fn set_int(&mut self, value: i64) -> Result<(), String> {
        if value < self.min || value > self.max {
            return Err(format!(
                "Invalid value {value} for variable {}, should be between {} and {}",
                self.name, self.min, self.max
            ));
        }
        self.value = value;
        Ok(())
    }
}

impl fmt::Display for IntValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FlagValue for IntValue {
    fn set(&mut self, value: &str) -> Result<(), String> {
        let parsed = value.trim().parse::<i64>().map_err(|_| {
            format!(
                "Variable {}, {value}, cannot be converted to a number",
                self.name
            )
        })?;
        self.set_int(parsed)
    }
}

impl TextCodec for IntValue {
    fn unmarshal_text(&mut self, text: &[u8]) -> Result<(), String> {
        self.set(utf8(text)?)
    }

    fn marshal_text(&self) -> Result<Vec<u8>, String> {
        Ok(self.to_string().into_bytes())
    }
}

/// Validator for [`CustomStringValue`]: receives the variable name and the
/// candidate text, returns the value to store.
pub type StringValidator = dyn Fn(&str, &str) -> Result<String, String> + Send + Sync;

/// A string checked by an application-supplied validator.
#[derive(Clone)]
pub struct CustomStringValue {
    name: String,
    value: String,
    validator: Arc<StringValidator>,
}

impl CustomStringValue {
    /// Starts empty; the validator only runs on later updates.
    pub fn new<F>(name: &str, validator: F) -> Self
    where
        F: Fn(&str, &str) -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            value: String::new(),
            validator: Arc::new(validator),
        }
    }

    pub fn with_default<F>(name: &str, value: &str, validator: F) -> Result<Self, String>
    where
        F: Fn(&str, &str) -> Result<String, String> + Send + Sync + 'static,
    {
        let mut custom = Self::new(name, validator);
        custom
            .set(value)
            .map_err(|e| format!("While creating variable {name}, error {e}"))?;
        Ok(custom)
    }

    pub fn get(&self) -> &str {
        &self.value
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CustomStringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomStringValue")
            .field("name", &self.name)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CustomStringValue {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value == other.value
    }
}

impl fmt::Display for CustomStringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FlagValue for CustomStringValue {
    fn set(&mut self, value: &str) -> Result<(), String> {
        self.value = (self.validator)(&self.name, value)?;
        Ok(())
    }
}

impl TextCodec for CustomStringValue {
    fn unmarshal_text(&mut self, text: &[u8]) -> Result<(), String> {
        self.set(utf8(text)?)
    }

    fn marshal_text(&self) -> Result<Vec<u8>, String> {
        Ok(self.value.clone().into_bytes())
    }
}

fn validate_ip(_name: &str, value: &str) -> Result<String, String> {
    value
        .parse::<IpAddr>()
        .map(|_| value.to_string())
        .map_err(|_| format!("Invalid value {value}, should be an IP address"))
}

/// An IPv4 or IPv6 address, kept in its textual form.
#[derive(Debug, Clone, PartialEq)]
pub struct IpValue(CustomStringValue);

impl IpValue {
    pub fn new(name: &str) -> Self {
        Self(CustomStringValue::new(name, validate_ip))
    }

    pub fn with_default(name: &str, value: &str) -> Result<Self, String> {
        CustomStringValue::with_default(name, value, validate_ip).map(Self)
    }

    pub fn get(&self) -> &str {
        self.0.get()
    }

    pub fn addr(&self) -> Option<IpAddr> {
        self.0.get().parse().ok()
    }
}

impl fmt::Display for IpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FlagValue for IpValue {
    fn set(&mut self, value: &str) -> Result<(), String> {
        self.0.set(value)
    }
}

impl TextCodec for IpValue {
    fn unmarshal_text(&mut self, text: &[u8]) -> Result<(), String> {
        self.0.unmarshal_text(text)
    }

    fn marshal_text(&self) -> Result<Vec<u8>, String> {
        self.0.marshal_text()
    }
}

/// One of a fixed set of strings.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    inner: CustomStringValue,
    valid: Arc<[String]>,
}

impl EnumValue {
    /// The first valid value is the initial one.
    pub fn new(name: &str, valid: &[&str]) -> Result<Self, String> {
        let Some(first) = valid.first() else {
            return Err(format!("Flag {name} has no valid values"));
        };
        Self::with_default(name, first, valid)
    }

    pub fn with_default(name: &str, value: &str, valid: &[&str]) -> Result<Self, String> {
        if valid.is_empty() {
            return Err(format!("Flag {name} has no valid values"));
        }
        let mut e = Self::preset(name, "", valid);
        e.set(value)
            .map_err(|err| format!("While creating variable {name}, error {err}"))?;
        Ok(e)
    }

    /// A value known to be valid, for built-in defaults.
    pub(crate) fn preset(name: &str, value: &str, valid: &[&str]) -> Self {
        let valid: Arc<[String]> = valid.iter().map(|v| v.to_string()).collect();
        let allowed = Arc::clone(&valid);
        let mut inner = CustomStringValue::new(name, move |name, value| {
            if allowed.iter().any(|v| v == value) {
                Ok(value.to_string())
            } else {
                Err(format!(
                    "Invalid value {value} for variable {name}, should be one of {}.",
                    allowed.join(", ")
                ))
            }
        });
        inner.value = value.to_string();
        Self { inner, valid }
    }

    pub fn get(&self) -> &str {
        self.inner.get()
    }

    pub fn valid_values(&self) -> &[String] {
        &self.valid
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl FlagValue for EnumValue {
    fn set(&mut self, value: &str) -> Result<(), String> {
        self.inner.set(value)
    }
}

impl TextCodec for EnumValue {
    fn unmarshal_text(&mut self, text: &[u8]) -> Result<(), String> {
        self.inner.unmarshal_text(text)
    }

    fn marshal_text(&self) -> Result<Vec<u8>, String> {
        self.inner.marshal_text()
    }
}

/// A TCP/UDP port. An empty string sets 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortValue(pub u16);

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FlagValue for PortValue {
    fn set(&mut self, value: &str) -> Result<(), String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.0 = 0;
            return Ok(());
        }
        let parsed: i128 = trimmed
            .parse()
            .map_err(|_| format!("{trimmed}, cannot be converted to a port"))?;
        self.0 = u16::try_from(parsed).map_err(|_| {
            format!("Invalid port {parsed}, must be an integer between 0 and 65535")
        })?;
        Ok(())
    }
}

impl TextCodec for PortValue {
    fn unmarshal_text(&mut self, text: &[u8]) -> Result<(), String> {
        self.set(utf8(text)?)
    }

    fn marshal_text(&self) -> Result<Vec<u8>, String> {
        Ok(self.to_string().into_bytes())
    }
}
