//! Tagged-value envelope exchanged with the `manageData` endpoint
//!
//! On the wire an envelope is a flat JSON object with one slot per supported type
//! and an integer discriminator (`valueTypeIndicator`) naming the active slot.
//! Inside the crate values travel as [`Value`], which can only hold one slot at a
//! time, and are flattened into an [`Envelope`] right before a write.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Type of the value carried by an envelope
///
/// The discriminant codes are part of the wire contract. Codes 2 and 3 were set
/// aside for unsigned integers and are never produced or accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// 32-bit signed integer (code 0)
    Int32,
    /// 64-bit signed integer (code 1)
    Int64,
    /// Boolean (code 4)
    Boolean,
    /// 32-bit float (code 5)
    Float,
    /// 64-bit float (code 6)
    Double,
    /// UTF-8 string (code 7)
    String,
    /// Raw bytes, carried as base64 text (code 8). Scalar only.
    Bytes,
}

impl ValueType {
    /// Wire code for this type
    pub const fn code(self) -> i32 {
        match self {
            ValueType::Int32 => 0,
            ValueType::Int64 => 1,
            ValueType::Boolean => 4,
            ValueType::Float => 5,
            ValueType::Double => 6,
            ValueType::String => 7,
            ValueType::Bytes => 8,
        }
    }

    /// Resolve a wire code
    ///
    /// # Errors
    /// Returns `Error::UnknownValueType` for the reserved codes 2 and 3 and for any
    /// code outside the table.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(ValueType::Int32),
            1 => Ok(ValueType::Int64),
            4 => Ok(ValueType::Boolean),
            5 => Ok(ValueType::Float),
            6 => Ok(ValueType::Double),
            7 => Ok(ValueType::String),
            8 => Ok(ValueType::Bytes),
            other => Err(Error::UnknownValueType(other)),
        }
    }

    /// Whether values of this type may be stored as an array
    pub const fn supports_array(self) -> bool {
        !matches!(self, ValueType::Bytes)
    }
}

impl TryFrom<i32> for ValueType {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        Self::from_code(code)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Int32 => "Int32",
            ValueType::Int64 => "Int64",
            ValueType::Boolean => "Boolean",
            ValueType::Float => "Float",
            ValueType::Double => "Double",
            ValueType::String => "String",
            ValueType::Bytes => "Bytes",
        };
        f.write_str(name)
    }
}

/// A single stored value, scalar or array
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// Boolean
    Boolean(bool),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Array of 32-bit signed integers
    Int32Array(Vec<i32>),
    /// Array of 64-bit signed integers
    Int64Array(Vec<i64>),
    /// Array of booleans
    BooleanArray(Vec<bool>),
    /// Array of 32-bit floats
    FloatArray(Vec<f32>),
    /// Array of 64-bit floats
    DoubleArray(Vec<f64>),
    /// Array of strings
    StringArray(Vec<String>),
}

impl Value {
    /// Element type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int32(_) | Value::Int32Array(_) => ValueType::Int32,
            Value::Int64(_) | Value::Int64Array(_) => ValueType::Int64,
            Value::Boolean(_) | Value::BooleanArray(_) => ValueType::Boolean,
            Value::Float(_) | Value::FloatArray(_) => ValueType::Float,
            Value::Double(_) | Value::DoubleArray(_) => ValueType::Double,
            Value::String(_) | Value::StringArray(_) => ValueType::String,
            Value::Bytes(_) => ValueType::Bytes,
        }
    }

    /// Whether this value is an array
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Value::Int32Array(_)
                | Value::Int64Array(_)
                | Value::BooleanArray(_)
                | Value::FloatArray(_)
                | Value::DoubleArray(_)
                | Value::StringArray(_)
        )
    }
}

/// Rust types that can be stored under a key
///
/// Each implementation pins one `(ValueType, is_array)` pair, so a typed read
/// only succeeds when the stored value has exactly that type and shape.
pub trait StoredValue: Sized {
    /// Discriminator used when writing this type
    const VALUE_TYPE: ValueType;
    /// Whether this type is stored in the array slots
    const IS_ARRAY: bool;

    /// Wrap into a [`Value`]
    fn into_value(self) -> Value;

    /// Unwrap from a [`Value`], or `None` if the variant does not match
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! stored_value {
    ($ty:ty, $variant:ident, $value_type:ident, $is_array:expr) => {
        impl StoredValue for $ty {
            const VALUE_TYPE: ValueType = ValueType::$value_type;
            const IS_ARRAY: bool = $is_array;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

stored_value!(i32, Int32, Int32, false);
stored_value!(i64, Int64, Int64, false);
stored_value!(bool, Boolean, Boolean, false);
stored_value!(f32, Float, Float, false);
stored_value!(f64, Double, Double, false);
stored_value!(String, String, String, false);
stored_value!(Vec<u8>, Bytes, Bytes, false);
stored_value!(Vec<i32>, Int32Array, Int32, true);
stored_value!(Vec<i64>, Int64Array, Int64, true);
stored_value!(Vec<bool>, BooleanArray, Boolean, true);
stored_value!(Vec<f32>, FloatArray, Float, true);
stored_value!(Vec<f64>, DoubleArray, Double, true);
stored_value!(Vec<String>, StringArray, String, true);

/// Flat wire form of a stored value
///
/// Only the slot selected by the discriminator and `is_array` is meaningful; every
/// other slot keeps its default. Unknown JSON fields are ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    is_array: bool,
    key_identifier: String,
    user_identifier: String,
    #[serde(default)]
    int32_value: i32,
    #[serde(default)]
    int64_value: i64,
    #[serde(default)]
    boolean_value: bool,
    #[serde(default)]
    float_value: f32,
    #[serde(default)]
    double_value: f64,
    #[serde(default)]
    string_value: String,
    #[serde(default)]
    byte_string_value: String,
    #[serde(default)]
    int32_values: Vec<i32>,
    #[serde(default)]
    int64_values: Vec<i64>,
    #[serde(default)]
    boolean_values: Vec<bool>,
    #[serde(default)]
    float_values: Vec<f32>,
    #[serde(default)]
    double_values: Vec<f64>,
    #[serde(default)]
    string_values: Vec<String>,
    #[serde(default)]
    value_type_indicator: i32,
}

impl Envelope {
    /// Create an envelope with every slot at its default
    ///
    /// The discriminator starts at 0 (Int32); call [`Envelope::set_value_type`]
    /// after filling the slot.
    ///
    /// # Errors
    /// Returns `Error::InvalidKey` if `key` or `user` is empty.
    pub fn new(is_array: bool, key: &str, user: &str) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::InvalidKey("Key cannot be empty".to_string()));
        }
        if user.is_empty() {
            return Err(Error::InvalidKey("User identifier cannot be empty".to_string()));
        }

        Ok(Self {
            is_array,
            key_identifier: key.to_string(),
            user_identifier: user.to_string(),
            int32_value: 0,
            int64_value: 0,
            boolean_value: false,
            float_value: 0.0,
            double_value: 0.0,
            string_value: String::new(),
            byte_string_value: String::new(),
            int32_values: Vec::new(),
            int64_values: Vec::new(),
            boolean_values: Vec::new(),
            float_values: Vec::new(),
            double_values: Vec::new(),
            string_values: Vec::new(),
            value_type_indicator: 0,
        })
    }

    /// Build the envelope for writing `value` under `key`
    ///
    /// # Errors
    /// Returns `Error::InvalidKey` for an empty key or user and
    /// `Error::NonFiniteFloat` for NaN or infinite floats, which JSON cannot carry.
    pub fn from_value(key: &str, user: &str, value: Value) -> Result<Self> {
        let value_type = value.value_type();
        let finite = match &value {
            Value::Float(v) => v.is_finite(),
            Value::Double(v) => v.is_finite(),
            Value::FloatArray(vs) => vs.iter().all(|v| v.is_finite()),
            Value::DoubleArray(vs) => vs.iter().all(|v| v.is_finite()),
            _ => true,
        };
        if !finite {
            return Err(Error::NonFiniteFloat(value_type));
        }
        let mut envelope = Self::new(value.is_array(), key, user)?;

        match value {
            Value::Int32(v) => envelope.int32_value = v,
            Value::Int64(v) => envelope.int64_value = v,
            Value::Boolean(v) => envelope.boolean_value = v,
            Value::Float(v) => envelope.float_value = v,
            Value::Double(v) => envelope.double_value = v,
            Value::String(v) => envelope.string_value = v,
            Value::Bytes(v) => envelope.encode_byte_string(&v),
            Value::Int32Array(v) => envelope.int32_values = v,
            Value::Int64Array(v) => envelope.int64_values = v,
            Value::BooleanArray(v) => envelope.boolean_values = v,
            Value::FloatArray(v) => envelope.float_values = v,
            Value::DoubleArray(v) => envelope.double_values = v,
            Value::StringArray(v) => envelope.string_values = v,
        }

        envelope.set_value_type(value_type)?;
        Ok(envelope)
    }

    /// Decode an envelope from a JSON response body
    ///
    /// # Errors
    /// `Error::Json` when the body is not an envelope, `Error::UnknownValueType` for
    /// a reserved or unmapped discriminator and `Error::InvalidValueShape` for a
    /// bytes array.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let envelope: Self = serde_json::from_slice(bytes)?;
        envelope.checked_value_type()?;
        Ok(envelope)
    }

    /// Encode as a JSON request body
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Key this envelope is stored under
    pub fn key(&self) -> &str {
        &self.key_identifier
    }

    /// User this envelope belongs to
    pub fn user(&self) -> &str {
        &self.user_identifier
    }

    /// Whether the active slot is an array slot
    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// Raw discriminator as received or last set
    pub fn type_indicator(&self) -> i32 {
        self.value_type_indicator
    }

    /// Resolve the discriminator
    ///
    /// # Errors
    /// Returns `Error::UnknownValueType` if the code is reserved or unmapped.
    pub fn value_type(&self) -> Result<ValueType> {
        ValueType::from_code(self.value_type_indicator)
    }

    /// Resolve the discriminator and reject bytes stored as an array
    fn checked_value_type(&self) -> Result<ValueType> {
        let value_type = self.value_type()?;
        if self.is_array && !value_type.supports_array() {
            return Err(Error::InvalidValueShape(value_type));
        }
        Ok(value_type)
    }

    /// Set the discriminator
    ///
    /// # Errors
    /// Returns `Error::InvalidValueShape` when selecting `Bytes` on an array envelope.
    /// The discriminator is left unchanged in that case.
    pub fn set_value_type(&mut self, value_type: ValueType) -> Result<()> {
        if self.is_array && !value_type.supports_array() {
            return Err(Error::InvalidValueShape(value_type));
        }
        self.value_type_indicator = value_type.code();
        Ok(())
    }

    /// Store `bytes` in the byte-string slot as standard base64
    pub fn encode_byte_string(&mut self, bytes: &[u8]) {
        self.byte_string_value = STANDARD.encode(bytes);
    }

    /// Decode the byte-string slot
    pub fn extract_byte_string(&self) -> Result<Vec<u8>> {
        Ok(STANDARD.decode(&self.byte_string_value)?)
    }

    /// Take the value out of the active slot
    ///
    /// # Errors
    /// Fails on an unknown discriminator, on a bytes array, or when the byte-string
    /// slot is not valid base64.
    pub fn into_value(self) -> Result<Value> {
        let value_type = self.checked_value_type()?;

        let value = match (value_type, self.is_array) {
            (ValueType::Int32, false) => Value::Int32(self.int32_value),
            (ValueType::Int64, false) => Value::Int64(self.int64_value),
            (ValueType::Boolean, false) => Value::Boolean(self.boolean_value),
            (ValueType::Float, false) => Value::Float(self.float_value),
            (ValueType::Double, false) => Value::Double(self.double_value),
            (ValueType::String, false) => Value::String(self.string_value),
            (ValueType::Bytes, _) => Value::Bytes(self.extract_byte_string()?),
            (ValueType::Int32, true) => Value::Int32Array(self.int32_values),
            (ValueType::Int64, true) => Value::Int64Array(self.int64_values),
            (ValueType::Boolean, true) => Value::BooleanArray(self.boolean_values),
            (ValueType::Float, true) => Value::FloatArray(self.float_values),
            (ValueType::Double, true) => Value::DoubleArray(self.double_values),
            (ValueType::String, true) => Value::StringArray(self.string_values),
        };
        Ok(value)
    }

    /// Extract a `T`, or `None` if the stored type or shape differs
    ///
    /// A mismatch is not an error: it reads the same as a key that was never set
    /// with that type. An invalid discriminator or a bytes array fails whatever
    /// `T` is.
    pub fn extract<T: StoredValue>(self) -> Result<Option<T>> {
        let value_type = self.checked_value_type()?;
        if self.is_array != T::IS_ARRAY || value_type != T::VALUE_TYPE {
            return Ok(None);
        }
        Ok(T::from_value(self.into_value()?))
    }
}
