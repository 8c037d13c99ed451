use crate::error::{FastGraphError, FastGraphResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Element type of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Float,
    Double,
    Int32,
    Int64,
    #[serde(rename = "uint8")]
    UInt8,
    Bool,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::UInt8 => "uint8",
            DataType::Bool => "bool",
        }
    }

    /// Size of one element in bytes
    pub fn size_of(&self) -> usize {
        match self {
            DataType::Float | DataType::Int32 => 4,
            DataType::Double | DataType::Int64 => 8,
            DataType::UInt8 | DataType::Bool => 1,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, DataType::Bool)
    }

    /// The value-typed slot for this element type
    pub fn value(self) -> SlotType {
        SlotType {
            dtype: self,
            is_ref: false,
        }
    }

    /// The reference-typed slot for this element type
    pub fn reference(self) -> SlotType {
        SlotType {
            dtype: self,
            is_ref: true,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = FastGraphError;

    fn from_str(s: &str) -> FastGraphResult<Self> {
        match s {
            "float" | "f32" => Ok(DataType::Float),
            "double" | "f64" => Ok(DataType::Double),
            "int32" | "i32" => Ok(DataType::Int32),
            "int64" | "i64" => Ok(DataType::Int64),
            "uint8" | "u8" => Ok(DataType::UInt8),
            "bool" => Ok(DataType::Bool),
            other => Err(FastGraphError::invalid_argument(format!(
                "Unknown data type '{}'",
                other
            ))),
        }
    }
}

/// Declared type of an input or output slot: an element type, accessed
/// either by value or through a shared reference.
///
/// Written as `float` for a value slot and `float_ref` for a reference slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotType {
    pub dtype: DataType,
    pub is_ref: bool,
}

impl SlotType {
    /// Strip the reference marker
    pub fn base(&self) -> SlotType {
        self.dtype.value()
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ref {
            write!(f, "{}_ref", self.dtype)
        } else {
            write!(f, "{}", self.dtype)
        }
    }
}

impl FromStr for SlotType {
    type Err = FastGraphError;

    fn from_str(s: &str) -> FastGraphResult<Self> {
        match s.strip_suffix("_ref") {
            Some(base) => Ok(base.parse::<DataType>()?.reference()),
            None => Ok(s.parse::<DataType>()?.value()),
        }
    }
}

impl TryFrom<String> for SlotType {
    type Error = FastGraphError;

    fn try_from(s: String) -> FastGraphResult<Self> {
        s.parse()
    }
}

impl From<SlotType> for String {
    fn from(t: SlotType) -> Self {
        t.to_string()
    }
}

impl From<DataType> for SlotType {
    fn from(dtype: DataType) -> Self {
        dtype.value()
    }
}
