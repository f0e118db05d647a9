// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `Variant`, the dynamically typed container for any
//! built-in type, and the `Array` type for one- and multi-dimensional arrays.

use std::{
    convert::TryFrom,
    io::{Read, Write},
};

use log::warn;

use crate::{
    byte_string::ByteString,
    data_value::DataValue,
    date_time::DateTime,
    diagnostic_info::DiagnosticInfo,
    encoding::{
        read_i32, read_u8, write_i32, write_u8, BinaryDecodable, BinaryEncodable, EncodingResult,
        UaNullable,
    },
    expanded_node_id::ExpandedNodeId,
    extension_object::ExtensionObject,
    guid::Guid,
    localized_text::LocalizedText,
    node_id::NodeId,
    qualified_name::QualifiedName,
    status_code::StatusCode,
    string::{UAString, XmlElement},
    Context, Error,
};

/// The type id of a scalar built-in type as used in the variant encoding mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VariantScalarTypeId {
    /// Boolean
    Boolean = 1,
    /// Signed byte
    SByte = 2,
    /// Unsigned byte
    Byte = 3,
    /// Signed 16 bit integer
    Int16 = 4,
    /// Unsigned 16 bit integer
    UInt16 = 5,
    /// Signed 32 bit integer
    Int32 = 6,
    /// Unsigned 32 bit integer
    UInt32 = 7,
    /// Signed 64 bit integer
    Int64 = 8,
    /// Unsigned 64 bit integer
    UInt64 = 9,
    /// IEEE-754 single precision float
    Float = 10,
    /// IEEE-754 double precision float
    Double = 11,
    /// String
    String = 12,
    /// DateTime
    DateTime = 13,
    /// Guid
    Guid = 14,
    /// ByteString
    ByteString = 15,
    /// XML element
    XmlElement = 16,
    /// NodeId
    NodeId = 17,
    /// ExpandedNodeId
    ExpandedNodeId = 18,
    /// StatusCode
    StatusCode = 19,
    /// QualifiedName
    QualifiedName = 20,
    /// LocalizedText
    LocalizedText = 21,
    /// ExtensionObject
    ExtensionObject = 22,
    /// DataValue
    DataValue = 23,
    /// Nested variant
    Variant = 24,
    /// DiagnosticInfo
    DiagnosticInfo = 25,
}

impl TryFrom<u8> for VariantScalarTypeId {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::Boolean,
            2 => Self::SByte,
            3 => Self::Byte,
            4 => Self::Int16,
            5 => Self::UInt16,
            6 => Self::Int32,
            7 => Self::UInt32,
            8 => Self::Int64,
            9 => Self::UInt64,
            10 => Self::Float,
            11 => Self::Double,
            12 => Self::String,
            13 => Self::DateTime,
            14 => Self::Guid,
            15 => Self::ByteString,
            16 => Self::XmlElement,
            17 => Self::NodeId,
            18 => Self::ExpandedNodeId,
            19 => Self::StatusCode,
            20 => Self::QualifiedName,
            21 => Self::LocalizedText,
            22 => Self::ExtensionObject,
            23 => Self::DataValue,
            24 => Self::Variant,
            25 => Self::DiagnosticInfo,
            _ => return Err(()),
        })
    }
}

/// An array of variants, all of the same scalar type, with optional dimensions
/// for multi-dimensional arrays.
#[derive(PartialEq, Debug, Clone)]
pub struct Array {
    /// The scalar type of every element.
    pub value_type: VariantScalarTypeId,
    /// Values, stored in a flat list in row-major order.
    pub values: Vec<Variant>,
    /// The dimensions of a multi-dimensional array. `None` for a one-dimensional array.
    pub dimensions: Option<Vec<u32>>,
}

impl Array {
    /// Create a one-dimensional array. Fails if not all values are scalars of `value_type`.
    pub fn new(
        value_type: VariantScalarTypeId,
        values: impl Into<Vec<Variant>>,
    ) -> Result<Array, Error> {
        Self::new_multi(value_type, values, None)
    }

    /// Create a multi-dimensional array. Fails if the values are not scalars of `value_type`,
    /// or the dimensions do not match the number of values.
    pub fn new_multi(
        value_type: VariantScalarTypeId,
        values: impl Into<Vec<Variant>>,
        dimensions: Option<Vec<u32>>,
    ) -> Result<Array, Error> {
        let values = values.into();
        if let Some(ref dimensions) = dimensions {
            let len = dimensions.iter().map(|d| *d as usize).product::<usize>();
            if len != values.len() {
                return Err(Error::encoding(format!(
                    "Array dimensions {:?} do not match number of values {}",
                    dimensions,
                    values.len()
                )));
            }
        }
        if values
            .iter()
            .any(|v| v.scalar_type_id() != Some(value_type))
        {
            return Err(Error::encoding(
                "Array values are not all scalars of the declared type",
            ));
        }
        Ok(Array {
            value_type,
            values,
            dimensions,
        })
    }
}

/// A `Variant` holds built-in OPC UA data types, including single and multi dimensional arrays,
/// data values and extension objects.
#[derive(PartialEq, Debug, Clone, Default)]
pub enum Variant {
    /// Empty means no value.
    #[default]
    Empty,
    /// Boolean
    Boolean(bool),
    /// Signed byte
    SByte(i8),
    /// Unsigned byte
    Byte(u8),
    /// Signed 16 bit int
    Int16(i16),
    /// Unsigned 16 bit int
    UInt16(u16),
    /// Signed 32 bit int
    Int32(i32),
    /// Unsigned 32 bit int
    UInt32(u32),
    /// Signed 64 bit int
    Int64(i64),
    /// Unsigned 64 bit int
    UInt64(u64),
    /// Float
    Float(f32),
    /// Double
    Double(f64),
    /// String
    String(UAString),
    /// DateTime
    DateTime(Box<DateTime>),
    /// Guid
    Guid(Box<Guid>),
    /// StatusCode
    StatusCode(StatusCode),
    /// ByteString
    ByteString(ByteString),
    /// XmlElement
    XmlElement(XmlElement),
    /// QualifiedName
    QualifiedName(Box<QualifiedName>),
    /// LocalizedText
    LocalizedText(Box<LocalizedText>),
    /// NodeId
    NodeId(Box<NodeId>),
    /// ExpandedNodeId
    ExpandedNodeId(Box<ExpandedNodeId>),
    /// ExtensionObject
    ExtensionObject(ExtensionObject),
    /// Nested variant
    Variant(Box<Variant>),
    /// DataValue
    DataValue(Box<DataValue>),
    /// DiagnosticInfo
    DiagnosticInfo(Box<DiagnosticInfo>),
    /// Single or multi dimensional array
    Array(Box<Array>),
}

impl UaNullable for Variant {
    fn is_ua_null(&self) -> bool {
        self.is_empty()
    }
}

macro_rules! from_scalar {
    ($t:ty, $variant:ident) => {
        impl From<$t> for Variant {
            fn from(value: $t) -> Self {
                Variant::$variant(value)
            }
        }
    };
    ($t:ty, $variant:ident, boxed) => {
        impl From<$t> for Variant {
            fn from(value: $t) -> Self {
                Variant::$variant(Box::new(value))
            }
        }
    };
}

from_scalar!(bool, Boolean);
from_scalar!(i8, SByte);
from_scalar!(u8, Byte);
from_scalar!(i16, Int16);
from_scalar!(u16, UInt16);
from_scalar!(i32, Int32);
from_scalar!(u32, UInt32);
from_scalar!(i64, Int64);
from_scalar!(u64, UInt64);
from_scalar!(f32, Float);
from_scalar!(f64, Double);
from_scalar!(UAString, String);
from_scalar!(StatusCode, StatusCode);
from_scalar!(ByteString, ByteString);
from_scalar!(ExtensionObject, ExtensionObject);
from_scalar!(DateTime, DateTime, boxed);
from_scalar!(Guid, Guid, boxed);
from_scalar!(QualifiedName, QualifiedName, boxed);
from_scalar!(LocalizedText, LocalizedText, boxed);
from_scalar!(NodeId, NodeId, boxed);
from_scalar!(ExpandedNodeId, ExpandedNodeId, boxed);
from_scalar!(DataValue, DataValue, boxed);

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.into())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value.into())
    }
}

impl From<Array> for Variant {
    fn from(value: Array) -> Self {
        Variant::Array(Box::new(value))
    }
}

const ARRAY_VALUES_BIT: u8 = 1 << 7;
const ARRAY_DIMENSIONS_BIT: u8 = 1 << 6;

impl BinaryEncodable for Variant {
    fn byte_len(&self, ctx: &Context<'_>) -> usize {
        // Encoding mask
        let mut size: usize = 1;
        size += match self {
            Variant::Empty => 0,
            Variant::Array(array) => {
                let mut size = 4 + array
                    .values
                    .iter()
                    .map(|v| v.value_byte_len(ctx))
                    .sum::<usize>();
                if let Some(ref dimensions) = array.dimensions {
                    size += 4 + dimensions.len() * 4;
                }
                size
            }
            other => other.value_byte_len(ctx),
        };
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S, ctx: &Context<'_>) -> EncodingResult<()> {
        write_u8(stream, self.encoding_mask())?;
        match self {
            Variant::Empty => Ok(()),
            Variant::Array(array) => {
                write_i32(stream, array.values.len() as i32)?;
                for value in &array.values {
                    value.encode_value(stream, ctx)?;
                }
                if let Some(ref dimensions) = array.dimensions {
                    write_i32(stream, dimensions.len() as i32)?;
                    for dimension in dimensions {
                        write_i32(stream, *dimension as i32)?;
                    }
                }
                Ok(())
            }
            other => other.encode_value(stream, ctx),
        }
    }
}

impl BinaryDecodable for Variant {
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self> {
        // Nested variants are bounded by the decoding depth gauge.
        let _depth_lock = ctx.options().depth_lock()?;
        let encoding_mask = read_u8(stream)?;
        if encoding_mask == 0 {
            return Ok(Variant::Empty);
        }
        let Ok(type_id) = VariantScalarTypeId::try_from(encoding_mask & 0x3f) else {
            return Err(Error::decoding(format!(
                "Unrecognized variant type id {}",
                encoding_mask & 0x3f
            )));
        };

        if encoding_mask & ARRAY_VALUES_BIT != 0 {
            let len = read_i32(stream)?;
            if len < -1 {
                return Err(Error::decoding(format!(
                    "Invalid array length {} in variant",
                    len
                )));
            }
            let values = if len <= 0 {
                Vec::new()
            } else {
                if len as usize > ctx.options().max_array_length {
                    return Err(Error::decoding(format!(
                        "Variant array length {} exceeds decoding limit {}",
                        len,
                        ctx.options().max_array_length
                    )));
                }
                let mut values = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    values.push(Variant::decode_value(stream, type_id, ctx)?);
                }
                values
            };
            let dimensions = if encoding_mask & ARRAY_DIMENSIONS_BIT != 0 {
                let num_dimensions = read_i32(stream)?;
                if num_dimensions <= 0 {
                    None
                } else {
                    let mut dimensions = Vec::with_capacity(num_dimensions as usize);
                    for _ in 0..num_dimensions {
                        let dimension = read_i32(stream)?;
                        if dimension < 0 {
                            return Err(Error::decoding("Negative array dimension in variant"));
                        }
                        dimensions.push(dimension as u32);
                    }
                    Some(dimensions)
                }
            } else {
                None
            };
            let array = Array::new_multi(type_id, values, dimensions)
                .map_err(|e| Error::decoding(format!("Invalid array in variant: {e}")))?;
            Ok(Variant::Array(Box::new(array)))
        } else {
            Variant::decode_value(stream, type_id, ctx)
        }
    }
}

impl Variant {
    /// The scalar type id of this variant, `None` for `Empty` and arrays.
    pub fn scalar_type_id(&self) -> Option<VariantScalarTypeId> {
        match self {
            Variant::Empty | Variant::Array(_) => None,
            Variant::Boolean(_) => Some(VariantScalarTypeId::Boolean),
            Variant::SByte(_) => Some(VariantScalarTypeId::SByte),
            Variant::Byte(_) => Some(VariantScalarTypeId::Byte),
            Variant::Int16(_) => Some(VariantScalarTypeId::Int16),
            Variant::UInt16(_) => Some(VariantScalarTypeId::UInt16),
            Variant::Int32(_) => Some(VariantScalarTypeId::Int32),
            Variant::UInt32(_) => Some(VariantScalarTypeId::UInt32),
            Variant::Int64(_) => Some(VariantScalarTypeId::Int64),
            Variant::UInt64(_) => Some(VariantScalarTypeId::UInt64),
            Variant::Float(_) => Some(VariantScalarTypeId::Float),
            Variant::Double(_) => Some(VariantScalarTypeId::Double),
            Variant::String(_) => Some(VariantScalarTypeId::String),
            Variant::DateTime(_) => Some(VariantScalarTypeId::DateTime),
            Variant::Guid(_) => Some(VariantScalarTypeId::Guid),
            Variant::StatusCode(_) => Some(VariantScalarTypeId::StatusCode),
            Variant::ByteString(_) => Some(VariantScalarTypeId::ByteString),
            Variant::XmlElement(_) => Some(VariantScalarTypeId::XmlElement),
            Variant::QualifiedName(_) => Some(VariantScalarTypeId::QualifiedName),
            Variant::LocalizedText(_) => Some(VariantScalarTypeId::LocalizedText),
            Variant::NodeId(_) => Some(VariantScalarTypeId::NodeId),
            Variant::ExpandedNodeId(_) => Some(VariantScalarTypeId::ExpandedNodeId),
            Variant::ExtensionObject(_) => Some(VariantScalarTypeId::ExtensionObject),
            Variant::Variant(_) => Some(VariantScalarTypeId::Variant),
            Variant::DataValue(_) => Some(VariantScalarTypeId::DataValue),
            Variant::DiagnosticInfo(_) => Some(VariantScalarTypeId::DiagnosticInfo),
        }
    }

    /// Test if the variant is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    /// Encoding mask for this variant as it appears on the wire.
    pub fn encoding_mask(&self) -> u8 {
        match self {
            Variant::Empty => 0,
            Variant::Array(array) => {
                let mut mask = array.value_type as u8 | ARRAY_VALUES_BIT;
                if array.dimensions.is_some() {
                    mask |= ARRAY_DIMENSIONS_BIT;
                }
                mask
            }
            other => other.scalar_type_id().expect("scalar") as u8,
        }
    }

    /// Interpret the value as a signed 32 bit integer if it holds an integer type that fits.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Variant::SByte(v) => Some(*v as i32),
            Variant::Byte(v) => Some(*v as i32),
            Variant::Int16(v) => Some(*v as i32),
            Variant::UInt16(v) => Some(*v as i32),
            Variant::Int32(v) => Some(*v),
            Variant::UInt32(v) => i32::try_from(*v).ok(),
            Variant::Int64(v) => i32::try_from(*v).ok(),
            Variant::UInt64(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Byte length of the value, excluding the encoding mask.
    fn value_byte_len(&self, ctx: &Context<'_>) -> usize {
        match self {
            Variant::Empty => 0,
            Variant::Boolean(v) => v.byte_len(ctx),
            Variant::SByte(v) => v.byte_len(ctx),
            Variant::Byte(v) => v.byte_len(ctx),
            Variant::Int16(v) => v.byte_len(ctx),
            Variant::UInt16(v) => v.byte_len(ctx),
            Variant::Int32(v) => v.byte_len(ctx),
            Variant::UInt32(v) => v.byte_len(ctx),
            Variant::Int64(v) => v.byte_len(ctx),
            Variant::UInt64(v) => v.byte_len(ctx),
            Variant::Float(v) => v.byte_len(ctx),
            Variant::Double(v) => v.byte_len(ctx),
            Variant::String(v) => v.byte_len(ctx),
            Variant::DateTime(v) => v.byte_len(ctx),
            Variant::Guid(v) => v.byte_len(ctx),
            Variant::StatusCode(v) => v.byte_len(ctx),
            Variant::ByteString(v) => v.byte_len(ctx),
            Variant::XmlElement(v) => v.byte_len(ctx),
            Variant::QualifiedName(v) => v.byte_len(ctx),
            Variant::LocalizedText(v) => v.byte_len(ctx),
            Variant::NodeId(v) => v.byte_len(ctx),
            Variant::ExpandedNodeId(v) => v.byte_len(ctx),
            Variant::ExtensionObject(v) => v.byte_len(ctx),
            Variant::Variant(v) => v.byte_len(ctx),
            Variant::DataValue(v) => v.byte_len(ctx),
            Variant::DiagnosticInfo(v) => v.byte_len(ctx),
            Variant::Array(_) => {
                // Arrays nested in arrays are not legal, the outer encode handles arrays.
                warn!("Attempt to compute the value length of a nested array");
                0
            }
        }
    }

    /// Encode the value without its encoding mask, the representation used for array elements.
    fn encode_value<S: Write + ?Sized>(
        &self,
        stream: &mut S,
        ctx: &Context<'_>,
    ) -> EncodingResult<()> {
        match self {
            Variant::Empty => Ok(()),
            Variant::Boolean(v) => v.encode(stream, ctx),
            Variant::SByte(v) => v.encode(stream, ctx),
            Variant::Byte(v) => v.encode(stream, ctx),
            Variant::Int16(v) => v.encode(stream, ctx),
            Variant::UInt16(v) => v.encode(stream, ctx),
            Variant::Int32(v) => v.encode(stream, ctx),
            Variant::UInt32(v) => v.encode(stream, ctx),
            Variant::Int64(v) => v.encode(stream, ctx),
            Variant::UInt64(v) => v.encode(stream, ctx),
            Variant::Float(v) => v.encode(stream, ctx),
            Variant::Double(v) => v.encode(stream, ctx),
            Variant::String(v) => v.encode(stream, ctx),
            Variant::DateTime(v) => v.encode(stream, ctx),
            Variant::Guid(v) => v.encode(stream, ctx),
            Variant::StatusCode(v) => v.encode(stream, ctx),
            Variant::ByteString(v) => v.encode(stream, ctx),
            Variant::XmlElement(v) => v.encode(stream, ctx),
            Variant::QualifiedName(v) => v.encode(stream, ctx),
            Variant::LocalizedText(v) => v.encode(stream, ctx),
            Variant::NodeId(v) => v.encode(stream, ctx),
            Variant::ExpandedNodeId(v) => v.encode(stream, ctx),
            Variant::ExtensionObject(v) => v.encode(stream, ctx),
            Variant::Variant(v) => v.encode(stream, ctx),
            Variant::DataValue(v) => v.encode(stream, ctx),
            Variant::DiagnosticInfo(v) => v.encode(stream, ctx),
            Variant::Array(_) => Err(Error::encoding("Arrays cannot be nested inside arrays")),
        }
    }

    /// Decode a value of the given scalar type, without an encoding mask.
    fn decode_value<S: Read + ?Sized>(
        stream: &mut S,
        type_id: VariantScalarTypeId,
        ctx: &Context<'_>,
    ) -> EncodingResult<Self> {
        Ok(match type_id {
            VariantScalarTypeId::Boolean => Variant::Boolean(bool::decode(stream, ctx)?),
            VariantScalarTypeId::SByte => Variant::SByte(i8::decode(stream, ctx)?),
            VariantScalarTypeId::Byte => Variant::Byte(u8::decode(stream, ctx)?),
            VariantScalarTypeId::Int16 => Variant::Int16(i16::decode(stream, ctx)?),
            VariantScalarTypeId::UInt16 => Variant::UInt16(u16::decode(stream, ctx)?),
            VariantScalarTypeId::Int32 => Variant::Int32(i32::decode(stream, ctx)?),
            VariantScalarTypeId::UInt32 => Variant::UInt32(u32::decode(stream, ctx)?),
            VariantScalarTypeId::Int64 => Variant::Int64(i64::decode(stream, ctx)?),
            VariantScalarTypeId::UInt64 => Variant::UInt64(u64::decode(stream, ctx)?),
            VariantScalarTypeId::Float => Variant::Float(f32::decode(stream, ctx)?),
            VariantScalarTypeId::Double => Variant::Double(f64::decode(stream, ctx)?),
            VariantScalarTypeId::String => Variant::String(UAString::decode(stream, ctx)?),
            VariantScalarTypeId::DateTime => {
                Variant::DateTime(Box::new(DateTime::decode(stream, ctx)?))
            }
            VariantScalarTypeId::Guid => Variant::Guid(Box::new(Guid::decode(stream, ctx)?)),
            VariantScalarTypeId::ByteString => {
                Variant::ByteString(ByteString::decode(stream, ctx)?)
            }
            VariantScalarTypeId::XmlElement => {
                Variant::XmlElement(XmlElement::decode(stream, ctx)?)
            }
            VariantScalarTypeId::NodeId => Variant::NodeId(Box::new(NodeId::decode(stream, ctx)?)),
            VariantScalarTypeId::ExpandedNodeId => {
                Variant::ExpandedNodeId(Box::new(ExpandedNodeId::decode(stream, ctx)?))
            }
            VariantScalarTypeId::StatusCode => {
                Variant::StatusCode(StatusCode::decode(stream, ctx)?)
            }
            VariantScalarTypeId::QualifiedName => {
                Variant::QualifiedName(Box::new(QualifiedName::decode(stream, ctx)?))
            }
            VariantScalarTypeId::LocalizedText => {
                Variant::LocalizedText(Box::new(LocalizedText::decode(stream, ctx)?))
            }
            VariantScalarTypeId::ExtensionObject => {
                Variant::ExtensionObject(ExtensionObject::decode(stream, ctx)?)
            }
            VariantScalarTypeId::DataValue => {
                Variant::DataValue(Box::new(DataValue::decode(stream, ctx)?))
            }
            VariantScalarTypeId::Variant => {
                Variant::Variant(Box::new(Variant::decode(stream, ctx)?))
            }
            VariantScalarTypeId::DiagnosticInfo => {
                Variant::DiagnosticInfo(Box::new(DiagnosticInfo::decode(stream, ctx)?))
            }
        })
    }
}
