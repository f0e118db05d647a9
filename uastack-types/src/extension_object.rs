// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `ExtensionObject`.

use std::{
    any::Any,
    fmt,
    io::{Cursor, Read, Write},
};

use crate::{
    byte_string::ByteString,
    encoding::{
        read_i32, read_u8, write_i32, write_u8, BinaryDecodable, BinaryEncodable, EncodingResult,
        UaNullable,
    },
    expanded_node_id::ExpandedNodeId,
    node_id::NodeId,
    string::XmlElement,
    Context, Error, ExpandedMessageInfo,
};

/// Trait for an OPC UA struct that can be dynamically encoded back to binary.
/// [`ExtensionObject`] wraps a dynamic object for this trait.
///
/// This trait is automatically implemented for anything that implements
/// [`BinaryEncodable`], [`ExpandedMessageInfo`], [`Send`], [`Sync`], [`Clone`],
/// [`std::fmt::Debug`] and [`PartialEq`].
pub trait DynEncodable: Any + Send + Sync + std::fmt::Debug {
    /// Encode the struct using OPC UA binary encoding.
    fn encode_binary(
        &self,
        stream: &mut dyn std::io::Write,
        ctx: &Context<'_>,
    ) -> EncodingResult<()>;

    /// Get the binary byte length of this struct.
    fn byte_len_dyn(&self, ctx: &Context<'_>) -> usize;

    /// Get the binary encoding ID of this struct.
    fn binary_type_id(&self) -> ExpandedNodeId;

    /// Get the data type ID of this struct.
    fn data_type_id(&self) -> ExpandedNodeId;

    /// Method to cast this to a dyn Any box, required for downcasting.
    fn as_dyn_any(self: Box<Self>) -> Box<dyn Any + Send + Sync + 'static>;

    /// Method to cast this to a dyn Any trait object, required for downcasting by reference.
    fn as_dyn_any_ref(&self) -> &(dyn Any + Send + Sync);

    /// Clone this to a dyn box. Required in order to implement Clone for ExtensionObject.
    fn clone_box(&self) -> Box<dyn DynEncodable>;

    /// Compare this with a dynamic object. Invokes the PartialEq implementation of self and other,
    /// if other has type `Self`.
    fn dyn_eq(&self, other: &dyn DynEncodable) -> bool;

    /// Get the type name of the type, by calling `std::any::type_name` on `Self`.
    fn type_name(&self) -> &'static str;
}

impl<T> DynEncodable for T
where
    T: BinaryEncodable + ExpandedMessageInfo + Any + fmt::Debug + Send + Sync + Clone + PartialEq,
{
    fn encode_binary(
        &self,
        stream: &mut dyn std::io::Write,
        ctx: &Context<'_>,
    ) -> EncodingResult<()> {
        BinaryEncodable::encode(self, stream, ctx)
    }

    fn byte_len_dyn(&self, ctx: &Context<'_>) -> usize {
        BinaryEncodable::byte_len(self, ctx)
    }

    fn binary_type_id(&self) -> ExpandedNodeId {
        self.full_type_id()
    }

    fn data_type_id(&self) -> ExpandedNodeId {
        self.full_data_type_id()
    }

    fn as_dyn_any(self: Box<Self>) -> Box<dyn Any + Send + Sync + 'static> {
        self
    }

    fn as_dyn_any_ref(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn clone_box(&self) -> Box<dyn DynEncodable> {
        Box::new(self.clone())
    }

    fn dyn_eq(&self, other: &dyn DynEncodable) -> bool {
        if let Some(o) = other.as_dyn_any_ref().downcast_ref::<Self>() {
            o == self
        } else {
            false
        }
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl PartialEq for dyn DynEncodable {
    fn eq(&self, other: &dyn DynEncodable) -> bool {
        self.dyn_eq(other)
    }
}

/// The body of an extension object.
#[derive(Debug, Default)]
pub enum ExtensionObjectBody {
    /// No body.
    #[default]
    None,
    /// An opaque byte string body, used when the type id is not known to any
    /// registered type loader.
    ByteString {
        /// Encoding id of the type.
        type_id: ExpandedNodeId,
        /// The raw serialized body.
        bytes: ByteString,
    },
    /// An opaque XML element body. The XML mapping is not implemented, the content
    /// is carried as-is.
    XmlElement {
        /// Encoding id of the type.
        type_id: ExpandedNodeId,
        /// The raw XML body.
        xml: XmlElement,
    },
    /// A body decoded to a structure known to the type registry.
    Decoded(Box<dyn DynEncodable>),
}

impl Clone for ExtensionObjectBody {
    fn clone(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::ByteString { type_id, bytes } => Self::ByteString {
                type_id: type_id.clone(),
                bytes: bytes.clone(),
            },
            Self::XmlElement { type_id, xml } => Self::XmlElement {
                type_id: type_id.clone(),
                xml: xml.clone(),
            },
            Self::Decoded(body) => Self::Decoded(body.clone_box()),
        }
    }
}

impl PartialEq for ExtensionObjectBody {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (
                Self::ByteString { type_id, bytes },
                Self::ByteString {
                    type_id: other_id,
                    bytes: other_bytes,
                },
            ) => type_id == other_id && bytes == other_bytes,
            (
                Self::XmlElement { type_id, xml },
                Self::XmlElement {
                    type_id: other_id,
                    xml: other_xml,
                },
            ) => type_id == other_id && xml == other_xml,
            (Self::Decoded(body), Self::Decoded(other_body)) => body.dyn_eq(other_body.as_ref()),
            _ => false,
        }
    }
}

/// A container for a structure, either one known to the type registry and fully decoded,
/// or an opaque byte string or XML payload tagged with its encoding id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtensionObject {
    /// The body of the extension object.
    pub body: ExtensionObjectBody,
}

impl UaNullable for ExtensionObject {}

// Body kind discriminators on the wire.
const BODY_NONE: u8 = 0x0;
const BODY_BYTE_STRING: u8 = 0x1;
const BODY_XML: u8 = 0x2;

// Adapter that forwards to a possibly-`?Sized` `Write` stream, letting it be
// unsize-coerced to `&mut dyn Write` (required by `DynEncodable::encode_binary`)
// since the adapter itself is always `Sized`.
struct WriteAdapter<'a, S: ?Sized>(&'a mut S);

impl<S: Write + ?Sized> Write for WriteAdapter<'_, S> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl BinaryEncodable for ExtensionObject {
    fn byte_len(&self, ctx: &Context<'_>) -> usize {
        match &self.body {
            ExtensionObjectBody::None => NodeId::null().byte_len(ctx) + 1,
            ExtensionObjectBody::ByteString { type_id, bytes } => {
                self.node_id_byte_len(type_id, ctx) + 1 + bytes.byte_len(ctx)
            }
            ExtensionObjectBody::XmlElement { type_id, xml } => {
                self.node_id_byte_len(type_id, ctx) + 1 + xml.byte_len(ctx)
            }
            ExtensionObjectBody::Decoded(body) => {
                self.node_id_byte_len(&body.binary_type_id(), ctx) + 1 + 4 + body.byte_len_dyn(ctx)
            }
        }
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S, ctx: &Context<'_>) -> EncodingResult<()> {
        match &self.body {
            ExtensionObjectBody::None => {
                NodeId::null().encode(stream, ctx)?;
                write_u8(stream, BODY_NONE)
            }
            ExtensionObjectBody::ByteString { type_id, bytes } => {
                self.encode_node_id(stream, type_id, ctx)?;
                write_u8(stream, BODY_BYTE_STRING)?;
                bytes.encode(stream, ctx)
            }
            ExtensionObjectBody::XmlElement { type_id, xml } => {
                self.encode_node_id(stream, type_id, ctx)?;
                write_u8(stream, BODY_XML)?;
                xml.encode(stream, ctx)
            }
            ExtensionObjectBody::Decoded(body) => {
                self.encode_node_id(stream, &body.binary_type_id(), ctx)?;
                // A decoded body is written as a byte string whose length is emitted up front.
                write_u8(stream, BODY_BYTE_STRING)?;
                write_i32(stream, body.byte_len_dyn(ctx) as i32)?;
                body.encode_binary(&mut WriteAdapter(stream), ctx)
            }
        }
    }
}

impl BinaryDecodable for ExtensionObject {
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self> {
        let _depth_lock = ctx.options().depth_lock()?;
        let node_id = NodeId::decode(stream, ctx)?;
        let body_kind = read_u8(stream)?;
        let body = match body_kind {
            BODY_NONE => ExtensionObjectBody::None,
            BODY_BYTE_STRING => {
                let len = read_i32(stream)?;
                if len < 0 {
                    ExtensionObjectBody::None
                } else if len as usize > ctx.options().max_byte_string_length {
                    return Err(Error::decoding(format!(
                        "Extension object body length {} exceeds decoding limit {}",
                        len,
                        ctx.options().max_byte_string_length
                    )));
                } else {
                    // Read the full body before attempting to decode it, so a failed or partial
                    // decode can never run past the declared bound.
                    let mut raw = vec![0u8; len as usize];
                    stream.read_exact(&mut raw).map_err(Error::decoding)?;
                    let mut cursor = Cursor::new(&raw[..]);
                    match ctx.load_from_binary(&node_id, &mut cursor) {
                        Some(decoded) => ExtensionObjectBody::Decoded(decoded?),
                        // Unknown type ids are carried as opaque byte strings, not errors.
                        None => ExtensionObjectBody::ByteString {
                            type_id: node_id.into(),
                            bytes: ByteString::from(raw),
                        },
                    }
                }
            }
            BODY_XML => ExtensionObjectBody::XmlElement {
                type_id: node_id.into(),
                xml: XmlElement::decode(stream, ctx)?,
            },
            other => {
                return Err(Error::decoding(format!(
                    "Invalid extension object body kind {}",
                    other
                )));
            }
        };
        Ok(ExtensionObject { body })
    }
}

impl ExtensionObject {
    /// Create an extension object with no body.
    pub fn null() -> ExtensionObject {
        ExtensionObject {
            body: ExtensionObjectBody::None,
        }
    }

    /// Create an extension object from a structure with a known encoding id.
    pub fn from_message<T: DynEncodable>(value: T) -> ExtensionObject {
        ExtensionObject {
            body: ExtensionObjectBody::Decoded(Box::new(value)),
        }
    }

    /// Test if the extension object has no body.
    pub fn is_null(&self) -> bool {
        matches!(self.body, ExtensionObjectBody::None)
    }

    /// The encoding id of the body, null for an empty body.
    pub fn type_id(&self) -> ExpandedNodeId {
        match &self.body {
            ExtensionObjectBody::None => ExpandedNodeId::null(),
            ExtensionObjectBody::ByteString { type_id, .. } => type_id.clone(),
            ExtensionObjectBody::XmlElement { type_id, .. } => type_id.clone(),
            ExtensionObjectBody::Decoded(body) => body.binary_type_id(),
        }
    }

    /// Test if the decoded body has the given type.
    pub fn inner_is<T: DynEncodable>(&self) -> bool {
        match &self.body {
            ExtensionObjectBody::Decoded(body) => body.as_dyn_any_ref().is::<T>(),
            _ => false,
        }
    }

    /// Get a reference to the decoded body if it has the given type.
    pub fn inner_as<T: DynEncodable>(&self) -> Option<&T> {
        match &self.body {
            ExtensionObjectBody::Decoded(body) => body.as_dyn_any_ref().downcast_ref(),
            _ => None,
        }
    }

    /// Consume the extension object, returning the decoded body if it has the given type.
    pub fn into_inner_as<T: DynEncodable>(self) -> Option<Box<T>> {
        match self.body {
            ExtensionObjectBody::Decoded(body) => body.as_dyn_any().downcast().ok(),
            _ => None,
        }
    }

    fn node_id_byte_len(&self, type_id: &ExpandedNodeId, ctx: &Context<'_>) -> usize {
        type_id
            .try_resolve(ctx.namespaces())
            .map(|id| id.byte_len(ctx))
            // Encode will fail, byte_len has no way to report it.
            .unwrap_or(2)
    }

    fn encode_node_id<S: Write + ?Sized>(
        &self,
        stream: &mut S,
        type_id: &ExpandedNodeId,
        ctx: &Context<'_>,
    ) -> EncodingResult<()> {
        let Some(id) = type_id.try_resolve(ctx.namespaces()) else {
            return Err(Error::encoding(format!(
                "Unable to resolve namespace of encoding id {}",
                type_id
            )));
        };
        id.encode(stream, ctx)
    }
}

/// Dispatch an owned extension object body over a list of candidate types. Falls through
/// silently when the body matches none of them.
#[macro_export]
macro_rules! match_extension_object_owned {
    ($obj:ident, $($name:ident : $ty:ty => $block:expr),* $(,)?) => {
        $(
            if $obj.inner_is::<$ty>() {
                let $name = *$obj.into_inner_as::<$ty>().unwrap();
                $block
            } else
        )* {}
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Argument, ContextOwned, LocalizedText};

    #[test]
    fn unknown_type_decodes_as_byte_string() {
        let owned = ContextOwned::default();
        let ctx = owned.context();
        // Hand-build an extension object with a type id no loader knows.
        let mut buf = Vec::new();
        NodeId::new(0, 999_999u32).encode(&mut buf, &ctx).unwrap();
        write_u8(&mut buf, BODY_BYTE_STRING).unwrap();
        ByteString::from(&[1u8, 2, 3]).encode(&mut buf, &ctx).unwrap();

        let mut stream = Cursor::new(buf);
        let obj = ExtensionObject::decode(&mut stream, &ctx).unwrap();
        let ExtensionObjectBody::ByteString { type_id, bytes } = obj.body else {
            panic!("expected byte string body, got {:?}", obj.body);
        };
        assert_eq!(type_id.node_id, NodeId::new(0, 999_999u32));
        assert_eq!(bytes, ByteString::from(&[1u8, 2, 3]));
    }

    #[test]
    fn known_type_round_trip() {
        let owned = ContextOwned::default();
        let ctx = owned.context();
        let argument = Argument {
            name: "arg".into(),
            data_type: NodeId::new(0, 6u32),
            value_rank: -1,
            array_dimensions: None,
            description: LocalizedText::from("an argument"),
        };
        let obj = ExtensionObject::from_message(argument.clone());
        let buf = obj.encode_to_vec(&ctx);
        let mut stream = Cursor::new(buf);
        let decoded = ExtensionObject::decode(&mut stream, &ctx).unwrap();
        assert_eq!(decoded.inner_as::<Argument>(), Some(&argument));
        assert_eq!(decoded, obj);
    }

    #[test]
    fn null_round_trip() {
        let owned = ContextOwned::default();
        let ctx = owned.context();
        let obj = ExtensionObject::null();
        let buf = obj.encode_to_vec(&ctx);
        assert_eq!(buf, vec![0x00, 0x00, 0x00]);
        let mut stream = Cursor::new(buf);
        assert!(ExtensionObject::decode(&mut stream, &ctx).unwrap().is_null());
    }
}
