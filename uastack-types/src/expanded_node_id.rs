// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Contains the implementation of `ExpandedNodeId`.

use std::{
    self, fmt,
    io::{Read, Write},
};

use crate::{
    byte_string::ByteString,
    encoding::{BinaryDecodable, BinaryEncodable, EncodingResult},
    guid::Guid,
    node_id::{Identifier, NodeId},
    read_u16, read_u32, read_u8,
    string::UAString,
    write_u16, write_u32, write_u8, Context, Error, NamespaceMap, UaNullable,
};

/// A NodeId that allows the namespace URI to be specified instead of an index. When the URI is
/// absent the wire form is bit-compatible with a plain NodeId.
#[derive(PartialEq, Eq, Clone, Debug, Hash, Default)]
pub struct ExpandedNodeId {
    /// Node id
    pub node_id: NodeId,
    /// Namespace URI, takes precedence over the node id's namespace index when set.
    pub namespace_uri: UAString,
    /// Server index
    pub server_index: u32,
}

impl UaNullable for ExpandedNodeId {
    fn is_ua_null(&self) -> bool {
        self.is_null()
    }
}

impl BinaryEncodable for ExpandedNodeId {
    fn byte_len(&self, ctx: &Context<'_>) -> usize {
        let mut size = self.node_id.byte_len(ctx);
        if !self.namespace_uri.is_null() {
            size += self.namespace_uri.byte_len(ctx);
        }
        if self.server_index != 0 {
            size += self.server_index.byte_len(ctx);
        }
        size
    }

    fn encode<S: Write + ?Sized>(&self, stream: &mut S, ctx: &Context<'_>) -> EncodingResult<()> {
        let mut data_encoding = 0;
        if !self.namespace_uri.is_null() {
            data_encoding |= 0x80;
        }
        if self.server_index != 0 {
            data_encoding |= 0x40;
        }

        // Type determines the byte code
        match &self.node_id.identifier {
            Identifier::Numeric(value) => {
                if self.node_id.namespace == 0 && *value <= 255 {
                    write_u8(stream, data_encoding)?;
                    write_u8(stream, *value as u8)?;
                } else if self.node_id.namespace <= 255 && *value <= 65535 {
                    write_u8(stream, data_encoding | 0x1)?;
                    write_u8(stream, self.node_id.namespace as u8)?;
                    write_u16(stream, *value as u16)?;
                } else {
                    write_u8(stream, data_encoding | 0x2)?;
                    write_u16(stream, self.node_id.namespace)?;
                    write_u32(stream, *value)?;
                }
            }
            Identifier::String(value) => {
                write_u8(stream, data_encoding | 0x3)?;
                write_u16(stream, self.node_id.namespace)?;
                value.encode(stream, ctx)?;
            }
            Identifier::Guid(value) => {
                write_u8(stream, data_encoding | 0x4)?;
                write_u16(stream, self.node_id.namespace)?;
                value.encode(stream, ctx)?;
            }
            Identifier::ByteString(ref value) => {
                write_u8(stream, data_encoding | 0x5)?;
                write_u16(stream, self.node_id.namespace)?;
                value.encode(stream, ctx)?;
            }
        }
        if !self.namespace_uri.is_null() {
            self.namespace_uri.encode(stream, ctx)?;
        }
        if self.server_index != 0 {
            self.server_index.encode(stream, ctx)?;
        }
        Ok(())
    }
}

impl BinaryDecodable for ExpandedNodeId {
    fn decode<S: Read + ?Sized>(stream: &mut S, ctx: &Context<'_>) -> EncodingResult<Self> {
        let data_encoding = read_u8(stream)?;
        let identifier = data_encoding & 0x0f;
        let node_id = match identifier {
            0x0 => {
                let value = read_u8(stream)?;
                NodeId::new(0, u32::from(value))
            }
            0x1 => {
                let namespace = read_u8(stream)?;
                let value = read_u16(stream)?;
                NodeId::new(u16::from(namespace), u32::from(value))
            }
            0x2 => {
                let namespace = read_u16(stream)?;
                let value = read_u32(stream)?;
                NodeId::new(namespace, value)
            }
            0x3 => {
                let namespace = read_u16(stream)?;
                let value = UAString::decode(stream, ctx)?;
                NodeId::new(namespace, value)
            }
            0x4 => {
                let namespace = read_u16(stream)?;
                let value = Guid::decode(stream, ctx)?;
                NodeId::new(namespace, value)
            }
            0x5 => {
                let namespace = read_u16(stream)?;
                let value = ByteString::decode(stream, ctx)?;
                NodeId::new(namespace, value)
            }
            _ => {
                return Err(Error::decoding(format!(
                    "Unrecognized expanded node id type {}",
                    identifier
                )));
            }
        };

        let namespace_uri = if data_encoding & 0x80 != 0 {
            UAString::decode(stream, ctx)?
        } else {
            UAString::null()
        };
        let server_index = if data_encoding & 0x40 != 0 {
            u32::decode(stream, ctx)?
        } else {
            0
        };

        Ok(ExpandedNodeId {
            node_id,
            namespace_uri,
            server_index,
        })
    }
}

impl From<&NodeId> for ExpandedNodeId {
    fn from(value: &NodeId) -> Self {
        value.clone().into()
    }
}

impl From<NodeId> for ExpandedNodeId {
    fn from(v: NodeId) -> Self {
        ExpandedNodeId {
            node_id: v,
            namespace_uri: UAString::null(),
            server_index: 0,
        }
    }
}

impl From<(NodeId, &str)> for ExpandedNodeId {
    fn from(v: (NodeId, &str)) -> Self {
        ExpandedNodeId {
            node_id: v.0,
            namespace_uri: v.1.into(),
            server_index: 0,
        }
    }
}

impl fmt::Display for ExpandedNodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.namespace_uri.is_empty() {
            write!(f, "svr={};{}", self.server_index, self.node_id)
        } else {
            // The % and ; chars have to be escaped out in the uri
            let namespace_uri = String::from(self.namespace_uri.as_ref())
                .replace('%', "%25")
                .replace(';', "%3b");
            write!(
                f,
                "svr={};nsu={};{}",
                self.server_index, namespace_uri, self.node_id.identifier
            )
        }
    }
}

impl ExpandedNodeId {
    /// Creates an expanded node id from a node id
    pub fn new(value: impl Into<ExpandedNodeId>) -> ExpandedNodeId {
        value.into()
    }

    /// Return a null expanded node id.
    pub fn null() -> ExpandedNodeId {
        Self::new(NodeId::null())
    }

    /// Test if the expanded node id is null.
    pub fn is_null(&self) -> bool {
        self.node_id.is_null() && self.namespace_uri.is_null()
    }

    /// Try to resolve the namespace URI to an index in the given namespace map, yielding a plain
    /// NodeId usable on the wire. Fails with `None` if the namespace is not known by the server.
    pub fn try_resolve<'a>(&'a self, namespaces: &NamespaceMap) -> Option<std::borrow::Cow<'a, NodeId>> {
        if self.namespace_uri.is_null() {
            Some(std::borrow::Cow::Borrowed(&self.node_id))
        } else {
            let index = namespaces.get_index(self.namespace_uri.as_ref())?;
            Some(std::borrow::Cow::Owned(NodeId {
                namespace: index,
                identifier: self.node_id.identifier.clone(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContextOwned;
    use std::io::Cursor;

    #[test]
    fn node_id_compatible_when_uri_absent() {
        let owned = ContextOwned::default();
        let ctx = owned.context();
        let node_id = NodeId::new(2, 300u32);
        let expanded = ExpandedNodeId::from(node_id.clone());
        assert_eq!(expanded.encode_to_vec(&ctx), node_id.encode_to_vec(&ctx));
    }

    #[test]
    fn uri_and_server_index_round_trip() {
        let owned = ContextOwned::default();
        let ctx = owned.context();
        let expanded = ExpandedNodeId {
            node_id: NodeId::new(0, 42u32),
            namespace_uri: "urn:some:namespace".into(),
            server_index: 3,
        };
        let buf = expanded.encode_to_vec(&ctx);
        assert_eq!(buf[0] & 0xc0, 0xc0);
        let mut stream = Cursor::new(buf);
        assert_eq!(ExpandedNodeId::decode(&mut stream, &ctx).unwrap(), expanded);
    }
}
