// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Traits for types with a known encoding ID.

use crate::{DataTypeId, ExpandedNodeId, NodeId, ObjectId};

/// Trait implemented by structures in the core namespace, tying them to their
/// binary encoding ID and data type ID.
pub trait MessageInfo {
    /// The binary encoding object id for this type.
    fn type_id(&self) -> ObjectId;
    /// The data type id for this type.
    fn data_type_id(&self) -> DataTypeId;
}

/// Trait implemented by any type with a known encoding ID, including types outside
/// the core namespace. The IDs are expanded node ids whose namespace URI is resolved
/// against the server's namespace table when encoding.
pub trait ExpandedMessageInfo {
    /// The full binary encoding ID for this type.
    fn full_type_id(&self) -> ExpandedNodeId;
    /// The full data type ID for this type.
    fn full_data_type_id(&self) -> ExpandedNodeId;
}

impl<T> ExpandedMessageInfo for T
where
    T: MessageInfo,
{
    fn full_type_id(&self) -> ExpandedNodeId {
        NodeId::from((0, self.type_id() as u32)).into()
    }

    fn full_data_type_id(&self) -> ExpandedNodeId {
        NodeId::from((0, self.data_type_id() as u32)).into()
    }
}
