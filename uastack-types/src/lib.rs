// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! The data model and binary codec of the OPC UA TCP binary mapping: built-in types,
//! status codes, service structures, and the type registry used to resolve extension
//! object bodies.
//!
//! All multi-byte values are little endian on the wire. Strings and byte strings are
//! length prefixed with a signed 32 bit count where -1 denotes null, which is distinct
//! from empty.

#![warn(missing_docs)]

pub mod constants;

mod basic_types;
mod byte_string;
mod data_value;
mod date_time;
mod diagnostic_info;
mod expanded_node_id;
mod guid;
mod ids;
mod localized_text;
mod message_info;
mod namespaces;
mod qualified_name;
mod request_header;
mod response_header;
mod status_code;
mod string;
mod type_loader;
mod variant;

pub mod encoding;
pub mod extension_object;
pub mod node_id;
pub mod service_types;

pub use basic_types::*;
pub use byte_string::ByteString;
pub use data_value::{DataValue, DataValueFlags};
pub use date_time::DateTime;
pub use diagnostic_info::{DiagnosticInfo, DiagnosticInfoMask};
pub use encoding::*;
pub use expanded_node_id::ExpandedNodeId;
pub use extension_object::{DynEncodable, ExtensionObject, ExtensionObjectBody};
pub use guid::Guid;
pub use ids::{DataTypeId, ObjectId, VariableId};
pub use localized_text::LocalizedText;
pub use message_info::{ExpandedMessageInfo, MessageInfo};
pub use namespaces::NamespaceMap;
pub use node_id::{Identifier, NodeId};
pub use qualified_name::QualifiedName;
pub use request_header::{DiagnosticBits, RequestHeader};
pub use response_header::ResponseHeader;
pub use service_types::*;
pub use status_code::StatusCode;
pub use string::{UAString, XmlElement};
pub use type_loader::{
    binary_decode_to_enc, Context, ContextOwned, StaticTypeLoader, TypeLoader,
    TypeLoaderCollection, TypeLoaderInstance, TypeLoaderPriority,
};
pub use variant::{Array, Variant, VariantScalarTypeId};

#[cfg(test)]
mod tests;
