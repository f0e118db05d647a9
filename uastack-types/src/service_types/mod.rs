// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! The request, response and support structures for the services this stack speaks,
//! with their binary codec implementations.
//!
//! The full OPC UA standard defines several hundred of these. The catalog here is
//! restricted to what the client runtime actually uses. Structures are declared through
//! the [`ua_structure`] macro, which pins each one to its encoding and data type ids and
//! derives the codec from the field list. The decoding side of types that can appear
//! inside extension objects is registered with [`CoreTypeLoader`].

mod attributes;
mod common;
mod discovery;
mod filters;
mod method;
mod notifications;
mod secure_channel;
mod session;
mod subscriptions;

pub use attributes::*;
pub use common::*;
pub use discovery::*;
pub use filters::*;
pub use method::*;
pub use notifications::*;
pub use secure_channel::*;
pub use session::*;
pub use subscriptions::*;

use lazy_static::lazy_static;

use crate::type_loader::{
    binary_decode_to_enc, TypeLoader, TypeLoaderInstance, TypeLoaderPriority,
};

/// Declares an OPC UA structure: the struct itself, its [`crate::MessageInfo`] binding
/// the encoding ids, and the binary codec derived from the field list in declaration
/// order, which is also wire order.
macro_rules! ua_structure {
    (
        $(#[$attr:meta])*
        pub struct $name:ident : $object_id:ident, $data_type_id:ident {
            $(
                $(#[$fattr:meta])*
                pub $field:ident : $ty:ty,
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Default)]
        #[allow(missing_docs)]
        pub struct $name {
            $(
                $(#[$fattr])*
                pub $field: $ty,
            )*
        }

        impl crate::MessageInfo for $name {
            fn type_id(&self) -> crate::ObjectId {
                crate::ObjectId::$object_id
            }

            fn data_type_id(&self) -> crate::DataTypeId {
                crate::DataTypeId::$data_type_id
            }
        }

        impl crate::BinaryEncodable for $name {
            fn byte_len(&self, ctx: &crate::Context<'_>) -> usize {
                let mut size = 0usize;
                $(
                    size += crate::BinaryEncodable::byte_len(&self.$field, ctx);
                )*
                size
            }

            fn encode<S: std::io::Write + ?Sized>(
                &self,
                stream: &mut S,
                ctx: &crate::Context<'_>,
            ) -> crate::EncodingResult<()> {
                $(
                    crate::BinaryEncodable::encode(&self.$field, stream, ctx)?;
                )*
                Ok(())
            }
        }

        impl crate::BinaryDecodable for $name {
            fn decode<S: std::io::Read + ?Sized>(
                stream: &mut S,
                ctx: &crate::Context<'_>,
            ) -> crate::EncodingResult<Self> {
                Ok(Self {
                    $(
                        $field: crate::BinaryDecodable::decode(stream, ctx)?,
                    )*
                })
            }
        }
    };
}

pub(crate) use ua_structure;

lazy_static! {
    static ref CORE_TYPES: TypeLoaderInstance = {
        let mut instance = TypeLoaderInstance::new();
        // Types that can travel inside an extension object body.
        instance.add_binary_type(
            crate::DataTypeId::Argument as u32,
            crate::ObjectId::Argument_Encoding_DefaultBinary as u32,
            binary_decode_to_enc::<Argument>,
        );
        instance.add_binary_type(
            crate::DataTypeId::AnonymousIdentityToken as u32,
            crate::ObjectId::AnonymousIdentityToken_Encoding_DefaultBinary as u32,
            binary_decode_to_enc::<AnonymousIdentityToken>,
        );
        instance.add_binary_type(
            crate::DataTypeId::UserNameIdentityToken as u32,
            crate::ObjectId::UserNameIdentityToken_Encoding_DefaultBinary as u32,
            binary_decode_to_enc::<UserNameIdentityToken>,
        );
        instance.add_binary_type(
            crate::DataTypeId::X509IdentityToken as u32,
            crate::ObjectId::X509IdentityToken_Encoding_DefaultBinary as u32,
            binary_decode_to_enc::<X509IdentityToken>,
        );
        instance.add_binary_type(
            crate::DataTypeId::IssuedIdentityToken as u32,
            crate::ObjectId::IssuedIdentityToken_Encoding_DefaultBinary as u32,
            binary_decode_to_enc::<IssuedIdentityToken>,
        );
        instance.add_binary_type(
            crate::DataTypeId::DataChangeFilter as u32,
            crate::ObjectId::DataChangeFilter_Encoding_DefaultBinary as u32,
            binary_decode_to_enc::<DataChangeFilter>,
        );
        instance.add_binary_type(
            crate::DataTypeId::EventFilter as u32,
            crate::ObjectId::EventFilter_Encoding_DefaultBinary as u32,
            binary_decode_to_enc::<EventFilter>,
        );
        instance.add_binary_type(
            crate::DataTypeId::ContentFilter as u32,
            crate::ObjectId::ContentFilter_Encoding_DefaultBinary as u32,
            binary_decode_to_enc::<ContentFilter>,
        );
        instance.add_binary_type(
            crate::DataTypeId::SimpleAttributeOperand as u32,
            crate::ObjectId::SimpleAttributeOperand_Encoding_DefaultBinary as u32,
            binary_decode_to_enc::<SimpleAttributeOperand>,
        );
        instance.add_binary_type(
            crate::DataTypeId::DataChangeNotification as u32,
            crate::ObjectId::DataChangeNotification_Encoding_DefaultBinary as u32,
            binary_decode_to_enc::<DataChangeNotification>,
        );
        instance.add_binary_type(
            crate::DataTypeId::EventNotificationList as u32,
            crate::ObjectId::EventNotificationList_Encoding_DefaultBinary as u32,
            binary_decode_to_enc::<EventNotificationList>,
        );
        instance.add_binary_type(
            crate::DataTypeId::StatusChangeNotification as u32,
            crate::ObjectId::StatusChangeNotification_Encoding_DefaultBinary as u32,
            binary_decode_to_enc::<StatusChangeNotification>,
        );
        instance
    };
}

/// Type loader for the structures in the core namespace.
pub struct CoreTypeLoader;

impl TypeLoader for CoreTypeLoader {
    fn load_from_binary(
        &self,
        node_id: &crate::NodeId,
        stream: &mut dyn std::io::Read,
        ctx: &crate::Context<'_>,
    ) -> Option<crate::EncodingResult<Box<dyn crate::DynEncodable>>> {
        if node_id.namespace != 0 {
            return None;
        }
        let num_id = node_id.as_u32()?;
        CORE_TYPES.decode_binary(num_id, stream, ctx)
    }

    fn priority(&self) -> TypeLoaderPriority {
        TypeLoaderPriority::Core
    }
}
