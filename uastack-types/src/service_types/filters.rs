// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Monitored item filters: data change filters and event filters.

use super::ua_structure;
use crate::{
    DataChangeTrigger, ExtensionObject, FilterOperator, NodeId, QualifiedName, UAString,
};

ua_structure! {
    /// Limits the data changes reported for a monitored item by trigger and deadband.
    pub struct DataChangeFilter: DataChangeFilter_Encoding_DefaultBinary, DataChangeFilter {
        pub trigger: DataChangeTrigger,
        pub deadband_type: u32,
        pub deadband_value: f64,
    }
}

ua_structure! {
    /// Selects an attribute of a node related to an event type by a browse path.
    /// Used as the select and where clause operand of event filters.
    pub struct SimpleAttributeOperand: SimpleAttributeOperand_Encoding_DefaultBinary, SimpleAttributeOperand {
        pub type_definition_id: NodeId,
        pub browse_path: Option<Vec<QualifiedName>>,
        pub attribute_id: u32,
        pub index_range: UAString,
    }
}

impl SimpleAttributeOperand {
    /// Select a field of the base event type by name, the common case for event select clauses.
    pub fn event_field(name: &str) -> SimpleAttributeOperand {
        SimpleAttributeOperand {
            // BaseEventType
            type_definition_id: NodeId::new(0, 2041u32),
            browse_path: Some(vec![QualifiedName::from(name)]),
            attribute_id: crate::AttributeId::Value as u32,
            index_range: UAString::null(),
        }
    }
}

ua_structure! {
    /// One element of a content filter, an operator applied to a list of operands.
    pub struct ContentFilterElement: ContentFilterElement_Encoding_DefaultBinary, ContentFilterElement {
        pub filter_operator: FilterOperator,
        pub filter_operands: Option<Vec<ExtensionObject>>,
    }
}

ua_structure! {
    /// A boolean expression over event fields, used as the where clause of event filters.
    pub struct ContentFilter: ContentFilter_Encoding_DefaultBinary, ContentFilter {
        pub elements: Option<Vec<ContentFilterElement>>,
    }
}

ua_structure! {
    /// Determines which events are reported for a monitored item and which of their
    /// fields are delivered.
    pub struct EventFilter: EventFilter_Encoding_DefaultBinary, EventFilter {
        pub select_clauses: Option<Vec<SimpleAttributeOperand>>,
        pub where_clause: ContentFilter,
    }
}
