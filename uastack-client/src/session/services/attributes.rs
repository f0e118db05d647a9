//! Attribute services: Read and Write.

use uastack_core::ResponseMessage;
use uastack_types::{
    DataValue, NodeId, ReadRequest, ReadValueId, StatusCode, TimestampsToReturn, WriteRequest,
    WriteValue,
};

use crate::{
    session::{
        process_service_result, process_unexpected_response,
        request_builder::{builder_base, RequestHeaderBuilder},
    },
    AsyncSecureChannel, Session, UARequest,
};

#[derive(Debug, Clone)]
/// Read attribute values from nodes, by sending a [`ReadRequest`] to the server.
///
/// See OPC UA Part 4 - Services 5.10.2 for a complete description of the service and
/// error responses.
pub struct Read {
    nodes_to_read: Vec<ReadValueId>,
    max_age: f64,
    timestamps_to_return: TimestampsToReturn,
    header: RequestHeaderBuilder,
}

builder_base!(Read);

impl Read {
    /// Create a new `Read` request on the given session.
    pub fn new(session: &Session) -> Self {
        Self {
            nodes_to_read: Vec::new(),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Neither,
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }

    /// Set the nodes to read.
    pub fn nodes_to_read(mut self, nodes_to_read: Vec<ReadValueId>) -> Self {
        self.nodes_to_read = nodes_to_read;
        self
    }

    /// Add a node to read.
    pub fn node(mut self, node: impl Into<ReadValueId>) -> Self {
        self.nodes_to_read.push(node.into());
        self
    }

    /// Set the maximum acceptable age in milliseconds of cached values, 0 forces a
    /// fresh read from the source.
    pub fn max_age(mut self, max_age: f64) -> Self {
        self.max_age = max_age;
        self
    }

    /// Set which timestamps the server should return.
    pub fn timestamps_to_return(mut self, timestamps_to_return: TimestampsToReturn) -> Self {
        self.timestamps_to_return = timestamps_to_return;
        self
    }
}

impl UARequest for Read {
    type Out = Vec<DataValue>;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        if self.nodes_to_read.is_empty() {
            return Err(StatusCode::BadNothingToDo);
        }
        let request = ReadRequest {
            request_header: self.header.header,
            max_age: self.max_age,
            timestamps_to_return: self.timestamps_to_return,
            nodes_to_read: Some(self.nodes_to_read),
        };
        let response = channel.send(request, self.header.timeout).await?;
        if let ResponseMessage::Read(response) = response {
            process_service_result(&response.response_header)?;
            Ok(response.results.unwrap_or_default())
        } else {
            Err(process_unexpected_response(response))
        }
    }
}

#[derive(Debug, Clone)]
/// Write attribute values to nodes, by sending a [`WriteRequest`] to the server.
///
/// See OPC UA Part 4 - Services 5.10.4 for a complete description of the service and
/// error responses.
pub struct Write {
    nodes_to_write: Vec<WriteValue>,
    header: RequestHeaderBuilder,
}

builder_base!(Write);

impl Write {
    /// Create a new `Write` request on the given session.
    pub fn new(session: &Session) -> Self {
        Self {
            nodes_to_write: Vec::new(),
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }

    /// Set the values to write.
    pub fn nodes_to_write(mut self, nodes_to_write: Vec<WriteValue>) -> Self {
        self.nodes_to_write = nodes_to_write;
        self
    }

    /// Add a value to write.
    pub fn value(mut self, value: WriteValue) -> Self {
        self.nodes_to_write.push(value);
        self
    }
}

impl UARequest for Write {
    type Out = Vec<StatusCode>;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        if self.nodes_to_write.is_empty() {
            return Err(StatusCode::BadNothingToDo);
        }
        let request = WriteRequest {
            request_header: self.header.header,
            nodes_to_write: Some(self.nodes_to_write),
        };
        let response = channel.send(request, self.header.timeout).await?;
        if let ResponseMessage::Write(response) = response {
            process_service_result(&response.response_header)?;
            Ok(response.results.unwrap_or_default())
        } else {
            Err(process_unexpected_response(response))
        }
    }
}

impl Session {
    /// Read the attributes identified by `nodes_to_read`, returning one data value per
    /// input in input order.
    ///
    /// See OPC UA Part 4 - Services 5.10.2 for a complete description of the service.
    pub async fn read(
        &self,
        nodes_to_read: &[ReadValueId],
        timestamps_to_return: TimestampsToReturn,
        max_age: f64,
    ) -> Result<Vec<DataValue>, StatusCode> {
        Read::new(self)
            .nodes_to_read(nodes_to_read.to_vec())
            .timestamps_to_return(timestamps_to_return)
            .max_age(max_age)
            .send(&self.channel)
            .await
    }

    /// Read the value attribute of a single node.
    pub async fn read_value(&self, node_id: NodeId) -> Result<DataValue, StatusCode> {
        let results = self
            .read(
                &[ReadValueId::value_of(node_id)],
                TimestampsToReturn::Server,
                0.0,
            )
            .await?;
        results
            .into_iter()
            .next()
            .ok_or(StatusCode::BadUnknownResponse)
    }

    /// Write values to the attributes identified by `nodes_to_write`, returning one
    /// status code per input in input order.
    ///
    /// See OPC UA Part 4 - Services 5.10.4 for a complete description of the service.
    pub async fn write(
        &self,
        nodes_to_write: &[WriteValue],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        Write::new(self)
            .nodes_to_write(nodes_to_write.to_vec())
            .send(&self.channel)
            .await
    }
}
