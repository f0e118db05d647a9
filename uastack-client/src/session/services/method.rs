//! The Call service.

use uastack_core::ResponseMessage;
use uastack_types::{
    CallMethodRequest, CallMethodResult, CallRequest, NodeId, StatusCode, Variant,
};

use crate::{
    session::{
        process_service_result, process_unexpected_response,
        request_builder::{builder_base, RequestHeaderBuilder},
    },
    AsyncSecureChannel, Session, UARequest,
};

#[derive(Debug, Clone)]
/// Call methods on the server, by sending a [`CallRequest`].
///
/// See OPC UA Part 4 - Services 5.11.2 for a complete description of the service and
/// error responses.
pub struct Call {
    methods_to_call: Vec<CallMethodRequest>,
    header: RequestHeaderBuilder,
}

builder_base!(Call);

impl Call {
    /// Create a new `Call` request on the given session.
    pub fn new(session: &Session) -> Self {
        Self {
            methods_to_call: Vec::new(),
            header: RequestHeaderBuilder::new_from_session(session),
        }
    }

    /// Set the methods to call.
    pub fn methods_to_call(mut self, methods_to_call: Vec<CallMethodRequest>) -> Self {
        self.methods_to_call = methods_to_call;
        self
    }

    /// Add a method to call.
    pub fn method(mut self, method: CallMethodRequest) -> Self {
        self.methods_to_call.push(method);
        self
    }
}

impl UARequest for Call {
    type Out = Vec<CallMethodResult>;

    async fn send<'a>(self, channel: &'a AsyncSecureChannel) -> Result<Self::Out, StatusCode>
    where
        Self: 'a,
    {
        if self.methods_to_call.is_empty() {
            return Err(StatusCode::BadNothingToDo);
        }
        let request = CallRequest {
            request_header: self.header.header,
            methods_to_call: Some(self.methods_to_call),
        };
        let response = channel.send(request, self.header.timeout).await?;
        if let ResponseMessage::Call(response) = response {
            process_service_result(&response.response_header)?;
            Ok(response.results.unwrap_or_default())
        } else {
            Err(process_unexpected_response(response))
        }
    }
}

impl Session {
    /// Call a batch of methods on the server.
    ///
    /// See OPC UA Part 4 - Services 5.11.2 for a complete description of the service.
    pub async fn call(
        &self,
        methods_to_call: Vec<CallMethodRequest>,
    ) -> Result<Vec<CallMethodResult>, StatusCode> {
        Call::new(self)
            .methods_to_call(methods_to_call)
            .send(&self.channel)
            .await
    }

    /// Call a single method with the given input arguments, returning its output
    /// arguments.
    pub async fn call_method(
        &self,
        object_id: impl Into<NodeId>,
        method_id: impl Into<NodeId>,
        input_arguments: Vec<Variant>,
    ) -> Result<Vec<Variant>, StatusCode> {
        let results = self
            .call(vec![CallMethodRequest {
                object_id: object_id.into(),
                method_id: method_id.into(),
                input_arguments: if input_arguments.is_empty() {
                    None
                } else {
                    Some(input_arguments)
                },
            }])
            .await?;
        let result = results
            .into_iter()
            .next()
            .ok_or(StatusCode::BadUnknownResponse)?;
        if result.status_code.is_bad() {
            return Err(result.status_code);
        }
        Ok(result.output_arguments.unwrap_or_default())
    }
}
