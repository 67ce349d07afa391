use toolrelay_common::RelayError;
use toolrelay_protocol::{ChatCompletionRequestBody, ChatMessage};

/// Instruction prepended to every conversation.
pub const SYSTEM_PROMPT: &str = "
You are task oriented system.
You receive input from a user, process the input from the given instructions, and then output the result.
Your objective is to provide consistent and correct results.
Call the provided tools as needed to complete the task.
You do not need to explain the steps taken, only provide the result to the given instructions.
You are referred to as a tool.
You don't move to the next step until you have a result.
";

/// Validated request, ready to send upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamCallParams {
    pub body: ChatCompletionRequestBody,
}

impl UpstreamCallParams {
    pub fn is_stream(&self) -> bool {
        self.body.is_stream()
    }

    pub fn model(&self) -> &str {
        &self.body.model
    }
}

/// Turns a raw inbound body into upstream call parameters.
#[derive(Debug, Clone)]
pub struct PayloadTransformer {
    system: ChatMessage,
}

impl PayloadTransformer {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let prompt: String = system_prompt.into();
        Self {
            system: ChatMessage::system(prompt),
        }
    }

    pub fn system_message(&self) -> &ChatMessage {
        &self.system
    }

    /// Parses `raw_body` and prepends the system message.
    ///
    /// Only `model` and `messages` are checked. Optional keys keep their exact
    /// presence, so a key the caller did not send is not sent upstream either.
    pub fn transform(&self, raw_body: &[u8]) -> Result<UpstreamCallParams, RelayError> {
        let mut body: ChatCompletionRequestBody =
            serde_json::from_slice(raw_body).map_err(malformed)?;

        let mut messages = Vec::with_capacity(body.messages.len() + 1);
        messages.push(self.system.clone());
        messages.append(&mut body.messages);
        body.messages = messages;

        Ok(UpstreamCallParams { body })
    }
}

impl Default for PayloadTransformer {
    fn default() -> Self {
        Self::new(SYSTEM_PROMPT)
    }
}

fn malformed(err: serde_json::Error) -> RelayError {
    use serde_json::error::Category;

    match err.classify() {
        Category::Syntax | Category::Eof => {
            RelayError::malformed(format!("request body is not valid JSON: {err}"))
        }
        Category::Data => RelayError::malformed(format!("invalid chat completion request: {err}")),
        Category::Io => RelayError::malformed(format!("unable to read request body: {err}")),
    }
}
