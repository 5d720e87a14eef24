//! Serverless invocation context (request id, function ARN)

use super::{missing_capabilities, EnrichmentBlock, Enricher};
use crate::error::LoggerError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::borrow::Cow;

pub const BLOCK_NAME: &str = "lambda_context";

/// What the logger needs from an invocation context.
///
/// Accessors return `None` when the value is absent; an empty string counts
/// as absent.
pub trait InvocationContext {
    fn request_id(&self) -> Option<Cow<'_, str>>;

    fn invoked_function_arn(&self) -> Option<Cow<'_, str>>;

    fn function_name(&self) -> Option<Cow<'_, str>> {
        None
    }
}

/// Owned invocation context for callers that don't have one of their own
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LambdaInvocation {
    pub aws_request_id: String,
    pub invoked_function_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
}

impl LambdaInvocation {
    pub fn new(aws_request_id: impl Into<String>, invoked_function_arn: impl Into<String>) -> Self {
        Self {
            aws_request_id: aws_request_id.into(),
            invoked_function_arn: invoked_function_arn.into(),
            function_name: None,
        }
    }

    pub fn with_function_name(mut self, function_name: impl Into<String>) -> Self {
        self.function_name = Some(function_name.into());
        self
    }
}

fn non_empty(value: &str) -> Option<Cow<'_, str>> {
    (!value.is_empty()).then_some(Cow::Borrowed(value))
}

impl InvocationContext for LambdaInvocation {
    fn request_id(&self) -> Option<Cow<'_, str>> {
        non_empty(&self.aws_request_id)
    }

    fn invoked_function_arn(&self) -> Option<Cow<'_, str>> {
        non_empty(&self.invoked_function_arn)
    }

    fn function_name(&self) -> Option<Cow<'_, str>> {
        self.function_name.as_deref().and_then(non_empty)
    }
}

/// First non-empty string under any of `keys`
fn json_str<'a>(value: &'a JsonValue, keys: &[&str]) -> Option<Cow<'a, str>> {
    keys.iter()
        .find_map(|key| value.get(key).and_then(JsonValue::as_str))
        .and_then(non_empty)
}

/// A decoded invocation event, keyed in snake or camel case
impl InvocationContext for JsonValue {
    fn request_id(&self) -> Option<Cow<'_, str>> {
        json_str(self, &["aws_request_id", "awsRequestId", "request_id", "requestId"])
    }

    fn invoked_function_arn(&self) -> Option<Cow<'_, str>> {
        json_str(self, &["invoked_function_arn", "invokedFunctionArn"])
    }

    fn function_name(&self) -> Option<Cow<'_, str>> {
        json_str(self, &["function_name", "functionName"])
    }
}

pub struct InvocationContextEnricher<'a> {
    context: &'a dyn InvocationContext,
}

impl<'a> InvocationContextEnricher<'a> {
    pub fn new(context: &'a dyn InvocationContext) -> Self {
        Self { context }
    }
}

impl Enricher for InvocationContextEnricher<'_> {
    fn source_name(&self) -> &'static str {
        "Lambda context"
    }

    fn extract(&self) -> Result<EnrichmentBlock, LoggerError> {
        let request_id = self.context.request_id();
        let function_arn = self.context.invoked_function_arn();

        let missing = missing_capabilities([
            ("request_id", request_id.is_some()),
            ("invoked_function_arn", function_arn.is_some()),
        ]);
        let (Some(request_id), Some(function_arn)) = (request_id, function_arn) else {
            return Err(LoggerError::EnrichmentShape {
                subject: "Invocation context object".to_string(),
                interface: "InvocationContext",
                reason: format!("missing: {}", missing.join(", ")),
            });
        };

        let mut fields = Map::new();
        fields.insert("request_id".to_string(), json!(request_id));
        fields.insert("function_arn".to_string(), json!(function_arn));
        if let Some(function_name) = self.context.function_name() {
            fields.insert("function_name".to_string(), json!(function_name));
        }

        Ok(EnrichmentBlock::new(BLOCK_NAME, fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARN: &str = "arn:aws:lambda:eu-west-2:123456789012:function:test-function";

    #[test]
    fn test_struct_context() {
        let context = LambdaInvocation::new("abc-123", ARN);

        let block = InvocationContextEnricher::new(&context).extract().unwrap();

        assert_eq!(block.name(), "lambda_context");
        assert_eq!(block.fields()["request_id"], "abc-123");
        assert_eq!(block.fields()["function_arn"], ARN);
        assert!(!block.fields().contains_key("function_name"));
    }

    #[test]
    fn test_camel_case_json_context() {
        let context = json!({
            "awsRequestId": "req-1",
            "invokedFunctionArn": ARN,
            "functionName": "test-function"
        });

        let block = InvocationContextEnricher::new(&context).extract().unwrap();

        assert_eq!(block.fields()["request_id"], "req-1");
        assert_eq!(block.fields()["function_name"], "test-function");
    }

    #[test]
    fn test_incomplete_context_is_rejected() {
        let context = json!({"aws_request_id": "", "unrelated": true});

        let err = InvocationContextEnricher::new(&context).extract().unwrap_err();

        assert_eq!(
            err.to_string(),
            "Invocation context object doesn't conform to InvocationContext. Context not set. \
             (missing: request_id, invoked_function_arn)"
        );
    }
}
