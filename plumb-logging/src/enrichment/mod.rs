//! Context enrichment
//!
//! Each provider pulls metadata out of one source (the container metadata
//! endpoint, the serverless environment, an invocation context or a web
//! request) and returns it as a single named block. The context store merges
//! a block whole or not at all.

pub mod container;
pub mod invocation;
pub mod lambda_env;
pub mod web_request;

pub use container::{ContainerMetadataEnricher, HttpMetadataClient, MetadataClient};
pub use invocation::{InvocationContext, InvocationContextEnricher, LambdaInvocation};
pub use lambda_env::{LambdaEnvironment, LambdaEnvironmentEnricher, SettingsCache};
pub use web_request::{HeaderLookup, WebRequest, WebRequestEnricher};

use crate::error::LoggerError;
use serde_json::{Map, Value as JsonValue};

/// Trait for context enrichment providers
pub trait Enricher {
    /// Source name used in the failure line, e.g. "web request"
    fn source_name(&self) -> &'static str;

    /// Pull this provider's block, or explain why it could not
    fn extract(&self) -> Result<EnrichmentBlock, LoggerError>;
}

/// Fields produced by one provider, nested under the provider's block name
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentBlock {
    name: &'static str,
    fields: Map<String, JsonValue>,
}

impl EnrichmentBlock {
    pub fn new(name: &'static str, fields: Map<String, JsonValue>) -> Self {
        Self { name, fields }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &Map<String, JsonValue> {
        &self.fields
    }

    pub fn into_parts(self) -> (&'static str, Map<String, JsonValue>) {
        (self.name, self.fields)
    }
}

/// Caller-supplied sources for [`Logger::refresh_context`](crate::Logger::refresh_context)
#[derive(Clone, Copy)]
pub enum ContextEnrichment<'a> {
    /// Serverless invocation context (request id, function ARN)
    Invocation(&'a dyn InvocationContext),
    /// Incoming HTTP request
    WebRequest(&'a dyn WebRequest),
}

impl<'a> ContextEnrichment<'a> {
    pub fn invocation(context: &'a dyn InvocationContext) -> Self {
        ContextEnrichment::Invocation(context)
    }

    pub fn web_request(request: &'a dyn WebRequest) -> Self {
        ContextEnrichment::WebRequest(request)
    }

    pub(crate) fn enricher(&self) -> Box<dyn Enricher + 'a> {
        match *self {
            ContextEnrichment::Invocation(context) => Box::new(InvocationContextEnricher::new(context)),
            ContextEnrichment::WebRequest(request) => Box::new(WebRequestEnricher::new(request)),
        }
    }
}

/// Collect the names of required accessors that came back empty
pub(crate) fn missing_capabilities<const N: usize>(checks: [(&'static str, bool); N]) -> Vec<&'static str> {
    checks
        .into_iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name)
        .collect()
}
