//! Browse documentation tool
//!
//! The lookup itself is pluggable through [`DocumentationSource`]; the
//! default source returns a fixed best-practice summary.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::tool_params;
use crate::tools::{BoxFuture, Tool, ToolArguments, ToolExecutionContext, ToolOutput};

/// Something that can answer a documentation query
#[async_trait]
pub trait DocumentationSource: Send + Sync {
    async fn research(&self, query: &str) -> Result<String, ToolError>;
}

/// Offline source returning a canned research summary
#[derive(Debug, Default, Clone)]
pub struct CannedDocumentation;

#[async_trait]
impl DocumentationSource for CannedDocumentation {
    async fn research(&self, query: &str) -> Result<String, ToolError> {
        Ok(format!(
            "Research results for \"{}\": Found best practices including security headers, \
             rate limiting, and standard error response structures. Use Bearer token auth.",
            query
        ))
    }
}

/// Read-only research tool. Never touches session state.
pub struct BrowseDocumentation {
    source: Arc<dyn DocumentationSource>,
}

impl BrowseDocumentation {
    pub const NAME: &'static str = "browse_documentation";

    pub fn new(source: Arc<dyn DocumentationSource>) -> Self {
        Self { source }
    }
}

impl Default for BrowseDocumentation {
    fn default() -> Self {
        Self::new(Arc::new(CannedDocumentation))
    }
}

impl Tool for BrowseDocumentation {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Search or browse technical documentation to find best practices for a specific technology."
    }

    fn parameters_schema(&self) -> Value {
        tool_params!(query: "string" => "The technology or API to research")
    }

    fn execute(
        &self,
        args: ToolArguments,
        _ctx: ToolExecutionContext,
    ) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let query = args.text("query");
            let summary = self.source.research(&query).await?;
            Ok(ToolOutput::success(json!({ "content": summary })))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::DraftSlot;

    struct FailingSource;

    #[async_trait]
    impl DocumentationSource for FailingSource {
        async fn research(&self, _query: &str) -> Result<String, ToolError> {
            Err(ToolError::ExecutionFailed("index offline".into()))
        }
    }

    fn ctx() -> ToolExecutionContext {
        ToolExecutionContext::new("call_1", BrowseDocumentation::NAME, DraftSlot::default())
    }

    #[tokio::test]
    async fn test_canned_summary_mentions_query() {
        let args = ToolArguments::parse(r#"{"query": "Stripe webhooks"}"#).unwrap();
        let output = BrowseDocumentation::default().execute(args, ctx()).await.unwrap();

        let text = output.content["content"].as_str().unwrap();
        assert!(text.starts_with("Research results for \"Stripe webhooks\""));
    }

    #[tokio::test]
    async fn test_does_not_touch_draft() {
        let context = ctx();
        let slot = context.draft.clone();
        BrowseDocumentation::default()
            .execute(ToolArguments::new(), context)
            .await
            .unwrap();
        assert!(slot.take_proposal().is_none());
    }

    #[tokio::test]
    async fn test_source_errors_propagate() {
        let tool = BrowseDocumentation::new(Arc::new(FailingSource));
        let err = tool.execute(ToolArguments::new(), ctx()).await.unwrap_err();
        assert_eq!(err, ToolError::ExecutionFailed("index offline".into()));
    }
}
