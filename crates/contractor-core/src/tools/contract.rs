//! Propose contract tool

use serde_json::{json, Value};
use tracing::debug;

use crate::error::ToolError;
use crate::session::ContractDraft;
use crate::tool_params;
use crate::tools::{BoxFuture, Tool, ToolArguments, ToolExecutionContext, ToolOutput};

/// Pushes a full contract draft to the user's editor
#[derive(Debug, Default)]
pub struct ProposeContract;

impl ProposeContract {
    pub const NAME: &'static str = "propose_contract";

    pub fn new() -> Self {
        Self
    }
}

impl Tool for ProposeContract {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Propose a structured Prompt Contract based on the conversation so far."
    }

    fn parameters_schema(&self) -> Value {
        tool_params!(
            goal: "string" => "The primary objective of the prompt",
            constraints: "string" => "Technical and stylistic constraints",
            format: "string" => "The exact output format required",
            failure_conditions: "string" => "Instructions for when the goal cannot be met",
        )
    }

    fn execute(
        &self,
        args: ToolArguments,
        ctx: ToolExecutionContext,
    ) -> BoxFuture<'_, Result<ToolOutput, ToolError>> {
        Box::pin(async move {
            let draft = ContractDraft {
                goal: args.text("goal"),
                constraints: args.text("constraints"),
                format: args.text("format"),
                failure_conditions: args.text("failure_conditions"),
            };

            debug!(call_id = %ctx.call_id, "Staging proposed contract draft");
            ctx.draft.propose(draft);

            Ok(ToolOutput::success(json!({
                "status": "success",
                "message": "Contract draft proposed to user."
            })))
        })
    }
}
