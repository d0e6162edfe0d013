//! The agent reasoning loop implementation.
//!
//! Drives the request → LLM → tool batch → LLM → … cycle. Tool calls
//! execute strictly sequentially — the canonical history invariant (every
//! tool_use answered by a tool_result in the next message) depends on it.

use std::sync::Arc;
use tamalebot_core::{
    ChatMessage, ChatProvider, ContentBlock, Error, LlmToolCall, ToolOutcome, TurnOutcome,
};
use tamalebot_tools::ToolExecutor;
use tracing::{debug, info, warn};

/// Observation points fired during a turn. All methods default to no-ops.
pub trait LoopHooks: Send + Sync {
    fn on_text(&self, _text: &str) {}
    fn on_tool_call(&self, _call: &LlmToolCall) {}
    fn on_tool_result(&self, _call_id: &str, _outcome: &ToolOutcome) {}
    fn on_usage(&self, _input_tokens: u64, _output_tokens: u64) {}
}

/// The default hook set: observes nothing.
pub struct NoopHooks;

impl LoopHooks for NoopHooks {}

/// The core agent loop.
pub struct AgentLoop {
    provider: Arc<dyn ChatProvider>,
    executor: Arc<ToolExecutor>,
    max_iterations: usize,
    hooks: Arc<dyn LoopHooks>,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn ChatProvider>, executor: Arc<ToolExecutor>) -> Self {
        Self {
            provider,
            executor,
            max_iterations: 20,
            hooks: Arc::new(NoopHooks),
        }
    }

    /// Set the maximum number of provider round-trips per turn.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Attach observation hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn LoopHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Run one turn: append the user message, exchange with the provider
    /// until it answers with text only (or the iteration bound is hit), and
    /// return the final text with turn statistics.
    ///
    /// Provider errors propagate. Tool errors and policy denials never
    /// abort the turn — they come back to the model as error-flagged
    /// results so it can adapt.
    pub async fn run_turn(
        &self,
        history: &mut Vec<ChatMessage>,
        user_text: &str,
    ) -> Result<TurnOutcome, Error> {
        info!(
            provider = self.provider.name(),
            messages = history.len(),
            "Starting turn"
        );

        history.push(ChatMessage::user(user_text));

        let schemas = self.executor.schemas();
        let mut tool_call_count = 0;
        let mut input_tokens: u64 = 0;
        let mut output_tokens: u64 = 0;
        let mut last_text = String::new();
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;
            debug!(iteration = iterations, "Agent loop iteration");

            let response = self.provider.send_message(history, &schemas).await?;
            input_tokens += response.input_tokens;
            output_tokens += response.output_tokens;
            self.hooks
                .on_usage(response.input_tokens, response.output_tokens);

            if !response.text.is_empty() {
                self.hooks.on_text(&response.text);
                last_text = response.text.clone();
            }

            if response.tool_calls.is_empty() {
                // Text-only response ends the turn.
                history.push(ChatMessage::assistant(response.text.clone()));
                return Ok(TurnOutcome {
                    text: response.text,
                    tool_call_count,
                    input_tokens,
                    output_tokens,
                    iterations,
                });
            }

            // Assistant message: optional text block, then tool-use blocks in
            // response order.
            let mut blocks = Vec::with_capacity(response.tool_calls.len() + 1);
            if !response.text.is_empty() {
                blocks.push(ContentBlock::text(&response.text));
            }
            for call in &response.tool_calls {
                blocks.push(ContentBlock::tool_use(
                    call.id.clone(),
                    call.name.clone(),
                    call.input.clone(),
                ));
            }
            history.push(ChatMessage::assistant_blocks(blocks));

            // Execute the batch sequentially and answer every call.
            let mut results = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                self.hooks.on_tool_call(call);
                let outcome = self.executor.execute(call).await;
                self.hooks.on_tool_result(&call.id, &outcome);
                tool_call_count += 1;
                results.push(ContentBlock::tool_result(
                    call.id.clone(),
                    outcome.output,
                    outcome.is_error,
                ));
            }
            history.push(ChatMessage::tool_results(results));
        }

        warn!(
            iterations,
            max = self.max_iterations,
            "Iteration bound reached without a text-only response"
        );
        Ok(TurnOutcome {
            text: last_text,
            tool_call_count,
            input_tokens,
            output_tokens,
            iterations,
        })
    }
}
