//! Assistant orchestration for Milesdesk.
//!
//! Ties the chat model, conversation memory, retrieval, qualification tools
//! and the input guardrail into a single [`Assistant::answer`] call.

mod assistant;
mod bootstrap;
mod guardrail;
mod memory;
mod prompts;
mod tools;

#[cfg(test)]
mod test_support;

pub use assistant::{Assistant, AssistantConfig, Reply};
pub use bootstrap::{KnowledgeBase, build_assistant, ingest_knowledge};
pub use guardrail::{GuardrailOutcome, InputGuardrail, LlmGuardrail};
pub use memory::{ChatMemoryStore, MessageWindow};
pub use prompts::{DEFAULT_SYSTEM_PROMPT, GUARDRAIL_PROMPT};
pub use tools::{
    COMPARE_QUALIFICATION, GET_FLYING_BLUE_QUALIFICATION, GET_MILES_AND_MORE_QUALIFICATION,
    QualificationTools, ToolBox, qualification_tool_specs,
};
