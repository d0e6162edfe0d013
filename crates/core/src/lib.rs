//! # Tamalebot Core
//!
//! Domain types, traits, and error definitions for the Tamalebot agent
//! runtime. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem boundary is a trait here: the LLM provider, the tools, the
//! policy decision point consumers. Implementations live in their respective
//! crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod policy;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{AuditError, Error, ProviderError, Result, StorageError, ToolError, VaultError};
pub use message::{ChatMessage, ContentBlock, MessageContent, Role};
pub use policy::{PolicyAction, PolicyDecision};
pub use provider::{ChatProvider, LlmResponse, LlmToolCall, ToolSchema};
pub use tool::{Tool, ToolOutcome, TurnOutcome};
