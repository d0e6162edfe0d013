//! The Tamalebot agent loop and its collaborators.
//!
//! One turn: user text in, assistant text out, zero or more mediated tool
//! calls in between. The loop owns the canonical history; conversation
//! stores and the per-chat serializer keep concurrent chats from trampling
//! it.

pub mod conversation;
pub mod loop_runner;
pub mod serializer;

pub use conversation::{ConversationStats, ConversationStore, InMemoryConversations, PersistentConversations};
pub use loop_runner::{AgentLoop, LoopHooks, NoopHooks};
pub use serializer::TurnSerializer;
