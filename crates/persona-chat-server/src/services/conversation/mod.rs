//! Conversation state and the submission flow
//!
//! - Append-only turn log with a hidden system turn
//! - Prompt flattening of prior turns
//! - Per-session state and the session registry
//! - Streaming of one submission into display updates

mod cache;
mod prompt;
mod session;
mod store;
pub mod streamer;

pub use cache::{SessionRegistry, SharedSession};
pub use prompt::assemble_prompt;
pub use session::Session;
pub use store::ConversationLog;
pub use streamer::{ResponseStreamer, SubmissionPhase, CURSOR_MARKER};
