//! Backend trait for chat-completions providers.

use crate::error::ApiError;
use crate::message::{AssistantReply, ChatRequest};
use std::future::Future;
use std::pin::Pin;

/// Trait for chat-completions backends.
///
/// The backend is an opaque decision function: given a conversation and a
/// tool schema it returns either a direct answer, tool-call requests, or
/// both. Dyn-compatible so the orchestrator works with `Arc<dyn ChatBackend>`.
pub trait ChatBackend: Send + Sync {
    /// Send one (blocking, non-streaming) completion request.
    fn complete<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<AssistantReply, ApiError>> + Send + 'a>>;

    /// Backend name for logging/display (e.g., "openai").
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn backend_is_dyn_compatible() {
        fn _accept(_b: &dyn ChatBackend) {}
    }

    #[test]
    fn arc_backend_is_send_sync() {
        fn _assert_send_sync<T: Send + Sync>() {}
        _assert_send_sync::<Arc<dyn ChatBackend>>();
    }
}
