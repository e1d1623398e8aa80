//! A scripted backend that replays canned assistant messages.

use std::collections::VecDeque;
use std::sync::Mutex;

use protocol::{AssistantReply, ModelMessage, ToolDefinition};

use super::{Backend, ModelError};

/// Replays a fixed queue of assistant replies, one per completion call.
///
/// Useful for tests and offline demos; the incoming history and tools are
/// ignored.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<AssistantReply>>,
}

impl ScriptedBackend {
    pub fn new(replies: impl IntoIterator<Item = AssistantReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }

    /// Whether every scripted reply has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.replies
            .lock()
            .map(|replies| replies.is_empty())
            .unwrap_or(true)
    }
}

impl Backend for ScriptedBackend {
    async fn complete(
        &self,
        _messages: &[ModelMessage],
        _tools: &[ToolDefinition],
    ) -> Result<AssistantReply, ModelError> {
        self.replies
            .lock()
            .map_err(|_| ModelError::InvalidResponse("scripted queue poisoned".to_string()))?
            .pop_front()
            .ok_or(ModelError::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_in_order_then_exhausts() {
        let backend = ScriptedBackend::new([
            AssistantReply::text("first"),
            AssistantReply::text("second"),
        ]);

        let first = backend.complete(&[], &[]).await.unwrap();
        assert_eq!(first.content.as_deref(), Some("first"));
        assert!(!backend.is_exhausted());

        let second = backend.complete(&[], &[]).await.unwrap();
        assert_eq!(second.content.as_deref(), Some("second"));
        assert!(backend.is_exhausted());

        assert!(matches!(
            backend.complete(&[], &[]).await,
            Err(ModelError::Exhausted)
        ));
    }
}
