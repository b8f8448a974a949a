//! Reasoning Provider Port
//!
//! Abstract interface for the language-model call. The core never looks
//! past the returned text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Identifies a conversation whose history the provider may keep
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationHandle(pub String);

impl ConversationHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// A fresh, single-use conversation
    pub fn ephemeral(prefix: &str) -> Self {
        Self(format!("{}-{}", prefix, uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Reasoning capability
///
/// # Example
///
/// ```rust,ignore
/// use kairo::ports::ReasoningProvider;
///
/// struct GeminiReasoner { /* ... */ }
///
/// #[async_trait]
/// impl ReasoningProvider for GeminiReasoner {
///     async fn infer(&self, prompt: &str, conversation: &ConversationHandle)
///         -> Result<String, DomainError> {
///         // Call the model API
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Run one inference turn and return the response text.
    ///
    /// Failures should be `DomainError::Transient` when a retry may help.
    async fn infer(
        &self,
        prompt: &str,
        conversation: &ConversationHandle,
    ) -> Result<String, DomainError>;

    /// Get the provider name (e.g., "gemini")
    fn provider_name(&self) -> &str;

    /// Get the model ID being used
    fn model_id(&self) -> &str;

    /// Drop any history kept for a conversation
    async fn forget(&self, _conversation: &ConversationHandle) {}
}
