//! OpenAI adapter implementation.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, CreateChatCompletionRequest,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::{
    error::LLMError,
    traits::{LLMAdapter, LLMMessage, LLMResponse, Role, TokenUsage},
};

/// OpenAI adapter for GPT models.
pub struct OpenAiAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAiAdapter {
    /// Create a new OpenAI adapter.
    ///
    /// # Arguments
    ///
    /// * `api_key` - OpenAI API key
    /// * `model` - Model to use (e.g., "gpt-4o-mini")
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    /// Set the temperature for generation.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the maximum tokens for generation.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Convert our message format to OpenAI's format.
    fn convert_messages(messages: &[LLMMessage]) -> Vec<ChatCompletionRequestMessage> {
        messages
            .iter()
            .map(|msg| match msg.role {
                Role::System => {
                    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                        content: msg.content.clone().into(),
                        ..Default::default()
                    })
                }
                Role::User => {
                    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                        content: msg.content.clone().into(),
                        ..Default::default()
                    })
                }
                Role::Assistant => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessage {
                        content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                            msg.content.clone(),
                        )),
                        ..Default::default()
                    },
                ),
            })
            .collect()
    }

    /// Map provider errors onto our taxonomy so the retry policy can tell
    /// transient failures apart.
    fn map_error(e: async_openai::error::OpenAIError) -> LLMError {
        use async_openai::error::OpenAIError;

        match e {
            OpenAIError::Reqwest(inner) => LLMError::ConnectionError(inner.to_string()),
            OpenAIError::ApiError(api) => {
                let message = api.message.clone();
                match api.code.as_deref() {
                    Some("rate_limit_exceeded") => LLMError::RateLimitError(message),
                    Some("invalid_api_key") => LLMError::AuthenticationError(message),
                    _ => LLMError::ApiError(message),
                }
            }
            OpenAIError::InvalidArgument(msg) => LLMError::ConfigError(msg),
            other => LLMError::ApiError(other.to_string()),
        }
    }
}

#[async_trait]
impl LLMAdapter for OpenAiAdapter {
    fn provider(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, messages), fields(provider = "openai", model = %self.model))]
    async fn generate(&self, messages: &[LLMMessage]) -> Result<LLMResponse, LLMError> {
        debug!("Generating completion with {} messages", messages.len());

        let request = CreateChatCompletionRequest {
            model: self.model.clone(),
            messages: Self::convert_messages(messages),
            temperature: Some(self.temperature),
            max_completion_tokens: self.max_tokens,
            ..Default::default()
        };

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(Self::map_error)?;

        let choice = response.choices.first().ok_or(LLMError::EmptyResponse)?;
        let content = choice.message.content.clone().unwrap_or_default();
        if content.is_empty() {
            return Err(LLMError::EmptyResponse);
        }

        let usage = response.usage.as_ref();

        Ok(LLMResponse {
            content,
            tokens_used: TokenUsage {
                prompt: usage.map_or(0, |u| u.prompt_tokens),
                completion: usage.map_or(0, |u| u.completion_tokens),
                total: usage.map_or(0, |u| u.total_tokens),
            },
            model: response.model,
        })
    }

    async fn health_check(&self) -> Result<bool, LLMError> {
        self.client
            .models()
            .list()
            .await
            .map(|_| true)
            .map_err(Self::map_error)
    }
}
