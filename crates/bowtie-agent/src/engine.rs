use async_trait::async_trait;
use futures::StreamExt;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use bowtie_core::AiSettings;

use crate::{AgentError, ChatBackend, ChatRole, ChatTurn, ChunkStream};

pub fn map_backend(provider: &str) -> Result<LLMBackend, AgentError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(AgentError::UnknownProvider(other.to_string())),
    }
}

/// Chat backend talking to a hosted model through the `llm` crate.
#[derive(Debug, Clone)]
pub struct LlmBackend {
    settings: AiSettings,
}

impl LlmBackend {
    /// Fails early on a provider the `llm` crate does not know.
    pub fn new(settings: AiSettings) -> Result<Self, AgentError> {
        map_backend(&settings.provider)?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &AiSettings {
        &self.settings
    }
}

fn to_message(turn: &ChatTurn) -> ChatMessage {
    match turn.role {
        ChatRole::User => ChatMessage::user().content(&turn.content).build(),
        ChatRole::Assistant => ChatMessage::assistant().content(&turn.content).build(),
    }
}

#[async_trait]
impl ChatBackend for LlmBackend {
    async fn stream_reply(&self, system: &str, history: &[ChatTurn]) -> Result<ChunkStream, AgentError> {
        let backend = map_backend(&self.settings.provider)?;

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&self.settings.model)
            .system(system)
            .stream(true);

        if !self.settings.api_key.is_empty() {
            builder = builder.api_key(&self.settings.api_key);
        }

        let llm = builder.build().map_err(|e| AgentError::Build(e.to_string()))?;

        let messages: Vec<ChatMessage> = history.iter().map(to_message).collect();

        tracing::info!(
            provider = %self.settings.provider,
            model = %self.settings.model,
            turns = messages.len(),
            "sending conversation"
        );

        let stream = llm
            .chat_stream(&messages)
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;

        Ok(stream
            .map(|chunk| chunk.map_err(|e| AgentError::Transport(e.to_string())))
            .boxed())
    }
}
