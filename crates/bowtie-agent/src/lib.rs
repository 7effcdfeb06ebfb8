pub mod engine;
mod prompt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use bowtie_core::session::Session;

pub use engine::LlmBackend;
pub use prompt::system_prompt;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("build LLM: {0}")]
    Build(String),
    #[error("chat: {0}")]
    Transport(String),
    #[error("model returned an empty reply")]
    EmptyReply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Text chunks of one reply, in arrival order.
pub type ChunkStream = BoxStream<'static, Result<String, AgentError>>;

/// Anything that can answer a conversation with a stream of text.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn stream_reply(&self, system: &str, history: &[ChatTurn]) -> Result<ChunkStream, AgentError>;
}

/// Outcome of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub reply: String,
    /// The reply carried a record that replaced the session's.
    pub record_updated: bool,
}

/// Ordered chat history for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<ChatTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Send `prompt`, stream the reply through `on_chunk`, and hand the full
    /// reply to the session's transcript parser.
    ///
    /// On failure the user turn is dropped so the history stays a sequence
    /// of answered prompts. There is no retry.
    pub async fn send<B, F>(
        &mut self,
        backend: &B,
        prompt: &str,
        session: &mut Session,
        mut on_chunk: F,
    ) -> Result<Exchange, AgentError>
    where
        B: ChatBackend + ?Sized,
        F: FnMut(&str),
    {
        self.turns.push(ChatTurn {
            role: ChatRole::User,
            content: prompt.to_string(),
        });

        let reply = match self.collect_reply(backend, &mut on_chunk).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "chat exchange failed");
                self.turns.pop();
                return Err(e);
            }
        };

        self.turns.push(ChatTurn {
            role: ChatRole::Assistant,
            content: reply.clone(),
        });
        let record_updated = session.apply_transcript(&reply);
        tracing::info!(chars = reply.len(), record_updated, "assistant replied");

        Ok(Exchange {
            reply,
            record_updated,
        })
    }

    async fn collect_reply<B, F>(&self, backend: &B, on_chunk: &mut F) -> Result<String, AgentError>
    where
        B: ChatBackend + ?Sized,
        F: FnMut(&str),
    {
        let system = system_prompt();
        let mut stream = backend.stream_reply(&system, &self.turns).await?;
        let mut reply = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            on_chunk(&chunk);
            reply.push_str(&chunk);
        }
        if reply.trim().is_empty() {
            return Err(AgentError::EmptyReply);
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Replays canned chunk lists, one per call, and records what it was sent.
    struct Scripted {
        replies: Mutex<Vec<Vec<Result<String, AgentError>>>>,
        seen: Mutex<Vec<(String, Vec<ChatTurn>)>>,
    }

    impl Scripted {
        fn new(replies: Vec<Vec<Result<String, AgentError>>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for Scripted {
        async fn stream_reply(&self, system: &str, history: &[ChatTurn]) -> Result<ChunkStream, AgentError> {
            self.seen.lock().unwrap().push((system.to_string(), history.to_vec()));
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(AgentError::Transport("connection refused".into()));
            }
            Ok(stream::iter(replies.remove(0)).boxed())
        }
    }

    fn ok(chunks: &[&str]) -> Vec<Result<String, AgentError>> {
        chunks.iter().map(|c| Ok(c.to_string())).collect()
    }

    #[tokio::test]
    async fn streams_chunks_and_records_turns() {
        let backend = Scripted::new(vec![ok(&["What is ", "the hazard?"])]);
        let mut convo = Conversation::new();
        let mut session = Session::new();
        let mut chunks = Vec::new();

        let exchange = convo
            .send(&backend, "We run a gas plant.", &mut session, |c| chunks.push(c.to_string()))
            .await
            .unwrap();

        assert_eq!(chunks, vec!["What is ", "the hazard?"]);
        assert_eq!(exchange.reply, "What is the hazard?");
        assert!(!exchange.record_updated);
        assert!(session.record.is_none());
        assert_eq!(
            convo.turns().iter().map(|t| t.role).collect::<Vec<_>>(),
            vec![ChatRole::User, ChatRole::Assistant]
        );

        let seen = backend.seen.lock().unwrap();
        assert!(seen[0].0.contains("bowtie_data ="));
        assert_eq!(seen[0].1.len(), 1);
    }

    #[tokio::test]
    async fn reply_with_record_updates_session() {
        let backend = Scripted::new(vec![ok(&[
            "Ready.\n```\nbowtie_data = {'hazard': 'Flammable gas', ",
            "'top_events': [{'top_event': 'Gas leak'}]}\n```",
        ])]);
        let mut convo = Conversation::new();
        let mut session = Session::new();

        let exchange = convo.send(&backend, "done", &mut session, |_| {}).await.unwrap();
        assert!(exchange.record_updated);
        let record = session.record.unwrap();
        assert_eq!(record.hazard, "Flammable gas");
        assert_eq!(record.top_events[0].top_event, "Gas leak");
        assert!(record.top_events[0].threats.is_empty());
    }

    #[tokio::test]
    async fn history_is_sent_in_order() {
        let backend = Scripted::new(vec![ok(&["First?"]), ok(&["Second?"])]);
        let mut convo = Conversation::new();
        let mut session = Session::new();
        convo.send(&backend, "one", &mut session, |_| {}).await.unwrap();
        convo.send(&backend, "two", &mut session, |_| {}).await.unwrap();

        let seen = backend.seen.lock().unwrap();
        let contents: Vec<&str> = seen[1].1.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "First?", "two"]);
    }

    #[tokio::test]
    async fn transport_failure_drops_the_prompt() {
        let backend = Scripted::new(vec![]);
        let mut convo = Conversation::new();
        let mut session = Session::new();

        let err = convo.send(&backend, "hello", &mut session, |_| {}).await.unwrap_err();
        assert!(matches!(err, AgentError::Transport(_)));
        assert!(convo.turns().is_empty());
    }

    #[tokio::test]
    async fn failure_mid_stream_drops_the_prompt() {
        let backend = Scripted::new(vec![vec![
            Ok("partial".to_string()),
            Err(AgentError::Transport("reset by peer".into())),
        ]]);
        let mut convo = Conversation::new();
        let mut session = Session::new();

        let err = convo.send(&backend, "hello", &mut session, |_| {}).await.unwrap_err();
        assert_eq!(err.to_string(), "chat: reset by peer");
        assert!(convo.turns().is_empty());
    }

    #[tokio::test]
    async fn blank_reply_is_an_error() {
        let backend = Scripted::new(vec![ok(&["  ", "\n"])]);
        let mut convo = Conversation::new();
        let mut session = Session::new();
        let err = convo.send(&backend, "hello", &mut session, |_| {}).await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyReply));
        assert!(convo.turns().is_empty());
    }
}
