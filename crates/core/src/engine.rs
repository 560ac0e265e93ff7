use crate::error::{QueryError, StoreError};
use crate::models::{
    ChatTurn, ContextChunk, MessageContent, MessageRole, NewMessage, SearchHit,
};
use crate::traits::{AnswerGenerator, ConversationStore, VectorIndex};
use tracing::warn;
use uuid::Uuid;

/// Returned when the index has nothing relevant to the question.
pub const NO_MATCH_SENTINEL: &str = "I couldn't find relevant information for your question.";
/// Returned when search or generation failed; the user still gets a paired
/// assistant reply.
pub const BACKEND_TROUBLE_SENTINEL: &str =
    "I'm having trouble accessing knowledge sources right now.";

pub const DEFAULT_TOP_K: usize = 2;
const MESSAGE_MAX_CHARS: usize = 500;
const TITLE_PREFIX_CHARS: usize = 40;

/// Retrieve-then-generate over one conversation turn. The user message is
/// persisted before any retrieval work so a question is never lost, and an
/// assistant message is always written afterwards, even if it only reports a
/// backend failure.
pub struct QueryEngine<V, G, C> {
    index: V,
    generator: G,
    conversations: C,
    top_k: usize,
}

impl<V, G, C> QueryEngine<V, G, C>
where
    V: VectorIndex + Send + Sync,
    G: AnswerGenerator + Send + Sync,
    C: ConversationStore + Send + Sync,
{
    pub fn new(index: V, generator: G, conversations: C) -> Self {
        Self {
            index,
            generator,
            conversations,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub async fn answer(
        &self,
        session_id: Option<Uuid>,
        owner_id: Uuid,
        content: &str,
    ) -> Result<ChatTurn, QueryError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(QueryError::Validation("message is empty".to_string()));
        }
        if trimmed.chars().count() > MESSAGE_MAX_CHARS {
            return Err(QueryError::Validation(format!(
                "message exceeds {MESSAGE_MAX_CHARS} characters"
            )));
        }

        // A session must exist before any retrieval work so the turn always
        // has an anchor.
        let session_id = match session_id {
            Some(id) => id,
            None => {
                self.conversations
                    .create_session(owner_id, &session_title(trimmed))
                    .await
                    .map_err(QueryError::Store)?
                    .id
            }
        };

        let user_message = self
            .conversations
            .insert_message(NewMessage {
                chat_session_id: session_id,
                role: MessageRole::User,
                content: MessageContent::text(trimmed),
                context_used: Vec::new(),
            })
            .await
            .map_err(QueryError::Store)?;

        // Upstream failures are caught here, at the narrowest scope, so the
        // already-persisted user message is never rolled back.
        let (assistant_content, context_used) = match self.retrieve_and_generate(trimmed).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(error = %error, "retrieval or generation failed, replying with fallback");
                (
                    MessageContent::text(BACKEND_TROUBLE_SENTINEL),
                    Vec::new(),
                )
            }
        };

        let assistant_message = self
            .conversations
            .insert_message(NewMessage {
                chat_session_id: session_id,
                role: MessageRole::Assistant,
                content: assistant_content,
                context_used,
            })
            .await
            .map_err(QueryError::Store)?;

        // Two messages were added this turn: the user's and the assistant's.
        self.conversations
            .increment_message_count(session_id, 2)
            .await
            .map_err(QueryError::Store)?;

        Ok(ChatTurn {
            session_id,
            user_message,
            assistant_message,
        })
    }

    async fn retrieve_and_generate(
        &self,
        question: &str,
    ) -> Result<(MessageContent, Vec<ContextChunk>), StoreError> {
        let hits = self.index.search_records(question, self.top_k).await?;

        if hits.is_empty() {
            return Ok((MessageContent::text(NO_MATCH_SENTINEL), Vec::new()));
        }

        let generated = self
            .generator
            .generate(question, &build_context_block(&hits))
            .await?;

        let context_used = hits
            .iter()
            .map(|hit| ContextChunk {
                chunk_id: hit.id.clone(),
                score: hit.score,
                page_number: hit.page_number,
            })
            .collect();

        Ok((
            MessageContent::Structured {
                answer: generated.answer,
                suggestions: generated.suggestions,
            },
            context_used,
        ))
    }
}

/// Numbered "Source N" blocks in the order the index returned them, which is
/// descending relevance.
fn build_context_block(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(index, hit)| format!("Source {}:\n{}", index + 1, hit.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn session_title(content: &str) -> String {
    let mut title: String = content.chars().take(TITLE_PREFIX_CHARS).collect();
    if content.chars().count() > TITLE_PREFIX_CHARS {
        title.push_str("...");
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, ChatSession, ChunkRecord, GeneratedAnswer};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct FakeIndex {
        hits: Vec<SearchHit>,
        fail: bool,
    }

    #[async_trait]
    impl VectorIndex for FakeIndex {
        async fn upsert_records(&self, _batch: &[ChunkRecord]) -> Result<(), StoreError> {
            Ok(())
        }

        async fn search_records(
            &self,
            _query: &str,
            top_k: usize,
        ) -> Result<Vec<SearchHit>, StoreError> {
            if self.fail {
                return Err(StoreError::Request("index unavailable".to_string()));
            }
            Ok(self.hits.iter().take(top_k).cloned().collect())
        }

        async fn delete_by_document(&self, _document_id: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[derive(Default, Clone)]
    struct FakeGenerator {
        fail: bool,
        prompts: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl AnswerGenerator for FakeGenerator {
        async fn generate(
            &self,
            question: &str,
            context: &str,
        ) -> Result<GeneratedAnswer, StoreError> {
            if self.fail {
                return Err(StoreError::Request("model unavailable".to_string()));
            }
            self.prompts
                .lock()
                .unwrap()
                .push((question.to_string(), context.to_string()));
            Ok(GeneratedAnswer {
                answer: "Visiting hours are 9am to 5pm.".to_string(),
                suggestions: vec!["Where do I park?".to_string()],
            })
        }
    }

    #[derive(Default, Clone)]
    struct FakeConversations {
        sessions: Arc<Mutex<Vec<ChatSession>>>,
        messages: Arc<Mutex<Vec<ChatMessage>>>,
        increments: Arc<Mutex<Vec<(Uuid, i64)>>>,
    }

    #[async_trait]
    impl ConversationStore for FakeConversations {
        async fn create_session(
            &self,
            owner_id: Uuid,
            title: &str,
        ) -> Result<ChatSession, StoreError> {
            let session = ChatSession {
                id: Uuid::new_v4(),
                owner_id,
                title: title.to_string(),
                message_count: 0,
                is_closed: false,
                created_at: Utc::now(),
            };
            self.sessions.lock().unwrap().push(session.clone());
            Ok(session)
        }

        async fn insert_message(&self, message: NewMessage) -> Result<ChatMessage, StoreError> {
            let stored = ChatMessage {
                id: Uuid::new_v4(),
                chat_session_id: message.chat_session_id,
                role: message.role,
                content: message.content,
                context_used: message.context_used,
                user_feedback: None,
                feedback_text: None,
                created_at: Utc::now(),
            };
            self.messages.lock().unwrap().push(stored.clone());
            Ok(stored)
        }

        async fn increment_message_count(
            &self,
            session_id: Uuid,
            by: i64,
        ) -> Result<(), StoreError> {
            self.increments.lock().unwrap().push((session_id, by));
            Ok(())
        }

        async fn record_feedback(
            &self,
            _message_id: Uuid,
            _score: i16,
            _text: Option<&str>,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn hit(id: &str, score: f64, text: &str, page: Option<u32>) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            document_id: "doc-1".to_string(),
            score,
            text: text.to_string(),
            page_number: page,
        }
    }

    fn engine(
        index: &FakeIndex,
        generator: &FakeGenerator,
        conversations: &FakeConversations,
    ) -> QueryEngine<FakeIndex, FakeGenerator, FakeConversations> {
        QueryEngine::new(index.clone(), generator.clone(), conversations.clone())
    }

    #[tokio::test]
    async fn empty_question_is_rejected_before_anything_is_stored() {
        let (index, generator, conversations) = (
            FakeIndex::default(),
            FakeGenerator::default(),
            FakeConversations::default(),
        );
        let engine = engine(&index, &generator, &conversations);

        let result = engine.answer(None, Uuid::new_v4(), "   ").await;

        assert!(matches!(result, Err(QueryError::Validation(_))));
        assert!(conversations.sessions.lock().unwrap().is_empty());
        assert!(conversations.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlong_question_is_rejected_not_truncated() {
        let (index, generator, conversations) = (
            FakeIndex::default(),
            FakeGenerator::default(),
            FakeConversations::default(),
        );
        let engine = engine(&index, &generator, &conversations);
        let long: String = std::iter::repeat('q').take(501).collect();

        let result = engine.answer(None, Uuid::new_v4(), &long).await;

        assert!(matches!(result, Err(QueryError::Validation(_))));
        assert!(conversations.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_hits_answer_with_the_no_match_sentinel() {
        let (index, generator, conversations) = (
            FakeIndex::default(),
            FakeGenerator::default(),
            FakeConversations::default(),
        );
        let engine = engine(&index, &generator, &conversations);

        let turn = engine
            .answer(None, Uuid::new_v4(), "What are visiting hours?")
            .await
            .expect("turn should complete");

        assert_eq!(
            turn.assistant_message.content,
            MessageContent::text(NO_MATCH_SENTINEL)
        );
        assert!(turn.assistant_message.context_used.is_empty());
        // no generation happened
        assert!(generator.prompts.lock().unwrap().is_empty());
        // both messages persisted, count bumped by two
        assert_eq!(conversations.messages.lock().unwrap().len(), 2);
        assert_eq!(
            conversations.increments.lock().unwrap().clone(),
            vec![(turn.session_id, 2)]
        );
    }

    #[tokio::test]
    async fn hits_are_assembled_into_numbered_sources_for_the_generator() {
        let index = FakeIndex {
            hits: vec![
                hit("doc-1-chunk-0", 0.9, "Visiting hours are 9am to 5pm.", Some(2)),
                hit("doc-1-chunk-3", 0.5, "The ward closes at 8pm.", None),
            ],
            fail: false,
        };
        let generator = FakeGenerator::default();
        let conversations = FakeConversations::default();
        let engine = engine(&index, &generator, &conversations);

        let turn = engine
            .answer(None, Uuid::new_v4(), "What are visiting hours?")
            .await
            .expect("turn should complete");

        let prompts = generator.prompts.lock().unwrap();
        let (question, context) = &prompts[0];
        assert_eq!(question, "What are visiting hours?");
        assert_eq!(
            context,
            "Source 1:\nVisiting hours are 9am to 5pm.\n\nSource 2:\nThe ward closes at 8pm."
        );

        match &turn.assistant_message.content {
            MessageContent::Structured {
                answer,
                suggestions,
            } => {
                assert_eq!(answer, "Visiting hours are 9am to 5pm.");
                assert_eq!(suggestions, &vec!["Where do I park?".to_string()]);
            }
            other => panic!("expected structured assistant content, got {other:?}"),
        }

        let context_used = &turn.assistant_message.context_used;
        assert_eq!(context_used.len(), 2);
        assert_eq!(context_used[0].chunk_id, "doc-1-chunk-0");
        assert_eq!(context_used[0].page_number, Some(2));
        assert_eq!(context_used[1].page_number, None);
    }

    #[tokio::test]
    async fn index_failure_still_persists_a_paired_assistant_reply() {
        let index = FakeIndex {
            hits: Vec::new(),
            fail: true,
        };
        let generator = FakeGenerator::default();
        let conversations = FakeConversations::default();
        let engine = engine(&index, &generator, &conversations);

        let turn = engine
            .answer(None, Uuid::new_v4(), "What are visiting hours?")
            .await
            .expect("the turn must not fail on upstream errors");

        assert_eq!(
            turn.assistant_message.content,
            MessageContent::text(BACKEND_TROUBLE_SENTINEL)
        );
        assert!(turn.assistant_message.context_used.is_empty());

        let messages = conversations.messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert!(messages[0].created_at <= messages[1].created_at);
    }

    #[tokio::test]
    async fn generator_failure_keeps_the_user_message_and_falls_back() {
        let index = FakeIndex {
            hits: vec![hit("doc-1-chunk-0", 0.9, "some context", Some(1))],
            fail: false,
        };
        let generator = FakeGenerator {
            fail: true,
            ..FakeGenerator::default()
        };
        let conversations = FakeConversations::default();
        let engine = engine(&index, &generator, &conversations);

        let turn = engine
            .answer(None, Uuid::new_v4(), "What are visiting hours?")
            .await
            .expect("the turn must not fail on upstream errors");

        assert_eq!(
            turn.assistant_message.content,
            MessageContent::text(BACKEND_TROUBLE_SENTINEL)
        );
        assert_eq!(
            turn.user_message.content,
            MessageContent::text("What are visiting hours?")
        );
        assert_eq!(conversations.messages.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_session_is_created_with_a_title_prefix() {
        let (index, generator, conversations) = (
            FakeIndex::default(),
            FakeGenerator::default(),
            FakeConversations::default(),
        );
        let engine = engine(&index, &generator, &conversations);
        let question = "Could you tell me everything about the cardiology department's schedule?";

        let turn = engine
            .answer(None, Uuid::new_v4(), question)
            .await
            .expect("turn should complete");

        let sessions = conversations.sessions.lock().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, turn.session_id);
        assert_eq!(
            sessions[0].title,
            "Could you tell me everything about the c..."
        );
    }

    #[tokio::test]
    async fn existing_session_is_reused_without_creating_another() {
        let (index, generator, conversations) = (
            FakeIndex::default(),
            FakeGenerator::default(),
            FakeConversations::default(),
        );
        let engine = engine(&index, &generator, &conversations);
        let session_id = Uuid::new_v4();

        let turn = engine
            .answer(Some(session_id), Uuid::new_v4(), "And on weekends?")
            .await
            .expect("turn should complete");

        assert_eq!(turn.session_id, session_id);
        assert!(conversations.sessions.lock().unwrap().is_empty());
    }

    #[test]
    fn short_titles_are_not_given_an_ellipsis() {
        assert_eq!(session_title("Visiting hours?"), "Visiting hours?");
    }
}
