//! Question and session storage backed by a shared key-value store
//!
//! Key layout: a set named `quiz-questions` holds serialized questions; each
//! user gets two scalar keys, `users_questions_<user_id>` for the single
//! current-question slot and `users_ratings_<user_id>` for the cumulative
//! score (absent = 0).

use crate::error::{QuizError, Result};
use crate::models::QuizQuestion;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Name of the set holding all quiz questions
pub const QUESTIONS_COLLECTION: &str = "quiz-questions";

const USER_QUESTION_PREFIX: &str = "users_questions";
const USER_RATING_PREFIX: &str = "users_ratings";

fn question_key(user_id: &str) -> String {
    format!("{USER_QUESTION_PREFIX}_{user_id}")
}

fn rating_key(user_id: &str) -> String {
    format!("{USER_RATING_PREFIX}_{user_id}")
}

/// Durable append/draw-only collection of quiz questions.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Append a single question. Duplicates are permitted.
    async fn add(&self, question: &QuizQuestion) -> Result<()>;

    /// Append a batch of questions in one store call; returns how many were
    /// actually added.
    async fn add_batch(&self, questions: &[QuizQuestion]) -> Result<usize>;

    /// Draw one question uniformly at random.
    ///
    /// Fails with [`QuizError::StoreEmptyOrCorrupt`] when the collection is
    /// empty or the drawn record does not deserialize into a valid question.
    async fn draw_random(&self) -> Result<QuizQuestion>;
}

/// Per-user single-slot current question and cumulative score.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn current_question(&self, user_id: &str) -> Result<Option<QuizQuestion>>;

    /// Overwrites any previously stored question for the user.
    async fn set_current_question(&self, user_id: &str, question: &QuizQuestion) -> Result<()>;

    async fn clear_current_question(&self, user_id: &str) -> Result<()>;

    /// Returns 0 when the user has never scored.
    async fn score(&self, user_id: &str) -> Result<u64>;

    /// Returns the new score.
    async fn increment_score(&self, user_id: &str, delta: u64) -> Result<u64>;
}

/// Redis-backed storage shared by all components.
///
/// Holds a single multiplexed connection; clones are cheap and reuse it, so
/// one handle created at startup is injected everywhere (no process-wide
/// static).
#[derive(Clone)]
pub struct RedisStorage {
    conn: ConnectionManager,
}

impl RedisStorage {
    /// Connect to the store at the given URL, e.g. `redis://localhost:6379`.
    pub async fn connect(url: &str) -> Result<Self> {
        debug!(url, "connecting to the key-value store");
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl QuestionStore for RedisStorage {
    async fn add(&self, question: &QuizQuestion) -> Result<()> {
        self.add_batch(std::slice::from_ref(question)).await?;
        Ok(())
    }

    async fn add_batch(&self, questions: &[QuizQuestion]) -> Result<usize> {
        if questions.is_empty() {
            return Ok(0);
        }
        let records = questions
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut conn = self.conn.clone();
        let added: usize = conn.sadd(QUESTIONS_COLLECTION, records).await?;
        Ok(added)
    }

    async fn draw_random(&self) -> Result<QuizQuestion> {
        let mut conn = self.conn.clone();
        let record: Option<String> = conn.srandmember(QUESTIONS_COLLECTION).await?;

        let record = record.ok_or_else(|| {
            QuizError::StoreEmptyOrCorrupt("the question set is empty".to_string())
        })?;

        serde_json::from_str(&record).map_err(|err| {
            QuizError::StoreEmptyOrCorrupt(format!("stored record is not a valid question: {err}"))
        })
    }
}

#[async_trait]
impl SessionStore for RedisStorage {
    async fn current_question(&self, user_id: &str) -> Result<Option<QuizQuestion>> {
        let mut conn = self.conn.clone();
        let record: Option<String> = conn.get(question_key(user_id)).await?;

        match record {
            Some(record) => Ok(Some(serde_json::from_str(&record)?)),
            None => Ok(None),
        }
    }

    async fn set_current_question(&self, user_id: &str, question: &QuizQuestion) -> Result<()> {
        let record = serde_json::to_string(question)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(question_key(user_id), record).await?;
        Ok(())
    }

    async fn clear_current_question(&self, user_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: usize = conn.del(question_key(user_id)).await?;
        Ok(())
    }

    async fn score(&self, user_id: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let score: Option<u64> = conn.get(rating_key(user_id)).await?;
        Ok(score.unwrap_or(0))
    }

    async fn increment_score(&self, user_id: &str, delta: u64) -> Result<u64> {
        let mut conn = self.conn.clone();
        let score: u64 = conn.incr(rating_key(user_id), delta).await?;
        Ok(score)
    }
}

/// In-memory storage with the same contracts.
///
/// Used as a test double for the engine and ingestion; duplicates are kept
/// (no set semantics), which the contracts permit.
#[derive(Default)]
pub struct MemoryStorage {
    questions: Mutex<Vec<QuizQuestion>>,
    current: Mutex<HashMap<String, QuizQuestion>>,
    scores: Mutex<HashMap<String, u64>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
        mutex
            .lock()
            .map_err(|e| QuizError::Other(format!("lock error: {e}")))
    }
}

#[async_trait]
impl QuestionStore for MemoryStorage {
    async fn add(&self, question: &QuizQuestion) -> Result<()> {
        Self::lock(&self.questions)?.push(question.clone());
        Ok(())
    }

    async fn add_batch(&self, questions: &[QuizQuestion]) -> Result<usize> {
        let mut stored = Self::lock(&self.questions)?;
        stored.extend_from_slice(questions);
        Ok(questions.len())
    }

    async fn draw_random(&self) -> Result<QuizQuestion> {
        let questions = Self::lock(&self.questions)?;
        questions
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| QuizError::StoreEmptyOrCorrupt("the question set is empty".to_string()))
    }
}

#[async_trait]
impl SessionStore for MemoryStorage {
    async fn current_question(&self, user_id: &str) -> Result<Option<QuizQuestion>> {
        Ok(Self::lock(&self.current)?.get(user_id).cloned())
    }

    async fn set_current_question(&self, user_id: &str, question: &QuizQuestion) -> Result<()> {
        Self::lock(&self.current)?.insert(user_id.to_string(), question.clone());
        Ok(())
    }

    async fn clear_current_question(&self, user_id: &str) -> Result<()> {
        Self::lock(&self.current)?.remove(user_id);
        Ok(())
    }

    async fn score(&self, user_id: &str) -> Result<u64> {
        Ok(Self::lock(&self.scores)?.get(user_id).copied().unwrap_or(0))
    }

    async fn increment_score(&self, user_id: &str, delta: u64) -> Result<u64> {
        let mut scores = Self::lock(&self.scores)?;
        let score = scores.entry(user_id.to_string()).or_insert(0);
        *score += delta;
        Ok(*score)
    }
}
