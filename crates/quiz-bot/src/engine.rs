//! Conversation engine shared by every transport adapter
//!
//! The state machine is implemented once as a function of
//! `(user_id, text, state)` over the injected stores; each adapter is a thin
//! translator from its native event shape to this function's input and
//! output. The engine holds no state of its own between invocations.

use crate::error::Result;
use crate::models::QuizQuestion;
use crate::storage::{QuestionStore, SessionStore};
use std::sync::Arc;
use tracing::error;

/// Menu button labels, shared verbatim between the keyboards and the command
/// matcher. Both transports render exactly these three.
pub mod labels {
    pub const NEW_QUESTION: &str = "Новый вопрос";
    pub const SURRENDER: &str = "Сдаться";
    pub const MY_SCORE: &str = "Мой счет";
}

/// User-facing reply texts.
pub mod texts {
    pub const GREETING: &str = "Привет! Я бот для викторин!";
    pub const CORRECT: &str =
        "Правильно! Поздравляю! Для следующего вопроса нажмите «Новый вопрос».";
    pub const WRONG: &str = "Неправильно... Попробуешь ещё раз?";
    pub const RETRY: &str = "Пожалуйста, попробуйте снова.";

    pub fn reveal_answer(answer: &str) -> String {
        format!(
            "Внимание, правильный ответ: {answer}\nДля следующего вопроса нажмите «Новый вопрос»."
        )
    }

    pub fn score(score: u64) -> String {
        format!("Ваш результат: {score}")
    }

    pub fn farewell(first_name: &str) -> String {
        format!("До свидания, {first_name}!")
    }
}

/// Per-user conversation state.
///
/// `Greeting` is the initial state; whether it is explicit depends on the
/// transport (VK enters it on first contact, Telegram enters via `/start`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Greeting,
    Menu,
    AwaitingAnswer,
}

/// Engine output: an optional reply and the next persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub reply: Option<String>,
    pub next: ChatState,
}

impl Step {
    fn reply(text: impl Into<String>, next: ChatState) -> Self {
        Self {
            reply: Some(text.into()),
            next,
        }
    }

    fn silent(next: ChatState) -> Self {
        Self { reply: None, next }
    }

    /// Generic recovery: tell the user to retry and return to the menu.
    fn retry() -> Self {
        Self::reply(texts::RETRY, ChatState::Menu)
    }
}

/// The quiz conversation state machine.
pub struct QuizEngine {
    questions: Arc<dyn QuestionStore>,
    sessions: Arc<dyn SessionStore>,
}

impl QuizEngine {
    pub fn new(questions: Arc<dyn QuestionStore>, sessions: Arc<dyn SessionStore>) -> Self {
        Self { questions, sessions }
    }

    /// Process one inbound message and decide the reply and next state.
    ///
    /// Never fails: store errors are logged with the causing user id and
    /// turned into the generic retry prompt with a transition back to the
    /// menu. No automatic retry is attempted.
    pub async fn handle_message(&self, user_id: &str, text: &str, state: ChatState) -> Step {
        match state {
            ChatState::Greeting => Step::reply(texts::GREETING, ChatState::Menu),
            ChatState::Menu => match text.trim() {
                labels::NEW_QUESTION => self.new_question(user_id).await,
                labels::MY_SCORE => self.my_score(user_id).await,
                // Menu handlers simply do not fire on anything else.
                _ => Step::silent(ChatState::Menu),
            },
            ChatState::AwaitingAnswer => {
                if text.trim() == labels::SURRENDER {
                    self.give_up(user_id).await
                } else {
                    self.check_answer(user_id, text).await
                }
            }
        }
    }

    async fn new_question(&self, user_id: &str) -> Step {
        let question = match self.questions.draw_random().await {
            Ok(question) => question,
            Err(err) => {
                error!(user_id, %err, "failed to draw a question");
                return Step::retry();
            }
        };

        if let Err(err) = self.sessions.set_current_question(user_id, &question).await {
            error!(user_id, %err, "failed to save the current question");
            return Step::retry();
        }

        Step::reply(question.question, ChatState::AwaitingAnswer)
    }

    async fn my_score(&self, user_id: &str) -> Step {
        match self.sessions.score(user_id).await {
            Ok(score) => Step::reply(texts::score(score), ChatState::Menu),
            Err(err) => {
                error!(user_id, %err, "failed to read the score");
                Step::retry()
            }
        }
    }

    async fn give_up(&self, user_id: &str) -> Step {
        let Some(question) = self.live_question(user_id).await else {
            return Step::retry();
        };

        if let Err(err) = self.sessions.clear_current_question(user_id).await {
            error!(user_id, %err, "failed to clear the current question");
            return Step::retry();
        }

        Step::reply(texts::reveal_answer(&question.answer), ChatState::Menu)
    }

    async fn check_answer(&self, user_id: &str, text: &str) -> Step {
        let Some(question) = self.live_question(user_id).await else {
            return Step::retry();
        };

        if !question.matches_answer(text) {
            return Step::reply(texts::WRONG, ChatState::AwaitingAnswer);
        }

        if let Err(err) = self.sessions.increment_score(user_id, 1).await {
            error!(user_id, %err, "failed to increment the score");
            return Step::retry();
        }
        // The point is counted at this moment. A failed clear leaves a stale
        // slot, but it is unreachable from Menu and the next draw overwrites
        // it, so the user still gets the success reply.
        if let Err(err) = self.sessions.clear_current_question(user_id).await {
            error!(user_id, %err, "failed to clear the answered question");
        }

        Step::reply(texts::CORRECT, ChatState::Menu)
    }

    /// Read the user's current question, treating both a store failure and an
    /// absent slot (externally cleared, or a stale read raced a clear) as the
    /// recoverable no-live-question case.
    async fn live_question(&self, user_id: &str) -> Option<QuizQuestion> {
        let current: Result<Option<QuizQuestion>> = self.sessions.current_question(user_id).await;
        match current {
            Ok(Some(question)) => Some(question),
            Ok(None) => None,
            Err(err) => {
                error!(user_id, %err, "failed to read the current question");
                None
            }
        }
    }
}
