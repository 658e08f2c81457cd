//! Parser for the line-oriented tagged quiz file format
//!
//! Each record starts with a `Вопрос N:` marker line; the labeled sections
//! (`Ответ:`, `Комментарий:`, `Источник:`, `Автор:`) each sit on their own
//! marker line and run until the next blank line. A record that fails the
//! question invariant is dropped with a logged error; the rest of the file is
//! still parsed.

use crate::models::QuizQuestion;
use regex::Regex;
use std::sync::LazyLock;
use tracing::error;

static QUESTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Вопрос \d+:\s*$").expect("valid question marker pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Question,
    Answer,
    Comment,
    Source,
    Author,
}

fn match_marker(line: &str) -> Option<Section> {
    let line = line.trim_end();
    if QUESTION_MARKER.is_match(line) {
        return Some(Section::Question);
    }
    match line {
        "Ответ:" => Some(Section::Answer),
        "Комментарий:" => Some(Section::Comment),
        "Источник:" => Some(Section::Source),
        "Автор:" => Some(Section::Author),
        _ => None,
    }
}

/// Result of parsing one file.
#[derive(Debug, Default)]
pub struct ParsedFile {
    pub questions: Vec<QuizQuestion>,
    /// Records dropped because they failed validation.
    pub dropped: usize,
}

#[derive(Debug, Default)]
struct RecordDraft {
    question: String,
    answer: String,
    comment: String,
    source: String,
    author: String,
}

impl RecordDraft {
    fn is_started(&self) -> bool {
        !self.question.is_empty()
    }

    fn assign(&mut self, section: Section, body: String) {
        match section {
            Section::Question => self.question = body,
            Section::Answer => self.answer = body,
            Section::Comment => self.comment = body,
            Section::Source => self.source = body,
            Section::Author => self.author = body,
        }
    }

    fn finish(self, origin: &str, parsed: &mut ParsedFile) {
        match QuizQuestion::new(
            self.question,
            self.answer,
            self.comment,
            self.source,
            self.author,
        ) {
            Ok(question) => parsed.questions.push(question),
            Err(err) => {
                error!(file = origin, %err, "dropping malformed quiz record");
                parsed.dropped += 1;
            }
        }
    }
}

/// Parse every record out of one decoded quiz file.
///
/// `origin` only labels log lines (usually the file path).
pub fn parse_questions(text: &str, origin: &str) -> ParsedFile {
    let lines: Vec<&str> = text.lines().collect();
    let mut parsed = ParsedFile::default();
    let mut draft = RecordDraft::default();
    let mut index = 0;

    while index < lines.len() {
        let Some(section) = match_marker(lines[index]) else {
            index += 1;
            continue;
        };

        // A fresh question marker closes the previous record.
        if section == Section::Question && draft.is_started() {
            std::mem::take(&mut draft).finish(origin, &mut parsed);
        }

        let (body, next) = read_section_body(&lines, index + 1);
        draft.assign(section, body);
        index = next;
    }

    if draft.is_started() {
        draft.finish(origin, &mut parsed);
    }

    parsed
}

/// Collect non-empty lines starting at `start` until a blank line; internal
/// newlines are preserved. Returns the body and the index after it.
fn read_section_body(lines: &[&str], start: usize) -> (String, usize) {
    let mut body = Vec::new();
    let mut index = start;

    while index < lines.len() && !lines[index].trim().is_empty() {
        body.push(lines[index].trim_end());
        index += 1;
    }

    (body.join("\n"), index)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "\
Чемпионат:
Тестовый турнир

Вопрос 1:
Сколько будет 2+2?

Ответ:
4

Комментарий:
Простая арифметика.

Источник:
Учебник математики,
страница 5

Автор:
Иванов И.

Вопрос 2:
Столица Франции?

Ответ:
Париж

";

    #[test]
    fn test_parses_all_sections() {
        let parsed = parse_questions(WELL_FORMED, "test");
        assert_eq!(parsed.dropped, 0);
        assert_eq!(parsed.questions.len(), 2);

        let first = &parsed.questions[0];
        assert_eq!(first.question, "Сколько будет 2+2?");
        assert_eq!(first.answer, "4");
        assert_eq!(first.comment, "Простая арифметика.");
        assert_eq!(first.source, "Учебник математики,\nстраница 5");
        assert_eq!(first.author, "Иванов И.");

        let second = &parsed.questions[1];
        assert_eq!(second.answer, "Париж");
        assert_eq!(second.comment, "");
    }

    #[test]
    fn test_record_missing_answer_is_dropped() {
        let text = "\
Вопрос 1:
Сколько будет 2+2?

Ответ:
4

Вопрос 2:
Вопрос без ответа

Вопрос 3:
Столица Франции?

Ответ:
Париж
";
        let parsed = parse_questions(text, "test");
        assert_eq!(parsed.questions.len(), 2);
        assert_eq!(parsed.dropped, 1);
        assert_eq!(parsed.questions[0].answer, "4");
        assert_eq!(parsed.questions[1].answer, "Париж");
    }

    #[test]
    fn test_multiline_question_body() {
        let text = "\
Вопрос 12:
Первая строка вопроса,
вторая строка вопроса.

Ответ:
Да
";
        let parsed = parse_questions(text, "test");
        assert_eq!(parsed.questions.len(), 1);
        assert_eq!(
            parsed.questions[0].question,
            "Первая строка вопроса,\nвторая строка вопроса."
        );
    }

    #[test]
    fn test_empty_file() {
        let parsed = parse_questions("", "test");
        assert!(parsed.questions.is_empty());
        assert_eq!(parsed.dropped, 0);
    }

    #[test]
    fn test_marker_requires_number() {
        assert!(match_marker("Вопрос 10:").is_some());
        assert!(match_marker("Вопрос:").is_none());
        assert!(match_marker("Ответ:").is_some());
        assert!(match_marker("Ответ: 4").is_none());
    }
}
