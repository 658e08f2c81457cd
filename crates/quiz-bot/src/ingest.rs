//! Batch population of the question store from quiz files
//!
//! Files are processed one at a time, each parsed file's questions stored
//! with a single batch call. A file that cannot be read or whose batch is
//! rejected by the store is logged and skipped; the run continues with the
//! next file.

use crate::config::Config;
use crate::error::{QuizError, Result};
use crate::parser;
use crate::storage::QuestionStore;
use encoding_rs::Encoding;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

/// Populate the question store from `config.quiz_questions_directory`.
///
/// At most `config.fileparsing_limit` files are processed. Fails only when
/// the directory itself cannot be read.
pub async fn populate_db(config: &Config, store: &dyn QuestionStore) -> Result<()> {
    let directory = &config.quiz_questions_directory;
    debug!(directory = %directory.display(), "reading quiz files");

    let mut paths: Vec<_> = fs::read_dir(directory)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut stored = 0usize;
    let mut dropped = 0usize;

    for path in paths.iter().take(config.fileparsing_limit) {
        let file = path.display().to_string();

        let text = match read_decoded(path, &config.default_encoding) {
            Ok(text) => text,
            Err(err) => {
                error!(file, %err, "skipping unreadable quiz file");
                continue;
            }
        };

        let parsed = parser::parse_questions(&text, &file);
        dropped += parsed.dropped;
        if parsed.questions.is_empty() {
            debug!(file, "no valid questions in file");
            continue;
        }

        match store.add_batch(&parsed.questions).await {
            Ok(added) => {
                debug!(file, added, dropped = parsed.dropped, "stored quiz file batch");
                stored += added;
            }
            Err(err) => {
                error!(file, %err, "failed to store batch, skipping file");
            }
        }
    }

    info!(stored, dropped, "database population finished");
    Ok(())
}

/// Read a file and decode it with the configured encoding label.
fn read_decoded(path: &Path, encoding_label: &str) -> Result<String> {
    let bytes = fs::read(path)?;
    let encoding = Encoding::for_label(encoding_label.as_bytes()).ok_or_else(|| {
        QuizError::Config(format!("unknown text encoding: {encoding_label}"))
    })?;
    let (text, _, _) = encoding.decode(&bytes);
    Ok(text.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisSettings;
    use crate::storage::MemoryStorage;
    use std::io::Write;
    use std::path::PathBuf;

    const SAMPLE: &str = "\
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

    fn config_for(directory: PathBuf, limit: usize) -> Config {
        Config {
            quiz_questions_directory: directory,
            default_encoding: "UTF-8".to_string(),
            fileparsing_limit: limit,
            telegram_bot_token: "tg".to_string(),
            vk_group_token: "vk".to_string(),
            redis: RedisSettings {
                url: None,
                host: Some("localhost".to_string()),
                port: Some(6379),
            },
        }
    }

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn test_populate_counts_valid_records_only() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "tour1.txt", SAMPLE);

        let store = MemoryStorage::new();
        let config = config_for(dir.path().to_path_buf(), 10);
        populate_db(&config, &store).await.unwrap();

        // Two well-formed records stored, the answerless one dropped.
        let drawn = store.draw_random().await.unwrap();
        assert!(["4", "Париж"].contains(&drawn.answer.as_str()));
    }

    #[tokio::test]
    async fn test_file_limit_caps_the_run() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.txt", "Вопрос 1:\nПервый?\n\nОтвет:\nДа\n");
        write_file(dir.path(), "b.txt", "Вопрос 1:\nВторой?\n\nОтвет:\nНет\n");

        let store = MemoryStorage::new();
        let config = config_for(dir.path().to_path_buf(), 1);
        populate_db(&config, &store).await.unwrap();

        // Only the first file (sorted order) was ingested.
        let drawn = store.draw_random().await.unwrap();
        assert_eq!(drawn.question, "Первый?");
    }

    #[tokio::test]
    async fn test_missing_directory_fails() {
        let config = config_for(PathBuf::from("/definitely/not/here"), 10);
        let store = MemoryStorage::new();
        let result = populate_db(&config, &store).await;
        assert!(matches!(result, Err(QuizError::Io(_))));
    }

    #[tokio::test]
    async fn test_koi8r_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let encoding = Encoding::for_label(b"KOI8-R").unwrap();
        let (bytes, _, _) = encoding.encode("Вопрос 1:\nСколько будет 2+2?\n\nОтвет:\n4\n");
        fs::write(dir.path().join("koi8.txt"), &bytes).unwrap();

        let store = MemoryStorage::new();
        let mut config = config_for(dir.path().to_path_buf(), 10);
        config.default_encoding = "KOI8-R".to_string();
        populate_db(&config, &store).await.unwrap();

        let drawn = store.draw_random().await.unwrap();
        assert_eq!(drawn.question, "Сколько будет 2+2?");
        assert_eq!(drawn.answer, "4");
    }
}
