//! Question bank backed by a JSON file.
//!
//! The whole bank is cached in memory and rewritten to disk after every admin
//! mutation. Games receive their own copy of a random sample, so edits never
//! affect a game in progress.

use crate::types::{Question, QuestionId};
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum QuestionBankError {
    #[error("Question {0} not found")]
    NotFound(QuestionId),

    #[error("Invalid question: {0}")]
    Invalid(String),

    #[error("Failed to access question file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed question file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Admin-supplied question fields
#[derive(Debug, Clone)]
pub struct QuestionInput {
    pub emojis: String,
    pub answer: String,
    pub hint: Option<String>,
}

impl QuestionInput {
    /// Trim fields, reject empty emojis/answer, drop empty hints
    fn normalized(self) -> Result<Self, QuestionBankError> {
        let emojis = self.emojis.trim().to_string();
        let answer = self.answer.trim().to_string();
        if emojis.is_empty() {
            return Err(QuestionBankError::Invalid("emojis must not be empty".to_string()));
        }
        if answer.is_empty() {
            return Err(QuestionBankError::Invalid("answer must not be empty".to_string()));
        }
        let hint = self
            .hint
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty());
        Ok(Self {
            emojis,
            answer,
            hint,
        })
    }
}

pub struct QuestionBank {
    path: PathBuf,
    questions: RwLock<Vec<Question>>,
}

impl QuestionBank {
    /// Load the bank from `path`. A missing file yields an empty bank.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, QuestionBankError> {
        let path = path.into();
        let questions = match tokio::fs::read_to_string(&path).await {
            Ok(data) => serde_json::from_str::<Vec<Question>>(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Question file not found, starting empty");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            path = %path.display(),
            count = questions.len(),
            "Question bank loaded"
        );
        Ok(Self {
            path,
            questions: RwLock::new(questions),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn all(&self) -> Vec<Question> {
        self.questions.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.questions.read().await.len()
    }

    pub async fn get(&self, id: QuestionId) -> Option<Question> {
        self.questions
            .read()
            .await
            .iter()
            .find(|q| q.id == id)
            .cloned()
    }

    /// Up to `count` distinct questions in random order
    pub async fn random(&self, count: usize) -> Vec<Question> {
        let mut sample = self.all().await;
        sample.shuffle(&mut rand::rng());
        sample.truncate(count);
        sample
    }

    /// Append a question with the next free id
    pub async fn add(&self, input: QuestionInput) -> Result<Question, QuestionBankError> {
        let input = input.normalized()?;
        let mut questions = self.questions.write().await;

        let id = match questions.iter().map(|q| q.id).max() {
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| QuestionBankError::Invalid("no question ids left".to_string()))?,
            None => 1,
        };
        let question = Question {
            id,
            emojis: input.emojis,
            answer: input.answer,
            hint: input.hint,
        };

        let mut updated = questions.clone();
        updated.push(question.clone());
        self.persist(&updated).await?;
        *questions = updated;

        tracing::info!(id, "Added question");
        Ok(question)
    }

    pub async fn update(
        &self,
        id: QuestionId,
        input: QuestionInput,
    ) -> Result<Question, QuestionBankError> {
        let input = input.normalized()?;
        let mut questions = self.questions.write().await;

        let index = questions
            .iter()
            .position(|q| q.id == id)
            .ok_or(QuestionBankError::NotFound(id))?;

        let mut updated = questions.clone();
        let question = &mut updated[index];
        question.emojis = input.emojis;
        question.answer = input.answer;
        question.hint = input.hint;
        let question = question.clone();

        self.persist(&updated).await?;
        *questions = updated;

        tracing::info!(id, "Updated question");
        Ok(question)
    }

    pub async fn remove(&self, id: QuestionId) -> Result<(), QuestionBankError> {
        let mut questions = self.questions.write().await;
        if !questions.iter().any(|q| q.id == id) {
            return Err(QuestionBankError::NotFound(id));
        }

        let updated: Vec<Question> = questions.iter().filter(|q| q.id != id).cloned().collect();
        self.persist(&updated).await?;
        *questions = updated;

        tracing::info!(id, "Removed question");
        Ok(())
    }

    /// Write the bank next to its final location, then rename over it
    async fn persist(&self, questions: &[Question]) -> Result<(), QuestionBankError> {
        let json = serde_json::to_string_pretty(questions)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn input(emojis: &str, answer: &str, hint: Option<&str>) -> QuestionInput {
        QuestionInput {
            emojis: emojis.to_string(),
            answer: answer.to_string(),
            hint: hint.map(str::to_string),
        }
    }

    async fn bank_with(json: &str) -> (tempfile::TempDir, QuestionBank) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.json");
        std::fs::write(&path, json).unwrap();
        let bank = QuestionBank::load(&path).await.unwrap();
        (dir, bank)
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let bank = QuestionBank::load(dir.path().join("nope.json")).await.unwrap();
        assert_eq!(bank.count().await, 0);
        assert!(bank.random(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_load_malformed_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.json");
        std::fs::write(&path, "{not json").unwrap();
        let result = QuestionBank::load(&path).await;
        assert!(matches!(result, Err(QuestionBankError::Parse(_))));
    }

    #[tokio::test]
    async fn test_load_with_and_without_hints() {
        let (_dir, bank) = bank_with(
            r#"[{"id":1,"emojis":"🐱🏃","answer":"catrun"},
                {"id":2,"emojis":"🌞🌧️","answer":"sunrain","hint":"weather"}]"#,
        )
        .await;
        let all = bank.all().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].hint, None);
        assert_eq!(all[1].hint.as_deref(), Some("weather"));
    }

    #[tokio::test]
    async fn test_random_samples_without_replacement() {
        let (_dir, bank) = bank_with(
            r#"[{"id":1,"emojis":"a","answer":"a"},{"id":2,"emojis":"b","answer":"b"},
                {"id":3,"emojis":"c","answer":"c"},{"id":4,"emojis":"d","answer":"d"}]"#,
        )
        .await;

        let sample = bank.random(3).await;
        assert_eq!(sample.len(), 3);
        let ids: HashSet<_> = sample.iter().map(|q| q.id).collect();
        assert_eq!(ids.len(), 3);

        // Asking for more than exists returns the whole bank
        assert_eq!(bank.random(10).await.len(), 4);
    }

    #[tokio::test]
    async fn test_add_assigns_next_id_and_persists() {
        let (dir, bank) = bank_with(r#"[{"id":7,"emojis":"a","answer":"a"}]"#).await;

        let q = bank.add(input(" 🍕🇮🇹 ", " pizza ", Some("  "))).await.unwrap();
        assert_eq!(q.id, 8);
        assert_eq!(q.emojis, "🍕🇮🇹");
        assert_eq!(q.answer, "pizza");
        assert_eq!(q.hint, None);

        // Reloading from disk sees the new question
        let reloaded = QuestionBank::load(dir.path().join("questions.json"))
            .await
            .unwrap();
        assert_eq!(reloaded.count().await, 2);
        assert_eq!(reloaded.get(8).await.unwrap().answer, "pizza");
    }

    #[tokio::test]
    async fn test_add_to_empty_bank_starts_at_one() {
        let dir = tempfile::tempdir().unwrap();
        let bank = QuestionBank::load(dir.path().join("data").join("questions.json"))
            .await
            .unwrap();
        let q = bank.add(input("🐝", "bee", Some("buzz"))).await.unwrap();
        assert_eq!(q.id, 1);
        assert_eq!(q.hint.as_deref(), Some("buzz"));
        assert!(bank.path().exists());
    }

    #[tokio::test]
    async fn test_add_rejects_blank_fields() {
        let (_dir, bank) = bank_with("[]").await;
        assert!(matches!(
            bank.add(input("  ", "x", None)).await,
            Err(QuestionBankError::Invalid(_))
        ));
        assert!(matches!(
            bank.add(input("x", "", None)).await,
            Err(QuestionBankError::Invalid(_))
        ));
        assert_eq!(bank.count().await, 0);
    }

    #[tokio::test]
    async fn test_add_fails_when_ids_are_exhausted() {
        let (_dir, bank) = bank_with(r#"[{"id":4294967295,"emojis":"a","answer":"a"}]"#).await;
        assert!(matches!(
            bank.add(input("🐝", "bee", None)).await,
            Err(QuestionBankError::Invalid(_))
        ));
        assert_eq!(bank.count().await, 1);
    }

    #[tokio::test]
    async fn test_update_and_remove() {
        let (_dir, bank) = bank_with(
            r#"[{"id":1,"emojis":"a","answer":"a"},{"id":2,"emojis":"b","answer":"b"}]"#,
        )
        .await;

        let updated = bank.update(2, input("🅱️", "bee", Some("letter"))).await.unwrap();
        assert_eq!(updated.id, 2);
        assert_eq!(bank.get(2).await.unwrap().answer, "bee");

        assert!(matches!(
            bank.update(9, input("x", "y", None)).await,
            Err(QuestionBankError::NotFound(9))
        ));

        bank.remove(1).await.unwrap();
        assert_eq!(bank.count().await, 1);
        assert!(matches!(
            bank.remove(1).await,
            Err(QuestionBankError::NotFound(1))
        ));

        // Ids are never reused while a higher one exists
        let q = bank.add(input("c", "c", None)).await.unwrap();
        assert_eq!(q.id, 3);
    }
}
