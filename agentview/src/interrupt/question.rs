//! Multi-question prompt with local validation.
//!
//! Answers are only ever produced for the whole request: if any question is
//! unanswered, [`QuestionPrompt::answers`] fails and nothing is sent.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::envelope::ClientCommand;
use crate::error::AnswerError;

use super::{QuestionRequest, QuestionSpec};

/// The answer to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question: String,
    /// Selected option labels, then the free-text answer if any.
    pub answer: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Selection {
    options: BTreeSet<usize>,
    other: Option<String>,
}

impl Selection {
    fn is_answered(&self) -> bool {
        !self.options.is_empty() || self.other.is_some()
    }
}

/// Editable answer state for an active question request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionPrompt {
    request_id: String,
    questions: Vec<QuestionSpec>,
    selections: Vec<Selection>,
    current: usize,
}

impl QuestionPrompt {
    pub fn new(request: &QuestionRequest) -> Self {
        Self {
            request_id: request.request_id.clone(),
            questions: request.questions.clone(),
            selections: vec![Selection::default(); request.questions.len()],
            current: 0,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn questions(&self) -> &[QuestionSpec] {
        &self.questions
    }

    /// Index of the question being shown.
    pub const fn current(&self) -> usize {
        self.current
    }

    pub fn next(&mut self) {
        if self.current + 1 < self.questions.len() {
            self.current += 1;
        }
    }

    pub fn previous(&mut self) {
        self.current = self.current.saturating_sub(1);
    }

    /// Select an option. Single-select questions replace the previous
    /// choice; multi-select questions toggle it.
    pub fn select(&mut self, question: usize, option: usize) -> Result<(), AnswerError> {
        let spec = self
            .questions
            .get(question)
            .ok_or(AnswerError::UnknownQuestion { index: question })?;
        if option >= spec.options.len() {
            return Err(AnswerError::UnknownOption {
                index: question,
                option,
            });
        }
        let selection = &mut self.selections[question];
        if spec.multi_select {
            if !selection.options.remove(&option) {
                selection.options.insert(option);
            }
        } else {
            selection.options.clear();
            selection.options.insert(option);
            selection.other = None;
        }
        Ok(())
    }

    /// Set a free-text answer. Blank text clears it.
    pub fn set_other(&mut self, question: usize, text: &str) -> Result<(), AnswerError> {
        let spec = self
            .questions
            .get(question)
            .ok_or(AnswerError::UnknownQuestion { index: question })?;
        let text = text.trim();
        let selection = &mut self.selections[question];
        if text.is_empty() {
            selection.other = None;
            return Ok(());
        }
        if !spec.multi_select {
            selection.options.clear();
        }
        selection.other = Some(text.to_string());
        Ok(())
    }

    pub fn is_answered(&self, question: usize) -> bool {
        self.selections
            .get(question)
            .is_some_and(Selection::is_answered)
    }

    pub fn is_complete(&self) -> bool {
        self.selections.iter().all(Selection::is_answered)
    }

    /// Collect answers for every question, or fail on the first gap.
    pub fn answers(&self) -> Result<Vec<QuestionAnswer>, AnswerError> {
        self.questions
            .iter()
            .zip(&self.selections)
            .enumerate()
            .map(|(index, (spec, selection))| {
                if !selection.is_answered() {
                    return Err(AnswerError::Incomplete {
                        index,
                        question: spec.question.clone(),
                    });
                }
                let mut answer: Vec<String> = selection
                    .options
                    .iter()
                    .map(|&i| spec.options[i].label.clone())
                    .collect();
                answer.extend(selection.other.clone());
                Ok(QuestionAnswer {
                    question: spec.question.clone(),
                    answer,
                })
            })
            .collect()
    }

    /// Build the outbound response, validating completeness first.
    pub fn respond(&self) -> Result<ClientCommand, AnswerError> {
        Ok(ClientCommand::QuestionResponse {
            request_id: self.request_id.clone(),
            answers: self.answers()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::QuestionOption;

    fn option(label: &str) -> QuestionOption {
        QuestionOption {
            label: label.to_string(),
            description: None,
        }
    }

    fn request() -> QuestionRequest {
        QuestionRequest {
            request_id: "q-1".to_string(),
            questions: vec![
                QuestionSpec {
                    question: "Which database?".to_string(),
                    header: Some("DB".to_string()),
                    multi_select: false,
                    options: vec![option("sqlite"), option("postgres")],
                },
                QuestionSpec {
                    question: "Which features?".to_string(),
                    header: None,
                    multi_select: true,
                    options: vec![option("auth"), option("search"), option("billing")],
                },
            ],
        }
    }

    #[test]
    fn single_select_replaces() {
        let mut prompt = QuestionPrompt::new(&request());
        prompt.select(0, 0).unwrap();
        prompt.select(0, 1).unwrap();
        prompt.select(1, 0).unwrap();
        let answers = prompt.answers().unwrap();
        assert_eq!(answers[0].answer, vec!["postgres"]);
    }

    #[test]
    fn multi_select_toggles() {
        let mut prompt = QuestionPrompt::new(&request());
        prompt.select(0, 0).unwrap();
        prompt.select(1, 0).unwrap();
        prompt.select(1, 2).unwrap();
        prompt.select(1, 0).unwrap();
        let answers = prompt.answers().unwrap();
        assert_eq!(answers[1].answer, vec!["billing"]);
    }

    #[test]
    fn incomplete_answers_are_rejected() {
        let mut prompt = QuestionPrompt::new(&request());
        prompt.select(0, 1).unwrap();
        assert!(!prompt.is_complete());
        let err = prompt.respond().unwrap_err();
        assert_eq!(
            err,
            AnswerError::Incomplete {
                index: 1,
                question: "Which features?".to_string()
            }
        );
    }

    #[test]
    fn other_text_counts_as_answer() {
        let mut prompt = QuestionPrompt::new(&request());
        prompt.select(0, 0).unwrap();
        prompt.set_other(0, "duckdb").unwrap();
        prompt.set_other(1, "  export  ").unwrap();
        let answers = prompt.answers().unwrap();
        assert_eq!(answers[0].answer, vec!["duckdb"]);
        assert_eq!(answers[1].answer, vec!["export"]);
    }

    #[test]
    fn rejects_unknown_option() {
        let mut prompt = QuestionPrompt::new(&request());
        assert_eq!(
            prompt.select(0, 5),
            Err(AnswerError::UnknownOption {
                index: 0,
                option: 5
            })
        );
        assert_eq!(
            prompt.select(9, 0),
            Err(AnswerError::UnknownQuestion { index: 9 })
        );
    }

    #[test]
    fn navigation_is_clamped() {
        let mut prompt = QuestionPrompt::new(&request());
        prompt.previous();
        assert_eq!(prompt.current(), 0);
        prompt.next();
        prompt.next();
        assert_eq!(prompt.current(), 1);
    }
}
