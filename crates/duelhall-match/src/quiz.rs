//! Arithmetic quiz: both seats race through the same questions.
//!
//! Questions go out without answers; each submission is checked here.
//! Only the first submission per seat and question counts. The match
//! settles as soon as either seat submits the last question, with
//! whatever the other seat has scored by then.

use std::collections::HashSet;

use duelhall_protocol::{Event, GameVariant, Operator, QuizQuestion, Scores, Seat};
use rand::Rng;
use tokio::time::Instant;

use crate::{Effect, MatchConfig, MatchError, Play, Rules};

/// Generates `count` questions with operands in 1..=9.
pub fn generate_questions(count: usize) -> Vec<QuizQuestion> {
    let mut rng = rand::rng();
    (0..count)
        .map(|index| QuizQuestion {
            index,
            lhs: rng.random_range(1..=9),
            op: Operator::ALL[rng.random_range(0..Operator::ALL.len())],
            rhs: rng.random_range(1..=9),
        })
        .collect()
}

pub struct QuizRules {
    count: usize,
    questions: Option<Vec<QuizQuestion>>,
    answered: HashSet<(Seat, usize)>,
    scores: Scores,
    settled: bool,
}

impl QuizRules {
    /// Starts from a fixed question set instead of generating one on the
    /// first ready.
    pub fn with_questions(questions: Vec<QuizQuestion>) -> Self {
        Self {
            count: questions.len(),
            questions: Some(questions),
            answered: HashSet::new(),
            scores: Scores::default(),
            settled: false,
        }
    }

    pub fn questions(&self) -> Option<&[QuizQuestion]> {
        self.questions.as_deref()
    }

    fn answer(&mut self, seat: Seat, index: usize, value: i64) -> Result<Vec<Effect>, MatchError> {
        let questions = self.questions.as_ref().ok_or(MatchError::NotStarted)?;
        let question = questions.get(index).ok_or(MatchError::IndexOutOfRange {
            index,
            count: questions.len(),
        })?;

        if self.settled || !self.answered.insert((seat, index)) {
            tracing::debug!(by = %seat, index, "repeated answer ignored");
            return Ok(Vec::new());
        }

        let correct = question.answer() == value;
        if correct {
            self.scores.award(seat);
        }
        tracing::debug!(by = %seat, index, correct, "answer checked");

        if index + 1 == questions.len() {
            self.settled = true;
            return Ok(vec![Effect::Settle(self.scores)]);
        }
        Ok(Vec::new())
    }
}

impl Rules for QuizRules {
    const VARIANT: GameVariant = GameVariant::Quiz;

    fn new(config: &MatchConfig) -> Self {
        Self {
            count: config.quiz_questions,
            questions: None,
            answered: HashSet::new(),
            scores: Scores::default(),
            settled: false,
        }
    }

    fn play(&mut self, seat: Seat, play: Play, _now: Instant) -> Result<Vec<Effect>, MatchError> {
        match play {
            Play::Ready => {
                // Later readies re-send the same set for late joiners.
                let count = self.count;
                let questions = self
                    .questions
                    .get_or_insert_with(|| generate_questions(count))
                    .clone();
                Ok(vec![Effect::Publish(Event::QuizQuestions { questions })])
            }
            Play::Answer { index, value } => self.answer(seat, index, value),
            Play::Tap => {
                tracing::debug!(by = %seat, "tap sent to a quiz match");
                Ok(Vec::new())
            }
        }
    }

    fn scores(&self) -> Scores {
        self.scores
    }
}
