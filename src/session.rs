// src/session.rs

//! One run of questions: linear practice, survival, time attack (Arena) or
//! a countdown gym. Time is always passed in, never read from the clock, so
//! the same engine drives the desktop shell and the tests.

use crate::error::{MasteryError, MasteryResult};
use crate::generators::{GeneratorKind, Question};
use crate::models::SessionView;
use chrono::{DateTime, Duration, Utc};
use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SessionMode {
    /// Ends once `target` correct answers are given. Wrong answers re-prompt.
    Linear { target: u32 },
    /// Ends when lives run out; correct answers alone never end it.
    Survival { lives: u32 },
    /// Arena: reach `target` correct answers, each miss costs `penalty_secs`.
    TimeAttack { target: u32, penalty_secs: i64 },
    /// Answer as many as possible before the budget runs out.
    Countdown { duration_secs: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    TargetReached,
    OutOfLives,
    TimeExpired,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "reason", rename_all = "snake_case")]
pub enum SessionPhase {
    NotStarted,
    Running,
    Finished(FinishReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Input is too short or not a number yet.
    Pending,
    Correct,
    Wrong,
    /// The session is not running.
    Ignored,
}

pub struct Session<R: Rng = StdRng> {
    mode: SessionMode,
    pool: Vec<GeneratorKind>,
    rng: R,
    phase: SessionPhase,
    score: u32,
    total_asked: u32,
    lives_remaining: Option<u32>,
    penalty_secs: i64,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    current: Option<Question>,
}

impl<R: Rng> Session<R> {
    pub fn new(mode: SessionMode, pool: Vec<GeneratorKind>, rng: R) -> MasteryResult<Self> {
        if pool.is_empty() {
            return Err(MasteryError::Validation(
                "a session needs at least one generator".to_string(),
            ));
        }
        match mode {
            SessionMode::Linear { target: 0 } | SessionMode::TimeAttack { target: 0, .. } => {
                return Err(MasteryError::Validation(
                    "target must be greater than zero".to_string(),
                ))
            }
            SessionMode::Survival { lives: 0 } => {
                return Err(MasteryError::Validation(
                    "lives must be greater than zero".to_string(),
                ))
            }
            SessionMode::Countdown { duration_secs } if duration_secs <= 0 => {
                return Err(MasteryError::Validation(
                    "duration must be greater than zero".to_string(),
                ))
            }
            _ => {}
        }

        Ok(Session {
            mode,
            pool,
            rng,
            phase: SessionPhase::NotStarted,
            score: 0,
            total_asked: 0,
            lives_remaining: None,
            penalty_secs: 0,
            started_at: None,
            finished_at: None,
            current: None,
        })
    }

    /// Resets counters and deals the first question. Calling it again restarts.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.phase = SessionPhase::Running;
        self.score = 0;
        self.total_asked = 0;
        self.penalty_secs = 0;
        self.lives_remaining = match self.mode {
            SessionMode::Survival { lives } => Some(lives),
            _ => None,
        };
        self.started_at = Some(now);
        self.finished_at = None;
        self.next_question();
        debug!("[Session] Started {:?}", self.mode);
    }

    /// Auto-submit on length: the typed text is checked as soon as it has at
    /// least as many characters as the correct answer.
    pub fn type_input(&mut self, text: &str, now: DateTime<Utc>) -> AnswerOutcome {
        if self.phase != SessionPhase::Running {
            return AnswerOutcome::Ignored;
        }
        let Some(question) = self.current else {
            return AnswerOutcome::Ignored;
        };

        let typed = text.trim();
        if typed.len() < question.answer_len() {
            return AnswerOutcome::Pending;
        }
        match typed.parse::<i64>() {
            Ok(value) => self.submit(value, now),
            Err(_) => AnswerOutcome::Pending,
        }
    }

    /// Explicit submit; same evaluation as a completed `type_input`.
    pub fn submit(&mut self, answer: i64, now: DateTime<Utc>) -> AnswerOutcome {
        if self.phase != SessionPhase::Running {
            return AnswerOutcome::Ignored;
        }
        if self.expire_if_due(now) {
            return AnswerOutcome::Ignored;
        }
        let Some(question) = self.current else {
            return AnswerOutcome::Ignored;
        };

        self.total_asked += 1;

        if answer == question.answer {
            self.score += 1;
            match self.mode {
                SessionMode::Linear { target } | SessionMode::TimeAttack { target, .. }
                    if self.score >= target =>
                {
                    self.finish(FinishReason::TargetReached, now);
                }
                _ => self.next_question(),
            }
            return AnswerOutcome::Correct;
        }

        match self.mode {
            SessionMode::Linear { .. } => {}
            SessionMode::TimeAttack { penalty_secs, .. } => {
                self.penalty_secs += penalty_secs;
                debug!("[Session] Penalty +{}s (total {}s)", penalty_secs, self.penalty_secs);
            }
            SessionMode::Survival { .. } => {
                let left = self.lives_remaining.unwrap_or(0).saturating_sub(1);
                self.lives_remaining = Some(left);
                if left == 0 {
                    self.finish(FinishReason::OutOfLives, now);
                } else {
                    self.next_question();
                }
            }
            SessionMode::Countdown { .. } => self.next_question(),
        }
        AnswerOutcome::Wrong
    }

    /// Periodic timer hook. Only countdown sessions can expire.
    pub fn tick(&mut self, now: DateTime<Utc>) -> SessionPhase {
        if self.phase == SessionPhase::Running {
            self.expire_if_due(now);
        }
        self.phase
    }

    pub fn stop(&mut self, now: DateTime<Utc>) {
        if self.phase == SessionPhase::Running {
            self.finish(FinishReason::Stopped, now);
        }
    }

    /// Wall-clock seconds since start (frozen at finish) plus penalties.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.wall_seconds(now) + self.penalty_secs
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        match self.mode {
            SessionMode::Countdown { duration_secs } => {
                Some((duration_secs - self.wall_seconds(now)).max(0))
            }
            _ => None,
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionView {
        SessionView {
            prompt: self.current.map(|q| q.to_string()),
            answer_len: self.current.map(|q| q.answer_len()),
            score: self.score,
            total_asked: self.total_asked,
            lives_remaining: self.lives_remaining,
            elapsed_seconds: self.elapsed_seconds(now),
            remaining_seconds: self.remaining_seconds(now),
            penalty_seconds: self.penalty_secs,
            finished: self.is_finished(),
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, SessionPhase::Finished(_))
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        match self.phase {
            SessionPhase::Finished(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn total_asked(&self) -> u32 {
        self.total_asked
    }

    pub fn lives_remaining(&self) -> Option<u32> {
        self.lives_remaining
    }

    pub fn penalty_seconds(&self) -> i64 {
        self.penalty_secs
    }

    pub fn current_question(&self) -> Option<Question> {
        self.current
    }

    fn wall_seconds(&self, now: DateTime<Utc>) -> i64 {
        let Some(started) = self.started_at else {
            return 0;
        };
        let end = self.finished_at.unwrap_or(now);
        (end - started).num_seconds().max(0)
    }

    fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        let SessionMode::Countdown { duration_secs } = self.mode else {
            return false;
        };
        let Some(started) = self.started_at else {
            return false;
        };
        let deadline = started + Duration::seconds(duration_secs);
        if now >= deadline {
            self.finish(FinishReason::TimeExpired, deadline);
            true
        } else {
            false
        }
    }

    fn finish(&mut self, reason: FinishReason, at: DateTime<Utc>) {
        self.phase = SessionPhase::Finished(reason);
        self.finished_at = Some(at);
        self.current = None;
        debug!(
            "[Session] Finished ({:?}): score {}/{}",
            reason, self.score, self.total_asked
        );
    }

    fn next_question(&mut self) {
        let idx = self.rng.gen_range(0..self.pool.len());
        let kind = self.pool[idx];
        self.current = Some(kind.generate(&mut self.rng));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(secs)
    }

    fn session(mode: SessionMode) -> Session<StdRng> {
        let mut s = Session::new(
            mode,
            vec![GeneratorKind::TwoDigitAdd],
            StdRng::seed_from_u64(11),
        )
        .unwrap();
        s.start(t0());
        s
    }

    fn answer_right(s: &mut Session<StdRng>, now: DateTime<Utc>) -> AnswerOutcome {
        let q = s.current_question().unwrap();
        s.submit(q.answer, now)
    }

    fn answer_wrong(s: &mut Session<StdRng>, now: DateTime<Utc>) -> AnswerOutcome {
        let q = s.current_question().unwrap();
        s.submit(q.answer + 1, now)
    }

    #[test]
    fn rejects_empty_pool_and_zero_targets() {
        let rng = StdRng::seed_from_u64(1);
        assert!(Session::new(SessionMode::Linear { target: 5 }, vec![], rng).is_err());
        let rng = StdRng::seed_from_u64(1);
        assert!(Session::new(
            SessionMode::Linear { target: 0 },
            vec![GeneratorKind::TwoDigitAdd],
            rng
        )
        .is_err());
        let rng = StdRng::seed_from_u64(1);
        assert!(Session::new(
            SessionMode::Countdown { duration_secs: 0 },
            vec![GeneratorKind::TwoDigitAdd],
            rng
        )
        .is_err());
    }

    #[test]
    fn input_is_ignored_before_start() {
        let mut s = Session::new(
            SessionMode::Linear { target: 3 },
            vec![GeneratorKind::SingleDigitAdd],
            StdRng::seed_from_u64(2),
        )
        .unwrap();
        assert_eq!(s.phase(), SessionPhase::NotStarted);
        assert_eq!(s.submit(4, t0()), AnswerOutcome::Ignored);
        assert_eq!(s.type_input("4", t0()), AnswerOutcome::Ignored);
        assert_eq!(s.total_asked(), 0);
    }

    #[test]
    fn linear_ten_correct_first_try() {
        let mut s = session(SessionMode::Linear { target: 10 });
        for i in 0..10 {
            assert_eq!(s.phase(), SessionPhase::Running, "finished early at {}", i);
            assert_eq!(answer_right(&mut s, at(i + 1)), AnswerOutcome::Correct);
        }
        assert_eq!(s.phase(), SessionPhase::Finished(FinishReason::TargetReached));
        assert_eq!(s.score(), 10);
        assert_eq!(s.total_asked(), 10);
        assert_eq!(s.submit(1, at(20)), AnswerOutcome::Ignored);
    }

    #[test]
    fn linear_wrong_answer_reprompts_same_question() {
        let mut s = session(SessionMode::Linear { target: 2 });
        let before = s.current_question();
        assert_eq!(answer_wrong(&mut s, at(1)), AnswerOutcome::Wrong);
        assert_eq!(s.current_question(), before);
        assert_eq!(s.total_asked(), 1);
        assert_eq!(s.score(), 0);
        answer_right(&mut s, at(2));
        assert_eq!(s.phase(), SessionPhase::Running);
        answer_right(&mut s, at(3));
        assert!(s.is_finished());
        assert!(s.total_asked() >= s.score());
        assert_eq!(s.total_asked(), 3);
    }

    #[test]
    fn survival_ends_after_exactly_lives_wrong_answers() {
        let mut s = session(SessionMode::Survival { lives: 3 });
        for _ in 0..50 {
            answer_right(&mut s, at(1));
        }
        assert_eq!(s.phase(), SessionPhase::Running);

        answer_wrong(&mut s, at(2));
        answer_wrong(&mut s, at(3));
        assert_eq!(s.lives_remaining(), Some(1));
        assert_eq!(s.phase(), SessionPhase::Running);
        answer_wrong(&mut s, at(4));
        assert_eq!(s.phase(), SessionPhase::Finished(FinishReason::OutOfLives));
        assert_eq!(s.lives_remaining(), Some(0));
        assert_eq!(s.score(), 50);
    }

    #[test]
    fn arena_penalties_add_to_wall_clock() {
        let mut s = session(SessionMode::TimeAttack {
            target: 20,
            penalty_secs: 5,
        });
        for i in 0..3 {
            assert_eq!(answer_wrong(&mut s, at(i)), AnswerOutcome::Wrong);
            assert_eq!(s.phase(), SessionPhase::Running);
        }
        for i in 0..20 {
            answer_right(&mut s, at(10 + i));
        }
        assert_eq!(s.phase(), SessionPhase::Finished(FinishReason::TargetReached));
        assert_eq!(s.penalty_seconds(), 15);
        // Finished at t0 + 29s; elapsed freezes there.
        assert_eq!(s.elapsed_seconds(at(500)), 29 + 15);
    }

    #[test]
    fn countdown_expires_on_tick() {
        let mut s = session(SessionMode::Countdown { duration_secs: 60 });
        assert_eq!(s.remaining_seconds(at(15)), Some(45));
        assert_eq!(s.tick(at(59)), SessionPhase::Running);
        answer_wrong(&mut s, at(30));
        assert_eq!(s.phase(), SessionPhase::Running);
        assert_eq!(
            s.tick(at(61)),
            SessionPhase::Finished(FinishReason::TimeExpired)
        );
        assert_eq!(s.elapsed_seconds(at(300)), 60);
        assert_eq!(s.remaining_seconds(at(300)), Some(0));
    }

    #[test]
    fn late_answer_after_deadline_is_not_counted() {
        let mut s = session(SessionMode::Countdown { duration_secs: 10 });
        assert_eq!(answer_right(&mut s, at(11)), AnswerOutcome::Ignored);
        assert_eq!(s.score(), 0);
        assert_eq!(s.finish_reason(), Some(FinishReason::TimeExpired));
    }

    #[test]
    fn typed_input_waits_for_answer_length() {
        let mut s = session(SessionMode::Linear { target: 5 });
        let q = s.current_question().unwrap();
        let full = q.answer.to_string();
        let short = &full[..full.len() - 1];

        assert_eq!(s.type_input(short, at(1)), AnswerOutcome::Pending);
        assert_eq!(s.type_input("", at(1)), AnswerOutcome::Pending);
        assert_eq!(s.type_input("1x9", at(1)), AnswerOutcome::Pending);
        assert_eq!(s.total_asked(), 0);

        assert_eq!(s.type_input(&full, at(2)), AnswerOutcome::Correct);
        assert_eq!(s.score(), 1);
    }

    #[test]
    fn same_length_wrong_guess_is_checked_immediately() {
        let mut s = session(SessionMode::Linear { target: 5 });
        let q = s.current_question().unwrap();
        let wrong = "9".repeat(q.answer_len());
        let expected = if wrong == q.answer.to_string() {
            AnswerOutcome::Correct
        } else {
            AnswerOutcome::Wrong
        };
        assert_eq!(s.type_input(&wrong, at(1)), expected);
        assert_eq!(s.total_asked(), 1);
    }

    #[test]
    fn stop_freezes_elapsed_time() {
        let mut s = session(SessionMode::Survival { lives: 3 });
        s.stop(at(12));
        assert_eq!(s.finish_reason(), Some(FinishReason::Stopped));
        assert_eq!(s.elapsed_seconds(at(100)), 12);
        assert!(s.snapshot(at(100)).finished);
    }

    #[test]
    fn snapshot_shows_the_prompt_but_not_the_answer() {
        let s = session(SessionMode::Linear { target: 5 });
        let q = s.current_question().unwrap();
        let view = s.snapshot(at(1));
        assert_eq!(view.prompt, Some(q.to_string()));
        assert_eq!(view.answer_len, Some(q.answer_len()));

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("answer").is_none());
        assert!(json.get("question").is_none());
    }

    #[test]
    fn restart_resets_counters() {
        let mut s = session(SessionMode::TimeAttack {
            target: 3,
            penalty_secs: 5,
        });
        answer_wrong(&mut s, at(1));
        answer_right(&mut s, at(2));
        s.start(at(10));
        assert_eq!(s.score(), 0);
        assert_eq!(s.total_asked(), 0);
        assert_eq!(s.penalty_seconds(), 0);
        assert_eq!(s.elapsed_seconds(at(13)), 3);
    }
}
