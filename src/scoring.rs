// src/scoring.rs

use crate::constants::*;
use crate::models::{Badge, Profile, SessionKind};
use crate::session::{FinishReason, Session, SessionMode};
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub score: u32,
    pub total_asked: u32,
    pub accuracy_percent: u32,
    pub time_taken_seconds: i64,
    pub penalty_seconds: i64,
    /// Seconds per correct answer; `None` when nothing was answered correctly.
    pub seconds_per_answer: Option<f64>,
    pub passed: bool,
    pub finish_reason: Option<FinishReason>,
}

impl SessionSummary {
    pub fn from_session<R: Rng>(session: &Session<R>, now: DateTime<Utc>) -> Self {
        let score = session.score();
        let total_asked = session.total_asked();
        let accuracy_percent = accuracy(score, total_asked);
        let time_taken_seconds = session.elapsed_seconds(now);
        let finish_reason = session.finish_reason();

        let passed = match session.mode() {
            // Time attack difficulty lives in the clock, not in a pass mark.
            SessionMode::TimeAttack { .. } => finish_reason == Some(FinishReason::TargetReached),
            SessionMode::Linear { .. } => {
                finish_reason == Some(FinishReason::TargetReached) && is_passing(accuracy_percent)
            }
            SessionMode::Survival { .. } | SessionMode::Countdown { .. } => {
                total_asked > 0 && is_passing(accuracy_percent)
            }
        };

        SessionSummary {
            score,
            total_asked,
            accuracy_percent,
            time_taken_seconds,
            penalty_seconds: session.penalty_seconds(),
            seconds_per_answer: speed(time_taken_seconds, score),
            passed,
            finish_reason,
        }
    }
}

/// `round(score / total * 100)`; zero when nothing was asked.
pub fn accuracy(score: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (score as f64 / total as f64 * 100.0).round() as u32
}

pub fn speed(time_taken_seconds: i64, score: u32) -> Option<f64> {
    if score == 0 {
        None
    } else {
        Some(time_taken_seconds as f64 / score as f64)
    }
}

pub fn is_passing(accuracy_percent: u32) -> bool {
    accuracy_percent >= PASS_THRESHOLD_PERCENT
}

// --- Gamification ---

pub fn xp_for(summary: &SessionSummary, kind: SessionKind) -> i64 {
    let mut xp = summary.score as i64 * XP_PER_CORRECT;
    if summary.passed {
        xp += XP_PASS_BONUS;
        if kind == SessionKind::Arena {
            xp += XP_ARENA_BONUS;
        }
    }
    xp
}

pub fn level_for(total_xp: i64) -> i64 {
    total_xp.max(0) / XP_PER_LEVEL + 1
}

/// Same day keeps the streak, the next day extends it, any gap resets it.
pub fn next_streak(last_active: Option<NaiveDate>, streak: u32, today: NaiveDate) -> u32 {
    match last_active {
        Some(last) if last == today => streak.max(1),
        Some(last) if last.succ_opt() == Some(today) => streak + 1,
        _ => 1,
    }
}

/// Badges earned by this session that the profile does not hold yet.
pub fn earned_badges(profile: &Profile, summary: &SessionSummary, kind: SessionKind) -> Vec<Badge> {
    let mut earned = Vec::new();

    if summary.passed {
        earned.push(Badge::FirstPass);
    }
    if summary.total_asked >= PERFECT_RUN_MIN_ASKED && summary.accuracy_percent == 100 {
        earned.push(Badge::PerfectRun);
    }
    if kind == SessionKind::Arena && summary.passed {
        earned.push(Badge::ArenaFinisher);
        if summary
            .seconds_per_answer
            .map_or(false, |s| s <= LIGHTNING_SECONDS_PER_ANSWER)
        {
            earned.push(Badge::Lightning);
        }
    }
    if profile.streak_days >= STREAK_BADGE_DAYS {
        earned.push(Badge::WeekStreak);
    }
    if profile.is_premium {
        earned.push(Badge::PremiumMember);
    }

    earned.retain(|b| !profile.has_badge(*b));
    earned
}

/// Applies one finished session to a profile: XP, level, streak, badges.
/// Returns the XP gained and the newly granted badges.
pub fn apply_session(
    profile: &mut Profile,
    summary: &SessionSummary,
    kind: SessionKind,
    now: DateTime<Utc>,
) -> (i64, Vec<Badge>) {
    let xp = xp_for(summary, kind);
    let old_level = profile.level;

    let today = now.date_naive();
    profile.streak_days = next_streak(profile.last_active_on, profile.streak_days, today);
    profile.last_active_on = Some(today);
    profile.total_xp += xp;
    profile.level = level_for(profile.total_xp);

    let badges = earned_badges(profile, summary, kind);
    profile.badges.extend(badges.iter().copied());
    profile.badges.sort();
    profile.updated_at = now;

    debug!(
        "[Scoring] {}: +{} XP, level {} -> {}, streak {}, badges {:?}",
        profile.id, xp, old_level, profile.level, profile.streak_days, badges
    );
    (xp, badges)
}
