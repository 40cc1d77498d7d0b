// src/models.rs

use crate::config::AppConfig;
use crate::content::Course;
use crate::generators::GeneratorKind;
use crate::projection::ProfileProjection;
use crate::scoring::SessionSummary;
use crate::session::{AnswerOutcome, Session};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Mutex;

// --- App State ---

/// The session currently on screen, with where its result will be stored.
pub struct ActiveSession {
    pub session: Session,
    pub context: SessionContext,
}

pub struct AppState {
    pub db: Mutex<Connection>,
    pub course: Course,
    pub config: AppConfig,
    pub viewer: Mutex<Option<String>>,
    pub active: Mutex<Option<ActiveSession>>,
    pub projection: Mutex<Option<ProfileProjection>>,
}

impl AppState {
    pub fn new(conn: Connection, course: Course, config: AppConfig) -> Self {
        Self {
            db: Mutex::new(conn),
            course,
            config,
            viewer: Mutex::new(None),
            active: Mutex::new(None),
            projection: Mutex::new(None),
        }
    }
}

// --- Helpers ---

pub fn ts_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(ts, 0).unwrap_or_default()
}

pub fn parse_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

// --- Session Kinds ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Practice,
    Arena,
    Gym,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Practice => "practice",
            SessionKind::Arena => "arena",
            SessionKind::Gym => "gym",
        }
    }
}

impl FromStr for SessionKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "practice" => Ok(SessionKind::Practice),
            "arena" => Ok(SessionKind::Arena),
            "gym" => Ok(SessionKind::Gym),
            other => Err(format!("unknown session kind '{}'", other)),
        }
    }
}

/// Where a finished session belongs in the curriculum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub course_id: String,
    pub day: u32,
    pub task_id: Option<String>,
    pub kind: SessionKind,
}

// --- Persisted Records ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: i64,
    pub user_id: String,
    pub course_id: String,
    pub day: u32,
    pub task_id: Option<String>,
    pub kind: SessionKind,
    pub score: u32,
    pub total_questions: u32,
    pub accuracy_percent: u32,
    pub time_taken_seconds: i64,
    pub passed: bool,
    pub created_at: DateTime<Utc>,
}

/// An attempt about to be written; the store assigns `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttempt {
    pub user_id: String,
    pub context: SessionContext,
    pub score: u32,
    pub total_questions: u32,
    pub accuracy_percent: u32,
    pub time_taken_seconds: i64,
    pub passed: bool,
    pub created_at: DateTime<Utc>,
}

impl NewAttempt {
    pub fn from_summary(
        user_id: &str,
        context: &SessionContext,
        summary: &SessionSummary,
        now: DateTime<Utc>,
    ) -> Self {
        NewAttempt {
            user_id: user_id.to_string(),
            context: context.clone(),
            score: summary.score,
            total_questions: summary.total_asked,
            accuracy_percent: summary.accuracy_percent,
            time_taken_seconds: summary.time_taken_seconds,
            passed: summary.passed,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyProgress {
    pub user_id: String,
    pub course_id: String,
    pub day: u32,
    pub notes_read: bool,
    pub practice_score: Option<f64>,
    pub compete_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields left as `None` keep their stored value on upsert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressPatch {
    pub notes_read: Option<bool>,
    pub practice_score: Option<f64>,
    pub compete_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewCard {
    pub user_id: String,
    pub course_id: String,
    pub card_id: String,
    pub front: String,
    pub back: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Badge {
    FirstPass,
    PerfectRun,
    ArenaFinisher,
    Lightning,
    WeekStreak,
    PremiumMember,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub display_name: String,
    pub is_premium: bool,
    pub is_admin: bool,
    pub total_xp: i64,
    pub level: i64,
    pub badges: Vec<Badge>,
    pub streak_days: u32,
    pub last_active_on: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(id: &str, display_name: &str, now: DateTime<Utc>) -> Self {
        Profile {
            id: id.to_string(),
            display_name: display_name.to_string(),
            is_premium: false,
            is_admin: false,
            total_xp: 0,
            level: 1,
            badges: Vec::new(),
            streak_days: 0,
            last_active_on: None,
            updated_at: now,
        }
    }

    pub fn has_badge(&self, badge: Badge) -> bool {
        self.badges.contains(&badge)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }

    /// Only pending requests move, and only once.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Approved)
                | (PaymentStatus::Pending, PaymentStatus::Rejected)
        )
    }
}

impl FromStr for PaymentStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "approved" => Ok(PaymentStatus::Approved),
            "rejected" => Ok(PaymentStatus::Rejected),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: i64,
    pub user_id: String,
    pub transaction_id: String,
    pub amount_inr: i64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAuditEntry {
    pub request_id: i64,
    pub actor: String,
    pub from_status: PaymentStatus,
    pub to_status: PaymentStatus,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

// --- Views ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpLeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    pub display_name: String,
    pub total_xp: i64,
    pub level: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaLeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    pub display_name: String,
    pub best_time_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboards {
    pub xp: Vec<XpLeaderboardEntry>,
    pub arena: Vec<ArenaLeaderboardEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    PremiumRequired,
    NotesUnread,
    PracticeNotPassed,
    PreviousTaskIncomplete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCard {
    pub day: u32,
    pub title: String,
    pub locked: Option<LockReason>,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabUnlocks {
    pub study: bool,
    pub practice: Option<LockReason>,
    pub arena: Option<LockReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub title: String,
    pub generator: GeneratorKind,
    pub target: u32,
    pub completed: bool,
    pub locked: Option<LockReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayStatus {
    pub day: u32,
    pub title: String,
    pub tabs: TabUnlocks,
    pub tasks: Vec<TaskStatus>,
    pub progress: Option<DailyProgress>,
    pub recent_attempts: Vec<AttemptRecord>,
}

/// What the learner sees while a session runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub prompt: Option<String>,
    /// Digits in the expected answer, so the keypad can size its input.
    pub answer_len: Option<usize>,
    pub score: u32,
    pub total_asked: u32,
    pub lives_remaining: Option<u32>,
    pub elapsed_seconds: i64,
    pub remaining_seconds: Option<i64>,
    pub penalty_seconds: i64,
    pub finished: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerFeedback {
    pub outcome: AnswerOutcome,
    pub view: SessionView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub summary: SessionSummary,
    pub xp_awarded: i64,
    pub new_badges: Vec<Badge>,
    pub profile: Option<Profile>,
    /// Set when the attempt could not be stored; the summary is still valid.
    pub save_error: Option<String>,
}
