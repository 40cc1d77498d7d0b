// src/pedagogy.rs

use crate::config::AppConfig;
use crate::constants::*;
use crate::content::Course;
use crate::error::{MasteryError, MasteryResult};
use crate::generators::GeneratorKind;
use crate::models::{
    AttemptRecord, Badge, DayCard, DayStatus, Leaderboards, NewAttempt, PaymentAuditEntry,
    PaymentRequest, PaymentStatus, Profile, ProgressPatch, ReviewCard, SessionContext, SessionKind,
    SessionReport, TaskStatus,
};
use crate::payments;
use crate::projection::{ProfileProjection, Reconciled};
use crate::repository;
use crate::scoring::{self, SessionSummary};
use crate::session::{FinishReason, Session, SessionMode};
use crate::unlock;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::Rng;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "budget", rename_all = "snake_case")]
pub enum GymBudget {
    Time { seconds: i64 },
    Lives { lives: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GymConfig {
    pub generators: Vec<GeneratorKind>,
    pub budget: GymBudget,
}

impl Default for GymConfig {
    fn default() -> Self {
        GymConfig {
            generators: vec![GeneratorKind::TwoDigitAdd, GeneratorKind::TwoDigitSub],
            budget: GymBudget::Time {
                seconds: DEFAULT_GYM_SECONDS,
            },
        }
    }
}

impl GymConfig {
    pub fn survival(generators: Vec<GeneratorKind>) -> Self {
        GymConfig {
            generators,
            budget: GymBudget::Lives {
                lives: DEFAULT_SURVIVAL_LIVES,
            },
        }
    }
}

// --- Viewer ---

/// Creates the profile on first sign-in. Users listed in `admin_ids` are
/// granted the admin role; it is never revoked here.
pub fn sign_in(
    conn: &Connection,
    config: &AppConfig,
    user_id: &str,
    display_name: &str,
    now: DateTime<Utc>,
) -> MasteryResult<Profile> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(MasteryError::Validation("user id is required".to_string()));
    }
    let mut profile = repository::ensure_profile(conn, user_id, display_name.trim(), now)?;
    if config.is_admin(&profile.id) && !profile.is_admin {
        repository::set_admin(conn, &profile.id, true)?;
        profile.is_admin = true;
        info!("Granted admin role to {}", profile.id);
    }
    info!("Signed in as {} ({})", profile.id, profile.display_name);
    Ok(profile)
}

fn viewer_profile(conn: &Connection, viewer: Option<&str>) -> MasteryResult<Option<Profile>> {
    match viewer {
        Some(id) => Ok(repository::get_profile(conn, id)?),
        None => Ok(None),
    }
}

fn require_viewer(conn: &Connection, viewer: Option<&str>) -> MasteryResult<Profile> {
    viewer_profile(conn, viewer)?
        .ok_or_else(|| MasteryError::Unauthorized("sign in first".to_string()))
}

fn require_admin(conn: &Connection, viewer: Option<&str>) -> MasteryResult<Profile> {
    let profile = require_viewer(conn, viewer)?;
    if !profile.is_admin {
        return Err(MasteryError::Unauthorized(
            "only admins can review payments".to_string(),
        ));
    }
    Ok(profile)
}

// --- Course Navigation ---

pub fn course_overview(
    conn: &Connection,
    course: &Course,
    viewer: Option<&str>,
) -> MasteryResult<Vec<DayCard>> {
    let profile = viewer_profile(conn, viewer)?;
    if profile.is_none() {
        warn!("Course overview without a signed-in user; showing defaults");
    }
    let is_premium = profile.as_ref().map_or(false, |p| p.is_premium);
    let completed = match &profile {
        Some(p) => repository::fetch_completed_task_ids_for_course(conn, &p.id, &course.id)?,
        None => HashSet::new(),
    };

    let mut cards = Vec::with_capacity(course.days.len());
    for day in &course.days {
        cards.push(DayCard {
            day: day.day,
            title: day.title.clone(),
            locked: unlock::day_lock(day.day, course.total_days(), is_premium)?,
            completed: unlock::day_completed(&day.tasks, &completed),
        });
    }
    Ok(cards)
}

pub fn day_status(
    conn: &Connection,
    course: &Course,
    day: u32,
    viewer: Option<&str>,
) -> MasteryResult<DayStatus> {
    let content = course.day_or_err(day)?;
    let profile = viewer_profile(conn, viewer)?;
    let is_premium = profile.as_ref().map_or(false, |p| p.is_premium);

    if let Some(reason) = unlock::day_lock(day, course.total_days(), is_premium)? {
        debug!("Day {} locked for {:?}: {:?}", day, viewer, reason);
        return Err(MasteryError::Locked(format!("day {} requires premium", day)));
    }

    let (progress, completed, recent) = match &profile {
        Some(p) => (
            repository::fetch_daily_progress(conn, &p.id, &course.id, day)?,
            repository::fetch_completed_task_ids(conn, &p.id, &course.id, day)?,
            repository::fetch_recent_attempts(
                conn,
                &p.id,
                &course.id,
                day,
                None,
                RECENT_ATTEMPTS_LIMIT,
            )?,
        ),
        None => {
            warn!("Day {} status without a signed-in user", day);
            (None, HashSet::new(), Vec::new())
        }
    };

    let locks = unlock::task_locks(&content.tasks, &completed);
    let tasks = content
        .tasks
        .iter()
        .zip(locks)
        .map(|(task, locked)| TaskStatus {
            task_id: task.id.clone(),
            title: task.title.clone(),
            generator: task.generator,
            target: task.target,
            completed: completed.contains(&task.id),
            locked,
        })
        .collect();

    Ok(DayStatus {
        day,
        title: content.title.clone(),
        tabs: unlock::tab_unlocks(progress.as_ref(), is_premium),
        tasks,
        progress,
        recent_attempts: recent,
    })
}

pub fn mark_notes_read(
    conn: &Connection,
    course: &Course,
    day: u32,
    viewer: Option<&str>,
    now: DateTime<Utc>,
) -> MasteryResult<()> {
    course.day_or_err(day)?;
    let Some(user_id) = viewer else {
        warn!("Notes read on day {} without a signed-in user; not saved", day);
        return Ok(());
    };
    let patch = ProgressPatch {
        notes_read: Some(true),
        ..Default::default()
    };
    repository::upsert_daily_progress(conn, user_id, &course.id, day, &patch, now)?;
    debug!("{} read the notes for day {}", user_id, day);
    Ok(())
}

// --- Starting Sessions ---

pub fn start_task_session<R: Rng>(
    conn: &Connection,
    course: &Course,
    day: u32,
    task_id: &str,
    viewer: Option<&str>,
    rng: R,
) -> MasteryResult<(Session<R>, SessionContext)> {
    let status = day_status(conn, course, day, viewer)?;
    if let Some(reason) = status.tabs.practice {
        return Err(MasteryError::Locked(format!(
            "practice for day {} is locked ({:?})",
            day, reason
        )));
    }
    let task = status
        .tasks
        .iter()
        .find(|t| t.task_id == task_id)
        .ok_or_else(|| MasteryError::NotFound(format!("task '{}' on day {}", task_id, day)))?;
    if let Some(reason) = task.locked {
        return Err(MasteryError::Locked(format!(
            "task '{}' is locked ({:?})",
            task_id, reason
        )));
    }

    let session = Session::new(
        SessionMode::Linear {
            target: task.target,
        },
        vec![task.generator],
        rng,
    )?;
    info!(
        "Practice session for '{}' (day {}, {}) ready",
        task_id,
        day,
        task.generator.label()
    );
    Ok((
        session,
        SessionContext {
            course_id: course.id.clone(),
            day,
            task_id: Some(task_id.to_string()),
            kind: SessionKind::Practice,
        },
    ))
}

pub fn start_arena_session<R: Rng>(
    conn: &Connection,
    course: &Course,
    day: u32,
    viewer: Option<&str>,
    rng: R,
) -> MasteryResult<(Session<R>, SessionContext)> {
    let status = day_status(conn, course, day, viewer)?;
    if let Some(reason) = status.tabs.arena {
        return Err(MasteryError::Locked(format!(
            "arena for day {} is locked ({:?})",
            day, reason
        )));
    }
    let arena = &course.day_or_err(day)?.arena;
    let session = Session::new(
        SessionMode::TimeAttack {
            target: arena.target,
            penalty_secs: ARENA_PENALTY_SECONDS,
        },
        arena.generators.clone(),
        rng,
    )?;
    info!("Arena session for day {} ready", day);
    Ok((
        session,
        SessionContext {
            course_id: course.id.clone(),
            day,
            task_id: None,
            kind: SessionKind::Arena,
        },
    ))
}

/// Custom Gym sessions are not tied to a day and are recorded as day 0.
pub fn start_gym_session<R: Rng>(
    conn: &Connection,
    course: &Course,
    config: &GymConfig,
    viewer: Option<&str>,
    rng: R,
) -> MasteryResult<(Session<R>, SessionContext)> {
    let is_premium = viewer_profile(conn, viewer)?.map_or(false, |p| p.is_premium);
    if let Some(reason) = unlock::gym_lock(is_premium) {
        return Err(MasteryError::Locked(format!(
            "custom gym is locked ({:?})",
            reason
        )));
    }
    let mode = match config.budget {
        GymBudget::Time { seconds } => SessionMode::Countdown {
            duration_secs: seconds,
        },
        GymBudget::Lives { lives } => SessionMode::Survival { lives },
    };
    let session = Session::new(mode, config.generators.clone(), rng)?;
    Ok((
        session,
        SessionContext {
            course_id: course.id.clone(),
            day: 0,
            task_id: None,
            kind: SessionKind::Gym,
        },
    ))
}

// --- Finishing Sessions ---

/// Scores a finished session and stores it. A failed write is reported in
/// `save_error`; the summary is returned either way.
pub fn finish_session<R: Rng>(
    conn: &Connection,
    viewer: Option<&str>,
    context: &SessionContext,
    session: &Session<R>,
    now: DateTime<Utc>,
) -> MasteryResult<SessionReport> {
    if !session.is_finished() {
        return Err(MasteryError::Validation(
            "session is still running".to_string(),
        ));
    }
    let summary = SessionSummary::from_session(session, now);
    info!(
        "Session finished ({:?} day {}): {}/{} ({}%), {}s, passed: {}",
        context.kind,
        context.day,
        summary.score,
        summary.total_asked,
        summary.accuracy_percent,
        summary.time_taken_seconds,
        summary.passed
    );

    let Some(user_id) = viewer else {
        warn!("No signed-in user; session result not saved");
        return Ok(SessionReport {
            summary,
            xp_awarded: 0,
            new_badges: Vec::new(),
            profile: None,
            save_error: None,
        });
    };

    let report = match persist_session(conn, user_id, context, &summary, now) {
        Ok((xp_awarded, new_badges, profile)) => SessionReport {
            summary,
            xp_awarded,
            new_badges,
            profile: Some(profile),
            save_error: None,
        },
        Err(e) => {
            warn!("Failed to save session for {}: {}", user_id, e);
            SessionReport {
                summary,
                xp_awarded: 0,
                new_badges: Vec::new(),
                profile: None,
                save_error: Some(e.to_string()),
            }
        }
    };
    Ok(report)
}

fn persist_session(
    conn: &Connection,
    user_id: &str,
    context: &SessionContext,
    summary: &SessionSummary,
    now: DateTime<Utc>,
) -> MasteryResult<(i64, Vec<Badge>, Profile)> {
    let tx = conn.unchecked_transaction()?;

    repository::record_attempt(&tx, &NewAttempt::from_summary(user_id, context, summary, now))?;

    let existing = repository::fetch_daily_progress(&tx, user_id, &context.course_id, context.day)?;
    let completed = summary.finish_reason == Some(FinishReason::TargetReached);
    let patch = match context.kind {
        SessionKind::Practice if completed => {
            let best = existing
                .as_ref()
                .and_then(|p| p.practice_score)
                .unwrap_or(0.0);
            Some(ProgressPatch {
                practice_score: Some(best.max(summary.accuracy_percent as f64)),
                ..Default::default()
            })
        }
        SessionKind::Arena if summary.passed => {
            let time = summary.time_taken_seconds as f64;
            let best = existing
                .as_ref()
                .and_then(|p| p.compete_score)
                .map_or(time, |s| s.min(time));
            Some(ProgressPatch {
                compete_score: Some(best),
                ..Default::default()
            })
        }
        _ => None,
    };
    if let Some(patch) = patch {
        repository::upsert_daily_progress(&tx, user_id, &context.course_id, context.day, &patch, now)?;
    }

    let mut profile = repository::get_profile(&tx, user_id)?
        .ok_or_else(|| MasteryError::NotFound(format!("profile {}", user_id)))?;
    let (xp, badges) = scoring::apply_session(&mut profile, summary, context.kind, now);
    repository::save_profile_progress(&tx, &profile)?;

    tx.commit()?;
    Ok((xp, badges, profile))
}

/// Reconciles the local projection with the store and pushes it back when
/// the local copy is newer.
pub fn sync_projection(
    conn: &Connection,
    projection: &mut ProfileProjection,
) -> MasteryResult<Reconciled> {
    let remote = repository::get_profile(conn, &projection.profile().id)?.ok_or_else(|| {
        MasteryError::NotFound(format!("profile {}", projection.profile().id))
    })?;
    let outcome = projection.reconcile(remote);
    if projection.needs_push() {
        repository::save_profile_progress(conn, projection.profile())?;
        projection.mark_pushed();
        info!("Pushed local profile for {}", projection.profile().id);
    }
    Ok(outcome)
}

// --- History, Bookmarks, Leaderboards ---

pub fn recent_attempts(
    conn: &Connection,
    course: &Course,
    day: u32,
    task_id: Option<&str>,
    viewer: Option<&str>,
) -> MasteryResult<Vec<AttemptRecord>> {
    let Some(user_id) = viewer else {
        return Ok(Vec::new());
    };
    Ok(repository::fetch_recent_attempts(
        conn,
        user_id,
        &course.id,
        day,
        task_id,
        RECENT_ATTEMPTS_LIMIT,
    )?)
}

/// Returns whether the card is bookmarked afterwards.
pub fn toggle_bookmark(
    conn: &Connection,
    course: &Course,
    day: u32,
    card_id: &str,
    viewer: Option<&str>,
    now: DateTime<Utc>,
) -> MasteryResult<bool> {
    let card = course
        .day_or_err(day)?
        .card(card_id)
        .ok_or_else(|| MasteryError::NotFound(format!("card '{}' on day {}", card_id, day)))?;
    let Some(user_id) = viewer else {
        warn!("Bookmark toggle without a signed-in user; ignored");
        return Ok(false);
    };

    let review = ReviewCard {
        user_id: user_id.to_string(),
        course_id: course.id.clone(),
        card_id: card.id.clone(),
        front: card.front.clone(),
        back: card.back.clone(),
        created_at: now,
    };
    let bookmarked = repository::toggle_review(conn, &review)?;
    debug!("{} bookmark {} -> {}", user_id, card_id, bookmarked);
    Ok(bookmarked)
}

pub fn bookmarks(
    conn: &Connection,
    course: &Course,
    viewer: Option<&str>,
) -> MasteryResult<Vec<ReviewCard>> {
    match viewer {
        Some(user_id) => Ok(repository::list_reviews(conn, user_id, &course.id)?),
        None => Ok(Vec::new()),
    }
}

pub fn leaderboards(conn: &Connection, course: &Course, day: u32) -> MasteryResult<Leaderboards> {
    course.day_or_err(day)?;
    Ok(Leaderboards {
        xp: repository::fetch_xp_leaderboard(conn, LEADERBOARD_LIMIT)?,
        arena: repository::fetch_arena_leaderboard(conn, &course.id, day, LEADERBOARD_LIMIT)?,
    })
}

// --- Premium Upgrade ---

pub fn payment_link(config: &AppConfig, viewer: Option<&str>) -> String {
    let note = match viewer {
        Some(user_id) => format!("Premium {}", user_id),
        None => "Premium".to_string(),
    };
    payments::upi_payment_uri(
        &config.upi_vpa,
        &config.upi_payee,
        config.premium_price_inr,
        &note,
    )
}

pub fn submit_payment(
    conn: &Connection,
    config: &AppConfig,
    viewer: Option<&str>,
    transaction_id: &str,
    now: DateTime<Utc>,
) -> MasteryResult<PaymentRequest> {
    let profile = require_viewer(conn, viewer)?;
    payments::submit_payment(conn, &profile, transaction_id, config.premium_price_inr, now)
}

pub fn my_payments(conn: &Connection, viewer: Option<&str>) -> MasteryResult<Vec<PaymentRequest>> {
    let profile = require_viewer(conn, viewer)?;
    Ok(repository::list_payment_requests(conn, None)?
        .into_iter()
        .filter(|r| r.user_id == profile.id)
        .collect())
}

pub fn pending_payments(
    conn: &Connection,
    viewer: Option<&str>,
) -> MasteryResult<Vec<PaymentRequest>> {
    require_admin(conn, viewer)?;
    Ok(repository::list_payment_requests(
        conn,
        Some(PaymentStatus::Pending),
    )?)
}

pub fn payment_audit(
    conn: &Connection,
    viewer: Option<&str>,
    request_id: i64,
) -> MasteryResult<Vec<PaymentAuditEntry>> {
    require_admin(conn, viewer)?;
    Ok(repository::list_payment_audit(conn, request_id)?)
}

pub fn approve_payment(
    conn: &Connection,
    viewer: Option<&str>,
    request_id: i64,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> MasteryResult<PaymentRequest> {
    let admin = require_viewer(conn, viewer)?;
    payments::decide_payment(conn, &admin, request_id, PaymentStatus::Approved, note, now)
}

pub fn reject_payment(
    conn: &Connection,
    viewer: Option<&str>,
    request_id: i64,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> MasteryResult<PaymentRequest> {
    let admin = require_viewer(conn, viewer)?;
    payments::decide_payment(conn, &admin, request_id, PaymentStatus::Rejected, note, now)
}
