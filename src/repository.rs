// src/repository.rs

use crate::models::{
    parse_date, ts_to_datetime, ArenaLeaderboardEntry, AttemptRecord, Badge, DailyProgress,
    NewAttempt, PaymentAuditEntry, PaymentRequest, PaymentStatus, Profile, ProgressPatch,
    ReviewCard, XpLeaderboardEntry,
};
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::collections::HashSet;
use std::str::FromStr;

fn parse_text<T: FromStr<Err = String>>(idx: usize, raw: String) -> Result<T> {
    T::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn parse_badges(idx: usize, raw: String) -> Result<Vec<Badge>> {
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// --- Profiles ---

const PROFILE_COLUMNS: &str = "id, display_name, is_premium, is_admin, total_xp, level, badges, \
                               streak_days, last_active_on, updated_at";

fn row_to_profile(row: &Row) -> Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        display_name: row.get(1)?,
        is_premium: row.get(2)?,
        is_admin: row.get(3)?,
        total_xp: row.get(4)?,
        level: row.get(5)?,
        badges: parse_badges(6, row.get(6)?)?,
        streak_days: row.get(7)?,
        last_active_on: parse_date(row.get(8)?),
        updated_at: ts_to_datetime(row.get(9)?),
    })
}

pub fn get_profile(conn: &Connection, user_id: &str) -> Result<Option<Profile>> {
    conn.query_row(
        &format!("SELECT {} FROM profiles WHERE id = ?", PROFILE_COLUMNS),
        [user_id],
        row_to_profile,
    )
    .optional()
}

/// Creates the profile on first sight and returns the stored row.
pub fn ensure_profile(
    conn: &Connection,
    user_id: &str,
    display_name: &str,
    now: DateTime<Utc>,
) -> Result<Profile> {
    conn.execute(
        "INSERT OR IGNORE INTO profiles (id, display_name, updated_at) VALUES (?, ?, ?)",
        params![user_id, display_name, now.timestamp()],
    )?;
    conn.query_row(
        &format!("SELECT {} FROM profiles WHERE id = ?", PROFILE_COLUMNS),
        [user_id],
        row_to_profile,
    )
}

/// Writes the gamification fields. Premium and admin flags are untouched.
pub fn save_profile_progress(conn: &Connection, profile: &Profile) -> Result<()> {
    let badges = serde_json::to_string(&profile.badges)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "UPDATE profiles SET total_xp = ?, level = ?, badges = ?, streak_days = ?,
                last_active_on = ?, updated_at = ?
         WHERE id = ?",
        params![
            profile.total_xp,
            profile.level,
            badges,
            profile.streak_days,
            profile
                .last_active_on
                .map(|d| d.format("%Y-%m-%d").to_string()),
            profile.updated_at.timestamp(),
            profile.id
        ],
    )?;
    Ok(())
}

pub fn set_premium(
    conn: &Connection,
    user_id: &str,
    premium: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET is_premium = ?, updated_at = ? WHERE id = ?",
        params![premium, now.timestamp(), user_id],
    )?;
    Ok(())
}

pub fn set_admin(conn: &Connection, user_id: &str, admin: bool) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET is_admin = ? WHERE id = ?",
        params![admin, user_id],
    )?;
    Ok(())
}

// --- Attempts ---

const ATTEMPT_COLUMNS: &str = "id, user_id, course_id, day, task_id, kind, score, total_questions, \
                               accuracy_percent, time_taken_seconds, passed, created_at";

fn row_to_attempt(row: &Row) -> Result<AttemptRecord> {
    Ok(AttemptRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        course_id: row.get(2)?,
        day: row.get(3)?,
        task_id: row.get(4)?,
        kind: parse_text(5, row.get(5)?)?,
        score: row.get(6)?,
        total_questions: row.get(7)?,
        accuracy_percent: row.get(8)?,
        time_taken_seconds: row.get(9)?,
        passed: row.get(10)?,
        created_at: ts_to_datetime(row.get(11)?),
    })
}

/// Records a finished session. Attempts are never updated afterwards.
pub fn record_attempt(conn: &Connection, attempt: &NewAttempt) -> Result<i64> {
    conn.execute(
        "INSERT INTO attempts (user_id, course_id, day, task_id, kind, score, total_questions,
                               accuracy_percent, time_taken_seconds, passed, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            attempt.user_id,
            attempt.context.course_id,
            attempt.context.day,
            attempt.context.task_id,
            attempt.context.kind.as_str(),
            attempt.score,
            attempt.total_questions,
            attempt.accuracy_percent,
            attempt.time_taken_seconds,
            attempt.passed,
            attempt.created_at.timestamp()
        ],
    )?;
    let id = conn.last_insert_rowid();
    debug!(
        "[DB] Attempt {} stored for {} (day {}, {:?})",
        id, attempt.user_id, attempt.context.day, attempt.context.task_id
    );
    Ok(id)
}

/// Newest first, at most `limit` rows. `task_id = None` means every task of the day.
pub fn fetch_recent_attempts(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
    day: u32,
    task_id: Option<&str>,
    limit: u32,
) -> Result<Vec<AttemptRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM attempts
         WHERE user_id = ?1 AND course_id = ?2 AND day = ?3
         AND (?4 IS NULL OR task_id = ?4)
         ORDER BY created_at DESC, id DESC
         LIMIT ?5",
        ATTEMPT_COLUMNS
    ))?;

    let attempts = stmt
        .query_map(
            params![user_id, course_id, day, task_id, limit],
            row_to_attempt,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(attempts)
}

/// Task ids of the day with at least one passed attempt.
pub fn fetch_completed_task_ids(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
    day: u32,
) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT task_id FROM attempts
         WHERE user_id = ? AND course_id = ? AND day = ?
         AND passed = 1 AND task_id IS NOT NULL",
    )?;
    let ids = stmt
        .query_map(params![user_id, course_id, day], |row| row.get(0))?
        .collect::<Result<HashSet<String>, _>>()?;
    Ok(ids)
}

/// Same as `fetch_completed_task_ids` for every day of the course.
pub fn fetch_completed_task_ids_for_course(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT task_id FROM attempts
         WHERE user_id = ? AND course_id = ?
         AND passed = 1 AND task_id IS NOT NULL",
    )?;
    let ids = stmt
        .query_map(params![user_id, course_id], |row| row.get(0))?
        .collect::<Result<HashSet<String>, _>>()?;
    Ok(ids)
}

// --- Daily Progress ---

const PROGRESS_COLUMNS: &str =
    "user_id, course_id, day, notes_read, practice_score, compete_score, created_at, updated_at";

fn row_to_progress(row: &Row) -> Result<DailyProgress> {
    Ok(DailyProgress {
        user_id: row.get(0)?,
        course_id: row.get(1)?,
        day: row.get(2)?,
        notes_read: row.get(3)?,
        practice_score: row.get(4)?,
        compete_score: row.get(5)?,
        created_at: ts_to_datetime(row.get(6)?),
        updated_at: ts_to_datetime(row.get(7)?),
    })
}

/// One row per user/course/day. Later writes win field by field.
pub fn upsert_daily_progress(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
    day: u32,
    patch: &ProgressPatch,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO daily_progress
            (user_id, course_id, day, notes_read, practice_score, compete_score, created_at, updated_at)
         VALUES (?1, ?2, ?3, COALESCE(?4, 0), ?5, ?6, ?7, ?7)
         ON CONFLICT (user_id, course_id, day) DO UPDATE SET
            notes_read = COALESCE(?4, notes_read),
            practice_score = COALESCE(?5, practice_score),
            compete_score = COALESCE(?6, compete_score),
            updated_at = ?7",
        params![
            user_id,
            course_id,
            day,
            patch.notes_read,
            patch.practice_score,
            patch.compete_score,
            now.timestamp()
        ],
    )?;
    Ok(())
}

pub fn fetch_daily_progress(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
    day: u32,
) -> Result<Option<DailyProgress>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM daily_progress WHERE user_id = ? AND course_id = ? AND day = ?",
            PROGRESS_COLUMNS
        ),
        params![user_id, course_id, day],
        row_to_progress,
    )
    .optional()
}

// --- Reviews (bookmarks) ---

/// Flips the bookmark. Returns `true` when the card is bookmarked afterwards.
pub fn toggle_review(conn: &Connection, card: &ReviewCard) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM reviews WHERE user_id = ? AND course_id = ? AND card_id = ?",
        params![card.user_id, card.course_id, card.card_id],
    )?;
    if removed > 0 {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO reviews (user_id, course_id, card_id, front, back, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            card.user_id,
            card.course_id,
            card.card_id,
            card.front,
            card.back,
            card.created_at.timestamp()
        ],
    )?;
    Ok(true)
}

pub fn list_reviews(conn: &Connection, user_id: &str, course_id: &str) -> Result<Vec<ReviewCard>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, course_id, card_id, front, back, created_at
         FROM reviews WHERE user_id = ? AND course_id = ?
         ORDER BY created_at DESC, card_id",
    )?;
    let cards = stmt
        .query_map(params![user_id, course_id], |row| {
            Ok(ReviewCard {
                user_id: row.get(0)?,
                course_id: row.get(1)?,
                card_id: row.get(2)?,
                front: row.get(3)?,
                back: row.get(4)?,
                created_at: ts_to_datetime(row.get(5)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cards)
}

// --- Leaderboards ---

pub fn fetch_xp_leaderboard(conn: &Connection, limit: u32) -> Result<Vec<XpLeaderboardEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, display_name, total_xp, level FROM profiles
         ORDER BY total_xp DESC, id ASC
         LIMIT ?",
    )?;
    let rows = stmt.query_map([limit], |row| {
        Ok(XpLeaderboardEntry {
            rank: 0,
            user_id: row.get(0)?,
            display_name: row.get(1)?,
            total_xp: row.get(2)?,
            level: row.get(3)?,
        })
    })?;

    let mut entries = Vec::new();
    for (idx, row) in rows.enumerate() {
        let mut entry = row?;
        entry.rank = idx as u32 + 1;
        entries.push(entry);
    }
    Ok(entries)
}

/// Fastest passed arena run per user for one day.
pub fn fetch_arena_leaderboard(
    conn: &Connection,
    course_id: &str,
    day: u32,
    limit: u32,
) -> Result<Vec<ArenaLeaderboardEntry>> {
    let mut stmt = conn.prepare(
        "SELECT a.user_id, COALESCE(p.display_name, a.user_id), MIN(a.time_taken_seconds) AS best
         FROM attempts a
         LEFT JOIN profiles p ON p.id = a.user_id
         WHERE a.course_id = ? AND a.day = ? AND a.kind = 'arena' AND a.passed = 1
         GROUP BY a.user_id
         ORDER BY best ASC, a.user_id ASC
         LIMIT ?",
    )?;
    let rows = stmt.query_map(params![course_id, day, limit], |row| {
        Ok(ArenaLeaderboardEntry {
            rank: 0,
            user_id: row.get(0)?,
            display_name: row.get(1)?,
            best_time_seconds: row.get(2)?,
        })
    })?;

    let mut entries = Vec::new();
    for (idx, row) in rows.enumerate() {
        let mut entry = row?;
        entry.rank = idx as u32 + 1;
        entries.push(entry);
    }
    Ok(entries)
}

// --- Payments ---

const PAYMENT_COLUMNS: &str =
    "id, user_id, transaction_id, amount_inr, status, created_at, decided_by, decided_at";

fn row_to_payment(row: &Row) -> Result<PaymentRequest> {
    let decided_at: Option<i64> = row.get(7)?;
    Ok(PaymentRequest {
        id: row.get(0)?,
        user_id: row.get(1)?,
        transaction_id: row.get(2)?,
        amount_inr: row.get(3)?,
        status: parse_text(4, row.get(4)?)?,
        created_at: ts_to_datetime(row.get(5)?),
        decided_by: row.get(6)?,
        decided_at: decided_at.map(ts_to_datetime),
    })
}

pub fn insert_payment_request(
    conn: &Connection,
    user_id: &str,
    transaction_id: &str,
    amount_inr: i64,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO payment_requests (user_id, transaction_id, amount_inr, status, created_at)
         VALUES (?, ?, ?, 'pending', ?)",
        params![user_id, transaction_id, amount_inr, now.timestamp()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_payment_request(conn: &Connection, id: i64) -> Result<Option<PaymentRequest>> {
    conn.query_row(
        &format!("SELECT {} FROM payment_requests WHERE id = ?", PAYMENT_COLUMNS),
        [id],
        row_to_payment,
    )
    .optional()
}

pub fn transaction_id_exists(conn: &Connection, transaction_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM payment_requests WHERE transaction_id = ?",
        [transaction_id],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

pub fn find_pending_request(conn: &Connection, user_id: &str) -> Result<Option<PaymentRequest>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM payment_requests
             WHERE user_id = ? AND status = 'pending'
             ORDER BY created_at DESC, id DESC LIMIT 1",
            PAYMENT_COLUMNS
        ),
        [user_id],
        row_to_payment,
    )
    .optional()
}

/// Oldest first so the admin console works through the queue in order.
pub fn list_payment_requests(
    conn: &Connection,
    status: Option<PaymentStatus>,
) -> Result<Vec<PaymentRequest>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM payment_requests
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY created_at ASC, id ASC",
        PAYMENT_COLUMNS
    ))?;
    let rows = stmt
        .query_map([status.map(|s| s.as_str())], row_to_payment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Moves a request only if it is still in `from`. Returns whether this call won.
pub fn transition_payment(
    conn: &Connection,
    id: i64,
    from: PaymentStatus,
    to: PaymentStatus,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE payment_requests SET status = ?, decided_by = ?, decided_at = ?
         WHERE id = ? AND status = ?",
        params![to.as_str(), actor, now.timestamp(), id, from.as_str()],
    )?;
    Ok(changed == 1)
}

pub fn insert_payment_audit(conn: &Connection, entry: &PaymentAuditEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO payment_audit (request_id, actor, from_status, to_status, note, at)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            entry.request_id,
            entry.actor,
            entry.from_status.as_str(),
            entry.to_status.as_str(),
            entry.note,
            entry.at.timestamp()
        ],
    )?;
    Ok(())
}

pub fn list_payment_audit(conn: &Connection, request_id: i64) -> Result<Vec<PaymentAuditEntry>> {
    let mut stmt = conn.prepare(
        "SELECT request_id, actor, from_status, to_status, note, at
         FROM payment_audit WHERE request_id = ? ORDER BY id",
    )?;
    let rows = stmt
        .query_map([request_id], |row| {
            Ok(PaymentAuditEntry {
                request_id: row.get(0)?,
                actor: row.get(1)?,
                from_status: parse_text(2, row.get(2)?)?,
                to_status: parse_text(3, row.get(3)?)?,
                note: row.get(4)?,
                at: ts_to_datetime(row.get(5)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::init_db;
    use crate::models::{SessionContext, SessionKind};
    use chrono::Duration;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn
    }

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn attempt(task: Option<&str>, kind: SessionKind, passed: bool, secs: i64, at: i64) -> NewAttempt {
        NewAttempt {
            user_id: "u1".to_string(),
            context: SessionContext {
                course_id: "speed-maths".to_string(),
                day: 1,
                task_id: task.map(str::to_string),
                kind,
            },
            score: 10,
            total_questions: 12,
            accuracy_percent: 83,
            time_taken_seconds: secs,
            passed,
            created_at: t(at),
        }
    }

    #[test]
    fn recent_attempts_newest_first_and_bounded() {
        let c = conn();
        for i in 0..5 {
            record_attempt(&c, &attempt(Some("d1-t1"), SessionKind::Practice, true, 30, i)).unwrap();
        }
        record_attempt(&c, &attempt(Some("d1-t2"), SessionKind::Practice, false, 30, 10)).unwrap();

        let all = fetch_recent_attempts(&c, "u1", "speed-maths", 1, None, 3).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].task_id.as_deref(), Some("d1-t2"));
        assert!(all[0].created_at >= all[1].created_at);

        let t1 = fetch_recent_attempts(&c, "u1", "speed-maths", 1, Some("d1-t1"), 10).unwrap();
        assert_eq!(t1.len(), 5);
        assert_eq!(t1[0].created_at, t(4));

        assert!(fetch_recent_attempts(&c, "u2", "speed-maths", 1, None, 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn corrupt_rows_fail_instead_of_defaulting() {
        let c = conn();
        ensure_profile(&c, "u1", "Asha", t(0)).unwrap();
        c.execute("UPDATE profiles SET badges = 'not json' WHERE id = 'u1'", [])
            .unwrap();
        assert!(matches!(
            get_profile(&c, "u1"),
            Err(rusqlite::Error::FromSqlConversionFailure(6, Type::Text, _))
        ));

        record_attempt(&c, &attempt(Some("d1-t1"), SessionKind::Arena, true, 30, 0)).unwrap();
        c.execute_batch(
            "PRAGMA ignore_check_constraints = ON;
             UPDATE attempts SET kind = 'sprint';",
        )
        .unwrap();
        assert!(matches!(
            fetch_recent_attempts(&c, "u1", "speed-maths", 1, None, 10),
            Err(rusqlite::Error::FromSqlConversionFailure(5, Type::Text, _))
        ));
    }

    #[test]
    fn completed_task_ids_only_count_passes() {
        let c = conn();
        record_attempt(&c, &attempt(Some("d1-t1"), SessionKind::Practice, true, 30, 0)).unwrap();
        record_attempt(&c, &attempt(Some("d1-t1"), SessionKind::Practice, true, 25, 1)).unwrap();
        record_attempt(&c, &attempt(Some("d1-t2"), SessionKind::Practice, false, 30, 2)).unwrap();
        record_attempt(&c, &attempt(None, SessionKind::Arena, true, 30, 3)).unwrap();

        let done = fetch_completed_task_ids(&c, "u1", "speed-maths", 1).unwrap();
        assert_eq!(done.len(), 1);
        assert!(done.contains("d1-t1"));
    }

    #[test]
    fn progress_upsert_keeps_untouched_fields() {
        let c = conn();
        assert!(fetch_daily_progress(&c, "u1", "speed-maths", 2).unwrap().is_none());

        let read = ProgressPatch {
            notes_read: Some(true),
            ..Default::default()
        };
        upsert_daily_progress(&c, "u1", "speed-maths", 2, &read, t(0)).unwrap();
        let score = ProgressPatch {
            practice_score: Some(90.0),
            ..Default::default()
        };
        upsert_daily_progress(&c, "u1", "speed-maths", 2, &score, t(5)).unwrap();

        let p = fetch_daily_progress(&c, "u1", "speed-maths", 2).unwrap().unwrap();
        assert!(p.notes_read);
        assert_eq!(p.practice_score, Some(90.0));
        assert_eq!(p.compete_score, None);
        assert_eq!(p.created_at, t(0));
        assert_eq!(p.updated_at, t(5));
    }

    #[test]
    fn toggling_twice_restores_state() {
        let c = conn();
        let card = ReviewCard {
            user_id: "u1".to_string(),
            course_id: "speed-maths".to_string(),
            card_id: "sq12".to_string(),
            front: "12²".to_string(),
            back: "144".to_string(),
            created_at: t(0),
        };
        assert!(toggle_review(&c, &card).unwrap());
        assert_eq!(list_reviews(&c, "u1", "speed-maths").unwrap().len(), 1);
        assert!(!toggle_review(&c, &card).unwrap());
        assert!(list_reviews(&c, "u1", "speed-maths").unwrap().is_empty());
        assert!(toggle_review(&c, &card).unwrap());
        assert_eq!(list_reviews(&c, "u1", "speed-maths").unwrap().len(), 1);
    }

    #[test]
    fn profile_round_trip_and_leaderboards() {
        let c = conn();
        let mut p = ensure_profile(&c, "u1", "Asha", t(0)).unwrap();
        ensure_profile(&c, "u2", "Ravi", t(0)).unwrap();
        assert_eq!(p.level, 1);
        assert!(!p.is_premium);

        p.total_xp = 750;
        p.level = 2;
        p.badges = vec![Badge::FirstPass];
        p.streak_days = 3;
        p.last_active_on = Some(t(0).date_naive());
        save_profile_progress(&c, &p).unwrap();

        // Existing profile is not overwritten.
        let again = ensure_profile(&c, "u1", "Someone Else", t(9)).unwrap();
        assert_eq!(again.display_name, "Asha");
        assert_eq!(again.badges, vec![Badge::FirstPass]);
        assert_eq!(again.last_active_on, Some(t(0).date_naive()));

        let xp = fetch_xp_leaderboard(&c, 10).unwrap();
        assert_eq!(xp[0].user_id, "u1");
        assert_eq!(xp[0].rank, 1);
        assert_eq!(xp[1].rank, 2);

        record_attempt(&c, &attempt(None, SessionKind::Arena, true, 80, 0)).unwrap();
        record_attempt(&c, &attempt(None, SessionKind::Arena, true, 60, 1)).unwrap();
        record_attempt(&c, &attempt(None, SessionKind::Arena, false, 10, 2)).unwrap();
        let arena = fetch_arena_leaderboard(&c, "speed-maths", 1, 10).unwrap();
        assert_eq!(arena.len(), 1);
        assert_eq!(arena[0].best_time_seconds, 60);
        assert_eq!(arena[0].display_name, "Asha");
    }

    #[test]
    fn conditional_transition_only_wins_once() {
        let c = conn();
        let id = insert_payment_request(&c, "u1", "123456789012", 199, t(0)).unwrap();
        assert!(transaction_id_exists(&c, "123456789012").unwrap());
        assert!(find_pending_request(&c, "u1").unwrap().is_some());

        assert!(transition_payment(
            &c,
            id,
            PaymentStatus::Pending,
            PaymentStatus::Approved,
            "admin",
            t(1)
        )
        .unwrap());
        assert!(!transition_payment(
            &c,
            id,
            PaymentStatus::Pending,
            PaymentStatus::Rejected,
            "admin2",
            t(2)
        )
        .unwrap());

        let req = get_payment_request(&c, id).unwrap().unwrap();
        assert_eq!(req.status, PaymentStatus::Approved);
        assert_eq!(req.decided_by.as_deref(), Some("admin"));
        assert_eq!(req.decided_at, Some(t(1)));
        assert!(list_payment_requests(&c, Some(PaymentStatus::Pending))
            .unwrap()
            .is_empty());
        assert_eq!(list_payment_requests(&c, None).unwrap().len(), 1);
    }
}
