// src/unlock.rs

//! Which days, tabs and tasks a learner may open.

use crate::constants::{FREE_DAYS, PASS_THRESHOLD_PERCENT};
use crate::content::TaskSpec;
use crate::error::{MasteryError, MasteryResult};
use crate::models::{DailyProgress, LockReason, TabUnlocks};
use std::collections::HashSet;

/// Days past the free window need premium no matter what was completed before.
pub fn day_lock(day: u32, total_days: u32, is_premium: bool) -> MasteryResult<Option<LockReason>> {
    if day == 0 || day > total_days {
        return Err(MasteryError::NotFound(format!("day {}", day)));
    }
    if day > FREE_DAYS && !is_premium {
        return Ok(Some(LockReason::PremiumRequired));
    }
    Ok(None)
}

pub fn practice_passed(progress: Option<&DailyProgress>) -> bool {
    progress
        .and_then(|p| p.practice_score)
        .map_or(false, |score| score >= PASS_THRESHOLD_PERCENT as f64)
}

/// Study is always open; practice follows the notes; arena follows a
/// passing practice score and premium.
pub fn tab_unlocks(progress: Option<&DailyProgress>, is_premium: bool) -> TabUnlocks {
    let notes_read = progress.map_or(false, |p| p.notes_read);

    let practice = if notes_read {
        None
    } else {
        Some(LockReason::NotesUnread)
    };

    let arena = if !practice_passed(progress) {
        Some(LockReason::PracticeNotPassed)
    } else if !is_premium {
        Some(LockReason::PremiumRequired)
    } else {
        None
    };

    TabUnlocks {
        study: true,
        practice,
        arena,
    }
}

/// Linear order: a task opens once the one before it has a passed attempt.
pub fn task_locks(tasks: &[TaskSpec], completed: &HashSet<String>) -> Vec<Option<LockReason>> {
    tasks
        .iter()
        .enumerate()
        .map(|(idx, _)| {
            if idx == 0 || completed.contains(&tasks[idx - 1].id) {
                None
            } else {
                Some(LockReason::PreviousTaskIncomplete)
            }
        })
        .collect()
}

pub fn day_completed(tasks: &[TaskSpec], completed: &HashSet<String>) -> bool {
    !tasks.is_empty() && tasks.iter().all(|t| completed.contains(&t.id))
}

pub fn gym_lock(is_premium: bool) -> Option<LockReason> {
    if is_premium {
        None
    } else {
        Some(LockReason::PremiumRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::GeneratorKind;
    use chrono::{DateTime, Utc};

    fn progress(notes_read: bool, practice: Option<f64>) -> DailyProgress {
        let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        DailyProgress {
            user_id: "u1".to_string(),
            course_id: "speed-maths".to_string(),
            day: 1,
            notes_read,
            practice_score: practice,
            compete_score: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn tasks() -> Vec<TaskSpec> {
        ["a", "b", "c"]
            .iter()
            .map(|id| TaskSpec {
                id: id.to_string(),
                title: id.to_uppercase(),
                generator: GeneratorKind::TwoDigitAdd,
                target: 10,
            })
            .collect()
    }

    #[test]
    fn free_user_is_locked_out_after_day_three() {
        for day in 1..=3 {
            assert_eq!(day_lock(day, 30, false).unwrap(), None);
        }
        for day in 4..=30 {
            assert_eq!(
                day_lock(day, 30, false).unwrap(),
                Some(LockReason::PremiumRequired)
            );
            assert_eq!(day_lock(day, 30, true).unwrap(), None);
        }
        assert!(day_lock(0, 30, true).is_err());
        assert!(day_lock(31, 30, true).is_err());
    }

    #[test]
    fn tabs_follow_progress() {
        let tabs = tab_unlocks(None, true);
        assert!(tabs.study);
        assert_eq!(tabs.practice, Some(LockReason::NotesUnread));
        assert_eq!(tabs.arena, Some(LockReason::PracticeNotPassed));

        let read = progress(true, Some(79.0));
        let tabs = tab_unlocks(Some(&read), true);
        assert_eq!(tabs.practice, None);
        assert_eq!(tabs.arena, Some(LockReason::PracticeNotPassed));

        let passed = progress(true, Some(80.0));
        assert_eq!(tab_unlocks(Some(&passed), true).arena, None);
        assert_eq!(
            tab_unlocks(Some(&passed), false).arena,
            Some(LockReason::PremiumRequired)
        );
    }

    #[test]
    fn tasks_unlock_in_order() {
        let tasks = tasks();
        let mut done = HashSet::new();
        assert_eq!(
            task_locks(&tasks, &done),
            vec![
                None,
                Some(LockReason::PreviousTaskIncomplete),
                Some(LockReason::PreviousTaskIncomplete)
            ]
        );
        done.insert("a".to_string());
        assert_eq!(task_locks(&tasks, &done)[1], None);
        assert!(!day_completed(&tasks, &done));
        done.insert("b".to_string());
        done.insert("c".to_string());
        assert!(day_completed(&tasks, &done));
        assert!(!day_completed(&[], &done));
    }

    #[test]
    fn gym_needs_premium() {
        assert_eq!(gym_lock(false), Some(LockReason::PremiumRequired));
        assert_eq!(gym_lock(true), None);
    }
}
