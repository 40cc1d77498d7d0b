// src/main.rs

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use chrono::Utc;
use mastery_lib::config::AppConfig;
use mastery_lib::constants::TICK_MILLIS;
use mastery_lib::content::{Course, DayContent};
use mastery_lib::database;
use mastery_lib::error::{MasteryError, MasteryResult};
use mastery_lib::generators::GeneratorKind;
use mastery_lib::models::{
    ActiveSession, AnswerFeedback, AppState, AttemptRecord, DayCard, DayStatus, Leaderboards,
    PaymentAuditEntry, PaymentRequest, Profile, ReviewCard, SessionReport, SessionView,
};
use mastery_lib::pedagogy::{self, GymConfig};
use mastery_lib::projection::{ProfileProjection, Reconciled};
use mastery_lib::session::{AnswerOutcome, SessionPhase};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rusqlite::Connection;
use std::fs;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tauri::{AppHandle, Emitter, Manager, State};

use log::{debug, error, info, warn};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn viewer(state: &AppState) -> Option<String> {
    lock(&state.viewer).clone()
}

// --- Viewer ---

#[tauri::command]
fn sign_in(state: State<AppState>, user_id: String, display_name: String) -> MasteryResult<Profile> {
    let profile = {
        let conn = lock(&state.db);
        pedagogy::sign_in(&conn, &state.config, &user_id, &display_name, Utc::now())?
    };
    *lock(&state.viewer) = Some(profile.id.clone());
    *lock(&state.projection) = Some(ProfileProjection::new(profile.clone()));
    Ok(profile)
}

#[tauri::command]
fn sign_out(state: State<AppState>) {
    *lock(&state.viewer) = None;
    *lock(&state.active) = None;
    *lock(&state.projection) = None;
    info!("Signed out");
}

#[tauri::command]
fn current_profile(state: State<AppState>) -> Option<Profile> {
    lock(&state.projection).as_ref().map(|p| p.profile().clone())
}

#[tauri::command]
fn sync_profile(state: State<AppState>) -> MasteryResult<Option<Reconciled>> {
    let conn = lock(&state.db);
    let mut projection = lock(&state.projection);
    match projection.as_mut() {
        Some(p) => Ok(Some(pedagogy::sync_projection(&conn, p)?)),
        None => Ok(None),
    }
}

// --- Course ---

#[tauri::command]
fn course_overview(state: State<AppState>) -> MasteryResult<Vec<DayCard>> {
    let viewer = viewer(&state);
    let conn = lock(&state.db);
    pedagogy::course_overview(&conn, &state.course, viewer.as_deref())
}

#[tauri::command]
fn day_status(state: State<AppState>, day: u32) -> MasteryResult<DayStatus> {
    let viewer = viewer(&state);
    let conn = lock(&state.db);
    pedagogy::day_status(&conn, &state.course, day, viewer.as_deref())
}

/// Study tab content. Locked days are refused like `day_status`.
#[tauri::command]
fn day_content(state: State<AppState>, day: u32) -> MasteryResult<DayContent> {
    let viewer = viewer(&state);
    let conn = lock(&state.db);
    pedagogy::day_status(&conn, &state.course, day, viewer.as_deref())?;
    Ok(state.course.day_or_err(day)?.clone())
}

#[tauri::command]
fn mark_notes_read(state: State<AppState>, day: u32) -> MasteryResult<()> {
    let viewer = viewer(&state);
    let conn = lock(&state.db);
    pedagogy::mark_notes_read(&conn, &state.course, day, viewer.as_deref(), Utc::now())
}

// --- Sessions ---

fn begin(state: &AppState, mut active: ActiveSession) -> SessionView {
    let mut slot = lock(&state.active);
    let now = Utc::now();
    active.session.start(now);
    let view = active.session.snapshot(now);
    if slot.is_some() {
        warn!("Replacing a session that was never finished");
    }
    *slot = Some(active);
    view
}

#[tauri::command]
fn start_task(state: State<AppState>, day: u32, task_id: String) -> MasteryResult<SessionView> {
    let viewer = viewer(&state);
    let (session, context) = {
        let conn = lock(&state.db);
        pedagogy::start_task_session(
            &conn,
            &state.course,
            day,
            &task_id,
            viewer.as_deref(),
            StdRng::from_entropy(),
        )?
    };
    Ok(begin(&state, ActiveSession { session, context }))
}

#[tauri::command]
fn start_arena(state: State<AppState>, day: u32) -> MasteryResult<SessionView> {
    let viewer = viewer(&state);
    let (session, context) = {
        let conn = lock(&state.db);
        pedagogy::start_arena_session(
            &conn,
            &state.course,
            day,
            viewer.as_deref(),
            StdRng::from_entropy(),
        )?
    };
    Ok(begin(&state, ActiveSession { session, context }))
}

#[tauri::command]
fn gym_generators(state: State<AppState>) -> Vec<GeneratorKind> {
    state.course.generator_catalogue()
}

#[tauri::command]
fn start_gym(state: State<AppState>, config: GymConfig) -> MasteryResult<SessionView> {
    let viewer = viewer(&state);
    let (session, context) = {
        let conn = lock(&state.db);
        pedagogy::start_gym_session(
            &conn,
            &state.course,
            &config,
            viewer.as_deref(),
            StdRng::from_entropy(),
        )?
    };
    Ok(begin(&state, ActiveSession { session, context }))
}

fn answer_with<F>(state: &AppState, f: F) -> MasteryResult<AnswerFeedback>
where
    F: FnOnce(&mut ActiveSession) -> AnswerOutcome,
{
    let mut slot = lock(&state.active);
    let active = slot
        .as_mut()
        .ok_or_else(|| MasteryError::NotFound("no active session".to_string()))?;
    let outcome = f(active);
    Ok(AnswerFeedback {
        outcome,
        view: active.session.snapshot(Utc::now()),
    })
}

#[tauri::command]
fn type_answer(state: State<AppState>, text: String) -> MasteryResult<AnswerFeedback> {
    answer_with(&state, |a| a.session.type_input(&text, Utc::now()))
}

#[tauri::command]
fn submit_answer(state: State<AppState>, answer: i64) -> MasteryResult<AnswerFeedback> {
    answer_with(&state, |a| a.session.submit(answer, Utc::now()))
}

#[tauri::command]
fn session_view(state: State<AppState>) -> Option<SessionView> {
    lock(&state.active)
        .as_ref()
        .map(|a| a.session.snapshot(Utc::now()))
}

#[tauri::command]
fn tick_session(state: State<AppState>) -> Option<SessionView> {
    let mut slot = lock(&state.active);
    let active = slot.as_mut()?;
    let now = Utc::now();
    active.session.tick(now);
    Some(active.session.snapshot(now))
}

#[tauri::command]
fn stop_session(state: State<AppState>) -> MasteryResult<SessionReport> {
    if let Some(active) = lock(&state.active).as_mut() {
        active.session.stop(Utc::now());
    }
    finish_session(state)
}

/// Stores a finished session and folds the result into the local profile.
#[tauri::command]
fn finish_session(state: State<AppState>) -> MasteryResult<SessionReport> {
    let viewer = viewer(&state);
    let active = {
        let mut slot = lock(&state.active);
        match slot.as_ref().map(|a| a.session.is_finished()) {
            Some(true) => slot.take(),
            Some(false) => {
                return Err(MasteryError::Validation(
                    "session is still running".to_string(),
                ))
            }
            None => None,
        }
    }
    .ok_or_else(|| MasteryError::NotFound("no active session".to_string()))?;

    let now = Utc::now();
    // Same lock order as `sync_profile`: db, then projection.
    let conn = lock(&state.db);
    let report = pedagogy::finish_session(
        &conn,
        viewer.as_deref(),
        &active.context,
        &active.session,
        now,
    )?;

    if let Some(projection) = lock(&state.projection).as_mut() {
        match (&report.save_error, &report.profile) {
            (None, Some(saved)) => {
                projection.reconcile(saved.clone());
                if projection.needs_push() {
                    if let Err(e) = pedagogy::sync_projection(&conn, projection) {
                        warn!("Still holding {} XP locally: {}", projection.pending_xp(), e);
                    }
                }
            }
            (Some(_), _) => {
                let (xp, _) = projection.apply_session(&report.summary, active.context.kind, now);
                warn!("Kept {} XP locally until the next sync", xp);
            }
            _ => {}
        }
    }
    Ok(report)
}

// --- History & Review ---

#[tauri::command]
fn recent_attempts(
    state: State<AppState>,
    day: u32,
    task_id: Option<String>,
) -> MasteryResult<Vec<AttemptRecord>> {
    let viewer = viewer(&state);
    let conn = lock(&state.db);
    pedagogy::recent_attempts(
        &conn,
        &state.course,
        day,
        task_id.as_deref(),
        viewer.as_deref(),
    )
}

#[tauri::command]
fn toggle_bookmark(state: State<AppState>, day: u32, card_id: String) -> MasteryResult<bool> {
    let viewer = viewer(&state);
    let conn = lock(&state.db);
    pedagogy::toggle_bookmark(
        &conn,
        &state.course,
        day,
        &card_id,
        viewer.as_deref(),
        Utc::now(),
    )
}

#[tauri::command]
fn bookmarks(state: State<AppState>) -> MasteryResult<Vec<ReviewCard>> {
    let viewer = viewer(&state);
    let conn = lock(&state.db);
    pedagogy::bookmarks(&conn, &state.course, viewer.as_deref())
}

#[tauri::command]
fn leaderboards(state: State<AppState>, day: u32) -> MasteryResult<Leaderboards> {
    let conn = lock(&state.db);
    pedagogy::leaderboards(&conn, &state.course, day)
}

// --- Premium ---

#[tauri::command]
fn payment_link(state: State<AppState>) -> String {
    let viewer = viewer(&state);
    pedagogy::payment_link(&state.config, viewer.as_deref())
}

#[tauri::command]
fn open_payment_link(state: State<AppState>) -> Result<(), String> {
    let viewer = viewer(&state);
    let link = pedagogy::payment_link(&state.config, viewer.as_deref());
    debug!("Opening payment link {}", link);
    webbrowser::open(&link).map_err(|e| e.to_string())
}

#[tauri::command]
fn submit_payment(state: State<AppState>, transaction_id: String) -> MasteryResult<PaymentRequest> {
    let viewer = viewer(&state);
    let conn = lock(&state.db);
    pedagogy::submit_payment(
        &conn,
        &state.config,
        viewer.as_deref(),
        &transaction_id,
        Utc::now(),
    )
}

#[tauri::command]
fn my_payments(state: State<AppState>) -> MasteryResult<Vec<PaymentRequest>> {
    let viewer = viewer(&state);
    let conn = lock(&state.db);
    pedagogy::my_payments(&conn, viewer.as_deref())
}

#[tauri::command]
fn pending_payments(state: State<AppState>) -> MasteryResult<Vec<PaymentRequest>> {
    let viewer = viewer(&state);
    let conn = lock(&state.db);
    pedagogy::pending_payments(&conn, viewer.as_deref())
}

#[tauri::command]
fn payment_audit(
    state: State<AppState>,
    request_id: i64,
) -> MasteryResult<Vec<PaymentAuditEntry>> {
    let viewer = viewer(&state);
    let conn = lock(&state.db);
    pedagogy::payment_audit(&conn, viewer.as_deref(), request_id)
}

#[tauri::command]
fn approve_payment(
    state: State<AppState>,
    request_id: i64,
    note: Option<String>,
) -> MasteryResult<PaymentRequest> {
    let viewer = viewer(&state);
    let conn = lock(&state.db);
    pedagogy::approve_payment(
        &conn,
        viewer.as_deref(),
        request_id,
        note.as_deref(),
        Utc::now(),
    )
}

#[tauri::command]
fn reject_payment(
    state: State<AppState>,
    request_id: i64,
    note: Option<String>,
) -> MasteryResult<PaymentRequest> {
    let viewer = viewer(&state);
    let conn = lock(&state.db);
    pedagogy::reject_payment(
        &conn,
        viewer.as_deref(),
        request_id,
        note.as_deref(),
        Utc::now(),
    )
}

#[tauri::command]
fn open_external_url(url: String) -> Result<(), String> {
    webbrowser::open(&url).map_err(|e| e.to_string())
}

/// Drives countdown expiry and pushes the running view to the window.
fn spawn_ticker(handle: AppHandle) {
    thread::spawn(move || loop {
        thread::sleep(Duration::from_millis(TICK_MILLIS));
        let state = handle.state::<AppState>();
        let view = {
            let mut slot = lock(&state.active);
            let Some(active) = slot.as_mut() else {
                continue;
            };
            if active.session.is_finished() {
                continue;
            }
            let now = Utc::now();
            let phase = active.session.tick(now);
            if let SessionPhase::Finished(reason) = phase {
                info!("Session ended on the clock: {:?}", reason);
            }
            active.session.snapshot(now)
        };
        if let Err(e) = handle.emit("session-tick", &view) {
            error!("Failed to emit tick: {}", e);
        }
    });
}

fn main() {
    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let app_handle = app.handle();
            let app_data_dir = app_handle
                .path()
                .app_data_dir()
                .expect("failed to get app data dir");

            if !app_data_dir.exists() {
                fs::create_dir_all(&app_data_dir).expect("failed to create app data dir");
            }

            let config = AppConfig::load(&app_data_dir).expect("Failed to load config");
            env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or(config.log_filter.as_str()),
            )
            .init();
            info!("Starting Speed Mastery...");
            info!("Database path: {:?}", config.database_path);

            let conn = Connection::open(&config.database_path).expect("Failed to open DB");
            database::init_db(&conn).expect("Failed to init DB");

            let course = Course::bundled().expect("Failed to load course content");
            if course.id != config.course_id {
                warn!(
                    "Configured course '{}' is not bundled; using '{}'",
                    config.course_id, course.id
                );
            }
            info!("Loaded '{}' with {} days", course.title, course.total_days());

            app.manage(AppState::new(conn, course, config));
            spawn_ticker(app_handle.clone());
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            sign_in,
            sign_out,
            current_profile,
            sync_profile,
            course_overview,
            day_status,
            day_content,
            mark_notes_read,
            start_task,
            start_arena,
            gym_generators,
            start_gym,
            type_answer,
            submit_answer,
            session_view,
            tick_session,
            stop_session,
            finish_session,
            recent_attempts,
            toggle_bookmark,
            bookmarks,
            leaderboards,
            payment_link,
            open_payment_link,
            submit_payment,
            my_payments,
            pending_payments,
            payment_audit,
            approve_payment,
            reject_payment,
            open_external_url
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
