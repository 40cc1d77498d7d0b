// src/constants.rs

// --- Course Gating ---
pub const FREE_DAYS: u32 = 3;
pub const PASS_THRESHOLD_PERCENT: u32 = 80;
pub const DEFAULT_COURSE_ID: &str = "speed-maths";

// --- Session Defaults ---
pub const DEFAULT_PRACTICE_TARGET: u32 = 10;
pub const ARENA_TARGET: u32 = 20;
pub const ARENA_PENALTY_SECONDS: i64 = 5;
pub const DEFAULT_SURVIVAL_LIVES: u32 = 3;
pub const DEFAULT_GYM_SECONDS: i64 = 60;
pub const TICK_MILLIS: u64 = 1000;

// --- History ---
pub const RECENT_ATTEMPTS_LIMIT: u32 = 10;
pub const LEADERBOARD_LIMIT: u32 = 20;

// --- Gamification ---
pub const XP_PER_CORRECT: i64 = 10;
pub const XP_PASS_BONUS: i64 = 50;
pub const XP_ARENA_BONUS: i64 = 100;
pub const XP_PER_LEVEL: i64 = 500;
pub const STREAK_BADGE_DAYS: u32 = 7;
pub const PERFECT_RUN_MIN_ASKED: u32 = 10;
pub const LIGHTNING_SECONDS_PER_ANSWER: f64 = 2.0;

// --- Premium Upgrade ---
pub const UTR_LENGTH: usize = 12;
pub const PREMIUM_PRICE_INR: i64 = 199;
pub const DEFAULT_UPI_VPA: &str = "speedmastery@upi";
pub const DEFAULT_UPI_PAYEE: &str = "Speed Mastery";
