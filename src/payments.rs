// src/payments.rs

//! Manual UPI upgrade: the learner pays outside the app, submits the UTR,
//! and an admin approves or rejects it. A request leaves `pending` exactly
//! once; every decision is written to the audit table.

use crate::constants::UTR_LENGTH;
use crate::error::{MasteryError, MasteryResult};
use crate::models::{Badge, PaymentAuditEntry, PaymentRequest, PaymentStatus, Profile};
use crate::repository;
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::Connection;

/// A UTR is exactly twelve digits; surrounding whitespace is ignored.
pub fn validate_utr(raw: &str) -> MasteryResult<String> {
    let utr = raw.trim();
    if utr.len() != UTR_LENGTH || !utr.chars().all(|c| c.is_ascii_digit()) {
        return Err(MasteryError::Validation(format!(
            "transaction id must be {} digits",
            UTR_LENGTH
        )));
    }
    Ok(utr.to_string())
}

/// `upi://pay` deep link understood by UPI apps.
pub fn upi_payment_uri(vpa: &str, payee: &str, amount_inr: i64, note: &str) -> String {
    format!(
        "upi://pay?pa={}&pn={}&am={}.00&cu=INR&tn={}",
        urlencoding::encode(vpa),
        urlencoding::encode(payee),
        amount_inr,
        urlencoding::encode(note)
    )
}

pub fn submit_payment(
    conn: &Connection,
    profile: &Profile,
    raw_utr: &str,
    amount_inr: i64,
    now: DateTime<Utc>,
) -> MasteryResult<PaymentRequest> {
    let utr = validate_utr(raw_utr)?;
    if amount_inr <= 0 {
        return Err(MasteryError::Validation(
            "amount must be positive".to_string(),
        ));
    }
    if profile.is_premium {
        return Err(MasteryError::Validation(
            "account is already premium".to_string(),
        ));
    }
    if repository::find_pending_request(conn, &profile.id)?.is_some() {
        return Err(MasteryError::Validation(
            "a payment is already waiting for review".to_string(),
        ));
    }
    if repository::transaction_id_exists(conn, &utr)? {
        return Err(MasteryError::Validation(format!(
            "transaction id {} was already submitted",
            utr
        )));
    }

    let id = repository::insert_payment_request(conn, &profile.id, &utr, amount_inr, now)?;
    info!("Payment request {} submitted by {}", id, profile.id);
    repository::get_payment_request(conn, id)?
        .ok_or_else(|| MasteryError::NotFound(format!("payment request {}", id)))
}

/// Approves or rejects a pending request. Approval grants premium in the
/// same transaction.
pub fn decide_payment(
    conn: &Connection,
    admin: &Profile,
    request_id: i64,
    decision: PaymentStatus,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> MasteryResult<PaymentRequest> {
    if !admin.is_admin {
        warn!("{} tried to decide payment {}", admin.id, request_id);
        return Err(MasteryError::Unauthorized(
            "only admins can review payments".to_string(),
        ));
    }
    if !PaymentStatus::Pending.can_transition_to(decision) {
        return Err(MasteryError::InvalidTransition(format!(
            "cannot move a request to {}",
            decision.as_str()
        )));
    }

    let tx = conn.unchecked_transaction()?;
    let request = repository::get_payment_request(&tx, request_id)?
        .ok_or_else(|| MasteryError::NotFound(format!("payment request {}", request_id)))?;

    if !request.status.can_transition_to(decision)
        || !repository::transition_payment(
            &tx,
            request_id,
            PaymentStatus::Pending,
            decision,
            &admin.id,
            now,
        )?
    {
        return Err(MasteryError::InvalidTransition(format!(
            "payment request {} is already {}",
            request_id,
            request.status.as_str()
        )));
    }

    repository::insert_payment_audit(
        &tx,
        &PaymentAuditEntry {
            request_id,
            actor: admin.id.clone(),
            from_status: PaymentStatus::Pending,
            to_status: decision,
            note: note.map(str::to_string),
            at: now,
        },
    )?;

    if decision == PaymentStatus::Approved {
        repository::set_premium(&tx, &request.user_id, true, now)?;
        if let Some(mut member) = repository::get_profile(&tx, &request.user_id)? {
            if !member.has_badge(Badge::PremiumMember) {
                member.badges.push(Badge::PremiumMember);
                member.badges.sort();
                member.updated_at = now;
                repository::save_profile_progress(&tx, &member)?;
            }
        }
    }
    tx.commit()?;

    info!(
        "Payment request {} {} by {}",
        request_id,
        decision.as_str(),
        admin.id
    );
    repository::get_payment_request(conn, request_id)?
        .ok_or_else(|| MasteryError::NotFound(format!("payment request {}", request_id)))
}
