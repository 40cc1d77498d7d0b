// src/projection.rs

//! Local copy of the signed-in profile. Session rewards land here first so
//! the learner sees them at once; the copy is then reconciled against the
//! store, last write wins on `updated_at`. Rewards the store has not seen
//! yet are kept as a pending delta and replayed on top of newer remote rows.

use crate::models::{Badge, Profile, SessionKind};
use crate::scoring::{self, SessionSummary};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reconciled {
    InSync,
    TookRemote,
    /// Local changes are newer and still have to be written back.
    KeptLocal,
    /// Remote was newer; unsaved local rewards were replayed on top of it.
    Rebased,
}

/// Rewards applied locally since the last successful push.
#[derive(Debug, Clone, Default, PartialEq)]
struct PendingDelta {
    xp: i64,
    badges: Vec<Badge>,
}

#[derive(Debug, Clone)]
pub struct ProfileProjection {
    local: Profile,
    pending: Option<PendingDelta>,
}

impl ProfileProjection {
    pub fn new(remote: Profile) -> Self {
        ProfileProjection {
            local: remote,
            pending: None,
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.local
    }

    pub fn needs_push(&self) -> bool {
        self.pending.is_some()
    }

    /// XP the store has not seen yet.
    pub fn pending_xp(&self) -> i64 {
        self.pending.as_ref().map_or(0, |p| p.xp)
    }

    pub fn mark_pushed(&mut self) {
        self.pending = None;
    }

    /// Optimistically applies a finished session's rewards.
    pub fn apply_session(
        &mut self,
        summary: &SessionSummary,
        kind: SessionKind,
        now: DateTime<Utc>,
    ) -> (i64, Vec<Badge>) {
        let (xp, badges) = scoring::apply_session(&mut self.local, summary, kind, now);
        let pending = self.pending.get_or_insert_with(PendingDelta::default);
        pending.xp += xp;
        pending.badges.extend(badges.iter().copied());
        (xp, badges)
    }

    /// Premium and admin flags are owned by the store and always taken from
    /// `remote`; the rest follows last-write-wins, except that a pending
    /// delta survives a newer remote row.
    pub fn reconcile(&mut self, remote: Profile) -> Reconciled {
        let outcome = match self.pending.take() {
            None => {
                let same = remote == self.local;
                self.local = remote;
                if same {
                    Reconciled::InSync
                } else {
                    Reconciled::TookRemote
                }
            }
            Some(_) if remote == self.local => Reconciled::InSync,
            Some(delta) if remote.updated_at > self.local.updated_at => {
                self.rebase(remote, &delta);
                self.pending = Some(delta);
                Reconciled::Rebased
            }
            Some(delta) => {
                self.take_store_flags(&remote);
                self.pending = Some(delta);
                Reconciled::KeptLocal
            }
        };
        debug!("[Projection] {} reconciled: {:?}", self.local.id, outcome);
        outcome
    }

    fn rebase(&mut self, remote: Profile, delta: &PendingDelta) {
        let stale = std::mem::replace(&mut self.local, remote);
        self.local.total_xp += delta.xp;
        self.local.level = scoring::level_for(self.local.total_xp);
        for badge in &delta.badges {
            if !self.local.has_badge(*badge) {
                self.local.badges.push(*badge);
            }
        }
        self.local.badges.sort();
        if stale.last_active_on > self.local.last_active_on {
            self.local.last_active_on = stale.last_active_on;
            self.local.streak_days = stale.streak_days;
        }
    }

    fn take_store_flags(&mut self, remote: &Profile) {
        self.local.is_premium = remote.is_premium;
        self.local.is_admin = remote.is_admin;
        if remote.is_premium && !self.local.has_badge(Badge::PremiumMember) {
            self.local.badges.push(Badge::PremiumMember);
            self.local.badges.sort();
        }
    }
}
