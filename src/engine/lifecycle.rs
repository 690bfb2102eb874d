use metrics::counter;

use super::events::{MatchEvent, MatchEventType, Notifier};
use super::matcher::MatchedPair;
use crate::models::{MatchStatus, PotentialMatch, RequestStatus, SwapKind};
use crate::store::{MatchStore, RequestRef};
use crate::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Created(PotentialMatch),
    /// An open match already links the pair; nothing was written.
    AlreadyLinked(PotentialMatch),
    /// A request changed since the snapshot or the pair was withdrawn; nothing was written.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreferenceRemoval {
    pub remaining: usize,
    pub request_cancelled: bool,
}

/// Persists matches and drives their state machine for one swap kind.
pub struct Lifecycle<'a> {
    kind: SwapKind,
    store: &'a dyn MatchStore,
    notifier: &'a dyn Notifier,
}

impl<'a> Lifecycle<'a> {
    pub fn new(kind: SwapKind, store: &'a dyn MatchStore, notifier: &'a dyn Notifier) -> Self {
        Self { kind, store, notifier }
    }

    /// Idempotent per unordered pair.
    pub async fn record(&self, pair: MatchedPair) -> AppResult<RecordOutcome> {
        if pair.requester_request_id == pair.acceptor_request_id {
            return Err(AppError::BadRequest(format!(
                "Request {} cannot be matched with itself",
                pair.requester_request_id
            )));
        }

        let outcome = self
            .store
            .insert_match_if_absent(pair.requester_request_id, pair.acceptor_request_id)
            .await?;

        match outcome {
            Some((m, true)) => {
                tracing::info!(kind = %self.kind, match_id = m.id, requester = m.requester_request_id, acceptor = m.acceptor_request_id, "Potential match created");
                self.transitioned(MatchStatus::Pending, 1);
                self.notifier
                    .publish(MatchEvent::new(MatchEventType::MatchCreated, self.kind, &m));
                Ok(RecordOutcome::Created(m))
            }
            Some((m, false)) => {
                tracing::debug!(kind = %self.kind, match_id = m.id, "Pair already linked by an open match");
                Ok(RecordOutcome::AlreadyLinked(m))
            }
            None => {
                tracing::debug!(
                    kind = %self.kind,
                    requester = pair.requester_request_id,
                    acceptor = pair.acceptor_request_id,
                    "Pair no longer insertable, skipping"
                );
                Ok(RecordOutcome::Stale)
            }
        }
    }

    /// Accepts a pending match and retires every open match competing for either shift.
    pub async fn accept(&self, match_id: i32, acting_worker_id: i32) -> AppResult<PotentialMatch> {
        let m = self.load_match(match_id).await?;
        self.authorize(&m, acting_worker_id).await?;

        if m.status != MatchStatus::Pending {
            return Err(invalid_state(&m, MatchStatus::Accepted));
        }

        // Both requests are claimed together with the match, so of two
        // accepts competing for one shift exactly one succeeds.
        let Some(retired) = self.store.accept_match(m.id).await? else {
            tracing::warn!(kind = %self.kind, match_id = m.id, worker_id = acting_worker_id, "Match lost to a competing accept");
            return Err(AppError::InvalidState(format!(
                "Match {} can no longer be accepted; one of its requests is already taken",
                m.id
            )));
        };
        self.transitioned(MatchStatus::Accepted, 1);
        self.transitioned(MatchStatus::OtherAccepted, retired as u64);

        tracing::info!(kind = %self.kind, match_id = m.id, worker_id = acting_worker_id, retired, "Match accepted");

        let accepted = PotentialMatch {
            status: MatchStatus::Accepted,
            ..m
        };
        self.notifier
            .publish(MatchEvent::new(MatchEventType::MatchAccepted, self.kind, &accepted));
        Ok(accepted)
    }

    pub async fn finalize(&self, match_id: i32, acting_worker_id: i32) -> AppResult<PotentialMatch> {
        let m = self.load_match(match_id).await?;
        self.authorize(&m, acting_worker_id).await?;

        if m.status != MatchStatus::Accepted {
            return Err(invalid_state(&m, MatchStatus::Completed));
        }

        if !self
            .store
            .update_match_status(m.id, &[MatchStatus::Accepted], MatchStatus::Completed)
            .await?
        {
            return Err(AppError::InvalidState(format!(
                "Match {} is no longer accepted",
                m.id
            )));
        }
        self.transitioned(MatchStatus::Completed, 1);

        for request_id in m.request_ids() {
            self.store
                .update_request_status(
                    request_id,
                    &[RequestStatus::Pending, RequestStatus::Matched],
                    RequestStatus::Completed,
                )
                .await?;
        }

        tracing::info!(kind = %self.kind, match_id = m.id, worker_id = acting_worker_id, "Match completed");

        let completed = PotentialMatch {
            status: MatchStatus::Completed,
            ..m
        };
        self.notifier
            .publish(MatchEvent::new(MatchEventType::MatchCompleted, self.kind, &completed));
        Ok(completed)
    }

    /// Either party backs out of an open match. The pair is never proposed
    /// again; requests of an accepted match return to `pending` so later runs
    /// can pair them with someone else.
    pub async fn withdraw(&self, match_id: i32, acting_worker_id: i32) -> AppResult<PotentialMatch> {
        let m = self.load_match(match_id).await?;
        self.authorize(&m, acting_worker_id).await?;

        if !m.status.is_open() {
            return Err(invalid_state(&m, MatchStatus::Cancelled));
        }

        if !self.store.withdraw_match(m.id, m.status).await? {
            return Err(AppError::InvalidState(format!(
                "Match {} changed while being withdrawn",
                m.id
            )));
        }
        self.transitioned(MatchStatus::Cancelled, 1);

        if m.status == MatchStatus::Accepted {
            for request_id in m.request_ids() {
                self.store
                    .update_request_status(request_id, &[RequestStatus::Matched], RequestStatus::Pending)
                    .await?;
            }
        }

        tracing::info!(kind = %self.kind, match_id = m.id, worker_id = acting_worker_id, "Match withdrawn");

        Ok(PotentialMatch {
            status: MatchStatus::Cancelled,
            ..m
        })
    }

    /// Cancels the request and every open match containing it. Returns the
    /// number of matches cancelled. Cancelling twice is a no-op.
    pub async fn cancel(&self, request_id: i32) -> AppResult<usize> {
        let request = self.load_request(request_id).await?;

        match request.status {
            RequestStatus::Cancelled => return Ok(0),
            RequestStatus::Completed => {
                return Err(AppError::InvalidState(format!(
                    "Request {} is already completed",
                    request_id
                )))
            }
            RequestStatus::Pending | RequestStatus::Matched => {}
        }

        if !self
            .store
            .update_request_status(
                request_id,
                &[RequestStatus::Pending, RequestStatus::Matched],
                RequestStatus::Cancelled,
            )
            .await?
        {
            return Err(AppError::InvalidState(format!(
                "Request {} changed while being cancelled",
                request_id
            )));
        }

        let mut cancelled = 0usize;
        for m in self.store.list_open_matches_for_request(request_id).await? {
            if !self
                .store
                .update_match_status(m.id, &MatchStatus::OPEN, MatchStatus::Cancelled)
                .await?
            {
                continue;
            }
            cancelled += 1;
            self.transitioned(MatchStatus::Cancelled, 1);

            if m.status == MatchStatus::Accepted {
                if let Some(other) = m.counterpart(request_id) {
                    self.store
                        .update_request_status(other, &[RequestStatus::Matched], RequestStatus::Pending)
                        .await?;
                }
            }
        }

        tracing::info!(kind = %self.kind, request_id, cancelled_matches = cancelled, "Swap request cancelled");
        Ok(cancelled)
    }

    /// [`Self::cancel`] on behalf of the request's owner.
    pub async fn cancel_owned(&self, request_id: i32, acting_worker_id: i32) -> AppResult<usize> {
        let request = self.load_request(request_id).await?;
        if request.worker_id != acting_worker_id {
            return Err(AppError::Forbidden(
                "You can only cancel your own requests".to_string(),
            ));
        }
        self.cancel(request_id).await
    }

    /// Deleting the last preference cancels the request.
    pub async fn remove_preference(
        &self,
        request_id: i32,
        preference_id: i32,
        acting_worker_id: i32,
    ) -> AppResult<PreferenceRemoval> {
        let request = self.load_request(request_id).await?;
        if request.worker_id != acting_worker_id {
            return Err(AppError::Forbidden(
                "You can only edit your own requests".to_string(),
            ));
        }

        let remaining = self
            .store
            .delete_preference(request_id, preference_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Preference {} not found on request {}",
                    preference_id, request_id
                ))
            })?;

        let request_cancelled = remaining == 0 && !request.status.is_terminal();
        if request_cancelled {
            tracing::info!(kind = %self.kind, request_id, "Last preference removed, cancelling request");
            self.cancel(request_id).await?;
        }

        Ok(PreferenceRemoval {
            remaining,
            request_cancelled,
        })
    }

    /// The worker's actionable matches; retired and finished ones are hidden.
    pub async fn visible_matches(&self, worker_id: i32) -> AppResult<Vec<PotentialMatch>> {
        let mut matches = self.store.list_matches_for_worker(worker_id).await?;
        matches.retain(|m| m.status.is_open());
        Ok(matches)
    }

    async fn load_match(&self, match_id: i32) -> AppResult<PotentialMatch> {
        self.store
            .find_match(match_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Match {} not found", match_id)))
    }

    async fn load_request(&self, request_id: i32) -> AppResult<RequestRef> {
        self.store
            .find_request(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Request {} not found", request_id)))
    }

    async fn authorize(&self, m: &PotentialMatch, worker_id: i32) -> AppResult<()> {
        for request_id in m.request_ids() {
            if let Some(request) = self.store.find_request(request_id).await? {
                if request.worker_id == worker_id {
                    return Ok(());
                }
            }
        }
        tracing::warn!(kind = %self.kind, match_id = m.id, worker_id, "Worker is not a party to the match");
        Err(AppError::Forbidden(format!(
            "You are not a party to match {}",
            m.id
        )))
    }

    fn transitioned(&self, to: MatchStatus, count: u64) {
        counter!(
            "swap_match_transitions_total",
            "kind" => self.kind.as_str(),
            "to" => to.as_str()
        )
        .increment(count);
    }
}

fn invalid_state(m: &PotentialMatch, to: MatchStatus) -> AppError {
    AppError::InvalidState(format!(
        "Match {} cannot move from {} to {}",
        m.id, m.status, to
    ))
}
