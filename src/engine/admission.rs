use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};
use ulid::Ulid;

use crate::model::*;
use crate::observability::{self, outcome_label};

use super::{now_ms, Engine, EngineError};

impl Engine {
    pub async fn set_pool_limits(
        &self,
        group_id: GroupId,
        war_kind: WarKind,
        caller: ActorId,
        limits: PoolLimits,
    ) -> Result<(), EngineError> {
        self.require_group_owner(group_id, caller).await?;
        self.store.save_pool_limits(group_id, war_kind, limits).await?;
        info!(
            "{war_kind} limits for group {group_id}: main {}, substitute {}",
            limits.main, limits.substitute
        );
        self.notify.send(
            group_id,
            &Event::PoolLimitsSet {
                group_id,
                war_kind,
                limits,
            },
        );
        Ok(())
    }

    pub(super) async fn require_limit(&self, pool: &PoolKey) -> Result<u32, EngineError> {
        self.store
            .pool_limits(pool.group_id, pool.war_kind)
            .await?
            .map(|l| l.for_pool(pool))
            .ok_or(EngineError::PoolNotConfigured(*pool))
    }

    /// Sign `actor_id` up for `pool`. Immediate claims are approved and
    /// allocated in the same critical section; others wait for review.
    pub async fn admit(
        &self,
        pool: PoolKey,
        actor_id: ActorId,
        kind: ClaimKind,
    ) -> Result<Claim, EngineError> {
        let result = self.try_admit(pool, actor_id, kind).await;
        metrics::counter!(
            observability::ADMISSIONS_TOTAL,
            "kind" => kind.as_str(),
            "outcome" => outcome_label(&result)
        )
        .increment(1);
        match &result {
            Ok(claim) => {
                info!("actor {actor_id} admitted to {pool} as {:?}", claim.status);
                self.notify.send(pool.group_id, &Event::ClaimSaved(claim.clone()));
            }
            Err(e) => debug!("admission of {actor_id} to {pool} refused: {e}"),
        }
        result
    }

    async fn try_admit(
        &self,
        pool: PoolKey,
        actor_id: ActorId,
        kind: ClaimKind,
    ) -> Result<Claim, EngineError> {
        let limit = self.require_limit(&pool).await?;
        let _guard = self.lock_pool(&pool).await;

        self.check_exclusive(&pool, actor_id, None).await?;
        let arranged = self.store.count_arranged(&pool).await?;
        let pending = self.store.count_pending(&pool).await?;
        if arranged + pending >= limit {
            return Err(EngineError::QuotaExceeded { pool, limit });
        }

        let status = match kind {
            ClaimKind::Immediate => ClaimStatus::Approved,
            ClaimKind::PendingReview => ClaimStatus::Pending,
        };
        let claim = Claim {
            id: Ulid::new(),
            pool,
            actor_id,
            status,
            created_at: now_ms(),
        };
        self.store.save_claim(&claim).await?;
        Ok(claim)
    }

    /// Refuse if the actor holds another live claim in a pool exclusive
    /// with `pool` (same war kind included).
    async fn check_exclusive(
        &self,
        pool: &PoolKey,
        actor_id: ActorId,
        ignore: Option<ClaimId>,
    ) -> Result<(), EngineError> {
        let claims = self.store.claims_for_actor(pool.group_id, actor_id).await?;
        if let Some(existing) = claims.iter().find(|c| {
            Some(c.id) != ignore
                && c.status.is_live()
                && self.exclusive.excludes(c.pool.war_kind, pool.war_kind)
        }) {
            return Err(EngineError::AlreadyClaimed {
                existing: existing.id,
                pool: existing.pool,
            });
        }
        Ok(())
    }

    /// Load a claim and lock its pool, retrying if a move slipped in
    /// between the read and the lock.
    async fn lock_claim(&self, claim_id: ClaimId) -> Result<(Claim, OwnedMutexGuard<()>), EngineError> {
        loop {
            let seen = self.require_claim(claim_id).await?;
            let guard = self.lock_pool(&seen.pool).await;
            let claim = self.require_claim(claim_id).await?;
            if claim.pool == seen.pool {
                return Ok((claim, guard));
            }
        }
    }

    async fn require_claim(&self, claim_id: ClaimId) -> Result<Claim, EngineError> {
        self.store
            .load_claim(claim_id)
            .await?
            .ok_or(EngineError::ClaimNotFound(claim_id))
    }

    /// Approve a pending claim if the pool still has a free seat. The claim
    /// stays pending when it does not.
    pub async fn approve(&self, claim_id: ClaimId, caller: ActorId) -> Result<Claim, EngineError> {
        let result = self.try_approve(claim_id, caller).await;
        self.finish_review("approve", &result);
        result
    }

    async fn try_approve(&self, claim_id: ClaimId, caller: ActorId) -> Result<Claim, EngineError> {
        let (mut claim, _guard) = self.lock_claim(claim_id).await?;
        self.require_group_owner(claim.pool.group_id, caller).await?;
        require_pending(&claim)?;

        let limit = self.require_limit(&claim.pool).await?;
        // The claim's own pending seat is already inside the pending count,
        // so only committed seats bound the approval.
        if self.store.count_arranged(&claim.pool).await? >= limit {
            return Err(EngineError::QuotaExceeded {
                pool: claim.pool,
                limit,
            });
        }
        self.store.update_claim_status(claim_id, ClaimStatus::Approved).await?;
        claim.status = ClaimStatus::Approved;
        Ok(claim)
    }

    pub async fn reject(&self, claim_id: ClaimId, caller: ActorId) -> Result<Claim, EngineError> {
        let result = self.try_reject(claim_id, caller).await;
        self.finish_review("reject", &result);
        result
    }

    async fn try_reject(&self, claim_id: ClaimId, caller: ActorId) -> Result<Claim, EngineError> {
        let (mut claim, _guard) = self.lock_claim(claim_id).await?;
        self.require_group_owner(claim.pool.group_id, caller).await?;
        require_pending(&claim)?;
        self.store.update_claim_status(claim_id, ClaimStatus::Rejected).await?;
        claim.status = ClaimStatus::Rejected;
        Ok(claim)
    }

    fn finish_review(&self, action: &'static str, result: &Result<Claim, EngineError>) {
        metrics::counter!(
            observability::REVIEWS_TOTAL,
            "action" => action,
            "outcome" => outcome_label(result)
        )
        .increment(1);
        match result {
            Ok(claim) => {
                info!("{action} claim {} in {}", claim.id, claim.pool);
                self.notify.send(
                    claim.pool.group_id,
                    &Event::ClaimStatusChanged {
                        id: claim.id,
                        status: claim.status,
                    },
                );
            }
            Err(e) => debug!("{action} refused: {e}"),
        }
    }

    /// Remove a claim and its allocation. Allowed for the group owner and
    /// the claimant.
    pub async fn withdraw(&self, claim_id: ClaimId, caller: ActorId) -> Result<Claim, EngineError> {
        let (claim, _guard) = self.lock_claim(claim_id).await?;
        if caller != claim.actor_id {
            self.require_group_owner(claim.pool.group_id, caller).await?;
        }
        self.store.delete_claim(claim_id).await?;
        info!("claim {claim_id} withdrawn from {}", claim.pool);
        self.notify
            .send(claim.pool.group_id, &Event::ClaimDeleted { id: claim_id });
        Ok(claim)
    }

    /// Move a live claim to another pool of the same group: between main and
    /// substitute of one war kind, or across mutually exclusive kinds.
    pub async fn move_claim(
        &self,
        claim_id: ClaimId,
        caller: ActorId,
        to: PoolKey,
    ) -> Result<Claim, EngineError> {
        let result = self.try_move(claim_id, caller, to).await;
        metrics::counter!(observability::MOVES_TOTAL, "outcome" => outcome_label(&result)).increment(1);
        match &result {
            Ok(claim) => {
                info!("claim {claim_id} moved to {to}");
                self.notify.send(to.group_id, &Event::ClaimSaved(claim.clone()));
            }
            Err(e) => debug!("move of claim {claim_id} refused: {e}"),
        }
        result
    }

    async fn try_move(&self, claim_id: ClaimId, caller: ActorId, to: PoolKey) -> Result<Claim, EngineError> {
        loop {
            let from = self.require_claim(claim_id).await?.pool;
            if from.group_id != to.group_id {
                return Err(EngineError::InvalidMove("pools belong to different groups"));
            }
            if from == to {
                return Err(EngineError::InvalidMove("claim is already in that pool"));
            }
            if !self.exclusive.excludes(from.war_kind, to.war_kind) {
                return Err(EngineError::InvalidMove("war kinds are not mutually exclusive"));
            }
            let limit = self.require_limit(&to).await?;

            // Both pools, always in key order.
            let (first, second) = if from < to { (from, to) } else { (to, from) };
            let _first = self.lock_pool(&first).await;
            let _second = self.lock_pool(&second).await;

            let mut claim = self.require_claim(claim_id).await?;
            if claim.pool != from {
                continue;
            }
            match claim.status {
                ClaimStatus::Approved => self.require_group_owner(to.group_id, caller).await?,
                ClaimStatus::Pending if caller != claim.actor_id => {
                    self.require_group_owner(to.group_id, caller).await?
                }
                ClaimStatus::Pending => {}
                ClaimStatus::Rejected => return Err(EngineError::InvalidMove("claim was rejected")),
            }
            self.check_exclusive(&to, claim.actor_id, Some(claim_id)).await?;

            let mut taken = self.store.count_arranged(&to).await?;
            if claim.status == ClaimStatus::Pending {
                taken += self.store.count_pending(&to).await?;
            }
            if taken >= limit {
                return Err(EngineError::QuotaExceeded { pool: to, limit });
            }

            claim.pool = to;
            self.store.save_claim(&claim).await?;
            return Ok(claim);
        }
    }
}

fn require_pending(claim: &Claim) -> Result<(), EngineError> {
    if claim.status != ClaimStatus::Pending {
        return Err(EngineError::ClaimNotPending {
            id: claim.id,
            status: claim.status,
        });
    }
    Ok(())
}
