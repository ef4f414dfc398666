use std::collections::HashMap;

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// All 24 slots of the window's current target day.
    pub async fn slot_board(
        &self,
        schedule_id: ScheduleId,
        office: OfficeType,
    ) -> Result<Vec<SlotView>, EngineError> {
        let window = self.require_window(schedule_id, office).await?;
        let day = DayKey {
            schedule_id,
            office,
            target_date: window.target_date,
        };
        let taken: HashMap<u8, ActorId> = self
            .store
            .list_bindings(&day)
            .await?
            .into_iter()
            .map(|b| (b.key.slot, b.actor_id))
            .collect();

        Ok(all_slots()
            .map(|slot| {
                let state = match taken.get(&slot) {
                    Some(actor_id) => SlotState::Taken(*actor_id),
                    None if window.is_disabled(slot) => SlotState::Disabled,
                    None => SlotState::Free,
                };
                SlotView { slot, state }
            })
            .collect())
    }

    pub async fn pool_usage(&self, pool: PoolKey) -> Result<PoolUsage, EngineError> {
        let limit = self.require_limit(&pool).await?;
        let arranged = self.store.count_arranged(&pool).await?;
        let pending = self.store.count_pending(&pool).await?;
        Ok(PoolUsage {
            pool,
            limit,
            arranged,
            pending,
        })
    }

    /// Every claim the actor holds in the group, rejected ones included.
    pub async fn claims_of(&self, group_id: GroupId, actor_id: ActorId) -> Result<Vec<Claim>, EngineError> {
        Ok(self.store.claims_for_actor(group_id, actor_id).await?)
    }
}
