use tracing::{debug, info};

use crate::model::*;
use crate::observability::{self, outcome_label};

use super::window::{check_enabled, check_open, check_slot_index};
use super::{now_ms, Engine, EngineError};

impl Engine {
    pub async fn reserve(
        &self,
        schedule_id: ScheduleId,
        office: OfficeType,
        actor_id: ActorId,
        slot: u8,
    ) -> Result<SlotBinding, EngineError> {
        self.reserve_at(schedule_id, office, actor_id, slot, now_ms()).await
    }

    /// Bind `actor_id` to `slot` on the window's target day, as of `now`.
    pub async fn reserve_at(
        &self,
        schedule_id: ScheduleId,
        office: OfficeType,
        actor_id: ActorId,
        slot: u8,
        now: Ms,
    ) -> Result<SlotBinding, EngineError> {
        let result = self.try_reserve(schedule_id, office, actor_id, slot, now).await;
        metrics::counter!(observability::RESERVATIONS_TOTAL, "outcome" => outcome_label(&result))
            .increment(1);
        match &result {
            Ok(binding) => {
                info!("actor {actor_id} reserved {office} slot {slot} for day {}", binding.key.target_date);
                self.notify.send(schedule_id, &Event::BindingCreated(binding.clone()));
            }
            Err(e) => debug!("reserve of {office} slot {slot} by {actor_id} refused: {e}"),
        }
        result
    }

    async fn try_reserve(
        &self,
        schedule_id: ScheduleId,
        office: OfficeType,
        actor_id: ActorId,
        slot: u8,
        now: Ms,
    ) -> Result<SlotBinding, EngineError> {
        check_slot_index(slot)?;
        if !self.store.is_member(schedule_id, actor_id).await? {
            return Err(EngineError::NotEligible { actor_id, schedule_id });
        }
        let window = self.require_window(schedule_id, office).await?;
        check_open(&window, now)?;
        check_enabled(&window, slot)?;

        let day = DayKey {
            schedule_id,
            office,
            target_date: window.target_date,
        };
        let key = day.slot(slot);

        {
            let _read = self.read_slot(&key).await;
            if let Some(held) = self.store.find_binding(&day, actor_id).await? {
                return Err(EngineError::AlreadyReserved { slot: held.key.slot });
            }
            if self.store.load_binding(&key).await?.is_some() {
                return Err(EngineError::SlotTaken(slot));
            }
        }

        let _write = self.write_slot(&key).await;
        if self.store.load_binding(&key).await?.is_some() {
            return Err(EngineError::SlotTaken(slot));
        }
        let binding = SlotBinding {
            key,
            actor_id,
            created_at: now,
        };
        // The store re-checks the per-actor constraint; a racing reserve
        // for another slot by the same actor loses there.
        self.store.save_binding(&binding).await?;
        Ok(binding)
    }

    /// Drop the actor's binding for the window's current target day. The
    /// schedule owner may release anyone; other callers only themselves.
    pub async fn release(
        &self,
        schedule_id: ScheduleId,
        office: OfficeType,
        caller: ActorId,
        actor_id: ActorId,
    ) -> Result<Option<SlotBinding>, EngineError> {
        let result = self.try_release(schedule_id, office, caller, actor_id).await;
        metrics::counter!(observability::RELEASES_TOTAL, "outcome" => outcome_label(&result)).increment(1);
        if let Ok(Some(binding)) = &result {
            info!("released {office} slot {} held by {actor_id}", binding.key.slot);
            self.notify
                .send(schedule_id, &Event::BindingDeleted { key: binding.key });
        }
        result
    }

    async fn try_release(
        &self,
        schedule_id: ScheduleId,
        office: OfficeType,
        caller: ActorId,
        actor_id: ActorId,
    ) -> Result<Option<SlotBinding>, EngineError> {
        if caller != actor_id {
            self.require_schedule_owner(schedule_id, caller).await?;
        }
        let window = self.require_window(schedule_id, office).await?;
        let day = DayKey {
            schedule_id,
            office,
            target_date: window.target_date,
        };
        let Some(held) = self.store.find_binding(&day, actor_id).await? else {
            return Ok(None);
        };
        let _write = self.write_slot(&held.key).await;
        // Only delete if the slot still belongs to this actor.
        if self.store.load_binding(&held.key).await? != Some(actor_id) {
            return Ok(None);
        }
        Ok(self.store.delete_binding(&held.key).await?)
    }
}
