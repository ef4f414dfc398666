use tracing::info;

use crate::limits::SLOTS_PER_DAY;
use crate::model::*;

use super::{Engine, EngineError};

/// Opens before it closes, both on one UTC day, for a later day, with real
/// slot numbers.
pub fn validate_window(window: &AvailabilityWindow) -> Result<(), EngineError> {
    if window.open_at >= window.close_at {
        return Err(EngineError::InvalidWindow("window must open before it closes"));
    }
    if day_of(window.open_at) != day_of(window.close_at) {
        return Err(EngineError::InvalidWindow("window must open and close on the same day"));
    }
    if window.target_date <= day_of(window.open_at) {
        return Err(EngineError::InvalidWindow("target date must be after the opening day"));
    }
    if let Some(&slot) = window.disabled_slots.iter().find(|&&s| s >= SLOTS_PER_DAY) {
        return Err(EngineError::InvalidSlot(slot));
    }
    Ok(())
}

pub(super) fn check_slot_index(slot: u8) -> Result<(), EngineError> {
    if slot >= SLOTS_PER_DAY {
        return Err(EngineError::InvalidSlot(slot));
    }
    Ok(())
}

pub(super) fn check_open(window: &AvailabilityWindow, now: Ms) -> Result<(), EngineError> {
    if !window.is_open(now) {
        return Err(EngineError::OutsideWindow {
            now,
            open_at: window.open_at,
            close_at: window.close_at,
        });
    }
    Ok(())
}

pub(super) fn check_enabled(window: &AvailabilityWindow, slot: u8) -> Result<(), EngineError> {
    if window.is_disabled(slot) {
        return Err(EngineError::SlotDisabled(slot));
    }
    Ok(())
}

impl Engine {
    /// Replace the window for one office. Existing bindings are untouched.
    pub async fn configure_window(
        &self,
        schedule_id: ScheduleId,
        office: OfficeType,
        caller: ActorId,
        window: AvailabilityWindow,
    ) -> Result<(), EngineError> {
        self.require_schedule_owner(schedule_id, caller).await?;
        validate_window(&window)?;
        self.store.save_window(schedule_id, office, &window).await?;
        info!(
            "window for {office} on schedule {schedule_id}: [{}, {}) for day {}",
            window.open_at, window.close_at, window.target_date
        );
        self.notify.send(
            schedule_id,
            &Event::WindowConfigured {
                schedule_id,
                office,
                window,
            },
        );
        Ok(())
    }

    pub(super) async fn require_window(
        &self,
        schedule_id: ScheduleId,
        office: OfficeType,
    ) -> Result<AvailabilityWindow, EngineError> {
        self.store
            .load_window(schedule_id, office)
            .await?
            .ok_or(EngineError::WindowNotConfigured { schedule_id, office })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Day = 20_000;

    fn window(open_h: i64, close_h: i64, target: Day) -> AvailabilityWindow {
        AvailabilityWindow {
            open_at: DAY * DAY_MS + open_h * HOUR_MS,
            close_at: DAY * DAY_MS + close_h * HOUR_MS,
            target_date: target,
            disabled_slots: Default::default(),
        }
    }

    #[test]
    fn valid_window_passes() {
        assert!(validate_window(&window(10, 23, DAY + 1)).is_ok());
    }

    #[test]
    fn inverted_or_empty_window_fails() {
        assert!(matches!(validate_window(&window(12, 12, DAY + 1)), Err(EngineError::InvalidWindow(_))));
        assert!(matches!(validate_window(&window(14, 12, DAY + 1)), Err(EngineError::InvalidWindow(_))));
    }

    #[test]
    fn window_crossing_midnight_fails() {
        assert!(matches!(validate_window(&window(20, 25, DAY + 2)), Err(EngineError::InvalidWindow(_))));
    }

    #[test]
    fn target_must_be_after_opening_day() {
        assert!(matches!(validate_window(&window(10, 23, DAY)), Err(EngineError::InvalidWindow(_))));
        assert!(matches!(validate_window(&window(10, 23, DAY - 1)), Err(EngineError::InvalidWindow(_))));
    }

    #[test]
    fn disabled_slot_out_of_range_fails() {
        let mut w = window(10, 23, DAY + 1);
        w.disabled_slots.insert(24);
        assert!(matches!(validate_window(&w), Err(EngineError::InvalidSlot(24))));
    }

    #[test]
    fn open_check_is_half_open() {
        let w = window(10, 23, DAY + 1);
        assert!(check_open(&w, w.open_at).is_ok());
        assert!(check_open(&w, w.close_at - 1).is_ok());
        assert!(matches!(check_open(&w, w.open_at - 1), Err(EngineError::OutsideWindow { .. })));
        assert!(matches!(
            check_open(&w, w.close_at),
            Err(EngineError::OutsideWindow { close_at, .. }) if close_at == w.close_at
        ));
    }
}
