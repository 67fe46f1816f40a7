use crate::model::{adjust_meter, elapsed_hours, Activity, ActivityState, Interaction, PetState};
use chrono::{DateTime, Utc};

pub const TICK_ENERGY_DRAIN: f32 = 2.0;
pub const TICK_ENERGY_RECOVERY: f32 = 5.0;
pub const HUNGER_DECAY: f32 = 5.0;
pub const LONELINESS_DECAY: f32 = 2.0;
pub const HUNGER_AFTER_HOURS: f64 = 1.0;
pub const LONELINESS_AFTER_HOURS: f64 = 0.5;
pub const FORCED_SLEEP_BELOW: f32 = 20.0;
pub const WAKE_AT: f32 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PetEvent {
    Interact {
        kind: Interaction,
        at: DateTime<Utc>,
    },
    /// Periodic decay plus forced transitions.
    Tick { at: DateTime<Utc> },
    /// Only resolves an expired transient state.
    Settle { at: DateTime<Utc> },
}

/// Applies one event to the pet. Every write to `PetState` outside of
/// loading goes through here.
pub fn reduce(mut pet: PetState, event: &PetEvent) -> PetState {
    match *event {
        PetEvent::Interact { kind, at } => {
            let (dh, de) = kind.deltas();
            pet.happiness = adjust_meter(pet.happiness, dh);
            pet.energy = adjust_meter(pet.energy, de);
            pet.last_interaction_at = at;
            if kind == Interaction::Feed {
                pet.last_fed_at = at;
            }

            // Only sleep() may enter or re-enter Sleeping; the rest are
            // swallowed by a sleeping pet after their effects land.
            if kind == Interaction::Sleep || pet.state() != ActivityState::Sleeping {
                pet.activity = Activity::enter(kind.target_state(), at);
            }
        }
        PetEvent::Tick { at } => {
            pet.activity = pet.activity.reanchored(at);
            if pet.state() == ActivityState::Sleeping {
                pet.energy = adjust_meter(pet.energy, TICK_ENERGY_RECOVERY);
            } else {
                pet.energy = adjust_meter(pet.energy, -TICK_ENERGY_DRAIN);
            }

            if elapsed_hours(pet.last_fed_at, at) > HUNGER_AFTER_HOURS {
                pet.happiness = adjust_meter(pet.happiness, -HUNGER_DECAY);
            }
            if elapsed_hours(pet.last_interaction_at, at) > LONELINESS_AFTER_HOURS {
                pet.happiness = adjust_meter(pet.happiness, -LONELINESS_DECAY);
            }

            pet.activity = forced_transition(&pet, at);
        }
        PetEvent::Settle { at } => {
            pet.activity = pet.activity.reanchored(at);
            if pet.activity.expired(at) {
                pet.activity = Activity::idle(at);
            }
        }
    }
    pet
}

fn forced_transition(pet: &PetState, at: DateTime<Utc>) -> Activity {
    let state = pet.state();
    if state == ActivityState::Sleeping {
        if pet.energy >= WAKE_AT {
            return Activity::idle(at);
        }
        return pet.activity;
    }
    if pet.energy < FORCED_SLEEP_BELOW {
        return Activity::enter(ActivityState::Sleeping, at);
    }
    if pet.activity.expired(at) {
        return Activity::idle(at);
    }
    pet.activity
}
