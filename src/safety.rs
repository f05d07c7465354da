//! The safety evaluator (§4.5): a pure predicate over a `SafetyView`.
//!
//! Deliberately free of I/O and side effects so it can be exhaustively unit
//! tested and so a reader can convince themselves of its correctness by
//! inspection alone.

use crate::sensing::{SafetyView, Tristate};

/// The two actuator permissions derived from one `SafetyView`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyDecision {
    pub unlock_allowed: bool,
    pub motor_allowed: bool,
}

/// Evaluate the safety predicate (§4.5).
///
/// `tote_full = Unknown` is treated as "not allowed" (invariant I5): the
/// evaluator never guesses in the absence of a reading.
pub fn evaluate(view: &SafetyView) -> SafetyDecision {
    let unlock_allowed = view.door_closed
        && view.tote_present
        && view.tote_full == Tristate::No
        && view.mains_ok
        && view.pcb_power_ok;

    SafetyDecision {
        unlock_allowed,
        motor_allowed: unlock_allowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nominal() -> SafetyView {
        SafetyView {
            mains_ok: true,
            pcb_power_ok: true,
            door_closed: true,
            tote_present: true,
            tote_full: Tristate::No,
            flap_open: false,
        }
    }

    #[test]
    fn nominal_state_allows_unlock_and_motor() {
        let d = evaluate(&nominal());
        assert!(d.unlock_allowed);
        assert!(d.motor_allowed);
    }

    #[test]
    fn unknown_fullness_denies_everything() {
        let mut v = nominal();
        v.tote_full = Tristate::Unknown;
        let d = evaluate(&v);
        assert!(!d.unlock_allowed);
        assert!(!d.motor_allowed);
    }

    #[test]
    fn full_tote_denies_everything() {
        let mut v = nominal();
        v.tote_full = Tristate::Yes;
        let d = evaluate(&v);
        assert!(!d.unlock_allowed);
        assert!(!d.motor_allowed);
    }

    #[test]
    fn door_open_denies_everything() {
        let mut v = nominal();
        v.door_closed = false;
        let d = evaluate(&v);
        assert!(!d.unlock_allowed);
        assert!(!d.motor_allowed);
    }

    #[test]
    fn tote_absent_denies_everything() {
        let mut v = nominal();
        v.tote_present = false;
        assert!(!evaluate(&v).motor_allowed);
    }

    #[test]
    fn mains_loss_denies_everything() {
        let mut v = nominal();
        v.mains_ok = false;
        assert!(!evaluate(&v).motor_allowed);
    }

    #[test]
    fn pcb_power_loss_denies_everything() {
        let mut v = nominal();
        v.pcb_power_ok = false;
        assert!(!evaluate(&v).motor_allowed);
    }

    #[test]
    fn motor_allowed_always_matches_unlock_allowed() {
        // Exhaustively check every boolean combination plus every tristate
        // value: motor_allowed must equal unlock_allowed in all cases.
        for mains_ok in [true, false] {
            for pcb_power_ok in [true, false] {
                for door_closed in [true, false] {
                    for tote_present in [true, false] {
                        for tote_full in [Tristate::Yes, Tristate::No, Tristate::Unknown] {
                            let v = SafetyView {
                                mains_ok,
                                pcb_power_ok,
                                door_closed,
                                tote_present,
                                tote_full,
                                flap_open: false,
                            };
                            let d = evaluate(&v);
                            assert_eq!(d.unlock_allowed, d.motor_allowed);
                        }
                    }
                }
            }
        }
    }
}
