//! Communication lifecycle and dispatch decisions.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Where a communication is in its lifecycle.
///
/// `Editing` is the transient state of a form being composed; it is never
/// stored. `Sent` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStatus {
    Editing,
    Draft,
    Scheduled,
    Sent,
}

impl CommunicationStatus {
    /// Derive the status from the stored flags.
    pub fn from_flags(is_draft: bool, sent: bool) -> Self {
        if sent {
            CommunicationStatus::Sent
        } else if is_draft {
            CommunicationStatus::Draft
        } else {
            CommunicationStatus::Scheduled
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommunicationStatus::Editing => "editing",
            CommunicationStatus::Draft => "draft",
            CommunicationStatus::Scheduled => "scheduled",
            CommunicationStatus::Sent => "sent",
        }
    }
}

pub mod state_machine {
    use super::CommunicationStatus::{self, *};

    /// Statuses reachable from `from`.
    ///
    /// A draft re-enters the submission pipeline and may be saved again as
    /// any non-editing status. A scheduled communication only moves forward
    /// when the dispatcher sends it.
    pub fn valid_transitions(from: CommunicationStatus) -> &'static [CommunicationStatus] {
        match from {
            Editing => &[Draft, Scheduled, Sent],
            Draft => &[Draft, Scheduled, Sent],
            Scheduled => &[Sent],
            Sent => &[],
        }
    }

    pub fn can_transition(from: CommunicationStatus, to: CommunicationStatus) -> bool {
        valid_transitions(from).contains(&to)
    }

    /// Validate a transition, returning an error message for invalid ones.
    pub fn validate_transition(
        from: CommunicationStatus,
        to: CommunicationStatus,
    ) -> Result<(), String> {
        if can_transition(from, to) {
            Ok(())
        } else {
            Err(format!(
                "Invalid transition: {} -> {}",
                from.as_str(),
                to.as_str()
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// A communication is due when it has no schedule or the schedule has passed.
pub fn is_due(scheduled_time: Option<Timestamp>, now: Timestamp) -> bool {
    scheduled_time.map_or(true, |at| at <= now)
}

/// What to do with an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPlan {
    SaveDraft,
    Schedule(Timestamp),
    SendNow,
}

impl DispatchPlan {
    /// Decide from the submitted flags. `is_draft` wins over any schedule.
    pub fn decide(is_draft: bool, scheduled_time: Option<Timestamp>, now: Timestamp) -> Self {
        if is_draft {
            return DispatchPlan::SaveDraft;
        }
        match scheduled_time {
            Some(at) if !is_due(Some(at), now) => DispatchPlan::Schedule(at),
            _ => DispatchPlan::SendNow,
        }
    }

    pub fn target_status(self) -> CommunicationStatus {
        match self {
            DispatchPlan::SaveDraft => CommunicationStatus::Draft,
            DispatchPlan::Schedule(_) => CommunicationStatus::Scheduled,
            DispatchPlan::SendNow => CommunicationStatus::Sent,
        }
    }

    /// Name reported to the client as the submission outcome.
    pub fn outcome(self) -> &'static str {
        self.target_status().as_str()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::state_machine::*;
    use super::CommunicationStatus::*;
    use super::*;

    #[test]
    fn sent_is_terminal() {
        assert!(valid_transitions(Sent).is_empty());
        assert!(validate_transition(Sent, Draft).is_err());
    }

    #[test]
    fn drafts_can_be_resaved_or_sent() {
        assert!(can_transition(Draft, Draft));
        assert!(can_transition(Draft, Scheduled));
        assert!(can_transition(Draft, Sent));
        assert!(!can_transition(Scheduled, Draft));
    }

    #[test]
    fn due_when_unscheduled_or_past() {
        let now = Utc::now();
        assert!(is_due(None, now));
        assert!(is_due(Some(now), now));
        assert!(is_due(Some(now - Duration::minutes(1)), now));
        assert!(!is_due(Some(now + Duration::minutes(1)), now));
    }

    #[test]
    fn draft_flag_wins_over_schedule() {
        let now = Utc::now();
        let later = now + Duration::hours(2);
        assert_eq!(DispatchPlan::decide(true, Some(later), now), DispatchPlan::SaveDraft);
        assert_eq!(DispatchPlan::decide(false, Some(later), now), DispatchPlan::Schedule(later));
        assert_eq!(
            DispatchPlan::decide(false, Some(now - Duration::hours(1)), now),
            DispatchPlan::SendNow
        );
        assert_eq!(DispatchPlan::decide(false, None, now).outcome(), "sent");
    }

    #[test]
    fn status_from_flags() {
        assert_eq!(CommunicationStatus::from_flags(true, false), Draft);
        assert_eq!(CommunicationStatus::from_flags(false, false), Scheduled);
        assert_eq!(CommunicationStatus::from_flags(false, true), Sent);
    }
}
