//! The task lifecycle transition table.
//!
//! [`transition`] is a pure lookup from `(status, action)` to the effects a
//! legal transition carries. Authorization gates are described here but
//! enforced by the workflow layer, which owns actor identity and the role
//! authority.

use crate::roles::Role;
use crate::task::{TaskAction, TaskStatus};

/// Who may trigger a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Any authenticated user (member and up).
    AnyMember,
    /// The task's assignee, or anyone at parent rank or above.
    AssigneeOrParent,
    /// Parent rank or above.
    ParentUp,
    /// Advisor only.
    AdvisorOnly,
}

impl Gate {
    /// Check the gate for an actor. `is_assignee` is only consulted by
    /// [`Gate::AssigneeOrParent`].
    pub fn permits(self, role: Role, is_assignee: bool) -> bool {
        match self {
            Self::AnyMember => role.satisfies(Role::Member),
            Self::AssigneeOrParent => is_assignee || role.satisfies(Role::Parent),
            Self::ParentUp => role.satisfies(Role::Parent),
            Self::AdvisorOnly => role.satisfies(Role::Advisor),
        }
    }
}

/// Effect of a transition on the task's assignee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssigneeEffect {
    Keep,
    /// Claim: the acting user becomes the assignee.
    SetActor,
    /// Reassign: the assignee is cleared.
    Clear,
}

/// Effect of a transition on the points ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointsEffect {
    None,
    /// Approve: award the task's point value to the assignee.
    AwardAssignee,
}

/// A legal transition and everything applying it entails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionSpec {
    pub to: TaskStatus,
    pub gate: Gate,
    pub assignee: AssigneeEffect,
    pub points: PointsEffect,
}

/// Look up `(status, action)` in the transition table. `None` means the
/// pair is undefined and the request must fail with an invalid-transition
/// error, whoever the actor is.
pub fn transition(from: TaskStatus, action: TaskAction) -> Option<TransitionSpec> {
    use TaskAction as A;
    use TaskStatus as S;

    let spec = match (from, action) {
        (S::Pending, A::Claim) => TransitionSpec {
            to: S::Claimed,
            gate: Gate::AnyMember,
            assignee: AssigneeEffect::SetActor,
            points: PointsEffect::None,
        },
        (S::Claimed, A::Start) => TransitionSpec {
            to: S::InProgress,
            gate: Gate::AssigneeOrParent,
            assignee: AssigneeEffect::Keep,
            points: PointsEffect::None,
        },
        (S::InProgress, A::Submit) => TransitionSpec {
            to: S::Completed,
            gate: Gate::AssigneeOrParent,
            assignee: AssigneeEffect::Keep,
            points: PointsEffect::None,
        },
        (S::Completed, A::Approve) => TransitionSpec {
            to: S::Approved,
            gate: Gate::ParentUp,
            assignee: AssigneeEffect::Keep,
            points: PointsEffect::AwardAssignee,
        },
        (S::Completed, A::Reject) => TransitionSpec {
            to: S::InProgress,
            gate: Gate::ParentUp,
            assignee: AssigneeEffect::Keep,
            points: PointsEffect::None,
        },
        (S::Claimed | S::InProgress, A::Reassign) => TransitionSpec {
            to: S::Pending,
            gate: Gate::ParentUp,
            assignee: AssigneeEffect::Clear,
            points: PointsEffect::None,
        },
        (S::Pending | S::Claimed, A::Cancel) => TransitionSpec {
            to: S::Cancelled,
            gate: Gate::AdvisorOnly,
            assignee: AssigneeEffect::Clear,
            points: PointsEffect::None,
        },
        _ => return None,
    };
    Some(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::Claimed,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Approved,
        TaskStatus::Cancelled,
    ];

    const ALL_ACTIONS: [TaskAction; 7] = [
        TaskAction::Claim,
        TaskAction::Start,
        TaskAction::Submit,
        TaskAction::Approve,
        TaskAction::Reject,
        TaskAction::Reassign,
        TaskAction::Cancel,
    ];

    fn defined_pairs() -> Vec<(TaskStatus, TaskAction)> {
        vec![
            (TaskStatus::Pending, TaskAction::Claim),
            (TaskStatus::Claimed, TaskAction::Start),
            (TaskStatus::InProgress, TaskAction::Submit),
            (TaskStatus::Completed, TaskAction::Approve),
            (TaskStatus::Completed, TaskAction::Reject),
            (TaskStatus::Claimed, TaskAction::Reassign),
            (TaskStatus::InProgress, TaskAction::Reassign),
            (TaskStatus::Pending, TaskAction::Cancel),
            (TaskStatus::Claimed, TaskAction::Cancel),
        ]
    }

    #[test]
    fn test_transition_table_is_exhaustive() {
        let defined = defined_pairs();
        for status in ALL_STATUSES {
            for action in ALL_ACTIONS {
                let expect = defined.contains(&(status, action));
                assert_eq!(
                    transition(status, action).is_some(),
                    expect,
                    "({status:?}, {action:?})"
                );
            }
        }
    }

    #[test]
    fn test_terminal_states_admit_no_actions() {
        for status in [TaskStatus::Approved, TaskStatus::Cancelled] {
            for action in ALL_ACTIONS {
                assert!(transition(status, action).is_none());
            }
        }
    }

    #[test]
    fn test_approve_awards_points_and_nothing_else_does() {
        for (status, action) in defined_pairs() {
            let spec = transition(status, action).unwrap();
            if action == TaskAction::Approve {
                assert_eq!(spec.points, PointsEffect::AwardAssignee);
            } else {
                assert_eq!(spec.points, PointsEffect::None);
            }
        }
    }

    #[test]
    fn test_reassign_and_cancel_clear_assignee() {
        let reassign = transition(TaskStatus::InProgress, TaskAction::Reassign).unwrap();
        assert_eq!(reassign.to, TaskStatus::Pending);
        assert_eq!(reassign.assignee, AssigneeEffect::Clear);

        let cancel = transition(TaskStatus::Claimed, TaskAction::Cancel).unwrap();
        assert_eq!(cancel.to, TaskStatus::Cancelled);
        assert_eq!(cancel.assignee, AssigneeEffect::Clear);
    }

    #[test]
    fn test_reject_returns_to_in_progress() {
        let spec = transition(TaskStatus::Completed, TaskAction::Reject).unwrap();
        assert_eq!(spec.to, TaskStatus::InProgress);
        assert_eq!(spec.gate, Gate::ParentUp);
    }

    #[test]
    fn test_gates() {
        assert!(Gate::AnyMember.permits(Role::Member, false));
        assert!(Gate::AssigneeOrParent.permits(Role::Member, true));
        assert!(!Gate::AssigneeOrParent.permits(Role::Member, false));
        assert!(Gate::AssigneeOrParent.permits(Role::Parent, false));
        assert!(!Gate::ParentUp.permits(Role::Member, true));
        assert!(Gate::ParentUp.permits(Role::Advisor, false));
        assert!(!Gate::AdvisorOnly.permits(Role::Parent, false));
        assert!(Gate::AdvisorOnly.permits(Role::Advisor, false));
    }
}
