//! Role authority - the single source of truth for role checks.
//!
//! Roles form a strict hierarchy (advisor > parent > member). Every gated
//! action resolves through [`Role::satisfies`] or [`Role::can`]; call sites
//! never compare role strings directly.

use serde::{Deserialize, Serialize};

/// Household role, ordered by authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Advisor,
    Parent,
    Member,
}

/// A capability a role may hold, looked up in the static permission table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    CreateTasks,
    AssignTasks,
    ApproveTasks,
    ManageUsers,
    ViewAllStats,
    DeleteTasks,
    ModifyPoints,
}

/// Fixed per-role capability set. Initialized once, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct RolePermissions {
    pub create_tasks: bool,
    pub assign_tasks: bool,
    pub approve_tasks: bool,
    pub manage_users: bool,
    pub view_all_stats: bool,
    pub delete_tasks: bool,
    pub modify_points: bool,
}

const ADVISOR_PERMISSIONS: RolePermissions = RolePermissions {
    create_tasks: true,
    assign_tasks: true,
    approve_tasks: true,
    manage_users: true,
    view_all_stats: true,
    delete_tasks: true,
    modify_points: true,
};

const PARENT_PERMISSIONS: RolePermissions = RolePermissions {
    create_tasks: true,
    assign_tasks: true,
    approve_tasks: true,
    manage_users: false,
    view_all_stats: true,
    delete_tasks: false,
    modify_points: false,
};

const MEMBER_PERMISSIONS: RolePermissions = RolePermissions {
    create_tasks: false,
    assign_tasks: false,
    approve_tasks: false,
    manage_users: false,
    view_all_stats: false,
    delete_tasks: false,
    modify_points: false,
};

impl Role {
    /// Hierarchy rank: advisor=3, parent=2, member=1.
    pub fn rank(self) -> u8 {
        match self {
            Self::Advisor => 3,
            Self::Parent => 2,
            Self::Member => 1,
        }
    }

    /// True if this role meets or exceeds `required` in the hierarchy.
    pub fn satisfies(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    /// Static permission set for this role.
    pub fn permissions(self) -> &'static RolePermissions {
        match self {
            Self::Advisor => &ADVISOR_PERMISSIONS,
            Self::Parent => &PARENT_PERMISSIONS,
            Self::Member => &MEMBER_PERMISSIONS,
        }
    }

    /// Capability check against the static table.
    pub fn can(self, capability: Capability) -> bool {
        let p = self.permissions();
        match capability {
            Capability::CreateTasks => p.create_tasks,
            Capability::AssignTasks => p.assign_tasks,
            Capability::ApproveTasks => p.approve_tasks,
            Capability::ManageUsers => p.manage_users,
            Capability::ViewAllStats => p.view_all_stats,
            Capability::DeleteTasks => p.delete_tasks,
            Capability::ModifyPoints => p.modify_points,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Advisor => "advisor",
            Self::Parent => "parent",
            Self::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "advisor" => Some(Self::Advisor),
            "parent" => Some(Self::Parent),
            "member" => Some(Self::Member),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_ordering() {
        assert!(Role::Advisor.rank() > Role::Parent.rank());
        assert!(Role::Parent.rank() > Role::Member.rank());
    }

    #[test]
    fn test_satisfies_is_reflexive_and_hierarchical() {
        assert!(Role::Parent.satisfies(Role::Parent));
        assert!(Role::Advisor.satisfies(Role::Member));
        assert!(!Role::Member.satisfies(Role::Parent));
        assert!(!Role::Parent.satisfies(Role::Advisor));
    }

    #[test]
    fn test_member_holds_no_admin_capabilities() {
        for cap in [
            Capability::CreateTasks,
            Capability::AssignTasks,
            Capability::ApproveTasks,
            Capability::ManageUsers,
            Capability::ViewAllStats,
            Capability::DeleteTasks,
            Capability::ModifyPoints,
        ] {
            assert!(!Role::Member.can(cap), "member should not hold {cap:?}");
        }
    }

    #[test]
    fn test_parent_capabilities() {
        assert!(Role::Parent.can(Capability::ApproveTasks));
        assert!(Role::Parent.can(Capability::CreateTasks));
        assert!(!Role::Parent.can(Capability::ManageUsers));
        assert!(!Role::Parent.can(Capability::ModifyPoints));
    }

    #[test]
    fn test_parse_round_trip() {
        for role in [Role::Advisor, Role::Parent, Role::Member] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("admin"), None);
    }
}
