//! # familyboard
//!
//! A self-hosted chore board for households: members claim and complete
//! tasks to earn points, parents and advisors approve work, and a
//! leaderboard ranks everyone from the points ledger.
//!
//! ## Architecture
//!
//! ```text
//!   HTTP handlers (axum)
//!          │
//!          ▼
//!   ┌─────────────┐   role gates   ┌──────────────┐
//!   │  Workflow   │───────────────▶│ Role authority│
//!   │ orchestrator│                └──────────────┘
//!   └──────┬──────┘
//!          │ validated transitions
//!          ▼
//!   ┌─────────────┐  same SQLite tx ┌──────────────┐
//!   │Task registry│────────────────▶│ Points ledger │
//!   └─────────────┘                 └──────┬───────┘
//!                                          │ derived
//!                                          ▼
//!                                   ┌──────────────┐
//!                                   │ Leaderboard  │
//!                                   └──────────────┘
//! ```
//!
//! ## Invariants
//! - A user's total points is always `SUM(delta)` over their ledger rows;
//!   no mutable counter exists.
//! - Task status only moves along the transition table in [`task::machine`];
//!   the status write is a compare-and-swap, so concurrent claims have
//!   exactly one winner.
//! - An approval's status change and point award commit in one transaction.
//!
//! ## Modules
//! - `roles`: role hierarchy and the static permission table
//! - `task`: task entities, state machine, and registry
//! - `ledger`: append-only points ledger
//! - `leaderboard`: derived ranking
//! - `workflow`: orchestrating facade and transition events
//! - `store`: SQLite store and user rows
//! - `api`: axum HTTP surface

pub mod api;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod ledger;
pub mod roles;
pub mod store;
pub mod task;
pub mod workflow;

pub use config::Config;
pub use error::{CoreError, CoreResult};
