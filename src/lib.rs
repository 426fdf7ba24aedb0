//! # gitscope
//!
//! Repository snapshot extraction and policy filtering.
//!
//! gitscope resolves a revision of a git repository, walks its file tree,
//! classifies every file by language and configuration role, and filters the
//! configuration files through Rego policies chosen per rule.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐
//! │   vcs    │──▶│  walker  │──▶│ snapshot  │──┐
//! │ git/mem  │   │ +language│   │ +policy   │  │
//! └──────────┘   └──────────┘   └───────────┘  │
//!                                              ▼
//!                 ┌──────────┐   ┌───────────────────┐
//!                 │  export  │◀──│      filter       │
//!                 │  (JSON)  │   │ normalize+evaluate│
//!                 └──────────┘   └───────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and rule files |
//! | [`error`] | Library error type |
//! | [`models`] | Snapshot, file, policy, and rule types |
//! | [`vcs`] | Version-control access (git CLI, in-memory) |
//! | [`language`] | Language classification |
//! | [`normalize`] | Config file → canonical JSON |
//! | [`walker`] | Tree walking and path filtering |
//! | [`policy`] | Policy location, fetching, and precedence |
//! | [`evaluator`] | Policy evaluation (Rego) |
//! | [`filter`] | Rule/policy filter engine |
//! | [`session`] | Per-session snapshot store |
//! | [`snapshot`] | Snapshot retrieval |
//! | [`export`] | JSON interchange document |

pub mod config;
pub mod error;
pub mod evaluator;
pub mod export;
pub mod filter;
pub mod language;
pub mod models;
pub mod normalize;
pub mod policy;
pub mod session;
pub mod snapshot;
pub mod vcs;
pub mod walker;
