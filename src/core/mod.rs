//! # Core Domain Logic
//!
//! Everything that is not presentation: the command descriptor, the line
//! tokenizer, and the process-supervision engine. This module knows nothing
//! about ratatui or crossterm.
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            │            CORE              │
//!            │                              │
//!            │  • command  (what to run)    │
//!            │  • splitter (line tokens)    │
//!            │  • executor (PTY sessions,   │
//!            │    escalated termination)    │
//!            └──────────────┬───────────────┘
//!                           │ SessionEvent stream
//!                           ▼
//!                 ┌───────────────────┐
//!                 │   TUI Adapter     │
//!                 │    (ratatui)      │
//!                 └───────────────────┘
//! ```

pub mod command;
pub(crate) mod executor;
pub(crate) mod splitter;
