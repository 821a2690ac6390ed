//! # Core Application Logic
//!
//! This module contains Lumen's business logic.
//! It knows nothing about any specific UI technology.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • State (app data)     │
//!                    │  • Action (events)      │
//!                    │  • update() (reducer)   │
//!                    │  • build_view()         │
//!                    │                         │
//!                    │  No UI. I/O only in     │
//!                    │  relay_task jobs.       │
//!                    └───────────┬─────────────┘
//!                                │
//!                                ▼
//!                         ┌────────────┐
//!                         │    TUI     │
//!                         │  Adapter   │
//!                         │ (ratatui)  │
//!                         └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`state`]: The `App` struct, all session state in one place
//! - [`action`]: The `Action` enum and the `update()` reducer
//! - [`input`]: Draft text and pending attachments
//! - [`attachment`]: Attachment validation and streaming encode
//! - [`relay_task`]: Async jobs that report back as actions
//! - [`view`]: Pure view model for the conversation
//! - [`config`]: Layered configuration

pub mod action;
pub mod attachment;
pub mod config;
pub mod input;
pub mod relay_task;
pub mod state;
pub mod view;
