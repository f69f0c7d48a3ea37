//! # MeetSync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits)
//! - The OAuth flow controller and the sync engine
//!
//! ## Architecture Principles
//! - Only depends on `meetsync-common` and `meetsync-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod calendar;

// Re-export specific items to avoid ambiguity
pub use calendar::oauth::{
    CallbackFailure, CallbackOutcome, CallbackQuery, CallbackResult, OAuthFlowController,
    StartedFlow,
};
pub use calendar::ports::{
    CalendarProvider, ConnectionRepository, LocalEventRepository, ProviderMap, UserResolver,
};
pub use calendar::sync::SyncEngine;
