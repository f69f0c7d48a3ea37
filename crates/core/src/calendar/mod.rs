//! Calendar synchronization services
//!
//! The OAuth flow controller and the sync engine, expressed purely over the
//! port traits in [`ports`]. Provider specifics live behind
//! [`ports::CalendarProvider`]; nothing in this module branches on provider
//! identity.

pub mod oauth;
pub mod ports;
pub mod sync;
