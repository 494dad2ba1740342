//! Leave approval workflow: policy rules, the balance ledger, the approval
//! chain state machine and the orchestrating service. Nothing in here knows
//! about HTTP or MySQL.

pub mod access;
pub mod calendar;
pub mod chain;
pub mod error;
pub mod hierarchy;
pub mod ledger;
#[cfg(test)]
pub mod memory;
pub mod policy;
pub mod routing;
pub mod service;
pub mod store;
