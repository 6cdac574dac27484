//! Background synchronization.
//!
//! The [`Poller`] periodically asks each tracker's connector for the latest
//! chapter, writes the result back through the tracker store and announces
//! new chapters through a [`Notifier`].

pub mod error;
mod notify;
mod poller;

pub use crate::notify::{NoopNotifier, Notification, Notifier, NotifierHandle, WebhookNotifier};
pub use crate::poller::{CycleReport, PlannedUpdate, Poller, PollerOptions, PollerState, is_new_chapter, plan_update};
