//! Reconciles a Rancher Cattle inventory into Icinga2 monitoring objects.
//!
//! The [`reconcile`] module holds the seven-phase sync engine; everything
//! else in this crate is a narrow collaborator it depends on: variable bags
//! (`vars`), the filter language (`filter`), name templating (`template`),
//! ownership marking (`identity`), entity mapping (`mapper`), the
//! custom-check payload parser (`customcheck`), the inventory/monitoring
//! HTTP clients (`inventory`, `monitoring`), the change-event emitter
//! (`changeevent`), and process configuration (`config`).

pub mod changeevent;
pub mod config;
pub mod customcheck;
pub mod error;
pub mod filter;
pub mod identity;
pub mod inventory;
pub mod logging;
pub mod mapper;
pub mod monitoring;
pub mod reconcile;
pub mod template;
pub mod vars;
