//! Los Libros Highlights
//!
//! Persistent highlight anchoring for reader content that is rebuilt from
//! scratch on every render.
//!
//! # Modules
//!
//! - `tree`: arena document tree, content loading and HTML output
//! - `anchor`: path+offset addressing that survives re-renders
//! - `highlights`: the persisted highlight record and export/import
//! - `applier`: reconciles a section's decorations with its records
//! - `selection`: turns finished selections into stored highlights
//! - `removal`: deletes a highlight from an activated decoration
//! - `store`: highlight persistence (in-memory and SQLite)
//! - `session`: the single-writer task driving all of the above

pub mod anchor;
pub mod applier;
pub mod config;
pub mod error;
pub mod highlights;
pub mod removal;
pub mod section;
pub mod selection;
pub mod session;
pub mod store;
pub mod tree;

pub use applier::{reconcile, AppliedSet, ReconcileReport};
pub use config::Config;
pub use error::{Error, Result};
pub use section::Section;
