//! Highlight session
//!
//! One tokio task owns the mounted [`Section`](crate::section::Section) and
//! is its only writer. The host sends [`SessionCommand`]s and receives
//! [`SessionNotice`]s. The two scheduled delays (first reconcile after mount,
//! touch settle) belong to the mounted section and are dropped with it.

mod driver;
mod types;

pub use driver::{spawn, SessionClosed, SessionHandle};
pub use types::{
    GestureKind, SectionSnapshot, SessionCommand, SessionNotice, StoreOperation,
};
