//! Anchor module
//!
//! Stable addressing into a section tree that is rebuilt from scratch on
//! every render.
//!
//! # Overview
//!
//! ```text
//! Anchor { path: [1, 0, 2], offset: 14 }
//!                 │  │  │           └── character offset into the text run
//!                 │  │  └────────────── third logical child (a text run)
//!                 │  └───────────────── first child of that element
//!                 └──────────────────── second child of the content root
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use crate::anchor::{decode_span, encode, Position, TextRange};
//!
//! let range = TextRange::new(Position::new(leaf, 4), Position::new(leaf, 16));
//! let span = encode(&tree, tree.root(), &range).unwrap();
//!
//! // After the section is rendered again
//! if let Some((start, end)) = decode_span(&new_tree, new_tree.root(), &span) {
//!     // live positions in the new tree
//! }
//! ```

mod codec;
mod types;

pub use codec::{decode, decode_span, encode, encode_position, ordered, range_text};
pub use types::{Affinity, Anchor, Position, Resolution, Span, TextRange};
