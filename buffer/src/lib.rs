//! A layered text buffer for editors.
//!
//! The buffer keeps an immutable base text and records edits in a stack of
//! patch layers, so reads reconstruct the current text lazily and
//! snapshots are O(1): they pin a layer instead of copying anything.
//! Positions, columns, and offsets are UTF-16 code units throughout, with
//! CRLF pairs and surrogate pairs treated as single logical positions.

pub mod code_points;
pub mod patch;
pub mod point;
pub mod range;
pub mod serialize;
pub mod text;
pub mod text_buffer;

pub use code_points::CodePoints;
pub use patch::{Change, Patch};
pub use point::Point;
pub use range::Range;
pub use serialize::{Deserializer, Serializer};
pub use text::{ClipResult, LineEnding, Text, TextSlice};
pub use text_buffer::{PatternError, Snapshot, TextBuffer, INVALID_PATTERN, NO_RESULTS};
