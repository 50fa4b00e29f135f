//! The layered text buffer.
//!
//! A buffer is a base text plus a stack of patch layers. Edits land in the
//! top layer's patch only; reads descend the stack until they reach the
//! base, so the post-edit text is never materialized. Snapshots pin a layer
//! and give an O(1) immutable view of the buffer at creation time; when the
//! last pin on a layer is released, the layers above it are folded back
//! together.

mod layer;

use std::cell::RefCell;
use std::hash::Hasher;
use std::rc::Rc;

use regex::Regex;
use rustc_hash::FxHasher;
use thiserror::Error;

use crate::code_points::CodePoints;
use crate::patch::Patch;
use crate::point::Point;
use crate::range::Range;
use crate::serialize::{Deserializer, Serializer};
use crate::text::{ClipResult, LineEnding, Text, TextSlice, CR};

use self::layer::{Layer, Parent};

/// Sentinel returned by [`TextBuffer::search`] for an unparsable pattern.
pub const INVALID_PATTERN: i64 = -1;
/// Sentinel returned by [`TextBuffer::search`] when nothing matches.
pub const NO_RESULTS: i64 = -2;

/// The pattern given to [`TextBuffer::find_match`] failed to compile.
#[derive(Debug, Error)]
#[error("invalid search pattern: {0}")]
pub struct PatternError(#[from] regex::Error);

#[derive(Debug)]
struct BufferState {
    base_text: Rc<Text>,
    top: Layer,
}

impl BufferState {
    fn new(base_text: Text) -> BufferState {
        let base_text = Rc::new(base_text);
        BufferState {
            top: Layer::first(Rc::clone(&base_text)),
            base_text,
        }
    }

    // Folds every layer whose pins are gone back into the deepest layer that
    // must survive: the first layer, or the one sitting directly above a
    // layer that is still pinned. The surviving layer becomes the top.
    fn coalesce(&mut self) {
        debug_assert_eq!(0, self.top.snapshot_count.get());
        let top_size = self.top.size;
        let top_extent = self.top.extent;

        let placeholder = Layer::first(Rc::clone(&self.base_text));
        let mut current = std::mem::replace(&mut self.top, placeholder);
        let mut folded_patches = Vec::new();

        loop {
            match current.parent {
                Parent::Layer(below) if below.snapshot_count.get() == 0 => {
                    folded_patches.push(current.patch);
                    current = Rc::try_unwrap(below)
                        .ok()
                        .expect("released layer is still shared");
                }
                parent => {
                    current.parent = parent;
                    break;
                }
            }
        }

        // The retained layer inherits the totals of the old top; they
        // already account for every folded edit.
        current.size = top_size;
        current.extent = top_extent;

        let mut left_to_right = true;
        for patch in folded_patches.iter().rev() {
            current.patch.combine(patch, left_to_right);
            left_to_right = !left_to_right;
        }

        current.is_last.set(true);
        if !folded_patches.is_empty() {
            log::debug!(
                "coalesced {} released layer(s) into the retained layer",
                folded_patches.len()
            );
        }
        self.top = current;
    }
}

/// An in-memory text buffer over UTF-16 code units with arbitrary range
/// edits, lazy position arithmetic, and cheap immutable snapshots.
///
/// A buffer and its snapshots belong to one thread.
#[derive(Debug)]
pub struct TextBuffer {
    state: Rc<RefCell<BufferState>>,
}

impl TextBuffer {
    pub fn new(base_text: Text) -> TextBuffer {
        TextBuffer {
            state: Rc::new(RefCell::new(BufferState::new(base_text))),
        }
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.state.borrow().top.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    #[inline]
    pub fn extent(&self) -> Point {
        self.state.borrow().top.extent
    }

    pub fn clip_position(&self, position: Point) -> ClipResult {
        self.state.borrow().top.clip_position(position)
    }

    pub fn position_for_offset(&self, offset: u32) -> Point {
        self.state.borrow().top.position_for_offset(offset)
    }

    /// The column of the last valid position in `row`.
    pub fn line_length_for_row(&self, row: u32) -> u32 {
        self.clip_position(Point::new(row, u32::MAX)).position.column
    }

    /// The terminator of `row`: what separates it from the next row, or
    /// [`LineEnding::None`] on the last row.
    pub fn line_ending_for_row(&self, row: u32) -> LineEnding {
        let state = self.state.borrow();
        let mut result = LineEnding::None;
        state.top.for_each_chunk_in_range(
            Point::new(row, u32::MAX),
            Point::new(row.saturating_add(1), 0),
            &mut |slice| match slice.front() {
                None => false,
                Some(unit) => {
                    result = if unit == CR { LineEnding::Crlf } else { LineEnding::Lf };
                    true
                }
            },
        );
        result
    }

    pub fn text(&self) -> Text {
        let state = self.state.borrow();
        state.top.text_in_range(Range::all(state.top.extent))
    }

    pub fn text_in_range(&self, range: Range) -> Text {
        self.state.borrow().top.text_in_range(range)
    }

    /// The chunk fragments covering `range`, copied out of the layer stack.
    /// Use [`TextBuffer::for_each_chunk_in_range`] to visit them without
    /// copying.
    pub fn chunks_in_range(&self, range: Range) -> Vec<Text> {
        let state = self.state.borrow();
        let mut chunks = Vec::new();
        state
            .top
            .for_each_chunk_in_range(range.start, range.end, &mut |slice| {
                chunks.push(slice.to_text());
                false
            });
        chunks
    }

    pub fn chunks(&self) -> Vec<Text> {
        self.chunks_in_range(Range::all(self.extent()))
    }

    /// Visits the chunk fragments covering `range` in order. The callback
    /// returning `true` aborts the walk; the abort is returned. Slices are
    /// only valid during the callback.
    pub fn for_each_chunk_in_range(
        &self,
        range: Range,
        mut callback: impl FnMut(TextSlice) -> bool,
    ) -> bool {
        let state = self.state.borrow();
        state
            .top
            .for_each_chunk_in_range(range.start, range.end, &mut |slice| callback(slice))
    }

    /// Replaces the whole buffer content.
    pub fn set_text(&mut self, text: Text) {
        let range = Range::all(self.extent());
        self.set_text_in_range(range, text);
    }

    /// Replaces `old_range` (clipped to valid boundaries) with `new_text`.
    /// Snapshots taken earlier do not observe the edit.
    pub fn set_text_in_range(&mut self, old_range: Range, new_text: Text) {
        self.state.borrow_mut().top.set_text_in_range(old_range, new_text);
    }

    /// True when any layer of the stack still records an edit, i.e. the
    /// current text differs from the base text by some outstanding change.
    pub fn is_modified(&self) -> bool {
        let state = self.state.borrow();
        let mut layer = &state.top;
        loop {
            if layer.patch.change_count() > 0 {
                return true;
            }
            match &layer.parent {
                Parent::Base(_) => return false,
                Parent::Layer(below) => layer = below,
            }
        }
    }

    /// Order-sensitive digest of the base text, stable across runs. Used to
    /// detect that the underlying file changed on disk.
    pub fn base_text_digest(&self) -> u64 {
        let state = self.state.borrow();
        let mut hasher = FxHasher::default();
        for &unit in state.base_text.code_units() {
            hasher.write_u16(unit);
        }
        hasher.finish()
    }

    /// Swaps in a new base text. Allowed only while the first layer is the
    /// top of the stack; returns `false` (and changes nothing) otherwise.
    /// Outstanding changes are discarded.
    pub fn reset_base_text(&mut self, new_base_text: Text) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.top.is_first() {
            return false;
        }
        log::debug!("resetting base text ({} code units)", new_base_text.size());
        state.top.patch.clear();
        state.top.extent = new_base_text.extent();
        state.top.size = new_base_text.size();
        let new_base_text = Rc::new(new_base_text);
        state.base_text = Rc::clone(&new_base_text);
        state.top.parent = Parent::Base(new_base_text);
        true
    }

    /// Applies the top layer's outstanding changes to the base text and
    /// clears them. Allowed only while the first layer is the top of the
    /// stack; returns `false` otherwise.
    pub fn flush_outstanding_changes(&mut self) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.top.is_first() {
            return false;
        }
        if state.top.patch.change_count() == 0 {
            return true;
        }
        log::debug!(
            "flushing {} outstanding change(s) into the base text",
            state.top.patch.change_count()
        );
        let mut new_base_text = (*state.base_text).clone();
        for change in state.top.patch.get_changes() {
            new_base_text.splice(
                change.new_start,
                change.old_end.traversal(change.old_start),
                &change.new_text,
            );
        }
        state.top.patch.clear();
        let new_base_text = Rc::new(new_base_text);
        state.base_text = Rc::clone(&new_base_text);
        state.top.parent = Parent::Base(new_base_text);
        true
    }

    /// Writes the top layer's outstanding changes (patch, size, extent).
    /// Allowed only while the first layer is the top of the stack.
    pub fn serialize_outstanding_changes(&self, serializer: &mut Serializer) -> bool {
        let state = self.state.borrow();
        if !state.top.is_first() {
            return false;
        }
        state.top.patch.serialize(serializer);
        serializer.append_u32(state.top.size);
        state.top.extent.serialize(serializer);
        true
    }

    /// Restores outstanding changes written by
    /// [`TextBuffer::serialize_outstanding_changes`] over the same base
    /// text. Allowed only on a top-is-first stack with an empty patch;
    /// returns `false` (and changes nothing) on a precondition violation or
    /// malformed input.
    pub fn deserialize_outstanding_changes(&mut self, deserializer: &mut Deserializer) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.top.is_first() || state.top.patch.change_count() > 0 {
            return false;
        }
        let Some(patch) = Patch::deserialize(deserializer) else {
            return false;
        };
        let Some(size) = deserializer.read_u32() else {
            return false;
        };
        let Some(extent) = Point::deserialize(deserializer) else {
            return false;
        };
        state.top.patch = patch;
        state.top.size = size;
        state.top.extent = extent;
        true
    }

    /// Pins the current state and returns an immutable view of it. Later
    /// edits go to a fresh top layer and stay invisible to the snapshot.
    pub fn create_snapshot(&mut self) -> Snapshot {
        let mut state = self.state.borrow_mut();

        // An empty non-first top already mirrors the layer below it; pin
        // that layer instead of stacking a useless twin.
        let mut reused = None;
        if state.top.patch.change_count() == 0 {
            if let Parent::Layer(below) = &state.top.parent {
                reused = Some(Rc::clone(below));
            }
        }

        let layer = match reused {
            Some(layer) => layer,
            None => {
                let placeholder = Layer::first(Rc::clone(&state.base_text));
                let previous_top = std::mem::replace(&mut state.top, placeholder);
                previous_top.is_last.set(false);
                let pinned = Rc::new(previous_top);
                state.top = Layer::above(Rc::clone(&pinned));
                log::debug!("pinned the top layer and pushed a fresh one");
                pinned
            }
        };
        layer.snapshot_count.set(layer.snapshot_count.get() + 1);
        Snapshot {
            state: Rc::clone(&self.state),
            layer: Some(layer),
        }
    }

    /// Finds the first match of `pattern` in the buffer and returns its
    /// code-point offset: surrogate pairs count as one.
    pub fn find_match(&self, pattern: &str) -> Result<Option<u32>, PatternError> {
        let regex = Regex::new(pattern)?;
        let state = self.state.borrow();
        let chunks = state.top.chunks_in_range(Range::all(state.top.extent));

        let mut haystack = String::with_capacity(state.top.size as usize);
        let mut code_points = CodePoints::new(&chunks);
        let mut current = code_points.get();
        while let Some(code_point) = current {
            haystack.push(char::from_u32(code_point).unwrap_or(char::REPLACEMENT_CHARACTER));
            current = code_points.next();
        }

        match regex.find(&haystack) {
            Some(found) => Ok(Some(haystack[..found.start()].chars().count() as u32)),
            None => Ok(None),
        }
    }

    /// Sentinel-returning form of [`TextBuffer::find_match`]: the code-point
    /// offset of the first match, [`INVALID_PATTERN`], or [`NO_RESULTS`].
    pub fn search(&self, pattern: &str) -> i64 {
        match self.find_match(pattern) {
            Ok(Some(offset)) => offset as i64,
            Ok(None) => NO_RESULTS,
            Err(_) => INVALID_PATTERN,
        }
    }
}

impl Default for TextBuffer {
    fn default() -> TextBuffer {
        TextBuffer::new(Text::new())
    }
}

impl From<&str> for TextBuffer {
    fn from(text: &str) -> TextBuffer {
        TextBuffer::new(Text::from(text))
    }
}

/// An immutable view of a buffer at snapshot creation time.
///
/// The snapshot pins one layer of the stack; dropping the last snapshot of
/// a layer folds the layers above it back together.
#[derive(Debug)]
pub struct Snapshot {
    state: Rc<RefCell<BufferState>>,
    layer: Option<Rc<Layer>>,
}

impl Snapshot {
    fn layer(&self) -> &Layer {
        self.layer.as_deref().expect("snapshot layer already released")
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.layer().size
    }

    #[inline]
    pub fn extent(&self) -> Point {
        self.layer().extent
    }

    pub fn line_length_for_row(&self, row: u32) -> u32 {
        self.layer()
            .clip_position(Point::new(row, u32::MAX))
            .position
            .column
    }

    pub fn text(&self) -> Text {
        self.layer().text_in_range(Range::all(self.extent()))
    }

    pub fn text_in_range(&self, range: Range) -> Text {
        self.layer().text_in_range(range)
    }

    pub fn chunks_in_range(&self, range: Range) -> Vec<TextSlice<'_>> {
        self.layer().chunks_in_range(range)
    }

    pub fn chunks(&self) -> Vec<TextSlice<'_>> {
        self.chunks_in_range(Range::all(self.extent()))
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        let Some(layer) = self.layer.take() else {
            return;
        };
        let count = layer.snapshot_count.get();
        debug_assert!(count > 0, "snapshot count underflow");
        layer.snapshot_count.set(count.saturating_sub(1));
        let release = layer.snapshot_count.get() == 0;
        // Give up our strong reference before folding, so the released
        // layer chain is uniquely owned again.
        drop(layer);
        if release {
            self.state.borrow_mut().coalesce();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn point(row: u32, column: u32) -> Point {
        Point::new(row, column)
    }

    fn range(start: (u32, u32), end: (u32, u32)) -> Range {
        Range::new(point(start.0, start.1), point(end.0, end.1))
    }

    fn layer_depth(buffer: &TextBuffer) -> usize {
        let state = buffer.state.borrow();
        let mut depth = 1;
        let mut layer = &state.top;
        loop {
            match &layer.parent {
                Parent::Base(_) => return depth,
                Parent::Layer(below) => {
                    depth += 1;
                    layer = below;
                }
            }
        }
    }

    #[test]
    fn replaces_a_range() {
        let mut buffer = TextBuffer::from("abc\ndef");
        buffer.set_text_in_range(range((0, 1), (0, 2)), Text::from("BB"));
        assert_eq!(buffer.text(), "aBBc\ndef");
        assert_eq!(4, buffer.line_length_for_row(0));
        assert_eq!(8, buffer.size());
        assert_eq!(point(1, 3), buffer.extent());
    }

    #[test]
    fn edits_compose_within_one_layer() {
        let mut buffer = TextBuffer::from("hello world");
        buffer.set_text_in_range(range((0, 0), (0, 5)), Text::from("goodbye"));
        assert_eq!(buffer.text(), "goodbye world");
        buffer.set_text_in_range(range((0, 8), (0, 13)), Text::from("cruel\nworld"));
        assert_eq!(buffer.text(), "goodbye cruel\nworld");
        assert_eq!(point(1, 5), buffer.extent());
        assert_eq!(buffer.size(), 19);
        assert_eq!(1, layer_depth(&buffer));
    }

    #[test]
    fn set_text_replaces_everything() {
        let mut buffer = TextBuffer::from("abc\ndef");
        buffer.set_text(Text::from("xyz"));
        assert_eq!(buffer.text(), "xyz");
        assert_eq!(point(0, 3), buffer.extent());
    }

    #[test]
    fn clip_collapses_crlf_in_base_text() {
        let buffer = TextBuffer::from("abc\r\ndef");
        assert_eq!(
            ClipResult { position: point(0, 3), offset: 3 },
            buffer.clip_position(point(0, 4))
        );
        assert_eq!(LineEnding::Crlf, buffer.line_ending_for_row(0));
        assert_eq!(LineEnding::None, buffer.line_ending_for_row(1));
        assert_eq!(3, buffer.line_length_for_row(0));
    }

    #[test]
    fn clip_stitches_crlf_across_insertion_end() {
        // The insertion trails with CR; the parent continues with LF.
        let mut buffer = TextBuffer::from("abc\ndef");
        buffer.set_text_in_range(range((0, 3), (0, 3)), Text::from("x\r"));
        assert_eq!(buffer.text(), "abcx\r\ndef");
        assert_eq!(
            ClipResult { position: point(0, 4), offset: 4 },
            buffer.clip_position(point(0, 5))
        );
        assert_eq!(4, buffer.line_length_for_row(0));
        assert_eq!(LineEnding::Crlf, buffer.line_ending_for_row(0));
    }

    #[test]
    fn clip_stitches_crlf_across_insertion_start() {
        // The parent ends with a lone CR; the insertion leads with LF.
        let mut buffer = TextBuffer::from("ab\rcd");
        buffer.set_text_in_range(range((0, 3), (0, 3)), Text::from("\nz"));
        assert_eq!(buffer.text(), "ab\r\nzcd");
        assert_eq!(
            ClipResult { position: point(0, 2), offset: 2 },
            buffer.clip_position(point(0, 3))
        );
        assert_eq!(2, buffer.line_length_for_row(0));
        assert_eq!(LineEnding::Crlf, buffer.line_ending_for_row(0));
        assert_eq!(3, buffer.line_length_for_row(1));
    }

    #[test]
    fn position_and_offset_are_inverse() {
        let mut buffer = TextBuffer::from("abc\ndef\nghi");
        buffer.set_text_in_range(range((1, 1), (2, 1)), Text::from("XY\nZ"));
        let text = buffer.text();
        assert_eq!(text, "abc\ndXY\nZhi");
        for offset in 0..=buffer.size() {
            let position = buffer.position_for_offset(offset);
            assert_eq!(offset, buffer.clip_position(position).offset);
        }
        assert_eq!(buffer.extent(), buffer.position_for_offset(buffer.size() + 10));
    }

    #[test]
    fn clipping_is_idempotent_across_the_stack() {
        let mut buffer = TextBuffer::from("aaa\nbbb\nccc");
        let _snapshot = buffer.create_snapshot();
        buffer.set_text_in_range(range((0, 1), (1, 1)), Text::from("x\ry"));
        for row in 0..=buffer.extent().row {
            for column in 0..=buffer.line_length_for_row(row) + 1 {
                let clipped = buffer.clip_position(point(row, column));
                assert_eq!(clipped, buffer.clip_position(clipped.position));
            }
        }
    }

    #[test]
    fn snapshot_observes_creation_time_state() {
        let mut buffer = TextBuffer::from("abc");
        let snapshot = buffer.create_snapshot();
        buffer.set_text_in_range(range((0, 1), (0, 2)), Text::from("BB"));
        assert_eq!(snapshot.text(), "abc");
        assert_eq!(3, snapshot.size());
        assert_eq!(point(0, 3), snapshot.extent());
        assert_eq!(buffer.text(), "aBBc");
        assert_eq!(2, layer_depth(&buffer));

        drop(snapshot);
        assert_eq!(buffer.text(), "aBBc");
        assert_eq!(1, layer_depth(&buffer));
        assert!(buffer.is_modified());
    }

    #[test]
    fn snapshot_of_clean_top_pins_the_layer_below() {
        let mut buffer = TextBuffer::from("abc");
        let first = buffer.create_snapshot();
        assert_eq!(2, layer_depth(&buffer));
        // No edits since: the next snapshot reuses the pinned layer.
        let second = buffer.create_snapshot();
        assert_eq!(2, layer_depth(&buffer));
        drop(first);
        assert_eq!(2, layer_depth(&buffer));
        drop(second);
        assert_eq!(1, layer_depth(&buffer));
    }

    #[test]
    fn stacked_snapshots_release_out_of_order() {
        let mut buffer = TextBuffer::from("one two three");
        let lower = buffer.create_snapshot();
        buffer.set_text_in_range(range((0, 0), (0, 3)), Text::from("1"));
        let upper = buffer.create_snapshot();
        buffer.set_text_in_range(range((0, 2), (0, 5)), Text::from("2"));
        assert_eq!(3, layer_depth(&buffer));
        assert_eq!(buffer.text(), "1 2 three");

        drop(lower);
        // The upper pin still holds its layer and everything below it.
        assert_eq!(3, layer_depth(&buffer));
        assert_eq!(upper.text(), "1 two three");

        drop(upper);
        assert_eq!(1, layer_depth(&buffer));
        assert_eq!(buffer.text(), "1 2 three");
    }

    #[test]
    fn dropping_the_buffer_before_its_snapshot_is_safe() {
        let mut buffer = TextBuffer::from("abc");
        let snapshot = buffer.create_snapshot();
        buffer.set_text_in_range(range((0, 0), (0, 0)), Text::from("x"));
        drop(buffer);
        assert_eq!(snapshot.text(), "abc");
    }

    #[test]
    fn edits_through_many_snapshot_generations() {
        let mut buffer = TextBuffer::from("0123456789");
        let mut snapshots = Vec::new();
        for index in 0..5 {
            snapshots.push((buffer.text(), buffer.create_snapshot()));
            let column = index * 2;
            buffer.set_text_in_range(range((0, column), (0, column + 1)), Text::from("x"));
        }
        for (expected, snapshot) in &snapshots {
            assert_eq!(expected, &snapshot.text());
        }
        assert_eq!(buffer.text(), "x1x3x5x7x9");
        snapshots.reverse();
        drop(snapshots);
        assert_eq!(1, layer_depth(&buffer));
        assert_eq!(buffer.text(), "x1x3x5x7x9");
    }

    #[test]
    fn flush_applies_changes_to_the_base() {
        let mut buffer = TextBuffer::from("");
        buffer.set_text_in_range(range((0, 0), (0, 0)), Text::from("hello"));
        assert!(buffer.is_modified());
        let digest_before = buffer.base_text_digest();

        assert!(buffer.flush_outstanding_changes());
        assert!(!buffer.is_modified());
        assert_eq!(buffer.text(), "hello");
        assert_ne!(digest_before, buffer.base_text_digest());
        assert_eq!(
            TextBuffer::from("hello").base_text_digest(),
            buffer.base_text_digest()
        );
    }

    #[test]
    fn flush_and_reset_require_a_single_layer() {
        let mut buffer = TextBuffer::from("abc");
        let snapshot = buffer.create_snapshot();
        buffer.set_text_in_range(range((0, 0), (0, 1)), Text::from("X"));
        assert!(!buffer.flush_outstanding_changes());
        assert!(!buffer.reset_base_text(Text::from("zzz")));
        assert_eq!(buffer.text(), "Xbc");
        drop(snapshot);
        assert!(buffer.flush_outstanding_changes());
        assert_eq!(buffer.text(), "Xbc");
    }

    #[test]
    fn reset_base_text_discards_changes() {
        let mut buffer = TextBuffer::from("abc");
        buffer.set_text_in_range(range((0, 0), (0, 1)), Text::from("X"));
        assert!(buffer.reset_base_text(Text::from("fresh\nstart")));
        assert_eq!(buffer.text(), "fresh\nstart");
        assert_eq!(point(1, 5), buffer.extent());
        assert!(!buffer.is_modified());
    }

    #[test]
    fn outstanding_changes_round_trip() {
        let mut buffer = TextBuffer::from("abc\ndef");
        buffer.set_text_in_range(range((0, 1), (1, 1)), Text::from("--"));
        let mut serializer = Serializer::new();
        assert!(buffer.serialize_outstanding_changes(&mut serializer));
        let bytes = serializer.into_bytes();

        let mut restored = TextBuffer::from("abc\ndef");
        let mut deserializer = Deserializer::new(&bytes);
        assert!(restored.deserialize_outstanding_changes(&mut deserializer));
        assert_eq!(buffer.text(), restored.text());
        assert_eq!(buffer.size(), restored.size());
        assert_eq!(buffer.extent(), restored.extent());
        assert!(restored.is_modified());
    }

    #[test]
    fn deserialize_requires_an_empty_patch() {
        let mut buffer = TextBuffer::from("abc");
        buffer.set_text_in_range(range((0, 0), (0, 0)), Text::from("x"));
        let mut serializer = Serializer::new();
        assert!(buffer.serialize_outstanding_changes(&mut serializer));
        let bytes = serializer.into_bytes();

        let mut deserializer = Deserializer::new(&bytes);
        assert!(!buffer.deserialize_outstanding_changes(&mut deserializer));

        let mut truncated = Deserializer::new(&bytes[..2]);
        let mut fresh = TextBuffer::from("abc");
        assert!(!fresh.deserialize_outstanding_changes(&mut truncated));
        assert!(!fresh.is_modified());
    }

    #[test]
    fn search_returns_code_point_offsets() {
        let buffer = TextBuffer::from("ab\u{1f601}cd");
        assert_eq!(2, buffer.search("\u{1f601}"));
        assert_eq!(3, buffer.search("cd"));
        assert_eq!(NO_RESULTS, TextBuffer::from("abc").search("zzz"));
        assert_eq!(INVALID_PATTERN, TextBuffer::from("abc").search("("));
    }

    #[test]
    fn search_sees_through_the_layer_stack() {
        let mut buffer = TextBuffer::from("needle in a haystack");
        let _snapshot = buffer.create_snapshot();
        buffer.set_text_in_range(range((0, 0), (0, 6)), Text::from("pin"));
        assert_eq!(0, buffer.search("pin"));
        assert_eq!(7, buffer.search("a h[a-z]+k"));
        assert_eq!(NO_RESULTS, buffer.search("needle"));
    }

    #[test]
    fn chunk_iteration_can_abort_early() {
        let mut buffer = TextBuffer::from("aaa bbb ccc");
        buffer.set_text_in_range(range((0, 4), (0, 7)), Text::from("BBB"));
        let mut seen = 0;
        let aborted = buffer.for_each_chunk_in_range(Range::all(buffer.extent()), |_slice| {
            seen += 1;
            seen == 2
        });
        assert!(aborted);
        assert_eq!(2, seen);
    }

    #[test]
    fn size_and_extent_agree_with_chunks() {
        let mut buffer = TextBuffer::from("alpha\nbeta\r\ngamma");
        let _snapshot = buffer.create_snapshot();
        buffer.set_text_in_range(range((1, 0), (1, 4)), Text::from("B\nB"));
        buffer.set_text_in_range(range((0, 0), (0, 0)), Text::from("\u{1f601}"));

        let mut total = 0;
        let mut end = Point::zero();
        for chunk in buffer.chunks() {
            total += chunk.size();
            end = end.traverse(chunk.extent());
        }
        assert_eq!(buffer.size(), total);
        assert_eq!(buffer.extent(), end);
    }

    #[test]
    fn round_trips_an_edit_of_its_own_text() {
        let mut buffer = TextBuffer::from("abc\r\ndef\u{1f601}ghi");
        let _snapshot = buffer.create_snapshot();
        buffer.set_text_in_range(range((0, 1), (1, 2)), Text::from("12\r\n34"));
        let before = buffer.text();
        let window = range((0, 2), (1, 1));
        let fragment = buffer.text_in_range(window);
        buffer.set_text_in_range(window, fragment);
        assert_eq!(before, buffer.text());
    }
}
