//! A map from spans of an "old" coordinate space to spans of a "new" one.
//!
//! Changes are kept sorted by `new_start`, non-overlapping and non-touching:
//! a splice that meets an existing change is merged into it, so adjacent
//! edits (typing) collapse into a single change, position queries never
//! have to disambiguate a shared boundary, and the text bordering a change
//! is always parent text — clipping depends on that when it reads the
//! characters on either side of a change.

use crate::point::Point;
use crate::serialize::{Deserializer, Serializer};
use crate::text::{Text, TextSlice};

/// One recorded edit: the parent span `[old_start, old_end)` is replaced by
/// `new_text`, which covers `[new_start, new_end)` in this patch's output
/// coordinates. `old_text_size` is the code-unit size of the replaced parent
/// text; the `preceding_*` fields are prefix sums over earlier changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub old_start: Point,
    pub old_end: Point,
    pub new_start: Point,
    pub new_end: Point,
    pub old_text_size: u32,
    pub new_text: Text,
    pub preceding_old_text_size: u32,
    pub preceding_new_text_size: u32,
}

impl Change {
    #[inline]
    pub fn old_extent(&self) -> Point {
        self.old_end.traversal(self.old_start)
    }

    #[inline]
    pub fn new_extent(&self) -> Point {
        self.new_end.traversal(self.new_start)
    }

    fn is_noop(&self) -> bool {
        self.old_start == self.old_end && self.new_start == self.new_end && self.old_text_size == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Patch {
    changes: Vec<Change>,
}

impl Patch {
    #[inline]
    pub fn new() -> Patch {
        Patch::default()
    }

    #[inline]
    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    #[inline]
    pub fn get_changes(&self) -> &[Change] {
        &self.changes
    }

    #[inline]
    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// The rightmost change starting at or before `position`: the change
    /// containing the position, or the nearest one preceding it.
    pub fn find_change_for_new_position(&self, position: Point) -> Option<&Change> {
        let index = self.changes.partition_point(|change| change.new_start <= position);
        if index == 0 {
            return None;
        }
        Some(&self.changes[index - 1])
    }

    /// The boundary-inclusive query the top layer clips through: a position
    /// exactly at a change's `new_end` must resolve to that change so a clip
    /// at the tail of an insertion stays attached to it. Because
    /// [`Patch::splice`] merges changes that touch, no later change can
    /// start at that boundary and the preceding-change search already
    /// resolves it, so this delegates.
    pub fn change_for_new_position(&self, position: Point) -> Option<&Change> {
        self.find_change_for_new_position(position)
    }

    /// The first change whose `new_end` lies strictly after `position`.
    pub fn find_change_ending_after_new_position(&self, position: Point) -> Option<&Change> {
        let index = self.changes.partition_point(|change| change.new_end <= position);
        self.changes.get(index)
    }

    /// Records an edit in the patch's current new coordinate space: the span
    /// of `deletion_extent` at `start` is replaced by `inserted_text`
    /// (covering `insertion_extent`). `deleted_text_size` is the code-unit
    /// size of the text removed from the current new space. Existing changes
    /// the span overlaps or touches are absorbed into the recorded change.
    pub fn splice(
        &mut self,
        start: Point,
        deletion_extent: Point,
        insertion_extent: Point,
        inserted_text: Text,
        deleted_text_size: u32,
    ) {
        if deletion_extent.is_zero() && insertion_extent.is_zero() && inserted_text.is_empty() {
            return;
        }

        let deletion_end = start.traverse(deletion_extent);
        let insertion_end = start.traverse(insertion_extent);

        // Changes overlapping or touching the spliced span.
        let first = self.changes.partition_point(|change| change.new_end < start);
        let last = self.changes.partition_point(|change| change.new_start <= deletion_end);
        debug_assert!(first <= last);

        let merged = if first == last {
            let old_start = self.old_position_for_new(start, first);
            Change {
                old_start,
                old_end: old_start.traverse(deletion_extent),
                new_start: start,
                new_end: insertion_end,
                old_text_size: deleted_text_size,
                new_text: inserted_text,
                preceding_old_text_size: 0,
                preceding_new_text_size: 0,
            }
        } else {
            let first_change = &self.changes[first];
            let last_change = &self.changes[last - 1];

            let old_start = if start < first_change.new_start {
                self.old_position_for_new(start, first)
            } else {
                first_change.old_start
            };
            let old_end = if deletion_end > last_change.new_end {
                last_change
                    .old_end
                    .traverse(deletion_end.traversal(last_change.new_end))
            } else {
                last_change.old_end
            };

            let prefix = if start > first_change.new_start {
                TextSlice::from(&first_change.new_text)
                    .prefix(start.traversal(first_change.new_start))
            } else {
                TextSlice::from(&first_change.new_text).prefix(Point::zero())
            };
            let suffix = if deletion_end < last_change.new_end {
                TextSlice::from(&last_change.new_text)
                    .suffix(deletion_end.traversal(last_change.new_start))
            } else {
                TextSlice::from(&last_change.new_text).suffix(last_change.new_extent())
            };

            let payload_size: u32 = self.changes[first..last]
                .iter()
                .map(|change| change.new_text.size())
                .sum();
            let overlapped_old_size: u32 = self.changes[first..last]
                .iter()
                .map(|change| change.old_text_size)
                .sum();
            let deleted_from_payloads = payload_size - prefix.size() - suffix.size();
            debug_assert!(deleted_from_payloads <= deleted_text_size);
            let deleted_from_gaps = deleted_text_size.saturating_sub(deleted_from_payloads);

            let new_start = start.min(first_change.new_start);
            let mut new_text = prefix.to_text();
            new_text.append(inserted_text.as_slice());
            new_text.append(suffix);
            let new_end = new_start.traverse(new_text.extent());

            Change {
                old_start,
                old_end,
                new_start,
                new_end,
                old_text_size: overlapped_old_size + deleted_from_gaps,
                new_text,
                preceding_old_text_size: 0,
                preceding_new_text_size: 0,
            }
        };

        let replacement = if merged.is_noop() { None } else { Some(merged) };
        let merged_len = replacement.is_some() as usize;
        self.changes.splice(first..last, replacement);

        // Everything after the merged change shifts by the splice delta.
        for change in &mut self.changes[first + merged_len..] {
            change.new_start = insertion_end.traverse(change.new_start.traversal(deletion_end));
            change.new_end = insertion_end.traverse(change.new_end.traversal(deletion_end));
        }

        self.rebuild_preceding_sizes();
    }

    /// Folds `other` — a patch whose old coordinate space is this patch's
    /// new space — into this patch, producing the composition
    /// self-then-other. `left_to_right` selects the replay walk: ascending
    /// over `other`'s changes splicing at their (already shifted)
    /// `new_start`, or descending splicing at their (not yet shifted)
    /// `old_start`. Both walks yield the same composite; callers folding
    /// several patches in sequence alternate the direction.
    pub fn combine(&mut self, other: &Patch, left_to_right: bool) {
        if left_to_right {
            for change in other.changes.iter() {
                self.splice(
                    change.new_start,
                    change.old_extent(),
                    change.new_extent(),
                    change.new_text.clone(),
                    change.old_text_size,
                );
            }
        } else {
            for change in other.changes.iter().rev() {
                self.splice(
                    change.old_start,
                    change.old_extent(),
                    change.new_extent(),
                    change.new_text.clone(),
                    change.old_text_size,
                );
            }
        }
    }

    pub fn serialize(&self, serializer: &mut Serializer) {
        serializer.append_u32(self.changes.len() as u32);
        for change in &self.changes {
            change.old_start.serialize(serializer);
            change.old_end.serialize(serializer);
            change.new_start.serialize(serializer);
            change.new_end.serialize(serializer);
            serializer.append_u32(change.old_text_size);
            serializer.append_u32(change.new_text.size());
            serializer.append_code_units(change.new_text.code_units());
        }
    }

    /// Reads a patch written by [`Patch::serialize`]; `None` on truncated or
    /// malformed input.
    pub fn deserialize(deserializer: &mut Deserializer) -> Option<Patch> {
        let count = deserializer.read_u32()?;
        let mut changes = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let old_start = Point::deserialize(deserializer)?;
            let old_end = Point::deserialize(deserializer)?;
            let new_start = Point::deserialize(deserializer)?;
            let new_end = Point::deserialize(deserializer)?;
            let old_text_size = deserializer.read_u32()?;
            let new_text_size = deserializer.read_u32()?;
            let units = deserializer.read_code_units(new_text_size)?;
            changes.push(Change {
                old_start,
                old_end,
                new_start,
                new_end,
                old_text_size,
                new_text: Text::from_code_units(units),
                preceding_old_text_size: 0,
                preceding_new_text_size: 0,
            });
        }
        let mut patch = Patch { changes };
        patch.rebuild_preceding_sizes();
        Some(patch)
    }

    // The old-space position of a new-space position lying in the gap before
    // the change at `index`.
    fn old_position_for_new(&self, position: Point, index: usize) -> Point {
        if index == 0 {
            return position;
        }
        let previous = &self.changes[index - 1];
        previous
            .old_end
            .traverse(position.traversal(previous.new_end))
    }

    fn rebuild_preceding_sizes(&mut self) {
        let mut old_total = 0;
        let mut new_total = 0;
        for change in &mut self.changes {
            change.preceding_old_text_size = old_total;
            change.preceding_new_text_size = new_total;
            old_total += change.old_text_size;
            new_total += change.new_text.size();
        }
    }
}
