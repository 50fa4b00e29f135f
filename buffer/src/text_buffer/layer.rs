use std::cell::Cell;
use std::rc::Rc;

use crate::patch::Patch;
use crate::point::Point;
use crate::range::Range;
use crate::text::{ClipResult, Text, TextSlice, CR, LF};

/// What a layer reads through where its own patch has no change: the base
/// text for the first layer, the layer below otherwise. The two cases are
/// closed, so queries dispatch with a plain match instead of a vtable.
#[derive(Debug)]
pub(crate) enum Parent {
    Base(Rc<Text>),
    Layer(Rc<Layer>),
}

impl Parent {
    fn size(&self) -> u32 {
        match self {
            Parent::Base(text) => text.size(),
            Parent::Layer(layer) => layer.size,
        }
    }

    fn character_at(&self, position: Point) -> u16 {
        match self {
            Parent::Base(text) => text.at(position),
            Parent::Layer(layer) => layer.character_at(position),
        }
    }

    fn clip_position(&self, position: Point) -> ClipResult {
        match self {
            Parent::Base(text) => text.clip_position(position),
            Parent::Layer(layer) => layer.clip_position(position),
        }
    }

    fn for_each_chunk_in_range<'a, F>(&'a self, start: Point, end: Point, callback: &mut F) -> bool
    where
        F: FnMut(TextSlice<'a>) -> bool,
    {
        match self {
            Parent::Base(text) => {
                let slice = TextSlice::from(text.as_ref()).slice(Range::new(start, end));
                if slice.is_empty() {
                    false
                } else {
                    callback(slice)
                }
            }
            Parent::Layer(layer) => layer.for_each_chunk_in_range(start, end, callback),
        }
    }
}

#[inline]
fn previous_column(position: Point) -> Point {
    debug_assert!(position.column > 0, "no column before {}", position);
    Point::new(position.row, position.column - 1)
}

/// One level of the patch stack. The patch maps the parent's coordinate
/// space to this layer's; `extent` and `size` cache the totals of the
/// post-patch view. Only the buffer's top layer is ever edited; layers
/// shared behind `Rc` change nothing but their two cells.
#[derive(Debug)]
pub(crate) struct Layer {
    pub(crate) parent: Parent,
    pub(crate) patch: Patch,
    pub(crate) extent: Point,
    pub(crate) size: u32,
    pub(crate) snapshot_count: Cell<u32>,
    pub(crate) is_last: Cell<bool>,
}

impl Layer {
    pub(crate) fn first(base_text: Rc<Text>) -> Layer {
        let extent = base_text.extent();
        let size = base_text.size();
        Layer {
            parent: Parent::Base(base_text),
            patch: Patch::new(),
            extent,
            size,
            snapshot_count: Cell::new(0),
            is_last: Cell::new(true),
        }
    }

    pub(crate) fn above(parent: Rc<Layer>) -> Layer {
        let extent = parent.extent;
        let size = parent.size;
        Layer {
            parent: Parent::Layer(parent),
            patch: Patch::new(),
            extent,
            size,
            snapshot_count: Cell::new(0),
            is_last: Cell::new(true),
        }
    }

    #[inline]
    pub(crate) fn is_first(&self) -> bool {
        matches!(self.parent, Parent::Base(_))
    }

    pub(crate) fn character_at(&self, position: Point) -> u16 {
        match self.patch.find_change_for_new_position(position) {
            None => self.parent.character_at(position),
            Some(change) => {
                if position < change.new_end {
                    change.new_text.at(position.traversal(change.new_start))
                } else {
                    self.parent.character_at(
                        change.old_end.traverse(position.traversal(change.new_end)),
                    )
                }
            }
        }
    }

    /// Snaps `position` onto the nearest valid boundary of this layer's view
    /// and returns it with its code-unit offset.
    ///
    /// Positions inside an insertion clip against the inserted text;
    /// positions after one clip against the parent and are translated back.
    /// The two CRLF stitches keep a CR and an LF that ended up adjacent
    /// across an edit boundary collapsed into a single logical position.
    pub(crate) fn clip_position(&self, position: Point) -> ClipResult {
        // The top layer clips through the boundary-inclusive query so a
        // position at the tail of an insertion stays attached to it.
        let preceding_change = if self.is_last.get() {
            self.patch.change_for_new_position(position)
        } else {
            self.patch.find_change_for_new_position(position)
        };
        let Some(change) = preceding_change else {
            return self.parent.clip_position(position);
        };

        let base_offset = self.parent.clip_position(change.old_start).offset;
        let current_offset =
            base_offset - change.preceding_old_text_size + change.preceding_new_text_size;

        if position < change.new_end {
            let within = change
                .new_text
                .clip_position(position.traversal(change.new_start));

            // An insertion leading with LF merges onto a parent CR that ends
            // directly before it.
            if within.offset == 0
                && change.old_start.column > 0
                && change.new_text.first_unit() == Some(LF)
                && self.parent.character_at(previous_column(change.old_start)) == CR
            {
                return ClipResult {
                    position: previous_column(change.new_start),
                    offset: current_offset - 1,
                };
            }

            ClipResult {
                position: change.new_start.traverse(within.position),
                offset: current_offset + within.offset,
            }
        } else {
            let base_location = self
                .parent
                .clip_position(change.old_end.traverse(position.traversal(change.new_end)));
            let distance_position = base_location.position.traversal(change.old_end);
            let distance_offset = base_location.offset - (base_offset + change.old_text_size);

            // An insertion trailing with CR (or a deletion exposing one)
            // merges with a parent LF that follows directly after it.
            if distance_offset == 0 && base_location.offset < self.parent.size() {
                let previous_character = if change.new_text.size() > 0 {
                    change.new_text.last_unit()
                } else if change.old_start.column > 0 {
                    Some(self.parent.character_at(previous_column(change.old_start)))
                } else {
                    None
                };
                if previous_character == Some(CR)
                    && self.parent.character_at(base_location.position) == LF
                {
                    return ClipResult {
                        position: previous_column(change.new_end),
                        offset: current_offset + change.new_text.size() - 1,
                    };
                }
            }

            ClipResult {
                position: change.new_end.traverse(distance_position),
                offset: current_offset + change.new_text.size() + distance_offset,
            }
        }
    }

    /// Walks the minimal chunk cover of `[start, end]` in order, emitting
    /// insertion fragments from this layer's patch and delegating the gaps
    /// to the parent. The callback returning `true` aborts the walk.
    pub(crate) fn for_each_chunk_in_range<'a, F>(
        &'a self,
        start: Point,
        end: Point,
        callback: &mut F,
    ) -> bool
    where
        F: FnMut(TextSlice<'a>) -> bool,
    {
        let goal_position = self.clip_position(end).position;
        let mut current_position = self.clip_position(start).position;
        let mut base_position = current_position;
        let mut change = self.patch.find_change_for_new_position(current_position);

        while current_position < goal_position {
            if let Some(c) = change {
                if current_position < c.new_end {
                    let slice = TextSlice::from(&c.new_text)
                        .prefix(
                            goal_position
                                .traversal(c.new_start)
                                .min(c.new_end.traversal(c.new_start)),
                        )
                        .suffix(current_position.traversal(c.new_start));
                    if !slice.is_empty() && callback(slice) {
                        return true;
                    }
                    base_position = c.old_end;
                    current_position = c.new_end;
                    if current_position > goal_position {
                        break;
                    }
                }
                base_position = c.old_end.traverse(current_position.traversal(c.new_end));
            }

            change = self.patch.find_change_ending_after_new_position(current_position);

            let (next_base_position, next_position) = match change {
                Some(next) => (
                    base_position
                        .traverse(goal_position.traversal(current_position))
                        .min(next.old_start),
                    goal_position.min(next.new_start),
                ),
                None => (
                    base_position.traverse(goal_position.traversal(current_position)),
                    goal_position,
                ),
            };

            if base_position < next_base_position
                && self
                    .parent
                    .for_each_chunk_in_range(base_position, next_base_position, callback)
            {
                return true;
            }
            base_position = next_base_position;
            current_position = next_position;
        }

        false
    }

    /// The point at `goal_offset`, clamped to the end of the view.
    pub(crate) fn position_for_offset(&self, goal_offset: u32) -> Point {
        let mut position = Point::zero();
        let mut offset = 0;
        self.for_each_chunk_in_range(Point::zero(), self.extent, &mut |slice| {
            let size = slice.size();
            if offset + size >= goal_offset {
                position = position.traverse(slice.position_for_offset(goal_offset - offset));
                return true;
            }
            position = position.traverse(slice.extent());
            offset += size;
            false
        });
        position
    }

    pub(crate) fn text_in_range(&self, range: Range) -> Text {
        let mut result = Text::new();
        self.for_each_chunk_in_range(range.start, range.end, &mut |slice| {
            result.append(slice);
            false
        });
        result
    }

    pub(crate) fn chunks_in_range(&self, range: Range) -> Vec<TextSlice<'_>> {
        let mut chunks = Vec::new();
        self.for_each_chunk_in_range(range.start, range.end, &mut |slice| {
            chunks.push(slice);
            false
        });
        chunks
    }

    /// Replaces `old_range` of this layer's view with `new_text`, recording
    /// the edit in the patch and updating the cached totals. Must only be
    /// called on the buffer's top layer.
    pub(crate) fn set_text_in_range(&mut self, old_range: Range, new_text: Text) {
        debug_assert!(self.is_last.get());
        let start = self.clip_position(old_range.start);
        let end = self.clip_position(old_range.end.max(old_range.start));
        let deleted_text_size = end.offset - start.offset;
        let deletion_extent = end.position.traversal(start.position);
        let insertion_extent = new_text.extent();

        self.extent = start
            .position
            .traverse(insertion_extent)
            .traverse(self.extent.traversal(end.position));
        self.size = self.size - deleted_text_size + new_text.size();
        self.patch.splice(
            start.position,
            deletion_extent,
            insertion_extent,
            new_text,
            deleted_text_size,
        );
    }
}
