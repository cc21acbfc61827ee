//! Line descriptors and the line arena
//!
//! A line descriptor pairs a [`Span`] into a character pool with an
//! optional highlight-state snapshot. Descriptors live in an arena with
//! an intrusive free list and are linked into a doubly-linked list with
//! head and tail sentinels, so splicing a line in or out is O(1) and a
//! buffer always has somewhere to hang an empty line.

use crate::pool::Span;
use crate::syntax::HighlightState;

/// Index of a line descriptor in the arena.
pub type LineId = usize;

/// The arena slot reserved for the list head sentinel.
pub const HEAD: LineId = 0;
/// The arena slot reserved for the list tail sentinel.
pub const TAIL: LineId = 1;

const NIL: usize = usize::MAX;

#[derive(Debug, Clone)]
pub struct LineDesc {
    pub prev: LineId,
    pub next: LineId,
    /// `None` iff the line is empty.
    pub line: Option<Span>,
    /// Initial highlight state for this line; `None` when the owning
    /// buffer has highlighting disabled, invalid on fresh descriptors.
    pub highlight: Option<HighlightState>,
}

impl LineDesc {
    pub fn len(&self) -> usize {
        self.line.map_or(0, |s| s.len)
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_none()
    }
}

/// Arena of line descriptors plus the sentinel-delimited line list.
pub struct LineArena {
    slots: Vec<LineDesc>,
    free_head: usize,
    /// Whether fresh descriptors carry a (invalid) highlight snapshot.
    with_highlight: bool,
}

impl LineArena {
    pub fn new(with_highlight: bool) -> LineArena {
        let mut arena = LineArena {
            slots: Vec::new(),
            free_head: NIL,
            with_highlight,
        };
        // Sentinels: head links to tail and back.
        arena.slots.push(LineDesc {
            prev: NIL,
            next: TAIL,
            line: None,
            highlight: None,
        });
        arena.slots.push(LineDesc {
            prev: HEAD,
            next: NIL,
            line: None,
            highlight: None,
        });
        arena
    }

    pub fn get(&self, id: LineId) -> &LineDesc {
        &self.slots[id]
    }

    pub fn get_mut(&mut self, id: LineId) -> &mut LineDesc {
        &mut self.slots[id]
    }

    /// The first real line, or `TAIL` if the list is empty.
    pub fn first(&self) -> LineId {
        self.slots[HEAD].next
    }

    /// The last real line, or `HEAD` if the list is empty.
    pub fn last(&self) -> LineId {
        self.slots[TAIL].prev
    }

    pub fn next(&self, id: LineId) -> LineId {
        self.slots[id].next
    }

    pub fn prev(&self, id: LineId) -> LineId {
        self.slots[id].prev
    }

    pub fn is_tail(&self, id: LineId) -> bool {
        id == TAIL
    }

    pub fn is_head(&self, id: LineId) -> bool {
        id == HEAD
    }

    /// True if `id` is the last real line of the list.
    pub fn is_last(&self, id: LineId) -> bool {
        self.slots[id].next == TAIL
    }

    /// Allocates a descriptor off the free list (or a new slot). The
    /// descriptor starts empty, unlinked, and with an invalid highlight
    /// state so the first paint recomputes it.
    pub fn alloc(&mut self) -> LineId {
        let highlight = if self.with_highlight {
            Some(HighlightState::invalid())
        } else {
            None
        };
        if self.free_head != NIL {
            let id = self.free_head;
            self.free_head = self.slots[id].next;
            self.slots[id] = LineDesc {
                prev: NIL,
                next: NIL,
                line: None,
                highlight,
            };
            id
        } else {
            self.slots.push(LineDesc {
                prev: NIL,
                next: NIL,
                line: None,
                highlight,
            });
            self.slots.len() - 1
        }
    }

    /// Splices `id` into the list right after `after`.
    pub fn link_after(&mut self, id: LineId, after: LineId) {
        let next = self.slots[after].next;
        self.slots[id].prev = after;
        self.slots[id].next = next;
        self.slots[after].next = id;
        self.slots[next].prev = id;
    }

    /// Unlinks `id` from the list (it stays allocated).
    pub fn unlink(&mut self, id: LineId) {
        let LineDesc { prev, next, .. } = self.slots[id];
        self.slots[prev].next = next;
        self.slots[next].prev = prev;
        self.slots[id].prev = NIL;
        self.slots[id].next = NIL;
    }

    /// Returns a descriptor to the free list.
    pub fn free(&mut self, id: LineId) {
        debug_assert!(id != HEAD && id != TAIL);
        self.slots[id].line = None;
        self.slots[id].prev = NIL;
        self.slots[id].next = self.free_head;
        self.free_head = id;
    }

    /// Whether descriptors from this arena carry highlight snapshots.
    pub fn with_highlight(&self) -> bool {
        self.with_highlight
    }

    /// Drops every line and resets the arena to two bare sentinels.
    pub fn clear(&mut self) {
        let with_highlight = self.with_highlight;
        *self = LineArena::new(with_highlight);
    }

    /// Iterates line ids from `from` forward, excluding the tail.
    pub fn iter_from(&self, from: LineId) -> LineIter<'_> {
        LineIter { arena: self, cur: from }
    }

    pub fn iter(&self) -> LineIter<'_> {
        self.iter_from(self.first())
    }
}

pub struct LineIter<'a> {
    arena: &'a LineArena,
    cur: LineId,
}

impl Iterator for LineIter<'_> {
    type Item = LineId;

    fn next(&mut self) -> Option<LineId> {
        if self.arena.is_tail(self.cur) {
            return None;
        }
        let id = self.cur;
        self.cur = self.arena.next(id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_and_iterate() {
        let mut arena = LineArena::new(false);
        let a = arena.alloc();
        arena.link_after(a, HEAD);
        let b = arena.alloc();
        arena.link_after(b, a);
        let c = arena.alloc();
        arena.link_after(c, a);
        let order: Vec<LineId> = arena.iter().collect();
        assert_eq!(order, vec![a, c, b]);
        assert!(arena.is_last(b));
    }

    #[test]
    fn test_unlink_and_reuse() {
        let mut arena = LineArena::new(false);
        let a = arena.alloc();
        arena.link_after(a, HEAD);
        let b = arena.alloc();
        arena.link_after(b, a);
        arena.unlink(a);
        arena.free(a);
        assert_eq!(arena.iter().collect::<Vec<_>>(), vec![b]);
        let c = arena.alloc();
        assert_eq!(c, a, "freed slot is reused");
    }

    #[test]
    fn test_highlight_invalid_on_alloc() {
        let mut arena = LineArena::new(true);
        let a = arena.alloc();
        assert!(arena.get(a).highlight.as_ref().unwrap().is_invalid());
    }
}
