//! The buffer: pools, line list, cursor, mark, bookmarks, undo, options
//!
//! A buffer owns a character pool set and a line arena; the line list
//! always holds at least one (possibly empty) line. The cursor is kept
//! both as a byte position in the current line and as window-relative
//! coordinates; `win_x` is always a multiple of the tab size.

pub mod io;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::rc::Rc;

use crate::character::{calc_char_len, calc_pos, calc_width};
use crate::constants::{DEFAULT_COLS, DEFAULT_ROWS, DEFAULT_TAB_SIZE, NUM_BOOKMARKS};
use crate::encoding::{detect_encoding, Encoding};
use crate::line::{LineArena, LineId, HEAD};
use crate::pool::PoolSet;
use crate::stream::CharStream;
use crate::syntax::{Attr, HighlightState, Syntax};
use crate::undo::UndoBuffer;

/// Per-document options, saved and restored by the prefs stack.
#[derive(Debug, Clone)]
pub struct Options {
    pub cur_clip: i64,
    pub tab_size: i64,
    pub right_margin: i64,
    /// Editing is free form: the cursor may sit past end-of-line.
    pub free_form: bool,
    pub word_wrap: bool,
    pub auto_indent: bool,
    /// Carriage returns are data, not line terminators.
    pub preserve_cr: bool,
    pub insert: bool,
    pub do_undo: bool,
    pub auto_prefs: bool,
    pub no_file_req: bool,
    pub read_only: bool,
    pub search_back: bool,
    pub case_search: bool,
    /// TAB key inserts TAB characters rather than spaces.
    pub tabs: bool,
    /// Deleting into space runs collapses whole tab stops.
    pub del_tabs: bool,
    pub shift_tabs: bool,
    /// Bracket-match display mode, 0-15.
    pub automatch: i64,
    pub binary: bool,
    pub utf8auto: bool,
    pub visual_bell: bool,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            cur_clip: 0,
            tab_size: DEFAULT_TAB_SIZE,
            right_margin: 0,
            free_form: false,
            word_wrap: false,
            auto_indent: false,
            preserve_cr: false,
            insert: true,
            do_undo: true,
            auto_prefs: true,
            no_file_req: false,
            read_only: false,
            search_back: false,
            case_search: false,
            tabs: true,
            del_tabs: false,
            shift_tabs: true,
            automatch: 1,
            binary: false,
            utf8auto: true,
            visual_bell: false,
        }
    }
}

/// A saved position, plus the screen row it was set on so a jump back
/// can restore the vertical context.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bookmark {
    pub line: usize,
    pub pos: usize,
    pub cur_y: i64,
}

pub struct Buffer {
    pub(crate) pools: PoolSet,
    pub(crate) lines: LineArena,
    pub num_lines: usize,

    // Cursor and viewport. cur_line == win_y + cur_y.
    pub cur_line: usize,
    pub cur_line_id: LineId,
    pub top_line_id: LineId,
    pub cur_pos: usize,
    pub cur_char: usize,
    pub cur_x: usize,
    pub cur_y: usize,
    pub win_x: usize,
    pub win_y: usize,
    /// Sticky desired column across vertical motion over ragged lines.
    pub wanted_x: usize,
    pub x_wanted: bool,
    /// Sticky desired line/screen-row pair across paging.
    pub wanted_y: i64,
    pub wanted_cur_y: i64,
    pub y_wanted: bool,

    /// Text window geometry, updated through resize notifications.
    pub rows: usize,
    pub cols: usize,

    // Mark (block anchor).
    pub marking: bool,
    pub mark_is_vertical: bool,
    pub block_start_line: usize,
    pub block_start_pos: usize,

    pub bookmarks: [Bookmark; NUM_BOOKMARKS],
    pub bookmark_mask: u32,
    pub cur_bookmark: usize,

    pub encoding: Encoding,
    pub is_crlf: bool,
    pub is_modified: bool,
    pub filename: Option<PathBuf>,

    // Search state.
    pub find_string: Option<Vec<u8>>,
    pub replace_string: Option<Vec<u8>>,
    pub last_was_regexp: bool,
    pub last_was_replace: bool,
    /// Compile tag compared against the engine serial; 1 forces a
    /// recompile.
    pub find_string_changed: u32,

    pub undo: UndoBuffer,
    pub link_undos: u32,
    pub undoing: bool,
    pub redoing: bool,
    pub atomic_undo: bool,

    pub opt: Options,
    /// Only option-changing commands may execute (prefs loading).
    pub exec_only_options: bool,

    // Syntax.
    pub syn: Option<Rc<Syntax>>,
    /// Cached attributes of the current line, if `attr_valid`.
    pub attr_buf: Vec<Attr>,
    pub attr_valid: bool,
    /// State after the current line, valid with `attr_valid`.
    pub next_state: HighlightState,

    // Macro recording.
    pub cur_macro: CharStream,
    pub recording: bool,
    pub executing_internal_macro: bool,

    /// Stream holding the last deleted line, for UndelLine.
    pub last_deleted: Option<CharStream>,
}

impl Buffer {
    /// Creates an empty buffer with one empty line. `syntax_enabled`
    /// decides once whether line descriptors carry highlight snapshots.
    pub fn new(syntax_enabled: bool) -> Buffer {
        let mut lines = LineArena::new(syntax_enabled);
        let first = lines.alloc();
        lines.link_after(first, HEAD);
        Buffer {
            pools: PoolSet::new(),
            lines,
            num_lines: 1,
            cur_line: 0,
            cur_line_id: first,
            top_line_id: first,
            cur_pos: 0,
            cur_char: 0,
            cur_x: 0,
            cur_y: 0,
            win_x: 0,
            win_y: 0,
            wanted_x: 0,
            x_wanted: false,
            wanted_y: 0,
            wanted_cur_y: 0,
            y_wanted: false,
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            marking: false,
            mark_is_vertical: false,
            block_start_line: 0,
            block_start_pos: 0,
            bookmarks: [Bookmark::default(); NUM_BOOKMARKS],
            bookmark_mask: 0,
            cur_bookmark: 0,
            encoding: Encoding::Ascii,
            is_crlf: false,
            is_modified: false,
            filename: None,
            find_string: None,
            replace_string: None,
            last_was_regexp: false,
            last_was_replace: false,
            find_string_changed: 1,
            undo: UndoBuffer::default(),
            link_undos: 0,
            undoing: false,
            redoing: false,
            atomic_undo: false,
            opt: Options::default(),
            exec_only_options: false,
            syn: None,
            attr_buf: Vec::new(),
            attr_valid: false,
            next_state: HighlightState::initial(),
            cur_macro: CharStream::new(),
            recording: false,
            executing_internal_macro: false,
            last_deleted: None,
        }
    }

    /// A new buffer inheriting the user-level options of `other`, the
    /// way a freshly opened document picks up the current settings.
    pub fn new_like(other: &Buffer) -> Buffer {
        let mut b = Buffer::new(other.lines_carry_highlight());
        b.opt = other.opt.clone();
        b.opt.read_only = false;
        b.opt.search_back = false;
        b.rows = other.rows;
        b.cols = other.cols;
        b
    }

    pub fn lines_carry_highlight(&self) -> bool {
        self.lines.with_highlight()
    }

    /// Drops all content, pools and undo state, leaving one empty line.
    /// Search strings and the current macro survive.
    pub fn clear(&mut self) {
        self.pools = PoolSet::new();
        self.lines.clear();
        let first = self.lines.alloc();
        self.lines.link_after(first, HEAD);
        if let Some(h) = &mut self.lines.get_mut(first).highlight {
            *h = HighlightState::initial();
        }
        self.num_lines = 1;
        self.is_crlf = false;
        self.encoding = Encoding::Ascii;
        self.bookmark_mask = 0;
        self.last_deleted = None;
        self.undo.reset();
        self.is_modified = false;
        self.marking = false;
        self.reset_position_to_sof();
        self.cur_line_id = first;
        self.top_line_id = first;
    }

    /// Zeroes every cursor/viewport coordinate without any update.
    pub fn reset_position_to_sof(&mut self) {
        self.x_wanted = false;
        self.y_wanted = false;
        self.win_x = 0;
        self.win_y = 0;
        self.cur_x = 0;
        self.cur_y = 0;
        self.cur_line = 0;
        self.cur_pos = 0;
        self.cur_char = 0;
        self.attr_valid = false;
        self.cur_line_id = self.lines.first();
        self.top_line_id = self.lines.first();
    }

    /// The bytes of a line.
    pub fn line_bytes(&self, id: LineId) -> &[u8] {
        match self.lines.get(id).line {
            Some(span) => self.pools.span_bytes(span),
            None => &[],
        }
    }

    pub fn line_len(&self, id: LineId) -> usize {
        self.lines.get(id).len()
    }

    pub fn cur_line_bytes(&self) -> &[u8] {
        self.line_bytes(self.cur_line_id)
    }

    pub fn cur_line_len(&self) -> usize {
        self.line_len(self.cur_line_id)
    }

    /// Returns the descriptor id of line `n`, walking from whichever of
    /// head, tail or cursor is nearest, so the cost is
    /// `min(n, N-n, |n - cur_line|)`.
    pub fn nth_line_id(&self, n: usize) -> Option<LineId> {
        if n >= self.num_lines {
            return None;
        }
        let best_absolute = n.min(self.num_lines - 1 - n);
        let relative = self.cur_line.abs_diff(n);

        let mut id;
        if best_absolute < relative {
            if n < self.num_lines / 2 {
                id = self.lines.first();
                for _ in 0..n {
                    id = self.lines.next(id);
                }
            } else {
                id = self.lines.last();
                for _ in 0..self.num_lines - 1 - n {
                    id = self.lines.prev(id);
                }
            }
        } else {
            id = self.cur_line_id;
            if n < self.cur_line {
                for _ in 0..self.cur_line - n {
                    id = self.lines.prev(id);
                }
            } else {
                for _ in 0..n - self.cur_line {
                    id = self.lines.next(id);
                }
            }
        }
        Some(id)
    }

    /// Display width of the first `pos` bytes of a line.
    pub fn width_to(&self, id: LineId, pos: usize) -> usize {
        calc_width(
            self.line_bytes(id),
            pos,
            self.opt.tab_size as usize,
            self.encoding,
        )
    }

    /// Byte position in a line of display column `x`.
    pub fn pos_at(&self, id: LineId, x: usize) -> usize {
        calc_pos(
            self.line_bytes(id),
            x,
            self.opt.tab_size as usize,
            self.encoding,
        )
    }

    /// Character count of a line.
    pub fn char_len(&self, id: LineId) -> usize {
        calc_char_len(self.line_bytes(id), self.encoding)
    }

    /// Detects the encoding of the whole buffer content.
    pub fn detect_buffer_encoding(&self) -> Encoding {
        let mut encoding = Encoding::Ascii;
        for id in self.lines.iter() {
            let e = detect_encoding(self.line_bytes(id));
            if e != Encoding::Ascii {
                if encoding == Encoding::Ascii {
                    encoding = e;
                }
                if e == Encoding::Byte8 {
                    encoding = Encoding::Byte8;
                }
            }
        }
        encoding
    }

    /// True when the buffer is a single empty line.
    pub fn is_empty(&self) -> bool {
        self.num_lines == 1 && self.lines.get(self.lines.first()).is_empty()
    }

    /// Bytes in use across all pools; equals the sum of line lengths.
    pub fn used_chars(&self) -> usize {
        self.pools.allocated_chars - self.pools.free_chars
    }

    /// Free bytes trapped inside pool used-regions.
    pub fn lost_chars(&self) -> usize {
        self.pools.lost_chars()
    }

    /// The whole content as one byte vector with `\n` separators.
    /// Handy for tests and the filter pipe.
    pub fn content_string(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut first = true;
        for id in self.lines.iter() {
            if !first {
                out.push(b'\n');
            }
            out.extend_from_slice(self.line_bytes(id));
            first = false;
        }
        out
    }

    /// One line as an owned vector.
    pub fn line_vec(&self, n: usize) -> Vec<u8> {
        self.nth_line_id(n)
            .map(|id| self.line_bytes(id).to_vec())
            .unwrap_or_default()
    }

    /// The column the cursor shows at.
    pub fn cur_column(&self) -> usize {
        self.win_x + self.cur_x
    }

    /// Updates the window geometry. The tab size is clamped so it stays
    /// below half the width, and the cursor is pulled back on screen by
    /// the caller via `keep_cursor_on_screen`.
    pub fn set_window_size(&mut self, rows: usize, cols: usize) {
        self.rows = rows.max(2);
        self.cols = cols.max(4);
    }
}
