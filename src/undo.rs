//! The undo/redo engine
//!
//! Each recorded step is a position plus a signed length: positive
//! means "insert the next `len` bytes of the undo stream here" (the
//! inverse of a deletion), negative means "delete `len` bytes here"
//! (the inverse of an insertion). While an undo chain is open, the
//! position is stored negated-and-biased (`-pos - 1`); closing the
//! chain clears the flag on the final step, so a whole chain replays
//! as one unit.

use crate::buffer::Buffer;
use crate::constants::{STD_UNDO_STEP_SIZE, STD_UNDO_STREAM_SIZE};
use crate::edit::{delete_stream, insert_stream};
use crate::error::{Result, Status};
use crate::movement::{goto_line, goto_pos};
use crate::stream::CharStream;
use crate::syntax::update_syntax_states_from;

#[derive(Debug, Clone, Copy)]
pub struct UndoStep {
    pub line: i64,
    /// Negative values encode "chained with the following step" as
    /// `-pos - 1`.
    pub pos: i64,
    pub len: i64,
}

impl UndoStep {
    pub fn real_pos(&self) -> i64 {
        if self.pos >= 0 {
            self.pos
        } else {
            -(self.pos + 1)
        }
    }

    pub fn is_chained(&self) -> bool {
        self.pos < 0
    }
}

#[derive(Default)]
pub struct UndoBuffer {
    pub steps: Vec<UndoStep>,
    streams: Vec<u8>,
    /// Bytes deleted while undoing, consumed by redo.
    pub redo: CharStream,
    pub cur_step: usize,
    pub last_step: usize,
    pub cur_stream: usize,
    pub last_stream: usize,
    /// Step index corresponding to the last save, or -1 when that
    /// state was lost to a discarded redo branch.
    pub last_save_step: i64,
}

impl UndoBuffer {
    /// Records a step. Any redo branch beyond the current step is
    /// discarded, and the saved-state marker is invalidated if it lay
    /// in the discarded range.
    pub fn add_step(&mut self, line: i64, pos: i64, len: i64, linked: bool) {
        if self.last_save_step > self.cur_step as i64 {
            self.last_save_step = -1;
        }
        self.steps.truncate(self.cur_step);
        if self.steps.capacity() == self.steps.len() {
            self.steps.reserve(STD_UNDO_STEP_SIZE);
        }
        self.steps.push(UndoStep {
            line,
            pos: if linked { -pos - 1 } else { pos },
            len,
        });
        self.cur_step += 1;
        self.last_step = self.cur_step;
        self.streams.truncate(self.cur_stream);
        self.last_stream = self.cur_stream;
        self.redo.reset();
    }

    /// Adjusts the length of the last step; `delete_stream` cannot know
    /// the exact deletion length until it has run into end-of-buffer.
    pub fn fix_last_step(&mut self, delta: i64) {
        if self.cur_step > 0 {
            self.steps[self.cur_step - 1].len += delta;
        }
    }

    /// Appends bytes backing the last recorded deletion step.
    pub fn add_to_stream(&mut self, block: &[u8]) {
        debug_assert!(self.cur_step > 0 && self.steps[self.cur_step - 1].len > 0);
        if self.streams.capacity() - self.streams.len() < block.len() {
            self.streams.reserve(block.len() + STD_UNDO_STREAM_SIZE);
        }
        self.streams.extend_from_slice(block);
        self.cur_stream += block.len();
        self.last_stream = self.cur_stream;
    }

    pub fn reset(&mut self) {
        self.steps = Vec::new();
        self.streams = Vec::new();
        self.cur_step = 0;
        self.last_step = 0;
        self.cur_stream = 0;
        self.last_stream = 0;
        self.last_save_step = 0;
        self.redo.reset();
    }
}

/// Opens an undo chain. Chains nest; only the outermost close clears
/// the link flag on the final step.
pub fn start_undo_chain(b: &mut Buffer) {
    b.link_undos += 1;
}

/// Closes an undo chain, unflagging the last step once the nesting
/// counter reaches zero.
pub fn end_undo_chain(b: &mut Buffer) {
    b.link_undos -= 1;
    if b.link_undos > 0 {
        return;
    }
    let ub = &mut b.undo;
    if ub.cur_step > 0 && ub.steps[ub.cur_step - 1].pos < 0 {
        ub.steps[ub.cur_step - 1].pos = -(1 + ub.steps[ub.cur_step - 1].pos);
    }
}

/// Undoes the current step and, while the step below is chain-flagged,
/// keeps going so a whole chain reverts as one.
pub fn undo(b: &mut Buffer) -> Result {
    if b.undo.cur_step == 0 {
        return Err(Status::NothingToUndo);
    }

    // insert_stream and delete_stream behave differently while the
    // undoing flag is set: deleted bytes feed the redo stream and no
    // new steps are recorded.
    b.undoing = true;

    loop {
        b.undo.cur_step -= 1;
        let step = b.undo.steps[b.undo.cur_step];

        if step.len != 0 {
            goto_line(b, step.line as usize);
            goto_pos(b, step.real_pos() as usize);

            if step.len < 0 {
                let r = delete_stream(b, b.cur_line_id, b.cur_line, b.cur_pos, (-step.len) as usize);
                update_syntax_states_from(b, b.cur_line_id, b.cur_line);
                if let Err(e) = r {
                    b.undoing = false;
                    return Err(e);
                }
            } else {
                let len = step.len as usize;
                b.undo.cur_stream -= len;
                let bytes = b.undo.streams[b.undo.cur_stream..b.undo.cur_stream + len].to_vec();
                let r = insert_stream(b, b.cur_line_id, b.cur_line, b.cur_pos, &bytes);
                update_syntax_states_from(b, b.cur_line_id, b.cur_line);
                if let Err(e) = r {
                    b.undoing = false;
                    return Err(e);
                }
            }
        }

        if !(b.undo.cur_step > 0 && b.undo.steps[b.undo.cur_step - 1].is_chained()) {
            break;
        }
    }

    b.undoing = false;
    Ok(())
}

/// Redoes the last undone step (or chain), consuming the redo stream
/// that `undo` filled.
pub fn redo(b: &mut Buffer) -> Result {
    if b.undo.cur_step == b.undo.last_step {
        return Err(Status::NothingToRedo);
    }

    b.redoing = true;

    loop {
        let step = b.undo.steps[b.undo.cur_step];

        if step.len != 0 {
            goto_line(b, step.line as usize);
            goto_pos(b, step.real_pos() as usize);

            if step.len < 0 {
                // The original operation was an insertion; re-insert
                // the bytes undo stashed in the redo stream.
                let len = (-step.len) as usize;
                let new_len = b.undo.redo.len() - len;
                let bytes = b.undo.redo.as_bytes()[new_len..].to_vec();
                b.undo.redo.delete_at(new_len, len);
                let r = insert_stream(b, b.cur_line_id, b.cur_line, b.cur_pos, &bytes);
                update_syntax_states_from(b, b.cur_line_id, b.cur_line);
                if let Err(e) = r {
                    b.redoing = false;
                    return Err(e);
                }
            } else {
                let r = delete_stream(b, b.cur_line_id, b.cur_line, b.cur_pos, step.len as usize);
                b.undo.cur_stream += step.len as usize;
                update_syntax_states_from(b, b.cur_line_id, b.cur_line);
                if let Err(e) = r {
                    b.redoing = false;
                    return Err(e);
                }
            }
        }

        b.undo.cur_step += 1;

        if !(b.undo.cur_step < b.undo.last_step && b.undo.steps[b.undo.cur_step - 1].is_chained()) {
            break;
        }
    }

    b.redoing = false;
    Ok(())
}
