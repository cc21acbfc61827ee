//! The clip registry: numbered cut/paste streams
//!
//! Clips live on a process-wide list keyed by number. A clip filled by
//! a linear copy holds the region between cursor and mark with one NUL
//! per interior line boundary; a vertical copy holds one NUL-terminated
//! entry per row of the rectangle. Copies are built aside and swapped
//! in, so a failed copy leaves the previous clip intact.

#[cfg(test)]
mod tests;

use std::path::Path;

use crate::buffer::Buffer;
use crate::edit::{delete_stream, insert_one_line, insert_spaces, insert_stream};
use crate::encoding::Encoding;
use crate::error::{Result, Status};
use crate::movement::{goto_column, goto_line};
use crate::stream::CharStream;
use crate::undo::{end_undo_chain, start_undo_chain};

pub struct Clip {
    pub n: i64,
    pub stream: CharStream,
}

/// Ordered list of clips; a freshly written clip moves to the head.
#[derive(Default)]
pub struct ClipRegistry {
    clips: Vec<Clip>,
}

impl ClipRegistry {
    pub fn new() -> ClipRegistry {
        ClipRegistry::default()
    }

    pub fn get(&self, n: i64) -> Option<&Clip> {
        self.clips.iter().find(|c| c.n == n)
    }

    pub fn get_mut(&mut self, n: i64) -> Option<&mut Clip> {
        self.clips.iter_mut().find(|c| c.n == n)
    }

    /// Replaces (or creates) clip `n` with a new stream.
    pub fn put(&mut self, n: i64, stream: CharStream) {
        self.clips.retain(|c| c.n != n);
        self.clips.insert(0, Clip { n, stream });
    }

    pub fn remove(&mut self, n: i64) {
        self.clips.retain(|c| c.n != n);
    }
}

/// The linear region between mark and cursor, as (first, last) in
/// document order, where each end is (line, byte-pos).
fn ordered_region(b: &Buffer) -> ((usize, usize), (usize, usize)) {
    let cursor = (b.cur_line, b.cur_pos);
    let mark = (b.block_start_line, b.block_start_pos);
    if cursor > mark {
        (mark, cursor)
    } else {
        (cursor, mark)
    }
}

/// True when mark and cursor delimit nothing: same spot, or both past
/// the end of the same line.
fn degenerate_region(b: &Buffer) -> bool {
    let llen = b.cur_line_len();
    b.cur_line == b.block_start_line
        && (b.cur_pos == b.block_start_pos
            || (b.cur_pos >= llen && b.block_start_pos >= llen))
}

/// Copies the characters between cursor and mark to clip `n`; with
/// `cut` they are removed from the text too (one undo atom).
pub fn copy_to_clip(b: &mut Buffer, clips: &mut ClipRegistry, n: i64, cut: bool) -> Result {
    if !b.marking {
        return Err(Status::MarkBlockFirst);
    }
    if b.block_start_line >= b.num_lines {
        return Err(Status::MarkOutOfBuffer);
    }

    if degenerate_region(b) {
        let mut cs = CharStream::new();
        cs.encoding = Encoding::Ascii;
        clips.put(n, cs);
        return Ok(());
    }

    let ((first_line, first_pos), (last_line, last_pos)) = ordered_region(b);

    // A cut whose region start lies beyond end-of-line first pads with
    // spaces, inside the same undo chain as the deletion. The far end
    // just clamps.
    let mut chaining = false;
    if cut {
        let id = b.nth_line_id(first_line).expect("region in buffer");
        if b.line_len(id) < first_pos {
            chaining = true;
            start_undo_chain(b);
            let llen = b.line_len(id);
            let saved_mark = b.block_start_pos;
            insert_spaces(b, id, first_line, llen, first_pos - llen)?;
            // The mark must not move with the padding.
            b.block_start_pos = saved_mark;
        }
    }

    let mut bytes = Vec::new();
    {
        let mut id = b.nth_line_id(first_line).expect("region in buffer");
        for i in first_line..=last_line {
            let line = b.line_bytes(id);
            let start = if i == first_line {
                first_pos.min(line.len())
            } else {
                0
            };
            let end = if i == last_line {
                last_pos.min(line.len())
            } else {
                line.len()
            };
            if i != first_line {
                bytes.push(0);
            }
            bytes.extend_from_slice(&line[start..end]);
            id = b.lines.next(id);
        }
    }
    let clip_len = bytes.len();
    let mut cs = CharStream::new();
    cs.append(&bytes);
    cs.set_encoding_from_content(b.encoding);
    clips.put(n, cs);

    if cut {
        goto_line(b, first_line);
        let col = b.width_to(b.cur_line_id, first_pos);
        goto_column(b, col);
        delete_stream(b, b.cur_line_id, b.cur_line, b.cur_pos, clip_len)?;
        crate::syntax::update_syntax_states_from(b, b.cur_line_id, b.cur_line);
    }
    if chaining {
        end_undo_chain(b);
    }
    Ok(())
}

/// Erases the marked block without touching any clip.
pub fn erase_block(b: &mut Buffer) -> Result {
    if !b.marking {
        return Err(Status::MarkBlockFirst);
    }
    if b.block_start_line >= b.num_lines {
        return Err(Status::MarkOutOfBuffer);
    }
    if degenerate_region(b) {
        return Ok(());
    }

    let ((first_line, first_pos), (last_line, last_pos)) = ordered_region(b);

    let mut chaining = false;
    {
        let id = b.nth_line_id(first_line).expect("region in buffer");
        if b.line_len(id) < first_pos {
            chaining = true;
            start_undo_chain(b);
            let llen = b.line_len(id);
            let saved_mark = b.block_start_pos;
            insert_spaces(b, id, first_line, llen, first_pos - llen)?;
            b.block_start_pos = saved_mark;
        }
    }

    let mut erase_len = 0;
    {
        let mut id = b.nth_line_id(first_line).expect("region in buffer");
        for i in first_line..=last_line {
            let llen = b.line_len(id);
            let start = if i == first_line { first_pos.min(llen) } else { 0 };
            let end = if i == last_line { last_pos.min(llen) } else { llen };
            erase_len += end - start + 1;
            id = b.lines.next(id);
        }
    }

    goto_line(b, first_line);
    let col = b.width_to(b.cur_line_id, first_pos);
    goto_column(b, col);
    delete_stream(b, b.cur_line_id, b.cur_line, b.cur_pos, erase_len - 1)?;
    if chaining {
        end_undo_chain(b);
    }
    crate::syntax::update_syntax_states_from(b, b.cur_line_id, b.cur_line);
    Ok(())
}

/// Pastes clip `n` at the cursor as a stream; one undo atom. An ASCII
/// buffer is promoted to the clip's encoding.
pub fn paste_to_buffer(b: &mut Buffer, clips: &ClipRegistry, n: i64) -> Result {
    let Some(clip) = clips.get(n) else {
        return Err(Status::ClipDoesntExist);
    };
    if clip.stream.is_empty() {
        return Ok(());
    }
    if clip.stream.encoding != Encoding::Ascii
        && b.encoding != Encoding::Ascii
        && clip.stream.encoding != b.encoding
    {
        return Err(Status::IncompatibleClipEncoding);
    }
    if b.encoding == Encoding::Ascii {
        b.encoding = clip.stream.encoding;
    }

    let bytes = clip.stream.as_bytes().to_vec();
    let ld = b.cur_line_id;
    start_undo_chain(b);
    let r: Result = (|| {
        if b.cur_pos > b.line_len(ld) {
            let llen = b.line_len(ld);
            let shortfall = b.cur_column() - b.width_to(ld, llen);
            insert_spaces(b, ld, b.cur_line, llen, shortfall)?;
        }
        insert_stream(b, ld, b.cur_line, b.cur_pos, &bytes)
    })();
    end_undo_chain(b);
    r?;
    crate::syntax::update_syntax_states_from(b, b.cur_line_id, b.cur_line);
    Ok(())
}

/// The rectangle columns of the vertical mark: (left, right).
fn vertical_columns(b: &Buffer) -> (usize, usize) {
    let mark_id = b.nth_line_id(b.block_start_line).expect("mark in buffer");
    let start_x = b.width_to(mark_id, b.block_start_pos);
    let end_x = b.cur_column();
    (start_x.min(end_x), start_x.max(end_x))
}

/// Copies the rectangle between cursor and mark to clip `n`, one
/// NUL-terminated entry per row; with `cut` each row's slice is
/// deleted too, all one undo atom.
pub fn copy_vert_to_clip(b: &mut Buffer, clips: &mut ClipRegistry, n: i64, cut: bool) -> Result {
    if !b.marking {
        return Err(Status::MarkBlockFirst);
    }
    if b.block_start_line >= b.num_lines {
        return Err(Status::MarkOutOfBuffer);
    }

    if b.cur_pos == b.block_start_pos || degenerate_region(b) {
        let mut cs = CharStream::new();
        cs.encoding = Encoding::Ascii;
        clips.put(n, cs);
        return Ok(());
    }

    let (start_x, end_x) = vertical_columns(b);
    let first_line = b.block_start_line.min(b.cur_line);
    let last_line = b.block_start_line.max(b.cur_line);

    if cut {
        start_undo_chain(b);
    }

    let mut bytes = Vec::new();
    let mut row_spans = Vec::new();
    {
        let mut id = b.nth_line_id(first_line).expect("region in buffer");
        for _ in first_line..=last_line {
            let start_pos = b.pos_at(id, start_x);
            let len = b.pos_at(id, end_x) - start_pos;
            let line = b.line_bytes(id);
            bytes.extend_from_slice(&line[start_pos..start_pos + len]);
            bytes.push(0);
            row_spans.push((id, start_pos, len));
            id = b.lines.next(id);
        }
    }

    if cut {
        for (i, &(id, start_pos, len)) in row_spans.iter().enumerate() {
            if len > 0 {
                delete_stream(b, id, first_line + i, start_pos, len)?;
            }
        }
    }

    let mut cs = CharStream::new();
    cs.append(&bytes);
    cs.set_encoding_from_content(b.encoding);
    clips.put(n, cs);

    if cut {
        let line = b.block_start_line.min(b.cur_line);
        goto_line(b, line);
        let col = b
            .width_to(b.cur_line_id, b.block_start_pos)
            .min(b.cur_column());
        goto_column(b, col);
        end_undo_chain(b);
        crate::syntax::update_syntax_states_from(
            b,
            b.nth_line_id(first_line).expect("still in buffer"),
            first_line,
        );
    }
    Ok(())
}

/// Erases the vertical block without touching any clip.
pub fn erase_vert_block(b: &mut Buffer) -> Result {
    if !b.marking {
        return Err(Status::MarkBlockFirst);
    }
    if b.block_start_line >= b.num_lines {
        return Err(Status::MarkOutOfBuffer);
    }
    if b.cur_pos == b.block_start_pos || degenerate_region(b) {
        return Ok(());
    }

    let (start_x, end_x) = vertical_columns(b);
    let first_line = b.block_start_line.min(b.cur_line);
    let last_line = b.block_start_line.max(b.cur_line);

    start_undo_chain(b);
    let mut id = b.nth_line_id(first_line).expect("region in buffer");
    for i in first_line..=last_line {
        let start_pos = b.pos_at(id, start_x);
        let len = b.pos_at(id, end_x) - start_pos;
        if len > 0 {
            delete_stream(b, id, i, start_pos, len)?;
        }
        id = b.lines.next(id);
    }
    end_undo_chain(b);

    let line = b.block_start_line.min(b.cur_line);
    goto_line(b, line);
    let col = b
        .width_to(b.cur_line_id, b.block_start_pos)
        .min(b.cur_column());
    goto_column(b, col);
    crate::syntax::update_syntax_states_from(
        b,
        b.nth_line_id(first_line).expect("still in buffer"),
        first_line,
    );
    Ok(())
}

/// Vertical paste: each clip entry is inserted at the cursor column on
/// successive lines, padding with spaces when a line is shorter and
/// creating lines at end-of-file; one undo atom.
pub fn paste_vert_to_buffer(b: &mut Buffer, clips: &ClipRegistry, n: i64) -> Result {
    let Some(clip) = clips.get(n) else {
        return Err(Status::ClipDoesntExist);
    };
    if clip.stream.is_empty() {
        return Ok(());
    }
    if clip.stream.encoding != Encoding::Ascii
        && b.encoding != Encoding::Ascii
        && clip.stream.encoding != b.encoding
    {
        return Err(Status::IncompatibleClipEncoding);
    }
    if b.encoding == Encoding::Ascii {
        b.encoding = clip.stream.encoding;
    }

    let x = b.cur_column();
    let segments: Vec<Vec<u8>> = clip.stream.segments().map(|s| s.to_vec()).collect();
    // The stream ends with a terminator per row; the final empty
    // segment is not a row.
    let rows = if clip.stream.as_bytes().last() == Some(&0) {
        &segments[..segments.len() - 1]
    } else {
        &segments[..]
    };

    let mut id = b.cur_line_id;
    let mut line = b.cur_line;
    let start_id = b.cur_line_id;

    start_undo_chain(b);
    let r: Result = (|| {
        for seg in rows {
            if b.lines.is_tail(id) {
                let prev = b.lines.prev(id);
                let plen = b.line_len(prev);
                insert_one_line(b, prev, line - 1, plen)?;
                id = b.lines.next(prev);
            }

            if !seg.is_empty() {
                let (pos, width) = {
                    let bytes = b.line_bytes(id);
                    let tab = b.opt.tab_size as usize;
                    let enc = b.encoding;
                    let mut pos = 0;
                    let mut w = 0;
                    while pos < bytes.len() && w < x {
                        if bytes[pos] == b'\t' {
                            w += tab - w % tab;
                        } else {
                            w += crate::character::char_width(&bytes[pos..], enc);
                        }
                        pos = crate::character::next_pos(bytes, pos, enc);
                    }
                    (pos, w)
                };

                if pos == b.line_len(id) && width < x {
                    let llen = b.line_len(id);
                    insert_spaces(b, id, line, llen, x - width)?;
                    let llen = b.line_len(id);
                    insert_stream(b, id, line, llen, seg)?;
                } else {
                    insert_stream(b, id, line, pos, seg)?;
                }
            }

            id = b.lines.next(id);
            line += 1;
        }
        Ok(())
    })();
    end_undo_chain(b);
    r?;
    crate::syntax::update_syntax_states_from(b, start_id, b.cur_line);
    Ok(())
}

/// Loads a file into clip `n`.
pub fn load_clip(
    clips: &mut ClipRegistry,
    n: i64,
    path: &Path,
    preserve_cr: bool,
    binary: bool,
) -> Result {
    let mut cs = CharStream::load_from_file(path, preserve_cr, binary)
        .map_err(|_| Status::CantOpenFile)?;
    cs.set_encoding_from_content(Encoding::Ascii);
    clips.put(n, cs);
    Ok(())
}

/// Saves clip `n` to a file.
pub fn save_clip(clips: &ClipRegistry, n: i64, path: &Path, crlf: bool, binary: bool) -> Result {
    let Some(clip) = clips.get(n) else {
        return Err(Status::ClipDoesntExist);
    };
    clip.stream.save_to_file(path, crlf, binary)
}
