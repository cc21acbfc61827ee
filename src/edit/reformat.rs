//! Line reformatting: word wrap, auto-indent, paragraph reflow,
//! centering and block shifting

use crate::buffer::Buffer;
use crate::character::{calc_width, get_char, is_ascii_space, is_space, next_pos, prev_pos};
use crate::edit::{
    delete_one_char, delete_stream, insert_one_char, insert_one_line, insert_spaces, insert_stream,
};
use crate::error::{Result, Status};
use crate::line::LineId;
use crate::movement::{goto_line, goto_line_pos, line_down};
use crate::undo::{end_undo_chain, start_undo_chain};

/// Breaks the current line at the last space before the cursor. The
/// space is deleted and a line break inserted. Returns the number of
/// bytes that moved to the new line, or `Error` when no break point
/// exists before the cursor.
pub fn word_wrap(b: &mut Buffer) -> std::result::Result<usize, Status> {
    let enc = b.encoding;
    if b.cur_pos == 0 {
        return Err(Status::Error);
    }

    let (split, result) = {
        let line = b.cur_line_bytes();
        let len = line.len();

        // The line must not be broken inside its leading white space or
        // inside its first word.
        let mut first_pos = 0;
        while first_pos < len && is_space(get_char(&line[first_pos..], enc), enc) {
            first_pos = next_pos(line, first_pos, enc);
        }
        while first_pos < len && !is_space(get_char(&line[first_pos..], enc), enc) {
            first_pos = next_pos(line, first_pos, enc);
        }

        // Skip the white-space run just before the cursor; a freshly
        // typed space must not itself become the break point.
        let mut pos = b.cur_pos.min(len);
        while pos > 0 {
            let q = prev_pos(line, pos, enc);
            if is_space(get_char(&line[q..], enc), enc) {
                pos = q;
            } else {
                break;
            }
        }
        loop {
            if pos == 0 {
                return Err(Status::Error);
            }
            pos = prev_pos(line, pos, enc);
            if is_space(get_char(&line[pos..], enc), enc) {
                break;
            }
        }
        if pos == 0 || pos < first_pos {
            return Err(Status::Error);
        }
        (pos, b.cur_pos - pos - 1)
    };

    start_undo_chain(b);
    let r = delete_one_char(b, b.cur_line_id, b.cur_line, split)
        .and_then(|_| insert_one_line(b, b.cur_line_id, b.cur_line, split));
    end_undo_chain(b);
    r?;

    Ok(result)
}

/// Replicates the leading white space of the previous line onto line
/// `line`/`ld`, stopping at column `up_to_col`. Returns the number of
/// bytes inserted.
pub fn auto_indent_line(b: &mut Buffer, line: usize, ld: LineId, up_to_col: usize) -> Result<usize> {
    let prev = b.lines.prev(ld);
    if b.lines.is_head(prev) || b.line_len(prev) == 0 {
        return Ok(0);
    }
    let enc = b.encoding;
    let tab = b.opt.tab_size as usize;

    let (pos, bytes) = {
        let pline = b.line_bytes(prev);
        let mut pos = 0;
        let mut col = 0;
        while pos < pline.len() {
            let c = get_char(&pline[pos..], enc);
            if !is_space(c, enc) {
                break;
            }
            col += if c == '\t' as u32 { tab - col % tab } else { 1 };
            if col > up_to_col {
                break;
            }
            pos = next_pos(pline, pos, enc);
        }
        (pos, pline[..pos].to_vec())
    };
    if pos > 0 {
        insert_stream(b, ld, line, 0, &bytes)?;
    }
    Ok(pos)
}

/// Leading white space of the paragraph being reflowed.
struct ParagraphSpace {
    bytes: Vec<u8>,
    /// Display width of the space.
    width: usize,
}

/// Captures the leading space of a line. Returns `None` for blank
/// lines, which never define a paragraph.
fn save_space(b: &Buffer, id: LineId) -> Option<ParagraphSpace> {
    let line = b.line_bytes(id);
    if line.is_empty() {
        return None;
    }
    let enc = b.encoding;
    let mut pos = 0;
    while pos < line.len() && is_ascii_space(line[pos]) {
        pos = next_pos(line, pos, enc);
    }
    if pos == line.len() {
        return None;
    }
    Some(ParagraphSpace {
        bytes: line[..pos].to_vec(),
        width: calc_width(line, pos, b.opt.tab_size as usize, enc),
    })
}

/// Is the line part of the paragraph whose leading space is `width`
/// columns wide? Returns the first non-blank position when it is.
fn is_part_of_paragraph(b: &Buffer, id: LineId, width: usize) -> Option<usize> {
    let line = b.line_bytes(id);
    let enc = b.encoding;
    let mut pos = 0;
    while pos < line.len() && is_ascii_space(line[pos]) {
        pos = next_pos(line, pos, enc);
    }
    if pos < line.len() && calc_width(line, pos, b.opt.tab_size as usize, enc) == width {
        Some(pos)
    } else {
        None
    }
}

/// Removes trailing white space from a line.
fn trim_trailing_space(b: &mut Buffer, id: LineId, line: usize) -> Result {
    let enc = b.encoding;
    let pos = {
        let bytes = b.line_bytes(id);
        let mut pos = bytes.len();
        while pos > 0 && is_ascii_space(bytes[prev_pos(bytes, pos, enc)]) {
            pos = prev_pos(bytes, pos, enc);
        }
        pos
    };
    let len = b.line_len(id);
    if pos < len {
        delete_stream(b, id, line, pos, len - pos)?;
    }
    Ok(())
}

/// Reformats the paragraph at the cursor to the right margin (or the
/// window width when the margin is zero), preserving the paragraph's
/// leading white space. The cursor ends up after the paragraph.
/// `mark_for_undo` plants a no-op edit so undo restores the original
/// cursor position; only the first call of a chained series needs it.
pub fn paragraph(b: &mut Buffer, stop: &dyn Fn() -> bool, mark_for_undo: bool) -> Result {
    let mut ld = b.cur_line_id;
    if b.line_len(ld) == 0 {
        return line_down(b);
    }

    // Leading space comes from the following line when that line is
    // part of a paragraph, else from the current one.
    let next = b.lines.next(ld);
    let space = if !b.lines.is_tail(next) {
        save_space(b, next).or_else(|| save_space(b, ld))
    } else {
        save_space(b, ld)
    };
    let Some(space) = space else {
        return line_down(b);
    };

    let mut line = b.cur_line;
    if mark_for_undo {
        insert_one_char(b, ld, line, 0, ' ' as u32)?;
        delete_stream(b, ld, line, 0, 1)?;
    }

    let right_margin = if b.opt.right_margin > 0 {
        b.opt.right_margin as usize
    } else {
        b.cols
    };
    let enc = b.encoding;

    loop {
        let mut done = true;

        trim_trailing_space(b, ld, line)?;

        // Suck up subsequent lines until this one is long enough to
        // need splitting.
        loop {
            let width = b.width_to(ld, b.line_len(ld));
            let next = b.lines.next(ld);
            if width > right_margin || b.lines.is_tail(next) {
                break;
            }
            let Some(first_non_blank) = is_part_of_paragraph(b, next, space.width) else {
                break;
            };
            insert_one_char(b, ld, line, b.line_len(ld), ' ' as u32)?;
            if first_non_blank > 0 {
                delete_stream(b, next, line + 1, 0, first_non_blank)?;
            }
            let eol = b.line_len(ld);
            delete_stream(b, ld, line, eol, 1)?;
            trim_trailing_space(b, ld, line)?;
            done = false;
        }

        if b.width_to(ld, b.line_len(ld)) > right_margin {
            // Find the split point: the last space before the margin,
            // or the first one after it.
            let (split_pos, spaces) = {
                let bytes = b.line_bytes(ld);
                let tab = b.opt.tab_size as usize;
                let mut pos = 0;
                while pos < bytes.len() && is_ascii_space(bytes[pos]) {
                    pos = next_pos(bytes, pos, enc);
                }
                let mut split_pos = 0;
                let mut spaces = 0;
                while pos < bytes.len()
                    && (calc_width(bytes, pos, tab, enc) < right_margin || split_pos == 0)
                {
                    if is_ascii_space(bytes[pos]) {
                        split_pos = pos;
                        spaces = 0;
                        while pos < bytes.len() && is_ascii_space(bytes[pos]) {
                            pos = next_pos(bytes, pos, enc);
                            spaces += 1;
                        }
                    } else {
                        pos = next_pos(bytes, pos, enc);
                    }
                }
                (split_pos, spaces)
            };

            if split_pos > 0 {
                done = false;
                if spaces > 0 {
                    delete_stream(b, ld, line, split_pos, spaces)?;
                }
                insert_one_line(b, ld, line, split_pos)?;

                let next = b.lines.next(ld);
                if !b.lines.is_tail(next) {
                    ld = next;
                    line += 1;
                    if !space.bytes.is_empty() {
                        insert_stream(b, ld, line, 0, &space.bytes)?;
                    }
                    trim_trailing_space(b, ld, line)?;
                }
            } else {
                let next = b.lines.next(ld);
                if !b.lines.is_tail(next) && is_part_of_paragraph(b, next, space.width).is_some() {
                    ld = next;
                    line += 1;
                    done = false;
                }
            }
        }

        if stop() || done {
            break;
        }
    }

    goto_line_pos(b, line, b.line_len(ld));
    if stop() {
        return Err(Status::Stopped);
    }
    line_down(b)?;

    // Land on the first non-blank character after the paragraph.
    let mut id = b.cur_line_id;
    let mut line = b.cur_line;
    loop {
        let found = {
            let bytes = b.line_bytes(id);
            let mut pos = 0;
            let mut hit = None;
            while pos < bytes.len() {
                if !is_ascii_space(bytes[pos]) {
                    hit = Some(pos);
                    break;
                }
                pos = next_pos(bytes, pos, enc);
            }
            hit
        };
        if let Some(pos) = found {
            goto_line_pos(b, line, pos);
            return Ok(());
        }
        let next = b.lines.next(id);
        if b.lines.is_tail(next) {
            goto_line_pos(b, line, 0);
            return Err(Status::Error);
        }
        id = next;
        line += 1;
    }
}

/// Centers the current line between column zero and the right margin.
/// Long lines are left alone.
pub fn center(b: &mut Buffer) -> Result {
    let ld = b.cur_line_id;
    let right_margin = if b.opt.right_margin > 0 {
        b.opt.right_margin as usize
    } else {
        b.cols
    };
    let enc = b.encoding;

    let (start_pos, end_pos, chars) = {
        let line = b.line_bytes(ld);
        let mut start = 0;
        while start < line.len() && is_ascii_space(line[start]) {
            start = next_pos(line, start, enc);
        }
        if start == line.len() {
            return Ok(());
        }
        let mut end = line.len();
        while end > 0 && is_ascii_space(line[prev_pos(line, end, enc)]) {
            end = prev_pos(line, end, enc);
        }
        let chars = crate::character::calc_char_len(&line[start..end], enc);
        (start, end, chars)
    };

    if chars >= right_margin {
        return Ok(());
    }

    start_undo_chain(b);
    let line = b.cur_line;
    let r = delete_stream(b, ld, line, end_pos, b.line_len(ld) - end_pos)
        .and_then(|_| {
            if start_pos > 0 {
                delete_stream(b, ld, line, 0, start_pos)
            } else {
                Ok(())
            }
        })
        .and_then(|_| insert_spaces(b, ld, line, 0, (right_margin - chars) / 2));
    end_undo_chain(b);
    r
}

/// Parsed form of a `Shift` argument: `[<|>] [N] [s|t]` in any order.
struct ShiftSpec {
    /// Signed column count; negative shifts left.
    columns: i64,
}

fn parse_shift_spec(p: Option<&str>, tab_size: i64) -> std::result::Result<ShiftSpec, Status> {
    let mut dir = '>';
    let mut size: i64 = 1;
    let mut mag = tab_size;
    let (mut dir_seen, mut size_seen, mut unit_seen) = (false, false, false);

    if let Some(p) = p {
        let bytes = p.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i] as char;
            if c.is_ascii_whitespace() {
                i += 1;
            } else if !dir_seen && (c == '<' || c == '>') {
                dir = c;
                dir_seen = true;
                i += 1;
            } else if !size_seen && c.is_ascii_digit() {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                size = p[start..i].parse().map_err(|_| Status::InvalidShiftSpecified)?;
                size_seen = true;
            } else if !unit_seen && (c == 's' || c == 'S') {
                mag = 1;
                unit_seen = true;
                i += 1;
            } else if !unit_seen && (c == 't' || c == 'T') {
                unit_seen = true;
                i += 1;
            } else {
                return Err(Status::InvalidShiftSpecified);
            }
        }
    }
    let columns = size * mag.max(1) * if dir == '<' { -1 } else { 1 };
    if columns == 0 {
        return Err(Status::InvalidShiftSpecified);
    }
    Ok(ShiftSpec { columns })
}

/// Shifts the marked lines (or the current line) left or right by a
/// number of columns, adjusting white space; left shifts are refused
/// unless every line has enough white space to remove.
pub fn shift(b: &mut Buffer, spec: Option<&str>, stop: &dyn Fn() -> bool) -> Result {
    let use_tabs = b.opt.tabs && b.opt.shift_tabs;
    let tab = b.opt.tab_size as usize;
    let enc = b.encoding;
    let shift_size = parse_shift_spec(spec, b.opt.tab_size)?.columns;

    let mut first_line = b.cur_line;
    let mut last_line = b.cur_line;
    let mut left_col = 0;
    if b.marking {
        if b.mark_is_vertical {
            left_col = b
                .width_to(b.cur_line_id, b.block_start_pos)
                .min(b.width_to(b.cur_line_id, b.cur_pos));
        }
        first_line = b.block_start_line.min(b.cur_line);
        last_line = b.block_start_line.max(b.cur_line);
    }

    // A left shift must find enough white space on every line first.
    if shift_size < 0 {
        for line in first_line..=last_line {
            goto_line(b, line);
            let bytes = b.cur_line_bytes();
            let mut pos = crate::character::calc_pos(bytes, left_col, tab, enc);
            while pos < bytes.len() {
                let here = calc_width(bytes, pos, tab, enc) as i64;
                if left_col as i64 - here <= shift_size {
                    break;
                }
                if is_ascii_space(bytes[pos]) {
                    pos = next_pos(bytes, pos, enc);
                } else {
                    return Err(Status::InsufficientWhitespace);
                }
            }
        }
    }

    start_undo_chain(b);
    let mut rc = Ok(());
    'lines: for line in first_line..=last_line {
        b.attr_valid = false;
        goto_line(b, line);
        let ld = b.cur_line_id;

        // Find the first non-blank character and the run of spaces
        // before it; all adjustments happen at that transition.
        let (mut pos, c_pos_init) = {
            let bytes = b.line_bytes(ld);
            let mut pos = crate::character::calc_pos(bytes, left_col, tab, enc);
            while pos < bytes.len() && is_ascii_space(bytes[pos]) {
                pos = next_pos(bytes, pos, enc);
            }
            if pos >= bytes.len() {
                continue 'lines;
            }
            let c_pos = pos;
            while pos > 0 && bytes[pos - 1] == b' ' {
                pos = prev_pos(bytes, pos, enc);
            }
            (pos, c_pos)
        };

        let mut c_pos = c_pos_init;
        let c_col_orig = b.width_to(ld, c_pos) as i64;

        loop {
            if stop() {
                rc = Err(Status::Stopped);
                break 'lines;
            }
            let offset = b.width_to(ld, c_pos) as i64 - c_col_orig - shift_size;
            if offset == 0 {
                break;
            }
            if offset > 0 {
                // Still too far right: remove white space.
                let bytes = b.line_bytes(ld);
                if bytes[pos] == b' ' {
                    delete_stream(b, ld, b.cur_line, pos, 1)?;
                    c_pos -= 1;
                } else if pos > 0 {
                    let prev = prev_pos(b.line_bytes(ld), pos, enc);
                    if b.line_bytes(ld)[prev] == b'\t' {
                        pos = prev;
                        delete_stream(b, ld, b.cur_line, pos, 1)?;
                        c_pos -= 1;
                    } else {
                        break;
                    }
                } else {
                    break;
                }
            } else {
                // Too far left: insert white space, tabs when allowed
                // and useful.
                let here = b.width_to(ld, pos);
                let c = if use_tabs && (tab - here % tab) as i64 <= -offset {
                    '\t' as u32
                } else {
                    ' ' as u32
                };
                if insert_one_char(b, ld, b.cur_line, pos, c).is_err() {
                    break;
                }
                pos += 1;
                c_pos += 1;
            }
        }
    }
    end_undo_chain(b);
    rc
}
