//! Cursor and viewport motion
//!
//! These functions move the cursor and keep the byte position, the
//! character index and the visual column in sync under tab expansion
//! and multibyte sequences. The infamous invariants: `cur_line ==
//! win_y + cur_y`, and `win_x` is always a multiple of the tab size.


use crate::buffer::Buffer;
use crate::character::{char_width, get_char, is_word_char, next_pos, prev_pos, utf8_len};
use crate::encoding::Encoding;
use crate::error::{Result, Status};

/// Re-derives `cur_pos`/`cur_char` from the visual column after the
/// cursor moved to a different line. Scans the line expanding tabs
/// until the wanted column is reached; landing inside a tab or a wide
/// glyph parks the cursor before it and records the wanted column.
/// Past end-of-line the behavior depends on free-form mode.
pub fn resync_pos(b: &mut Buffer) {
    let x = if b.x_wanted { b.wanted_x } else { b.win_x + b.cur_x };

    if x == 0 {
        b.cur_pos = 0;
        b.cur_char = 0;
        return;
    }

    let tab = b.opt.tab_size as usize;
    let enc = b.encoding;

    enum Landing {
        Exact { pos: usize, chars: usize },
        Inside { pos: usize, chars: usize, width: usize },
        Beyond { len: usize, chars: usize, width: usize },
    }

    let landing = {
        let line = b.cur_line_bytes();
        let mut pos = 0;
        let mut i = 0;
        let mut width = 0;
        let mut res = None;
        while pos < line.len() {
            let w = if line[pos] == b'\t' {
                tab - width % tab
            } else {
                char_width(&line[pos..], enc)
            };
            width += w;
            if width == x {
                res = Some(Landing::Exact {
                    pos: next_pos(line, pos, enc),
                    chars: i + 1,
                });
                break;
            }
            if width > x {
                res = Some(Landing::Inside {
                    pos,
                    chars: i,
                    width: width - w,
                });
                break;
            }
            pos = next_pos(line, pos, enc);
            i += 1;
        }
        res.unwrap_or(Landing::Beyond {
            len: line.len(),
            chars: i,
            width,
        })
    };

    match landing {
        Landing::Exact { pos, chars } => {
            b.cur_pos = pos;
            b.cur_char = chars;
            if b.x_wanted {
                b.x_wanted = false;
                reframe_column(b, x);
            }
        }
        Landing::Inside { pos, chars, width } => {
            b.cur_pos = pos;
            b.cur_char = chars;
            b.x_wanted = true;
            b.wanted_x = x;
            reframe_column(b, width);
        }
        Landing::Beyond { len, chars, width } => {
            if b.opt.free_form {
                b.cur_pos = len + x - width;
                b.cur_char = chars + x - width;
                b.cur_x = x.saturating_sub(b.win_x);
                b.x_wanted = false;
            } else {
                b.wanted_x = x;
                move_to_eol(b);
                b.x_wanted = true;
            }
        }
    }
}

/// Shifts the window so visual column `x` is on screen, keeping `win_x`
/// a tab-size multiple, and points `cur_x` at it.
fn reframe_column(b: &mut Buffer, x: usize) {
    let tab = b.opt.tab_size as usize;
    if x < b.win_x {
        b.win_x = x.saturating_sub(b.cols);
        b.win_x -= b.win_x % tab;
        b.cur_x = x - b.win_x;
    } else if x - b.win_x < b.cols {
        b.cur_x = x - b.win_x;
    } else {
        b.win_x = x - b.cols;
        b.win_x += tab - b.win_x % tab;
        b.cur_x = x - b.win_x;
    }
}

pub fn line_up(b: &mut Buffer) -> Result {
    b.y_wanted = false;
    if b.cur_y > 0 {
        b.cur_y -= 1;
        b.cur_line -= 1;
        b.cur_line_id = b.lines.prev(b.cur_line_id);
        b.attr_valid = false;
        resync_pos(b);
        Ok(())
    } else if b.win_y > 0 {
        b.win_y -= 1;
        b.cur_line -= 1;
        b.cur_line_id = b.lines.prev(b.cur_line_id);
        b.top_line_id = b.lines.prev(b.top_line_id);
        b.attr_valid = false;
        resync_pos(b);
        Ok(())
    } else {
        Err(Status::Error)
    }
}

pub fn line_down(b: &mut Buffer) -> Result {
    b.y_wanted = false;
    if b.cur_y < b.rows - 1 && b.cur_line < b.num_lines - 1 {
        b.cur_y += 1;
        b.cur_line += 1;
        b.cur_line_id = b.lines.next(b.cur_line_id);
        b.attr_valid = false;
        resync_pos(b);
        Ok(())
    } else if b.win_y + b.rows < b.num_lines {
        b.win_y += 1;
        b.cur_line += 1;
        b.cur_line_id = b.lines.next(b.cur_line_id);
        b.top_line_id = b.lines.next(b.top_line_id);
        b.attr_valid = false;
        resync_pos(b);
        Ok(())
    } else {
        Err(Status::Error)
    }
}

/// Pulls the cursor back inside the window after a geometry change.
pub fn keep_cursor_on_screen(b: &mut Buffer) {
    b.opt.tab_size = b.opt.tab_size.min(((b.cols / 2).max(2) - 1) as i64).max(1);
    let tab = b.opt.tab_size as usize;
    let shift_right = b.win_x % tab;
    if shift_right > 0 {
        b.win_x -= shift_right;
        b.cur_x += shift_right;
    }
    if b.cur_y > b.rows - 1 {
        while b.cur_y > b.rows - 1 {
            b.cur_y -= 1;
            b.win_y += 1;
            b.attr_valid = false;
            b.top_line_id = b.lines.next(b.top_line_id);
        }
        b.y_wanted = false;
    }
    while b.cur_x >= b.cols {
        b.win_x += tab;
        b.cur_x -= tab;
    }
}

/// Moves `win_x` left by `n` columns (a multiple of the tab size).
fn block_left(b: &mut Buffer, n: usize) {
    let t = b.win_x;
    b.win_x = b.win_x.saturating_sub(n);
    b.cur_x += t - b.win_x;
}

fn block_right(b: &mut Buffer, n: usize) {
    b.win_x += n;
    b.cur_x = b.cur_x.saturating_sub(n);
}

pub fn char_left(b: &mut Buffer) -> Result {
    b.x_wanted = false;
    b.y_wanted = false;

    if b.cur_pos > 0 {
        let tab = b.opt.tab_size as usize;
        let enc = b.encoding;
        let (disp, new_pos) = {
            let line = b.cur_line_bytes();
            if b.cur_pos > line.len() {
                (1, b.cur_pos - 1)
            } else {
                let prev = prev_pos(line, b.cur_pos, enc);
                let disp = if line[prev] == b'\t' {
                    tab - b.width_to(b.cur_line_id, prev) % tab
                } else {
                    char_width(&line[prev..], enc)
                };
                (disp, prev)
            }
        };
        if b.cur_x < disp {
            block_left(b, b.opt.tab_size as usize * 2);
        }
        b.cur_x = b.cur_x.saturating_sub(disp);
        b.cur_pos = new_pos;
        b.cur_char -= 1;
        Ok(())
    } else if b.cur_line > 0 {
        line_up(b)?;
        move_to_eol(b);
        Ok(())
    } else {
        Err(Status::Error)
    }
}

pub fn char_right(b: &mut Buffer) -> Result {
    let tab = b.opt.tab_size as usize;
    let enc = b.encoding;
    let llen = b.cur_line_len();

    b.x_wanted = false;
    b.y_wanted = false;

    if b.cur_pos == llen && !b.opt.free_form {
        if b.lines.is_last(b.cur_line_id) {
            return Err(Status::Error);
        }
        move_to_sol(b);
        line_down(b)?;
        return Ok(());
    }

    let disp = {
        let line = b.cur_line_bytes();
        if b.cur_pos < line.len() {
            if line[b.cur_pos] == b'\t' {
                tab - b.width_to(b.cur_line_id, b.cur_pos) % tab
            } else {
                char_width(&line[b.cur_pos..], enc)
            }
        } else {
            1
        }
    };

    b.cur_x += disp;
    b.cur_pos = if b.cur_pos >= llen {
        b.cur_pos + 1
    } else {
        next_pos(b.cur_line_bytes(), b.cur_pos, enc)
    };
    b.cur_char += 1;

    let next_width = {
        let line = b.cur_line_bytes();
        if b.cur_pos < line.len() {
            char_width(&line[b.cur_pos..], enc)
        } else {
            0
        }
    };
    if b.cur_x >= b.cols || (next_width > 0 && b.cur_x + next_width > b.cols) {
        block_right(b, tab * 2);
    }
    Ok(())
}

pub fn prev_page(b: &mut Buffer) -> Result {
    b.y_wanted = false;

    if b.cur_y > 0 {
        b.cur_line -= b.cur_y;
        b.cur_y = 0;
        b.cur_line_id = b.top_line_id;
        b.attr_valid = false;
        resync_pos(b);
        return Ok(());
    }

    if b.win_y == 0 {
        return Err(Status::Error);
    }

    b.attr_valid = false;
    let disp = (b.rows - 1).min(b.win_y);
    b.win_y -= disp;

    for _ in 0..disp {
        b.top_line_id = b.lines.prev(b.top_line_id);
        b.cur_line_id = b.lines.prev(b.cur_line_id);
        b.cur_line -= 1;
    }
    resync_pos(b);
    Ok(())
}

pub fn next_page(b: &mut Buffer) -> Result {
    b.y_wanted = false;

    if b.cur_y < b.rows - 1 {
        // Move to the bottom of the screen (or of the text).
        b.attr_valid = false;
        let mut id = b.top_line_id;
        let mut i = 0;
        while i < b.rows - 1 && !b.lines.is_last(id) {
            id = b.lines.next(id);
            i += 1;
        }
        b.cur_line += i - b.cur_y;
        b.cur_y = i;
        b.cur_line_id = id;
        resync_pos(b);
        return Ok(());
    }

    if b.win_y + b.rows >= b.num_lines {
        return Err(Status::Error);
    }

    b.attr_valid = false;
    let disp = (b.rows - 1).min(b.num_lines - b.rows - b.win_y);
    b.win_y += disp;
    b.cur_line += disp;
    for _ in 0..disp {
        b.top_line_id = b.lines.next(b.top_line_id);
        b.cur_line_id = b.lines.next(b.cur_line_id);
    }
    resync_pos(b);
    Ok(())
}

/// Pages up keeping the cursor on the same screen row, preserved across
/// repeated pagings by the sticky wanted-line pair.
pub fn page_up(b: &mut Buffer) -> Result {
    if b.cur_line == 0 {
        return Ok(());
    }
    b.attr_valid = false;

    if !b.y_wanted {
        b.y_wanted = true;
        b.wanted_y = b.cur_line as i64;
        b.wanted_cur_y = b.cur_y as i64;
    }

    for _ in 0..b.rows - 1 {
        b.wanted_y -= 1;
        if b.wanted_y >= 0 && b.wanted_y < b.num_lines as i64 - 1 {
            b.cur_line_id = b.lines.prev(b.cur_line_id);
            b.cur_line -= 1;
        }
        if b.win_y > 0 && b.win_y as i64 + b.wanted_cur_y > b.wanted_y {
            b.top_line_id = b.lines.prev(b.top_line_id);
            b.win_y -= 1;
        }
    }

    b.cur_y = b.cur_line - b.win_y;
    keep_cursor_on_screen(b);
    resync_pos(b);
    Ok(())
}

pub fn page_down(b: &mut Buffer) -> Result {
    if b.cur_line == b.num_lines - 1 {
        return Ok(());
    }
    b.attr_valid = false;

    if !b.y_wanted {
        b.y_wanted = true;
        b.wanted_y = b.cur_line as i64;
        b.wanted_cur_y = b.cur_y as i64;
    }

    let shift_view = b.win_y + b.rows - 1 < b.num_lines;
    for _ in 0..b.rows - 1 {
        b.wanted_y += 1;
        if b.wanted_y > 0 && b.wanted_y < b.num_lines as i64 {
            b.cur_line_id = b.lines.next(b.cur_line_id);
            b.cur_line += 1;
        }
        if shift_view && b.wanted_y - b.wanted_cur_y > b.win_y as i64 {
            b.top_line_id = b.lines.next(b.top_line_id);
            b.win_y += 1;
        }
    }

    b.cur_y = b.cur_line - b.win_y;
    keep_cursor_on_screen(b);
    resync_pos(b);
    Ok(())
}

/// Moves the cursor to the top screen line.
pub fn move_tos(b: &mut Buffer) -> Result {
    b.y_wanted = false;
    if b.cur_y > 0 {
        b.cur_line -= b.cur_y;
        b.cur_y = 0;
        b.cur_line_id = b.top_line_id;
        b.attr_valid = false;
        resync_pos(b);
    }
    Ok(())
}

/// Moves the cursor to the bottom screen line.
pub fn move_bos(b: &mut Buffer) -> Result {
    b.y_wanted = false;
    if b.cur_y < b.rows - 1 {
        b.attr_valid = false;
        let mut id = b.top_line_id;
        let mut i = 0;
        while i < b.rows - 1 && !b.lines.is_last(id) {
            id = b.lines.next(id);
            i += 1;
        }
        b.cur_line += i - b.cur_y;
        b.cur_y = i;
        b.cur_line_id = id;
        resync_pos(b);
    }
    Ok(())
}

/// Repositions the view without moving the cursor. `spec` is a string
/// of single-character directives (Top/Bottom/Middle/Center/Left/Right)
/// each optionally followed by a magnitude.
pub fn adjust_view(b: &mut Buffer, spec: Option<&str>) -> Result {
    b.y_wanted = false;
    let spec = spec.unwrap_or("t");
    let tab = b.opt.tab_size as usize;
    let mut rc = Ok(());

    let bytes = spec.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let directive = bytes[i];
        i += 1;
        let mut mag: usize = 0;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            mag = mag * 10 + (bytes[i] - b'0') as usize;
            i += 1;
        }

        let mut disp: i64 = 0;
        match directive {
            b't' | b'T' => {
                disp = -(if mag > 0 { mag.min(b.cur_y) } else { b.cur_y } as i64);
            }
            b'm' | b'M' => {
                disp = (b.rows as i64 - 1) / 2 - b.cur_y as i64;
            }
            b'b' | b'B' => {
                let full = b.rows - 1 - b.cur_y;
                disp = (if mag > 0 { mag.min(full) } else { full }) as i64;
            }
            b'l' | b'L' => {
                let mut m = if mag == 0 { b.cur_x } else { mag } as i64;
                while b.cur_x >= tab && m > 0 {
                    b.win_x += tab;
                    b.cur_x -= tab;
                    m -= tab as i64;
                }
            }
            b'c' | b'C' => {
                while b.cur_x >= tab {
                    b.win_x += tab;
                    b.cur_x -= tab;
                }
                while b.cur_x < (b.cols / 2) - (b.cols / 2) % tab && b.win_x >= tab {
                    b.win_x -= tab;
                    b.cur_x += tab;
                }
            }
            b'r' | b'R' => {
                let mut m = if mag == 0 { b.win_x } else { mag } as i64;
                while b.cur_x + tab < b.cols && b.win_x >= tab && m > 0 {
                    m -= tab as i64;
                    b.win_x -= tab;
                    b.cur_x += tab;
                }
            }
            _ => rc = Err(Status::Error),
        }

        if disp > 0 {
            let mut k = 0;
            while k < disp && !b.lines.is_head(b.lines.prev(b.top_line_id)) && b.win_y > 0 {
                b.win_y -= 1;
                b.cur_y += 1;
                b.top_line_id = b.lines.prev(b.top_line_id);
                k += 1;
            }
        } else {
            let mut k = 0;
            while k > disp && !b.lines.is_last(b.top_line_id) {
                b.win_y += 1;
                b.cur_y -= 1;
                b.top_line_id = b.lines.next(b.top_line_id);
                k -= 1;
            }
        }
    }

    resync_pos(b);
    rc
}

/// Absolute jump to line `n` (0-based), recomputing the window with
/// minimal scroll, centering when the target is off screen.
pub fn goto_line(b: &mut Buffer, n: usize) {
    b.y_wanted = false;
    if n >= b.num_lines || n == b.cur_line {
        return;
    }

    if n >= b.win_y && n < b.win_y + b.rows {
        b.attr_valid = false;
        b.cur_y = n - b.win_y;
        b.cur_line = n;
        let mut id = b.top_line_id;
        for _ in 0..b.cur_y {
            id = b.lines.next(id);
        }
        b.cur_line_id = id;
        resync_pos(b);
        return;
    }

    b.attr_valid = false;
    let half = b.rows / 2;
    b.win_y = n.saturating_sub(half);
    if b.win_y + b.rows > b.num_lines {
        b.win_y = b.num_lines.saturating_sub(b.rows);
    }
    b.cur_y = n - b.win_y;

    let id = b.nth_line_id(n).expect("line in range");
    b.cur_line = n;
    b.cur_line_id = id;
    let mut top = id;
    for _ in 0..b.cur_y {
        top = b.lines.prev(top);
    }
    b.top_line_id = top;
    resync_pos(b);
}

/// Absolute jump to visual column `n`.
pub fn goto_column(b: &mut Buffer, n: usize) {
    b.x_wanted = false;
    b.y_wanted = false;

    if n == b.win_x + b.cur_x {
        return;
    }

    if n >= b.win_x && n < b.win_x + b.cols {
        b.cur_x = n - b.win_x;
        resync_pos(b);
        return;
    }

    let tab = b.opt.tab_size as usize;
    b.win_x = n.saturating_sub(b.cols / 2);
    b.win_x -= b.win_x % tab;
    b.cur_x = n - b.win_x;
    resync_pos(b);
}

/// Like `goto_column`, but takes a byte position in the current line.
pub fn goto_pos(b: &mut Buffer, pos: usize) {
    goto_column(b, b.width_to(b.cur_line_id, pos));
}

pub fn goto_line_pos(b: &mut Buffer, line: usize, pos: usize) {
    goto_line(b, line);
    goto_pos(b, pos);
}

pub fn move_to_sol(b: &mut Buffer) {
    b.x_wanted = false;
    b.y_wanted = false;
    b.win_x = 0;
    b.cur_x = 0;
    b.cur_pos = 0;
    b.cur_char = 0;
}

pub fn move_to_eol(b: &mut Buffer) {
    b.x_wanted = false;
    b.y_wanted = false;

    let llen = b.cur_line_len();
    if llen == 0 {
        move_to_sol(b);
        return;
    }

    let total_width = b.width_to(b.cur_line_id, llen);
    if total_width >= b.win_x && total_width < b.win_x + b.cols {
        b.cur_x = total_width - b.win_x;
        b.cur_pos = llen;
        b.cur_char = b.char_len(b.cur_line_id);
        return;
    }

    // Shift the window so the line end is visible with some context.
    let tab = b.opt.tab_size as usize;
    let target = {
        let line = b.cur_line_bytes();
        let enc = b.encoding;
        let mut pos = 0;
        let mut width = 0;
        let mut win = 0;
        while pos < line.len() {
            if line[pos] == b'\t' {
                width += tab - width % tab;
            } else {
                width += char_width(&line[pos..], enc);
            }
            if total_width - width < b.cols - tab {
                win = width - width % tab;
                break;
            }
            pos = next_pos(line, pos, enc);
        }
        win
    };
    b.win_x = target;
    b.cur_x = total_width - b.win_x;
    b.cur_pos = llen;
    b.cur_char = b.char_len(b.cur_line_id);
}

pub fn move_to_sof(b: &mut Buffer) {
    b.reset_position_to_sof();
}

pub fn move_to_bof(b: &mut Buffer) {
    let last = b.lines.last();
    b.x_wanted = false;
    b.y_wanted = false;
    b.attr_valid = false;

    b.cur_line = b.num_lines - 1;
    b.win_x = 0;
    b.cur_x = 0;
    b.cur_char = 0;
    b.cur_pos = 0;

    if b.num_lines <= b.rows {
        b.win_y = 0;
        b.cur_y = b.num_lines - 1;
        b.top_line_id = b.lines.first();
    } else {
        b.win_y = b.num_lines - b.rows;
        b.cur_y = b.rows - 1;
        let mut top = last;
        for _ in 0..b.rows - 1 {
            top = b.lines.prev(top);
        }
        b.top_line_id = top;
    }
    b.cur_line_id = last;
}

pub fn toggle_sof_eof(b: &mut Buffer) {
    if b.cur_line == 0 && b.cur_pos == 0 {
        move_to_bof(b);
        move_to_eol(b);
    } else {
        move_to_sof(b);
    }
}

pub fn toggle_sol_eol(b: &mut Buffer) {
    if b.cur_pos == 0 {
        move_to_eol(b);
    } else {
        move_to_sol(b);
    }
}

/// Moves to the start of the next (`dir > 0`) or previous word.
pub fn search_word(b: &mut Buffer, dir: i64) -> Result {
    debug_assert!(dir == 1 || dir == -1);
    let enc = b.encoding;

    let mut y = b.cur_line as i64;
    let mut id = b.cur_line_id;
    let mut word_started = false;
    let mut space_skipped = false;

    let mut pos: i64 = {
        let line = b.line_bytes(id);
        let mut pos = b.cur_pos.min(line.len()) as i64;
        if (pos as usize) < line.len()
            && !is_word_char(get_char(&line[pos as usize..], enc), enc)
        {
            space_skipped = true;
        }
        if dir < 0 || (pos as usize) < line.len() {
            pos = if dir > 0 {
                next_pos(line, pos as usize, enc) as i64
            } else if pos == 0 {
                -1
            } else {
                prev_pos(line, pos as usize, enc) as i64
            };
        }
        pos
    };

    while y >= 0 && y < b.num_lines as i64 {
        let mut target = None;
        {
            let line = b.line_bytes(id);
            while pos >= 0 && (pos as usize) < line.len() {
                let c = get_char(&line[pos as usize..], enc);
                if !is_word_char(c, enc) {
                    space_skipped = true;
                } else {
                    word_started = true;
                }

                if dir > 0 {
                    if space_skipped && is_word_char(c, enc) {
                        target = Some((y as usize, pos as usize));
                        break;
                    }
                } else if word_started {
                    if !is_word_char(c, enc) {
                        target = Some((y as usize, next_pos(line, pos as usize, enc)));
                        break;
                    } else if pos == 0 {
                        target = Some((y as usize, 0));
                        break;
                    }
                }

                pos = if dir > 0 {
                    next_pos(line, pos as usize, enc) as i64
                } else if pos == 0 {
                    -1
                } else {
                    prev_pos(line, pos as usize, enc) as i64
                };
            }
        }
        if let Some((ty, tp)) = target {
            goto_line(b, ty);
            goto_pos(b, tp);
            return Ok(());
        }

        space_skipped = true;

        if dir > 0 {
            id = b.lines.next(id);
            y += 1;
            pos = 0;
            if b.lines.is_tail(id) {
                break;
            }
        } else {
            id = b.lines.prev(id);
            y -= 1;
            if b.lines.is_head(id) {
                break;
            }
            let line = b.line_bytes(id);
            pos = if line.is_empty() {
                -1
            } else {
                prev_pos(line, line.len(), enc) as i64
            };
        }
    }
    Err(Status::Error)
}

/// Moves to the character after the end of the current word; does not
/// move at all on spaces and punctuation.
pub fn move_to_eow(b: &mut Buffer) {
    let enc = b.encoding;
    let target = {
        let line = b.cur_line_bytes();
        let mut pos = b.cur_pos;
        if pos >= line.len() || !is_word_char(get_char(&line[pos..], enc), enc) {
            return;
        }
        while pos < line.len() {
            if !is_word_char(get_char(&line[pos..], enc), enc) {
                break;
            }
            pos += if enc == Encoding::Utf8 {
                utf8_len(line[pos]).unwrap_or(1)
            } else {
                1
            };
        }
        pos
    };
    goto_pos(b, target);
}

/// Incremental move toward the end: end of line, then end of page,
/// then end of file.
pub fn move_inc_down(b: &mut Buffer) {
    if b.cur_pos == b.cur_line_len() {
        if b.cur_y == b.rows - 1 {
            move_to_bof(b);
        } else {
            let _ = next_page(b);
        }
    }
    move_to_eol(b);
}

/// Same as `move_inc_down`, toward the top.
pub fn move_inc_up(b: &mut Buffer) {
    if b.cur_pos == 0 {
        if b.cur_y == 0 {
            move_to_sof(b);
        } else {
            let _ = prev_page(b);
        }
    } else {
        move_to_sol(b);
    }
}
