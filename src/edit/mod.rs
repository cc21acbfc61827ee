//! The editing primitives
//!
//! `insert_stream` and `delete_stream` are the only two functions that
//! modify buffer content. Everything else — character insertion, line
//! splitting and joining, case changes, reformatting, block operations —
//! decomposes into calls to these two, usually bracketed in an undo
//! chain so one user action is one undo atom.
//!
//! Both primitives keep the pools consistent, adjust the mark and every
//! active bookmark, and record the inverse operation in the undo log.

pub mod brackets;
pub mod reformat;

#[cfg(test)]
mod tests;

use crate::buffer::Buffer;
use crate::character::{next_pos, utf8_encode, utf8_len};
use crate::constants::MAX_STACK_SPACES;
use crate::encoding::Encoding;
use crate::error::{Result, Status};
use crate::line::LineId;
use crate::pool::Span;
use crate::stream::CharStream;

/// Inserts `stream` at byte `pos` of line `line`/`ld`. The stream is a
/// sequence of NUL-terminated segments; each interior NUL splits the
/// line, and the tail after the split shares the original pool bytes.
pub fn insert_stream(
    b: &mut Buffer,
    mut ld: LineId,
    mut line: usize,
    mut pos: usize,
    stream: &[u8],
) -> Result {
    if stream.is_empty() || pos > b.line_len(ld) {
        return Err(Status::Error);
    }

    if b.opt.do_undo && !(b.undoing || b.redoing) {
        let linked = b.link_undos > 0;
        b.undo
            .add_step(line as i64, pos as i64, -(stream.len() as i64), linked);
    }

    let mut s = 0;
    loop {
        let rest = &stream[s..];
        let m = memchr::memchr(0, rest).unwrap_or(rest.len());
        if m > 0 {
            insert_segment(b, ld, pos, &rest[..m])?;
            b.is_modified = true;

            // The mark and any bookmark sitting after the insertion
            // point on this line shift right.
            if b.marking && b.block_start_line == line && b.block_start_pos > pos {
                b.block_start_pos += m;
            }
            let mut mask = b.bookmark_mask;
            let mut i = 0;
            while mask != 0 {
                if mask & 1 != 0 && b.bookmarks[i].line == line && b.bookmarks[i].pos > pos {
                    b.bookmarks[i].pos += m;
                }
                mask >>= 1;
                i += 1;
            }
        }

        if s + m >= stream.len() {
            break;
        }

        // A NUL: split the line after the inserted segment. The tail
        // moves to a fresh descriptor without copying.
        let new_ld = b.lines.alloc();
        b.lines.link_after(new_ld, ld);
        b.num_lines += 1;

        let cur = b.lines.get(ld).line;
        if let Some(span) = cur {
            if pos + m < span.len {
                let tail = Span {
                    pool: span.pool,
                    start: span.start + pos + m,
                    len: span.len - pos - m,
                };
                b.lines.get_mut(new_ld).line = Some(tail);
                if pos + m == 0 {
                    b.lines.get_mut(ld).line = None;
                } else {
                    b.lines.get_mut(ld).line = Some(Span {
                        pool: span.pool,
                        start: span.start,
                        len: pos + m,
                    });
                }
            }
        }
        b.is_modified = true;

        if b.marking {
            if b.block_start_line == line && b.block_start_pos > pos {
                b.block_start_pos -= pos + m;
                b.block_start_line += 1;
            } else if b.block_start_line > line {
                b.block_start_line += 1;
            }
        }
        let mut mask = b.bookmark_mask;
        let mut i = 0;
        while mask != 0 {
            if mask & 1 != 0 {
                if b.bookmarks[i].line == line && b.bookmarks[i].pos > pos {
                    b.bookmarks[i].pos -= pos + m;
                    b.bookmarks[i].line += 1;
                } else if b.bookmarks[i].line > line {
                    b.bookmarks[i].line += 1;
                }
            }
            mask >>= 1;
            i += 1;
        }

        ld = new_ld;
        line += 1;
        pos = 0;
        s += m + 1;
    }

    Ok(())
}

/// Puts one segment into a line: fresh allocation if the line is empty,
/// in-place growth via the surrounding free bytes when possible, and a
/// copy into a fresh region otherwise.
fn insert_segment(b: &mut Buffer, ld: LineId, pos: usize, seg: &[u8]) -> Result {
    let m = seg.len();
    match b.lines.get(ld).line {
        None => {
            let span = b.pools.alloc(m)?;
            b.pools.write(span.pool, span.start, seg);
            b.lines.get_mut(ld).line = Some(span);
        }
        Some(span) => {
            // The direction preference minimizes the bytes the memmove
            // below has to shift.
            match b.pools.alloc_around(span, m, pos < span.len / 2) {
                Some(after) => {
                    let before = m - after;
                    if before > 0 {
                        b.pools
                            .copy_within(span.pool, span.start, span.start - before, pos);
                    }
                    if after > 0 {
                        b.pools.copy_within(
                            span.pool,
                            span.start + pos,
                            span.start + pos + after,
                            span.len - pos,
                        );
                    }
                    b.pools.write(span.pool, span.start - before + pos, seg);
                    b.lines.get_mut(ld).line = Some(Span {
                        pool: span.pool,
                        start: span.start - before,
                        len: span.len + m,
                    });
                }
                None => {
                    let new = b.pools.alloc(span.len + m)?;
                    b.pools.copy_span(
                        Span {
                            pool: span.pool,
                            start: span.start,
                            len: pos,
                        },
                        new.pool,
                        new.start,
                    );
                    b.pools.write(new.pool, new.start + pos, seg);
                    b.pools.copy_span(
                        Span {
                            pool: span.pool,
                            start: span.start + pos,
                            len: span.len - pos,
                        },
                        new.pool,
                        new.start + pos + m,
                    );
                    b.pools.free(span);
                    b.lines.get_mut(ld).line = Some(new);
                }
            }
        }
    }
    Ok(())
}

/// Deletes exactly `n` bytes starting at `pos`, counting each line join
/// as one byte (the implicit line feed). Deleted bytes are recorded so
/// undo can re-insert them.
pub fn delete_stream(b: &mut Buffer, ld: LineId, line: usize, pos: usize, n: usize) -> Result {
    if n == 0 || pos > b.line_len(ld) || (pos == b.line_len(ld) && b.lines.is_last(ld)) {
        return Err(Status::Error);
    }

    if b.opt.do_undo && !(b.undoing || b.redoing) {
        let linked = b.link_undos > 0;
        b.undo.add_step(line as i64, pos as i64, n as i64, linked);
    }

    let mut left = n;
    while left > 0 {
        let llen = b.line_len(ld);

        if pos == llen {
            // On the end of a line: join the next line into this one.
            let next = b.lines.next(ld);
            if b.lines.is_tail(next) {
                break;
            }

            if b.marking {
                if b.block_start_line == line + 1 {
                    b.block_start_line -= 1;
                    b.block_start_pos += llen;
                } else if b.block_start_line > line {
                    b.block_start_line -= 1;
                }
            }
            let mut mask = b.bookmark_mask;
            let mut i = 0;
            while mask != 0 {
                if mask & 1 != 0 {
                    if b.bookmarks[i].line == line + 1 {
                        b.bookmarks[i].line -= 1;
                        b.bookmarks[i].pos += llen;
                    } else if b.bookmarks[i].line > line {
                        b.bookmarks[i].line -= 1;
                    }
                }
                mask >>= 1;
                i += 1;
            }

            join_lines(b, ld, next)?;

            b.num_lines -= 1;
            b.lines.unlink(next);
            b.lines.free(next);
            left -= 1;

            if !b.redoing {
                if b.undoing {
                    b.undo.redo.append(&[0]);
                } else if b.opt.do_undo {
                    b.undo.add_to_stream(&[0]);
                }
            }
        } else {
            // Inside a line: delete up to end-of-line, moving whichever
            // side is smaller.
            let k = left.min(llen - pos);

            if b.marking && b.block_start_line == line && b.block_start_pos >= pos {
                if b.block_start_pos < pos + k {
                    b.block_start_pos = pos;
                } else {
                    b.block_start_pos -= k;
                }
            }
            let mut mask = b.bookmark_mask;
            let mut i = 0;
            while mask != 0 {
                if mask & 1 != 0 && b.bookmarks[i].line == line && b.bookmarks[i].pos >= pos {
                    if b.bookmarks[i].pos < pos + k {
                        b.bookmarks[i].pos = pos;
                    } else {
                        b.bookmarks[i].pos -= k;
                    }
                }
                mask >>= 1;
                i += 1;
            }

            if !b.redoing {
                let span = b.lines.get(ld).line.expect("non-empty line");
                let deleted = b
                    .pools
                    .read(Span { pool: span.pool, start: span.start + pos, len: k });
                if b.undoing {
                    b.undo.redo.append(&deleted);
                } else if b.opt.do_undo {
                    b.undo.add_to_stream(&deleted);
                }
            }

            let span = b.lines.get(ld).line.expect("non-empty line");
            if k == llen - pos {
                b.pools.free(Span {
                    pool: span.pool,
                    start: span.start + pos,
                    len: k,
                });
                b.lines.get_mut(ld).line = Some(Span { len: llen - k, ..span });
            } else if pos < llen / 2 {
                b.pools.copy_within(span.pool, span.start, span.start + k, pos);
                b.pools.free(Span { pool: span.pool, start: span.start, len: k });
                b.lines.get_mut(ld).line = Some(Span {
                    pool: span.pool,
                    start: span.start + k,
                    len: llen - k,
                });
            } else {
                b.pools.copy_within(
                    span.pool,
                    span.start + pos + k,
                    span.start + pos,
                    llen - pos - k,
                );
                b.pools.free(Span {
                    pool: span.pool,
                    start: span.start + llen - k,
                    len: k,
                });
                b.lines.get_mut(ld).line = Some(Span { len: llen - k, ..span });
            }
            if b.line_len(ld) == 0 {
                b.lines.get_mut(ld).line = None;
            }
            left -= k;
        }
        b.is_modified = true;
    }

    if b.opt.do_undo && !(b.undoing || b.redoing) {
        b.undo.fix_last_step(-(left as i64));
    }
    Ok(())
}

/// Joins the storage of `next` onto `ld`: adjacency and empty-line fast
/// paths first, then in-place growth on either side, then a fresh
/// combined region.
fn join_lines(b: &mut Buffer, ld: LineId, next: LineId) -> Result {
    let a = b.lines.get(ld).line;
    let c = b.lines.get(next).line;

    let joined = match (a, c) {
        (None, None) => None,
        (None, Some(c)) => Some(c),
        (Some(a), None) => Some(a),
        (Some(a), Some(c)) if a.pool == c.pool && a.end() == c.start => Some(Span {
            pool: a.pool,
            start: a.start,
            len: a.len + c.len,
        }),
        (Some(a), Some(c)) => {
            if let Some(after) = b.pools.alloc_around(a, c.len, false) {
                let before = c.len - after;
                if before > 0 {
                    b.pools.copy_within(a.pool, a.start, a.start - before, a.len);
                }
                b.pools
                    .copy_span(c, a.pool, a.start - before + a.len);
                b.pools.free(c);
                Some(Span {
                    pool: a.pool,
                    start: a.start - before,
                    len: a.len + c.len,
                })
            } else if let Some(shift) = b.pools.alloc_around(c, a.len, true) {
                if shift > 0 {
                    b.pools.copy_within(c.pool, c.start, c.start + shift, c.len);
                }
                b.pools
                    .copy_span(a, c.pool, c.start + shift - a.len);
                b.pools.free(a);
                Some(Span {
                    pool: c.pool,
                    start: c.start + shift - a.len,
                    len: a.len + c.len,
                })
            } else {
                let p = b.pools.alloc(a.len + c.len)?;
                b.pools.copy_span(a, p.pool, p.start);
                b.pools.copy_span(c, p.pool, p.start + a.len);
                b.pools.free(a);
                b.pools.free(c);
                Some(p)
            }
        }
    };

    b.lines.get_mut(ld).line = joined;
    b.lines.get_mut(next).line = None;
    Ok(())
}

/// Inserts a line break, splitting the current line at `pos`.
pub fn insert_one_line(b: &mut Buffer, ld: LineId, line: usize, pos: usize) -> Result {
    insert_stream(b, ld, line, pos, &[0])
}

/// Inserts one code point, which must be compatible with the buffer
/// encoding. NUL is not insertable.
pub fn insert_one_char(b: &mut Buffer, ld: LineId, line: usize, pos: usize, c: u32) -> Result {
    debug_assert!(c != 0);
    debug_assert!(b.encoding == Encoding::Utf8 || c <= 0xFF);

    let mut buf = [0u8; 4];
    let n = if b.encoding == Encoding::Utf8 {
        utf8_encode(c, &mut buf)
    } else {
        buf[0] = c as u8;
        1
    };
    insert_stream(b, ld, line, pos, &buf[..n])
}

/// Inserts `n` spaces in bounded blocks.
pub fn insert_spaces(b: &mut Buffer, ld: LineId, line: usize, pos: usize, n: usize) -> Result {
    const SPACES: [u8; MAX_STACK_SPACES] = [b' '; MAX_STACK_SPACES];
    let mut left = n;
    while left > 0 {
        let k = left.min(MAX_STACK_SPACES);
        insert_stream(b, ld, line, pos, &SPACES[..k])?;
        left -= k;
    }
    Ok(())
}

/// Deletes one character (a whole UTF-8 sequence when applicable).
pub fn delete_one_char(b: &mut Buffer, ld: LineId, line: usize, pos: usize) -> Result {
    let n = if b.encoding == Encoding::Utf8 && pos < b.line_len(ld) {
        utf8_len(b.line_bytes(ld)[pos]).unwrap_or(1)
    } else {
        1
    };
    delete_stream(b, ld, line, pos, n)
}

/// Deletes a whole line, stashing its text for `UndelLine`.
pub fn delete_one_line(b: &mut Buffer, ld: LineId, line: usize) -> Result {
    let len = b.line_len(ld);
    if len > 0 {
        let bytes = b.line_bytes(ld).to_vec();
        let stash = b.last_deleted.get_or_insert_with(CharStream::new);
        stash.reset();
        stash.append(&bytes);
    }
    // On the last line of text there is no terminating line feed.
    let n = len + if b.lines.is_last(ld) { 0 } else { 1 };
    delete_stream(b, ld, line, 0, n)
}

/// Re-inserts the last deleted line at the cursor.
pub fn undelete_line(b: &mut Buffer) -> Result {
    use crate::undo::{end_undo_chain, start_undo_chain};

    let Some(last) = b.last_deleted.take() else {
        return Err(Status::Error);
    };
    let ld = b.cur_line_id;
    start_undo_chain(b);
    if b.cur_pos > b.line_len(ld) {
        let llen = b.line_len(ld);
        let shortfall = b.cur_column() - b.width_to(ld, llen);
        insert_spaces(b, ld, b.cur_line, llen, shortfall)?;
    }
    let r = insert_one_line(b, ld, b.cur_line, b.cur_pos)
        .and_then(|_| insert_stream(b, ld, b.cur_line, b.cur_pos, last.as_bytes()));
    end_undo_chain(b);
    b.last_deleted = Some(last);
    r
}

/// Deletes from `pos` to the end of the line.
pub fn delete_to_eol(b: &mut Buffer, ld: LineId, line: usize, pos: usize) -> Result {
    let len = b.line_len(ld);
    if pos >= len {
        return Ok(());
    }
    delete_stream(b, ld, line, pos, len - pos)
}

/// Case-folds the word at (or after) the cursor: first character with
/// `to_first`, the rest with `to_rest`. Used by `ToUpper`, `ToLower`
/// and `Capitalize`.
pub fn case_change(
    b: &mut Buffer,
    to_first: fn(u32, Encoding) -> u32,
    to_rest: fn(u32, Encoding) -> u32,
) -> Result {
    use crate::character::{get_char, is_word_char, utf8_seq_len};
    use crate::movement::search_word;
    use crate::undo::{end_undo_chain, start_undo_chain};

    if b.cur_line == b.num_lines - 1 && b.cur_pos >= b.cur_line_len() {
        return Err(Status::Error);
    }

    // Move onto a word if we are not on one.
    let on_word = b.cur_pos < b.cur_line_len()
        && is_word_char(get_char(&b.cur_line_bytes()[b.cur_pos..], b.encoding), b.encoding);
    if !on_word {
        search_word(b, 1)?;
    }

    // First pass: measure the replacement and see if anything changes.
    let line = b.cur_line_bytes().to_vec();
    let enc = b.encoding;
    let mut changed = false;
    let mut word = Vec::new();
    let mut pos = b.cur_pos;
    while pos < line.len() {
        let c = get_char(&line[pos..], enc);
        if !is_word_char(c, enc) {
            break;
        }
        let new_c = if word.is_empty() {
            to_first(c, enc)
        } else {
            to_rest(c, enc)
        };
        changed |= new_c != c;
        if enc == Encoding::Utf8 {
            let mut buf = [0u8; 4];
            let n = utf8_encode(new_c, &mut buf);
            debug_assert_eq!(n, utf8_seq_len(new_c));
            word.extend_from_slice(&buf[..n]);
        } else {
            word.push(new_c as u8);
        }
        pos = next_pos(&line, pos, enc);
    }

    let len = pos - b.cur_pos;
    if len == 0 {
        crate::movement::char_right(b)?;
        return Ok(());
    }

    if changed {
        start_undo_chain(b);
        let r = delete_stream(b, b.cur_line_id, b.cur_line, b.cur_pos, len).and_then(|_| {
            if word.is_empty() {
                Ok(())
            } else {
                insert_stream(b, b.cur_line_id, b.cur_line, b.cur_pos, &word)
            }
        });
        end_undo_chain(b);
        r?;
    }

    search_word(b, 1)
}
