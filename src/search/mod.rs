//! Search and replace
//!
//! The driver walks lines from the cursor forward or backward,
//! optionally wrapping once around the buffer boundary. Compiled
//! artifacts (the Boyer-Moore table or the regex program) are cached
//! under a monotone serial compared against the buffer's
//! `find_string_changed` tag, so repeated searches do not recompile.

pub mod literal;
pub mod regex;


use crate::buffer::Buffer;
use crate::error::{Result, Status};
use crate::movement::{goto_line_pos, goto_pos};
use crate::undo::{end_undo_chain, start_undo_chain};

pub use self::literal::LiteralProgram;
pub use self::regex::{MatchRegisters, RegexProgram};

/// Process-wide search compilation state.
pub struct SearchEngine {
    /// Monotone compilation serial; never 0 or 1, so a buffer tag of 1
    /// always forces a recompile.
    serial: u32,
    literal: Option<LiteralProgram>,
    regex: Option<RegexProgram>,
    /// Registers of the last successful regex match, relative to the
    /// matched line.
    pub last_match: Option<MatchRegisters>,
    pub last_replace_empty_match: bool,
}

impl Default for SearchEngine {
    fn default() -> SearchEngine {
        SearchEngine {
            serial: 2,
            literal: None,
            regex: None,
            last_match: None,
            last_replace_empty_match: false,
        }
    }
}

impl SearchEngine {
    fn bump_serial(&mut self) {
        self.serial = ((self.serial & !1).wrapping_add(2)) | 2;
    }
}

/// Boyer-Moore search for `pattern` (or the buffer's find string),
/// skipping a match at the cursor if `skip_first`, wrapping once
/// around the buffer boundary if `wrap_once`. The cursor moves to the
/// match; on `NotFound` it stays put.
pub fn find(
    b: &mut Buffer,
    engine: &mut SearchEngine,
    pattern: Option<&[u8]>,
    skip_first: bool,
    mut wrap_once: bool,
    stop: &dyn Fn() -> bool,
) -> Result {
    let (pattern, mut recompile) = match pattern {
        Some(p) => (p.to_vec(), true),
        None => {
            let p = b.find_string.clone().ok_or(Status::Error)?;
            (p, b.find_string_changed != engine.serial || b.last_was_regexp)
        }
    };
    if pattern.is_empty() {
        return Err(Status::Error);
    }

    let case = b.opt.case_search;
    let back = b.opt.search_back;
    match &engine.literal {
        Some(p) if !recompile && p.back == back && p.case_sensitive == case => {}
        _ => recompile = true,
    }
    if recompile {
        engine.bump_serial();
        engine.literal = Some(LiteralProgram::compile(&pattern, back, case, b.encoding));
        b.find_string_changed = engine.serial;
    }
    let prog = engine.literal.as_ref().expect("compiled above");
    let m = prog.pattern.len();

    let mut y = b.cur_line as i64;
    let mut id = b.cur_line_id;
    let mut wrap_lines_left = b.num_lines as i64 + 1;

    if !back {
        let mut start = b.cur_pos as i64 + if skip_first { 1 } else { 0 };
        while y < b.num_lines as i64 && !stop() && wrap_lines_left >= 0 {
            wrap_lines_left -= 1;
            if let Some(pos) = prog.scan_forward(b.line_bytes(id), start) {
                goto_line_pos(b, y as usize, pos);
                return Ok(());
            }
            id = b.lines.next(id);
            start = 0;
            if b.lines.is_tail(id) {
                if !wrap_once {
                    break;
                }
                wrap_once = false;
                id = b.lines.first();
                y = -1;
            }
            y += 1;
        }
    } else {
        let mut start = b.cur_pos as i64 - if skip_first { 1 } else { 0 };
        while y >= 0 && !stop() && wrap_lines_left >= 0 {
            wrap_lines_left -= 1;
            if let Some(pos) = prog.scan_backward(b.line_bytes(id), start) {
                goto_line_pos(b, y as usize, pos);
                return Ok(());
            }
            id = b.lines.prev(id);
            if b.lines.is_head(id) {
                if !wrap_once {
                    break;
                }
                wrap_once = false;
                id = b.lines.last();
                y = b.num_lines as i64;
            }
            start = b.line_len(id) as i64 - m as i64;
            y -= 1;
        }
    }

    if stop() {
        Err(Status::Stopped)
    } else {
        Err(Status::NotFound)
    }
}

/// Regex search; works like `find` but records the capture registers
/// of the hit for the following replace.
pub fn find_regexp(
    b: &mut Buffer,
    engine: &mut SearchEngine,
    pattern: Option<&[u8]>,
    skip_first: bool,
    mut wrap_once: bool,
    stop: &dyn Fn() -> bool,
) -> Result {
    let (pattern, mut recompile) = match pattern {
        Some(p) => (p.to_vec(), true),
        None => {
            let p = b.find_string.clone().ok_or(Status::Error)?;
            (p, b.find_string_changed != engine.serial || !b.last_was_regexp)
        }
    };
    if pattern.is_empty() {
        return Err(Status::Error);
    }

    let case = b.opt.case_search;
    match &engine.regex {
        Some(p)
            if !recompile
                && p.case_sensitive == case
                && p.encoding_class == (b.encoding == crate::encoding::Encoding::Utf8)
                && p.pattern == pattern => {}
        _ => recompile = true,
    }
    if recompile {
        engine.bump_serial();
        engine.regex = Some(RegexProgram::compile(&pattern, case, b.encoding)?);
        b.find_string_changed = engine.serial;
    }
    let prog = engine.regex.as_ref().expect("compiled above");

    let mut y = b.cur_line as i64;
    let mut id = b.cur_line_id;
    let mut wrap_lines_left = b.num_lines as i64 + 1;

    if !b.opt.search_back {
        let mut start = b.cur_pos as i64 + if skip_first { 1 } else { 0 };
        while y < b.num_lines as i64 && !stop() && wrap_lines_left >= 0 {
            wrap_lines_left -= 1;
            if start >= 0 {
                if let Some(regs) = prog.scan_forward(b.line_bytes(id), start as usize) {
                    let pos = regs.whole().0;
                    engine.last_match = Some(regs);
                    goto_line_pos(b, y as usize, pos);
                    return Ok(());
                }
            }
            id = b.lines.next(id);
            start = 0;
            y += 1;
            if b.lines.is_tail(id) {
                if !wrap_once {
                    break;
                }
                wrap_once = false;
                id = b.lines.first();
                y = 0;
            }
        }
    } else {
        let mut start = b.cur_pos as i64 - if skip_first { 1 } else { 0 };
        while y >= 0 && !stop() && wrap_lines_left >= 0 {
            wrap_lines_left -= 1;
            if start >= 0 {
                if let Some(regs) = prog.scan_backward(b.line_bytes(id), start as usize) {
                    let pos = regs.whole().0;
                    engine.last_match = Some(regs);
                    goto_line_pos(b, y as usize, pos);
                    return Ok(());
                }
            }
            id = b.lines.prev(id);
            if b.lines.is_head(id) {
                if !wrap_once {
                    break;
                }
                wrap_once = false;
                id = b.lines.last();
                y = b.num_lines as i64;
            }
            start = b.line_len(id) as i64;
            y -= 1;
        }
    }

    if stop() {
        Err(Status::Stopped)
    } else {
        Err(Status::NotFound)
    }
}

/// Replaces `n` bytes at the cursor with `replacement` and moves past
/// it (searching forward). One undo atom.
pub fn replace(b: &mut Buffer, engine: &mut SearchEngine, n: usize, replacement: &[u8]) -> Result {
    use crate::edit::{delete_stream, insert_stream};

    engine.last_replace_empty_match = false;

    start_undo_chain(b);
    let r = delete_stream(b, b.cur_line_id, b.cur_line, b.cur_pos, n).and_then(|_| {
        if replacement.is_empty() {
            Ok(())
        } else {
            insert_stream(b, b.cur_line_id, b.cur_line, b.cur_pos, replacement)
        }
    });
    end_undo_chain(b);
    r?;

    if !b.opt.search_back {
        goto_pos(b, b.cur_pos + replacement.len());
    }
    Ok(())
}

/// Replaces the last regex match with `replacement`, expanding `\0`
/// through `\9` to the matched groups and `\\` to a backslash. The
/// cursor must be at the match start, as `find_regexp` leaves it.
pub fn replace_regexp(b: &mut Buffer, engine: &mut SearchEngine, replacement: &[u8]) -> Result {
    use crate::edit::{delete_stream, insert_stream};

    let Some(regs) = engine.last_match.clone() else {
        return Err(Status::Error);
    };

    // Parse the replacement into literal and group pieces first, so a
    // malformed string changes nothing.
    enum Piece {
        Text(Vec<u8>),
        Group(usize),
    }
    let mut pieces = Vec::new();
    let mut text = Vec::new();
    let mut i = 0;
    while i < replacement.len() {
        let c = replacement[i];
        if c != b'\\' {
            text.push(c);
            i += 1;
            continue;
        }
        if i + 1 >= replacement.len() {
            return Err(Status::WrongCharAfterBackslash);
        }
        let e = replacement[i + 1];
        if e == b'\\' {
            text.push(b'\\');
        } else if e.is_ascii_digit() {
            let g = (e - b'0') as usize;
            if g >= regs.groups.len() || regs.groups[g].is_none() {
                return Err(Status::WrongCharAfterBackslash);
            }
            if !text.is_empty() {
                pieces.push(Piece::Text(std::mem::take(&mut text)));
            }
            pieces.push(Piece::Group(g));
        } else {
            return Err(Status::WrongCharAfterBackslash);
        }
        i += 2;
    }
    if !text.is_empty() {
        pieces.push(Piece::Text(text));
    }

    let (s0, e0) = regs.whole();
    // Capture the matched text before deleting it; group offsets are
    // rebased to the match start.
    let matched = b.cur_line_bytes()[s0..e0].to_vec();

    start_undo_chain(b);
    let mut result = delete_stream(b, b.cur_line_id, b.cur_line, b.cur_pos, e0 - s0);
    let mut inserted = 0;
    if result.is_ok() || e0 == s0 {
        result = Ok(());
        for piece in &pieces {
            let bytes: &[u8] = match piece {
                Piece::Text(t) => t,
                Piece::Group(g) => {
                    let (gs, ge) = regs.groups[*g].expect("checked above");
                    &matched[gs - s0..ge - s0]
                }
            };
            if bytes.is_empty() {
                continue;
            }
            result = insert_stream(b, b.cur_line_id, b.cur_line, b.cur_pos + inserted, bytes);
            if result.is_err() {
                break;
            }
            inserted += bytes.len();
        }
    }
    end_undo_chain(b);
    result?;

    if !b.opt.search_back {
        goto_pos(b, b.cur_pos + inserted);
    }
    engine.last_replace_empty_match = s0 == e0;
    Ok(())
}
