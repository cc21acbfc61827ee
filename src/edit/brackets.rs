//! Bracket matching

use crate::buffer::Buffer;
use crate::character::{next_pos, prev_pos};
use crate::error::{Result, Status};
use crate::line::LineId;
use crate::movement::goto_line_pos;

const BRACKET_TABLE: [[u8; 2]; 5] = [
    [b'(', b')'],
    [b'[', b']'],
    [b'{', b'}'],
    [b'<', b'>'],
    [b'`', b'\''],
];

/// Finds the bracket matching the one under the cursor within the given
/// line range. Returns the match position and the bracket character.
pub fn find_matching_bracket(
    b: &Buffer,
    min_line: usize,
    max_line: usize,
) -> Result<(usize, usize, u8)> {
    let enc = b.encoding;
    let cur = b.cur_line_bytes();
    if b.cur_pos >= cur.len() {
        return Err(Status::NotOnABracket);
    }

    let mut kind = None;
    for (i, pair) in BRACKET_TABLE.iter().enumerate() {
        for (j, &ch) in pair.iter().enumerate() {
            if cur[b.cur_pos] == ch {
                kind = Some((i, j));
            }
        }
    }
    let Some((i, j)) = kind else {
        return Err(Status::NotOnABracket);
    };
    let dir: i64 = if j == 1 { -1 } else { 1 };
    let open = BRACKET_TABLE[i][j];
    let close = BRACKET_TABLE[i][1 - j];

    let mut n: i64 = 0;
    let mut y = b.cur_line as i64;
    let mut id: LineId = b.cur_line_id;
    let mut pos: i64 = b.cur_pos as i64;

    while y >= min_line as i64 && y <= max_line as i64 {
        if pos >= 0 {
            let line = b.line_bytes(id);
            while pos >= 0 && (pos as usize) < line.len() {
                let c = line[pos as usize];
                if c == open {
                    n += 1;
                } else if c == close {
                    n -= 1;
                }
                if n == 0 {
                    return Ok((y as usize, pos as usize, c));
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

        pos = -1;
        if dir > 0 {
            id = b.lines.next(id);
            if b.lines.is_tail(id) {
                break;
            }
            if b.line_len(id) > 0 {
                pos = 0;
            }
            y += 1;
        } else {
            id = b.lines.prev(id);
            if b.lines.is_head(id) {
                break;
            }
            let line = b.line_bytes(id);
            if !line.is_empty() {
                pos = prev_pos(line, line.len(), enc) as i64;
            }
            y -= 1;
        }
    }

    Err(Status::CantFindBracket)
}

/// Moves the cursor onto the bracket matching the one under it.
pub fn match_bracket(b: &mut Buffer) -> Result {
    let (line, pos, _) = find_matching_bracket(b, 0, b.num_lines - 1)?;
    goto_line_pos(b, line, pos);
    Ok(())
}
