use super::*;
use crate::buffer::Buffer;
use crate::undo::{end_undo_chain, redo, start_undo_chain, undo};

fn buffer_with(text: &[u8]) -> Buffer {
    let mut b = Buffer::new(false);
    if !text.is_empty() {
        let __id = b.cur_line_id;
        insert_stream(&mut b, __id, 0, 0, text).unwrap();
    }
    b
}

fn lines_of(b: &Buffer) -> Vec<Vec<u8>> {
    (0..b.num_lines).map(|n| b.line_vec(n)).collect()
}

fn assert_accounting(b: &Buffer) {
    let total: usize = (0..b.num_lines).map(|n| b.line_vec(n).len()).sum();
    assert_eq!(b.used_chars(), total, "pool accounting out of sync");
}

// =============================================================================
// insert_stream
// =============================================================================

#[test]
fn test_insert_into_empty_line() {
    let mut b = Buffer::new(false);
    let __id = b.cur_line_id;
    insert_stream(&mut b, __id, 0, 0, b"hello").unwrap();
    assert_eq!(lines_of(&b), vec![b"hello".to_vec()]);
    assert!(b.is_modified);
    assert_accounting(&b);
}

#[test]
fn test_insert_middle_of_line() {
    let mut b = buffer_with(b"hed");
    let __id = b.cur_line_id;
    insert_stream(&mut b, __id, 0, 2, b"llo worl").unwrap();
    assert_eq!(lines_of(&b), vec![b"hello world".to_vec()]);
    assert_accounting(&b);
}

#[test]
fn test_insert_with_interior_nul_splits() {
    let mut b = buffer_with(b"abcdef");
    let __id = b.cur_line_id;
    insert_stream(&mut b, __id, 0, 3, b"\0").unwrap();
    assert_eq!(lines_of(&b), vec![b"abc".to_vec(), b"def".to_vec()]);
    assert_eq!(b.num_lines, 2);
    assert_accounting(&b);
}

#[test]
fn test_insert_multiline_stream() {
    let mut b = buffer_with(b"XY");
    let __id = b.cur_line_id;
    insert_stream(&mut b, __id, 0, 1, b"one\0two\0three").unwrap();
    assert_eq!(
        lines_of(&b),
        vec![b"Xone".to_vec(), b"two".to_vec(), b"threeY".to_vec()]
    );
    assert_accounting(&b);
}

#[test]
fn test_insert_rejects_bad_positions() {
    let mut b = buffer_with(b"ab");
    let __id = b.cur_line_id;
    assert!(insert_stream(&mut b, __id, 0, 3, b"x").is_err());
    let __id = b.cur_line_id;
    assert!(insert_stream(&mut b, __id, 0, 0, b"").is_err());
}

#[test]
fn test_insert_adjusts_mark_and_bookmarks() {
    let mut b = buffer_with(b"abcdef");
    b.marking = true;
    b.block_start_line = 0;
    b.block_start_pos = 4;
    b.bookmarks[2].line = 0;
    b.bookmarks[2].pos = 5;
    b.bookmark_mask = 1 << 2;

    let __id = b.cur_line_id;
    insert_stream(&mut b, __id, 0, 2, b"XX").unwrap();
    assert_eq!(b.block_start_pos, 6);
    assert_eq!(b.bookmarks[2].pos, 7);

    // A split before the bookmark moves it down a line.
    let __id = b.cur_line_id;
    insert_stream(&mut b, __id, 0, 1, b"\0").unwrap();
    assert_eq!(b.bookmarks[2].line, 1);
    assert_eq!(b.bookmarks[2].pos, 6);
    assert_eq!(b.block_start_line, 1);
    assert_eq!(b.block_start_pos, 5);
}

// =============================================================================
// delete_stream
// =============================================================================

#[test]
fn test_delete_within_line() {
    let mut b = buffer_with(b"hello world");
    let __id = b.cur_line_id;
    delete_stream(&mut b, __id, 0, 2, 3).unwrap();
    assert_eq!(lines_of(&b), vec![b"he world".to_vec()]);
    assert_accounting(&b);
}

#[test]
fn test_delete_joins_lines() {
    let mut b = buffer_with(b"abc\0def");
    let __id = b.cur_line_id;
    delete_stream(&mut b, __id, 0, 3, 1).unwrap();
    assert_eq!(lines_of(&b), vec![b"abcdef".to_vec()]);
    assert_eq!(b.num_lines, 1);
    assert_accounting(&b);
}

#[test]
fn test_delete_spanning_lines() {
    let mut b = buffer_with(b"abc\0def\0ghi");
    // From (0,1), delete "bc\ndef\ng" = 8 bytes counting joins.
    let __id = b.cur_line_id;
    delete_stream(&mut b, __id, 0, 1, 8).unwrap();
    assert_eq!(lines_of(&b), vec![b"ahi".to_vec()]);
    assert_accounting(&b);
}

#[test]
fn test_delete_clamps_at_end_of_buffer() {
    let mut b = buffer_with(b"ab");
    let __id = b.cur_line_id;
    delete_stream(&mut b, __id, 0, 1, 100).unwrap();
    assert_eq!(lines_of(&b), vec![b"a".to_vec()]);
    assert_accounting(&b);
}

#[test]
fn test_delete_adjusts_mark_and_bookmarks() {
    let mut b = buffer_with(b"abcdef");
    b.bookmarks[0] = crate::buffer::Bookmark { line: 0, pos: 4, cur_y: 0 };
    b.bookmarks[1] = crate::buffer::Bookmark { line: 0, pos: 2, cur_y: 0 };
    b.bookmark_mask = 3;

    // Deleting [1, 4) collapses positions inside to 1, shifts later
    // ones left.
    let __id = b.cur_line_id;
    delete_stream(&mut b, __id, 0, 1, 3).unwrap();
    assert_eq!(b.bookmarks[0].pos, 1);
    assert_eq!(b.bookmarks[1].pos, 1);
}

#[test]
fn test_join_adjusts_bookmarks() {
    let mut b = buffer_with(b"abc\0def");
    b.bookmarks[0] = crate::buffer::Bookmark { line: 1, pos: 2, cur_y: 0 };
    b.bookmark_mask = 1;
    let __id = b.cur_line_id;
    delete_stream(&mut b, __id, 0, 3, 1).unwrap();
    assert_eq!(b.bookmarks[0].line, 0);
    assert_eq!(b.bookmarks[0].pos, 5);
}

// =============================================================================
// Undo round trips at the primitive level
// =============================================================================

#[test]
fn test_undo_reverts_insert() {
    let mut b = buffer_with(b"base");
    let __id = b.cur_line_id;
    insert_stream(&mut b, __id, 0, 2, b"XX\0YY").unwrap();
    assert_eq!(b.num_lines, 2);
    undo(&mut b).unwrap();
    assert_eq!(lines_of(&b), vec![b"base".to_vec()]);
    assert_accounting(&b);
}

#[test]
fn test_undo_redo_round_trip_delete() {
    let mut b = buffer_with(b"abc\0def\0ghi");
    let __id = b.cur_line_id;
    delete_stream(&mut b, __id, 0, 1, 8).unwrap();
    assert_eq!(lines_of(&b), vec![b"ahi".to_vec()]);

    undo(&mut b).unwrap();
    assert_eq!(
        lines_of(&b),
        vec![b"abc".to_vec(), b"def".to_vec(), b"ghi".to_vec()]
    );

    redo(&mut b).unwrap();
    assert_eq!(lines_of(&b), vec![b"ahi".to_vec()]);
    assert_accounting(&b);
}

#[test]
fn test_undo_chain_reverts_as_one() {
    let mut b = buffer_with(b"abcdef");
    start_undo_chain(&mut b);
    let __id = b.cur_line_id;
    delete_stream(&mut b, __id, 0, 0, 2).unwrap();
    let __id = b.cur_line_id;
    insert_stream(&mut b, __id, 0, 0, b"ZZ").unwrap();
    let __id = b.cur_line_id;
    delete_stream(&mut b, __id, 0, 4, 2).unwrap();
    end_undo_chain(&mut b);
    assert_eq!(lines_of(&b), vec![b"ZZcd".to_vec()]);

    undo(&mut b).unwrap();
    assert_eq!(lines_of(&b), vec![b"abcdef".to_vec()]);

    redo(&mut b).unwrap();
    assert_eq!(lines_of(&b), vec![b"ZZcd".to_vec()]);
}

#[test]
fn test_new_edit_discards_redo_branch() {
    let mut b = buffer_with(b"one");
    let __id = b.cur_line_id;
    insert_stream(&mut b, __id, 0, 3, b"two").unwrap();
    undo(&mut b).unwrap();
    assert_eq!(lines_of(&b), vec![b"one".to_vec()]);

    let __id = b.cur_line_id;
    insert_stream(&mut b, __id, 0, 3, b"NEW").unwrap();
    assert!(redo(&mut b).is_err());
    assert_eq!(lines_of(&b), vec![b"oneNEW".to_vec()]);
}

#[test]
fn test_nothing_to_undo() {
    let mut b = Buffer::new(false);
    assert_eq!(undo(&mut b), Err(crate::error::Status::NothingToUndo));
    assert_eq!(redo(&mut b), Err(crate::error::Status::NothingToRedo));
}

// =============================================================================
// Derived operations
// =============================================================================

#[test]
fn test_delete_one_line_stashes_for_undel() {
    let mut b = buffer_with(b"abc\0def");
    let __id = b.cur_line_id;
    delete_one_line(&mut b, __id, 0).unwrap();
    assert_eq!(lines_of(&b), vec![b"def".to_vec()]);
    assert_eq!(b.last_deleted.as_ref().unwrap().as_bytes(), b"abc");

    undelete_line(&mut b).unwrap();
    assert_eq!(lines_of(&b), vec![b"abc".to_vec(), b"def".to_vec()]);
}

#[test]
fn test_delete_to_eol() {
    let mut b = buffer_with(b"hello world");
    let __id = b.cur_line_id;
    delete_to_eol(&mut b, __id, 0, 5).unwrap();
    assert_eq!(lines_of(&b), vec![b"hello".to_vec()]);
}

#[test]
fn test_insert_one_char_utf8() {
    let mut b = Buffer::new(false);
    b.encoding = crate::encoding::Encoding::Utf8;
    let __id = b.cur_line_id;
    insert_one_char(&mut b, __id, 0, 0, 'α' as u32).unwrap();
    assert_eq!(b.line_vec(0), "α".as_bytes());
}

#[test]
fn test_case_change_capitalizes_word() {
    let mut b = buffer_with(b"hello world");
    case_change(&mut b, crate::character::to_upper, crate::character::to_lower).unwrap();
    assert_eq!(b.line_vec(0), b"Hello world");
    // The cursor moved to the next word.
    assert_eq!(b.cur_pos, 6);
}

// =============================================================================
// Reformatting
// =============================================================================

#[test]
fn test_word_wrap_breaks_at_space() {
    use crate::movement::goto_pos;
    let mut b = buffer_with(b"the quick brown");
    goto_pos(&mut b, 15);
    let moved = reformat::word_wrap(&mut b).unwrap();
    assert_eq!(lines_of(&b), vec![b"the quick".to_vec(), b"brown".to_vec()]);
    assert_eq!(moved, 5);
}

#[test]
fn test_word_wrap_refuses_first_word() {
    use crate::movement::goto_pos;
    let mut b = buffer_with(b"unbreakable");
    goto_pos(&mut b, 10);
    assert!(reformat::word_wrap(&mut b).is_err());
}

#[test]
fn test_auto_indent_copies_leading_space() {
    let mut b = buffer_with(b"    code\0next");
    let second = b.lines.next(b.lines.first());
    let n = reformat::auto_indent_line(&mut b, 1, second, usize::MAX).unwrap();
    assert_eq!(n, 4);
    assert_eq!(b.line_vec(1), b"    next");
}

#[test]
fn test_center_line() {
    let mut b = buffer_with(b"  hi  ");
    b.opt.right_margin = 10;
    reformat::center(&mut b).unwrap();
    assert_eq!(b.line_vec(0), b"    hi");
}

#[test]
fn test_shift_right_and_back() {
    let mut b = buffer_with(b"one\0two");
    b.opt.tabs = false;
    let never = || false;
    reformat::shift(&mut b, Some(">2s"), &never).unwrap();
    assert_eq!(b.line_vec(0), b"  one");

    crate::movement::goto_line(&mut b, 0);
    reformat::shift(&mut b, Some("<2s"), &never).unwrap();
    assert_eq!(b.line_vec(0), b"one");
}

#[test]
fn test_shift_left_needs_whitespace() {
    let mut b = buffer_with(b"one");
    let never = || false;
    assert_eq!(
        reformat::shift(&mut b, Some("<1s"), &never),
        Err(crate::error::Status::InsufficientWhitespace)
    );
}

#[test]
fn test_paragraph_reflow() {
    let mut b = buffer_with(b"alpha beta gamma delta\0epsilon zeta");
    b.opt.right_margin = 12;
    let never = || false;
    let _ = reformat::paragraph(&mut b, &never, true);
    let all = lines_of(&b);
    // Every line fits the margin and no word was lost.
    for line in &all {
        assert!(crate::character::calc_width(line, line.len(), 8, b.encoding) <= 12);
    }
    let text: Vec<u8> = all.join(&b' ');
    assert_eq!(text, b"alpha beta gamma delta epsilon zeta".to_vec());
}

// =============================================================================
// Brackets
// =============================================================================

#[test]
fn test_match_bracket() {
    use crate::movement::goto_pos;
    let mut b = buffer_with(b"fn f(a, (b))\0{ body }");
    goto_pos(&mut b, 4);
    brackets::match_bracket(&mut b).unwrap();
    assert_eq!((b.cur_line, b.cur_pos), (0, 11));

    brackets::match_bracket(&mut b).unwrap();
    assert_eq!((b.cur_line, b.cur_pos), (0, 4));
}

#[test]
fn test_match_bracket_errors() {
    use crate::movement::goto_pos;
    let mut b = buffer_with(b"abc(");
    goto_pos(&mut b, 0);
    assert_eq!(
        brackets::match_bracket(&mut b),
        Err(crate::error::Status::NotOnABracket)
    );
    goto_pos(&mut b, 3);
    assert_eq!(
        brackets::match_bracket(&mut b),
        Err(crate::error::Status::CantFindBracket)
    );
}
