use super::*;
use crate::edit::insert_stream;

fn buffer_with(text: &[u8]) -> Buffer {
    let mut b = Buffer::new(false);
    if !text.is_empty() {
        let __id = b.cur_line_id;
        insert_stream(&mut b, __id, 0, 0, text).unwrap();
    }
    b
}

// =============================================================================
// Construction and line access
// =============================================================================

#[test]
fn test_new_buffer_has_one_empty_line() {
    let b = Buffer::new(false);
    assert_eq!(b.num_lines, 1);
    assert!(b.is_empty());
    assert_eq!(b.cur_line_len(), 0);
    assert!(!b.is_modified);
}

#[test]
fn test_line_access() {
    let b = buffer_with(b"alpha\0beta\0gamma");
    assert_eq!(b.num_lines, 3);
    assert_eq!(b.line_vec(0), b"alpha");
    assert_eq!(b.line_vec(1), b"beta");
    assert_eq!(b.line_vec(2), b"gamma");
    assert_eq!(b.content_string(), b"alpha\nbeta\ngamma");
}

#[test]
fn test_nth_line_id_all_traversal_paths() {
    let mut text = Vec::new();
    for i in 0..100 {
        if i > 0 {
            text.push(0);
        }
        text.extend_from_slice(format!("line{i}").as_bytes());
    }
    let mut b = buffer_with(&text);

    // From head, from tail, and from the cursor.
    assert_eq!(b.line_vec(3), b"line3");
    assert_eq!(b.line_vec(97), b"line97");
    b.cur_line = 50;
    b.cur_line_id = b.nth_line_id(50).unwrap();
    assert_eq!(b.line_vec(52), b"line52");
    assert_eq!(b.line_vec(48), b"line48");
    assert!(b.nth_line_id(100).is_none());
}

// =============================================================================
// Accounting
// =============================================================================

#[test]
fn test_pool_accounting_matches_line_lengths() {
    let b = buffer_with(b"alpha\0beta\0gamma");
    let total: usize = (0..b.num_lines).map(|n| b.line_vec(n).len()).sum();
    assert_eq!(b.used_chars(), total);
}

#[test]
fn test_clear_resets_everything() {
    let mut b = buffer_with(b"alpha\0beta");
    b.bookmark_mask = 3;
    b.clear();
    assert_eq!(b.num_lines, 1);
    assert!(b.is_empty());
    assert_eq!(b.used_chars(), 0);
    assert_eq!(b.bookmark_mask, 0);
    assert_eq!(b.cur_line, 0);
    assert_eq!(b.cur_pos, 0);
}

#[test]
fn test_detect_buffer_encoding() {
    assert_eq!(buffer_with(b"ascii").detect_buffer_encoding(), crate::encoding::Encoding::Ascii);
    assert_eq!(
        buffer_with("héllo".as_bytes()).detect_buffer_encoding(),
        crate::encoding::Encoding::Utf8
    );
    assert_eq!(
        buffer_with(&[b'a', 0xFF, b'b']).detect_buffer_encoding(),
        crate::encoding::Encoding::Byte8
    );
}

// =============================================================================
// Width and position conversion
// =============================================================================

#[test]
fn test_width_and_pos_round_trip_with_tabs() {
    let mut b = buffer_with(b"a\tbc");
    b.opt.tab_size = 4;
    let id = b.cur_line_id;
    assert_eq!(b.width_to(id, 2), 4);
    assert_eq!(b.width_to(id, 4), 6);
    assert_eq!(b.pos_at(id, 4), 2);
    assert_eq!(b.pos_at(id, 5), 3);
}
