use super::*;
use crate::buffer::Buffer;
use crate::edit::insert_stream;
use crate::movement::{goto_line_pos, goto_pos};

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

fn mark_at(b: &mut Buffer, line: usize, pos: usize, vertical: bool) {
    b.marking = true;
    b.mark_is_vertical = vertical;
    b.block_start_line = line;
    b.block_start_pos = pos;
}

// =============================================================================
// Linear copy/cut/paste
// =============================================================================

#[test]
fn test_copy_single_line_region() {
    let mut b = buffer_with(b"hello world");
    let mut clips = ClipRegistry::new();
    mark_at(&mut b, 0, 0, false);
    goto_pos(&mut b, 5);
    copy_to_clip(&mut b, &mut clips, 0, false).unwrap();
    assert_eq!(clips.get(0).unwrap().stream.as_bytes(), b"hello");
    assert_eq!(lines_of(&b), vec![b"hello world".to_vec()]);
}

#[test]
fn test_copy_multiline_region_has_nul_boundaries() {
    let mut b = buffer_with(b"one\0two\0three");
    let mut clips = ClipRegistry::new();
    mark_at(&mut b, 0, 1, false);
    goto_line_pos(&mut b, 2, 2);
    copy_to_clip(&mut b, &mut clips, 0, false).unwrap();
    assert_eq!(clips.get(0).unwrap().stream.as_bytes(), b"ne\0two\0th");
}

#[test]
fn test_cut_removes_region() {
    let mut b = buffer_with(b"one\0two\0three");
    let mut clips = ClipRegistry::new();
    mark_at(&mut b, 0, 1, false);
    goto_line_pos(&mut b, 2, 2);
    copy_to_clip(&mut b, &mut clips, 0, true).unwrap();
    assert_eq!(lines_of(&b), vec![b"oree".to_vec()]);
    assert_eq!((b.cur_line, b.cur_pos), (0, 1));
}

#[test]
fn test_cut_reverse_region() {
    let mut b = buffer_with(b"one\0two");
    let mut clips = ClipRegistry::new();
    goto_line_pos(&mut b, 1, 2);
    mark_at(&mut b, 1, 2, false);
    goto_line_pos(&mut b, 0, 1);
    copy_to_clip(&mut b, &mut clips, 0, true).unwrap();
    assert_eq!(clips.get(0).unwrap().stream.as_bytes(), b"ne\0tw");
    assert_eq!(lines_of(&b), vec![b"oo".to_vec()]);
}

#[test]
fn test_paste_linear() {
    let mut b = buffer_with(b"AB");
    let mut clips = ClipRegistry::new();
    let mut cs = CharStream::new();
    cs.append(b"x\0y");
    clips.put(7, cs);

    goto_pos(&mut b, 1);
    paste_to_buffer(&mut b, &clips, 7).unwrap();
    assert_eq!(lines_of(&b), vec![b"Ax".to_vec(), b"yB".to_vec()]);
}

#[test]
fn test_paste_missing_clip() {
    let mut b = buffer_with(b"x");
    let clips = ClipRegistry::new();
    assert_eq!(
        paste_to_buffer(&mut b, &clips, 9),
        Err(Status::ClipDoesntExist)
    );
}

#[test]
fn test_paste_encoding_rules() {
    let mut b = buffer_with(b"ascii");
    let mut clips = ClipRegistry::new();
    let mut cs = CharStream::new();
    cs.append("é".as_bytes());
    cs.set_encoding_from_content(Encoding::Utf8);
    clips.put(0, cs);

    // ASCII buffer promotes to the clip encoding.
    paste_to_buffer(&mut b, &clips, 0).unwrap();
    assert_eq!(b.encoding, Encoding::Utf8);

    // A BYTE8 buffer refuses a UTF-8 clip.
    let mut b8 = buffer_with(&[0xFF]);
    b8.encoding = Encoding::Byte8;
    assert_eq!(
        paste_to_buffer(&mut b8, &clips, 0),
        Err(Status::IncompatibleClipEncoding)
    );
}

#[test]
fn test_erase_block() {
    let mut b = buffer_with(b"one\0two");
    mark_at(&mut b, 0, 1, false);
    goto_line_pos(&mut b, 1, 1);
    erase_block(&mut b).unwrap();
    assert_eq!(lines_of(&b), vec![b"owo".to_vec()]);
}

// =============================================================================
// Vertical operations
// =============================================================================

#[test]
fn test_vertical_cut_and_paste() {
    let mut b = buffer_with(b"abcXYZ\0defXYZ\0ghiXYZ");
    let mut clips = ClipRegistry::new();

    goto_line_pos(&mut b, 0, 3);
    mark_at(&mut b, 0, 3, true);
    goto_line_pos(&mut b, 2, 6);
    copy_vert_to_clip(&mut b, &mut clips, 0, true).unwrap();

    assert_eq!(
        lines_of(&b),
        vec![b"abc".to_vec(), b"def".to_vec(), b"ghi".to_vec()]
    );
    assert_eq!(clips.get(0).unwrap().stream.as_bytes(), b"XYZ\0XYZ\0XYZ\0");

    goto_line_pos(&mut b, 0, 0);
    paste_vert_to_buffer(&mut b, &clips, 0).unwrap();
    assert_eq!(
        lines_of(&b),
        vec![b"XYZabc".to_vec(), b"XYZdef".to_vec(), b"XYZghi".to_vec()]
    );
}

#[test]
fn test_vertical_cut_is_one_undo_atom() {
    use crate::undo::undo;
    let mut b = buffer_with(b"abXY\0cdXY");
    let mut clips = ClipRegistry::new();

    goto_line_pos(&mut b, 0, 2);
    mark_at(&mut b, 0, 2, true);
    goto_line_pos(&mut b, 1, 4);
    copy_vert_to_clip(&mut b, &mut clips, 0, true).unwrap();
    assert_eq!(lines_of(&b), vec![b"ab".to_vec(), b"cd".to_vec()]);

    undo(&mut b).unwrap();
    assert_eq!(lines_of(&b), vec![b"abXY".to_vec(), b"cdXY".to_vec()]);
}

#[test]
fn test_vertical_paste_pads_short_lines() {
    let mut b = buffer_with(b"longline\0ab\0x");
    let mut clips = ClipRegistry::new();
    let mut cs = CharStream::new();
    cs.append(b"Q\0Q\0Q\0");
    clips.put(0, cs);

    goto_line_pos(&mut b, 0, 5);
    paste_vert_to_buffer(&mut b, &clips, 0).unwrap();
    assert_eq!(
        lines_of(&b),
        vec![
            b"longlQine".to_vec(),
            b"ab   Q".to_vec(),
            b"x    Q".to_vec()
        ]
    );
}

#[test]
fn test_vertical_paste_extends_buffer() {
    let mut b = buffer_with(b"a");
    let mut clips = ClipRegistry::new();
    let mut cs = CharStream::new();
    cs.append(b"1\02\0");
    clips.put(0, cs);

    goto_line_pos(&mut b, 0, 1);
    paste_vert_to_buffer(&mut b, &clips, 0).unwrap();
    assert_eq!(lines_of(&b), vec![b"a1".to_vec(), b" 2".to_vec()]);
}

#[test]
fn test_erase_vert_block() {
    let mut b = buffer_with(b"a1z\0b2z\0c3z");
    goto_line_pos(&mut b, 0, 1);
    mark_at(&mut b, 0, 1, true);
    goto_line_pos(&mut b, 2, 2);
    erase_vert_block(&mut b).unwrap();
    assert_eq!(
        lines_of(&b),
        vec![b"az".to_vec(), b"bz".to_vec(), b"cz".to_vec()]
    );
}

// =============================================================================
// Clip files
// =============================================================================

#[test]
fn test_clip_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.txt");

    let mut clips = ClipRegistry::new();
    let mut cs = CharStream::new();
    cs.append(b"one\0two");
    clips.put(3, cs);

    save_clip(&clips, 3, &path, false, false).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"one\ntwo");

    let mut clips2 = ClipRegistry::new();
    load_clip(&mut clips2, 5, &path, false, false).unwrap();
    assert_eq!(clips2.get(5).unwrap().stream.as_bytes(), b"one\0two");
}

#[test]
fn test_copy_requires_mark() {
    let mut b = buffer_with(b"x");
    let mut clips = ClipRegistry::new();
    assert_eq!(
        copy_to_clip(&mut b, &mut clips, 0, false),
        Err(Status::MarkBlockFirst)
    );
}
