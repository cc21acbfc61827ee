use super::*;
use crate::request::NullRequest;

fn ctx() -> EditorContext {
    EditorContext::new(false)
}

fn run(ctx: &mut EditorContext, line: &str) -> Status {
    let mut req = NullRequest;
    execute_command_line(ctx, &mut req, line)
}

fn act(ctx: &mut EditorContext, a: Action, c: i64, p: Option<&str>) -> Status {
    let mut req = NullRequest;
    do_action(ctx, &mut req, a, c, p.map(str::to_string))
}

fn lines_of(ctx: &EditorContext) -> Vec<Vec<u8>> {
    let b = ctx.cur_buffer();
    (0..b.num_lines).map(|n| b.line_vec(n)).collect()
}

// =============================================================================
// End-to-end scenarios
// =============================================================================

#[test]
fn test_insert_then_undo() {
    let mut ctx = ctx();
    assert_eq!(
        act(&mut ctx, Action::InsertString, -1, Some("Hello, world.")),
        Status::Ok
    );
    assert_eq!(lines_of(&ctx), vec![b"Hello, world.".to_vec()]);
    assert_eq!(ctx.cur_buffer().num_lines, 1);
    assert!(ctx.cur_buffer().is_modified);

    assert_eq!(act(&mut ctx, Action::Undo, -1, None), Status::Ok);
    assert_eq!(lines_of(&ctx), vec![b"".to_vec()]);
    assert_eq!(ctx.cur_buffer().num_lines, 1);
    assert!(!ctx.cur_buffer().is_modified);
}

#[test]
fn test_split_then_join() {
    let mut ctx = ctx();
    act(&mut ctx, Action::InsertString, -1, Some("abcdef"));
    crate::movement::goto_pos(ctx.cur_mut(), 3);

    assert_eq!(act(&mut ctx, Action::InsertLine, -1, None), Status::Ok);
    assert_eq!(lines_of(&ctx), vec![b"abc".to_vec(), b"def".to_vec()]);
    assert_eq!(
        (ctx.cur_buffer().cur_line, ctx.cur_buffer().cur_pos),
        (1, 0)
    );

    assert_eq!(act(&mut ctx, Action::Backspace, -1, None), Status::Ok);
    assert_eq!(lines_of(&ctx), vec![b"abcdef".to_vec()]);
    assert_eq!(
        (ctx.cur_buffer().cur_line, ctx.cur_buffer().cur_pos),
        (0, 3)
    );
}

#[test]
fn test_word_wrap_on_insert() {
    let mut ctx = ctx();
    act(&mut ctx, Action::InsertString, -1, Some("the quick brown"));
    assert_eq!(ctx.cur_buffer().cur_pos, 15);
    {
        let b = ctx.cur_mut();
        b.opt.word_wrap = true;
        b.opt.right_margin = 10;
        b.opt.tab_size = 4;
    }

    assert_eq!(act(&mut ctx, Action::InsertChar, ' ' as i64, None), Status::Ok);
    assert_eq!(
        lines_of(&ctx),
        vec![b"the quick".to_vec(), b"brown ".to_vec()]
    );
    assert_eq!(
        (ctx.cur_buffer().cur_line, ctx.cur_buffer().cur_pos),
        (1, 6)
    );
}

#[test]
fn test_regex_replace_all_with_backrefs_utf8() {
    let mut ctx = ctx();
    act(&mut ctx, Action::InsertString, -1, Some("αβγ αβγ"));
    assert_eq!(ctx.cur_buffer().encoding, crate::encoding::Encoding::Utf8);
    crate::movement::move_to_sof(ctx.cur_mut());

    assert_eq!(
        act(&mut ctx, Action::FindRegExp, -1, Some("(α)(β)(γ)")),
        Status::Ok
    );
    assert_eq!(ctx.cur_buffer().cur_pos, 0);

    assert_eq!(
        act(&mut ctx, Action::ReplaceAll, -1, Some("\\3\\2\\1")),
        Status::Ok
    );
    assert_eq!(lines_of(&ctx), vec!["γβα γβα".as_bytes().to_vec()]);
    // Cursor sits at the end of the last replacement.
    assert_eq!(ctx.cur_buffer().cur_pos, 13);
}

#[test]
fn test_vertical_cut_paste() {
    let mut ctx = ctx();
    act(&mut ctx, Action::InsertString, -1, Some("abcXYZ"));
    act(&mut ctx, Action::InsertLine, -1, None);
    act(&mut ctx, Action::InsertString, -1, Some("defXYZ"));
    act(&mut ctx, Action::InsertLine, -1, None);
    act(&mut ctx, Action::InsertString, -1, Some("ghiXYZ"));

    crate::movement::goto_line_pos(ctx.cur_mut(), 0, 3);
    act(&mut ctx, Action::MarkVert, 1, None);
    crate::movement::goto_line_pos(ctx.cur_mut(), 2, 6);
    assert_eq!(act(&mut ctx, Action::Cut, -1, None), Status::Ok);

    assert_eq!(
        lines_of(&ctx),
        vec![b"abc".to_vec(), b"def".to_vec(), b"ghi".to_vec()]
    );
    assert_eq!(
        ctx.clips.get(0).unwrap().stream.as_bytes(),
        b"XYZ\0XYZ\0XYZ\0"
    );

    crate::movement::goto_line_pos(ctx.cur_mut(), 0, 0);
    assert_eq!(act(&mut ctx, Action::PasteVert, -1, None), Status::Ok);
    assert_eq!(
        lines_of(&ctx),
        vec![b"XYZabc".to_vec(), b"XYZdef".to_vec(), b"XYZghi".to_vec()]
    );
}

#[test]
fn test_replace_all_single_undo() {
    let mut ctx = ctx();
    act(&mut ctx, Action::InsertString, -1, Some("a a a a"));
    crate::movement::move_to_sof(ctx.cur_mut());

    {
        let b = ctx.cur_mut();
        b.find_string = Some(b"a".to_vec());
        b.find_string_changed = 1;
        b.last_was_regexp = false;
    }
    assert_eq!(act(&mut ctx, Action::ReplaceAll, -1, Some("b")), Status::Ok);
    assert_eq!(lines_of(&ctx), vec![b"b b b b".to_vec()]);

    assert_eq!(act(&mut ctx, Action::Undo, -1, None), Status::Ok);
    assert_eq!(lines_of(&ctx), vec![b"a a a a".to_vec()]);
    assert_eq!(
        (ctx.cur_buffer().cur_line, ctx.cur_buffer().cur_pos),
        (0, 0)
    );
}

// =============================================================================
// Dispatcher conventions
// =============================================================================

#[test]
fn test_repeat_counts() {
    let mut ctx = ctx();
    act(&mut ctx, Action::InsertString, -1, Some("one"));
    for _ in 0..3 {
        act(&mut ctx, Action::InsertLine, -1, None);
        act(&mut ctx, Action::InsertString, -1, Some("one"));
    }
    crate::movement::move_to_sof(ctx.cur_mut());

    assert_eq!(act(&mut ctx, Action::LineDown, 2, None), Status::Ok);
    assert_eq!(ctx.cur_buffer().cur_line, 2);
    // Unspecified count means one.
    assert_eq!(act(&mut ctx, Action::LineDown, -1, None), Status::Ok);
    assert_eq!(ctx.cur_buffer().cur_line, 3);
}

#[test]
fn test_read_only_gates_edits() {
    let mut ctx = ctx();
    act(&mut ctx, Action::InsertString, -1, Some("text"));
    ctx.cur_mut().opt.read_only = true;
    assert_eq!(
        act(&mut ctx, Action::InsertChar, 'x' as i64, None),
        Status::DocumentIsReadOnly
    );
    assert_eq!(
        act(&mut ctx, Action::DeleteLine, -1, None),
        Status::DocumentIsReadOnly
    );
    assert_eq!(lines_of(&ctx), vec![b"text".to_vec()]);
}

#[test]
fn test_insert_char_promotes_encoding() {
    let mut ctx = ctx();
    assert_eq!(ctx.cur_buffer().encoding, crate::encoding::Encoding::Ascii);
    act(&mut ctx, Action::InsertChar, 'é' as i64, None);
    assert_eq!(ctx.cur_buffer().encoding, crate::encoding::Encoding::Utf8);

    // In a BYTE8 buffer, code points above 255 are refused.
    let mut ctx = EditorContext::new(false);
    ctx.cur_mut().opt.utf8auto = false;
    act(&mut ctx, Action::InsertChar, 0xE9, None);
    assert_eq!(ctx.cur_buffer().encoding, crate::encoding::Encoding::Byte8);
    assert_eq!(
        act(&mut ctx, Action::InsertChar, 0x3B1, None),
        Status::InvalidCharacter
    );
}

#[test]
fn test_insert_char_zero_refused() {
    let mut ctx = ctx();
    assert_eq!(act(&mut ctx, Action::InsertChar, 0, None), Status::CantInsert0);
}

#[test]
fn test_overwrite_mode() {
    let mut ctx = ctx();
    act(&mut ctx, Action::InsertString, -1, Some("abc"));
    crate::movement::goto_pos(ctx.cur_mut(), 0);
    ctx.cur_mut().opt.insert = false;
    act(&mut ctx, Action::InsertChar, 'X' as i64, None);
    assert_eq!(lines_of(&ctx), vec![b"Xbc".to_vec()]);
    // Beyond end-of-line overwrite behaves as insert.
    crate::movement::goto_pos(ctx.cur_mut(), 3);
    act(&mut ctx, Action::InsertChar, 'Y' as i64, None);
    assert_eq!(lines_of(&ctx), vec![b"XbcY".to_vec()]);
}

#[test]
fn test_free_form_insert_pads() {
    let mut ctx = ctx();
    {
        let b = ctx.cur_mut();
        b.opt.free_form = true;
    }
    act(&mut ctx, Action::InsertString, -1, Some("ab"));
    let b = ctx.cur_mut();
    crate::movement::goto_column(b, 5);
    assert_eq!(b.cur_pos, 5);
    act(&mut ctx, Action::InsertChar, 'x' as i64, None);
    assert_eq!(lines_of(&ctx), vec![b"ab   x".to_vec()]);
}

#[test]
fn test_command_line_round_trip() {
    let mut ctx = ctx();
    assert_eq!(run(&mut ctx, "InsertString hi"), Status::Ok);
    assert_eq!(run(&mut ctx, "IL"), Status::Ok);
    assert_eq!(run(&mut ctx, "IS there"), Status::Ok);
    assert_eq!(lines_of(&ctx), vec![b"hi".to_vec(), b"there".to_vec()]);
    assert_eq!(run(&mut ctx, "BogusCommand"), Status::NoSuchCommand);
}

#[test]
fn test_exec_only_options_mode() {
    let mut ctx = ctx();
    ctx.cur_mut().exec_only_options = true;
    assert_eq!(run(&mut ctx, "InsertString nope"), Status::CanExecuteOnlyOptions);
    assert_eq!(run(&mut ctx, "TabSize 4"), Status::Ok);
    assert_eq!(ctx.cur_buffer().opt.tab_size, 4);
}

#[test]
fn test_flag_toggle_convention() {
    let mut ctx = ctx();
    assert!(!ctx.cur_buffer().opt.word_wrap);
    act(&mut ctx, Action::WordWrap, -1, None);
    assert!(ctx.cur_buffer().opt.word_wrap);
    act(&mut ctx, Action::WordWrap, -1, None);
    assert!(!ctx.cur_buffer().opt.word_wrap);
    act(&mut ctx, Action::WordWrap, 1, None);
    assert!(ctx.cur_buffer().opt.word_wrap);
    act(&mut ctx, Action::WordWrap, 0, None);
    assert!(!ctx.cur_buffer().opt.word_wrap);
}

#[test]
fn test_tab_size_range() {
    let mut ctx = ctx();
    assert_eq!(act(&mut ctx, Action::TabSize, 0, None), Status::TabSizeOutOfRange);
    assert_eq!(act(&mut ctx, Action::TabSize, 500, None), Status::TabSizeOutOfRange);
    assert_eq!(act(&mut ctx, Action::TabSize, 4, None), Status::Ok);
    assert_eq!(ctx.cur_buffer().opt.tab_size, 4);
}

// =============================================================================
// Documents
// =============================================================================

#[test]
fn test_document_ring() {
    let mut ctx = ctx();
    act(&mut ctx, Action::InsertString, -1, Some("first"));
    act(&mut ctx, Action::NewDoc, -1, None);
    act(&mut ctx, Action::InsertString, -1, Some("second"));
    assert_eq!(ctx.buffers.len(), 2);
    assert_eq!(lines_of(&ctx), vec![b"second".to_vec()]);

    act(&mut ctx, Action::NextDoc, -1, None);
    assert_eq!(lines_of(&ctx), vec![b"first".to_vec()]);
    act(&mut ctx, Action::PrevDoc, -1, None);
    assert_eq!(lines_of(&ctx), vec![b"second".to_vec()]);

    // New documents inherit options from the current one.
    ctx.cur_mut().opt.tab_size = 2;
    act(&mut ctx, Action::NewDoc, -1, None);
    assert_eq!(ctx.cur_buffer().opt.tab_size, 2);
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.txt");
    std::fs::write(&path, "one\ntwo\n").unwrap();

    let mut ctx = ctx();
    assert_eq!(
        act(&mut ctx, Action::Open, -1, Some(path.to_str().unwrap())),
        Status::Ok
    );
    assert_eq!(
        lines_of(&ctx),
        vec![b"one".to_vec(), b"two".to_vec(), b"".to_vec()]
    );
    assert!(!ctx.cur_buffer().is_modified);

    act(&mut ctx, Action::MoveEof, -1, None);
    act(&mut ctx, Action::InsertString, -1, Some("three"));
    assert_eq!(act(&mut ctx, Action::Save, -1, None), Status::Ok);
    assert_eq!(std::fs::read(&path).unwrap(), b"one\ntwo\nthree");
    assert!(!ctx.cur_buffer().is_modified);
}

#[test]
fn test_save_tracks_modification_through_undo() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("m.txt");

    let mut ctx = ctx();
    act(&mut ctx, Action::InsertString, -1, Some("v1"));
    act(&mut ctx, Action::SaveAs, -1, Some(path.to_str().unwrap()));
    assert!(!ctx.cur_buffer().is_modified);

    act(&mut ctx, Action::InsertString, -1, Some("x"));
    assert!(ctx.cur_buffer().is_modified);
    act(&mut ctx, Action::Undo, -1, None);
    // Undoing back to the save point clears the flag.
    assert!(!ctx.cur_buffer().is_modified);
}

// =============================================================================
// Macros
// =============================================================================

#[test]
fn test_record_and_play() {
    let mut ctx = ctx();
    act(&mut ctx, Action::Record, 1, None);
    act(&mut ctx, Action::InsertString, -1, Some("ab"));
    act(&mut ctx, Action::InsertLine, -1, None);
    act(&mut ctx, Action::Record, 0, None);

    assert_eq!(act(&mut ctx, Action::Play, 2, None), Status::Ok);
    // Original run plus two replays.
    assert_eq!(
        lines_of(&ctx),
        vec![
            b"ab".to_vec(),
            b"ab".to_vec(),
            b"ab".to_vec(),
            b"".to_vec()
        ]
    );
}

#[test]
fn test_record_skips_unrecordable() {
    let mut ctx = ctx();
    act(&mut ctx, Action::Record, 1, None);
    act(&mut ctx, Action::Macro, -1, Some("no-such-macro"));
    act(&mut ctx, Action::InsertChar, 'z' as i64, None);
    act(&mut ctx, Action::Record, 0, None);

    let recorded: Vec<String> = ctx
        .cur_buffer()
        .cur_macro
        .segments()
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect();
    assert!(recorded.iter().any(|l| l.starts_with("InsertChar")));
    assert!(!recorded.iter().any(|l| l.starts_with("Macro")));
}

#[test]
fn test_named_macro_execution_and_depth() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("addx"), "IS x").unwrap();
    // A macro that calls itself recurses to the depth limit.
    std::fs::write(dir.path().join("looper"), "IS y\nlooper").unwrap();

    let mut ctx = ctx();
    ctx.macro_dirs = vec![dir.path().to_path_buf()];
    assert_eq!(run(&mut ctx, "addx"), Status::Ok);
    assert_eq!(lines_of(&ctx), vec![b"x".to_vec()]);

    let rc = run(&mut ctx, "looper");
    assert_eq!(rc, Status::MaxMacroDepthExceeded);
    // One "y" per allowed nesting level.
    assert_eq!(
        ctx.cur_buffer().line_vec(0).iter().filter(|&&c| c == b'y').count(),
        crate::constants::MAX_MACRO_DEPTH
    );
}

// =============================================================================
// Bookmarks
// =============================================================================

#[test]
fn test_bookmark_set_goto_auto() {
    let mut ctx = ctx();
    for i in 0..5 {
        act(&mut ctx, Action::InsertString, -1, Some(format!("line{i}").as_str()));
        if i < 4 {
            act(&mut ctx, Action::InsertLine, -1, None);
        }
    }
    crate::movement::goto_line_pos(ctx.cur_mut(), 1, 2);
    assert_eq!(act(&mut ctx, Action::SetBookmark, -1, Some("3")), Status::Ok);

    crate::movement::goto_line_pos(ctx.cur_mut(), 4, 0);
    assert_eq!(act(&mut ctx, Action::GotoBookmark, -1, Some("3")), Status::Ok);
    assert_eq!(
        (ctx.cur_buffer().cur_line, ctx.cur_buffer().cur_pos),
        (1, 2)
    );

    // The jump recorded the previous position in the auto bookmark.
    assert_eq!(act(&mut ctx, Action::GotoBookmark, -1, Some("-")), Status::Ok);
    assert_eq!(
        (ctx.cur_buffer().cur_line, ctx.cur_buffer().cur_pos),
        (4, 0)
    );
}

#[test]
fn test_bookmark_errors() {
    let mut ctx = ctx();
    assert_eq!(
        act(&mut ctx, Action::GotoBookmark, -1, Some("7")),
        Status::BookmarkNotSet
    );
    assert_eq!(
        act(&mut ctx, Action::SetBookmark, -1, Some("12")),
        Status::InvalidBookmarkDesignation
    );
    assert_eq!(
        act(&mut ctx, Action::UnsetBookmark, -1, Some("*")),
        Status::Ok
    );
}

#[test]
fn test_bookmarks_follow_edits() {
    let mut ctx = ctx();
    act(&mut ctx, Action::InsertString, -1, Some("hello world"));
    crate::movement::goto_pos(ctx.cur_mut(), 6);
    act(&mut ctx, Action::SetBookmark, -1, Some("0"));

    crate::movement::goto_pos(ctx.cur_mut(), 0);
    act(&mut ctx, Action::InsertString, -1, Some(">> "));
    assert_eq!(ctx.cur_buffer().bookmarks[0].pos, 9);

    assert_eq!(act(&mut ctx, Action::GotoBookmark, -1, Some("0")), Status::Ok);
    assert_eq!(ctx.cur_buffer().cur_pos, 9);
    let b = ctx.cur_buffer();
    assert_eq!(&b.line_vec(0)[b.cur_pos..], b"world");
}

// =============================================================================
// Through
// =============================================================================

#[test]
fn test_through_filters_selection() {
    let mut ctx = ctx();
    act(&mut ctx, Action::InsertString, -1, Some("banana"));
    act(&mut ctx, Action::InsertLine, -1, None);
    act(&mut ctx, Action::InsertString, -1, Some("apple"));

    crate::movement::move_to_sof(ctx.cur_mut());
    act(&mut ctx, Action::Mark, 1, None);
    act(&mut ctx, Action::MoveEof, -1, None);

    assert_eq!(act(&mut ctx, Action::Through, -1, Some("sort")), Status::Ok);
    // sort terminates its output, so a final empty line appears.
    assert_eq!(
        lines_of(&ctx),
        vec![b"apple".to_vec(), b"banana".to_vec(), b"".to_vec()]
    );

    // The whole filter round trip is one undo atom.
    assert_eq!(act(&mut ctx, Action::Undo, -1, None), Status::Ok);
    assert_eq!(lines_of(&ctx), vec![b"banana".to_vec(), b"apple".to_vec()]);
}

// =============================================================================
// Stop flag
// =============================================================================

#[test]
fn test_stop_flag_interrupts_repeats() {
    let mut ctx = ctx();
    for _ in 0..5 {
        act(&mut ctx, Action::InsertLine, -1, None);
    }
    crate::movement::move_to_sof(ctx.cur_mut());

    // The flag is cleared at dispatch entry, so a pre-set flag stops
    // the very first iteration check only if set during execution;
    // simulate an interrupt arriving mid-loop by setting it from the
    // first iteration's effect.
    let flag = ctx.stop_flag();
    flag.store(true, std::sync::atomic::Ordering::Relaxed);
    let rc = act(&mut ctx, Action::LineDown, 5, None);
    // The dispatcher cleared the pending flag before looping.
    assert_eq!(rc, Status::Ok);
    assert_eq!(ctx.cur_buffer().cur_line, 5);
}

// =============================================================================
// Atomic undo levels
// =============================================================================

#[test]
fn test_atomic_undo_levels() {
    let mut ctx = ctx();
    assert_eq!(act(&mut ctx, Action::AtomicUndo, -1, Some("+")), Status::Ok);
    act(&mut ctx, Action::InsertString, -1, Some("a"));
    act(&mut ctx, Action::InsertLine, -1, None);
    act(&mut ctx, Action::InsertString, -1, Some("b"));
    assert_eq!(act(&mut ctx, Action::AtomicUndo, -1, Some("-")), Status::Ok);

    assert_eq!(act(&mut ctx, Action::Undo, -1, None), Status::Ok);
    assert_eq!(lines_of(&ctx), vec![b"".to_vec()]);

    assert_eq!(
        act(&mut ctx, Action::AtomicUndo, -1, Some("-")),
        Status::InvalidLevel
    );
}

#[test]
fn test_undo_disabled() {
    let mut ctx = ctx();
    act(&mut ctx, Action::DoUndo, 0, None);
    act(&mut ctx, Action::InsertString, -1, Some("x"));
    assert_eq!(act(&mut ctx, Action::Undo, -1, None), Status::UndoNotEnabled);
}
