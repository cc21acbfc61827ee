use super::*;
use crate::command::Action;

fn segments(cs: &CharStream) -> Vec<String> {
    cs.segments()
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}

// =============================================================================
// Recording
// =============================================================================

#[test]
fn test_record_long_and_short_names() {
    let mut cs = CharStream::new();
    record_action(&mut cs, Action::LineDown, 3, None, true);
    record_action(&mut cs, Action::LineUp, -1, None, false);
    assert_eq!(segments(&cs), vec!["LineDown 3", "LU", ""]);
}

#[test]
fn test_record_string_arguments() {
    let mut cs = CharStream::new();
    record_action(&mut cs, Action::Find, -1, Some("needle"), true);
    record_action(&mut cs, Action::InsertString, -1, Some(" lead"), true);
    assert_eq!(
        segments(&cs),
        vec!["Find needle", "InsertString \" lead\"", ""]
    );
}

#[test]
fn test_record_comment_nop() {
    let mut cs = CharStream::new();
    record_action(&mut cs, Action::Nop, -1, Some("# marker"), true);
    assert_eq!(segments(&cs), vec!["# marker", ""]);
}

// =============================================================================
// Optimization
// =============================================================================

fn stream_of(lines: &[&str]) -> CharStream {
    let mut cs = CharStream::new();
    for l in lines {
        cs.append(l.as_bytes());
        cs.append(&[0]);
    }
    cs
}

#[test]
fn test_optimize_coalesces_inserts() {
    let mut cs = stream_of(&["InsertChar 104", "InsertChar 105", "LineDown"]);
    optimize_macro(&mut cs, false);
    assert_eq!(segments(&cs), vec!["IS \"hi\"", "LineDown", ""]);
}

#[test]
fn test_optimize_verbose_name() {
    let mut cs = stream_of(&["InsertChar 97"]);
    optimize_macro(&mut cs, true);
    assert_eq!(segments(&cs), vec!["InsertString \"a\"", ""]);
}

#[test]
fn test_optimize_stops_at_undo() {
    let mut cs = stream_of(&["InsertChar 97", "Undo"]);
    optimize_macro(&mut cs, false);
    assert_eq!(segments(&cs), vec!["InsertChar 97", "Undo", ""]);
}

#[test]
fn test_optimize_refuses_unknown_commands() {
    let mut cs = stream_of(&["InsertChar 97", "mysterymacro"]);
    optimize_macro(&mut cs, false);
    assert_eq!(segments(&cs), vec!["InsertChar 97", "mysterymacro", ""]);
}

#[test]
fn test_optimize_skips_nonprintable() {
    let mut cs = stream_of(&["InsertChar 9", "InsertChar 97"]);
    optimize_macro(&mut cs, false);
    assert_eq!(segments(&cs), vec!["InsertChar 9", "IS \"a\"", ""]);
}

#[test]
fn test_optimize_separate_runs() {
    let mut cs = stream_of(&[
        "InsertChar 97",
        "InsertChar 98",
        "LineDown",
        "InsertChar 99",
    ]);
    optimize_macro(&mut cs, false);
    assert_eq!(segments(&cs), vec!["IS \"ab\"", "LineDown", "IS \"c\"", ""]);
}

// =============================================================================
// The cache
// =============================================================================

#[test]
fn test_cache_loads_and_reuses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bump");
    std::fs::write(&path, "LineDown\nLineDown").unwrap();

    let mut cache = MacroCache::new();
    let m = cache.load(path.to_str().unwrap(), &[]).unwrap();
    assert_eq!(segments(&m), vec!["LineDown", "LineDown", ""]);

    // A second load by base name hits the cache.
    assert!(cache.get("bump").is_some());
    cache.unload();
    assert!(cache.get("bump").is_none());
}

#[test]
fn test_cache_searches_prefs_dirs() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("macros")).unwrap();
    std::fs::write(dir.path().join("macros").join("deep"), "LineUp").unwrap();

    let mut cache = MacroCache::new();
    assert!(cache.load("deep", &[dir.path().to_path_buf()]).is_some());
    assert!(cache.load("missing", &[dir.path().to_path_buf()]).is_none());
}
