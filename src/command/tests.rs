use super::*;

// =============================================================================
// Table consistency
// =============================================================================

#[test]
fn test_table_aligns_with_enum() {
    for (i, spec) in COMMANDS.iter().enumerate() {
        assert_eq!(
            spec.action as usize, i,
            "command table out of order at {}",
            spec.name
        );
    }
}

#[test]
fn test_names_are_unique() {
    let mut seen = std::collections::HashSet::new();
    for spec in COMMANDS {
        assert!(seen.insert(spec.name.to_ascii_uppercase()), "{}", spec.name);
        assert!(
            seen.insert(spec.short_name.to_ascii_uppercase()),
            "{}",
            spec.short_name
        );
    }
}

// =============================================================================
// Parsing
// =============================================================================

#[test]
fn test_parse_long_and_short_names() {
    let p = parse_command_line("LineDown 3", false).unwrap();
    assert_eq!(p.action, Action::LineDown);
    assert_eq!(p.num_arg, 3);

    let p = parse_command_line("ld 3", false).unwrap();
    assert_eq!(p.action, Action::LineDown);

    let p = parse_command_line("LINEDOWN", false).unwrap();
    assert_eq!(p.num_arg, -1);
}

#[test]
fn test_parse_c_style_bases() {
    assert_eq!(parse_command_line("IC 0x41", false).unwrap().num_arg, 0x41);
    assert_eq!(parse_command_line("IC 0101", false).unwrap().num_arg, 0o101);
    assert_eq!(parse_command_line("IC 65", false).unwrap().num_arg, 65);
}

#[test]
fn test_parse_string_arguments() {
    let p = parse_command_line("InsertString hello world", false).unwrap();
    assert_eq!(p.string_arg.as_deref(), Some("hello world"));

    let p = parse_command_line("IS \" padded \"", false).unwrap();
    assert_eq!(p.string_arg.as_deref(), Some(" padded "));

    assert_eq!(
        parse_command_line("Find \"\"", false),
        Err(Status::StringIsEmpty)
    );
    let p = parse_command_line("AtomicUndo \"\"", false).unwrap();
    assert_eq!(p.string_arg.as_deref(), Some(""));
}

#[test]
fn test_parse_errors() {
    assert_eq!(
        parse_command_line("NoSuchThing", false),
        Err(Status::NoSuchCommand)
    );
    assert_eq!(
        parse_command_line("MoveSOF 2", false),
        Err(Status::HasNoArgument)
    );
    assert_eq!(
        parse_command_line("LineDown banana", false),
        Err(Status::HasNumericArgument)
    );
    assert_eq!(
        parse_command_line("LineDown 1 2", false),
        Err(Status::NotANumber)
    );
}

#[test]
fn test_comments_are_nops() {
    let p = parse_command_line("# just a note", false).unwrap();
    assert_eq!(p.action, Action::Nop);
    assert_eq!(p.string_arg.as_deref(), Some("# just a note"));

    let p = parse_command_line("   ", false).unwrap();
    assert_eq!(p.action, Action::Nop);
    assert!(p.string_arg.is_none());
}

#[test]
fn test_options_only_mode() {
    assert_eq!(
        parse_command_line("LineDown", true),
        Err(Status::CanExecuteOnlyOptions)
    );
    let p = parse_command_line("TabSize 4", true).unwrap();
    assert_eq!(p.action, Action::TabSize);
    assert_eq!(p.num_arg, 4);
}
