//! The closed set of status codes returned by every core operation

use thiserror::Error;

/// Result alias used throughout the crate. The error side always carries
/// a [`Status`], so callers can funnel everything to the dispatcher.
pub type Result<T = ()> = std::result::Result<T, Status>;

/// Every core operation reports one of these codes. `Ok`, `Error`,
/// `Stopped`, `NothingToUndo` and `NothingToRedo` are signals rather than
/// failures; the rest describe why an operation could not complete.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    #[error("")]
    Ok,
    #[error("Error")]
    Error,
    #[error("Stopped")]
    Stopped,
    #[error("Nothing to undo")]
    NothingToUndo,
    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Out of memory")]
    OutOfMemory,
    #[error("Out of memory or disk full")]
    OutOfMemoryDiskFull,
    #[error("Cannot save, disk full")]
    CannotSaveDiskFull,

    #[error("Can't open file")]
    CantOpenFile,
    #[error("File does not exist")]
    FileDoesNotExist,
    #[error("File is a directory")]
    FileIsDirectory,
    #[error("File is migrated")]
    FileIsMigrated,
    #[error("File is too large")]
    FileIsTooLarge,
    #[error("I/O error")]
    IoError,
    #[error("Error while writing")]
    ErrorWhileWriting,
    #[error("Can't open temporary file")]
    CantOpenTemporaryFile,
    #[error("External command error")]
    ExternalCommandError,
    #[error("Can't open macro")]
    CantOpenMacro,

    #[error("Syntax error")]
    SyntaxError,
    #[error("No such command")]
    NoSuchCommand,
    #[error("This command has a numeric argument")]
    HasNumericArgument,
    #[error("This command has no argument")]
    HasNoArgument,
    #[error("This command requires an argument")]
    RequiresArgument,
    #[error("Not a number")]
    NotANumber,
    #[error("Wrong character after backslash")]
    WrongCharAfterBackslash,
    #[error("Invalid level")]
    InvalidLevel,
    #[error("Invalid shift specified")]
    InvalidShiftSpecified,
    #[error("String is empty")]
    StringIsEmpty,
    #[error("Can execute only options")]
    CanExecuteOnlyOptions,

    #[error("Not found")]
    NotFound,
    #[error("Not on a bracket")]
    NotOnABracket,
    #[error("Can't find bracket")]
    CantFindBracket,
    #[error("Mark a block first")]
    MarkBlockFirst,
    #[error("Mark is out of buffer")]
    MarkOutOfBuffer,
    #[error("Document is read-only")]
    DocumentIsReadOnly,
    #[error("Document is not saved")]
    DocumentNotSaved,
    #[error("Bookmark not set")]
    BookmarkNotSet,
    #[error("No unset bookmarks to set")]
    NoUnsetBookmarksToSet,
    #[error("No set bookmarks to go to")]
    NoSetBookmarksToGoto,
    #[error("No set bookmarks to unset")]
    NoSetBookmarksToUnset,
    #[error("Invalid bookmark designation")]
    InvalidBookmarkDesignation,
    #[error("Undo is not enabled")]
    UndoNotEnabled,
    #[error("Clip does not exist")]
    ClipDoesntExist,
    #[error("Maximum macro depth exceeded")]
    MaxMacroDepthExceeded,
    #[error("Insufficient whitespace")]
    InsufficientWhitespace,
    #[error("Tab size out of range")]
    TabSizeOutOfRange,
    #[error("Invalid match mode")]
    InvalidMatchMode,
    #[error("Escape time out of range")]
    EscapeTimeOutOfRange,
    #[error("Preferences stack is full")]
    PrefsStackFull,
    #[error("Preferences stack is empty")]
    PrefsStackEmpty,
    #[error("No search string")]
    NoSearchString,
    #[error("No replace string")]
    NoReplaceString,
    #[error("Syntax highlighting is not enabled")]
    SyntaxNotEnabled,

    #[error("Buffer is not UTF-8")]
    BufferIsNotUtf8,
    #[error("Incompatible clip encoding")]
    IncompatibleClipEncoding,
    #[error("Incompatible command encoding")]
    IncompatibleCommandEncoding,
    #[error("Incompatible search string encoding")]
    IncompatibleSearchStringEncoding,
    #[error("Incompatible replace string encoding")]
    IncompatibleReplaceStringEncoding,
    #[error("Invalid character")]
    InvalidCharacter,
    #[error("Invalid string")]
    InvalidString,
    #[error("Can't insert a NUL character")]
    CantInsert0,
    #[error("UTF-8 regexp character class not supported")]
    Utf8RegexpCharacterClassNotSupported,
    #[error("UTF-8 regexp complemented character class not supported")]
    Utf8RegexpCompCharacterClassNotSupported,
    #[error("Group is not available")]
    GroupNotAvailable,
}

impl Status {
    /// True for everything but the non-error signals.
    pub fn is_error(self) -> bool {
        !matches!(
            self,
            Status::Ok
                | Status::Error
                | Status::Stopped
                | Status::NothingToUndo
                | Status::NothingToRedo
        )
    }

    /// Collapses a `Result` back into a plain status code.
    pub fn from_result(r: Result) -> Status {
        match r {
            Ok(()) => Status::Ok,
            Err(s) => s,
        }
    }
}

impl From<std::io::Error> for Status {
    fn from(e: std::io::Error) -> Status {
        match e.kind() {
            std::io::ErrorKind::NotFound => Status::FileDoesNotExist,
            std::io::ErrorKind::PermissionDenied => Status::CantOpenFile,
            _ => Status::IoError,
        }
    }
}
