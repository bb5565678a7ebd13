//! Unicode normalization of file names.
//!
//! Cards formatted on one system and archives living on another do not agree
//! on how accented names are stored: macOS writes NFD (`e` + U+0301) where
//! Linux and Windows usually write NFC (U+00E9). Name-based matching compares
//! NFC keys so `Café.jpg` on a card finds `Café.jpg` in the archive whichever
//! form each side uses.
//!
//! ```
//! use photoclassify::scanner::path_utils::names_equal;
//!
//! assert!(names_equal("café.jpg", "cafe\u{0301}.jpg"));
//! ```

use std::borrow::Cow;
use std::ffi::OsStr;

use unicode_normalization::{is_nfc_quick, IsNormalized, UnicodeNormalization};

/// NFC form of `s`, borrowing when it is already composed.
#[must_use]
pub fn normalize_name(s: &str) -> Cow<'_, str> {
    match is_nfc_quick(s.chars()) {
        IsNormalized::Yes => Cow::Borrowed(s),
        _ => Cow::Owned(s.nfc().collect()),
    }
}

/// Lookup key for a file name.
///
/// Non-UTF-8 bytes are replaced lossily; such names still match themselves.
#[must_use]
pub fn name_key(name: &OsStr) -> String {
    normalize_name(&name.to_string_lossy()).into_owned()
}

/// Compare two names after normalization.
#[must_use]
pub fn names_equal(a: &str, b: &str) -> bool {
    normalize_name(a) == normalize_name(b)
}
