//! Private utility module for working with UIDs

use std::borrow::Cow;

fn is_padding(c: char) -> bool {
    c == '\0' || c.is_whitespace()
}

/// Remove the padding around a UID given by the user,
/// only allocating if there is anything to remove.
pub(crate) fn trim_uid(uid: Cow<'_, str>) -> Cow<'_, str> {
    if uid.starts_with(is_padding) || uid.ends_with(is_padding) {
        Cow::Owned(uid.trim_matches(is_padding).to_string())
    } else {
        uid
    }
}
