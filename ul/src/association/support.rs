//! Checks of local transfer syntax support.
//!
//! A transfer syntax is considered supported
//! when the transfer syntax registry knows it
//! and can read data sets encoded with it.
use dicom_encoding::transfer_syntax::TransferSyntaxIndex;
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use tracing::trace;

/// Check that a transfer syntax repository
/// supports the given transfer syntax,
/// meaning that it can parse and decode DICOM data sets.
///
/// ```
/// # use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
/// # use dicom_ul_negotiation::association::support::is_supported_with_repo;
/// // Implicit VR Little Endian is guaranteed to be supported
/// assert!(is_supported_with_repo(TransferSyntaxRegistry, "1.2.840.10008.1.2"));
/// ```
pub fn is_supported_with_repo<R>(ts_repo: R, ts_uid: &str) -> bool
where
    R: TransferSyntaxIndex,
{
    ts_repo.get(ts_uid).map_or(false, |ts| !ts.is_unsupported())
}

/// Check that the main transfer syntax registry
/// supports the given transfer syntax.
pub fn is_supported(ts_uid: &str) -> bool {
    is_supported_with_repo(TransferSyntaxRegistry, ts_uid)
}

/// From a sequence of transfer syntaxes,
/// choose the first one supported
/// by the given transfer syntax repository.
pub fn choose_supported_with_repo<R, I, T>(ts_repo: R, it: I) -> Option<T>
where
    R: TransferSyntaxIndex,
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    it.into_iter().find(|ts| {
        let supported = is_supported_with_repo(&ts_repo, ts.as_ref());
        if !supported {
            trace!("Transfer syntax {} not supported", ts.as_ref());
        }
        supported
    })
}

/// From a sequence of transfer syntaxes,
/// choose the first one supported by the main transfer syntax registry.
pub fn choose_supported<I, T>(it: I) -> Option<T>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    choose_supported_with_repo(TransferSyntaxRegistry, it)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_transfer_syntaxes_are_supported() {
        assert!(is_supported("1.2.840.10008.1.2"));
        assert!(is_supported("1.2.840.10008.1.2.1"));
        assert!(!is_supported("1.2.3.4.5.6.7.8.9"));
    }

    #[test]
    fn choose_first_supported() {
        let proposed = ["1.2.3.4.5.6.7.8.9", "1.2.840.10008.1.2.1", "1.2.840.10008.1.2"];
        assert_eq!(choose_supported(proposed.iter()), Some(&"1.2.840.10008.1.2.1"));
        assert_eq!(choose_supported(vec!["9.9.9"]), None);
    }
}
