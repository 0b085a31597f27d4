//! Presentation context items.
//!
//! The same value type covers both wire shapes:
//!
//! - In an association request (item type 20H),
//!   a context carries an abstract syntax
//!   and one or more proposed transfer syntaxes, in order of preference.
//! - In an association acceptance (item type 21H),
//!   a context carries a result/reason code
//!   and at most one transfer syntax chosen by the acceptor.
//!   The abstract syntax is not repeated,
//!   since the requester already knows it by context ID.
use snafu::ensure;
use tracing::warn;

use crate::pdu::codec::{self, EncodeResult, Result, UnexpectedItemTypeSnafu};
use crate::pdu::item_type::{
    ABSTRACT_SYNTAX, PRESENTATION_CONTEXT_AC, PRESENTATION_CONTEXT_RQ, TRANSFER_SYNTAX,
};
use crate::pdu::PresentationContextResultReason;

/// Byte offset of the presentation context ID within the item.
const CONTEXT_ID_OFFSET: usize = 4;
/// Byte offset of the result/reason field within an accept item.
const RESULT_OFFSET: usize = 6;
/// Byte offset of the first sub-item.
const SUB_ITEMS_OFFSET: usize = 8;

/// A presentation context, either proposed or answered.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PresentationContext {
    id: u8,
    abstract_syntax: Option<String>,
    transfer_syntaxes: Vec<String>,
    accepted_transfer_syntax: Option<String>,
    result: Option<u8>,
}

impl PresentationContext {
    /// Create a context to be proposed in an association request.
    ///
    /// Presentation context IDs should be odd numbers between 1 and 255,
    /// unique within the association request.
    pub fn proposed<A, I, T>(id: u8, abstract_syntax: A, transfer_syntaxes: I) -> Self
    where
        A: Into<String>,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        PresentationContext {
            id,
            abstract_syntax: Some(abstract_syntax.into()),
            transfer_syntaxes: transfer_syntaxes.into_iter().map(Into::into).collect(),
            accepted_transfer_syntax: None,
            result: None,
        }
    }

    /// Create an answer to a proposed context
    /// with the given result code and optional transfer syntax.
    pub fn answer(id: u8, result: u8, transfer_syntax: Option<String>) -> Self {
        PresentationContext {
            id,
            abstract_syntax: None,
            transfer_syntaxes: Vec::new(),
            accepted_transfer_syntax: transfer_syntax,
            result: Some(result),
        }
    }

    /// Create an answer accepting the context with the given transfer syntax.
    pub fn accepted<T>(id: u8, transfer_syntax: T) -> Self
    where
        T: Into<String>,
    {
        Self::answer(
            id,
            PresentationContextResultReason::Acceptance.code(),
            Some(transfer_syntax.into()),
        )
    }

    /// Create an answer rejecting the context, without a transfer syntax.
    pub fn rejected(id: u8, reason: PresentationContextResultReason) -> Self {
        Self::answer(id, reason.code(), None)
    }

    /// The presentation context ID.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// The abstract syntax UID, only present in proposed contexts.
    pub fn abstract_syntax(&self) -> Option<&str> {
        self.abstract_syntax.as_deref()
    }

    /// The proposed transfer syntax UIDs, in order of preference.
    pub fn transfer_syntaxes(&self) -> &[String] {
        &self.transfer_syntaxes
    }

    /// The transfer syntax chosen by the acceptor.
    pub fn accepted_transfer_syntax(&self) -> Option<&str> {
        self.accepted_transfer_syntax.as_deref()
    }

    /// The raw result/reason code, only present in answered contexts.
    pub fn result(&self) -> Option<u8> {
        self.result
    }

    /// The result/reason code, if present and known.
    pub fn reason(&self) -> Option<PresentationContextResultReason> {
        self.result.and_then(PresentationContextResultReason::from_code)
    }

    /// Whether this context was answered with acceptance.
    pub fn is_accepted(&self) -> bool {
        self.result == Some(PresentationContextResultReason::Acceptance.code())
    }

    /// The item type this context is encoded with.
    pub fn item_type(&self) -> u8 {
        if self.abstract_syntax.is_some() {
            PRESENTATION_CONTEXT_RQ
        } else {
            PRESENTATION_CONTEXT_AC
        }
    }

    /// Encode the presentation context item.
    ///
    /// With `only_accepted_transfer_syntax`,
    /// exactly one transfer syntax sub-item with that UID is written
    /// in place of the stored transfer syntax list.
    /// Otherwise, the accepted transfer syntax is written if set,
    /// or else one sub-item per stored transfer syntax.
    pub fn encode(&self, only_accepted_transfer_syntax: Option<&str>) -> EncodeResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out, only_accepted_transfer_syntax)?;
        Ok(out)
    }

    /// Append the encoded presentation context item to `out`.
    pub fn write(&self, out: &mut Vec<u8>, only_accepted_transfer_syntax: Option<&str>) -> EncodeResult<()> {
        let accepted = only_accepted_transfer_syntax.or(self.accepted_transfer_syntax.as_deref());

        codec::write_item(out, self.item_type(), "Presentation Context Item", |out| {
            codec::write_u8(out, self.id);
            // reserved
            codec::write_u8(out, 0x00);
            // result/reason, reserved in the request shape
            codec::write_u8(out, self.result.unwrap_or(0x00));
            // reserved
            codec::write_u8(out, 0x00);

            if let Some(abstract_syntax) = &self.abstract_syntax {
                codec::write_item(out, ABSTRACT_SYNTAX, "Abstract Syntax Sub-Item", |out| {
                    codec::write_text(out, abstract_syntax, "Abstract-syntax-name")
                })?;
            }

            match accepted {
                Some(transfer_syntax) => write_transfer_syntax(out, transfer_syntax)?,
                None => {
                    for transfer_syntax in &self.transfer_syntaxes {
                        write_transfer_syntax(out, transfer_syntax)?;
                    }
                }
            }
            Ok(())
        })
    }

    /// Decode a presentation context item
    /// starting at the beginning of `bytes`.
    ///
    /// Fails if the item type is neither 20H nor 21H,
    /// in which case the bytes should be interpreted as some other item,
    /// or if the fixed part of the item is truncated.
    ///
    /// Parsing of transfer syntax sub-items is tolerant:
    /// it stops at the first sub-item of a different type,
    /// or at one which does not fit in the buffer.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let item_type = codec::read_u8(bytes, 0, "Item-type")?;
        ensure!(
            item_type == PRESENTATION_CONTEXT_RQ || item_type == PRESENTATION_CONTEXT_AC,
            UnexpectedItemTypeSnafu {
                item_type,
                expected: "presentation context",
            }
        );

        // the declared length is not trusted beyond the actual buffer
        let declared = usize::from(codec::read_u16(bytes, 2, "Item-length")?);
        let bytes = &bytes[..bytes.len().min(codec::ITEM_HEADER_SIZE + declared)];

        let id = codec::read_u8(bytes, CONTEXT_ID_OFFSET, "Presentation-context-ID")?;
        let result = if item_type == PRESENTATION_CONTEXT_AC {
            Some(codec::read_u8(bytes, RESULT_OFFSET, "Result/Reason")?)
        } else {
            None
        };

        let mut offset = SUB_ITEMS_OFFSET;
        let mut abstract_syntax = None;

        if item_type == PRESENTATION_CONTEXT_RQ && bytes.get(offset) == Some(&ABSTRACT_SYNTAX) {
            let (name, next) = codec::read_prefixed_text(bytes, offset + 2, "Abstract-syntax-name")?;
            abstract_syntax = Some(codec::trim_text(&name).to_string());
            offset = next;
        }

        let mut transfer_syntaxes = Vec::new();
        while offset + codec::ITEM_HEADER_SIZE <= bytes.len() && bytes[offset] == TRANSFER_SYNTAX {
            let length = usize::from(codec::read_u16(bytes, offset + 2, "Item-length")?);
            let start = offset + codec::ITEM_HEADER_SIZE;
            if start + length > bytes.len() {
                warn!(
                    "Transfer syntax sub-item of context {} exceeds the item bounds, ignoring",
                    id
                );
                break;
            }
            match codec::read_text(bytes, start, length, "Transfer-syntax-name") {
                Ok(name) => transfer_syntaxes.push(codec::trim_text(&name).to_string()),
                Err(e) => warn!("Skipping transfer syntax of context {}: {}", id, e),
            }
            offset = start + length;
        }

        let mut accepted_transfer_syntax = None;
        if item_type == PRESENTATION_CONTEXT_AC {
            if transfer_syntaxes.len() > 1 {
                warn!(
                    "Accepted context {} has {} transfer syntaxes, keeping the first",
                    id,
                    transfer_syntaxes.len()
                );
            }
            accepted_transfer_syntax = transfer_syntaxes.drain(..).next();
        }

        Ok(PresentationContext {
            id,
            abstract_syntax,
            transfer_syntaxes,
            accepted_transfer_syntax,
            result,
        })
    }
}

fn write_transfer_syntax(out: &mut Vec<u8>, transfer_syntax: &str) -> EncodeResult<()> {
    codec::write_item(out, TRANSFER_SYNTAX, "Transfer Syntax Sub-Item", |out| {
        codec::write_text(out, transfer_syntax, "Transfer-syntax-name")
    })
}

#[cfg(test)]
mod tests {
    use super::PresentationContext;
    use crate::pdu::codec::Error;
    use crate::pdu::PresentationContextResultReason;
    use matches::assert_matches;

    static VERIFICATION: &str = "1.2.840.10008.1.1";
    static IMPLICIT_VR_LE: &str = "1.2.840.10008.1.2";
    static EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";

    #[test]
    fn encodes_request_shape() {
        let pc = PresentationContext::proposed(1, "1.2", vec!["3.4", "5"]);
        let bytes = pc.encode(None).unwrap();
        assert_eq!(
            bytes,
            &[
                0x20, 0x00, 0x00, 0x17, // item header, length 23
                0x01, 0x00, 0x00, 0x00, // id, reserved x3
                0x30, 0x00, 0x00, 0x03, b'1', b'.', b'2', // abstract syntax
                0x40, 0x00, 0x00, 0x03, b'3', b'.', b'4', // transfer syntax
                0x40, 0x00, 0x00, 0x01, b'5', // transfer syntax
            ][..]
        );
    }

    #[test]
    fn encodes_accept_shape() {
        let pc = PresentationContext::accepted(7, "1.2");
        let bytes = pc.encode(None).unwrap();
        assert_eq!(
            bytes,
            &[
                0x21, 0x00, 0x00, 0x0B, // item header, length 11
                0x07, 0x00, 0x00, 0x00, // id, reserved, result, reserved
                0x40, 0x00, 0x00, 0x03, b'1', b'.', b'2',
            ][..]
        );
    }

    #[test]
    fn only_accepted_transfer_syntax_replaces_list() {
        let pc = PresentationContext::answer(3, 0, None);
        let bytes = pc.encode(Some(EXPLICIT_VR_LE)).unwrap();
        let decoded = PresentationContext::decode(&bytes).unwrap();
        assert_eq!(decoded.id(), 3);
        assert_eq!(decoded.abstract_syntax(), None);
        assert_eq!(decoded.accepted_transfer_syntax(), Some(EXPLICIT_VR_LE));
        assert!(decoded.transfer_syntaxes().is_empty());
        assert!(decoded.is_accepted());
    }

    #[test]
    fn request_roundtrip() {
        let pc = PresentationContext::proposed(255, VERIFICATION, vec![IMPLICIT_VR_LE, EXPLICIT_VR_LE]);
        let decoded = PresentationContext::decode(&pc.encode(None).unwrap()).unwrap();
        assert_eq!(decoded, pc);
        assert_eq!(decoded.result(), None);
        assert_eq!(decoded.reason(), None);
    }

    #[test]
    fn rejection_without_transfer_syntax_roundtrip() {
        let pc = PresentationContext::rejected(
            5,
            PresentationContextResultReason::AbstractSyntaxNotSupported,
        );
        let decoded = PresentationContext::decode(&pc.encode(None).unwrap()).unwrap();
        assert_eq!(decoded.result(), Some(3));
        assert_eq!(
            decoded.reason(),
            Some(PresentationContextResultReason::AbstractSyntaxNotSupported)
        );
        assert!(decoded.transfer_syntaxes().is_empty());
        assert_eq!(decoded.accepted_transfer_syntax(), None);
        assert!(!decoded.is_accepted());
    }

    #[test]
    fn rejects_other_item_types() {
        assert_matches!(
            PresentationContext::decode(&[0x99, 0x00, 0x00, 0x04, 1, 0, 0, 0]),
            Err(Error::UnexpectedItemType { item_type: 0x99, .. })
        );
        assert_matches!(
            PresentationContext::decode(&[0x50, 0x00, 0x00, 0x00]),
            Err(Error::UnexpectedItemType { item_type: 0x50, .. })
        );
    }

    #[test]
    fn rejects_truncated_fixed_fields() {
        assert!(PresentationContext::decode(&[]).is_err());
        assert!(PresentationContext::decode(&[0x20, 0x00, 0x00]).is_err());
        assert!(PresentationContext::decode(&[0x21, 0x00, 0x00, 0x04, 0x01, 0x00]).is_err());
    }

    #[test]
    fn abstract_syntax_is_trimmed() {
        let bytes = [
            0x20, 0x00, 0x00, 0x12, //
            0x01, 0x00, 0x00, 0x00, //
            0x30, 0x00, 0x00, 0x04, b' ', b'1', b'.', b'2', //
            0x40, 0x00, 0x00, 0x02, b'3', 0x00,
        ];
        let pc = PresentationContext::decode(&bytes).unwrap();
        assert_eq!(pc.abstract_syntax(), Some("1.2"));
        assert_eq!(pc.transfer_syntaxes(), &["3".to_string()]);
    }

    #[test]
    fn abstract_syntax_requires_exact_tag() {
        // a leading sub-item other than 30H means no abstract syntax
        let bytes = [
            0x20, 0x00, 0x00, 0x0B, //
            0x01, 0x00, 0x00, 0x00, //
            0x31, 0x00, 0x00, 0x03, b'1', b'.', b'2',
        ];
        let pc = PresentationContext::decode(&bytes).unwrap();
        assert_eq!(pc.abstract_syntax(), None);
        assert!(pc.transfer_syntaxes().is_empty());
    }

    #[test]
    fn truncated_transfer_syntax_ends_the_list() {
        let pc = PresentationContext::proposed(1, VERIFICATION, vec![IMPLICIT_VR_LE, EXPLICIT_VR_LE]);
        let mut bytes = pc.encode(None).unwrap();
        // cut the last transfer syntax short
        bytes.truncate(bytes.len() - 3);
        let decoded = PresentationContext::decode(&bytes).unwrap();
        assert_eq!(decoded.abstract_syntax(), Some(VERIFICATION));
        assert_eq!(decoded.transfer_syntaxes(), &[IMPLICIT_VR_LE.to_string()]);
    }

    #[test]
    fn declared_length_bounds_the_item() {
        let first = PresentationContext::proposed(1, VERIFICATION, vec![IMPLICIT_VR_LE]);
        let second = PresentationContext::proposed(3, VERIFICATION, vec![EXPLICIT_VR_LE]);
        let mut bytes = first.encode(None).unwrap();
        second.write(&mut bytes, None).unwrap();
        let decoded = PresentationContext::decode(&bytes).unwrap();
        assert_eq!(decoded, first);
    }

    #[test]
    fn extra_accepted_transfer_syntaxes_are_dropped() {
        let bytes = [
            0x21, 0x00, 0x00, 0x0E, //
            0x01, 0x00, 0x00, 0x00, //
            0x40, 0x00, 0x00, 0x01, b'1', //
            0x40, 0x00, 0x00, 0x01, b'2',
        ];
        let pc = PresentationContext::decode(&bytes).unwrap();
        assert_eq!(pc.accepted_transfer_syntax(), Some("1"));
        assert!(pc.transfer_syntaxes().is_empty());
    }
}
