//! A-ASSOCIATE-RQ and A-ASSOCIATE-AC messages.
//!
//! Both messages share the same fixed header
//! (protocol version, called and calling AE titles, reserved space),
//! followed by a sequence of variable items:
//! one application context item,
//! one or more presentation context items
//! and one user information item.
use dicom_encoding::text::{DefaultCharacterSetCodec, TextCodec};
use snafu::{Backtrace, OptionExt, ResultExt, Snafu};
use tracing::warn;

use crate::pdu::codec::{self, EncodeResult, EncodeTextSnafu, ItemHeader};
use crate::pdu::item_type::{
    APPLICATION_CONTEXT, PRESENTATION_CONTEXT_AC, PRESENTATION_CONTEXT_RQ, USER_INFORMATION,
};
use crate::pdu::{pdu_type, PresentationContext, UserInfo, PDU_HEADER_SIZE};

/// The DICOM application context name,
/// the only one defined by the standard.
pub const DICOM_APPLICATION_CONTEXT_NAME: &str = "1.2.840.10008.3.1.1.1";

/// The protocol version supported: version 1, identified by bit 0.
pub const PROTOCOL_VERSION: u16 = 0x0001;

/// The number of bytes reserved for each AE title.
const AE_TITLE_LENGTH: usize = 16;

/// Offsets relative to the start of the PDU.
const PROTOCOL_VERSION_OFFSET: usize = 6;
const CALLED_AE_TITLE_OFFSET: usize = 10;
const CALLING_AE_TITLE_OFFSET: usize = 26;
const VARIABLE_ITEMS_OFFSET: usize = 74;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Unexpected PDU type {:#04x}, expected an A-ASSOCIATE message", pdu_type))]
    UnexpectedPduType { pdu_type: u8, backtrace: Backtrace },

    #[snafu(display("Missing application context item"))]
    MissingApplicationContextName { backtrace: Backtrace },

    #[snafu(display("Missing user information item"))]
    MissingUserInformation { backtrace: Backtrace },

    #[snafu(display("Malformed A-ASSOCIATE message"))]
    Malformed { source: codec::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Which of the two association negotiation messages this is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AssociateKind {
    /// A-ASSOCIATE-RQ, sent by the association requester
    Request,
    /// A-ASSOCIATE-AC, sent by the association acceptor
    Accept,
}

impl AssociateKind {
    /// The PDU type code of this message.
    pub fn pdu_type(self) -> u8 {
        match self {
            AssociateKind::Request => pdu_type::ASSOCIATE_RQ,
            AssociateKind::Accept => pdu_type::ASSOCIATE_AC,
        }
    }

    fn presentation_context_item_type(self) -> u8 {
        match self {
            AssociateKind::Request => PRESENTATION_CONTEXT_RQ,
            AssociateKind::Accept => PRESENTATION_CONTEXT_AC,
        }
    }

    fn name(self) -> &'static str {
        match self {
            AssociateKind::Request => "A-ASSOCIATE-RQ",
            AssociateKind::Accept => "A-ASSOCIATE-AC",
        }
    }
}

/// An association request or acceptance message.
///
/// In an acceptance,
/// the AE title fields are expected to echo
/// the values of the request being answered.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AssociateMessage {
    pub kind: AssociateKind,
    pub protocol_version: u16,
    pub called_ae_title: String,
    pub calling_ae_title: String,
    pub application_context_name: String,
    pub presentation_contexts: Vec<PresentationContext>,
    pub user_info: UserInfo,
}

impl AssociateMessage {
    /// Encode the full PDU, header included.
    pub fn encode(&self) -> EncodeResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(out)
    }

    /// Append the full PDU to `out`.
    pub fn write(&self, out: &mut Vec<u8>) -> EncodeResult<()> {
        codec::write_pdu_chunk(out, self.kind.pdu_type(), self.kind.name(), |out| {
            // 7-8 - Protocol-version
            codec::write_u16(out, self.protocol_version);
            // 9-10 - Reserved
            codec::write_u16(out, 0x0000);
            // 11-26 - Called-AE-title
            write_ae_title(out, &self.called_ae_title, "Called-AE-title")?;
            // 27-42 - Calling-AE-title
            write_ae_title(out, &self.calling_ae_title, "Calling-AE-title")?;
            // 43-74 - Reserved
            out.extend_from_slice(&[0; 32]);

            codec::write_item(out, APPLICATION_CONTEXT, "Application Context Item", |out| {
                codec::write_text(out, &self.application_context_name, "Application-context-name")
            })?;

            for presentation_context in &self.presentation_contexts {
                presentation_context.write(out, None)?;
            }

            self.user_info.write(out)
        })
    }

    /// Decode an A-ASSOCIATE-RQ or A-ASSOCIATE-AC PDU.
    ///
    /// Presentation context items which cannot be decoded,
    /// which have the shape of the other message kind,
    /// or which are proposed without an abstract syntax,
    /// are skipped.
    /// The application context and user information items are mandatory.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let code = codec::read_u8(bytes, 0, "PDU-type").context(MalformedSnafu)?;
        let kind = match code {
            pdu_type::ASSOCIATE_RQ => AssociateKind::Request,
            pdu_type::ASSOCIATE_AC => AssociateKind::Accept,
            _ => return UnexpectedPduTypeSnafu { pdu_type: code }.fail(),
        };

        let pdu_length = codec::read_u32(bytes, 2, "PDU-length").context(MalformedSnafu)?;
        let end = (PDU_HEADER_SIZE as usize).saturating_add(pdu_length as usize);
        let bytes = &bytes[..bytes.len().min(end)];

        let protocol_version = codec::read_u16(bytes, PROTOCOL_VERSION_OFFSET, "Protocol-version")
            .context(MalformedSnafu)?;
        let called_ae_title = read_ae_title(bytes, CALLED_AE_TITLE_OFFSET, "Called-AE-title")?;
        let calling_ae_title = read_ae_title(bytes, CALLING_AE_TITLE_OFFSET, "Calling-AE-title")?;
        // the reserved field must be there, even if its contents are ignored
        codec::slice(bytes, VARIABLE_ITEMS_OFFSET - 32, 32, "Reserved").context(MalformedSnafu)?;

        let mut application_context_name = None;
        let mut presentation_contexts = Vec::new();
        let mut user_info = None;

        let mut offset = VARIABLE_ITEMS_OFFSET;
        while offset < bytes.len() {
            let header = ItemHeader::read(bytes, offset).context(MalformedSnafu)?;
            let item = codec::slice(bytes, offset, header.item_size(), "Variable-item")
                .context(MalformedSnafu)?;

            match header.item_type {
                APPLICATION_CONTEXT => {
                    let name = codec::read_text(
                        item,
                        codec::ITEM_HEADER_SIZE,
                        usize::from(header.length),
                        "Application-context-name",
                    )
                    .context(MalformedSnafu)?;
                    application_context_name = Some(codec::trim_text(&name).to_string());
                }
                PRESENTATION_CONTEXT_RQ | PRESENTATION_CONTEXT_AC => {
                    if header.item_type != kind.presentation_context_item_type() {
                        warn!(
                            "Ignoring presentation context item {:#04x} in {}",
                            header.item_type,
                            kind.name()
                        );
                    } else {
                        match PresentationContext::decode(item) {
                            Ok(pc) if kind == AssociateKind::Request && pc.abstract_syntax().is_none() => {
                                warn!(
                                    "Ignoring presentation context {} without abstract syntax",
                                    pc.id()
                                );
                            }
                            Ok(pc) => presentation_contexts.push(pc),
                            Err(e) => warn!("Ignoring malformed presentation context: {}", e),
                        }
                    }
                }
                USER_INFORMATION => {
                    user_info = Some(UserInfo::decode(item).context(MalformedSnafu)?);
                }
                item_type => {
                    warn!(
                        "Ignoring unknown item {:#04x} in {}",
                        item_type,
                        kind.name()
                    );
                }
            }

            offset += header.item_size();
        }

        Ok(AssociateMessage {
            kind,
            protocol_version,
            called_ae_title,
            calling_ae_title,
            application_context_name: application_context_name
                .context(MissingApplicationContextNameSnafu)?,
            presentation_contexts,
            user_info: user_info.context(MissingUserInformationSnafu)?,
        })
    }
}

fn write_ae_title(out: &mut Vec<u8>, ae_title: &str, field: &'static str) -> EncodeResult<()> {
    let mut ae_title_bytes = DefaultCharacterSetCodec
        .encode(ae_title)
        .context(EncodeTextSnafu { field })?;
    ae_title_bytes.resize(AE_TITLE_LENGTH, b' ');
    out.extend_from_slice(&ae_title_bytes);
    Ok(())
}

fn read_ae_title(bytes: &[u8], offset: usize, field: &'static str) -> Result<String> {
    let data = codec::slice(bytes, offset, AE_TITLE_LENGTH, field).context(MalformedSnafu)?;
    let ae_title = DefaultCharacterSetCodec
        .decode(data)
        .context(codec::DecodeTextSnafu { field })
        .context(MalformedSnafu)?;
    Ok(codec::trim_text(&ae_title).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::PresentationContextResultReason;
    use matches::assert_matches;

    fn request() -> AssociateMessage {
        AssociateMessage {
            kind: AssociateKind::Request,
            protocol_version: PROTOCOL_VERSION,
            called_ae_title: "ANY-SCP".to_string(),
            calling_ae_title: "STORE-SCU".to_string(),
            application_context_name: DICOM_APPLICATION_CONTEXT_NAME.to_string(),
            presentation_contexts: vec![
                PresentationContext::proposed(1, "1.2.840.10008.1.1", vec!["1.2.840.10008.1.2"]),
                PresentationContext::proposed(
                    3,
                    "1.2.840.10008.5.1.4.1.1.2",
                    vec!["1.2.840.10008.1.2.1", "1.2.840.10008.1.2"],
                ),
            ],
            user_info: UserInfo::new(32_768),
        }
    }

    #[test]
    fn request_header_layout() {
        let bytes = request().encode().unwrap();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[1], 0x00);
        let pdu_length = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        assert_eq!(pdu_length as usize, bytes.len() - 6);
        assert_eq!(&bytes[6..8], &[0x00, 0x01]);
        assert_eq!(&bytes[10..26], b"ANY-SCP         ");
        assert_eq!(&bytes[26..42], b"STORE-SCU       ");
        assert!(bytes[42..74].iter().all(|b| *b == 0));
        assert_eq!(bytes[74], 0x10);
    }

    #[test]
    fn request_roundtrip() {
        let message = request();
        let decoded = AssociateMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn accept_roundtrip() {
        let message = AssociateMessage {
            kind: AssociateKind::Accept,
            presentation_contexts: vec![
                PresentationContext::accepted(1, "1.2.840.10008.1.2"),
                PresentationContext::rejected(
                    3,
                    PresentationContextResultReason::TransferSyntaxesNotSupported,
                ),
            ],
            ..request()
        };
        let bytes = message.encode().unwrap();
        assert_eq!(bytes[0], 0x02);
        let decoded = AssociateMessage::decode(&bytes).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn rejects_other_pdu_types() {
        let mut bytes = request().encode().unwrap();
        bytes[0] = 0x04;
        assert_matches!(
            AssociateMessage::decode(&bytes),
            Err(Error::UnexpectedPduType { pdu_type: 0x04, .. })
        );
    }

    #[test]
    fn truncated_header_is_malformed() {
        let bytes = request().encode().unwrap();
        assert_matches!(
            AssociateMessage::decode(&bytes[..40]),
            Err(Error::Malformed { .. })
        );
        assert_matches!(AssociateMessage::decode(&[]), Err(Error::Malformed { .. }));
    }

    #[test]
    fn missing_user_information() {
        let mut message = request().encode().unwrap();
        // drop the trailing user information item
        let user_info_len = request().user_info.encode().unwrap().len();
        message.truncate(message.len() - user_info_len);
        let pdu_length = (message.len() - 6) as u32;
        message[2..6].copy_from_slice(&pdu_length.to_be_bytes());

        assert_matches!(
            AssociateMessage::decode(&message),
            Err(Error::MissingUserInformation { .. })
        );
    }

    #[test]
    fn skips_unknown_and_misplaced_items() {
        let message = request();
        let mut bytes = message.encode().unwrap();
        // append an unknown item and an accept-shaped context
        bytes.extend_from_slice(&[0x7F, 0x00, 0x00, 0x01, 0xEE]);
        PresentationContext::accepted(5, "1.2.840.10008.1.2")
            .write(&mut bytes, None)
            .unwrap();
        let pdu_length = (bytes.len() - 6) as u32;
        bytes[2..6].copy_from_slice(&pdu_length.to_be_bytes());

        let decoded = AssociateMessage::decode(&bytes).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn long_ae_titles_are_cut() {
        let message = AssociateMessage {
            called_ae_title: "A-VERY-LONG-AE-TITLE".to_string(),
            ..request()
        };
        let decoded = AssociateMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded.called_ae_title, "A-VERY-LONG-AE-T");
    }
}
