//! DICOM association negotiation module
//!
//! This module turns local configuration into association messages
//! and incoming association messages into negotiated outcomes,
//! without performing any I/O.
//! Bytes produced here are meant to be written to the peer
//! by a transport layer,
//! and bytes read from the peer are to be handed back
//! as complete PDUs.
//!
//! As an association requester,
//! build the request with
//! [`AssociationOptions::serialize_associate_request`]
//! and interpret the answer with
//! [`AssociationOptions::process_associate_accept`].
//!
//! As an association acceptor,
//! pass the incoming request to
//! [`AssociationOptions::accept`],
//! which negotiates every proposed presentation context
//! and produces the acceptance to send back.
pub mod correlation;
pub mod negotiation;
pub mod support;

mod uid;

use snafu::{Backtrace, ResultExt, Snafu};

use crate::pdu::{self, AssociateKind, AssociateMessage, PresentationContextResultReason, UserVariableItem};

pub use correlation::OutstandingRequests;
pub use negotiation::AssociationOptions;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// could not parse association message
    Parse {
        #[snafu(backtrace)]
        source: pdu::associate::Error,
    },

    /// could not encode association message
    Encode {
        #[snafu(backtrace)]
        source: pdu::EncodeError,
    },

    /// missing abstract syntax to begin negotiation
    MissingAbstractSyntax { backtrace: Backtrace },

    #[snafu(display("too many presentation contexts to propose ({})", count))]
    TooManyPresentationContexts { count: usize, backtrace: Backtrace },

    #[snafu(display("expected {:?} message, got {:?}", expected, got))]
    UnexpectedMessageKind {
        expected: AssociateKind,
        got: AssociateKind,
        backtrace: Backtrace,
    },

    #[snafu(display("unsupported protocol version {:#06x}", protocol_version))]
    UnsupportedProtocolVersion {
        protocol_version: u16,
        backtrace: Backtrace,
    },

    #[snafu(display("called AE title `{}` not recognized", called_ae_title))]
    CalledAeTitleNotRecognized {
        called_ae_title: String,
        backtrace: Backtrace,
    },

    #[snafu(display("application context name `{}` not supported", name))]
    ApplicationContextNameNotSupported { name: String, backtrace: Backtrace },

    /// no presentation contexts accepted by the peer
    NoAcceptedPresentationContexts { backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The outcome of negotiating one presentation context.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct PresentationContextNegotiated {
    /// the presentation context identifier
    pub id: u8,
    /// the result of the negotiation
    pub reason: PresentationContextResultReason,
    /// the transfer syntax agreed upon,
    /// only meaningful if the context was accepted
    pub transfer_syntax: String,
    /// the abstract syntax of the context, as proposed
    pub abstract_syntax: String,
}

impl PresentationContextNegotiated {
    pub fn is_accepted(&self) -> bool {
        self.reason == PresentationContextResultReason::Acceptance
    }
}

/// Everything agreed upon with the peer during negotiation.
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiatedOptions {
    /// the maximum length of a PDU that the peer will admit,
    /// where an unlimited length is represented by `u32::MAX`
    pub peer_max_pdu_length: u32,
    /// the AE title of the peer
    pub peer_ae_title: String,
    pub peer_implementation_class_uid: String,
    pub peer_implementation_version_name: String,
    /// other user information sub-items sent by the peer
    pub user_variables: Vec<UserVariableItem>,
    /// the outcome for each proposed presentation context,
    /// in the order of the request
    pub presentation_contexts: Vec<PresentationContextNegotiated>,
}

impl NegotiatedOptions {
    /// Iterate over the presentation contexts which were accepted.
    pub fn accepted_presentation_contexts(&self) -> impl Iterator<Item = &PresentationContextNegotiated> {
        self.presentation_contexts.iter().filter(|pc| pc.is_accepted())
    }

    /// Find an accepted presentation context for the given abstract syntax.
    pub fn find_accepted(&self, abstract_syntax: &str) -> Option<&PresentationContextNegotiated> {
        self.accepted_presentation_contexts()
            .find(|pc| pc.abstract_syntax == abstract_syntax)
    }
}

/// Parse an incoming A-ASSOCIATE-RQ or A-ASSOCIATE-AC PDU,
/// giving access to its presentation contexts and user information.
pub fn parse_associate_message(bytes: &[u8]) -> Result<AssociateMessage> {
    AssociateMessage::decode(bytes).context(ParseSnafu)
}

/// Treat 0 as practically unlimited,
/// using the largest 32-bit unsigned number.
pub(crate) fn effective_max_pdu_length(max_pdu_length: u32) -> u32 {
    if max_pdu_length == 0 {
        u32::MAX
    } else {
        max_pdu_length
    }
}
