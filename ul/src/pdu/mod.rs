//! Protocol Data Unit module
//!
//! This module comprises the items exchanged
//! while negotiating an association
//! (presentation contexts and user information),
//! the A-ASSOCIATE-RQ and A-ASSOCIATE-AC messages which carry them,
//! and the DIMSE command field vocabulary
//! used to pair requests with their responses.
pub mod associate;
pub mod codec;
pub mod commands;
pub mod presentation_context;
pub mod user_info;

use std::fmt::Display;

pub use associate::{AssociateKind, AssociateMessage};
pub use codec::{EncodeError, EncodeResult, Error, Result};
pub use commands::CommandField;
pub use presentation_context::PresentationContext;
pub use user_info::UserInfo;

/// The default maximum PDU size
pub const DEFAULT_MAX_PDU: u32 = 16_384;

/// The length of the PDU header in bytes,
/// comprising the PDU type (1 byte),
/// reserved byte (1 byte),
/// and PDU length (4 bytes).
pub const PDU_HEADER_SIZE: u32 = 6;

/// PDU type codes.
pub mod pdu_type {
    /// A-ASSOCIATE-RQ
    pub const ASSOCIATE_RQ: u8 = 0x01;
    /// A-ASSOCIATE-AC
    pub const ASSOCIATE_AC: u8 = 0x02;
}

/// Item and sub-item type codes.
pub mod item_type {
    pub const APPLICATION_CONTEXT: u8 = 0x10;
    /// Presentation context item in an association request
    pub const PRESENTATION_CONTEXT_RQ: u8 = 0x20;
    /// Presentation context item in an association acceptance
    pub const PRESENTATION_CONTEXT_AC: u8 = 0x21;
    pub const ABSTRACT_SYNTAX: u8 = 0x30;
    pub const TRANSFER_SYNTAX: u8 = 0x40;
    pub const USER_INFORMATION: u8 = 0x50;
    pub const MAX_LENGTH: u8 = 0x51;
    pub const IMPLEMENTATION_CLASS_UID: u8 = 0x52;
    pub const IMPLEMENTATION_VERSION_NAME: u8 = 0x55;
    pub const SOP_CLASS_EXTENDED_NEGOTIATION: u8 = 0x56;
    pub const USER_IDENTITY: u8 = 0x58;
}

/// The result of negotiating a single presentation context,
/// as carried in the Result/Reason field of an accept context.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Hash)]
pub enum PresentationContextResultReason {
    Acceptance = 0,
    UserRejection = 1,
    NoReason = 2,
    AbstractSyntaxNotSupported = 3,
    TransferSyntaxesNotSupported = 4,
}

impl PresentationContextResultReason {
    const ALL: [PresentationContextResultReason; 5] = [
        PresentationContextResultReason::Acceptance,
        PresentationContextResultReason::UserRejection,
        PresentationContextResultReason::NoReason,
        PresentationContextResultReason::AbstractSyntaxNotSupported,
        PresentationContextResultReason::TransferSyntaxesNotSupported,
    ];

    /// Interpret a Result/Reason code, if it is a known one.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// The code written to the wire.
    pub fn code(self) -> u8 {
        self as u8
    }

    fn description(self) -> &'static str {
        use PresentationContextResultReason::*;
        match self {
            Acceptance => "acceptance",
            UserRejection => "user rejection",
            NoReason => "no reason",
            AbstractSyntaxNotSupported => "abstract syntax not supported",
            TransferSyntaxesNotSupported => "transfer syntaxes not supported",
        }
    }
}

impl Display for PresentationContextResultReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// A user information sub-item
/// other than the maximum length,
/// implementation class UID and implementation version name,
/// which [`UserInfo`] holds as dedicated fields.
#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub enum UserVariableItem {
    /// A sub-item of an unrecognized type, kept verbatim
    Unknown(u8, Vec<u8>),
    /// SOP class UID and service class application information
    SopClassExtendedNegotiationSubItem(String, Vec<u8>),
    UserIdentityItem(UserIdentity),
}

impl UserVariableItem {
    /// The sub-item type code of this item.
    pub fn item_type(&self) -> u8 {
        match self {
            UserVariableItem::Unknown(item_type, _) => *item_type,
            UserVariableItem::SopClassExtendedNegotiationSubItem(..) => {
                item_type::SOP_CLASS_EXTENDED_NEGOTIATION
            }
            UserVariableItem::UserIdentityItem(_) => item_type::USER_IDENTITY,
        }
    }
}

/// User identity negotiation sub-item content.
#[derive(Clone, Eq, PartialEq, PartialOrd, Hash, Debug)]
pub struct UserIdentity {
    positive_response_requested: bool,
    identity_type: UserIdentityType,
    primary_field: Vec<u8>,
    secondary_field: Vec<u8>,
}

impl UserIdentity {
    pub fn new(
        positive_response_requested: bool,
        identity_type: UserIdentityType,
        primary_field: Vec<u8>,
        secondary_field: Vec<u8>,
    ) -> Self {
        UserIdentity {
            positive_response_requested,
            identity_type,
            primary_field,
            secondary_field,
        }
    }

    pub fn positive_response_requested(&self) -> bool {
        self.positive_response_requested
    }

    pub fn identity_type(&self) -> UserIdentityType {
        self.identity_type
    }

    pub fn primary_field(&self) -> &[u8] {
        &self.primary_field
    }

    /// Only non-empty for the username and passcode identity type.
    pub fn secondary_field(&self) -> &[u8] {
        &self.secondary_field
    }
}

/// The kind of identity in a user identity negotiation sub-item.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Hash)]
#[non_exhaustive]
pub enum UserIdentityType {
    Username = 1,
    UsernamePassword = 2,
    KerberosServiceTicket = 3,
    SamlAssertion = 4,
    Jwt = 5,
}

impl UserIdentityType {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => UserIdentityType::Username,
            2 => UserIdentityType::UsernamePassword,
            3 => UserIdentityType::KerberosServiceTicket,
            4 => UserIdentityType::SamlAssertion,
            5 => UserIdentityType::Jwt,
            _ => return None,
        })
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}
