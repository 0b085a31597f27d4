//! This crate contains the types and methods needed
//! to negotiate associations between DICOM nodes
//! through the upper layer protocol.
//!
//! No network I/O happens here:
//! association messages are encoded to and decoded from byte buffers,
//! so that any transport may carry them.
//!
//! - The [`pdu`] module
//!   provides the items exchanged during negotiation
//!   (presentation contexts and user information),
//!   the A-ASSOCIATE-RQ and A-ASSOCIATE-AC messages,
//!   and the DIMSE command field codes.
//! - The [`association`] module
//!   comprises the negotiation of presentation contexts
//!   from the side of the requester and the acceptor,
//!   as well as the correlation of DIMSE requests with their responses.

pub mod association;
pub mod pdu;

/// The current implementation class UID generically referring to DICOM-rs.
///
/// Automatically generated as per the standard, part 5, section B.2.
///
/// This UID may change in future versions,
/// even between patch versions.
pub const IMPLEMENTATION_CLASS_UID: &str = "2.25.156227610253341005307660858504280353500";

/// The current implementation version name generically referring to DICOM-rs.
///
/// This name may change in future versions,
/// even between patch versions.
pub const IMPLEMENTATION_VERSION_NAME: &str = "DICOM-rs 0.9.0";

// re-exports

pub use association::{
    parse_associate_message, AssociationOptions, NegotiatedOptions, OutstandingRequests,
};
pub use pdu::{AssociateMessage, CommandField, PresentationContext, UserInfo};
