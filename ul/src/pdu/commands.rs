//! DIMSE command field codes.
//!
//! The value of the _Command Field_ (0000,0100) element
//! identifies which DIMSE operation a message carries.
//! Request codes have the most significant bit clear,
//! and the matching response code is the same value with that bit set.
use std::convert::TryFrom;
use std::fmt;

use snafu::Snafu;

/// A DIMSE command field code.
#[repr(u16)]
#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum CommandField {
    NONE = 0x0000,
    C_STORE_RQ = 0x0001,
    C_STORE_RSP = 0x8001,
    C_GET_RQ = 0x0010,
    C_GET_RSP = 0x8010,
    C_FIND_RQ = 0x0020,
    C_FIND_RSP = 0x8020,
    C_MOVE_RQ = 0x0021,
    C_MOVE_RSP = 0x8021,
    C_ECHO_RQ = 0x0030,
    C_ECHO_RSP = 0x8030,
    N_EVENT_REPORT_RQ = 0x0100,
    N_EVENT_REPORT_RSP = 0x8100,
    N_GET_RQ = 0x0110,
    N_GET_RSP = 0x8110,
    N_SET_RQ = 0x0120,
    N_SET_RSP = 0x8120,
    N_ACTION_RQ = 0x0130,
    N_ACTION_RSP = 0x8130,
    N_CREATE_RQ = 0x0140,
    N_CREATE_RSP = 0x8140,
    N_DELETE_RQ = 0x0150,
    N_DELETE_RSP = 0x8150,
    C_CANCEL_RQ = 0x0FFF,
}

/// Error returned when a 16-bit code is not a known command field.
#[derive(Debug, Snafu)]
#[snafu(display("Unknown command field {:#06x}", code))]
pub struct UnknownCommandFieldError {
    code: u16,
}

impl UnknownCommandFieldError {
    /// The offending code.
    pub fn code(&self) -> u16 {
        self.code
    }
}

impl CommandField {
    /// Every known command field, in declaration order.
    pub const ALL: [CommandField; 24] = [
        CommandField::NONE,
        CommandField::C_STORE_RQ,
        CommandField::C_STORE_RSP,
        CommandField::C_GET_RQ,
        CommandField::C_GET_RSP,
        CommandField::C_FIND_RQ,
        CommandField::C_FIND_RSP,
        CommandField::C_MOVE_RQ,
        CommandField::C_MOVE_RSP,
        CommandField::C_ECHO_RQ,
        CommandField::C_ECHO_RSP,
        CommandField::N_EVENT_REPORT_RQ,
        CommandField::N_EVENT_REPORT_RSP,
        CommandField::N_GET_RQ,
        CommandField::N_GET_RSP,
        CommandField::N_SET_RQ,
        CommandField::N_SET_RSP,
        CommandField::N_ACTION_RQ,
        CommandField::N_ACTION_RSP,
        CommandField::N_CREATE_RQ,
        CommandField::N_CREATE_RSP,
        CommandField::N_DELETE_RQ,
        CommandField::N_DELETE_RSP,
        CommandField::C_CANCEL_RQ,
    ];

    /// The numeric code as carried in the command set.
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Obtain the counterpart of this command field:
    /// the response for a request and the request for a response.
    ///
    /// `NONE` and `C_CANCEL_RQ` map to themselves,
    /// as a cancel request is never answered with a response of its own.
    pub const fn inverse(self) -> CommandField {
        use CommandField::*;
        match self {
            NONE => NONE,
            C_STORE_RQ => C_STORE_RSP,
            C_STORE_RSP => C_STORE_RQ,
            C_GET_RQ => C_GET_RSP,
            C_GET_RSP => C_GET_RQ,
            C_FIND_RQ => C_FIND_RSP,
            C_FIND_RSP => C_FIND_RQ,
            C_MOVE_RQ => C_MOVE_RSP,
            C_MOVE_RSP => C_MOVE_RQ,
            C_ECHO_RQ => C_ECHO_RSP,
            C_ECHO_RSP => C_ECHO_RQ,
            N_EVENT_REPORT_RQ => N_EVENT_REPORT_RSP,
            N_EVENT_REPORT_RSP => N_EVENT_REPORT_RQ,
            N_GET_RQ => N_GET_RSP,
            N_GET_RSP => N_GET_RQ,
            N_SET_RQ => N_SET_RSP,
            N_SET_RSP => N_SET_RQ,
            N_ACTION_RQ => N_ACTION_RSP,
            N_ACTION_RSP => N_ACTION_RQ,
            N_CREATE_RQ => N_CREATE_RSP,
            N_CREATE_RSP => N_CREATE_RQ,
            N_DELETE_RQ => N_DELETE_RSP,
            N_DELETE_RSP => N_DELETE_RQ,
            C_CANCEL_RQ => C_CANCEL_RQ,
        }
    }

    /// Whether this is a response code (most significant bit set).
    pub const fn is_response(self) -> bool {
        self.code() & 0x8000 != 0
    }

    /// Whether this is a request code.
    /// `NONE` is neither a request nor a response.
    pub const fn is_request(self) -> bool {
        !self.is_response() && !matches!(self, CommandField::NONE)
    }

    /// Whether a request with this command field
    /// expects one or more responses from the peer.
    pub const fn expects_response(self) -> bool {
        self.is_request() && !matches!(self, CommandField::C_CANCEL_RQ)
    }
}

impl TryFrom<u16> for CommandField {
    type Error = UnknownCommandFieldError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        CommandField::ALL
            .iter()
            .copied()
            .find(|c| c.code() == code)
            .ok_or(UnknownCommandFieldError { code })
    }
}

impl From<CommandField> for u16 {
    fn from(field: CommandField) -> u16 {
        field.code()
    }
}

impl fmt::Display for CommandField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CommandField::*;
        let name = match self {
            NONE => "NONE",
            C_STORE_RQ => "C-STORE-RQ",
            C_STORE_RSP => "C-STORE-RSP",
            C_GET_RQ => "C-GET-RQ",
            C_GET_RSP => "C-GET-RSP",
            C_FIND_RQ => "C-FIND-RQ",
            C_FIND_RSP => "C-FIND-RSP",
            C_MOVE_RQ => "C-MOVE-RQ",
            C_MOVE_RSP => "C-MOVE-RSP",
            C_ECHO_RQ => "C-ECHO-RQ",
            C_ECHO_RSP => "C-ECHO-RSP",
            N_EVENT_REPORT_RQ => "N-EVENT-REPORT-RQ",
            N_EVENT_REPORT_RSP => "N-EVENT-REPORT-RSP",
            N_GET_RQ => "N-GET-RQ",
            N_GET_RSP => "N-GET-RSP",
            N_SET_RQ => "N-SET-RQ",
            N_SET_RSP => "N-SET-RSP",
            N_ACTION_RQ => "N-ACTION-RQ",
            N_ACTION_RSP => "N-ACTION-RSP",
            N_CREATE_RQ => "N-CREATE-RQ",
            N_CREATE_RSP => "N-CREATE-RSP",
            N_DELETE_RQ => "N-DELETE-RQ",
            N_DELETE_RSP => "N-DELETE-RSP",
            C_CANCEL_RQ => "C-CANCEL-RQ",
        };
        f.write_str(name)
    }
}
