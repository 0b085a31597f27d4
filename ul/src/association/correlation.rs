//! Pairing of DIMSE responses with their outstanding requests.
//!
//! Each request sent over an association carries a message ID,
//! which the peer repeats in the _Message ID Being Responded To_ field
//! of each response.
//! A response is only valid if its command field
//! is the inverse of the command field of the request it answers.
use std::collections::HashMap;

use snafu::{ensure, Backtrace, OptionExt, Snafu};
use tracing::debug;

use crate::pdu::CommandField;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Message ID {} is already in use by an outstanding request", message_id))]
    DuplicateMessageId {
        message_id: u16,
        backtrace: Backtrace,
    },

    #[snafu(display("{} is not a request", field))]
    NotARequest {
        field: CommandField,
        backtrace: Backtrace,
    },

    #[snafu(display("{} is not answered with a response", field))]
    NoResponseExpected {
        field: CommandField,
        backtrace: Backtrace,
    },

    #[snafu(display("{} is not a response", field))]
    NotAResponse {
        field: CommandField,
        backtrace: Backtrace,
    },

    #[snafu(display("No outstanding request with message ID {}", message_id))]
    NoOutstandingRequest {
        message_id: u16,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "{} does not answer {} with message ID {}",
        response,
        request,
        message_id
    ))]
    MismatchedResponse {
        message_id: u16,
        request: CommandField,
        response: CommandField,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The set of requests sent over one association
/// which still wait for a final response.
///
/// Operations such as C-FIND, C-GET and C-MOVE
/// may be answered with several pending responses
/// before the final one,
/// so checking a response ([`check`](OutstandingRequests::check))
/// is separate from retiring the request
/// ([`complete`](OutstandingRequests::complete)).
#[derive(Debug, Default, Clone)]
pub struct OutstandingRequests {
    requests: HashMap<u16, CommandField>,
}

impl OutstandingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request sent with the given message ID.
    ///
    /// Fails if the command field is not a request,
    /// if it does not expect a response (such as C-CANCEL-RQ),
    /// or if the message ID is still taken.
    pub fn register(&mut self, message_id: u16, field: CommandField) -> Result<()> {
        ensure!(field.is_request(), NotARequestSnafu { field });
        ensure!(field.expects_response(), NoResponseExpectedSnafu { field });
        ensure!(
            !self.requests.contains_key(&message_id),
            DuplicateMessageIdSnafu { message_id }
        );
        debug!("Outstanding {} with message ID {}", field, message_id);
        self.requests.insert(message_id, field);
        Ok(())
    }

    /// Check that a response answers an outstanding request,
    /// without retiring the request.
    ///
    /// Returns the command field of the request being answered.
    pub fn check(&self, message_id_being_responded_to: u16, response: CommandField) -> Result<CommandField> {
        ensure!(response.is_response(), NotAResponseSnafu { field: response });
        let request = *self
            .requests
            .get(&message_id_being_responded_to)
            .context(NoOutstandingRequestSnafu {
                message_id: message_id_being_responded_to,
            })?;
        ensure!(
            response.inverse() == request,
            MismatchedResponseSnafu {
                message_id: message_id_being_responded_to,
                request,
                response,
            }
        );
        Ok(request)
    }

    /// Check a final response and retire the request it answers.
    ///
    /// The request is kept if the response does not match it.
    pub fn complete(&mut self, message_id_being_responded_to: u16, response: CommandField) -> Result<CommandField> {
        let request = self.check(message_id_being_responded_to, response)?;
        self.requests.remove(&message_id_being_responded_to);
        debug!(
            "{} completed {} with message ID {}",
            response, request, message_id_being_responded_to
        );
        Ok(request)
    }

    /// Look up the request targeted by a C-CANCEL-RQ.
    pub fn cancel_target(&self, message_id_being_responded_to: u16) -> Result<CommandField> {
        self.requests
            .get(&message_id_being_responded_to)
            .copied()
            .context(NoOutstandingRequestSnafu {
                message_id: message_id_being_responded_to,
            })
    }

    /// The command field of the outstanding request with this message ID.
    pub fn get(&self, message_id: u16) -> Option<CommandField> {
        self.requests.get(&message_id).copied()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, OutstandingRequests};
    use crate::pdu::CommandField::*;
    use matches::assert_matches;

    #[test]
    fn echo_request_and_response() {
        let mut outstanding = OutstandingRequests::new();
        outstanding.register(1, C_ECHO_RQ).unwrap();
        assert_eq!(outstanding.get(1), Some(C_ECHO_RQ));
        assert_eq!(outstanding.complete(1, C_ECHO_RSP).unwrap(), C_ECHO_RQ);
        assert!(outstanding.is_empty());
    }

    #[test]
    fn pending_responses_keep_the_request() {
        let mut outstanding = OutstandingRequests::new();
        outstanding.register(7, C_FIND_RQ).unwrap();
        for _ in 0..3 {
            assert_eq!(outstanding.check(7, C_FIND_RSP).unwrap(), C_FIND_RQ);
        }
        assert_eq!(outstanding.len(), 1);
        assert_eq!(outstanding.cancel_target(7).unwrap(), C_FIND_RQ);
        outstanding.complete(7, C_FIND_RSP).unwrap();
        assert!(outstanding.is_empty());
    }

    #[test]
    fn mismatched_response_is_rejected() {
        let mut outstanding = OutstandingRequests::new();
        outstanding.register(2, C_STORE_RQ).unwrap();
        assert_matches!(
            outstanding.complete(2, C_ECHO_RSP),
            Err(Error::MismatchedResponse {
                message_id: 2,
                request: C_STORE_RQ,
                response: C_ECHO_RSP,
                ..
            })
        );
        // still outstanding
        assert_eq!(outstanding.get(2), Some(C_STORE_RQ));
    }

    #[test]
    fn invalid_registrations() {
        let mut outstanding = OutstandingRequests::new();
        assert_matches!(
            outstanding.register(1, C_STORE_RSP),
            Err(Error::NotARequest { .. })
        );
        assert_matches!(outstanding.register(1, NONE), Err(Error::NotARequest { .. }));
        assert_matches!(
            outstanding.register(1, C_CANCEL_RQ),
            Err(Error::NoResponseExpected { .. })
        );
        outstanding.register(1, N_ACTION_RQ).unwrap();
        assert_matches!(
            outstanding.register(1, C_GET_RQ),
            Err(Error::DuplicateMessageId { message_id: 1, .. })
        );
    }

    #[test]
    fn unknown_message_ids() {
        let mut outstanding = OutstandingRequests::new();
        assert_matches!(
            outstanding.complete(9, C_MOVE_RSP),
            Err(Error::NoOutstandingRequest { message_id: 9, .. })
        );
        assert_matches!(
            outstanding.check(9, C_MOVE_RQ),
            Err(Error::NotAResponse { .. })
        );
        assert_matches!(
            outstanding.cancel_target(9),
            Err(Error::NoOutstandingRequest { .. })
        );
    }
}
