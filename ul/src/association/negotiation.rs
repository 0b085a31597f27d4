//! Association negotiation from either side.
use std::borrow::Cow;

use snafu::{ensure, ResultExt};
use tracing::{debug, warn};

use crate::association::support::{choose_supported, is_supported};
use crate::association::uid::trim_uid;
use crate::association::{
    effective_max_pdu_length, parse_associate_message, ApplicationContextNameNotSupportedSnafu,
    CalledAeTitleNotRecognizedSnafu, EncodeSnafu, MissingAbstractSyntaxSnafu,
    NegotiatedOptions, NoAcceptedPresentationContextsSnafu, PresentationContextNegotiated,
    Result, TooManyPresentationContextsSnafu, UnexpectedMessageKindSnafu,
    UnsupportedProtocolVersionSnafu,
};
use crate::pdu::associate::{DICOM_APPLICATION_CONTEXT_NAME, PROTOCOL_VERSION};
use crate::pdu::{
    AssociateKind, AssociateMessage, PresentationContext, PresentationContextResultReason,
    UserInfo, DEFAULT_MAX_PDU,
};
use crate::{IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME};

/// Implicit VR Little Endian,
/// reported as the transfer syntax of rejected presentation contexts.
const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";

/// Transfer syntaxes proposed by [`with_abstract_syntax`](AssociationOptions::with_abstract_syntax).
const DEFAULT_TRANSFER_SYNTAXES: [&str; 2] = ["1.2.840.10008.1.2.1", IMPLICIT_VR_LITTLE_ENDIAN];

/// The greatest number of presentation contexts in one request,
/// as IDs are odd numbers between 1 and 255.
const MAX_PRESENTATION_CONTEXTS: usize = 128;

/// Local configuration for negotiating associations.
///
/// The same set of options serves both sides of the negotiation.
/// As a requester, the proposed presentation contexts
/// are declared with
/// [`with_presentation_context`](Self::with_presentation_context)
/// or [`with_abstract_syntax`](Self::with_abstract_syntax).
/// As an acceptor, the admitted abstract syntaxes are declared with
/// [`with_accepted_abstract_syntax`](Self::with_accepted_abstract_syntax)
/// and, optionally, the admitted transfer syntaxes with
/// [`with_transfer_syntax`](Self::with_transfer_syntax).
///
/// Identification of this implementation
/// is part of the options rather than global state,
/// so that several associations may be negotiated
/// with different identities.
///
/// # Example
///
/// ```
/// # use dicom_ul_negotiation::association::AssociationOptions;
/// # fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let scu = AssociationOptions::new()
///     .calling_ae_title("STORE-SCU")
///     .called_ae_title("STORE-SCP")
///     .with_abstract_syntax("1.2.840.10008.1.1");
/// let request = scu.serialize_associate_request()?;
///
/// let scp = AssociationOptions::new()
///     .ae_title("STORE-SCP")
///     .with_accepted_abstract_syntax("1.2.840.10008.1.1");
/// let (accept, negotiated) = scp.accept(&request)?;
/// assert_eq!(negotiated.peer_ae_title, "STORE-SCU");
///
/// let negotiated = scu.process_associate_accept(&accept)?;
/// assert_eq!(negotiated.presentation_contexts[0].transfer_syntax, "1.2.840.10008.1.2.1");
/// # Ok(())
/// # }
/// # run().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct AssociationOptions<'a> {
    /// the calling AE title, when requesting
    calling_ae_title: Cow<'a, str>,
    /// the called AE title, when requesting
    called_ae_title: Cow<'a, str>,
    /// the AE title of this node, when accepting
    ae_title: Cow<'a, str>,
    /// whether to reject requests not calling this node's AE title
    accept_called_ae_title: bool,
    /// the application context name
    application_context_name: Cow<'a, str>,
    /// the list of presentation contexts to propose
    presentation_contexts: Vec<(Cow<'a, str>, Vec<Cow<'a, str>>)>,
    /// the list of abstract syntaxes to accept
    abstract_syntax_uids: Vec<Cow<'a, str>>,
    /// the list of transfer syntaxes to accept
    transfer_syntax_uids: Vec<Cow<'a, str>>,
    /// the protocol version
    protocol_version: u16,
    /// the maximum PDU length this node will admit
    max_pdu_length: u32,
    /// whether to accept unknown abstract syntaxes
    promiscuous: bool,
    implementation_class_uid: Cow<'a, str>,
    implementation_version_name: Cow<'a, str>,
}

impl Default for AssociationOptions<'_> {
    fn default() -> Self {
        AssociationOptions {
            calling_ae_title: "THIS-SCU".into(),
            called_ae_title: "ANY-SCP".into(),
            ae_title: "THIS-SCP".into(),
            accept_called_ae_title: false,
            application_context_name: DICOM_APPLICATION_CONTEXT_NAME.into(),
            presentation_contexts: Vec::new(),
            abstract_syntax_uids: Vec::new(),
            transfer_syntax_uids: Vec::new(),
            protocol_version: PROTOCOL_VERSION,
            max_pdu_length: DEFAULT_MAX_PDU,
            promiscuous: false,
            implementation_class_uid: IMPLEMENTATION_CLASS_UID.into(),
            implementation_version_name: IMPLEMENTATION_VERSION_NAME.into(),
        }
    }
}

impl<'a> AssociationOptions<'a> {
    /// Create a new set of options for negotiating an association.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define the calling application entity title for the association,
    /// which refers to this DICOM node.
    ///
    /// The default is `THIS-SCU`.
    pub fn calling_ae_title<T>(mut self, calling_ae_title: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        self.calling_ae_title = calling_ae_title.into();
        self
    }

    /// Define the called application entity title for the association,
    /// which refers to the target DICOM node.
    ///
    /// The default is `ANY-SCP`.
    /// Passing an empty string resets the AE title to the default.
    pub fn called_ae_title<T>(mut self, called_ae_title: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        let cae = called_ae_title.into();
        self.called_ae_title = if cae.is_empty() { "ANY-SCP".into() } else { cae };
        self
    }

    /// Define the application entity title referring to this DICOM node
    /// when accepting associations.
    ///
    /// The default is `THIS-SCP`.
    pub fn ae_title<T>(mut self, ae_title: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        self.ae_title = ae_title.into();
        self
    }

    /// Override whether to only accept requests
    /// whose called AE title matches this node's AE title.
    ///
    /// The default is to accept any called AE title.
    pub fn accept_called_ae_title(mut self, accept_called_ae_title: bool) -> Self {
        self.accept_called_ae_title = accept_called_ae_title;
        self
    }

    /// Override the application context name.
    pub fn application_context_name<T>(mut self, application_context_name: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        self.application_context_name = trim_uid(application_context_name.into());
        self
    }

    /// Include this presentation context
    /// in the list of proposed presentation contexts.
    pub fn with_presentation_context<T>(
        mut self,
        abstract_syntax_uid: T,
        transfer_syntax_uids: Vec<T>,
    ) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        let transfer_syntaxes: Vec<Cow<'a, str>> = transfer_syntax_uids
            .into_iter()
            .map(|t| trim_uid(t.into()))
            .collect();
        self.presentation_contexts
            .push((trim_uid(abstract_syntax_uid.into()), transfer_syntaxes));
        self
    }

    /// Helper to propose this abstract syntax
    /// with Explicit VR Little Endian and Implicit VR Little Endian,
    /// in this order.
    pub fn with_abstract_syntax<T>(self, abstract_syntax_uid: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        let default_transfer_syntaxes: Vec<Cow<'a, str>> = DEFAULT_TRANSFER_SYNTAXES
            .iter()
            .map(|&ts| Cow::Borrowed(ts))
            .collect();
        self.with_presentation_context(abstract_syntax_uid.into(), default_transfer_syntaxes)
    }

    /// Accept this abstract syntax when proposed by the requester.
    pub fn with_accepted_abstract_syntax<T>(mut self, abstract_syntax_uid: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        self.abstract_syntax_uids
            .push(trim_uid(abstract_syntax_uid.into()));
        self
    }

    /// Accept this transfer syntax when proposed by the requester.
    ///
    /// If no transfer syntax is declared,
    /// any transfer syntax supported by the transfer syntax registry
    /// is accepted.
    pub fn with_transfer_syntax<T>(mut self, transfer_syntax_uid: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        self.transfer_syntax_uids
            .push(trim_uid(transfer_syntax_uid.into()));
        self
    }

    /// Override the maximum PDU length
    /// that this application entity will admit.
    pub fn max_pdu_length(mut self, value: u32) -> Self {
        self.max_pdu_length = value;
        self
    }

    /// Override promiscuous mode:
    /// whether to accept unknown abstract syntaxes.
    pub fn promiscuous(mut self, promiscuous: bool) -> Self {
        self.promiscuous = promiscuous;
        self
    }

    /// Override the implementation class UID sent to the peer.
    pub fn implementation_class_uid<T>(mut self, uid: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        self.implementation_class_uid = trim_uid(uid.into());
        self
    }

    /// Override the implementation version name sent to the peer.
    pub fn implementation_version_name<T>(mut self, name: T) -> Self
    where
        T: Into<Cow<'a, str>>,
    {
        self.implementation_version_name = name.into();
        self
    }

    /// The user information sent by this node.
    pub fn user_info(&self) -> UserInfo {
        UserInfo::new(self.max_pdu_length)
            .with_implementation_class_uid(self.implementation_class_uid.to_string())
            .with_implementation_version_name(self.implementation_version_name.to_string())
    }

    /// Build the A-ASSOCIATE-RQ message.
    ///
    /// Presentation contexts are given the IDs 1, 3, 5, and so on,
    /// in the order in which they were declared.
    pub fn associate_request(&self) -> Result<AssociateMessage> {
        // presentation contexts represent intent,
        // they should not be omitted by the user
        ensure!(
            !self.presentation_contexts.is_empty(),
            MissingAbstractSyntaxSnafu
        );
        ensure!(
            self.presentation_contexts.len() <= MAX_PRESENTATION_CONTEXTS,
            TooManyPresentationContextsSnafu {
                count: self.presentation_contexts.len(),
            }
        );

        let presentation_contexts = self
            .presentation_contexts
            .iter()
            .enumerate()
            .map(|(i, (abstract_syntax, transfer_syntaxes))| {
                PresentationContext::proposed(
                    (i * 2 + 1) as u8,
                    abstract_syntax.to_string(),
                    transfer_syntaxes.iter().map(|ts| ts.to_string()),
                )
            })
            .collect();

        Ok(AssociateMessage {
            kind: AssociateKind::Request,
            protocol_version: self.protocol_version,
            called_ae_title: self.called_ae_title.to_string(),
            calling_ae_title: self.calling_ae_title.to_string(),
            application_context_name: self.application_context_name.to_string(),
            presentation_contexts,
            user_info: self.user_info(),
        })
    }

    /// Build and encode the A-ASSOCIATE-RQ PDU.
    pub fn serialize_associate_request(&self) -> Result<Vec<u8>> {
        self.associate_request()?.encode().context(EncodeSnafu)
    }

    /// Negotiate each presentation context of an association request.
    ///
    /// A context is accepted
    /// if its abstract syntax is admitted (or in promiscuous mode)
    /// and one of its transfer syntaxes is admitted,
    /// the first one in order of the requester's preference being chosen.
    /// Otherwise it is rejected with the respective reason.
    ///
    /// Fails if the request as a whole cannot be accepted.
    pub fn negotiate(&self, request: &AssociateMessage) -> Result<NegotiatedOptions> {
        ensure!(
            request.kind == AssociateKind::Request,
            UnexpectedMessageKindSnafu {
                expected: AssociateKind::Request,
                got: request.kind,
            }
        );
        // a receiver implementing only version 1
        // shall only test that bit 0 is set
        ensure!(
            request.protocol_version & PROTOCOL_VERSION != 0,
            UnsupportedProtocolVersionSnafu {
                protocol_version: request.protocol_version,
            }
        );
        ensure!(
            request.application_context_name == self.application_context_name,
            ApplicationContextNameNotSupportedSnafu {
                name: request.application_context_name.clone(),
            }
        );
        ensure!(
            !self.accept_called_ae_title || request.called_ae_title == self.ae_title.trim(),
            CalledAeTitleNotRecognizedSnafu {
                called_ae_title: request.called_ae_title.clone(),
            }
        );

        let presentation_contexts = request
            .presentation_contexts
            .iter()
            .map(|pc| self.negotiate_presentation_context(pc))
            .collect();

        let user_info = &request.user_info;
        Ok(NegotiatedOptions {
            peer_max_pdu_length: effective_max_pdu_length(user_info.max_pdu_length()),
            peer_ae_title: request.calling_ae_title.clone(),
            peer_implementation_class_uid: user_info.implementation_class_uid().to_string(),
            peer_implementation_version_name: user_info.implementation_version_name().to_string(),
            user_variables: user_info.items().to_vec(),
            presentation_contexts,
        })
    }

    fn negotiate_presentation_context(&self, pc: &PresentationContext) -> PresentationContextNegotiated {
        let abstract_syntax = pc.abstract_syntax().unwrap_or_default();
        let rejected = |reason| PresentationContextNegotiated {
            id: pc.id(),
            reason,
            transfer_syntax: IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
            abstract_syntax: abstract_syntax.to_string(),
        };

        if abstract_syntax.is_empty()
            || (!self.promiscuous
                && !self
                    .abstract_syntax_uids
                    .iter()
                    .any(|uid| uid == abstract_syntax))
        {
            debug!(
                "Presentation context {}: abstract syntax `{}` not supported",
                pc.id(),
                abstract_syntax
            );
            return rejected(PresentationContextResultReason::AbstractSyntaxNotSupported);
        }

        match self.choose_ts(pc.transfer_syntaxes()) {
            Some(transfer_syntax) => {
                debug!(
                    "Presentation context {}: accepted `{}` with transfer syntax {}",
                    pc.id(),
                    abstract_syntax,
                    transfer_syntax
                );
                PresentationContextNegotiated {
                    id: pc.id(),
                    reason: PresentationContextResultReason::Acceptance,
                    transfer_syntax: transfer_syntax.to_string(),
                    abstract_syntax: abstract_syntax.to_string(),
                }
            }
            None => {
                debug!(
                    "Presentation context {}: none of the transfer syntaxes {:?} are supported",
                    pc.id(),
                    pc.transfer_syntaxes()
                );
                rejected(PresentationContextResultReason::TransferSyntaxesNotSupported)
            }
        }
    }

    /// Choose the first transfer syntax to
    /// be on the options' list of transfer syntaxes and
    /// be supported by the main transfer syntax registry.
    ///
    /// If the options' list is empty,
    /// accept the first transfer syntax supported.
    fn choose_ts<'t>(&self, transfer_syntaxes: &'t [String]) -> Option<&'t str> {
        let mut candidates = transfer_syntaxes.iter().map(String::as_str);
        if self.transfer_syntax_uids.is_empty() {
            return choose_supported(candidates);
        }

        candidates.find(|ts| self.transfer_syntax_uids.iter().any(|uid| uid == ts) && is_supported(ts))
    }

    /// Build and encode the A-ASSOCIATE-AC PDU answering `request`.
    ///
    /// Exactly one answer is written per presentation context of the request,
    /// keeping its ID.
    /// Answers are taken from `chosen` by ID;
    /// request contexts with no answer in `chosen`
    /// are rejected without a reason,
    /// and answers to IDs absent from the request are left out.
    pub fn serialize_associate_accept(
        &self,
        request: &AssociateMessage,
        chosen: &[PresentationContext],
    ) -> Result<Vec<u8>> {
        for answer in chosen {
            if !request
                .presentation_contexts
                .iter()
                .any(|pc| pc.id() == answer.id())
            {
                warn!(
                    "Presentation context {} was not proposed, leaving it out",
                    answer.id()
                );
            }
        }

        let presentation_contexts = request
            .presentation_contexts
            .iter()
            .map(|pc| {
                match chosen.iter().find(|answer| answer.id() == pc.id()) {
                    Some(answer) => answer_presentation_context(pc.id(), answer),
                    None => {
                        PresentationContext::rejected(pc.id(), PresentationContextResultReason::NoReason)
                    }
                }
            })
            .collect();

        let message = AssociateMessage {
            kind: AssociateKind::Accept,
            protocol_version: self.protocol_version,
            called_ae_title: request.called_ae_title.clone(),
            calling_ae_title: request.calling_ae_title.clone(),
            application_context_name: request.application_context_name.clone(),
            presentation_contexts,
            user_info: self.user_info(),
        };
        message.encode().context(EncodeSnafu)
    }

    /// Process an incoming A-ASSOCIATE-RQ PDU as the acceptor,
    /// producing the A-ASSOCIATE-AC PDU to send back
    /// and the outcome of the negotiation.
    pub fn accept(&self, bytes: &[u8]) -> Result<(Vec<u8>, NegotiatedOptions)> {
        let request = parse_associate_message(bytes)?;
        let negotiated = self.negotiate(&request)?;

        let chosen: Vec<_> = negotiated
            .presentation_contexts
            .iter()
            .map(|pc| {
                if pc.is_accepted() {
                    PresentationContext::accepted(pc.id, pc.transfer_syntax.as_str())
                } else {
                    PresentationContext::rejected(pc.id, pc.reason)
                }
            })
            .collect();

        let accept = self.serialize_associate_accept(&request, &chosen)?;
        Ok((accept, negotiated))
    }

    /// Process the A-ASSOCIATE-AC PDU received
    /// in response to this node's request.
    ///
    /// Answers are matched with the proposed presentation contexts by ID.
    /// Proposed contexts left unanswered are considered rejected.
    /// Fails if no presentation context was accepted.
    pub fn process_associate_accept(&self, bytes: &[u8]) -> Result<NegotiatedOptions> {
        let accept = parse_associate_message(bytes)?;
        ensure!(
            accept.kind == AssociateKind::Accept,
            UnexpectedMessageKindSnafu {
                expected: AssociateKind::Accept,
                got: accept.kind,
            }
        );
        ensure!(
            accept.protocol_version & PROTOCOL_VERSION != 0,
            UnsupportedProtocolVersionSnafu {
                protocol_version: accept.protocol_version,
            }
        );

        let proposed = self.associate_request()?.presentation_contexts;
        let presentation_contexts: Vec<_> = proposed
            .iter()
            .map(|pc| {
                let abstract_syntax = pc.abstract_syntax().unwrap_or_default().to_string();
                let answer = accept
                    .presentation_contexts
                    .iter()
                    .find(|answer| answer.id() == pc.id());

                match answer.map(|answer| (answer.reason(), answer.accepted_transfer_syntax())) {
                    Some((Some(PresentationContextResultReason::Acceptance), Some(ts))) => {
                        if !pc.transfer_syntaxes().iter().any(|proposed| proposed == ts) {
                            warn!(
                                "Presentation context {} accepted with transfer syntax {} which was not proposed",
                                pc.id(),
                                ts
                            );
                        }
                        PresentationContextNegotiated {
                            id: pc.id(),
                            reason: PresentationContextResultReason::Acceptance,
                            transfer_syntax: ts.to_string(),
                            abstract_syntax,
                        }
                    }
                    Some((reason, _)) => {
                        let reason = match reason {
                            // accepted without a transfer syntax
                            Some(PresentationContextResultReason::Acceptance) | None => {
                                warn!("Invalid answer to presentation context {}", pc.id());
                                PresentationContextResultReason::NoReason
                            }
                            Some(reason) => reason,
                        };
                        debug!("Presentation context {} rejected: {}", pc.id(), reason);
                        PresentationContextNegotiated {
                            id: pc.id(),
                            reason,
                            transfer_syntax: IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
                            abstract_syntax,
                        }
                    }
                    None => {
                        debug!("Presentation context {} left unanswered", pc.id());
                        PresentationContextNegotiated {
                            id: pc.id(),
                            reason: PresentationContextResultReason::NoReason,
                            transfer_syntax: IMPLICIT_VR_LITTLE_ENDIAN.to_string(),
                            abstract_syntax,
                        }
                    }
                }
            })
            .collect();

        ensure!(
            presentation_contexts.iter().any(|pc| pc.is_accepted()),
            NoAcceptedPresentationContextsSnafu
        );

        let user_info = &accept.user_info;
        Ok(NegotiatedOptions {
            peer_max_pdu_length: effective_max_pdu_length(user_info.max_pdu_length()),
            peer_ae_title: accept.called_ae_title.clone(),
            peer_implementation_class_uid: user_info.implementation_class_uid().to_string(),
            peer_implementation_version_name: user_info.implementation_version_name().to_string(),
            user_variables: user_info.items().to_vec(),
            presentation_contexts,
        })
    }
}

/// Turn the answer chosen for a presentation context into an accept context.
///
/// An acceptance always carries a transfer syntax:
/// when the answer holds none as accepted,
/// its first listed transfer syntax is taken,
/// and without any the context is rejected with no reason.
fn answer_presentation_context(id: u8, answer: &PresentationContext) -> PresentationContext {
    let result = answer
        .result()
        .unwrap_or_else(|| PresentationContextResultReason::Acceptance.code());
    if result != PresentationContextResultReason::Acceptance.code() {
        return PresentationContext::answer(id, result, None);
    }

    let transfer_syntax = answer
        .accepted_transfer_syntax()
        .or_else(|| answer.transfer_syntaxes().first().map(String::as_str));
    match transfer_syntax {
        Some(ts) => PresentationContext::accepted(id, ts),
        None => {
            warn!(
                "Presentation context {} accepted without a transfer syntax, rejecting it",
                id
            );
            PresentationContext::rejected(id, PresentationContextResultReason::NoReason)
        }
    }
}
