use dicom_dictionary_std::uids::{
    CT_IMAGE_STORAGE, EXPLICIT_VR_BIG_ENDIAN, EXPLICIT_VR_LITTLE_ENDIAN,
    IMPLICIT_VR_LITTLE_ENDIAN, JPEG_BASELINE8_BIT, RLE_LOSSLESS, VERIFICATION,
};
use dicom_ul_negotiation::pdu::associate::{DICOM_APPLICATION_CONTEXT_NAME, PROTOCOL_VERSION};
use dicom_ul_negotiation::pdu::{
    AssociateKind, AssociateMessage, CommandField, PresentationContext,
    PresentationContextResultReason, UserIdentity, UserIdentityType, UserInfo, UserVariableItem,
    DEFAULT_MAX_PDU,
};
use matches::matches;
use rstest::rstest;

#[rstest]
#[case(1, VERIFICATION, vec![IMPLICIT_VR_LITTLE_ENDIAN])]
#[case(3, CT_IMAGE_STORAGE, vec![EXPLICIT_VR_LITTLE_ENDIAN, IMPLICIT_VR_LITTLE_ENDIAN])]
#[case(255, CT_IMAGE_STORAGE, vec![JPEG_BASELINE8_BIT])]
fn request_context_roundtrip(
    #[case] id: u8,
    #[case] abstract_syntax: &str,
    #[case] transfer_syntaxes: Vec<&str>,
) {
    let pc = PresentationContext::proposed(id, abstract_syntax, transfer_syntaxes.clone());
    let decoded = PresentationContext::decode(&pc.encode(None).unwrap()).unwrap();

    assert_eq!(decoded.id(), id);
    assert_eq!(decoded.abstract_syntax(), Some(abstract_syntax));
    assert_eq!(decoded.transfer_syntaxes(), &transfer_syntaxes[..]);
    assert_eq!(decoded.result(), None);
}

#[test]
fn accept_context_carries_single_transfer_syntax() {
    let pc = PresentationContext::answer(5, 0, None);
    let bytes = pc.encode(Some(EXPLICIT_VR_LITTLE_ENDIAN)).unwrap();
    assert_eq!(bytes[0], 0x21);

    let decoded = PresentationContext::decode(&bytes).unwrap();
    assert_eq!(decoded.abstract_syntax(), None);
    assert_eq!(
        decoded.accepted_transfer_syntax(),
        Some(EXPLICIT_VR_LITTLE_ENDIAN)
    );
    assert_eq!(decoded.reason(), Some(PresentationContextResultReason::Acceptance));
}

#[test]
fn unrecognized_item_type_yields_no_context() {
    let mut bytes = PresentationContext::proposed(1, VERIFICATION, vec![IMPLICIT_VR_LITTLE_ENDIAN])
        .encode(None)
        .unwrap();
    bytes[0] = 0x99;
    assert!(PresentationContext::decode(&bytes).is_err());
}

#[test]
fn transfer_syntax_order_is_kept() {
    let transfer_syntaxes = vec![
        JPEG_BASELINE8_BIT,
        RLE_LOSSLESS,
        EXPLICIT_VR_BIG_ENDIAN,
        EXPLICIT_VR_LITTLE_ENDIAN,
        IMPLICIT_VR_LITTLE_ENDIAN,
    ];
    let pc = PresentationContext::proposed(7, CT_IMAGE_STORAGE, transfer_syntaxes.clone());
    let decoded = PresentationContext::decode(&pc.encode(None).unwrap()).unwrap();
    assert_eq!(decoded.transfer_syntaxes().len(), 5);
    assert_eq!(decoded.transfer_syntaxes(), &transfer_syntaxes[..]);
}

#[test]
fn rejected_context_keeps_result() {
    let pc = PresentationContext::answer(9, 3, None);
    let decoded = PresentationContext::decode(&pc.encode(None).unwrap()).unwrap();
    assert_eq!(decoded.result(), Some(3));
    assert!(decoded.transfer_syntaxes().is_empty());
    assert_eq!(decoded.accepted_transfer_syntax(), None);
}

#[test]
fn user_info_defaults_on_unknown_sub_item() {
    let decoded = UserInfo::decode(&[0x5A, 0x00, 0x00, 0x03, 0x01, 0x02, 0x03]).unwrap();
    assert_eq!(decoded.max_pdu_length(), DEFAULT_MAX_PDU);
    assert_eq!(decoded.max_pdu_length(), 16_384);
}

#[rstest]
#[case(65_536)]
#[case(0)]
#[case(u32::MAX)]
fn user_info_max_pdu_length_roundtrip(#[case] max_pdu_length: u32) {
    let bytes = UserInfo::new(max_pdu_length).encode().unwrap();
    assert_eq!(&bytes[4..8], &[0x51, 0x00, 0x00, 0x04]);
    let decoded = UserInfo::decode(&bytes).unwrap();
    assert_eq!(decoded.max_pdu_length(), max_pdu_length);
}

#[test]
fn can_read_write_associate_rq() -> Result<(), Box<dyn std::error::Error>> {
    let association_rq = AssociateMessage {
        kind: AssociateKind::Request,
        protocol_version: 2,
        calling_ae_title: "calling ae".to_string(),
        called_ae_title: "called ae".to_string(),
        application_context_name: "application context name".to_string(),
        presentation_contexts: vec![
            PresentationContext::proposed(1, "abstract 1", vec!["transfer 1", "transfer 2"]),
            PresentationContext::proposed(3, "abstract 2", vec!["transfer 3", "transfer 4"]),
        ],
        user_info: UserInfo::new(23)
            .with_implementation_class_uid("class uid")
            .with_implementation_version_name("version name")
            .with_item(UserVariableItem::SopClassExtendedNegotiationSubItem(
                "abstract 1".to_string(),
                vec![1, 1, 0, 1, 1, 0, 1],
            ))
            .with_item(UserVariableItem::UserIdentityItem(UserIdentity::new(
                false,
                UserIdentityType::UsernamePassword,
                b"MyUsername".to_vec(),
                b"MyPassword".to_vec(),
            ))),
    };

    let bytes = association_rq.encode()?;
    let result = AssociateMessage::decode(&bytes)?;

    assert_eq!(result.kind, AssociateKind::Request);
    assert_eq!(result.protocol_version, 2);
    assert_eq!(result.calling_ae_title, "calling ae");
    assert_eq!(result.called_ae_title, "called ae");
    assert_eq!(result.application_context_name, "application context name");
    assert_eq!(result.presentation_contexts.len(), 2);
    assert_eq!(result.presentation_contexts[0].id(), 1);
    assert_eq!(result.presentation_contexts[1].abstract_syntax(), Some("abstract 2"));
    assert_eq!(
        result.presentation_contexts[1].transfer_syntaxes(),
        &["transfer 3".to_string(), "transfer 4".to_string()]
    );
    assert_eq!(result.user_info.max_pdu_length(), 23);
    assert_eq!(result.user_info.implementation_class_uid(), "class uid");
    assert_eq!(result.user_info.implementation_version_name(), "version name");
    assert_eq!(result.user_info.items().len(), 2);
    assert!(matches!(
        &result.user_info.items()[1],
        UserVariableItem::UserIdentityItem(identity)
            if identity.identity_type() == UserIdentityType::UsernamePassword
                && identity.secondary_field() == b"MyPassword"
    ));

    Ok(())
}

#[test]
fn can_read_write_associate_ac() -> Result<(), Box<dyn std::error::Error>> {
    let association_ac = AssociateMessage {
        kind: AssociateKind::Accept,
        protocol_version: PROTOCOL_VERSION,
        calling_ae_title: "STORE-SCU".to_string(),
        called_ae_title: "STORE-SCP".to_string(),
        application_context_name: DICOM_APPLICATION_CONTEXT_NAME.to_string(),
        presentation_contexts: vec![
            PresentationContext::accepted(1, IMPLICIT_VR_LITTLE_ENDIAN),
            PresentationContext::rejected(3, PresentationContextResultReason::UserRejection),
        ],
        user_info: UserInfo::default(),
    };

    let bytes = association_ac.encode()?;
    assert_eq!(bytes[0], 0x02);
    let result = AssociateMessage::decode(&bytes)?;
    assert_eq!(result, association_ac);
    assert_eq!(
        result.presentation_contexts[1].reason(),
        Some(PresentationContextResultReason::UserRejection)
    );

    Ok(())
}

#[test]
fn command_field_pairs() {
    assert_eq!(CommandField::C_ECHO_RQ.inverse(), CommandField::C_ECHO_RSP);
    assert_eq!(CommandField::C_ECHO_RSP.inverse(), CommandField::C_ECHO_RQ);
    assert_eq!(CommandField::C_CANCEL_RQ.inverse(), CommandField::C_CANCEL_RQ);
    for field in CommandField::ALL.iter().copied() {
        assert_eq!(field.inverse().inverse(), field);
    }
}
