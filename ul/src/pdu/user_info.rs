//! User information item.
use std::convert::TryFrom;

use snafu::{ensure, OptionExt};
use tracing::{trace, warn};

use crate::pdu::codec::{
    self, EncodeResult, InvalidSubItemLengthSnafu, ItemHeader, ItemTooLongSnafu, Result,
};
use crate::pdu::item_type::{
    IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME, MAX_LENGTH,
    SOP_CLASS_EXTENDED_NEGOTIATION, USER_IDENTITY, USER_INFORMATION,
};
use crate::pdu::{UserIdentity, UserIdentityType, UserVariableItem, DEFAULT_MAX_PDU};

/// The content of a user information item.
///
/// The maximum length, implementation class UID
/// and implementation version name are kept as dedicated fields.
/// Any other sub-item is kept in [`items`](UserInfo::items)
/// in the order in which it was found.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct UserInfo {
    max_pdu_length: u32,
    implementation_class_uid: String,
    implementation_version_name: String,
    items: Vec<UserVariableItem>,
}

impl Default for UserInfo {
    fn default() -> Self {
        UserInfo {
            max_pdu_length: DEFAULT_MAX_PDU,
            implementation_class_uid: crate::IMPLEMENTATION_CLASS_UID.to_string(),
            implementation_version_name: crate::IMPLEMENTATION_VERSION_NAME.to_string(),
            items: Vec::new(),
        }
    }
}

impl UserInfo {
    /// Create user information with the given maximum PDU length
    /// and this implementation's identification.
    pub fn new(max_pdu_length: u32) -> Self {
        UserInfo {
            max_pdu_length,
            ..Default::default()
        }
    }

    /// Override the implementation class UID.
    pub fn with_implementation_class_uid<T>(mut self, uid: T) -> Self
    where
        T: Into<String>,
    {
        self.implementation_class_uid = uid.into();
        self
    }

    /// Override the implementation version name.
    pub fn with_implementation_version_name<T>(mut self, name: T) -> Self
    where
        T: Into<String>,
    {
        self.implementation_version_name = name.into();
        self
    }

    /// Append an additional sub-item.
    pub fn with_item(mut self, item: UserVariableItem) -> Self {
        self.items.push(item);
        self
    }

    /// The maximum length of a PDU that the sender is willing to receive.
    /// Zero means that there is no limit.
    pub fn max_pdu_length(&self) -> u32 {
        self.max_pdu_length
    }

    pub fn implementation_class_uid(&self) -> &str {
        &self.implementation_class_uid
    }

    pub fn implementation_version_name(&self) -> &str {
        &self.implementation_version_name
    }

    /// Sub-items other than the three dedicated ones.
    pub fn items(&self) -> &[UserVariableItem] {
        &self.items
    }

    /// Encode the full user information item (type 50H).
    ///
    /// Sub-items are written in this order:
    /// maximum length, implementation class UID,
    /// implementation version name,
    /// and then any additional items.
    pub fn encode(&self) -> EncodeResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write(&mut out)?;
        Ok(out)
    }

    /// Append the encoded user information item to `out`.
    pub fn write(&self, out: &mut Vec<u8>) -> EncodeResult<()> {
        codec::write_item(out, USER_INFORMATION, "User Information Item", |out| {
            codec::write_item(out, MAX_LENGTH, "Maximum Length Sub-Item", |out| {
                codec::write_u32(out, self.max_pdu_length);
                Ok(())
            })?;

            codec::write_item(
                out,
                IMPLEMENTATION_CLASS_UID,
                "Implementation Class UID Sub-Item",
                |out| {
                    codec::write_text(
                        out,
                        &self.implementation_class_uid,
                        "Implementation-class-uid",
                    )
                },
            )?;

            codec::write_item(
                out,
                IMPLEMENTATION_VERSION_NAME,
                "Implementation Version Name Sub-Item",
                |out| {
                    codec::write_text(
                        out,
                        &self.implementation_version_name,
                        "Implementation-version-name",
                    )
                },
            )?;

            for item in &self.items {
                write_variable_item(out, item)?;
            }
            Ok(())
        })
    }

    /// Decode user information.
    ///
    /// `bytes` may either be a complete user information item
    /// (starting with the item type 50H),
    /// or just the list of sub-items which it contains.
    ///
    /// Sub-items of unknown types are skipped over
    /// using their declared length.
    /// Fields missing from the input keep their default values.
    /// A sub-item whose header or declared payload
    /// does not fit in the buffer fails the whole decoding.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let sub_items = if bytes.first() == Some(&USER_INFORMATION) {
            let header = ItemHeader::read(bytes, 0)?;
            let end = bytes.len().min(header.item_size());
            &bytes[codec::ITEM_HEADER_SIZE..end]
        } else {
            bytes
        };

        let mut user_info = UserInfo::default();
        let mut offset = 0;
        while offset + 1 < sub_items.len() {
            let header = ItemHeader::read(sub_items, offset)?;
            let length = usize::from(header.length);
            let data = codec::slice(
                sub_items,
                offset + codec::ITEM_HEADER_SIZE,
                length,
                "User-data",
            )?;

            match header.item_type {
                MAX_LENGTH => {
                    ensure!(
                        length >= 4,
                        InvalidSubItemLengthSnafu {
                            item_type: MAX_LENGTH,
                            length,
                        }
                    );
                    user_info.max_pdu_length = codec::read_u32(data, 0, "Maximum-length-received")?;
                }
                IMPLEMENTATION_CLASS_UID => {
                    let uid = codec::read_text(data, 0, length, "Implementation-class-uid")?;
                    user_info.implementation_class_uid = codec::trim_text(&uid).to_string();
                }
                IMPLEMENTATION_VERSION_NAME => {
                    let name = codec::read_text(data, 0, length, "Implementation-version-name")?;
                    user_info.implementation_version_name = codec::trim_text(&name).to_string();
                }
                SOP_CLASS_EXTENDED_NEGOTIATION => {
                    // 5-6 - SOP-class-uid-length
                    // 7-xxx - SOP-class-uid
                    let (uid, next) = codec::read_prefixed_text(data, 0, "SOP-class-uid")?;
                    // xxx-xxx - Service-class-application-information,
                    // up to the end of the sub-item
                    user_info
                        .items
                        .push(UserVariableItem::SopClassExtendedNegotiationSubItem(
                            codec::trim_text(&uid).to_string(),
                            data[next..].to_vec(),
                        ));
                }
                USER_IDENTITY => {
                    if let Some(identity) = read_user_identity(data)? {
                        user_info.items.push(UserVariableItem::UserIdentityItem(identity));
                    }
                }
                item_type => {
                    trace!(
                        "Unknown user information sub-item {:#04x} ({} bytes)",
                        item_type,
                        length
                    );
                    user_info
                        .items
                        .push(UserVariableItem::Unknown(item_type, data.to_vec()));
                }
            }

            offset += header.item_size();
        }

        Ok(user_info)
    }
}

fn read_user_identity(data: &[u8]) -> Result<Option<UserIdentity>> {
    // 5 - User-Identity-Type
    let identity_type = codec::read_u8(data, 0, "User-Identity-type")?;
    // 6 - Positive-response-requested
    let positive_response_requested =
        codec::read_u8(data, 1, "User-Identity-positive-response-requested")?;
    // 7-8 - Primary-field-length
    let primary_length = usize::from(codec::read_u16(data, 2, "User-Identity-primary-field-length")?);
    // 9-n - Primary-field
    let primary_field = codec::slice(data, 4, primary_length, "User-Identity-primary-field")?;
    // n+1-n+2 - Secondary-field-length,
    // only non-zero for the username and passcode identity type
    let secondary_offset = 4 + primary_length;
    let secondary_length = usize::from(codec::read_u16(
        data,
        secondary_offset,
        "User-Identity-secondary-field-length",
    )?);
    // n+3-m - Secondary-field
    let secondary_field = codec::slice(
        data,
        secondary_offset + 2,
        secondary_length,
        "User-Identity-secondary-field",
    )?;

    match UserIdentityType::from_code(identity_type) {
        Some(identity_type) => Ok(Some(UserIdentity::new(
            positive_response_requested == 1,
            identity_type,
            primary_field.to_vec(),
            secondary_field.to_vec(),
        ))),
        None => {
            warn!("Unknown user identity type code {}, ignoring", identity_type);
            Ok(None)
        }
    }
}

fn write_variable_item(out: &mut Vec<u8>, item: &UserVariableItem) -> EncodeResult<()> {
    match item {
        UserVariableItem::Unknown(item_type, data) => {
            codec::write_item(out, *item_type, "Unknown User Information Sub-Item", |out| {
                out.extend_from_slice(data);
                Ok(())
            })
        }
        UserVariableItem::SopClassExtendedNegotiationSubItem(sop_class_uid, data) => {
            codec::write_item(
                out,
                SOP_CLASS_EXTENDED_NEGOTIATION,
                "SOP Class Extended Negotiation Sub-Item",
                |out| {
                    codec::write_prefixed_text(out, sop_class_uid, "SOP-class-uid")?;
                    out.extend_from_slice(data);
                    Ok(())
                },
            )
        }
        UserVariableItem::UserIdentityItem(identity) => {
            codec::write_item(out, USER_IDENTITY, "User Identity Sub-Item", |out| {
                codec::write_u8(out, identity.identity_type().code());
                codec::write_u8(out, identity.positive_response_requested() as u8);
                write_prefixed_bytes(out, identity.primary_field(), "User-Identity-primary-field")?;
                write_prefixed_bytes(
                    out,
                    identity.secondary_field(),
                    "User-Identity-secondary-field",
                )
            })
        }
    }
}

fn write_prefixed_bytes(out: &mut Vec<u8>, data: &[u8], name: &'static str) -> EncodeResult<()> {
    let length = u16::try_from(data.len()).ok().context(ItemTooLongSnafu {
        name,
        length: data.len(),
    })?;
    codec::write_u16(out, length);
    out.extend_from_slice(data);
    Ok(())
}
