#![no_main]
use std::error::Error;

use dicom_ul_negotiation::pdu::AssociateMessage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = fuzz(data);
});

fn fuzz(data: &[u8]) -> Result<(), Box<dyn Error>> {
    // deserialize random bytes
    let message = AssociateMessage::decode(data)?;

    // serialize message back to bytes
    let bytes = message.encode()?;

    // deserialize back to message
    let message2 = AssociateMessage::decode(&bytes)
        .expect("serialized message should always deserialize");

    // assert equivalence
    assert_eq!(
        message, message2,
        "message should be equal after serializing to/from bytes"
    );

    Ok(())
}
