#![no_main]
use dicom_ul_negotiation::pdu::{PresentationContext, UserInfo};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // decoding must fail gracefully, never panic
    if let Ok(pc) = PresentationContext::decode(data) {
        let bytes = pc.encode(None).expect("decoded context should encode");
        let pc2 = PresentationContext::decode(&bytes).expect("encoded context should decode");
        assert_eq!(pc.id(), pc2.id());
    }
    let _ = UserInfo::decode(data);
});
