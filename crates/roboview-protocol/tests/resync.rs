//! Resynchronization after malformed messages.
//!
//! A stream mixes valid and broken messages; every broken one must fail
//! with the offset of the fault and leave the following message intact.

use glam::Vec3;
use proptest::prelude::*;
use roboview_core::Command;
use roboview_protocol::{
    read_message, write_message, DecodeErrorKind, Decoder, Framing, MessageReader,
};

#[test]
fn truncated_message_reports_offset_and_next_decodes() {
    let good_a = b"(full 0 (new ball (pos 0 0 0)))".as_slice();
    let truncated = b"(delta 0.02 (upd ball (pos 1 0".as_slice();
    let good_b = b"(delta 0.04 (upd ball (pos 2 0 0)))".as_slice();

    let mut stream = Vec::new();
    for m in [good_a, truncated, good_b] {
        write_message(&mut stream, m).unwrap();
    }

    let mut r = stream.as_slice();
    let mut dec = Decoder::new();

    let a = dec.decode(&read_message(&mut r).unwrap().unwrap()).unwrap();
    assert!(a.is_full());

    let err = dec
        .decode(&read_message(&mut r).unwrap().unwrap())
        .unwrap_err();
    assert_eq!(err.reason, DecodeErrorKind::Truncated);
    assert_eq!(err.offset, truncated.len() as u64);

    let b = dec.decode(&read_message(&mut r).unwrap().unwrap()).unwrap();
    assert_eq!(b.time, 0.04);
    assert_eq!(b.commands, vec![Command::move_to("ball", Vec3::new(2.0, 0.0, 0.0))]);
}

#[test]
fn shifted_offsets_point_into_the_log() {
    let log = b"(full 0)\n(delta 1 (upd a (pos 1 oops 0)))\n(delta 2)\n";
    let mut reader = MessageReader::new(&log[..], Framing::Lines, 0);
    let mut dec = Decoder::new();
    let mut errors = Vec::new();
    let mut decoded = 0;
    while let Some(m) = reader.next_message().unwrap() {
        match dec.decode(&m.bytes) {
            Ok(_) => decoded += 1,
            Err(e) => errors.push(e.shifted(m.offset)),
        }
    }
    assert_eq!(decoded, 2);
    assert_eq!(errors.len(), 1);
    let at = errors[0].offset as usize;
    assert_eq!(&log[at..at + 4], b"oops");
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic_and_offsets_stay_in_bounds(
        bytes in proptest::collection::vec(any::<u8>(), 0..256)
    ) {
        if let Err(e) = Decoder::new().decode(&bytes) {
            prop_assert!(e.offset as usize <= bytes.len());
        }
    }

    #[test]
    fn corrupting_one_message_never_affects_the_next(
        cut in 1usize..30,
    ) {
        let broken = b"(delta 1 (upd agent (pos 1 2 3) (rot 1 0 0 0)))";
        let cut = cut.min(broken.len() - 1);
        let mut dec = Decoder::new();
        prop_assert!(dec.decode(&broken[..cut]).is_err());
        let next = dec.decode(b"(delta 2 (del agent))").unwrap();
        prop_assert_eq!(next.commands, vec![Command::delete("agent")]);
    }
}
