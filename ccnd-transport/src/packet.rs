//! Wire framing for stream-oriented faces.
//!
//! Grounded on `rust-udcn-quic/src/packet.rs`'s `NdnPacket::{from_bytes,
//! to_bytes}` pair, but reworked into a streaming decoder: a TCP or
//! Unix-domain face's `input_buf` may contain zero, one, or several
//! complete TLV elements plus a trailing partial one, so the decoder must
//! peek the TLV length header before deciding whether a full element is
//! available (spec §3/§4.B "Input path reassembles a complete wire element
//! using a streaming skeleton decoder"). Datagram faces never need this:
//! one recv() is always exactly one element.

use bytes::{Buf, Bytes, BytesMut};
use ccnd_common::ndn::NdnPacket;
use ccnd_common::tlv::TlvElement;
use ccnd_common::Error;

/// Try to decode one complete NDN packet from the front of `buf`, leaving
/// any unconsumed trailing bytes in place. Returns `Ok(None)` if `buf`
/// holds fewer bytes than the next element's declared length (the caller
/// should read more and retry).
pub fn try_decode_one(buf: &mut BytesMut) -> Result<Option<NdnPacket>, Error> {
    if buf.is_empty() {
        return Ok(None);
    }
    // TlvElement::decode advances its cursor only on success; peek against
    // a cheap clone first so a short read leaves `buf` untouched.
    let mut cursor = buf.clone().freeze();
    let before = cursor.len();
    let element = match TlvElement::decode(&mut cursor) {
        Ok(e) => e,
        Err(_) => return Ok(None), // not enough bytes yet for type+length, or for value
    };
    let consumed = before - cursor.len();
    let packet = NdnPacket::from_bytes(&buf[..consumed])?;
    buf.advance(consumed);
    Ok(Some(packet))
}

/// Decode exactly one packet from a single datagram payload (spec §3: "one
/// recv() carries exactly one wire element" for datagram faces).
pub fn decode_datagram(payload: &[u8]) -> Result<NdnPacket, Error> {
    NdnPacket::from_bytes(payload)
}

pub fn encode(packet: &NdnPacket) -> Bytes {
    packet.to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccnd_common::ndn::{ContentObject, Interest, Name};

    #[test]
    fn decodes_one_element_and_leaves_partial_trailer() {
        let packet = NdnPacket::Interest(Interest::new(Name::from_string("/a/b")).with_nonce(Bytes::from_static(b"n")));
        let wire = encode(&packet);

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&wire);
        buf.extend_from_slice(&[0xFF]); // one stray trailing byte, not a full element

        let decoded = try_decode_one(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.name(), packet.name());
        assert_eq!(buf.len(), 1);
        assert!(try_decode_one(&mut buf).unwrap().is_none());
    }

    #[test]
    fn empty_buffer_yields_none() {
        let mut buf = BytesMut::new();
        assert!(try_decode_one(&mut buf).unwrap().is_none());
    }

    #[test]
    fn datagram_roundtrip() {
        let object = ContentObject::new(Name::from_string("/a"), Bytes::from_static(b"x"));
        let packet = NdnPacket::ContentObject(object);
        let wire = encode(&packet);
        let decoded = decode_datagram(&wire).unwrap();
        assert_eq!(decoded.name(), packet.name());
    }
}
