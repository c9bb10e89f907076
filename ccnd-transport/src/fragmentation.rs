//! MTU-budget helpers for packing multiple small wire elements into one
//! datagram ("stuffing", spec §6 `CCND_MTU`).
//!
//! Grounded on this crate's own prior `fragment_packet`/`assemble_fragments`
//! chunking pair; the chunk-budget arithmetic (`calculate_fragment_count`)
//! is reused almost verbatim, but the direction is reversed — instead of
//! splitting one large payload into many fragments for a QUIC stream, this
//! module packs many small already-complete wire elements into as few
//! MTU-sized datagrams as possible, since ccnd forwards whole interests and
//! content objects, never raw byte ranges (`delivery_queue.rs`'s
//! nsec-per-KiB burst budget borrows the same chunk-count shape again).

use bytes::{BufMut, Bytes, BytesMut};

/// True if `payload_len` alone meets or exceeds the MTU budget and must be
/// sent unstuffed.
pub fn exceeds_mtu(payload_len: usize, mtu: u32) -> bool {
    mtu > 0 && payload_len >= mtu as usize
}

/// Greedily pack whole wire elements from `pending` into MTU-sized
/// datagrams without splitting any single element (spec §6: "stuffing"
/// packs multiple whole interests into one send when their combined size
/// fits the configured MTU). An element that alone exceeds the budget is
/// emitted as its own single-element datagram.
pub fn stuff(pending: &[Bytes], mtu: u32) -> Vec<Bytes> {
    if mtu == 0 {
        return pending.to_vec();
    }
    let budget = mtu as usize;
    let mut out = Vec::new();
    let mut current = BytesMut::new();

    for elem in pending {
        if current.len() + elem.len() > budget && !current.is_empty() {
            out.push(current.split().freeze());
        }
        if elem.len() >= budget {
            out.push(elem.clone());
            continue;
        }
        current.put_slice(elem);
    }
    if !current.is_empty() {
        out.push(current.freeze());
    }
    out
}

/// How many MTU-sized chunks a payload of `len` bytes would require.
pub fn chunk_count(len: usize, mtu: u32) -> usize {
    if mtu == 0 {
        return 1;
    }
    let budget = mtu as usize;
    (len + budget - 1) / budget
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_elements_combine_into_one_datagram() {
        let elems = vec![Bytes::from_static(b"aaaa"), Bytes::from_static(b"bbbb")];
        let stuffed = stuff(&elems, 100);
        assert_eq!(stuffed.len(), 1);
        assert_eq!(stuffed[0].len(), 8);
    }

    #[test]
    fn oversized_budget_splits_into_multiple_datagrams() {
        let elems = vec![Bytes::from_static(b"aaaaaaaa"), Bytes::from_static(b"bbbbbbbb")];
        let stuffed = stuff(&elems, 10);
        assert_eq!(stuffed.len(), 2);
    }

    #[test]
    fn mtu_zero_disables_stuffing() {
        let elems = vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")];
        let stuffed = stuff(&elems, 0);
        assert_eq!(stuffed.len(), 2);
    }

    #[test]
    fn element_larger_than_budget_is_its_own_datagram() {
        let elems = vec![Bytes::from_static(b"short"), Bytes::from(vec![0u8; 50])];
        let stuffed = stuff(&elems, 20);
        assert_eq!(stuffed.len(), 2);
        assert_eq!(stuffed[1].len(), 50);
    }

    #[test]
    fn chunk_count_rounds_up() {
        assert_eq!(chunk_count(2049, 1024), 3);
        assert_eq!(chunk_count(100, 0), 1);
    }
}
