//! Handle types and capability flags shared across the ccnd workspace.
//!
//! These are the plain, process-local identifiers the forwarding engine
//! hands out for faces and pending-interest entries, plus the bitflag sets
//! that replace the raw integer flag words `ccnd.c` used for face, FIB and
//! PIT state (§9 redesign note: typed flags, not bit-twiddling).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a face name string.
pub const MAX_FACE_NAME_LEN: usize = 64;

/// Maximum number of entries in the Name-Prefix Table (FIB).
pub const MAX_FIB_ENTRIES: usize = 1024;

/// Maximum number of live PIT entries, `CCND_CAP`-scaled at startup (§7).
pub const MAX_PIT_ENTRIES: usize = 2048;

/// Maximum number of entries in the content store, `CCND_CAP`-scaled at startup (§7).
pub const MAX_CS_ENTRIES: usize = 4096;

/// Unique identifier for a PIT entry, stable for the entry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PitId(pub u32);

impl fmt::Display for PitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PitId({})", self.0)
    }
}

/// Unique identifier for a face, assigned when the face is created and
/// never reused while the daemon runs (§4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FaceId(pub u32);

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FaceId({})", self.0)
    }
}

/// Transport kind backing a face (§4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceKind {
    /// Connectionless datagram peer (UDP).
    Datagram,
    /// Stream-oriented peer (TCP or Unix-domain stream).
    Stream,
    /// Local application using the same host's IPC mechanism.
    Local,
}

bitflags! {
    /// Per-face capability and state flags (§4.A), replacing `ccnd.c`'s
    /// `CCN_FACE_*` integer bitmask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct FaceFlags: u32 {
        /// Face carries NDN packets directly (as opposed to a listener socket).
        const CONNECTED      = 0b0000_0001;
        /// Datagram-oriented face; replies must go to the addr the request came from.
        const DGRAM          = 0b0000_0010;
        /// Face belongs to an application on the local host (IPC, not network).
        const LOCAL          = 0b0000_0100;
        /// Face is a multicast sender/receiver.
        const MULTICAST      = 0b0000_1000;
        /// Face was created by explicit `newface` rather than inbound traffic.
        const PERMANENT      = 0b0001_0000;
        /// Face has exceeded its idle timeout and is pending reap (§4.I).
        const DORMANT        = 0b0010_0000;
        /// Face registered a self-declared prefix via `selfreg` (§4.H).
        const SELF_REGISTERED = 0b0100_0000;
        /// Face send queue has pending data awaiting writability (§4.F).
        const SEND_BLOCKED   = 0b1000_0000;
    }
}

bitflags! {
    /// Name-Prefix Table (FIB) entry flags (§4.D).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct FibFlags: u32 {
        /// Entry was installed by static configuration (`--fib-file` or `prefixreg`).
        const STATIC    = 0b0001;
        /// Entry came from a face's `selfreg` advertisement and is torn down with the face.
        const DYNAMIC   = 0b0010;
        /// Entry should not be used to forward new Interests but still reports faces.
        const EXPIRED   = 0b0100;
        /// Entry captures last-resort ("default") forwarding for unmatched names.
        const CAPTURE   = 0b1000;
    }
}

bitflags! {
    /// Pending Interest Table entry flags (§4.E).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PitFlags: u32 {
        /// At least one upstream forward has been attempted for this entry.
        const FORWARDED       = 0b0001;
        /// Entry is scope-0 (local-only) and must never cross a non-local face.
        const LOCAL_SCOPE     = 0b0010;
        /// A matching ContentObject has already answered one arrival and the
        /// entry is kept briefly to catch duplicate satisfactions (§4.E.3).
        const SATISFIED       = 0b0100;
        /// Entry unexpired but has exhausted its retransmission budget.
        const EXHAUSTED       = 0b1000;
    }
}
