//! NDN/CCN wire types.
//!
//! This module provides the core data structures that represent Interest
//! and ContentObject packets on the wire, plus the TLV encode/decode pair
//! for each. It is the "wire-format codec for names, Interests and
//! ContentObjects" spec.md §1 treats as an external collaborator; ccnd-core
//! consumes it as a library.

use crate::error::Error;
use crate::tlv::{self, TlvElement};
use bitflags::bitflags;
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Maximum length of a name component.
pub const MAX_NAME_COMPONENT_LENGTH: usize = 255;
/// Maximum number of components in a name.
pub const MAX_NAME_COMPONENTS: usize = 16;
/// Maximum size of a ContentObject, leaving room for the digest component
/// appended by the content store (§4.G: 65535 - 36 bytes).
pub const MAX_CONTENT_OBJECT_SIZE: usize = 65_535 - 36;
/// Fixed-point denominator for timestamps and InterestLifetime (units of
/// 1/4096 second, per §6).
pub const TIME_UNITS_PER_SECOND: u64 = 4096;
/// Default Interest lifetime, in milliseconds (§4.F).
pub const DEFAULT_INTEREST_LIFETIME_MS: u32 = 4000;

/* ---------------------------------------------------------------- *\
 * Name and NameComponent
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NameComponent(pub Bytes);

impl NameComponent {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    pub fn to_tlv(&self) -> TlvElement {
        TlvElement::new(tlv::TLV_COMPONENT, self.0.clone())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_COMPONENT {
            return Err(Error::NdnPacket(format!(
                "expected name component TLV type {}, got {}",
                tlv::TLV_COMPONENT,
                element.tlv_type
            )));
        }
        Ok(Self(element.value.clone()))
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let printable = self.0.iter().all(|&b| b.is_ascii_graphic() || b == b' ');
        if printable {
            write!(f, "{}", String::from_utf8_lossy(&self.0))
        } else {
            write!(f, "0x")?;
            for &b in &self.0 {
                write!(f, "{:02x}", b)?;
            }
            Ok(())
        }
    }
}

/// A hierarchical name: a sequence of opaque byte-string components,
/// compared component-by-component as byte strings (§4.C name order).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_string(s: &str) -> Self {
        let components = s
            .split('/')
            .filter(|comp| !comp.is_empty())
            .map(|comp| NameComponent::new(comp.as_bytes().to_vec()))
            .collect();
        Self { components }
    }

    pub fn push(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    pub fn with_component(mut self, component: NameComponent) -> Self {
        self.components.push(component);
        self
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &NameComponent> {
        self.components.iter()
    }

    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    /// The first `len` components. Used to walk ancestor prefixes.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components.iter().take(len.min(self.components.len())).cloned().collect(),
        }
    }

    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.components.len() <= other.components.len()
            && self.components.iter().zip(other.components.iter()).all(|(a, b)| a == b)
    }

    /// The raw concatenated component bytes used as a Name-Prefix Table key
    /// (§4.D): type+length+value for every component, so distinct component
    /// boundaries never alias.
    pub fn key_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for c in &self.components {
            c.to_tlv().encode(&mut buf);
        }
        buf.freeze()
    }

    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();
        for component in &self.components {
            component.to_tlv().encode(&mut buf);
        }
        TlvElement::new(tlv::TLV_NAME, buf.freeze())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_NAME {
            return Err(Error::NdnPacket(format!(
                "expected name TLV type {}, got {}",
                tlv::TLV_NAME,
                element.tlv_type
            )));
        }
        let mut components = Vec::new();
        let mut buf = element.value.clone();
        while buf.has_remaining() {
            let e = TlvElement::decode(&mut buf).map_err(|e| Error::Tlv(e.to_string()))?;
            components.push(NameComponent::from_tlv(&e)?);
        }
        Ok(Self { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

/* ---------------------------------------------------------------- *\
 * Selectors
\* ---------------------------------------------------------------- */

/// ChildSelector: which child to prefer when an Interest's name matches
/// more than one stored object at the requested depth (§8 scenario 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildSelector {
    Leftmost,
    Rightmost,
}

impl Default for ChildSelector {
    fn default() -> Self {
        ChildSelector::Leftmost
    }
}

/// Scope: how far an Interest may propagate from its originator (§4.E.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    /// Satisfied locally only, never forwarded.
    LocalOnly = 0,
    /// May go only to locally-originated (GG) peers.
    ThisHostOnly = 1,
    /// May not be sent back out a face of the same host class as it arrived on.
    ThisNetworkOnly = 2,
}

impl Default for Scope {
    fn default() -> Self {
        Scope::ThisNetworkOnly
    }
}

bitflags! {
    /// AnswerOriginKind bit flags (§6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct AnswerOriginKind: u8 {
        const ACCEPT_STALE         = 0b0001;
        const ACCEPT_CONTENT_STORE = 0b0010;
        const ACCEPT_GENERATED     = 0b0100;
        const EXPIRE               = 0b1000;
    }
}

impl Default for AnswerOriginKind {
    fn default() -> Self {
        AnswerOriginKind::ACCEPT_CONTENT_STORE
    }
}

/// One component of an Exclude filter: either a literal component or the
/// `<Any/>` wildcard marker (§4.C fast-exclude optimization).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExcludeElement {
    Any,
    Component(NameComponent),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Exclude {
    pub elements: Vec<ExcludeElement>,
}

impl Exclude {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// If this exclude has the literal leading form `<Any/><Component>C</Component>…`,
    /// return `C` so the content store can apply the fast-exclude optimization
    /// (§4.C). Only the single leading component form is handled (§9 open question).
    pub fn leading_excluded_component(&self) -> Option<&NameComponent> {
        match self.elements.first() {
            Some(ExcludeElement::Any) => match self.elements.get(1) {
                Some(ExcludeElement::Component(c)) => Some(c),
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether `component` is excluded by this filter (literal match only;
    /// `<Any/>` ranges beyond the fast-exclude leading pair are treated
    /// conservatively as excluding nothing extra).
    pub fn excludes(&self, component: &NameComponent) -> bool {
        self.elements
            .iter()
            .any(|e| matches!(e, ExcludeElement::Component(c) if c == component))
    }
}

/* ---------------------------------------------------------------- *\
 * Interest
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
    pub name: Name,
    pub min_suffix_components: Option<u32>,
    pub max_suffix_components: Option<u32>,
    pub publisher_public_key_digest: Option<Bytes>,
    pub exclude: Exclude,
    pub child_selector: ChildSelector,
    pub answer_origin_kind: AnswerOriginKind,
    pub scope: Scope,
    /// InterestLifetime in 1/4096-second ticks, as carried on the wire.
    pub lifetime_ticks: u32,
    pub nonce: Bytes,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            min_suffix_components: None,
            max_suffix_components: None,
            publisher_public_key_digest: None,
            exclude: Exclude::default(),
            child_selector: ChildSelector::default(),
            answer_origin_kind: AnswerOriginKind::default(),
            scope: Scope::default(),
            lifetime_ticks: ms_to_ticks(DEFAULT_INTEREST_LIFETIME_MS),
            nonce: Bytes::new(),
        }
    }

    pub fn with_nonce(mut self, nonce: impl Into<Bytes>) -> Self {
        self.nonce = nonce.into();
        self
    }

    pub fn with_lifetime_ms(mut self, lifetime_ms: u32) -> Self {
        self.lifetime_ticks = ms_to_ticks(lifetime_ms);
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_child_selector(mut self, selector: ChildSelector) -> Self {
        self.child_selector = selector;
        self
    }

    pub fn with_exclude(mut self, exclude: Exclude) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn lifetime_ms(&self) -> u32 {
        ticks_to_ms(self.lifetime_ticks)
    }

    pub fn has_nonce(&self) -> bool {
        !self.nonce.is_empty()
    }

    /// Two interests are "similar" per §4.F if they are identical modulo
    /// nonce: everything but the nonce bytes matches.
    pub fn same_modulo_nonce(&self, other: &Interest) -> bool {
        self.name == other.name
            && self.min_suffix_components == other.min_suffix_components
            && self.max_suffix_components == other.max_suffix_components
            && self.publisher_public_key_digest == other.publisher_public_key_digest
            && self.exclude == other.exclude
            && self.child_selector == other.child_selector
            && self.answer_origin_kind == other.answer_origin_kind
            && self.scope == other.scope
    }

    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();
        self.name.to_tlv().encode(&mut buf);
        if let Some(v) = self.min_suffix_components {
            TlvElement::new(tlv::TLV_MIN_SUFFIX_COMPONENTS, Bytes::from(v.to_be_bytes().to_vec()))
                .encode(&mut buf);
        }
        if let Some(v) = self.max_suffix_components {
            TlvElement::new(tlv::TLV_MAX_SUFFIX_COMPONENTS, Bytes::from(v.to_be_bytes().to_vec()))
                .encode(&mut buf);
        }
        if let Some(d) = &self.publisher_public_key_digest {
            TlvElement::new(tlv::TLV_PUBLISHER_PUBLIC_KEY_DIGEST, d.clone()).encode(&mut buf);
        }
        if !self.exclude.is_empty() {
            let mut ex = BytesMut::new();
            for e in &self.exclude.elements {
                match e {
                    ExcludeElement::Any => TlvElement::new(tlv::TLV_ANY, Bytes::new()).encode(&mut ex),
                    ExcludeElement::Component(c) => c.to_tlv().encode(&mut ex),
                }
            }
            TlvElement::new(tlv::TLV_EXCLUDE, ex.freeze()).encode(&mut buf);
        }
        TlvElement::new(
            tlv::TLV_CHILD_SELECTOR,
            Bytes::from(vec![match self.child_selector {
                ChildSelector::Leftmost => 0u8,
                ChildSelector::Rightmost => 1u8,
            }]),
        )
        .encode(&mut buf);
        TlvElement::new(tlv::TLV_ANSWER_ORIGIN_KIND, Bytes::from(vec![self.answer_origin_kind.bits()]))
            .encode(&mut buf);
        TlvElement::new(tlv::TLV_SCOPE, Bytes::from(vec![self.scope as u8])).encode(&mut buf);
        TlvElement::new(
            tlv::TLV_INTEREST_LIFETIME,
            Bytes::from(self.lifetime_ticks.to_be_bytes().to_vec()),
        )
        .encode(&mut buf);
        if self.has_nonce() {
            TlvElement::new(tlv::TLV_NONCE, self.nonce.clone()).encode(&mut buf);
        }
        TlvElement::new(tlv::TLV_INTEREST, buf.freeze())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_INTEREST {
            return Err(Error::NdnPacket("not an Interest TLV".into()));
        }
        let mut buf = element.value.clone();
        let mut interest = Interest::new(Name::new());
        let mut saw_name = false;
        while buf.has_remaining() {
            let e = TlvElement::decode(&mut buf).map_err(|e| Error::Tlv(e.to_string()))?;
            match e.tlv_type {
                tlv::TLV_NAME => {
                    interest.name = Name::from_tlv(&e)?;
                    saw_name = true;
                }
                tlv::TLV_MIN_SUFFIX_COMPONENTS => {
                    interest.min_suffix_components = Some(read_u32(&e.value)?)
                }
                tlv::TLV_MAX_SUFFIX_COMPONENTS => {
                    interest.max_suffix_components = Some(read_u32(&e.value)?)
                }
                tlv::TLV_PUBLISHER_PUBLIC_KEY_DIGEST => {
                    interest.publisher_public_key_digest = Some(e.value.clone())
                }
                tlv::TLV_EXCLUDE => {
                    let mut inner = e.value.clone();
                    let mut elements = Vec::new();
                    while inner.has_remaining() {
                        let ie = TlvElement::decode(&mut inner).map_err(|e| Error::Tlv(e.to_string()))?;
                        elements.push(if ie.tlv_type == tlv::TLV_ANY {
                            ExcludeElement::Any
                        } else {
                            ExcludeElement::Component(NameComponent::from_tlv(&ie)?)
                        });
                    }
                    interest.exclude = Exclude { elements };
                }
                tlv::TLV_CHILD_SELECTOR => {
                    interest.child_selector = if e.value.first() == Some(&1) {
                        ChildSelector::Rightmost
                    } else {
                        ChildSelector::Leftmost
                    };
                }
                tlv::TLV_ANSWER_ORIGIN_KIND => {
                    interest.answer_origin_kind =
                        AnswerOriginKind::from_bits_truncate(*e.value.first().unwrap_or(&0));
                }
                tlv::TLV_SCOPE => {
                    interest.scope = match e.value.first() {
                        Some(0) => Scope::LocalOnly,
                        Some(1) => Scope::ThisHostOnly,
                        _ => Scope::ThisNetworkOnly,
                    };
                }
                tlv::TLV_INTEREST_LIFETIME => interest.lifetime_ticks = read_u32(&e.value)?,
                tlv::TLV_NONCE => interest.nonce = e.value.clone(),
                _ => {} // forward-compatible: ignore unknown fields
            }
        }
        if !saw_name {
            return Err(Error::NdnPacket("Interest missing Name".into()));
        }
        Ok(interest)
    }

    pub fn wire_size(&self) -> usize {
        self.to_tlv().len()
    }
}

/* ---------------------------------------------------------------- *\
 * ContentObject
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    Sha256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub digest_algorithm: DigestAlgorithm,
    pub signature_bits: Bytes,
    pub witness: Option<Bytes>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ContentType {
    Data = 0,
    Encr = 1,
    Gone = 2,
    Key = 3,
    Link = 4,
    Nack = 5,
}

impl ContentType {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ContentType::Encr,
            2 => ContentType::Gone,
            3 => ContentType::Key,
            4 => ContentType::Link,
            5 => ContentType::Nack,
            _ => ContentType::Data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyLocator {
    Name(Name),
    KeyDigest(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedInfo {
    pub publisher_public_key_digest: Option<Bytes>,
    /// Timestamp in 1/4096-second fixed point, big-endian on the wire.
    pub timestamp_ticks: u64,
    pub content_type: ContentType,
    pub freshness_seconds: Option<u32>,
    pub final_block_id: Option<NameComponent>,
    pub key_locator: Option<KeyLocator>,
}

impl Default for SignedInfo {
    fn default() -> Self {
        Self {
            publisher_public_key_digest: None,
            timestamp_ticks: 0,
            content_type: ContentType::Data,
            freshness_seconds: None,
            final_block_id: None,
            key_locator: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentObject {
    pub signature: Signature,
    pub name: Name,
    pub signed_info: SignedInfo,
    pub content: Bytes,
}

impl ContentObject {
    pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
        Self {
            signature: Signature {
                digest_algorithm: DigestAlgorithm::Sha256,
                signature_bits: Bytes::new(),
                witness: None,
            },
            name,
            signed_info: SignedInfo::default(),
            content: content.into(),
        }
    }

    pub fn with_freshness_seconds(mut self, seconds: u32) -> Self {
        self.signed_info.freshness_seconds = Some(seconds);
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.signed_info.content_type = content_type;
        self
    }

    /// SHA-256 over the Content field only, used to synthesize the
    /// mandatory trailing digest component (§3 Content Entry, §4.G step 2).
    pub fn content_digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(&self.content);
        hasher.finalize().into()
    }

    /// The name with the explicit trailing digest component appended, used
    /// as the content-store key (§3, §4.G).
    pub fn expanded_name(&self) -> Name {
        let digest = self.content_digest();
        self.name.clone().with_component(NameComponent::new(digest.to_vec()))
    }

    pub fn wire_size(&self) -> usize {
        self.to_tlv().len()
    }

    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();

        let mut sig_buf = BytesMut::new();
        TlvElement::new(tlv::TLV_DIGEST_ALGORITHM, Bytes::from(vec![0u8])).encode(&mut sig_buf);
        TlvElement::new(tlv::TLV_SIGNATURE_BITS, self.signature.signature_bits.clone()).encode(&mut sig_buf);
        if let Some(w) = &self.signature.witness {
            TlvElement::new(tlv::TLV_WITNESS, w.clone()).encode(&mut sig_buf);
        }
        TlvElement::new(tlv::TLV_SIGNATURE, sig_buf.freeze()).encode(&mut buf);

        self.name.to_tlv().encode(&mut buf);

        let mut si_buf = BytesMut::new();
        if let Some(d) = &self.signed_info.publisher_public_key_digest {
            TlvElement::new(tlv::TLV_PUBLISHER_PUBLIC_KEY_DIGEST, d.clone()).encode(&mut si_buf);
        }
        TlvElement::new(
            tlv::TLV_TIMESTAMP,
            Bytes::from(self.signed_info.timestamp_ticks.to_be_bytes().to_vec()),
        )
        .encode(&mut si_buf);
        TlvElement::new(tlv::TLV_CONTENT_TYPE, Bytes::from(vec![self.signed_info.content_type as u8]))
            .encode(&mut si_buf);
        if let Some(f) = self.signed_info.freshness_seconds {
            TlvElement::new(tlv::TLV_FRESHNESS_SECONDS, Bytes::from(f.to_be_bytes().to_vec()))
                .encode(&mut si_buf);
        }
        if let Some(fb) = &self.signed_info.final_block_id {
            TlvElement::new(tlv::TLV_FINAL_BLOCK_ID, fb.as_bytes().clone()).encode(&mut si_buf);
        }
        if let Some(kl) = &self.signed_info.key_locator {
            let kl_bytes = match kl {
                KeyLocator::Name(n) => n.to_tlv().value,
                KeyLocator::KeyDigest(d) => d.clone(),
            };
            TlvElement::new(tlv::TLV_KEY_LOCATOR, kl_bytes).encode(&mut si_buf);
        }
        TlvElement::new(tlv::TLV_SIGNED_INFO, si_buf.freeze()).encode(&mut buf);

        TlvElement::new(tlv::TLV_CONTENT, self.content.clone()).encode(&mut buf);

        TlvElement::new(tlv::TLV_DATA, buf.freeze())
    }

    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_DATA {
            return Err(Error::NdnPacket("not a ContentObject TLV".into()));
        }
        let mut buf = element.value.clone();
        let mut name = None;
        let mut content = Bytes::new();
        let mut signature = Signature {
            digest_algorithm: DigestAlgorithm::Sha256,
            signature_bits: Bytes::new(),
            witness: None,
        };
        let mut signed_info = SignedInfo::default();

        while buf.has_remaining() {
            let e = TlvElement::decode(&mut buf).map_err(|e| Error::Tlv(e.to_string()))?;
            match e.tlv_type {
                tlv::TLV_SIGNATURE => {
                    let mut inner = e.value.clone();
                    while inner.has_remaining() {
                        let ie = TlvElement::decode(&mut inner).map_err(|e| Error::Tlv(e.to_string()))?;
                        match ie.tlv_type {
                            tlv::TLV_SIGNATURE_BITS => signature.signature_bits = ie.value.clone(),
                            tlv::TLV_WITNESS => signature.witness = Some(ie.value.clone()),
                            _ => {}
                        }
                    }
                }
                tlv::TLV_NAME => name = Some(Name::from_tlv(&e)?),
                tlv::TLV_SIGNED_INFO => {
                    let mut inner = e.value.clone();
                    while inner.has_remaining() {
                        let ie = TlvElement::decode(&mut inner).map_err(|e| Error::Tlv(e.to_string()))?;
                        match ie.tlv_type {
                            tlv::TLV_PUBLISHER_PUBLIC_KEY_DIGEST => {
                                signed_info.publisher_public_key_digest = Some(ie.value.clone())
                            }
                            tlv::TLV_TIMESTAMP => signed_info.timestamp_ticks = read_u64(&ie.value)?,
                            tlv::TLV_CONTENT_TYPE => {
                                signed_info.content_type = ContentType::from_u8(*ie.value.first().unwrap_or(&0))
                            }
                            tlv::TLV_FRESHNESS_SECONDS => {
                                signed_info.freshness_seconds = Some(read_u32(&ie.value)?)
                            }
                            tlv::TLV_FINAL_BLOCK_ID => {
                                signed_info.final_block_id = Some(NameComponent::new(ie.value.clone()))
                            }
                            tlv::TLV_KEY_LOCATOR => {
                                signed_info.key_locator = Some(KeyLocator::KeyDigest(ie.value.clone()))
                            }
                            _ => {}
                        }
                    }
                }
                tlv::TLV_CONTENT => content = e.value.clone(),
                _ => {}
            }
        }
        let name = name.ok_or_else(|| Error::NdnPacket("ContentObject missing Name".into()))?;
        Ok(Self { signature, name, signed_info, content })
    }
}

/* ---------------------------------------------------------------- *\
 * Outcome of matching an Interest against the forwarder's state
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub enum InterestResult {
    Forwarded,
    SatisfiedByContentStore(ContentObject),
    Aggregated,
    Dropped(String),
}

/* ---------------------------------------------------------------- *\
 * Either packet, the unit the transport layer moves
\* ---------------------------------------------------------------- */

#[derive(Debug, Clone)]
pub enum NdnPacket {
    Interest(Interest),
    ContentObject(ContentObject),
}

impl NdnPacket {
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            NdnPacket::Interest(i) => i.to_tlv().encode(&mut buf),
            NdnPacket::ContentObject(c) => c.to_tlv().encode(&mut buf),
        }
        buf.freeze()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(bytes);
        let element = TlvElement::decode(&mut buf).map_err(|e| Error::Tlv(e.to_string()))?;
        match element.tlv_type {
            tlv::TLV_INTEREST => Ok(NdnPacket::Interest(Interest::from_tlv(&element)?)),
            tlv::TLV_DATA => Ok(NdnPacket::ContentObject(ContentObject::from_tlv(&element)?)),
            other => Err(Error::NdnPacket(format!("unknown top-level TLV type {other}"))),
        }
    }

    pub fn name(&self) -> &Name {
        match self {
            NdnPacket::Interest(i) => &i.name,
            NdnPacket::ContentObject(c) => &c.name,
        }
    }
}

fn read_u32(bytes: &Bytes) -> Result<u32, Error> {
    if bytes.len() < 4 {
        return Err(Error::Tlv("expected 4-byte integer field".into()));
    }
    let mut arr = [0u8; 4];
    arr.copy_from_slice(&bytes[bytes.len() - 4..]);
    Ok(u32::from_be_bytes(arr))
}

fn read_u64(bytes: &Bytes) -> Result<u64, Error> {
    if bytes.len() < 8 {
        return Err(Error::Tlv("expected 8-byte integer field".into()));
    }
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&bytes[bytes.len() - 8..]);
    Ok(u64::from_be_bytes(arr))
}

pub fn ms_to_ticks(ms: u32) -> u32 {
    ((ms as u64 * TIME_UNITS_PER_SECOND) / 1000) as u32
}

pub fn ticks_to_ms(ticks: u32) -> u32 {
    ((ticks as u64 * 1000) / TIME_UNITS_PER_SECOND) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_roundtrip_and_prefix() {
        let name = Name::from_string("/a/b/c");
        assert_eq!(name.len(), 3);
        assert_eq!(name.to_string(), "/a/b/c");

        let prefix = Name::from_string("/a/b");
        assert!(prefix.is_prefix_of(&name));
        assert!(!name.is_prefix_of(&prefix));
    }

    #[test]
    fn interest_tlv_roundtrip() {
        let interest = Interest::new(Name::from_string("/a/b"))
            .with_nonce(Bytes::from_static(b"1234"))
            .with_lifetime_ms(4000)
            .with_scope(Scope::ThisHostOnly)
            .with_child_selector(ChildSelector::Rightmost);
        let mut buf = BytesMut::new();
        interest.to_tlv().encode(&mut buf);
        let decoded_tlv = TlvElement::decode(&mut buf.freeze()).unwrap();
        let decoded = Interest::from_tlv(&decoded_tlv).unwrap();
        assert_eq!(decoded.name, interest.name);
        assert_eq!(decoded.nonce, interest.nonce);
        assert_eq!(decoded.scope, Scope::ThisHostOnly);
        assert_eq!(decoded.child_selector, ChildSelector::Rightmost);
        assert_eq!(decoded.lifetime_ms(), 4000);
    }

    #[test]
    fn content_object_tlv_roundtrip_and_digest() {
        let obj = ContentObject::new(Name::from_string("/a/b"), Bytes::from_static(b"hello"))
            .with_freshness_seconds(10)
            .with_content_type(ContentType::Data);
        let mut buf = BytesMut::new();
        obj.to_tlv().encode(&mut buf);
        let decoded_tlv = TlvElement::decode(&mut buf.freeze()).unwrap();
        let decoded = ContentObject::from_tlv(&decoded_tlv).unwrap();
        assert_eq!(decoded.name, obj.name);
        assert_eq!(decoded.content, obj.content);
        assert_eq!(decoded.signed_info.freshness_seconds, Some(10));

        let expanded = obj.expanded_name();
        assert_eq!(expanded.len(), obj.name.len() + 1);
    }

    #[test]
    fn exclude_fast_path_leading_component() {
        let exclude = Exclude {
            elements: vec![ExcludeElement::Any, ExcludeElement::Component(NameComponent::new("1"))],
        };
        assert_eq!(exclude.leading_excluded_component().unwrap().to_string(), "1");
        assert!(exclude.excludes(&NameComponent::new("1")));
        assert!(!exclude.excludes(&NameComponent::new("2")));
    }

    #[test]
    fn lifetime_tick_conversion() {
        assert_eq!(ms_to_ticks(1000), TIME_UNITS_PER_SECOND as u32);
        assert_eq!(ticks_to_ms(TIME_UNITS_PER_SECOND as u32), 1000);
    }
}
