//! OpenFlow extensible match (OXM) TLVs.

use std::net::Ipv4Addr;

use crate::bytes::{array, be_u8, be_u16, range};
use crate::error::WireError;

const OFPXMC_OPENFLOW_BASIC: u16 = 0x8000;
const TLV_HEADER_LEN: usize = 4;

const OFB_IN_PORT: u8 = 0;
const OFB_ETH_DST: u8 = 3;
const OFB_ETH_SRC: u8 = 4;
const OFB_ETH_TYPE: u8 = 5;
const OFB_IPV4_SRC: u8 = 11;
const OFB_IPV4_DST: u8 = 12;
const OFB_ARP_OP: u8 = 21;
const OFB_ARP_SPA: u8 = 22;
const OFB_ARP_TPA: u8 = 23;
const OFB_ARP_SHA: u8 = 24;
const OFB_ARP_THA: u8 = 25;
const OFB_TUNNEL_ID: u8 = 38;

/// A single OXM match field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OxmField {
    /// Switch input port.
    InPort(u32),
    /// Ethernet destination address.
    EthDst([u8; 6]),
    /// Ethernet source address.
    EthSrc([u8; 6]),
    /// Ethernet frame type.
    EthType(u16),
    /// IPv4 source address.
    Ipv4Src(Ipv4Addr),
    /// IPv4 destination address.
    Ipv4Dst(Ipv4Addr),
    /// ARP opcode.
    ArpOp(u16),
    /// ARP source protocol address.
    ArpSpa(Ipv4Addr),
    /// ARP target protocol address.
    ArpTpa(Ipv4Addr),
    /// ARP source hardware address.
    ArpSha([u8; 6]),
    /// ARP target hardware address.
    ArpTha([u8; 6]),
    /// Logical port metadata for tunnels.
    TunnelId(u64),
    /// Any field this crate does not interpret, including masked fields.
    Raw {
        /// OXM class.
        class: u16,
        /// Field number within the class.
        field: u8,
        /// Whether the value is followed by a mask.
        has_mask: bool,
        /// Value (and mask) bytes.
        value: Vec<u8>,
    },
}

impl OxmField {
    /// Ethernet type for IPv4.
    pub const ETH_TYPE_IPV4: u16 = 0x0800;
    /// Ethernet type for ARP.
    pub const ETH_TYPE_ARP: u16 = 0x0806;
    /// ARP request opcode.
    pub const ARP_OP_REQUEST: u16 = 1;
    /// ARP reply opcode.
    pub const ARP_OP_REPLY: u16 = 2;

    /// Appends the TLV encoding of this field to `buffer`.
    pub fn encode_into(&self, buffer: &mut Vec<u8>) {
        let (class, field, has_mask, value): (u16, u8, bool, Vec<u8>) = match self {
            Self::InPort(port) => basic(OFB_IN_PORT, &port.to_be_bytes()),
            Self::EthDst(addr) => basic(OFB_ETH_DST, addr),
            Self::EthSrc(addr) => basic(OFB_ETH_SRC, addr),
            Self::EthType(eth_type) => basic(OFB_ETH_TYPE, &eth_type.to_be_bytes()),
            Self::Ipv4Src(addr) => basic(OFB_IPV4_SRC, &addr.octets()),
            Self::Ipv4Dst(addr) => basic(OFB_IPV4_DST, &addr.octets()),
            Self::ArpOp(op) => basic(OFB_ARP_OP, &op.to_be_bytes()),
            Self::ArpSpa(addr) => basic(OFB_ARP_SPA, &addr.octets()),
            Self::ArpTpa(addr) => basic(OFB_ARP_TPA, &addr.octets()),
            Self::ArpSha(addr) => basic(OFB_ARP_SHA, addr),
            Self::ArpTha(addr) => basic(OFB_ARP_THA, addr),
            Self::TunnelId(id) => basic(OFB_TUNNEL_ID, &id.to_be_bytes()),
            Self::Raw {
                class,
                field,
                has_mask,
                value,
            } => (*class, *field, *has_mask, value.clone()),
        };
        buffer.extend_from_slice(&class.to_be_bytes());
        buffer.push((field << 1) | u8::from(has_mask));
        // OXM payloads are bounded by a single length byte.
        buffer.push(u8::try_from(value.len()).unwrap_or(u8::MAX));
        buffer.extend_from_slice(&value);
    }

    /// Returns the standalone TLV encoding of this field.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        self.encode_into(&mut buffer);
        buffer
    }

    fn decode(class: u16, header: u8, value: &[u8]) -> Result<Self, WireError> {
        let field = header >> 1;
        let has_mask = header & 1 == 1;
        if class != OFPXMC_OPENFLOW_BASIC || has_mask {
            return Ok(Self::raw(class, field, has_mask, value));
        }
        let decoded = match field {
            OFB_IN_PORT => Self::InPort(u32::from_be_bytes(array(value, 0)?)),
            OFB_ETH_DST => Self::EthDst(array(value, 0)?),
            OFB_ETH_SRC => Self::EthSrc(array(value, 0)?),
            OFB_ETH_TYPE => Self::EthType(be_u16(value, 0)?),
            OFB_IPV4_SRC => Self::Ipv4Src(Ipv4Addr::from(array::<4>(value, 0)?)),
            OFB_IPV4_DST => Self::Ipv4Dst(Ipv4Addr::from(array::<4>(value, 0)?)),
            OFB_ARP_OP => Self::ArpOp(be_u16(value, 0)?),
            OFB_ARP_SPA => Self::ArpSpa(Ipv4Addr::from(array::<4>(value, 0)?)),
            OFB_ARP_TPA => Self::ArpTpa(Ipv4Addr::from(array::<4>(value, 0)?)),
            OFB_ARP_SHA => Self::ArpSha(array(value, 0)?),
            OFB_ARP_THA => Self::ArpTha(array(value, 0)?),
            OFB_TUNNEL_ID => Self::TunnelId(u64::from_be_bytes(array(value, 0)?)),
            _ => Self::raw(class, field, has_mask, value),
        };
        Ok(decoded)
    }

    fn raw(class: u16, field: u8, has_mask: bool, value: &[u8]) -> Self {
        Self::Raw {
            class,
            field,
            has_mask,
            value: value.to_vec(),
        }
    }
}

fn basic(field: u8, value: &[u8]) -> (u16, u8, bool, Vec<u8>) {
    (OFPXMC_OPENFLOW_BASIC, field, false, value.to_vec())
}

/// Parses a run of OXM TLVs, such as the fields of an `ofp_match`.
///
/// # Errors
///
/// Returns [`WireError::Overrun`] when a TLV declares more bytes than remain.
pub fn parse_oxm_fields(mut bytes: &[u8]) -> Result<OxmFields, WireError> {
    let mut fields = Vec::new();
    while !bytes.is_empty() {
        let class = be_u16(bytes, 0)?;
        let header = be_u8(bytes, 2)?;
        let len = usize::from(be_u8(bytes, 3)?);
        let end = TLV_HEADER_LEN + len;
        if end > bytes.len() {
            return Err(WireError::Overrun {
                structure: "oxm field",
                declared: len,
                available: bytes.len().saturating_sub(TLV_HEADER_LEN),
            });
        }
        fields.push(OxmField::decode(class, header, range(bytes, TLV_HEADER_LEN, end)?)?);
        bytes = range(bytes, end, bytes.len())?;
    }
    Ok(OxmFields { fields })
}

/// Decoded match fields with typed lookups for the common ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OxmFields {
    fields: Vec<OxmField>,
}

impl OxmFields {
    /// All fields in wire order.
    #[must_use]
    pub fn fields(&self) -> &[OxmField] {
        &self.fields
    }

    /// Input port, when present.
    #[must_use]
    pub fn in_port(&self) -> Option<u32> {
        self.fields.iter().find_map(|field| match field {
            OxmField::InPort(port) => Some(*port),
            _ => None,
        })
    }

    /// Ethernet destination, when present.
    #[must_use]
    pub fn eth_dst(&self) -> Option<[u8; 6]> {
        self.fields.iter().find_map(|field| match field {
            OxmField::EthDst(addr) => Some(*addr),
            _ => None,
        })
    }

    /// Ethernet source, when present.
    #[must_use]
    pub fn eth_src(&self) -> Option<[u8; 6]> {
        self.fields.iter().find_map(|field| match field {
            OxmField::EthSrc(addr) => Some(*addr),
            _ => None,
        })
    }

    /// Tunnel id, when present.
    #[must_use]
    pub fn tunnel_id(&self) -> Option<u64> {
        self.fields.iter().find_map(|field| match field {
            OxmField::TunnelId(id) => Some(*id),
            _ => None,
        })
    }
}

impl From<Vec<OxmField>> for OxmFields {
    fn from(fields: Vec<OxmField>) -> Self {
        Self { fields }
    }
}
