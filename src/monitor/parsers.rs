//! Frame dissector for Ethernet / IPv4 / TCP / UDP / ICMP.
//!
//! Every layer is a fixed-width header read from the front of a byte slice.
//! Only the fields the monitor needs are decoded; everything else in the
//! header is skipped. All functions are pure and hold no state.
//!
//! A buffer shorter than the header it should contain yields
//! [`DissectError::Truncated`] instead of panicking, so a single bad frame can
//! be dropped by the caller without disturbing the capture loop.

use crate::error::DissectError;
use crate::monitor::types::FlowKey;
use std::fmt::Write as _;
use std::net::Ipv4Addr;

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const IPV4_HEADER_LEN:     usize = 20;
pub const PORTS_LEN:           usize = 4;
pub const ICMP_HEADER_LEN:     usize = 2;

pub const ETHERTYPE_IPV4: u16 = 0x0800;

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP:  u8 = 6;
pub const IPPROTO_UDP:  u8 = 17;

/// A header with a fixed on-wire length that can be decoded from exactly
/// that many bytes.
pub trait FixedHeader: Sized {
    /// Layer name used in error messages.
    const LAYER: &'static str;
    /// Number of bytes the header occupies.
    const LEN: usize;

    /// Decodes the header. `bytes` is always exactly [`Self::LEN`] long.
    fn decode(bytes: &[u8]) -> Self;
}

/// Splits a header of type `H` off the front of `buf`, returning it together
/// with the remaining payload.
pub fn split_header<H: FixedHeader>(buf: &[u8]) -> Result<(H, &[u8]), DissectError> {
    if buf.len() < H::LEN {
        return Err(DissectError::Truncated {
            layer:  H::LAYER,
            needed: H::LEN,
            got:    buf.len(),
        });
    }
    let (head, rest) = buf.split_at(H::LEN);
    Ok((H::decode(head), rest))
}

fn be_u16(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

/// Formats a MAC address as 12 uppercase hex digits with no separators.
pub fn mac_format(mac: &[u8]) -> String {
    let mut out = String::with_capacity(mac.len() * 2);
    for byte in mac {
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

/// Formats four octets as a dotted-decimal IPv4 address.
pub fn ipv4_format(octets: &[u8]) -> String {
    Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]).to_string()
}

// ── Headers ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst_mac:   String,
    pub src_mac:   String,
    /// Host byte order.
    pub ethertype: u16,
}

impl FixedHeader for EthernetHeader {
    const LAYER: &'static str = "ethernet";
    const LEN: usize = ETHERNET_HEADER_LEN;

    fn decode(bytes: &[u8]) -> Self {
        Self {
            dst_mac:   mac_format(&bytes[0..6]),
            src_mac:   mac_format(&bytes[6..12]),
            ethertype: be_u16(&bytes[12..14]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    pub protocol: u8,
    pub src_ip:   String,
    pub dst_ip:   String,
}

impl FixedHeader for Ipv4Header {
    const LAYER: &'static str = "ipv4";
    const LEN: usize = IPV4_HEADER_LEN;

    // Bytes 0..9 (version, IHL, ToS, length, id, flags, fragment offset, TTL)
    // and 10..12 (checksum) are not needed.
    fn decode(bytes: &[u8]) -> Self {
        Self {
            protocol: bytes[9],
            src_ip:   ipv4_format(&bytes[12..16]),
            dst_ip:   ipv4_format(&bytes[16..20]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader {
    pub src_port: u16,
    pub dst_port: u16,
}

impl FixedHeader for TcpHeader {
    const LAYER: &'static str = "tcp";
    const LEN: usize = PORTS_LEN;

    fn decode(bytes: &[u8]) -> Self {
        Self { src_port: be_u16(&bytes[0..2]), dst_port: be_u16(&bytes[2..4]) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
}

impl FixedHeader for UdpHeader {
    const LAYER: &'static str = "udp";
    const LEN: usize = PORTS_LEN;

    fn decode(bytes: &[u8]) -> Self {
        Self { src_port: be_u16(&bytes[0..2]), dst_port: be_u16(&bytes[2..4]) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub code:      u8,
}

impl FixedHeader for IcmpHeader {
    const LAYER: &'static str = "icmp";
    const LEN: usize = ICMP_HEADER_LEN;

    fn decode(bytes: &[u8]) -> Self {
        Self { icmp_type: bytes[0], code: bytes[1] }
    }
}

// ── Per-layer entry points ───────────────────────────────────────────────────

/// Returns `(dst_mac, src_mac, ethertype, payload)`.
pub fn dissect_ethernet(frame: &[u8]) -> Result<(String, String, u16, &[u8]), DissectError> {
    let (eth, payload) = split_header::<EthernetHeader>(frame)?;
    Ok((eth.dst_mac, eth.src_mac, eth.ethertype, payload))
}

/// Returns `(protocol, src_ip, dst_ip, payload)`.
pub fn dissect_ipv4(payload: &[u8]) -> Result<(u8, String, String, &[u8]), DissectError> {
    let (ip, rest) = split_header::<Ipv4Header>(payload)?;
    Ok((ip.protocol, ip.src_ip, ip.dst_ip, rest))
}

/// Returns `(src_port, dst_port)`.
pub fn dissect_tcp(payload: &[u8]) -> Result<(u16, u16), DissectError> {
    let (tcp, _) = split_header::<TcpHeader>(payload)?;
    Ok((tcp.src_port, tcp.dst_port))
}

/// Returns `(src_port, dst_port)`.
pub fn dissect_udp(payload: &[u8]) -> Result<(u16, u16), DissectError> {
    let (udp, _) = split_header::<UdpHeader>(payload)?;
    Ok((udp.src_port, udp.dst_port))
}

/// Returns `(type, code)`.
pub fn dissect_icmp(payload: &[u8]) -> Result<(u8, u8), DissectError> {
    let (icmp, _) = split_header::<IcmpHeader>(payload)?;
    Ok((icmp.icmp_type, icmp.code))
}

// ── Whole-frame dissection ───────────────────────────────────────────────────

/// Transport layer of an IPv4 packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Tcp(TcpHeader),
    Udp(UdpHeader),
    Icmp(IcmpHeader),
    /// Any other IP protocol number; not decoded further.
    Other(u8),
}

/// Result of dissecting one link-layer frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dissected {
    /// Ethertype other than IPv4.
    NonIpv4 { ethernet: EthernetHeader },
    Ipv4 {
        ethernet:  EthernetHeader,
        ip:        Ipv4Header,
        transport: Transport,
    },
}

impl Dissected {
    /// The contact-table key for this frame, if it is a trackable TCP or UDP
    /// flow. ICMP and everything else yields `None`.
    pub fn flow_key(&self) -> Option<FlowKey> {
        let Dissected::Ipv4 { ip, transport, .. } = self else {
            return None;
        };
        let dst_port = match transport {
            Transport::Tcp(tcp) => tcp.dst_port,
            Transport::Udp(udp) => udp.dst_port,
            Transport::Icmp(_) | Transport::Other(_) => return None,
        };
        Some(FlowKey::new(ip.src_ip.as_str(), ip.dst_ip.as_str(), dst_port))
    }
}

/// Dissects a full Ethernet frame down to the transport header.
pub fn dissect_frame(frame: &[u8]) -> Result<Dissected, DissectError> {
    let (ethernet, payload) = split_header::<EthernetHeader>(frame)?;
    if ethernet.ethertype != ETHERTYPE_IPV4 {
        return Ok(Dissected::NonIpv4 { ethernet });
    }

    let (ip, payload) = split_header::<Ipv4Header>(payload)?;
    let transport = match ip.protocol {
        IPPROTO_TCP  => Transport::Tcp(split_header::<TcpHeader>(payload)?.0),
        IPPROTO_UDP  => Transport::Udp(split_header::<UdpHeader>(payload)?.0),
        IPPROTO_ICMP => Transport::Icmp(split_header::<IcmpHeader>(payload)?.0),
        other        => Transport::Other(other),
    };

    Ok(Dissected::Ipv4 { ethernet, ip, transport })
}
