// IP multicast controller
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Ethernet/IPv4/IGMP decoding: turns a raw frame received from a switch's packet-in channel into
//! the logical types [`mcast_core`] operates on. The Ethernet and IPv4 headers are parsed with
//! `etherparse`; IGMP has no support in that crate, so its (short, fixed-layout) header is decoded
//! by hand here.

use etherparse::{IpHeader, PacketHeaders};
use log::*;
use mcast_core::membership::{GroupRecord, IgmpMessage, RecordType};
use mcast_core::traffic::ETH_TYPE_IPV4;
use mcast_core::types::Ipv4Addr;
use std::collections::HashSet;
use thiserror::Error;

/// `ethertype` for IPv4, re-exported from [`mcast_core::traffic`] so the wire decoder and the
/// flow-match fields it eventually feeds never drift apart.
pub const ETHERTYPE_IPV4: u16 = ETH_TYPE_IPV4;
/// IP protocol number for IGMP.
pub const IGMP_PROTOCOL: u8 = 2;

/// Errors raised while decoding a raw frame.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum DecodeError {
    /// `etherparse` could not make sense of the Ethernet/IP headers.
    #[error("malformed ethernet/ip headers: {0}")]
    Malformed(String),
    /// The frame did not carry an IPv4 payload at all (e.g. ARP, IPv6).
    #[error("frame does not carry an ipv4 payload")]
    NotIpv4,
    /// The IPv4 payload's protocol was not IGMP.
    #[error("ip protocol {0} is not igmp")]
    NotIgmp(u8),
    /// The IGMP payload was shorter than its declared structure required.
    #[error("igmp payload truncated: {0}")]
    Truncated(&'static str),
    /// An IGMPv3 record carried a record type byte not among the six defined by RFC 3376.
    #[error("unknown IGMPv3 record type: {0}")]
    UnknownRecordType(u8),
    /// A recognised but uninteresting IGMP type (e.g. a membership query, or IGMPv1).
    #[error("igmp type {0} carries no membership change")]
    UninterestingIgmpType(u8),
}

/// A decoded IPv4 packet, plus the Ethernet addressing it arrived with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Packet {
    /// Source MAC address of the carrying Ethernet frame.
    pub src_mac: [u8; 6],
    /// Destination MAC address of the carrying Ethernet frame.
    pub dst_mac: [u8; 6],
    /// Source address.
    pub src: Ipv4Addr,
    /// Destination address.
    pub dst: Ipv4Addr,
    /// IP protocol number.
    pub protocol: u8,
    /// Everything after the IP header.
    pub payload: Vec<u8>,
}

/// Parses a raw Ethernet frame, returning its IPv4 packet if it carries one.
pub fn decode_ipv4_frame(data: &[u8]) -> Result<Ipv4Packet, DecodeError> {
    let headers =
        PacketHeaders::from_ethernet_slice(data).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let link = headers.link.ok_or_else(|| DecodeError::Malformed("missing ethernet header".into()))?;
    let ipv4 = match headers.ip {
        Some(IpHeader::Version4(h, _)) => h,
        _ => return Err(DecodeError::NotIpv4),
    };
    Ok(Ipv4Packet {
        src_mac: link.source,
        dst_mac: link.destination,
        src: Ipv4Addr::new(ipv4.source[0], ipv4.source[1], ipv4.source[2], ipv4.source[3]),
        dst: Ipv4Addr::new(
            ipv4.destination[0],
            ipv4.destination[1],
            ipv4.destination[2],
            ipv4.destination[3],
        ),
        protocol: ipv4.protocol,
        payload: headers.payload.to_vec(),
    })
}

/// Decodes the IGMP message out of `packet`, which must already have `protocol == IGMP_PROTOCOL`.
///
/// IGMPv2 Membership Report is type `0x16`, IGMPv2 Leave Group is type `0x17`, IGMPv3 Membership
/// Report is type `0x22`. Other IGMP types (queries, IGMPv1) carry no membership change and are
/// reported as [`DecodeError::UninterestingIgmpType`].
pub fn decode_igmp(packet: &Ipv4Packet) -> Result<IgmpMessage, DecodeError> {
    if packet.protocol != IGMP_PROTOCOL {
        return Err(DecodeError::NotIgmp(packet.protocol));
    }
    let payload = &packet.payload;
    if payload.is_empty() {
        return Err(DecodeError::Truncated("igmp type"));
    }
    match payload[0] {
        0x16 => Ok(IgmpMessage::V2Report(packet.dst)),
        0x17 => Ok(IgmpMessage::V2Leave(packet.dst)),
        0x22 => decode_v3_report(payload),
        other => Err(DecodeError::UninterestingIgmpType(other)),
    }
}

fn decode_v3_report(payload: &[u8]) -> Result<IgmpMessage, DecodeError> {
    if payload.len() < 8 {
        return Err(DecodeError::Truncated("igmpv3 report header"));
    }
    let num_records = u16::from_be_bytes([payload[6], payload[7]]) as usize;
    let mut records = Vec::with_capacity(num_records);
    let mut offset = 8;
    for _ in 0..num_records {
        if payload.len() < offset + 8 {
            return Err(DecodeError::Truncated("igmpv3 group record header"));
        }
        let kind = decode_record_type(payload[offset])?;
        let aux_data_len = payload[offset + 1] as usize * 4;
        let num_sources = u16::from_be_bytes([payload[offset + 2], payload[offset + 3]]) as usize;
        let group = Ipv4Addr::new(
            payload[offset + 4],
            payload[offset + 5],
            payload[offset + 6],
            payload[offset + 7],
        );
        let sources_start = offset + 8;
        let sources_end = sources_start + num_sources * 4;
        if payload.len() < sources_end + aux_data_len {
            return Err(DecodeError::Truncated("igmpv3 source list"));
        }
        let mut sources: HashSet<Ipv4Addr> = HashSet::with_capacity(num_sources);
        for i in 0..num_sources {
            let base = sources_start + i * 4;
            sources.insert(Ipv4Addr::new(
                payload[base],
                payload[base + 1],
                payload[base + 2],
                payload[base + 3],
            ));
        }
        records.push(GroupRecord::new(kind, group, sources));
        offset = sources_end + aux_data_len;
    }
    debug!("decoded igmpv3 report with {} record(s)", records.len());
    Ok(IgmpMessage::V3Report(records))
}

fn decode_record_type(raw: u8) -> Result<RecordType, DecodeError> {
    match raw {
        1 => Ok(RecordType::ModeIsInclude),
        2 => Ok(RecordType::ModeIsExclude),
        3 => Ok(RecordType::ChangeToInclude),
        4 => Ok(RecordType::ChangeToExclude),
        5 => Ok(RecordType::AllowNewSources),
        6 => Ok(RecordType::BlockOldSources),
        other => Err(DecodeError::UnknownRecordType(other)),
    }
}
