pub mod arp;
pub mod checksum;
pub mod ethernet;
pub mod icmp;
pub mod ipv4;
pub mod ipv6;
pub mod tcp;
pub mod udp;

use crate::core::error::{PacketError, PacketResult};
use crate::network::packet::arp::ArpPacket;
use crate::network::packet::ethernet::{EtherType, EthernetHeader};
use crate::network::packet::icmp::{IcmpEchoMessage, IcmpVersion};
use crate::network::packet::ipv4::{Ipv4HeaderView, PROTOCOL_ICMP, PROTOCOL_TCP, PROTOCOL_UDP};
use crate::network::packet::ipv6::{Ipv6Header, NEXT_HEADER_ICMPV6};
use crate::network::packet::tcp::TcpHeader;
use crate::network::packet::udp::UdpHeader;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportProtocol {
    Tcp,
    Udp,
    Icmp,
    Other(u8),
}

impl TransportProtocol {
    pub fn number(self) -> u8 {
        match self {
            TransportProtocol::Tcp => PROTOCOL_TCP,
            TransportProtocol::Udp => PROTOCOL_UDP,
            TransportProtocol::Icmp => PROTOCOL_ICMP,
            TransportProtocol::Other(value) => value,
        }
    }
}

impl From<u8> for TransportProtocol {
    fn from(value: u8) -> Self {
        match value {
            PROTOCOL_TCP => TransportProtocol::Tcp,
            PROTOCOL_UDP => TransportProtocol::Udp,
            PROTOCOL_ICMP => TransportProtocol::Icmp,
            other => TransportProtocol::Other(other),
        }
    }
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportProtocol::Tcp => write!(f, "TCP"),
            TransportProtocol::Udp => write!(f, "UDP"),
            TransportProtocol::Icmp => write!(f, "ICMP"),
            TransportProtocol::Other(value) => write!(f, "proto {}", value),
        }
    }
}

/// トランスポート層のプロトコルと宛先ポート
///
/// ポートを持たないプロトコルでは `destination_port` は0。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportPortView {
    pub protocol: TransportProtocol,
    pub destination_port: u16,
}

impl TransportPortView {
    /// `data` はIPv4ヘッダー直後のバイト列
    pub fn extract(protocol: u8, data: &[u8]) -> PacketResult<Self> {
        let protocol = TransportProtocol::from(protocol);
        let destination_port = match protocol {
            TransportProtocol::Tcp => TcpHeader::parse(data)?.0.destination_port,
            TransportProtocol::Udp => UdpHeader::parse(data)?.0.destination_port,
            TransportProtocol::Icmp | TransportProtocol::Other(_) => 0,
        };

        Ok(Self {
            protocol,
            destination_port,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkHeader {
    Arp(ArpPacket),
    IPv4(Ipv4HeaderView),
    IPv6(Ipv6Header),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportHeader {
    Tcp(TcpHeader),
    Udp(UdpHeader),
    Icmp(IcmpEchoMessage),
}

/// 診断用にデコードしたフレーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub ethernet: EthernetHeader,
    pub network: NetworkHeader,
    /// 未対応のプロトコルでは None
    pub transport: Option<TransportHeader>,
    pub payload: Vec<u8>,
    pub length: usize,
}

/// Ethernetフレーム全体をデコードする
///
/// 各層は外側のヘッダーの type/protocol フィールドが示す場合にのみ解釈する。
/// IPの長さフィールドを超えるバイト (最小フレーム長に満たすためのパディング) は捨てる。
pub fn decode_frame(data: &[u8]) -> PacketResult<Packet> {
    let (ethernet, remainder) = EthernetHeader::parse(data)?;

    let (network, transport, payload) = match ethernet.ethertype {
        EtherType::Arp => (NetworkHeader::Arp(ArpPacket::parse(remainder)?), None, &[][..]),
        EtherType::IPv4 => {
            let (ipv4, after_header) = Ipv4HeaderView::parse(remainder)?;
            let transport_data = ipv4.payload(after_header)?;
            let (transport, payload) = match ipv4.protocol {
                PROTOCOL_TCP => {
                    let (tcp, payload) = TcpHeader::parse(transport_data)?;
                    (Some(TransportHeader::Tcp(tcp)), payload)
                }
                PROTOCOL_UDP => {
                    let (udp, payload) = UdpHeader::parse(transport_data)?;
                    (Some(TransportHeader::Udp(udp)), payload)
                }
                PROTOCOL_ICMP => decode_icmp(transport_data, IcmpVersion::V4)?,
                // 他のプロトコルはヘッダーのみ
                _ => (None, transport_data),
            };
            (NetworkHeader::IPv4(ipv4), transport, payload)
        }
        EtherType::IPv6 => {
            let (ipv6, after_header) = Ipv6Header::parse(remainder)?;
            let transport_data = ipv6.payload(after_header)?;
            let (transport, payload) = if ipv6.next_header == NEXT_HEADER_ICMPV6 {
                decode_icmp(transport_data, IcmpVersion::V6)?
            } else {
                (None, transport_data)
            };
            (NetworkHeader::IPv6(ipv6), transport, payload)
        }
        EtherType::Other(value) => {
            return Err(PacketError::UnsupportedProtocol {
                layer: "EtherType",
                value,
            })
        }
    };

    Ok(Packet {
        ethernet,
        network,
        transport,
        payload: payload.to_vec(),
        length: data.len(),
    })
}

// Echo 以外のICMPはヘッダーを解釈せずそのまま返す
fn decode_icmp(data: &[u8], version: IcmpVersion) -> PacketResult<(Option<TransportHeader>, &[u8])> {
    match IcmpEchoMessage::parse(data, version) {
        Ok(echo) => Ok((Some(TransportHeader::Icmp(echo)), &[][..])),
        Err(PacketError::UnsupportedProtocol { .. }) => Ok((None, data)),
        Err(e) => Err(e),
    }
}
