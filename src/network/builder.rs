use crate::core::error::{PacketError, PacketResult};
use crate::network::packet::arp::encode_arp_request;
use crate::network::packet::checksum::Ipv6PseudoHeader;
use crate::network::packet::ethernet::{EtherType, EthernetHeader, MacAddress, ETHERNET_HEADER_LEN};
use crate::network::packet::icmp::{IcmpEchoMessage, IcmpVersion};
use crate::network::packet::ipv4::IPV4_MIN_HEADER_LEN;
use crate::network::packet::ipv6::{IPV6_HEADER_LEN, NEXT_HEADER_ICMPV6};
use std::net::{Ipv4Addr, Ipv6Addr};

/// 標準的なEthernet MTU (FCSを除く)
pub const DEFAULT_MAX_FRAME_LEN: usize = 1514;

/// Echo メッセージのチェックサム計算方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoAddressing {
    /// 疑似ヘッダーなし
    V4,
    /// IPv6疑似ヘッダーを含める
    V6 {
        source: Ipv6Addr,
        destination: Ipv6Addr,
    },
}

/// 送信用フレームの組み立て
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    max_frame_len: usize,
}

impl Default for FrameBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameBuilder {
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    pub fn build_ethernet_frame(
        &self,
        destination: MacAddress,
        source: MacAddress,
        ethertype: EtherType,
        payload: &[u8],
    ) -> PacketResult<Vec<u8>> {
        let length = ETHERNET_HEADER_LEN + payload.len();
        if length > self.max_frame_len {
            return Err(PacketError::PayloadTooLarge {
                length,
                max: self.max_frame_len,
            });
        }

        Ok(EthernetHeader::new(destination, source, ethertype).encode(payload))
    }

    /// ブロードキャスト宛のARPリクエストフレーム
    pub fn build_arp_request_frame(
        &self,
        source_mac: MacAddress,
        source_ip: Ipv4Addr,
        target_ip: Ipv4Addr,
    ) -> PacketResult<Vec<u8>> {
        let arp = encode_arp_request(source_mac, source_ip, target_ip);
        self.build_ethernet_frame(MacAddress::BROADCAST, source_mac, EtherType::Arp, &arp)
    }

    /// Echo Request メッセージ (IPヘッダーなし、raw ソケット送信用)
    ///
    /// IPヘッダーと合わせて最大フレーム長に収まらない場合は `PayloadTooLarge`。
    pub fn build_icmp_echo_frame(
        &self,
        identifier: u16,
        sequence: u16,
        payload: &[u8],
        addressing: EchoAddressing,
    ) -> PacketResult<Vec<u8>> {
        let (version, ip_header_len) = match addressing {
            EchoAddressing::V4 => (IcmpVersion::V4, IPV4_MIN_HEADER_LEN),
            EchoAddressing::V6 { .. } => (IcmpVersion::V6, IPV6_HEADER_LEN),
        };

        let mut message = IcmpEchoMessage::request(version, identifier, sequence, payload.to_vec());
        let length = ETHERNET_HEADER_LEN + ip_header_len + message.encoded_len();
        if length > self.max_frame_len {
            return Err(PacketError::PayloadTooLarge {
                length,
                max: self.max_frame_len,
            });
        }

        let bytes = match addressing {
            EchoAddressing::V4 => message.encode(None),
            EchoAddressing::V6 { source, destination } => {
                let pseudo = Ipv6PseudoHeader::new(source, destination, message.encoded_len() as u32, NEXT_HEADER_ICMPV6);
                message.encode(Some(&pseudo))
            }
        };

        Ok(bytes)
    }
}
