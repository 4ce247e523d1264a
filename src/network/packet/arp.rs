use crate::core::error::{PacketError, PacketResult};
use crate::network::packet::ethernet::MacAddress;
use bytes::{BufMut, BytesMut};
use std::net::Ipv4Addr;

pub const ARP_PACKET_LEN: usize = 28;

pub const HARDWARE_TYPE_ETHERNET: u16 = 1;
pub const PROTOCOL_TYPE_IPV4: u16 = 0x0800;

const HARDWARE_LEN: u8 = 6;
const PROTOCOL_LEN: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOperation {
    Request,
    Reply,
    Other(u16),
}

impl ArpOperation {
    pub fn to_u16(self) -> u16 {
        match self {
            ArpOperation::Request => 1,
            ArpOperation::Reply => 2,
            ArpOperation::Other(value) => value,
        }
    }
}

impl From<u16> for ArpOperation {
    fn from(value: u16) -> Self {
        match value {
            1 => ArpOperation::Request,
            2 => ArpOperation::Reply,
            other => ArpOperation::Other(other),
        }
    }
}

// RFC 826 (Ethernet/IPv4)
//
// +--------+--------+-------+-------+--------+---------+--------+---------+--------+
// | hw(2)  | pro(2) | hln=6 | pln=4 | op(2)  | sha(6)  | spa(4) | tha(6)  | tpa(4) |
// +--------+--------+-------+-------+--------+---------+--------+---------+--------+
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpPacket {
    pub hardware_type: u16,
    pub protocol_type: u16,
    pub operation: ArpOperation,
    pub sender_mac: MacAddress,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddress,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    /// ターゲットMACは未知のためゼロ
    pub fn request(sender_mac: MacAddress, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        Self {
            hardware_type: HARDWARE_TYPE_ETHERNET,
            protocol_type: PROTOCOL_TYPE_IPV4,
            operation: ArpOperation::Request,
            sender_mac,
            sender_ip,
            target_mac: MacAddress::ZERO,
            target_ip,
        }
    }

    pub fn reply(sender_mac: MacAddress, sender_ip: Ipv4Addr, target_mac: MacAddress, target_ip: Ipv4Addr) -> Self {
        Self {
            hardware_type: HARDWARE_TYPE_ETHERNET,
            protocol_type: PROTOCOL_TYPE_IPV4,
            operation: ArpOperation::Reply,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        }
    }

    pub fn parse(data: &[u8]) -> PacketResult<Self> {
        if data.len() < ARP_PACKET_LEN {
            return Err(PacketError::truncated("ARP", ARP_PACKET_LEN, data.len()));
        }

        let hardware_len = data[4];
        let protocol_len = data[5];
        if hardware_len != HARDWARE_LEN || protocol_len != PROTOCOL_LEN {
            return Err(PacketError::Malformed {
                header: "ARP",
                reason: format!(
                    "アドレス長が Ethernet/IPv4 と一致しません (hln={}, pln={})",
                    hardware_len, protocol_len
                ),
            });
        }

        let mut sender_mac = [0u8; 6];
        let mut target_mac = [0u8; 6];
        sender_mac.copy_from_slice(&data[8..14]);
        target_mac.copy_from_slice(&data[18..24]);

        Ok(Self {
            hardware_type: u16::from_be_bytes([data[0], data[1]]),
            protocol_type: u16::from_be_bytes([data[2], data[3]]),
            operation: ArpOperation::from(u16::from_be_bytes([data[6], data[7]])),
            sender_mac: MacAddress(sender_mac),
            sender_ip: Ipv4Addr::new(data[14], data[15], data[16], data[17]),
            target_mac: MacAddress(target_mac),
            target_ip: Ipv4Addr::new(data[24], data[25], data[26], data[27]),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(ARP_PACKET_LEN);
        buffer.put_u16(self.hardware_type);
        buffer.put_u16(self.protocol_type);
        buffer.put_u8(HARDWARE_LEN);
        buffer.put_u8(PROTOCOL_LEN);
        buffer.put_u16(self.operation.to_u16());
        buffer.put_slice(&self.sender_mac.0);
        buffer.put_slice(&self.sender_ip.octets());
        buffer.put_slice(&self.target_mac.0);
        buffer.put_slice(&self.target_ip.octets());
        buffer.to_vec()
    }

    /// `ip` からのARP応答かどうか
    pub fn is_reply_from(&self, ip: Ipv4Addr) -> bool {
        self.operation == ArpOperation::Reply && self.sender_ip == ip
    }
}

/// ARPリクエストをエンコードする
pub fn encode_arp_request(sender_mac: MacAddress, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Vec<u8> {
    ArpPacket::request(sender_mac, sender_ip, target_ip).to_bytes()
}
