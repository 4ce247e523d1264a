use crate::core::error::{PacketError, PacketResult};
use std::net::Ipv4Addr;

pub const IPV4_MIN_HEADER_LEN: usize = 20;

pub const PROTOCOL_ICMP: u8 = 1;
pub const PROTOCOL_TCP: u8 = 6;
pub const PROTOCOL_UDP: u8 = 17;

// 0                   1                   2                   3
// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |Version|  IHL  |Type of Service|          Total Length         |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |         Identification        |Flags|      Fragment Offset    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |  Time to Live |    Protocol   |         Header Checksum       |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                       Source Address                          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                    Destination Address                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// IPv4ヘッダーの読み取り専用ビュー (エンコードはしない)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4HeaderView {
    pub version: u8,
    /// 32ビットワード単位
    pub ihl: u8,
    pub total_length: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
}

impl Ipv4HeaderView {
    pub fn header_len(&self) -> usize {
        self.ihl as usize * 4
    }

    /// total length が示す範囲だけを切り出す (Ethernetのパディングを除く)
    ///
    /// `data` は `parse` が返した後続データ。
    pub fn payload<'a>(&self, data: &'a [u8]) -> PacketResult<&'a [u8]> {
        let total_length = self.total_length as usize;
        let header_len = self.header_len();
        if total_length < header_len {
            return Err(PacketError::Malformed {
                header: "IPv4",
                reason: format!("total length {} がヘッダー長 {} より短いです", total_length, header_len),
            });
        }

        data.get(..total_length - header_len)
            .ok_or_else(|| PacketError::truncated("IPv4", total_length, header_len + data.len()))
    }

    /// ビューとオプションを除いた後続データを返す
    pub fn parse(data: &[u8]) -> PacketResult<(Self, &[u8])> {
        if data.len() < IPV4_MIN_HEADER_LEN {
            return Err(PacketError::truncated("IPv4", IPV4_MIN_HEADER_LEN, data.len()));
        }

        let version = (data[0] >> 4) & 0xf;
        if version != 4 {
            return Err(PacketError::Malformed {
                header: "IPv4",
                reason: format!("バージョンが4ではありません: {}", version),
            });
        }

        let ihl = data[0] & 0xf;
        if ihl < 5 {
            return Err(PacketError::Malformed {
                header: "IPv4",
                reason: format!("IHLが範囲外です: {}", ihl),
            });
        }

        let header_len = ihl as usize * 4;
        let remainder = data
            .get(header_len..)
            .ok_or_else(|| PacketError::truncated("IPv4", header_len, data.len()))?;

        Ok((
            Self {
                version,
                ihl,
                total_length: u16::from_be_bytes([data[2], data[3]]),
                ttl: data[8],
                protocol: data[9],
                source: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
                destination: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
            },
            remainder,
        ))
    }
}
