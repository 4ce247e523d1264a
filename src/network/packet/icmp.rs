use crate::core::error::{PacketError, PacketResult};
use crate::network::packet::checksum::{self, Ipv6PseudoHeader};
use bytes::{BufMut, BytesMut};

pub const ICMP_ECHO_HEADER_LEN: usize = 8;

pub const ICMPV4_ECHO_REPLY: u8 = 0;
pub const ICMPV4_ECHO_REQUEST: u8 = 8;
pub const ICMPV6_ECHO_REQUEST: u8 = 128;
pub const ICMPV6_ECHO_REPLY: u8 = 129;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpVersion {
    V4,
    V6,
}

impl IcmpVersion {
    pub fn echo_request(self) -> u8 {
        match self {
            IcmpVersion::V4 => ICMPV4_ECHO_REQUEST,
            IcmpVersion::V6 => ICMPV6_ECHO_REQUEST,
        }
    }

    pub fn echo_reply(self) -> u8 {
        match self {
            IcmpVersion::V4 => ICMPV4_ECHO_REPLY,
            IcmpVersion::V6 => ICMPV6_ECHO_REPLY,
        }
    }

    fn is_echo(self, icmp_type: u8) -> bool {
        icmp_type == self.echo_request() || icmp_type == self.echo_reply()
    }
}

/// ICMP Echo (RFC 792) / ICMPv6 Echo (RFC 4443)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpEchoMessage {
    pub icmp_type: u8,
    pub icmp_code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
    pub payload: Vec<u8>,
}

impl IcmpEchoMessage {
    /// チェックサムは `encode` 時に計算される
    pub fn request(version: IcmpVersion, identifier: u16, sequence: u16, payload: Vec<u8>) -> Self {
        Self {
            icmp_type: version.echo_request(),
            icmp_code: 0,
            checksum: 0,
            identifier,
            sequence,
            payload,
        }
    }

    pub fn reply(version: IcmpVersion, identifier: u16, sequence: u16, payload: Vec<u8>) -> Self {
        Self {
            icmp_type: version.echo_reply(),
            ..Self::request(version, identifier, sequence, payload)
        }
    }

    /// Echo 以外のタイプは `UnsupportedProtocol`
    pub fn parse(data: &[u8], version: IcmpVersion) -> PacketResult<Self> {
        if data.len() < ICMP_ECHO_HEADER_LEN {
            return Err(PacketError::truncated("ICMP", ICMP_ECHO_HEADER_LEN, data.len()));
        }

        let icmp_type = data[0];
        if !version.is_echo(icmp_type) {
            return Err(PacketError::UnsupportedProtocol {
                layer: "ICMPタイプ",
                value: icmp_type as u16,
            });
        }

        Ok(Self {
            icmp_type,
            icmp_code: data[1],
            checksum: u16::from_be_bytes([data[2], data[3]]),
            identifier: u16::from_be_bytes([data[4], data[5]]),
            sequence: u16::from_be_bytes([data[6], data[7]]),
            payload: data[ICMP_ECHO_HEADER_LEN..].to_vec(),
        })
    }

    pub fn encoded_len(&self) -> usize {
        ICMP_ECHO_HEADER_LEN + self.payload.len()
    }

    fn write(&self, checksum: u16) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(self.encoded_len());
        buffer.put_u8(self.icmp_type);
        buffer.put_u8(self.icmp_code);
        buffer.put_u16(checksum);
        buffer.put_u16(self.identifier);
        buffer.put_u16(self.sequence);
        buffer.put_slice(&self.payload);
        buffer.to_vec()
    }

    /// チェックサムフィールドをゼロにして計算し、結果を埋め込んだバイト列を返す
    ///
    /// ICMPv6 では `pseudo_header` を渡す。
    pub fn encode(&mut self, pseudo_header: Option<&Ipv6PseudoHeader>) -> Vec<u8> {
        let mut bytes = self.write(0);
        self.checksum = checksum::compute(&bytes, pseudo_header);
        bytes[2..4].copy_from_slice(&self.checksum.to_be_bytes());
        bytes
    }

    /// 受信したメッセージのチェックサムを検証する
    pub fn verify(&self, pseudo_header: Option<&Ipv6PseudoHeader>) -> PacketResult<()> {
        let expected = checksum::compute(&self.write(0), pseudo_header);
        if expected != self.checksum {
            return Err(PacketError::ChecksumMismatch {
                expected,
                actual: self.checksum,
            });
        }
        Ok(())
    }

    pub fn is_reply_to(&self, version: IcmpVersion, identifier: u16, sequence: u16) -> bool {
        self.icmp_type == version.echo_reply() && self.identifier == identifier && self.sequence == sequence
    }
}

/// Echo メッセージをエンコードする (チェックサム計算込み)
pub fn encode_icmp_echo(message: &IcmpEchoMessage, pseudo_header: Option<&Ipv6PseudoHeader>) -> Vec<u8> {
    message.clone().encode(pseudo_header)
}
