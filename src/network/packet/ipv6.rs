use crate::core::error::{PacketError, PacketResult};
use std::net::Ipv6Addr;

pub const IPV6_HEADER_LEN: usize = 40;

pub const NEXT_HEADER_ICMPV6: u8 = 58;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6Header {
    pub version: u8,
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_length: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
}

impl Ipv6Header {
    /// payload length が示す範囲だけを切り出す
    pub fn payload<'a>(&self, data: &'a [u8]) -> PacketResult<&'a [u8]> {
        let payload_length = self.payload_length as usize;
        data.get(..payload_length)
            .ok_or_else(|| PacketError::truncated("IPv6", IPV6_HEADER_LEN + payload_length, IPV6_HEADER_LEN + data.len()))
    }

    pub fn parse(data: &[u8]) -> PacketResult<(Self, &[u8])> {
        if data.len() < IPV6_HEADER_LEN {
            return Err(PacketError::truncated("IPv6", IPV6_HEADER_LEN, data.len()));
        }

        let version = (data[0] >> 4) & 0xf;
        if version != 6 {
            return Err(PacketError::Malformed {
                header: "IPv6",
                reason: format!("バージョンが6ではありません: {}", version),
            });
        }

        let traffic_class = ((data[0] & 0xf) << 4) | (data[1] >> 4);
        let flow_label = u32::from_be_bytes([0, data[1] & 0xf, data[2], data[3]]);
        let payload_length = u16::from_be_bytes([data[4], data[5]]);
        let next_header = data[6];
        let hop_limit = data[7];

        let mut source_bytes = [0u8; 16];
        source_bytes.copy_from_slice(&data[8..24]);

        let mut dest_bytes = [0u8; 16];
        dest_bytes.copy_from_slice(&data[24..40]);

        Ok((
            Self {
                version,
                traffic_class,
                flow_label,
                payload_length,
                next_header,
                hop_limit,
                source: Ipv6Addr::from(source_bytes),
                destination: Ipv6Addr::from(dest_bytes),
            },
            &data[IPV6_HEADER_LEN..],
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn ipv6_header(next_header: u8, payload_length: u16, source: Ipv6Addr, destination: Ipv6Addr) -> Vec<u8> {
        let mut header = vec![0x60, 0x00, 0x00, 0x00];
        header.extend_from_slice(&payload_length.to_be_bytes());
        header.push(next_header);
        header.push(64);
        header.extend_from_slice(&source.octets());
        header.extend_from_slice(&destination.octets());
        header
    }

    #[test]
    fn test_parse_ipv6_header() {
        let source: Ipv6Addr = "fe80::1".parse().unwrap();
        let destination: Ipv6Addr = "fe80::2".parse().unwrap();
        let mut data = ipv6_header(NEXT_HEADER_ICMPV6, 2, source, destination);
        data[1] = 0xA5;
        data.extend_from_slice(&[1, 2]);

        let (header, payload) = Ipv6Header::parse(&data).unwrap();
        assert_eq!(header.version, 6);
        assert_eq!(header.traffic_class, 0x0A);
        assert_eq!(header.flow_label, 0x50000);
        assert_eq!(header.payload_length, 2);
        assert_eq!(header.next_header, NEXT_HEADER_ICMPV6);
        assert_eq!(header.hop_limit, 64);
        assert_eq!(header.source, source);
        assert_eq!(header.destination, destination);
        assert_eq!(payload, &[1, 2]);
    }

    #[test]
    fn test_parse_short_ipv6_header() {
        let data = ipv6_header(NEXT_HEADER_ICMPV6, 0, Ipv6Addr::LOCALHOST, Ipv6Addr::LOCALHOST);
        assert!(Ipv6Header::parse(&data[..39]).unwrap_err().is_malformed());
    }

    #[test]
    fn test_parse_rejects_wrong_version() {
        let mut data = ipv6_header(NEXT_HEADER_ICMPV6, 0, Ipv6Addr::LOCALHOST, Ipv6Addr::LOCALHOST);
        data[0] = 0x40;
        assert!(Ipv6Header::parse(&data).unwrap_err().is_malformed());
    }

    #[test]
    fn test_payload_honours_payload_length() {
        let mut data = ipv6_header(NEXT_HEADER_ICMPV6, 2, Ipv6Addr::LOCALHOST, Ipv6Addr::LOCALHOST);
        data.extend_from_slice(&[1, 2, 0xAA, 0xAA]);

        let (header, remainder) = Ipv6Header::parse(&data).unwrap();
        assert_eq!(header.payload(remainder).unwrap(), &[1, 2]);

        let (header, remainder) = Ipv6Header::parse(&data[..41]).unwrap();
        assert!(header.payload(remainder).unwrap_err().is_malformed());
    }
}
