use crate::core::error::{PacketError, PacketResult};
use bytes::{BufMut, BytesMut};
use std::fmt;
use std::str::FromStr;

pub const ETHERNET_HEADER_LEN: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);
    pub const ZERO: MacAddress = MacAddress([0x00; 6]);

    pub fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; 6] = slice.try_into().ok()?;
        Some(MacAddress(bytes))
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

// "00:1A:2B:3C:4D:5E" 形式
impl FromStr for MacAddress {
    type Err = PacketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PacketError::Malformed {
            header: "MACアドレス",
            reason: format!("不正な形式です: {}", s),
        };

        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || part.len() > 2 {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(MacAddress(bytes))
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    IPv4,
    Arp,
    IPv6,
    Other(u16),
}

impl EtherType {
    pub fn to_u16(self) -> u16 {
        match self {
            EtherType::IPv4 => 0x0800,
            EtherType::Arp => 0x0806,
            EtherType::IPv6 => 0x86DD,
            EtherType::Other(value) => value,
        }
    }
}

impl From<u16> for EtherType {
    fn from(value: u16) -> Self {
        match value {
            0x0800 => EtherType::IPv4,
            0x0806 => EtherType::Arp,
            0x86DD => EtherType::IPv6,
            other => EtherType::Other(other),
        }
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::IPv4 => write!(f, "IPv4"),
            EtherType::Arp => write!(f, "ARP"),
            EtherType::IPv6 => write!(f, "IPv6"),
            EtherType::Other(value) => write!(f, "0x{:04X}", value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub destination: MacAddress,
    pub source: MacAddress,
    pub ethertype: EtherType,
}

impl EthernetHeader {
    pub fn new(destination: MacAddress, source: MacAddress, ethertype: EtherType) -> Self {
        Self {
            destination,
            source,
            ethertype,
        }
    }

    /// ヘッダーと残りのペイロードを返す
    pub fn parse(data: &[u8]) -> PacketResult<(Self, &[u8])> {
        if data.len() < ETHERNET_HEADER_LEN {
            return Err(PacketError::truncated("Ethernet", ETHERNET_HEADER_LEN, data.len()));
        }

        let mut destination = [0u8; 6];
        let mut source = [0u8; 6];

        destination.copy_from_slice(&data[0..6]);
        source.copy_from_slice(&data[6..12]);
        let ethertype = u16::from_be_bytes([data[12], data[13]]);

        Ok((
            Self::new(MacAddress(destination), MacAddress(source), EtherType::from(ethertype)),
            &data[ETHERNET_HEADER_LEN..],
        ))
    }

    pub fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let mut buffer = BytesMut::with_capacity(ETHERNET_HEADER_LEN + payload.len());
        buffer.put_slice(&self.destination.0);
        buffer.put_slice(&self.source.0);
        buffer.put_u16(self.ethertype.to_u16());
        buffer.put_slice(payload);
        buffer.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::*;

    const DST: MacAddress = MacAddress([0x00, 0x1A, 0x2B, 0x3C, 0x4D, 0x5E]);
    const SRC: MacAddress = MacAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);

    #[test]
    fn test_parse_ethernet_header() {
        let mut frame = vec![];
        frame.extend_from_slice(&DST.0);
        frame.extend_from_slice(&SRC.0);
        frame.extend_from_slice(&[0x08, 0x06, 0xAA]);

        let (header, payload) = EthernetHeader::parse(&frame).unwrap();
        assert_eq!(header.destination, DST);
        assert_eq!(header.source, SRC);
        assert_eq!(header.ethertype, EtherType::Arp);
        assert_eq!(payload, &[0xAA]);
    }

    #[test]
    fn test_parse_short_frame_is_malformed() {
        for len in 0..ETHERNET_HEADER_LEN {
            let err = EthernetHeader::parse(&vec![0u8; len]).unwrap_err();
            assert!(err.is_malformed());
        }
    }

    #[test]
    fn test_encode_is_inverse_of_parse() {
        let header = EthernetHeader::new(DST, SRC, EtherType::Other(0x1234));
        let bytes = header.encode(b"Hello");

        assert_eq!(bytes.len(), ETHERNET_HEADER_LEN + 5);
        assert_eq!(&bytes[12..14], &[0x12, 0x34]);

        let (decoded, payload) = EthernetHeader::parse(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(payload, b"Hello");
    }

    #[test]
    fn test_ethertype_conversion() {
        assert_eq!(EtherType::from(0x0800), EtherType::IPv4);
        assert_eq!(EtherType::from(0x86DD), EtherType::IPv6);
        assert_eq!(EtherType::Other(0x1234).to_u16(), 0x1234);
        assert_eq!(EtherType::Other(0x1234).to_string(), "0x1234");
    }

    #[test]
    fn test_mac_address_from_str() {
        let mac: MacAddress = "00:1A:2B:3C:4D:5E".parse().unwrap();
        assert_eq!(mac, DST);
        assert_eq!(mac.to_string(), "00:1a:2b:3c:4d:5e");

        assert!("00:1A:2B:3C:4D".parse::<MacAddress>().is_err());
        assert!("00:1A:2B:3C:4D:5E:6F".parse::<MacAddress>().is_err());
        assert!("00:1A:2B:3C:4D:ZZ".parse::<MacAddress>().is_err());
        assert!("".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_mac_address_helpers() {
        assert!(MacAddress::BROADCAST.is_broadcast());
        assert!(!DST.is_broadcast());
        assert_eq!(MacAddress::from_slice(&[1, 2, 3, 4, 5, 6]), Some(MacAddress([1, 2, 3, 4, 5, 6])));
        assert_eq!(MacAddress::from_slice(&[1, 2, 3]), None);
    }

    proptest! {
        #[test]
        fn prop_parse_is_inverse_of_encode(
            destination in any::<[u8; 6]>(),
            source in any::<[u8; 6]>(),
            ethertype in any::<u16>(),
            payload in vec(any::<u8>(), 0..128),
        ) {
            let header = EthernetHeader::new(MacAddress(destination), MacAddress(source), EtherType::from(ethertype));
            let frame = header.encode(&payload);

            let (decoded, decoded_payload) = EthernetHeader::parse(&frame).unwrap();
            prop_assert_eq!(decoded, header);
            prop_assert_eq!(decoded.ethertype.to_u16(), ethertype);
            prop_assert_eq!(decoded_payload, &payload[..]);
        }
    }
}
