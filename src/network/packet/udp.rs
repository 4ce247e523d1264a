use crate::core::error::{PacketError, PacketResult};

pub const UDP_HEADER_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub length: u16,
    pub checksum: u16,
}

impl UdpHeader {
    pub fn parse(data: &[u8]) -> PacketResult<(Self, &[u8])> {
        if data.len() < UDP_HEADER_LEN {
            return Err(PacketError::truncated("UDP", UDP_HEADER_LEN, data.len()));
        }

        let source_port = u16::from_be_bytes([data[0], data[1]]);
        let destination_port = u16::from_be_bytes([data[2], data[3]]);
        let length = u16::from_be_bytes([data[4], data[5]]);
        let checksum = u16::from_be_bytes([data[6], data[7]]);

        Ok((
            Self {
                source_port,
                destination_port,
                length,
                checksum,
            },
            &data[UDP_HEADER_LEN..],
        ))
    }
}
