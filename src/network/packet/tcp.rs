use crate::core::error::{PacketError, PacketResult};

pub const TCP_MIN_HEADER_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpFlags {
    pub urg: bool,
    pub ack: bool,
    pub psh: bool,
    pub rst: bool,
    pub syn: bool,
    pub fin: bool,
}

impl From<u8> for TcpFlags {
    fn from(bits: u8) -> Self {
        Self {
            urg: (bits & 0x20) != 0,
            ack: (bits & 0x10) != 0,
            psh: (bits & 0x08) != 0,
            rst: (bits & 0x04) != 0,
            syn: (bits & 0x02) != 0,
            fin: (bits & 0x01) != 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence_number: u32,
    pub acknowledgment_number: u32,
    pub data_offset: u8,
    pub flags: TcpFlags,
    pub window_size: u16,
}

impl TcpHeader {
    pub fn parse(data: &[u8]) -> PacketResult<(Self, &[u8])> {
        if data.len() < TCP_MIN_HEADER_LEN {
            return Err(PacketError::truncated("TCP", TCP_MIN_HEADER_LEN, data.len()));
        }

        let data_offset = (data[12] >> 4) & 0xf;
        if data_offset < 5 {
            return Err(PacketError::Malformed {
                header: "TCP",
                reason: format!("データオフセットが範囲外です: {}", data_offset),
            });
        }

        let header_len = data_offset as usize * 4;
        let payload = data
            .get(header_len..)
            .ok_or_else(|| PacketError::truncated("TCP", header_len, data.len()))?;

        Ok((
            Self {
                source_port: u16::from_be_bytes([data[0], data[1]]),
                destination_port: u16::from_be_bytes([data[2], data[3]]),
                sequence_number: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
                acknowledgment_number: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
                data_offset,
                flags: TcpFlags::from(data[13]),
                window_size: u16::from_be_bytes([data[14], data[15]]),
            },
            payload,
        ))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn tcp_header(source_port: u16, destination_port: u16) -> Vec<u8> {
        let mut header = vec![];
        header.extend_from_slice(&source_port.to_be_bytes());
        header.extend_from_slice(&destination_port.to_be_bytes());
        header.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0, 0x50, 0x02, 0xFF, 0xFF, 0, 0, 0, 0]);
        header
    }

    #[test]
    fn test_parse_tcp_header() {
        let mut data = tcp_header(54321, 80);
        data.extend_from_slice(b"GET");

        let (header, payload) = TcpHeader::parse(&data).unwrap();
        assert_eq!(header.source_port, 54321);
        assert_eq!(header.destination_port, 80);
        assert_eq!(header.sequence_number, 1);
        assert_eq!(header.data_offset, 5);
        assert!(header.flags.syn);
        assert!(!header.flags.ack);
        assert_eq!(header.window_size, 0xFFFF);
        assert_eq!(payload, b"GET");
    }

    #[test]
    fn test_parse_short_tcp_header() {
        let data = tcp_header(1, 2);
        assert!(TcpHeader::parse(&data[..19]).unwrap_err().is_malformed());
    }

    #[test]
    fn test_parse_rejects_bad_data_offset() {
        let mut data = tcp_header(1, 2);
        data[12] = 0x40;
        assert!(TcpHeader::parse(&data).unwrap_err().is_malformed());

        data[12] = 0xF0;
        assert!(TcpHeader::parse(&data).unwrap_err().is_malformed());
    }
}
