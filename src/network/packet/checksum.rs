//! RFC 1071 の1の補数チェックサム
//!
//! ICMPv6 ではIPv6疑似ヘッダーを先頭に付けて計算する。

use std::net::Ipv6Addr;

/// ICMP/ICMPv6 のチェックサムフィールドのオフセット
pub const ICMP_CHECKSUM_OFFSET: usize = 2;

pub const IPV6_PSEUDO_HEADER_LEN: usize = 40;

/// ICMPv6 の疑似ヘッダー
///
/// source(16) || destination(16) || upper-layer length(4) || zero(3) || next header(1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6PseudoHeader {
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
    pub upper_layer_length: u32,
    pub next_header: u8,
}

impl Ipv6PseudoHeader {
    pub fn new(source: Ipv6Addr, destination: Ipv6Addr, upper_layer_length: u32, next_header: u8) -> Self {
        Self {
            source,
            destination,
            upper_layer_length,
            next_header,
        }
    }

    pub fn to_bytes(&self) -> [u8; IPV6_PSEUDO_HEADER_LEN] {
        let mut bytes = [0u8; IPV6_PSEUDO_HEADER_LEN];
        bytes[0..16].copy_from_slice(&self.source.octets());
        bytes[16..32].copy_from_slice(&self.destination.octets());
        bytes[32..36].copy_from_slice(&self.upper_layer_length.to_be_bytes());
        // 36..39 はゼロ
        bytes[39] = self.next_header;
        bytes
    }
}

fn accumulate(sum: u64, data: &[u8]) -> u64 {
    let mut sum = sum;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u64;
    }

    // 奇数長の場合、最後のバイトを上位バイトとしてゼロ埋めする
    if let Some(&byte) = chunks.remainder().first() {
        sum += (byte as u64) << 8;
    }

    sum
}

fn fold(sum: u64) -> u16 {
    let mut sum = sum;
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}

/// `pseudo_header`(あれば) と `data` の16ビットワードを合計し、1の補数を返す
pub fn compute(data: &[u8], pseudo_header: Option<&Ipv6PseudoHeader>) -> u16 {
    let mut sum = 0u64;
    if let Some(pseudo) = pseudo_header {
        sum = accumulate(sum, &pseudo.to_bytes());
    }
    sum = accumulate(sum, data);

    !fold(sum)
}

/// `offset` にあるチェックサムフィールドをゼロにして再計算し、元の値と比較する
///
/// バッファがフィールドを含まない長さの場合は false。
pub fn verify_at(data: &[u8], offset: usize, pseudo_header: Option<&Ipv6PseudoHeader>) -> bool {
    let Some(field) = data.get(offset..offset + 2) else {
        return false;
    };
    let stored = u16::from_be_bytes([field[0], field[1]]);

    let mut zeroed = data.to_vec();
    zeroed[offset] = 0;
    zeroed[offset + 1] = 0;

    compute(&zeroed, pseudo_header) == stored
}

/// ICMP/ICMPv6 メッセージのチェックサムを検証する
pub fn verify(data: &[u8], pseudo_header: Option<&Ipv6PseudoHeader>) -> bool {
    verify_at(data, ICMP_CHECKSUM_OFFSET, pseudo_header)
}
