use crate::core::error::{AppError, AppResult};
use crate::network::capture::FrameSource;
use crate::network::injection::FrameSink;
use crate::network::packet::icmp::IcmpVersion;
use pnet::packet::icmp::IcmpPacket;
use pnet::packet::icmpv6::Icmpv6Packet;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::Packet;
use pnet::transport::{
    icmp_packet_iter, icmpv6_packet_iter, transport_channel, TransportChannelType, TransportProtocol as Layer4Protocol,
    TransportReceiver, TransportSender,
};
use std::io;
use std::net::IpAddr;
use std::time::Duration;

/// 受信バッファサイズ
const ECHO_BUFFER_SIZE: usize = 4096;

/// ICMP/ICMPv6 メッセージを `destination` に送信する
pub struct EchoSender {
    tx: TransportSender,
    version: IcmpVersion,
    destination: IpAddr,
}

impl FrameSink for EchoSender {
    fn send_frame(&mut self, frame: &[u8]) -> AppResult<()> {
        let sent = match self.version {
            IcmpVersion::V4 => {
                let packet = IcmpPacket::new(frame)
                    .ok_or_else(|| AppError::Injection("ICMPメッセージが短すぎます".to_string()))?;
                self.tx.send_to(packet, self.destination)
            }
            IcmpVersion::V6 => {
                let packet = Icmpv6Packet::new(frame)
                    .ok_or_else(|| AppError::Injection("ICMPv6メッセージが短すぎます".to_string()))?;
                self.tx.send_to(packet, self.destination)
            }
        };

        match sent {
            Ok(_) => Ok(()),
            Err(e) => Err(AppError::Injection(format!(
                "{} への送信に失敗しました: {}",
                self.destination, e
            ))),
        }
    }
}

/// 受信したICMP/ICMPv6 メッセージ (IPヘッダーを除く) を返す
pub struct EchoReceiver {
    rx: TransportReceiver,
    version: IcmpVersion,
    read_timeout: Duration,
    current: Vec<u8>,
}

impl FrameSource for EchoReceiver {
    fn next_frame(&mut self) -> io::Result<Option<&[u8]>> {
        // 受信したメッセージは次の読み取りまで `current` に保持する
        let received = match self.version {
            IcmpVersion::V4 => match icmp_packet_iter(&mut self.rx).next_with_timeout(self.read_timeout)? {
                Some((packet, _)) => {
                    self.current.clear();
                    self.current.extend_from_slice(packet.packet());
                    true
                }
                None => false,
            },
            IcmpVersion::V6 => match icmpv6_packet_iter(&mut self.rx).next_with_timeout(self.read_timeout)? {
                Some((packet, _)) => {
                    self.current.clear();
                    self.current.extend_from_slice(packet.packet());
                    true
                }
                None => false,
            },
        };

        if received {
            Ok(Some(&self.current))
        } else {
            Ok(None)
        }
    }
}

/// `destination` のアドレスファミリーに合わせた raw ソケットを開く
///
/// IPヘッダーはカーネルが付け外しするため、送受信するのはICMPメッセージ部分のみ。
pub fn open_echo_channel(destination: IpAddr, read_timeout: Duration) -> AppResult<(EchoSender, EchoReceiver)> {
    let (version, protocol) = match destination {
        IpAddr::V4(_) => (IcmpVersion::V4, Layer4Protocol::Ipv4(IpNextHeaderProtocols::Icmp)),
        IpAddr::V6(_) => (IcmpVersion::V6, Layer4Protocol::Ipv6(IpNextHeaderProtocols::Icmpv6)),
    };

    let (tx, rx) = transport_channel(ECHO_BUFFER_SIZE, TransportChannelType::Layer4(protocol))?;
    Ok((
        EchoSender {
            tx,
            version,
            destination,
        },
        EchoReceiver {
            rx,
            version,
            read_timeout,
            current: Vec::with_capacity(ECHO_BUFFER_SIZE),
        },
    ))
}
