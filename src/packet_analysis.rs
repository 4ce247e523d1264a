use crate::core::error::AppResult;
use crate::network::builder::{EchoAddressing, FrameBuilder};
use crate::network::capture::{receive_until, FrameSource};
use crate::network::injection::FrameSink;
use crate::network::packet::arp::ArpPacket;
use crate::network::packet::checksum::Ipv6PseudoHeader;
use crate::network::packet::ethernet::{EtherType, EthernetHeader, MacAddress};
use crate::network::packet::icmp::{IcmpEchoMessage, IcmpVersion};
use crate::network::packet::ipv6::NEXT_HEADER_ICMPV6;
use crate::security::firewall::{Decision, Firewall, MatchReason, Verdict};
use log::{debug, info, warn};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// 読み取りエラー後の待機時間
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirewallStats {
    pub allowed: u64,
    pub denied: u64,
    /// 解析できずに拒否したフレーム (denied とは別に数える)
    pub malformed: u64,
    /// IPv4以外で分類対象外のフレーム
    pub bypassed: u64,
}

impl FirewallStats {
    fn record(&mut self, decision: &Decision) {
        match (decision.reason, decision.verdict) {
            (MatchReason::Malformed, _) => self.malformed += 1,
            (MatchReason::NonIpv4, _) => self.bypassed += 1,
            (_, Verdict::Allow) => self.allowed += 1,
            (_, Verdict::Deny) => self.denied += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.allowed + self.denied + self.malformed + self.bypassed
    }
}

pub fn filter_frame(firewall: &Firewall, frame: &[u8], stats: &mut FirewallStats) -> Decision {
    let decision = firewall.classify_frame(frame);
    stats.record(&decision);
    decision
}

/// `running` が false になるまで受信フレームを分類し続ける
pub fn run_firewall<S>(source: &mut S, firewall: &Firewall, running: &AtomicBool) -> FirewallStats
where
    S: FrameSource + ?Sized,
{
    let mut stats = FirewallStats::default();
    info!("ファイアウォールを開始しました (ルール数: {})", firewall.table().rules().len());

    while running.load(Ordering::Relaxed) {
        match source.next_frame() {
            Ok(Some(frame)) => {
                filter_frame(firewall, frame, &mut stats);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("パケットの読み取り中にエラーが発生しました: {}", e);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    info!(
        "ファイアウォールを停止しました: 許可 {}, 拒否 {}, 不正 {}, 対象外 {}",
        stats.allowed, stats.denied, stats.malformed, stats.bypassed
    );
    stats
}

/// ARPリクエストを送信し、`target_ip` からの応答の送信元MACを返す
pub fn resolve_arp<S, K>(
    source: &mut S,
    sink: &mut K,
    builder: &FrameBuilder,
    (source_mac, source_ip): (MacAddress, Ipv4Addr),
    target_ip: Ipv4Addr,
    max_attempts: usize,
) -> AppResult<Option<MacAddress>>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    let frame = builder.build_arp_request_frame(source_mac, source_ip, target_ip)?;
    sink.send_frame(&frame)?;
    info!("ARPリクエストを送信しました: {} は誰ですか ({} より)", target_ip, source_ip);

    let resolved = receive_until(source, max_attempts, |frame| {
        let (ethernet, payload) = EthernetHeader::parse(frame).ok()?;
        if ethernet.ethertype != EtherType::Arp {
            return None;
        }
        match ArpPacket::parse(payload) {
            Ok(arp) if arp.is_reply_from(target_ip) => Some(arp.sender_mac),
            Ok(_) => None,
            Err(e) => {
                debug!("ARPパケットを無視しました: {}", e);
                None
            }
        }
    })?;

    match resolved {
        Some(mac) => info!("ARP応答を受信しました: {} は {} です", target_ip, mac),
        None => warn!("{} からのARP応答がありませんでした", target_ip),
    }
    Ok(resolved)
}

/// 受信したフレームの送信元とペイロード
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub source: MacAddress,
    pub payload: Vec<u8>,
}

/// 指定したEtherTypeのフレームを送信し、同じEtherTypeのフレームを待つ
///
/// 自分が送信元のフレームは応答として扱わない。
pub fn exchange_ethernet<S, K>(
    source: &mut S,
    sink: &mut K,
    builder: &FrameBuilder,
    header: EthernetHeader,
    payload: &[u8],
    max_attempts: usize,
) -> AppResult<Option<ReceivedFrame>>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    let frame = builder.build_ethernet_frame(header.destination, header.source, header.ethertype, payload)?;
    sink.send_frame(&frame)?;
    info!(
        "フレームを送信しました: {} -> {} (EtherType {}, {} バイト)",
        header.source,
        header.destination,
        header.ethertype,
        frame.len()
    );

    let received = receive_until(source, max_attempts, |frame| {
        let (ethernet, data) = EthernetHeader::parse(frame).ok()?;
        (ethernet.ethertype == header.ethertype && ethernet.source != header.source).then(|| ReceivedFrame {
            source: ethernet.source,
            payload: data.to_vec(),
        })
    })?;

    match &received {
        Some(frame) => info!("{} からフレームを受信しました ({} バイト)", frame.source, frame.payload.len()),
        None => warn!("EtherType {} のフレームを受信できませんでした", header.ethertype),
    }
    Ok(received)
}

/// Echo Request のペイロード長
pub const PING_PAYLOAD_LEN: usize = 56;

#[derive(Debug, Clone)]
pub struct PingOptions {
    pub identifier: u16,
    pub count: u16,
    /// 送信間隔 (最後の送信後は待たない)
    pub interval: Duration,
    /// 1回の Echo Request あたりの最大受信回数
    pub max_attempts: usize,
    pub payload: Vec<u8>,
}

impl PingOptions {
    pub fn new(identifier: u16, count: u16) -> Self {
        Self {
            identifier,
            count,
            interval: Duration::from_secs(1),
            max_attempts: 32,
            payload: vec![b'A'; PING_PAYLOAD_LEN],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PingStats {
    /// 送信に成功した Echo Request の数
    pub transmitted: u16,
    pub received: u16,
    /// チェックサム不一致で破棄した応答
    pub checksum_errors: u64,
    pub round_trips: Vec<Duration>,
}

impl PingStats {
    pub fn loss_percent(&self) -> f64 {
        if self.transmitted == 0 {
            return 0.0;
        }
        f64::from(self.transmitted - self.received) * 100.0 / f64::from(self.transmitted)
    }

    pub fn min_rtt(&self) -> Option<Duration> {
        self.round_trips.iter().min().copied()
    }

    pub fn max_rtt(&self) -> Option<Duration> {
        self.round_trips.iter().max().copied()
    }

    pub fn avg_rtt(&self) -> Option<Duration> {
        let count = u32::try_from(self.round_trips.len()).ok().filter(|count| *count > 0)?;
        Some(self.round_trips.iter().sum::<Duration>() / count)
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Echo Request を `options.count` 回送信し、応答の往復時間を集計する
///
/// `source` と `sink` はIPヘッダーを含まないICMPメッセージを扱う。
/// 識別子とシーケンス番号が一致し、チェックサムが正しい応答だけを数える。
/// 送信に失敗したリクエストは送信数に含めずに次へ進む。
pub fn ping<S, K>(
    source: &mut S,
    sink: &mut K,
    builder: &FrameBuilder,
    addressing: EchoAddressing,
    options: &PingOptions,
) -> AppResult<PingStats>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    let version = match addressing {
        EchoAddressing::V4 => IcmpVersion::V4,
        EchoAddressing::V6 { .. } => IcmpVersion::V6,
    };
    // 応答の疑似ヘッダーは送信元と宛先が逆になる
    let reply_addresses = match addressing {
        EchoAddressing::V4 => None,
        EchoAddressing::V6 { source, destination } => Some((destination, source)),
    };

    let mut stats = PingStats::default();
    for sequence in 1..=options.count {
        if sequence > 1 {
            thread::sleep(options.interval);
        }

        let request = builder.build_icmp_echo_frame(options.identifier, sequence, &options.payload, addressing)?;
        if let Err(e) = sink.send_frame(&request) {
            warn!("Echo Request の送信に失敗しました (icmp_seq={}): {}", sequence, e);
            continue;
        }
        stats.transmitted += 1;
        let sent_at = Instant::now();

        let mut checksum_errors = 0;
        let reply = receive_until(source, options.max_attempts, |message| {
            let reply = IcmpEchoMessage::parse(message, version).ok()?;
            if !reply.is_reply_to(version, options.identifier, sequence) {
                return None;
            }

            let pseudo_header = reply_addresses
                .map(|(from, to)| Ipv6PseudoHeader::new(from, to, message.len() as u32, NEXT_HEADER_ICMPV6));
            match reply.verify(pseudo_header.as_ref()) {
                Ok(()) => Some(reply),
                Err(e) => {
                    warn!("応答を破棄しました (icmp_seq={}): {}", sequence, e);
                    checksum_errors += 1;
                    None
                }
            }
        })?;
        stats.checksum_errors += checksum_errors;

        match reply {
            Some(reply) => {
                let round_trip = sent_at.elapsed();
                stats.received += 1;
                stats.round_trips.push(round_trip);
                info!(
                    "{} バイトの応答: icmp_seq={} time={:.3} ms",
                    reply.encoded_len(),
                    sequence,
                    millis(round_trip)
                );
            }
            None => warn!("応答がありませんでした: icmp_seq={}", sequence),
        }
    }

    info!(
        "{} 送信, {} 受信, {:.1}% 損失",
        stats.transmitted,
        stats.received,
        stats.loss_percent()
    );
    if let (Some(min), Some(avg), Some(max)) = (stats.min_rtt(), stats.avg_rtt(), stats.max_rtt()) {
        info!(
            "rtt min/avg/max = {:.3}/{:.3}/{:.3} ms",
            millis(min),
            millis(avg),
            millis(max)
        );
    }
    Ok(stats)
}
