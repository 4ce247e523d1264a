use super::rules::{FlowFields, RuleTable, Verdict};
use crate::core::error::PacketResult;
use crate::network::packet::ethernet::{EtherType, EthernetHeader};
use crate::network::packet::ipv4::Ipv4HeaderView;
use crate::network::packet::TransportPortView;
use log::{debug, info};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    /// 一致したルールのインデックス
    Rule(usize),
    /// どのルールにも一致せず既定の判定を適用
    NoMatch,
    /// IPv4以外のフレームはフィルタリング対象外
    NonIpv4,
    /// 解析できないフレーム
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    pub reason: MatchReason,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.verdict == Verdict::Allow
    }

    pub fn rule_index(&self) -> Option<usize> {
        match self.reason {
            MatchReason::Rule(index) => Some(index),
            _ => None,
        }
    }
}

/// ルールテーブルによるフレームの分類
///
/// テーブルは読み取り専用なので、クローンしたものを複数スレッドから同時に使える。
#[derive(Debug, Clone)]
pub struct Firewall {
    table: Arc<RuleTable>,
}

impl Firewall {
    pub fn new(table: RuleTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn table(&self) -> &RuleTable {
        &self.table
    }

    /// 先頭から順に評価し、最初に一致したルールの判定を返す
    pub fn classify(&self, fields: &FlowFields) -> Decision {
        let matched = self
            .table
            .rules()
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(fields));

        let decision = match matched {
            Some((index, rule)) => Decision {
                verdict: rule.verdict(),
                reason: MatchReason::Rule(index),
            },
            None => Decision {
                verdict: self.table.default_policy(),
                reason: MatchReason::NoMatch,
            },
        };

        debug!(
            "{} (proto {}, port {}, src {}, {:?})",
            decision.verdict, fields.protocol, fields.destination_port, fields.source, decision.reason
        );
        if decision.verdict == Verdict::Deny {
            info!(
                "パケットを拒否しました: proto {}, port {}, src {}",
                fields.protocol, fields.destination_port, fields.source
            );
        }

        decision
    }

    /// 生のEthernetフレームを分類する
    ///
    /// 解析に失敗したフレームは既定の判定に関係なく拒否する。
    ///
    /// フラグメントは再構築しない。2番目以降のフラグメント (fragment offset > 0) でも
    /// IPヘッダー直後のバイトをTCP/UDPヘッダーとして読むため、ポートは意味を持たない。
    /// VLANタグ付きフレーム (0x8100) はIPv4として扱わず、フィルタリング対象外になる。
    pub fn classify_frame(&self, frame: &[u8]) -> Decision {
        match Self::flow_fields(frame) {
            Ok(Some(fields)) => self.classify(&fields),
            Ok(None) => Decision {
                verdict: Verdict::Allow,
                reason: MatchReason::NonIpv4,
            },
            Err(e) => {
                info!("不正なパケットを拒否しました: {}", e);
                Decision {
                    verdict: Verdict::Deny,
                    reason: MatchReason::Malformed,
                }
            }
        }
    }

    /// IPv4以外は None
    fn flow_fields(frame: &[u8]) -> PacketResult<Option<FlowFields>> {
        let (ethernet, remainder) = EthernetHeader::parse(frame)?;
        if ethernet.ethertype != EtherType::IPv4 {
            return Ok(None);
        }

        let (ipv4, transport_data) = Ipv4HeaderView::parse(remainder)?;
        let transport = TransportPortView::extract(ipv4.protocol, transport_data)?;

        Ok(Some(FlowFields::new(ipv4.protocol, transport.destination_port, ipv4.source)))
    }
}
