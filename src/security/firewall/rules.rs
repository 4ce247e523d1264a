use crate::core::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;

pub const ANY_PROTOCOL: u8 = 0;
pub const ANY_PORT: u16 = 0;
pub const ANY_SOURCE: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    #[default]
    Allow,
    Deny,
}

impl From<bool> for Verdict {
    fn from(allow: bool) -> Self {
        if allow {
            Verdict::Allow
        } else {
            Verdict::Deny
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allow => write!(f, "許可"),
            Verdict::Deny => write!(f, "拒否"),
        }
    }
}

/// ルール照合に使うフレームの値
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowFields {
    pub protocol: u8,
    pub destination_port: u16,
    pub source: Ipv4Addr,
}

impl FlowFields {
    pub fn new(protocol: u8, destination_port: u16, source: Ipv4Addr) -> Self {
        Self {
            protocol,
            destination_port,
            source,
        }
    }
}

fn any_source() -> Ipv4Addr {
    ANY_SOURCE
}

/// 値が0 (0.0.0.0) のフィールドはワイルドカード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    #[serde(default)]
    pub protocol: u8,
    #[serde(default)]
    pub port: u16,
    #[serde(default = "any_source")]
    pub source: Ipv4Addr,
    pub allow: bool,
}

impl FirewallRule {
    pub fn new(protocol: u8, port: u16, source: Ipv4Addr, allow: bool) -> Self {
        Self {
            protocol,
            port,
            source,
            allow,
        }
    }

    pub fn matches(&self, fields: &FlowFields) -> bool {
        (self.protocol == ANY_PROTOCOL || self.protocol == fields.protocol)
            && (self.port == ANY_PORT || self.port == fields.destination_port)
            && (self.source == ANY_SOURCE || self.source == fields.source)
    }

    pub fn verdict(&self) -> Verdict {
        Verdict::from(self.allow)
    }
}

/// 順序付きのルール列と、どのルールにも一致しなかった場合の既定の判定
///
/// 構築後は変更しない。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleTable {
    #[serde(default)]
    default_policy: Verdict,
    #[serde(default)]
    rules: Vec<FirewallRule>,
}

impl RuleTable {
    pub fn new(rules: Vec<FirewallRule>, default_policy: Verdict) -> Self {
        Self { default_policy, rules }
    }

    pub fn rules(&self) -> &[FirewallRule] {
        &self.rules
    }

    pub fn default_policy(&self) -> Verdict {
        self.default_policy
    }

    /// 既定の判定だけを差し替えたテーブルを返す
    pub fn with_default_policy(self, default_policy: Verdict) -> Self {
        Self { default_policy, ..self }
    }

    pub fn from_json(json: &str) -> AppResult<Self> {
        serde_json::from_str(json).map_err(|e| AppError::RuleTable(e.to_string()))
    }

    pub fn load(path: &Path) -> AppResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| AppError::RuleTable(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::packet::ipv4::{PROTOCOL_ICMP, PROTOCOL_TCP, PROTOCOL_UDP};

    #[test]
    fn test_rule_wildcards() {
        let fields = FlowFields::new(PROTOCOL_TCP, 80, Ipv4Addr::new(10, 0, 0, 1));

        assert!(FirewallRule::new(ANY_PROTOCOL, ANY_PORT, ANY_SOURCE, true).matches(&fields));
        assert!(FirewallRule::new(PROTOCOL_TCP, 80, ANY_SOURCE, true).matches(&fields));
        assert!(FirewallRule::new(PROTOCOL_TCP, 80, Ipv4Addr::new(10, 0, 0, 1), true).matches(&fields));
        assert!(!FirewallRule::new(PROTOCOL_UDP, ANY_PORT, ANY_SOURCE, true).matches(&fields));
        assert!(!FirewallRule::new(PROTOCOL_TCP, 443, ANY_SOURCE, true).matches(&fields));
        assert!(!FirewallRule::new(ANY_PROTOCOL, ANY_PORT, Ipv4Addr::new(10, 0, 0, 2), true).matches(&fields));
    }

    #[test]
    fn test_rule_verdict() {
        assert_eq!(FirewallRule::new(PROTOCOL_ICMP, 0, ANY_SOURCE, false).verdict(), Verdict::Deny);
        assert_eq!(FirewallRule::new(PROTOCOL_ICMP, 0, ANY_SOURCE, true).verdict(), Verdict::Allow);
    }

    #[test]
    fn test_rule_table_from_json() {
        let json = r#"{
            "default_policy": "deny",
            "rules": [
                { "protocol": 6, "port": 80, "allow": true },
                { "protocol": 1, "allow": false },
                { "protocol": 17, "port": 53, "source": "192.168.1.53", "allow": true }
            ]
        }"#;

        let table = RuleTable::from_json(json).unwrap();
        assert_eq!(table.default_policy(), Verdict::Deny);
        assert_eq!(
            table.rules(),
            &[
                FirewallRule::new(PROTOCOL_TCP, 80, ANY_SOURCE, true),
                FirewallRule::new(PROTOCOL_ICMP, ANY_PORT, ANY_SOURCE, false),
                FirewallRule::new(PROTOCOL_UDP, 53, Ipv4Addr::new(192, 168, 1, 53), true),
            ]
        );
    }

    #[test]
    fn test_rule_table_defaults_to_allow() {
        let table = RuleTable::from_json(r#"{ "rules": [] }"#).unwrap();
        assert_eq!(table.default_policy(), Verdict::Allow);
        assert_eq!(RuleTable::default().default_policy(), Verdict::Allow);

        let table = table.with_default_policy(Verdict::Deny);
        assert_eq!(table.default_policy(), Verdict::Deny);
    }

    #[test]
    fn test_rule_table_rejects_invalid_json() {
        assert!(matches!(RuleTable::from_json("{ rules: "), Err(AppError::RuleTable(_))));
        assert!(RuleTable::from_json(r#"{ "rules": [ { "protocol": 6 } ] }"#).is_err());
        assert!(RuleTable::from_json(r#"{ "default_policy": "maybe" }"#).is_err());
    }

    #[test]
    fn test_rule_table_load_missing_file() {
        let result = RuleTable::load(Path::new("/nonexistent/netkernel-rules.json"));
        assert!(matches!(result, Err(AppError::RuleTable(_))));
    }

    #[test]
    fn test_rule_table_load_file() {
        let path = std::env::temp_dir().join(format!("netkernel-rules-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "rules": [ { "protocol": 6, "port": 22, "allow": false } ] }"#).unwrap();

        let table = RuleTable::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(table.rules().len(), 1);
        assert!(!table.rules()[0].allow);
    }
}
