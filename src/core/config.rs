use crate::core::error::{AppError, AppResult};
use crate::network::builder::DEFAULT_MAX_FRAME_LEN;
use crate::network::packet::ethernet::{EtherType, MacAddress};
use crate::security::firewall::Verdict;
use log::LevelFilter;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::str::FromStr;

/// 実行モード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// 受信フレームをルールテーブルで分類する
    Firewall,
    /// ARPリクエストを送信して応答を待つ
    Arp,
    /// 独自EtherTypeのフレームを送信して同じEtherTypeのフレームを待つ
    Ethernet,
    /// ICMP/ICMPv6 Echo Request を送信して往復時間を測る
    Ping,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "firewall" => Ok(Mode::Firewall),
            "arp" => Ok(Mode::Arp),
            "ethernet" => Ok(Mode::Ethernet),
            "ping" => Ok(Mode::Ping),
            other => Err(format!("未知のモードです: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub mode: Mode,
    pub network: NetworkConfig,
    pub firewall: FirewallConfig,
    pub identity: IdentityConfig,
    pub target: TargetConfig,
    pub ping: PingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// 未設定の場合は対話的に選択する
    pub interface: Option<String>,
    pub max_frame_len: usize,
    pub read_timeout_ms: u64,
    pub receive_max_attempts: usize,
}

#[derive(Debug, Clone)]
pub struct FirewallConfig {
    pub rules_path: Option<PathBuf>,
    /// 設定されていればルールファイルの既定の判定より優先する
    pub default_policy: Option<Verdict>,
}

/// 送信元として名乗るアドレス (未設定ならインターフェースから取得)
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub source_ip: Option<Ipv4Addr>,
    pub source_mac: Option<MacAddress>,
    /// ICMPv6 の疑似ヘッダーに使う送信元
    pub source_ipv6: Option<Ipv6Addr>,
}

#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub target_ip: Option<Ipv4Addr>,
    pub destination_mac: Option<MacAddress>,
    pub payload: String,
    pub ethertype: EtherType,
}

#[derive(Debug, Clone)]
pub struct PingConfig {
    /// IPv4 / IPv6 どちらも指定できる
    pub target: Option<IpAddr>,
    pub count: u16,
    pub interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: LevelFilter,
    pub file: Option<PathBuf>,
}

impl Configuration {
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// `lookup` で取得した値から設定を組み立てる
    pub fn from_vars<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Configuration {
            mode: parse_or(&get, "MODE", Mode::Firewall)?,
            network: NetworkConfig {
                interface: get("NETWORK_INTERFACE"),
                max_frame_len: parse_or(&get, "MAX_FRAME_LEN", DEFAULT_MAX_FRAME_LEN)?,
                read_timeout_ms: parse_or(&get, "READ_TIMEOUT_MS", 1000)?,
                receive_max_attempts: parse_or(&get, "RECEIVE_MAX_ATTEMPTS", 32)?,
            },
            firewall: FirewallConfig {
                rules_path: get("FIREWALL_RULES_PATH").map(PathBuf::from),
                default_policy: get("FIREWALL_DEFAULT_POLICY")
                    .map(|value| parse_policy(&value))
                    .transpose()?,
            },
            identity: IdentityConfig {
                source_ip: parse_optional(&get, "SOURCE_IP")?,
                source_mac: parse_optional(&get, "SOURCE_MAC")?,
                source_ipv6: parse_optional(&get, "SOURCE_IPV6")?,
            },
            target: TargetConfig {
                target_ip: parse_optional(&get, "TARGET_IP")?,
                destination_mac: parse_optional(&get, "DESTINATION_MAC")?,
                payload: get("PAYLOAD").unwrap_or_else(|| "Hello".to_string()),
                ethertype: match get("CUSTOM_ETHERTYPE") {
                    None => EtherType::Other(0x1234),
                    Some(value) => EtherType::from(parse_hex_u16("CUSTOM_ETHERTYPE", &value)?),
                },
            },
            ping: PingConfig {
                target: parse_optional(&get, "PING_TARGET")?,
                count: parse_or(&get, "PING_COUNT", 4)?,
                interval_ms: parse_or(&get, "PING_INTERVAL_MS", 1000)?,
            },
            logging: LoggingConfig {
                level: parse_or(&get, "LOG_LEVEL", LevelFilter::Info)?,
                file: get("LOG_FILE").map(PathBuf::from),
            },
        })
    }

    #[cfg(test)]
    pub fn for_testing() -> Self {
        Self::from_vars(|_| None).expect("既定値の設定は常に有効")
    }
}

fn parse_optional<G, T>(get: &G, key: &str) -> AppResult<Option<T>>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| AppError::Config(format!("{} の値が不正です ({}): {}", key, value, e)))
        })
        .transpose()
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> AppResult<T>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_optional(get, key)?.unwrap_or(default))
}

fn parse_policy(value: &str) -> AppResult<Verdict> {
    match value.trim().to_ascii_lowercase().as_str() {
        "allow" => Ok(Verdict::Allow),
        "deny" => Ok(Verdict::Deny),
        other => Err(AppError::Config(format!(
            "FIREWALL_DEFAULT_POLICY は allow か deny を指定してください: {}",
            other
        ))),
    }
}

// "0x1234" / "1234" (16進数)
fn parse_hex_u16(key: &str, value: &str) -> AppResult<u16> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u16::from_str_radix(digits, 16).map_err(|e| AppError::Config(format!("{} の値が不正です ({}): {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> AppResult<Configuration> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Configuration::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = Configuration::for_testing();

        assert_eq!(config.mode, Mode::Firewall);
        assert_eq!(config.network.interface, None);
        assert_eq!(config.network.max_frame_len, 1514);
        assert_eq!(config.network.read_timeout_ms, 1000);
        assert_eq!(config.network.receive_max_attempts, 32);
        assert_eq!(config.firewall.rules_path, None);
        assert_eq!(config.firewall.default_policy, None);
        assert_eq!(config.target.payload, "Hello");
        assert_eq!(config.target.ethertype, EtherType::Other(0x1234));
        assert_eq!(config.ping.target, None);
        assert_eq!(config.ping.count, 4);
        assert_eq!(config.ping.interval_ms, 1000);
        assert_eq!(config.logging.level, LevelFilter::Info);
    }

    #[test]
    fn test_values_from_vars() {
        let config = config_from(&[
            ("MODE", "arp"),
            ("NETWORK_INTERFACE", "eth0"),
            ("MAX_FRAME_LEN", "1500"),
            ("RECEIVE_MAX_ATTEMPTS", "5"),
            ("FIREWALL_RULES_PATH", "/etc/netkernel/rules.json"),
            ("FIREWALL_DEFAULT_POLICY", "Deny"),
            ("SOURCE_IP", "192.168.1.100"),
            ("SOURCE_MAC", "02:11:22:33:44:55"),
            ("TARGET_IP", "192.168.1.1"),
            ("CUSTOM_ETHERTYPE", "0x88B5"),
            ("LOG_LEVEL", "debug"),
        ])
        .unwrap();

        assert_eq!(config.mode, Mode::Arp);
        assert_eq!(config.network.interface.as_deref(), Some("eth0"));
        assert_eq!(config.network.max_frame_len, 1500);
        assert_eq!(config.network.receive_max_attempts, 5);
        assert_eq!(config.firewall.rules_path, Some(PathBuf::from("/etc/netkernel/rules.json")));
        assert_eq!(config.firewall.default_policy, Some(Verdict::Deny));
        assert_eq!(config.identity.source_ip, Some(Ipv4Addr::new(192, 168, 1, 100)));
        assert_eq!(config.identity.source_mac, Some(MacAddress([0x02, 0x11, 0x22, 0x33, 0x44, 0x55])));
        assert_eq!(config.target.target_ip, Some(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(config.target.ethertype, EtherType::Other(0x88B5));
        assert_eq!(config.logging.level, LevelFilter::Debug);
    }

    #[test]
    fn test_ping_values_from_vars() {
        let config = config_from(&[
            ("MODE", "Ping"),
            ("PING_TARGET", "2001:db8::1"),
            ("PING_COUNT", "10"),
            ("PING_INTERVAL_MS", "200"),
            ("SOURCE_IPV6", "fe80::1"),
        ])
        .unwrap();

        assert_eq!(config.mode, Mode::Ping);
        assert_eq!(config.ping.target, Some(IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1))));
        assert_eq!(config.ping.count, 10);
        assert_eq!(config.ping.interval_ms, 200);
        assert_eq!(config.identity.source_ipv6, Some(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1)));

        let config = config_from(&[("PING_TARGET", "192.168.1.1")]).unwrap();
        assert_eq!(config.ping.target, Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = config_from(&[("NETWORK_INTERFACE", "  "), ("SOURCE_IP", "")]).unwrap();
        assert_eq!(config.network.interface, None);
        assert_eq!(config.identity.source_ip, None);
    }

    #[test]
    fn test_invalid_values_name_the_variable() {
        for (key, value) in [
            ("MODE", "bridge"),
            ("MAX_FRAME_LEN", "big"),
            ("FIREWALL_DEFAULT_POLICY", "maybe"),
            ("SOURCE_IP", "300.1.1.1"),
            ("SOURCE_MAC", "02:11:22"),
            ("CUSTOM_ETHERTYPE", "0xZZZZ"),
            ("PING_TARGET", "example"),
            ("PING_COUNT", "70000"),
        ] {
            match config_from(&[(key, value)]) {
                Err(AppError::Config(message)) => assert!(message.contains(key), "{}", message),
                other => panic!("{} = {} should fail: {:?}", key, value, other.map(|c| c.mode)),
            }
        }
    }
}
