use log::{error, info, warn};
use netkernel::core::config::{Configuration, Mode};
use netkernel::core::error::AppError;
use netkernel::network::packet::ethernet::{EthernetHeader, MacAddress};
use netkernel::network::builder::EchoAddressing;
use netkernel::network::{open_echo_channel, open_ethernet_channel, FrameBuilder, PacketCapture, PacketInjector};
use netkernel::packet_analysis::{exchange_ethernet, ping, resolve_arp, run_firewall, PingOptions};
use netkernel::security::firewall::RuleTable;
use netkernel::security::Firewall;
use netkernel::select_device::{interface_ipv4, interface_ipv6, interface_mac, select_device};
use netkernel::setup_logger::setup_logger;
use pnet::datalink::NetworkInterface;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Configuration::from_env()?;
    setup_logger(&config.logging)?;

    // デバイスの選択
    let interface = select_device(config.network.interface.as_deref())?;
    info!("デバイスの選択に成功しました: {}", interface.name);

    let result = match config.mode {
        Mode::Firewall => firewall_mode(&config, &interface).await,
        Mode::Arp => arp_mode(&config, &interface).await,
        Mode::Ethernet => ethernet_mode(&config, &interface).await,
        Mode::Ping => ping_mode(&config, &interface).await,
    };

    if let Err(e) = &result {
        error!("処理に失敗しました: {}", e);
    }
    result
}

fn open_channel(config: &Configuration, interface: &NetworkInterface) -> Result<(PacketInjector, PacketCapture), AppError> {
    open_ethernet_channel(interface, Duration::from_millis(config.network.read_timeout_ms))
}

fn load_rule_table(config: &Configuration) -> Result<RuleTable, AppError> {
    let table = match &config.firewall.rules_path {
        Some(path) => {
            let table = RuleTable::load(path)?;
            info!("ルールテーブルを読み込みました: {} ({} 件)", path.display(), table.rules().len());
            table
        }
        None => {
            warn!("FIREWALL_RULES_PATH が設定されていないため、ルールなしで起動します");
            RuleTable::default()
        }
    };

    Ok(match config.firewall.default_policy {
        Some(policy) => table.with_default_policy(policy),
        None => table,
    })
}

async fn firewall_mode(config: &Configuration, interface: &NetworkInterface) -> Result<(), AppError> {
    let (_, mut capture) = open_channel(config, interface)?;
    let firewall = Firewall::new(load_rule_table(config)?);
    info!("既定の判定: {}", firewall.table().default_policy());

    let running = Arc::new(AtomicBool::new(true));
    let worker = {
        let running = Arc::clone(&running);
        task::spawn_blocking(move || run_firewall(&mut capture, &firewall, &running))
    };

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::Task(format!("シグナルの待機に失敗しました: {}", e)))?;
    info!("停止要求を受け取りました");
    running.store(false, Ordering::Relaxed);

    let stats = worker.await.map_err(|e| AppError::Task(e.to_string()))?;
    info!("処理したフレーム数: {}", stats.total());
    Ok(())
}

/// 設定値がなければインターフェースのアドレスを使う
fn source_mac(config: &Configuration, interface: &NetworkInterface) -> Result<MacAddress, AppError> {
    config
        .identity
        .source_mac
        .or_else(|| interface_mac(interface))
        .ok_or_else(|| AppError::Config("SOURCE_MAC を特定できません".to_string()))
}

fn source_ipv6(config: &Configuration, interface: &NetworkInterface) -> Result<Ipv6Addr, AppError> {
    config
        .identity
        .source_ipv6
        .or_else(|| interface_ipv6(interface))
        .ok_or_else(|| AppError::Config("SOURCE_IPV6 を特定できません".to_string()))
}

fn source_ip(config: &Configuration, interface: &NetworkInterface) -> Result<Ipv4Addr, AppError> {
    config
        .identity
        .source_ip
        .or_else(|| interface_ipv4(interface))
        .ok_or_else(|| AppError::Config("SOURCE_IP を特定できません".to_string()))
}

async fn arp_mode(config: &Configuration, interface: &NetworkInterface) -> Result<(), AppError> {
    let (mut injector, mut capture) = open_channel(config, interface)?;
    let source = (source_mac(config, interface)?, source_ip(config, interface)?);
    let target_ip = config
        .target
        .target_ip
        .ok_or_else(|| AppError::Config("TARGET_IP が設定されていません".to_string()))?;
    let builder = FrameBuilder::new(config.network.max_frame_len);
    let max_attempts = config.network.receive_max_attempts;

    let resolved = task::spawn_blocking(move || {
        resolve_arp(&mut capture, &mut injector, &builder, source, target_ip, max_attempts)
    })
    .await
    .map_err(|e| AppError::Task(e.to_string()))??;

    match resolved {
        Some(mac) => println!("{} is at {}", target_ip, mac),
        None => println!("{} からの応答がありませんでした", target_ip),
    }
    Ok(())
}

async fn ethernet_mode(config: &Configuration, interface: &NetworkInterface) -> Result<(), AppError> {
    let (mut injector, mut capture) = open_channel(config, interface)?;
    let destination = config.target.destination_mac.unwrap_or(MacAddress::BROADCAST);
    let header = EthernetHeader::new(destination, source_mac(config, interface)?, config.target.ethertype);
    let payload = config.target.payload.clone().into_bytes();
    let builder = FrameBuilder::new(config.network.max_frame_len);
    let max_attempts = config.network.receive_max_attempts;

    let received = task::spawn_blocking(move || {
        exchange_ethernet(&mut capture, &mut injector, &builder, header, &payload, max_attempts)
    })
    .await
    .map_err(|e| AppError::Task(e.to_string()))??;

    match received {
        Some(frame) => println!(
            "{} からフレームを受信しました: {}",
            frame.source,
            String::from_utf8_lossy(&frame.payload)
        ),
        None => println!("応答フレームを受信できませんでした"),
    }
    Ok(())
}

async fn ping_mode(config: &Configuration, interface: &NetworkInterface) -> Result<(), AppError> {
    let target = config
        .ping
        .target
        .ok_or_else(|| AppError::Config("PING_TARGET が設定されていません".to_string()))?;
    // ICMPv6 のチェックサムには送信元アドレスが必要
    let addressing = match target {
        IpAddr::V4(_) => EchoAddressing::V4,
        IpAddr::V6(destination) => EchoAddressing::V6 {
            source: source_ipv6(config, interface)?,
            destination,
        },
    };

    let (mut sender, mut receiver) =
        open_echo_channel(target, Duration::from_millis(config.network.read_timeout_ms))?;
    let builder = FrameBuilder::new(config.network.max_frame_len);
    let options = PingOptions {
        interval: Duration::from_millis(config.ping.interval_ms),
        max_attempts: config.network.receive_max_attempts,
        ..PingOptions::new(std::process::id() as u16, config.ping.count)
    };
    println!("PING {}: {} バイトのデータ", target, options.payload.len());

    let stats = task::spawn_blocking(move || ping(&mut receiver, &mut sender, &builder, addressing, &options))
        .await
        .map_err(|e| AppError::Task(e.to_string()))??;

    println!("--- {} の ping 統計 ---", target);
    println!(
        "{} 送信, {} 受信, {:.1}% パケット損失",
        stats.transmitted,
        stats.received,
        stats.loss_percent()
    );
    if let (Some(min), Some(avg), Some(max)) = (stats.min_rtt(), stats.avg_rtt(), stats.max_rtt()) {
        println!(
            "rtt min/avg/max = {:.3}/{:.3}/{:.3} ms",
            min.as_secs_f64() * 1000.0,
            avg.as_secs_f64() * 1000.0,
            max.as_secs_f64() * 1000.0
        );
    }
    if stats.checksum_errors > 0 {
        println!("チェックサム不一致で破棄した応答: {}", stats.checksum_errors);
    }
    Ok(())
}
