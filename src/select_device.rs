use crate::core::error::{AppError, AppResult};
use crate::network::packet::ethernet::MacAddress;
use pnet::datalink::{self, NetworkInterface};
use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// 名前が指定されていればそのデバイス、なければ一覧から対話的に選択する
pub fn select_device(name: Option<&str>) -> AppResult<NetworkInterface> {
    let interfaces = datalink::interfaces();

    match name {
        Some(name) => interfaces
            .into_iter()
            .find(|interface| interface.name == name)
            .ok_or_else(|| AppError::DeviceSelection(format!("デバイスが見つかりません: {}", name))),
        None => prompt_device(interfaces),
    }
}

fn prompt_device(interfaces: Vec<NetworkInterface>) -> AppResult<NetworkInterface> {
    if interfaces.is_empty() {
        return Err(AppError::DeviceSelection("利用可能なデバイスがありません".to_string()));
    }

    println!("利用可能なデバイス:");
    for (index, interface) in interfaces.iter().enumerate() {
        println!("{}. {}", index + 1, interface.name);
    }

    print!("キャプチャするデバイスの番号を入力してください: ");
    io::stdout().flush().map_err(|e| AppError::DeviceSelection(e.to_string()))?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .map_err(|e| AppError::DeviceSelection(e.to_string()))?;
    let device_index = parse_device_index(&input, interfaces.len())?;

    let selected_interface = interfaces
        .into_iter()
        .nth(device_index - 1)
        .ok_or_else(|| AppError::DeviceSelection("無効なデバイス番号です".to_string()))?;
    println!("選択されたデバイス: {}", selected_interface.name);

    Ok(selected_interface)
}

/// 1始まりの番号
fn parse_device_index(input: &str, count: usize) -> AppResult<usize> {
    let index: usize = input
        .trim()
        .parse()
        .map_err(|e| AppError::DeviceSelection(format!("番号を入力してください ({}): {}", input.trim(), e)))?;

    if index == 0 || index > count {
        return Err(AppError::DeviceSelection("無効なデバイス番号です".to_string()));
    }
    Ok(index)
}

pub fn interface_mac(interface: &NetworkInterface) -> Option<MacAddress> {
    interface
        .mac
        .map(|mac| MacAddress::new([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]))
}

pub fn interface_ipv4(interface: &NetworkInterface) -> Option<Ipv4Addr> {
    interface.ips.iter().find_map(|network| match network.ip() {
        IpAddr::V4(ip) => Some(ip),
        IpAddr::V6(_) => None,
    })
}

/// リンクローカル以外のアドレスを優先する
pub fn interface_ipv6(interface: &NetworkInterface) -> Option<Ipv6Addr> {
    let addresses: Vec<Ipv6Addr> = interface
        .ips
        .iter()
        .filter_map(|network| match network.ip() {
            IpAddr::V6(ip) => Some(ip),
            IpAddr::V4(_) => None,
        })
        .collect();

    addresses
        .iter()
        .find(|ip| !is_link_local(ip))
        .or_else(|| addresses.first())
        .copied()
}

fn is_link_local(ip: &Ipv6Addr) -> bool {
    ip.segments()[0] & 0xffc0 == 0xfe80
}
