pub mod firewall;

pub use firewall::Firewall;
