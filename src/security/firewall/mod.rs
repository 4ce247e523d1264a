pub mod filter;
pub mod rules;

pub use filter::{Decision, Firewall, MatchReason};
pub use rules::{FirewallRule, FlowFields, RuleTable, Verdict};
