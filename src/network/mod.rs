pub mod builder;
pub mod capture;
pub mod echo;
pub mod injection;
pub mod packet;

pub use builder::FrameBuilder;
pub use capture::{open_ethernet_channel, receive_until, FrameSource, PacketCapture};
pub use echo::{open_echo_channel, EchoReceiver, EchoSender};
pub use injection::{FrameSink, PacketInjector};
