//! Datagram source implementations

pub mod replay;
pub mod udp;

pub use replay::ReplayProvider;
pub use udp::UdpProvider;
