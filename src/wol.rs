//! Wake-on-LAN
//!
//! A magic packet is 6 bytes of 0xFF followed by sixteen repetitions of the
//! target's 48-bit hardware address, 102 bytes in total. It is sent as a UDP
//! broadcast; there is no acknowledgement.

use std::net::{Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::debug;

/// Length of a magic packet in bytes
pub const MAGIC_PACKET_LEN: usize = 102;

/// Echo port; wake-on-LAN senders commonly use 7 or 9 (discard)
pub const WOL_PORT: u16 = 7;

#[derive(Error, Debug)]
pub enum WakeError {
    #[error("Invalid MAC address '{0}': expected six hex octets")]
    InvalidMac(String),

    #[error("Broadcast failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse an EUI-48 address written with ':' or '-' separators
pub fn parse_mac(mac: &str) -> Result<[u8; 6], WakeError> {
    let invalid = || WakeError::InvalidMac(mac.to_string());

    let parts: Vec<&str> = mac.split([':', '-']).collect();
    if parts.len() != 6 {
        return Err(invalid());
    }

    let mut octets = [0u8; 6];
    for (octet, part) in octets.iter_mut().zip(parts) {
        if part.len() != 2 {
            return Err(invalid());
        }
        *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
    }

    Ok(octets)
}

/// Build the magic packet for a hardware address
pub fn magic_packet(mac: &[u8; 6]) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0xffu8; MAGIC_PACKET_LEN];
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(mac);
    }
    packet
}

/// Sends a wake signal to a hardware address. Fire-and-forget.
#[async_trait]
pub trait WakeBroadcaster: Send + Sync {
    async fn broadcast(&self, mac: &str) -> Result<(), WakeError>;
}

/// Broadcasts magic packets on the limited broadcast address
#[derive(Debug, Clone)]
pub struct UdpBroadcaster {
    target: SocketAddr,
}

impl Default for UdpBroadcaster {
    fn default() -> Self {
        Self {
            target: SocketAddr::from((Ipv4Addr::BROADCAST, WOL_PORT)),
        }
    }
}

impl UdpBroadcaster {
    /// Send to a specific address instead of 255.255.255.255:7
    pub fn with_target(target: SocketAddr) -> Self {
        Self { target }
    }
}

#[async_trait]
impl WakeBroadcaster for UdpBroadcaster {
    async fn broadcast(&self, mac: &str) -> Result<(), WakeError> {
        let packet = magic_packet(&parse_mac(mac)?);

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;
        socket.send_to(&packet, self.target).await?;

        debug!("Sent magic packet for {} to {}", mac, self.target);
        Ok(())
    }
}
