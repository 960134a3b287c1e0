//! Simulated radio medium: UDP multicast, one multicast group per (channel, group) pairing.
//!
//! Air frame: payload bytes followed by `[serial:u32 LE][channel:u8][group:u8]`. The trailer
//! stands in for what the radio hardware provides: the sender serial and group filtering.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use botmesh_core::{OutboundAction, Pairing, MAX_PACKET_SIZE};
use tokio::net::UdpSocket;

pub const TRAILER_SIZE: usize = 6;
/// Largest datagram the medium carries.
pub const MAX_AIR_FRAME: usize = MAX_PACKET_SIZE + TRAILER_SIZE;

/// Multicast group for a pairing: 239.255.<channel>.<group>.
pub fn multicast_addr(pairing: Pairing) -> Ipv4Addr {
    Ipv4Addr::new(239, 255, pairing.channel as u8, pairing.group as u8)
}

/// A frame as heard on the medium.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AirFrame {
    pub payload: Vec<u8>,
    pub serial: u32,
    pub pairing: Pairing,
}

pub fn encode_air(payload: &[u8], serial: u32, pairing: Pairing) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + TRAILER_SIZE);
    out.extend_from_slice(payload);
    out.extend_from_slice(&serial.to_le_bytes());
    out.push(pairing.channel as u8);
    out.push(pairing.group as u8);
    out
}

/// None when the datagram is too short to carry a trailer or too long for the medium.
pub fn decode_air(frame: &[u8]) -> Option<AirFrame> {
    if frame.len() < TRAILER_SIZE || frame.len() > MAX_AIR_FRAME {
        return None;
    }
    let (payload, trailer) = frame.split_at(frame.len() - TRAILER_SIZE);
    Some(AirFrame {
        payload: payload.to_vec(),
        serial: u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]),
        pairing: Pairing::new(trailer[4] as u16, trailer[5] as u16),
    })
}

/// The node's radio: tuned to one pairing, able to transmit on any.
pub struct RadioLink {
    socket: Arc<UdpSocket>,
    port: u16,
    serial: u32,
    tuned: Pairing,
    power: u8,
}

impl RadioLink {
    pub async fn open(port: u16, serial: u32, pairing: Pairing) -> io::Result<Self> {
        let std_sock = std::net::UdpSocket::bind(("0.0.0.0", port))?;
        std_sock.set_nonblocking(true)?;
        std_sock.set_multicast_ttl_v4(1)?;
        std_sock.set_multicast_loop_v4(true)?;
        std_sock.join_multicast_v4(&multicast_addr(pairing), &Ipv4Addr::UNSPECIFIED)?;
        let socket = UdpSocket::from_std(std_sock)?;
        log::info!("radio link on udp/{} tuned to {}", port, pairing);
        Ok(Self {
            socket: Arc::new(socket),
            port,
            serial,
            tuned: pairing,
            power: botmesh_core::core::DEFAULT_POWER,
        })
    }

    pub fn socket(&self) -> Arc<UdpSocket> {
        self.socket.clone()
    }

    pub fn tuned(&self) -> Pairing {
        self.tuned
    }

    pub fn tune(&mut self, pairing: Pairing) -> io::Result<()> {
        if pairing == self.tuned {
            return Ok(());
        }
        self.socket
            .leave_multicast_v4(multicast_addr(self.tuned), Ipv4Addr::UNSPECIFIED)?;
        self.socket
            .join_multicast_v4(multicast_addr(pairing), Ipv4Addr::UNSPECIFIED)?;
        log::debug!("tuned {} -> {}", self.tuned, pairing);
        self.tuned = pairing;
        Ok(())
    }

    pub async fn send_on(&self, pairing: Pairing, payload: &[u8]) -> io::Result<()> {
        let frame = encode_air(payload, self.serial, pairing);
        let dest = SocketAddr::from((multicast_addr(pairing), self.port));
        self.socket.send_to(&frame, dest).await?;
        log::trace!("sent {} bytes on {}", payload.len(), pairing);
        Ok(())
    }

    /// Perform one action returned by the core.
    pub async fn apply(&mut self, action: OutboundAction) -> io::Result<()> {
        match action {
            OutboundAction::Tune(p) => self.tune(p),
            OutboundAction::SetPower(power) => {
                // The simulated medium has no range; power is only recorded.
                self.power = power;
                log::debug!("transmit power {}", self.power);
                Ok(())
            }
            OutboundAction::Send { pairing, bytes } => self.send_on(pairing, &bytes).await,
        }
    }
}
