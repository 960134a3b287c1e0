//! Node event loop: a ticker task and a receive task feed one channel; a single consumer
//! owns the core, so every event runs to completion before the next one starts.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use botmesh_core::{
    BotMeshCore, BotStatusMessage, NegotiationState, Pairing, RadioPayload, ReceptionMeta,
};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::transport::{self, RadioLink, MAX_AIR_FRAME};

const EVENT_QUEUE: usize = 64;

// Status flag bits.
const FLAG_BEACONING: u8 = 0;
const FLAG_ACQUIRED: u8 = 1;

enum Event {
    Tick,
    Frame { datagram: Vec<u8>, at: Instant },
}

/// Run the node until `shutdown` resolves.
pub async fn run_node(
    cfg: Config,
    serial: u32,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let now_ms = move |at: Instant| at.duration_since(start).as_millis() as u64;

    let mut core = BotMeshCore::new(serial);
    core.register_global_handler(|p: &RadioPayload| log::info!("rx {}", p));

    let mut link = RadioLink::open(cfg.port, serial, cfg.radio.pairing())
        .await
        .with_context(|| format!("opening radio link on udp/{}", cfg.port))?;
    let setup = core.initialize(cfg.radio)?;
    apply_all(&mut link, setup).await?;
    if cfg.negotiate {
        let actions = core.start_negotiation(&cfg.class_id, now_ms(Instant::now()));
        apply_all(&mut link, actions).await?;
    }
    core.start_beacon(&cfg.class_id);
    log::info!(
        "node {} (id {:03X}, color #{:06X}) running as {:?}",
        core.device(),
        core.device().node_id(),
        core.device().color(),
        cfg.class_id
    );

    let (tx, mut rx) = mpsc::channel(EVENT_QUEUE);
    let ticker = tokio::spawn(tick_loop(tx.clone(), Duration::from_millis(cfg.tick_ms.max(1))));
    let mut receiver = tokio::spawn(recv_loop(link.socket(), tx));

    tokio::pin!(shutdown);
    let result = loop {
        let event = tokio::select! {
            _ = &mut shutdown => break Ok(()),
            res = &mut receiver => {
                let err = receiver_error(res);
                log::error!("{:#}", err);
                break Err(err);
            }
            ev = rx.recv() => ev,
        };
        match event {
            Some(Event::Tick) => {
                let actions = core.tick(now_ms(Instant::now()));
                if let Err(e) = apply_all(&mut link, actions).await {
                    break Err(e);
                }
                if let Some(text) = cfg.status_message.as_deref() {
                    let status = status_payload(&core, text);
                    if let Some(action) = core.send_if_changed(&status) {
                        if let Err(e) = apply_all(&mut link, vec![action]).await {
                            break Err(e);
                        }
                    }
                }
            }
            Some(Event::Frame { datagram, at }) => {
                on_frame(&mut core, link.tuned(), &datagram, now_ms(at));
            }
            None => break Err(anyhow::anyhow!("event sources stopped")),
        }
    };

    core.stop_beacon();
    core.cancel_negotiation();
    ticker.abort();
    receiver.abort();
    log::info!("node {} stopped on {}", core.device(), core.pairing());
    result
}

async fn apply_all(
    link: &mut RadioLink,
    actions: Vec<botmesh_core::OutboundAction>,
) -> anyhow::Result<()> {
    for action in actions {
        link.apply(action).await.context("radio action")?;
    }
    Ok(())
}

/// The receive task only ends on a socket error or a dropped event channel; both leave the
/// node deaf.
fn receiver_error(res: Result<std::io::Result<()>, tokio::task::JoinError>) -> anyhow::Error {
    match res {
        Ok(Ok(())) => anyhow::anyhow!("radio receiver stopped"),
        Ok(Err(e)) => anyhow::Error::new(e).context("radio receive"),
        Err(e) => anyhow::Error::new(e).context("radio receiver task"),
    }
}

/// Hand a datagram heard on the medium to the core if it was sent on the tuned pairing.
fn on_frame(
    core: &mut BotMeshCore,
    tuned: Pairing,
    datagram: &[u8],
    arrival_ms: u64,
) -> Option<RadioPayload> {
    let Some(air) = transport::decode_air(datagram) else {
        log::trace!("dropping {}-byte datagram", datagram.len());
        return None;
    };
    if air.pairing != tuned {
        return None;
    }
    let meta = ReceptionMeta {
        arrival_ms,
        serial: air.serial,
        signal_strength: 0,
    };
    core.on_buffer(&air.payload, meta)
}

/// Snapshot of this node as a status message.
fn status_payload(core: &BotMeshCore, text: &str) -> RadioPayload {
    let mut status = BotStatusMessage::new(core.peers().len() as i32, 0, 0, 0);
    status.set_flag(FLAG_BEACONING, core.is_beaconing());
    status.set_flag(
        FLAG_ACQUIRED,
        matches!(core.negotiation_state(), NegotiationState::Acquired(_)),
    );
    status.set_message(text);
    status.into()
}

async fn tick_loop(tx: mpsc::Sender<Event>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if tx.send(Event::Tick).await.is_err() {
            return;
        }
    }
}

async fn recv_loop(socket: Arc<UdpSocket>, tx: mpsc::Sender<Event>) -> std::io::Result<()> {
    let mut buf = vec![0u8; MAX_AIR_FRAME + 1];
    loop {
        let (n, _from) = socket.recv_from(&mut buf).await?;
        let event = Event::Frame {
            datagram: buf[..n].to_vec(),
            at: Instant::now(),
        };
        if tx.send(event).await.is_err() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botmesh_core::{HereIAm, Payload};

    #[test]
    fn status_reflects_core_state() {
        let mut core = BotMeshCore::new(1);
        core.start_beacon("cutebot");
        let p = status_payload(&core, "Hello");
        let status = p.as_bot_status().unwrap();
        assert_eq!(status.code(), 0);
        assert!(status.flag(FLAG_BEACONING));
        assert!(!status.flag(FLAG_ACQUIRED));
        assert_eq!(status.message(), "Hello");
        assert_eq!(status.as_bytes().len(), botmesh_core::MAX_PACKET_SIZE);
    }

    #[test]
    fn unchanged_status_is_sent_once() {
        let mut core = BotMeshCore::new(1);
        let first = status_payload(&core, "up");
        assert!(core.send_if_changed(&first).is_some());
        assert!(core.send_if_changed(&status_payload(&core, "up")).is_none());
        core.start_beacon("cutebot");
        assert!(core.send_if_changed(&status_payload(&core, "up")).is_some());
    }

    #[tokio::test]
    async fn failed_receiver_is_reported() {
        let handle = tokio::spawn(async {
            Err::<(), _>(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "socket gone",
            ))
        });
        let err = receiver_error(handle.await);
        assert_eq!(format!("{:#}", err), "radio receive: socket gone");

        let handle = tokio::spawn(std::future::pending::<std::io::Result<()>>());
        handle.abort();
        let err = receiver_error(handle.await);
        assert!(format!("{:#}", err).starts_with("radio receiver task"));
    }

    #[tokio::test]
    async fn frames_reach_core_only_on_tuned_pairing() {
        let tuned = Pairing::new(42, 17);
        let mut core = BotMeshCore::new(1);
        core.set_channel(42).unwrap();
        core.set_group(17).unwrap();

        let beacon = HereIAm::new("cutebot", tuned);
        let (tx, mut rx) = mpsc::channel(EVENT_QUEUE);
        let frames = [
            transport::encode_air(beacon.as_bytes(), 7, Pairing::new(42, 18)),
            vec![1, 2, 3],
            transport::encode_air(beacon.as_bytes(), 1, tuned),
            transport::encode_air(beacon.as_bytes(), 7, tuned),
        ];
        tokio::spawn(async move {
            for datagram in frames {
                let event = Event::Frame {
                    datagram,
                    at: Instant::now(),
                };
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });

        let mut delivered = Vec::new();
        while let Some(event) = rx.recv().await {
            if let Event::Frame { datagram, .. } = event {
                delivered.push(on_frame(&mut core, tuned, &datagram, 500));
            }
        }
        assert!(delivered[..3].iter().all(Option::is_none));
        let got = delivered[3].as_ref().unwrap();
        assert_eq!(got.meta.map(|m| (m.serial, m.arrival_ms)), Some((7, 500)));
        assert_eq!(core.peers().len(), 1);
        assert_eq!(core.peers().find_by_serial(7).unwrap().class_id, "cutebot");
    }
}
