//! Background task owning the socket of a connected session.

use std::sync::Weak;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::frame::{Command, Frame};
use crate::session::{ConnectionState, Inner, SessionEvent};
use crate::transport::{self, Link, Received};

/// Silence tolerated on the incoming side, as a multiple of the agreed period.
const HEARTBEAT_GRACE: u32 = 2;

enum LinkEnd {
    Shutdown,
    SessionDropped,
    Lost(String),
}

pub(crate) async fn run(
    inner: Weak<Inner>,
    mut link: Link,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        match pump(&inner, &mut link, &mut outbound, &mut shutdown).await {
            LinkEnd::Shutdown => {
                while let Ok(frame) = outbound.try_recv() {
                    if link.send(&frame).await.is_err() {
                        break;
                    }
                }
                link.close().await;
                debug!("Chat driver stopped");
                return;
            }
            LinkEnd::SessionDropped => {
                link.close().await;
                return;
            }
            LinkEnd::Lost(reason) => {
                let Some(session) = inner.upgrade() else {
                    return;
                };
                warn!("Chat connection lost: {}", reason);
                if session.config.reconnect_delay.is_zero() {
                    session.abandon();
                    session.emit(SessionEvent::Disconnected { reason });
                    return;
                }
                session.set_connection(ConnectionState::Connecting);
                session.emit(SessionEvent::Disconnected { reason });
                drop(session);

                match reconnect(&inner, &mut shutdown).await {
                    Some(fresh) => link = fresh,
                    None => return,
                }
            }
        }
    }
}

/// Moves frames both ways until the link ends.
async fn pump(
    inner: &Weak<Inner>,
    link: &mut Link,
    outbound: &mut mpsc::UnboundedReceiver<Frame>,
    shutdown: &mut oneshot::Receiver<()>,
) -> LinkEnd {
    let beat_period = link.heartbeat.outgoing;
    let watch_period = link.heartbeat.incoming * HEARTBEAT_GRACE;
    let mut beat = time::interval(beat_period.max(Duration::from_millis(1)));
    beat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    beat.tick().await;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            biased;

            _ = &mut *shutdown => return LinkEnd::Shutdown,

            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = link.send(&frame).await {
                        return LinkEnd::Lost(e.to_string());
                    }
                }
                None => return LinkEnd::SessionDropped,
            },

            received = link.receive() => {
                last_seen = Instant::now();
                match received {
                    Received::Frame(frame) => {
                        let Some(session) = inner.upgrade() else {
                            return LinkEnd::SessionDropped;
                        };
                        handle_frame(&session, &frame);
                    }
                    Received::Alive => {}
                    Received::Undecodable(e) => warn!("Dropping undecodable frame: {}", e),
                    Received::Closed(reason) => return LinkEnd::Lost(reason),
                }
            }

            _ = beat.tick(), if !beat_period.is_zero() => {
                if let Err(e) = link.send_heartbeat().await {
                    return LinkEnd::Lost(e.to_string());
                }
            }

            _ = time::sleep_until(last_seen + watch_period), if !watch_period.is_zero() => {
                return LinkEnd::Lost(format!("no heart-beat from broker for {:?}", watch_period));
            }
        }
    }
}

fn handle_frame(session: &Inner, frame: &Frame) {
    match frame.command {
        Command::Message => session.dispatch(frame),
        Command::Error => {
            let message = frame.get("message").unwrap_or("broker error").to_string();
            warn!("Broker error: {} {}", message, frame.body);
            session.emit(SessionEvent::BrokerError { message });
        }
        Command::Receipt => debug!("Receipt {:?}", frame.get("receipt-id")),
        other => debug!("Ignoring {} frame", other.as_str()),
    }
}

/// Retries the handshake at a fixed delay until it succeeds, the session
/// is dropped, or the user disconnects.
async fn reconnect(inner: &Weak<Inner>, shutdown: &mut oneshot::Receiver<()>) -> Option<Link> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let (config, delay) = {
            let session = inner.upgrade()?;
            session.emit(SessionEvent::Reconnecting { attempt });
            (session.config.clone(), session.config.reconnect_delay)
        };

        tokio::select! {
            _ = &mut *shutdown => return None,
            _ = time::sleep(delay) => {}
        }

        let mut link = match transport::open(&config).await {
            Ok(link) => link,
            Err(e) => {
                warn!("Reconnect attempt {} failed: {}", attempt, e);
                continue;
            }
        };

        // A disconnect during the attempt leaves nothing to restore.
        let resubscriptions = inner.upgrade().and_then(|session| session.resubscriptions());
        let Some(resubscriptions) = resubscriptions else {
            link.close().await;
            return None;
        };
        for frame in resubscriptions {
            if let Err(e) = link.send(&frame).await {
                warn!("Resubscribe failed: {}", e);
            }
        }
        let session = inner.upgrade()?;
        session.set_connection(ConnectionState::Connected);
        info!("Chat reconnected after {} attempt(s)", attempt);
        session.emit(SessionEvent::Reconnected);
        return Some(link);
    }
}
