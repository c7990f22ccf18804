//! Delivers notifications to the players entitled to see them.

use crate::notification::Notification;
use crate::world::World;
use log::{debug, error, warn};
use parking_lot::Mutex;
use shared::{CreatureId, Packet};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Outbound delivery, implemented by the connection layer.
pub trait Outbound: Send + Sync {
    fn send(&self, recipient: CreatureId, packets: Vec<Packet>);
}

/// Outbound that keeps everything it is given, for headless runs and tests.
#[derive(Debug, Default)]
pub struct MemoryOutbound {
    sent: Mutex<Vec<(CreatureId, Packet)>>,
}

impl MemoryOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<(CreatureId, Packet)> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn sent_to(&self, recipient: CreatureId) -> Vec<Packet> {
        self.sent
            .lock()
            .iter()
            .filter(|(id, _)| *id == recipient)
            .map(|(_, packet)| packet.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

impl Outbound for MemoryOutbound {
    fn send(&self, recipient: CreatureId, packets: Vec<Packet>) {
        self.sent
            .lock()
            .extend(packets.into_iter().map(|packet| (recipient, packet)));
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

pub struct Dispatcher {
    outbound: Arc<dyn Outbound>,
}

impl Dispatcher {
    pub fn new(outbound: Arc<dyn Outbound>) -> Self {
        Self { outbound }
    }

    /// Resolves spectators against the current world, prepares a payload for
    /// each and hands it to the outbound. A failure while preparing for one
    /// spectator is logged and does not affect the others. Returns the number
    /// of spectators that received something.
    pub fn dispatch(&self, world: &World, notification: &dyn Notification) -> usize {
        let spectators =
            match panic::catch_unwind(AssertUnwindSafe(|| notification.resolve_spectators(world))) {
                Ok(spectators) => spectators,
                Err(payload) => {
                    error!(
                        "Resolving spectators for {} panicked: {}",
                        notification.describe(),
                        panic_message(payload.as_ref())
                    );
                    return 0;
                }
            };

        let mut delivered = 0;
        for spectator in spectators {
            let prepared =
                panic::catch_unwind(AssertUnwindSafe(|| notification.prepare_for(world, spectator)));
            match prepared {
                Ok(Ok(packets)) if packets.is_empty() => {}
                Ok(Ok(packets)) => {
                    self.outbound.send(spectator, packets);
                    delivered += 1;
                }
                Ok(Err(e)) => {
                    warn!(
                        "Could not prepare {} for spectator {}: {}",
                        notification.describe(),
                        spectator,
                        e
                    );
                }
                Err(payload) => {
                    error!(
                        "Preparing {} for spectator {} panicked: {}",
                        notification.describe(),
                        spectator,
                        panic_message(payload.as_ref())
                    );
                }
            }
        }

        debug!("Dispatched {} to {} spectators", notification.describe(), delivered);
        delivered
    }
}
