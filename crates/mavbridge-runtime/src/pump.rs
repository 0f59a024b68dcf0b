//! [`LinkPump`] – sole owner of the vehicle link.
//!
//! The pump is the only object holding the [`VehicleLink`], so only the
//! context that owns the pump can read from or write to the vehicle.  Bus
//! handlers reach it exclusively through the command queue.
//!
//! Each [`pump_once`][LinkPump::pump_once] moves at most one queued command
//! onto the link, keeping per-tick work bounded no matter how fast commands
//! arrive.

use mavbridge_link::VehicleLink;
use mavbridge_middleware::CommandReceiver;
use mavbridge_types::{MavMessage, ProtocolMessage};
use tracing::{info, warn};

/// What a single [`LinkPump::pump_once`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// Queue was empty.
    Idle,
    /// One command was written to the link.
    Sent,
    /// One command was dequeued but the link refused it; it is gone.
    Dropped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub sent: u64,
    pub dropped: u64,
    pub received: u64,
}

pub struct LinkPump {
    link: Box<dyn VehicleLink>,
    commands: CommandReceiver,
    stats: PumpStats,
}

impl LinkPump {
    pub fn new(link: Box<dyn VehicleLink>, commands: CommandReceiver) -> Self {
        Self {
            link,
            commands,
            stats: PumpStats::default(),
        }
    }

    pub fn stats(&self) -> PumpStats {
        self.stats
    }

    /// Commands waiting to be sent.
    pub fn queue_depth(&self) -> usize {
        self.commands.len()
    }

    /// Send at most one queued command.
    pub fn pump_once(&mut self) -> PumpOutcome {
        let Some(command) = self.commands.try_dequeue() else {
            return PumpOutcome::Idle;
        };
        match self.link.send(&command) {
            Ok(()) => {
                self.stats.sent += 1;
                info!(msg_type = command.type_name(), "command sent to vehicle");
                PumpOutcome::Sent
            }
            Err(e) => {
                self.stats.dropped += 1;
                warn!(msg_type = command.type_name(), error = %e, "link send failed; command dropped");
                PumpOutcome::Dropped
            }
        }
    }

    /// Read up to `max` inbound messages, handing each to `on_message`.
    ///
    /// Stops early when the link has nothing more or reports an error.
    /// Returns how many messages were delivered.
    pub fn poll_inbound(&mut self, max: usize, mut on_message: impl FnMut(&MavMessage)) -> usize {
        let mut delivered = 0;
        while delivered < max {
            match self.link.try_recv() {
                Ok(Some(message)) => {
                    on_message(&message);
                    delivered += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "link receive failed");
                    break;
                }
            }
        }
        self.stats.received += delivered as u64;
        delivered
    }
}

impl std::fmt::Debug for LinkPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkPump")
            .field("queue_depth", &self.commands.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavbridge_link::RecordingLink;
    use mavbridge_middleware::command_queue;
    use mavbridge_types::{CommandLong, MavSeverity, StatusText};

    fn command(id: u16) -> MavMessage {
        CommandLong {
            command: id,
            ..Default::default()
        }
        .into()
    }

    #[test]
    fn empty_queue_is_idle() {
        let (_tx, rx) = command_queue();
        let mut pump = LinkPump::new(Box::new(RecordingLink::new()), rx);
        assert_eq!(pump.pump_once(), PumpOutcome::Idle);
    }

    #[test]
    fn one_pump_sends_exactly_one_command() {
        let (tx, rx) = command_queue();
        let link = RecordingLink::new();
        let sent = link.sent();
        let mut pump = LinkPump::new(Box::new(link), rx);

        for id in [400, 22, 21, 20] {
            tx.enqueue(command(id)).unwrap();
        }

        assert_eq!(pump.pump_once(), PumpOutcome::Sent);
        assert_eq!(sent.len(), 1);
        assert_eq!(pump.queue_depth(), 3);
        assert_eq!(sent.messages()[0], command(400));
    }

    #[test]
    fn send_failure_drops_command_and_pump_keeps_going() {
        let (tx, rx) = command_queue();
        let mut link = RecordingLink::new();
        link.fail_next_sends(1);
        let sent = link.sent();
        let mut pump = LinkPump::new(Box::new(link), rx);

        tx.enqueue(command(400)).unwrap();
        tx.enqueue(command(22)).unwrap();

        assert_eq!(pump.pump_once(), PumpOutcome::Dropped);
        assert_eq!(pump.queue_depth(), 1, "failed command is not re-queued");
        assert_eq!(pump.pump_once(), PumpOutcome::Sent);
        assert_eq!(sent.messages(), vec![command(22)]);
        assert_eq!(pump.stats(), PumpStats { sent: 1, dropped: 1, received: 0 });
    }

    #[test]
    fn poll_inbound_respects_limit() {
        let (_tx, rx) = command_queue();
        let mut link = RecordingLink::new();
        for i in 0..5 {
            link.push_inbound(StatusText {
                severity: MavSeverity::Info,
                text: format!("msg {i}"),
            });
        }
        let mut pump = LinkPump::new(Box::new(link), rx);

        let mut seen = Vec::new();
        assert_eq!(pump.poll_inbound(3, |m| seen.push(m.type_name())), 3);
        assert_eq!(seen, vec!["STATUSTEXT"; 3]);
        assert_eq!(pump.poll_inbound(10, |_| {}), 2);
        assert_eq!(pump.poll_inbound(10, |_| {}), 0);
        assert_eq!(pump.stats().received, 5);
    }
}
