use super::CommandSink;
use crate::protocol::{encode, Command};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Forwards encoded commands into an unbounded channel.
///
/// Used for dry runs (the binary logs what would be sent) and by tests that
/// assert on exact wire strings.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<String>,
    destination: Option<SocketAddr>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                destination: None,
            },
            receiver,
        )
    }

    pub fn destination(&self) -> Option<SocketAddr> {
        self.destination
    }
}

impl CommandSink for ChannelSink {
    fn send(&mut self, command: &Command) {
        if self.sender.send(encode(command)).is_err() {
            debug!("Receiver gone, dropping {}", command);
        }
    }

    fn set_destination(&mut self, destination: Option<SocketAddr>) {
        info!("Channel sink destination set to {:?}", destination);
        self.destination = destination;
    }
}

/// Drains everything currently queued on a [`ChannelSink`] receiver.
#[cfg(test)]
pub(crate) fn drain(receiver: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(payload) = receiver.try_recv() {
        out.push(payload);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::InputId;

    #[test]
    fn records_wire_strings_in_order() {
        let (mut sink, mut rx) = ChannelSink::new();
        sink.send(&Command::down(InputId::BtnY));
        sink.send(&Command::MouseDelta(1, 2));
        assert_eq!(drain(&mut rx), vec!["BTN_Y:DOWN", "MOUSE_MOVE:1,2"]);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn closed_receiver_does_not_panic() {
        let (mut sink, rx) = ChannelSink::new();
        drop(rx);
        sink.send(&Command::up(InputId::BtnY));
    }
}
