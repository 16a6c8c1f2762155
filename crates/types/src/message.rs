use core::fmt;

use crate::Pid;

/// An inter-process message as it travels through the kernel's bus.
///
/// Messages are copied when enqueued, so a sender cannot mutate one after
/// sending. The sender pid is stamped by the kernel at enqueue time;
/// whatever the sender wrote into `sender` is overwritten, which is what
/// makes the field trustworthy on the receive side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelMessage {
    pub sender: Pid,
    pub target: Pid,
    /// Application-defined tag; the bus does not interpret it.
    pub kind: i32,
    pub data: Vec<u8>,
}

impl KernelMessage {
    pub fn new(target: Pid, kind: i32, data: &[u8]) -> Self {
        Self {
            sender: Pid(0),
            target,
            kind,
            data: data.to_vec(),
        }
    }

    /// Copy used by the bus when enqueueing, with the sender identity fixed
    /// by the kernel.
    pub fn stamped(&self, sender: Pid) -> Self {
        Self {
            sender,
            target: self.target,
            kind: self.kind,
            data: self.data.clone(),
        }
    }
}

impl fmt::Display for KernelMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "msg {{ from: {}, to: {}, kind: {}, data: 0x{} }}",
            self.sender,
            self.target,
            self.kind,
            hex::encode(&self.data)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamped_copies_payload() {
        let mut original = KernelMessage::new(Pid(7), 5, b"hi");
        let copy = original.stamped(Pid(2));
        original.data[0] = b'X';

        assert_eq!(copy.sender, Pid(2));
        assert_eq!(copy.target, Pid(7));
        assert_eq!(copy.data, b"hi");
    }

    #[test]
    fn display_renders_payload_as_hex() {
        let msg = KernelMessage::new(Pid(3), 1, &[0xab, 0xcd]).stamped(Pid(1));
        assert_eq!(
            msg.to_string(),
            "msg { from: pid 1, to: pid 3, kind: 1, data: 0xabcd }"
        );
    }
}
