//! We use this mocking module in unit tests to emulate the electromagnet on the other end of the link.

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::{MagnetError, Result};
use crate::transport::Transport;

/// One scripted reply to a `read_bytes` call
#[derive(Debug, Clone)]
pub enum MockRead {
    Bytes(Vec<u8>),
    Timeout,
    /// Simulated I/O failure
    Fail,
}

type Responder = Box<dyn FnMut(&[u8]) -> Vec<MockRead>>;

/// Our fake device used in place of a serial session.
pub struct MockTransport {
    /// Every write call, in order
    writes: Vec<Vec<u8>>,
    /// Replies waiting to be read
    replies: VecDeque<MockRead>,
    /// Generates replies from each written frame
    responder: Option<Responder>,
    /// Timeout passed to each read call
    read_timeouts: Vec<Duration>,
    should_error_on_write: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            writes: Vec::new(),
            replies: VecDeque::new(),
            responder: None,
            read_timeouts: Vec::new(),
            should_error_on_write: false,
        }
    }

    /// A device that acknowledges every set-value exchange and answers every
    /// field query with `field`.
    pub fn device(field: [u8; 3]) -> Self {
        // Value bytes still expected before the terminating 0x00
        let mut value_bytes_left: Option<usize> = None;
        Self::new().with_responder(move |frame| {
            if let Some(left) = value_bytes_left {
                value_bytes_left = left.checked_sub(1);
                if left == 0 && frame == [0x00] {
                    return vec![MockRead::Bytes(vec![0x12])];
                }
                return Vec::new();
            }
            match frame {
                [0x2C] => {
                    value_bytes_left = Some(4);
                    Vec::new()
                }
                [0x0A] => vec![MockRead::Bytes(field.to_vec())],
                _ => Vec::new(),
            }
        })
    }

    pub fn with_responder(mut self, responder: impl FnMut(&[u8]) -> Vec<MockRead> + 'static) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Queue a reply to be returned by the next unanswered read
    pub fn push_reply(&mut self, reply: MockRead) {
        self.replies.push_back(reply);
    }

    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// All written bytes concatenated
    pub fn written_data(&self) -> Vec<u8> {
        self.writes.concat()
    }

    /// Number of write calls that were exactly `frame`
    pub fn count_frames(&self, frame: &[u8]) -> usize {
        self.writes.iter().filter(|w| w.as_slice() == frame).count()
    }

    pub fn read_timeouts(&self) -> &[Duration] {
        &self.read_timeouts
    }
}

impl Transport for MockTransport {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.should_error_on_write {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "simulated write error").into());
        }
        self.writes.push(bytes.to_vec());
        if let Some(responder) = self.responder.as_mut() {
            self.replies.extend(responder(bytes));
        }
        Ok(())
    }

    fn read_bytes(&mut self, count: usize, timeout: Duration) -> Result<Vec<u8>> {
        self.read_timeouts.push(timeout);
        match self.replies.pop_front() {
            Some(MockRead::Bytes(mut bytes)) => {
                if bytes.len() > count {
                    let rest = bytes.split_off(count);
                    self.replies.push_front(MockRead::Bytes(rest));
                }
                Ok(bytes)
            }
            Some(MockRead::Fail) => {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "simulated read error").into())
            }
            Some(MockRead::Timeout) | None => Err(MagnetError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_writes() {
        let mut mock = MockTransport::new();
        mock.write_bytes(&[0x64]).unwrap();
        mock.write_bytes(&[0x1E, 0x2C]).unwrap();
        assert_eq!(mock.writes(), [vec![0x64u8], vec![0x1E, 0x2C]].as_slice());
        assert_eq!(mock.written_data(), vec![0x64, 0x1E, 0x2C]);
        assert_eq!(mock.count_frames(&[0x64]), 1);
    }

    #[test]
    fn test_replays_and_splits_replies() {
        let mut mock = MockTransport::new();
        mock.push_reply(MockRead::Bytes(vec![0x01, 0x02, 0x03]));
        assert_eq!(mock.read_bytes(2, Duration::from_millis(5)).unwrap(), vec![0x01, 0x02]);
        assert_eq!(mock.read_bytes(2, Duration::from_millis(5)).unwrap(), vec![0x03]);
        assert!(matches!(mock.read_bytes(1, Duration::from_millis(5)), Err(MagnetError::Timeout)));
    }

    #[test]
    fn test_device_acks_only_the_terminator() {
        let mut mock = MockTransport::device([0x00, 0x0A, 0x00]);
        // Value bytes that look like commands must not trigger replies
        for byte in [0x1E, 0x2C, 0x00, 0x0A, 0x00, 0x00] {
            mock.write_bytes(&[byte]).unwrap();
        }
        assert!(matches!(mock.read_bytes(1, Duration::from_millis(5)), Err(MagnetError::Timeout)));

        mock.write_bytes(&[0x00]).unwrap();
        assert_eq!(mock.read_bytes(1, Duration::from_millis(5)).unwrap(), vec![0x12]);

        mock.write_bytes(&[0x0A]).unwrap();
        assert_eq!(mock.read_bytes(3, Duration::from_millis(5)).unwrap(), vec![0x00, 0x0A, 0x00]);
    }

    #[test]
    fn test_write_error() {
        let mut mock = MockTransport::new();
        mock.set_write_error(true);
        assert!(matches!(mock.write_bytes(&[0x2B]), Err(MagnetError::Io(_))));
        assert!(mock.writes().is_empty());
    }
}
