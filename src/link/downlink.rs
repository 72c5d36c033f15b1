//! Receive-Playback pipeline
//!
//! Moves audio from the network to the output device, absorbing network
//! gaps. Every completed iteration writes exactly one block to the
//! playback side: decoded audio when a well-formed datagram arrived,
//! silence when the receive timed out or the datagram length was wrong.
//! The playback device is never starved of writes; its buffer timing
//! stays continuous whatever the network does.

use crate::audio::block::AudioBlock;
use crate::error::{AudioError, Error};
use crate::link::{BlockSink, DatagramRx, ShutdownFlag};
use crate::network::endpoint::RecvOutcome;

/// Run the downlink until the stop flag is raised or a fatal error occurs.
pub fn run(
    rx: &impl DatagramRx,
    sink: &impl BlockSink,
    stop: &ShutdownFlag,
    frames_per_buffer: usize,
) -> Result<(), Error> {
    tracing::debug!("downlink running");

    // One extra byte so an oversized datagram is visible as a wrong
    // length instead of silently truncating to exactly 2*N.
    let mut buf = vec![0u8; AudioBlock::wire_len(frames_per_buffer) + 1];

    while !stop.is_raised() {
        let outcome = match rx.recv_datagram(&mut buf) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("voice receive error: {e}");
                stop.raise();
                return Err(e.into());
            }
        };

        let block = match outcome {
            RecvOutcome::TimedOut => AudioBlock::silence(frames_per_buffer),
            RecvOutcome::Datagram(len) => {
                match buf
                    .get(..len)
                    .and_then(|payload| AudioBlock::from_wire(payload, frames_per_buffer))
                {
                    Some(block) => block,
                    None => {
                        tracing::debug!(len, "datagram length mismatch, substituting silence");
                        AudioBlock::silence(frames_per_buffer)
                    }
                }
            }
        };

        match sink.write_block(&block) {
            Ok(()) => {}
            Err(AudioError::Underflow) => {
                tracing::debug!("output underflow tolerated");
            }
            Err(e) => {
                tracing::error!("output write error: {e}");
                stop.raise();
                return Err(e.into());
            }
        }
    }

    tracing::debug!("downlink stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    enum RxItem {
        Timeout,
        Payload(Vec<u8>),
        Fail,
    }

    /// Replays scripted receive outcomes, then raises the stop flag and
    /// keeps timing out. The final timeout still produces one silence
    /// write before the loop observes the flag.
    struct ScriptedRx {
        script: Mutex<VecDeque<RxItem>>,
        stop: ShutdownFlag,
    }

    impl ScriptedRx {
        fn new(script: Vec<RxItem>, stop: &ShutdownFlag) -> Self {
            Self {
                script: Mutex::new(script.into()),
                stop: stop.clone(),
            }
        }
    }

    impl DatagramRx for ScriptedRx {
        fn recv_datagram(&self, buf: &mut [u8]) -> Result<RecvOutcome, NetworkError> {
            match self.script.lock().pop_front() {
                Some(RxItem::Timeout) => Ok(RecvOutcome::TimedOut),
                Some(RxItem::Payload(payload)) => {
                    let len = payload.len().min(buf.len());
                    buf[..len].copy_from_slice(&payload[..len]);
                    Ok(RecvOutcome::Datagram(len))
                }
                Some(RxItem::Fail) => Err(NetworkError::Recv(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "peer gone",
                ))),
                None => {
                    self.stop.raise();
                    Ok(RecvOutcome::TimedOut)
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        written: Mutex<Vec<AudioBlock>>,
        underflow_once: Mutex<bool>,
        fail: bool,
    }

    impl BlockSink for RecordingSink {
        fn write_block(&self, block: &AudioBlock) -> Result<(), AudioError> {
            if self.fail {
                return Err(AudioError::Stream("output device gone".into()));
            }
            self.written.lock().push(block.clone());
            if std::mem::take(&mut *self.underflow_once.lock()) {
                return Err(AudioError::Underflow);
            }
            Ok(())
        }
    }

    #[test]
    fn timeouts_become_silence_blocks() {
        let stop = ShutdownFlag::new();
        let rx = ScriptedRx::new(
            vec![RxItem::Timeout, RxItem::Timeout, RxItem::Timeout],
            &stop,
        );
        let sink = RecordingSink::default();

        run(&rx, &sink, &stop, 320).unwrap();

        // Three scripted timeouts plus the stop-raising one: every
        // iteration wrote exactly one block, all silence
        let written = sink.written.lock();
        assert_eq!(written.len(), 4);
        for block in written.iter() {
            assert_eq!(block.frames(), 320);
            assert!(block.is_silence());
        }
        assert!(stop.is_raised());
    }

    #[test]
    fn short_datagram_becomes_silence_not_partial_decode() {
        let stop = ShutdownFlag::new();
        // 638 bytes where 640 are expected
        let rx = ScriptedRx::new(vec![RxItem::Payload(vec![0xAB; 638])], &stop);
        let sink = RecordingSink::default();

        run(&rx, &sink, &stop, 320).unwrap();

        let written = sink.written.lock();
        assert_eq!(written[0].frames(), 320);
        assert!(written[0].is_silence());
    }

    #[test]
    fn valid_datagram_is_decoded_in_order() {
        let stop = ShutdownFlag::new();
        let samples: Vec<i16> = (0..320).map(|i| i as i16 - 160).collect();
        let wire = AudioBlock::from_samples(samples.clone()).to_wire();
        let rx = ScriptedRx::new(vec![RxItem::Payload(wire)], &stop);
        let sink = RecordingSink::default();

        run(&rx, &sink, &stop, 320).unwrap();

        let written = sink.written.lock();
        assert_eq!(written[0].samples(), samples.as_slice());
    }

    #[test]
    fn underflow_on_write_is_tolerated() {
        let stop = ShutdownFlag::new();
        let rx = ScriptedRx::new(vec![RxItem::Timeout, RxItem::Timeout], &stop);
        let sink = RecordingSink {
            underflow_once: Mutex::new(true),
            ..Default::default()
        };

        run(&rx, &sink, &stop, 320).unwrap();

        // The underflowing write still counted; the loop went on
        assert_eq!(sink.written.lock().len(), 3);
        assert!(stop.is_raised());
    }

    #[test]
    fn fatal_receive_error_raises_stop() {
        let stop = ShutdownFlag::new();
        let rx = ScriptedRx::new(vec![RxItem::Fail], &stop);
        let sink = RecordingSink::default();

        let result = run(&rx, &sink, &stop, 320);

        assert!(matches!(result, Err(Error::Network(_))));
        assert!(stop.is_raised());
        assert!(sink.written.lock().is_empty());
    }

    #[test]
    fn fatal_write_error_raises_stop() {
        let stop = ShutdownFlag::new();
        let rx = ScriptedRx::new(vec![RxItem::Timeout], &stop);
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };

        let result = run(&rx, &sink, &stop, 320);

        assert!(matches!(result, Err(Error::Audio(_))));
        assert!(stop.is_raised());
    }
}
