//! Capture-Transmit pipeline
//!
//! Moves audio from the input device to the network: one blocking read,
//! one datagram, every iteration. Input overflow means the device
//! dropped data internally and the read can simply be retried; it is an
//! expected condition under load, not a fault. Everything else from the
//! device or the socket is fatal and raises the shared stop flag.

use crate::error::{AudioError, Error};
use crate::link::{BlockSource, DatagramTx, ShutdownFlag};

/// Run the uplink until the stop flag is raised or a fatal error occurs.
///
/// Every successfully read block is sent as exactly one datagram, in
/// order, with no batching or splitting.
pub fn run(
    source: &mut impl BlockSource,
    tx: &impl DatagramTx,
    stop: &ShutdownFlag,
) -> Result<(), Error> {
    tracing::debug!("uplink running");

    while !stop.is_raised() {
        let block = match source.read_block() {
            Ok(block) => block,
            Err(AudioError::Overflow) => {
                tracing::debug!("input overflow, retrying read");
                continue;
            }
            Err(e) => {
                tracing::error!("input read error: {e}");
                stop.raise();
                return Err(e.into());
            }
        };

        if let Err(e) = tx.send_datagram(&block.to_wire()) {
            tracing::error!("voice send error: {e}");
            stop.raise();
            return Err(e.into());
        }
    }

    tracing::debug!("uplink stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::block::AudioBlock;
    use crate::error::NetworkError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Yields scripted read results, then raises the stop flag.
    struct ScriptedSource {
        script: VecDeque<Result<AudioBlock, AudioError>>,
        reads: usize,
        stop: ShutdownFlag,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<AudioBlock, AudioError>>, stop: &ShutdownFlag) -> Self {
            Self {
                script: script.into(),
                reads: 0,
                stop: stop.clone(),
            }
        }
    }

    impl BlockSource for ScriptedSource {
        fn read_block(&mut self) -> Result<AudioBlock, AudioError> {
            self.reads += 1;
            match self.script.pop_front() {
                Some(result) => result,
                None => {
                    self.stop.raise();
                    Err(AudioError::Overflow)
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingTx {
        sent: Mutex<Vec<Vec<u8>>>,
        fail: bool,
    }

    impl DatagramTx for RecordingTx {
        fn send_datagram(&self, payload: &[u8]) -> Result<(), NetworkError> {
            if self.fail {
                return Err(NetworkError::Send(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "wire cut",
                )));
            }
            self.sent.lock().push(payload.to_vec());
            Ok(())
        }
    }

    fn block_of(value: i16, frames: usize) -> AudioBlock {
        AudioBlock::from_samples(vec![value; frames])
    }

    #[test]
    fn overflow_skips_data_without_terminating() {
        let stop = ShutdownFlag::new();
        let mut source = ScriptedSource::new(
            vec![Err(AudioError::Overflow), Ok(block_of(7, 320))],
            &stop,
        );
        let tx = RecordingTx::default();

        run(&mut source, &tx, &stop).unwrap();

        // The overflowed read produced no datagram; the next read did
        let sent = tx.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], block_of(7, 320).to_wire());
    }

    #[test]
    fn each_block_becomes_one_datagram_in_order() {
        let stop = ShutdownFlag::new();
        let mut source = ScriptedSource::new(
            vec![Ok(block_of(1, 320)), Ok(block_of(2, 320)), Ok(block_of(3, 320))],
            &stop,
        );
        let tx = RecordingTx::default();

        run(&mut source, &tx, &stop).unwrap();

        let sent = tx.sent.lock();
        assert_eq!(sent.len(), 3);
        for (i, payload) in sent.iter().enumerate() {
            assert_eq!(payload.len(), 640);
            assert_eq!(payload, &block_of(i as i16 + 1, 320).to_wire());
        }
    }

    #[test]
    fn fatal_read_error_raises_stop() {
        let stop = ShutdownFlag::new();
        let mut source =
            ScriptedSource::new(vec![Err(AudioError::Stream("device gone".into()))], &stop);
        let tx = RecordingTx::default();

        let result = run(&mut source, &tx, &stop);

        assert!(result.is_err());
        assert!(stop.is_raised());
        assert!(tx.sent.lock().is_empty());
    }

    #[test]
    fn fatal_send_error_raises_stop() {
        let stop = ShutdownFlag::new();
        let mut source = ScriptedSource::new(vec![Ok(block_of(5, 320))], &stop);
        let tx = RecordingTx {
            fail: true,
            ..Default::default()
        };

        let result = run(&mut source, &tx, &stop);

        assert!(matches!(result, Err(Error::Network(_))));
        assert!(stop.is_raised());
    }

    #[test]
    fn preset_stop_reads_nothing() {
        let stop = ShutdownFlag::new();
        stop.raise();
        let mut source = ScriptedSource::new(vec![Ok(block_of(1, 320))], &stop);
        let tx = RecordingTx::default();

        run(&mut source, &tx, &stop).unwrap();

        assert_eq!(source.reads, 0);
        assert!(tx.sent.lock().is_empty());
    }
}
