//! The two voice pipelines and their lifecycle
//!
//! A call runs exactly two pipeline threads: uplink (microphone to
//! network) and downlink (network to speaker). They share no data, only
//! a single [`ShutdownFlag`] and the two directions of one UDP endpoint.
//! Each loop blocks only on its own device or socket call, so neither
//! clock domain can stall the other.
//!
//! The loops are written against the small traits below so they can be
//! exercised in tests without real audio hardware or a peer.

pub mod downlink;
pub mod session;
pub mod uplink;

pub use session::CallSession;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::audio::block::AudioBlock;
use crate::audio::capture::CaptureStream;
use crate::audio::playback::PlaybackStream;
use crate::error::{AudioError, NetworkError};
use crate::network::endpoint::{CallEndpoint, RecvOutcome};

/// Cooperative stop signal shared by both pipelines and the coordinator.
///
/// The transition is one-directional: once raised it stays raised, and
/// raising it again is a no-op. Cloning yields another handle to the
/// same flag.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag {
    raised: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

/// Blocking producer of fixed-size sample blocks (the capture side).
pub trait BlockSource {
    fn read_block(&mut self) -> Result<AudioBlock, AudioError>;
}

/// Blocking consumer of fixed-size sample blocks (the playback side).
pub trait BlockSink {
    fn write_block(&self, block: &AudioBlock) -> Result<(), AudioError>;
}

/// Datagram transmit half of the transport.
pub trait DatagramTx {
    fn send_datagram(&self, payload: &[u8]) -> Result<(), NetworkError>;
}

/// Datagram receive half of the transport, with a distinguishable
/// timeout outcome.
pub trait DatagramRx {
    fn recv_datagram(&self, buf: &mut [u8]) -> Result<RecvOutcome, NetworkError>;
}

impl BlockSource for CaptureStream {
    fn read_block(&mut self) -> Result<AudioBlock, AudioError> {
        CaptureStream::read_block(self)
    }
}

impl BlockSink for PlaybackStream {
    fn write_block(&self, block: &AudioBlock) -> Result<(), AudioError> {
        PlaybackStream::write_block(self, block)
    }
}

impl DatagramTx for CallEndpoint {
    fn send_datagram(&self, payload: &[u8]) -> Result<(), NetworkError> {
        CallEndpoint::send_datagram(self, payload)
    }
}

impl DatagramRx for CallEndpoint {
    fn recv_datagram(&self, buf: &mut [u8]) -> Result<RecvOutcome, NetworkError> {
        CallEndpoint::recv_datagram(self, buf)
    }
}
