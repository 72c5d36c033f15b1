//! # LAN Voice Caller
//!
//! Low-latency two-way voice calls over UDP, carried as fixed-size
//! unencoded 16-bit PCM datagrams. One `caller` process runs two
//! independent pipelines against the same connected socket; an optional
//! `relay` server forwards each caller's datagrams to every other caller.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────── CALLER ────────────────────────────┐
//! │                                                                │
//! │  ┌────────────┐  read_block   ┌──────────┐  send datagram      │
//! │  │ Microphone ├──────────────►│  Uplink  ├─────────────┐       │
//! │  │  (cpal in) │               │   loop   │             │       │
//! │  └────────────┘               └──────────┘             ▼       │
//! │                                              ┌──────────────┐  │
//! │                                              │ UDP endpoint ├──┼──► peer / relay
//! │                                              │  (connected, │  │
//! │                                              │ 50ms timeout)├──┼─◄─ peer / relay
//! │  ┌────────────┐  write_block  ┌──────────┐  └───────┬──────┘  │
//! │  │  Speaker   │◄──────────────┤ Downlink │◄─────────┘         │
//! │  │ (cpal out) │ (or silence)  │   loop   │  recv / timeout    │
//! │  └────────────┘               └──────────┘                    │
//! │                                                               │
//! │           both loops observe one shared ShutdownFlag          │
//! └───────────────────────────────────────────────────────────────┘
//!
//! ┌──────────────────────────── RELAY ──────────────────────────────┐
//! │  ingress: recv_from ──► registry.touch ──► bounded queue        │
//! │  egress:  queue ──► send_to every peer except the source        │
//! │  prune:   drop peers idle longer than the TTL                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The uplink and downlink never exchange data; each converts between the
//! audio device clock and the network clock on its own. Lost or late
//! datagrams become silence on the receiving side, so the playback device
//! is fed exactly one block per iteration no matter what the network does.

pub mod audio;
pub mod config;
pub mod error;
pub mod link;
pub mod network;
pub mod relay;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default sample rate for voice calls
    pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

    /// Default frames (mono samples) exchanged per device call and per datagram
    pub const DEFAULT_FRAMES_PER_BUFFER: usize = 320;

    /// Voice streams are mono
    pub const CHANNELS: u16 = 1;

    /// Bytes per sample on the wire (little-endian i16)
    pub const BYTES_PER_SAMPLE: usize = 2;

    /// Default UDP port for the relay and for callers
    pub const DEFAULT_UDP_PORT: u16 = 9000;

    /// Default receive timeout before substituting silence, in milliseconds
    pub const DEFAULT_RECV_TIMEOUT_MS: u64 = 50;

    /// Capture-side chunk queue capacity, in device callbacks
    pub const CAPTURE_QUEUE_CHUNKS: usize = 32;

    /// Playback-side block queue capacity; small to keep latency bounded
    pub const PLAYBACK_QUEUE_BLOCKS: usize = 4;
}
