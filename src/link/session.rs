//! Call lifecycle coordination
//!
//! Owns startup and shutdown ordering around the two pipelines. The
//! devices and the endpoint are confirmed open before either pipeline
//! thread starts; once the stop flag is raised (Ctrl-C, a fatal pipeline
//! error, or a normal exit request) both threads are joined before any
//! resource is released, and the teardown runs exactly once.

use std::thread;
use std::time::Duration;

use crate::audio::capture::CaptureStream;
use crate::audio::device::{resolve_input_device, resolve_output_device};
use crate::audio::playback::PlaybackStream;
use crate::config::CallConfig;
use crate::error::Error;
use crate::link::{downlink, uplink, ShutdownFlag};
use crate::network::endpoint::CallEndpoint;

/// A fully prepared two-way voice call: open devices, a connected
/// endpoint, and the shared stop flag.
pub struct CallSession {
    capture: CaptureStream,
    playback: PlaybackStream,
    endpoint: CallEndpoint,
    stop: ShutdownFlag,
    frames_per_buffer: usize,
}

impl CallSession {
    /// Open both device streams and connect the endpoint. Any failure
    /// here is a startup error; no pipeline has run yet.
    pub fn open(config: &CallConfig, stop: ShutdownFlag) -> Result<Self, Error> {
        config.validate().map_err(Error::Config)?;

        let input = resolve_input_device(config.input_device.as_deref())?;
        let output = resolve_output_device(config.output_device.as_deref())?;
        tracing::info!(input = %input.name, output = %output.name, "using audio devices");

        let capture = CaptureStream::open(input, config.sample_rate, config.frames_per_buffer)?;
        let playback = PlaybackStream::open(output, config.sample_rate)?;

        let endpoint = CallEndpoint::connect(
            &config.server,
            Duration::from_millis(config.recv_timeout_ms),
        )?;
        tracing::info!(
            local = %endpoint.local_addr()?,
            peer = %endpoint.peer_addr()?,
            "voice endpoint connected"
        );

        Ok(Self {
            capture,
            playback,
            endpoint,
            stop,
            frames_per_buffer: config.frames_per_buffer,
        })
    }

    /// Run both pipelines until the stop flag is raised, then tear down
    /// in order: join pipelines, stop capture, stop playback, drop the
    /// transport. Returns the first pipeline error, if any.
    pub fn run(self) -> Result<(), Error> {
        let Self {
            mut capture,
            mut playback,
            endpoint,
            stop,
            frames_per_buffer,
        } = self;

        tracing::info!("call running, press Ctrl-C to hang up");

        let (uplink_result, downlink_result) = thread::scope(|s| {
            let uplink_handle = thread::Builder::new()
                .name("voice-uplink".to_string())
                .spawn_scoped(s, || uplink::run(&mut capture, &endpoint, &stop));
            let downlink_handle = thread::Builder::new()
                .name("voice-downlink".to_string())
                .spawn_scoped(s, || {
                    downlink::run(&endpoint, &playback, &stop, frames_per_buffer)
                });

            // If a spawn failed, the flag stops whichever thread did start
            if uplink_handle.is_err() || downlink_handle.is_err() {
                stop.raise();
            }

            let uplink_result = match uplink_handle {
                Ok(handle) => handle
                    .join()
                    .unwrap_or_else(|_| Err(Error::Pipeline("uplink panicked".to_string()))),
                Err(e) => Err(Error::Io(e)),
            };
            let downlink_result = match downlink_handle {
                Ok(handle) => handle
                    .join()
                    .unwrap_or_else(|_| Err(Error::Pipeline("downlink panicked".to_string()))),
                Err(e) => Err(Error::Io(e)),
            };

            (uplink_result, downlink_result)
        });

        tracing::info!("pipelines stopped, releasing devices");
        capture.stop();
        playback.stop();
        drop(capture);
        drop(playback);
        drop(endpoint);

        uplink_result.and(downlink_result)
    }

    pub fn stop_flag(&self) -> ShutdownFlag {
        self.stop.clone()
    }
}
