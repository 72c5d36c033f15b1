//! Blocking audio capture from an input device
//!
//! cpal delivers audio through callbacks and its `Stream` handle is not
//! `Send`, so the stream lives on a dedicated capture thread. Callbacks
//! convert incoming samples to i16 and hand them to the reader through a
//! bounded channel; the reader side exposes a blocking `read_block` that
//! reports dropped data distinctly from stream failure.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::Sample;
use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::block::AudioBlock;
use crate::audio::device::AudioDevice;
use crate::constants::{CAPTURE_QUEUE_CHUNKS, CHANNELS};
use crate::error::AudioError;

/// Capture stream exposing a blocking read of fixed-size sample blocks.
pub struct CaptureStream {
    running: Arc<AtomicBool>,
    overflowed: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<AudioError>>>,
    chunk_rx: Receiver<Vec<i16>>,
    pending: Vec<i16>,
    frames_per_buffer: usize,
    thread_handle: Option<JoinHandle<()>>,
}

impl CaptureStream {
    /// Open and start capturing from `device` at `sample_rate`, mono.
    ///
    /// Returns once the underlying stream is confirmed running, so the
    /// caller can treat any later failure as a runtime error rather than
    /// a startup one.
    pub fn open(
        device: AudioDevice,
        sample_rate: u32,
        frames_per_buffer: usize,
    ) -> Result<Self, AudioError> {
        let config = cpal::StreamConfig {
            channels: CHANNELS,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let running = Arc::new(AtomicBool::new(true));
        let overflowed = Arc::new(AtomicBool::new(false));
        let failure = Arc::new(Mutex::new(None));
        let (chunk_tx, chunk_rx) = bounded::<Vec<i16>>(CAPTURE_QUEUE_CHUNKS);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let running_cb = running.clone();
        let running_loop = running.clone();
        let running_err = running.clone();
        let overflowed_cb = overflowed.clone();
        let failure_err = failure.clone();
        let device_name = device.name.clone();

        let handle = thread::Builder::new()
            .name("voice-capture".to_string())
            .spawn(move || {
                let cpal_device = device.into_inner();

                let stream = cpal_device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !running_cb.load(Ordering::Relaxed) {
                            return;
                        }
                        let chunk: Vec<i16> =
                            data.iter().map(|s| i16::from_sample(*s)).collect();
                        if chunk_tx.try_send(chunk).is_err() {
                            // Reader fell behind and this chunk is gone;
                            // surface it as an overflow on the next read.
                            overflowed_cb.store(true, Ordering::Release);
                        }
                    },
                    move |err| {
                        *failure_err.lock() = Some(AudioError::Stream(err.to_string()));
                        running_err.store(false, Ordering::SeqCst);
                    },
                    None,
                );

                let stream = match stream {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(AudioError::StreamBuild(e.to_string())));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::StreamBuild(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while running_loop.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(10));
                }
                // Stream and the callback's channel sender drop here
            })
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(AudioError::StreamBuild(format!(
                    "capture thread for {} died during startup",
                    device_name
                )));
            }
        }

        tracing::debug!(device = %device_name, sample_rate, "capture stream started");

        Ok(Self {
            running,
            overflowed,
            failure,
            chunk_rx,
            pending: Vec::with_capacity(frames_per_buffer * 2),
            frames_per_buffer,
            thread_handle: Some(handle),
        })
    }

    /// Block until one full buffer of samples is available.
    ///
    /// Returns `Err(AudioError::Overflow)` when the device side dropped
    /// data since the last read; the gap makes any partially accumulated
    /// samples misaligned, so they are discarded and the caller is
    /// expected to simply read again.
    pub fn read_block(&mut self) -> Result<AudioBlock, AudioError> {
        if self.overflowed.swap(false, Ordering::AcqRel) {
            self.pending.clear();
            return Err(AudioError::Overflow);
        }

        while self.pending.len() < self.frames_per_buffer {
            match self.chunk_rx.recv() {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(_) => {
                    return Err(self.failure.lock().take().unwrap_or(AudioError::Closed));
                }
            }
        }

        let samples: Vec<i16> = self.pending.drain(..self.frames_per_buffer).collect();
        Ok(AudioBlock::from_samples(samples))
    }

    /// Stop the stream and join the capture thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.stop();
    }
}
