//! Blocking audio playback to an output device
//!
//! Mirror image of the capture side: the cpal output stream lives on its
//! own thread and pulls sample blocks from a small bounded channel. The
//! writer's blocking `write_block` is paced by the channel capacity, and
//! a callback that runs dry emits zeros and flags an underflow, reported
//! distinctly on the next write.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::Sample;
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::block::AudioBlock;
use crate::audio::device::AudioDevice;
use crate::constants::{CHANNELS, PLAYBACK_QUEUE_BLOCKS};
use crate::error::AudioError;

/// Playback stream exposing a blocking write of fixed-size sample blocks.
pub struct PlaybackStream {
    running: Arc<AtomicBool>,
    underflowed: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<AudioError>>>,
    block_tx: Sender<Vec<i16>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl PlaybackStream {
    /// Open and start playback on `device` at `sample_rate`, mono.
    pub fn open(device: AudioDevice, sample_rate: u32) -> Result<Self, AudioError> {
        let config = cpal::StreamConfig {
            channels: CHANNELS,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let running = Arc::new(AtomicBool::new(true));
        let underflowed = Arc::new(AtomicBool::new(false));
        let failure = Arc::new(Mutex::new(None));
        let (block_tx, block_rx) = bounded::<Vec<i16>>(PLAYBACK_QUEUE_BLOCKS);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let running_loop = running.clone();
        let running_err = running.clone();
        let underflowed_cb = underflowed.clone();
        let failure_err = failure.clone();
        let device_name = device.name.clone();

        let handle = thread::Builder::new()
            .name("voice-playback".to_string())
            .spawn(move || {
                let cpal_device = device.into_inner();
                let mut queued: VecDeque<i16> = VecDeque::new();

                let stream = cpal_device.build_output_stream(
                    &config,
                    move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut starved = false;
                        for slot in out.iter_mut() {
                            if queued.is_empty() {
                                if let Ok(block) = block_rx.try_recv() {
                                    queued.extend(block);
                                }
                            }
                            match queued.pop_front() {
                                Some(sample) => *slot = f32::from_sample(sample),
                                None => {
                                    *slot = Sample::EQUILIBRIUM;
                                    starved = true;
                                }
                            }
                        }
                        if starved {
                            underflowed_cb.store(true, Ordering::Release);
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
                    "playback thread for {} died during startup",
                    device_name
                )));
            }
        }

        tracing::debug!(device = %device_name, sample_rate, "playback stream started");

        Ok(Self {
            running,
            underflowed,
            failure,
            block_tx,
            thread_handle: Some(handle),
        })
    }

    /// Queue one block for the device, blocking while the playback queue
    /// is full.
    ///
    /// Returns `Err(AudioError::Underflow)` when the device ran dry since
    /// the last write. The block has still been queued in that case; the
    /// report only means the device had to insert filler of its own.
    pub fn write_block(&self, block: &AudioBlock) -> Result<(), AudioError> {
        if self.block_tx.send(block.samples().to_vec()).is_err() {
            return Err(self.failure.lock().take().unwrap_or(AudioError::Closed));
        }
        if self.underflowed.swap(false, Ordering::AcqRel) {
            return Err(AudioError::Underflow);
        }
        Ok(())
    }

    /// Stop the stream and join the playback thread.
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

impl Drop for PlaybackStream {
    fn drop(&mut self) {
        self.stop();
    }
}
