//! Audio subsystem module

pub mod block;
pub mod capture;
pub mod device;
pub mod playback;

pub use block::AudioBlock;
pub use capture::CaptureStream;
pub use device::{get_device_by_id, list_devices, AudioDevice};
pub use playback::PlaybackStream;
