//! Real-time audio output using rodio
//!
//! The device thread pulls blocks straight from an [`AudioRuntime`]: a rodio
//! [`Source`] renders the graph a block at a time and hands out the samples.
//! Control code keeps mutating the graph through its own runtime handle; the
//! runtime's mutex is the only synchronization point.

use crate::runtime::{AudioRuntime, RuntimeFactory};
use crate::Result;
use log::info;
use rodio::{OutputStream, Sink, Source};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Frames rendered per lock of the graph
const BLOCK_FRAMES: usize = 512;

/// Audio source that renders from the runtime graph
struct GraphSource {
    runtime: AudioRuntime,
    sample_rate: u32,
    channels: u16,
    finished: Arc<AtomicBool>,
    /// Internal block buffer (reduces lock contention)
    buffer: Vec<f32>,
    /// Current position in the internal buffer
    buffer_pos: usize,
}

impl GraphSource {
    fn new(runtime: AudioRuntime, channels: u16, finished: Arc<AtomicBool>) -> Self {
        let channels = channels.max(1);
        let len = BLOCK_FRAMES * channels as usize;
        GraphSource {
            sample_rate: runtime.sample_rate(),
            runtime,
            channels,
            finished,
            buffer: vec![0.0f32; len],
            buffer_pos: len, // Render a block on first pull
        }
    }
}

impl Source for GraphSource {
    fn current_frame_len(&self) -> Option<usize> {
        match self.buffer.len().saturating_sub(self.buffer_pos) {
            0 => Some(self.buffer.len()),
            left => Some(left),
        }
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

impl Iterator for GraphSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.finished.load(Ordering::Relaxed) {
            return None;
        }

        if self.buffer_pos >= self.buffer.len() {
            // Suspended or closed runtimes render silence, keeping the stream alive
            self.runtime.render(&mut self.buffer, self.channels);
            self.buffer_pos = 0;
        }

        let sample = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        Some(sample)
    }
}

/// Audio playback device bound to one runtime
pub struct AudioDevice {
    _stream: OutputStream,
    sink: Sink,
    runtime: AudioRuntime,
    finished: Arc<AtomicBool>,
}

impl AudioDevice {
    /// Open the default output device and start pulling from `runtime`
    ///
    /// # Arguments
    /// * `runtime` - Graph to render; the device keeps its own handle
    /// * `channels` - Number of output channels (1 = mono, 2 = stereo)
    pub fn new(runtime: AudioRuntime, channels: u16) -> Result<Self> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| format!("Failed to create audio stream: {}", e))?;

        let sink = Sink::try_new(&stream_handle)
            .map_err(|e| format!("Failed to create audio sink: {}", e))?;

        let finished = Arc::new(AtomicBool::new(false));
        let source = GraphSource::new(runtime.clone(), channels, Arc::clone(&finished));
        sink.append(source);

        info!(
            "audio device streaming at {} Hz, {} channel(s)",
            runtime.sample_rate(),
            channels.max(1)
        );
        Ok(AudioDevice {
            _stream: stream,
            sink,
            runtime,
            finished,
        })
    }

    /// Runtime being played
    pub fn runtime(&self) -> &AudioRuntime {
        &self.runtime
    }

    /// Pause the device stream
    pub fn pause(&self) {
        self.sink.pause();
    }

    /// Resume the device stream
    pub fn play(&self) {
        self.sink.play();
    }

    /// Stop pulling from the runtime; the stream ends
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }

    /// True until [`finish`](Self::finish) is called
    pub fn is_running(&self) -> bool {
        !self.finished.load(Ordering::Relaxed)
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        self.finish();
        self.sink.stop();
    }
}

/// Runtime factory that plays every runtime it creates on the default device
///
/// The devices live as long as the factory, which the owning subsystem keeps.
pub struct StreamingFactory {
    channels: u16,
    devices: Vec<AudioDevice>,
}

impl StreamingFactory {
    /// Stream runtimes with `channels` output channels
    pub fn new(channels: u16) -> Self {
        StreamingFactory {
            channels,
            devices: Vec::new(),
        }
    }
}

impl Default for StreamingFactory {
    fn default() -> Self {
        Self::new(2)
    }
}

impl RuntimeFactory for StreamingFactory {
    fn create_runtime(&mut self, sample_rate: u32) -> Result<AudioRuntime> {
        // Devices of runtimes the owner has since closed are only producing silence
        self.devices.retain(|device| {
            device.runtime().state() != crate::runtime::RuntimeState::Closed
        });
        let runtime = AudioRuntime::new(sample_rate)?;
        let device = AudioDevice::new(runtime.clone(), self.channels)?;
        self.devices.push(device);
        Ok(runtime)
    }
}
