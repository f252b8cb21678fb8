//! Pulls audio out of the module and into the host sink.

use std::cell::RefCell;
use std::ffi::{c_int, c_void};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use shim_logger::Log;

use crate::env::FakeEnv;
use crate::host::AudioOutput;

/// Whether the module has asked for sound to be off.
///
/// Written only by the module's enable/disable calls and read only by the audio thread.
/// A stale read costs at most one extra or one skipped cycle, so relaxed ordering is all
/// it needs.
#[derive(Debug, Default)]
pub struct MuteFlag(AtomicBool);

impl MuteFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn mute(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn unmute(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The format the audio port is opened with. Samples are always 16-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,

    /// Frames per buffer handed to the port.
    pub frames: u32,
}

impl AudioFormat {
    /// Interleaved stereo, with room for `samples` 16-bit samples per buffer.
    pub fn stereo(sample_rate: u32, samples: u32) -> Self {
        Self { sample_rate, channels: 2, frames: samples / 2 }
    }

    /// Interleaved samples in one port buffer.
    pub fn buffer_len(&self) -> usize {
        self.frames as usize * self.channels as usize
    }
}

/// Cuts deliveries into whole port buffers.
///
/// A host port reads exactly [`AudioFormat::buffer_len`] samples per call whatever the
/// module handed over. Full buffers are passed through as they are; a short tail is
/// copied into a scratch buffer and zero-padded.
#[derive(Debug)]
pub struct PortBuffer {
    len: usize,
    scratch: RefCell<Vec<i16>>,
}

impl PortBuffer {
    pub fn new(format: AudioFormat) -> Self {
        let len = format.buffer_len();
        Self { len, scratch: RefCell::new(vec![0; len]) }
    }

    pub fn buffer_len(&self) -> usize {
        self.len
    }

    /// Calls `output` once per port buffer's worth of `samples`.
    pub fn split(&self, samples: &[i16], mut output: impl FnMut(&[i16])) {
        if self.len == 0 {
            return;
        }

        if samples.len() != self.len {
            tracing::debug!(
                target: Log::Audio,
                delivered = samples.len(),
                port = self.len,
                "Delivery does not match the port buffer"
            );
        }

        for chunk in samples.chunks(self.len) {
            if chunk.len() == self.len {
                output(chunk);
                continue;
            }

            let mut scratch = self.scratch.borrow_mut();
            scratch[..chunk.len()].copy_from_slice(chunk);
            scratch[chunk.len()..].fill(0);
            output(&scratch);
        }
    }
}

/// Asks the module to produce one buffer. The module delivers it synchronously, through
/// the fake context, before returning.
pub trait SoundUpdate {
    fn update(&mut self, env: &FakeEnv, samples: usize);
}

pub type SoundUpdateFn = unsafe extern "C" fn(env: *const c_void, unused: c_int, kind: c_int, length: usize) -> c_int;

/// The module's audio update entry point.
#[derive(Debug, Clone, Copy)]
pub struct ModuleSound {
    pub update: SoundUpdateFn,
}

impl SoundUpdate for ModuleSound {
    fn update(&mut self, env: &FakeEnv, samples: usize) {
        unsafe {
            (self.update)(env.as_ptr(), 0, 0, samples);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Sound was muted; the thread slept instead.
    Skipped,

    /// The module was asked for a buffer.
    Pulled,
}

/// The audio thread.
#[derive(Debug)]
pub struct AudioBridge<'a, U> {
    env: Box<FakeEnv>,
    update: U,
    mute: &'a MuteFlag,
    samples_per_buffer: usize,
    idle: Duration,
}

impl<'a, U: SoundUpdate> AudioBridge<'a, U> {
    /// Opens the host port and builds the fake context around it. The port stays open
    /// for as long as the bridge lives.
    pub fn new<O: AudioOutput>(
        output: O,
        update: U,
        mute: &'a MuteFlag,
        format: AudioFormat,
        samples_per_buffer: usize,
        idle: Duration,
    ) -> Self {
        let port = output.open_port(format);

        tracing::info!(
            target: Log::Audio,
            sample_rate = format.sample_rate,
            frames = format.frames,
            "Opened audio port"
        );

        Self { env: FakeEnv::new(Box::new(port)), update, mute, samples_per_buffer, idle }
    }

    /// One iteration of the audio loop.
    pub fn cycle(&mut self) -> CycleOutcome {
        if self.mute.is_muted() {
            thread::sleep(self.idle);
            return CycleOutcome::Skipped;
        }

        self.update.update(&self.env, self.samples_per_buffer);
        CycleOutcome::Pulled
    }

    pub fn run(mut self) -> ! {
        tracing::info!(target: Log::Audio, samples = self.samples_per_buffer, "Audio bridge running");

        let mut muted = self.mute.is_muted();

        loop {
            if self.cycle() == CycleOutcome::Skipped {
                if !muted {
                    tracing::debug!(target: Log::Audio, "Sound disabled by module");
                    muted = true;
                }
            } else if muted {
                tracing::debug!(target: Log::Audio, "Sound enabled by module");
                muted = false;
            }
        }
    }
}
