//! What the bridges need from the host platform.

use crate::audio::AudioFormat;
use crate::input::{PadSample, TouchSample, MAX_TOUCHES};

/// Non-blocking input peeks.
pub trait InputSource {
    /// The current front touch reports, slot by slot. A slot without a finger is `None`.
    fn peek_touch(&mut self) -> [Option<TouchSample>; MAX_TOUCHES];

    /// The current controller state.
    fn peek_pad(&mut self) -> PadSample;
}

/// A host audio port. `output` blocks until the buffer has been queued.
pub trait AudioSink: Send {
    /// Plays interleaved 16-bit stereo samples in the format the port was opened with.
    fn output(&self, samples: &[i16]);
}

/// Opens the audio port. The port is never closed.
pub trait AudioOutput {
    type Port: AudioSink + 'static;

    fn open_port(self, format: AudioFormat) -> Self::Port;
}

/// The graphics backend the render loop draws through.
pub trait Presenter {
    /// Sets up the backend for the logical screen size. Called once, before the module
    /// initializes.
    fn prepare(&mut self, width: u32, height: u32);

    /// Shows the frame the module just rendered. May block on vsync.
    fn present(&mut self);
}
