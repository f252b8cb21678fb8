//! Adapters that implement the bridge traits over the host's function table.

use std::ffi::{c_char, c_int, CString};

use shim_bridge::input::{PadSample, TouchSample, MAX_TOUCHES};
use shim_bridge::{AudioFormat, AudioOutput, AudioSink, InputSource, PortBuffer, Presenter};
use shim_logger::Log;

/// Functions the host fills in before calling `shim_run`. Every pointer must stay valid
/// for the life of the process.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ForeignHostFns {
    /// Writes up to `max` front touch reports into `samples`; returns how many.
    pub touch_peek: unsafe extern "C" fn(samples: *mut TouchSample, max: c_int) -> c_int,

    /// Writes the current controller state into `pad`. Returns a negative value on failure.
    pub ctrl_peek: unsafe extern "C" fn(pad: *mut PadSample) -> c_int,

    /// Opens a 16-bit audio port; returns its handle, or a negative value on failure.
    pub audio_open_port: unsafe extern "C" fn(frames: c_int, sample_rate: c_int, channels: c_int) -> c_int,

    /// Blocks until one port-sized buffer of interleaved samples has been queued.
    pub audio_output: unsafe extern "C" fn(port: c_int, samples: *const i16) -> c_int,

    pub graphics_init: unsafe extern "C" fn(width: c_int, height: c_int),
    pub swap_buffers: unsafe extern "C" fn(),

    /// Shows a fatal startup error to the user.
    pub report_fatal: unsafe extern "C" fn(message: *const c_char),
}

impl ForeignHostFns {
    pub fn report_fatal(&self, message: &str) {
        let message = CString::new(message.replace('\0', " ")).unwrap_or_default();

        unsafe { (self.report_fatal)(message.as_ptr()) }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HostInput {
    fns: ForeignHostFns,
}

impl HostInput {
    pub fn new(fns: ForeignHostFns) -> Self {
        Self { fns }
    }
}

impl InputSource for HostInput {
    fn peek_touch(&mut self) -> [Option<TouchSample>; MAX_TOUCHES] {
        let mut samples = [TouchSample::default(); MAX_TOUCHES];
        let count = unsafe { (self.fns.touch_peek)(samples.as_mut_ptr(), MAX_TOUCHES as c_int) };
        let count = count.clamp(0, MAX_TOUCHES as c_int) as usize;

        let mut touches = [None; MAX_TOUCHES];
        for (slot, sample) in touches.iter_mut().zip(samples).take(count) {
            *slot = Some(sample);
        }

        touches
    }

    fn peek_pad(&mut self) -> PadSample {
        let mut pad = PadSample::default();

        if unsafe { (self.fns.ctrl_peek)(&mut pad) } < 0 {
            return PadSample::default();
        }

        pad
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HostAudio {
    fns: ForeignHostFns,
}

impl HostAudio {
    pub fn new(fns: ForeignHostFns) -> Self {
        Self { fns }
    }
}

impl AudioOutput for HostAudio {
    type Port = HostPort;

    fn open_port(self, format: AudioFormat) -> HostPort {
        let port = unsafe {
            (self.fns.audio_open_port)(format.frames as c_int, format.sample_rate as c_int, format.channels as c_int)
        };

        if port < 0 {
            tracing::error!(target: Log::Audio, code = port, "Unable to open audio port, sound will be silent");
        }

        HostPort { fns: self.fns, port, buffer: PortBuffer::new(format) }
    }
}

/// An open port. The host reads one whole port buffer per `audio_output` call, so
/// deliveries go through `buffer` to come out port-sized.
#[derive(Debug)]
pub struct HostPort {
    fns: ForeignHostFns,
    port: c_int,
    buffer: PortBuffer,
}

impl AudioSink for HostPort {
    fn output(&self, samples: &[i16]) {
        if self.port < 0 || samples.is_empty() {
            return;
        }

        self.buffer.split(samples, |buffer| unsafe {
            (self.fns.audio_output)(self.port, buffer.as_ptr());
        });
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HostPresenter {
    fns: ForeignHostFns,
}

impl HostPresenter {
    pub fn new(fns: ForeignHostFns) -> Self {
        Self { fns }
    }
}

impl Presenter for HostPresenter {
    fn prepare(&mut self, width: u32, height: u32) {
        unsafe { (self.fns.graphics_init)(width as c_int, height as c_int) }
    }

    fn present(&mut self) {
        unsafe { (self.fns.swap_buffers)() }
    }
}
