//! The two long-lived bridges between the host and the running module.
//!
//! The module was built for a platform that pushes input to it as discrete callbacks and
//! pulls audio through a runtime context object. The host instead offers polled input
//! and a blocking audio sink. `InputBridge` and `AudioBridge` each own one side of that
//! translation and run on their own thread for the life of the process; `FakeEnv` is
//! the stand-in context object the audio side hands to the module.

mod audio;
pub use audio::{
    AudioBridge, AudioFormat, CycleOutcome, ModuleSound, MuteFlag, PortBuffer, SoundUpdate, SoundUpdateFn,
};

mod env;
pub use env::FakeEnv;

mod host;
pub use host::{AudioOutput, AudioSink, InputSource, Presenter};

pub mod input;
pub use input::{InputBridge, InputDispatch, InputEvent, InputState, ModuleInput};
