use std::ffi::{CStr, CString};
use std::time::Duration;

use once_cell::sync::Lazy;

use shim_bridge::{AudioBridge, AudioFormat, AudioOutput, AudioSink, CycleOutcome, FakeEnv, SoundUpdate};
use shim_runtime::hooks::{self, ModulePath};
use shim_runtime::{Config, Context, StartupError};

static CONTEXT: Lazy<&'static Context> = Lazy::new(|| Context::install(Config::default()).unwrap());

struct Silence;

impl AudioSink for Silence {
    fn output(&self, _samples: &[i16]) {}
}

impl AudioOutput for Silence {
    type Port = Silence;

    fn open_port(self, _format: AudioFormat) -> Silence {
        self
    }
}

#[derive(Default)]
struct CountingModule {
    calls: usize,
}

impl SoundUpdate for CountingModule {
    fn update(&mut self, _env: &FakeEnv, _samples: usize) {
        self.calls += 1;
    }
}

#[test]
fn context_installs_once() {
    let context = *CONTEXT;

    assert!(std::ptr::eq(Context::get().unwrap(), context));
    assert!(matches!(Context::install(Config::default()), Err(StartupError::ContextInstalled)));
}

#[test]
fn sound_toggles_drive_the_audio_loop() {
    let context = *CONTEXT;
    let mut bridge = AudioBridge::new(
        Silence,
        CountingModule::default(),
        context.mute(),
        context.config().audio_format(),
        8192,
        Duration::from_millis(1),
    );

    hooks::disable_sound();
    assert!(context.mute().is_muted());
    assert_eq!(bridge.cycle(), CycleOutcome::Skipped);

    hooks::enable_sound();
    assert!(!context.mute().is_muted());
    assert_eq!(bridge.cycle(), CycleOutcome::Pulled);
}

#[test]
fn path_hooks_return_the_data_path() {
    Lazy::force(&CONTEXT);

    let path = unsafe { CStr::from_ptr(hooks::get_app_path()) };

    assert_eq!(path.to_str().unwrap(), "ux0:data/bc2");
}

#[test]
fn only_the_host_root_is_root() {
    Lazy::force(&CONTEXT);

    let check = |s: &str| {
        let text = CString::new(s).unwrap();
        let object = ModulePath { vtable: std::ptr::null(), path: text.as_ptr(), path_len: s.len() };
        let handle: *const ModulePath = &object;

        unsafe { hooks::path_is_root(&handle) }
    };

    assert_eq!(check("ux0:"), 1);
    assert_eq!(check("ux0:data"), 0);
    assert_eq!(check("/"), 0);
}
