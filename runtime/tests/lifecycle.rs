use std::ffi::c_int;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use shim_bridge::input::{PadSample, TouchSample, MAX_TOUCHES};
use shim_bridge::{AudioFormat, AudioOutput, AudioSink, InputSource, Presenter};
use shim_linker::{Encoding, MissingPolicy, PatchBatch, PatchError, ResolveError};
use shim_loader::testing::{FakeLoader, FakeModule};
use shim_loader::{Address, LoadedModule};
use shim_runtime::{
    entry, imports, patches, Config, Context, Orchestrator, Stage, StartupError, AUDIO_THREAD, INPUT_THREAD,
};

const BASE: usize = 0x9800_0000;

static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);

extern "C" fn app_init() -> c_int {
    INIT_CALLS.fetch_add(1, Ordering::SeqCst);
    0
}

extern "C" fn app_update() -> c_int {
    0
}

extern "C" fn on_touch(_action: c_int, _x: c_int, _y: c_int, _id: c_int) -> c_int {
    0
}

extern "C" fn on_key(_action: c_int, _code: c_int) -> c_int {
    0
}

extern "C" fn on_joystick(_action: c_int, _x: f32, _y: f32, _id: c_int) -> c_int {
    0
}

extern "C" fn update_sound(_env: *const std::ffi::c_void, _unused: c_int, _kind: c_int, _len: usize) -> c_int {
    0
}

// Entry points for the one test that lets the module run. The bridge threads it starts
// never stop, so everything they touch is static.
static RUNNING_CONTEXT: Lazy<&'static Context> = Lazy::new(context);
static UPDATES: AtomicUsize = AtomicUsize::new(0);
static STICK_EVENTS: AtomicUsize = AtomicUsize::new(0);
static STICKS_ON_INPUT_THREAD: AtomicBool = AtomicBool::new(true);
static SOUND_PULLS: AtomicUsize = AtomicUsize::new(0);
static SOUND_ON_AUDIO_THREAD: AtomicBool = AtomicBool::new(true);

extern "C" fn running_init() -> c_int {
    0
}

extern "C" fn running_update() -> c_int {
    UPDATES.fetch_add(1, Ordering::SeqCst);
    0
}

extern "C" fn running_joystick(action: c_int, x: f32, y: f32, _id: c_int) -> c_int {
    if action != 3 || x != 0.0 || y != 0.0 || thread::current().name() != Some(INPUT_THREAD) {
        STICKS_ON_INPUT_THREAD.store(false, Ordering::SeqCst);
    }

    STICK_EVENTS.fetch_add(1, Ordering::SeqCst);
    0
}

extern "C" fn running_sound(_env: *const std::ffi::c_void, _unused: c_int, _kind: c_int, len: usize) -> c_int {
    if len != 8192 || thread::current().name() != Some(AUDIO_THREAD) {
        SOUND_ON_AUDIO_THREAD.store(false, Ordering::SeqCst);
    }

    SOUND_PULLS.fetch_add(1, Ordering::SeqCst);

    // One pull is enough; muting keeps the audio thread idling for the rest of the run.
    RUNNING_CONTEXT.mute().mute();
    0
}

fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);

    while Instant::now() < deadline {
        if condition() {
            return true;
        }

        thread::sleep(Duration::from_millis(1));
    }

    false
}

fn context() -> &'static Context {
    Box::leak(Box::new(Context::new(Config::default()).unwrap()))
}

fn module() -> FakeModule {
    FakeModule::new(BASE, 0x1000)
        .with_import("malloc")
        .with_import("printf")
        .with_import("getcwd")
        .with_symbol(patches::SCREEN_WIDTH, BASE + 0x800)
        .with_symbol(patches::LOCK_SOUND, BASE + 0x101)
        .with_symbol(entry::APP_INIT, app_init as *const () as usize)
        .with_symbol(entry::APP_UPDATE, app_update as *const () as usize)
        .with_symbol(entry::ON_TOUCH_EVENT, on_touch as *const () as usize)
        .with_symbol(entry::ON_KEY_EVENT, on_key as *const () as usize)
        .with_symbol(entry::ON_JOYSTICK_EVENT, on_joystick as *const () as usize)
        .with_symbol(entry::UPDATE_SOUND, update_sound as *const () as usize)
}

fn table() -> shim_linker::ResolutionTable {
    imports::resolution_table([("malloc", Address::new(0x1000))], MissingPolicy::Fatal).unwrap()
}

/// Replacement addresses of the real patch set are host function addresses, which need
/// not fit a 32-bit literal on a 64-bit test host.
fn batch() -> PatchBatch {
    PatchBatch::new()
        .data_i32(patches::SCREEN_WIDTH, 960)
        .hook(patches::LOCK_SOUND, Address::new(0x0002_0000), Encoding::Thumb16)
}

#[derive(Debug, Default)]
struct Screen {
    prepared: Option<(u32, u32)>,
}

impl Presenter for Screen {
    fn prepare(&mut self, width: u32, height: u32) {
        self.prepared = Some((width, height));
    }

    fn present(&mut self) {}
}

#[derive(Debug)]
struct CountingScreen(Arc<AtomicUsize>);

impl Presenter for CountingScreen {
    fn prepare(&mut self, _width: u32, _height: u32) {}

    fn present(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct Idle;

impl InputSource for Idle {
    fn peek_touch(&mut self) -> [Option<TouchSample>; MAX_TOUCHES] {
        [None, None]
    }

    fn peek_pad(&mut self) -> PadSample {
        PadSample::default()
    }
}

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

fn orchestrator() -> Orchestrator<FakeLoader> {
    Orchestrator::new(FakeLoader::new(module()), context())
}

#[test]
fn startup_steps_run_in_order() {
    let mut orchestrator = orchestrator();
    let mut screen = Screen::default();

    orchestrator.load().unwrap();
    assert_eq!(orchestrator.stage(), Stage::Relocated);
    assert_eq!(orchestrator.module().unwrap().path(), "ux0:data/bc2/libbc2.so");

    orchestrator.resolve(&table()).unwrap();
    orchestrator.patch(batch()).unwrap();
    orchestrator.flush_caches().unwrap();
    orchestrator.initialize(&mut screen).unwrap();

    assert_eq!(orchestrator.stage(), Stage::Initialized);
    assert_eq!(screen.prepared, Some((960, 544)));
    assert_eq!(INIT_CALLS.load(Ordering::SeqCst), 1);

    let module = orchestrator.module().unwrap();
    assert_eq!(module.calls, vec!["relocate", "bind", "write", "write", "flush", "init"]);
    assert_eq!(module.bytes_at(BASE + 0x800, 4), 960i32.to_le_bytes().to_vec());

    let bound = module.bound.iter().map(|b| b.name.as_str()).collect::<Vec<_>>();
    assert_eq!(bound, vec!["malloc", "printf", "getcwd"]);
    assert_eq!(module.bound[0].address, Address::new(0x1000));
}

#[test]
fn running_renders_frames_while_the_bridges_poll() {
    let module = module()
        .with_symbol(entry::APP_INIT, running_init as *const () as usize)
        .with_symbol(entry::APP_UPDATE, running_update as *const () as usize)
        .with_symbol(entry::ON_JOYSTICK_EVENT, running_joystick as *const () as usize)
        .with_symbol(entry::UPDATE_SOUND, running_sound as *const () as usize);

    let mut orchestrator = Orchestrator::new(FakeLoader::new(module), *RUNNING_CONTEXT);
    orchestrator.load().unwrap();
    orchestrator.resolve(&table()).unwrap();
    orchestrator.patch(batch()).unwrap();
    orchestrator.flush_caches().unwrap();
    orchestrator.initialize(&mut Screen::default()).unwrap();

    let presents = Arc::new(AtomicUsize::new(0));
    let mut running = orchestrator.start(Idle, Silence, CountingScreen(presents.clone())).unwrap();
    assert_eq!(running.frames(), 0);

    running.frame();
    running.frame();

    assert_eq!(running.frames(), 2);
    assert_eq!(UPDATES.load(Ordering::SeqCst), 2);
    assert_eq!(presents.load(Ordering::SeqCst), 2);

    // Sticks at rest are still reported on every poll.
    assert!(wait_for(|| STICK_EVENTS.load(Ordering::SeqCst) >= 2));
    assert!(STICKS_ON_INPUT_THREAD.load(Ordering::SeqCst));

    assert!(wait_for(|| SOUND_PULLS.load(Ordering::SeqCst) >= 1));
    assert!(SOUND_ON_AUDIO_THREAD.load(Ordering::SeqCst));
}

#[test]
fn patching_before_resolution_is_refused() {
    let mut orchestrator = orchestrator();
    orchestrator.load().unwrap();

    let result = orchestrator.patch(batch());

    assert!(matches!(
        result,
        Err(StartupError::OutOfOrder { current: Stage::Relocated, attempted: Stage::Patched })
    ));
    assert_eq!(orchestrator.stage(), Stage::Relocated);
    assert_eq!(orchestrator.module().unwrap().count("write"), 0);
}

#[test]
fn running_is_unreachable_before_the_cache_flush() {
    let mut orchestrator = orchestrator();
    orchestrator.load().unwrap();
    orchestrator.resolve(&table()).unwrap();
    orchestrator.patch(batch()).unwrap();

    let mut screen = Screen::default();
    assert!(matches!(
        orchestrator.initialize(&mut screen),
        Err(StartupError::OutOfOrder { current: Stage::Patched, attempted: Stage::Initialized })
    ));
    assert_eq!(screen.prepared, None);

    let result = orchestrator.start(Idle, Silence, screen);
    assert!(matches!(result, Err(StartupError::OutOfOrder { current: Stage::Patched, attempted: Stage::Running })));
}

#[test]
fn steps_cannot_repeat() {
    let mut orchestrator = orchestrator();
    orchestrator.load().unwrap();

    assert!(matches!(
        orchestrator.load(),
        Err(StartupError::OutOfOrder { current: Stage::Relocated, attempted: Stage::Relocated })
    ));
}

#[test]
fn unresolved_import_is_fatal() {
    let module = FakeModule::new(BASE, 0x100).with_import("malloc").with_import("fork");
    let mut orchestrator = Orchestrator::new(FakeLoader::new(module), context());
    orchestrator.load().unwrap();

    match orchestrator.resolve(&table()) {
        Err(StartupError::Resolve(ResolveError::Unresolved(names))) => assert_eq!(names, vec!["fork"]),
        other => panic!("expected an unresolved import, got {:?}", other),
    }

    assert_eq!(orchestrator.stage(), Stage::Relocated);
    assert!(orchestrator.module().unwrap().bound.is_empty());
}

#[test]
fn stub_policy_lets_unknown_imports_through() {
    let module = FakeModule::new(BASE, 0x100).with_import("fork");
    let mut orchestrator = Orchestrator::new(FakeLoader::new(module), context());
    let table = imports::resolution_table(std::iter::empty(), MissingPolicy::StubZero).unwrap();

    orchestrator.load().unwrap();
    orchestrator.resolve(&table).unwrap();

    assert_eq!(orchestrator.module().unwrap().bound[0].address, shim_linker::stubs::ret0_address());
}

#[test]
fn missing_patch_target_is_fatal() {
    let mut orchestrator = orchestrator();
    orchestrator.load().unwrap();
    orchestrator.resolve(&table()).unwrap();

    let result = orchestrator.patch(batch().hook("not_in_module", Address::new(0x2000), Encoding::Arm32));

    assert!(matches!(result, Err(StartupError::Patch(PatchError::SymbolNotFound("not_in_module")))));
    assert_eq!(orchestrator.stage(), Stage::Resolved);
}

#[test]
fn missing_entry_point_is_fatal() {
    let module = FakeModule::new(BASE, 0x1000)
        .with_symbol(patches::SCREEN_WIDTH, BASE + 0x800)
        .with_symbol(patches::LOCK_SOUND, BASE + 0x101)
        .with_symbol(entry::APP_INIT, app_init as *const () as usize);

    let mut orchestrator = Orchestrator::new(FakeLoader::new(module), context());
    orchestrator.load().unwrap();
    orchestrator.resolve(&table()).unwrap();
    orchestrator.patch(batch()).unwrap();
    orchestrator.flush_caches().unwrap();

    let result = orchestrator.initialize(&mut Screen::default());

    assert!(matches!(result, Err(StartupError::MissingEntryPoint(entry::APP_UPDATE))));
}

#[test]
fn load_failure_is_fatal() {
    let mut loader = FakeLoader::new(module());
    shim_loader::ModuleLoader::load(&mut loader, "elsewhere.so").unwrap();

    let mut orchestrator = Orchestrator::new(loader, context());

    assert!(matches!(orchestrator.load(), Err(StartupError::Loader(_))));
    assert_eq!(orchestrator.stage(), Stage::Unloaded);
}
