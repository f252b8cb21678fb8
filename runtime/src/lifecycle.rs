//! Drives the module from a file on disk to a running game.
//!
//! Every step is its own call and happens exactly once, in order:
//!
//! `Unloaded -> Relocated -> Resolved -> Patched -> CacheFlushed -> Initialized -> Running`
//!
//! A call made out of turn fails with [`StartupError::OutOfOrder`] and does nothing. Any
//! failure is fatal to startup; nothing is retried.

use std::fmt;
use std::thread;

use shim_bridge::input::TouchScale;
use shim_bridge::{AudioBridge, AudioOutput, InputBridge, InputSource, InputState, Presenter};
use shim_linker::{PatchBatch, PendingFlush, ResolutionTable};
use shim_loader::{Address, LoadedModule, ModuleLoader};
use shim_logger::Log;

use crate::entry::{AppUpdateFn, EntryPoints};
use crate::{imports, patches, Context, Result, StartupError};

pub const INPUT_THREAD: &str = "ctrl_thread";
pub const AUDIO_THREAD: &str = "sound_thread";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Unloaded,
    Relocated,
    Resolved,
    Patched,
    CacheFlushed,
    Initialized,
    Running,
}

impl Stage {
    /// The stage that has to be current for `self` to be entered.
    fn previous(self) -> Option<Stage> {
        match self {
            Stage::Unloaded => None,
            Stage::Relocated => Some(Stage::Unloaded),
            Stage::Resolved => Some(Stage::Relocated),
            Stage::Patched => Some(Stage::Resolved),
            Stage::CacheFlushed => Some(Stage::Patched),
            Stage::Initialized => Some(Stage::CacheFlushed),
            Stage::Running => Some(Stage::Initialized),
        }
    }
}

pub struct Orchestrator<L: ModuleLoader> {
    loader: L,
    context: &'static Context,
    stage: Stage,
    module: Option<L::Module>,
    pending: Option<PendingFlush>,
    entry: Option<EntryPoints>,
}

impl<L: ModuleLoader> fmt::Debug for Orchestrator<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("stage", &self.stage)
            .field("module", &self.module.as_ref().map(|m| m.path()))
            .finish()
    }
}

impl<L: ModuleLoader> Orchestrator<L> {
    pub fn new(loader: L, context: &'static Context) -> Self {
        Self { loader, context, stage: Stage::Unloaded, module: None, pending: None, entry: None }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn module(&self) -> Option<&L::Module> {
        self.module.as_ref()
    }

    fn enter(&self, attempted: Stage) -> Result<()> {
        if attempted.previous() != Some(self.stage) {
            return Err(StartupError::OutOfOrder { current: self.stage, attempted });
        }

        Ok(())
    }

    fn module_mut(&mut self, attempted: Stage) -> Result<&mut L::Module> {
        let current = self.stage;
        self.module.as_mut().ok_or(StartupError::OutOfOrder { current, attempted })
    }

    /// Loads the module from the configured path and applies its base relocations.
    pub fn load(&mut self) -> Result<()> {
        self.enter(Stage::Relocated)?;

        let path = self.context.config().module_path();
        let mut module = self.loader.load(&path)?;
        module.relocate()?;

        tracing::info!(target: Log::Loader, path = %path, "Module loaded and relocated");

        self.module = Some(module);
        self.stage = Stage::Relocated;
        Ok(())
    }

    /// Binds every import of the module through `table`.
    pub fn resolve(&mut self, table: &ResolutionTable) -> Result<()> {
        self.enter(Stage::Resolved)?;

        let module = self.module_mut(Stage::Resolved)?;
        let imports = module.imports()?;
        let bindings = table.resolve(&imports)?;
        module.bind_imports(&bindings)?;

        tracing::info!(
            target: Log::Linker,
            imports = bindings.len(),
            missing = ?table.missing_policy(),
            "Imports bound"
        );

        self.stage = Stage::Resolved;
        Ok(())
    }

    /// Applies `batch`. The module must not run until [`Orchestrator::flush_caches`].
    pub fn patch(&mut self, batch: PatchBatch) -> Result<()> {
        self.enter(Stage::Patched)?;

        let module = self.module_mut(Stage::Patched)?;
        let pending = batch.apply(module)?;

        self.pending = Some(pending);
        self.stage = Stage::Patched;
        Ok(())
    }

    pub fn flush_caches(&mut self) -> Result<()> {
        self.enter(Stage::CacheFlushed)?;

        let pending = self
            .pending
            .take()
            .ok_or(StartupError::OutOfOrder { current: self.stage, attempted: Stage::CacheFlushed })?;

        let module = self.module_mut(Stage::CacheFlushed)?;
        pending.flush(module);

        self.stage = Stage::CacheFlushed;
        Ok(())
    }

    /// Runs the module's constructors, prepares the presenter at the logical screen size,
    /// looks up the entry points and calls the module's own init.
    pub fn initialize<P: Presenter>(&mut self, presenter: &mut P) -> Result<()> {
        self.enter(Stage::Initialized)?;

        let config = self.context.config();
        let module = self.module_mut(Stage::Initialized)?;
        module.run_static_initializers()?;

        presenter.prepare(config.screen_width, config.screen_height);

        let entry = EntryPoints::resolve(&*module)?;

        let code = unsafe { (entry.init)() };
        tracing::info!(target: Log::Module, code, "Module initialized");

        self.entry = Some(entry);
        self.stage = Stage::Initialized;
        Ok(())
    }

    /// Starts the input and audio bridges on their own threads and hands back the render
    /// loop.
    pub fn start<S, O, P>(self, input: S, audio: O, presenter: P) -> Result<Running<P>>
    where
        S: InputSource + Send + 'static,
        O: AudioOutput + Send + 'static,
        P: Presenter,
    {
        self.enter(Stage::Running)?;

        let entry = self.entry.ok_or(StartupError::OutOfOrder { current: self.stage, attempted: Stage::Running })?;

        let context = self.context;
        let config = context.config();

        let state = InputState::new(
            TouchScale::new((config.touch_width, config.touch_height), (config.screen_width, config.screen_height)),
            config.stick_dead_zone,
        );
        let input_bridge = InputBridge::new(input, entry.input, state, config.input_poll_interval);

        spawn(INPUT_THREAD, config.thread_stack_size, move || {
            input_bridge.run();
        })?;

        let sound = entry.sound;

        spawn(AUDIO_THREAD, config.thread_stack_size, move || {
            let config = context.config();

            let bridge = AudioBridge::new(
                audio,
                sound,
                context.mute(),
                config.audio_format(),
                config.samples_per_buffer as usize,
                config.mute_poll_interval,
            );

            bridge.run();
        })?;

        tracing::info!(target: Log::General, "Module running");

        Ok(Running { update: entry.update, presenter, frames: 0 })
    }
}

fn spawn<F>(name: &'static str, stack_size: usize, f: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .stack_size(stack_size)
        .spawn(f)
        .map_err(|source| StartupError::ThreadSpawnFailure { name, source })?;

    Ok(())
}

/// The render loop, running on the thread that started the module.
#[derive(Debug)]
pub struct Running<P> {
    update: AppUpdateFn,
    presenter: P,
    frames: u64,
}

impl<P: Presenter> Running<P> {
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Lets the module update and draw one frame, then presents it.
    pub fn frame(&mut self) {
        unsafe {
            (self.update)();
        }

        self.presenter.present();
        self.frames += 1;
    }

    pub fn run(mut self) -> ! {
        loop {
            self.frame();
        }
    }
}

/// Takes the module from disk to `Running` with the shim's import table and patch set.
///
/// Hooks only see `context` if it is the installed process context.
pub fn startup<L, I, S, O, P>(
    loader: L,
    context: &'static Context,
    native_imports: I,
    input: S,
    audio: O,
    mut presenter: P,
) -> Result<Running<P>>
where
    L: ModuleLoader,
    I: IntoIterator<Item = (&'static str, Address)>,
    S: InputSource + Send + 'static,
    O: AudioOutput + Send + 'static,
    P: Presenter,
{
    let config = context.config();
    let table = imports::resolution_table(native_imports, config.missing_imports)?;

    let mut orchestrator = Orchestrator::new(loader, context);
    orchestrator.load()?;
    orchestrator.resolve(&table)?;
    orchestrator.patch(patches::game_patches(config))?;
    orchestrator.flush_caches()?;
    orchestrator.initialize(&mut presenter)?;
    orchestrator.start(input, audio, presenter)
}
