use std::ffi::CString;

use once_cell::sync::OnceCell;

use shim_bridge::MuteFlag;
use shim_logger::Log;

use crate::{Config, Result, StartupError};

/// The process-wide anchor. Replacement functions the module calls take no context
/// argument, so they reach the context through here.
static CONTEXT: OnceCell<Context> = OnceCell::new();

/// State shared by the render loop, the two bridges and the hooks the module calls.
#[derive(Debug)]
pub struct Context {
    config: Config,
    mute: MuteFlag,
    data_path: CString,
    root_path: CString,
}

impl Context {
    /// Builds a context without installing it.
    pub fn new(config: Config) -> Result<Self> {
        let paths = config.validate()?;

        Ok(Self { config, mute: MuteFlag::new(), data_path: paths.data, root_path: paths.root })
    }

    /// Builds the context and installs it as the process context. Only the first call
    /// succeeds.
    pub fn install(config: Config) -> Result<&'static Context> {
        let mut installed = false;

        let context = CONTEXT.get_or_try_init(|| {
            installed = true;
            Context::new(config)
        })?;

        if !installed {
            return Err(StartupError::ContextInstalled);
        }

        tracing::info!(target: Log::General, data_path = %context.config.data_path, "Installed process context");

        Ok(context)
    }

    /// The installed process context, if startup got that far.
    pub fn get() -> Option<&'static Context> {
        CONTEXT.get()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mute(&self) -> &MuteFlag {
        &self.mute
    }

    pub fn data_path(&self) -> &CString {
        &self.data_path
    }

    pub fn root_path(&self) -> &CString {
        &self.root_path
    }
}
