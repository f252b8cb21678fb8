use std::ffi::CString;
use std::time::Duration;

use shim_bridge::AudioFormat;
use shim_linker::MissingPolicy;

use crate::{Result, StartupError};

pub const DATA_PATH: &str = "ux0:data/bc2";
pub const MODULE_FILE: &str = "libbc2.so";
pub const ROOT_PATH: &str = "ux0:";

/// Everything the shim needs to know up front. `Default` describes the one module and
/// host this shim targets; the host may override the data path at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory the module reads and writes its data in. Also where it is loaded from.
    pub data_path: String,
    pub module_file: String,

    /// The path the module's filesystem layer treats as the root.
    pub root_path: String,

    /// Logical screen size the module renders at.
    pub screen_width: u32,
    pub screen_height: u32,

    /// Coordinate space of the host touch panel.
    pub touch_width: u32,
    pub touch_height: u32,

    pub sample_rate: u32,
    pub samples_per_buffer: u32,

    pub input_poll_interval: Duration,
    pub mute_poll_interval: Duration,
    pub stick_dead_zone: f32,

    /// Stack size of each bridge thread.
    pub thread_stack_size: usize,

    /// What happens to imports the resolution table doesn't know.
    pub missing_imports: MissingPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: DATA_PATH.to_string(),
            module_file: MODULE_FILE.to_string(),
            root_path: ROOT_PATH.to_string(),
            screen_width: 960,
            screen_height: 544,
            touch_width: 1920,
            touch_height: 1088,
            sample_rate: 44100,
            samples_per_buffer: 8192,
            input_poll_interval: Duration::from_millis(1),
            mute_poll_interval: Duration::from_millis(1),
            stick_dead_zone: 0.25,
            thread_stack_size: 128 * 1024,
            missing_imports: MissingPolicy::Fatal,
        }
    }
}

impl Config {
    /// A default configuration rooted at another data directory.
    pub fn with_data_path(data_path: impl Into<String>) -> Self {
        Self { data_path: data_path.into(), ..Self::default() }
    }

    pub fn module_path(&self) -> String {
        format!("{}/{}", self.data_path.trim_end_matches('/'), self.module_file)
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat::stereo(self.sample_rate, self.samples_per_buffer)
    }

    /// Checks the configuration and converts the strings handed to the module.
    pub fn validate(&self) -> Result<ModulePaths> {
        if self.screen_width == 0 || self.screen_height == 0 || self.touch_width == 0 || self.touch_height == 0 {
            return Err(StartupError::InvalidConfig { field: "screen size", reason: "must be non-zero".into() });
        }

        if self.samples_per_buffer < 2 || self.samples_per_buffer % 2 != 0 {
            return Err(StartupError::InvalidConfig {
                field: "samples_per_buffer",
                reason: "must be a positive, even sample count".into(),
            });
        }

        if !(0.0..1.0).contains(&self.stick_dead_zone) {
            return Err(StartupError::InvalidConfig { field: "stick_dead_zone", reason: "must be in 0.0..1.0".into() });
        }

        let data = CString::new(self.data_path.as_str())
            .map_err(|e| StartupError::InvalidConfig { field: "data_path", reason: e.to_string() })?;

        let root = CString::new(self.root_path.as_str())
            .map_err(|e| StartupError::InvalidConfig { field: "root_path", reason: e.to_string() })?;

        Ok(ModulePaths { data, root })
    }
}

/// Paths in the form the module's hooks hand out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePaths {
    pub data: CString,
    pub root: CString,
}
