use std::ffi::c_int;
use std::mem;

use shim_bridge::input::{JoystickEventFn, KeyEventFn, TouchEventFn};
use shim_bridge::{ModuleInput, ModuleSound, SoundUpdateFn};
use shim_loader::{Address, SymbolLookup};
use shim_logger::Log;

use crate::{Result, StartupError};

pub type AppInitFn = unsafe extern "C" fn() -> c_int;
pub type AppUpdateFn = unsafe extern "C" fn() -> c_int;

pub const APP_INIT: &str = "Android_Karisma_AppInit";
pub const APP_UPDATE: &str = "Android_Karisma_AppUpdate";
pub const ON_TOUCH_EVENT: &str = "Android_Karisma_AppOnTouchEvent";
pub const ON_KEY_EVENT: &str = "Android_Karisma_AppOnKeyEvent";
pub const ON_JOYSTICK_EVENT: &str = "Android_Karisma_AppOnJoystickEvent";
pub const UPDATE_SOUND: &str = "Java_com_dle_bc2_KarismaBridge_nativeUpdateSound";

/// The module functions the host drives, looked up by name once the module is ready.
#[derive(Debug, Clone, Copy)]
pub struct EntryPoints {
    pub init: AppInitFn,
    pub update: AppUpdateFn,
    pub input: ModuleInput,
    pub sound: ModuleSound,
}

impl EntryPoints {
    /// Looks up all six entry points. Any one missing is fatal.
    pub fn resolve<M: SymbolLookup + ?Sized>(module: &M) -> Result<Self> {
        let find = |name: &'static str| -> Result<Address> {
            let address = module.lookup_symbol(name).ok_or(StartupError::MissingEntryPoint(name))?;

            if address.is_null() {
                return Err(StartupError::MissingEntryPoint(name));
            }

            tracing::debug!(target: Log::General, name, address = %address, "Found entry point");

            Ok(address)
        };

        // Each address is a function the module exports under that name, with the
        // signature its platform calls it with.
        unsafe {
            Ok(Self {
                init: mem::transmute::<usize, AppInitFn>(find(APP_INIT)?.get()),
                update: mem::transmute::<usize, AppUpdateFn>(find(APP_UPDATE)?.get()),
                input: ModuleInput {
                    touch: mem::transmute::<usize, TouchEventFn>(find(ON_TOUCH_EVENT)?.get()),
                    key: mem::transmute::<usize, KeyEventFn>(find(ON_KEY_EVENT)?.get()),
                    joystick: mem::transmute::<usize, JoystickEventFn>(find(ON_JOYSTICK_EVENT)?.get()),
                },
                sound: ModuleSound { update: mem::transmute::<usize, SoundUpdateFn>(find(UPDATE_SOUND)?.get()) },
            })
        }
    }
}
