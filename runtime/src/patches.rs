use shim_linker::{stubs, Encoding, PatchBatch};
use shim_loader::Address;

use crate::{hooks, Config};

pub const SCREEN_WIDTH: &str = "_ZN3krm3sal12SCREEN_WIDTHE";
pub const SCREEN_HEIGHT: &str = "_ZN3krm3sal13SCREEN_HEIGHTE";

pub const NET_INIT: &str = "_ZN3krm10krtNetInitEv";
pub const DEBUG_MGR_INIT: &str = "_ZN3krm3krt3dbg15krtDebugMgrInitEPNS0_16CApplicationBaseE";
pub const PATH_IS_ROOT: &str = "_ZNK3krm3krt2io5CPath6IsRootEv";

pub const GET_APP_READ_PATH: &str = "Android_KarismaBridge_GetAppReadPath";
pub const GET_APP_WRITE_PATH: &str = "Android_KarismaBridge_GetAppWritePath";
pub const GET_KEYBOARD_OPENED: &str = "Android_KarismaBridge_GetKeyboardOpened";
pub const ENABLE_SOUND: &str = "Android_KarismaBridge_EnableSound";
pub const DISABLE_SOUND: &str = "Android_KarismaBridge_DisableSound";
pub const LOCK_SOUND: &str = "Android_KarismaBridge_LockSound";
pub const UNLOCK_SOUND: &str = "Android_KarismaBridge_UnlockSound";

fn addr(f: *const ()) -> Address {
    Address::of_fn(f)
}

/// Everything the module needs changed before it can run on this host: its screen size,
/// subsystems that don't exist here, and the platform bridge calls it makes into the
/// runtime it was built for.
pub fn game_patches(config: &Config) -> PatchBatch {
    let ret0 = stubs::ret0_address();

    PatchBatch::new()
        .data_i32(SCREEN_WIDTH, config.screen_width as i32)
        .data_i32(SCREEN_HEIGHT, config.screen_height as i32)
        .hook(NET_INIT, ret0, Encoding::Arm32)
        .hook(DEBUG_MGR_INIT, ret0, Encoding::Arm32)
        .hook(PATH_IS_ROOT, addr(hooks::path_is_root as *const ()), Encoding::Arm32)
        .hook(GET_APP_READ_PATH, addr(hooks::get_app_path as *const ()), Encoding::Thumb16)
        .hook(GET_APP_WRITE_PATH, addr(hooks::get_app_path as *const ()), Encoding::Thumb16)
        .hook(GET_KEYBOARD_OPENED, ret0, Encoding::Thumb16)
        .hook(ENABLE_SOUND, addr(hooks::enable_sound as *const ()), Encoding::Thumb16)
        .hook(DISABLE_SOUND, addr(hooks::disable_sound as *const ()), Encoding::Thumb16)
        .hook(LOCK_SOUND, ret0, Encoding::Thumb16)
        .hook(UNLOCK_SOUND, ret0, Encoding::Thumb16)
}
