//! Native symbols the module imports and the host links in as-is: the C library, libm,
//! the ARM EABI helpers, the C++ runtime and GL.
//!
//! Only their addresses matter here; the module calls them with its own signatures, so
//! they are all declared as plain `fn()`.

use shim_loader::Address;

macro_rules! native_imports {
    ($( $symbol:ident $(=> $import:literal)? ),* $(,)?) => {
        #[allow(clashing_extern_declarations, dead_code, non_snake_case)]
        extern "C" {
            $( fn $symbol(); )*
        }

        /// Every native import, keyed by the name the module imports it under.
        pub fn native_imports() -> Vec<(&'static str, Address)> {
            vec![
                $( (native_imports!(@name $symbol $($import)?), Address::of_fn($symbol as *const ())), )*
            ]
        }
    };

    (@name $symbol:ident $import:literal) => { $import };
    (@name $symbol:ident) => { stringify!($symbol) };
}

native_imports! {
    _ZdaPv,
    _ZdlPv,
    _Znaj,
    _Znwj,

    __aeabi_atexit,
    __aeabi_d2f,
    __aeabi_d2ulz,
    __aeabi_dcmpgt,
    __aeabi_dmul,
    __aeabi_f2d,
    __aeabi_f2iz,
    __aeabi_f2ulz,
    __aeabi_fadd,
    __aeabi_fcmpge,
    __aeabi_fcmpgt,
    __aeabi_fcmple,
    __aeabi_fcmplt,
    __aeabi_fdiv,
    __aeabi_fsub,
    __aeabi_idiv,
    __aeabi_idivmod,
    __aeabi_l2d,
    __aeabi_l2f,
    __aeabi_ldivmod,
    __aeabi_uidiv,
    __aeabi_uidivmod,
    __aeabi_uldivmod,

    __cxa_guard_acquire,
    __cxa_guard_release,
    __cxa_pure_virtual,
    __dso_handle,
    __errno,
    __stack_chk_fail,

    acos,
    asin,
    atan,
    atan2,
    atoi,
    ceil,
    close,
    cos,
    difftime,
    fclose,
    fflush,
    fgets,
    fileno,
    floor,
    fmod,
    fopen,
    fprintf,
    fread,
    free,
    fseek,
    fstat,
    ftell,
    fwrite,
    gettimeofday,
    ldexp,
    log,
    lrand48,
    malloc,
    memcmp,
    memcpy,
    memmove,
    memset,
    pow,
    read,
    realloc,
    sin,
    snprintf,
    sqrt,
    sscanf,
    strchr,
    strcmp,
    strerror,
    strlen,
    strncat,
    strncmp,
    strncpy,
    strrchr,
    strstr,
    strtoll,
    tan,
    time,
    tolower,
    toupper,
    unlink,
    vsnprintf,
    write,

    eglSwapBuffers,
    glActiveTexture,
    glAlphaFunc,
    glBindBuffer,
    glBindFramebuffer => "glBindFramebufferOES",
    glBindTexture,
    glBlendFunc,
    glClear,
    glClearColor,
    glClearDepthf,
    glClearStencil,
    glClientActiveTexture,
    glColorMask,
    glColorPointer,
    glCompressedTexImage2D,
    glCullFace,
    glDeleteBuffers,
    glDeleteTextures,
    glDepthFunc,
    glDepthMask,
    glDepthRangef,
    glDisable,
    glDisableClientState,
    glDrawArrays,
    glDrawElements,
    glEnable,
    glEnableClientState,
    glFogf,
    glFogfv,
    glFrontFace,
    glGenTextures,
    glGetError,
    glGetIntegerv,
    glGetString,
    glLoadIdentity,
    glLoadMatrixf,
    glMatrixMode,
    glReadPixels,
    glScissor,
    glStencilFunc,
    glStencilOp,
    glTexCoordPointer,
    glTexEnvf,
    glTexEnvfv,
    glTexImage2D,
    glTexParameteri,
    glVertexPointer,
    glViewport,
}
