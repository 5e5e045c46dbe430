pub mod detour;
pub mod exports;
#[cfg(windows)]
mod hooks;
pub mod interception;
pub mod loader;
pub mod session;
pub mod shims;
pub mod translate;

#[cfg(windows)]
use std::{ffi::c_void, sync::atomic::Ordering};

#[cfg(windows)]
use log::{error, info};
#[cfg(windows)]
use windows::{
  Win32::{
    Foundation::HINSTANCE,
    System::{
      SystemServices::{DLL_PROCESS_ATTACH, DLL_PROCESS_DETACH},
      Threading::{CreateThread, THREAD_CREATION_FLAGS}
    }
  },
  core::BOOL
};

#[cfg(windows)]
unsafe extern "system" fn thread_main(_: *mut c_void) -> u32 {
  let Some(session) = session::global() else {
    return 1;
  };

  let on_linux = loader::win32::is_running_on_linux();
  session.state().is_running_on_linux.store(on_linux, Ordering::SeqCst);
  info!("Upshift {} starting (Linux: {})", env!("CARGO_PKG_VERSION"), on_linux);

  hooks::install();
  0
}

#[cfg(windows)]
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub unsafe extern "system" fn DllMain(_module: HINSTANCE, call_reason: u32, _reserved: *mut c_void) -> BOOL {
  match call_reason {
    DLL_PROCESS_ATTACH => {
      // as little as possible under the loader lock
      let handle = unsafe { CreateThread(None, 0, Some(thread_main), None, THREAD_CREATION_FLAGS(0), None) };
      if let Err(e) = handle {
        error!("CreateThread failed: {}", e);
      }
    }
    DLL_PROCESS_DETACH => {
      if let Some(session) = session::current() {
        session.begin_shutdown();
      }
      hooks::uninstall();
      detour::minhook::ENGINE.detach_all();
    }
    _ => {}
  }
  true.into()
}
