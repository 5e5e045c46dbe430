#[cfg(windows)]
mod entrypoint;
#[cfg(windows)]
mod payload;
#[cfg(windows)]
mod utils;

#[cfg(windows)]
use std::{ffi::c_void, sync::atomic::Ordering};

#[cfg(windows)]
use windows::{
  Win32::{Foundation::HINSTANCE, System::SystemServices::DLL_PROCESS_ATTACH},
  core::BOOL
};

#[cfg(windows)]
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub unsafe extern "system" fn DllMain(module: HINSTANCE, call_reason: u32, _: *mut c_void) -> BOOL {
  if call_reason == DLL_PROCESS_ATTACH {
    payload::PROXY_MODULE.store(module.0 as usize, Ordering::SeqCst);
  }
  true.into()
}
