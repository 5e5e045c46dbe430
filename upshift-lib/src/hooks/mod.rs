pub(crate) mod amd;
pub(crate) mod dxgi;
pub(crate) mod vulkan;

use std::{
  ffi::c_void,
  ptr,
  sync::atomic::{AtomicUsize, Ordering}
};

use log::{debug, error, info, warn};
use upshift_common::utils::win32::get_system32_path;
use widestring::U16Str;
use windows::Win32::Foundation::NTSTATUS;

use crate::loader::{ModuleApi, ModuleHandle, win32::Win32Modules};

#[repr(C)]
#[derive(Copy, Clone)]
#[allow(non_snake_case)]
pub struct UNICODE_STRING {
  pub Length: u16,
  pub MaximumLength: u16,
  pub Buffer: *const u16
}

#[repr(C)]
#[derive(Copy, Clone)]
#[allow(non_snake_case)]
pub struct LDR_DLL_LOADED_NOTIFICATION_DATA {
  pub Flags: u32,
  pub FullDllName: *const UNICODE_STRING,
  pub BaseDllName: *const UNICODE_STRING,
  pub DllBase: *mut c_void,
  pub SizeOfImage: u32
}

type LdrDllNotificationFunction =
  unsafe extern "system" fn(reason: u32, data: *const LDR_DLL_LOADED_NOTIFICATION_DATA, context: *mut c_void);

const LDR_DLL_NOTIFICATION_REASON_LOADED: u32 = 1;

#[link(name = "ntdll")]
unsafe extern "system" {
  fn LdrRegisterDllNotification(
    Flags: u32,
    NotificationFunction: LdrDllNotificationFunction,
    Context: *mut c_void,
    Cookie: *mut *mut c_void
  ) -> NTSTATUS;

  fn LdrUnregisterDllNotification(Cookie: *mut c_void) -> NTSTATUS;
}

static NOTIFICATION_COOKIE: AtomicUsize = AtomicUsize::new(0);

unsafe fn unicode_to_string(us: *const UNICODE_STRING) -> String {
  let Some(us) = (unsafe { us.as_ref() }) else {
    return String::new();
  };
  if us.Buffer.is_null() || us.Length == 0 {
    return String::new();
  }
  // length in bytes, no terminator
  unsafe { U16Str::from_ptr(us.Buffer, (us.Length / 2) as usize) }.to_string_lossy()
}

/// The system `dxgi.dll`. A `dxgi.dll` beside the game is the proxy and never hooked.
fn system_dxgi() -> Option<ModuleHandle> {
  let path = get_system32_path()?.join("dxgi.dll");
  Win32Modules.find_loaded(&path.to_string_lossy())
}

fn on_module(base_name: &str, module: ModuleHandle) {
  let name = base_name.to_ascii_lowercase();
  if name == "dxgi.dll" {
    if let Some(system) = system_dxgi() {
      dxgi::attach_exports(system);
    }
  } else if name == amd::MODULE {
    amd::attach(module);
  } else if name == vulkan::MODULE {
    vulkan::attach(module);
  }
}

unsafe extern "system" fn dll_notify(reason: u32, data: *const LDR_DLL_LOADED_NOTIFICATION_DATA, _context: *mut c_void) {
  if reason != LDR_DLL_NOTIFICATION_REASON_LOADED {
    return;
  }
  let Some(data) = (unsafe { data.as_ref() }) else {
    return;
  };

  let base_name = unsafe { unicode_to_string(data.BaseDllName) };
  debug!("{} loaded at {:p}", base_name, data.DllBase);
  on_module(&base_name, ModuleHandle(data.DllBase as usize));
}

/// Hooks what is already mapped, then watches for the rest.
pub(crate) fn install() {
  for name in ["dxgi.dll", amd::MODULE, vulkan::MODULE] {
    if let Some(module) = Win32Modules.find_loaded(name) {
      on_module(name, module);
    }
  }

  let mut cookie = ptr::null_mut();
  let status = unsafe { LdrRegisterDllNotification(0, dll_notify, ptr::null_mut(), &mut cookie) };
  if status.is_ok() {
    NOTIFICATION_COOKIE.store(cookie as usize, Ordering::SeqCst);
    info!("[HOOK] Watching module loads");
  } else {
    error!("[HOOK] LdrRegisterDllNotification failed: {:#x}", status.0);
  }
}

pub(crate) fn uninstall() {
  let cookie = NOTIFICATION_COOKIE.swap(0, Ordering::SeqCst);
  if cookie != 0 {
    let status = unsafe { LdrUnregisterDllNotification(cookie as *mut c_void) };
    if status.is_err() {
      warn!("LdrUnregisterDllNotification failed: {:#x}", status.0);
    }
  }
}
