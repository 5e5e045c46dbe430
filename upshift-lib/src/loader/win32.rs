use std::{
  ffi::{CString, c_void},
  path::{Path, PathBuf}
};

use upshift_common::utils::{widestring, win32::get_module_path};
use windows::{
  Win32::{
    Foundation::HMODULE,
    Storage::FileSystem::{GetFileVersionInfoSizeW, GetFileVersionInfoW, VS_FIXEDFILEINFO, VerQueryValueW},
    System::LibraryLoader::{GetModuleHandleW, GetProcAddress, LoadLibraryW}
  },
  core::{PCSTR, PCWSTR, w}
};

use super::{ModuleApi, ModuleHandle};

pub struct Win32Modules;

impl ModuleApi for Win32Modules {
  fn find_loaded(&self, name: &str) -> Option<ModuleHandle> {
    let name = widestring(name);
    unsafe { GetModuleHandleW(PCWSTR(name.as_ptr())) }
      .ok()
      .map(|h| ModuleHandle(h.0 as usize))
  }

  fn load(&self, path: &Path) -> Option<ModuleHandle> {
    let path = widestring(path.to_string_lossy());
    unsafe { LoadLibraryW(PCWSTR(path.as_ptr())) }
      .ok()
      .map(|h| ModuleHandle(h.0 as usize))
  }

  fn symbol(&self, module: ModuleHandle, name: &str) -> Option<usize> {
    let name = CString::new(name).ok()?;
    unsafe { GetProcAddress(HMODULE(module.0 as *mut c_void), PCSTR(name.as_ptr() as *const u8)) }
      .map(|f| f as usize)
  }
}

pub fn module_path(module: ModuleHandle) -> Option<PathBuf> {
  get_module_path(Some(HMODULE(module.0 as *mut c_void)))
}

/// Proton/Wine exposes `wine_get_version` from its `ntdll.dll`.
pub fn is_running_on_linux() -> bool {
  unsafe {
    GetModuleHandleW(w!("ntdll.dll"))
      .ok()
      .and_then(|ntdll| GetProcAddress(ntdll, PCSTR(b"wine_get_version\0".as_ptr())))
      .is_some()
  }
}

/// `major.minor.patch` from the file version resource.
pub fn file_version(path: &Path) -> Option<(u32, u32, u32)> {
  let path = widestring(path.to_string_lossy());
  unsafe {
    let size = GetFileVersionInfoSizeW(PCWSTR(path.as_ptr()), None);
    if size == 0 {
      return None;
    }

    let mut data = vec![0u8; size as usize];
    GetFileVersionInfoW(PCWSTR(path.as_ptr()), None, size, data.as_mut_ptr() as *mut c_void).ok()?;

    let mut info: *mut c_void = std::ptr::null_mut();
    let mut len = 0u32;
    if !VerQueryValueW(data.as_ptr() as *const c_void, w!("\\"), &mut info, &mut len).as_bool() || info.is_null() {
      return None;
    }

    let info = &*(info as *const VS_FIXEDFILEINFO);
    Some((
      info.dwFileVersionMS >> 16,
      info.dwFileVersionMS & 0xFFFF,
      info.dwFileVersionLS >> 16
    ))
  }
}
