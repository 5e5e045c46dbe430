use std::path::PathBuf;

use windows::Win32::{
  Foundation::{HMODULE, MAX_PATH},
  System::{LibraryLoader::GetModuleFileNameW, SystemInformation::GetSystemDirectoryW}
};

pub use super::widestring;

pub fn get_system32_path() -> Option<PathBuf> {
  let mut buffer = [0u16; MAX_PATH as usize];

  unsafe {
    let len = GetSystemDirectoryW(Some(&mut buffer));
    if len == 0 {
      return None;
    }

    Some(PathBuf::from(String::from_utf16_lossy(&buffer[..len as usize])))
  }
}

/// Full path of a loaded module; `None` for the process executable.
pub fn get_module_path(module: Option<HMODULE>) -> Option<PathBuf> {
  let mut buffer = vec![0u16; MAX_PATH as usize];
  let len = unsafe { GetModuleFileNameW(module, &mut buffer) };
  if len == 0 {
    return None;
  }
  buffer.truncate(len as usize);
  Some(PathBuf::from(String::from_utf16_lossy(&buffer)))
}

pub fn get_exe_directory() -> Option<PathBuf> {
  get_module_path(None).and_then(|path| path.parent().map(PathBuf::from))
}
