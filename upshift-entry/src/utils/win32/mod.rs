use std::ffi::{CString, c_void};

use anyhow::anyhow;
use windows::{
  Win32::{Foundation::HMODULE, System::LibraryLoader::GetProcAddress},
  core::PCSTR
};

pub(crate) mod dll;

/// Returns a module symbol's absolute address.
pub(crate) fn get_module_symbol_address(handle: usize, symbol: &str) -> anyhow::Result<usize> {
  let name = CString::new(symbol)?;
  unsafe { GetProcAddress(HMODULE(handle as *mut c_void), PCSTR(name.as_ptr() as *const u8)) }
    .map(|func| func as usize)
    .ok_or_else(|| anyhow!("'{}' is not exported", symbol))
}
