use std::{
  marker::PhantomData,
  path::Path,
  sync::OnceLock
};

use anyhow::{Context, anyhow};
use log::error;
use upshift_common::utils::win32::{get_system32_path, widestring};
use windows::{Win32::System::LibraryLoader::LoadLibraryW, core::PCWSTR};

use crate::utils::win32::get_module_symbol_address;

pub(crate) fn load_library(path: &Path) -> anyhow::Result<usize> {
  let wide = widestring(path.to_string_lossy());
  let module = unsafe { LoadLibraryW(PCWSTR(wide.as_ptr())) }.with_context(|| format!("LoadLibraryW({})", path.display()))?;
  Ok(module.0 as usize)
}

/// A DLL of the same name in the system directory.
pub struct RealDll {
  name: &'static str,
  handle: OnceLock<Option<usize>>
}

impl RealDll {
  pub const fn new(name: &'static str) -> Self {
    Self {
      name,
      handle: OnceLock::new()
    }
  }

  fn load(&self) -> anyhow::Result<usize> {
    let handle = *self.handle.get_or_init(|| {
      let loaded = get_system32_path()
        .ok_or_else(|| anyhow!("no system directory"))
        .and_then(|system| load_library(&system.join(self.name)));
      match loaded {
        Ok(handle) => Some(handle),
        Err(e) => {
          error!("Can't load the system {}: {:#}", self.name, e);
          None
        }
      }
    });
    handle.ok_or_else(|| anyhow!("system {} unavailable", self.name))
  }

  pub fn symbol(&self, symbol: &str) -> anyhow::Result<usize> {
    let handle = self.load()?;
    get_module_symbol_address(handle, symbol).with_context(|| format!("system {}", self.name))
  }
}

/// One forwarded export, resolved on first call.
pub struct RealExport<F: Copy + 'static> {
  dll: &'static RealDll,
  name: &'static str,
  address: OnceLock<Option<usize>>,
  _signature: PhantomData<F>
}

impl<F: Copy + 'static> RealExport<F> {
  pub const fn new(dll: &'static RealDll, name: &'static str) -> Self {
    Self {
      dll,
      name,
      address: OnceLock::new(),
      _signature: PhantomData
    }
  }

  /// # Safety
  /// `F` must be the export's function pointer type.
  pub unsafe fn get(&self) -> Option<F> {
    let address = *self.address.get_or_init(|| match self.dll.symbol(self.name) {
      Ok(address) => Some(address),
      Err(e) => {
        error!("{:#}", e);
        None
      }
    });
    address.map(|address| unsafe { std::mem::transmute_copy::<usize, F>(&address) })
  }
}
