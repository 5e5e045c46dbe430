use std::path::PathBuf;

use log::{debug, warn};
use upshift_common::kmt::{D3DKMT_HANDLE, NTSTATUS};

/// Adapter enumeration through the kernel-mode thunks.
pub trait KmtApi {
  fn enum_adapters(&self) -> Result<Vec<D3DKMT_HANDLE>, NTSTATUS>;
  fn query_umd_file_name(&self, adapter: D3DKMT_HANDLE) -> Result<String, NTSTATUS>;
  fn close_adapter(&self, adapter: D3DKMT_HANDLE) -> Result<(), NTSTATUS>;
}

/// Without the thunks there are no adapters to ask.
impl<K: KmtApi> KmtApi for Option<K> {
  fn enum_adapters(&self) -> Result<Vec<D3DKMT_HANDLE>, NTSTATUS> {
    self.as_ref().map_or(Ok(Vec::new()), K::enum_adapters)
  }

  fn query_umd_file_name(&self, adapter: D3DKMT_HANDLE) -> Result<String, NTSTATUS> {
    match self {
      Some(kmt) => kmt.query_umd_file_name(adapter),
      None => Ok(String::new())
    }
  }

  fn close_adapter(&self, adapter: D3DKMT_HANDLE) -> Result<(), NTSTATUS> {
    self.as_ref().map_or(Ok(()), |kmt| kmt.close_adapter(adapter))
  }
}

/// Driver-store directories of every adapter. An adapter that fails its query is skipped and still closed.
pub fn collect_driver_store<K: KmtApi + ?Sized>(kmt: &K) -> Vec<PathBuf> {
  let adapters = match kmt.enum_adapters() {
    Ok(adapters) => adapters,
    Err(status) => {
      warn!("D3DKMTEnumAdapters failed: {:#x}", status);
      return Vec::new();
    }
  };

  let mut paths: Vec<PathBuf> = Vec::new();
  for adapter in adapters {
    match kmt.query_umd_file_name(adapter) {
      Ok(file_name) => {
        if let Some(parent) = PathBuf::from(&file_name).parent()
          && !parent.as_os_str().is_empty()
          && !paths.iter().any(|p| p == parent)
        {
          debug!("Driver store: {}", parent.display());
          paths.push(parent.to_path_buf());
        }
      }
      Err(status) => warn!("D3DKMTQueryAdapterInfo failed for adapter {}: {:#x}", adapter, status)
    }

    if let Err(status) = kmt.close_adapter(adapter) {
      warn!("D3DKMTCloseAdapter failed for adapter {}: {:#x}", adapter, status);
    }
  }

  paths
}

#[cfg(windows)]
pub use gdi::GdiKmt;

#[cfg(windows)]
mod gdi {
  use std::ffi::c_void;

  use log::error;
  use upshift_common::{
    kmt::{
      D3DKMT_CLOSEADAPTER, D3DKMT_ENUMADAPTERS, D3DKMT_HANDLE, D3DKMT_QUERYADAPTERINFO, D3DKMT_UMDFILENAMEINFO,
      KMTQAITYPE_UMDRIVERNAME, NTSTATUS, PfnD3DKMTCloseAdapter, PfnD3DKMTEnumAdapters, PfnD3DKMTQueryAdapterInfo
    },
    utils::wide_to_string
  };
  use windows::{
    Win32::{
      Foundation::{FreeLibrary, HMODULE},
      System::LibraryLoader::{GetModuleHandleW, GetProcAddress, LoadLibraryW}
    },
    core::{PCSTR, w}
  };

  use super::KmtApi;

  /// `gdi32.dll` thunks, resolved at runtime. Frees the module on drop when this loaded it.
  pub struct GdiKmt {
    module: HMODULE,
    owned: bool,
    enum_adapters: Option<PfnD3DKMTEnumAdapters>,
    query_adapter_info: Option<PfnD3DKMTQueryAdapterInfo>,
    close_adapter: Option<PfnD3DKMTCloseAdapter>
  }

  unsafe impl Send for GdiKmt {}
  unsafe impl Sync for GdiKmt {}

  impl GdiKmt {
    pub fn open() -> Option<Self> {
      let (module, owned) = unsafe {
        match GetModuleHandleW(w!("gdi32.dll")) {
          Ok(module) => (module, false),
          Err(_) => match LoadLibraryW(w!("gdi32.dll")) {
            Ok(module) => (module, true),
            Err(e) => {
              error!("Failed to load gdi32.dll: {}", e);
              return None;
            }
          }
        }
      };

      unsafe fn proc<T>(module: HMODULE, name: &[u8]) -> Option<T> {
        unsafe {
          GetProcAddress(module, PCSTR(name.as_ptr()))
            .map(|f| std::mem::transmute_copy::<*mut c_void, T>(&(f as *mut c_void)))
        }
      }

      Some(unsafe {
        Self {
          module,
          owned,
          enum_adapters: proc(module, b"D3DKMTEnumAdapters\0"),
          query_adapter_info: proc(module, b"D3DKMTQueryAdapterInfo\0"),
          close_adapter: proc(module, b"D3DKMTCloseAdapter\0")
        }
      })
    }
  }

  impl Drop for GdiKmt {
    fn drop(&mut self) {
      if self.owned {
        unsafe {
          let _ = FreeLibrary(self.module);
        }
      }
    }
  }

  const STATUS_PROCEDURE_NOT_FOUND: NTSTATUS = 0xC000_007A_u32 as i32;

  impl KmtApi for GdiKmt {
    fn enum_adapters(&self) -> Result<Vec<D3DKMT_HANDLE>, NTSTATUS> {
      let enum_adapters = self.enum_adapters.ok_or(STATUS_PROCEDURE_NOT_FOUND)?;
      let mut args = D3DKMT_ENUMADAPTERS::default();
      let status = unsafe { enum_adapters(&mut args) };
      if status < 0 {
        return Err(status);
      }

      let count = (args.NumAdapters as usize).min(args.Adapters.len());
      Ok(args.Adapters[..count].iter().map(|a| a.hAdapter).collect())
    }

    fn query_umd_file_name(&self, adapter: D3DKMT_HANDLE) -> Result<String, NTSTATUS> {
      let query = self.query_adapter_info.ok_or(STATUS_PROCEDURE_NOT_FOUND)?;
      let mut info = D3DKMT_UMDFILENAMEINFO::default();
      let args = D3DKMT_QUERYADAPTERINFO {
        hAdapter: adapter,
        Type: KMTQAITYPE_UMDRIVERNAME,
        pPrivateDriverData: &mut info as *mut _ as *mut c_void,
        PrivateDriverDataSize: size_of::<D3DKMT_UMDFILENAMEINFO>() as u32
      };

      let status = unsafe { query(&args) };
      if status < 0 {
        return Err(status);
      }
      Ok(wide_to_string(&info.UmdFileName))
    }

    fn close_adapter(&self, adapter: D3DKMT_HANDLE) -> Result<(), NTSTATUS> {
      let close = self.close_adapter.ok_or(STATUS_PROCEDURE_NOT_FOUND)?;
      let status = unsafe { close(&D3DKMT_CLOSEADAPTER { hAdapter: adapter }) };
      if status < 0 { Err(status) } else { Ok(()) }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::loader::tests::FakeKmt;

  #[test]
  fn one_failing_adapter_does_not_stop_enumeration() {
    let kmt = FakeKmt {
      drivers: vec![
        Ok(r"C:\DriverStore\amd\amdxc64.dll".replace('\\', "/")),
        Err(0xC000_0001_u32 as i32),
        Ok(r"C:\DriverStore\nv\nvwgf2umx.dll".replace('\\', "/"))
      ],
      ..Default::default()
    };

    let paths = collect_driver_store(&kmt);
    assert_eq!(
      paths,
      vec![PathBuf::from("C:/DriverStore/amd"), PathBuf::from("C:/DriverStore/nv")]
    );
    assert_eq!(*kmt.closed.borrow(), vec![1, 2, 3]);
  }

  #[test]
  fn duplicate_driver_directories_collapse() {
    let kmt = FakeKmt {
      drivers: vec![Ok("C:/DriverStore/amd/a.dll".into()), Ok("C:/DriverStore/amd/b.dll".into())],
      ..Default::default()
    };
    assert_eq!(collect_driver_store(&kmt).len(), 1);
  }
}
