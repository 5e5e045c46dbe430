//! Locates vendor modules: already mapped, then a direct load, then the installed driver directories.

pub mod driver_store;
#[cfg(windows)]
pub mod win32;

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

pub use driver_store::{KmtApi, collect_driver_store};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub usize);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoaderError {
  #[error("{0} not found in the process, the search path or the driver store")]
  NotFound(String),
  #[error("{module} does not export {symbol}")]
  MissingSymbol { module: String, symbol: String },
  #[error("{0}")]
  Unavailable(String)
}

/// The OS module facility.
pub trait ModuleApi {
  fn find_loaded(&self, name: &str) -> Option<ModuleHandle>;
  fn load(&self, path: &Path) -> Option<ModuleHandle>;
  fn symbol(&self, module: ModuleHandle, name: &str) -> Option<usize>;
}

pub struct ModuleLoader<M: ModuleApi, K: KmtApi> {
  modules: M,
  kmt: K
}

impl<M: ModuleApi, K: KmtApi> ModuleLoader<M, K> {
  pub fn new(modules: M, kmt: K) -> Self {
    Self { modules, kmt }
  }

  pub fn modules(&self) -> &M {
    &self.modules
  }

  pub fn load_module(&self, name: &str) -> Result<ModuleHandle, LoaderError> {
    if let Some(handle) = self.modules.find_loaded(name) {
      debug!("{} already mapped at {:#x}", name, handle.0);
      return Ok(handle);
    }

    info!("Trying to load: {}", name);
    if let Some(handle) = self.modules.load(Path::new(name)) {
      info!("{} loaded from the default search path", name);
      return Ok(handle);
    }

    for dir in collect_driver_store(&self.kmt) {
      let path = dir.join(name);
      info!("Trying to load: {}", path.display());
      if let Some(handle) = self.modules.load(&path) {
        info!("{} loaded from {}", name, dir.display());
        return Ok(handle);
      }
    }

    warn!("Failed to load {}", name);
    Err(LoaderError::NotFound(name.to_string()))
  }

  pub fn resolve(&self, module: ModuleHandle, module_name: &str, symbol: &str) -> Result<usize, LoaderError> {
    self
      .modules
      .symbol(module, symbol)
      .ok_or_else(|| LoaderError::MissingSymbol {
        module: module_name.to_string(),
        symbol: symbol.to_string()
      })
  }
}

/// The loader over the live process and the kernel thunks of `gdi32.dll`.
#[cfg(windows)]
pub fn system_loader() -> ModuleLoader<win32::Win32Modules, Option<driver_store::GdiKmt>> {
  ModuleLoader::new(win32::Win32Modules, driver_store::GdiKmt::open())
}

/// Directories that may hold a module next to the host: the given roots plus the parents of `markers` found below
/// the first root.
pub fn search_paths_with_markers(root: &Path, markers: &[&str], extra: Option<PathBuf>) -> Vec<PathBuf> {
  let mut paths = vec![root.to_path_buf()];
  for marker in markers {
    if let Some(found) = find_file(root, marker)
      && let Some(parent) = found.parent()
      && !paths.iter().any(|p| p == parent)
    {
      paths.push(parent.to_path_buf());
    }
  }
  if let Some(extra) = extra {
    paths.push(extra);
  }
  paths
}

fn find_file(root: &Path, file_name: &str) -> Option<PathBuf> {
  let mut pending = vec![root.to_path_buf()];
  while let Some(dir) = pending.pop() {
    let Ok(entries) = std::fs::read_dir(&dir) else {
      continue;
    };
    for entry in entries.flatten() {
      let path = entry.path();
      if path.is_dir() {
        pending.push(path);
      } else if path
        .file_name()
        .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(file_name))
      {
        return Some(path);
      }
    }
  }
  None
}

#[cfg(test)]
pub(crate) mod tests {
  use std::{cell::RefCell, collections::HashMap, fs};

  use upshift_common::kmt::{D3DKMT_HANDLE, NTSTATUS};

  use super::*;

  #[derive(Default)]
  pub(crate) struct FakeModules {
    pub loaded: HashMap<String, ModuleHandle>,
    pub loadable: HashMap<PathBuf, ModuleHandle>,
    pub symbols: HashMap<(usize, String), usize>,
    pub attempts: RefCell<Vec<PathBuf>>
  }

  impl ModuleApi for FakeModules {
    fn find_loaded(&self, name: &str) -> Option<ModuleHandle> {
      self.loaded.get(name).copied()
    }

    fn load(&self, path: &Path) -> Option<ModuleHandle> {
      self.attempts.borrow_mut().push(path.to_path_buf());
      self.loadable.get(path).copied()
    }

    fn symbol(&self, module: ModuleHandle, name: &str) -> Option<usize> {
      self.symbols.get(&(module.0, name.to_string())).copied()
    }
  }

  #[derive(Default)]
  pub(crate) struct FakeKmt {
    pub drivers: Vec<Result<String, NTSTATUS>>,
    pub closed: RefCell<Vec<D3DKMT_HANDLE>>
  }

  impl KmtApi for FakeKmt {
    fn enum_adapters(&self) -> Result<Vec<D3DKMT_HANDLE>, NTSTATUS> {
      Ok((1..=self.drivers.len() as u32).collect())
    }

    fn query_umd_file_name(&self, adapter: D3DKMT_HANDLE) -> Result<String, NTSTATUS> {
      self.drivers[adapter as usize - 1].clone()
    }

    fn close_adapter(&self, adapter: D3DKMT_HANDLE) -> Result<(), NTSTATUS> {
      self.closed.borrow_mut().push(adapter);
      Ok(())
    }
  }

  #[test]
  fn already_mapped_module_wins() {
    let mut modules = FakeModules::default();
    modules.loaded.insert("amdxc64.dll".into(), ModuleHandle(0x1000));
    let loader = ModuleLoader::new(modules, FakeKmt::default());

    assert_eq!(loader.load_module("amdxc64.dll"), Ok(ModuleHandle(0x1000)));
    assert!(loader.modules().attempts.borrow().is_empty());
  }

  #[test]
  fn falls_back_to_the_driver_store() {
    let store = PathBuf::from("C:/Windows/System32/DriverStore/FileRepository/u0400000.inf_amd64");
    let mut modules = FakeModules::default();
    modules
      .loadable
      .insert(store.join("amdxcffx64.dll"), ModuleHandle(0x2000));
    let kmt = FakeKmt {
      drivers: vec![Ok(store.join("amdxc64.dll").to_string_lossy().into_owned())],
      ..Default::default()
    };
    let loader = ModuleLoader::new(modules, kmt);

    assert_eq!(loader.load_module("amdxcffx64.dll"), Ok(ModuleHandle(0x2000)));
    let attempts = loader.modules().attempts.borrow();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0], PathBuf::from("amdxcffx64.dll"));
  }

  #[test]
  fn missing_everywhere_is_not_found() {
    let loader = ModuleLoader::new(FakeModules::default(), FakeKmt::default());
    assert_eq!(
      loader.load_module("nvngx.dll"),
      Err(LoaderError::NotFound("nvngx.dll".into()))
    );
  }

  #[test]
  fn resolve_reports_the_missing_export() {
    let mut modules = FakeModules::default();
    modules.symbols.insert((7, "UpdateFfxApiProvider".into()), 0x77);
    let loader = ModuleLoader::new(modules, FakeKmt::default());

    assert_eq!(loader.resolve(ModuleHandle(7), "amdxcffx64.dll", "UpdateFfxApiProvider"), Ok(0x77));
    assert!(matches!(
      loader.resolve(ModuleHandle(7), "amdxcffx64.dll", "UpdateFfxApiProviderEx"),
      Err(LoaderError::MissingSymbol { .. })
    ));
  }

  #[test]
  fn marker_directories_are_added_once() {
    let root = std::env::temp_dir().join(format!("upshift-loader-{}", std::process::id()));
    let nested = root.join("bin").join("dlss");
    let _ = fs::remove_dir_all(&root);
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("nvngx_dlss.dll"), b"").unwrap();
    fs::write(nested.join("nvngx_dlssg.dll"), b"").unwrap();

    let paths = search_paths_with_markers(
      &root,
      &["nvngx_dlss.dll", "nvngx_dlssd.dll", "nvngx_dlssg.dll"],
      Some(PathBuf::from("D:/dlss"))
    );
    assert_eq!(paths, vec![root.clone(), nested, PathBuf::from("D:/dlss")]);
    let _ = fs::remove_dir_all(&root);
  }
}
