//! `UpdateFfxApiProvider` against the driver's `amdxcffx64.dll`.

use std::{ffi::c_void, mem::transmute, sync::Mutex};

use log::{error, info};
use upshift_common::amd::{
  E_NOINTERFACE, ExternalProviderData, HRESULT, PfnUpdateFfxApiProvider, PfnUpdateFfxApiProviderEx,
  ProviderUpdateOptions, S_OK
};

use crate::{
  loader::{KmtApi, LoaderError, ModuleApi, ModuleLoader},
  translate::policy::StructKind
};

pub const PROVIDER_MODULE: &str = "amdxcffx64.dll";

#[derive(Clone, Copy, Debug)]
pub struct ProviderEntryPoints {
  plain: PfnUpdateFfxApiProvider,
  ex: Option<PfnUpdateFfxApiProviderEx>
}

impl ProviderEntryPoints {
  pub fn new(plain: PfnUpdateFfxApiProvider, ex: Option<PfnUpdateFfxApiProviderEx>) -> Self {
    Self { plain, ex }
  }

  /// Loads the module from the game folder or the driver store. The plain export is required, the `Ex` one is not.
  pub fn resolve<M: ModuleApi, K: KmtApi>(loader: &ModuleLoader<M, K>) -> Result<Self, LoaderError> {
    let module = loader.load_module(PROVIDER_MODULE)?;
    let plain = loader.resolve(module, PROVIDER_MODULE, "UpdateFfxApiProvider")?;
    let ex = loader.resolve(module, PROVIDER_MODULE, "UpdateFfxApiProviderEx").ok();
    Ok(Self {
      plain: unsafe { transmute::<usize, PfnUpdateFfxApiProvider>(plain) },
      ex: ex.map(|ex| unsafe { transmute::<usize, PfnUpdateFfxApiProviderEx>(ex) })
    })
  }

  pub fn has_ex(&self) -> bool {
    self.ex.is_some()
  }

  /// # Safety
  /// `data` must point to `size` readable bytes starting with an [`ExternalProviderData`].
  pub unsafe fn update(&self, kind: StructKind, data: *mut c_void, size: u32) -> HRESULT {
    if let Some(ex) = self.ex
      && uses_ex(kind)
    {
      let mut options = ProviderUpdateOptions::default();
      let result = unsafe { ex(data, size, &mut options) };
      info!("UpdateFfxApiProviderEx called, result: {} ({:#x})", describe(result), result as u32);
      return result;
    }

    let result = unsafe { (self.plain)(data, size) };
    info!("UpdateFfxApiProvider called, result: {} ({:#x})", describe(result), result as u32);
    result
  }
}

fn describe(result: HRESULT) -> &'static str {
  if result == S_OK { "Ok" } else { "Error" }
}

/// Effects the extended entry point knows how to upgrade.
pub fn uses_ex(kind: StructKind) -> bool {
  matches!(kind, StructKind::FrameGeneration | StructKind::Upscaling | StructKind::SwapchainDx12)
}

/// Resolves the entry points on first use and forwards the update.
///
/// # Safety
/// See [`ProviderEntryPoints::update`].
pub unsafe fn update_provider(
  cache: &Mutex<Option<ProviderEntryPoints>>,
  resolve: impl FnOnce() -> Result<ProviderEntryPoints, LoaderError>,
  data: *mut c_void,
  size: u32
) -> HRESULT {
  if data.is_null() {
    return E_NOINTERFACE;
  }

  let kind = StructKind::of(unsafe { (*(data as *const ExternalProviderData)).descType });
  match kind {
    StructKind::Unknown => info!("Trying to update something???"),
    kind => info!("Trying to update: {:?}", kind)
  }

  let Ok(mut cached) = cache.lock() else {
    return E_NOINTERFACE;
  };
  let entry = match *cached {
    Some(entry) => entry,
    None => match resolve() {
      Ok(entry) => *cached.insert(entry),
      Err(e) => {
        error!("Failed to get UpdateFfxApiProvider: {}", e);
        return E_NOINTERFACE;
      }
    }
  };
  drop(cached);

  unsafe { entry.update(kind, data, size) }
}
