//! The synthetic AMD extension objects. They are process-lifetime statics, so reference counting is a no-op.

use std::{
  ffi::c_void,
  ptr,
  sync::{
    Mutex,
    atomic::{AtomicPtr, Ordering}
  }
};

use log::{debug, info, trace};
use upshift_common::{
  Guid,
  amd::*
};

use super::{
  ExportRoutes, InterfaceRoute, InterfaceSource, RealFactory, Synthetic, factory_route,
  provider::{self, ProviderEntryPoints},
  serve
};
use crate::loader::LoaderError;

/// `IUnknown`-headed objects shared read-only across threads.
#[repr(transparent)]
struct Shared<V: 'static>(ComObject<V>);

unsafe impl<V: 'static> Sync for Shared<V> {}

impl<V: 'static> Shared<V> {
  fn as_ptr(&'static self) -> *mut c_void {
    self as *const Self as *mut c_void
  }
}

unsafe extern "system" fn not_implemented(_this: *mut c_void, _riid: *const Guid, _ppv: *mut *mut c_void) -> HRESULT {
  E_NOTIMPL
}

unsafe extern "system" fn no_ref_count(_this: *mut c_void) -> u32 {
  0
}

const STUB_UNKNOWN: IUnknownVtbl = IUnknownVtbl {
  QueryInterface: not_implemented,
  AddRef: no_ref_count,
  Release: no_ref_count
};

// Factory

static REAL_FACTORY: AtomicPtr<ComObject<IAmdExtD3DFactoryVtbl>> = AtomicPtr::new(ptr::null_mut());

fn real_factory() -> Option<RealFactory> {
  let real = REAL_FACTORY.load(Ordering::Acquire);
  (!real.is_null()).then_some(RealFactory(real))
}

/// Remembers the driver's factory so the synthetic one can forward to it. Only the first capture sticks.
pub fn capture_real_factory(factory: *mut c_void) -> bool {
  !factory.is_null() &&
    REAL_FACTORY
      .compare_exchange(ptr::null_mut(), factory.cast(), Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
}

pub fn has_real_factory() -> bool {
  real_factory().is_some()
}

unsafe extern "system" fn factory_query_interface(
  _this: *mut c_void,
  riid: *const Guid,
  ppv: *mut *mut c_void
) -> HRESULT {
  match real_factory() {
    Some(RealFactory(real)) => unsafe { ((*(*real).vtbl).base.QueryInterface)(real.cast(), riid, ppv) },
    None => E_NOTIMPL
  }
}

unsafe extern "system" fn factory_add_ref(_this: *mut c_void) -> u32 {
  match real_factory() {
    Some(RealFactory(real)) => unsafe { ((*(*real).vtbl).base.AddRef)(real.cast()) },
    None => 0
  }
}

unsafe extern "system" fn factory_release(_this: *mut c_void) -> u32 {
  let Some(RealFactory(real)) = real_factory() else {
    return 0;
  };
  let count = unsafe { ((*(*real).vtbl).base.Release)(real.cast()) };
  if count == 0 {
    let _ = REAL_FACTORY.compare_exchange(real, ptr::null_mut(), Ordering::AcqRel, Ordering::Acquire);
  }
  count
}

unsafe extern "system" fn factory_create_interface(
  _this: *mut c_void,
  outer: *mut c_void,
  riid: *const Guid,
  ppv: *mut *mut c_void
) -> HRESULT {
  if riid.is_null() {
    return E_POINTER;
  }
  let real = real_factory();
  unsafe {
    serve(
      factory_route(&*riid),
      real.as_ref().map(|r| r as &dyn InterfaceSource),
      outer,
      riid,
      ppv,
      synthetic
    )
  }
}

static FACTORY_VTBL: IAmdExtD3DFactoryVtbl = IAmdExtD3DFactoryVtbl {
  base: IUnknownVtbl {
    QueryInterface: factory_query_interface,
    AddRef: factory_add_ref,
    Release: factory_release
  },
  CreateInterface: factory_create_interface
};

static FACTORY: Shared<IAmdExtD3DFactoryVtbl> = Shared(ComObject { vtbl: &FACTORY_VTBL });

// FFX API

static PROVIDER: Mutex<Option<ProviderEntryPoints>> = Mutex::new(None);

fn resolve_provider() -> Result<ProviderEntryPoints, LoaderError> {
  #[cfg(windows)]
  {
    ProviderEntryPoints::resolve(&crate::loader::system_loader())
  }
  #[cfg(not(windows))]
  {
    Err(LoaderError::Unavailable("amdxcffx64.dll only exists on Windows".into()))
  }
}

unsafe extern "system" fn update_ffx_api_provider(_this: *mut c_void, data: *mut c_void, size: u32) -> HRESULT {
  unsafe { provider::update_provider(&PROVIDER, resolve_provider, data, size) }
}

static FFX_API_VTBL: IAmdExtFfxApiVtbl = IAmdExtFfxApiVtbl {
  base: STUB_UNKNOWN,
  UpdateFfxApiProvider: update_ffx_api_provider
};

static FFX_API: Shared<IAmdExtFfxApiVtbl> = Shared(ComObject { vtbl: &FFX_API_VTBL });

// Shader intrinsics

unsafe extern "system" fn intrinsics_get_info(_this: *mut c_void, _info: *mut c_void) -> HRESULT {
  trace!("IAmdExtD3DShaderIntrinsics::GetInfo");
  S_OK
}

unsafe extern "system" fn intrinsics_check_support(_this: *mut c_void, intrinsic: u32) -> HRESULT {
  trace!("IAmdExtD3DShaderIntrinsics::CheckSupport: {}", intrinsic);
  S_OK
}

unsafe extern "system" fn intrinsics_enable(_this: *mut c_void) -> HRESULT {
  trace!("IAmdExtD3DShaderIntrinsics::Enable");
  S_OK
}

static INTRINSICS_VTBL: IAmdExtD3DShaderIntrinsicsVtbl = IAmdExtD3DShaderIntrinsicsVtbl {
  base: STUB_UNKNOWN,
  GetInfo: intrinsics_get_info,
  CheckSupport: intrinsics_check_support,
  Enable: intrinsics_enable
};

static INTRINSICS: Shared<IAmdExtD3DShaderIntrinsicsVtbl> = Shared(ComObject { vtbl: &INTRINSICS_VTBL });

// Device8

unsafe extern "system" fn device8_stub(_this: *mut c_void) -> HRESULT {
  trace!("IAmdExtD3DDevice8 stub");
  S_OK
}

unsafe extern "system" fn get_wave_matrix_properties(
  _this: *mut c_void,
  count: *mut u64,
  properties: *mut AmdExtWaveMatrixProperties
) -> HRESULT {
  if !count.is_null() {
    trace!("GetWaveMatrixProperties: {}", unsafe { *count });
  }
  if properties.is_null() {
    return E_POINTER;
  }

  unsafe {
    *properties = AmdExtWaveMatrixProperties {
      mSize: 16,
      nSize: 16,
      kSize: 16,
      aType: wave_matrix_type::FP8,
      bType: wave_matrix_type::FP8,
      cType: wave_matrix_type::FLOAT32,
      resultType: wave_matrix_type::FLOAT32,
      saturatingAccumulation: false
    }
  };
  S_OK
}

static DEVICE8_VTBL: IAmdExtD3DDevice8Vtbl = IAmdExtD3DDevice8Vtbl {
  base: STUB_UNKNOWN,
  stubs: [device8_stub as StubFn; DEVICE8_STUB_SLOTS],
  GetWaveMatrixProperties: get_wave_matrix_properties
};

static DEVICE8: Shared<IAmdExtD3DDevice8Vtbl> = Shared(ComObject { vtbl: &DEVICE8_VTBL });

pub fn synthetic(kind: Synthetic) -> *mut c_void {
  match kind {
    Synthetic::Factory => FACTORY.as_ptr(),
    Synthetic::FfxApi => FFX_API.as_ptr(),
    Synthetic::ShaderIntrinsics => INTRINSICS.as_ptr(),
    Synthetic::Device8 => DEVICE8.as_ptr()
  }
}

/// Body of the detoured `AmdExtD3DCreateInterface`.
///
/// # Safety
/// Arguments follow the COM `CreateInterface` contract; `original` must be the driver's export.
pub unsafe fn create_interface(
  routes: ExportRoutes,
  original: Option<PfnAmdExtD3DCreateInterface>,
  outer: *mut c_void,
  riid: *const Guid,
  ppv: *mut *mut c_void
) -> HRESULT {
  if riid.is_null() {
    return E_POINTER;
  }

  let route = routes.route(unsafe { &*riid });
  if route == InterfaceRoute::Synthesize(Synthetic::Factory)
    && let Some(original) = original
    && !has_real_factory()
  {
    let mut real = ptr::null_mut();
    if unsafe { original(outer, riid, &mut real) } == S_OK && capture_real_factory(real) {
      info!("Captured the driver's IAmdExtD3DFactory");
    } else {
      debug!("Driver has no IAmdExtD3DFactory of its own");
    }
  }

  unsafe {
    serve(
      route,
      original.as_ref().map(|o| o as &dyn InterfaceSource),
      outer,
      riid,
      ppv,
      synthetic
    )
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicU32;

  use super::*;

  static DRIVER_CALLS: AtomicU32 = AtomicU32::new(0);

  unsafe extern "system" fn driver_create_interface(
    _outer: *mut c_void,
    _riid: *const Guid,
    ppv: *mut *mut c_void
  ) -> HRESULT {
    DRIVER_CALLS.fetch_add(1, Ordering::SeqCst);
    unsafe { *ppv = 0xD1 as *mut c_void };
    S_OK
  }

  unsafe fn vtbl<V: 'static>(object: *mut c_void) -> &'static V {
    unsafe { &*(*(object as *const ComObject<V>)).vtbl }
  }

  #[test]
  fn ffx_api_is_synthesized_when_updating() {
    let routes = ExportRoutes {
      fsr4_update: true,
      on_linux: false
    };
    let mut out = ptr::null_mut();
    let result =
      unsafe { create_interface(routes, Some(driver_create_interface), ptr::null_mut(), &IID_IAMD_EXT_FFX_API, &mut out) };
    assert_eq!(result, S_OK);
    assert_eq!(out, synthetic(Synthetic::FfxApi));

    let table = unsafe { vtbl::<IAmdExtFfxApiVtbl>(out) };
    let mut riid_out = ptr::null_mut();
    assert_eq!(unsafe { (table.base.QueryInterface)(out, &IID_IAMD_EXT_FFX_API, &mut riid_out) }, E_NOTIMPL);
    assert_eq!(unsafe { (table.base.AddRef)(out) }, 0);
    assert_eq!(unsafe { (table.base.Release)(out) }, 0);
  }

  #[test]
  fn unknown_interfaces_reach_the_driver() {
    let routes = ExportRoutes {
      fsr4_update: true,
      on_linux: false
    };
    let before = DRIVER_CALLS.load(Ordering::SeqCst);
    let mut out = ptr::null_mut();
    let result = unsafe {
      create_interface(routes, Some(driver_create_interface), ptr::null_mut(), &IID_IAMD_EXT_D3D_FACTORY, &mut out)
    };
    assert_eq!(result, S_OK);
    assert_eq!(out as usize, 0xD1);
    assert!(DRIVER_CALLS.load(Ordering::SeqCst) > before);

    let result =
      unsafe { create_interface(routes, None, ptr::null_mut(), &IID_IAMD_EXT_D3D_FACTORY, &mut out) };
    assert_eq!(result, E_NOINTERFACE);
  }

  #[test]
  fn synthetic_factory_serves_intrinsics_and_device8() {
    let factory = synthetic(Synthetic::Factory);
    let table = unsafe { vtbl::<IAmdExtD3DFactoryVtbl>(factory) };

    let mut intrinsics = ptr::null_mut();
    let result = unsafe {
      (table.CreateInterface)(factory, ptr::null_mut(), &IID_IAMD_EXT_D3D_SHADER_INTRINSICS, &mut intrinsics)
    };
    assert_eq!(result, S_OK);
    assert_eq!(intrinsics, synthetic(Synthetic::ShaderIntrinsics));
    let intrinsics_table = unsafe { vtbl::<IAmdExtD3DShaderIntrinsicsVtbl>(intrinsics) };
    assert_eq!(unsafe { (intrinsics_table.CheckSupport)(intrinsics, 3) }, S_OK);
    assert_eq!(unsafe { (intrinsics_table.Enable)(intrinsics) }, S_OK);

    let mut device8 = ptr::null_mut();
    let result =
      unsafe { (table.CreateInterface)(factory, ptr::null_mut(), &IID_IAMD_EXT_D3D_DEVICE8, &mut device8) };
    assert_eq!(result, S_OK);
    assert_eq!(device8, synthetic(Synthetic::Device8));
  }

  #[test]
  fn wave_matrix_stub_reports_fp8_inputs() {
    let device8 = synthetic(Synthetic::Device8);
    let table = unsafe { vtbl::<IAmdExtD3DDevice8Vtbl>(device8) };
    assert_eq!(unsafe { (table.stubs[DEVICE8_STUB_SLOTS - 1])(device8) }, S_OK);

    let mut count = 1u64;
    let mut properties = AmdExtWaveMatrixProperties::default();
    assert_eq!(unsafe { (table.GetWaveMatrixProperties)(device8, &mut count, &mut properties) }, S_OK);
    assert_eq!((properties.mSize, properties.nSize, properties.kSize), (16, 16, 16));
    assert_eq!((properties.aType, properties.bType), (wave_matrix_type::FP8, wave_matrix_type::FP8));
    assert_eq!(properties.resultType, wave_matrix_type::FLOAT32);
    assert_eq!(
      unsafe { (table.GetWaveMatrixProperties)(device8, &mut count, ptr::null_mut()) },
      E_POINTER
    );
  }

  #[cfg(not(windows))]
  #[test]
  fn provider_update_without_the_driver_module_fails() {
    let ffx_api = synthetic(Synthetic::FfxApi);
    let table = unsafe { vtbl::<IAmdExtFfxApiVtbl>(ffx_api) };
    let mut data = ExternalProviderData {
      structVersion: 2,
      descType: 0x0001_0000,
      provider: ffxProviderInterface {
        versionId: 0,
        versionName: ptr::null(),
        canProvide: ptr::null_mut(),
        createContext: ptr::null_mut(),
        destroyContext: ptr::null_mut(),
        configure: ptr::null_mut(),
        query: ptr::null_mut(),
        dispatch: ptr::null_mut()
      }
    };
    let result = unsafe {
      (table.UpdateFfxApiProvider)(
        ffx_api,
        &mut data as *mut _ as *mut c_void,
        size_of::<ExternalProviderData>() as u32
      )
    };
    assert_eq!(result, E_NOINTERFACE);
  }
}
