use std::ffi::c_void;

use log::debug;
use windows::{
  Win32::Foundation::E_NOTIMPL,
  core::{GUID, HRESULT}
};

use crate::{entrypoint::DXGI, payload, utils::win32::dll::RealExport};

type CreateFactoryFn = unsafe extern "system" fn(riid: *const GUID, factory: *mut *mut c_void) -> HRESULT;
type CreateFactory2Fn = unsafe extern "system" fn(flags: u32, riid: *const GUID, factory: *mut *mut c_void) -> HRESULT;
type GetDebugInterface1Fn = unsafe extern "system" fn(flags: u32, riid: *const GUID, debug: *mut *mut c_void) -> HRESULT;
type DeclareAdapterRemovalSupportFn = unsafe extern "system" fn() -> HRESULT;

static CREATE_FACTORY: RealExport<CreateFactoryFn> = RealExport::new(&DXGI, "CreateDXGIFactory");
static CREATE_FACTORY1: RealExport<CreateFactoryFn> = RealExport::new(&DXGI, "CreateDXGIFactory1");
static CREATE_FACTORY2: RealExport<CreateFactory2Fn> = RealExport::new(&DXGI, "CreateDXGIFactory2");
static GET_DEBUG_INTERFACE1: RealExport<GetDebugInterface1Fn> = RealExport::new(&DXGI, "DXGIGetDebugInterface1");
static DECLARE_ADAPTER_REMOVAL_SUPPORT: RealExport<DeclareAdapterRemovalSupportFn> =
  RealExport::new(&DXGI, "DXGIDeclareAdapterRemovalSupport");

#[unsafe(no_mangle)]
pub unsafe extern "system" fn CreateDXGIFactory(riid: *const GUID, factory: *mut *mut c_void) -> HRESULT {
  payload::ensure_loaded();
  debug!("CreateDXGIFactory");
  match unsafe { CREATE_FACTORY.get() } {
    Some(real) => unsafe { real(riid, factory) },
    None => E_NOTIMPL
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn CreateDXGIFactory1(riid: *const GUID, factory: *mut *mut c_void) -> HRESULT {
  payload::ensure_loaded();
  debug!("CreateDXGIFactory1");
  match unsafe { CREATE_FACTORY1.get() } {
    Some(real) => unsafe { real(riid, factory) },
    None => E_NOTIMPL
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn CreateDXGIFactory2(flags: u32, riid: *const GUID, factory: *mut *mut c_void) -> HRESULT {
  payload::ensure_loaded();
  debug!("CreateDXGIFactory2 (flags={flags:#x})");
  match unsafe { CREATE_FACTORY2.get() } {
    Some(real) => unsafe { real(flags, riid, factory) },
    None => E_NOTIMPL
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn DXGIGetDebugInterface1(flags: u32, riid: *const GUID, debug: *mut *mut c_void) -> HRESULT {
  payload::ensure_loaded();
  match unsafe { GET_DEBUG_INTERFACE1.get() } {
    Some(real) => unsafe { real(flags, riid, debug) },
    None => E_NOTIMPL
  }
}

#[unsafe(no_mangle)]
pub unsafe extern "system" fn DXGIDeclareAdapterRemovalSupport() -> HRESULT {
  payload::ensure_loaded();
  match unsafe { DECLARE_ADAPTER_REMOVAL_SUPPORT.get() } {
    Some(real) => unsafe { real() },
    None => E_NOTIMPL
  }
}
