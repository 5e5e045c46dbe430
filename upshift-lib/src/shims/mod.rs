//! Stand-ins for the AMD driver extension interfaces.
//!
//! Every `CreateInterface`-shaped call goes through [`serve`]: the route decides between a synthetic object, the
//! real implementation captured earlier, or `E_NOINTERFACE`.

pub mod amd_ext;
pub mod provider;

use std::ffi::c_void;

use log::info;
use upshift_common::{
  Guid,
  amd::{
    ComObject, E_NOINTERFACE, E_POINTER, HRESULT, IAmdExtD3DFactoryVtbl, IID_IAMD_EXT_D3D_DEVICE8,
    IID_IAMD_EXT_D3D_FACTORY, IID_IAMD_EXT_D3D_SHADER_INTRINSICS, IID_IAMD_EXT_FFX_API, PfnAmdExtD3DCreateInterface,
    S_OK
  }
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Synthetic {
  Factory,
  FfxApi,
  ShaderIntrinsics,
  Device8
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterfaceRoute {
  Synthesize(Synthetic),
  Forward
}

/// Routing of the `AmdExtD3DCreateInterface` export.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExportRoutes {
  pub fsr4_update: bool,
  /// Proton's `amdxc64.dll` lacks parts of the factory, so it is always replaced there.
  pub on_linux: bool
}

impl ExportRoutes {
  pub fn route(&self, riid: &Guid) -> InterfaceRoute {
    if !self.fsr4_update {
      return InterfaceRoute::Forward;
    }
    if *riid == IID_IAMD_EXT_D3D_FACTORY && self.on_linux {
      return InterfaceRoute::Synthesize(Synthetic::Factory);
    }
    if *riid == IID_IAMD_EXT_FFX_API {
      return InterfaceRoute::Synthesize(Synthetic::FfxApi);
    }
    InterfaceRoute::Forward
  }
}

/// Routing of the synthetic factory's `CreateInterface`.
pub fn factory_route(riid: &Guid) -> InterfaceRoute {
  if *riid == IID_IAMD_EXT_D3D_SHADER_INTRINSICS {
    InterfaceRoute::Synthesize(Synthetic::ShaderIntrinsics)
  } else if *riid == IID_IAMD_EXT_D3D_DEVICE8 {
    InterfaceRoute::Synthesize(Synthetic::Device8)
  } else {
    InterfaceRoute::Forward
  }
}

/// Something that can hand out AMD extension interfaces.
pub trait InterfaceSource {
  /// # Safety
  /// Arguments follow the COM `CreateInterface` contract.
  unsafe fn create_interface(&self, outer: *mut c_void, riid: *const Guid, ppv: *mut *mut c_void) -> HRESULT;
}

impl InterfaceSource for PfnAmdExtD3DCreateInterface {
  unsafe fn create_interface(&self, outer: *mut c_void, riid: *const Guid, ppv: *mut *mut c_void) -> HRESULT {
    unsafe { self(outer, riid, ppv) }
  }
}

/// A factory object returned by the driver.
#[derive(Clone, Copy, Debug)]
pub struct RealFactory(pub *mut ComObject<IAmdExtD3DFactoryVtbl>);

impl InterfaceSource for RealFactory {
  unsafe fn create_interface(&self, outer: *mut c_void, riid: *const Guid, ppv: *mut *mut c_void) -> HRESULT {
    unsafe { ((*(*self.0).vtbl).CreateInterface)(self.0 as *mut c_void, outer, riid, ppv) }
  }
}

/// Answers one request along `route`. `synthesize` yields the process-lifetime object of a synthetic kind.
///
/// # Safety
/// `riid` must be readable; `ppv` must be null or writable.
pub unsafe fn serve(
  route: InterfaceRoute,
  real: Option<&dyn InterfaceSource>,
  outer: *mut c_void,
  riid: *const Guid,
  ppv: *mut *mut c_void,
  synthesize: impl FnOnce(Synthetic) -> *mut c_void
) -> HRESULT {
  match route {
    InterfaceRoute::Synthesize(kind) => {
      if ppv.is_null() {
        return E_POINTER;
      }
      unsafe { *ppv = synthesize(kind) };
      info!("{:?} queried, returning the custom one", kind);
      S_OK
    }
    InterfaceRoute::Forward => match real {
      Some(real) => unsafe { real.create_interface(outer, riid, ppv) },
      None => E_NOINTERFACE
    }
  }
}

#[cfg(test)]
mod tests {
  use std::ptr;

  use super::*;

  const OTHER: Guid = Guid::from_u128(0x11111111_2222_3333_4444_555555555555);

  struct Echo(HRESULT);

  impl InterfaceSource for Echo {
    unsafe fn create_interface(&self, _outer: *mut c_void, _riid: *const Guid, ppv: *mut *mut c_void) -> HRESULT {
      unsafe { *ppv = 0xEC as *mut c_void };
      self.0
    }
  }

  #[test]
  fn export_forwards_everything_without_fsr4_update() {
    let routes = ExportRoutes {
      fsr4_update: false,
      on_linux: true
    };
    assert_eq!(routes.route(&IID_IAMD_EXT_FFX_API), InterfaceRoute::Forward);
    assert_eq!(routes.route(&IID_IAMD_EXT_D3D_FACTORY), InterfaceRoute::Forward);
  }

  #[test]
  fn factory_is_only_replaced_under_proton() {
    let windows = ExportRoutes {
      fsr4_update: true,
      on_linux: false
    };
    let proton = ExportRoutes {
      fsr4_update: true,
      on_linux: true
    };
    assert_eq!(windows.route(&IID_IAMD_EXT_D3D_FACTORY), InterfaceRoute::Forward);
    assert_eq!(proton.route(&IID_IAMD_EXT_D3D_FACTORY), InterfaceRoute::Synthesize(Synthetic::Factory));
    assert_eq!(windows.route(&IID_IAMD_EXT_FFX_API), InterfaceRoute::Synthesize(Synthetic::FfxApi));
    assert_eq!(windows.route(&OTHER), InterfaceRoute::Forward);
  }

  #[test]
  fn factory_synthesizes_the_missing_interfaces() {
    assert_eq!(
      factory_route(&IID_IAMD_EXT_D3D_SHADER_INTRINSICS),
      InterfaceRoute::Synthesize(Synthetic::ShaderIntrinsics)
    );
    assert_eq!(factory_route(&IID_IAMD_EXT_D3D_DEVICE8), InterfaceRoute::Synthesize(Synthetic::Device8));
    assert_eq!(factory_route(&IID_IAMD_EXT_FFX_API), InterfaceRoute::Forward);
  }

  #[test]
  fn forward_without_a_real_object_has_no_interface() {
    let mut out = ptr::null_mut();
    let result = unsafe { serve(InterfaceRoute::Forward, None, ptr::null_mut(), &OTHER, &mut out, |_| ptr::null_mut()) };
    assert_eq!(result, E_NOINTERFACE);
    assert!(out.is_null());
  }

  #[test]
  fn forward_returns_the_real_result() {
    let real = Echo(S_OK);
    let mut out = ptr::null_mut();
    let result =
      unsafe { serve(InterfaceRoute::Forward, Some(&real), ptr::null_mut(), &OTHER, &mut out, |_| ptr::null_mut()) };
    assert_eq!(result, S_OK);
    assert_eq!(out as usize, 0xEC);
  }

  #[test]
  fn synthesized_objects_ignore_the_real_source() {
    let real = Echo(E_NOINTERFACE);
    let mut out = ptr::null_mut();
    let result = unsafe {
      serve(
        InterfaceRoute::Synthesize(Synthetic::Device8),
        Some(&real),
        ptr::null_mut(),
        &IID_IAMD_EXT_D3D_DEVICE8,
        &mut out,
        |kind| if kind == Synthetic::Device8 { 0xD8 as *mut c_void } else { ptr::null_mut() }
      )
    };
    assert_eq!(result, S_OK);
    assert_eq!(out as usize, 0xD8);

    let result = unsafe {
      serve(
        InterfaceRoute::Synthesize(Synthetic::Device8),
        None,
        ptr::null_mut(),
        &IID_IAMD_EXT_D3D_DEVICE8,
        ptr::null_mut(),
        |_| ptr::null_mut()
      )
    };
    assert_eq!(result, E_POINTER);
  }
}
