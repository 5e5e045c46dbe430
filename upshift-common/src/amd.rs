//! AMD driver extension interfaces (`amdxc64.dll`).
//!
//! Each interface is a COM object: a pointer to a v-table whose first three slots are `IUnknown`.

#![allow(non_camel_case_types, non_snake_case)]

use std::ffi::{c_char, c_void};

use crate::guid::Guid;

pub type HRESULT = i32;

pub const S_OK: HRESULT = 0;
pub const E_NOTIMPL: HRESULT = 0x8000_4001_u32 as i32;
pub const E_NOINTERFACE: HRESULT = 0x8000_4002_u32 as i32;
pub const E_POINTER: HRESULT = 0x8000_4003_u32 as i32;

pub const IID_IAMD_EXT_D3D_FACTORY: Guid = Guid::from_u128(0x014937ec_9288_446f_a9ac_d75a8e3a984f);
pub const IID_IAMD_EXT_D3D_SHADER_INTRINSICS: Guid = Guid::from_u128(0xba019d53_ccab_4cbd_b56a_7230ed4330ad);
pub const IID_IAMD_EXT_FFX_API: Guid = Guid::from_u128(0xb58d6601_7401_4234_8180_6febfc0e484c);
pub const IID_IAMD_EXT_D3D_DEVICE8: Guid = Guid::from_u128(0x26d8ac9f_0f4e_4e1a_8a6e_5fb7c6d5b7a1);

pub type QueryInterfaceFn =
  unsafe extern "system" fn(this: *mut c_void, riid: *const Guid, ppv_object: *mut *mut c_void) -> HRESULT;
pub type AddRefFn = unsafe extern "system" fn(this: *mut c_void) -> u32;
pub type ReleaseFn = unsafe extern "system" fn(this: *mut c_void) -> u32;

#[repr(C)]
pub struct IUnknownVtbl {
  pub QueryInterface: QueryInterfaceFn,
  pub AddRef: AddRefFn,
  pub Release: ReleaseFn
}

pub type CreateInterfaceFn = unsafe extern "system" fn(
  this: *mut c_void,
  outer: *mut c_void,
  riid: *const Guid,
  ppv_object: *mut *mut c_void
) -> HRESULT;

#[repr(C)]
pub struct IAmdExtD3DFactoryVtbl {
  pub base: IUnknownVtbl,
  pub CreateInterface: CreateInterfaceFn
}

/// Every AMD extension object starts with its v-table pointer.
#[repr(C)]
pub struct ComObject<V: 'static> {
  pub vtbl: *const V
}

pub type UpdateFfxApiProviderFn =
  unsafe extern "system" fn(this: *mut c_void, data: *mut c_void, data_size_in_bytes: u32) -> HRESULT;

#[repr(C)]
pub struct IAmdExtFfxApiVtbl {
  pub base: IUnknownVtbl,
  pub UpdateFfxApiProvider: UpdateFfxApiProviderFn
}

#[repr(C)]
pub struct IAmdExtD3DShaderIntrinsicsVtbl {
  pub base: IUnknownVtbl,
  pub GetInfo: unsafe extern "system" fn(this: *mut c_void, info: *mut c_void) -> HRESULT,
  pub CheckSupport: unsafe extern "system" fn(this: *mut c_void, intrinsic: u32) -> HRESULT,
  pub Enable: unsafe extern "system" fn(this: *mut c_void) -> HRESULT
}

pub type StubFn = unsafe extern "system" fn(this: *mut c_void) -> HRESULT;

/// Slots of `IAmdExtD3DDevice8` that precede the wave-matrix query.
pub const DEVICE8_STUB_SLOTS: usize = 13;

#[repr(C)]
pub struct IAmdExtD3DDevice8Vtbl {
  pub base: IUnknownVtbl,
  pub stubs: [StubFn; DEVICE8_STUB_SLOTS],
  pub GetWaveMatrixProperties:
    unsafe extern "system" fn(this: *mut c_void, count: *mut u64, properties: *mut AmdExtWaveMatrixProperties) -> HRESULT
}

pub mod wave_matrix_type {
  pub const FLOAT16: u32 = 0;
  pub const FLOAT32: u32 = 1;
  pub const INT8: u32 = 2;
  pub const INT32: u32 = 3;
  pub const FP8: u32 = 4;
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AmdExtWaveMatrixProperties {
  pub mSize: u64,
  pub nSize: u64,
  pub kSize: u64,
  pub aType: u32,
  pub bType: u32,
  pub cType: u32,
  pub resultType: u32,
  pub saturatingAccumulation: bool
}

pub type PfnAmdExtD3DCreateInterface =
  unsafe extern "system" fn(outer: *mut c_void, riid: *const Guid, ppv_object: *mut *mut c_void) -> HRESULT;

/// Provider table handed to `UpdateFfxApiProvider`.
#[repr(C)]
pub struct ffxProviderInterface {
  pub versionId: u64,
  pub versionName: *const c_char,
  pub canProvide: *mut c_void,
  pub createContext: *mut c_void,
  pub destroyContext: *mut c_void,
  pub configure: *mut c_void,
  pub query: *mut c_void,
  pub dispatch: *mut c_void
}

#[repr(C)]
pub struct ExternalProviderData {
  pub structVersion: u32,
  pub descType: u64,
  pub provider: ffxProviderInterface
}

/// Extra argument of `UpdateFfxApiProviderEx`.
#[repr(C)]
pub struct ProviderUpdateOptions {
  pub flags: [u32; 4],
  pub reserved: *mut c_void
}

impl Default for ProviderUpdateOptions {
  fn default() -> Self {
    Self {
      flags: [0, 1, 1, 0],
      reserved: std::ptr::null_mut()
    }
  }
}

pub type PfnUpdateFfxApiProvider = unsafe extern "C" fn(data: *mut c_void, data_size_in_bytes: u32) -> HRESULT;
pub type PfnUpdateFfxApiProviderEx = unsafe extern "C" fn(
  data: *mut c_void,
  data_size_in_bytes: u32,
  options: *mut ProviderUpdateOptions
) -> HRESULT;
