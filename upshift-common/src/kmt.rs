//! Kernel-mode thunk structures used to locate the installed display driver (`gdi32.dll!D3DKMT*`).

#![allow(non_camel_case_types, non_snake_case)]

pub type D3DKMT_HANDLE = u32;
pub type NTSTATUS = i32;

pub const MAX_ENUM_ADAPTERS: usize = 16;
pub const MAX_PATH: usize = 260;

pub const KMTQAITYPE_UMDRIVERNAME: i32 = 1;
pub const KMTUMDVERSION_DX12: i32 = 3;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct LUID {
  pub LowPart: u32,
  pub HighPart: i32
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct D3DKMT_ADAPTERINFO {
  pub hAdapter: D3DKMT_HANDLE,
  pub AdapterLuid: LUID,
  pub NumOfSources: u32,
  pub bPrecisePresentRegionsPreferred: i32
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct D3DKMT_ENUMADAPTERS {
  pub NumAdapters: u32,
  pub Adapters: [D3DKMT_ADAPTERINFO; MAX_ENUM_ADAPTERS]
}

#[repr(C)]
#[derive(Debug)]
pub struct D3DKMT_QUERYADAPTERINFO {
  pub hAdapter: D3DKMT_HANDLE,
  pub Type: i32,
  pub pPrivateDriverData: *mut std::ffi::c_void,
  pub PrivateDriverDataSize: u32
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct D3DKMT_UMDFILENAMEINFO {
  pub Version: i32,
  pub UmdFileName: [u16; MAX_PATH]
}

impl Default for D3DKMT_UMDFILENAMEINFO {
  fn default() -> Self {
    Self {
      Version: KMTUMDVERSION_DX12,
      UmdFileName: [0; MAX_PATH]
    }
  }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct D3DKMT_CLOSEADAPTER {
  pub hAdapter: D3DKMT_HANDLE
}

pub type PfnD3DKMTEnumAdapters = unsafe extern "system" fn(args: *mut D3DKMT_ENUMADAPTERS) -> NTSTATUS;
pub type PfnD3DKMTQueryAdapterInfo = unsafe extern "system" fn(args: *const D3DKMT_QUERYADAPTERINFO) -> NTSTATUS;
pub type PfnD3DKMTCloseAdapter = unsafe extern "system" fn(args: *const D3DKMT_CLOSEADAPTER) -> NTSTATUS;
