//! DXGI factory, adapter and swapchain hooks. The decisions live in `interception`, this file moves COM objects in
//! and out of them.

use std::{
  ffi::c_void,
  ptr,
  sync::atomic::{AtomicU64, Ordering},
  time::Instant
};

use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use upshift_common::{Guid, amd::HRESULT as RawHresult, utils::wide_to_string};
use windows::{
  Win32::{
    Foundation::{E_FAIL, E_NOTIMPL, HWND, LUID},
    Graphics::{
      Direct3D12::{ID3D12CommandQueue, ID3D12Device},
      Dxgi::{
        CreateDXGIFactory1, DXGI_ADAPTER_DESC, DXGI_ADAPTER_DESC1, DXGI_GPU_PREFERENCE,
        DXGI_GPU_PREFERENCE_HIGH_PERFORMANCE, DXGI_PRESENT_PARAMETERS, DXGI_SCALING_STRETCH, DXGI_SWAP_CHAIN_DESC,
        DXGI_SWAP_CHAIN_DESC1, DXGI_SWAP_CHAIN_FULLSCREEN_DESC, DXGI_SWAP_EFFECT, IDXGIAdapter, IDXGIAdapter1,
        IDXGIDevice, IDXGIFactory1, IDXGIFactory2, IDXGIFactory4, IDXGIFactory6, IDXGISwapChain1,
        Common::DXGI_MODE_SCALING_STRETCHED
      }
    }
  },
  core::{BOOL, GUID, HRESULT}
};
use windows_core::{IUnknown, Interface};

use crate::{
  detour::{HookSlot, minhook::ENGINE, vtable_entry},
  interception::{
    Skip,
    adapter::{AdapterSource, EnumPolicy, after_enumeration, enum_adapters},
    spoof::{AdapterIdentity, SpoofPolicy, encode_description},
    swapchain::{SwapchainCalls, SwapchainParams, Variant, create_swapchain, present_args}
  },
  loader::{ModuleHandle, system_loader},
  session::{self, RuntimeState}
};

pub(crate) type CreateFactoryFn = unsafe extern "system" fn(riid: *const GUID, factory: *mut *mut c_void) -> HRESULT;
pub(crate) type CreateFactory2Fn =
  unsafe extern "system" fn(flags: u32, riid: *const GUID, factory: *mut *mut c_void) -> HRESULT;

type EnumAdaptersFn = unsafe extern "system" fn(this: *mut c_void, index: u32, adapter: *mut *mut c_void) -> HRESULT;
type EnumAdapterByLuidFn =
  unsafe extern "system" fn(this: *mut c_void, luid: LUID, riid: *const GUID, adapter: *mut *mut c_void) -> HRESULT;
type EnumAdapterByGpuPreferenceFn = unsafe extern "system" fn(
  this: *mut c_void,
  index: u32,
  preference: DXGI_GPU_PREFERENCE,
  riid: *const GUID,
  adapter: *mut *mut c_void
) -> HRESULT;

type CreateSwapChainFn = unsafe extern "system" fn(
  this: *mut c_void,
  device: *mut c_void,
  desc: *mut DXGI_SWAP_CHAIN_DESC,
  swapchain: *mut *mut c_void
) -> HRESULT;
type CreateSwapChainForHwndFn = unsafe extern "system" fn(
  this: *mut c_void,
  device: *mut c_void,
  hwnd: HWND,
  desc: *const DXGI_SWAP_CHAIN_DESC1,
  fullscreen: *const DXGI_SWAP_CHAIN_FULLSCREEN_DESC,
  output: *mut c_void,
  swapchain: *mut *mut c_void
) -> HRESULT;
type CreateSwapChainForCoreWindowFn = unsafe extern "system" fn(
  this: *mut c_void,
  device: *mut c_void,
  window: *mut c_void,
  desc: *const DXGI_SWAP_CHAIN_DESC1,
  output: *mut c_void,
  swapchain: *mut *mut c_void
) -> HRESULT;

type GetDescFn = unsafe extern "system" fn(this: *mut c_void, desc: *mut DXGI_ADAPTER_DESC) -> HRESULT;
type GetDesc1Fn = unsafe extern "system" fn(this: *mut c_void, desc: *mut DXGI_ADAPTER_DESC1) -> HRESULT;

type PresentFn = unsafe extern "system" fn(this: *mut c_void, sync_interval: u32, flags: u32) -> HRESULT;
type Present1Fn = unsafe extern "system" fn(
  this: *mut c_void,
  sync_interval: u32,
  flags: u32,
  params: *const DXGI_PRESENT_PARAMETERS
) -> HRESULT;

type GetDeviceFn = unsafe extern "system" fn(this: *mut c_void, riid: *const GUID, device: *mut *mut c_void) -> HRESULT;

const FACTORY_ENUM_ADAPTERS: usize = 7;
const FACTORY_CREATE_SWAPCHAIN: usize = 10;
const FACTORY1_ENUM_ADAPTERS1: usize = 12;
const FACTORY2_CREATE_SWAPCHAIN_FOR_HWND: usize = 15;
const FACTORY2_CREATE_SWAPCHAIN_FOR_CORE_WINDOW: usize = 16;
const FACTORY4_ENUM_ADAPTER_BY_LUID: usize = 26;
const FACTORY6_ENUM_ADAPTER_BY_GPU_PREFERENCE: usize = 29;
const ADAPTER_GET_DESC: usize = 8;
const ADAPTER1_GET_DESC1: usize = 10;
const SWAPCHAIN_PRESENT: usize = 8;
const SWAPCHAIN1_PRESENT1: usize = 22;
const DEVICE_CHILD_GET_DEVICE: usize = 7;

const CONFIG_POLL_INTERVAL_MS: u64 = 1000;

static STARTED: Lazy<Instant> = Lazy::new(Instant::now);
static LAST_CONFIG_POLL_MS: AtomicU64 = AtomicU64::new(0);

pub(crate) static CREATE_FACTORY: HookSlot<CreateFactoryFn> = HookSlot::new();
pub(crate) static CREATE_FACTORY1: HookSlot<CreateFactoryFn> = HookSlot::new();
pub(crate) static CREATE_FACTORY2: HookSlot<CreateFactory2Fn> = HookSlot::new();

static ENUM_ADAPTERS: HookSlot<EnumAdaptersFn> = HookSlot::new();
static ENUM_ADAPTERS1: HookSlot<EnumAdaptersFn> = HookSlot::new();
static ENUM_ADAPTER_BY_LUID: HookSlot<EnumAdapterByLuidFn> = HookSlot::new();
static ENUM_ADAPTER_BY_GPU_PREFERENCE: HookSlot<EnumAdapterByGpuPreferenceFn> = HookSlot::new();
static CREATE_SWAPCHAIN: HookSlot<CreateSwapChainFn> = HookSlot::new();
static CREATE_SWAPCHAIN_FOR_HWND: HookSlot<CreateSwapChainForHwndFn> = HookSlot::new();
static CREATE_SWAPCHAIN_FOR_CORE_WINDOW: HookSlot<CreateSwapChainForCoreWindowFn> = HookSlot::new();
static GET_DESC: HookSlot<GetDescFn> = HookSlot::new();
static GET_DESC1: HookSlot<GetDesc1Fn> = HookSlot::new();
static PRESENT: HookSlot<PresentFn> = HookSlot::new();
static PRESENT1: HookSlot<Present1Fn> = HookSlot::new();

/// Attaches the factory exports of the system `dxgi.dll`.
pub(crate) fn attach_exports(module: ModuleHandle) {
  let loader = system_loader();
  let symbol = |name: &str| loader.resolve(module, "dxgi.dll", name).unwrap_or(0);

  let mut tx = ENGINE.begin();
  unsafe {
    CREATE_FACTORY.attach(&mut tx, symbol("CreateDXGIFactory"), create_factory as usize);
    CREATE_FACTORY1.attach(&mut tx, symbol("CreateDXGIFactory1"), create_factory1 as usize);
    CREATE_FACTORY2.attach(&mut tx, symbol("CreateDXGIFactory2"), create_factory2 as usize);
  }
  info!("[HOOK] {} DXGI exports hooked", tx.commit());
}

/// Attaches every factory method the object's interface revision offers.
unsafe fn attach_factory(factory: *mut c_void) {
  let Some(unknown) = (unsafe { IUnknown::from_raw_borrowed(&factory) }) else {
    return;
  };

  let mut tx = ENGINE.begin();
  unsafe {
    ENUM_ADAPTERS.attach(&mut tx, vtable_entry(factory, FACTORY_ENUM_ADAPTERS), enum_adapters_hook as usize);
    CREATE_SWAPCHAIN.attach(
      &mut tx,
      vtable_entry(factory, FACTORY_CREATE_SWAPCHAIN),
      create_swapchain_hook as usize
    );

    if let Ok(factory1) = unknown.cast::<IDXGIFactory1>() {
      ENUM_ADAPTERS1.attach(
        &mut tx,
        vtable_entry(factory1.as_raw(), FACTORY1_ENUM_ADAPTERS1),
        enum_adapters1_hook as usize
      );
    }
    if let Ok(factory2) = unknown.cast::<IDXGIFactory2>() {
      CREATE_SWAPCHAIN_FOR_HWND.attach(
        &mut tx,
        vtable_entry(factory2.as_raw(), FACTORY2_CREATE_SWAPCHAIN_FOR_HWND),
        create_swapchain_for_hwnd_hook as usize
      );
      CREATE_SWAPCHAIN_FOR_CORE_WINDOW.attach(
        &mut tx,
        vtable_entry(factory2.as_raw(), FACTORY2_CREATE_SWAPCHAIN_FOR_CORE_WINDOW),
        create_swapchain_for_core_window_hook as usize
      );
    }
    if let Ok(factory4) = unknown.cast::<IDXGIFactory4>() {
      ENUM_ADAPTER_BY_LUID.attach(
        &mut tx,
        vtable_entry(factory4.as_raw(), FACTORY4_ENUM_ADAPTER_BY_LUID),
        enum_adapter_by_luid_hook as usize
      );
    }
    if let Ok(factory6) = unknown.cast::<IDXGIFactory6>() {
      ENUM_ADAPTER_BY_GPU_PREFERENCE.attach(
        &mut tx,
        vtable_entry(factory6.as_raw(), FACTORY6_ENUM_ADAPTER_BY_GPU_PREFERENCE),
        enum_adapter_by_gpu_preference_hook as usize
      );
    }
  }

  let hooked = tx.commit();
  if hooked > 0 {
    info!("[HOOK] {} factory methods hooked", hooked);
  }
}

unsafe fn attach_adapter(adapter: *mut c_void) {
  let Some(unknown) = (unsafe { IUnknown::from_raw_borrowed(&adapter) }) else {
    return;
  };

  let mut tx = ENGINE.begin();
  unsafe {
    GET_DESC.attach(&mut tx, vtable_entry(adapter, ADAPTER_GET_DESC), get_desc_hook as usize);
    if let Ok(adapter1) = unknown.cast::<IDXGIAdapter1>() {
      GET_DESC1.attach(&mut tx, vtable_entry(adapter1.as_raw(), ADAPTER1_GET_DESC1), get_desc1_hook as usize);
    }
  }
  tx.commit();
}

unsafe fn attach_swapchain(swapchain: *mut c_void) {
  let Some(unknown) = (unsafe { IUnknown::from_raw_borrowed(&swapchain) }) else {
    return;
  };

  let mut tx = ENGINE.begin();
  unsafe {
    PRESENT.attach(&mut tx, vtable_entry(swapchain, SWAPCHAIN_PRESENT), present_hook as usize);
    if let Ok(swapchain1) = unknown.cast::<IDXGISwapChain1>() {
      PRESENT1.attach(&mut tx, vtable_entry(swapchain1.as_raw(), SWAPCHAIN1_PRESENT1), present1_hook as usize);
    }
  }
  tx.commit();
}

// ----------------- Factory creation -----------------

unsafe extern "system" fn create_factory(riid: *const GUID, factory: *mut *mut c_void) -> HRESULT {
  let Some(original) = CREATE_FACTORY.get() else {
    return E_FAIL;
  };
  let hr = unsafe { original(riid, factory) };
  if hr.is_ok() && !factory.is_null() {
    debug!("[HOOK] CreateDXGIFactory");
    unsafe { attach_factory(*factory) };
  }
  hr
}

unsafe extern "system" fn create_factory1(riid: *const GUID, factory: *mut *mut c_void) -> HRESULT {
  let Some(original) = CREATE_FACTORY1.get() else {
    return E_FAIL;
  };
  let hr = unsafe { original(riid, factory) };
  if hr.is_ok() && !factory.is_null() {
    debug!("[HOOK] CreateDXGIFactory1");
    unsafe { attach_factory(*factory) };
  }
  hr
}

unsafe extern "system" fn create_factory2(flags: u32, riid: *const GUID, factory: *mut *mut c_void) -> HRESULT {
  let Some(original) = CREATE_FACTORY2.get() else {
    return E_FAIL;
  };
  let hr = unsafe { original(flags, riid, factory) };
  if hr.is_ok() && !factory.is_null() {
    debug!("[HOOK] CreateDXGIFactory2 (flags: {:#x})", flags);
    unsafe { attach_factory(*factory) };
  }
  hr
}

// ----------------- Adapters -----------------

struct Enumeration {
  factory: *mut c_void,
  out: *mut *mut c_void,
  original: Option<EnumAdaptersFn>
}

impl Enumeration {
  fn current(&self) -> *mut c_void {
    if self.out.is_null() { ptr::null_mut() } else { unsafe { *self.out } }
  }
}

impl AdapterSource for Enumeration {
  fn enumerate(&mut self, index: u32) -> RawHresult {
    match self.original {
      Some(original) => unsafe { original(self.factory, index, self.out) }.0,
      None => E_FAIL.0
    }
  }

  fn enumerate_high_performance(&mut self, index: u32) -> Option<RawHresult> {
    let factory6 = unsafe { IUnknown::from_raw_borrowed(&self.factory) }?
      .cast::<IDXGIFactory6>()
      .ok()?;
    // the trampoline skips our own by-preference detour
    if let Some(original) = ENUM_ADAPTER_BY_GPU_PREFERENCE.get() {
      let hr = unsafe {
        original(
          factory6.as_raw(),
          index,
          DXGI_GPU_PREFERENCE_HIGH_PERFORMANCE,
          &IDXGIAdapter1::IID,
          self.out
        )
      };
      return Some(hr.0);
    }
    let result =
      match unsafe { factory6.EnumAdapterByGpuPreference::<IDXGIAdapter1>(index, DXGI_GPU_PREFERENCE_HIGH_PERFORMANCE) } {
        Ok(adapter) => {
          if !self.out.is_null() {
            unsafe { *self.out = adapter.into_raw() };
          }
          HRESULT(0)
        }
        Err(e) => e.code()
      };
    Some(result.0)
  }

  fn description(&self) -> Option<String> {
    let current = self.current();
    let adapter = unsafe { IDXGIAdapter::from_raw_borrowed(&current) }?;
    let desc = unsafe { adapter.GetDesc() }.ok()?;
    Some(wide_to_string(&desc.Description))
  }

  fn answers(&self, iid: &Guid) -> bool {
    let current = self.current();
    let Some(unknown) = (unsafe { IUnknown::from_raw_borrowed(&current) }) else {
      return false;
    };
    let mut found = ptr::null_mut();
    let hr = unsafe { unknown.query(&GUID::from(*iid), &mut found) };
    if hr.is_ok() && !found.is_null() {
      drop(unsafe { IUnknown::from_raw(found) });
      return true;
    }
    false
  }

  fn attach_spoofing(&mut self) {
    let current = self.current();
    if !current.is_null() {
      unsafe { attach_adapter(current) };
    }
  }
}

unsafe fn enumerate_with(slot: &HookSlot<EnumAdaptersFn>, this: *mut c_void, index: u32, adapter: *mut *mut c_void) -> HRESULT {
  let Some(original) = slot.get() else {
    return E_FAIL;
  };
  let Some(session) = session::current() else {
    return unsafe { original(this, index, adapter) };
  };

  let mut source = Enumeration {
    factory: this,
    out: adapter,
    original: Some(original)
  };
  let policy = EnumPolicy::from_config(&session.config().snapshot());
  HRESULT(enum_adapters(&mut source, policy, session.state(), index))
}

unsafe extern "system" fn enum_adapters_hook(this: *mut c_void, index: u32, adapter: *mut *mut c_void) -> HRESULT {
  unsafe { enumerate_with(&ENUM_ADAPTERS, this, index, adapter) }
}

unsafe extern "system" fn enum_adapters1_hook(this: *mut c_void, index: u32, adapter: *mut *mut c_void) -> HRESULT {
  unsafe { enumerate_with(&ENUM_ADAPTERS1, this, index, adapter) }
}

fn finish_enumeration(this: *mut c_void, adapter: *mut *mut c_void, hr: HRESULT) -> HRESULT {
  let Some(session) = session::current() else {
    return hr;
  };
  let mut source = Enumeration {
    factory: this,
    out: adapter,
    original: None
  };
  HRESULT(after_enumeration(&mut source, session.state(), hr.0))
}

unsafe extern "system" fn enum_adapter_by_luid_hook(
  this: *mut c_void,
  luid: LUID,
  riid: *const GUID,
  adapter: *mut *mut c_void
) -> HRESULT {
  let Some(original) = ENUM_ADAPTER_BY_LUID.get() else {
    return E_FAIL;
  };
  let hr = unsafe { original(this, luid, riid, adapter) };
  finish_enumeration(this, adapter, hr)
}

unsafe extern "system" fn enum_adapter_by_gpu_preference_hook(
  this: *mut c_void,
  index: u32,
  preference: DXGI_GPU_PREFERENCE,
  riid: *const GUID,
  adapter: *mut *mut c_void
) -> HRESULT {
  let Some(original) = ENUM_ADAPTER_BY_GPU_PREFERENCE.get() else {
    return E_FAIL;
  };
  let hr = unsafe { original(this, index, preference, riid, adapter) };
  finish_enumeration(this, adapter, hr)
}

/// Rewrites the identifying fields every `DXGI_ADAPTER_DESC*` revision starts with.
fn spoof_desc(description: &mut [u16; 128], vendor_id: &mut u32, device_id: &mut u32) {
  let Some(session) = session::current() else {
    return;
  };
  let policy = SpoofPolicy::from_config(&session.config().snapshot());
  let mut identity = AdapterIdentity::from_raw(*vendor_id, *device_id, description);
  if policy.apply(&mut identity) {
    *vendor_id = identity.vendor_id;
    *device_id = identity.device_id;
    encode_description(&identity.description, description);
  }
}

unsafe extern "system" fn get_desc_hook(this: *mut c_void, desc: *mut DXGI_ADAPTER_DESC) -> HRESULT {
  let Some(original) = GET_DESC.get() else {
    return E_FAIL;
  };
  let hr = unsafe { original(this, desc) };
  if hr.is_ok()
    && let Some(desc) = unsafe { desc.as_mut() }
  {
    spoof_desc(&mut desc.Description, &mut desc.VendorId, &mut desc.DeviceId);
  }
  hr
}

unsafe extern "system" fn get_desc1_hook(this: *mut c_void, desc: *mut DXGI_ADAPTER_DESC1) -> HRESULT {
  let Some(original) = GET_DESC1.get() else {
    return E_FAIL;
  };
  let hr = unsafe { original(this, desc) };
  if hr.is_ok()
    && let Some(desc) = unsafe { desc.as_mut() }
  {
    spoof_desc(&mut desc.Description, &mut desc.VendorId, &mut desc.DeviceId);
  }
  hr
}

/// Real identities of every adapter, for driver detection.
pub(crate) fn real_adapters() -> Vec<AdapterIdentity> {
  let _no_preference = Skip::HighPerfCheck.scoped();
  let _no_spoofing = Skip::Spoofing.scoped();
  let Ok(factory) = (unsafe { CreateDXGIFactory1::<IDXGIFactory1>() }) else {
    warn!("Can't create a DXGI factory for adapter detection");
    return Vec::new();
  };

  (0..)
    .map_while(|index| unsafe { factory.EnumAdapters1(index) }.ok())
    .filter_map(|adapter| unsafe { adapter.GetDesc1() }.ok())
    .map(|desc| AdapterIdentity::from_raw(desc.VendorId, desc.DeviceId, &desc.Description))
    .collect()
}

fn adapter_by_luid(luid: LUID) -> Option<AdapterIdentity> {
  let _no_spoofing = Skip::Spoofing.scoped();
  let factory = unsafe { CreateDXGIFactory1::<IDXGIFactory4>() }.ok()?;
  let adapter = unsafe { factory.EnumAdapterByLuid::<IDXGIAdapter>(luid) }.ok()?;
  let desc = unsafe { adapter.GetDesc() }.ok()?;
  Some(AdapterIdentity::from_raw(desc.VendorId, desc.DeviceId, &desc.Description))
}

// ----------------- Swapchains -----------------

#[derive(Clone, Copy)]
enum Args {
  Basic {
    desc: *mut DXGI_SWAP_CHAIN_DESC,
    original: CreateSwapChainFn
  },
  Hwnd {
    hwnd: HWND,
    desc: *const DXGI_SWAP_CHAIN_DESC1,
    fullscreen: *const DXGI_SWAP_CHAIN_FULLSCREEN_DESC,
    output: *mut c_void,
    original: CreateSwapChainForHwndFn
  },
  CoreWindow {
    window: *mut c_void,
    desc: *const DXGI_SWAP_CHAIN_DESC1,
    output: *mut c_void,
    original: CreateSwapChainForCoreWindowFn
  }
}

struct Creation {
  factory: *mut c_void,
  device: *mut c_void,
  out: *mut *mut c_void,
  args: Args,
  fg_module: Option<String>
}

impl Creation {
  fn variant(&self) -> Variant {
    match self.args {
      Args::Basic { .. } => Variant::Basic,
      Args::Hwnd { .. } => Variant::Hwnd,
      Args::CoreWindow { .. } => Variant::CoreWindow
    }
  }

  /// `None` when the device or the description is null.
  fn params(&self) -> Option<SwapchainParams> {
    if self.device.is_null() {
      return None;
    }

    match self.args {
      Args::Basic { desc, .. } => {
        let desc = unsafe { desc.as_ref() }?;
        Some(SwapchainParams {
          width: desc.BufferDesc.Width,
          height: desc.BufferDesc.Height,
          buffer_count: desc.BufferCount,
          swap_effect: desc.SwapEffect.0,
          flags: desc.Flags,
          windowed: Some(desc.Windowed.as_bool()),
          stretch: false
        })
      }
      Args::Hwnd { desc, fullscreen, .. } => {
        let desc = unsafe { desc.as_ref() }?;
        Some(SwapchainParams {
          windowed: unsafe { fullscreen.as_ref() }.map(|f| f.Windowed.as_bool()),
          ..params1(desc)
        })
      }
      Args::CoreWindow { desc, .. } => unsafe { desc.as_ref() }.map(params1)
    }
  }

  /// Symbol the frame-generation module exports for this variant. Its signature matches the factory method.
  fn fg_symbol(&self) -> &'static str {
    match self.args {
      Args::Basic { .. } => "CreateSwapChain",
      Args::Hwnd { .. } => "CreateSwapChainForHwnd",
      Args::CoreWindow { .. } => "CreateSwapChainForCoreWindow"
    }
  }

  /// The caller's arguments, untouched.
  fn forward(&self) -> HRESULT {
    unsafe {
      match self.args {
        Args::Basic { desc, original } => original(self.factory, self.device, desc, self.out),
        Args::Hwnd {
          hwnd,
          desc,
          fullscreen,
          output,
          original
        } => original(self.factory, self.device, hwnd, desc, fullscreen, output, self.out),
        Args::CoreWindow {
          window,
          desc,
          output,
          original
        } => original(self.factory, self.device, window, desc, output, self.out)
      }
    }
  }

  /// Creates with the adjusted description, through `via` when given instead of the real factory method.
  /// Only reached when `params` could be read, so the descriptions are not null.
  fn create(&self, params: &SwapchainParams, via: Option<usize>) -> HRESULT {
    unsafe {
      match self.args {
        Args::Basic { desc, original } => {
          let original = via.map_or(original, |f| std::mem::transmute::<usize, CreateSwapChainFn>(f));
          let mut local = *desc;
          local.BufferCount = params.buffer_count;
          local.SwapEffect = DXGI_SWAP_EFFECT(params.swap_effect);
          local.Flags = params.flags;
          if let Some(windowed) = params.windowed {
            local.Windowed = BOOL::from(windowed);
          }
          if params.stretch {
            local.BufferDesc.Scaling = DXGI_MODE_SCALING_STRETCHED;
          }
          original(self.factory, self.device, &mut local, self.out)
        }
        Args::Hwnd {
          hwnd,
          desc,
          fullscreen,
          output,
          original
        } => {
          let original = via.map_or(original, |f| std::mem::transmute::<usize, CreateSwapChainForHwndFn>(f));
          let mut local = *desc;
          apply1(&mut local, params);
          let mut local_fullscreen = fullscreen.as_ref().copied();
          if let Some(f) = local_fullscreen.as_mut() {
            if let Some(windowed) = params.windowed {
              f.Windowed = BOOL::from(windowed);
            }
            if params.stretch {
              f.Scaling = DXGI_MODE_SCALING_STRETCHED;
            }
          }
          let fullscreen = local_fullscreen.as_ref().map_or(ptr::null(), |f| f as *const _);
          original(self.factory, self.device, hwnd, &local, fullscreen, output, self.out)
        }
        Args::CoreWindow {
          window,
          desc,
          output,
          original
        } => {
          let original = via.map_or(original, |f| std::mem::transmute::<usize, CreateSwapChainForCoreWindowFn>(f));
          let mut local = *desc;
          apply1(&mut local, params);
          original(self.factory, self.device, window, &local, output, self.out)
        }
      }
    }
  }
}

fn params1(desc: &DXGI_SWAP_CHAIN_DESC1) -> SwapchainParams {
  SwapchainParams {
    width: desc.Width,
    height: desc.Height,
    buffer_count: desc.BufferCount,
    swap_effect: desc.SwapEffect.0,
    flags: desc.Flags,
    windowed: None,
    stretch: false
  }
}

fn apply1(desc: &mut DXGI_SWAP_CHAIN_DESC1, params: &SwapchainParams) {
  desc.BufferCount = params.buffer_count;
  desc.SwapEffect = DXGI_SWAP_EFFECT(params.swap_effect);
  desc.Flags = params.flags;
  if params.stretch {
    desc.Scaling = DXGI_SCALING_STRETCH;
  }
}

/// The device owning a D3D12 queue. The reference is handed to the caller.
unsafe fn queue_device(queue: *mut c_void) -> Option<ID3D12Device> {
  unsafe {
    let get_device: GetDeviceFn = std::mem::transmute(vtable_entry(queue, DEVICE_CHILD_GET_DEVICE));
    let mut device = ptr::null_mut();
    if get_device(queue, &ID3D12Device::IID, &mut device).is_err() || device.is_null() {
      return None;
    }
    Some(ID3D12Device::from_raw(device))
  }
}

impl SwapchainCalls for Creation {
  fn forward_original(&mut self) -> RawHresult {
    self.forward().0
  }

  fn capture_queue(&mut self, state: &RuntimeState) -> bool {
    let Some(unknown) = (unsafe { IUnknown::from_raw_borrowed(&self.device) }) else {
      return false;
    };
    let Ok(queue) = unknown.cast::<ID3D12CommandQueue>() else {
      return false;
    };

    state.command_queue.store(queue.as_raw() as usize, Ordering::SeqCst);
    if let Some(device) = unsafe { queue_device(queue.as_raw()) } {
      state.d3d12_device.store(device.as_raw() as usize, Ordering::SeqCst);
      let luid = unsafe { device.GetAdapterLuid() };
      state.set_adapter(adapter_by_luid(luid));
    }
    true
  }

  fn capture_device(&mut self, state: &RuntimeState) {
    let Some(unknown) = (unsafe { IUnknown::from_raw_borrowed(&self.device) }) else {
      return;
    };
    let Ok(dxgi_device) = unknown.cast::<IDXGIDevice>() else {
      return;
    };

    state.d3d11_device.store(self.device as usize, Ordering::SeqCst);
    let _no_spoofing = Skip::Spoofing.scoped();
    if let Ok(adapter) = unsafe { dxgi_device.GetAdapter() }
      && let Ok(desc) = unsafe { adapter.GetDesc() }
    {
      state.set_adapter(Some(AdapterIdentity::from_raw(desc.VendorId, desc.DeviceId, &desc.Description)));
    }
  }

  fn create_frame_generation(&mut self, params: &SwapchainParams) -> RawHresult {
    let Some(module_name) = self.fg_module.as_deref() else {
      debug!("No frame generation module configured");
      return E_NOTIMPL.0;
    };

    let loader = system_loader();
    let symbol = loader
      .load_module(module_name)
      .and_then(|module| loader.resolve(module, module_name, self.fg_symbol()));
    match symbol {
      Ok(create) => self.create(params, Some(create)).0,
      Err(e) => {
        error!("Frame generation unavailable: {}", e);
        E_NOTIMPL.0
      }
    }
  }

  fn create_plain(&mut self, params: &SwapchainParams) -> RawHresult {
    self.create(params, None).0
  }

  fn intercept_present(&mut self, _state: &RuntimeState) -> usize {
    if self.out.is_null() {
      return 0;
    }
    let swapchain = unsafe { *self.out };
    if !swapchain.is_null() {
      unsafe { attach_swapchain(swapchain) };
    }
    swapchain as usize
  }
}

fn create_with(mut creation: Creation) -> HRESULT {
  let Some(session) = session::current() else {
    return creation.forward();
  };

  creation.fg_module = session.config().snapshot().fg_module.value();
  let variant = creation.variant();
  let params = creation.params();
  let (hr, path) = create_swapchain(&mut creation, session.config(), session.state(), variant, params);
  debug!("[HOOK] {:?} swapchain: {:?}, {:#x}", variant, path, hr as u32);
  HRESULT(hr)
}

unsafe extern "system" fn create_swapchain_hook(
  this: *mut c_void,
  device: *mut c_void,
  desc: *mut DXGI_SWAP_CHAIN_DESC,
  swapchain: *mut *mut c_void
) -> HRESULT {
  let Some(original) = CREATE_SWAPCHAIN.get() else {
    return E_FAIL;
  };
  create_with(Creation {
    factory: this,
    device,
    out: swapchain,
    args: Args::Basic { desc, original },
    fg_module: None
  })
}

unsafe extern "system" fn create_swapchain_for_hwnd_hook(
  this: *mut c_void,
  device: *mut c_void,
  hwnd: HWND,
  desc: *const DXGI_SWAP_CHAIN_DESC1,
  fullscreen: *const DXGI_SWAP_CHAIN_FULLSCREEN_DESC,
  output: *mut c_void,
  swapchain: *mut *mut c_void
) -> HRESULT {
  let Some(original) = CREATE_SWAPCHAIN_FOR_HWND.get() else {
    return E_FAIL;
  };
  create_with(Creation {
    factory: this,
    device,
    out: swapchain,
    args: Args::Hwnd {
      hwnd,
      desc,
      fullscreen,
      output,
      original
    },
    fg_module: None
  })
}

unsafe extern "system" fn create_swapchain_for_core_window_hook(
  this: *mut c_void,
  device: *mut c_void,
  window: *mut c_void,
  desc: *const DXGI_SWAP_CHAIN_DESC1,
  output: *mut c_void,
  swapchain: *mut *mut c_void
) -> HRESULT {
  let Some(original) = CREATE_SWAPCHAIN_FOR_CORE_WINDOW.get() else {
    return E_FAIL;
  };
  create_with(Creation {
    factory: this,
    device,
    out: swapchain,
    args: Args::CoreWindow {
      window,
      desc,
      output,
      original
    },
    fg_module: None
  })
}

// ----------------- Present -----------------

fn before_present(sync_interval: u32, flags: u32) -> (u32, u32) {
  let Some(session) = session::current() else {
    return (sync_interval, flags);
  };
  let now = STARTED.elapsed().as_millis() as u64;
  let last = LAST_CONFIG_POLL_MS.load(Ordering::Relaxed);
  if now.saturating_sub(last) >= CONFIG_POLL_INTERVAL_MS
    && LAST_CONFIG_POLL_MS
      .compare_exchange(last, now, Ordering::SeqCst, Ordering::Relaxed)
      .is_ok()
    && session.poll_config()
  {
    info!("Config reloaded");
  }
  present_args(&session.config().snapshot(), session.state(), sync_interval, flags)
}

unsafe extern "system" fn present_hook(this: *mut c_void, sync_interval: u32, flags: u32) -> HRESULT {
  let Some(original) = PRESENT.get() else {
    return E_FAIL;
  };
  let (sync_interval, flags) = before_present(sync_interval, flags);
  unsafe { original(this, sync_interval, flags) }
}

unsafe extern "system" fn present1_hook(
  this: *mut c_void,
  sync_interval: u32,
  flags: u32,
  params: *const DXGI_PRESENT_PARAMETERS
) -> HRESULT {
  let Some(original) = PRESENT1.get() else {
    return E_FAIL;
  };
  let (sync_interval, flags) = before_present(sync_interval, flags);
  unsafe { original(this, sync_interval, flags, params) }
}
