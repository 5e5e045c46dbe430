mod dxgi;

use crate::utils::win32::dll::RealDll;

pub(crate) static DXGI: RealDll = RealDll::new("dxgi.dll");
