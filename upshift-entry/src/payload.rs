//! The interception payload, loaded once from the proxy's own directory.

use std::{
  ffi::c_void,
  path::PathBuf,
  sync::{
    Once,
    atomic::{AtomicUsize, Ordering}
  }
};

use anyhow::{Context, anyhow};
use log::{LevelFilter, error, info};
use upshift_common::{get_upshift_log_path, logging, utils::win32::get_module_path};
use windows::Win32::Foundation::HMODULE;

use crate::utils::win32::dll::load_library;

pub(crate) const PAYLOAD_NAME: &str = "upshift.dll";

pub(crate) static PROXY_MODULE: AtomicUsize = AtomicUsize::new(0);
static PAYLOAD: Once = Once::new();

fn payload_path() -> anyhow::Result<PathBuf> {
  let proxy = PROXY_MODULE.load(Ordering::SeqCst);
  if proxy == 0 {
    return Err(anyhow!("proxy module handle not recorded"));
  }
  let proxy_path = get_module_path(Some(HMODULE(proxy as *mut c_void))).context("proxy path")?;
  let dir = proxy_path.parent().context("proxy directory")?;
  Ok(dir.join(PAYLOAD_NAME))
}

pub(crate) fn ensure_loaded() {
  PAYLOAD.call_once(|| {
    // the payload installs its own logger, this one only reports proxy failures
    let _ = logging::init(LevelFilter::Info, false, get_upshift_log_path().as_deref());
    match payload_path().and_then(|path| load_library(&path).map(|handle| (path, handle))) {
      Ok((path, handle)) => info!("Payload {} loaded at {:#x}", path.display(), handle),
      Err(e) => error!("Payload not loaded: {:#}", e)
    }
  });
}
