//! What an adapter reports about itself, and the rewrites applied to it.

use log::{debug, info};
use upshift_common::{Config, ConfigStore, utils::wide_to_string};

use super::Skip;

pub const VENDOR_AMD: u32 = 0x1002;
pub const VENDOR_NVIDIA: u32 = 0x10DE;
pub const VENDOR_MICROSOFT: u32 = 0x1414;

const DEFAULT_SPOOF_DEVICE_ID: u32 = 0x2684;
const DEFAULT_SPOOF_DESCRIPTION: &str = "NVIDIA GeForce RTX 4090";

/// `DXGI_ADAPTER_DESC::Description` holds 128 UTF-16 units including the terminator.
pub const DESCRIPTION_LEN: usize = 128;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdapterIdentity {
  pub vendor_id: u32,
  pub device_id: u32,
  pub description: String
}

impl AdapterIdentity {
  pub fn from_raw(vendor_id: u32, device_id: u32, description: &[u16]) -> Self {
    Self {
      vendor_id,
      device_id,
      description: wide_to_string(description)
    }
  }

  /// Names with " 90" (RX 90x0) or " GFX12" (RADV on Linux) on an AMD adapter.
  pub fn is_rdna4(&self) -> bool {
    self.vendor_id == VENDOR_AMD && (self.description.contains(" 90") || self.description.contains(" GFX12"))
  }
}

/// Writes `text` NUL-terminated, truncated to fit.
pub fn encode_description(text: &str, out: &mut [u16]) {
  if out.is_empty() {
    return;
  }
  out.fill(0);
  let room = out.len() - 1;
  for (slot, unit) in out[..room].iter_mut().zip(text.encode_utf16()) {
    *slot = unit;
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpoofPolicy {
  pub enabled: bool,
  pub vendor_id: u32,
  pub device_id: u32,
  pub description: String
}

impl SpoofPolicy {
  pub fn from_config(config: &Config) -> Self {
    Self {
      enabled: config.spoof_gpu.value_or_default(),
      vendor_id: config.spoof_vendor_id.value_or(VENDOR_NVIDIA),
      device_id: config.spoof_device_id.value_or(DEFAULT_SPOOF_DEVICE_ID),
      description: config.spoof_description.value_or(DEFAULT_SPOOF_DESCRIPTION.to_string())
    }
  }

  /// Rewrites `identity` in place. Returns false when spoofing is off or held back on this thread.
  pub fn apply(&self, identity: &mut AdapterIdentity) -> bool {
    if !self.enabled || Skip::Spoofing.active() {
      return false;
    }
    // the software rasterizer stays recognisable
    if identity.vendor_id == VENDOR_MICROSOFT {
      return false;
    }

    debug!(
      "Spoofing {} ({:#06x}:{:#06x}) as {}",
      identity.description, identity.vendor_id, identity.device_id, self.description
    );
    identity.vendor_id = self.vendor_id;
    identity.device_id = self.device_id;
    identity.description = self.description.clone();
    true
  }
}

/// Decides RDNA4 from every adapter except Microsoft's. When `fsr4Update` is not configured the result becomes its
/// volatile value.
pub fn detect_rdna4(adapters: impl IntoIterator<Item = AdapterIdentity>, config: &ConfigStore) -> bool {
  let mut rdna4 = false;
  for adapter in adapters.into_iter().filter(|a| a.vendor_id != VENDOR_MICROSOFT) {
    info!("Adapter: {}", adapter.description);
    if adapter.is_rdna4() {
      debug!("RDNA4 GPU detected");
      rdna4 = true;
    }
  }

  config.update(|c| {
    if !c.fsr4_update.has_value() {
      c.fsr4_update.set_volatile_value(rdna4);
    }
  });
  info!(
    "RDNA4: {}, Fsr4Update: {}",
    rdna4,
    config.snapshot().fsr4_update.value_or_default()
  );
  rdna4
}
