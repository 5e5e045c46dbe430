use std::fmt;

/// Interface identifier with the same layout as the Win32 `GUID`.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guid {
  pub data1: u32,
  pub data2: u16,
  pub data3: u16,
  pub data4: [u8; 8]
}

impl Guid {
  pub const fn from_u128(uuid: u128) -> Self {
    Self {
      data1: (uuid >> 96) as u32,
      data2: (uuid >> 80 & 0xffff) as u16,
      data3: (uuid >> 64 & 0xffff) as u16,
      data4: (uuid as u64).to_be_bytes()
    }
  }

  pub const fn to_u128(&self) -> u128 {
    ((self.data1 as u128) << 96) |
      ((self.data2 as u128) << 80) |
      ((self.data3 as u128) << 64) |
      u64::from_be_bytes(self.data4) as u128
  }
}

impl fmt::Debug for Guid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
      self.data1,
      self.data2,
      self.data3,
      self.data4[0],
      self.data4[1],
      self.data4[2],
      self.data4[3],
      self.data4[4],
      self.data4[5],
      self.data4[6],
      self.data4[7]
    )
  }
}

impl fmt::Display for Guid {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(self, f)
  }
}

#[cfg(windows)]
impl From<windows_core::GUID> for Guid {
  fn from(guid: windows_core::GUID) -> Self {
    Self::from_u128(guid.to_u128())
  }
}

#[cfg(windows)]
impl From<Guid> for windows_core::GUID {
  fn from(guid: Guid) -> Self {
    windows_core::GUID::from_u128(guid.to_u128())
  }
}
