#[cfg(windows)]
pub mod win32;

/// Decodes a NUL-terminated UTF-16 buffer, stopping at the first NUL.
pub fn wide_to_string(buffer: &[u16]) -> String {
  let len = buffer.iter().position(|c| *c == 0).unwrap_or(buffer.len());
  String::from_utf16_lossy(&buffer[..len])
}

pub fn widestring<S: Into<String>>(value: S) -> Vec<u16> {
  value
    .into()
    .encode_utf16()
    .chain(std::iter::once(0))
    .collect::<Vec<u16>>()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wide_strings_round_trip_through_nul_terminated_buffers() {
    let wide = widestring("amdxcffx64.dll");
    assert_eq!(wide.last(), Some(&0));
    let mut buffer = [0u16; 32];
    buffer[..wide.len()].copy_from_slice(&wide);
    assert_eq!(wide_to_string(&buffer), "amdxcffx64.dll");
  }
}
