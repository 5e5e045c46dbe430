pub(crate) mod win32;
