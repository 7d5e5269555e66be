/// Operating system families with distinct Python install layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      _ => None,
    }
  }

  /// Whether installs under a prefix use the `posix_prefix` layout
  /// (`lib/pythonX.Y/site-packages`) rather than the Windows `Lib/site-packages` one.
  pub fn uses_posix_layout(&self) -> bool {
    !matches!(self, Self::Windows)
  }
}
