//! Target platform detection.

/// Platform family the installer runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    pub fn is_windows(&self) -> bool {
        *self == Platform::Windows
    }

    /// File extensions that mark a launcher in the SDK `bin` directory.
    ///
    /// On Unix the launchers are the extensionless shell scripts.
    pub fn executable_extensions(&self) -> &'static [&'static str] {
        match self {
            Platform::Windows => &["bat", "exe", "cmd"],
            Platform::Unix => &[],
        }
    }
}
