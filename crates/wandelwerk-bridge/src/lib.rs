// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// wandelwerk-bridge: external routes for DOCX-to-PDF conversion.
//
// Defines the word-processor automation trait with per-platform
// implementations (Windows COM, macOS AppleScript, a stub elsewhere), the
// helper-script runner, and guarded subprocess execution shared by both.

pub mod helper;
pub mod process;
pub mod traits;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "macos")]
pub mod macos;

// Compiled everywhere so tests and callers can opt into it explicitly.
pub mod stub;

pub use helper::HelperScript;
pub use process::{ProcessOutput, absolute_path, run_guarded};
pub use traits::WordAutomation;

/// The word-processor automation route for the current operating system.
pub fn platform_bridge() -> Box<dyn WordAutomation> {
    #[cfg(target_os = "windows")]
    {
        Box::new(windows::WordComBridge::new())
    }
    #[cfg(target_os = "macos")]
    {
        Box::new(macos::WordAppleScriptBridge::new())
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        Box::new(stub::StubBridge)
    }
}
