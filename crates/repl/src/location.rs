use std::path::{Path, PathBuf};

use breakpoints::source_location_for;
use debugger::StackFrame;

const PACKAGE_SCHEME: &str = "pkg:/";

/// The staged file behind a `pkg:/` path reported by the device.
pub fn staged_path(staging_root: &Path, device_path: &str) -> PathBuf {
    let relative = device_path
        .strip_prefix(PACKAGE_SCHEME)
        .unwrap_or(device_path)
        .trim_start_matches('/');
    staging_root.join(relative)
}

/// `file:line` of a frame in the user's sources, falling back to the device
/// path when the frame cannot be mapped.
pub async fn describe_frame(staging_root: &Path, frame: &StackFrame) -> String {
    let staged = staged_path(staging_root, &frame.file_path);
    match source_location_for(&staged, frame.line_number).await {
        Ok(location) => format!(
            "{} ({}:{})",
            frame.function_identifier,
            location.file_path.display(),
            location.line_number
        ),
        Err(e) => {
            tracing::debug!(error = %e, file = %frame.file_path, "mapping frame to source");
            format!(
                "{} ({}:{})",
                frame.function_identifier, frame.file_path, frame.line_number
            )
        }
    }
}
