//! Run configuration surface.

use crate::pacing::{DelayRange, PacingProfile};
use std::path::PathBuf;

/// Default pause between successful sends. Outreach pacing is the main
/// rate-limit defense, so this is long.
pub const DEFAULT_SEND_DELAY: DelayRange = DelayRange::from_secs(20, 40);

/// Long pause between walking one source (page/group) and the next.
pub const INTER_SOURCE_DELAY: DelayRange = DelayRange::from_secs(15, 25);

/// Shorter pause between consecutive search keywords.
pub const INTER_KEYWORD_DELAY: DelayRange = DelayRange::from_secs(5, 8);

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Where CSV channels are written.
    pub output_dir: PathBuf,
    /// Run the browser without a visible window.
    pub headless: bool,
    pub pacing: PacingProfile,
}

impl Settings {
    /// Resolve from CLI flags, defaulting the export directory to
    /// `~/.prospector/exports`.
    pub fn resolve(output_dir: Option<PathBuf>, headless: bool) -> Self {
        let output_dir = output_dir.unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".prospector")
                .join("exports")
        });
        Self {
            output_dir,
            headless,
            pacing: PacingProfile::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_output_dir_wins() {
        let s = Settings::resolve(Some(PathBuf::from("/tmp/x")), true);
        assert_eq!(s.output_dir, PathBuf::from("/tmp/x"));
        assert!(s.headless);
    }

    #[test]
    fn default_output_dir_is_under_home() {
        let s = Settings::resolve(None, false);
        assert!(s.output_dir.ends_with(".prospector/exports"));
    }
}
