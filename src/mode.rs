//! Build mode resolution.

use std::fmt;

/// Environment variable that overrides the command-line mode flags.
pub const MODE_ENV: &str = "SITEPIPE_ENV";

/// Value of [`MODE_ENV`] selecting production mode.
pub const PRODUCTION_MARKER: &str = "production";

/// Development vs. production behavior switch.
///
/// Production enables minification and image compression; development
/// emits source maps and pretty-printed bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    /// Resolve the mode from an environment value and the CLI flag.
    ///
    /// A non-empty environment value always wins, even when it is not the
    /// production marker. An empty value counts as unset.
    pub fn resolve(env_value: Option<&str>, production_flag: bool) -> Self {
        match env_value.filter(|value| !value.is_empty()) {
            Some(value) if value == PRODUCTION_MARKER => BuildMode::Production,
            Some(_) => BuildMode::Development,
            None if production_flag => BuildMode::Production,
            None => BuildMode::Development,
        }
    }

    /// Resolve the mode from the process environment and the CLI flag.
    pub fn from_env(production_flag: bool) -> Self {
        let env_value = std::env::var(MODE_ENV).ok();
        Self::resolve(env_value.as_deref(), production_flag)
    }

    pub fn is_production(self) -> bool {
        matches!(self, BuildMode::Production)
    }

    /// Title used by the size report.
    pub fn title(self) -> &'static str {
        match self {
            BuildMode::Development => "Development",
            BuildMode::Production => "Production",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Development => write!(f, "development"),
            BuildMode::Production => write!(f, "production"),
        }
    }
}
