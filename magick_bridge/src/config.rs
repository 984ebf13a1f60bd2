use std::path::PathBuf;

/// Environment variable naming the MagickWand library to load.
pub const WAND_LIBRARY_ENV: &str = "MAGICK_BRIDGE_WAND_LIBRARY";

/// Environment variable holding the bridge's log filter.
pub const LOG_FILTER_ENV: &str = "MAGICK_BRIDGE_LOG";

/// Log filter used when [`LOG_FILTER_ENV`] is unset.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Runtime settings of the bridge, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Explicit MagickWand library path, if any.
    pub wand_library: Option<PathBuf>,
    /// `tracing` filter directive.
    pub log_filter: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            wand_library: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            wand_library: non_empty(WAND_LIBRARY_ENV).map(PathBuf::from),
            log_filter: non_empty(LOG_FILTER_ENV)
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = BridgeConfig::from_lookup(lookup(&[]));
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.log_filter, "warn");
    }

    #[test]
    fn reads_library_and_filter() {
        let config = BridgeConfig::from_lookup(lookup(&[
            (WAND_LIBRARY_ENV, "/opt/im7/lib/libMagickWand-7.Q16HDRI.so"),
            (LOG_FILTER_ENV, "magick_bridge=debug"),
        ]));
        assert_eq!(
            config.wand_library,
            Some(PathBuf::from("/opt/im7/lib/libMagickWand-7.Q16HDRI.so"))
        );
        assert_eq!(config.log_filter, "magick_bridge=debug");
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = BridgeConfig::from_lookup(lookup(&[(WAND_LIBRARY_ENV, "  "), (LOG_FILTER_ENV, "")]));
        assert_eq!(config, BridgeConfig::default());
    }
}
