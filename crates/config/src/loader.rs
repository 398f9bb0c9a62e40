use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::schema::LexlinkerConfig;

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "lexlinker.toml",
    "lexlinker.yaml",
    "lexlinker.yml",
    "lexlinker.json",
];

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "lexlinker")
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<LexlinkerConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./lexlinker.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/lexlinker/lexlinker.{toml,yaml,yml,json}` (user-global)
///
/// Returns `LexlinkerConfig::default()` if no config file is found or the
/// one found cannot be parsed.
pub fn discover_and_load() -> LexlinkerConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    LexlinkerConfig::default()
}

/// Load `path` when given, otherwise discover; then apply environment
/// overrides.
pub fn load_with_env(path: Option<&Path>) -> anyhow::Result<LexlinkerConfig> {
    let mut config = match path {
        Some(p) => load_config(p)?,
        None => discover_and_load(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    if let Some(dirs) = project_dirs() {
        let config_dir = dirs.config_dir();
        for name in CONFIG_FILENAMES {
            let p = config_dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/lexlinker/`).
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().to_path_buf())
}

/// Directory holding conversation files: `server.data_dir` when set,
/// otherwise the platform data dir, otherwise `./data`.
pub fn data_dir(config: &LexlinkerConfig) -> PathBuf {
    if let Some(dir) = &config.server.data_dir {
        return dir.clone();
    }
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<LexlinkerConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

/// Apply the recognised environment variables on top of `config`.
pub fn apply_env_overrides(config: &mut LexlinkerConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn parse_or_warn<T: FromStr>(name: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = name, value, "ignoring invalid numeric environment override");
            None
        },
    }
}

/// [`apply_env_overrides`] with a custom lookup, so tests do not touch the
/// process environment.
pub fn apply_env_overrides_with(
    config: &mut LexlinkerConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("HISTORY_LIMIT").and_then(|v| parse_or_warn("HISTORY_LIMIT", &v)) {
        config.history.limit = v;
    }
    if let Some(v) =
        get("MAX_RETRY_ATTEMPTS").and_then(|v| parse_or_warn("MAX_RETRY_ATTEMPTS", &v))
    {
        config.retry.max_attempts = v;
    }
    if let Some(v) = get("INITIAL_RETRY_DELAY_SECONDS")
        .and_then(|v| parse_or_warn("INITIAL_RETRY_DELAY_SECONDS", &v))
    {
        config.retry.initial_delay_seconds = v;
    }
    if let Some(v) =
        get("OUTBOUND_CHUNK_LIMIT").and_then(|v| parse_or_warn("OUTBOUND_CHUNK_LIMIT", &v))
    {
        config.outbound.chunk_limit = v;
    }
    if let Some(v) = get("PORT").and_then(|v| parse_or_warn("PORT", &v)) {
        config.server.port = v;
    }
    if let Some(v) = get("OPENAI_API_KEY") {
        config.provider.api_key = Some(Secret::new(v));
    }
    if let Some(v) = get("OPENAI_BASE_URL") {
        config.provider.base_url = v;
    }
    if let Some(v) = get("TWILIO_ACCOUNT_SID") {
        config.twilio.account_sid = Some(v);
    }
    if let Some(v) = get("TWILIO_AUTH_TOKEN") {
        config.twilio.auth_token = Some(Secret::new(v));
    }
    if let Some(v) = get("TWILIO_PHONE_NUMBER") {
        config.twilio.phone_number = Some(v);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest, secrecy::ExposeSecret, std::collections::HashMap};

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn env_overrides_numeric_options() {
        let mut cfg = LexlinkerConfig::default();
        apply_env_overrides_with(
            &mut cfg,
            env(&[
                ("HISTORY_LIMIT", "30"),
                ("MAX_RETRY_ATTEMPTS", "3"),
                ("INITIAL_RETRY_DELAY_SECONDS", "1"),
                ("OUTBOUND_CHUNK_LIMIT", "1600"),
                ("PORT", "8080"),
            ]),
        );
        assert_eq!(cfg.history.limit, 30);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.initial_delay_seconds, 1);
        assert_eq!(cfg.outbound.chunk_limit, 1600);
        assert_eq!(cfg.server.port, 8080);
    }

    #[rstest]
    #[case("abc")]
    #[case("-4")]
    #[case("1.5")]
    fn invalid_numbers_are_ignored(#[case] raw: &str) {
        let mut cfg = LexlinkerConfig::default();
        apply_env_overrides_with(&mut cfg, env(&[("HISTORY_LIMIT", raw)]));
        assert_eq!(cfg.history.limit, 20);
    }

    #[test]
    fn env_overrides_credentials() {
        let mut cfg = LexlinkerConfig::default();
        apply_env_overrides_with(
            &mut cfg,
            env(&[
                ("OPENAI_API_KEY", "sk-env"),
                ("TWILIO_ACCOUNT_SID", "AC123"),
                ("TWILIO_AUTH_TOKEN", "secret"),
                ("TWILIO_PHONE_NUMBER", "whatsapp:+14155238886"),
            ]),
        );
        assert_eq!(
            cfg.provider.api_key.unwrap().expose_secret().as_str(),
            "sk-env"
        );
        assert_eq!(cfg.twilio.account_sid.as_deref(), Some("AC123"));
        assert!(cfg.twilio.is_configured());
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut cfg = LexlinkerConfig::default();
        apply_env_overrides_with(&mut cfg, env(&[("OPENAI_API_KEY", "  ")]));
        assert!(cfg.provider.api_key.is_none());
    }

    #[rstest]
    #[case("lexlinker.toml", "[history]\nlimit = 7\n")]
    #[case("lexlinker.yaml", "history:\n  limit: 7\n")]
    #[case("lexlinker.json", r#"{"history": {"limit": 7}}"#)]
    fn loads_every_format(#[case] name: &str, #[case] body: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.history.limit, 7);
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexlinker.ini");
        std::fs::write(&path, "x=1").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn explicit_data_dir_wins() {
        let mut cfg = LexlinkerConfig::default();
        cfg.server.data_dir = Some(PathBuf::from("/tmp/lex"));
        assert_eq!(data_dir(&cfg), PathBuf::from("/tmp/lex"));
    }
}
