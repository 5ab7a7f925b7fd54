use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tracing::{debug, info, trace, warn};

use crate::task::Priority;
use crate::view::{PriorityFilter, SortOrder};

#[derive(Debug, Clone)]
pub struct Config {
    map: HashMap<String, String>,
    pub loaded_files: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let mut map = HashMap::new();
        for (key, value) in [
            ("data.location", "~/.taskflow"),
            ("color", "on"),
            ("confirmation", "on"),
            ("default.filter", "all"),
            ("default.sort", "default"),
            ("default.priority", "low"),
        ] {
            map.insert(key.to_string(), value.to_string());
        }

        Self {
            map,
            loaded_files: vec![],
        }
    }
}

impl Config {
    #[tracing::instrument(skip(rc_override))]
    pub fn load(rc_override: Option<&Path>) -> anyhow::Result<Self> {
        let mut cfg = Config::default();

        let rc = resolve_rc_path(rc_override)?;
        if let Some(path) = rc {
            info!(rc = %path.display(), "loading taskflowrc");
            cfg.load_file(&path)?;
        } else {
            debug!("no taskflowrc found; using defaults");
        }

        Ok(cfg)
    }

    #[tracing::instrument(skip(self, overrides))]
    pub fn apply_overrides<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (k, v) in overrides {
            let key = k.strip_prefix("rc.").unwrap_or(&k).to_string();
            debug!(key = %key, value = %v, "applying override");
            self.map.insert(key, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.map.get(key).map(|v| parse_bool(v))
    }

    pub fn default_filter(&self) -> anyhow::Result<PriorityFilter> {
        self.parse_key("default.filter", PriorityFilter::All)
    }

    pub fn default_sort(&self) -> anyhow::Result<SortOrder> {
        self.parse_key("default.sort", SortOrder::Default)
    }

    pub fn default_priority(&self) -> anyhow::Result<Priority> {
        self.parse_key("default.priority", Priority::Low)
    }

    pub fn confirmation(&self) -> bool {
        self.get_bool("confirmation").unwrap_or(true)
    }

    fn parse_key<T>(&self, key: &str, fallback: T) -> anyhow::Result<T>
    where
        T: std::str::FromStr<Err = anyhow::Error>,
    {
        match self.map.get(key) {
            Some(raw) => raw.parse().with_context(|| format!("invalid value for {key}")),
            None => Ok(fallback),
        }
    }

    #[tracing::instrument(skip(self))]
    fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let path = expand_tilde(path);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        self.loaded_files.push(path.clone());

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        for (line_num, raw_line) in text.lines().enumerate() {
            let mut line = raw_line.trim();
            if let Some((before, _)) = line.split_once('#') {
                line = before.trim();
            }
            if line.is_empty() {
                continue;
            }

            if let Some(include_rest) = line.strip_prefix("include ") {
                let include_path = resolve_include_path(&base_dir, include_rest.trim())?;
                debug!(
                    file = %path.display(),
                    include = %include_path.display(),
                    line = line_num + 1,
                    "processing include"
                );

                if self.loaded_files.contains(&include_path) {
                    warn!(include = %include_path.display(), "include cycle; skipping");
                } else if include_path.exists() {
                    self.load_file(&include_path)?;
                } else {
                    warn!(
                        include = %include_path.display(),
                        "include file does not exist; skipping"
                    );
                }
                continue;
            }

            let (k, v) = line.split_once('=').ok_or_else(|| {
                anyhow!(
                    "invalid config line {}:{}: {}",
                    path.display(),
                    line_num + 1,
                    raw_line
                )
            })?;

            let key = k.trim().to_string();
            let value = v.trim().to_string();
            trace!(key = %key, value = %value, "loaded config key");
            self.map.insert(key, value);
        }

        Ok(())
    }
}

#[tracing::instrument(skip(cfg, override_dir))]
pub fn resolve_data_dir(cfg: &Config, override_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let dir = if let Some(path) = override_dir {
        path.to_path_buf()
    } else if let Some(cfg_value) = cfg.get("data.location") {
        expand_tilde(Path::new(&cfg_value))
    } else {
        default_data_dir()?
    };

    if !dir.exists() {
        info!(dir = %dir.display(), "creating data directory");
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

#[tracing::instrument(skip(override_path))]
fn resolve_rc_path(override_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(rc_env) = std::env::var("TASKFLOWRC") {
        if rc_env == "/dev/null" {
            return Ok(None);
        }
        return Ok(Some(PathBuf::from(rc_env)));
    }

    let Some(home) = dirs::home_dir() else {
        warn!("cannot determine home directory; skipping taskflowrc lookup");
        return Ok(None);
    };
    let candidate = home.join(".taskflowrc");
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    Ok(None)
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(".taskflow"))
}

fn resolve_include_path(base_dir: &Path, include: &str) -> anyhow::Result<PathBuf> {
    if include.trim().is_empty() {
        return Err(anyhow!("include path cannot be empty"));
    }

    let expanded = expand_tilde(Path::new(include));
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base_dir.join(expanded))
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "y" | "yes" | "on" | "true"
    )
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn defaults_are_typed() {
        let cfg = Config::default();
        assert_eq!(cfg.default_filter().ok(), Some(PriorityFilter::All));
        assert_eq!(cfg.default_sort().ok(), Some(SortOrder::Default));
        assert_eq!(cfg.default_priority().ok(), Some(Priority::Low));
        assert!(cfg.confirmation());
    }

    #[test]
    fn rc_file_with_comments_and_include() {
        let temp = tempdir().expect("tempdir");
        let extra = temp.path().join("extra.rc");
        fs::write(&extra, "default.sort = priority\n").expect("write include");

        let rc = temp.path().join("taskflowrc");
        fs::write(
            &rc,
            concat!(
                "# preferences\n",
                "color=off   # no ansi\n",
                "\n",
                "include extra.rc\n",
                "include missing.rc\n",
                "default.priority=high\n",
            ),
        )
        .expect("write rc");

        let cfg = Config::load(Some(rc.as_path())).expect("load");
        assert_eq!(cfg.get_bool("color"), Some(false));
        assert_eq!(cfg.default_sort().ok(), Some(SortOrder::Priority));
        assert_eq!(cfg.default_priority().ok(), Some(Priority::High));
        assert_eq!(cfg.loaded_files.len(), 2);
    }

    #[test]
    fn malformed_line_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let rc = temp.path().join("taskflowrc");
        fs::write(&rc, "color on\n").expect("write rc");
        assert!(Config::load(Some(rc.as_path())).is_err());
    }

    #[test]
    fn overrides_strip_rc_prefix_and_validate_lazily() {
        let mut cfg = Config::default();
        cfg.apply_overrides([
            ("rc.confirmation".to_string(), "off".to_string()),
            ("default.filter".to_string(), "sideways".to_string()),
        ]);
        assert!(!cfg.confirmation());
        assert!(cfg.default_filter().is_err());
    }

    #[test]
    fn data_dir_override_is_created() {
        let temp = tempdir().expect("tempdir");
        let target = temp.path().join("nested").join("data");
        let dir = resolve_data_dir(&Config::default(), Some(target.as_path())).expect("resolve");
        assert_eq!(dir, target);
        assert!(target.is_dir());
    }
}
