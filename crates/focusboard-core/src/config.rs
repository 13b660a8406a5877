use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::dashboard::DEFAULT_WEEKLY_TARGET;
use crate::datetime::Calendar;
use crate::mood::DEFAULT_HISTORY;
use crate::pomodoro::{
  DEFAULT_LONG_BREAK_EVERY,
  PomodoroSettings
};
use crate::timer::Durations;

const RC_ENV_VAR: &str = "FOCUSBOARDRC";
const RC_FILE_NAME: &str =
  ".focusboardrc";
const DEFAULT_UPCOMING_LIMIT: u32 = 5;

const DEFAULTS: &[(&str, &str)] = &[
  ("data.location", "~/.focusboard"),
  ("timezone", "UTC"),
  ("pomodoro.work_minutes", "25"),
  (
    "pomodoro.short_break_minutes",
    "5"
  ),
  (
    "pomodoro.long_break_minutes",
    "15"
  ),
  ("pomodoro.long_break_every", "4"),
  ("dashboard.weekly_target", "15"),
  ("mood.history", "7"),
  ("tasks.upcoming_limit", "5"),
  ("color", "on")
];

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      map:          DEFAULTS
        .iter()
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        })
        .collect(),
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc = resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading rc file");
      cfg.load_file(&path, &mut Vec::new())?;
    } else {
      debug!(
        "no rc file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  /// Positive integer setting; an
  /// unparsable value yields `default`.
  pub fn get_u32(
    &self,
    key: &str,
    default: u32
  ) -> u32 {
    let Some(raw) = self.map.get(key)
    else {
      return default;
    };
    match raw.trim().parse::<u32>() {
      | Ok(value) if value > 0 => value,
      | _ => {
        warn!(
          key,
          value = %raw,
          default,
          "invalid numeric setting; \
           using default"
        );
        default
      }
    }
  }

  /// `chain` holds the canonical paths of
  /// the files currently being read.
  #[tracing::instrument(skip(self, chain))]
  fn load_file(
    &mut self,
    path: &Path,
    chain: &mut Vec<PathBuf>
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    let canonical = fs::canonicalize(&path)
      .unwrap_or_else(|_| path.clone());
    if chain.contains(&canonical) {
      return Err(anyhow!(
        "include cycle at {}",
        path.display()
      ));
    }
    chain.push(canonical);

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self.load_file(
            &include_path,
            chain
          )?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
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

    chain.pop();
    Ok(())
  }
}

/// Typed view of [`Config`] that the
/// application is built from.
#[derive(Debug, Clone)]
pub struct Settings {
  pub calendar:       Calendar,
  pub pomodoro:       PomodoroSettings,
  pub weekly_target:  u32,
  pub mood_history:   usize,
  pub upcoming_limit: usize
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      calendar:       Calendar::utc(),
      pomodoro:
        PomodoroSettings::default(),
      weekly_target:
        DEFAULT_WEEKLY_TARGET,
      mood_history:   DEFAULT_HISTORY,
      upcoming_limit:
        DEFAULT_UPCOMING_LIMIT as usize
    }
  }
}

impl Settings {
  #[tracing::instrument(skip(cfg))]
  pub fn from_config(
    cfg: &Config
  ) -> Self {
    let defaults = Durations::default();
    let durations = Durations {
      work_minutes:        cfg.get_u32(
        "pomodoro.work_minutes",
        defaults.work_minutes
      ),
      short_break_minutes: cfg.get_u32(
        "pomodoro.short_break_minutes",
        defaults.short_break_minutes
      ),
      long_break_minutes:  cfg.get_u32(
        "pomodoro.long_break_minutes",
        defaults.long_break_minutes
      )
    };

    Self {
      calendar:       Calendar::resolve(
        cfg.get("timezone").as_deref()
      ),
      pomodoro:       PomodoroSettings {
        durations,
        long_break_every: cfg.get_u32(
          "pomodoro.long_break_every",
          DEFAULT_LONG_BREAK_EVERY
        )
      },
      weekly_target:  cfg.get_u32(
        "dashboard.weekly_target",
        DEFAULT_WEEKLY_TARGET
      ),
      mood_history:   cfg.get_u32(
        "mood.history",
        DEFAULT_HISTORY as u32
      )
        as usize,
      upcoming_limit: cfg.get_u32(
        "tasks.upcoming_limit",
        DEFAULT_UPCOMING_LIMIT
      )
        as usize
    }
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping rc file"
    );
    return Ok(None);
  };
  let candidate =
    home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".focusboard"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::{
    Config,
    Settings
  };

  #[test]
  fn defaults_without_rc_file() {
    let cfg = Config::default();
    let settings =
      Settings::from_config(&cfg);
    assert_eq!(
      settings.weekly_target,
      15
    );
    assert_eq!(
      settings
        .pomodoro
        .durations
        .work_minutes,
      25
    );
    assert_eq!(
      settings.pomodoro.long_break_every,
      4
    );
    assert_eq!(
      cfg.get_bool("color"),
      Some(true)
    );
  }

  #[test]
  fn rc_file_with_include_and_overrides()
  {
    let temp =
      tempdir().expect("tempdir");
    let extra =
      temp.path().join("extra.rc");
    fs::write(
      &extra,
      "pomodoro.work_minutes = 50\n"
    )
    .expect("write include");
    let rc = temp.path().join("main.rc");
    fs::write(
      &rc,
      "# focus settings\n\
       dashboard.weekly_target = 20 \
       # per week\n\
       include extra.rc\n"
    )
    .expect("write rc");

    let mut cfg = Config::load(Some(
      rc.as_path()
    ))
    .expect("load rc");
    cfg.apply_overrides(vec![(
      "rc.mood.history".to_string(),
      "3".to_string()
    )]);

    let settings =
      Settings::from_config(&cfg);
    assert_eq!(
      settings.weekly_target,
      20
    );
    assert_eq!(
      settings
        .pomodoro
        .durations
        .work_minutes,
      50
    );
    assert_eq!(settings.mood_history, 3);
    assert_eq!(cfg.loaded_files.len(), 2);
  }

  #[test]
  fn invalid_numbers_fall_back() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![
      (
        "pomodoro.long_break_every"
          .to_string(),
        "zero".to_string()
      ),
      (
        "dashboard.weekly_target"
          .to_string(),
        "0".to_string()
      ),
    ]);
    let settings =
      Settings::from_config(&cfg);
    assert_eq!(
      settings.pomodoro.long_break_every,
      4
    );
    assert_eq!(
      settings.weekly_target,
      15
    );
  }

  #[test]
  fn include_cycles_are_errors() {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("main.rc");
    fs::write(&rc, "include main.rc\n")
      .expect("write rc");
    let err =
      Config::load(Some(rc.as_path()))
        .expect_err("self include");
    assert!(
      err
        .to_string()
        .contains("include cycle")
    );

    let other =
      temp.path().join("other.rc");
    fs::write(&rc, "include other.rc\n")
      .expect("write rc");
    fs::write(
      &other,
      "color = off\ninclude main.rc\n"
    )
    .expect("write other");
    assert!(
      Config::load(Some(rc.as_path()))
        .is_err()
    );
  }

  #[test]
  fn repeated_include_is_not_a_cycle() {
    let temp =
      tempdir().expect("tempdir");
    let shared =
      temp.path().join("shared.rc");
    fs::write(&shared, "mood.history = 4\n")
      .expect("write shared");
    let rc = temp.path().join("main.rc");
    fs::write(
      &rc,
      "include shared.rc\ninclude shared.rc\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(rc.as_path()))
      .expect("load rc");
    assert_eq!(cfg.loaded_files.len(), 3);
  }

  #[test]
  fn malformed_line_is_an_error() {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("bad.rc");
    fs::write(&rc, "just words\n")
      .expect("write rc");
    assert!(
      Config::load(Some(rc.as_path()))
        .is_err()
    );
  }
}
