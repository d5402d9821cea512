use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace
};

use crate::filter::Filter;

pub const DEFAULT_API_URL: &str =
  "http://localhost:5000";
pub const API_URL_ENV: &str =
  "TASKBOARD_API_URL";
pub const BOARDRC_ENV: &str =
  "TASKBOARDRC";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>,
  include_stack: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "api.url".to_string(),
      DEFAULT_API_URL.to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );
    map.insert(
      "default.filter".to_string(),
      "all".to_string()
    );
    Self {
      map,
      loaded_files: vec![],
      include_stack: vec![]
    }
  }
}

impl Config {
  /// Reads the boardrc and the API URL
  /// from the environment lookup `env`.
  #[tracing::instrument(skip(
    boardrc_override,
    env
  ))]
  pub fn load_with_env<E>(
    boardrc_override: Option<&Path>,
    env: E
  ) -> anyhow::Result<Self>
  where
    E: Fn(&str) -> Option<String>
  {
    let mut cfg = Config::default();

    let boardrc = resolve_boardrc_path(
      boardrc_override,
      &env
    )?;
    if let Some(path) = boardrc {
      info!(boardrc = %path.display(), "loading boardrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no boardrc found; using \
         defaults"
      );
    }

    if let Some(url) = env(API_URL_ENV)
      && !url.trim().is_empty()
    {
      debug!(url = %url, "api url taken from environment");
      cfg.map.insert(
        "api.url".to_string(),
        url.trim().to_string()
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

  /// Unset keys are `None`; values that
  /// are not a boolean word are an error.
  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.map.get(key) else {
      return Ok(None);
    };
    parse_bool(raw).map(Some).ok_or_else(
      || anyhow!("invalid {key}: {raw}")
    )
  }

  pub fn api_url(&self) -> String {
    self
      .get("api.url")
      .filter(|v| !v.trim().is_empty())
      .unwrap_or_else(|| {
        DEFAULT_API_URL.to_string()
      })
  }

  /// `api.timeout` in seconds; unset or
  /// `0` leaves the transport default.
  pub fn api_timeout(
    &self
  ) -> anyhow::Result<Option<Duration>> {
    let Some(raw) = self.get("api.timeout")
    else {
      return Ok(None);
    };
    let secs: f64 = raw
      .trim()
      .parse()
      .with_context(|| {
        format!(
          "invalid api.timeout: {raw}"
        )
      })?;
    if !secs.is_finite() || secs < 0.0 {
      return Err(anyhow!(
        "invalid api.timeout: {raw}"
      ));
    }
    if secs == 0.0 {
      return Ok(None);
    }
    Ok(Some(Duration::from_secs_f64(
      secs
    )))
  }

  pub fn default_filter(
    &self
  ) -> anyhow::Result<Filter> {
    match self.get("default.filter") {
      | Some(raw) => raw
        .parse::<Filter>()
        .context(
          "invalid default.filter"
        ),
      | None => Ok(Filter::All)
    }
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    if self.include_stack.contains(&path) {
      return Err(anyhow!(
        "include cycle at {}",
        path.display()
      ));
    }

    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());
    self
      .include_stack
      .push(path.clone());
    let loaded = self.load_lines(&path, &text);
    self.include_stack.pop();
    loaded
  }

  fn load_lines(
    &mut self,
    path: &Path,
    text: &str
  ) -> anyhow::Result<()> {
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
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

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
        self.load_file(&include_path)?;
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

    Ok(())
  }
}

#[tracing::instrument(skip(
  override_path,
  env
))]
fn resolve_boardrc_path<E>(
  override_path: Option<&Path>,
  env: &E
) -> anyhow::Result<Option<PathBuf>>
where
  E: Fn(&str) -> Option<String>
{
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Some(boardrc_env) =
    env(BOARDRC_ENV)
  {
    if boardrc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      boardrc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    return Ok(None);
  };
  let candidate =
    home.join(".taskboardrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
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

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on" | "true" => {
      Some(true)
    }
    | "0" | "n" | "no" | "off" | "false" => {
      Some(false)
    }
    | _ => None
  }
}
