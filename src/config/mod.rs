use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub records: Option<String>,
    pub search: Option<String>,
    pub query: Option<String>,
    pub series: Option<String>,
    pub sample: Option<String>,
    pub subsystem: Option<String>,
    #[serde(alias = "data")]
    pub data_run: Option<String>,
    #[serde(alias = "ref")]
    pub ref_run: Option<String>,
    #[serde(alias = "handler")]
    pub backend: Option<String>,
    pub state: Option<String>,
    pub columns: Option<usize>,
    #[serde(alias = "thumbnail_limit")]
    pub max_thumb: Option<f64>,
    pub scale_step: Option<f64>,
    pub scale_mode: Option<String>,
    pub inline_annotations: Option<bool>,
    pub output: Option<String>,
    pub output_format: Option<String>,
    pub timeout: Option<usize>,
    pub proxy: Option<String>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn config_dir() -> Option<PathBuf> {
    Some(home_dir()?.join(".plotgallery"))
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(config_dir()?.join("config.yml"))
}

pub fn default_state_path() -> Option<PathBuf> {
    Some(config_dir()?.join("state.json"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_yaml::from_str::<ConfigFile>(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

fn default_config_yaml() -> String {
    r#"# plotgallery config
#
# Location (default):
#   ~/.plotgallery/config.yml

# Records handed over by the backend (JSON array)
# records: ./plots/records.json

# Initial search term
# search: ""

# Comparison context: data,ref,user_id,series,sample,subsystem
# query: "300811,301531,,Run2017,SingleMuon,CSC"
# series: Run2017
# sample: SingleMuon
# subsystem: CSC
# data_run: "300811"
# ref_run: "301531"

# Run listing endpoint used for next/previous navigation
# backend: http://localhost/cgi-bin/handler.py
timeout: 10
# proxy: http://127.0.0.1:8080

# Context store carried between page loads
# state: ~/.plotgallery/state.json

# Grid
columns: 3
max_thumb: 250
scale_step: 0.5
scale_mode: per-record
inline_annotations: false

# Output (optional)
# output: ./gallery.html
# output_format: html

# Output styling
no_color: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<bool, String> {
    if path.exists() {
        return Ok(false);
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    let contents = default_config_yaml();
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(true)
}
