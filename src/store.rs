use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const DEFAULT_QUALITY: &str = "best";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    pub show: Option<String>,
    pub episode: u32,
    pub quality: String,
    pub autoplay: bool,
    pub playing: bool,
    pub pid: Option<u32>,
    pub tracked: Vec<TrackedShow>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            show: None,
            episode: 1,
            quality: DEFAULT_QUALITY.to_string(),
            autoplay: false,
            playing: false,
            pid: None,
            tracked: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedShow {
    pub show: String,
    /// Highest episode played to completion, 0 when nothing was watched yet.
    pub last_watched: u32,
    pub tracked_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_watched_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<String>,
}

impl TrackedShow {
    pub fn next_episode(&self) -> u32 {
        self.last_watched.saturating_add(1)
    }
}

pub struct Store {
    path: PathBuf,
    state: State,
}

impl Store {
    /// Opens the state file, creating it with defaults when it does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create state directory {}", parent.display())
            })?;
        }

        if let Some(store) = Self::open_existing(path)? {
            return Ok(store);
        }
        let store = Self {
            path: path.to_path_buf(),
            state: State::default(),
        };
        store.save()?;
        Ok(store)
    }

    /// Like `open`, but never creates anything; `None` when the file is gone.
    pub fn open_existing(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let mut store = Self {
            path: path.to_path_buf(),
            state: State::default(),
        };
        store.reload()?;
        Ok(Some(store))
    }

    pub fn reload(&mut self) -> Result<()> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read state file {}", self.path.display()))?;
        let mut state = if raw.trim().is_empty() {
            State::default()
        } else {
            serde_json::from_str::<State>(&raw)
                .with_context(|| format!("state file {} is not valid", self.path.display()))?
        };
        if state.episode == 0 {
            state.episode = 1;
        }
        self.state = state;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let payload =
            serde_json::to_string_pretty(&self.state).context("failed to serialize state")?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, format!("{payload}\n"))
            .with_context(|| format!("failed writing state to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed replacing state file {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub fn tracked(&self, show: &str) -> Option<&TrackedShow> {
        self.state.tracked.iter().find(|entry| entry.show == show)
    }

    pub fn tracked_mut(&mut self, show: &str) -> Option<&mut TrackedShow> {
        self.state.tracked.iter_mut().find(|entry| entry.show == show)
    }

    /// Returns false when the show was already tracked.
    pub fn track(&mut self, show: &str, last_watched: u32) -> bool {
        if self.tracked(show).is_some() {
            return false;
        }
        self.state.tracked.push(TrackedShow {
            show: show.to_string(),
            last_watched,
            tracked_at: Utc::now().to_rfc3339(),
            last_watched_at: None,
            last_checked_at: None,
        });
        true
    }

    /// Records a finished episode for a tracked show. Progress never moves backwards.
    pub fn record_watched(&mut self, show: &str, episode: u32) -> Result<bool> {
        if episode == 0 {
            bail!("episode numbers start at 1");
        }
        let Some(entry) = self.tracked_mut(show) else {
            return Ok(false);
        };
        entry.last_watched = entry.last_watched.max(episode);
        entry.last_watched_at = Some(Utc::now().to_rfc3339());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::time::{SystemTime, UNIX_EPOCH};

    struct TempDir(PathBuf);

    impl TempDir {
        fn new(tag: &str) -> Self {
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            let dir = env::temp_dir().join(format!("crly-store-{tag}-{}-{ts}", std::process::id()));
            fs::create_dir_all(&dir).expect("create temp dir");
            Self(dir)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn open_creates_file_with_defaults() {
        let dir = TempDir::new("create");
        let path = dir.0.join("nested").join("state.json");

        let store = Store::open(&path).expect("store should open");
        assert!(path.exists());
        assert_eq!(store.state(), &State::default());

        let raw = fs::read_to_string(&path).expect("read state");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(value["quality"], "best");
        assert_eq!(value["autoplay"], false);
        assert_eq!(value["playing"], false);
        assert!(value["show"].is_null());
        assert_eq!(value["tracked"], serde_json::json!([]));
    }

    #[test]
    fn open_fills_missing_fields_from_older_files() {
        let dir = TempDir::new("partial");
        let path = dir.0.join("state.json");
        fs::write(&path, r#"{"show": "one-piece", "quality": "720p"}"#).expect("seed state");

        let store = Store::open(&path).expect("store should open");
        assert_eq!(store.state().show.as_deref(), Some("one-piece"));
        assert_eq!(store.state().quality, "720p");
        assert_eq!(store.state().episode, 1);
        assert!(!store.state().autoplay);
        assert!(store.state().tracked.is_empty());
    }

    #[test]
    fn open_rejects_corrupt_state() {
        let dir = TempDir::new("corrupt");
        let path = dir.0.join("state.json");
        fs::write(&path, "{not json").expect("seed state");

        let err = Store::open(&path).err().expect("corrupt file should fail");
        assert!(format!("{err:#}").contains("is not valid"));
    }

    #[test]
    fn save_then_reload_keeps_changes() {
        let dir = TempDir::new("save");
        let path = dir.0.join("state.json");

        let mut store = Store::open(&path).expect("store should open");
        store.state_mut().show = Some("frieren".to_string());
        store.state_mut().episode = 4;
        assert!(store.track("frieren", 3));
        store.save().expect("save");

        let reopened = Store::open(&path).expect("reopen");
        assert_eq!(reopened.state().episode, 4);
        assert_eq!(reopened.tracked("frieren").map(|t| t.last_watched), Some(3));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn open_existing_leaves_missing_file_alone() {
        let dir = TempDir::new("existing");
        let path = dir.0.join("state.json");

        assert!(Store::open_existing(&path).expect("no error").is_none());
        assert!(!path.exists());

        Store::open(&path).expect("create");
        let store = Store::open_existing(&path).expect("read").expect("file exists");
        assert_eq!(store.state(), &State::default());
    }

    #[test]
    fn track_refuses_duplicates() {
        let dir = TempDir::new("dup");
        let mut store = Store::open(&dir.0.join("state.json")).expect("store should open");
        assert!(store.track("bocchi-the-rock", 0));
        assert!(!store.track("bocchi-the-rock", 5));
        assert_eq!(store.state().tracked.len(), 1);
        assert_eq!(store.state().tracked[0].last_watched, 0);
    }

    #[test]
    fn record_watched_only_moves_forward() {
        let dir = TempDir::new("watched");
        let mut store = Store::open(&dir.0.join("state.json")).expect("store should open");
        store.track("mushishi", 0);

        assert!(store.record_watched("mushishi", 3).expect("record"));
        assert!(store.record_watched("mushishi", 2).expect("record"));
        let entry = store.tracked("mushishi").expect("tracked");
        assert_eq!(entry.last_watched, 3);
        assert_eq!(entry.next_episode(), 4);
        assert!(entry.last_watched_at.is_some());

        assert!(!store.record_watched("untracked", 1).expect("record"));
        assert!(store.record_watched("mushishi", 0).is_err());
    }
}
