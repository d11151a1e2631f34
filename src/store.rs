use anyhow::{anyhow, Context};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use crate::analysis::synergy::{MatchRecord, SynergyStats};
use crate::config::{Config, RemoteStoreConfig};
use crate::error::AppError;

/// Everything remembered about one player. Grows monotonically: records and
/// counters are only ever added, never rewritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerEntry {
    /// High-water mark for incremental sync (newest processed match id).
    pub last_match_id: Option<String>,
    #[serde(default)]
    pub matches: BTreeMap<String, MatchRecord>,
    #[serde(default)]
    pub stats: SynergyStats,
    pub last_updated: Option<DateTime<Utc>>,
}

/// The whole persisted document: lowercase "name#tag" -> entry.
pub type CacheDoc = BTreeMap<String, PlayerEntry>;

/// One versioned read of the backing file.
pub struct Revision {
    pub content: String,
    /// Backend revision marker (GitHub blob sha). None for backends without
    /// one.
    pub marker: Option<String>,
}

pub enum WriteError {
    /// The revision marker no longer matches: someone else wrote first.
    Conflict,
    Other(anyhow::Error),
}

/// Whole-file read/overwrite storage. Update-in-place requires the marker
/// from the most recent read.
pub trait StoreBackend {
    fn read(&self) -> anyhow::Result<Option<Revision>>;
    fn write(&self, content: &str, revision: Option<&str>) -> Result<(), WriteError>;
    fn describe(&self) -> String;
}

/// GitHub contents API: one JSON file in a repo, sha as the revision marker.
pub struct GitHubBackend {
    token: String,
    repo: String,
    path: String,
}

impl GitHubBackend {
    pub fn new(cfg: &RemoteStoreConfig) -> Self {
        GitHubBackend {
            token: cfg.token.clone(),
            repo: cfg.repo.clone(),
            path: cfg.path.clone(),
        }
    }

    fn contents_url(&self) -> String {
        format!(
            "https://api.github.com/repos/{}/contents/{}",
            self.repo, self.path
        )
    }

    fn request(&self, method: &str) -> ureq::Request {
        ureq::request(method, &self.contents_url())
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", "synergy_scan/0.1.0")
    }
}

#[derive(Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

impl StoreBackend for GitHubBackend {
    fn read(&self) -> anyhow::Result<Option<Revision>> {
        match self.request("GET").call() {
            Ok(resp) => {
                let parsed: ContentsResponse = resp
                    .into_json()
                    .context("malformed contents response")?;
                // GitHub wraps the base64 payload across lines.
                let compact: String = parsed
                    .content
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                let bytes = BASE64.decode(compact).context("invalid base64 content")?;
                Ok(Some(Revision {
                    content: String::from_utf8(bytes).context("cache file is not UTF-8")?,
                    marker: Some(parsed.sha),
                }))
            }
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(anyhow!("contents fetch failed: {e}")),
        }
    }

    fn write(&self, content: &str, revision: Option<&str>) -> Result<(), WriteError> {
        let mut body = json!({
            "message": "Update synergy cache",
            "content": BASE64.encode(content),
        });
        if let Some(sha) = revision {
            body["sha"] = json!(sha);
        }
        match self.request("PUT").send_json(body) {
            Ok(_) => Ok(()),
            // 409 is an explicit conflict; 422 is how GitHub reports a stale
            // or missing sha on an existing file.
            Err(ureq::Error::Status(409, _)) | Err(ureq::Error::Status(422, _)) => {
                Err(WriteError::Conflict)
            }
            Err(e) => Err(WriteError::Other(anyhow!("contents update failed: {e}"))),
        }
    }

    fn describe(&self) -> String {
        format!("github://{}/{}", self.repo, self.path)
    }
}

/// Fallback when no remote store is configured: a JSON file in the home
/// directory, no revision tracking.
pub struct LocalBackend {
    path: PathBuf,
}

impl LocalBackend {
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".synergy_scan")
            .join("synergy_cache.json")
    }

    pub fn new(path: PathBuf) -> Self {
        LocalBackend { path }
    }
}

impl StoreBackend for LocalBackend {
    fn read(&self) -> anyhow::Result<Option<Revision>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(Revision {
                content,
                marker: None,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow!("cache read failed: {e}")),
        }
    }

    fn write(&self, content: &str, _revision: Option<&str>) -> Result<(), WriteError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| WriteError::Other(anyhow!("cache dir failed: {e}")))?;
        }
        fs::write(&self.path, content)
            .map_err(|e| WriteError::Other(anyhow!("cache write failed: {e}")))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

const MAX_SAVE_ATTEMPTS: u32 = 3;

pub struct CacheStore {
    backend: Box<dyn StoreBackend>,
}

impl CacheStore {
    pub fn from_config(config: &Config) -> Self {
        let backend: Box<dyn StoreBackend> = match &config.remote_store {
            Some(remote) => Box::new(GitHubBackend::new(remote)),
            None => Box::new(LocalBackend::new(LocalBackend::default_path())),
        };
        CacheStore { backend }
    }

    pub fn with_backend(backend: Box<dyn StoreBackend>) -> Self {
        CacheStore { backend }
    }

    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// Any failure here - missing file, auth, bad JSON - means "no prior
    /// data", never an error.
    pub fn load_doc(&self) -> (CacheDoc, Option<String>) {
        match self.backend.read() {
            Ok(Some(rev)) => match serde_json::from_str(&rev.content) {
                Ok(doc) => (doc, rev.marker),
                Err(_) => (CacheDoc::new(), rev.marker),
            },
            Ok(None) => (CacheDoc::new(), None),
            Err(_) => (CacheDoc::new(), None),
        }
    }

    pub fn load(&self, player_key: &str) -> PlayerEntry {
        let (doc, _) = self.load_doc();
        doc.get(player_key).cloned().unwrap_or_default()
    }

    /// Read-modify-write with optimistic concurrency: re-read the document,
    /// splice in this player's entry, write against the fresh revision
    /// marker. A conflict means another writer got in between, so reload
    /// and try again; concurrent updates to *other* players survive.
    pub fn save(&self, player_key: &str, entry: &PlayerEntry) -> Result<(), AppError> {
        for _ in 0..MAX_SAVE_ATTEMPTS {
            let (mut doc, marker) = self.load_doc();
            doc.insert(player_key.to_string(), entry.clone());
            let content = serde_json::to_string_pretty(&doc)
                .map_err(|e| AppError::StoreError(e.to_string()))?;
            match self.backend.write(&content, marker.as_deref()) {
                Ok(()) => return Ok(()),
                Err(WriteError::Conflict) => continue,
                Err(WriteError::Other(e)) => return Err(AppError::StoreError(e.to_string())),
            }
        }
        Err(AppError::StoreError(
            "gave up after repeated revision conflicts".to_string(),
        ))
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::cell::RefCell;

    struct MemState {
        content: Option<String>,
        rev: u64,
        /// Applied right after the next read, simulating a concurrent writer
        /// slipping in between our read and our write.
        interleave_once: Option<String>,
        write_attempts: u32,
    }

    pub struct MemoryBackend {
        state: RefCell<MemState>,
    }

    impl MemoryBackend {
        pub fn empty() -> Self {
            MemoryBackend {
                state: RefCell::new(MemState {
                    content: None,
                    rev: 0,
                    interleave_once: None,
                    write_attempts: 0,
                }),
            }
        }

        pub fn seeded(content: &str) -> Self {
            let backend = Self::empty();
            backend.state.borrow_mut().content = Some(content.to_string());
            backend
        }

        pub fn interleave_write(&self, content: &str) {
            self.state.borrow_mut().interleave_once = Some(content.to_string());
        }

        pub fn write_attempts(&self) -> u32 {
            self.state.borrow().write_attempts
        }

        pub fn content(&self) -> Option<String> {
            self.state.borrow().content.clone()
        }
    }

    impl StoreBackend for MemoryBackend {
        fn read(&self) -> anyhow::Result<Option<Revision>> {
            let mut st = self.state.borrow_mut();
            let out = st.content.clone().map(|content| Revision {
                content,
                marker: Some(st.rev.to_string()),
            });
            if let Some(other) = st.interleave_once.take() {
                st.content = Some(other);
                st.rev += 1;
            }
            Ok(out)
        }

        fn write(&self, content: &str, revision: Option<&str>) -> Result<(), WriteError> {
            let mut st = self.state.borrow_mut();
            st.write_attempts += 1;
            if st.content.is_some() && revision != Some(st.rev.to_string().as_str()) {
                return Err(WriteError::Conflict);
            }
            st.content = Some(content.to_string());
            st.rev += 1;
            Ok(())
        }

        fn describe(&self) -> String {
            "memory://".to_string()
        }
    }

    impl StoreBackend for std::rc::Rc<MemoryBackend> {
        fn read(&self) -> anyhow::Result<Option<Revision>> {
            self.as_ref().read()
        }

        fn write(&self, content: &str, revision: Option<&str>) -> Result<(), WriteError> {
            self.as_ref().write(content, revision)
        }

        fn describe(&self) -> String {
            self.as_ref().describe()
        }
    }

    pub struct BrokenBackend;

    impl StoreBackend for BrokenBackend {
        fn read(&self) -> anyhow::Result<Option<Revision>> {
            Err(anyhow!("remote unavailable"))
        }

        fn write(&self, _content: &str, _revision: Option<&str>) -> Result<(), WriteError> {
            Err(WriteError::Other(anyhow!("remote unavailable")))
        }

        fn describe(&self) -> String {
            "broken://".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn entry_with_sentinel(id: &str) -> PlayerEntry {
        PlayerEntry {
            last_match_id: Some(id.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn load_failures_mean_empty_state() {
        let broken = CacheStore::with_backend(Box::new(BrokenBackend));
        assert!(broken.load("caps#euw").last_match_id.is_none());

        let garbage = CacheStore::with_backend(Box::new(MemoryBackend::seeded("not json")));
        assert!(garbage.load("caps#euw").last_match_id.is_none());

        let missing = CacheStore::with_backend(Box::new(MemoryBackend::empty()));
        assert!(missing.load("caps#euw").matches.is_empty());
    }

    #[test]
    fn save_creates_when_file_is_missing_and_round_trips() {
        let backend = std::rc::Rc::new(MemoryBackend::empty());
        let store = CacheStore::with_backend(Box::new(backend.clone()));
        store
            .save("caps#euw", &entry_with_sentinel("EUW1_9"))
            .unwrap();

        assert_eq!(backend.write_attempts(), 1);
        let loaded = store.load("caps#euw");
        assert_eq!(loaded.last_match_id.as_deref(), Some("EUW1_9"));
    }

    #[test]
    fn conflicting_save_reloads_and_keeps_other_players() {
        let mut other_doc = CacheDoc::new();
        other_doc.insert("other#player".to_string(), entry_with_sentinel("NA1_1"));
        let other_json = serde_json::to_string(&other_doc).unwrap();

        let backend = std::rc::Rc::new(MemoryBackend::seeded("{}"));
        // Another writer lands between our read and our write.
        backend.interleave_write(&other_json);
        let store = CacheStore::with_backend(Box::new(backend.clone()));

        store
            .save("caps#euw", &entry_with_sentinel("EUW1_9"))
            .unwrap();

        assert_eq!(backend.write_attempts(), 2);
        let (doc, _) = store.load_doc();
        assert!(doc.contains_key("caps#euw"));
        assert!(doc.contains_key("other#player"));
    }

    #[test]
    fn unrecoverable_write_failure_surfaces_as_store_error() {
        let store = CacheStore::with_backend(Box::new(BrokenBackend));
        let err = store
            .save("caps#euw", &entry_with_sentinel("EUW1_9"))
            .unwrap_err();
        assert!(matches!(err, AppError::StoreError(_)));
    }
}
