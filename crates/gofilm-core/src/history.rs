//! Local watch history
//!
//! Hosts persist progress reported by the controller so the next visit can
//! resume. The history is a JSON object keyed by film id, the same shape the
//! site keeps in its history cookie:
//!
//! ```json
//! { "42": { "id": "42", "name": "...", "timeStamp": 1760000000000,
//!           "link": "/play?id=42&source=s1&episode=3&currentTime=61.5",
//!           "currentTime": 61.5, "duration": 2700.0, ... } }
//! ```

use crate::{Progress, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};
use url::Url;

/// One film's last watch position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub picture: String,
    /// Episode label shown in the history list
    #[serde(default)]
    pub episode: String,
    /// Last update, milliseconds since the epoch
    #[serde(rename = "timeStamp")]
    pub timestamp: i64,
    /// Resume link back into the play page
    pub link: String,
    #[serde(default)]
    pub current_time: f64,
    #[serde(default)]
    pub duration: f64,
}

impl HistoryEntry {
    pub fn watched_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }

    /// Whole percent watched, when both position and duration are known
    pub fn progress_percent(&self) -> Option<u8> {
        if self.current_time <= 0.0 || !(self.duration.is_finite() && self.duration > 0.0) {
            return None;
        }
        let percent = (self.current_time / self.duration * 100.0).floor();
        Some(percent.clamp(0.0, 100.0) as u8)
    }
}

/// Film being watched, as the play page knows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilmRef {
    pub id: String,
    pub name: String,
    pub picture: String,
}

/// Where a resume link points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeTarget {
    pub film_id: String,
    pub source_id: String,
    pub episode: usize,
    pub current_time: f64,
}

impl ResumeTarget {
    /// Play-page link carrying the resume position
    pub fn to_link(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id", &self.film_id)
            .append_pair("source", &self.source_id)
            .append_pair("episode", &self.episode.to_string())
            .append_pair("currentTime", &self.current_time.to_string())
            .finish();
        format!("/play?{}", query)
    }

    /// Parse a play-page link; a missing `currentTime` resumes from 0
    pub fn parse(link: &str) -> Option<Self> {
        let base = Url::parse("http://localhost/").ok()?;
        let url = base.join(link).ok()?;
        if url.path() != "/play" {
            return None;
        }

        let mut film_id = None;
        let mut source_id = String::new();
        let mut episode = 0;
        let mut current_time = 0.0;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "id" => film_id = Some(value.into_owned()),
                "source" => source_id = value.into_owned(),
                "episode" => episode = value.parse().unwrap_or(0),
                "currentTime" => {
                    current_time = value
                        .parse::<f64>()
                        .ok()
                        .filter(|t| t.is_finite() && *t >= 0.0)
                        .unwrap_or(0.0)
                }
                _ => {}
            }
        }

        Some(Self {
            film_id: film_id?,
            source_id,
            episode,
            current_time,
        })
    }
}

/// Watch history keyed by film id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchHistory {
    entries: BTreeMap<String, HistoryEntry>,
}

impl WatchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict parse
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse, treating corrupt data as an empty history
    pub fn from_json_lenient(json: &str) -> Self {
        match Self::from_json(json) {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable watch history");
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Load from a file; a missing file is an empty history
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No history file yet");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json_lenient(&content))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Insert or replace the entry for `entry.id`
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.insert(entry.id.clone(), entry);
    }

    /// Record a progress sample for the film at `target`
    pub fn record_progress(
        &mut self,
        film: &FilmRef,
        episode_label: &str,
        source_id: &str,
        episode: usize,
        progress: Progress,
        at: DateTime<Utc>,
    ) {
        let target = ResumeTarget {
            film_id: film.id.clone(),
            source_id: source_id.to_string(),
            episode,
            current_time: progress.current_time,
        };

        self.record(HistoryEntry {
            id: film.id.clone(),
            name: film.name.clone(),
            picture: film.picture.clone(),
            episode: episode_label.to_string(),
            timestamp: at.timestamp_millis(),
            link: target.to_link(),
            current_time: progress.current_time,
            duration: progress.duration,
        });
    }

    pub fn remove(&mut self, id: &str) -> Option<HistoryEntry> {
        self.entries.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&HistoryEntry> {
        self.entries.get(id)
    }

    /// Entries, most recently watched first
    pub fn list(&self) -> Vec<&HistoryEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn film(id: &str) -> FilmRef {
        FilmRef {
            id: id.to_string(),
            name: format!("Film {}", id),
            picture: format!("https://img.example.com/{}.jpg", id),
        }
    }

    #[test]
    fn test_record_and_list_newest_first() {
        let mut history = WatchHistory::new();
        let early = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 2, 12, 0, 0).unwrap();

        history.record_progress(&film("1"), "EP01", "s1", 0, Progress::new(10.0, 100.0), early);
        history.record_progress(&film("2"), "EP05", "s1", 4, Progress::new(50.0, 100.0), late);

        let ids: Vec<_> = history.list().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
        assert_eq!(history.get("2").unwrap().watched_at(), Some(late));
    }

    #[test]
    fn test_record_replaces_same_film() {
        let mut history = WatchHistory::new();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        history.record_progress(&film("7"), "EP01", "s1", 0, Progress::new(10.0, 100.0), at);
        history.record_progress(&film("7"), "EP02", "s1", 1, Progress::new(20.0, 100.0), at);

        assert_eq!(history.len(), 1);
        assert_eq!(history.get("7").unwrap().episode, "EP02");
    }

    #[test]
    fn test_link_round_trip() {
        let target = ResumeTarget {
            film_id: "42".to_string(),
            source_id: "dbm3u8".to_string(),
            episode: 3,
            current_time: 61.5,
        };
        let link = target.to_link();
        assert_eq!(link, "/play?id=42&source=dbm3u8&episode=3&currentTime=61.5");
        assert_eq!(ResumeTarget::parse(&link), Some(target));
    }

    #[test]
    fn test_parse_link_defaults() {
        let target = ResumeTarget::parse("/play?id=9&source=a").unwrap();
        assert_eq!(target.episode, 0);
        assert_eq!(target.current_time, 0.0);

        let target = ResumeTarget::parse("/play?id=9&currentTime=-4").unwrap();
        assert_eq!(target.current_time, 0.0);

        assert!(ResumeTarget::parse("/play?source=a").is_none());
        assert!(ResumeTarget::parse("/filmDetail?id=9").is_none());
    }

    #[test]
    fn test_progress_percent() {
        let mut entry = HistoryEntry {
            id: "1".to_string(),
            name: "x".to_string(),
            picture: String::new(),
            episode: String::new(),
            timestamp: 0,
            link: "/play?id=1".to_string(),
            current_time: 999.0,
            duration: 1000.0,
        };
        assert_eq!(entry.progress_percent(), Some(99));

        entry.duration = 0.0;
        assert_eq!(entry.progress_percent(), None);
    }

    #[test]
    fn test_cookie_shape_parses() {
        let raw = r#"{"42":{"id":"42","name":"Night","picture":"p.jpg","episode":"EP1",
            "timeStamp":1760000000000,"link":"/play?id=42","currentTime":12,"duration":120}}"#;
        let history = WatchHistory::from_json(raw).unwrap();
        assert_eq!(history.get("42").unwrap().progress_percent(), Some(10));
    }

    #[test]
    fn test_lenient_parse_of_corrupt_data() {
        assert!(WatchHistory::from_json_lenient("{not json").is_empty());
        assert!(WatchHistory::from_json("{not json").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        assert!(WatchHistory::load(&path).unwrap().is_empty());

        let mut history = WatchHistory::new();
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        history.record_progress(&film("3"), "EP1", "s", 0, Progress::new(5.0, 50.0), at);
        history.save(&path).unwrap();

        let loaded = WatchHistory::load(&path).unwrap();
        assert_eq!(loaded, history);

        let mut loaded = loaded;
        assert!(loaded.remove("3").is_some());
        assert!(loaded.remove("3").is_none());
    }
}
