//! CLI command implementations

use anyhow::{anyhow, Context};
use gofilm_core::headless::{EngineCommand, HeadlessCapabilities, HeadlessFactory};
use gofilm_core::{
    validate_playable_link, AttachOptions, EngineEvent, EventReceiver, Generation, MediaKind,
    MediaSource, PlaybackController, PlaybackEvent, PlaybackState, PlayerConfig, Progress,
    ResumeTarget, ViewportEvent, WatchHistory,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tabled::Tabled;
use tracing::{debug, info, warn};
use url::Url;

use crate::output;

// ============================================================================
// Probe
// ============================================================================

/// What the player would do with a source
#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub url: String,
    pub kind: MediaKind,
    pub mime_type: &'static str,
    /// Accepted by the custom player page
    pub custom_player_link: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<ManifestSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileSummary>,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "playlist", rename_all = "snake_case")]
pub enum ManifestSummary {
    Master {
        variants: Vec<VariantRow>,
    },
    Media {
        segments: usize,
        target_duration: f64,
        total_duration: f64,
        live: bool,
    },
}

#[derive(Debug, PartialEq, Serialize, Tabled)]
pub struct VariantRow {
    pub bandwidth: u64,
    pub resolution: String,
    pub codecs: String,
    pub uri: String,
}

#[derive(Debug, Serialize)]
pub struct FileSummary {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// Probe a source URL
pub async fn probe(url: &str, fetch: bool, format: &str) -> anyhow::Result<()> {
    let source = MediaSource::parse(url)?;
    info!(url = %source, kind = %source.kind(), "Probing source");

    let mut report = ProbeReport {
        url: source.as_str().to_string(),
        kind: source.kind(),
        mime_type: source.kind().mime_type(),
        custom_player_link: validate_playable_link(url).is_ok(),
        manifest: None,
        file: None,
    };

    if fetch {
        let client = reqwest::Client::new();
        match source.kind() {
            MediaKind::SegmentedManifest => {
                let content = client
                    .get(source.url().clone())
                    .send()
                    .await?
                    .error_for_status()?
                    .text()
                    .await?;
                report.manifest = Some(summarize_manifest(&content, source.url())?);
            }
            MediaKind::DirectFile => {
                let response = client.head(source.url().clone()).send().await?;
                report.file = Some(FileSummary {
                    status: response.status().as_u16(),
                    content_type: response
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string),
                    content_length: response.content_length(),
                });
            }
        }
    }

    output::print_probe(&report, format);
    Ok(())
}

/// Summarize an HLS playlist, master or media
pub fn summarize_manifest(content: &str, base_url: &Url) -> anyhow::Result<ManifestSummary> {
    if content.contains("#EXT-X-STREAM-INF") {
        let master = m3u8_rs::parse_master_playlist_res(content.as_bytes())
            .map_err(|e| anyhow!("Failed to parse HLS master: {:?}", e))?;

        let mut variants: Vec<VariantRow> = master
            .variants
            .iter()
            .filter(|v| !v.is_i_frame)
            .map(|v| VariantRow {
                bandwidth: v.bandwidth,
                resolution: v
                    .resolution
                    .map(|r| format!("{}x{}", r.width, r.height))
                    .unwrap_or_else(|| "-".to_string()),
                codecs: v.codecs.clone().unwrap_or_else(|| "-".to_string()),
                uri: base_url
                    .join(&v.uri)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| v.uri.clone()),
            })
            .collect();
        variants.sort_by_key(|v| v.bandwidth);

        Ok(ManifestSummary::Master { variants })
    } else {
        let media = m3u8_rs::parse_media_playlist_res(content.as_bytes())
            .map_err(|e| anyhow!("Failed to parse HLS media: {:?}", e))?;

        Ok(ManifestSummary::Media {
            segments: media.segments.len(),
            target_duration: media.target_duration as f64,
            total_duration: media.segments.iter().map(|s| s.duration as f64).sum(),
            live: !media.end_list,
        })
    }
}

// ============================================================================
// Simulate
// ============================================================================

/// One scripted step
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Engine(EngineEvent),
    Viewport(ViewportEvent),
    /// Operator pressed retry
    Retry,
}

/// Ready, play, scroll out and back, finish
pub fn default_script() -> Vec<Step> {
    vec![
        Step::Viewport(ViewportEvent::Resize { width: 1280.0 }),
        Step::Engine(EngineEvent::Ready),
        Step::Engine(EngineEvent::Playing),
        Step::Engine(EngineEvent::TimeUpdate {
            current_time: 1.0,
            duration: 2700.0,
        }),
        Step::Viewport(ViewportEvent::Intersection { ratio: 0.05 }),
        Step::Engine(EngineEvent::TimeUpdate {
            current_time: 30.0,
            duration: 2700.0,
        }),
        Step::Viewport(ViewportEvent::Intersection { ratio: 0.9 }),
        Step::Engine(EngineEvent::TimeUpdate {
            current_time: 2700.0,
            duration: 2700.0,
        }),
        Step::Engine(EngineEvent::Ended),
    ]
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub generation: Generation,
    pub final_state: Option<PlaybackState>,
    pub mini: bool,
    pub last_position: Option<Progress>,
    pub events: Vec<PlaybackEvent>,
    pub commands: Vec<EngineCommand>,
}

fn load_script(path: &Path) -> anyhow::Result<Vec<Step>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing script {}", path.display()))
}

fn drain(events: &mut EventReceiver, into: &mut Vec<PlaybackEvent>) {
    while let Ok(event) = events.try_recv() {
        into.push(event);
    }
}

/// Run `steps` against a fresh controller
pub fn run_simulation(
    url: &str,
    resume: f64,
    steps: Vec<Step>,
    config: PlayerConfig,
    capabilities: HeadlessCapabilities,
) -> anyhow::Result<SimulationReport> {
    let factory = HeadlessFactory::with_capabilities(capabilities);
    let handle = factory.handle();
    let (mut controller, mut events) = PlaybackController::new(factory, config)?;

    let mut generation = controller.attach(url, AttachOptions::resume_at(resume))?;
    info!(%generation, steps = steps.len(), "Running scripted session");

    let mut emitted = Vec::new();
    drain(&mut events, &mut emitted);

    for (index, step) in steps.into_iter().enumerate() {
        let applied = match step {
            Step::Engine(event) => controller.handle_engine_event(generation, event),
            Step::Viewport(event) => controller.handle_viewport_event(generation, event),
            Step::Retry => {
                generation = controller.retry()?;
                true
            }
        };
        if !applied {
            debug!(step = index, "Step ignored");
        }
        drain(&mut events, &mut emitted);
    }

    let report = SimulationReport {
        generation,
        final_state: controller.state(),
        mini: controller.is_mini_mode(),
        last_position: controller.last_position(),
        events: emitted,
        commands: Vec::new(),
    };

    controller.detach();
    drain(&mut events, &mut Vec::new());

    Ok(SimulationReport {
        commands: handle.commands(),
        ..report
    })
}

/// Simulate a session and print what happened
pub fn simulate(
    url: &str,
    resume: f64,
    script: Option<PathBuf>,
    config: Option<PathBuf>,
    capabilities: HeadlessCapabilities,
    format: &str,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => PlayerConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PlayerConfig::default(),
    };
    let steps = match script {
        Some(path) => load_script(&path)?,
        None => default_script(),
    };

    let report = run_simulation(url, resume, steps, config, capabilities)?;
    output::print_simulation(&report, format);
    Ok(())
}

// ============================================================================
// History
// ============================================================================

#[derive(Debug, Serialize, Tabled)]
pub struct HistoryRow {
    pub id: String,
    pub name: String,
    pub episode: String,
    pub progress: String,
    pub watched: String,
    pub link: String,
}

fn history_rows(history: &WatchHistory) -> Vec<HistoryRow> {
    history
        .list()
        .into_iter()
        .map(|entry| HistoryRow {
            id: entry.id.clone(),
            name: entry.name.clone(),
            episode: entry.episode.clone(),
            progress: entry
                .progress_percent()
                .map(|p| format!("{}%", p))
                .unwrap_or_else(|| "-".to_string()),
            watched: entry
                .watched_at()
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
            link: entry.link.clone(),
        })
        .collect()
}

pub fn history_list(file: &Path, format: &str) -> anyhow::Result<()> {
    let history = WatchHistory::load(file)?;
    output::print_history(&history_rows(&history), format);
    Ok(())
}

pub fn history_show(file: &Path, id: &str, format: &str) -> anyhow::Result<()> {
    let history = WatchHistory::load(file)?;
    let entry = history
        .get(id)
        .ok_or_else(|| anyhow!("no history entry for film {}", id))?;
    println!("{}", output::format_output(entry, format));
    Ok(())
}

pub fn history_remove(file: &Path, id: &str) -> anyhow::Result<()> {
    let mut history = WatchHistory::load(file)?;
    match history.remove(id) {
        Some(entry) => {
            history.save(file)?;
            println!("Removed {} ({})", entry.name, entry.id);
        }
        None => warn!(id, "No history entry to remove"),
    }
    Ok(())
}

pub fn history_clear(file: &Path) -> anyhow::Result<()> {
    let mut history = WatchHistory::load(file)?;
    let count = history.len();
    history.clear();
    history.save(file)?;
    println!("Removed {} entries", count);
    Ok(())
}

// ============================================================================
// Link
// ============================================================================

pub fn link(link: &str, format: &str) -> anyhow::Result<()> {
    let target =
        ResumeTarget::parse(link).ok_or_else(|| anyhow!("not a play-page link: {}", link))?;
    println!("{}", output::format_output(&target, format));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=2560000,RESOLUTION=1280x720,CODECS=\"avc1.64001f,mp4a.40.2\"
720p/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360p/index.m3u8
";

    const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:10
#EXT-X-MEDIA-SEQUENCE:0
#EXTINF:9.5,
seg0.ts
#EXTINF:8.0,
seg1.ts
#EXT-X-ENDLIST
";

    fn base() -> Url {
        Url::parse("https://cdn.example.com/vod/film/index.m3u8").unwrap()
    }

    #[test]
    fn test_summarize_master_sorted_by_bandwidth() {
        let summary = summarize_manifest(MASTER, &base()).unwrap();
        let ManifestSummary::Master { variants } = summary else {
            panic!("expected master playlist");
        };
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].bandwidth, 800000);
        assert_eq!(variants[0].resolution, "640x360");
        assert_eq!(variants[0].codecs, "-");
        assert_eq!(variants[1].uri, "https://cdn.example.com/vod/film/720p/index.m3u8");
    }

    #[test]
    fn test_summarize_media() {
        let summary = summarize_manifest(MEDIA, &base()).unwrap();
        assert_eq!(
            summary,
            ManifestSummary::Media {
                segments: 2,
                target_duration: 10.0,
                total_duration: 17.5,
                live: false,
            }
        );
    }

    #[test]
    fn test_script_format() {
        let raw = r#"[
            {"engine": {"type": "ready"}},
            {"viewport": {"type": "scroll", "scroll_y": 0}},
            {"engine": {"type": "fatal", "detail": {"source": "stream", "kind": "network", "message": "manifestLoadError", "details": null}}},
            "retry"
        ]"#;
        let steps: Vec<Step> = serde_json::from_str(raw).unwrap();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0], Step::Engine(EngineEvent::Ready));
        assert_eq!(steps[3], Step::Retry);
    }

    #[test]
    fn test_default_simulation() {
        let report = run_simulation(
            "https://cdn.example.com/film/index.m3u8",
            30.0,
            default_script(),
            PlayerConfig::default(),
            HeadlessCapabilities::default(),
        )
        .unwrap();

        assert_eq!(report.final_state, Some(PlaybackState::Ended));
        assert!(!report.mini);

        let minis: Vec<bool> = report
            .events
            .iter()
            .filter_map(|e| match e {
                PlaybackEvent::MiniModeChanged { mini, .. } => Some(*mini),
                _ => None,
            })
            .collect();
        assert_eq!(minis, vec![true, false]);

        let seeks = report
            .commands
            .iter()
            .filter(|c| matches!(c, EngineCommand::Seek { seconds, .. } if *seconds == 30.0))
            .count();
        assert_eq!(seeks, 1);
        assert!(matches!(
            report.commands.last(),
            Some(EngineCommand::DisposePlayer { .. })
        ));
    }

    #[test]
    fn test_simulation_retry_moves_to_new_generation() {
        let steps = vec![
            Step::Engine(EngineEvent::Fatal {
                detail: gofilm_core::FatalErrorDetail::new(
                    gofilm_core::ErrorSource::Stream,
                    gofilm_core::FatalErrorKind::Network,
                    "manifestLoadError",
                ),
            }),
            Step::Retry,
            Step::Engine(EngineEvent::Playing),
        ];
        let report = run_simulation(
            "https://cdn.example.com/film/index.m3u8",
            0.0,
            steps,
            PlayerConfig::default(),
            HeadlessCapabilities::default(),
        )
        .unwrap();

        assert_eq!(report.generation, Generation(2));
        assert_eq!(report.final_state, Some(PlaybackState::Playing));
    }

    #[test]
    fn test_history_rows_newest_first() {
        use chrono::TimeZone;
        use gofilm_core::FilmRef;

        let mut history = WatchHistory::new();
        let film = |id: &str| FilmRef {
            id: id.to_string(),
            name: format!("Film {}", id),
            picture: String::new(),
        };
        let early = chrono::Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let late = chrono::Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        history.record_progress(&film("a"), "EP1", "s", 0, Progress::new(50.0, 100.0), early);
        history.record_progress(&film("b"), "EP2", "s", 1, Progress::new(0.0, 100.0), late);

        let rows = history_rows(&history);
        assert_eq!(rows[0].id, "b");
        assert_eq!(rows[0].progress, "-");
        assert_eq!(rows[1].progress, "50%");
        assert_eq!(rows[1].watched, "2026-01-01 00:00");
    }

    #[test]
    fn test_history_clear_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, r#"{"1":{"id":"1","name":"x","timeStamp":0,"link":"/play?id=1"}}"#)
            .unwrap();

        history_clear(&path).unwrap();
        assert!(WatchHistory::load(&path).unwrap().is_empty());
    }
}
