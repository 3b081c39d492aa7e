//! Mini-player state machine
//!
//! Decides when the inline player should float as a miniature overlay.
//! The tracker is fed viewport observations and playback changes and
//! reports each `Inline <-> Mini` transition exactly once.
//!
//! Mini mode holds only while all of these are true:
//! - mini mode is enabled and the viewport is wide enough
//! - playback is `Playing`
//! - fullscreen is not active
//! - the host element was last judged out of view

use crate::config::MiniModeConfig;
use crate::PresentationMode;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Viewport observations about the host element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewportEvent {
    /// Visible fraction of the element, from an intersection observer
    Intersection { ratio: f64 },
    /// Element bounding rect relative to the viewport, from frame polling
    Bounds { top: f64, bottom: f64 },
    /// Window vertical scroll offset
    Scroll { scroll_y: f64 },
    /// Document entered or left fullscreen
    Fullscreen { active: bool },
    /// Viewport width changed
    Resize { width: f64 },
}

/// Tracks the inline/mini presentation for one session
#[derive(Debug, Clone)]
pub struct MiniModeTracker {
    config: MiniModeConfig,
    mode: PresentationMode,
    playing: bool,
    fullscreen: bool,
    viewport_allowed: bool,
    out_of_view: bool,
}

impl MiniModeTracker {
    pub fn new(config: MiniModeConfig) -> Self {
        Self {
            config,
            mode: PresentationMode::Inline,
            playing: false,
            fullscreen: false,
            viewport_allowed: true,
            out_of_view: false,
        }
    }

    pub fn mode(&self) -> PresentationMode {
        self.mode
    }

    pub fn is_mini(&self) -> bool {
        self.mode == PresentationMode::Mini
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Apply a viewport observation; returns the new mode on a transition
    pub fn observe(&mut self, event: ViewportEvent) -> Option<PresentationMode> {
        match event {
            ViewportEvent::Intersection { ratio } => {
                if ratio < self.config.enter_ratio {
                    self.out_of_view = true;
                } else if ratio >= self.config.exit_ratio {
                    self.out_of_view = false;
                }
            }
            ViewportEvent::Bounds { top, bottom } => {
                if bottom < self.config.enter_bottom_px {
                    self.out_of_view = true;
                } else if top > self.config.exit_top_px {
                    self.out_of_view = false;
                }
            }
            ViewportEvent::Scroll { scroll_y } => {
                if scroll_y <= self.config.top_reset_px {
                    self.out_of_view = false;
                }
            }
            ViewportEvent::Fullscreen { active } => {
                self.fullscreen = active;
            }
            ViewportEvent::Resize { width } => {
                self.viewport_allowed = width > self.config.min_viewport_width;
            }
        }
        self.reevaluate()
    }

    /// Playback entered or left `Playing`
    pub fn set_playing(&mut self, playing: bool) -> Option<PresentationMode> {
        self.playing = playing;
        self.reevaluate()
    }

    /// Drop back to inline until playback resumes
    pub fn force_inline(&mut self) -> Option<PresentationMode> {
        self.playing = false;
        self.reevaluate()
    }

    /// Return to the initial state
    pub fn reset(&mut self) -> Option<PresentationMode> {
        self.playing = false;
        self.fullscreen = false;
        self.out_of_view = false;
        self.reevaluate()
    }

    fn reevaluate(&mut self) -> Option<PresentationMode> {
        let wanted = if self.config.enabled
            && self.viewport_allowed
            && self.playing
            && !self.fullscreen
            && self.out_of_view
        {
            PresentationMode::Mini
        } else {
            PresentationMode::Inline
        };

        if wanted == self.mode {
            return None;
        }

        debug!(from = ?self.mode, to = ?wanted, "Presentation mode change");
        self.mode = wanted;
        Some(wanted)
    }
}
