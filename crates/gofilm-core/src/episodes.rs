//! Episode navigation for multi-episode films
//!
//! A film offers several play sources (mirrors), each with its own episode
//! list. The cursor names the source and episode being played and decides
//! what happens when the controller reports `Ended`.

use serde::{Deserialize, Serialize};

/// One playable episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeLink {
    /// Display label, e.g. "EP03"
    pub episode: String,
    /// Media URL
    pub link: String,
}

/// A mirror with its episode list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaySource {
    pub id: String,
    pub name: String,
    pub link_list: Vec<EpisodeLink>,
}

/// Position within a film's play sources
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeCursor {
    pub source_id: String,
    pub index: usize,
}

/// What to do once an episode finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndAction {
    /// Continue with the following episode
    PlayNext(EpisodeCursor),
    /// Nothing follows the current episode
    LastEpisode,
    /// Autoplay is off
    Stay,
}

impl EpisodeCursor {
    pub fn new(source_id: impl Into<String>, index: usize) -> Self {
        Self {
            source_id: source_id.into(),
            index,
        }
    }

    fn source<'a>(&self, sources: &'a [PlaySource]) -> Option<&'a PlaySource> {
        sources.iter().find(|s| s.id == self.source_id)
    }

    /// The episode under the cursor
    pub fn current<'a>(&self, sources: &'a [PlaySource]) -> Option<&'a EpisodeLink> {
        self.source(sources)?.link_list.get(self.index)
    }

    /// Cursor for the following episode of the same source
    pub fn next(&self, sources: &[PlaySource]) -> Option<EpisodeCursor> {
        let source = self.source(sources)?;
        let index = self.index + 1;
        (index < source.link_list.len()).then(|| EpisodeCursor::new(&source.id, index))
    }

    pub fn has_next(&self, sources: &[PlaySource]) -> bool {
        self.next(sources).is_some()
    }

    /// Decide the follow-up for an `Ended` event
    pub fn on_ended(&self, sources: &[PlaySource], autoplay: bool) -> EndAction {
        if !autoplay {
            return EndAction::Stay;
        }
        match self.next(sources) {
            Some(next) => EndAction::PlayNext(next),
            None => EndAction::LastEpisode,
        }
    }
}
