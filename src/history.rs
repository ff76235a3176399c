//! Image History and Generation Log
//!
//! [`HistoryStore`] is a linear undo/redo sequence: pushing after an undo
//! drops the redo branch. [`GenerationLog`] is separate and append-only; it
//! remembers every synthesis result whatever the history does.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::image_state::ImageState;

#[derive(Debug, Default, Clone)]
pub struct HistoryStore {
    entries: Vec<ImageState>,
    cursor: Option<usize>,
    /// Bumped on every cursor or content change
    revision: u64,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `state`, discarding everything after the cursor first
    pub fn push(&mut self, state: ImageState) {
        if let Some(cursor) = self.cursor {
            let dropped = self.entries.len() - (cursor + 1);
            if dropped > 0 {
                log::debug!("Discarding {} redo entries", dropped);
            }
            self.entries.truncate(cursor + 1);
        }
        self.entries.push(state);
        self.cursor = Some(self.entries.len() - 1);
        self.revision += 1;
        log::info!("History push: {} entries", self.entries.len());
    }

    /// Step back; returns false at the oldest entry
    pub fn undo(&mut self) -> bool {
        match self.cursor {
            Some(cursor) if cursor > 0 => {
                self.cursor = Some(cursor - 1);
                self.revision += 1;
                log::info!("Undo -> {}", cursor - 1);
                true
            }
            _ => false,
        }
    }

    /// Step forward; returns false at the newest entry
    pub fn redo(&mut self) -> bool {
        match self.cursor {
            Some(cursor) if cursor + 1 < self.entries.len() => {
                self.cursor = Some(cursor + 1);
                self.revision += 1;
                log::info!("Redo -> {}", cursor + 1);
                true
            }
            _ => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        matches!(self.cursor, Some(c) if c > 0)
    }

    pub fn can_redo(&self) -> bool {
        matches!(self.cursor, Some(c) if c + 1 < self.entries.len())
    }

    /// Image under the cursor
    pub fn current(&self) -> Option<&ImageState> {
        self.cursor.and_then(|c| self.entries.get(c))
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ImageState] {
        &self.entries
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub id: u64,
    pub result_image: ImageState,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct GenerationLog {
    records: Vec<Generation>,
    next_id: u64,
}

impl GenerationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a synthesis result and return its id
    pub fn append(&mut self, prompt: impl Into<String>, result_image: ImageState) -> u64 {
        self.next_id += 1;
        let record = Generation {
            id: self.next_id,
            result_image,
            prompt: prompt.into(),
            created_at: Utc::now(),
        };
        log::info!("Generation #{} logged: {:?}", record.id, record.prompt);
        self.records.push(record);
        self.next_id
    }

    pub fn get(&self, id: u64) -> Option<&Generation> {
        self.records.iter().find(|g| g.id == id)
    }

    /// Oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Generation> {
        self.records.iter()
    }

    /// Newest first, the order a history sidebar shows
    pub fn newest_first(&self) -> impl Iterator<Item = &Generation> {
        self.records.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(name: &str) -> ImageState {
        ImageState::new(format!("data:image/png;base64,{name}"))
    }

    #[test]
    fn pushes_advance_the_cursor() {
        let mut history = HistoryStore::new();
        assert_eq!(history.cursor(), None);
        assert!(history.current().is_none());
        for (k, name) in ["a", "b", "c", "d"].into_iter().enumerate() {
            history.push(img(name));
            assert_eq!(history.len(), k + 1);
            assert_eq!(history.cursor(), Some(k));
        }
        assert_eq!(history.current(), Some(&img("d")));
    }

    #[test]
    fn undo_then_redo_restores_position() {
        let mut history = HistoryStore::new();
        history.push(img("a"));
        history.push(img("b"));
        assert!(history.undo());
        assert_eq!(history.current(), Some(&img("a")));
        assert!(history.redo());
        assert_eq!(history.cursor(), Some(1));
        assert_eq!(history.current(), Some(&img("b")));
    }

    #[test]
    fn boundaries_are_no_ops() {
        let mut history = HistoryStore::new();
        assert!(!history.undo());
        assert!(!history.redo());

        history.push(img("a"));
        let revision = history.revision();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(!history.undo());
        assert!(!history.redo());
        assert_eq!(history.cursor(), Some(0));
        assert_eq!(history.revision(), revision);
    }

    #[test]
    fn push_after_undo_discards_the_redo_branch() {
        let mut history = HistoryStore::new();
        history.push(img("a"));
        history.push(img("b"));
        history.push(img("c"));
        assert_eq!(history.cursor(), Some(2));

        history.undo();
        assert_eq!(history.cursor(), Some(1));
        history.push(img("d"));

        assert_eq!(history.entries(), &[img("a"), img("b"), img("d")]);
        assert_eq!(history.cursor(), Some(2));
        assert_eq!(history.current(), Some(&img("d")));
        assert!(!history.can_redo());
        assert!(!history.redo());
    }

    #[test]
    fn revision_moves_with_every_change() {
        let mut history = HistoryStore::new();
        history.push(img("a"));
        history.push(img("b"));
        let r = history.revision();
        history.undo();
        assert_eq!(history.revision(), r + 1);
        history.redo();
        assert_eq!(history.revision(), r + 2);
    }

    #[test]
    fn generation_log_is_independent_of_history() {
        let mut history = HistoryStore::new();
        let mut log = GenerationLog::new();
        history.push(img("a"));
        history.push(img("b"));
        let first = log.append("make it blue", img("b"));
        history.undo();
        history.push(img("c"));
        let second = log.append("add a hat", img("c"));

        assert_eq!(log.len(), 2);
        assert!(second > first);
        assert_eq!(log.get(first).unwrap().result_image, img("b"));
        let prompts: Vec<_> = log.newest_first().map(|g| g.prompt.as_str()).collect();
        assert_eq!(prompts, vec!["add a hat", "make it blue"]);
    }

    #[test]
    fn generations_serialize_for_the_page() {
        let mut log = GenerationLog::new();
        log.append("p", img("x"));
        let json = serde_json::to_value(log.iter().next().unwrap()).unwrap();
        assert_eq!(json["prompt"], "p");
        assert_eq!(json["resultImage"], "data:image/png;base64,x");
        assert!(json["createdAt"].is_string());
    }
}
