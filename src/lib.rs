pub mod auth;
pub mod chart;
pub mod chat;
pub mod claude;
pub mod config;
pub mod constants;
pub mod render;
pub mod session;
pub mod visualizer;

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::claude::ModelResponse;

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Local>,
    pub prompt: String,
    pub response: ModelResponse,
    pub is_collapsed: bool,
}

impl ResponseEntry {
    pub fn time_label(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }
}

/// Responses shown on one screen, oldest first. Entries are only ever
/// appended; the collapsed flag is the one thing that changes afterwards.
#[derive(Debug, Default)]
pub struct ResponseLog {
    entries: Vec<ResponseEntry>,
}

impl ResponseLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, prompt: String, response: ModelResponse) -> &ResponseEntry {
        self.entries.push(ResponseEntry {
            id: Uuid::new_v4(),
            timestamp: Local::now(),
            prompt,
            response,
            is_collapsed: false,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[ResponseEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&ResponseEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flips the collapsed state of one card. Returns the new state.
    pub fn toggle(&mut self, index: usize) -> Option<bool> {
        let entry = self.entries.get_mut(index)?;
        entry.is_collapsed = !entry.is_collapsed;
        Some(entry.is_collapsed)
    }
}
