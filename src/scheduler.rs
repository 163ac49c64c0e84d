// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Holds note events that arrive ahead of the block being rendered and releases
//! them when their timestamp enters the current block.

use crate::audio::context::ProcessContext;
use crate::module::NoteEvent;

/// Maximum number of notes that can wait for a future block.
pub const NOTE_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SchedulerError {
    #[error("note queue is full ({0} pending), dropping note at {1}ms")]
    QueueFull(usize, f64),
}

/// A fixed-capacity, time-ordered queue of pending notes.
#[derive(Debug, Default)]
pub struct NoteInputBuffer {
    /// Pending notes sorted by time. Equal times keep arrival order.
    queue: heapless::Vec<NoteEvent, NOTE_QUEUE_CAPACITY>,
}

impl NoteInputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a note for a later block.
    pub fn queue_note(&mut self, note: NoteEvent) -> Result<(), SchedulerError> {
        let index = self
            .queue
            .iter()
            .position(|queued| queued.time_ms > note.time_ms)
            .unwrap_or(self.queue.len());
        self.queue
            .insert(index, note)
            .map_err(|note| SchedulerError::QueueFull(NOTE_QUEUE_CAPACITY, note.time_ms))
    }

    /// Removes and returns the earliest note that is due in this block.
    pub fn next_due(&mut self, ctx: &ProcessContext) -> Option<NoteEvent> {
        match self.queue.first() {
            Some(note) if ctx.is_time_within_frame(note.time_ms) => Some(self.queue.remove(0)),
            _ => None,
        }
    }

    /// Delivers every note due in this block, in time order.
    pub fn process<F>(&mut self, ctx: &ProcessContext, mut deliver: F)
    where
        F: FnMut(NoteEvent),
    {
        while let Some(note) = self.next_due(ctx) {
            deliver(note);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drops every pending note.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(time_ms: f64, pitch: i32) -> NoteEvent {
        NoteEvent::new(time_ms, pitch, 100)
    }

    #[test]
    fn test_releases_in_time_order() {
        let mut buffer = NoteInputBuffer::new();
        buffer.queue_note(note(25.0, 3)).unwrap();
        buffer.queue_note(note(12.0, 1)).unwrap();
        buffer.queue_note(note(12.0, 2)).unwrap();
        buffer.queue_note(note(40.0, 4)).unwrap();

        let mut ctx = ProcessContext::new(0.0, 480, 48000);
        let mut delivered = Vec::new();
        buffer.process(&ctx, |n| delivered.push(n.pitch));
        assert!(delivered.is_empty());

        ctx = ctx.next();
        buffer.process(&ctx, |n| delivered.push(n.pitch));
        assert_eq!(delivered, vec![1, 2]);

        ctx = ctx.next();
        buffer.process(&ctx, |n| delivered.push(n.pitch));
        assert_eq!(delivered, vec![1, 2, 3]);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_each_note_delivered_once() {
        let mut buffer = NoteInputBuffer::new();
        buffer.queue_note(note(15.0, 7)).unwrap();

        let mut ctx = ProcessContext::new(10.0, 480, 48000);
        let mut count = 0;
        for _ in 0..5 {
            buffer.process(&ctx, |_| count += 1);
            ctx = ctx.next();
        }
        assert_eq!(count, 1);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_late_notes_delivered_next_block() {
        let mut buffer = NoteInputBuffer::new();
        buffer.queue_note(note(5.0, 9)).unwrap();

        let ctx = ProcessContext::new(1000.0, 480, 48000);
        let mut delivered = Vec::new();
        buffer.process(&ctx, |n| delivered.push(n.pitch));
        assert_eq!(delivered, vec![9]);
    }

    #[test]
    fn test_queue_full() {
        let mut buffer = NoteInputBuffer::new();
        for i in 0..NOTE_QUEUE_CAPACITY {
            buffer.queue_note(note(100.0 + i as f64, 1)).unwrap();
        }
        assert_eq!(
            buffer.queue_note(note(50.0, 1)),
            Err(SchedulerError::QueueFull(NOTE_QUEUE_CAPACITY, 50.0))
        );
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
