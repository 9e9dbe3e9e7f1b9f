//! Observable in-memory list of notes.
//!
//! Every mutating call invokes the registered change callback exactly once,
//! synchronously, after the mutation. There is at most one observer;
//! registering a new one replaces the previous. The collection is meant to be
//! touched from a single task only and carries no locking.

use std::fmt;

use crate::models::{sort_newest_first, Note};

type ChangeCallback = Box<dyn FnMut(&[Note]) + Send>;

#[derive(Default)]
pub struct NoteCollection {
    notes: Vec<Note>,
    on_change: Option<ChangeCallback>,
}

impl NoteCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the change observer, replacing any previous one.
    pub fn set_on_change(&mut self, callback: impl FnMut(&[Note]) + Send + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    pub fn add(&mut self, note: Note) {
        self.notes.push(note);
        self.notify();
    }

    /// Remove the first note structurally equal to `note`.
    ///
    /// Returns whether a note was removed. Observers are notified either way.
    pub fn remove(&mut self, note: &Note) -> bool {
        let removed = self
            .notes
            .iter()
            .position(|existing| existing == note)
            .map(|index| self.notes.remove(index))
            .is_some();
        self.notify();
        removed
    }

    pub fn clear(&mut self) {
        self.notes.clear();
        self.notify();
    }

    /// Replace the whole contents in one step, notifying once.
    pub fn replace_all(&mut self, notes: impl IntoIterator<Item = Note>) {
        self.notes.clear();
        self.notes.extend(notes);
        self.notify();
    }

    /// Notes in insertion order.
    pub fn list(&self) -> &[Note] {
        &self.notes
    }

    /// Notes in display order (newest first).
    #[must_use]
    pub fn sorted_newest_first(&self) -> Vec<Note> {
        let mut notes = self.notes.clone();
        sort_newest_first(&mut notes);
        notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter()
    }

    fn notify(&mut self) {
        if let Some(callback) = self.on_change.as_mut() {
            callback(&self.notes);
        }
    }
}

impl fmt::Debug for NoteCollection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("NoteCollection")
            .field("notes", &self.notes)
            .field("has_observer", &self.on_change.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use pretty_assertions::assert_eq;

    fn counting(collection: &mut NoteCollection) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let observed = Arc::clone(&count);
        collection.set_on_change(move |_| {
            observed.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn add_then_list_contains_note_once() {
        let mut collection = NoteCollection::new();
        let note = Note::with_timestamp(100, "A", "a");
        collection.add(note.clone());
        assert_eq!(collection.list(), &[note]);
    }

    #[test]
    fn clear_empties_collection() {
        let mut collection = NoteCollection::new();
        collection.add(Note::with_timestamp(1, "A", "a"));
        collection.add(Note::with_timestamp(2, "B", "b"));
        collection.clear();
        assert!(collection.is_empty());
    }

    #[test]
    fn remove_takes_first_structural_match_only() {
        let mut collection = NoteCollection::new();
        let duplicate = Note::with_timestamp(5, "Dup", "d");
        collection.add(duplicate.clone());
        collection.add(Note::with_timestamp(6, "Other", "o"));
        collection.add(duplicate.clone());

        assert!(collection.remove(&duplicate));
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.list()[1], duplicate);
    }

    #[test]
    fn remove_missing_note_is_noop() {
        let mut collection = NoteCollection::new();
        collection.add(Note::with_timestamp(1, "A", "a"));
        assert!(!collection.remove(&Note::with_timestamp(1, "A", "changed")));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn every_mutation_notifies_exactly_once() {
        let mut collection = NoteCollection::new();
        let count = counting(&mut collection);
        let note = Note::with_timestamp(1, "A", "a");

        collection.add(note.clone());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        collection.remove(&note);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        collection.remove(&note);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        collection.clear();
        assert_eq!(count.load(Ordering::SeqCst), 4);
        collection.replace_all(vec![note.clone(), note]);
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn registering_observer_replaces_previous() {
        let mut collection = NoteCollection::new();
        let first = counting(&mut collection);
        let second = counting(&mut collection);

        collection.add(Note::with_timestamp(1, "A", "a"));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn observer_sees_post_mutation_contents() {
        let mut collection = NoteCollection::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        collection.set_on_change(move |notes| {
            sink.lock().unwrap().push(notes.len());
        });

        collection.add(Note::with_timestamp(1, "A", "a"));
        collection.add(Note::with_timestamp(2, "B", "b"));
        collection.clear();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 0]);
    }

    #[test]
    fn sorted_newest_first_does_not_reorder_storage() {
        let mut collection = NoteCollection::new();
        collection.add(Note::with_timestamp(100, "A", "a"));
        collection.add(Note::with_timestamp(200, "B", "b"));

        let sorted = collection.sorted_newest_first();
        assert_eq!(sorted[0].timestamp, 200);
        assert_eq!(collection.list()[0].timestamp, 100);
    }
}
