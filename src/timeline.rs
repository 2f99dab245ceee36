use std::collections::HashSet;

use crate::models::{Message, MessageId};

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.ids.contains(&id)
    }

    pub fn oldest(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn newest(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.ids.clear();
    }

    /// Merges an older history page in front of the current messages.
    /// Returns how many messages were new.
    pub fn prepend_history(&mut self, batch: Vec<Message>) -> usize {
        let fresh = self.fresh(batch);
        let added = fresh.len();
        if added > 0 {
            let existing = std::mem::take(&mut self.messages);
            self.messages = fresh;
            self.messages.extend(existing);
            sort_by_timestamp(&mut self.messages);
        }
        added
    }

    /// Inserts a message pushed by the live channel. Redelivery of an id
    /// already in the timeline is a no-op.
    pub fn ingest_live(&mut self, message: Message) -> bool {
        if !self.ids.insert(message.id) {
            return false;
        }
        self.messages.push(message);
        sort_by_timestamp(&mut self.messages);
        true
    }

    /// Drops ids already present (and repeats inside the batch itself) and
    /// sorts what is left oldest first.
    fn fresh(&mut self, batch: Vec<Message>) -> Vec<Message> {
        let mut fresh: Vec<Message> = batch
            .into_iter()
            .filter(|message| self.ids.insert(message.id))
            .collect();
        sort_by_timestamp(&mut fresh);
        fresh
    }
}

fn sort_by_timestamp(messages: &mut [Message]) {
    messages.sort_by_key(|message| message.timestamp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{ids, message};

    #[test]
    fn history_is_sorted_before_prepending() {
        let mut timeline = Timeline::new();
        // transport order is newest first
        timeline.prepend_history(vec![message(2, 1, 20), message(1, 1, 10)]);
        assert_eq!(ids(timeline.messages()), vec![1, 2]);

        let added = timeline.prepend_history(vec![message(0, 1, 0)]);
        assert_eq!(added, 1);
        assert_eq!(ids(timeline.messages()), vec![0, 1, 2]);
        assert_eq!(timeline.oldest().map(|m| m.id), Some(0));
        assert_eq!(timeline.newest().map(|m| m.id), Some(2));
    }

    #[test]
    fn overlapping_history_keeps_existing_copy() {
        let mut timeline = Timeline::new();
        timeline.prepend_history(vec![message(1, 1, 10), message(2, 1, 20)]);

        let mut edited = message(2, 1, 20);
        edited.content = "edited elsewhere".to_string();
        let added = timeline.prepend_history(vec![edited, message(0, 1, 5)]);

        assert_eq!(added, 1);
        assert_eq!(ids(timeline.messages()), vec![0, 1, 2]);
        assert_eq!(timeline.messages()[2].content, "message 2");
    }

    #[test]
    fn duplicate_ids_within_one_batch_collapse() {
        let mut timeline = Timeline::new();
        let added = timeline.prepend_history(vec![message(3, 1, 3), message(3, 1, 3)]);
        assert_eq!(added, 1);
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn live_redelivery_is_idempotent() {
        let mut timeline = Timeline::new();
        timeline.prepend_history(vec![message(1, 1, 10), message(2, 1, 20)]);

        assert!(timeline.ingest_live(message(5, 1, 30)));
        assert!(!timeline.ingest_live(message(5, 1, 30)));
        assert_eq!(ids(timeline.messages()), vec![1, 2, 5]);
    }

    #[test]
    fn skewed_live_message_lands_in_timestamp_order() {
        let mut timeline = Timeline::new();
        timeline.prepend_history(vec![message(1, 1, 10), message(2, 1, 20)]);

        timeline.ingest_live(message(9, 1, 15));
        assert_eq!(ids(timeline.messages()), vec![1, 9, 2]);
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let mut timeline = Timeline::new();
        timeline.ingest_live(message(7, 1, 10));
        timeline.ingest_live(message(3, 1, 10));
        assert_eq!(ids(timeline.messages()), vec![7, 3]);
    }

    #[test]
    fn history_after_live_does_not_duplicate() {
        let mut timeline = Timeline::new();
        timeline.ingest_live(message(5, 1, 30));

        let added = timeline.prepend_history(vec![message(5, 1, 30), message(4, 1, 25)]);
        assert_eq!(added, 1);
        assert_eq!(ids(timeline.messages()), vec![4, 5]);
    }

    fn permutations(n: usize) -> Vec<Vec<usize>> {
        if n == 0 {
            return vec![Vec::new()];
        }
        let mut out = Vec::new();
        for perm in permutations(n - 1) {
            for slot in 0..=perm.len() {
                let mut next = perm.clone();
                next.insert(slot, n - 1);
                out.push(next);
            }
        }
        out
    }

    #[test]
    fn every_interleaving_yields_the_same_timeline() {
        enum Op {
            History(Vec<Message>),
            Live(Message),
        }

        let ops = || {
            vec![
                Op::History(vec![message(2, 1, 20), message(1, 1, 10)]),
                Op::History(vec![message(0, 1, 0), message(1, 1, 10)]),
                Op::Live(message(5, 1, 30)),
                Op::Live(message(5, 1, 30)),
                Op::Live(message(2, 1, 20)),
            ]
        };

        for order in permutations(5) {
            let mut pending: Vec<Option<Op>> = ops().into_iter().map(Some).collect();
            let mut timeline = Timeline::new();
            for index in order {
                match pending[index].take() {
                    Some(Op::History(batch)) => {
                        timeline.prepend_history(batch);
                    }
                    Some(Op::Live(message)) => {
                        timeline.ingest_live(message);
                    }
                    None => unreachable!(),
                }
            }
            assert_eq!(ids(timeline.messages()), vec![0, 1, 2, 5]);
        }
    }
}
