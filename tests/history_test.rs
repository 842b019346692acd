use inpaint_tools::history::{History, HistorySnapshot, HistoryState};

fn snap(text: &str) -> HistorySnapshot {
    HistorySnapshot::from_serialized(text.to_string())
}

mod log_tests {
    use super::*;

    #[test]
    fn test_history_new() {
        let history = History::new();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 10);
        assert_eq!(history.state(), HistoryState::default());
    }

    #[test]
    fn test_push_and_undo_target() {
        let mut history = History::new();
        assert!(history.push(snap("a")));
        assert!(!history.can_undo());

        assert!(history.push(snap("b")));
        assert!(history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.undo_target(), Some(0));
    }

    #[test]
    fn test_identical_snapshot_is_skipped() {
        let mut history = History::new();
        history.push(snap("a"));
        assert!(!history.push(snap("a")));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_push_after_undo_drops_redo_branch() {
        let mut history = History::new();
        history.push(snap("a"));
        history.push(snap("b"));
        history.push(snap("c"));

        history.set_index(1);
        assert!(history.can_redo());

        history.push(snap("d"));
        assert!(!history.can_redo());
        assert_eq!(history.len(), 3);
        assert_eq!(history.current().map(|s| s.serialized()), Some("d"));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = History::with_capacity(3);
        for text in ["a", "b", "c", "d", "e"] {
            history.push(snap(text));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.get(0).map(|s| s.serialized()), Some("c"));
        assert_eq!(history.index(), Some(2));
    }

    #[test]
    fn test_locked_history_ignores_push() {
        let mut history = History::new();
        history.push(snap("a"));
        history.lock();
        assert!(!history.push(snap("b")));
        history.unlock();
        assert!(history.push(snap("b")));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_sequence_keeps_counting_after_eviction() {
        let mut history = History::with_capacity(2);
        for text in ["a", "b", "c"] {
            history.push(snap(text));
        }
        let sequences: Vec<u64> = (0..history.len())
            .filter_map(|i| history.get(i).map(|s| s.sequence()))
            .collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[test]
    fn test_clear() {
        let mut history = History::new();
        history.push(snap("a"));
        history.push(snap("b"));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.index(), None);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_corrupt_snapshot_fails_to_parse() {
        assert!(snap("{not json").document().is_err());
    }
}
