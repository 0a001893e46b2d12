/// A single-occupancy holder for a watch resource.
///
/// The held value is expected to release its resources on drop. `replace`
/// drops the previous occupant before constructing the next one, so two
/// occupants never coexist.
pub struct WatchSlot<T> {
    active: Option<T>,
}

impl<T> WatchSlot<T> {
    pub fn new() -> Self {
        Self { active: None }
    }

    /// Empties the slot, then fills it with whatever `start` produces. If
    /// `start` returns `None` the slot stays empty.
    pub fn replace(&mut self, start: impl FnOnce() -> Option<T>) {
        self.clear();
        self.active = start();
    }

    /// Drops the current occupant, if any.
    pub fn clear(&mut self) {
        // Take first so the slot already reads as empty while the old value's
        // destructor runs.
        let previous = self.active.take();
        drop(previous);
    }

    pub fn get(&self) -> Option<&T> {
        self.active.as_ref()
    }

    pub fn is_occupied(&self) -> bool {
        self.active.is_some()
    }
}

impl<T> Default for WatchSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Tracked {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Tracked {
        fn new(name: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Self {
            log.borrow_mut().push(format!("start {name}"));
            Self {
                name,
                log: Rc::clone(log),
            }
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.log.borrow_mut().push(format!("stop {}", self.name));
        }
    }

    #[test]
    fn replace_stops_previous_before_starting_next() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut slot = WatchSlot::new();

        slot.replace(|| Some(Tracked::new("a", &log)));
        slot.replace(|| Some(Tracked::new("b", &log)));

        assert_eq!(slot.get().map(|t| t.name), Some("b"));
        assert_eq!(*log.borrow(), vec!["start a", "stop a", "start b"]);
    }

    #[test]
    fn failed_start_leaves_slot_empty() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut slot = WatchSlot::new();

        slot.replace(|| Some(Tracked::new("a", &log)));
        slot.replace(|| None);

        assert!(!slot.is_occupied());
        assert_eq!(*log.borrow(), vec!["start a", "stop a"]);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut slot: WatchSlot<u32> = WatchSlot::default();
        slot.clear();
        slot.clear();
        assert!(slot.get().is_none());
    }
}
