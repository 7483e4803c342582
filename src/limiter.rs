use serde::Serialize;

pub const DEFAULT_RESULT_LIMIT: usize = 5000;
pub const DEFAULT_LOAD_MORE_STEP: usize = 2500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitedResult<T> {
    pub visible: Vec<T>,
    pub truncated: bool,
    pub total_count: usize,
}

/// First `cap` items of an already-ordered sequence.
pub fn limit<T>(mut items: Vec<T>, cap: usize) -> LimitedResult<T> {
    let total_count = items.len();
    items.truncate(cap);
    LimitedResult {
        visible: items,
        truncated: total_count > cap,
        total_count,
    }
}

/// How many results the caller currently wants to see. Holds no records;
/// after `load_more` the caller re-runs the same criteria with the new cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultWindow {
    pub cap: usize,
    pub step: usize,
}

impl Default for ResultWindow {
    fn default() -> Self {
        Self::new(DEFAULT_RESULT_LIMIT, DEFAULT_LOAD_MORE_STEP)
    }
}

impl ResultWindow {
    pub fn new(cap: usize, step: usize) -> Self {
        Self { cap, step }
    }

    pub fn load_more(&mut self) -> usize {
        self.cap = self.cap.saturating_add(self.step);
        self.cap
    }

    pub fn apply<T>(&self, items: Vec<T>) -> LimitedResult<T> {
        limit(items, self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_keeps_prefix() {
        let r = limit((1..=10).collect(), 3);
        assert_eq!(r.visible, vec![1, 2, 3]);
        assert!(r.truncated);
        assert_eq!(r.total_count, 10);
    }

    #[test]
    fn test_limit_at_exact_cap_is_not_truncated() {
        let r = limit(vec!['a', 'b'], 2);
        assert_eq!(r.visible.len(), 2);
        assert!(!r.truncated);
        let r = limit(Vec::<u8>::new(), 0);
        assert!(!r.truncated);
        assert_eq!(r.total_count, 0);
    }

    #[test]
    fn test_load_more_raises_cap_by_step() {
        let mut w = ResultWindow::default();
        assert_eq!(w.cap, 5000);
        assert_eq!(w.load_more(), 7500);
        let r = w.apply((0..8000).collect::<Vec<u32>>());
        assert_eq!(r.visible.len(), 7500);
        assert_eq!(r.visible[7499], 7499);
        assert!(r.truncated);
        w.load_more();
        assert!(!w.apply((0..8000).collect::<Vec<u32>>()).truncated);
    }
}
