use std::cmp::Ordering;

/// Snapshots that are matched across frames by a string key
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Dense table of snapshot lists, one slot per integer frame
///
/// Invariant: `len() == end_time - start_time + 1` after [`FrameTable::init`].
#[derive(Debug, Clone)]
pub struct FrameTable<T> {
    start_time: i32,
    end_time: i32,
    table: Vec<Vec<T>>,
    ready: Vec<bool>,
    is_ready: bool,
}

impl<T> Default for FrameTable<T> {
    fn default() -> Self {
        Self {
            start_time: 0,
            end_time: 0,
            table: Vec::new(),
            ready: Vec::new(),
            is_ready: false,
        }
    }
}

impl<T> FrameTable<T> {
    /// Allocate empty, not ready slots for `start_time..=end_time`
    pub fn init(&mut self, start_time: i32, end_time: i32) {
        let num_frames = usize::try_from(i64::from(end_time) - i64::from(start_time) + 1).unwrap_or(0);

        self.start_time = start_time;
        self.end_time = end_time;
        self.table = std::iter::repeat_with(Vec::new).take(num_frames).collect();
        self.ready = vec![false; num_frames];
        self.is_ready = false;
    }

    pub fn start_time(&self) -> i32 {
        self.start_time
    }

    pub fn end_time(&self) -> i32 {
        self.end_time
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Slot for `time`, clamped to the first or last slot when out of range
    pub fn index_by_time(&self, time: i32) -> usize {
        let Some(last) = self.table.len().checked_sub(1) else {
            return 0;
        };

        let offset = i64::from(time) - i64::from(self.start_time);
        match offset.cmp(&0) {
            Ordering::Less | Ordering::Equal => 0,
            Ordering::Greater => usize::try_from(offset).map_or(last, |i| i.min(last)),
        }
    }

    pub fn frame(&self, index: usize) -> &[T] {
        &self.table[index]
    }

    /// Replace the snapshots of slot `index`
    ///
    /// The slot is not marked ready; call [`FrameTable::mark_ready`] or
    /// [`FrameTable::make_all_ready`] once loading is done.
    pub fn set_frame(&mut self, index: usize, snapshots: Vec<T>) {
        self.table[index] = snapshots;
    }

    pub fn mark_ready(&mut self, index: usize) {
        self.ready[index] = true;
    }

    pub fn is_frame_ready(&self, index: usize) -> bool {
        self.ready.get(index).copied().unwrap_or(false)
    }

    /// Whether every slot has been marked ready; memoized once true
    pub fn all_ready(&mut self) -> bool {
        if !self.is_ready {
            self.is_ready = !self.ready.is_empty() && self.ready.iter().all(|&r| r);
        }
        self.is_ready
    }

    pub fn make_all_ready(&mut self) {
        self.ready.fill(true);
    }

    /// Floor and ceil frames around `time` plus the blend ratio between them
    ///
    /// Returns `None` when the table is empty or either frame is not ready.
    pub fn bracket(&self, time: f32) -> Option<(&[T], &[T], f32)> {
        if self.ready.is_empty() {
            return None;
        }

        let floor = time.floor();
        let base = self.index_by_time(floor as i32);
        let end = self.index_by_time(time.ceil() as i32);
        if !self.ready[base] || !self.ready[end] {
            return None;
        }

        Some((&self.table[base], &self.table[end], time - floor))
    }
}

/// Pair each base snapshot with the end snapshot of the same key
///
/// Snapshots usually sit at the same position in both frames; when they do
/// not, the end frame is searched by key, and a key missing from the end
/// frame pairs with itself.
pub(crate) fn pair_by_key<'a, T: Keyed>(
    base: &'a [T],
    end: &'a [T],
) -> impl Iterator<Item = (&'a T, &'a T)> + 'a {
    base.iter().enumerate().map(move |(i, b)| {
        let e = end
            .get(i)
            .filter(|e| e.key() == b.key())
            .or_else(|| end.iter().find(|e| e.key() == b.key()))
            .unwrap_or(b);
        (b, e)
    })
}
