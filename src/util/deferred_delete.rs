//! Time-to-live queue for objects that should be destroyed after they have been unused for a number of frames.

#[derive(Debug)]
struct Item<T> {
    value: T,
    // Time to live
    ttl: u32,
}

#[derive(Debug)]
pub struct DeletionQueue<T> {
    max_ttl: u32,
    items: Vec<Item<T>>,
}

impl<T> DeletionQueue<T> {
    pub fn new(max_ttl: u32) -> DeletionQueue<T> {
        DeletionQueue {
            max_ttl,
            items: vec![],
        }
    }

    /// Pushes a value onto the deletion queue.
    /// Note that this moves out of the parameter so that you can't access an object after
    /// it is pushed.
    pub fn push(&mut self, value: T) {
        self.items.push(Item {
            value,
            ttl: self.max_ttl,
        });
    }

    /// Take back the best matching value before it expires. `score` returns `None` for values that cannot be used,
    /// and the value with the lowest score is returned.
    pub fn take_best<K: Ord>(&mut self, mut score: impl FnMut(&T) -> Option<K>) -> Option<T> {
        let index = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| score(&item.value).map(|key| (key, index)))
            .min_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, index)| index)?;
        Some(self.items.swap_remove(index).value)
    }

    /// Advance the frame counter by one, decreasing time to live by one on each element.
    /// Elements whose time to live reaches zero are returned so the caller can destroy them.
    pub fn next_frame(&mut self) -> Vec<T> {
        self.items.iter_mut().for_each(|item| item.ttl = item.ttl.saturating_sub(1));
        let (expired, alive): (Vec<_>, Vec<_>) = self.items.drain(..).partition(|item| item.ttl == 0);
        self.items = alive;
        expired.into_iter().map(|item| item.value).collect()
    }

    /// Remove every element, regardless of its time to live.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..).map(|item| item.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|item| &item.value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
