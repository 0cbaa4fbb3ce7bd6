use image::RgbaImage;

use crate::core::constants::IMAGE_POOL_CAPACITY;

/// A reusable slot for one decoded tile image.
///
/// Handles are moved, never cloned: a handle lives either in exactly one tile
/// or in the pool.
#[derive(Debug)]
pub struct ImageHandle {
    id: u64,
    cross_origin: bool,
    src: Option<String>,
    image: Option<RgbaImage>,
}

impl ImageHandle {
    fn new(id: u64) -> Self {
        Self {
            id,
            cross_origin: true,
            src: None,
            image: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Requests for this handle are made in anonymous cross-origin mode
    pub fn cross_origin(&self) -> bool {
        self.cross_origin
    }

    pub fn src(&self) -> Option<&str> {
        self.src.as_deref()
    }

    pub fn set_src(&mut self, src: impl Into<String>) {
        self.src = Some(src.into());
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    pub fn set_image(&mut self, image: RgbaImage) {
        self.image = Some(image);
    }

    pub fn is_decoded(&self) -> bool {
        self.image.is_some()
    }

    /// Pixel size of the decoded image, if any
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|image| image.dimensions())
    }

    fn reset(&mut self) {
        self.src = None;
        self.image = None;
    }
}

/// Recycles image handles between evicted and newly created tiles.
///
/// The pool holds at most `capacity` idle handles (50 by default); handles
/// pushed beyond that are dropped and their pixel buffers freed.
#[derive(Debug)]
pub struct ImagePool {
    idle: Vec<ImageHandle>,
    capacity: usize,
    next_id: u64,
}

impl Default for ImagePool {
    fn default() -> Self {
        Self::new()
    }
}

impl ImagePool {
    pub fn new() -> Self {
        Self::with_capacity(IMAGE_POOL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            idle: Vec::with_capacity(capacity),
            capacity,
            next_id: 0,
        }
    }

    /// Takes an idle handle, or allocates a fresh one when none is idle.
    pub fn pop(&mut self) -> ImageHandle {
        match self.idle.pop() {
            Some(handle) => handle,
            None => {
                let handle = ImageHandle::new(self.next_id);
                self.next_id += 1;
                handle
            }
        }
    }

    /// Returns a handle to the pool. Returns `false` if the pool was full and
    /// the handle was dropped.
    pub fn push(&mut self, mut handle: ImageHandle) -> bool {
        if self.idle.len() >= self.capacity {
            return false;
        }
        handle.reset();
        self.idle.push(handle);
        true
    }

    /// Returns several handles, checking the cap for each. Returns how many were kept.
    pub fn push_all(&mut self, handles: impl IntoIterator<Item = ImageHandle>) -> usize {
        handles.into_iter().map(|handle| self.push(handle)).filter(|kept| *kept).count()
    }

    pub fn len(&self) -> usize {
        self.idle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idle.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether a handle with this id is currently idle in the pool
    pub fn contains(&self, id: u64) -> bool {
        self.idle.iter().any(|handle| handle.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_allocates_distinct_handles() {
        let mut pool = ImagePool::new();
        let a = pool.pop();
        let b = pool.pop();
        assert_ne!(a.id(), b.id());
        assert!(a.cross_origin());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_push_then_pop_recycles() {
        let mut pool = ImagePool::new();
        let mut handle = pool.pop();
        handle.set_src("http://t/0/0/0.png");
        handle.set_image(RgbaImage::new(2, 2));
        let id = handle.id();

        assert!(pool.push(handle));
        assert!(pool.contains(id));
        let recycled = pool.pop();
        assert_eq!(recycled.id(), id);
        assert!(recycled.src().is_none());
        assert!(!recycled.is_decoded());
    }

    #[test]
    fn test_pool_cap() {
        let mut pool = ImagePool::new();
        let handles: Vec<_> = (0..60).map(|_| pool.pop()).collect();
        assert_eq!(pool.push_all(handles), 50);
        assert_eq!(pool.len(), 50);

        let mut popped = 0;
        while !pool.is_empty() {
            pool.pop();
            popped += 1;
        }
        assert_eq!(popped, 50);
    }

    #[test]
    fn test_push_into_full_pool_drops() {
        let mut pool = ImagePool::with_capacity(1);
        let a = pool.pop();
        let b = pool.pop();
        assert!(pool.push(a));
        assert!(!pool.push(b));
        assert_eq!(pool.len(), 1);
    }
}
