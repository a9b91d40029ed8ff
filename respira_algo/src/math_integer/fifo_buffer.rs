// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

/// Fixed size ring buffer keeping the last `N` written values.
pub struct BufferFIFO<T, const N: usize> {
    buffer: [T; N],

    idx: usize,
    len: usize,
}

impl<T, const N: usize> BufferFIFO<T, N>
where
    T: Default + Copy,
{
    pub fn new() -> Self {
        Self {
            buffer: [T::default(); N],
            idx: 0,
            len: 0,
        }
    }

    /// Overwrites the oldest value.
    pub fn write(&mut self, value: T) {
        self.buffer[self.idx] = value;
        self.idx = (self.idx + 1) % N;
        if self.len < N {
            self.len += 1;
        }
    }

    /// Forgets every stored value.
    pub fn clear(&mut self) {
        self.buffer = [T::default(); N];
        self.idx = 0;
        self.len = 0;
    }

    /// Oldest stored value, if any.
    pub fn read(&self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        Some(self.buffer[(self.idx + N - self.len) % N])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Iterates from the oldest to the newest stored value.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let start = (self.idx + N - self.len) % N;
        (0..self.len).map(move |i| self.buffer[(start + i) % N])
    }
}

impl<T, const N: usize> Default for BufferFIFO<T, N>
where
    T: Default + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Spread and mean of a window of samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowStats {
    pub min: i16,
    pub max: i16,
    pub mean: i16,
}

impl WindowStats {
    #[inline]
    pub fn spread(&self) -> i16 {
        self.max.saturating_sub(self.min)
    }
}

impl<const N: usize> BufferFIFO<i16, N> {
    /// Statistics of the window, available once it has been filled completely.
    pub fn stats(&self) -> Option<WindowStats> {
        if !self.is_full() {
            return None;
        }
        let mut min = i16::MAX;
        let mut max = i16::MIN;
        let mut sum: i32 = 0;
        for value in self.iter() {
            min = min.min(value);
            max = max.max(value);
            sum += value as i32;
        }
        Some(WindowStats {
            min,
            max,
            mean: (sum / N as i32) as i16,
        })
    }
}
