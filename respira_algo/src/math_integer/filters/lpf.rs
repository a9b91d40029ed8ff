// Integer low-pass filter used by the sensor front-ends.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

/// First order low-pass filter on signed 16-bit samples.
///
/// `alpha` weights the previous output: 0 passes the input through, 255 almost freezes it.
pub struct FilterLPF {
    alpha: i32, // Filter coefficient (0..255 = 0.0..1.0)
    temp: i32, // Stores scaled filtered value
}

impl FilterLPF {
    /// Constructor to initialize the filter with the input and alpha
    pub fn new(input_default: i16, alpha: u8) -> FilterLPF {
        FilterLPF {
            alpha: alpha as i32,
            temp: (input_default as i32) << 8,
        }
    }

    /// Math call
    pub fn tick(&mut self, input: i16) -> i16 {
        // Work with 8 extra bits of resolution so slow inputs still converge
        let current: i32 = (input as i32) << 8;

        // filtered = alpha * (prev - input) / 256 + input
        let diff: i32 = self.temp - current;
        self.temp = ((diff as i64 * self.alpha as i64) >> 8) as i32 + current;

        // Round to nearest when scaling back
        ((self.temp + 128) >> 8) as i16
    }

    /// Restarts the filter from a known value
    pub fn reset(&mut self, value: i16) {
        self.temp = (value as i32) << 8;
    }
}
