/// Full scale of the 12-bit converters used by the sensor front-ends.
pub const ADC_FULL_SCALE: i32 = 4095;

/// Converts a raw 12-bit ADC sample to millivolts, milliamps, etc.
///
/// # Arguments
/// * `raw` - The right aligned ADC sample [u16]
/// * `full_scale` - The value matching the converter full scale (only positive range) [i32]
///
/// # Returns
/// The value in millivolts, milliamps, etc. [i32]
pub const fn adc_to_value(raw: u16, full_scale: i32) -> i32 {
    let raw = if raw as i32 > ADC_FULL_SCALE {
        ADC_FULL_SCALE
    } else {
        raw as i32
    };
    ((raw as i64 * full_scale as i64) / ADC_FULL_SCALE as i64) as i32
}

/// Affine mapping of a bounded input range onto an output range.
///
/// The output range may be inverted (`out_start > out_end`), which is how a positive
/// command is turned into a smaller servo position. Inputs are clamped to the input range,
/// so the output always lies between `out_start` and `out_end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AffineMap {
    in_start: i32,
    in_end: i32,
    out_start: i32,
    out_end: i32,
}

impl AffineMap {
    /// `in_start` must differ from `in_end`.
    pub const fn new(in_start: i32, in_end: i32, out_start: i32, out_end: i32) -> Self {
        Self {
            in_start,
            in_end,
            out_start,
            out_end,
        }
    }

    pub fn apply(&self, value: i32) -> i32 {
        let (lo, hi) = if self.in_start < self.in_end {
            (self.in_start, self.in_end)
        } else {
            (self.in_end, self.in_start)
        };
        let span = self.in_end as i64 - self.in_start as i64;
        if span == 0 {
            return self.out_start;
        }
        let value = value.clamp(lo, hi);
        let out_span = self.out_end as i64 - self.out_start as i64;
        let travel = value as i64 - self.in_start as i64;
        // |offset| <= |out_span|: the result stays within the output range
        let offset = (out_span as i128 * travel as i128) / span as i128;
        (self.out_start as i64 + offset as i64) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adc_scales_to_full_range() {
        assert_eq!(adc_to_value(0, 3300), 0);
        assert_eq!(adc_to_value(4095, 3300), 3300);
        assert_eq!(adc_to_value(u16::MAX, 3300), 3300);
    }

    #[test]
    fn inverted_output_range() {
        let map = AffineMap::new(0, 1000, 125, 0);
        assert_eq!(map.apply(0), 125);
        assert_eq!(map.apply(1000), 0);
        assert_eq!(map.apply(500), 63);
        assert_eq!(map.apply(-20), 125);
        assert_eq!(map.apply(5000), 0);
    }

    #[test]
    fn full_width_ranges_do_not_overflow() {
        let map = AffineMap::new(i32::MIN, i32::MAX, 125, 0);
        assert_eq!(map.apply(i32::MIN), 125);
        assert_eq!(map.apply(i32::MAX), 0);
        let wide = AffineMap::new(0, 1000, i32::MIN, i32::MAX);
        assert_eq!(wide.apply(0), i32::MIN);
        assert_eq!(wide.apply(1000), i32::MAX);
    }

    #[test]
    fn negative_input_range() {
        let map = AffineMap::new(-1000, 0, 0, 125);
        assert_eq!(map.apply(-1000), 0);
        assert_eq!(map.apply(0), 125);
        assert_eq!(map.apply(200), 125);
    }
}
