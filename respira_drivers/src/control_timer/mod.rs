// Implements the control tick timer (TIM2 update interrupt).

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use hal::{
    clocks::Clocks,
    pac::TIM2,
    timer::{
        Alignment, CaptureCompareDma, CountDir, Timer, TimerConfig, TimerInterrupt, UpdateReqSrc,
    },
};

pub struct ControlTimer {
    tim: Timer<TIM2>,
}

impl ControlTimer {
    pub fn new(tim2: TIM2, clock_cfg: &Clocks, freq: u16) -> Self {
        let mut timer = Timer::new_tim2(
            tim2,
            freq as f32,
            TimerConfig {
                one_pulse_mode: false,
                update_request_source: UpdateReqSrc::Any,
                auto_reload_preload: true,
                alignment: Alignment::Edge,
                capture_compare_dma: CaptureCompareDma::Update,
                direction: CountDir::Up,
            },
            clock_cfg,
        );
        timer.enable_interrupt(TimerInterrupt::Update);

        ControlTimer { tim: timer }
    }

    /// Starts ticking. Call once every peripheral is ready.
    pub fn begin(&mut self) {
        self.tim.enable();
    }

    /// Clears the update flag; call first in the interrupt handler.
    pub fn clear(&mut self) {
        self.tim.clear_interrupt(TimerInterrupt::Update);
    }
}
