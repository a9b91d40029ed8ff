// Implements the piezo buzzer output (TIM4 CH1, 50% duty square wave).

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use hal::{
    clocks::Clocks,
    pac::TIM4,
    timer::{
        Alignment, CaptureCompareDma, CountDir, OutputCompare, TimChannel, Timer, TimerConfig,
        UpdateReqSrc,
    },
};

use respira_algo::Tone;

use super::pinout;

pub const TONE_LOW_HZ: f32 = 1000.0;
pub const TONE_HIGH_HZ: f32 = 2500.0;

pub struct Buzzer {
    tim: Timer<TIM4>,
}

impl Buzzer {
    pub fn new(tim4: TIM4, clock_cfg: &Clocks) -> Self {
        let mut timer = Timer::new_tim4(
            tim4,
            TONE_LOW_HZ,
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
        timer.enable_pwm_output(TimChannel::C1, OutputCompare::Pwm1, 0.0);
        timer.enable();
        pinout::alarm::BUZZER.init();

        Buzzer { tim: timer }
    }

    pub fn set_tone(&mut self, tone: Tone) {
        let freq = match tone {
            Tone::Off => {
                self.tim.set_duty(TimChannel::C1, 0);
                return;
            }
            Tone::Low => TONE_LOW_HZ,
            Tone::High => TONE_HIGH_HZ,
        };
        if self.tim.set_freq(freq).is_err() {
            defmt::error!("BUZZER: cannot set {} Hz", freq);
            self.tim.set_duty(TimChannel::C1, 0);
            return;
        }
        let half = self.tim.get_max_duty() / 2;
        self.tim.set_duty(TimChannel::C1, half);
    }
}
