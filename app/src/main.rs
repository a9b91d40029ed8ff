#![no_main]
#![no_std]

// Emergency ventilator firmware.
//
// Key Features:
// - 100 Hz control tick on TIM2: sensors, pressure control, actuators, alarm outputs
// - Cycle boundaries (calibration, cycle alarms, pending commands) handled inside the tick
// - Operator buttons polled once per tick
// - Alarm transitions and cycle summaries reported over defmt from a low priority task

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use defmt_rtt as _;
use panic_probe as _;

use hal::{self, clocks::Clocks, pac};

use respira_algo::{
    config::CONTROL_PERIOD_US,
    sensors::{PressureFrontEnd, SupplyMonitor},
    AlarmController, ControllerSnapshot, PressureController, VentilatorConfig,
};

use cortex_m;

/// One control tick per centisecond
const CONTROL_FREQ_HZ: u16 = 100;
const MS_PER_TICK: u32 = 10;

/// Supply rail matching the ADC full scale (11:1 divider on 3.3 V)
const MAX_SUP_VLTG: i32 = 36300;
const SUPPLY_FILTER: u8 = 200;

#[rtic::app(device = pac, peripherals = true, dispatchers = [TIM7])]
mod app {
    use super::*;

    use respira_drivers::*;

    #[shared]
    struct Shared {
        alarms: AlarmController,
    }

    #[local]
    struct Local {
        timer: control_timer::ControlTimer,
        analog: analog::AnalogInputs,
        pressure: PressureFrontEnd,
        supply: SupplyMonitor,
        controller: PressureController,
        servos: servo::ServoBank,
        inspiratory: servo::ValveServo,
        expiratory: servo::ValveServo,
        blower: servo::BlowerEsc,
        panel: alarm_panel::AlarmPanel,
        buttons: buttons::Buttons,
        tick: u16,
        uptime: u32,
    }

    #[init]
    fn init(ctx: init::Context) -> (Shared, Local) {
        let dp = ctx.device;
        let clock_cfg = Clocks::default();
        clock_cfg.setup().unwrap();

        let sysclk_freq = clock_cfg.sysclk(); // System clock frequency in Hz
        defmt::debug!("SYSTEM: Clock frequency is {} MHz", sysclk_freq / 1000000);

        let mut controller = match PressureController::new(VentilatorConfig::default()) {
            Ok(controller) => controller,
            Err(err) => defmt::panic!("SYSTEM: {}", err),
        };
        controller.init_respiratory_cycle();

        let mut servos = servo::ServoBank::new(dp.TIM3, &clock_cfg);
        servos.begin();
        let inspiratory = servo::ValveServo::new();
        let expiratory = servo::ValveServo::new();
        let blower = servo::BlowerEsc::new();
        // Both valves closed, ESC armed at its minimum pulse
        servos.apply(&inspiratory, &expiratory, &blower);

        let buzzer = buzzer::Buzzer::new(dp.TIM4, &clock_cfg);
        let panel = alarm_panel::AlarmPanel::new(buzzer);

        let mut alarms = AlarmController::new();
        alarms.play_boot_beep();

        let analog = analog::AnalogInputs::new(dp.ADC1, &clock_cfg);

        let mut timer = control_timer::ControlTimer::new(dp.TIM2, &clock_cfg, CONTROL_FREQ_HZ);
        timer.begin();

        (
            Shared { alarms },
            Local {
                timer,
                analog,
                pressure: PressureFrontEnd::default(),
                supply: SupplyMonitor::new(SUPPLY_FILTER, MAX_SUP_VLTG),
                controller,
                servos,
                inspiratory,
                expiratory,
                blower,
                panel,
                buttons: buttons::Buttons::new(),
                tick: 0,
                uptime: 0,
            },
        )
    }

    #[task(binds = TIM2, priority = 2, shared = [alarms],
        local = [timer, analog, pressure, supply, controller, servos, inspiratory, expiratory,
            blower, panel, buttons, tick, uptime])]
    fn control_tick(mut cx: control_tick::Context) {
        // Clear the update interrupt flag
        cx.local.timer.clear();

        let ctrl = cx.local.controller;
        let tick = *cx.local.tick;
        let uptime = *cx.local.uptime;
        let now_ms = uptime.wrapping_mul(MS_PER_TICK);

        let raw = cx.local.analog.read_pressure();
        let pressure = cx.local.pressure.tick(Some(raw));
        cx.local.supply.tick(cx.local.analog.read_supply());

        ctrl.update_dt(CONTROL_PERIOD_US);
        ctrl.update_pressure(pressure);

        cx.shared.alarms.lock(|alarms| {
            cx.local.buttons.poll(|button| {
                defmt::debug!("BUTTON: {}", button);
                on_button(button, ctrl, alarms, now_ms);
            });

            ctrl.compute(tick, alarms);
            ctrl.execute_commands(cx.local.inspiratory, cx.local.expiratory, cx.local.blower);
            cx.local
                .servos
                .apply(cx.local.inspiratory, cx.local.expiratory, cx.local.blower);

            alarms.run_alarm_effects(uptime, now_ms, cx.local.panel);

            let next = tick + 1;
            if next >= ctrl.centi_sec_per_cycle() {
                cx.local.supply.check_alarms(ctrl.cycle_number(), alarms);
                ctrl.end_respiratory_cycle(alarms);
                report::spawn(ctrl.snapshot()).ok();
                ctrl.init_respiratory_cycle();
                *cx.local.tick = 0;
            } else {
                *cx.local.tick = next;
            }
        });

        *cx.local.uptime = uptime.wrapping_add(1);
    }

    fn on_button(
        button: buttons::Button,
        ctrl: &mut PressureController,
        alarms: &mut AlarmController,
        now_ms: u32,
    ) {
        use buttons::Button;

        match button {
            Button::PeakUp => ctrl.on_peak_pressure_increase(),
            Button::PeakDown => ctrl.on_peak_pressure_decrease(),
            Button::PlateauUp => ctrl.on_plateau_pressure_increase(),
            Button::PlateauDown => ctrl.on_plateau_pressure_decrease(),
            Button::PeepUp => ctrl.on_peep_increase(),
            Button::PeepDown => ctrl.on_peep_decrease(),
            Button::CycleUp => ctrl.on_cycle_increase(),
            Button::CycleDown => ctrl.on_cycle_decrease(),
            Button::Snooze => {
                if alarms.is_snoozed() {
                    alarms.unsnooze();
                } else {
                    alarms.snooze(now_ms);
                }
            }
            Button::StartStop => {
                if ctrl.is_running() {
                    ctrl.request_stop();
                } else {
                    ctrl.request_start();
                }
            }
        }
    }

    // Telemetry: end of cycle summary and queued alarm transitions
    #[task(priority = 1, shared = [alarms])]
    async fn report(mut cx: report::Context, snapshot: ControllerSnapshot) {
        defmt::info!(
            "CYCLE {}: peak {} plateau {} peep {} blower {}",
            snapshot.cycle,
            snapshot.peak_pressure,
            snapshot.plateau_pressure,
            snapshot.peep,
            snapshot.blower_speed
        );

        while let Some(event) = cx.shared.alarms.lock(|alarms| alarms.pop_event()) {
            defmt::info!("ALARM: {}", event);
        }
    }
}

#[defmt::panic_handler]
fn panic() -> ! {
    cortex_m::asm::udf()
}
