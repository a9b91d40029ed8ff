// Shared helpers of the integration tests: controller bench and a first order lung model.

#![allow(dead_code)]

use respira_algo::{
    AlarmCode, AlarmController, BlowerDriver, PressureController, ValveDriver, VentilatorConfig,
};

/// Control period used by the benches, in microseconds.
pub const DT_US: i32 = 10_000;

/// Servo position of a closed valve, as configured by default.
pub const CLOSED: u16 = respira_algo::config::VALVE_CLOSED_STATE;

#[derive(Default)]
pub struct ValveRecorder {
    pub position: Option<u16>,
}

impl ValveDriver for ValveRecorder {
    fn set_position(&mut self, position: u16) {
        self.position = Some(position);
    }
}

#[derive(Default)]
pub struct BlowerRecorder {
    pub speed: Option<u16>,
}

impl BlowerDriver for BlowerRecorder {
    fn run(&mut self, speed: u16) {
        self.speed = Some(speed);
    }

    fn stop(&mut self) {
        self.speed = None;
    }
}

/// Controller, alarm engine and actuator recorders wired like the firmware.
pub struct Bench {
    pub ctrl: PressureController,
    pub alarms: AlarmController,
    pub inspiratory: ValveRecorder,
    pub expiratory: ValveRecorder,
    pub blower: BlowerRecorder,
}

impl Bench {
    pub fn new() -> Self {
        Self::with_config(VentilatorConfig::default())
    }

    pub fn with_config(config: VentilatorConfig) -> Self {
        let mut ctrl = PressureController::new(config).expect("valid configuration");
        ctrl.init_respiratory_cycle();
        Self {
            ctrl,
            alarms: AlarmController::new(),
            inspiratory: ValveRecorder::default(),
            expiratory: ValveRecorder::default(),
            blower: BlowerRecorder::default(),
        }
    }

    /// One control tick with the given pressure.
    pub fn step(&mut self, tick: u16, pressure: i16) {
        self.ctrl.update_dt(DT_US);
        self.ctrl.update_pressure(pressure);
        self.ctrl.compute(tick, &mut self.alarms);
        self.ctrl.execute_commands(
            &mut self.inspiratory,
            &mut self.expiratory,
            &mut self.blower,
        );
    }

    /// Runs the remaining ticks of the cycle with a scripted pressure, then closes it and
    /// starts the next one.
    pub fn run_cycle(&mut self, mut trace: impl FnMut(u16) -> i16) {
        for tick in 0..self.ctrl.centi_sec_per_cycle() {
            self.step(tick, trace(tick));
        }
        self.next_cycle();
    }

    pub fn next_cycle(&mut self) {
        self.ctrl.end_respiratory_cycle(&mut self.alarms);
        self.ctrl.init_respiratory_cycle();
    }

    pub fn triggered(&self, code: AlarmCode) -> bool {
        self.alarms.triggered_alarms().contains(&Some(code))
    }
}

/// First order lung: the inlet fills from the blower, the outlet vents to the atmosphere.
pub struct Lung {
    pressure: f64,
    /// Source pressure per unit of blower speed
    blower_gain: f64,
    /// Fraction of the pressure gap closed per tick with a fully open valve
    conductance: f64,
}

impl Lung {
    pub fn new(blower_gain: f64, conductance: f64) -> Self {
        Self {
            pressure: 0.0,
            blower_gain,
            conductance,
        }
    }

    /// Pressure seen by the sensor, in mmH2O.
    pub fn pressure(&self) -> i16 {
        self.pressure as i16
    }

    /// Advances the model by one tick from the executed actuator positions.
    pub fn step(&mut self, inspiratory: u16, expiratory: u16, blower_speed: u16) {
        let inlet = (CLOSED - inspiratory.min(CLOSED)) as f64 / CLOSED as f64;
        let outlet = (CLOSED - expiratory.min(CLOSED)) as f64 / CLOSED as f64;
        let source = blower_speed as f64 * self.blower_gain;
        self.pressure += self.conductance * inlet * (source - self.pressure)
            - self.conductance * outlet * self.pressure;
        self.pressure = self.pressure.max(0.0);
    }
}

/// Runs `cycles` complete breathing cycles of the bench against the lung.
pub fn breathe(bench: &mut Bench, lung: &mut Lung, cycles: u32) {
    for _ in 0..cycles {
        for tick in 0..bench.ctrl.centi_sec_per_cycle() {
            bench.step(tick, lung.pressure());
            lung.step(
                bench.inspiratory.position.unwrap_or(CLOSED),
                bench.expiratory.position.unwrap_or(CLOSED),
                bench.blower.speed.unwrap_or(0),
            );
        }
        bench.next_cycle();
    }
}
