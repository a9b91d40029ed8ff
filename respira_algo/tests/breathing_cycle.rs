mod common;

use common::{Bench, Lung};
use proptest::prelude::*;
use respira_algo::config::{PLATEAU_DEFAULT_MMH2O, PEEP_DEFAULT_MMH2O, PLATEAU_UNKNOWN};
use respira_algo::{CyclePhase, CycleSubPhase};

/// Rises to 600 mmH2O, then holds 580 +/- 5 from 85% to 100% of a 100 tick inhalation.
fn plateau_trace(tick: u16) -> i16 {
    match tick {
        0..=79 => ((tick as i32 + 1) * 600 / 80) as i16,
        80..=84 => 600,
        85..=99 => 580 + (tick % 11) as i16 - 5,
        _ => 60,
    }
}

#[test]
fn plateau_of_a_scripted_cycle() {
    let mut bench = Bench::new();
    assert_eq!(bench.ctrl.centi_sec_per_inhalation(), 100);

    for tick in 0..bench.ctrl.centi_sec_per_cycle() {
        bench.step(tick, plateau_trace(tick));
    }
    bench.ctrl.end_respiratory_cycle(&mut bench.alarms);

    let plateau = bench.ctrl.plateau_pressure();
    assert!((plateau - 580).abs() <= 5, "plateau {}", plateau);
    // Plateau far above its command: the peak command gets the coarse correction
    assert_eq!(bench.ctrl.commands().max_peak, 370);
}

#[test]
fn plateau_resets_at_cycle_start() {
    let mut bench = Bench::new();
    bench.run_cycle(plateau_trace);
    assert_eq!(bench.ctrl.plateau_pressure(), PLATEAU_UNKNOWN);
    assert_eq!(bench.ctrl.peak_pressure(), 0);

    // The completed cycle stays readable for the display
    let previous = bench.ctrl.previous_plateau_pressure();
    assert!((previous - 580).abs() <= 5, "plateau {}", previous);
    // The inspiration ends one tick before the trace crosses the peak command minus 1
    assert_eq!(bench.ctrl.previous_peak_pressure(), 397);
    assert_eq!(bench.ctrl.snapshot().previous_plateau_pressure, previous);
    assert_eq!(bench.ctrl.tick(), 0);
    assert_eq!(bench.ctrl.sub_phase(), CycleSubPhase::Inspiration);
}

#[test]
fn only_one_valve_driven_per_phase() {
    let mut bench = Bench::new();
    let inhalation = bench.ctrl.centi_sec_per_inhalation();
    for tick in 0..bench.ctrl.centi_sec_per_cycle() {
        bench.step(tick, plateau_trace(tick));
        let (inlet, outlet) = (
            bench.inspiratory.position.unwrap(),
            bench.expiratory.position.unwrap(),
        );
        if tick < inhalation {
            assert_eq!(outlet, common::CLOSED, "tick {}", tick);
        } else {
            assert_eq!(inlet, common::CLOSED, "tick {}", tick);
        }
    }
}

#[test]
fn closed_loop_converges_on_commands() {
    let mut bench = Bench::new();
    let mut lung = Lung::new(0.5, 0.2);
    common::breathe(&mut bench, &mut lung, 20);

    let plateau = bench.ctrl.plateau_pressure();
    let peep = bench.ctrl.peep();
    let band = PLATEAU_DEFAULT_MMH2O / 5;
    assert!((plateau - PLATEAU_DEFAULT_MMH2O).abs() <= band, "plateau {}", plateau);
    assert!((peep - PEEP_DEFAULT_MMH2O).abs() <= 20, "peep {}", peep);

    // The overshoot of the first cycles lowered the peak command
    assert!(bench.ctrl.commands().max_peak < 400);
    assert!(bench.alarms.triggered_alarms().iter().all(|slot| slot.is_none()));
}

#[test]
fn stop_then_restart_at_cycle_boundaries() {
    let mut bench = Bench::new();
    let mut lung = Lung::new(0.5, 0.2);
    common::breathe(&mut bench, &mut lung, 2);

    bench.ctrl.request_stop();
    // Honoured at the start of the next cycle only
    assert!(bench.ctrl.is_running());
    common::breathe(&mut bench, &mut lung, 1);
    assert!(!bench.ctrl.is_running());

    common::breathe(&mut bench, &mut lung, 1);
    assert_eq!(bench.inspiratory.position, Some(common::CLOSED));
    assert_eq!(bench.expiratory.position, Some(common::CLOSED));
    assert_eq!(bench.blower.speed, None);
    let stopped_cycles = bench.ctrl.cycle_number();

    // No cycle is counted while stopped
    common::breathe(&mut bench, &mut lung, 1);
    assert_eq!(bench.ctrl.cycle_number(), stopped_cycles);

    bench.ctrl.request_start();
    common::breathe(&mut bench, &mut lung, 1);
    assert!(bench.ctrl.is_running());
    assert_eq!(bench.ctrl.cycle_number(), stopped_cycles);

    common::breathe(&mut bench, &mut lung, 1);
    assert!(bench.blower.speed.is_some());
    assert_eq!(bench.ctrl.cycle_number(), stopped_cycles + 1);
}

proptest! {
    #[test]
    fn sub_phase_always_matches_phase(
        rate_steps in 0u16..20,
        faster in any::<bool>(),
        pressures in proptest::collection::vec(0i16..900, 1..64),
    ) {
        let mut bench = Bench::new();
        for _ in 0..rate_steps {
            if faster {
                bench.ctrl.on_cycle_increase();
            } else {
                bench.ctrl.on_cycle_decrease();
            }
        }
        bench.ctrl.init_respiratory_cycle();

        let mut sample = 0usize;
        for _ in 0..2 {
            let inhalation = bench.ctrl.centi_sec_per_inhalation();
            for tick in 0..bench.ctrl.centi_sec_per_cycle() {
                bench.step(tick, pressures[sample % pressures.len()]);
                sample += 1;

                let phase = bench.ctrl.phase();
                prop_assert_eq!(bench.ctrl.sub_phase().phase(), phase);
                prop_assert_eq!(phase == CyclePhase::Inhalation, tick < inhalation);
            }
            bench.next_cycle();
        }
    }
}
