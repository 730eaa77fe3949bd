extern crate pretty_env_logger;

use crate::{apollo11_liftoff, lunar_orbit_epoch};
use approx::assert_abs_diff_eq;
use rtcc::cosmic::ephem::{AnalyticEphemeris, TabulatedEphemeris};
use rtcc::cosmic::{CoordinateSystem, StateVector};
use rtcc::io::SystemParameters;
use rtcc::propagators::{Crossing, PropModel, StopCondition};
use rtcc::time::Unit;
use rtcc::{ErrorKind, MissionContext};
use std::sync::Arc;

fn parking_orbit(params: &SystemParameters) -> StateVector {
    StateVector::keplerian(
        params.earth.radius_km + 185.2,
        0.0005,
        32.52,
        358.4,
        20.0,
        0.0,
        apollo11_liftoff() + 12.0 * Unit::Minute,
        CoordinateSystem::ECI,
        params.earth.gm_km3_s2,
    )
}

#[test]
fn out_of_ephemeris_range() {
    let _ = pretty_env_logger::try_init();
    let t0 = apollo11_liftoff();
    let ctx = MissionContext::new(
        Arc::new(AnalyticEphemeris::bounded(t0, t0 + 1.0 * Unit::Hour)),
        SystemParameters::default(),
        t0,
    );
    let state = parking_orbit(&ctx.params);

    // Within the ephemeris span
    assert!(ctx
        .propagate(&state, 30.0 * Unit::Minute, PropModel::Precision)
        .is_ok());
    // The conic model never needs the ephemeris for an Earth orbit
    assert!(ctx
        .propagate(&state, 3.0 * Unit::Hour, PropModel::Conic)
        .is_ok());

    let err = ctx
        .propagate(&state, 3.0 * Unit::Hour, PropModel::Precision)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
}

#[test]
fn tabulated_ephemeris_coast() {
    let _ = pretty_env_logger::try_init();
    let t0 = apollo11_liftoff();
    let analytic = MissionContext::analytic(t0);
    let table = TabulatedEphemeris::sample(
        &AnalyticEphemeris::new(),
        t0 - 1.0 * Unit::Day,
        t0 + 1.5 * Unit::Day,
        6.0 * Unit::Hour,
    )
    .unwrap();
    let tabulated = MissionContext::new(Arc::new(table), SystemParameters::default(), t0);

    let state = parking_orbit(&analytic.params);
    let a = analytic
        .propagate(&state, 3.0 * Unit::Hour, PropModel::Precision)
        .unwrap();
    let b = tabulated
        .propagate(&state, 3.0 * Unit::Hour, PropModel::Precision)
        .unwrap();
    // Third body perturbations in low Earth orbit are tiny: the ephemeris source barely matters
    assert_abs_diff_eq!((a.radius_km - b.radius_km).norm(), 0.0, epsilon = 1e-3);

    let err = tabulated
        .propagate(&state, 2.0 * Unit::Day, PropModel::Precision)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
}

#[test]
fn precision_close_to_conic_over_one_revolution() {
    let _ = pretty_env_logger::try_init();
    let ctx = MissionContext::analytic(apollo11_liftoff());
    let gm = ctx.params.moon.gm_km3_s2;
    let state = StateVector::keplerian(
        1_849.0,
        0.003,
        1.25,
        0.0,
        0.0,
        0.0,
        lunar_orbit_epoch(),
        CoordinateSystem::MCI,
        gm,
    );
    let period = state.period(gm).unwrap();
    let precise = ctx
        .propagate(&state, period, PropModel::Precision)
        .unwrap();
    let conic = ctx.propagate(&state, period, PropModel::Conic).unwrap();
    assert_eq!(precise.frame, CoordinateSystem::MCI);
    assert_eq!(precise.epoch, conic.epoch);
    let drift = (precise.radius_km - conic.radius_km).norm();
    // Lunar J2 and the Earth pull the vehicle by a few kilometers per revolution
    assert!(drift > 1e-3 && drift < 50.0, "{drift}");
}

#[test]
fn precision_stop_conditions() {
    let _ = pretty_env_logger::try_init();
    let ctx = MissionContext::analytic(apollo11_liftoff());
    let params = &ctx.params;
    // Deorbit-like trajectory: perigee well below the entry interface
    let state = StateVector::keplerian(
        params.earth.radius_km + 0.5 * (185.0 + 20.0),
        165.0 / (2.0 * params.earth.radius_km + 205.0),
        32.5,
        0.0,
        0.0,
        180.0,
        apollo11_liftoff() + 2.0 * Unit::Hour,
        CoordinateSystem::ECI,
        params.earth.gm_km3_s2,
    );
    let ei_radius = params.earth.radius_km + rtcc::cosmic::ENTRY_INTERFACE_ALTITUDE_KM;
    let ei = ctx
        .propagate_until(
            &state,
            StopCondition::Radius {
                radius_km: ei_radius,
                crossing: Crossing::Decreasing,
            },
            2.0 * Unit::Hour,
            PropModel::Precision,
        )
        .unwrap();
    assert_abs_diff_eq!(
        ei.rmag_km(),
        ei_radius,
        epsilon = params.solver.radius_tolerance_km
    );
    assert!(ei.fpa_rad() < 0.0);

    let fpa = (-0.5_f64).to_radians();
    let steep = ctx
        .propagate_until(
            &state,
            StopCondition::FlightPathAngle { fpa_rad: fpa },
            2.0 * Unit::Hour,
            PropModel::Precision,
        )
        .unwrap();
    assert_abs_diff_eq!(steep.fpa_rad(), fpa, epsilon = 1e-7);
    assert!(steep.epoch < ei.epoch);
}

#[test]
fn stop_conditions_out_of_reach() {
    let _ = pretty_env_logger::try_init();
    let ctx = MissionContext::analytic(apollo11_liftoff());
    let params = &ctx.params;
    let parking = parking_orbit(params);
    let ei_radius = params.earth.radius_km + rtcc::cosmic::ENTRY_INTERFACE_ALTITUDE_KM;

    // The parking orbit never dips to the entry interface
    let err = ctx
        .propagate_until(
            &parking,
            StopCondition::Radius {
                radius_km: ei_radius,
                crossing: Crossing::Decreasing,
            },
            2.0 * Unit::Hour,
            PropModel::Precision,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSolution);

    // Nor does its flight-path angle come anywhere near five degrees
    let err = ctx
        .propagate_until(
            &parking,
            StopCondition::FlightPathAngle {
                fpa_rad: (-5.0_f64).to_radians(),
            },
            2.0 * Unit::Hour,
            PropModel::Precision,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSolution);

    // Reachable, but only after the allowed duration
    let deorbit = StateVector::keplerian(
        params.earth.radius_km + 0.5 * (185.0 + 20.0),
        165.0 / (2.0 * params.earth.radius_km + 205.0),
        32.5,
        0.0,
        0.0,
        180.0,
        apollo11_liftoff() + 2.0 * Unit::Hour,
        CoordinateSystem::ECI,
        params.earth.gm_km3_s2,
    );
    let err = ctx
        .propagate_until(
            &deorbit,
            StopCondition::FlightPathAngle {
                fpa_rad: (-0.5_f64).to_radians(),
            },
            1.0 * Unit::Minute,
            PropModel::Precision,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSolution);
}

#[test]
fn stop_condition_past_ephemeris_end() {
    let _ = pretty_env_logger::try_init();
    let t0 = apollo11_liftoff();
    let start = t0 + 2.0 * Unit::Hour;
    let ctx = MissionContext::new(
        Arc::new(AnalyticEphemeris::bounded(t0, start + 5.0 * Unit::Minute)),
        SystemParameters::default(),
        t0,
    );
    let params = &ctx.params;
    let deorbit = StateVector::keplerian(
        params.earth.radius_km + 0.5 * (185.0 + 20.0),
        165.0 / (2.0 * params.earth.radius_km + 205.0),
        32.5,
        0.0,
        0.0,
        180.0,
        start,
        CoordinateSystem::ECI,
        params.earth.gm_km3_s2,
    );
    let ei = StopCondition::Radius {
        radius_km: params.earth.radius_km + rtcc::cosmic::ENTRY_INTERFACE_ALTITUDE_KM,
        crossing: Crossing::Decreasing,
    };

    // The entry interface is a conic solution, well past the ephemeris span
    assert!(ctx
        .propagate_until(&deorbit, ei, 2.0 * Unit::Hour, PropModel::Conic)
        .is_ok());

    let err = ctx
        .propagate_until(&deorbit, ei, 2.0 * Unit::Hour, PropModel::Precision)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
}
