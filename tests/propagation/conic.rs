extern crate pretty_env_logger;

use crate::{apollo11_context, lunar_orbit_epoch};
use approx::assert_abs_diff_eq;
use rstest::*;
use rtcc::cosmic::{CoordinateSystem, StateVector};
use rtcc::propagators::{
    conic_propagate, time_to_apsis, time_to_radius, Crossing, PropModel, StopCondition,
};
use rtcc::time::Unit;
use rtcc::{ErrorKind, MissionContext};

#[fixture]
fn ctx() -> MissionContext {
    apollo11_context()
}

#[rstest]
#[case::parking_orbit(6_563.0, 0.001, 32.5)]
#[case::translunar(250_000.0, 0.97, 31.0)]
#[case::hyperbolic(-40_000.0, 1.2, 28.0)]
fn forward_then_backward(
    ctx: MissionContext,
    #[case] sma_km: f64,
    #[case] ecc: f64,
    #[case] inc_deg: f64,
) {
    let _ = pretty_env_logger::try_init();
    let gm = ctx.params.earth.gm_km3_s2;
    let state = StateVector::keplerian(
        sma_km,
        ecc,
        inc_deg,
        45.0,
        10.0,
        5.0,
        ctx.epoch_at_get_hours(3.0),
        CoordinateSystem::ECI,
        gm,
    );
    let max_it = ctx.params.solver.kepler_max_iterations;
    for dt in [
        17.0 * Unit::Second,
        45.0 * Unit::Minute,
        7.5 * Unit::Hour,
        -2.0 * Unit::Hour,
    ] {
        let there = conic_propagate(&state, dt, gm, max_it).unwrap();
        assert_eq!(there.epoch, state.epoch + dt);
        // Two body energy and angular momentum are conserved
        assert_abs_diff_eq!(
            there.energy_km2_s2(gm),
            state.energy_km2_s2(gm),
            epsilon = 1e-8
        );
        assert_abs_diff_eq!((there.hvec() - state.hvec()).norm(), 0.0, epsilon = 1e-5);

        let back = conic_propagate(&there, -dt, gm, max_it).unwrap();
        assert_eq!(back.epoch, state.epoch);
        assert_abs_diff_eq!(
            (back.radius_km - state.radius_km).norm(),
            0.0,
            epsilon = 1e-5
        );
        assert_abs_diff_eq!(
            (back.velocity_km_s - state.velocity_km_s).norm(),
            0.0,
            epsilon = 1e-8
        );
    }
}

#[rstest]
fn input_is_untouched_and_frame_is_inertial(ctx: MissionContext) {
    let state = StateVector::keplerian(
        1_849.0,
        0.01,
        1.25,
        0.0,
        0.0,
        0.0,
        lunar_orbit_epoch(),
        CoordinateSystem::MCI,
        ctx.params.moon.gm_km3_s2,
    );
    let fixed = ctx.convert(&state, CoordinateSystem::MCT).unwrap();
    let copy = fixed;
    let out = ctx
        .propagate(&fixed, 30.0 * Unit::Minute, PropModel::Conic)
        .unwrap();
    assert_eq!(fixed, copy);
    assert_eq!(out.frame, CoordinateSystem::MCI);
    let direct = ctx
        .propagate(&state, 30.0 * Unit::Minute, PropModel::Conic)
        .unwrap();
    assert_abs_diff_eq!(
        (out.radius_km - direct.radius_km).norm(),
        0.0,
        epsilon = 1e-8
    );
}

#[rstest]
fn apsides_and_radius_crossings(ctx: MissionContext) {
    let _ = pretty_env_logger::try_init();
    let gm = ctx.params.moon.gm_km3_s2;
    // 60 by 170 nautical miles lunar orbit, just past perilune
    let (rp, ra) = (1_738.09 + 111.12, 1_738.09 + 314.84);
    let sma = 0.5 * (rp + ra);
    let state = StateVector::keplerian(
        sma,
        (ra - rp) / (ra + rp),
        1.25,
        0.0,
        0.0,
        15.0,
        lunar_orbit_epoch(),
        CoordinateSystem::MCI,
        gm,
    );
    let max_it = ctx.params.solver.kepler_max_iterations;

    let to_apo = time_to_apsis(&state, true, gm).unwrap();
    let apo = conic_propagate(&state, to_apo * Unit::Second, gm, max_it).unwrap();
    assert_abs_diff_eq!(apo.rmag_km(), ra, epsilon = 1e-6);
    assert_abs_diff_eq!(apo.fpa_rad(), 0.0, epsilon = 1e-9);

    let to_peri = time_to_apsis(&state, false, gm).unwrap();
    assert!(to_peri > to_apo);

    let r = 1_738.09 + 200.0;
    let up = time_to_radius(&state, r, Crossing::Increasing, gm).unwrap();
    let down = time_to_radius(&state, r, Crossing::Decreasing, gm).unwrap();
    let any = time_to_radius(&state, r, Crossing::Any, gm).unwrap();
    assert!(up < to_apo && down > to_apo);
    assert_eq!(any, up);
    let climbing = conic_propagate(&state, up * Unit::Second, gm, max_it).unwrap();
    assert_abs_diff_eq!(climbing.rmag_km(), r, epsilon = 1e-6);
    assert!(climbing.radial_velocity_km_s() > 0.0);

    assert_eq!(
        time_to_radius(&state, ra + 10.0, Crossing::Any, gm)
            .unwrap_err()
            .kind(),
        ErrorKind::NoSolution
    );

    // Same thing through the stop conditions
    let stopped = ctx
        .propagate_until(
            &state,
            StopCondition::Radius {
                radius_km: r,
                crossing: Crossing::Decreasing,
            },
            3.0 * Unit::Hour,
            PropModel::Conic,
        )
        .unwrap();
    assert_abs_diff_eq!(stopped.rmag_km(), r, epsilon = 1e-6);
    assert!(stopped.radial_velocity_km_s() < 0.0);

    // The radius is reached after more than the allowed duration
    let err = ctx
        .propagate_until(
            &state,
            StopCondition::Radius {
                radius_km: r,
                crossing: Crossing::Decreasing,
            },
            10.0 * Unit::Minute,
            PropModel::Conic,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSolution);
}
