extern crate pretty_env_logger;

use crate::apollo11_context;
use approx::assert_abs_diff_eq;
use rstest::*;
use rtcc::cosmic::{subsatellite_point, CoordinateSystem, StateVector};
use rtcc::ephemeris::{
    interpolate, longitude_crossing, EphemerisTable, LongitudeSearch, ManeuverWindow, MAX_ORDER,
};
use rtcc::propagators::{generate_ephemeris, PropModel};
use rtcc::time::{Duration, Unit};
use rtcc::{ErrorKind, MissionContext};

#[fixture]
fn ctx() -> MissionContext {
    apollo11_context()
}

/// Earth parking orbit, 100 nautical miles high
fn parking_orbit(ctx: &MissionContext) -> StateVector {
    StateVector::keplerian(
        ctx.params.earth.radius_km + 185.2,
        0.0005,
        32.52,
        358.4,
        20.0,
        0.0,
        ctx.epoch_at_get_hours(0.2),
        CoordinateSystem::ECI,
        ctx.params.earth.gm_km3_s2,
    )
}

fn parking_table(ctx: &MissionContext) -> EphemerisTable {
    let state = parking_orbit(ctx);
    generate_ephemeris(
        "CSM",
        &state,
        state.epoch + 2.0 * Unit::Hour,
        2.0 * Unit::Minute,
        PropModel::Conic,
        &ctx.params,
        ctx.ephem(),
    )
    .unwrap()
}

#[rstest]
fn exact_on_samples(ctx: MissionContext) {
    let _ = pretty_env_logger::try_init();
    let table = parking_table(&ctx);
    for sample in table.samples().iter().step_by(7) {
        let interp = ctx.interpolate(&table, sample.epoch, false).unwrap();
        assert!(interp.exact);
        assert_eq!(interp.order, 0);
        assert_eq!(interp.state, *sample);
    }
}

#[rstest]
fn matches_conic_between_samples(ctx: MissionContext) {
    let _ = pretty_env_logger::try_init();
    let table = parking_table(&ctx);
    let start = table.start();
    for order in 4..=MAX_ORDER {
        for offset_s in [37.0, 1_801.5, 7_140.0] {
            let epoch = start + offset_s * Unit::Second;
            let interp = interpolate(&table, epoch, order, false, Duration::ZERO).unwrap();
            assert!(!interp.exact && !interp.extrapolated && !interp.order_reduced);
            assert_eq!(interp.order, order);
            let truth = ctx
                .propagate_to(&table.samples()[0], epoch, PropModel::Conic)
                .unwrap();
            let tolerance_km = if order == MAX_ORDER { 1e-4 } else { 0.5 };
            assert_abs_diff_eq!(
                (interp.state.radius_km - truth.radius_km).norm(),
                0.0,
                epsilon = tolerance_km
            );
        }
    }
}

#[rstest]
fn extrapolation_margin(ctx: MissionContext) {
    let _ = pretty_env_logger::try_init();
    let table = parking_table(&ctx);
    let margin = ctx.params.ephemeris.extrapolation_margin_s * Unit::Second;

    let inside = ctx
        .interpolate(&table, table.end() + margin - 1.0 * Unit::Second, true)
        .unwrap();
    assert!(inside.extrapolated);
    let inside = ctx
        .interpolate(&table, table.start() - 10.0 * Unit::Minute, true)
        .unwrap();
    assert!(inside.extrapolated);

    for epoch in [
        table.end() + margin + 1.0 * Unit::Second,
        table.start() - margin - 1.0 * Unit::Second,
    ] {
        let err = ctx.interpolate(&table, epoch, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
    }

    // Without extrapolation, anything outside of the table is rejected
    let err = ctx
        .interpolate(&table, table.end() + 1.0 * Unit::Second, false)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);
}

#[rstest]
fn invalid_requests(ctx: MissionContext) {
    let table = parking_table(&ctx);
    for order in [0, MAX_ORDER + 1] {
        let err = interpolate(&table, table.start(), order, false, Duration::ZERO).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    let mut samples = table.samples()[..5].to_vec();
    samples.swap(1, 2);
    assert_eq!(
        EphemerisTable::new("LM", samples).unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
}

#[rstest]
fn never_across_a_maneuver(ctx: MissionContext) {
    let _ = pretty_env_logger::try_init();
    let coast = parking_table(&ctx);
    let ignition = coast.samples()[30].epoch;
    let cutoff = coast.samples()[31].epoch;

    // Prograde impulse of 30 m/s between the two samples, as seen by the table
    let post_burn = coast.samples()[31].with_velocity(
        coast.samples()[31].velocity_km_s * (1.0 + 0.03 / coast.samples()[31].vmag_km_s()),
    );
    let mut samples = coast.samples()[..=31].to_vec();
    samples[31] = post_burn;
    for sample in &coast.samples()[32..] {
        samples.push(
            ctx.propagate_to(&post_burn, sample.epoch, PropModel::Conic)
                .unwrap(),
        );
    }
    let table = EphemerisTable::new("CSM", samples)
        .unwrap()
        .with_maneuvers(vec![ManeuverWindow { ignition, cutoff }])
        .unwrap();

    // Just before ignition, only pre-burn samples are used
    let before = ignition - 45.0 * Unit::Second;
    let interp = ctx.interpolate(&table, before, false).unwrap();
    assert_eq!(interp.bounds.1, ignition);
    assert!(!interp.in_burn);
    let truth = ctx
        .propagate_to(&coast.samples()[0], before, PropModel::Conic)
        .unwrap();
    assert_abs_diff_eq!(
        (interp.state.radius_km - truth.radius_km).norm(),
        0.0,
        epsilon = 1e-4
    );

    // Just after cutoff, only post-burn samples are used
    let after = cutoff + 45.0 * Unit::Second;
    let interp = ctx.interpolate(&table, after, false).unwrap();
    assert_eq!(interp.bounds.0, cutoff);
    let truth = ctx
        .propagate_to(&post_burn, after, PropModel::Conic)
        .unwrap();
    assert_abs_diff_eq!(
        (interp.state.radius_km - truth.radius_km).norm(),
        0.0,
        epsilon = 1e-4
    );

    // Inside the burn, linear between the bracketing samples
    let during = ignition + 1.0 * Unit::Minute;
    let interp = ctx.interpolate(&table, during, false).unwrap();
    assert!(interp.in_burn);
    assert_eq!(interp.order, 1);
    let mid = 0.5 * (table.samples()[30].radius_km + table.samples()[31].radius_km);
    assert_abs_diff_eq!((interp.state.radius_km - mid).norm(), 0.0, epsilon = 1e-9);
}

#[rstest]
fn ground_track_crossing(ctx: MissionContext) {
    let _ = pretty_env_logger::try_init();
    let table = parking_table(&ctx);
    let search = LongitudeSearch {
        order: 8,
        max_iterations: ctx.params.solver.longitude_search_max_iterations,
        tolerance_rad: 1e-7,
        margin: Duration::ZERO,
    };
    let start = subsatellite_point(&table.samples()[0], ctx.params.earth.radius_km, ctx.ephem())
        .unwrap();
    // Ten degrees east of the first sub-satellite point
    let target = start.lng_rad + 10.0_f64.to_radians();
    let epoch = longitude_crossing(&table, target, table.start(), search, ctx.ephem()).unwrap();
    assert!(epoch > table.start());
    // Roughly ten degrees of ground track at 0.06 deg/s
    let elapsed = (epoch - table.start()).to_seconds();
    assert!(elapsed > 100.0 && elapsed < 300.0, "{elapsed}");

    let state = ctx.interpolate(&table, epoch, false).unwrap().state;
    let point = subsatellite_point(&state, ctx.params.earth.radius_km, ctx.ephem()).unwrap();
    assert_abs_diff_eq!(
        rtcc::utils::between_pm_pi(point.lng_rad - target),
        0.0,
        epsilon = 1e-6
    );
}
