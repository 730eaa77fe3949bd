extern crate pretty_env_logger;

use crate::{apollo11_context, lunar_orbit_epoch};
use approx::assert_abs_diff_eq;
use enum_iterator::all;
use rstest::*;
use rtcc::cosmic::{site_inertial_km, subsatellite_point, Body, CoordinateSystem, StateVector};
use rtcc::linalg::Vector3;
use rtcc::time::Unit;
use rtcc::{ErrorKind, MissionContext};

#[fixture]
fn ctx() -> MissionContext {
    apollo11_context()
}

/// A translunar coast state, far from both bodies
fn translunar(ctx: &MissionContext) -> StateVector {
    StateVector::new(
        ctx.epoch_at_get_hours(40.0),
        Vector3::new(-180_512.3, 212_047.8, 95_340.1),
        Vector3::new(-0.812, 0.493, 0.266),
        CoordinateSystem::ECI,
    )
}

#[rstest]
fn every_pair_round_trips(ctx: MissionContext) {
    let _ = pretty_env_logger::try_init();
    let state = translunar(&ctx);

    for from in all::<CoordinateSystem>() {
        let start = ctx.convert(&state, from).unwrap();
        assert_eq!(start.frame, from);
        assert_eq!(start.epoch, state.epoch);
        for to in all::<CoordinateSystem>() {
            let there = ctx.convert(&start, to).unwrap();
            assert_eq!(there.frame, to, "{from} -> {to}");
            let back = ctx.convert(&there, from).unwrap();
            assert_abs_diff_eq!(
                (back.radius_km - start.radius_km).norm(),
                0.0,
                epsilon = 1e-6
            );
            assert_abs_diff_eq!(
                (back.velocity_km_s - start.velocity_km_s).norm(),
                0.0,
                epsilon = 1e-9
            );
        }
    }
}

#[rstest]
fn same_frame_is_identity(ctx: MissionContext) {
    let state = translunar(&ctx);
    for frame in all::<CoordinateSystem>() {
        let converted = ctx.convert(&state, frame).unwrap();
        assert_eq!(ctx.convert(&converted, frame).unwrap(), converted);
    }
}

#[rstest]
fn moon_centered_frames_share_the_distance(ctx: MissionContext) {
    let mci = ctx.convert(&translunar(&ctx), CoordinateSystem::MCI).unwrap();
    for frame in [CoordinateSystem::MCT, CoordinateSystem::EMP] {
        let rotated = ctx.convert(&mci, frame).unwrap();
        assert_eq!(rotated.body(), Body::Moon);
        assert_abs_diff_eq!(rotated.rmag_km(), mci.rmag_km(), epsilon = 1e-8);
    }
    let ect = ctx.convert(&mci, CoordinateSystem::ECT).unwrap();
    let eci = ctx.convert(&mci, CoordinateSystem::ECI).unwrap();
    assert_abs_diff_eq!(ect.rmag_km(), eci.rmag_km(), epsilon = 1e-8);
}

#[rstest]
fn earth_fixed_site(ctx: MissionContext) {
    // Launch complex 39A
    let (lat, lng) = (28.608_f64.to_radians(), (-80.604_f64).to_radians());
    for hours in [0.0, 6.0, 13.5] {
        let epoch = ctx.get_base + hours * Unit::Hour;
        let pad = site_inertial_km(Body::Earth, lat, lng, ctx.params.earth.radius_km, epoch);
        let state = StateVector::new(epoch, pad, Vector3::zeros(), CoordinateSystem::ECI);
        let point = subsatellite_point(&state, ctx.params.earth.radius_km, ctx.ephem()).unwrap();
        assert_abs_diff_eq!(point.lat_rad, lat, epsilon = 1e-12);
        assert_abs_diff_eq!(point.lng_rad, lng, epsilon = 1e-12);
        assert_abs_diff_eq!(point.height_km, 0.0, epsilon = 1e-8);
    }
}

#[test]
fn missing_ephemeris() {
    let epoch = lunar_orbit_epoch();
    let ctx = MissionContext::new(
        std::sync::Arc::new(rtcc::cosmic::ephem::AnalyticEphemeris::bounded(
            epoch - 1.0 * Unit::Day,
            epoch,
        )),
        rtcc::io::SystemParameters::default(),
        epoch,
    );
    let state = StateVector::new(
        epoch + 1.0 * Unit::Hour,
        Vector3::new(1_850.0, 0.0, 0.0),
        Vector3::new(0.0, 1.63, 0.0),
        CoordinateSystem::MCI,
    );
    // Body rotations are always available
    assert!(ctx.convert(&state, CoordinateSystem::MCT).is_ok());
    for frame in [CoordinateSystem::ECI, CoordinateSystem::EMP] {
        let err = ctx.convert(&state, frame).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EphemerisUnavailable);
    }
}
