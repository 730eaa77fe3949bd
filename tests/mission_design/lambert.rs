extern crate pretty_env_logger;

use crate::apollo11_liftoff;
use approx::assert_abs_diff_eq;
use rstest::*;
use rtcc::cosmic::{CoordinateSystem, StateVector, Thruster, VehicleConfig};
use rtcc::linalg::Vector3;
use rtcc::md::targeting::AxisMode;
use rtcc::md::{lambert_targeting, LambertOptions};
use rtcc::propagators::PropModel;
use rtcc::time::{Epoch, Unit};
use rtcc::utils::unit;
use rtcc::{ErrorKind, MissionContext};

#[fixture]
fn ctx() -> MissionContext {
    MissionContext::analytic(apollo11_liftoff())
}

#[fixture]
fn csm() -> VehicleConfig {
    VehicleConfig {
        mass_kg: 28_800.0,
        thruster: Thruster::sps(),
    }
}

fn circular(ctx: &MissionContext, altitude_km: f64, inc_deg: f64, ta_deg: f64, epoch: Epoch) -> StateVector {
    StateVector::keplerian(
        ctx.params.earth.radius_km + altitude_km,
        0.0,
        inc_deg,
        10.0,
        0.0,
        ta_deg,
        epoch,
        CoordinateSystem::ECI,
        ctx.params.earth.gm_km3_s2,
    )
}

#[rstest]
#[case::conic(PropModel::Conic, 1e-3)]
#[case::precision(PropModel::Precision, 1e-3)]
fn reaches_the_aim_point(
    ctx: MissionContext,
    csm: VehicleConfig,
    #[case] model: PropModel,
    #[case] tolerance_km: f64,
) {
    let _ = pretty_env_logger::try_init();
    let t0 = apollo11_liftoff() + 3.0 * Unit::Hour;
    let chaser = circular(&ctx, 185.0, 28.5, 0.0, t0);
    let target = circular(&ctx, 300.0, 28.5, 40.0, t0);
    let opts = LambertOptions::builder()
        .tig(t0 + 10.0 * Unit::Minute)
        .model(model)
        .build();

    let sol = lambert_targeting(&ctx, &chaser, &target, 50.0 * Unit::Minute, &opts, &csm).unwrap();
    assert_eq!(sol.maneuver.tig, opts.tig);
    assert_eq!(sol.arrival, opts.tig + 50.0 * Unit::Minute);
    assert!(sol.finite_burn.is_none());

    // The maneuver applied to the chaser at TIG is the post-burn state
    let origin = ctx.propagate_to(&chaser, opts.tig, model).unwrap();
    let post = sol.maneuver.apply(&origin).unwrap();
    assert_abs_diff_eq!(
        (post.velocity_km_s - sol.velocity_to_be_achieved_km_s).norm(),
        0.0,
        epsilon = 1e-9
    );

    let arrival = ctx.propagate_to(&sol.post_burn, sol.arrival, model).unwrap();
    assert_abs_diff_eq!(
        (arrival.radius_km - sol.aim_point_km).norm(),
        0.0,
        epsilon = tolerance_km
    );
    // No offset: the aim point is the target itself
    let target_at_arrival = ctx.propagate_to(&target, sol.arrival, model).unwrap();
    assert_abs_diff_eq!(
        (target_at_arrival.radius_km - sol.aim_point_km).norm(),
        0.0,
        epsilon = 1e-9
    );
}

/// 185 km parking orbit, and the position its own orbit reaches one day later
fn parking_and_own_position(ctx: &MissionContext) -> (StateVector, StateVector) {
    let t0 = apollo11_liftoff();
    let chaser = circular(ctx, 185.0, 32.5, 0.0, t0);
    let later = ctx
        .propagate(&chaser, 24.0 * Unit::Hour, PropModel::Conic)
        .unwrap();
    (chaser, later)
}

#[rstest]
fn own_orbit_after_sixteen_revolutions(ctx: MissionContext, csm: VehicleConfig) {
    let _ = pretty_env_logger::try_init();
    // The orbit period is about 88 minutes: the own position a day later is 16 revolutions and
    // about 126 degrees downrange
    let (chaser, later) = parking_and_own_position(&ctx);
    let revs_in_a_day =
        86_400.0 / chaser.period(ctx.params.earth.gm_km3_s2).unwrap().to_seconds();
    assert_eq!(revs_in_a_day.floor(), 16.0);

    let opts = LambertOptions::builder()
        .tig(chaser.epoch)
        .revs(16)
        .model(PropModel::Conic)
        .build();
    let sol = lambert_targeting(&ctx, &chaser, &chaser, 24.0 * Unit::Hour, &opts, &csm).unwrap();
    assert!(
        sol.maneuver.dv_km_s() < 5e-3,
        "{:.3} m/s",
        sol.maneuver.dv_km_s() * 1e3
    );

    // Arrival a day after TIG, on the own position of the chaser
    assert_eq!(sol.arrival, opts.tig + 24.0 * Unit::Hour);
    assert_abs_diff_eq!((sol.aim_point_km - later.radius_km).norm(), 0.0, epsilon = 1e-9);
    let arrival = ctx
        .propagate_to(&sol.post_burn, sol.arrival, PropModel::Conic)
        .unwrap();
    assert_eq!(arrival.epoch, later.epoch);
    assert_abs_diff_eq!(
        (arrival.radius_km - later.radius_km).norm(),
        0.0,
        epsilon = 1e-3
    );
}

#[rstest]
fn own_orbit_with_seven_revolutions(ctx: MissionContext, csm: VehicleConfig) {
    let _ = pretty_env_logger::try_init();
    // Seven revolutions to the position the parking orbit reaches after sixteen: the transfer
    // orbit has a period of about three hours, far from the parking orbit
    let (chaser, later) = parking_and_own_position(&ctx);
    let opts = LambertOptions::builder()
        .tig(chaser.epoch)
        .revs(7)
        .model(PropModel::Conic)
        .build();
    let sol = lambert_targeting(&ctx, &chaser, &chaser, 24.0 * Unit::Hour, &opts, &csm).unwrap();
    assert!(
        sol.maneuver.dv_km_s() > 1.0,
        "{:.3} m/s",
        sol.maneuver.dv_km_s() * 1e3
    );
    let gm = ctx.params.earth.gm_km3_s2;
    let period_s = sol.post_burn.period(gm).unwrap().to_seconds();
    assert!(period_s > 86_400.0 / 8.0 && period_s < 86_400.0 / 7.0, "{period_s} s");

    assert_eq!(sol.arrival, opts.tig + 24.0 * Unit::Hour);
    let arrival = ctx
        .propagate_to(&sol.post_burn, sol.arrival, PropModel::Conic)
        .unwrap();
    assert_abs_diff_eq!(
        (arrival.radius_km - later.radius_km).norm(),
        0.0,
        epsilon = 1e-3
    );
}

#[rstest]
fn offset_aim_point(ctx: MissionContext, csm: VehicleConfig) {
    let t0 = apollo11_liftoff() + 3.0 * Unit::Hour;
    let chaser = circular(&ctx, 185.0, 28.5, 0.0, t0);
    let target = circular(&ctx, 300.0, 28.5, 40.0, t0);
    // 15 nautical miles below the target
    let opts = LambertOptions::builder()
        .tig(t0 + 10.0 * Unit::Minute)
        .offset_km(Vector3::new(0.0, 0.0, 27.78))
        .build();
    let sol = lambert_targeting(&ctx, &chaser, &target, 50.0 * Unit::Minute, &opts, &csm).unwrap();
    let target_at_arrival = ctx
        .propagate_to(&target, sol.arrival, PropModel::Conic)
        .unwrap();
    assert_abs_diff_eq!(
        sol.aim_point_km.norm(),
        target_at_arrival.rmag_km() - 27.78,
        epsilon = 1e-9
    );
}

#[rstest]
fn along_track_only(ctx: MissionContext, csm: VehicleConfig) {
    let _ = pretty_env_logger::try_init();
    let t0 = apollo11_liftoff() + 3.0 * Unit::Hour;
    let chaser = circular(&ctx, 185.0, 28.5, 0.0, t0);
    // Same orbit, two degrees ahead: one revolution to catch up
    let target = circular(&ctx, 185.0, 28.5, 2.0, t0);
    let period = chaser.period(ctx.params.earth.gm_km3_s2).unwrap();
    let opts = LambertOptions::builder()
        .tig(t0)
        .revs(1)
        .axis(AxisMode::XAxis)
        .build();
    let sol = lambert_targeting(&ctx, &chaser, &target, period, &opts, &csm).unwrap();
    let dv = sol.maneuver.dv_lvlh_km_s;
    assert_eq!(dv.y, 0.0);
    assert_abs_diff_eq!(dv.z, 0.0, epsilon = 1e-12);
    // Catching up means a lower, faster orbit
    assert!(dv.x < 0.0 && dv.x > -0.02, "{dv}");

    let arrival = ctx
        .propagate_to(&sol.post_burn, sol.arrival, PropModel::Conic)
        .unwrap();
    let angle = unit(&arrival.radius_km).angle(&unit(&sol.aim_point_km));
    assert!(angle < 1e-6, "{angle}");
}

#[rstest]
fn finite_burn_slips_ignition(ctx: MissionContext, csm: VehicleConfig) {
    let _ = pretty_env_logger::try_init();
    let t0 = apollo11_liftoff() + 3.0 * Unit::Hour;
    let chaser = circular(&ctx, 185.0, 28.5, 0.0, t0);
    let target = circular(&ctx, 300.0, 28.5, 40.0, t0);
    let opts = LambertOptions::builder()
        .tig(t0 + 10.0 * Unit::Minute)
        .impulsive(false)
        .build();
    let sol = lambert_targeting(&ctx, &chaser, &target, 50.0 * Unit::Minute, &opts, &csm).unwrap();
    let burn = sol.finite_burn.unwrap();
    assert!(sol.maneuver.tig < opts.tig);
    assert_abs_diff_eq!(
        (sol.maneuver.tig - opts.tig).to_seconds(),
        burn.t_slip_s,
        epsilon = 1e-3
    );
    // Ignition about half a burn early
    assert!((burn.t_slip_s + 0.5 * burn.duration_s).abs() < 0.25 * burn.duration_s);
    assert!(sol.maneuver.mass_after_kg < csm.mass_kg);
}

#[rstest]
fn invalid_requests(ctx: MissionContext, csm: VehicleConfig) {
    let t0 = apollo11_liftoff() + 3.0 * Unit::Hour;
    let chaser = circular(&ctx, 185.0, 28.5, 0.0, t0);
    let opts = LambertOptions::builder().tig(t0).build();

    let err = lambert_targeting(&ctx, &chaser, &chaser, -1.0 * Unit::Minute, &opts, &csm)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let lunar = StateVector::new(
        t0,
        Vector3::new(1_850.0, 0.0, 0.0),
        Vector3::new(0.0, 1.63, 0.0),
        CoordinateSystem::MCI,
    );
    let err = lambert_targeting(&ctx, &chaser, &lunar, 1.0 * Unit::Hour, &opts, &csm).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReferenceBodyMismatch);
}
