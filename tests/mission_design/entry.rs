extern crate pretty_env_logger;

use crate::apollo11_liftoff;
use approx::assert_abs_diff_eq;
use rstest::*;
use rtcc::cosmic::{
    CoordinateSystem, StateVector, Thruster, Vehicle, VehicleConfig, ENTRY_INTERFACE_ALTITUDE_KM,
};
use rtcc::linalg::Vector3;
use rtcc::md::entry::{EntryFpa, EntryPhase};
use rtcc::md::{entry_targeting, EntryOptions};
use rtcc::time::{Epoch, Unit};
use rtcc::utils::between_pm_pi;
use rtcc::{ErrorKind, MissionContext};

#[fixture]
fn ctx() -> MissionContext {
    MissionContext::analytic(apollo11_liftoff())
}

/// Command and service module on its service propulsion engine
fn csm() -> VehicleConfig {
    VehicleConfig {
        mass_kg: 28_800.0,
        thruster: Thruster::sps(),
    }
}

/// 100 nautical mile Earth parking orbit
fn parking_orbit(ctx: &MissionContext) -> StateVector {
    StateVector::keplerian(
        ctx.params.earth.radius_km + 185.2,
        0.0002,
        32.52,
        358.4,
        20.0,
        0.0,
        apollo11_liftoff() + 2.0 * Unit::Hour,
        CoordinateSystem::ECI,
        ctx.params.earth.gm_km3_s2,
    )
}

fn tig_guess(state: &StateVector) -> Epoch {
    state.epoch + 20.0 * Unit::Minute
}

/// Landing longitude of a deorbit at the guessed TIG, shifted east: a target the iterator can reach
fn reachable_longitude(ctx: &MissionContext, state: &StateVector, shift_deg: f64) -> f64 {
    let opts = EntryOptions::builder()
        .tig_guess(tig_guess(state))
        .target_longitude_rad(0.0)
        .precision(false)
        .tolerance_deg(360.0)
        .build();
    let first_pass = entry_targeting(ctx, state, &opts, &csm()).unwrap();
    assert_eq!(first_pass.maneuver.tig, tig_guess(state));
    between_pm_pi(first_pass.landing.lng_rad + shift_deg.to_radians())
}

#[rstest]
fn conic_guess_converges(ctx: MissionContext) {
    let _ = pretty_env_logger::try_init();
    let state = parking_orbit(&ctx);
    let target = reachable_longitude(&ctx, &state, 4.0);
    let opts = EntryOptions::builder()
        .tig_guess(tig_guess(&state))
        .target_longitude_rad(target)
        .precision(false)
        .build();
    let sol = entry_targeting(&ctx, &state, &opts, &csm()).unwrap();
    assert_eq!(sol.phase, EntryPhase::ConicGuess);
    assert!(sol.longitude_error_rad.abs() < 0.01_f64.to_radians());
    // A later burn lands further east
    assert!(sol.maneuver.tig > opts.tig_guess);

    let dv = sol.maneuver.dv_lvlh_km_s;
    assert!(dv.x < 0.0);
    assert_eq!(dv.y, 0.0);
    assert!(sol.maneuver.dv_km_s() > 0.03 && sol.maneuver.dv_km_s() < opts.max_dv_km_s);

    // The deorbit burn consumes propellant of the vehicle
    let maneuver = sol.maneuver;
    assert_eq!(maneuver.mass_before_kg, csm().mass_kg);
    assert_abs_diff_eq!(
        maneuver.mass_after_kg,
        csm().mass_after_kg(maneuver.dv_km_s()),
        epsilon = 1e-9
    );
    assert!(maneuver.mass_after_kg < maneuver.mass_before_kg);
    assert!(maneuver.burn_duration_s() > 0.0);

    let ei_altitude = sol.entry_interface.rmag_km() - ctx.params.earth.radius_km;
    assert_abs_diff_eq!(ei_altitude, ENTRY_INTERFACE_ALTITUDE_KM, epsilon = 1e-3);
    assert!(sol.entry_fpa_rad < 0.0);
    assert!(sol.landing.epoch > sol.entry_interface.epoch);
}

#[rstest]
fn precision_refinement(ctx: MissionContext) {
    let _ = pretty_env_logger::try_init();
    let state = parking_orbit(&ctx);
    let target = reachable_longitude(&ctx, &state, 4.0);
    let opts = EntryOptions::builder()
        .tig_guess(tig_guess(&state))
        .target_longitude_rad(target)
        .build();
    let sol = entry_targeting(&ctx, &state, &opts, &csm()).unwrap();
    assert_eq!(sol.phase, EntryPhase::PrecisionRefine);
    assert!(
        sol.longitude_error_rad.abs() < ctx.params.solver.entry_longitude_tolerance_deg.to_radians(),
        "{sol}"
    );
    assert!(sol.iterations >= 2);
    assert_abs_diff_eq!(
        sol.entry_interface.rmag_km() - ctx.params.earth.radius_km,
        ENTRY_INTERFACE_ALTITUDE_KM,
        epsilon = ctx.params.solver.radius_tolerance_km
    );
}

#[rstest]
fn fixed_flight_path_angle(ctx: MissionContext) {
    let _ = pretty_env_logger::try_init();
    let state = parking_orbit(&ctx);
    let target = reachable_longitude(&ctx, &state, 4.0);
    let fpa = (-1.6_f64).to_radians();
    let opts = EntryOptions::builder()
        .tig_guess(tig_guess(&state))
        .target_longitude_rad(target)
        .fpa(EntryFpa::Fixed(fpa))
        .build();
    let sol = entry_targeting(&ctx, &state, &opts, &csm()).unwrap();
    assert_eq!(sol.phase, EntryPhase::FlightPathAngleBound);
    assert_abs_diff_eq!(sol.entry_fpa_rad, fpa, epsilon = 1e-6);
    // The delta-V correction barely moves the landing point
    assert!(sol.longitude_error_rad.abs() < 1.0_f64.to_radians());
}

#[rstest]
fn invalid_requests(ctx: MissionContext) {
    let state = parking_orbit(&ctx);
    let opts = EntryOptions::builder()
        .tig_guess(tig_guess(&state))
        .target_longitude_rad(0.0)
        .max_dv_km_s(0.0)
        .build();
    assert_eq!(
        entry_targeting(&ctx, &state, &opts, &csm()).unwrap_err().kind(),
        ErrorKind::InvalidInput
    );

    let lunar = StateVector::new(
        state.epoch,
        Vector3::new(1_850.0, 0.0, 0.0),
        Vector3::new(0.0, 1.63, 0.0),
        CoordinateSystem::MCI,
    );
    let opts = EntryOptions::builder()
        .tig_guess(tig_guess(&state))
        .target_longitude_rad(0.0)
        .build();
    assert_eq!(
        entry_targeting(&ctx, &lunar, &opts, &csm()).unwrap_err().kind(),
        ErrorKind::ReferenceBodyMismatch
    );

    // Too little delta-V available to deorbit
    let opts = EntryOptions::builder()
        .tig_guess(tig_guess(&state))
        .target_longitude_rad(0.0)
        .max_dv_km_s(0.005)
        .build();
    assert_eq!(
        entry_targeting(&ctx, &state, &opts, &csm()).unwrap_err().kind(),
        ErrorKind::NoSolution
    );
}
