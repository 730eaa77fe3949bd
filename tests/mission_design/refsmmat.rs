extern crate pretty_env_logger;

use crate::{apollo11_context, apollo11_liftoff};
use approx::assert_abs_diff_eq;
use rtcc::cosmic::{
    site_inertial_km, Body, CoordinateSystem, StateVector, Thruster, VehicleConfig,
};
use rtcc::linalg::Vector3;
use rtcc::md::ldpp::LdppSite;
use rtcc::md::{compute_refsmmat, Refsmmat, RefsmmatOption};
use rtcc::propagators::PropModel;
use rtcc::time::Unit;
use rtcc::utils::{is_orthonormal, unit};
use rtcc::ErrorKind;

fn assert_proper_rotation(refsmmat: &Refsmmat) {
    assert!(is_orthonormal(&refsmmat.matrix, 1e-9), "{refsmmat}");
    assert_abs_diff_eq!(refsmmat.matrix.determinant(), 1.0, epsilon = 1e-9);
    let [x, y, z] = refsmmat.axes();
    assert_abs_diff_eq!((x.cross(&y) - z).norm(), 0.0, epsilon = 1e-9);
}

#[test]
fn every_option_is_a_proper_rotation() {
    let _ = pretty_env_logger::try_init();
    let ctx = apollo11_context();
    let gm = ctx.params.earth.gm_km3_s2;
    let parking = StateVector::keplerian(
        ctx.params.earth.radius_km + 185.2,
        0.0005,
        32.52,
        358.4,
        20.0,
        0.0,
        ctx.epoch_at_get_hours(0.2),
        CoordinateSystem::ECI,
        gm,
    );
    // Perigee well below the entry interface
    let deorbited = StateVector::keplerian(
        ctx.params.earth.radius_km + 102.5,
        165.0 / (2.0 * ctx.params.earth.radius_km + 205.0),
        32.5,
        0.0,
        0.0,
        180.0,
        ctx.epoch_at_get_hours(2.0),
        CoordinateSystem::ECI,
        gm,
    );
    let lunar = StateVector::keplerian(
        1_849.0,
        0.002,
        1.25,
        0.0,
        0.0,
        0.0,
        ctx.epoch_at_get_hours(100.0),
        CoordinateSystem::MCI,
        ctx.params.moon.gm_km3_s2,
    );
    let csm = VehicleConfig {
        mass_kg: 28_800.0,
        thruster: Thruster::sps(),
    };
    let tig = parking.epoch + 30.0 * Unit::Minute;
    let dv = Vector3::new(-0.08, 0.002, 0.045);

    let options = [
        RefsmmatOption::Preferred {
            state: &parking,
            tig,
            dv_lvlh_km_s: dv,
            vehicle: &csm,
        },
        RefsmmatOption::Retrofire {
            state: &parking,
            tig,
            dv_lvlh_km_s: dv,
            vehicle: &csm,
        },
        RefsmmatOption::LocalVertical {
            state: &parking,
            epoch: tig,
        },
        RefsmmatOption::EntryInterface { state: &deorbited },
        RefsmmatOption::LaunchPad {
            lat_rad: 28.608_f64.to_radians(),
            lng_rad: (-80.604_f64).to_radians(),
            azimuth_rad: 72.0_f64.to_radians(),
            liftoff: apollo11_liftoff(),
        },
        RefsmmatOption::LandingSite {
            state: &lunar,
            site: LdppSite {
                lat_rad: 0.691_f64.to_radians(),
                lng_rad: 23.43_f64.to_radians(),
                radius_km: 1_735.4,
            },
            landing: lunar.epoch + 1.5 * Unit::Hour,
        },
        RefsmmatOption::PassiveThermalControl {
            epoch: ctx.epoch_at_get_hours(30.0),
        },
    ];

    for option in options {
        let refsmmat = compute_refsmmat(option, &ctx).unwrap();
        assert_proper_rotation(&refsmmat);
    }
}

#[test]
fn geometry_of_the_alignments() {
    let ctx = apollo11_context();
    let liftoff = apollo11_liftoff();
    let (lat, lng) = (28.608_f64.to_radians(), (-80.604_f64).to_radians());

    // Launch pad: X up, Z downrange
    let pad = compute_refsmmat(
        RefsmmatOption::LaunchPad {
            lat_rad: lat,
            lng_rad: lng,
            azimuth_rad: 72.0_f64.to_radians(),
            liftoff,
        },
        &ctx,
    )
    .unwrap();
    let up = unit(&site_inertial_km(Body::Earth, lat, lng, 1.0, liftoff));
    let [x, _, z] = pad.axes();
    assert_abs_diff_eq!(x.dot(&up), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(z.dot(&up), 0.0, epsilon = 1e-12);
    assert_eq!(pad.epoch, liftoff);

    // Local vertical: Z axis toward the center of the Earth
    let state = StateVector::keplerian(
        ctx.params.earth.radius_km + 185.2,
        0.0,
        32.5,
        0.0,
        0.0,
        0.0,
        liftoff + 12.0 * Unit::Minute,
        CoordinateSystem::ECI,
        ctx.params.earth.gm_km3_s2,
    );
    let epoch = state.epoch + 20.0 * Unit::Minute;
    let lvlh = compute_refsmmat(
        RefsmmatOption::LocalVertical {
            state: &state,
            epoch,
        },
        &ctx,
    )
    .unwrap();
    let at_epoch = ctx.propagate_to(&state, epoch, PropModel::Precision).unwrap();
    let [x, _, z] = lvlh.axes();
    assert_abs_diff_eq!(z.dot(&unit(&at_epoch.radius_km)), -1.0, epsilon = 1e-9);
    assert!(x.dot(&at_epoch.velocity_km_s) > 0.0);

    // The attitude of the platform itself is zero
    let zero = lvlh.attitude(&lvlh.matrix);
    assert_abs_diff_eq!(zero.norm(), 0.0, epsilon = 1e-9);

    // Passive thermal control: Z toward the south ecliptic pole
    let ptc = compute_refsmmat(
        RefsmmatOption::PassiveThermalControl {
            epoch: ctx.epoch_at_get_hours(30.0),
        },
        &ctx,
    )
    .unwrap();
    let [_, _, z] = ptc.axes();
    assert_abs_diff_eq!(
        z.dot(&rtcc::cosmic::ecliptic_pole()),
        -1.0,
        epsilon = 1e-12
    );
}

#[test]
fn degenerate_requests() {
    let ctx = apollo11_context();
    let state = StateVector::keplerian(
        ctx.params.earth.radius_km + 185.2,
        0.0,
        32.5,
        0.0,
        0.0,
        0.0,
        apollo11_liftoff(),
        CoordinateSystem::ECI,
        ctx.params.earth.gm_km3_s2,
    );
    let csm = VehicleConfig {
        mass_kg: 28_800.0,
        thruster: Thruster::sps(),
    };
    let err = compute_refsmmat(
        RefsmmatOption::Preferred {
            state: &state,
            tig: state.epoch,
            dv_lvlh_km_s: Vector3::zeros(),
            vehicle: &csm,
        },
        &ctx,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSolution);

    // A circular parking orbit never reaches the entry interface
    let err = compute_refsmmat(RefsmmatOption::EntryInterface { state: &state }, &ctx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSolution);
}
