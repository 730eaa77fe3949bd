extern crate pretty_env_logger;

use approx::assert_abs_diff_eq;
use enum_iterator::all;
use rstest::*;
use rtcc::cosmic::{body_pole, site_inertial_km, Body, CoordinateSystem, StateVector, Thruster, VehicleConfig};
use rtcc::md::ldpp::{LdppBurn, LdppSite, MAX_MANEUVERS};
use rtcc::md::{ldpp, LdppMode, LdppOptions, LdppSolution};
use rtcc::time::{Epoch, Unit};
use rtcc::utils::{rotate_vector, unit};
use rtcc::{ErrorKind, MissionContext};

struct Setup {
    ctx: MissionContext,
    state: StateVector,
    site: LdppSite,
    thresholds: [Epoch; 4],
    lm: VehicleConfig,
}

/// Near circular orbit of about 60 nautical miles, slightly inclined to the lunar equator, ahead
/// of the Apollo 11 landing site
#[fixture]
fn setup() -> Setup {
    setup_with_speed(1.0)
}

/// Same orbit with the speed scaled at the initial point, which becomes its perilune
fn setup_with_speed(speed_factor: f64) -> Setup {
    let t0 = Epoch::from_gregorian_utc_hms(1969, 7, 19, 18, 0, 0);
    let ctx = MissionContext::analytic(Epoch::from_gregorian_utc_hms(1969, 7, 16, 13, 32, 0));
    let gm = ctx.params.moon.gm_km3_s2;
    let pole = body_pole(Body::Moon, t0);
    let r = 1_849.0 * unit(&site_inertial_km(Body::Moon, 0.0, -0.5, 1.0, t0));
    let east = unit(&pole.cross(&r));
    let v = speed_factor * (gm / r.norm()).sqrt() * rotate_vector(&r, 1.5_f64.to_radians(), &east);
    Setup {
        state: StateVector::new(t0, r, v, CoordinateSystem::MCI),
        site: LdppSite {
            lat_rad: 0.691_f64.to_radians(),
            lng_rad: 23.43_f64.to_radians(),
            radius_km: 1_735.4,
        },
        thresholds: [
            t0,
            t0 + 20.0 * Unit::Minute,
            t0 + 40.0 * Unit::Minute,
            t0 + 60.0 * Unit::Minute,
        ],
        lm: VehicleConfig {
            mass_kg: 15_100.0,
            thruster: Thruster::dps(),
        },
        ctx,
    }
}

fn options(setup: &Setup, mode: LdppMode) -> LdppOptions {
    LdppOptions::builder()
        .mode(mode)
        .thresholds(setup.thresholds)
        .site(setup.site)
        .build()
}

fn check_plan(setup: &Setup, opts: &LdppOptions, sol: &LdppSolution) {
    assert!(sol.maneuvers.len() <= MAX_MANEUVERS);
    for pair in sol.maneuvers.windows(2) {
        assert!(pair[1].tig >= pair[0].tig, "{} then {}", pair[0], pair[1]);
    }
    if let Some(first) = sol.maneuvers.first() {
        assert!(first.tig >= setup.thresholds[0]);
    }
    if let (Some(t_doi), Some(t_pdi), Some(t_land)) = (sol.t_doi, sol.t_pdi, sol.t_land) {
        assert!(t_doi <= t_pdi && t_pdi < t_land);
        assert_abs_diff_eq!(
            (t_land - t_pdi).to_seconds(),
            opts.descent_duration_s,
            epsilon = 1e-3
        );
        if let Some(last) = sol.maneuvers.last() {
            assert!(last.tig <= t_doi);
        }
    }
    assert!(sol.lm_mass_kg <= setup.lm.mass_kg);
    assert!(sol.transitions <= setup.ctx.params.solver.ldpp_max_transitions);
}

#[rstest]
#[case::circularizing_plane_change(LdppMode::CircularizingPlaneChange, 1.0, vec![LdppBurn::PlaneChange, LdppBurn::Doi])]
#[case::plane_change(LdppMode::PlaneChange, 1.0, vec![LdppBurn::PlaneChange, LdppBurn::Doi])]
#[case::apsis_placement(LdppMode::ApsisPlacement, 1.0, vec![LdppBurn::ApsisPlacement, LdppBurn::Doi])]
#[case::height_adjust(
    LdppMode::HeightAdjust,
    1.03,
    vec![LdppBurn::HeightAdjust, LdppBurn::Circularization, LdppBurn::Doi]
)]
#[case::doi_only(LdppMode::DoiOnly, 1.0, vec![LdppBurn::Doi])]
#[case::height_adjust_plane_check(
    LdppMode::HeightAdjustPlaneCheck,
    1.03,
    vec![LdppBurn::PlaneChange, LdppBurn::HeightAdjust, LdppBurn::Circularization, LdppBurn::Doi]
)]
#[case::timing_only(LdppMode::TimingOnly, 1.0, vec![])]
#[case::site_passage_plane_change(LdppMode::SitePassagePlaneChange, 1.0, vec![LdppBurn::PlaneChange])]
fn every_mode(#[case] mode: LdppMode, #[case] speed_factor: f64, #[case] expected: Vec<LdppBurn>) {
    let _ = pretty_env_logger::try_init();
    let setup = setup_with_speed(speed_factor);
    let opts = options(&setup, mode);
    let sol = ldpp(&setup.ctx, &setup.state, &opts, &setup.lm).unwrap();
    println!("{mode:?}: {} maneuver(s), {} transitions", sol.maneuvers.len(), sol.transitions);
    for maneuver in &sol.maneuvers {
        println!("\t{maneuver}");
    }
    check_plan(&setup, &opts, &sol);
    let kinds: Vec<LdppBurn> = sol.maneuvers.iter().map(|m| m.kind).collect();
    assert_eq!(kinds, expected);
    if mode == LdppMode::TimingOnly {
        assert!(sol.t_pdi.is_some());
    }
}

#[test]
fn every_mode_is_covered() {
    assert_eq!(all::<LdppMode>().count(), 8);
}

#[rstest]
fn height_adjust_from_circular_orbit(setup: Setup) {
    let _ = pretty_env_logger::try_init();
    let gm = setup.ctx.params.moon.gm_km3_s2;
    assert!(setup.state.ecc(gm) < 1e-9);
    let opts = options(&setup, LdppMode::HeightAdjust);
    let sol = ldpp(&setup.ctx, &setup.state, &opts, &setup.lm).unwrap();
    check_plan(&setup, &opts, &sol);
    let kinds: Vec<LdppBurn> = sol.maneuvers.iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![LdppBurn::HeightAdjust, LdppBurn::Circularization, LdppBurn::Doi]
    );
    // Any point of a circular orbit is an apsis: the height adjustment is at its threshold
    assert_eq!(sol.maneuvers[0].tig, setup.thresholds[0]);
}

#[rstest]
fn descent_orbit_insertion(setup: Setup) {
    let _ = pretty_env_logger::try_init();
    let opts = options(&setup, LdppMode::DoiOnly);
    let sol = ldpp(&setup.ctx, &setup.state, &opts, &setup.lm).unwrap();
    check_plan(&setup, &opts, &sol);

    assert_eq!(sol.maneuvers.len(), 1);
    let doi = sol.maneuvers[0];
    assert_eq!(doi.kind, LdppBurn::Doi);
    assert_eq!(Some(doi.tig), sol.t_doi);
    // Retrograde, about 20 m/s, to lower the perilune to 50,000 ft
    assert!(doi.dv_lvlh_km_s.x < 0.0);
    assert!(doi.dv_lvlh_km_s.norm() > 0.01 && doi.dv_lvlh_km_s.norm() < 0.04);
    // Powered descent starts half a revolution later
    let half_period = 0.5 * setup.state.period(setup.ctx.params.moon.gm_km3_s2).unwrap();
    let coast = sol.t_pdi.unwrap() - sol.t_doi.unwrap();
    assert!((coast - half_period).abs() < 15.0 * Unit::Minute, "{coast}");
    assert!(sol.azimuth_rad.is_some());
    assert!(sol.lm_mass_kg < setup.lm.mass_kg);
}

#[rstest]
fn invalid_options(setup: Setup) {
    let mut opts = options(&setup, LdppMode::DoiOnly);
    opts.thresholds.swap(0, 3);
    let err = ldpp(&setup.ctx, &setup.state, &opts, &setup.lm).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert_eq!(LdppMode::try_from(2).unwrap(), LdppMode::ApsisPlacement);
    assert_eq!(
        LdppMode::try_from(9).unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
}
