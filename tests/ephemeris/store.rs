use crate::lunar_orbit_epoch;
use rtcc::cosmic::{CoordinateSystem, StateVector};
use rtcc::ephemeris::{EphemerisStore, EphemerisTable, LunarStay};
use rtcc::linalg::Vector3;
use rtcc::time::Unit;
use std::sync::Arc;

fn lunar_surface_table(hours: usize) -> EphemerisTable {
    let t0 = lunar_orbit_epoch();
    let samples = (0..=hours)
        .map(|i| {
            StateVector::new(
                t0 + (i as f64) * Unit::Hour,
                Vector3::new(1_735.4, 0.0, 0.0),
                Vector3::zeros(),
                CoordinateSystem::MCT,
            )
        })
        .collect();
    EphemerisTable::new("LM", samples).unwrap()
}

#[test]
fn replacement_bumps_the_update_number() {
    let mut store = EphemerisStore::new();
    assert!(store.snapshot("LM").is_none());

    assert_eq!(store.replace(lunar_surface_table(4)), 0);
    let first = store.snapshot("LM").unwrap();
    assert!(store.is_current(&first));

    assert_eq!(store.replace(lunar_surface_table(6)), 1);
    let second = store.snapshot("LM").unwrap();
    assert_eq!(second.update_number(), 1);
    assert_eq!(second.len(), 7);

    // The earlier snapshot is still readable, but stale
    assert_eq!(first.len(), 5);
    assert!(!store.is_current(&first));
    assert!(store.is_current(&second));
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn lunar_stay_is_flagged() {
    let t0 = lunar_orbit_epoch();
    let table = lunar_surface_table(8)
        .with_lunar_stay(LunarStay {
            landing: t0 + 2.0 * Unit::Hour,
            liftoff: t0 + 6.0 * Unit::Hour,
        })
        .unwrap();
    let ctx = crate::apollo11_context();

    let on_surface = ctx.interpolate(&table, t0 + 3.5 * Unit::Hour, false).unwrap();
    assert!(on_surface.on_surface);
    assert_eq!(on_surface.bounds, (t0 + 2.0 * Unit::Hour, t0 + 6.0 * Unit::Hour));

    let before = ctx.interpolate(&table, t0 + 1.5 * Unit::Hour, false).unwrap();
    assert!(!before.on_surface);
    assert_eq!(before.bounds.1, t0 + 2.0 * Unit::Hour);
    assert!((before.state.radius_km.x - 1_735.4).abs() < 1e-9);

    assert!(lunar_surface_table(2)
        .with_lunar_stay(LunarStay {
            landing: t0 + 2.0 * Unit::Hour,
            liftoff: t0,
        })
        .is_err());
}
