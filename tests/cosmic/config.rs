use rtcc::io::{BodyConstants, ConfigRepr, SystemParameters};
use std::path::PathBuf;

#[test]
fn load_system_parameters() {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap_or(".".to_string()));
    let params =
        SystemParameters::load(manifest_dir.join("data/system_parameters.yaml")).unwrap();
    params.validate().unwrap();

    assert_eq!(params.earth, BodyConstants::earth());
    assert_eq!(params.moon, BodyConstants::moon());
    assert_eq!(params.ephemeris.default_order, 8);
    assert_eq!(params.ephemeris.extrapolation_margin_s, 4.0 * 3600.0);
    // Unlisted solver settings keep their defaults
    assert_eq!(
        params.solver.ldpp_lltpr_max_iterations,
        SystemParameters::default().solver.ldpp_lltpr_max_iterations
    );
}

#[test]
fn missing_file() {
    assert!(SystemParameters::load("data/no_such_file.yaml").is_err());
}
