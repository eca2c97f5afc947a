//! The bundled demo scenarios must stay loadable.

use aeroparcel::core::settings::Integrator;
use aeroparcel::Scenario;
use approx::assert_relative_eq;
use std::path::Path;

#[test]
fn test_marine_demo_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/marine.toml");
    let scenario = Scenario::from_path(&path).unwrap();
    scenario.validate().unwrap();

    assert_eq!(scenario.modes.len(), 2);
    assert_eq!(scenario.modes[0].label, "sulfate");
    assert_eq!(scenario.solver.integrator, Integrator::Cvode);

    let (end_time, output_interval) = scenario
        .solver
        .schedule(scenario.initial.updraft_velocity)
        .unwrap();
    assert_relative_eq!(end_time, 600.0);
    assert_relative_eq!(output_interval, 2.0);
}

#[test]
fn test_missing_scenario_is_config_error() {
    let err = Scenario::from_path("does/not/exist.toml").unwrap_err();
    assert!(matches!(err, aeroparcel::ParcelError::Config(_)));
}
