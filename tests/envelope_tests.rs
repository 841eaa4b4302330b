use tactus::kernel::config::{ConfigError, ControllerConfig};
use tactus::kernel::envelope::{EnvelopeLimits, RiskEvaluator, SensorFrame};
use tactus::kernel::hazard::{HazardLevel, HazardView};

fn view(source: &str, level: HazardLevel) -> HazardView {
    HazardView { source: source.to_string(), level }
}

#[test]
fn disagreeing_sensors_resolve_to_the_most_restrictive() {
    let limits = EnvelopeLimits::default();
    let mut sensors = SensorFrame::quiescent(1_000);
    sensors.hazard_views = vec![
        view("thermal", HazardLevel::Red),
        view("optical", HazardLevel::Green),
    ];

    let status = RiskEvaluator::new().evaluate(&sensors, None, &limits);
    assert_eq!(status.effective_hazard, HazardLevel::Red);
    assert!(!status.risk_ok, "thermal RED beats optical GREEN");
}

#[test]
fn yellow_view_degrades_but_does_not_block() {
    let limits = EnvelopeLimits::default();
    let mut sensors = SensorFrame::quiescent(1_000);
    sensors.hazard_views = vec![
        view("optical", HazardLevel::Yellow),
        view("thermal", HazardLevel::Green),
    ];

    let status = RiskEvaluator::new().evaluate(&sensors, None, &limits);
    assert_eq!(status.effective_hazard, HazardLevel::Yellow);
    assert!(status.risk_ok, "only RED blocks risk");
}

#[test]
fn each_reading_is_checked_against_its_limit() {
    let limits = EnvelopeLimits::default();
    let evaluator = RiskEvaluator::new();

    let mut sensors = SensorFrame::quiescent(1_000);
    sensors.force_peak_n = limits.max_force_n + 0.1;
    let status = evaluator.evaluate(&sensors, None, &limits);
    assert!(!status.force_ok);
    assert!(status.violated());
    assert!(status.breach_detail().unwrap().contains("overforce"));

    let mut sensors = SensorFrame::quiescent(1_000);
    sensors.temp_c = limits.max_temp_c + 1.0;
    let status = evaluator.evaluate(&sensors, None, &limits);
    assert!(!status.temp_ok);
    assert!(status.breach_detail().unwrap().contains("overtemp"));

    let mut sensors = SensorFrame::quiescent(1_000);
    sensors.current_a = limits.max_current_a + 0.5;
    let status = evaluator.evaluate(&sensors, None, &limits);
    assert!(!status.current_ok);

    let mut sensors = SensorFrame::quiescent(1_000);
    sensors.torque_nm = limits.max_torque_nm + 0.1;
    let status = evaluator.evaluate(&sensors, None, &limits);
    assert!(!status.torque_ok);
}

#[test]
fn readings_at_the_limit_are_still_ok() {
    let limits = EnvelopeLimits::default();
    let mut sensors = SensorFrame::quiescent(1_000);
    sensors.force_peak_n = limits.max_force_n;
    sensors.temp_c = limits.max_temp_c;

    let status = RiskEvaluator::new().evaluate(&sensors, None, &limits);
    assert!(!status.violated(), "limits are inclusive caps");
}

#[test]
fn default_config_validates() {
    assert_eq!(ControllerConfig::default().validate(), Ok(()));
}

#[test]
fn slow_revalidation_is_rejected() {
    let mut config = ControllerConfig::default();
    config.revalidate_hz = 10;
    assert_eq!(config.validate(), Err(ConfigError::RevalidateTooSlow(10)));
}

#[test]
fn inverted_dwell_bounds_are_rejected() {
    let mut config = ControllerConfig::default();
    config.limits.dwell_ms_min = 4_000;
    config.limits.dwell_ms_max = 3_000;
    assert_eq!(
        config.validate(),
        Err(ConfigError::DwellBoundsInverted { min: 4_000, max: 3_000 })
    );
}

#[test]
fn unreachable_red_stop_budget_is_rejected() {
    let mut config = ControllerConfig::default();
    // 20 Hz gives a 50ms guard period; a 40ms stop budget cannot be met.
    config.red_stop_ms = 40;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::RedStopUnreachable { .. })
    ));
}

#[test]
fn zero_timeouts_are_rejected() {
    let mut config = ControllerConfig::default();
    config.precontact_timeout_ms = 0;
    assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout("precontact")));
}

#[test]
fn nonpositive_limits_are_rejected() {
    let mut config = ControllerConfig::default();
    config.limits.max_force_n = 0.0;
    assert_eq!(config.validate(), Err(ConfigError::NonPositiveLimit("force")));
}

#[test]
fn bad_impedance_band_is_rejected() {
    let mut config = ControllerConfig::default();
    config.limits.impedance_normal.min = 0.9;
    config.limits.impedance_normal.max = 0.2;
    assert_eq!(
        config.validate(),
        Err(ConfigError::ImpedanceBandInvalid("normal"))
    );
}
