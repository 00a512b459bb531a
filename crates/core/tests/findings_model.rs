use fwcheck_core::findings::{CheckOutcome, Finding, FindingLog, FindingSink, Location, Severity};

#[test]
fn advice_does_not_fail_a_check() {
    let mut log = FindingLog::new();
    log.record(Finding::advice(Location::Check, "Hint", "consider this"));
    assert_eq!(CheckOutcome::from_log(&log), CheckOutcome::Passed);

    log.record(Finding::failure(Location::Check, Severity::Low, "Bad", "broken"));
    assert_eq!(CheckOutcome::from_log(&log), CheckOutcome::Failed { failures: 1 });
    assert_eq!(log.count_at(Severity::Low), 1);
}

#[test]
fn severities_order_from_informational_to_critical() {
    assert!(Severity::Critical > Severity::High);
    assert!(Severity::High > Severity::Medium);
    assert!(Severity::Low > Severity::Informational);
}
