use fwcheck_core::findings::{FindingLog, FindingSink, Location, Severity};
use fwcheck_core::klog::classify::builtin_patterns;
use fwcheck_core::klog::{
    normalize, scan, CaptureFile, Classifier, LogError, LogLine, LogScanner, MemoryLog,
    OopsClassifier, PatternClassifier, PatternRule,
};

/// Records every flush it sees, matching lines whose text equals `target`.
#[derive(Default)]
struct Recorder {
    target: Option<&'static str>,
    flushes: Vec<(String, usize, Option<String>)>,
    hits: usize,
}

impl Classifier for Recorder {
    fn classify(
        &mut self,
        line: &LogLine,
        previous: Option<&LogLine>,
        _sink: &mut dyn FindingSink,
    ) -> bool {
        self.flushes.push((line.text.clone(), line.repeat, previous.map(|p| p.text.clone())));
        if Some(line.text.as_str()) == self.target {
            self.hits += 1;
            return true;
        }
        false
    }
}

#[test]
fn repeated_lines_flush_once_with_their_count_in_order() {
    let source = MemoryLog::new(["a", "a", "a", "b"]);
    let mut recorder = Recorder::default();
    let mut log = FindingLog::new();
    let summary = scan(&source, &mut recorder, &mut log).unwrap();

    assert_eq!(
        recorder.flushes,
        vec![("a".to_string(), 3, None), ("b".to_string(), 1, Some("a".to_string()))]
    );
    assert_eq!(summary.lines, 4);
    assert_eq!(summary.distinct, 2);
}

#[test]
fn repeats_collapse_before_classification() {
    let source = MemoryLog::new(["b", "b", "b", "a"]);
    let mut recorder = Recorder { target: Some("b"), ..Default::default() };
    let summary = scan(&source, &mut recorder, &mut FindingLog::new()).unwrap();
    assert_eq!(recorder.hits, 1);
    assert_eq!(summary.matched, 1);
}

#[test]
fn non_adjacent_duplicates_are_separate_occurrences() {
    let source = MemoryLog::new(["a", "b", "a"]);
    let mut recorder = Recorder { target: Some("a"), ..Default::default() };
    scan(&source, &mut recorder, &mut FindingLog::new()).unwrap();
    assert_eq!(recorder.hits, 2);
    assert_eq!(recorder.flushes[2].2.as_deref(), Some("b"));
}

#[test]
fn lines_differing_only_in_timestamp_collapse() {
    let mut scanner = LogScanner::new();
    let mut recorder = Recorder::default();
    let mut log = FindingLog::new();
    scanner.push("[    1.000000] usb 1-1: reset", &mut recorder, &mut log);
    scanner.push("[    1.500000] usb 1-1: reset", &mut recorder, &mut log);
    scanner.push("<6>[    2.000000] usb 1-1: reset", &mut recorder, &mut log);
    let summary = scanner.finish(&mut recorder, &mut log);
    assert_eq!(summary.distinct, 1);
    assert_eq!(recorder.flushes[0].1, 3);
}

#[test]
fn empty_log_classifies_nothing() {
    let mut recorder = Recorder::default();
    let summary = scan(&MemoryLog::default(), &mut recorder, &mut FindingLog::new()).unwrap();
    assert_eq!(summary.distinct, 0);
    assert!(recorder.flushes.is_empty());
}

#[test]
fn repeated_oops_marker_collapses_into_one_dump() {
    let source = MemoryLog::new([
        "[  10.0] BUG: unable to handle page fault for address: 0000000000000010",
        "[  10.1] BUG: unable to handle page fault for address: 0000000000000010",
        "[  10.2] Oops: 0000 [#1] SMP",
        "[  10.3] RIP: 0010:acpi_ns_lookup+0x1a/0x40",
    ]);
    let mut classifier = OopsClassifier::new();
    let mut log = FindingLog::new();
    scan(&source, &mut classifier, &mut log).unwrap();

    assert_eq!(classifier.counters.oops, 1);
    assert_eq!(log.with_id("KlogOops").count(), 1);
    assert_eq!(log.count_at(Severity::Critical), 1);
    assert!(log.findings[0].message.contains("repeated 2 times"));
}

#[test]
fn realistic_oops_and_warn_dumps_count_once_each() {
    let source = MemoryLog::new([
        "[   5.000000] ACPI: bus type PCI registered",
        "[  12.000001] BUG: kernel NULL pointer dereference, address: 0000000000000008",
        "[  12.000002] #PF: supervisor read access in kernel mode",
        "[  12.000003] PGD 0 P4D 0",
        "[  12.000004] Oops: 0000 [#1] PREEMPT SMP NOPTI",
        "[  12.000005] CPU: 2 PID: 311 Comm: modprobe Not tainted 6.8.0 #1",
        "[  12.000006] Hardware name: Vendor Board/Board, BIOS 1.02 01/01/2024",
        "[  12.000007] RIP: 0010:acpi_ns_lookup+0x1a/0x40",
        "[  12.000008] Code: 48 8b 47 08 c3 <0f> 0b",
        "[  12.000009] RSP: 0018:ffffb1c0c0a3fc48 EFLAGS: 00010246",
        "[  12.000010] RAX: 0000000000000000 RBX: ffff9a4c01234000 RCX: 0000000000000000",
        "[  12.000011] Call Trace:",
        "[  12.000012]  <TASK>",
        "[  12.000013]  ? __die+0x24/0x70",
        "[  12.000014]  acpi_evaluate_object+0x1c4/0x2f0",
        "[  12.000015]  </TASK>",
        "[  12.000016] Modules linked in: foo(+) bar",
        "[  12.000017] CR2: 0000000000000008",
        "[  12.000018] ---[ end trace 0000000000000000 ]---",
        "[  13.000000] usb 1-1: new high-speed USB device number 2",
        "[  20.000001] ------------[ cut here ]------------",
        "[  20.000002] WARNING: CPU: 1 PID: 1 at drivers/acpi/scan.c:99 acpi_scan+0x10/0x20",
        "[  20.000003] Modules linked in:",
        "[  20.000004] CPU: 1 PID: 1 Comm: swapper/0 Not tainted 6.8.0 #1",
        "[  20.000005] RIP: 0010:acpi_scan+0x10/0x20",
        "[  20.000006] Call Trace:",
        "[  20.000007]  <TASK>",
        "[  20.000008]  do_one_initcall+0x41/0x200",
        "[  20.000009]  </TASK>",
        "[  20.000010] ---[ end trace 0000000000000000 ]---",
        "[  21.000000] EXT4-fs (sda1): mounted filesystem",
    ]);
    let mut classifier = OopsClassifier::new();
    let mut log = FindingLog::new();
    scan(&source, &mut classifier, &mut log).unwrap();

    assert_eq!(classifier.counters.oops, 1);
    assert_eq!(classifier.counters.warn, 1);
    assert_eq!(classifier.counters.call_trace, 0);
    let ids: Vec<&str> = log.findings.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, ["KlogOops", "KlogWarnOn"]);
    assert_eq!(log.findings[0].location, Location::LogLine { line: 2 });
    assert_eq!(log.findings[1].location, Location::LogLine { line: 22 });
}

#[test]
fn panic_after_an_oops_dump_is_the_same_fault() {
    let source = MemoryLog::new([
        "Oops: general protection fault, probably for non-canonical address 0xdead: 0000 [#1] SMP",
        "RIP: 0010:acpi_ps_parse_aml+0x2b/0x300",
        "---[ end trace 0000000000000000 ]---",
        "RIP: 0010:acpi_ps_parse_aml+0x2b/0x300",
        "Kernel panic - not syncing: Fatal exception",
        "---[ end Kernel panic - not syncing: Fatal exception ]---",
    ]);
    let mut classifier = OopsClassifier::new();
    let mut log = FindingLog::new();
    scan(&source, &mut classifier, &mut log).unwrap();

    assert_eq!(classifier.counters.oops, 1);
    assert_eq!(log.with_id("KlogOops").count(), 1);
}

#[test]
fn call_trace_outside_any_dump_is_unattributed() {
    let source = MemoryLog::new([
        "WARNING: CPU: 0 PID: 1 at drivers/acpi/x.c:10 foo+0x1/0x2",
        "Call Trace:",
        "  dump_stack+0x1/0x2",
        "---[ end trace 0000000000000000 ]---",
        "INFO: task kworker/0:1 blocked for more than 120 seconds.",
        "Call Trace:",
        " schedule+0x2d/0x90",
    ]);
    let mut classifier = OopsClassifier::new();
    let mut log = FindingLog::new();
    scan(&source, &mut classifier, &mut log).unwrap();

    assert_eq!(classifier.counters.warn, 1);
    assert_eq!(classifier.counters.call_trace, 1);
    let warn: Vec<_> = log.with_id("KlogWarnOn").collect();
    assert_eq!(warn.len(), 1);
    assert_eq!(warn[0].location, Location::LogLine { line: 1 });
    let traces: Vec<_> = log.with_id("KlogCallTrace").collect();
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].location, Location::LogLine { line: 6 });
}

#[test]
fn clean_log_passes_oops_check() {
    let source = MemoryLog::new(["Linux version 6.8.0", "ACPI: RSDT 0x00000000BFFE1E2E"]);
    let mut classifier = OopsClassifier::new();
    let mut log = FindingLog::new();
    scan(&source, &mut classifier, &mut log).unwrap();
    assert!(log.findings.is_empty());
    assert_eq!(log.passes, 1);
}

#[test]
fn pattern_catalog_matches_first_rule_and_counts_per_id() {
    let source = MemoryLog::new([
        "[    0.5] ACPI Error: AE_NOT_FOUND, While resolving a named reference",
        "[    0.6] ACPI Error: AE_NOT_FOUND, While resolving a named reference",
        "[    0.7] [Firmware Bug]: TSC_DEADLINE disabled due to Errata",
        "[    0.8] ACPI Warning: SystemIO range conflicts",
        "[    0.9] nothing to see here",
    ]);
    let mut classifier = PatternClassifier::with_builtin(Vec::new()).unwrap();
    let mut log = FindingLog::new();
    scan(&source, &mut classifier, &mut log).unwrap();

    assert_eq!(classifier.counters.pattern("KlogAcpiError"), 1);
    assert_eq!(classifier.counters.pattern("KlogFirmwareBug"), 1);
    assert_eq!(classifier.counters.pattern("KlogAcpiWarning"), 1);
    assert_eq!(classifier.counters.total(), 3);
    assert_eq!(log.findings.len(), 3);
    assert!(log.findings[0].advice.is_some());
}

#[test]
fn extra_patterns_extend_the_catalog() {
    let extra = PatternRule::new("KlogThermal", r"thermal .* critical", Severity::High, None);
    let source = MemoryLog::new(["thermal zone0: critical temperature reached"]);
    let mut classifier = PatternClassifier::with_builtin(vec![extra]).unwrap();
    let mut log = FindingLog::new();
    scan(&source, &mut classifier, &mut log).unwrap();
    assert_eq!(classifier.counters.pattern("KlogThermal"), 1);
}

#[test]
fn capture_file_is_scanned_lazily_from_disk() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("dmesg.log");
    std::fs::write(&path, "[ 0.1] one\r\n[ 0.2] one\n[ 0.3] two\n").unwrap();

    let mut recorder = Recorder::default();
    let summary = scan(&CaptureFile::new(&path), &mut recorder, &mut FindingLog::new()).unwrap();
    assert_eq!(summary.lines, 3);
    assert_eq!(recorder.flushes[0], ("one".to_string(), 2, None));
    assert_eq!(recorder.flushes[1].0, "two");
}

#[test]
fn unavailable_source_fails_before_any_line() {
    let mut recorder = Recorder::default();
    let err = scan(&CaptureFile::new("/nonexistent/dmesg.log"), &mut recorder, &mut FindingLog::new())
        .unwrap_err();
    assert!(matches!(err, LogError::Unavailable { .. }));
    assert!(recorder.flushes.is_empty());
}

#[test]
fn directory_capture_path_is_unavailable() {
    let temp = tempfile::tempdir().unwrap();
    let mut recorder = Recorder::default();
    let err = scan(&CaptureFile::new(temp.path()), &mut recorder, &mut FindingLog::new()).unwrap_err();
    assert!(matches!(err, LogError::Unavailable { .. }));
    assert!(recorder.flushes.is_empty());
}

#[test]
fn normalize_strips_level_and_timestamp() {
    assert_eq!(normalize("<4>[    1.234567] ACPI Error: x"), "ACPI Error: x");
    assert_eq!(normalize("[12345.000001] usb 1-1: new device"), "usb 1-1: new device");
    assert_eq!(normalize("[drm] not a timestamp"), "[drm] not a timestamp");
    assert_eq!(normalize("plain line\n"), "plain line");
}

#[test]
fn builtin_patterns_compile() {
    let classifier = PatternClassifier::with_builtin(Vec::new()).unwrap();
    assert_eq!(classifier.len(), builtin_patterns().len());
}

#[test]
fn invalid_pattern_names_its_rule() {
    let bad = PatternRule::new("Broken", "(", Severity::Low, None);
    let err = PatternClassifier::new(vec![bad]).err().unwrap();
    assert_eq!(err.id, "Broken");
}
