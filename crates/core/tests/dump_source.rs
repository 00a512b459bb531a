use fwcheck_core::tables::source::DumpSource;
use fwcheck_core::tables::{ByteSource, Origin, Signature, TableError, TableRegistry};

fn sig(s: &str) -> Signature {
    s.parse().expect("signature")
}

/// A 40-byte RSDT with one entry, checksum fixed, as acpidump would print it.
fn rsdt_dump() -> String {
    let mut bytes = vec![0u8; 40];
    bytes[..4].copy_from_slice(b"RSDT");
    bytes[4] = 40;
    bytes[8] = 1;
    bytes[10..16].copy_from_slice(b"BOCHS ");
    bytes[36..40].copy_from_slice(&0xBFFE_1000u32.to_le_bytes());
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    bytes[9] = 0u8.wrapping_sub(sum);

    let mut out = String::from("RSDT @ 0x00000000BFFE1E2E\n");
    for (i, chunk) in bytes.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
        out.push_str(&format!("    {:04X}: {}  ................\n", i * 16, hex.join(" ")));
    }
    out.push('\n');
    out
}

#[test]
fn dump_file_tables_validate_like_firmware_tables() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("acpi.dat");
    std::fs::write(&path, rsdt_dump()).unwrap();

    let source = DumpSource::from_file(&path);
    assert_eq!(source.available().unwrap(), vec![sig("RSDT")]);
    let registry = TableRegistry::new(source);
    let set = registry.get(sig("RSDT")).unwrap();
    let instance = &set.instances()[0];
    assert!(instance.checksum_ok());
    assert_eq!(instance.len(), 40);
    assert_eq!(instance.header().oem_id, "BOCHS");
    assert_eq!(instance.origin(), &Origin::Dump(path));
    assert!(matches!(registry.get(sig("XSDT")), Err(TableError::NotFound(_))));
}

#[test]
fn unparsable_dump_file_is_an_acquisition_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("acpi.dat");
    std::fs::write(&path, "RSDT @ 0x0\n    0000: ZZ\n").unwrap();
    let source = DumpSource::from_file(&path);
    assert!(matches!(source.load(sig("RSDT")), Err(TableError::Acquisition { .. })));
}

#[cfg(unix)]
fn write_script(dir: &std::path::Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

#[cfg(unix)]
#[test]
fn dump_tool_output_is_captured_once_and_parsed() {
    let temp = tempfile::tempdir().unwrap();
    let dump = temp.path().join("out.txt");
    std::fs::write(&dump, rsdt_dump()).unwrap();
    let counter = temp.path().join("runs");
    let script = write_script(
        temp.path(),
        "fake-acpidump",
        &format!("#!/bin/sh\necho run >> {}\ncat {}\n", counter.display(), dump.display()),
    );

    let source = DumpSource::from_tool(&script, Vec::new());
    assert_eq!(source.load(sig("RSDT")).unwrap().len(), 1);
    assert!(matches!(source.load(sig("FACP")), Err(TableError::NotFound(_))));
    let runs = std::fs::read_to_string(&counter).unwrap();
    assert_eq!(runs.lines().count(), 1);
}

#[cfg(unix)]
#[test]
fn failing_dump_tool_is_an_acquisition_error() {
    let temp = tempfile::tempdir().unwrap();
    let script = write_script(temp.path(), "broken-acpidump", "#!/bin/sh\necho nope >&2\nexit 3\n");
    let source = DumpSource::from_tool(&script, Vec::new());
    match source.load(sig("RSDT")) {
        Err(TableError::Acquisition { reason, .. }) => assert!(reason.contains("nope"), "{reason}"),
        other => panic!("expected acquisition error, got {other:?}"),
    }
}
