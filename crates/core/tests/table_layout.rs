use fwcheck_core::tables::dump::parse_dump;
use fwcheck_core::tables::header::byte_sum;
use fwcheck_core::tables::{checksum_ok, Signature, TableHeader, FACS_MIN_LEN, HEADER_SIZE};

#[test]
fn header_fields_are_read_verbatim() {
    let mut raw = vec![0u8; HEADER_SIZE];
    raw[..4].copy_from_slice(b"APIC");
    raw[4..8].copy_from_slice(&44u32.to_le_bytes());
    raw[8] = 3;
    raw[10..16].copy_from_slice(b"OEMID ");
    raw[16..24].copy_from_slice(b"TABLE\0\0\0");
    raw[28..32].copy_from_slice(b"INTL");
    raw[32..36].copy_from_slice(&0x2020_0925u32.to_le_bytes());

    let header = TableHeader::parse(&raw).unwrap();
    assert_eq!(&header.signature, b"APIC");
    assert_eq!(header.length(), 44);
    assert_eq!(header.revision, 3);
    assert_eq!(header.oem_id, "OEMID");
    assert_eq!(header.oem_table_id, "TABLE");
    assert_eq!(header.creator_id, "INTL");
    assert_eq!(header.creator_revision, 0x2020_0925);

    assert!(TableHeader::parse(&raw[..HEADER_SIZE - 1]).is_none());
}

#[test]
fn facs_prefix_reads_only_length_and_version() {
    let mut raw = vec![0xAAu8; FACS_MIN_LEN];
    raw[..4].copy_from_slice(b"FACS");
    raw[4..8].copy_from_slice(&(FACS_MIN_LEN as u32).to_le_bytes());
    raw[32] = 1;

    let header = TableHeader::parse_facs(&raw).unwrap();
    assert_eq!(header.length(), FACS_MIN_LEN);
    assert_eq!(header.revision, 1);
    assert_eq!(header.checksum, 0);
    assert!(header.oem_id.is_empty());
    assert!(header.creator_id.is_empty());
}

#[test]
fn checksum_wraps_modulo_256() {
    assert!(checksum_ok(&[0x80, 0x80]));
    assert!(!checksum_ok(&[0x80, 0x7f]));
    assert_eq!(byte_sum(&[]), 0);
}

#[test]
fn signature_rejects_wrong_width_and_control_bytes() {
    assert!("RSD".parse::<Signature>().is_err());
    assert!("RSDTX".parse::<Signature>().is_err());
    assert!(Signature::new(*b"RS\0T").is_err());
    assert_eq!("SSDT".parse::<Signature>().unwrap().to_string(), "SSDT");
}

#[test]
fn dump_text_parses_blocks_and_ignores_ascii_column() {
    let text = "\
RSDT @ 0x00000000BFFE1E2E
    0000: 52 53 44 54 08 00 00 00 01 9E 42 4F 43 48 53 20  RSDT4.....BOCHS
    0010: AB CD                                            ..

SSDT @ 0x1000
    0000: 53 53 44 54  SSDT
";
    let tables = parse_dump(text).unwrap();
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].name, "RSDT");
    assert_eq!(tables[0].address, Some(0xBFFE_1E2E));
    assert_eq!(tables[0].bytes.len(), 18);
    assert_eq!(&tables[0].bytes[16..], &[0xAB, 0xCD]);
    assert_eq!(tables[1].bytes, b"SSDT".to_vec());
}

#[test]
fn dump_text_rejects_offset_gaps_and_headless_data() {
    let err = parse_dump("FACP @ 0x0\n    0000: 00 01\n    0010: 02\n").unwrap_err();
    assert_eq!(err.line, 3);
    assert!(parse_dump("    0000: 00 01\n").is_err());
}
