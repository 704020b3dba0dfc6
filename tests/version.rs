use nifio::version::{parse_version_line, to_file, V10_1_0_106, V20_0_0_5, V20_2_0_7, V3_1};
use nifio::NiVersion;

#[test]
fn packing() {
    assert_eq!(to_file(20, 2, 0, 7), 0x14020007);
    assert_eq!(to_file(4, 0, 0, 2), 0x04000002);
    assert!(to_file(20, 2, 0, 7) > to_file(20, 1, 0, 3));
}

#[test]
fn render_families() {
    let netimmerse = NiVersion::new(to_file(4, 0, 0, 2), 0, 0);
    assert_eq!(
        netimmerse.string(),
        "NetImmerse File Format, Version 4.0.0.2"
    );

    let gamebryo = NiVersion::new(to_file(20, 2, 0, 7), 0, 0);
    assert_eq!(gamebryo.string(), "Gamebryo File Format, Version 20.2.0.7");

    // At or below 3.1 only the first two components render.
    let old = NiVersion::new(V3_1, 0, 0);
    assert_eq!(old.string(), "NetImmerse File Format, Version 3.1");

    let mut nds = NiVersion::new(to_file(20, 3, 0, 8), 0, 0);
    nds.set_nds(1);
    assert_eq!(nds.string(), "NDSNIF....@....@...., Version 20.3.0.8");
}

#[test]
fn string_symmetry() {
    // Parsing a rendered version line recovers the packed version for
    // every file above 3.1, across a spread of component values.
    let values = [0u8, 1, 2, 9, 10, 25, 99, 100, 101, 199, 200, 249, 250, 255];

    for &a in &values {
        for &b in &values {
            for (c, d) in [(0u8, 0u8), (1, 255), (255, 1), (103, 9)] {
                let file = to_file(a, b, c, d);
                if file <= V3_1 {
                    continue;
                }

                let rendered = NiVersion::new(file, 0, 0).string();
                let parsed = parse_version_line(&rendered).expect("family must match");
                assert_eq!(parsed.file, file, "line: {rendered}");
                assert!(!parsed.nds);
            }
        }
    }
}

#[test]
fn parse_rejects_foreign_lines() {
    assert!(parse_version_line("PNG\r\n").is_none());
    assert!(parse_version_line("").is_none());
    assert!(parse_version_line("Gamebody File Format, Version 20.2.0.7").is_none());
}

#[test]
fn parse_without_version_suffix() {
    let parsed = parse_version_line("Gamebryo File Format").expect("family matches");
    assert_eq!(parsed.file, 0);
}

#[test]
fn numeric_scan_limits() {
    // Components above 255 split the way a bounded left-to-right scan
    // splits them: "300" reads as 30 followed by 0.
    let parsed = parse_version_line("Gamebryo File Format, Version 300.1").unwrap();
    assert_eq!(parsed.file, to_file(30, 0, 1, 0));

    // Multi-digit components never start with a zero.
    let parsed = parse_version_line("Gamebryo File Format, Version 20.07").unwrap();
    assert_eq!(parsed.file, to_file(20, 0, 7, 0));
}

#[test]
fn nds_marker() {
    let parsed = parse_version_line("NDSNIF....@....@...., Version 20.3.0.8").unwrap();
    assert!(parsed.nds);
    assert_eq!(parsed.file, to_file(20, 3, 0, 8));
}

#[test]
fn bethesda_tuples() {
    assert!(NiVersion::new(V20_2_0_7, 12, 83).is_bethesda());
    assert!(NiVersion::new(V20_2_0_7, 12, 83).is_skyrim());
    assert!(NiVersion::new(V20_2_0_7, 12, 100).is_skyrim_se());
    assert!(NiVersion::new(V20_2_0_7, 12, 130).is_fallout4());
    assert!(NiVersion::new(V20_2_0_7, 12, 155).is_fallout76());
    assert!(NiVersion::new(V20_2_0_7, 12, 34).is_fallout3());

    assert!(NiVersion::new(V10_1_0_106, 11, 0).is_oblivion());
    assert!(NiVersion::new(V20_0_0_5, 11, 0).is_oblivion());
    assert!(!NiVersion::new(V20_0_0_5, 10, 0).is_oblivion());

    assert!(!NiVersion::new(V20_2_0_7, 0, 0).is_bethesda());
    assert!(!NiVersion::new(to_file(20, 6, 0, 0), 12, 83).is_bethesda());
}

#[test]
fn info_summary() {
    let version = NiVersion::new(V20_2_0_7, 12, 83);
    let info = version.info();
    assert!(info.starts_with("Gamebryo File Format, Version 20.2.0.7"));
    assert!(info.contains("User Version: 12"));
    assert!(info.contains("Stream Version: 83"));
}
