use super::*;
use std::io::Write;

fn fixture(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write fixture");
    file
}

#[test]
fn loads_row_major_volume_with_axes() {
    let file = fixture(
        r#"{"shape": [1, 2, 3], "axes_orientation": [0, 1, 2], "data": [0, 1, 2, 3, 4, 5]}"#,
    );
    let loaded = JsonVolumeSource.load(file.path()).expect("load");
    assert_eq!(loaded.volume.dim(), (1, 2, 3));
    assert_eq!(loaded.volume[[0, 1, 0]], 3.0);
    assert_eq!(loaded.axes, Some([0, 1, 2]));
}

#[test]
fn axes_are_optional() {
    let file = fixture(r#"{"shape": [1, 1, 2], "data": [7, 8]}"#);
    let loaded = JsonVolumeSource.load(file.path()).expect("load");
    assert_eq!(loaded.axes, None);
}

#[test]
fn unsupported_axes_are_left_for_normalization() {
    let file = fixture(r#"{"shape": [1, 1, 1], "axes_orientation": [4, 4, 4], "data": [1]}"#);
    let loaded = JsonVolumeSource.load(file.path()).expect("load");
    let image = crate::normalize(&loaded.volume, loaded.axes);
    assert_eq!(image.title, "No orientation");
}

#[test]
fn shape_mismatch_is_reported() {
    let file = fixture(r#"{"shape": [2, 2, 2], "data": [1, 2, 3]}"#);
    let err = JsonVolumeSource.load(file.path()).expect_err("mismatch");
    assert!(matches!(err, LoadError::Shape { len: 3, .. }), "{err}");
}

#[test]
fn negative_intensities_are_rejected() {
    let file = fixture(r#"{"shape": [1, 1, 2], "data": [1, -2]}"#);
    let err = JsonVolumeSource.load(file.path()).expect_err("negative");
    assert!(matches!(err, LoadError::Intensity { .. }));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = JsonVolumeSource
        .load(&dir.path().join("absent.json"))
        .expect_err("missing");
    assert!(matches!(err, LoadError::Io { .. }));
}

#[test]
fn malformed_json_is_a_parse_error() {
    let file = fixture("{not json");
    let err = JsonVolumeSource.load(file.path()).expect_err("malformed");
    assert!(matches!(err, LoadError::Parse { .. }));
}
