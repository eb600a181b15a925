use posture_config::{ReplayRow, load_replay_csv};
use rstest::rstest;
use std::fs;
use tempfile::tempdir;

#[test]
fn loads_rows_in_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.csv");
    fs::write(
        &path,
        "ax,ay,az,gx,gy,gz\n0.0,0.0,1.0,0.1,0.0,0.0\n0.26, 0.0, 0.97, 1.5, -0.5, 0.0\n",
    )
    .unwrap();

    let rows = load_replay_csv(&path).expect("load replay");
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[1],
        ReplayRow {
            ax: 0.26,
            ay: 0.0,
            az: 0.97,
            gx: 1.5,
            gy: -0.5,
            gz: 0.0
        }
    );
}

#[rstest]
#[case("x,y,z,gx,gy,gz\n0,0,1,0,0,0\n", "must have headers")]
#[case("ax,ay,az,gx,gy,gz\n0,0,abc,0,0,0\n", "invalid CSV row 2")]
#[case("ax,ay,az,gx,gy,gz\n", "has no samples")]
fn rejects_malformed_files(#[case] body: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    fs::write(&path, body).unwrap();
    let err = load_replay_csv(&path).expect_err("should fail");
    let msg = format!("{err}");
    assert!(msg.contains(needle), "expected '{needle}' in '{msg}'");
}

#[test]
fn missing_file_reports_path() {
    let err = load_replay_csv(std::path::Path::new("/nonexistent/session.csv")).unwrap_err();
    assert!(format!("{err}").contains("open replay CSV"));
}
