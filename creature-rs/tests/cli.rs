//! Command-line integration tests
//!
//! Each test writes a small two-bone asset into a temporary directory and
//! runs the real binary against it.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const IDENTITY: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
];

fn bone_frames(offset: impl Fn(f32) -> [f32; 2]) -> Value {
    let frames: Map<String, Value> = (0..=10)
        .map(|frame| {
            let [dx, dy] = offset(frame as f32);
            (
                frame.to_string(),
                json!({
                    "hip": { "start_pt": [dx, dy], "end_pt": [1.0 + dx, dy] },
                    "knee": { "start_pt": [1.0 + dx, dy], "end_pt": [2.0 + dx, dy] }
                }),
            )
        })
        .collect();
    Value::Object(frames)
}

fn write_asset(dir: &Path) -> PathBuf {
    let asset = json!({
        "mesh": {
            "points": [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 2.0, 0.0, 2.0, 1.0],
            "indices": [0, 1, 2, 0, 2, 3, 1, 4, 5, 1, 5, 2],
            "uvs": [0.0, 0.0, 0.5, 0.0, 0.5, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0],
            "regions": {
                "a_body": {
                    "id": 3, "start_pt_index": 0, "end_pt_index": 3,
                    "start_index": 0, "end_index": 5,
                    "weights": { "hip": [1.0, 1.0, 1.0, 1.0] }
                },
                "b_leg": {
                    "id": 4, "start_pt_index": 4, "end_pt_index": 5,
                    "start_index": 6, "end_index": 11,
                    "weights": { "knee": [1.0, 1.0] }
                }
            }
        },
        "skeleton": {
            "hip": {
                "id": 1, "restParentMat": IDENTITY,
                "localRestStartPt": [0.0, 0.0], "localRestEndPt": [1.0, 0.0],
                "children": [2]
            },
            "knee": {
                "id": 2, "restParentMat": IDENTITY,
                "localRestStartPt": [0.0, 0.0], "localRestEndPt": [1.0, 0.0],
                "children": []
            }
        },
        "animation": {
            "slide": { "bones": bone_frames(|t| [t, 0.0]) },
            "lift": { "bones": bone_frames(|t| [0.0, t]) }
        }
    });

    let path = dir.join("hero.json");
    std::fs::write(&path, serde_json::to_string_pretty(&asset).unwrap()).unwrap();
    path
}

fn creature_rs() -> Command {
    let mut cmd = Command::cargo_bin("creature-rs").unwrap();
    cmd.env_remove("CREATURE_ASSET");
    cmd
}

fn read_points(path: &Path) -> Vec<[f32; 3]> {
    let json: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    serde_json::from_value(json["points"].clone()).unwrap()
}

#[test]
fn test_info_summarizes_asset() {
    let dir = TempDir::new().unwrap();
    let asset = write_asset(dir.path());

    creature_rs()
        .arg("info")
        .arg(&asset)
        .assert()
        .success()
        .stdout(predicate::str::contains("Points:  6"))
        .stdout(predicate::str::contains("Bones:   2"))
        .stdout(predicate::str::contains("a_body"))
        .stdout(predicate::str::contains("Default clip: slide"));
}

#[test]
fn test_asset_path_from_environment() {
    let dir = TempDir::new().unwrap();
    let asset = write_asset(dir.path());

    creature_rs()
        .arg("info")
        .env("CREATURE_ASSET", &asset)
        .assert()
        .success()
        .stdout(predicate::str::contains("Regions: 2"));
}

#[test]
fn test_tree_shows_bone_hierarchy() {
    let dir = TempDir::new().unwrap();
    let asset = write_asset(dir.path());

    creature_rs()
        .args(["tree", "--no-color", "--bones-only", "--no-metadata"])
        .arg(&asset)
        .assert()
        .success()
        .stdout(predicate::str::contains("hero.json"))
        .stdout(predicate::str::contains("hip"))
        .stdout(predicate::str::contains("    └── 🦴 knee"));
}

#[test]
fn test_pose_writes_translated_points() {
    let dir = TempDir::new().unwrap();
    let asset = write_asset(dir.path());
    let output = dir.path().join("pose.json");

    creature_rs()
        .args(["pose", "--time", "5", "--output"])
        .arg(&output)
        .arg(&asset)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 6 points"));

    let points = read_points(&output);
    assert_eq!(points.len(), 6);
    assert!((points[0][0] - 5.0).abs() < 1e-4);
    assert!((points[5][0] - 7.0).abs() < 1e-4);
    assert!((points[5][2] + 0.001).abs() < 1e-6);
}

#[test]
fn test_verbose_flag_enables_info_logs() {
    let dir = TempDir::new().unwrap();
    let asset = write_asset(dir.path());

    creature_rs()
        .env_remove("RUST_LOG")
        .args(["-v", "pose", "--time", "5"])
        .arg(&asset)
        .assert()
        .success()
        .stderr(predicate::str::contains("Posed '"));
}

#[test]
fn test_default_level_hides_info_logs() {
    let dir = TempDir::new().unwrap();
    let asset = write_asset(dir.path());

    creature_rs()
        .env_remove("RUST_LOG")
        .args(["pose", "--time", "5"])
        .arg(&asset)
        .assert()
        .success()
        .stderr(predicate::str::contains("Posed '").not());
}

#[test]
fn test_pose_blends_two_clips() {
    let dir = TempDir::new().unwrap();
    let asset = write_asset(dir.path());
    let output = dir.path().join("blend.json");

    creature_rs()
        .args(["pose", "-a", "slide", "--blend-with", "lift", "--factor", "0.5"])
        .args(["-t", "4", "-o"])
        .arg(&output)
        .arg(&asset)
        .assert()
        .success();

    let points = read_points(&output);
    assert!((points[0][0] - 2.0).abs() < 1e-4);
    assert!((points[0][1] - 2.0).abs() < 1e-4);
}

#[test]
fn test_pose_prints_table_and_bounds() {
    let dir = TempDir::new().unwrap();
    let asset = write_asset(dir.path());

    creature_rs()
        .args(["pose", "--animation", "lift", "--time", "2", "--bounds"])
        .arg(&asset)
        .assert()
        .success()
        .stdout(predicate::str::contains("'lift' at frame 2"))
        .stdout(predicate::str::contains("Bounds: min (0.000, 2.000) max (2.000, 3.000)"));
}

#[test]
fn test_pose_unknown_animation_fails() {
    let dir = TempDir::new().unwrap();
    let asset = write_asset(dir.path());

    creature_rs()
        .args(["pose", "--animation", "dance"])
        .arg(&asset)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown animation 'dance'"));
}

#[test]
fn test_missing_asset_fails_with_context() {
    let dir = TempDir::new().unwrap();

    creature_rs()
        .arg("info")
        .arg(dir.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read asset"));
}

#[test]
fn test_bake_exports_every_frame() {
    let dir = TempDir::new().unwrap();
    let asset = write_asset(dir.path());
    let output = dir.path().join("baked.json");

    creature_rs()
        .args(["-q", "bake", "-a", "slide", "-o"])
        .arg(&output)
        .arg(&asset)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 1 baked clip(s)"));

    let json: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    let clips = json.as_array().unwrap();
    assert_eq!(clips.len(), 1);
    assert_eq!(clips[0]["name"], "slide");
    assert_eq!(clips[0]["frames"].as_array().unwrap().len(), 11);
    assert_eq!(clips[0]["frames"][10].as_array().unwrap().len(), 18);
}

#[test]
fn test_bake_all_clips_in_asset_order() {
    let dir = TempDir::new().unwrap();
    let asset = write_asset(dir.path());
    let output = dir.path().join("baked.json");

    creature_rs()
        .args(["-q", "bake", "-o"])
        .arg(&output)
        .arg(&asset)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 baked clip(s)"));

    let json: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|clip| clip["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["slide", "lift"]);
}

#[test]
fn test_contact_finds_posed_bone() {
    let dir = TempDir::new().unwrap();
    let asset = write_asset(dir.path());

    creature_rs()
        .arg("contact")
        .arg(&asset)
        .args(["4.5", "0.05", "--time", "3"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("knee"));

    creature_rs()
        .arg("contact")
        .arg(&asset)
        .args(["0.5", "-3", "--radius", "0.2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No bone within"));
}

#[test]
fn test_completions() {
    creature_rs()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("creature-rs"));
}
