use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// Compress then expand through the CLI and require the round trip to
/// reproduce the input exactly.
fn round_trip_test(dat: &[u8]) -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("expanded.bin");
    let cmp_path = temp_dir.path().join("compressed.lz77");
    let out_path = temp_dir.path().join("roundtrip.bin");
    std::fs::write(&in_path,dat)?;

    let mut cmd = Command::cargo_bin("lz77huff")?;
    cmd.arg("compress")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&cmp_path)
        .assert()
        .success()
        .stderr(predicate::str::contains("compressed"));

    let mut cmd = Command::cargo_bin("lz77huff")?;
    cmd.arg("expand")
        .arg("-i").arg(&cmp_path)
        .arg("-o").arg(&out_path)
        .assert()
        .success()
        .stderr(predicate::str::contains("expanded"));

    match (std::fs::read(&in_path),std::fs::read(&out_path)) {
        (Ok(v1),Ok(v2)) => {
            assert_eq!(v1,v2);
        },
        _ => panic!("unable to compare output with input")
    }
    Ok(())
}

#[test]
fn text_round_trip() -> STDRESULT {
    round_trip_test(
"To be, or not to be, that is the question:
Whether 'tis nobler in the mind to suffer
The slings and arrows of outrageous fortune,
Or to take arms against a sea of troubles
To be, or not to be, that is the question:
".as_bytes())
}

#[test]
fn binary_round_trip() -> STDRESULT {
    let dat: Vec<u8> = (0..5000u32).map(|i| (i*31 % 257) as u8).collect();
    round_trip_test(&dat)
}

#[test]
fn repetitive_round_trip() -> STDRESULT {
    round_trip_test(&vec![b'x';1000])
}

#[test]
fn empty_round_trip() -> STDRESULT {
    round_trip_test(&[])
}

#[test]
fn csv_export() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("expanded.txt");
    let cmp_path = temp_dir.path().join("compressed.lz77");
    let csv_path = temp_dir.path().join("probabilities.csv");
    std::fs::write(&in_path,"abracadabra")?;

    let mut cmd = Command::cargo_bin("lz77huff")?;
    cmd.arg("compress")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&cmp_path)
        .arg("--csv").arg(&csv_path)
        .assert()
        .success();

    let csv = std::fs::read_to_string(&csv_path)?;
    assert!(csv.starts_with("symbol,probability"));
    // 'a' occurs 5 times out of 11 symbols
    assert!(csv.contains(&format!("{},{}",b'a',5.0/11.0)));
    Ok(())
}
