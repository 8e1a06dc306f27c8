use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn setup() -> Result<TempDir, Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let data = dir.path().join("data");
    fs::create_dir_all(data.join("subdir"))?;
    fs::write(data.join("a.txt"), "hello world\nnothing here\n")?;
    fs::write(data.join("b.txt"), "no match in this one\n")?;
    fs::write(data.join("subdir/nested.md"), "say Hello again\n")?;
    fs::write(data.join("blob.bin"), b"\x00\x01hello\x02")?;

    let results = dir.path().join("results");
    fs::write(
        dir.path().join("config.toml"),
        format!(
            "[general]\ncontext_chars = 5\ntimeout_seconds = 0\n\n\
             [filters]\nexcluded_extensions = \"\"\nmax_depth = 0\n\n\
             [output]\nsave_results = false\nresults_folder = {:?}\nhighlight_matches = false\n",
            results.display().to_string()
        ),
    )?;
    Ok(dir)
}

fn fileder(dir: &Path) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("fileder")?;
    cmd.arg("--config")
        .arg(dir.join("config.toml"))
        .arg("--log")
        .arg(dir.join("logs/fileder.log"));
    Ok(cmd)
}

#[test]
fn search_prints_table_and_stats() -> Result<(), Box<dyn std::error::Error>> {
    let dir = setup()?;
    fileder(dir.path())?
        .arg("search")
        .arg("hello")
        .arg(dir.path().join("data"))
        .assert()
        .success()
        .stdout(predicate::str::contains("a.txt"))
        .stdout(predicate::str::contains("nested.md"))
        .stdout(predicate::str::contains("Binary data"))
        .stdout(predicate::str::contains("Matches found: 3"));
    assert!(dir.path().join("logs/fileder.log").exists());
    Ok(())
}

#[test]
fn json_output_and_case_sensitivity() -> Result<(), Box<dyn std::error::Error>> {
    let dir = setup()?;
    let output = fileder(dir.path())?
        .arg("search")
        .arg("Hello")
        .arg(dir.path().join("data"))
        .arg("--case-sensitive")
        .arg("--json")
        .output()?;
    assert!(output.status.success());

    let saved: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let results = saved["results"].as_array().ok_or("results missing")?;
    assert_eq!(results.len(), 1);
    assert!(results[0]["file"].as_str().unwrap_or("").ends_with("nested.md"));
    assert_eq!(results[0]["line_number"], 1);
    assert_eq!(results[0]["context"], "say Hello agai");
    Ok(())
}

#[test]
fn no_recursive_and_extension_filter() -> Result<(), Box<dyn std::error::Error>> {
    let dir = setup()?;
    fileder(dir.path())?
        .args(["search", "hello"])
        .arg(dir.path().join("data"))
        .args(["--no-recursive", "--extensions", "md", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"results\": []"));
    Ok(())
}

#[test]
fn saved_results_can_be_loaded() -> Result<(), Box<dyn std::error::Error>> {
    let dir = setup()?;
    let config = fs::read_to_string(dir.path().join("config.toml"))?
        .replace("save_results = false", "save_results = true");
    fs::write(dir.path().join("config.toml"), config)?;

    fileder(dir.path())?
        .args(["search", "hello"])
        .arg(dir.path().join("data"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Results saved to"));

    let saved: Vec<_> = fs::read_dir(dir.path().join("results"))?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .collect();
    assert_eq!(saved.len(), 1);
    let name = saved[0].file_name().and_then(|n| n.to_str()).unwrap_or("");
    assert!(name.starts_with("search_hello_"));

    fileder(dir.path())?
        .arg("load")
        .assert()
        .success()
        .stdout(predicate::str::contains("search_hello_"));

    fileder(dir.path())?
        .arg("load")
        .arg(&saved[0])
        .assert()
        .success()
        .stdout(predicate::str::contains("Search for 'hello'"));
    Ok(())
}

#[test]
fn missing_root_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = setup()?;
    fileder(dir.path())?
        .args(["search", "hello"])
        .arg(dir.path().join("does-not-exist"))
        .assert()
        .failure();
    Ok(())
}

#[test]
fn config_show_and_save() -> Result<(), Box<dyn std::error::Error>> {
    let dir = setup()?;
    fileder(dir.path())?
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("context_chars       = 5"));

    let target = dir.path().join("copy.toml");
    fileder(dir.path())?
        .args(["config", "save"])
        .arg(&target)
        .assert()
        .success();
    assert!(fs::read_to_string(&target)?.contains("context_chars = 5"));
    Ok(())
}

#[test]
fn completions_are_generated() -> Result<(), Box<dyn std::error::Error>> {
    let dir = setup()?;
    fileder(dir.path())?
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fileder"));
    Ok(())
}
