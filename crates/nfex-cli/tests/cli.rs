use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn nfe(cnpj: &str, issuer: &str, total: &str, icms: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <NFe>
    <infNFe Id="NFe35240111222333000181550010000000011000000011" versao="4.00">
      <emit>
        <CNPJ>{cnpj}</CNPJ>
        <xNome>{issuer}</xNome>
      </emit>
      <total>
        <ICMSTot>
          <vNF>{total}</vNF>
          <vICMS>{icms}</vICMS>
        </ICMSTot>
      </total>
    </infNFe>
  </NFe>
</nfeProc>"#
    )
}

/// Command isolated from the user's configuration directory.
fn nfex(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("nfex").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.join("config"))
        .env("HOME", home)
        .env_remove("RUST_LOG");
    cmd
}

fn write_fixtures(dir: &Path) {
    fs::write(
        dir.join("a_beta.xml"),
        nfe("45997418000153", "Beta Comercio", "50.00", "9.00"),
    )
    .unwrap();
    fs::write(
        dir.join("b_acme.xml"),
        nfe("11222333000181", "Acme Ltda", "1234.50", "222.21"),
    )
    .unwrap();
}

fn run_batch(home: &Path, input: &Path, out: &Path, extra: &[&str]) -> Value {
    let pattern = input.join("*.xml");
    let output = nfex(home)
        .arg("batch")
        .arg(pattern.to_str().unwrap())
        .arg("-o")
        .arg(out)
        .args(extra)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn process_json() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("nota.xml");
    fs::write(&file, nfe("11222333000181", "Acme Ltda", "1234.50", "222.21")).unwrap();

    let output = nfex(tmp.path()).arg("process").arg(&file).output().unwrap();
    assert!(output.status.success());

    let record: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["source_name"], "nota.xml");
    assert_eq!(record["issuer_id"], "11222333000181");
    assert_eq!(record["issuer_name"], "Acme Ltda");
    assert_eq!(record["invoice_total"], "1234.50");
    assert_eq!(record["tax_total"], "222.21");
}

#[test]
fn process_text_and_csv() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("nota.xml");
    fs::write(&file, nfe("11222333000181", "Acme Ltda", "1234.50", "222.21")).unwrap();

    nfex(tmp.path())
        .args(["process", "--format", "text"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("11.222.333/0001-81"))
        .stdout(predicate::str::contains("Invoice: R$ 1.234,50"));

    nfex(tmp.path())
        .args(["process", "-f", "csv"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "source_name,issuer_id,issuer_name,invoice_total,tax_total\n",
        ))
        .stdout(predicate::str::contains(
            "nota.xml,11222333000181,Acme Ltda,1234.50,222.21",
        ));
}

#[test]
fn process_missing_field_names_it() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("sem-nome.xml");
    fs::write(
        &file,
        nfe("11222333000181", "", "10.00", "1.80"),
    )
    .unwrap();

    nfex(tmp.path())
        .arg("process")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("sem-nome.xml"))
        .stderr(predicate::str::contains("issuer_name"));
}

#[test]
fn process_missing_file() {
    let tmp = TempDir::new().unwrap();
    nfex(tmp.path())
        .args(["process", "nao-existe.xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn batch_writes_report() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("notas");
    let out = tmp.path().join("out");
    fs::create_dir(&input).unwrap();
    write_fixtures(&input);

    let response = run_batch(tmp.path(), &input, &out, &[]);
    assert_eq!(response["count"], 2);
    assert_eq!(response["invoice_sum"], "1284.50");
    assert_eq!(response["tax_sum"], "231.21");
    assert_eq!(response["records"][0]["source_name"], "a_beta.xml");
    assert!(response.get("failures").is_none());

    let name = response["table_file_reference"].as_str().unwrap();
    assert!(name.starts_with("relatorio_nfes_") && name.ends_with(".xlsx"));
    assert!(out.join(name).is_file());
    assert!(out.join(name.replace(".xlsx", ".json")).is_file());
}

#[test]
fn batch_aborts_on_first_failure() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("notas");
    let out = tmp.path().join("out");
    fs::create_dir(&input).unwrap();
    write_fixtures(&input);
    fs::write(
        input.join("c_broken.xml"),
        nfe("11222333000181", "Sem ICMS", "10.00", "").replace("<vICMS></vICMS>", ""),
    )
    .unwrap();

    nfex(tmp.path())
        .arg("batch")
        .arg(input.join("*.xml").to_str().unwrap())
        .arg("-o")
        .arg(&out)
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("c_broken.xml"))
        .stderr(predicate::str::contains("tax_total"));

    assert!(!out.exists() || fs::read_dir(&out).unwrap().next().is_none());
}

#[test]
fn batch_continue_on_error_with_csv() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("notas");
    let out = tmp.path().join("out");
    fs::create_dir(&input).unwrap();
    write_fixtures(&input);
    fs::write(input.join("c_broken.xml"), "<nfeProc><NFe>").unwrap();

    let response = run_batch(
        tmp.path(),
        &input,
        &out,
        &["--continue-on-error", "--csv"],
    );
    assert_eq!(response["count"], 2);
    assert_eq!(response["failures"][0]["source_name"], "c_broken.xml");
    assert_eq!(response["failures"][0]["kind"], "decode_error");

    let name = response["table_file_reference"].as_str().unwrap();
    let csv = fs::read_to_string(out.join(name.replace(".xlsx", ".csv"))).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("b_acme.xml,"));
}

#[test]
fn batch_with_pdf() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("notas");
    let out = tmp.path().join("out");
    fs::create_dir(&input).unwrap();
    write_fixtures(&input);

    let response = run_batch(tmp.path(), &input, &out, &["--pdf"]);
    let name = response["table_file_reference"].as_str().unwrap();
    let pdf = fs::read(out.join(name.replace(".xlsx", ".pdf"))).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
}

#[test]
fn batch_no_matching_files() {
    let tmp = TempDir::new().unwrap();
    nfex(tmp.path())
        .arg("batch")
        .arg(tmp.path().join("*.xml").to_str().unwrap())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files"));
}

#[test]
fn summarize_dry_run_and_pdf_of_saved_report() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("notas");
    let out = tmp.path().join("out");
    fs::create_dir(&input).unwrap();
    write_fixtures(&input);

    let response = run_batch(tmp.path(), &input, &out, &[]);
    let name = response["table_file_reference"].as_str().unwrap();

    nfex(tmp.path())
        .args(["summarize", name, "--dry-run", "-d"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Acme Ltda"))
        .stdout(predicate::str::contains("Beta Comercio"));

    let pdf_path = tmp.path().join("relatorio.pdf");
    nfex(tmp.path())
        .arg("pdf")
        .arg(out.join(name))
        .arg("-o")
        .arg(&pdf_path)
        .assert()
        .success();
    assert!(fs::read(&pdf_path).unwrap().starts_with(b"%PDF"));
}

#[test]
fn pdf_with_custom_title() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("notas");
    let out = tmp.path().join("out");
    fs::create_dir(&input).unwrap();
    write_fixtures(&input);

    let response = run_batch(tmp.path(), &input, &out, &[]);
    let name = response["table_file_reference"].as_str().unwrap();

    let pdf_path = tmp.path().join("janeiro.pdf");
    nfex(tmp.path())
        .arg("pdf")
        .arg(out.join(name))
        .args(["--title", "Notas de janeiro", "-o"])
        .arg(&pdf_path)
        .assert()
        .success();

    let pdf = fs::read(&pdf_path).unwrap();
    assert!(pdf.starts_with(b"%PDF"));
    let needle = b"Notas de janeiro";
    assert!(pdf.windows(needle.len()).any(|w| w == needle));
}

#[test]
fn summarize_unknown_report() {
    let tmp = TempDir::new().unwrap();
    nfex(tmp.path())
        .args(["summarize", "relatorio_nfes_1.xlsx", "--dry-run", "-d"])
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn config_init_get_set() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("nfex.json");
    let config_arg = config.to_str().unwrap();

    nfex(tmp.path())
        .args(["--config", config_arg, "config", "init"])
        .assert()
        .success();
    assert!(config.is_file());

    nfex(tmp.path())
        .args(["--config", config_arg, "config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    nfex(tmp.path())
        .args(["--config", config_arg, "config", "get", "report.print_cap"])
        .assert()
        .success()
        .stdout("30\n");

    nfex(tmp.path())
        .args(["--config", config_arg, "config", "set", "batch.failure_policy", "isolate"])
        .assert()
        .success();

    nfex(tmp.path())
        .args(["--config", config_arg, "config", "get", "batch.failure_policy"])
        .assert()
        .success()
        .stdout("\"isolate\"\n");

    nfex(tmp.path())
        .args(["--config", config_arg, "config", "set", "report.print_cap", "muitos"])
        .assert()
        .failure();
}
