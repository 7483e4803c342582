use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn penny(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("penny").unwrap();
    cmd.env("HOME", home).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

fn initialized() -> TempDir {
    let home = tempfile::tempdir().unwrap();
    let data_dir = home.path().join("ledger");
    penny(home.path())
        .args(["init", "--data-dir", data_dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized penny at"));
    home
}

fn add(home: &Path, category: &str, sub: &str, amount: &str, date: &str) {
    penny(home)
        .args(["add", "--category", category, "--sub-category", sub, "--amount", amount, "--date", date])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added record"));
}

#[test]
fn init_creates_ledger_and_settings() {
    let home = initialized();
    assert!(home.path().join("ledger").join("expenses.csv").exists());
    assert!(home.path().join(".config/penny/settings.json").exists());
}

#[test]
fn add_then_list_and_filter() {
    let home = initialized();
    add(home.path(), "Food", "Groceries", "250", "2024-03-01");
    add(home.path(), "Transport", "Fuel", "1200", "2024-03-05");

    penny(home.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Groceries").and(predicate::str::contains("Fuel")))
        .stdout(predicate::str::contains("2 records"));

    penny(home.path())
        .args(["list", "--category", "Transport"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fuel").and(predicate::str::contains("Groceries").not()));

    penny(home.path())
        .args(["list", "--min", "500", "--max", "2000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 records"));

    penny(home.path())
        .args(["list", "--from", "2024-03-02", "--to", "2024-03-31"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fuel").and(predicate::str::contains("Groceries").not()));
}

#[test]
fn list_with_no_types_matches_nothing() {
    let home = initialized();
    add(home.path(), "Food", "Groceries", "250", "2024-03-01");
    penny(home.path())
        .args(["list", "--no-types"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No records match."));
}

#[test]
fn list_limit_reports_truncation() {
    let home = initialized();
    add(home.path(), "Food", "Groceries", "250", "2024-03-01");
    add(home.path(), "Food", "Dining Out", "400", "2024-03-02");
    add(home.path(), "Food", "Groceries", "90", "2024-03-03");
    penny(home.path())
        .args(["list", "--limit", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Showing the first 2 of 3"));
}

#[test]
fn list_rejects_unknown_type() {
    let home = initialized();
    penny(home.path())
        .args(["list", "--type", "Refund"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown transaction type: Refund"));
}

#[test]
fn add_rejects_invalid_record() {
    let home = initialized();
    penny(home.path())
        .args(["add", "--category", "Food", "--sub-category", "Groceries", "--amount", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Amount must be greater than 0"));
}

#[test]
fn update_and_delete() {
    let home = initialized();
    add(home.path(), "Food", "Groceries", "250", "2024-03-01");

    penny(home.path())
        .args(["update", "1", "--notes", "Farmers market"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated record 1."));
    penny(home.path())
        .args(["search", "farmers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Farmers market"));

    penny(home.path()).args(["delete", "1"]).assert().success();
    penny(home.path())
        .args(["delete", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error: Unknown record: 1"));
}

#[test]
fn summary_shows_totals() {
    let home = initialized();
    add(home.path(), "Food", "Groceries", "250", "2024-03-01");
    add(home.path(), "Transport", "Fuel", "1200", "2024-03-05");
    penny(home.path())
        .arg("summary")
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions:  2").and(predicate::str::contains("By category")));
}

#[test]
fn import_is_idempotent_per_file() {
    let home = initialized();
    let statement = home.path().join("march.csv");
    std::fs::write(
        &statement,
        "date,transaction_type,amount,description,category,subcategory\n\
         2024-03-01,debit,-450.00,GROCERY MART,Food,Groceries\n\
         2024-03-02,credit,25000,SALARY MARCH,Income,Salary\n",
    )
    .unwrap();

    penny(home.path())
        .args(["import", statement.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 imported, 0 skipped (duplicates)"));
    penny(home.path())
        .args(["import", statement.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("already been imported"));

    penny(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Records:       2").and(predicate::str::contains("Imports:       1")));
}

#[test]
fn status_before_init() {
    let home = tempfile::tempdir().unwrap();
    penny(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ledger not found"));
}
