use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("shoplist")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("bot"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("token"));
}

#[test]
fn test_config_help_shows_subcommands() {
    cargo_bin_cmd!("shoplist")
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("path"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_token_command_decodes_toggle() {
    cargo_bin_cmd!("shoplist")
        .args(["token", "shoppingitems_12i3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("node: shoppingitems"))
        .stdout(predicate::str::contains("toggle item 3 on list 12"));
}

#[test]
fn test_token_command_rejects_malformed_token() {
    cargo_bin_cmd!("shoplist")
        .args(["token", "nonsense"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed token"));
}
