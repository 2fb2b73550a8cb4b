//! End-to-end checks of the `ethman` binary. Everything here is
//! offline: argument errors, selection errors, and explorer URL
//! printing, which never touches the node.

use std::process::{Command, Output};

const TX_HASH: &str = "0xabababababababababababababababababababababababababababababababab";

/// Command for the built binary with every `ETHMAN_*` variable cleared,
/// so results do not depend on the developer's shell.
fn ethman(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ethman"));
    for var in [
        "ETHMAN_SELECTOR",
        "ETHMAN_ECOSYSTEM",
        "ETHMAN_NETWORK",
        "ETHMAN_PROVIDER",
        "ETHMAN_PROJECT_DIR",
        "ETHMAN_DATA_DIR",
        "ETHMAN_ABI_FILE",
        "ETHMAN_CONFIG",
        "ETHMAN_LOG_LEVEL",
    ] {
        cmd.env_remove(var);
    }
    cmd.args(args);
    cmd
}

fn run(args: &[&str]) -> Output {
    ethman(args).output().expect("spawning the ethman binary")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn no_arguments_prints_usage() {
    let output = run(&[]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Usage"), "{}", stderr(&output));
}

#[test]
fn help_lists_the_subcommands() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for subcommand in ["txn", "balance", "eth"] {
        assert!(text.contains(subcommand), "missing {subcommand}: {text}");
    }
}

#[test]
fn missing_network_is_a_selection_error() {
    let output = run(&["eth", "block-number"]);
    assert_eq!(output.status.code(), Some(1));
    let text = stderr(&output);
    assert!(text.contains("Failed:"), "{text}");
    assert!(text.contains("ETHMAN_NETWORK"), "{text}");
}

#[test]
fn malformed_transaction_hash_is_rejected() {
    let output = run(&["-n", "local", "-p", "node", "txn", "0xnothash"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("invalid transaction hash"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn txn_url_fails_without_an_explorer() {
    let output = run(&["-n", "local", "-p", "node", "txn", TX_HASH, "--url"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("no explorer available for ethereum:local"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn txn_url_prints_the_explorer_link() {
    let output = run(&["-n", "mainnet", "-p", "node", "txn", TX_HASH, "--url", "--raw"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        stdout(&output).trim(),
        format!("https://etherscan.io/tx/{TX_HASH}")
    );
}

#[test]
fn txn_url_is_a_json_string_by_default() {
    let output = run(&["-n", "mainnet", "-p", "node", "txn", TX_HASH, "--url"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        stdout(&output).trim(),
        format!("\"https://etherscan.io/tx/{TX_HASH}\"")
    );
}

#[test]
fn malformed_block_id_is_rejected() {
    let output = run(&["-n", "local", "-p", "node", "eth", "block", "0xzz"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("invalid block number"),
        "{}",
        stderr(&output)
    );
}

#[test]
fn malformed_balance_address_is_rejected() {
    let output = run(&["-n", "local", "-p", "node", "balance", "not-an-address"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("invalid account address"),
        "{}",
        stderr(&output)
    );
}
