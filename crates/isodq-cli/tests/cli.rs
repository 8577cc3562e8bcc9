//! Integration test: the `run`, `check`, and `rules` subcommands against a
//! temporary message, rule, and report tree.

use std::fs;
use std::path::Path;

use isodq_cli::check::{run_check, CheckArgs};
use isodq_cli::rules::{run_rules, RulesArgs};
use isodq_cli::run::{run_batch, RunArgs};
use isodq_cli::{EXIT_INVALID, EXIT_VALID};

const RULES: &str = r#"{"rules": [
    {"path": "/Document/FIToFICstmrCdtTrf/GrpHdr/MsgId", "required": true},
    {"path": "/Document/FIToFICstmrCdtTrf/GrpHdr/NbOfTxs", "required": false}
]}"#;

const VALID: &str = "<Document><FIToFICstmrCdtTrf><GrpHdr><MsgId>M1</MsgId></GrpHdr></FIToFICstmrCdtTrf></Document>";
const MISPLACED: &str = "<Document><FIToFICstmrCdtTrf><Other><MsgId>M2</MsgId></Other></FIToFICstmrCdtTrf></Document>";
const MISSING: &str = "<Document><FIToFICstmrCdtTrf><GrpHdr/></FIToFICstmrCdtTrf></Document>";

fn write(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn tree(root: &Path, messages: &[(&str, &str)]) {
    write(&root.join("rules/pacs.008.dq.json"), RULES);
    for (name, body) in messages {
        write(&root.join("messages/pacs.008").join(name), body);
    }
}

fn run_args(root: &Path) -> RunArgs {
    RunArgs {
        messages: root.join("messages"),
        rules: root.join("rules"),
        out: root.join("reports"),
        family: None,
        strict: false,
        max_in_flight: Some(2),
        flush_every: Some(1),
        json: true,
    }
}

#[test]
fn test_run_writes_reports_and_exits_valid() {
    let tmp = tempfile::tempdir().unwrap();
    tree(
        tmp.path(),
        &[("in_1_A.xml", VALID), ("in_2_B.xml", MISPLACED)],
    );

    let code = run_batch(&run_args(tmp.path()), None).unwrap();
    assert_eq!(code, EXIT_VALID);

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("reports/B.json")).unwrap())
            .unwrap();
    assert_eq!(report["overall_valid"], true);
    assert_eq!(report["findings"][0]["valid"], "ok");
    assert_eq!(report["findings"][0]["location_status"], "wrong_location");
    assert_eq!(report["findings"][0]["in_correct_location"], 0);
}

#[test]
fn test_run_strict_marks_misplaced_invalid() {
    let tmp = tempfile::tempdir().unwrap();
    tree(tmp.path(), &[("in_2_B.xml", MISPLACED)]);

    let mut args = run_args(tmp.path());
    args.strict = true;
    assert_eq!(run_batch(&args, None).unwrap(), EXIT_INVALID);
}

#[test]
fn test_run_config_file_is_applied() {
    let tmp = tempfile::tempdir().unwrap();
    tree(tmp.path(), &[("in_2_B.xml", MISPLACED)]);
    let config = tmp.path().join("isodq.yaml");
    fs::write(&config, "structure_policy: strict\n").unwrap();

    assert_eq!(
        run_batch(&run_args(tmp.path()), Some(&config)).unwrap(),
        EXIT_INVALID
    );
}

#[test]
fn test_run_missing_messages_directory_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    write(&tmp.path().join("rules/pacs.008.dq.json"), RULES);
    let err = run_batch(&run_args(tmp.path()), None).unwrap_err();
    assert!(format!("{err:#}").contains("failed to read messages"));
}

#[test]
fn test_check_reports_missing_required_element() {
    let tmp = tempfile::tempdir().unwrap();
    tree(tmp.path(), &[("in_3_C.xml", MISSING)]);

    let args = CheckArgs {
        rules: tmp.path().join("rules"),
        family: "pacs.008".into(),
        strict: false,
        file: tmp.path().join("messages/pacs.008/in_3_C.xml"),
    };
    assert_eq!(run_check(&args, None).unwrap(), EXIT_INVALID);
}

#[test]
fn test_check_accepts_a_single_rule_file() {
    let tmp = tempfile::tempdir().unwrap();
    tree(tmp.path(), &[("in_1_A.xml", VALID)]);
    let args = CheckArgs {
        rules: tmp.path().join("rules/pacs.008.dq.json"),
        family: "pacs.008".into(),
        strict: false,
        file: tmp.path().join("messages/pacs.008/in_1_A.xml"),
    };
    assert_eq!(run_check(&args, None).unwrap(), EXIT_VALID);
}

#[test]
fn test_check_unreadable_file_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    tree(tmp.path(), &[]);
    let args = CheckArgs {
        rules: tmp.path().join("rules"),
        family: "pacs.008".into(),
        strict: false,
        file: tmp.path().join("absent.xml"),
    };
    assert!(run_check(&args, None).is_err());
}

#[test]
fn test_rules_unknown_family_exits_invalid() {
    let tmp = tempfile::tempdir().unwrap();
    tree(tmp.path(), &[]);
    let mut args = RulesArgs {
        rules: tmp.path().join("rules"),
        family: Some("pacs.008".into()),
        json: false,
    };
    assert_eq!(run_rules(&args).unwrap(), EXIT_VALID);
    args.family = Some("camt.053".into());
    assert_eq!(run_rules(&args).unwrap(), EXIT_INVALID);
}
