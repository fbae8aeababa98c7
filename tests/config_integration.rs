//! Integration tests for patch-set files: parsing, validation, compilation

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use text_patcher::config::{
    compile, load_from_path, load_from_str, ConfigError, PatternDefinition, ValidationIssue,
};
use text_patcher::{Artifact, Scope, StepOutcome};

fn issues(err: ConfigError) -> Vec<ValidationIssue> {
    match err {
        ConfigError::Validation { source, .. } => source.issues,
        other => panic!("expected validation error, got {other}"),
    }
}

#[test]
fn test_load_patch_set_basic() {
    let toml = r#"
[meta]
name = "profile-username"
description = "Add a username column"
artifact = "server/supabase-schema.sql"

[[steps]]
id = "schema-column"
scope = "first"

[steps.pattern]
type = "literal"
text = "avatar_url TEXT,"

[steps.guard]
absent = "username TEXT"

[steps.replace]
text = "avatar_url TEXT,\n  username TEXT,"
"#;

    let file = load_from_str(toml).unwrap();
    assert_eq!(file.meta.name, "profile-username");
    assert_eq!(file.meta.description.as_deref(), Some("Add a username column"));
    assert_eq!(file.steps.len(), 1);

    let step = &file.steps[0];
    assert_eq!(step.scope, Some(Scope::First));
    assert!(matches!(step.pattern, PatternDefinition::Literal { .. }));
    let guard = step.guard.as_ref().unwrap();
    assert_eq!(guard.absent.as_deref(), Some("username TEXT"));
    assert!(!guard.replacement_present);
    assert_eq!(file.artifact_for(step), Some("server/supabase-schema.sql"));
}

#[test]
fn test_validation_collects_every_issue() {
    let toml = r#"
[meta]
name = ""

[[steps]]
id = "a"
pattern = { type = "literal", text = "" }
replace = { text = "x" }

[[steps]]
id = "a"
scope = "all"
artifact = "f.ts"
pattern = { type = "literal", text = "same" }
replace = { text = "same" }
"#;

    let found = issues(load_from_str(toml).unwrap_err());
    let expected = [
        ValidationIssue::MissingField {
            step_id: None,
            field: "meta.name",
        },
        ValidationIssue::MissingField {
            step_id: Some("a".to_string()),
            field: "artifact",
        },
        ValidationIssue::MissingField {
            step_id: Some("a".to_string()),
            field: "scope",
        },
        ValidationIssue::MissingField {
            step_id: Some("a".to_string()),
            field: "pattern.text",
        },
        ValidationIssue::DuplicateStep {
            step_id: "a".to_string(),
        },
    ];
    for issue in &expected {
        assert!(found.contains(issue), "missing {issue:?} in {found:?}");
    }
    assert!(found
        .iter()
        .any(|issue| matches!(issue, ValidationIssue::InvalidCombo { .. })));
}

#[test]
fn test_guard_must_check_something() {
    let toml = r#"
[meta]
name = "s"
artifact = "a.ts"

[[steps]]
id = "empty-guard"
scope = "first"
pattern = { type = "literal", text = "a" }
guard = {}
replace = { text = "b" }

[[steps]]
id = "blank-marker"
scope = "first"
pattern = { type = "literal", text = "c" }
guard = { absent = "", replacement_present = true }
replace = { text = "d" }

[[steps]]
id = "probe-only"
scope = "first"
pattern = { type = "literal", text = "e" }
guard = { replacement_present = true }
replace = { text = "f" }
"#;

    let found = issues(load_from_str(toml).unwrap_err());
    assert_eq!(
        found,
        [
            ValidationIssue::MissingField {
                step_id: Some("empty-guard".to_string()),
                field: "guard.absent",
            },
            ValidationIssue::MissingField {
                step_id: Some("blank-marker".to_string()),
                field: "guard.absent",
            },
        ]
    );
}

#[test]
fn test_empty_file_has_no_steps() {
    let found = issues(load_from_str("[meta]\nname = \"empty\"\n").unwrap_err());
    assert_eq!(found, [ValidationIssue::EmptyStepList]);
}

#[test]
fn test_unknown_pattern_type_is_parse_error() {
    let toml = r#"
[meta]
name = "s"
artifact = "a.ts"

[[steps]]
id = "x"
scope = "first"
pattern = { type = "regex", text = "a+" }
replace = { text = "b" }
"#;
    assert!(matches!(
        load_from_str(toml),
        Err(ConfigError::Toml { .. })
    ));
}

#[test]
fn test_unknown_scope_is_parse_error() {
    let toml = r#"
[meta]
name = "s"
artifact = "a.ts"

[[steps]]
id = "x"
scope = "every"
pattern = { type = "literal", text = "a" }
replace = { text = "b" }
"#;
    assert!(matches!(
        load_from_str(toml),
        Err(ConfigError::Toml { .. })
    ));
}

#[test]
fn test_load_from_path_reports_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[meta]\nname = \"broken\"\n").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("broken.toml"));

    let missing = load_from_path(dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io { .. }));
}

#[test]
fn test_bundled_patch_sets_are_valid() {
    let patches = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("patches");
    let mut count = 0;
    for entry in fs::read_dir(patches).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|s| s.to_str()) != Some("toml") {
            continue;
        }
        let file = load_from_path(&path).unwrap();
        let targets = compile(&file, &BTreeMap::new()).unwrap();
        assert!(!targets.is_empty(), "{} compiled to nothing", path.display());
        count += 1;
    }
    assert!(count >= 2);
}

#[test]
fn test_compiled_set_runs_on_artifact() {
    let toml = r#"
[meta]
name = "api-base"
artifact = "src/lib/api.ts"

[vars]
base = "process.env.NEXT_PUBLIC_API_URL"

[[steps]]
id = "use-env-base"
scope = "all"

[steps.pattern]
type = "literal"
text = '"http://localhost:4000"'

[steps.replace]
text = "%{base}"
"#;

    let file = load_from_str(toml).unwrap();
    let targets = compile(&file, &BTreeMap::new()).unwrap();
    let artifact = Artifact::new(
        "src/lib/api.ts",
        "fetch(\"http://localhost:4000\" + \"/a\");\nfetch(\"http://localhost:4000\" + \"/b\");\n",
    );

    let report = targets[0].set.run(&artifact, None).unwrap();
    assert_eq!(
        report.output().text(),
        "fetch(process.env.NEXT_PUBLIC_API_URL + \"/a\");\nfetch(process.env.NEXT_PUBLIC_API_URL + \"/b\");\n"
    );
    assert_eq!(
        report.steps[0].outcome,
        StepOutcome::Applied { replacements: 2 }
    );
}
