//! `patches/001-profile-username.toml`: one patch set spanning three files.

use super::{apply_all, load_patch, read, setup_fixture_app};
use text_patcher::{SkipReason, StepOutcome};

const SCHEMA: &str = "server/supabase-schema.sql";
const SERVICE: &str = "server/src/services/database.ts";
const PAGE: &str = "src/app/profile/page.tsx";

#[test]
fn test_compiles_one_set_per_artifact() {
    let targets = load_patch("001-profile-username.toml");
    let artifacts: Vec<_> = targets.iter().map(|t| t.artifact.as_str()).collect();
    assert_eq!(artifacts, [SCHEMA, SERVICE, PAGE]);
    assert!(targets.iter().all(|t| t.set.name() == "profile-username"));
    assert_eq!(targets[2].set.steps().len(), 5);
}

#[test]
fn test_applies_every_step() {
    let app = setup_fixture_app();
    let runs = apply_all(app.path(), &load_patch("001-profile-username.toml"));

    for run in &runs {
        for step in &run.report.steps {
            assert!(
                step.outcome.is_applied(),
                "{} on {} was {}",
                step.id,
                run.report.artifact,
                step.outcome
            );
        }
    }

    let schema = read(app.path(), SCHEMA);
    assert!(schema.contains("  avatar_url TEXT,\n  username TEXT,\n"));

    let service = read(app.path(), SERVICE);
    assert!(service.contains("name: string;\n    username?: string;\n    avatar_url?: string;"));
    // Only the first interface is touched.
    assert_eq!(service.matches("username?: string;").count(), 1);

    let page = read(app.path(), PAGE);
    assert!(page.contains("resume_text?: string;\n    username?: string;\n    avatar_url?: string;\n}"));
    assert!(page.contains("const [username, setUsername] = useState(\"\");"));
    assert!(page.contains("setAvatarUrl(data.profile.avatar_url || \"\");"));
    assert!(page.contains("username,\n                avatar_url: avatarUrl,\n                skills:"));
    assert!(page.contains("{ label: \"Username\", value: username, set: setUsername },"));
}

#[test]
fn test_rerun_changes_nothing() {
    let app = setup_fixture_app();
    let targets = load_patch("001-profile-username.toml");
    apply_all(app.path(), &targets);

    let before: Vec<_> = [SCHEMA, SERVICE, PAGE]
        .iter()
        .map(|key| read(app.path(), key))
        .collect();

    let runs = apply_all(app.path(), &targets);
    for run in &runs {
        assert!(!run.report.changed, "{} changed on rerun", run.report.artifact);
        assert!(run.report.is_fully_present());
    }

    let after: Vec<_> = [SCHEMA, SERVICE, PAGE]
        .iter()
        .map(|key| read(app.path(), key))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_hand_applied_column_is_respected() {
    let app = setup_fixture_app();
    let schema_path = app.path().join(SCHEMA);
    let schema = std::fs::read_to_string(&schema_path)
        .unwrap()
        .replace("  name TEXT,\n", "  name TEXT,\n  username TEXT,\n");
    std::fs::write(&schema_path, &schema).unwrap();

    let runs = apply_all(app.path(), &load_patch("001-profile-username.toml"));
    assert_eq!(
        runs[0].report.steps[0].outcome,
        StepOutcome::AlreadyPresent {
            reason: SkipReason::Marker("username TEXT".to_string())
        }
    );
    assert_eq!(read(app.path(), SCHEMA), schema);
}
