//! `patches/002-chat-search.toml`: structural match, replace-all deletion,
//! steps that depend on earlier steps.

use super::{apply_all, apply_unrecorded, load_patch, read, setup_fixture_app};
use text_patcher::{SkipReason, StepOutcome};

const PAGE: &str = "src/app/page.tsx";

#[test]
fn test_applies_search_and_layout_fixes() {
    let app = setup_fixture_app();
    let runs = apply_all(app.path(), &load_patch("002-chat-search.toml"));
    assert_eq!(runs.len(), 1);

    let outcomes: Vec<_> = runs[0]
        .report
        .steps
        .iter()
        .map(|s| (s.id.as_str(), s.outcome.clone()))
        .collect();
    assert_eq!(
        outcomes,
        [
            ("search-state", StepOutcome::Applied { replacements: 1 }),
            ("sidebar-filter", StepOutcome::Applied { replacements: 1 }),
            ("center-input", StepOutcome::Applied { replacements: 1 }),
            ("drop-button-margins", StepOutcome::Applied { replacements: 2 }),
        ]
    );

    let page = read(app.path(), PAGE);
    assert!(page.contains("const [searchQuery, setSearchQuery] = useState(\"\");"));
    assert!(page.contains("{filteredSessions.map(s => ("));
    assert!(!page.contains("{sessions.map("));
    assert!(page.contains("display: \"flex\", alignItems: \"center\","));
    assert!(!page.contains("flex-end"));
    assert!(!page.contains("marginBottom"));
}

#[test]
fn test_rerun_reports_every_step_present() {
    let app = setup_fixture_app();
    let targets = load_patch("002-chat-search.toml");
    apply_all(app.path(), &targets);
    let once = read(app.path(), PAGE);

    let runs = apply_all(app.path(), &targets);
    assert_eq!(read(app.path(), PAGE), once);

    let steps = &runs[0].report.steps;
    assert_eq!(
        steps[0].outcome,
        StepOutcome::AlreadyPresent {
            reason: SkipReason::Marker("const [searchQuery, setSearchQuery]".to_string())
        }
    );
    // No guard declared: the ledger vouches for them.
    for step in &steps[1..] {
        assert_eq!(
            step.outcome,
            StepOutcome::AlreadyPresent {
                reason: SkipReason::Ledger
            },
            "{}",
            step.id
        );
    }
}

#[test]
fn test_rerun_without_ledger_does_not_guess() {
    let app = setup_fixture_app();
    let targets = load_patch("002-chat-search.toml");
    apply_unrecorded(app.path(), &targets);
    let once = read(app.path(), PAGE);

    let runs = apply_unrecorded(app.path(), &targets);
    assert_eq!(read(app.path(), PAGE), once);

    let report = &runs[0].report;
    assert!(matches!(
        report.steps[0].outcome,
        StepOutcome::AlreadyPresent { .. }
    ));
    // Unguarded steps whose targets are gone cannot be told apart from drift.
    assert_eq!(report.not_found().count(), 3);
}

#[test]
fn test_reverted_page_is_patched_again() {
    let app = setup_fixture_app();
    let pristine = read(app.path(), PAGE);
    let targets = load_patch("002-chat-search.toml");
    apply_all(app.path(), &targets);
    let patched = read(app.path(), PAGE);

    std::fs::write(app.path().join(PAGE), &pristine).unwrap();
    let runs = apply_all(app.path(), &targets);

    assert!(runs[0].report.steps.iter().all(|s| s.outcome.is_applied()));
    assert_eq!(read(app.path(), PAGE), patched);
}

#[test]
fn test_reflowed_input_bar_still_matches() {
    let app = setup_fixture_app();
    let path = app.path().join(PAGE);
    let reflowed = std::fs::read_to_string(&path).unwrap().replace(
        "display: \"flex\", alignItems: \"flex-end\",\n                border:",
        "display: \"flex\",\n                alignItems: \"flex-end\", border:",
    );
    std::fs::write(&path, reflowed).unwrap();

    let runs = apply_all(app.path(), &load_patch("002-chat-search.toml"));
    assert!(runs[0].report.steps[2].outcome.is_applied());
    assert!(!read(app.path(), PAGE).contains("flex-end"));
}

#[test]
fn test_drifted_target_is_reported_not_fatal() {
    let app = setup_fixture_app();
    let path = app.path().join(PAGE);
    let drifted = std::fs::read_to_string(&path)
        .unwrap()
        .replace("{sessions.map(s => (", "{sessions.slice(0, 20).map(s => (");
    std::fs::write(&path, drifted).unwrap();

    let runs = apply_all(app.path(), &load_patch("002-chat-search.toml"));
    let report = &runs[0].report;
    assert_eq!(report.steps[1].outcome, StepOutcome::NotFound);
    // Later steps still ran.
    assert!(report.steps[2].outcome.is_applied());
    assert!(report.steps[3].outcome.is_applied());
    assert_eq!(report.not_found().count(), 1);
}
