use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use text_patcher::config::{compile, load_from_path, TargetedSet};
use text_patcher::runner::{discover_patch_files, near_miss, Runner, RunnerError, SetRun};
use text_patcher::{FsStore, Pattern, RunReport, StepOutcome, DEFAULT_LEDGER_PATH};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "text-patcher")]
#[command(about = "Idempotent, ordered text patching for source files", long_about = None)]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Project root (defaults to $TEXT_PATCHER_ROOT, then the current directory)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Patch-set file to use; repeatable (otherwise every *.toml in <root>/patches)
    #[arg(short, long)]
    patches: Vec<PathBuf>,

    /// Override a template variable; repeatable
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    vars: Vec<(String, String)>,
}

#[derive(Args)]
struct LedgerArgs {
    /// Neither read nor write the ledger
    #[arg(long, conflicts_with = "ledger")]
    no_ledger: bool,

    /// Ledger file (default: <root>/.text-patcher/ledger.json)
    #[arg(long)]
    ledger: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply patch sets to the project
    Apply {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        ledger: LedgerArgs,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Exit with an error if any step's target was not found
        #[arg(long)]
        strict: bool,

        /// Print run reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which steps are applied, pending or missing their target
    Status {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        ledger: LedgerArgs,
    },

    /// Check that every step is already applied
    Verify {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        ledger: LedgerArgs,
    },

    /// List patch sets, their artifacts and steps
    List {
        #[command(flatten)]
        source: SourceArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Apply {
            source,
            ledger,
            dry_run,
            diff,
            strict,
            json,
        } => cmd_apply(
            source,
            ledger,
            ApplyFlags {
                dry_run,
                diff,
                strict,
                json,
            },
        ),

        Commands::Status { source, ledger } => cmd_status(source, ledger),

        Commands::Verify { source, ledger } => cmd_verify(source, ledger),

        Commands::List { source } => cmd_list(source),
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_var(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Resolve the project root.
///
/// Priority order:
/// 1. Explicit --root flag
/// 2. TEXT_PATCHER_ROOT environment variable
/// 3. Current directory
fn resolve_root(cli_root: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_root {
        return path
            .canonicalize()
            .with_context(|| format!("project root {} does not exist", path.display()));
    }

    if let Ok(env_path) = env::var("TEXT_PATCHER_ROOT") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!(
                "Warning: TEXT_PATCHER_ROOT is set but path doesn't exist: {}",
                env_path
            )
            .yellow()
        );
    }

    Ok(env::current_dir()?.canonicalize()?)
}

fn patch_files(root: &Path, explicit: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    if !explicit.is_empty() {
        return Ok(explicit);
    }

    let patches_dir = root.join("patches");
    let files = discover_patch_files(&patches_dir)?;
    if files.is_empty() {
        anyhow::bail!("No .toml patch files found in {}", patches_dir.display());
    }
    Ok(files)
}

/// Every patch file, compiled, in migration order.
fn load_targets(source: SourceArgs) -> Result<(PathBuf, Vec<(PathBuf, Vec<TargetedSet>)>)> {
    let root = resolve_root(source.root)?;
    let overrides: BTreeMap<String, String> = source.vars.into_iter().collect();

    let mut loaded = Vec::new();
    for path in patch_files(&root, source.patches)? {
        let file = load_from_path(&path)?;
        let targets = compile(&file, &overrides).map_err(|error| error.with_path(&path))?;
        loaded.push((path, targets));
    }
    Ok((root, loaded))
}

fn make_runner<'s>(store: &'s FsStore, root: &Path, args: &LedgerArgs) -> Result<Runner<'s, FsStore>> {
    let runner = Runner::new(store);
    if args.no_ledger {
        return Ok(runner);
    }
    let path = args
        .ledger
        .clone()
        .unwrap_or_else(|| root.join(DEFAULT_LEDGER_PATH));
    Ok(runner.with_ledger_file(path)?)
}

/// Helper: Show unified diff between original and modified content
fn display_diff(key: &str, original: &str, modified: &str) {
    println!("\n{}", format!("--- {} (original)", key).dimmed());
    println!("{}", format!("+++ {} (patched)", key).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn print_not_found_hint(target: &TargetedSet, step_id: &str, text: &str) {
    let Some(step) = target.set.steps().iter().find(|step| step.id() == step_id) else {
        return;
    };
    match near_miss(step, text) {
        Some(hint) => {
            eprintln!(
                "  Closest line {} ({:.0}% similar): {}",
                hint.line,
                hint.similarity * 100.0,
                hint.text.dimmed()
            );
            eprintln!("  The target may have drifted; update the pattern or drop the step");
        }
        None => eprintln!("  No similar line found in {}", target.artifact),
    }
}

struct ApplyFlags {
    dry_run: bool,
    diff: bool,
    strict: bool,
    json: bool,
}

#[derive(Default)]
struct Totals {
    applied: usize,
    already_present: usize,
    not_found: usize,
}

impl Totals {
    fn add(&mut self, report: &RunReport) {
        for step in &report.steps {
            match step.outcome {
                StepOutcome::Applied { .. } => self.applied += 1,
                StepOutcome::AlreadyPresent { .. } => self.already_present += 1,
                StepOutcome::NotFound => self.not_found += 1,
            }
        }
    }
}

fn print_run(target: &TargetedSet, run: &SetRun, dry_run: bool) {
    let set = run.report.set.as_str();
    for step in &run.report.steps {
        match &step.outcome {
            StepOutcome::Applied { replacements } => {
                let verb = if dry_run { "Would apply" } else { "Applied" };
                let count = if *replacements > 1 {
                    format!(" ({replacements} replacements)")
                } else {
                    String::new()
                };
                println!(
                    "{} {}/{}: {} to {}{}",
                    "✓".green(),
                    set,
                    step.id,
                    verb,
                    target.artifact,
                    count
                );
            }
            StepOutcome::AlreadyPresent { reason } => {
                println!(
                    "{} {}/{}: Already present in {} ({})",
                    "⊙".yellow(),
                    set,
                    step.id,
                    target.artifact,
                    reason
                );
            }
            StepOutcome::NotFound => {
                eprintln!(
                    "{} {}/{}: Target not found in {}",
                    "⊘".red(),
                    set,
                    step.id,
                    target.artifact
                );
                print_not_found_hint(target, &step.id, run.after().text());
            }
        }
    }
}

fn cmd_apply(source: SourceArgs, ledger: LedgerArgs, flags: ApplyFlags) -> Result<()> {
    let (root, loaded) = load_targets(source)?;
    let store = FsStore::new(&root)?;
    let mut runner = make_runner(&store, &root, &ledger)?.dry_run(flags.dry_run);

    if !flags.json {
        println!("Root: {}", root.display());
        if flags.dry_run {
            println!("{}", "[DRY RUN - no files will be modified]".cyan());
        }
        println!();
    }

    let mut totals = Totals::default();
    let mut reports = Vec::new();

    for (path, targets) in &loaded {
        if !flags.json {
            println!("Loading patch set from {}...", path.display());
        }

        for target in targets {
            let run = match runner.apply(target) {
                Ok(run) => run,
                Err(RunnerError::Run(err)) => {
                    eprintln!(
                        "{} {}/{}: Error - {}",
                        "✗".red(),
                        err.set,
                        err.step,
                        err.source
                    );
                    if !err.completed.is_empty() {
                        eprintln!(
                            "  {} completed step(s) before the failure were kept",
                            err.completed.len()
                        );
                    }
                    runner.finish()?;
                    return Err(RunnerError::Run(err).into());
                }
                Err(other) => {
                    runner.finish()?;
                    return Err(other.into());
                }
            };

            totals.add(&run.report);
            if !flags.json {
                print_run(target, &run, flags.dry_run);
                if flags.diff && run.report.changed {
                    display_diff(&target.artifact, run.before.text(), run.after().text());
                }
            }
            reports.push(run.report);
        }

        if !flags.json {
            println!();
        }
    }

    runner.finish()?;

    if flags.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!("{}", "Summary:".bold());
        println!("  {} applied", format!("{}", totals.applied).green());
        println!(
            "  {} already present",
            format!("{}", totals.already_present).yellow()
        );
        println!("  {} not found", format!("{}", totals.not_found).red());
    }

    if flags.strict && totals.not_found > 0 {
        eprintln!(
            "{}",
            format!("{} step(s) did not find their target (--strict)", totals.not_found).red()
        );
        std::process::exit(1);
    }

    Ok(())
}

/// Run every set in memory, collecting reports without touching files or
/// the ledger file.
fn check_all(source: SourceArgs, ledger: &LedgerArgs) -> Result<Vec<(TargetedSet, SetRun)>> {
    let (root, loaded) = load_targets(source)?;
    let store = FsStore::new(&root)?;
    let mut runner = make_runner(&store, &root, ledger)?.dry_run(true);

    let mut runs = Vec::new();
    for (_, targets) in loaded {
        for target in targets {
            let run = runner.apply(&target)?;
            runs.push((target, run));
        }
    }
    Ok(runs)
}

fn cmd_status(source: SourceArgs, ledger: LedgerArgs) -> Result<()> {
    let runs = check_all(source, &ledger)?;

    println!("{}", "Patch Status Report".bold());
    println!();

    let mut applied = Vec::new();
    let mut pending = Vec::new();
    let mut not_found = Vec::new();

    for (target, run) in &runs {
        for step in &run.report.steps {
            let label = format!("{}/{} ({})", run.report.set, step.id, target.artifact);
            match &step.outcome {
                StepOutcome::AlreadyPresent { reason } => applied.push((label, reason.to_string())),
                StepOutcome::Applied { .. } => pending.push(label),
                StepOutcome::NotFound => not_found.push(label),
            }
        }
    }

    if !applied.is_empty() {
        println!(
            "{} {} ({} steps)",
            "✓".green(),
            "APPLIED".green().bold(),
            applied.len()
        );
        for (label, reason) in &applied {
            println!("  - {} ({})", label, reason.dimmed());
        }
        println!();
    }

    if !pending.is_empty() {
        println!(
            "{} {} ({} steps)",
            "⊙".yellow(),
            "PENDING".yellow().bold(),
            pending.len()
        );
        for label in &pending {
            println!("  - {}", label);
        }
        println!();
    }

    if !not_found.is_empty() {
        println!(
            "{} {} ({} steps)",
            "⊘".red(),
            "NOT FOUND".red().bold(),
            not_found.len()
        );
        for label in &not_found {
            println!("  - {}", label);
        }
        println!();
    }

    Ok(())
}

fn cmd_verify(source: SourceArgs, ledger: LedgerArgs) -> Result<()> {
    let runs = check_all(source, &ledger)?;

    println!("{}", "Verifying patches...".bold());
    println!();

    let mut verified = 0;
    let mut mismatch = 0;

    for (target, run) in &runs {
        for step in &run.report.steps {
            match &step.outcome {
                StepOutcome::AlreadyPresent { reason } => {
                    println!(
                        "{} {}/{}: Verified ({})",
                        "✓".green(),
                        run.report.set,
                        step.id,
                        reason
                    );
                    verified += 1;
                }
                StepOutcome::Applied { .. } => {
                    eprintln!("{} {}/{}: MISMATCH", "✗".red(), run.report.set, step.id);
                    eprintln!("  Expected: step already applied");
                    eprintln!("  Found: step not yet applied");
                    eprintln!("  Location: {}", target.artifact);
                    mismatch += 1;
                }
                StepOutcome::NotFound => {
                    eprintln!("{} {}/{}: MISMATCH", "✗".red(), run.report.set, step.id);
                    eprintln!("  Found: neither the target nor the step's effect");
                    eprintln!("  Location: {}", target.artifact);
                    print_not_found_hint(target, &step.id, run.after().text());
                    mismatch += 1;
                }
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} verified", format!("{}", verified).green());
    println!("  {} mismatch", format!("{}", mismatch).red());

    if mismatch > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_list(source: SourceArgs) -> Result<()> {
    let root = resolve_root(source.root)?;
    let overrides: BTreeMap<String, String> = source.vars.into_iter().collect();

    for path in patch_files(&root, source.patches)? {
        let file = load_from_path(&path)?;
        let targets = compile(&file, &overrides).map_err(|error| error.with_path(&path))?;

        println!("{} {}", file.meta.name.bold(), format!("({})", path.display()).dimmed());
        if let Some(description) = &file.meta.description {
            println!("  {}", description);
        }

        // Declared order, with templates rendered the way `apply` sees them.
        for definition in &file.steps {
            let Some((artifact, step)) = targets.iter().find_map(|target| {
                target
                    .set
                    .steps()
                    .iter()
                    .find(|step| step.id() == definition.id)
                    .map(|step| (target.artifact.as_str(), step))
            }) else {
                continue;
            };

            let kind = match step.pattern() {
                Pattern::Literal(_) => "literal",
                Pattern::Structural(_) => "structural",
            };
            let mut guard = String::new();
            if let Some(marker) = step.guard().marker() {
                guard.push_str(&format!(", unless {:?} present", marker));
            }
            if step.guard().probes_replacement() {
                guard.push_str(", skip if replacement present");
            }
            println!(
                "  - {} -> {} [{}, {}{}]",
                step.id(),
                artifact,
                kind,
                step.scope(),
                guard
            );
        }
        println!();
    }

    Ok(())
}
