mod logic;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use covert_ops_core::{Difficulty, RuleSet};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use logic::{
    LogicTester, ScenarioResult, SeedInfo, all_scenario_keys, get_scenario, list_scenarios,
    resolve_seed_inputs,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DifficultyArg {
    Beginner,
    Experienced,
    Veteran,
    Genius,
    Superhuman,
}

impl From<DifficultyArg> for Difficulty {
    fn from(value: DifficultyArg) -> Self {
        match value {
            DifficultyArg::Beginner => Self::Beginner,
            DifficultyArg::Experienced => Self::Experienced,
            DifficultyArg::Veteran => Self::Veteran,
            DifficultyArg::Genius => Self::Genius,
            DifficultyArg::Superhuman => Self::Superhuman,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "covert-ops-tester", version = "0.1.0")]
#[command(about = "Automated QA testing for the covert operations engine")]
struct Args {
    /// Scenarios to run (comma-separated, or `all`)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated; integers, 0x hex or start..end ranges)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Campaign difficulty used by the scenarios
    #[arg(long, value_enum, default_value_t = DifficultyArg::Veteran)]
    difficulty: DifficultyArg,

    /// Rules file to test instead of the bundled content
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let rules = load_rules(args.rules.as_deref())?;
    let scenarios = expand_scenarios(&args.scenarios);
    let seed_infos = resolve_seed_inputs(&split_csv(&args.seeds))?;

    let all_results = run_logic_scenarios(&args, &rules, &scenarios, &seed_infos)?;

    write_reports(&args, &all_results, start_time)?;

    if all_results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🕵️ Covert Ops Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn load_rules(path: Option<&Path>) -> Result<RuleSet> {
    let rules = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            RuleSet::from_json(&json)
                .with_context(|| format!("failed to parse rules from {}", path.display()))?
        }
        None => RuleSet::bundled().context("bundled rules are malformed")?,
    };
    rules.validate().context("rules failed validation")?;
    log::info!(
        "loaded {} operations, {} missions, {} event scripts",
        rules.operations.len(),
        rules.missions.len(),
        rules.event_scripts.len()
    );
    Ok(rules)
}

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s == "all") {
        scenarios.retain(|s| s != "all");
        for key in all_scenario_keys() {
            if !scenarios.contains(&key) {
                scenarios.push(key);
            }
        }
    }
    scenarios
}

fn run_logic_scenarios(
    args: &Args,
    rules: &RuleSet,
    scenarios: &[String],
    seeds: &[SeedInfo],
) -> Result<Vec<ScenarioResult>> {
    let tester = LogicTester::new(rules, args.difficulty.into(), args.verbose);
    let mut results = Vec::new();
    for name in scenarios {
        let Some(scenario) = get_scenario(name) else {
            bail!("Unknown scenario: {name} (see --list-scenarios)");
        };
        results.extend(tester.run_scenario(&scenario, seeds, args.iterations));
    }
    Ok(results)
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => {
            logic::reports::generate_json_report(&mut output_target, results)?;
        }
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Covert Ops Logic Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        _ => {
            if results.is_empty() {
                writeln!(&mut output_target, "No logic scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
            writeln!(&mut output_target)?;
            writeln!(
                &mut output_target,
                "🏁 Total time: {:?}",
                start_time.elapsed()
            )?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            scenarios: "smoke".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            difficulty: DifficultyArg::Veteran,
            rules: None,
            report: "console".to_string(),
            verbose: false,
            output: None,
        }
    }

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("covert-ops-{}-{name}", std::process::id()))
    }

    #[test]
    fn expands_all_scenarios_keyword() {
        let expanded = expand_scenarios("smoke,all");
        assert_eq!(expanded[0], "smoke");
        assert_eq!(expanded.len(), all_scenario_keys().len());
        assert!(expanded.contains(&"event-scripts".to_string()));
    }

    #[test]
    fn expand_scenarios_without_all_preserves_order() {
        let expanded = expand_scenarios(" casualty-floor, ,smoke ");
        assert_eq!(
            expanded,
            vec!["casualty-floor".to_string(), "smoke".to_string()]
        );
    }

    #[test]
    fn unknown_scenarios_are_rejected() {
        let rules = load_rules(None).unwrap();
        let seeds = vec![SeedInfo::from_numeric(1)];
        let err = run_logic_scenarios(&base_args(), &rules, &["nope".to_string()], &seeds)
            .unwrap_err();
        assert!(err.to_string().contains("Unknown scenario: nope"));
    }

    #[test]
    fn maybe_list_scenarios_writes_output() {
        let temp = temp_file("scenarios.txt");
        let args = Args {
            list_scenarios: true,
            output: Some(temp.clone()),
            ..base_args()
        };
        assert!(maybe_list_scenarios(&args).unwrap());
        let content = std::fs::read_to_string(&temp).unwrap();
        assert!(content.contains("Available scenarios"));
        assert!(content.contains("casualty-floor"));
        let _ = std::fs::remove_file(temp);
    }

    #[test]
    fn maybe_list_scenarios_returns_false_when_disabled() {
        assert!(!maybe_list_scenarios(&base_args()).unwrap());
    }

    #[test]
    fn write_reports_markdown_empty_results() {
        let temp = temp_file("report.md");
        let args = Args {
            report: "markdown".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[], Instant::now()).unwrap();
        let content = std::fs::read_to_string(&temp).unwrap();
        assert!(content.contains("_No scenarios executed._"));
        let _ = std::fs::remove_file(temp);
    }

    #[test]
    fn missing_rules_file_is_reported() {
        let err = load_rules(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn difficulty_arg_maps_onto_engine_tiers() {
        assert_eq!(Difficulty::from(DifficultyArg::Genius), Difficulty::Genius);
        assert_eq!(
            Difficulty::from(DifficultyArg::Superhuman),
            Difficulty::Superhuman
        );
    }
}
