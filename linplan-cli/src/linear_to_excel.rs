use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use linplan_core::constants::{DEFAULT_WEEKS, MAX_WEEKS, SHEET_DATE_FORMAT};
use linplan_core::export::{
    append_to_workbook, create_cycle_workbook, create_workbook, default_output_file, plan_title,
    refresh_workbook, RefreshOptions, WrittenSheet,
};
use linplan_core::plan::{default_quarter, default_start_date, AssigneeSummary};
use linplan_core::{Context, LinearClient, PlannerError, Result, SheetLayout};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn build_command() -> Command {
    Command::new("linear_to_excel")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Export Linear issues to a capacity-planning Excel workbook")
        .author("Linplan Developers")
        .arg(
            Arg::new("team")
                .short('t')
                .long("team")
                .value_name("KEY")
                .help("Team key, e.g. APP"),
        )
        .arg(
            Arg::new("quarter")
                .short('q')
                .long("quarter")
                .value_name("QUARTER")
                .help("Quarter label for the title, e.g. \"Q4 2025\" (default: current quarter)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Output file (default: \"<team> - <quarter> Planning.xlsx\")"),
        )
        .arg(
            Arg::new("start-date")
                .short('s')
                .long("start-date")
                .value_name("YYYY-MM-DD")
                .help("First week of the plan (default: Monday of the quarter start)"),
        )
        .arg(
            Arg::new("weeks")
                .short('w')
                .long("weeks")
                .value_name("N")
                .value_parser(value_parser!(u32).range(1..=i64::from(MAX_WEEKS)))
                .default_value("13")
                .help("Number of week columns"),
        )
        .arg(
            Arg::new("initiatives")
                .short('i')
                .long("initiatives")
                .value_name("SLUGS")
                .help("Comma separated initiative slugs to limit the issues to"),
        )
        .arg(
            Arg::new("list-teams")
                .long("list-teams")
                .action(ArgAction::SetTrue)
                .help("List available teams and exit"),
        )
        .arg(
            Arg::new("list-initiatives")
                .long("list-initiatives")
                .action(ArgAction::SetTrue)
                .help("List initiatives with their slugs and exit"),
        )
        .arg(
            Arg::new("include-archived")
                .long("include-archived")
                .action(ArgAction::SetTrue)
                .help("Include [Archive] initiatives when listing"),
        )
        .arg(
            Arg::new("input")
                .short('f')
                .long("input")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Refresh the latest planning tab of an existing workbook"),
        )
        .arg(
            Arg::new("append")
                .short('a')
                .long("append")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Append a new planning tab to an existing workbook"),
        )
        .arg(
            Arg::new("by-cycles")
                .long("by-cycles")
                .action(ArgAction::SetTrue)
                .help("Write one tab per cycle"),
        )
}

/// Workbook operation selected by the options
#[derive(Debug, Clone, PartialEq)]
enum Mode {
    ListTeams,
    ListInitiatives,
    Refresh(PathBuf),
    Append(PathBuf),
    ByCycles,
    Create,
}

fn select_mode(matches: &ArgMatches) -> Mode {
    if matches.get_flag("list-teams") {
        Mode::ListTeams
    } else if matches.get_flag("list-initiatives") {
        Mode::ListInitiatives
    } else if let Some(path) = matches.get_one::<PathBuf>("input") {
        Mode::Refresh(path.clone())
    } else if let Some(path) = matches.get_one::<PathBuf>("append") {
        Mode::Append(path.clone())
    } else if matches.get_flag("by-cycles") {
        Mode::ByCycles
    } else {
        Mode::Create
    }
}

fn parse_initiatives(value: Option<&String>) -> Option<Vec<String>> {
    let slugs: Vec<String> = value?
        .split(',')
        .map(str::trim)
        .filter(|slug| !slug.is_empty())
        .map(str::to_string)
        .collect();
    Some(slugs).filter(|slugs| !slugs.is_empty())
}

fn parse_start_date(value: Option<&String>) -> Result<Option<NaiveDate>> {
    value
        .map(|value| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d"))
        .transpose()
        .map_err(PlannerError::from)
}

fn print_summary(summary: &[AssigneeSummary]) {
    if summary.is_empty() {
        return;
    }
    println!("\nSummary by assignee:");
    for entry in summary {
        println!(
            "  {:20} {:>4} issues {:>7.1} days",
            entry.name, entry.issues, entry.estimate_days
        );
    }
}

fn print_written(sheets: &[WrittenSheet]) {
    for sheet in sheets {
        println!("\nTab '{}':", sheet.name);
        print_summary(&sheet.summary);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_command().get_matches();

    // Initialize context from environment
    let ctx = Context::from_env()?;

    // Initialize tracing, RUST_LOG wins over LINEAR_DEBUG
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(ctx.log_level())),
        )
        .init();

    if ctx.ctx_out {
        info!("Context: {:?}", ctx);
    }

    let client = LinearClient::new(&ctx)?;
    let mode = select_mode(&matches);

    match mode {
        Mode::ListTeams => {
            println!("Available teams:");
            for team in client.fetch_teams().await? {
                println!("  {:10} - {}", team.key, team.name);
            }
            return Ok(());
        }
        Mode::ListInitiatives => {
            let initiatives = client
                .fetch_all_initiatives(matches.get_flag("include-archived"))
                .await?;
            println!("Available initiatives:");
            for initiative in initiatives {
                println!(
                    "  {:20} - {}",
                    initiative.slug_id.as_deref().unwrap_or_default(),
                    initiative.name
                );
            }
            return Ok(());
        }
        _ => {}
    }

    let team_key = matches.get_one::<String>("team").ok_or_else(|| {
        PlannerError::Config("--team is required (use --list-teams to see available teams)".to_string())
    })?;
    let team = client.get_team_by_key(team_key).await?.ok_or_else(|| {
        PlannerError::Config(format!(
            "team '{}' not found (use --list-teams to see available teams)",
            team_key
        ))
    })?;
    info!("Using team {} ({})", team.name, team.key);

    let today = Local::now().date_naive();
    let quarter_arg = matches.get_one::<String>("quarter");
    let quarter = quarter_arg.cloned().unwrap_or_else(|| default_quarter(today));
    let start_date = parse_start_date(matches.get_one::<String>("start-date"))?;
    let default_start = default_start_date(today);
    let weeks = matches.get_one::<u32>("weeks").copied().unwrap_or(DEFAULT_WEEKS);
    let initiatives = parse_initiatives(matches.get_one::<String>("initiatives"));
    let sheet_name = today.format(SHEET_DATE_FORMAT).to_string();

    let issues = client
        .fetch_issues_for_team(&team.id, initiatives.as_deref())
        .await?;
    if issues.is_empty() {
        warn!("No issues found for team {}", team.key);
    }

    let title = plan_title(&team.name, &quarter);
    let output = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(default_output_file(&team.name, &quarter)));

    match mode {
        Mode::Refresh(path) => {
            let options = RefreshOptions {
                title: quarter_arg.map(|_| title.as_str()),
                start_date,
                default_start,
                weeks,
            };
            let report = refresh_workbook(&path, &issues, &options)?;
            println!(
                "Refreshed '{}' in {}: {} updated, {} added, {} kept",
                report.sheet.name,
                path.display(),
                report.updated,
                report.added,
                report.retained
            );
            print_summary(&report.sheet.summary);
        }
        Mode::Append(path) => {
            let layout = SheetLayout::from_issues(&title, &issues, start_date.unwrap_or(default_start), weeks);
            let written = append_to_workbook(&path, &sheet_name, &layout)?;
            println!("Appended tab '{}' to {}", written.name, path.display());
            print_summary(&written.summary);
        }
        Mode::ByCycles => {
            let written = create_cycle_workbook(
                &output,
                &team.name,
                &quarter,
                &issues,
                start_date.unwrap_or(default_start),
                weeks,
            )?;
            println!("Wrote {} cycle tab(s) to {}", written.len(), output.display());
            print_written(&written);
        }
        Mode::Create => {
            let layout = SheetLayout::from_issues(&title, &issues, start_date.unwrap_or(default_start), weeks);
            let written = create_workbook(&output, &sheet_name, &layout)?;
            println!("Wrote {} issues to {}", layout.issue_rows().count(), output.display());
            print_summary(&written.summary);
        }
        Mode::ListTeams | Mode::ListInitiatives => {}
    }

    println!("\nDone!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(args: &[&str]) -> ArgMatches {
        let mut argv = vec!["linear_to_excel"];
        argv.extend_from_slice(args);
        build_command().try_get_matches_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let m = matches(&["--team", "APP"]);
        assert_eq!(m.get_one::<String>("team").map(String::as_str), Some("APP"));
        assert_eq!(m.get_one::<u32>("weeks"), Some(&13));
        assert_eq!(select_mode(&m), Mode::Create);
    }

    #[test]
    fn test_mode_precedence() {
        assert_eq!(select_mode(&matches(&["--list-teams", "--list-initiatives"])), Mode::ListTeams);
        assert_eq!(select_mode(&matches(&["--list-initiatives", "-t", "APP"])), Mode::ListInitiatives);
        assert_eq!(
            select_mode(&matches(&["-t", "APP", "-f", "old.xlsx", "-a", "other.xlsx", "--by-cycles"])),
            Mode::Refresh(PathBuf::from("old.xlsx"))
        );
        assert_eq!(
            select_mode(&matches(&["-t", "APP", "-a", "other.xlsx", "--by-cycles"])),
            Mode::Append(PathBuf::from("other.xlsx"))
        );
        assert_eq!(select_mode(&matches(&["-t", "APP", "--by-cycles"])), Mode::ByCycles);
    }

    #[test]
    fn test_short_options() {
        let m = matches(&["-t", "APP", "-q", "Q1 2026", "-o", "out.xlsx", "-s", "2026-01-05", "-w", "6", "-i", "a,b"]);
        assert_eq!(m.get_one::<String>("quarter").map(String::as_str), Some("Q1 2026"));
        assert_eq!(m.get_one::<PathBuf>("output"), Some(&PathBuf::from("out.xlsx")));
        assert_eq!(m.get_one::<u32>("weeks"), Some(&6));
        assert_eq!(
            parse_start_date(m.get_one::<String>("start-date")).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 5)
        );
        assert_eq!(
            parse_initiatives(m.get_one::<String>("initiatives")),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let argv = ["linear_to_excel", "-t", "APP", "--weeks", "zero"];
        assert!(build_command().try_get_matches_from(argv).is_err());
        let argv = ["linear_to_excel", "-t", "APP", "--weeks", "0"];
        assert!(build_command().try_get_matches_from(argv).is_err());
        let argv = ["linear_to_excel", "-t", "APP", "--weeks", "16376"];
        assert!(build_command().try_get_matches_from(argv).is_err());
        let m = matches(&["-t", "APP", "--weeks", "16375"]);
        assert_eq!(m.get_one::<u32>("weeks"), Some(&MAX_WEEKS));
        assert!(parse_start_date(Some(&"05/01/2026".to_string())).is_err());
    }

    #[test]
    fn test_parse_initiatives() {
        assert_eq!(parse_initiatives(None), None);
        assert_eq!(parse_initiatives(Some(&" , ".to_string())), None);
        assert_eq!(
            parse_initiatives(Some(&"q4-security, growth ".to_string())),
            Some(vec!["q4-security".to_string(), "growth".to_string()])
        );
    }

    #[test]
    fn test_command_is_consistent() {
        build_command().debug_assert();
    }
}
