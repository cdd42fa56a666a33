#![deny(warnings)]

//! Headless CLI for strategic plans: store growth-share matrices and print
//! their evaluated report.

mod settings;

use anyhow::{bail, Context, Result};
use growth_share::{evaluate, MatrixReport};
use plan_core::BcgMatrix;
use settings::{ReportFormat, Settings};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: plan-cli [--db URL] [--config FILE] <command>
commands:
  new-plan --title T [--description D]
  plans
  save --plan ID --input FILE
  report (--input FILE | --plan ID) [--format table|json]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    command: Option<String>,
    db: Option<String>,
    config: Option<PathBuf>,
    input: Option<PathBuf>,
    plan: Option<i64>,
    title: Option<String>,
    description: Option<String>,
    format: Option<ReportFormat>,
    version: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| it.next().with_context(|| format!("{flag} needs a value"));
        match arg.as_str() {
            "--db" => parsed.db = Some(value("--db")?),
            "--config" => parsed.config = Some(value("--config")?.into()),
            "--input" => parsed.input = Some(value("--input")?.into()),
            "--plan" => {
                let raw = value("--plan")?;
                parsed.plan = Some(raw.parse().with_context(|| format!("bad plan id: {raw}"))?);
            }
            "--title" => parsed.title = Some(value("--title")?),
            "--description" => parsed.description = Some(value("--description")?),
            "--format" => parsed.format = Some(value("--format")?.parse()?),
            "--version" | "-V" => parsed.version = true,
            flag if flag.starts_with('-') => bail!("unknown flag {flag}\n{USAGE}"),
            command if parsed.command.is_none() => parsed.command = Some(command.to_string()),
            extra => bail!("unexpected argument {extra}\n{USAGE}"),
        }
    }
    Ok(parsed)
}

/// Read a matrix document from JSON or YAML (by extension).
fn read_matrix(path: &Path) -> Result<BcgMatrix> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let matrix = if is_yaml {
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
    } else {
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
    };
    Ok(matrix)
}

fn render_table(report: &MatrixReport) -> String {
    let mut out = format!(
        "{:<20} {:>12} {:>8} {:>8} {:>6}  {:<14} {}\n",
        "PRODUCT", "SALES", "SHARE%", "TCM%", "PRM", "QUADRANT", "DECISION"
    );
    for row in &report.rows {
        out.push_str(&format!(
            "{:<20} {:>12} {:>8} {:>8} {:>6}  {:<14} {}\n",
            row.product.as_str(),
            format!("{:.2}", row.current_sales),
            format!("{:.2}", row.sales_share),
            format!("{:.2}", row.market_growth_rate),
            format!("{:.2}", row.relative_market_position),
            row.quadrant.to_string(),
            row.decision
        ));
    }
    out.push_str(&format!(
        "{:<20} {:>12} {:>8}\n",
        "TOTAL",
        format!("{:.2}", report.total_sales),
        format!("{:.2}", report.share_total)
    ));
    out
}

impl Args {
    /// `--db` wins over the settings (file or environment).
    fn database_url(&self, settings: &Settings) -> String {
        self.db
            .clone()
            .unwrap_or_else(|| settings.database_url.clone())
    }
}

async fn run(args: Args, settings: Settings) -> Result<()> {
    let db_url = args.database_url(&settings);
    let command = args.command.as_deref().unwrap_or("report");
    info!(command, db = %db_url, "starting CLI");

    match command {
        "new-plan" => {
            let title = args.title.context("new-plan needs --title")?;
            let pool = persistence::open_store(&db_url).await?;
            let id =
                persistence::create_plan(&pool, &title, args.description.as_deref()).await?;
            println!("{id}");
        }
        "plans" => {
            let pool = persistence::open_store(&db_url).await?;
            for plan in persistence::list_plans(&pool).await? {
                println!(
                    "{:>4} | {} | updated: {}",
                    plan.id,
                    plan.title,
                    plan.updated_at.as_deref().unwrap_or("-")
                );
            }
        }
        "save" => {
            let plan = args.plan.context("save needs --plan")?;
            let input = args.input.context("save needs --input")?;
            let matrix = read_matrix(&input)?;
            let pool = persistence::open_store(&db_url).await?;
            persistence::save_bcg_matrix(&pool, plan, &matrix)
                .await
                .with_context(|| format!("saving matrix for plan {plan}"))?;
            println!("Saved | plan: {} | products: {}", plan, matrix.products().len());
        }
        "report" => {
            let matrix = match (&args.input, args.plan) {
                (Some(input), _) => read_matrix(input)?,
                (None, Some(plan)) => {
                    let pool = persistence::open_store(&db_url).await?;
                    persistence::load_bcg_matrix(&pool, plan)
                        .await?
                        .with_context(|| format!("plan {plan} has no saved matrix"))?
                }
                (None, None) => bail!("report needs --input or --plan\n{USAGE}"),
            };
            let report = evaluate(&matrix);
            match args.format.unwrap_or(settings.report_format) {
                ReportFormat::Table => print!("{}", render_table(&report)),
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }
        other => bail!("unknown command {other}\n{USAGE}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    if args.version {
        println!("plan-cli {} ({})", env!("CARGO_PKG_VERSION"), env!("GIT_SHA"));
        return Ok(());
    }
    let settings = Settings::load(args.config.as_deref())?;

    // Logging setup
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run(args, settings).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_report_flags() {
        let a = args(&["--db", "sqlite::memory:", "report", "--plan", "7", "--format", "json"])
            .unwrap();
        assert_eq!(a.command.as_deref(), Some("report"));
        assert_eq!(a.db.as_deref(), Some("sqlite::memory:"));
        assert_eq!(a.plan, Some(7));
        assert_eq!(a.format, Some(ReportFormat::Json));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(args(&["report", "--plan", "seven"]).is_err());
        assert!(args(&["report", "--bogus"]).is_err());
        assert!(args(&["report", "extra"]).is_err());
        assert!(args(&["save", "--input"]).is_err());
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("plan-cli-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn file_settings(dir: &Path) -> Settings {
        Settings {
            database_url: format!("sqlite://{}/db/plans.db", dir.display()),
            ..Settings::default()
        }
    }

    #[test]
    fn db_flag_overrides_settings() {
        let settings = Settings {
            database_url: "sqlite://from-settings.db".into(),
            ..Settings::default()
        };
        let plain = args(&["plans"]).unwrap();
        assert_eq!(plain.database_url(&settings), "sqlite://from-settings.db");
        let flagged = args(&["--db", "sqlite::memory:", "plans"]).unwrap();
        assert_eq!(flagged.database_url(&settings), "sqlite::memory:");
    }

    #[tokio::test]
    async fn commands_share_one_database() {
        let dir = scratch_dir("flow");
        let input = dir.join("matrix.json");
        std::fs::write(
            &input,
            r#"{"productos":[{"nombre":"ERP"}],"ventasActuales":{"ERP":250}}"#,
        )
        .unwrap();
        let input = input.to_str().unwrap();
        let settings = file_settings(&dir);

        run(args(&["new-plan", "--title", "IT plan"]).unwrap(), settings.clone())
            .await
            .unwrap();
        run(args(&["plans"]).unwrap(), settings.clone()).await.unwrap();
        run(args(&["save", "--plan", "1", "--input", input]).unwrap(), settings.clone())
            .await
            .unwrap();
        run(args(&["report", "--plan", "1", "--format", "json"]).unwrap(), settings.clone())
            .await
            .unwrap();
        assert!(run(args(&["report", "--plan", "2"]).unwrap(), settings.clone())
            .await
            .is_err());
        assert!(run(args(&["save", "--plan", "2", "--input", input]).unwrap(), settings.clone())
            .await
            .is_err());

        let pool = persistence::init_db(&settings.database_url).await.unwrap();
        let m = persistence::load_bcg_matrix(&pool, 1).await.unwrap().unwrap();
        assert_eq!(m.current_sales("ERP"), Decimal::new(250, 0));
        pool.close().await;
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn report_from_file_leaves_database_alone() {
        let dir = scratch_dir("report");
        let input = dir.join("matrix.json");
        std::fs::write(&input, "{}").unwrap();
        let input = input.to_str().unwrap();

        run(args(&["report", "--input", input]).unwrap(), file_settings(&dir))
            .await
            .unwrap();
        assert!(!dir.join("db").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn table_lists_every_product() {
        let mut m = BcgMatrix::default();
        m.set_current_sales("Product 1", Decimal::new(600, 0)).unwrap();
        m.set_current_sales("Product 2", Decimal::new(400, 0)).unwrap();
        let table = render_table(&evaluate(&m));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[1].starts_with("Product 1"));
        assert!(lines[1].contains("60.00"));
        assert!(lines[6].contains("100.00"));
    }

    #[test]
    fn reads_yaml_documents() {
        let dir = std::env::temp_dir().join(format!("plan-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("matrix.yaml");
        std::fs::write(
            &path,
            "productos:\n  - nombre: ERP\n    color: '#FF6B6B'\nyears: [2020, 2021]\nventasActuales:\n  ERP: 125.5\n",
        )
        .unwrap();
        let m = read_matrix(&path).unwrap();
        assert_eq!(m.current_sales("ERP"), Decimal::new(1255, 1));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
