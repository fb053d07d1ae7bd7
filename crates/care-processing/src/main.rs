//! CLI entry point: upload a CSV, run preprocessing, and render dashboard pages.

use anyhow::{Context, Result, anyhow};
use care_processing::pages::{PageContext, all_pages, find_page, render_page};
use care_processing::{
    CategoricalFill, DashboardConfig, DatasetKey, DerivedFeature, MissingValueStrategy,
    OutlierStrategy, Page, Pipeline, ScalingMethod, SessionState,
};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use tracing::{error, info, warn};

/// CLI-compatible missing value strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliStrategy {
    /// Fill with the mean of observed values
    Mean,
    /// Fill with the median of observed values
    Median,
    /// Fill with the most frequent value
    Mode,
    /// Drop rows with missing numeric or date values
    Drop,
}

impl From<CliStrategy> for MissingValueStrategy {
    fn from(cli: CliStrategy) -> Self {
        match cli {
            CliStrategy::Mean => MissingValueStrategy::Mean,
            CliStrategy::Median => MissingValueStrategy::Median,
            CliStrategy::Mode => MissingValueStrategy::Mode,
            CliStrategy::Drop => MissingValueStrategy::Drop,
        }
    }
}

/// CLI-compatible categorical fill enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliCategoricalFill {
    /// Use the most frequent label
    Mode,
    /// Use the constant "Unknown"
    Unknown,
}

impl From<CliCategoricalFill> for CategoricalFill {
    fn from(cli: CliCategoricalFill) -> Self {
        match cli {
            CliCategoricalFill::Mode => CategoricalFill::Mode,
            CliCategoricalFill::Unknown => CategoricalFill::Unknown,
        }
    }
}

/// CLI-compatible outlier strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutlierStrategy {
    /// Keep outliers as-is
    Keep,
    /// Cap outliers at IQR bounds
    Cap,
    /// Remove rows containing outliers
    Remove,
}

impl From<CliOutlierStrategy> for OutlierStrategy {
    fn from(cli: CliOutlierStrategy) -> Self {
        match cli {
            CliOutlierStrategy::Keep => OutlierStrategy::Keep,
            CliOutlierStrategy::Cap => OutlierStrategy::Cap,
            CliOutlierStrategy::Remove => OutlierStrategy::Remove,
        }
    }
}

/// CLI-compatible scaling method enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliScaling {
    /// Zero mean, unit standard deviation
    Standard,
    /// Rescale to [0, 1]
    MinMax,
    /// Center on the median, divide by the IQR
    Robust,
}

impl From<CliScaling> for ScalingMethod {
    fn from(cli: CliScaling) -> Self {
        match cli {
            CliScaling::Standard => ScalingMethod::Standard,
            CliScaling::MinMax => ScalingMethod::MinMax,
            CliScaling::Robust => ScalingMethod::Robust,
        }
    }
}

/// CLI-compatible derived feature enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliDerivedFeature {
    /// Every derivation below
    All,
    /// Life-stage bucket of the age column
    AgeGroup,
    /// Days between admission and discharge
    LengthOfStay,
    /// Bucketed length of stay
    LengthOfStayBucket,
    /// Year, month, day, weekday and quarter of admission
    AdmissionDateParts,
}

impl CliDerivedFeature {
    fn features(self) -> Vec<DerivedFeature> {
        match self {
            Self::All => DerivedFeature::ALL.to_vec(),
            Self::AgeGroup => vec![DerivedFeature::AgeGroup],
            Self::LengthOfStay => vec![DerivedFeature::LengthOfStay],
            Self::LengthOfStayBucket => vec![DerivedFeature::LengthOfStayBucket],
            Self::AdmissionDateParts => vec![DerivedFeature::AdmissionDateParts],
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Healthcare readmission dashboard data pipeline",
    long_about = "Uploads a CSV file into a dashboard session, runs the preprocessing \
                  pipeline and renders dashboard pages as text or JSON.\n\n\
                  EXAMPLES:\n  \
                  # Clean with mean imputation and show the outcomes page\n  \
                  care-processing -i healthcare.csv --strategy mean --page outcomes\n\n  \
                  # Derive every feature and write the cleaned CSV with labels\n  \
                  care-processing -i healthcare.csv --derive all -o cleaned.csv --decoded\n\n  \
                  # Report as JSON\n  \
                  care-processing -i healthcare.csv --json | jq .report.rows_after"
)]
struct Args {
    /// Path to the CSV file to upload
    #[arg(short, long)]
    input: String,

    /// JSON dashboard configuration (ingest, pipeline and column roles)
    #[arg(short, long)]
    config: Option<String>,

    /// Strategy for missing numeric and date values
    #[arg(long, value_enum)]
    strategy: Option<CliStrategy>,

    /// Fill rule for missing categorical values
    #[arg(long, value_enum)]
    categorical_fill: Option<CliCategoricalFill>,

    /// Missing fraction (0.0 - 1.0) above which a column is flagged
    #[arg(long)]
    threshold: Option<f64>,

    /// Keep flagged columns (un-imputed) instead of removing them
    #[arg(long)]
    keep_flagged: bool,

    /// Derived feature to append; repeatable
    #[arg(long, value_enum)]
    derive: Vec<CliDerivedFeature>,

    /// Strategy for IQR outliers
    #[arg(long, value_enum)]
    outliers: Option<CliOutlierStrategy>,

    /// Remove exact duplicate rows
    #[arg(long)]
    dedupe: bool,

    /// Add one 0/1 column per label of this categorical column; repeatable
    #[arg(long)]
    one_hot: Vec<String>,

    /// Add a label-count column for this categorical column; repeatable
    #[arg(long)]
    frequency: Vec<String>,

    /// Add scaled copies of numeric columns
    #[arg(long, value_enum)]
    scale: Option<CliScaling>,

    /// Column to scale (repeatable); default is every numeric column
    #[arg(long, requires = "scale")]
    scale_column: Vec<String>,

    /// Upload only; pages that need cleaned data report what is missing
    #[arg(long)]
    no_preprocess: bool,

    /// Page to render (repeatable), or "all"
    #[arg(short, long)]
    page: Vec<String>,

    /// Print column profiles of the uploaded dataset
    #[arg(long)]
    profile: bool,

    /// Write the cleaned dataset to this CSV path
    #[arg(short, long)]
    output: Option<String>,

    /// Write labels instead of category codes to --output
    #[arg(long)]
    decoded: bool,

    /// Output JSON to stdout instead of human-readable text
    ///
    /// Disables all logs; only the JSON document is written.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only holds JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file (or defaults) with command line overrides applied.
fn load_config(args: &Args) -> Result<DashboardConfig> {
    let mut config = match &args.config {
        Some(path) => DashboardConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path))?,
        None => DashboardConfig::default(),
    };

    let pipeline = &mut config.pipeline;
    if let Some(strategy) = args.strategy {
        pipeline.missing_value_strategy = strategy.into();
    }
    if let Some(fill) = args.categorical_fill {
        pipeline.categorical_fill = fill.into();
    }
    if let Some(threshold) = args.threshold {
        pipeline.missingness_drop_threshold = threshold;
    }
    if args.keep_flagged {
        pipeline.drop_flagged_columns = false;
    }
    for derive in &args.derive {
        pipeline.derived_features.extend(derive.features());
    }
    if let Some(outliers) = args.outliers {
        pipeline.outlier_strategy = outliers.into();
    }
    if args.dedupe {
        pipeline.remove_duplicates = true;
    }
    pipeline.one_hot_columns.extend(args.one_hot.iter().cloned());
    pipeline.frequency_columns.extend(args.frequency.iter().cloned());
    if let Some(scale) = args.scale {
        pipeline.scaling = Some(scale.into());
    }
    pipeline.scaled_columns.extend(args.scale_column.iter().cloned());

    config.validate()?;
    Ok(config)
}

fn selected_pages(args: &Args) -> Result<Vec<Box<dyn Page>>> {
    if args.page.iter().any(|p| p == "all") {
        return Ok(all_pages());
    }
    args.page
        .iter()
        .map(|id| {
            find_page(id).ok_or_else(|| {
                let known: Vec<&str> = all_pages().iter().map(|p| p.id()).collect();
                anyhow!("Unknown page '{}'. Known pages: {}", id, known.join(", "))
            })
        })
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);
    dotenv().ok();

    let config = load_config(&args)?;
    let pages = selected_pages(&args)?;

    let session = SessionState::new();
    let raw = session
        .upload_file(&args.input, &config.ingest)
        .map_err(|e| {
            error!("Upload failed: {}", e);
            anyhow!("{} ({})", e, e.user_hint())
        })?;
    let name = raw.source().name.clone();
    info!("Uploaded '{}': {} rows x {} columns", name, raw.height(), raw.width());

    let report = if args.no_preprocess {
        None
    } else {
        let mut builder = Pipeline::builder().config(config.pipeline.clone());
        if !args.quiet && !args.json {
            builder = builder.on_progress(|update| {
                info!(
                    "[{:.0}%] {}: {}",
                    update.progress * 100.0,
                    update.stage.display_name(),
                    update.message
                );
            });
        }
        let outcome = session.run_pipeline(&builder.build()?).map_err(|e| {
            error!("Pipeline failed: {}", e);
            anyhow!("Pipeline failed: {}", e)
        })?;

        if let Some(output) = &args.output {
            std::fs::write(output, outcome.cleaned.to_csv_bytes(args.decoded)?)
                .with_context(|| format!("writing {}", output))?;
            info!("Cleaned dataset written to: {}", output);
        }
        Some(outcome.report)
    };
    if args.no_preprocess && args.output.is_some() {
        warn!("--output ignored: preprocessing was skipped");
    }

    let profiles = if args.profile {
        session.profiles(DatasetKey::Raw)?
    } else {
        None
    };

    let ctx = PageContext::from_session(&session, &config.roles)?;
    let views = pages
        .iter()
        .map(|page| render_page(page.as_ref(), &ctx))
        .collect::<care_processing::ProcessingResult<Vec<_>>>()?;

    if args.json {
        let document = serde_json::json!({
            "source": raw.source(),
            "report": report.as_deref(),
            "profiles": profiles.as_deref(),
            "workflow": session.workflow(),
            "pages": views,
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("{} ({} rows x {} columns)", name, raw.height(), raw.width());
    println!("{}", "=".repeat(80));

    if let Some(profiles) = &profiles {
        println!("\nCOLUMN PROFILES");
        println!("{}", "-".repeat(40));
        println!(
            "{:<24} {:<12} {:<10} {:<10}",
            "Column", "Type", "Missing %", "Distinct"
        );
        for profile in profiles.iter() {
            println!(
                "{:<24} {:<12} {:<10.1} {:<10}",
                truncate_str(&profile.name, 23),
                profile.semantic_type.display_name(),
                profile.missing_percentage,
                profile.distinct_count
            );
        }
    }

    if let Some(report) = &report {
        println!("\nPREPROCESSING");
        println!("{}", "-".repeat(40));
        println!("  Rows: {} -> {}", report.rows_before, report.rows_after);
        println!(
            "  Columns: {} -> {}",
            report.columns_before, report.columns_after
        );
        for drop in &report.row_drops {
            println!("  Dropped {}: {}", drop.rule.display_name(), drop.count);
        }
        for outcome in report.skipped_derivations() {
            println!(
                "  Skipped {}: {}",
                outcome.feature.name(),
                outcome.reason.as_deref().unwrap_or("")
            );
        }
        for warning in &report.warnings {
            println!("  Warning: {}", warning);
        }
    }

    for view in &views {
        println!("\n{}", view);
    }
    Ok(())
}

fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
