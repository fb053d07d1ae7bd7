//! Dashboard pages.
//!
//! A page declares which session dataset it needs and renders plain data:
//! metrics, chart specifications, tables and notes. Drawing is left to the
//! frontend. When the declared data is absent, [`render_page`] returns
//! [`PageView::NeedsData`] instead of failing.
//!
//! # Example
//!
//! ```rust,ignore
//! use care_processing::pages::{PageContext, all_pages, render_page};
//!
//! let ctx = PageContext::from_session(&session, &roles)?;
//! for page in all_pages() {
//!     println!("{}", render_page(page.as_ref(), &ctx)?);
//! }
//! ```

mod analytics;
mod conditions;
mod correlations;
mod demographics;
mod financial;
mod home;
mod narrative;
mod outcomes;
mod preprocessing;
mod temporal;

pub use analytics::{AnalyticsPage, RiskRate, risk_rates};
pub use conditions::ConditionsPage;
pub use correlations::CorrelationsPage;
pub use demographics::DemographicsPage;
pub use financial::FinancialPage;
pub use home::HomePage;
pub use narrative::{KpiPage, ProblemPage, StakeholdersPage};
pub use outcomes::{OutcomesPage, headline_metrics};
pub use preprocessing::PreprocessingPage;
pub use temporal::TemporalPage;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::ColumnRoles;
use crate::dataset::{CleanedDataset, RawDataset};
use crate::error::{ProcessingError, Result};
use crate::reporting::CleaningReport;
use crate::session::{SessionSnapshot, SessionState, StoredDataset, WorkflowProgress};
use crate::types::{ColumnProfile, DatasetKey};
use crate::view::DatasetView;

// ============================================================================
// REQUIREMENTS & CONTEXT
// ============================================================================

/// Which session data a page needs before it can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataRequirement {
    /// Static content
    None,
    Raw,
    Cleaned,
    /// Prefers the cleaned dataset, falls back to the raw upload
    CleanedOrRaw,
}

/// Everything a page may read, captured from the session at render time.
#[derive(Debug, Clone)]
pub struct PageContext {
    raw: Option<Arc<RawDataset>>,
    cleaned: Option<Arc<CleanedDataset>>,
    report: Option<Arc<CleaningReport>>,
    raw_profiles: Option<Arc<Vec<ColumnProfile>>>,
    cleaned_profiles: Option<Arc<Vec<ColumnProfile>>>,
    workflow: WorkflowProgress,
    roles: ColumnRoles,
}

impl PageContext {
    /// Capture one consistent snapshot of `session`, with column profiles
    /// for every stored dataset.
    pub fn from_session(session: &SessionState, roles: &ColumnRoles) -> Result<Self> {
        let SessionSnapshot {
            raw,
            cleaned,
            report,
            workflow,
        } = session.snapshot();

        let raw_profiles = raw
            .clone()
            .map(|raw| session.profiles_of(&StoredDataset::Raw(raw)))
            .transpose()?;
        let cleaned_profiles = cleaned
            .clone()
            .map(|cleaned| session.profiles_of(&StoredDataset::Cleaned(cleaned)))
            .transpose()?;

        Ok(Self {
            raw,
            cleaned,
            report,
            raw_profiles,
            cleaned_profiles,
            workflow,
            roles: roles.clone(),
        })
    }

    /// Replace the column profiles pages read for `key`.
    pub fn with_profiles(mut self, key: DatasetKey, profiles: Vec<ColumnProfile>) -> Self {
        let profiles = Some(Arc::new(profiles));
        match key {
            DatasetKey::Raw => self.raw_profiles = profiles,
            DatasetKey::Cleaned => self.cleaned_profiles = profiles,
        }
        self
    }

    /// Column profiles of the dataset under `key`; empty when it is absent.
    pub fn profiles(&self, key: DatasetKey) -> &[ColumnProfile] {
        let profiles = match key {
            DatasetKey::Raw => &self.raw_profiles,
            DatasetKey::Cleaned => &self.cleaned_profiles,
        };
        profiles.as_deref().map_or(&[], Vec::as_slice)
    }

    pub fn profile(&self, key: DatasetKey, column: &str) -> Option<&ColumnProfile> {
        self.profiles(key).iter().find(|p| p.name == column)
    }

    pub fn roles(&self) -> &ColumnRoles {
        &self.roles
    }

    pub fn workflow(&self) -> &WorkflowProgress {
        &self.workflow
    }

    pub fn report(&self) -> Option<&CleaningReport> {
        self.report.as_deref()
    }

    pub fn raw_view(&self) -> Option<DatasetView<'_>> {
        self.raw.as_deref().map(DatasetView::raw)
    }

    pub fn cleaned_view(&self) -> Option<DatasetView<'_>> {
        self.cleaned.as_deref().map(DatasetView::cleaned)
    }

    /// Check `requirement`, naming `page` in the error.
    pub fn check(&self, page: &str, requirement: DataRequirement) -> Result<()> {
        let missing = match requirement {
            DataRequirement::None => None,
            DataRequirement::Raw | DataRequirement::CleanedOrRaw if self.raw.is_none() => {
                Some(DatasetKey::Raw)
            }
            DataRequirement::Cleaned if self.raw.is_none() => Some(DatasetKey::Raw),
            DataRequirement::Cleaned if self.cleaned.is_none() => Some(DatasetKey::Cleaned),
            _ => None,
        };
        match missing {
            Some(required) => Err(ProcessingError::DependencyNotMet {
                page: page.to_string(),
                required,
            }),
            None => Ok(()),
        }
    }

    /// The dataset a page with `requirement` reads.
    pub fn data(&self, page: &str, requirement: DataRequirement) -> Result<DatasetView<'_>> {
        self.check(page, requirement)?;
        let view = match requirement {
            DataRequirement::Raw => self.raw_view(),
            DataRequirement::Cleaned => self.cleaned_view(),
            DataRequirement::CleanedOrRaw => self.cleaned_view().or_else(|| self.raw_view()),
            DataRequirement::None => None,
        };
        view.ok_or_else(|| ProcessingError::DependencyNotMet {
            page: page.to_string(),
            required: DatasetKey::Raw,
        })
    }
}

// ============================================================================
// PAGE CONTENT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    HorizontalBar,
    StackedBar,
    GroupedBar,
    Pie,
    Histogram,
    BoxPlot,
    Line,
    Heatmap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    pub points: Vec<DataPoint>,
}

impl ChartSeries {
    pub fn new(name: impl Into<String>, points: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            name: name.into(),
            points: points
                .into_iter()
                .map(|(label, value)| DataPoint { label, value })
                .collect(),
        }
    }
}

/// Everything a frontend needs to draw one chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<ChartSeries>,
}

impl ChartSpec {
    pub fn new(kind: ChartKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            x_label: String::new(),
            y_label: String::new(),
            series: Vec::new(),
        }
    }

    pub fn axes(mut self, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        self.x_label = x_label.into();
        self.y_label = y_label.into();
        self
    }

    pub fn with_series(mut self, series: ChartSeries) -> Self {
        self.series.push(series);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metric {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(title: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            title: title.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }
}

/// Rendered content of one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageContent {
    pub metrics: Vec<Metric>,
    pub charts: Vec<ChartSpec>,
    pub tables: Vec<Table>,
    pub notes: Vec<String>,
}

impl PageContent {
    pub fn metric(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.metrics.push(Metric {
            label: label.into(),
            value: value.into(),
        });
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Record that a chart was left out because a column is absent.
    pub fn omit_chart(&mut self, title: &str, column: &str) {
        self.note(format!("'{}' omitted: column '{}' not found", title, column));
    }
}

/// Result of rendering a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageView {
    Ready {
        page: String,
        title: String,
        content: PageContent,
    },
    /// The page's data requirement is not met yet.
    NeedsData {
        page: String,
        missing: DatasetKey,
        message: String,
    },
}

impl PageView {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

// ============================================================================
// PAGE TRAIT
// ============================================================================

/// One dashboard page.
pub trait Page: Send + Sync {
    /// Stable identifier used for lookup and navigation.
    fn id(&self) -> &'static str;

    fn title(&self) -> &'static str;

    fn requirement(&self) -> DataRequirement;

    /// Render with the requirement already satisfied.
    fn render(&self, ctx: &PageContext) -> Result<PageContent>;
}

/// Render `page`, or describe which dataset is still missing.
pub fn render_page(page: &dyn Page, ctx: &PageContext) -> Result<PageView> {
    if let Err(err) = ctx.check(page.id(), page.requirement()) {
        return match err {
            ProcessingError::DependencyNotMet { ref page, required } => Ok(PageView::NeedsData {
                page: page.clone(),
                missing: required,
                message: format!("{}. {}.", err, err.user_hint()),
            }),
            other => Err(other),
        };
    }

    Ok(PageView::Ready {
        page: page.id().to_string(),
        title: page.title().to_string(),
        content: page.render(ctx)?,
    })
}

/// Every page, in navigation order.
pub fn all_pages() -> Vec<Box<dyn Page>> {
    vec![
        Box::new(HomePage),
        Box::new(ProblemPage),
        Box::new(StakeholdersPage),
        Box::new(KpiPage),
        Box::new(PreprocessingPage),
        Box::new(DemographicsPage),
        Box::new(ConditionsPage),
        Box::new(FinancialPage),
        Box::new(TemporalPage),
        Box::new(OutcomesPage),
        Box::new(CorrelationsPage),
        Box::new(AnalyticsPage),
    ]
}

pub fn find_page(id: &str) -> Option<Box<dyn Page>> {
    all_pages().into_iter().find(|p| p.id() == id)
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Age band labels used by every chart that groups by age.
pub const AGE_BANDS: [&str; 5] = ["<18", "18-34", "35-54", "55-74", "75+"];

pub fn age_band(age: f64) -> &'static str {
    match age {
        a if a < 18.0 => AGE_BANDS[0],
        a if a < 35.0 => AGE_BANDS[1],
        a if a < 55.0 => AGE_BANDS[2],
        a if a < 75.0 => AGE_BANDS[3],
        _ => AGE_BANDS[4],
    }
}

/// Counts of `(row, column)` label pairs where both are present.
pub(crate) fn crosstab(
    rows: &[Option<String>],
    columns: &[Option<String>],
) -> BTreeMap<String, BTreeMap<String, usize>> {
    let mut table: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    for (row, column) in rows.iter().zip(columns) {
        if let (Some(row), Some(column)) = (row, column) {
            *table
                .entry(row.clone())
                .or_default()
                .entry(column.clone())
                .or_insert(0) += 1;
        }
    }
    table
}

/// Age bands as optional labels, aligned with the input rows.
pub(crate) fn age_band_labels(ages: &[Option<f64>]) -> Vec<Option<String>> {
    ages.iter()
        .map(|a| a.map(|age| age_band(age).to_string()))
        .collect()
}

pub(crate) fn format_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Whole-dollar amount with thousands separators.
pub(crate) fn format_money(amount: f64) -> String {
    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{}${}", sign, format_count(rounded.abs() as usize))
}

// ============================================================================
// TEXT RENDERING
// ============================================================================

impl fmt::Display for PageView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeedsData { page, message, .. } => {
                writeln!(f, "== {} ==", page)?;
                writeln!(f, "{}", message)
            }
            Self::Ready { title, content, .. } => {
                writeln!(f, "== {} ==", title)?;
                write!(f, "{}", content)
            }
        }
    }
}

impl fmt::Display for PageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for metric in &self.metrics {
            writeln!(f, "  {}: {}", metric.label, metric.value)?;
        }
        for table in &self.tables {
            writeln!(f, "\n  [{}]", table.title)?;
            writeln!(f, "  {}", table.columns.join(" | "))?;
            for row in &table.rows {
                writeln!(f, "  {}", row.join(" | "))?;
            }
        }
        for chart in &self.charts {
            writeln!(f, "\n  <{:?}> {}", chart.kind, chart.title)?;
            for series in &chart.series {
                let points: Vec<String> = series
                    .points
                    .iter()
                    .map(|p| format!("{}={}", p.label, trim_float(p.value)))
                    .collect();
                writeln!(f, "    {}: {}", series.name, points.join(", "))?;
            }
        }
        for note in &self.notes {
            writeln!(f, "  note: {}", note)?;
        }
        Ok(())
    }
}

fn trim_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}
