//! Cleaning results: the report as tables, and raw vs cleaned quality.

use super::{
    ChartKind, ChartSeries, ChartSpec, DataRequirement, Page, PageContent, PageContext, Table,
    format_count,
};
use crate::error::Result;
use crate::reporting::{CleaningReport, DerivationStatus, QualitySnapshot};
use crate::types::DatasetKey;

pub struct PreprocessingPage;

fn column_table(report: &CleaningReport) -> Table {
    let mut table = Table::new(
        "Column Summary",
        &[
            "Column",
            "Type",
            "Missing Before",
            "Missing After",
            "Coercion Failures",
            "Imputation",
            "Status",
            "Categories",
            "Outliers",
        ],
    );
    for column in &report.columns {
        let status = match (column.was_removed, column.flagged_for_removal) {
            (true, _) => "removed".to_string(),
            (false, true) => "flagged".to_string(),
            _ => "kept".to_string(),
        };
        table.row(vec![
            column.name.clone(),
            column.semantic_type.display_name().to_string(),
            column.missing_before.to_string(),
            column.missing_after.to_string(),
            column.coercion_failures.to_string(),
            column.imputation.clone().unwrap_or_else(|| "-".to_string()),
            status,
            column
                .encoding_size
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            column.outliers_handled.to_string(),
        ]);
    }
    table
}

fn quality_comparison(raw: &QualitySnapshot, cleaned: &QualitySnapshot) -> Table {
    let mut table = Table::new("Raw vs Cleaned Quality", &["Metric", "Raw", "Cleaned"]);
    let rows = [
        ("Records", raw.total_records.to_string(), cleaned.total_records.to_string()),
        ("Features", raw.features.to_string(), cleaned.features.to_string()),
        ("Missing Cells", raw.missing_cells.to_string(), cleaned.missing_cells.to_string()),
        (
            "Completeness",
            format!("{:.1}%", raw.completeness_pct),
            format!("{:.1}%", cleaned.completeness_pct),
        ),
        (
            "Duplicate Rows",
            raw.duplicate_rows.to_string(),
            cleaned.duplicate_rows.to_string(),
        ),
    ];
    for (label, before, after) in rows {
        table.row(vec![label.to_string(), before, after]);
    }
    table
}

impl Page for PreprocessingPage {
    fn id(&self) -> &'static str {
        "preprocessing"
    }

    fn title(&self) -> &'static str {
        "Data Preprocessing"
    }

    fn requirement(&self) -> DataRequirement {
        DataRequirement::Cleaned
    }

    fn render(&self, ctx: &PageContext) -> Result<PageContent> {
        let cleaned = ctx.data(self.id(), self.requirement())?;
        let mut content = PageContent::default();

        if let Some(raw) = ctx.raw_view() {
            let comparison = quality_comparison(
                &QualitySnapshot::from_profiles(&raw, ctx.profiles(DatasetKey::Raw))?,
                &QualitySnapshot::from_profiles(&cleaned, ctx.profiles(DatasetKey::Cleaned))?,
            );
            content.tables.push(comparison);
        }

        let Some(report) = ctx.report() else {
            content.note("No cleaning report was recorded for this dataset");
            return Ok(content);
        };

        content.metric("Rows Before", format_count(report.rows_before));
        content.metric("Rows After", format_count(report.rows_after));
        content.metric("Rows Dropped", format_count(report.rows_dropped()));
        content.metric("Columns Before", report.columns_before.to_string());
        content.metric("Columns After", report.columns_after.to_string());
        content.metric("Actions", report.actions.len().to_string());

        content.tables.push(column_table(report));

        let mut drops = Table::new("Row Drops", &["Rule", "Rows"]);
        for drop in &report.row_drops {
            drops.row(vec![drop.rule.display_name().to_string(), drop.count.to_string()]);
        }
        content.tables.push(drops);

        let mut derivations = Table::new("Derived Features", &["Feature", "Status", "Detail"]);
        for outcome in &report.derivations {
            let (status, detail) = match outcome.status {
                DerivationStatus::Applied => ("applied", outcome.output_columns.join(", ")),
                DerivationStatus::Skipped => {
                    ("skipped", outcome.reason.clone().unwrap_or_default())
                }
            };
            derivations.row(vec![
                outcome.feature.name().to_string(),
                status.to_string(),
                detail,
            ]);
        }
        content.tables.push(derivations);

        let mut actions = Table::new("Actions", &["Action", "Target", "Description"]);
        for action in &report.actions {
            actions.row(vec![
                action.action_type.display_name().to_string(),
                action.target.clone(),
                action.description.clone(),
            ]);
        }
        content.tables.push(actions);

        let with_missing: Vec<_> = report
            .columns
            .iter()
            .filter(|c| c.missing_before > 0)
            .collect();
        if with_missing.is_empty() {
            content.note("No missing values were found");
        } else {
            let series = |name: &str, pick: fn(usize, usize) -> usize| {
                ChartSeries::new(
                    name,
                    with_missing
                        .iter()
                        .map(|c| (c.name.clone(), pick(c.missing_before, c.missing_after) as f64)),
                )
            };
            content.charts.push(
                ChartSpec::new(ChartKind::GroupedBar, "Missing Values by Column")
                    .axes("Column", "Missing Values")
                    .with_series(series("before", |before, _| before))
                    .with_series(series("after", |_, after| after)),
            );
        }

        for warning in &report.warnings {
            content.note(warning.clone());
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnRoles, DerivedFeature, IngestConfig, PipelineConfig};
    use crate::pipeline::Pipeline;
    use crate::session::SessionState;

    #[test]
    fn test_report_tables() {
        let session = SessionState::new();
        session
            .upload(
                b"age,outcome\n25,readmitted\nNA,not_readmitted\n40,readmitted\n",
                "t.csv",
                &IngestConfig::default(),
            )
            .unwrap();
        let config = PipelineConfig::builder()
            .derive(DerivedFeature::LengthOfStay)
            .build()
            .unwrap();
        session
            .run_pipeline(&Pipeline::builder().config(config).build().unwrap())
            .unwrap();

        let ctx = PageContext::from_session(&session, &ColumnRoles::default()).unwrap();
        let content = PreprocessingPage.render(&ctx).unwrap();

        let columns = content
            .tables
            .iter()
            .find(|t| t.title == "Column Summary")
            .unwrap();
        assert_eq!(columns.rows[0][0], "age");
        assert_eq!(columns.rows[0][2], "1");
        assert_eq!(columns.rows[0][3], "0");
        assert_eq!(columns.rows[1][7], "2");

        let derived = content
            .tables
            .iter()
            .find(|t| t.title == "Derived Features")
            .unwrap();
        assert_eq!(derived.rows[0][1], "skipped");

        assert_eq!(content.charts[0].series.len(), 2);
        let quality = &content.tables[0];
        assert_eq!(quality.title, "Raw vs Cleaned Quality");
        assert_eq!(quality.rows[2], vec!["Missing Cells", "1", "0"]);

        let mut profiles = ctx.profiles(DatasetKey::Cleaned).to_vec();
        profiles[0].missing_count = 5;
        let content = PreprocessingPage
            .render(&ctx.with_profiles(DatasetKey::Cleaned, profiles))
            .unwrap();
        assert_eq!(content.tables[0].rows[2], vec!["Missing Cells", "1", "5"]);
    }
}
