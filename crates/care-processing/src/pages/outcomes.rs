//! Target variable analysis and the headline metrics shared with the home page.

use std::collections::{BTreeMap, BTreeSet};

use super::{
    AGE_BANDS, ChartKind, ChartSeries, ChartSpec, DataRequirement, Metric, Page, PageContent,
    PageContext, age_band_labels, crosstab, format_count, format_money,
};
use crate::config::ColumnRoles;
use crate::error::Result;
use crate::profiler::statistics::mean;
use crate::utils::value_counts;
use crate::view::DatasetView;

const NOT_AVAILABLE: &str = "N/A";

/// Total patients, average age, distinct conditions, average billing and the
/// share of rows whose target equals the positive label.
pub fn headline_metrics(view: &DatasetView<'_>, roles: &ColumnRoles) -> Result<Vec<Metric>> {
    let metric = |label: String, value: String| Metric { label, value };
    let mut metrics = vec![metric("Total Patients".into(), format_count(view.height()))];

    let average_age = if view.has_column(&roles.age) {
        let ages: Vec<f64> = view.numbers(&roles.age)?.into_iter().flatten().collect();
        mean(&ages).map(|a| format!("{:.1} years", a))
    } else {
        None
    };
    metrics.push(metric(
        "Average Age".into(),
        average_age.unwrap_or_else(|| NOT_AVAILABLE.into()),
    ));

    let conditions = if view.has_column(&roles.medical_condition) {
        let labels = view.labels(&roles.medical_condition)?;
        Some(labels.iter().flatten().collect::<BTreeSet<_>>().len().to_string())
    } else {
        None
    };
    metrics.push(metric(
        "Medical Conditions".into(),
        conditions.unwrap_or_else(|| NOT_AVAILABLE.into()),
    ));

    let billing = if view.has_column(&roles.billing_amount) {
        let amounts: Vec<f64> = view
            .numbers(&roles.billing_amount)?
            .into_iter()
            .flatten()
            .collect();
        mean(&amounts).map(format_money)
    } else {
        None
    };
    metrics.push(metric(
        "Avg Billing".into(),
        billing.unwrap_or_else(|| NOT_AVAILABLE.into()),
    ));

    let positive = if view.has_column(&roles.target) && view.height() > 0 {
        let targets = view.labels(&roles.target)?;
        let hits = targets
            .iter()
            .filter(|t| t.as_deref() == Some(roles.positive_label.as_str()))
            .count();
        Some(format!("{:.1}%", hits as f64 / view.height() as f64 * 100.0))
    } else {
        None
    };
    metrics.push(metric(
        format!("{} Tests", roles.positive_label),
        positive.unwrap_or_else(|| NOT_AVAILABLE.into()),
    ));

    Ok(metrics)
}

/// Row-normalized shares: for each group, the percentage of each target value.
fn percentage_chart(
    title: &str,
    x_label: &str,
    table: &BTreeMap<String, BTreeMap<String, usize>>,
    group_order: &[String],
) -> ChartSpec {
    let outcomes: BTreeSet<&String> = table.values().flat_map(|row| row.keys()).collect();
    let mut chart = ChartSpec::new(ChartKind::StackedBar, title).axes(x_label, "Percentage");

    for outcome in outcomes {
        let points = group_order.iter().filter_map(|group| {
            let row = table.get(group)?;
            let total: usize = row.values().sum();
            let count = row.get(outcome).copied().unwrap_or(0);
            Some((group.clone(), count as f64 / total as f64 * 100.0))
        });
        chart = chart.with_series(ChartSeries::new(outcome.clone(), points));
    }
    chart
}

pub struct OutcomesPage;

impl Page for OutcomesPage {
    fn id(&self) -> &'static str {
        "outcomes"
    }

    fn title(&self) -> &'static str {
        "Target Variable Analysis"
    }

    fn requirement(&self) -> DataRequirement {
        DataRequirement::CleanedOrRaw
    }

    fn render(&self, ctx: &PageContext) -> Result<PageContent> {
        let view = ctx.data(self.id(), self.requirement())?;
        let roles = ctx.roles();
        let mut content = PageContent {
            metrics: headline_metrics(&view, roles)?,
            ..PageContent::default()
        };

        let distribution_title = "Test Results Distribution";
        if !view.has_column(&roles.target) {
            content.omit_chart(distribution_title, &roles.target);
            return Ok(content);
        }
        let targets = view.labels(&roles.target)?;
        let counts = value_counts(targets.iter().flatten().map(String::as_str));
        content.charts.push(
            ChartSpec::new(ChartKind::Pie, distribution_title).with_series(ChartSeries::new(
                roles.target.clone(),
                counts.into_iter().map(|(v, c)| (v, c as f64)),
            )),
        );

        let by_condition_title = "Test Results by Medical Condition (%)";
        if view.has_column(&roles.medical_condition) {
            let conditions = view.labels(&roles.medical_condition)?;
            let table = crosstab(&conditions, &targets);
            let order: Vec<String> = table.keys().cloned().collect();
            content.charts.push(percentage_chart(
                by_condition_title,
                "Medical Condition",
                &table,
                &order,
            ));
        } else {
            content.omit_chart(by_condition_title, &roles.medical_condition);
        }

        let by_age_title = "Test Results by Age Group (%)";
        if view.has_column(&roles.age) {
            let bands = age_band_labels(&view.numbers(&roles.age)?);
            let table = crosstab(&bands, &targets);
            let order: Vec<String> = AGE_BANDS.iter().map(|b| b.to_string()).collect();
            content
                .charts
                .push(percentage_chart(by_age_title, "Age Group", &table, &order));
        } else {
            content.omit_chart(by_age_title, &roles.age);
        }

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::ingest::ingest_bytes;
    use pretty_assertions::assert_eq;

    const CSV: &[u8] = b"age,medical_condition,billing_amount,test_results\n\
        20,Asthma,1000,Normal\n\
        40,Asthma,3000,Abnormal\n\
        60,Diabetes,2000,Abnormal\n\
        80,Cancer,NA,Inconclusive\n";

    #[test]
    fn test_headline_metrics() {
        let raw = ingest_bytes(CSV, "t.csv", &IngestConfig::default()).unwrap();
        let metrics = headline_metrics(&DatasetView::raw(&raw), &ColumnRoles::default()).unwrap();
        let values: Vec<(&str, &str)> = metrics
            .iter()
            .map(|m| (m.label.as_str(), m.value.as_str()))
            .collect();
        assert_eq!(
            values,
            vec![
                ("Total Patients", "4"),
                ("Average Age", "50.0 years"),
                ("Medical Conditions", "3"),
                ("Avg Billing", "$2,000"),
                ("Abnormal Tests", "50.0%"),
            ]
        );
    }

    #[test]
    fn test_missing_roles_show_not_available() {
        let raw = ingest_bytes(b"x\n1\n", "t.csv", &IngestConfig::default()).unwrap();
        let metrics = headline_metrics(&DatasetView::raw(&raw), &ColumnRoles::default()).unwrap();
        assert!(metrics[1..].iter().all(|m| m.value == NOT_AVAILABLE));
    }

    #[test]
    fn test_percentage_chart_rows_sum_to_100() {
        let raw = ingest_bytes(CSV, "t.csv", &IngestConfig::default()).unwrap();
        let view = DatasetView::raw(&raw);
        let conditions = view.labels("medical_condition").unwrap();
        let targets = view.labels("test_results").unwrap();
        let table = crosstab(&conditions, &targets);
        let order: Vec<String> = table.keys().cloned().collect();
        let chart = percentage_chart("t", "x", &table, &order);

        let asthma_total: f64 = chart
            .series
            .iter()
            .flat_map(|s| &s.points)
            .filter(|p| p.label == "Asthma")
            .map(|p| p.value)
            .sum();
        assert!((asthma_total - 100.0).abs() < 1e-9);
    }
}
