//! Billing amounts overall and by condition and insurer.

use std::collections::BTreeMap;

use super::demographics::histogram_chart;
use super::{
    ChartKind, ChartSeries, ChartSpec, DataRequirement, Page, PageContent, PageContext, Table,
    format_money,
};
use crate::error::Result;
use crate::profiler::statistics::{mean, median, std_dev};

const BILLING_BINS: usize = 30;

/// Mean of `amounts` per label, highest first.
fn mean_by_group(labels: &[Option<String>], amounts: &[Option<f64>]) -> Vec<(String, f64)> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (label, amount) in labels.iter().zip(amounts) {
        if let (Some(label), Some(amount)) = (label, amount) {
            groups.entry(label.as_str()).or_default().push(*amount);
        }
    }
    let mut means: Vec<(String, f64)> = groups
        .into_iter()
        .filter_map(|(label, values)| Some((label.to_string(), mean(&values)?)))
        .collect();
    means.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    means
}

pub struct FinancialPage;

impl Page for FinancialPage {
    fn id(&self) -> &'static str {
        "financial"
    }

    fn title(&self) -> &'static str {
        "Financial Analysis"
    }

    fn requirement(&self) -> DataRequirement {
        DataRequirement::CleanedOrRaw
    }

    fn render(&self, ctx: &PageContext) -> Result<PageContent> {
        let view = ctx.data(self.id(), self.requirement())?;
        let roles = ctx.roles();
        let mut content = PageContent::default();

        let histogram_title = "Billing Amount Distribution";
        if !view.has_column(&roles.billing_amount) {
            content.omit_chart(histogram_title, &roles.billing_amount);
            return Ok(content);
        }
        let amounts = view.numbers(&roles.billing_amount)?;
        let observed: Vec<f64> = amounts.iter().flatten().copied().collect();

        content.charts.push(
            histogram_chart(histogram_title, &roles.billing_amount, &observed, BILLING_BINS)
                .axes("Billing Amount ($)", "Frequency"),
        );

        let mut stats = Table::new("Billing Statistics", &["Statistic", "Value"]);
        let min = observed.iter().copied().reduce(f64::min);
        let max = observed.iter().copied().reduce(f64::max);
        for (label, value) in [
            ("Mean", mean(&observed)),
            ("Median", median(&observed)),
            ("Std Dev", std_dev(&observed)),
            ("Min", min),
            ("Max", max),
            ("Total", Some(observed.iter().sum::<f64>())),
        ] {
            let cell = value.map(format_money).unwrap_or_else(|| "N/A".to_string());
            stats.row(vec![label.to_string(), cell]);
        }
        content.tables.push(stats);

        for (role, title, axis) in [
            (
                &roles.medical_condition,
                "Average Billing by Medical Condition",
                "Medical Condition",
            ),
            (
                &roles.insurance_provider,
                "Average Billing by Insurance Provider",
                "Insurance Provider",
            ),
        ] {
            if !view.has_column(role) {
                content.omit_chart(title, role);
                continue;
            }
            let labels = view.labels(role)?;
            content.charts.push(
                ChartSpec::new(ChartKind::Bar, title)
                    .axes(axis, "Average Billing ($)")
                    .with_series(ChartSeries::new(
                        roles.billing_amount.clone(),
                        mean_by_group(&labels, &amounts),
                    )),
            );
        }

        Ok(content)
    }
}
