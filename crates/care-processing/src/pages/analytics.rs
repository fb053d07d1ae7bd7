//! Advanced analytics: statistical summaries, risk factors, key insights and
//! a one-table report summary.
//!
//! Summaries are read from the column profiles of the page's dataset; risk
//! rates and billing thresholds come from the rows.

use std::collections::BTreeMap;

use super::{
    AGE_BANDS, ChartKind, ChartSeries, ChartSpec, DataRequirement, Page, PageContent, PageContext,
    Table, age_band_labels, format_count, format_money,
};
use crate::config::ColumnRoles;
use crate::error::Result;
use crate::profiler::statistics::quantile;
use crate::types::{ColumnProfile, SemanticType};
use crate::view::DatasetView;

const NOT_AVAILABLE: &str = "N/A";

/// Billing amounts above this quantile count as high-cost cases.
const HIGH_COST_QUANTILE: f64 = 0.9;

const RECOMMENDATIONS: [&str; 5] = [
    "High-Risk Monitoring: focus on patients with conditions showing the highest abnormal test rates",
    "Age-Based Protocols: implement age-specific screening and monitoring protocols",
    "Cost Management: investigate high-billing cases for cost optimization opportunities",
    "Preventive Care: develop targeted prevention programs for the most common conditions",
    "Resource Allocation: plan staffing and resources based on admission patterns",
];

pub struct AnalyticsPage;

/// One positive-label rate per group.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskRate {
    pub group: String,
    pub patients: usize,
    pub rate_pct: f64,
}

/// Share of rows per group whose target is the positive label. Rows with a
/// missing group are left out; a missing target counts as not positive.
pub fn risk_rates(
    groups: &[Option<String>],
    targets: &[Option<String>],
    positive_label: &str,
) -> Vec<RiskRate> {
    let mut tally: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for (group, target) in groups.iter().zip(targets) {
        let Some(group) = group else { continue };
        let entry = tally.entry(group.as_str()).or_insert((0, 0));
        entry.0 += 1;
        if target.as_deref() == Some(positive_label) {
            entry.1 += 1;
        }
    }
    tally
        .into_iter()
        .map(|(group, (patients, hits))| RiskRate {
            group: group.to_string(),
            patients,
            rate_pct: hits as f64 / patients as f64 * 100.0,
        })
        .collect()
}

fn format_stat(value: f64) -> String {
    format!("{:.2}", value)
}

fn numeric_summary(profiles: &[ColumnProfile]) -> Table {
    let mut table = Table::new(
        "Numerical Summary",
        &["Column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"],
    );
    for profile in profiles {
        let Some(s) = &profile.numeric else { continue };
        table.row(vec![
            profile.name.clone(),
            s.count.to_string(),
            format_stat(s.mean),
            format_stat(s.std),
            format_stat(s.min),
            format_stat(s.q1),
            format_stat(s.median),
            format_stat(s.q3),
            format_stat(s.max),
        ]);
    }
    table
}

fn categorical_summary(profiles: &[ColumnProfile]) -> Table {
    let mut table = Table::new(
        "Categorical Summary",
        &["Column", "Unique Values", "Most Frequent", "Frequency"],
    );
    for profile in profiles.iter().filter(|p| {
        matches!(p.semantic_type, SemanticType::Categorical | SemanticType::Text)
    }) {
        let (most_frequent, frequency) = match profile.top_values.first() {
            Some(top) => (top.value.clone(), top.count),
            None => (NOT_AVAILABLE.to_string(), 0),
        };
        table.row(vec![
            profile.name.clone(),
            profile.distinct_count.to_string(),
            most_frequent,
            frequency.to_string(),
        ]);
    }
    table
}

fn positive_rate(view: &DatasetView<'_>, roles: &ColumnRoles) -> Result<Option<f64>> {
    if !view.has_column(&roles.target) || view.height() == 0 {
        return Ok(None);
    }
    let hits = view
        .labels(&roles.target)?
        .iter()
        .filter(|t| t.as_deref() == Some(roles.positive_label.as_str()))
        .count();
    Ok(Some(hits as f64 / view.height() as f64 * 100.0))
}

/// Admission date range, or the first date column's when that role is absent.
fn time_period(profiles: &[ColumnProfile], roles: &ColumnRoles) -> Option<String> {
    profiles
        .iter()
        .find(|p| p.name == roles.admission_date && p.date_range.is_some())
        .or_else(|| profiles.iter().find(|p| p.date_range.is_some()))
        .and_then(|p| p.date_range.as_ref())
        .map(|range| format!("{} to {}", range.min, range.max))
}

fn risk_charts(
    content: &mut PageContent,
    view: &DatasetView<'_>,
    roles: &ColumnRoles,
) -> Result<()> {
    let by_condition_title = format!(
        "{} Test Rate by Medical Condition",
        roles.positive_label
    );
    if !view.has_column(&roles.target) {
        content.omit_chart(&by_condition_title, &roles.target);
        return Ok(());
    }
    let targets = view.labels(&roles.target)?;

    if view.has_column(&roles.medical_condition) {
        let conditions = view.labels(&roles.medical_condition)?;
        let mut rates = risk_rates(&conditions, &targets, &roles.positive_label);
        rates.sort_by(|a, b| b.rate_pct.total_cmp(&a.rate_pct));

        let mut table = Table::new(
            "Risk by Medical Condition",
            &["Medical Condition", "Patients", "Rate"],
        );
        for rate in &rates {
            table.row(vec![
                rate.group.clone(),
                rate.patients.to_string(),
                format!("{:.1}%", rate.rate_pct),
            ]);
        }
        content.tables.push(table);
        content.charts.push(
            ChartSpec::new(ChartKind::HorizontalBar, by_condition_title)
                .axes(format!("{} Test Rate (%)", roles.positive_label), "Medical Condition")
                .with_series(ChartSeries::new(
                    roles.medical_condition.clone(),
                    rates.into_iter().map(|r| (r.group, r.rate_pct)),
                )),
        );
    } else {
        content.omit_chart(&by_condition_title, &roles.medical_condition);
    }

    let by_age_title = format!("{} Test Rate by Age Group", roles.positive_label);
    if view.has_column(&roles.age) {
        let bands = age_band_labels(&view.numbers(&roles.age)?);
        let rates = risk_rates(&bands, &targets, &roles.positive_label);
        let points = AGE_BANDS.iter().filter_map(|band| {
            rates
                .iter()
                .find(|r| r.group == *band)
                .map(|r| (r.group.clone(), r.rate_pct))
        });
        content.charts.push(
            ChartSpec::new(ChartKind::Bar, by_age_title)
                .axes("Age Group", format!("{} Test Rate (%)", roles.positive_label))
                .with_series(ChartSeries::new(roles.age.clone(), points)),
        );
    } else {
        content.omit_chart(&by_age_title, &roles.age);
    }
    Ok(())
}

impl Page for AnalyticsPage {
    fn id(&self) -> &'static str {
        "analytics"
    }

    fn title(&self) -> &'static str {
        "Advanced Analytics"
    }

    fn requirement(&self) -> DataRequirement {
        DataRequirement::CleanedOrRaw
    }

    fn render(&self, ctx: &PageContext) -> Result<PageContent> {
        let view = ctx.data(self.id(), self.requirement())?;
        let profiles = ctx.profiles(view.key());
        let roles = ctx.roles();
        let mut content = PageContent::default();

        content.tables.push(numeric_summary(profiles));
        content.tables.push(categorical_summary(profiles));
        risk_charts(&mut content, &view, roles)?;

        let average_age = ctx
            .profile(view.key(), &roles.age)
            .and_then(|p| p.numeric)
            .map(|s| s.mean);
        let top_condition = ctx
            .profile(view.key(), &roles.medical_condition)
            .and_then(|p| p.top_values.first());
        let abnormal_rate = positive_rate(&view, roles)?;

        if let Some(age) = average_age {
            content.note(format!("Demographics: average patient age is {:.1} years", age));
        }
        if let Some(top) = top_condition {
            content.note(format!(
                "Most Common Condition: {} ({:.1}% of patients)",
                top.value, top.percentage
            ));
        }
        if let Some(billing) = ctx
            .profile(view.key(), &roles.billing_amount)
            .and_then(|p| p.numeric)
        {
            let amounts: Vec<f64> = view
                .numbers(&roles.billing_amount)?
                .into_iter()
                .flatten()
                .collect();
            if let Some(threshold) = quantile(&amounts, HIGH_COST_QUANTILE) {
                let high = amounts.iter().filter(|a| **a > threshold).count();
                content.note(format!(
                    "Financial: average billing is {}, with {:.1}% of cases being high-cost",
                    format_money(billing.mean),
                    high as f64 / view.height() as f64 * 100.0
                ));
            }
        }
        if let Some(rate) = abnormal_rate {
            content.note(format!(
                "Test Results: {:.1}% of patients have {} test results",
                rate,
                roles.positive_label.to_lowercase()
            ));
        }
        for (idx, recommendation) in RECOMMENDATIONS.iter().enumerate() {
            content.note(format!("Recommendation {}: {}", idx + 1, recommendation));
        }

        let mut summary = Table::new("Report Summary", &["Metric", "Value"]);
        let rate_label = format!("{} Test Rate", roles.positive_label);
        let not_available = || NOT_AVAILABLE.to_string();
        for (label, value) in [
            ("Total Patients", format_count(view.height())),
            ("Features Analyzed", view.width().to_string()),
            (
                "Time Period",
                time_period(profiles, roles).unwrap_or_else(not_available),
            ),
            (
                "Most Common Condition",
                top_condition.map(|t| t.value.clone()).unwrap_or_else(not_available),
            ),
            (
                "Average Age",
                average_age
                    .map(|a| format!("{:.1} years", a))
                    .unwrap_or_else(not_available),
            ),
            (
                rate_label.as_str(),
                abnormal_rate
                    .map(|r| format!("{:.1}%", r))
                    .unwrap_or_else(not_available),
            ),
        ] {
            summary.row(vec![label.to_string(), value]);
        }
        content.tables.push(summary);

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::session::SessionState;
    use crate::types::DatasetKey;
    use pretty_assertions::assert_eq;

    const CSV: &[u8] = b"age,medical_condition,billing_amount,test_results,date_of_admission\n\
        20,Asthma,1000,Normal,2023-04-01\n\
        40,Asthma,3000,Abnormal,2022-01-15\n\
        60,Diabetes,2000,Abnormal,2024-06-30\n\
        80,Cancer,NA,NA,2023-09-09\n";

    fn render(csv: &[u8]) -> PageContent {
        let session = SessionState::new();
        session.upload(csv, "t.csv", &IngestConfig::default()).unwrap();
        let ctx = PageContext::from_session(&session, &ColumnRoles::default()).unwrap();
        AnalyticsPage.render(&ctx).unwrap()
    }

    fn table<'a>(content: &'a PageContent, title: &str) -> &'a Table {
        content.tables.iter().find(|t| t.title == title).unwrap()
    }

    #[test]
    fn test_risk_rates_count_missing_targets_as_negative() {
        let groups = vec![Some("a".to_string()), Some("a".to_string()), None];
        let targets = vec![Some("Abnormal".to_string()), None, Some("Abnormal".to_string())];
        let rates = risk_rates(&groups, &targets, "Abnormal");
        assert_eq!(
            rates,
            vec![RiskRate {
                group: "a".to_string(),
                patients: 2,
                rate_pct: 50.0
            }]
        );
    }

    #[test]
    fn test_summaries_and_risk_tables() {
        let content = render(CSV);

        let numeric = table(&content, "Numerical Summary");
        assert_eq!(numeric.rows[0][0], "age");
        assert_eq!(numeric.rows[0][1], "4");
        assert_eq!(numeric.rows[0][2], "50.00");
        assert_eq!(numeric.rows[0][6], "50.00");
        assert_eq!(numeric.rows[1][1], "3");

        let categorical = table(&content, "Categorical Summary");
        assert_eq!(
            categorical.rows[0],
            vec!["medical_condition", "3", "Asthma", "2"]
        );

        let risk = table(&content, "Risk by Medical Condition");
        let order: Vec<&str> = risk.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(order, vec!["Diabetes", "Asthma", "Cancer"]);
        assert_eq!(risk.rows[1][2], "50.0%");

        let by_age = &content.charts[1];
        assert_eq!(by_age.series[0].points.len(), 4);
        assert_eq!(by_age.series[0].points[0].label, "18-34");

        let summary = table(&content, "Report Summary");
        assert_eq!(summary.rows[2][1], "2022-01-15 to 2024-06-30");
        assert_eq!(summary.rows[5][1], "50.0%");
    }

    #[test]
    fn test_summary_reads_profiles() {
        let session = SessionState::new();
        session.upload(CSV, "t.csv", &IngestConfig::default()).unwrap();
        let ctx = PageContext::from_session(&session, &ColumnRoles::default()).unwrap();

        let mut profiles = ctx.profiles(DatasetKey::Raw).to_vec();
        let age = profiles.iter_mut().find(|p| p.name == "age").unwrap();
        if let Some(numeric) = age.numeric.as_mut() {
            numeric.mean = 61.0;
        }
        let content = AnalyticsPage
            .render(&ctx.with_profiles(DatasetKey::Raw, profiles))
            .unwrap();
        assert_eq!(table(&content, "Report Summary").rows[4][1], "61.0 years");
    }

    #[test]
    fn test_missing_columns_fall_back() {
        let content = render(b"x,label\n1,a\n2,b\n");
        let summary = table(&content, "Report Summary");
        assert_eq!(summary.rows[2][1], NOT_AVAILABLE);
        assert_eq!(summary.rows[3][1], NOT_AVAILABLE);
        assert!(content.charts.is_empty());
        assert!(content.notes[0].contains("column 'test_results' not found"));
        assert_eq!(
            content.notes.iter().filter(|n| n.starts_with("Recommendation")).count(),
            RECOMMENDATIONS.len()
        );
    }
}
