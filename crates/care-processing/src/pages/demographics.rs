//! Patient demographics: gender, blood type and age.

use std::collections::BTreeMap;

use super::{ChartKind, ChartSeries, ChartSpec, DataRequirement, Page, PageContent, PageContext};
use crate::error::Result;
use crate::profiler::statistics::{box_plot_summary, histogram};
use crate::utils::value_counts;

const AGE_BINS: usize = 20;

/// Bar or pie chart of label frequencies.
pub(crate) fn frequency_chart(
    kind: ChartKind,
    title: &str,
    name: &str,
    labels: &[Option<String>],
) -> ChartSpec {
    let counts = value_counts(labels.iter().flatten().map(String::as_str));
    ChartSpec::new(kind, title).with_series(ChartSeries::new(
        name,
        counts.into_iter().map(|(v, c)| (v, c as f64)),
    ))
}

/// Histogram chart with `"start-end"` bin labels.
pub(crate) fn histogram_chart(title: &str, name: &str, values: &[f64], bins: usize) -> ChartSpec {
    let points = histogram(values, bins)
        .into_iter()
        .map(|bin| (format!("{:.0}-{:.0}", bin.start, bin.end), bin.count as f64));
    ChartSpec::new(ChartKind::Histogram, title).with_series(ChartSeries::new(name, points))
}

pub struct DemographicsPage;

impl Page for DemographicsPage {
    fn id(&self) -> &'static str {
        "demographics"
    }

    fn title(&self) -> &'static str {
        "Patient Demographics"
    }

    fn requirement(&self) -> DataRequirement {
        DataRequirement::CleanedOrRaw
    }

    fn render(&self, ctx: &PageContext) -> Result<PageContent> {
        let view = ctx.data(self.id(), self.requirement())?;
        let roles = ctx.roles();
        let mut content = PageContent::default();

        let gender_title = "Patient Gender Distribution";
        let genders = if view.has_column(&roles.gender) {
            let genders = view.labels(&roles.gender)?;
            content.charts.push(frequency_chart(
                ChartKind::Pie,
                gender_title,
                &roles.gender,
                &genders,
            ));
            Some(genders)
        } else {
            content.omit_chart(gender_title, &roles.gender);
            None
        };

        let blood_title = "Blood Type Distribution";
        if view.has_column(&roles.blood_type) {
            let blood_types = view.labels(&roles.blood_type)?;
            content.charts.push(
                frequency_chart(ChartKind::Bar, blood_title, &roles.blood_type, &blood_types)
                    .axes("Blood Type", "Count"),
            );
        } else {
            content.omit_chart(blood_title, &roles.blood_type);
        }

        let age_title = "Patient Age Distribution";
        let box_title = "Age Distribution by Gender";
        if !view.has_column(&roles.age) {
            content.omit_chart(age_title, &roles.age);
            content.omit_chart(box_title, &roles.age);
            return Ok(content);
        }
        let ages = view.numbers(&roles.age)?;
        let observed: Vec<f64> = ages.iter().flatten().copied().collect();
        content.charts.push(
            histogram_chart(age_title, &roles.age, &observed, AGE_BINS)
                .axes("Age (years)", "Count"),
        );

        let Some(genders) = genders else {
            content.omit_chart(box_title, &roles.gender);
            return Ok(content);
        };
        let mut by_gender: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for (gender, age) in genders.iter().zip(&ages) {
            if let (Some(gender), Some(age)) = (gender, age) {
                by_gender.entry(gender.as_str()).or_default().push(*age);
            }
        }
        let mut chart = ChartSpec::new(ChartKind::BoxPlot, box_title).axes("Gender", "Age");
        for (gender, values) in by_gender {
            if let Some(summary) = box_plot_summary(&values) {
                chart = chart.with_series(ChartSeries::new(
                    gender,
                    [
                        ("min".to_string(), summary.min),
                        ("q1".to_string(), summary.q1),
                        ("median".to_string(), summary.median),
                        ("q3".to_string(), summary.q3),
                        ("max".to_string(), summary.max),
                    ],
                ));
            }
        }
        content.charts.push(chart);

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnRoles, IngestConfig};
    use crate::session::SessionState;

    fn render(csv: &[u8]) -> PageContent {
        let session = SessionState::new();
        session.upload(csv, "t.csv", &IngestConfig::default()).unwrap();
        let ctx = PageContext::from_session(&session, &ColumnRoles::default()).unwrap();
        DemographicsPage.render(&ctx).unwrap()
    }

    #[test]
    fn test_all_charts_present() {
        let content = render(
            b"age,gender,blood_type\n30,Male,A+\n40,Female,O-\n50,Female,A+\n60,Male,B+\n",
        );
        let titles: Vec<&str> = content.charts.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Patient Gender Distribution",
                "Blood Type Distribution",
                "Patient Age Distribution",
                "Age Distribution by Gender",
            ]
        );
        assert_eq!(content.charts[2].series[0].points.len(), AGE_BINS);
        assert_eq!(content.charts[3].series.len(), 2);
        assert!(content.notes.is_empty());
    }

    #[test]
    fn test_absent_columns_are_noted() {
        let content = render(b"age\n30\n40\n");
        assert_eq!(content.charts.len(), 1);
        assert!(content.notes.iter().any(|n| n.contains("'gender' not found")));
        assert!(content.notes.iter().any(|n| n.contains("'blood_type' not found")));
    }
}
