//! Admission patterns over time.

use chrono::Datelike;
use std::collections::BTreeMap;

use super::{ChartKind, ChartSeries, ChartSpec, DataRequirement, Page, PageContent, PageContext};
use crate::error::Result;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub struct TemporalPage;

impl Page for TemporalPage {
    fn id(&self) -> &'static str {
        "temporal"
    }

    fn title(&self) -> &'static str {
        "Temporal Patterns"
    }

    fn requirement(&self) -> DataRequirement {
        DataRequirement::CleanedOrRaw
    }

    fn render(&self, ctx: &PageContext) -> Result<PageContent> {
        let view = ctx.data(self.id(), self.requirement())?;
        let column = &ctx.roles().admission_date;
        let mut content = PageContent::default();

        let month_title = "Monthly Admission Patterns";
        if !view.has_column(column) {
            content.omit_chart(month_title, column);
            return Ok(content);
        }
        let dates: Vec<_> = view.dates(column)?.into_iter().flatten().collect();
        if dates.is_empty() {
            content.note(format!("Column '{}' holds no valid dates", column));
            return Ok(content);
        }

        let mut months = [0usize; 12];
        let mut weekdays = [0usize; 7];
        let mut years: BTreeMap<i32, usize> = BTreeMap::new();
        for date in &dates {
            months[date.month0() as usize] += 1;
            weekdays[date.weekday().num_days_from_monday() as usize] += 1;
            *years.entry(date.year()).or_insert(0) += 1;
        }

        let labelled = |labels: &[&str], counts: &[usize]| -> Vec<(String, f64)> {
            labels
                .iter()
                .zip(counts)
                .map(|(l, c)| (l.to_string(), *c as f64))
                .collect()
        };
        content.charts.push(
            ChartSpec::new(ChartKind::Line, month_title)
                .axes("Month", "Number of Admissions")
                .with_series(ChartSeries::new("admissions", labelled(&MONTHS, &months))),
        );
        content.charts.push(
            ChartSpec::new(ChartKind::Bar, "Admissions by Day of Week")
                .axes("Day of Week", "Number of Admissions")
                .with_series(ChartSeries::new("admissions", labelled(&WEEKDAYS, &weekdays))),
        );

        if years.len() > 1 {
            content.charts.push(
                ChartSpec::new(ChartKind::Line, "Yearly Admission Trends")
                    .axes("Year", "Number of Admissions")
                    .with_series(ChartSeries::new(
                        "admissions",
                        years.into_iter().map(|(y, c)| (y.to_string(), c as f64)),
                    )),
            );
        } else {
            content.note("Yearly trend omitted: all admissions fall in one year");
        }

        Ok(content)
    }
}
