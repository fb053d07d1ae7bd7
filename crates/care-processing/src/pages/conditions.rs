//! Medical condition frequencies, split by age band and by gender.

use super::demographics::frequency_chart;
use super::{
    AGE_BANDS, ChartKind, ChartSeries, ChartSpec, DataRequirement, Page, PageContent, PageContext,
    age_band_labels, crosstab,
};
use crate::error::Result;

/// One series per column value, one point per row key.
fn crosstab_chart(
    kind: ChartKind,
    title: &str,
    rows: &[Option<String>],
    columns: &[Option<String>],
    series_order: &[String],
) -> ChartSpec {
    let table = crosstab(rows, columns);
    let mut chart = ChartSpec::new(kind, title).axes("Medical Condition", "Count");
    for name in series_order {
        let points = table.iter().map(|(row, counts)| {
            let count = counts.get(name).copied().unwrap_or(0);
            (row.clone(), count as f64)
        });
        chart = chart.with_series(ChartSeries::new(name.clone(), points));
    }
    chart
}

pub struct ConditionsPage;

impl Page for ConditionsPage {
    fn id(&self) -> &'static str {
        "conditions"
    }

    fn title(&self) -> &'static str {
        "Medical Conditions"
    }

    fn requirement(&self) -> DataRequirement {
        DataRequirement::CleanedOrRaw
    }

    fn render(&self, ctx: &PageContext) -> Result<PageContent> {
        let view = ctx.data(self.id(), self.requirement())?;
        let roles = ctx.roles();
        let mut content = PageContent::default();

        let frequency_title = "Medical Conditions Distribution";
        let by_age_title = "Medical Conditions by Age Group";
        let by_gender_title = "Medical Conditions by Gender";
        if !view.has_column(&roles.medical_condition) {
            for title in [frequency_title, by_age_title, by_gender_title] {
                content.omit_chart(title, &roles.medical_condition);
            }
            return Ok(content);
        }

        let conditions = view.labels(&roles.medical_condition)?;
        content.charts.push(
            frequency_chart(
                ChartKind::HorizontalBar,
                frequency_title,
                &roles.medical_condition,
                &conditions,
            )
            .axes("Number of Patients", "Medical Condition"),
        );

        if view.has_column(&roles.age) {
            let bands = age_band_labels(&view.numbers(&roles.age)?);
            let order: Vec<String> = AGE_BANDS.iter().map(|b| b.to_string()).collect();
            content.charts.push(crosstab_chart(
                ChartKind::StackedBar,
                by_age_title,
                &conditions,
                &bands,
                &order,
            ));
        } else {
            content.omit_chart(by_age_title, &roles.age);
        }

        if view.has_column(&roles.gender) {
            let genders = view.labels(&roles.gender)?;
            let mut order: Vec<String> = genders.iter().flatten().cloned().collect();
            order.sort();
            order.dedup();
            content.charts.push(crosstab_chart(
                ChartKind::GroupedBar,
                by_gender_title,
                &conditions,
                &genders,
                &order,
            ));
        } else {
            content.omit_chart(by_gender_title, &roles.gender);
        }

        Ok(content)
    }
}
