//! Pearson correlations between numeric columns.

use super::{
    ChartKind, ChartSeries, ChartSpec, DataRequirement, Page, PageContent, PageContext, Table,
};
use crate::error::Result;
use crate::profiler::statistics::pearson;
use crate::types::SemanticType;

/// Rows shown in the strongest-pairs table.
const TOP_PAIRS: usize = 10;

pub struct CorrelationsPage;

impl Page for CorrelationsPage {
    fn id(&self) -> &'static str {
        "correlations"
    }

    fn title(&self) -> &'static str {
        "Correlation Analysis"
    }

    fn requirement(&self) -> DataRequirement {
        DataRequirement::CleanedOrRaw
    }

    fn render(&self, ctx: &PageContext) -> Result<PageContent> {
        let view = ctx.data(self.id(), self.requirement())?;
        let mut content = PageContent::default();

        let columns = view.columns_of(SemanticType::Numeric);
        if columns.len() < 2 {
            content.note("Correlation analysis needs at least two numeric columns");
            return Ok(content);
        }
        let values = columns
            .iter()
            .map(|c| view.numbers(c))
            .collect::<Result<Vec<_>>>()?;

        let n = columns.len();
        let mut matrix = vec![vec![None; n]; n];
        let mut pairs = Vec::new();
        for i in 0..n {
            matrix[i][i] = Some(1.0);
            for j in (i + 1)..n {
                let r = pearson(&values[i], &values[j]);
                matrix[i][j] = r;
                matrix[j][i] = r;
                if let Some(r) = r {
                    pairs.push((columns[i], columns[j], r));
                }
            }
        }

        let mut heatmap = ChartSpec::new(ChartKind::Heatmap, "Feature Correlation Heatmap");
        for (row, name) in matrix.iter().zip(&columns) {
            let points = row
                .iter()
                .zip(&columns)
                .filter_map(|(r, other)| Some((other.to_string(), (*r)?)));
            heatmap = heatmap.with_series(ChartSeries::new(*name, points));
        }
        content.charts.push(heatmap);

        pairs.sort_by(|a, b| b.2.abs().total_cmp(&a.2.abs()));
        let mut table = Table::new(
            "Strongest Correlations",
            &["Feature 1", "Feature 2", "Correlation"],
        );
        for (a, b, r) in pairs.iter().take(TOP_PAIRS) {
            table.row(vec![a.to_string(), b.to_string(), format!("{:.3}", r)]);
        }
        content.tables.push(table);
        if pairs.is_empty() {
            content.note("No pair of numeric columns has enough varying values to correlate");
        }

        Ok(content)
    }
}
