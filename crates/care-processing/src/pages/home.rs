//! Upload overview: dataset metrics, schema, validation checks and workflow.

use super::{
    DataRequirement, Page, PageContent, PageContext, Table, format_count, headline_metrics,
};
use crate::error::Result;
use crate::reporting::QualitySnapshot;
use crate::types::SemanticType;
use crate::utils::{looks_like_date, parse_date_string};
use crate::view::DatasetView;

pub struct HomePage;

fn check_row(table: &mut Table, check: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "WARN" };
    table.row(vec![check.to_string(), status.to_string(), detail]);
}

fn validation_checks(view: &DatasetView<'_>, ctx: &PageContext) -> Result<Table> {
    let roles = ctx.roles();
    let mut table = Table::new("Validation Checks", &["Check", "Status", "Detail"]);

    let has_target = view.has_column(&roles.target);
    check_row(
        &mut table,
        "Target column",
        has_target,
        if has_target {
            format!("'{}' found", roles.target)
        } else {
            format!("'{}' not found", roles.target)
        },
    );

    let key_features = [&roles.age, &roles.gender, &roles.medical_condition];
    let missing: Vec<&str> = key_features
        .iter()
        .filter(|c| !view.has_column(c))
        .map(|c| c.as_str())
        .collect();
    check_row(
        &mut table,
        "Key features",
        missing.is_empty(),
        if missing.is_empty() {
            "all present".to_string()
        } else {
            format!("missing: {}", missing.join(", "))
        },
    );

    // A column of date-shaped labels holding an impossible date stays
    // categorical, so it is checked here too.
    let mut date_columns = Vec::new();
    let mut invalid = Vec::new();
    for column in view.schema() {
        let labels = view.labels(&column.name)?;
        let observed: Vec<&str> = labels.iter().flatten().map(String::as_str).collect();
        let candidate = match column.semantic_type {
            SemanticType::Datetime => true,
            SemanticType::Categorical | SemanticType::Text => {
                !observed.is_empty() && observed.iter().all(|v| looks_like_date(v))
            }
            SemanticType::Numeric => false,
        };
        if !candidate {
            continue;
        }
        let failed = observed
            .iter()
            .filter(|v| parse_date_string(v).is_none())
            .count();
        if failed > 0 {
            invalid.push(format!("{} ({} invalid)", column.name, failed));
        }
        date_columns.push(column.name.clone());
    }
    check_row(
        &mut table,
        "Date columns",
        !date_columns.is_empty() && invalid.is_empty(),
        match (date_columns.is_empty(), invalid.is_empty()) {
            (true, _) => "no date columns detected".to_string(),
            (false, true) => format!("{} valid", date_columns.join(", ")),
            (false, false) => invalid.join(", "),
        },
    );

    Ok(table)
}

impl Page for HomePage {
    fn id(&self) -> &'static str {
        "home"
    }

    fn title(&self) -> &'static str {
        "Data Upload & Overview"
    }

    fn requirement(&self) -> DataRequirement {
        DataRequirement::Raw
    }

    fn render(&self, ctx: &PageContext) -> Result<PageContent> {
        let view = ctx.data(self.id(), self.requirement())?;
        let profiles = ctx.profiles(view.key());
        let snapshot = QualitySnapshot::from_profiles(&view, profiles)?;

        let mut content = PageContent {
            metrics: headline_metrics(&view, ctx.roles())?,
            ..PageContent::default()
        };
        content.metric("Features", snapshot.features.to_string());
        content.metric("Missing Values", format_count(snapshot.missing_cells));
        content.metric("Duplicate Rows", format_count(snapshot.duplicate_rows));

        let mut quality = Table::new("Data Quality", &["Metric", "Value"]);
        for (label, value) in [
            ("Completeness", format!("{:.1}%", snapshot.completeness_pct)),
            ("Uniqueness", format!("{:.1}%", snapshot.uniqueness_pct)),
            ("Numeric columns", snapshot.numeric_columns.to_string()),
            ("Categorical columns", snapshot.categorical_columns.to_string()),
            ("Date columns", snapshot.datetime_columns.to_string()),
            ("Text columns", snapshot.text_columns.to_string()),
        ] {
            quality.row(vec![label.to_string(), value]);
        }
        content.tables.push(quality);

        let mut schema = Table::new(
            "Schema",
            &["Column", "Type", "Missing", "Missing %", "Unique"],
        );
        for profile in profiles {
            schema.row(vec![
                profile.name.clone(),
                profile.semantic_type.display_name().to_string(),
                profile.missing_count.to_string(),
                format!("{:.1}", profile.missing_percentage),
                profile.distinct_count.to_string(),
            ]);
        }
        content.tables.push(schema);
        content.tables.push(validation_checks(&view, ctx)?);

        let workflow = ctx.workflow();
        let mut steps = Table::new("Workflow Progress", &["Step", "Status"]);
        for step in &workflow.steps {
            let status = if step.complete { "done" } else { "pending" };
            steps.row(vec![step.name.to_string(), status.to_string()]);
        }
        content.tables.push(steps);
        match workflow.next_step() {
            Some(next) => content.note(format!(
                "{}/{} steps completed. Next step: {}",
                workflow.completed(),
                workflow.steps.len(),
                next
            )),
            None => content.note("All workflow steps completed"),
        }

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnRoles, IngestConfig};
    use crate::session::SessionState;
    use crate::types::DatasetKey;

    const CSV: &[u8] = b"age,gender,medical_condition,date_of_admission,test_results\n\
        30,Male,Asthma,2024-01-02,Normal\n\
        30,Male,Asthma,2024-01-02,Normal\n\
        45,Female,NA,2024-02-30,Abnormal\n";

    #[test]
    fn test_overview_metrics_and_checks() {
        let session = SessionState::new();
        session.upload(CSV, "t.csv", &IngestConfig::default()).unwrap();
        let ctx = PageContext::from_session(&session, &ColumnRoles::default()).unwrap();
        let content = HomePage.render(&ctx).unwrap();

        let metric = |label: &str| {
            content
                .metrics
                .iter()
                .find(|m| m.label == label)
                .map(|m| m.value.clone())
        };
        assert_eq!(metric("Total Patients").as_deref(), Some("3"));
        assert_eq!(metric("Features").as_deref(), Some("5"));
        assert_eq!(metric("Duplicate Rows").as_deref(), Some("1"));

        let checks = content
            .tables
            .iter()
            .find(|t| t.title == "Validation Checks")
            .unwrap();
        assert_eq!(checks.rows[0][1], "PASS");
        assert_eq!(checks.rows[1][1], "PASS");
        assert_eq!(checks.rows[2][0], "Date columns");
        assert_eq!(checks.rows[2][1], "WARN");
        assert_eq!(checks.rows[2][2], "date_of_admission (1 invalid)");
        assert!(content.notes[0].starts_with("4/6 steps completed"));
    }

    #[test]
    fn test_valid_dates_pass() {
        let session = SessionState::new();
        session
            .upload(
                b"age,date_of_admission\n30,2024-01-02\n45,2024-02-28\n",
                "t.csv",
                &IngestConfig::default(),
            )
            .unwrap();
        let ctx = PageContext::from_session(&session, &ColumnRoles::default()).unwrap();
        let content = HomePage.render(&ctx).unwrap();
        let checks = content
            .tables
            .iter()
            .find(|t| t.title == "Validation Checks")
            .unwrap();
        assert_eq!(checks.rows[2][1], "PASS");
        assert_eq!(checks.rows[2][2], "date_of_admission valid");
    }

    #[test]
    fn test_schema_table_reads_profiles() {
        let session = SessionState::new();
        session.upload(CSV, "t.csv", &IngestConfig::default()).unwrap();
        let ctx = PageContext::from_session(&session, &ColumnRoles::default()).unwrap();

        let mut profiles = ctx.profiles(DatasetKey::Raw).to_vec();
        assert_eq!(profiles[1].name, "gender");
        assert_eq!(profiles[1].distinct_count, 2);
        profiles[1].missing_count = 99;
        profiles[1].distinct_count = 7;
        profiles[1].semantic_type = SemanticType::Text;
        let ctx = ctx.with_profiles(DatasetKey::Raw, profiles);

        let content = HomePage.render(&ctx).unwrap();
        let schema = content.tables.iter().find(|t| t.title == "Schema").unwrap();
        assert_eq!(
            schema.rows[1],
            vec!["gender", "Text", "99", "0.0", "7"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );

        let metric = |label: &str| {
            content
                .metrics
                .iter()
                .find(|m| m.label == label)
                .map(|m| m.value.clone())
        };
        // 1 missing condition in the data plus the injected 99
        assert_eq!(metric("Missing Values").as_deref(), Some("100"));
    }
}
