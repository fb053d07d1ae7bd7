//! Static pages: problem statement, stakeholders and KPI targets.

use super::{DataRequirement, Page, PageContent, PageContext, Table};
use crate::error::Result;

fn table_from(title: &str, columns: &[&str], rows: &[&[&str]]) -> Table {
    let mut table = Table::new(title, columns);
    for row in rows {
        table.row(row.iter().map(|cell| cell.to_string()).collect());
    }
    table
}

pub struct ProblemPage;

impl Page for ProblemPage {
    fn id(&self) -> &'static str {
        "problem"
    }

    fn title(&self) -> &'static str {
        "Problem Understanding"
    }

    fn requirement(&self) -> DataRequirement {
        DataRequirement::None
    }

    fn render(&self, _ctx: &PageContext) -> Result<PageContent> {
        let mut content = PageContent::default();
        content.note(
            "Hospital readmissions among patients with chronic illness are costly. \
             Identifying high-risk patients early lets providers intervene.",
        );
        content.tables.push(table_from(
            "Objectives",
            &["#", "Objective"],
            &[
                &["1", "Explore key risk factors and trends that affect readmission"],
                &["2", "Provide actionable recommendations for reducing readmissions"],
                &["3", "Classify test results to identify high-risk patients"],
            ],
        ));
        content.tables.push(table_from(
            "Challenges and Benefits",
            &["Challenge", "Expected Benefit"],
            &[
                &["30-day readmission rates reach 15-20% for some conditions", "Lower costs"],
                &["Penalties for excessive readmissions", "Better patient outcomes"],
                &["Emergency readmissions strain resources", "Resource optimization"],
                &["Readmission rates are key quality indicators", "Quality improvement"],
            ],
        ));
        Ok(content)
    }
}

pub struct StakeholdersPage;

impl Page for StakeholdersPage {
    fn id(&self) -> &'static str {
        "stakeholders"
    }

    fn title(&self) -> &'static str {
        "Stakeholder Analysis"
    }

    fn requirement(&self) -> DataRequirement {
        DataRequirement::None
    }

    fn render(&self, _ctx: &PageContext) -> Result<PageContent> {
        let mut content = PageContent::default();
        content.tables.push(table_from(
            "Primary Stakeholders",
            &["Stakeholder", "Primary Interest", "Impact", "Influence"],
            &[
                &["Hospital Administrators", "Cost reduction & efficiency", "High", "High"],
                &["Physicians & Nurses", "Patient care & clinical outcomes", "High", "Medium"],
                &["Patients & Families", "Quality care & safety", "High", "Medium"],
                &["Insurance Companies", "Cost containment & risk assessment", "High", "High"],
            ],
        ));
        Ok(content)
    }
}

pub struct KpiPage;

impl Page for KpiPage {
    fn id(&self) -> &'static str {
        "kpis"
    }

    fn title(&self) -> &'static str {
        "KPI Definition"
    }

    fn requirement(&self) -> DataRequirement {
        DataRequirement::None
    }

    fn render(&self, _ctx: &PageContext) -> Result<PageContent> {
        let mut content = PageContent::default();
        content.tables.push(table_from(
            "Clinical KPIs",
            &["KPI", "Definition", "Target", "Baseline"],
            &[
                &[
                    "30-Day Readmission Rate",
                    "Share of patients readmitted within 30 days",
                    "<10%",
                    "15%",
                ],
                &[
                    "Patient Mortality Rate",
                    "Share of patients who die during or after treatment",
                    "<2%",
                    "3%",
                ],
                &[
                    "Length of Stay (LOS)",
                    "Average number of days in hospital",
                    "5-7 days",
                    "8 days",
                ],
                &[
                    "Test Result Accuracy",
                    "Share of correctly classified test results",
                    ">90%",
                    "Unknown",
                ],
                &[
                    "Treatment Success Rate",
                    "Share of patients with improved outcomes",
                    ">85%",
                    "Unknown",
                ],
            ],
        ));
        content.tables.push(table_from(
            "Financial KPIs",
            &["KPI", "Definition", "Target", "Impact"],
            &[
                &["Cost per Readmission", "Average cost per readmitted patient", "<$15,000", "High"],
                &["Average Billing Amount", "Mean billing per admission", "$20,000-$30,000", "Medium"],
                &["Insurance Claim Approval Rate", "Share of claims approved", ">95%", "High"],
            ],
        ));
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnRoles;
    use crate::session::SessionState;

    #[test]
    fn test_kpi_targets() {
        let ctx = PageContext::from_session(&SessionState::new(), &ColumnRoles::default()).unwrap();
        let content = KpiPage.render(&ctx).unwrap();
        let clinical = &content.tables[0];
        assert_eq!(clinical.rows.len(), 5);
        assert_eq!(clinical.rows[0][0], "30-Day Readmission Rate");
        assert_eq!(clinical.rows[0][2], "<10%");
        assert_eq!(clinical.rows[0][3], "15%");
    }

    #[test]
    fn test_stakeholders_listed() {
        let ctx = PageContext::from_session(&SessionState::new(), &ColumnRoles::default()).unwrap();
        let content = StakeholdersPage.render(&ctx).unwrap();
        let names: Vec<&str> = content.tables[0].rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Hospital Administrators",
                "Physicians & Nurses",
                "Patients & Families",
                "Insurance Companies"
            ]
        );
    }
}
