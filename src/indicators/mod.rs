//! Indicator Sets Module
//! The five research themes and the survey fields each one concerns.

use crate::error::AnalysisError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub id: u8,
    pub title: &'static str,
    pub question: &'static str,
    /// Outcome fields, analysed as the dependent variable.
    pub outcomes: &'static [&'static str],
    /// Grouping fields the outcomes are cross-tabulated against.
    pub independents: &'static [&'static str],
}

impl IndicatorSet {
    /// Outcomes followed by independents.
    pub fn fields(&self) -> Vec<&'static str> {
        self.outcomes
            .iter()
            .chain(self.independents.iter())
            .copied()
            .collect()
    }
}

const SET_1: IndicatorSet = IndicatorSet {
    id: 1,
    title: "HIV Service Disruptions and Most Affected Populations",
    question: "What types of HIV services have been disrupted in the past 6 months, and which populations have been most affected by these disruptions?",
    outcomes: &[
        "Q9_Gender-Affirming_Care",
        "Q9_HIV_Testing",
        "Q9_HIV_Treatment",
        "Q9_Housing-related_Support_Services",
        "Q9_Linkage_to_HIV_Care",
        "Q9_Mental_Health_Care",
        "Q9_Navigation_or_Case_Management",
        "Q9_PrEP_or_PEP_Access",
        "Q9_Rapid_START_or_Same-Day_ART_Initiation",
        "Q9_Routine_HIV_Clinical_Monitoring_and_Care",
        "Q9_Substance_Use_Disorder_Services",
        "Q9_Transportation_Support",
        "Q10_Pop_Black_African_American",
        "Q10_Pop_Latinx_Hispanic",
        "Q10_Pop_Transgender",
        "Q10_Pop_Homeless_Unstable_Housing",
        "Q10_Pop_Immigrants_Undocumented",
    ],
    independents: &[
        "Q2_Professional_Role",
        "Q3_Setting_Ryan_White",
        "Q3_Setting_Community_Health_Center",
        "Q3_Setting_Hospital_Based_Clinic",
        "Q4_Funding_Federal_Govt",
        "Q4_Funding_Medicaid",
    ],
};

const SET_2: IndicatorSet = IndicatorSet {
    id: 2,
    title: "Ancillary Services Access (Mental Health, Substance Use, Housing)",
    question: "How accessible are ancillary services (mental health, substance use treatment, housing support) for people with HIV, and what barriers exist for key populations?",
    outcomes: &[
        "Q21_Mental_Health_Access",
        "Q22_Substance_Use_Access",
        "Q23_Housing_Instability",
        "Q27_Trans_Barrier_HIV_Testing",
        "Q27_Trans_Barrier_PrEP_PEP_Access",
        "Q27_Trans_Barrier_Gender_Affirming_Care",
        "Q27_Trans_Barrier_Mental_Health",
        "Q27_Trans_Barrier_Housing_Services",
        "Q28_Undocumented_Decline",
    ],
    independents: &[
        "Q2_Professional_Role",
        "Q3_Setting_Community_Health_Center",
        "Q3_Setting_Hospital_Based_Clinic",
        "Q5_Years_HIV_Practice",
    ],
};

const SET_3: IndicatorSet = IndicatorSet {
    id: 3,
    title: "Key Populations and HIV System Strain",
    question: "What specific barriers do key populations face in accessing HIV services, and is there evidence of increased loss to follow-up among vulnerable groups?",
    outcomes: &[
        "Q27_Trans_Barrier_HIV_Testing",
        "Q27_Trans_Barrier_PrEP_PEP_Access",
        "Q27_Trans_Barrier_Gender_Affirming_Care",
        "Q23_Housing_Instability",
        "Q30_LTFU_Increase_Transgender",
        "Q30_LTFU_Increase_Migrants",
        "Q30_LTFU_Increase_Homeless",
    ],
    independents: &[
        "Q2_Professional_Role",
        "Q6_Serve_Transgender",
        "Q6_Serve_Immigrants_Undocumented",
        "Q4_Funding_Medicaid",
    ],
};

const SET_4: IndicatorSet = IndicatorSet {
    id: 4,
    title: "Anticipated HIV Service Disruptions and Concern Levels",
    question: "What level of HIV service disruptions do providers anticipate in the next 6-18 months, and how concerned are they about potential cuts to Medicaid and federal HIV programs?",
    outcomes: &[
        "Q11_Anticipate_6_12_months",
        "Q12_Anticipate_12_18_months",
        "Q13_Concern_Medicaid_Cuts",
        "Q15_Concern_AETC_Cuts",
    ],
    independents: &[
        "Q2_Professional_Role",
        "Q3_Setting_Ryan_White",
        "Q3_Setting_Community_Health_Center",
        "Q4_Funding_Medicaid",
        "Q6_Serve_Transgender",
    ],
};

const SET_5: IndicatorSet = IndicatorSet {
    id: 5,
    title: "Reliance on and Trust in Federal HIV Guidance",
    question: "How frequently do HIV providers use federal guidelines, and have they observed changes in access to or quality of federal HIV guidance and resources?",
    outcomes: &[
        "Q18_Federal_Guidelines_Use",
        "Q19_Guidelines_Access_Delays",
        "Q19_Guidelines_Access_Less_Clear",
        "Q15_Concern_AETC_Cuts",
    ],
    independents: &[
        "Q2_Professional_Role",
        "Q3_Setting_Ryan_White",
        "Q5_Years_HIV_Practice",
        "Q13_Concern_Medicaid_Cuts",
    ],
};

static INDICATOR_SETS: [IndicatorSet; 5] = [SET_1, SET_2, SET_3, SET_4, SET_5];

/// All five indicator sets, ordered by id.
pub fn all() -> &'static [IndicatorSet] {
    &INDICATOR_SETS
}

pub fn indicator_set(id: u8) -> Result<&'static IndicatorSet, AnalysisError> {
    INDICATOR_SETS
        .iter()
        .find(|set| set.id == id)
        .ok_or(AnalysisError::UnknownIndicatorSet(id))
}

/// Ordered field names of indicator set `id` (1-5).
pub fn fields_for(id: u8) -> Result<Vec<&'static str>, AnalysisError> {
    indicator_set(id).map(IndicatorSet::fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::sample_frame;

    #[test]
    fn ids_outside_range_are_unknown() {
        assert!(matches!(fields_for(0), Err(AnalysisError::UnknownIndicatorSet(0))));
        assert!(matches!(fields_for(6), Err(AnalysisError::UnknownIndicatorSet(6))));
    }

    #[test]
    fn fields_list_outcomes_before_independents() {
        let fields = fields_for(4).unwrap();
        assert_eq!(fields.first(), Some(&"Q11_Anticipate_6_12_months"));
        assert_eq!(fields.last(), Some(&"Q6_Serve_Transgender"));
        assert_eq!(fields.len(), 9);
    }

    #[test]
    fn every_field_exists_in_sample() {
        let df = sample_frame().unwrap();
        for set in all() {
            for field in set.fields() {
                assert!(df.column(field).is_ok(), "set {} field {}", set.id, field);
            }
        }
    }
}
