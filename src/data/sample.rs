//! Sample Survey Module
//! Seeded HIV service disruption survey used when no file is uploaded.
//!
//! 526 complete responses follow the published role counts and per-role
//! disruption rates; 118 partial responses exercise the completion filter.

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

pub const SAMPLE_SEED: u64 = 42;

/// Fingerprint input for the sample dataset's version.
pub const SAMPLE_TAG: &[u8] = b"survey-insight/sample/v1/seed-42";

pub const INCOMPLETE_RESPONSES: usize = 118;

const ROLES: [(&str, usize); 10] = [
    ("Case Manager", 31),
    ("Clinical Social Worker", 22),
    ("Mental Health Provider", 19),
    ("Nurse Practitioner (NP)", 99),
    ("Other (Please Specify)", 76),
    ("Peer Navigator/Linkage Coordinator", 10),
    ("Pharmacist", 40),
    ("Physician (MD/DO)", 160),
    ("Physician Assistant/Associate (PA)", 15),
    ("Registered Nurse (RN)", 54),
];

const SERVICES: [&str; 13] = [
    "Gender-Affirming Care",
    "HIV Testing",
    "HIV Treatment",
    "Housing-related Support Services",
    "Linkage to HIV Care",
    "Mental Health Care",
    "Navigation or Case Management",
    "Other (please specify)",
    "PrEP or PEP Access",
    "Rapid START or Same-Day ART Initiation",
    "Routine HIV Clinical Monitoring and Care",
    "Substance Use Disorder Services",
    "Transportation Support",
];

/// Respondents per role reporting each service disrupted (same order as `SERVICES`).
const DISRUPTIONS: [[u32; 13]; 10] = [
    [4, 4, 3, 11, 6, 5, 7, 2, 4, 5, 4, 1, 7],
    [9, 7, 3, 7, 3, 7, 4, 3, 5, 1, 0, 4, 7],
    [6, 2, 2, 4, 4, 4, 2, 1, 5, 1, 2, 1, 3],
    [38, 12, 15, 22, 18, 19, 18, 6, 28, 8, 12, 9, 16],
    [19, 19, 12, 19, 11, 16, 10, 10, 21, 4, 6, 8, 17],
    [2, 4, 3, 5, 5, 3, 4, 1, 5, 4, 4, 0, 3],
    [15, 3, 11, 9, 7, 6, 8, 5, 17, 7, 5, 4, 6],
    [61, 24, 28, 42, 30, 45, 41, 14, 37, 13, 20, 20, 25],
    [4, 1, 2, 3, 2, 3, 4, 2, 2, 2, 1, 1, 3],
    [15, 10, 3, 16, 11, 14, 17, 5, 8, 4, 5, 5, 10],
];

const YEARS: [(&str, f64); 6] = [
    ("0-2 years", 0.15),
    ("3-5 years", 0.20),
    ("6-10 years", 0.25),
    ("11-15 years", 0.20),
    ("16-20 years", 0.12),
    ("20+ years", 0.08),
];

/// Yes/no practice characteristics and the probability of "yes".
const PRACTICE_FLAGS: [(&str, f64); 28] = [
    ("Q3_Setting_Academic_Medical_Center", 0.19),
    ("Q3_Setting_Community_Health_Center", 0.22),
    ("Q3_Setting_Hospital_Based_Clinic", 0.10),
    ("Q3_Setting_Private_Practice", 0.08),
    ("Q3_Setting_Ryan_White", 0.35),
    ("Q3_Setting_Family_Planning_Clinic", 0.01),
    ("Q3_Setting_Other", 0.30),
    ("Q4_Funding_Federal_Govt", 0.55),
    ("Q4_Funding_State_Govt", 0.40),
    ("Q4_Funding_Local_Govt", 0.20),
    ("Q4_Funding_Medicaid", 0.75),
    ("Q4_Funding_Medicare", 0.60),
    ("Q4_Funding_Private_Insurance", 0.65),
    ("Q4_Funding_Self_Pay", 0.30),
    ("Q4_Funding_Other", 0.15),
    ("Q6_Serve_Black_African_American", 0.80),
    ("Q6_Serve_Latinx_Hispanic", 0.65),
    ("Q6_Serve_White", 0.75),
    ("Q6_Serve_Asian_Pacific_Islander", 0.30),
    ("Q6_Serve_American_Indian_Alaska_Native", 0.15),
    ("Q6_Serve_Transgender", 0.40),
    ("Q6_Serve_Men_Who_Have_Sex_Men", 0.70),
    ("Q6_Serve_People_Who_Inject_Drugs", 0.50),
    ("Q6_Serve_Sex_Workers", 0.25),
    ("Q6_Serve_Homeless_Housing_Unstable", 0.60),
    ("Q6_Serve_Immigrants_Undocumented", 0.45),
    ("Q6_Serve_Youth_Young_Adults", 0.55),
    ("Q6_Serve_Older_Adults", 0.70),
];

const AFFECTED_POPULATIONS: [(&str, f64); 7] = [
    ("Q10_Pop_Black_African_American", 0.40),
    ("Q10_Pop_Latinx_Hispanic", 0.35),
    ("Q10_Pop_Transgender", 0.30),
    ("Q10_Pop_Homeless_Unstable_Housing", 0.45),
    ("Q10_Pop_Immigrants_Undocumented", 0.25),
    ("Q10_Pop_Youth_Young_Adults", 0.20),
    ("Q10_Pop_Older_Adults", 0.15),
];

const BARRIER_FLAGS: [(&str, f64); 17] = [
    ("Q19_Guidelines_Access_No_Change", 0.40),
    ("Q19_Guidelines_Access_Delays", 0.25),
    ("Q19_Guidelines_Access_Less_Clear", 0.30),
    ("Q19_Guidelines_Access_Improved", 0.10),
    ("Q27_Trans_Barrier_HIV_Testing", 0.30),
    ("Q27_Trans_Barrier_PrEP_PEP_Access", 0.35),
    ("Q27_Trans_Barrier_Gender_Affirming_Care", 0.45),
    ("Q27_Trans_Barrier_Mental_Health", 0.40),
    ("Q27_Trans_Barrier_Housing_Services", 0.30),
    ("Q29_Homeless_Barrier_Missed_Appointments", 0.55),
    ("Q29_Homeless_Barrier_Transportation", 0.65),
    ("Q29_Homeless_Barrier_Documentation", 0.40),
    ("Q29_Homeless_Barrier_Mental_Health", 0.50),
    ("Q30_LTFU_Increase_Transgender", 0.25),
    ("Q30_LTFU_Increase_Migrants", 0.30),
    ("Q30_LTFU_Increase_Homeless", 0.35),
    ("Q30_LTFU_Increase_Youth", 0.20),
];

const ANTICIPATION: [&str; 4] = [
    "None",
    "Minor disruptions",
    "Moderate disruptions",
    "Significant disruptions",
];

const CONCERN: [&str; 5] = [
    "Not at all concerned",
    "Slightly concerned",
    "Moderately concerned",
    "Very concerned",
    "Extremely concerned",
];

const FREQUENCY: [&str; 5] = ["Never", "Rarely", "Sometimes", "Often", "Always"];

const ACCESS: [&str; 3] = ["Not accessible", "Somewhat accessible", "Very accessible"];

const HOUSING: [&str; 5] = ["Never", "Rarely", "Sometimes", "Frequently", "Almost always"];

const DECLINE: [&str; 4] = [
    "No decline",
    "Slight decline",
    "Moderate decline",
    "Significant decline",
];

/// Likert-style question and the probability of each answer.
const LIKERT: [(&str, &[&str], &[f64]); 9] = [
    ("Q11_Anticipate_6_12_months", &ANTICIPATION, &[0.25, 0.35, 0.30, 0.10]),
    ("Q12_Anticipate_12_18_months", &ANTICIPATION, &[0.20, 0.30, 0.35, 0.15]),
    ("Q13_Concern_Medicaid_Cuts", &CONCERN, &[0.15, 0.20, 0.25, 0.25, 0.15]),
    ("Q15_Concern_AETC_Cuts", &CONCERN, &[0.20, 0.25, 0.25, 0.20, 0.10]),
    ("Q18_Federal_Guidelines_Use", &FREQUENCY, &[0.05, 0.10, 0.25, 0.40, 0.20]),
    ("Q21_Mental_Health_Access", &ACCESS, &[0.30, 0.50, 0.20]),
    ("Q22_Substance_Use_Access", &ACCESS, &[0.35, 0.45, 0.20]),
    ("Q23_Housing_Instability", &HOUSING, &[0.15, 0.25, 0.35, 0.20, 0.05]),
    ("Q28_Undocumented_Decline", &DECLINE, &[0.30, 0.35, 0.25, 0.10]),
];

/// Column name used for a disrupted service, e.g. `Q9_PrEP_or_PEP_Access`.
pub fn service_column(service: &str) -> String {
    format!(
        "Q9_{}",
        service.replace(' ', "_").replace(['(', ')', ','], "")
    )
}

#[derive(Debug, Clone)]
enum Cell {
    Int(i64),
    Text(String),
}

/// Row-oriented builder; fields a row does not set become nulls.
#[derive(Default)]
struct FrameBuilder {
    names: Vec<String>,
    rows: Vec<HashMap<String, Cell>>,
}

impl FrameBuilder {
    fn push(&mut self, row: Vec<(String, Cell)>) {
        let mut record = HashMap::with_capacity(row.len());
        for (name, cell) in row {
            if !self.names.contains(&name) {
                self.names.push(name.clone());
            }
            record.insert(name, cell);
        }
        self.rows.push(record);
    }

    fn build(self) -> PolarsResult<DataFrame> {
        let columns = self
            .names
            .iter()
            .map(|name| {
                let textual = self
                    .rows
                    .iter()
                    .find_map(|r| r.get(name))
                    .is_some_and(|c| matches!(c, Cell::Text(_)));
                if textual {
                    let values: Vec<Option<String>> = self
                        .rows
                        .iter()
                        .map(|r| match r.get(name) {
                            Some(Cell::Text(s)) => Some(s.clone()),
                            Some(Cell::Int(i)) => Some(i.to_string()),
                            None => None,
                        })
                        .collect();
                    Column::new(name.as_str().into(), values)
                } else {
                    let values: Vec<Option<i64>> = self
                        .rows
                        .iter()
                        .map(|r| match r.get(name) {
                            Some(Cell::Int(i)) => Some(*i),
                            _ => None,
                        })
                        .collect();
                    Column::new(name.as_str().into(), values)
                }
            })
            .collect();
        DataFrame::new(columns)
    }
}

fn choose<'a>(rng: &mut StdRng, options: &[&'a str], weights: &[f64]) -> &'a str {
    let mut roll: f64 = rng.random();
    for (option, weight) in options.iter().zip(weights) {
        if roll < *weight {
            return option;
        }
        roll -= weight;
    }
    options[options.len() - 1]
}

fn flag(rng: &mut StdRng, p_true: f64) -> Cell {
    Cell::Int(i64::from(rng.random::<f64>() < p_true))
}

fn text(s: &str) -> Cell {
    Cell::Text(s.to_string())
}

/// Generate the sample survey, partial responses included.
pub fn sample_frame() -> PolarsResult<DataFrame> {
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    let mut builder = FrameBuilder::default();
    let mut response_id = 1;

    let years: Vec<&str> = YEARS.iter().map(|(y, _)| *y).collect();
    let year_weights: Vec<f64> = YEARS.iter().map(|(_, w)| *w).collect();

    for (role_idx, (role, count)) in ROLES.iter().enumerate() {
        for _ in 0..*count {
            let mut row = vec![
                ("ResponseID".to_string(), text(&format!("R_{response_id:04}"))),
                ("Progress".to_string(), Cell::Int(100)),
                ("Q2_Professional_Role".to_string(), text(role)),
                (
                    "Q5_Years_HIV_Practice".to_string(),
                    text(choose(&mut rng, &years, &year_weights)),
                ),
            ];

            for (name, p) in PRACTICE_FLAGS {
                row.push((name.to_string(), flag(&mut rng, p)));
            }

            for (service, disrupted) in SERVICES.iter().zip(DISRUPTIONS[role_idx]) {
                let p = f64::from(disrupted) / *count as f64;
                row.push((service_column(service), flag(&mut rng, p)));
            }

            for (name, p) in AFFECTED_POPULATIONS {
                row.push((name.to_string(), flag(&mut rng, p)));
            }

            for (name, answers, weights) in LIKERT {
                row.push((name.to_string(), text(choose(&mut rng, answers, weights))));
            }

            for (name, p) in BARRIER_FLAGS {
                row.push((name.to_string(), flag(&mut rng, p)));
            }

            builder.push(row);
            response_id += 1;
        }
    }

    let role_names: Vec<&str> = ROLES.iter().map(|(r, _)| *r).collect();
    let role_weights = vec![1.0 / role_names.len() as f64; role_names.len()];
    let short_years = ["0-2 years", "3-5 years", "6-10 years", "10+ years"];

    for _ in 0..INCOMPLETE_RESPONSES {
        let progress = choose(&mut rng, &["25", "50", "75"], &[0.4, 0.4, 0.2]);
        let mut row = vec![
            ("ResponseID".to_string(), text(&format!("R_{response_id:04}"))),
            (
                "Progress".to_string(),
                Cell::Int(progress.parse().unwrap_or(25)),
            ),
            (
                "Q2_Professional_Role".to_string(),
                text(choose(&mut rng, &role_names, &role_weights)),
            ),
        ];
        if rng.random::<f64>() > 0.5 {
            row.push((
                "Q5_Years_HIV_Practice".to_string(),
                text(choose(&mut rng, &short_years, &[0.25; 4])),
            ));
        }
        builder.push(row);
        response_id += 1;
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_has_expected_shape() {
        let df = sample_frame().unwrap();
        let complete: usize = ROLES.iter().map(|(_, n)| n).sum();
        assert_eq!(complete, 526);
        assert_eq!(df.height(), complete + INCOMPLETE_RESPONSES);
        assert!(df.column("Q9_PrEP_or_PEP_Access").is_ok());
        assert!(df.column("Q9_Other_please_specify").is_ok());
    }

    #[test]
    fn sample_is_reproducible() {
        let a = sample_frame().unwrap();
        let b = sample_frame().unwrap();
        assert!(a.equals_missing(&b));
    }

    #[test]
    fn service_column_strips_punctuation() {
        assert_eq!(
            service_column("Rapid START or Same-Day ART Initiation"),
            "Q9_Rapid_START_or_Same-Day_ART_Initiation"
        );
    }
}
