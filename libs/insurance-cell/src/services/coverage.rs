use serde::Serialize;

use crate::models::{DeductibleOopSummary, EligibilitySummary, MoneyField};

/// Parses pVerify money strings such as `$1,250.00`. Blank or unparsable values are `None`.
pub fn parse_money(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn money(field: &Option<MoneyField>) -> Option<f64> {
    field.as_ref().and_then(|f| f.value.as_deref()).and_then(parse_money)
}

impl From<&DeductibleOopSummary> for EligibilitySummary {
    fn from(summary: &DeductibleOopSummary) -> Self {
        Self {
            deductible_remaining: money(&summary.individual_deductible_remaining),
            oop_remaining: money(&summary.individual_oop_remaining),
        }
    }
}

/// How a consultation price divides between the patient and the plan.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct CostSplit {
    pub self_pay: f64,
    pub insurance_coverage: f64,
}

impl CostSplit {
    /// The patient pays up to the smallest remaining amount, capped at the price.
    pub fn compute(price: f64, summary: &EligibilitySummary) -> Self {
        let self_pay = [summary.deductible_remaining, summary.oop_remaining]
            .into_iter()
            .flatten()
            .map(|owed| owed.max(0.0))
            .fold(None, |lowest: Option<f64>, owed| Some(lowest.map_or(owed, |l| l.min(owed))))
            .map_or(0.0, |owed| owed.min(price));

        Self {
            self_pay,
            insurance_coverage: price - self_pay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(deductible: Option<f64>, oop: Option<f64>) -> EligibilitySummary {
        EligibilitySummary {
            deductible_remaining: deductible,
            oop_remaining: oop,
        }
    }

    #[test]
    fn parses_currency_strings() {
        assert_eq!(parse_money("$1,250.00"), Some(1250.0));
        assert_eq!(parse_money(" 75 "), Some(75.0));
        assert_eq!(parse_money("N/A"), None);
        assert_eq!(parse_money(""), None);
    }

    #[test]
    fn patient_pays_smallest_remaining_amount() {
        let split = CostSplit::compute(150.0, &summary(Some(40.0), Some(90.0)));
        assert_eq!(split.self_pay, 40.0);
        assert_eq!(split.insurance_coverage, 110.0);
    }

    #[test]
    fn self_pay_never_exceeds_price() {
        let split = CostSplit::compute(150.0, &summary(Some(1250.0), None));
        assert_eq!(split.self_pay, 150.0);
        assert_eq!(split.insurance_coverage, 0.0);
    }

    #[test]
    fn plan_covers_everything_without_amounts() {
        let split = CostSplit::compute(150.0, &summary(None, None));
        assert_eq!(split.self_pay, 0.0);
        assert_eq!(split.insurance_coverage, 150.0);
    }
}
