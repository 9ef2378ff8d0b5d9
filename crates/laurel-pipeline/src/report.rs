//! CSV export of a shortlist.

use laurel_core::prediction::ShortlistEntry;
use laurel_table::Table;

use crate::Result;

pub const REPORT_COLUMNS: [&str; 5] = ["rank", "full_name", "affiliation", "probability", "top_features"];

/// One row per entry, ranked from 1 in the given order. `top_features` is
/// `"name: weight"` pairs to three decimals, joined by `", "`.
pub fn shortlist_csv(entries: &[ShortlistEntry]) -> Result<String> {
  let mut table = Table::new(REPORT_COLUMNS)?;
  for (i, entry) in entries.iter().enumerate() {
    let top_features = entry
      .top_features
      .iter()
      .map(|a| format!("{}: {:.3}", a.feature.name(), a.contribution))
      .collect::<Vec<_>>()
      .join(", ");
    table.push_row([
      (i + 1).to_string(),
      entry.candidate_name.clone(),
      entry.affiliation.clone(),
      entry.probability.to_string(),
      top_features,
    ])?;
  }
  Ok(laurel_table::serialize(&table))
}

#[cfg(test)]
mod tests {
  use laurel_core::{
    feature::Feature,
    prediction::{Attribution, Horizon},
  };
  use uuid::Uuid;

  use super::*;

  #[test]
  fn rows_are_ranked_and_quoted() {
    let entry = ShortlistEntry {
      candidate_id:   Uuid::nil(),
      candidate_name: "Lene Hau".into(),
      affiliation:    "Harvard University, Cambridge".into(),
      field:          "Physics".into(),
      headshot_url:   None,
      probability:    0.42,
      horizon:        Horizon::OneYear,
      year:           2025,
      shap_values:    Vec::new(),
      top_features:   vec![
        Attribution { feature: Feature::SeminalScore, value: 0.9, contribution: 0.135 },
        Attribution { feature: Feature::HIndex, value: 60.0, contribution: 0.12 },
      ],
    };

    let csv = shortlist_csv(&[entry]).unwrap();
    assert_eq!(
      csv,
      "rank,full_name,affiliation,probability,top_features\n\
       1,Lene Hau,\"Harvard University, Cambridge\",0.42,\"seminal_score: 0.135, h_index: 0.120\"\n"
    );
  }

  #[test]
  fn empty_shortlist_is_header_only() {
    assert_eq!(shortlist_csv(&[]).unwrap(), "rank,full_name,affiliation,probability,top_features\n");
  }
}
