//! Property tests for probability display and image type validation

use proptest::prelude::*;
use vxaid_common::format_percent;
use vxaid_screen::intake::{validate, ImageCandidate, IntakeError, ACCEPTED_MIME_TYPES};
use vxaid_screen::presentation::{bar_width, ProbabilityView, MIN_BAR_WIDTH};

fn probabilities() -> impl Strategy<Value = std::collections::BTreeMap<String, f64>> {
    proptest::collection::btree_map("[A-Za-z]{1,10}", 0.0f64..=1.0, 1..12)
}

proptest! {
    #[test]
    fn prop_rows_are_non_increasing(probs in probabilities()) {
        let ProbabilityView::Rows(rows) = ProbabilityView::from_probabilities(Some(&probs)) else {
            panic!("non-empty probabilities must produce rows");
        };

        prop_assert_eq!(rows.len(), probs.len());
        for pair in rows.windows(2) {
            prop_assert!(pair[0].value >= pair[1].value);
        }
    }

    #[test]
    fn prop_small_values_get_minimum_bar(value in 0.0f64..0.02) {
        prop_assert_eq!(bar_width(value), MIN_BAR_WIDTH);
    }

    #[test]
    fn prop_bar_tracks_value_above_minimum(value in 0.02f64..=1.0) {
        prop_assert!((bar_width(value) - value * 100.0).abs() < 1e-9);
    }

    #[test]
    fn prop_percent_has_one_decimal(value in 0.0f64..=1.0) {
        let text = format_percent(Some(value));
        let number = text.strip_suffix('%').expect("percent sign");

        let (_, decimals) = number.split_once('.').expect("decimal point");
        prop_assert_eq!(decimals.len(), 1);
        let parsed: f64 = number.parse().unwrap();
        prop_assert!((parsed - value * 100.0).abs() <= 0.05 + 1e-9);
    }

    #[test]
    fn prop_other_mime_types_are_rejected(mime in "[a-z]{1,11}/[a-z0-9.+-]{1,12}") {
        prop_assume!(!ACCEPTED_MIME_TYPES.contains(&mime.as_str()));

        let candidate = ImageCandidate::from_bytes("upload", Some(mime), vec![0xFF; 8]);
        let rejected = matches!(
            validate(&candidate, 1024),
            Err(IntakeError::UnsupportedType { .. })
        );
        prop_assert!(rejected);
    }

    #[test]
    fn prop_accepted_mime_types_pass_in_any_case(
        index in 0..ACCEPTED_MIME_TYPES.len(),
        upper in proptest::collection::vec(any::<bool>(), 10),
    ) {
        let declared: String = ACCEPTED_MIME_TYPES[index]
            .chars()
            .zip(upper.iter().cycle())
            .map(|(c, up)| if *up { c.to_ascii_uppercase() } else { c })
            .collect();

        let candidate = ImageCandidate::from_bytes("eye", Some(declared), vec![0xFF; 8]);
        prop_assert_eq!(validate(&candidate, 1024).unwrap(), ACCEPTED_MIME_TYPES[index]);
    }
}
