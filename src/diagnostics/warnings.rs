use serde::Serialize;

/// Non-fatal conditions worth a human look. The run always completes.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Warning {
    /// The border does not match the background palette; the mask is a guess.
    #[serde(rename_all = "camelCase")]
    AmbiguousBackground { spread: u8 },
    /// Nothing survived region detection.
    NoRegions,
    /// Fewer regions than the manifest expects.
    #[serde(rename_all = "camelCase")]
    SparseRegions { found: usize, expected: usize },
    /// A row's box count deviates from its manifest row beyond tolerance.
    #[serde(rename_all = "camelCase")]
    RowCountMismatch {
        row: usize,
        observed: usize,
        expected: usize,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::AmbiguousBackground { spread } => {
                write!(f, "ambiguous background (border spread {spread})")
            }
            Warning::NoRegions => write!(f, "no regions detected; check background tolerance"),
            Warning::SparseRegions { found, expected } => {
                write!(f, "only {found} regions for {expected} manifest entries")
            }
            Warning::RowCountMismatch {
                row,
                observed,
                expected,
            } => write!(f, "row {row}: observed {observed} boxes, expected {expected}"),
        }
    }
}
