//! Assigning each value of a numeric column to a labelled bucket.

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

use crate::stats::{median, quantile};

/// Bucket assignment for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Strata {
    pub labels: Vec<String>,
    /// Upper bounds of every bucket but the last, ascending
    pub cut_points: Vec<f64>,
    /// Bucket index of each input value, in input order
    pub assignments: Vec<usize>,
}

impl Strata {
    pub fn label_of(&self, row: usize) -> Option<&str> {
        let bucket = *self.assignments.get(row)?;
        self.labels.get(bucket).map(String::as_str)
    }

    /// One label per input row
    pub fn row_labels(&self) -> Vec<&str> {
        self.assignments
            .iter()
            .map(|&bucket| self.labels[bucket].as_str())
            .collect()
    }

    /// The entries of `values` whose row falls in `bucket`
    pub fn members(&self, bucket: usize, values: &[f64]) -> Vec<f64> {
        self.assignments
            .iter()
            .zip(values)
            .filter(|&(&b, _)| b == bucket)
            .map(|(_, &v)| v)
            .collect()
    }

    /// Number of rows in each bucket, in label order
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.labels.len()];
        for &bucket in &self.assignments {
            counts[bucket] += 1;
        }
        counts
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[enum_dispatch]
pub trait Stratify {
    /// Bucket labels, lowest bucket first
    fn labels(&self) -> Vec<String>;

    /// One fewer cut point than labels, or `None` when `values` is empty
    fn cut_points(&self, values: &[f64]) -> Option<Vec<f64>>;

    /// Buckets are right-closed: a value equal to a cut point goes to the lower bucket.
    ///
    /// Nothing is assigned when there are no values, or no labels to assign.
    fn stratify(&self, values: &[f64]) -> Strata {
        let labels = self.labels();
        let Some(cut_points) = self
            .cut_points(values)
            .filter(|cuts| cuts.len() + 1 == labels.len())
        else {
            return Strata {
                labels,
                cut_points: vec![],
                assignments: vec![],
            };
        };
        let assignments = values
            .iter()
            .map(|v| {
                cut_points
                    .iter()
                    .position(|cut| v <= cut)
                    .unwrap_or(cut_points.len())
            })
            .collect();
        Strata {
            labels,
            cut_points,
            assignments,
        }
    }
}

#[enum_dispatch(Stratify)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stratifier {
    QuantileBins(QuantileBins),
    MedianSplit(MedianSplit),
}

/// Equal-count buckets cut at the evenly spaced quantiles of the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileBins {
    pub labels: Vec<String>,
}

impl QuantileBins {
    pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn tertiles() -> Self {
        Self::new(["Low", "Medium", "High"])
    }
}

impl Default for QuantileBins {
    fn default() -> Self {
        Self::tertiles()
    }
}

impl Stratify for QuantileBins {
    fn labels(&self) -> Vec<String> {
        self.labels.clone()
    }

    fn cut_points(&self, values: &[f64]) -> Option<Vec<f64>> {
        let buckets = self.labels.len();
        (1..buckets)
            .map(|i| quantile(values, i as f64 / buckets as f64))
            .collect()
    }
}

/// Two buckets either side of the median; values equal to it go low.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianSplit {
    pub low_label: String,
    pub high_label: String,
}

impl MedianSplit {
    /// Bucket indices in the resulting `Strata`
    pub const LOW: usize = 0;
    pub const HIGH: usize = 1;
}

impl Default for MedianSplit {
    fn default() -> Self {
        Self {
            low_label: "Low (<=Median)".into(),
            high_label: "High (>Median)".into(),
        }
    }
}

impl Stratify for MedianSplit {
    fn labels(&self) -> Vec<String> {
        vec![self.low_label.clone(), self.high_label.clone()]
    }

    fn cut_points(&self, values: &[f64]) -> Option<Vec<f64>> {
        median(values).map(|m| vec![m])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tertile_sizes_should_differ_by_at_most_one() {
        for n in 3..60usize {
            // Distinct values in scrambled order
            let values: Vec<f64> = (0..n)
                .map(|i| ((i * 7) % n) as f64 + i as f64 * 0.001)
                .collect();
            let strata = QuantileBins::tertiles().stratify(&values);
            for count in strata.counts() {
                assert!(
                    count == n / 3 || count == n.div_ceil(3),
                    "n = {n}, counts = {:?}",
                    strata.counts()
                );
            }
        }
    }

    #[test]
    fn tertiles_should_cut_at_interpolated_quantiles() {
        let values = [5.0, 1.0, 9.0, 3.0, 7.0, 2.0];
        let strata = Stratifier::from(QuantileBins::tertiles()).stratify(&values);
        assert_eq!(strata.cut_points.len(), 2);
        assert!((strata.cut_points[0] - 8.0 / 3.0).abs() < 1e-12);
        assert!((strata.cut_points[1] - 17.0 / 3.0).abs() < 1e-12);
        assert_eq!(
            strata.row_labels(),
            vec!["Medium", "Low", "High", "Medium", "High", "Low"]
        );
    }

    #[test]
    fn value_on_a_cut_point_should_go_to_the_lower_bucket() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let strata = QuantileBins::tertiles().stratify(&values);
        assert_eq!(strata.cut_points[0], 2.0);
        assert_eq!(strata.label_of(1), Some("Low"));
        assert_eq!(strata.counts(), vec![2, 1, 1]);
    }

    #[test]
    fn median_split_ties_should_go_low() {
        let strata = MedianSplit::default().stratify(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(strata.cut_points, vec![2.5]);
        assert_eq!(
            strata.row_labels(),
            vec!["Low (<=Median)", "Low (<=Median)", "High (>Median)", "High (>Median)"]
        );

        let strata = MedianSplit::default().stratify(&[3.0, 1.0, 2.0]);
        assert_eq!(strata.cut_points, vec![2.0]);
        assert_eq!(strata.counts(), vec![2, 1]);
        assert_eq!(strata.label_of(2), Some("Low (<=Median)"));
    }

    #[test]
    fn every_row_should_get_exactly_one_label() {
        let values = [4.0, 4.0, 4.0, 1.0, 9.0];
        for stratifier in [
            Stratifier::from(QuantileBins::tertiles()),
            Stratifier::from(MedianSplit::default()),
        ] {
            let strata = stratifier.stratify(&values);
            assert_eq!(strata.assignments.len(), values.len());
            assert_eq!(strata.counts().iter().sum::<usize>(), values.len());
        }
    }

    #[test]
    fn members_should_select_values_by_bucket() {
        let strata = MedianSplit::default().stratify(&[10.0, 30.0, 20.0, 40.0]);
        assert_eq!(strata.members(0, &[1.0, 3.0, 2.0, 4.0]), vec![1.0, 2.0]);
        assert_eq!(strata.members(1, &[1.0, 3.0, 2.0, 4.0]), vec![3.0, 4.0]);
    }

    #[test]
    fn bins_without_labels_should_assign_nothing() {
        let strata = QuantileBins::new(Vec::<String>::new()).stratify(&[1.0, 2.0, 3.0]);
        assert!(strata.is_empty());
        assert!(strata.row_labels().is_empty());
        assert!(strata.counts().is_empty());
        assert_eq!(strata.label_of(0), None);

        let single = QuantileBins::new(["All"]).stratify(&[1.0, 2.0, 3.0]);
        assert_eq!(single.row_labels(), vec!["All", "All", "All"]);
    }

    #[test]
    fn empty_input_should_give_empty_strata() {
        let strata = QuantileBins::tertiles().stratify(&[]);
        assert!(strata.is_empty());
        assert_eq!(strata.counts(), vec![0, 0, 0]);
        assert_eq!(strata.label_of(0), None);
    }
}
