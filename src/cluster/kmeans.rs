//! Seeded k-means (k-means++ initialisation, Lloyd iterations).

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::errors::{Result, VoynichError};
use crate::types::Label;

/// k-means parameters.
#[derive(Debug, Clone)]
pub struct KMeans {
    /// Number of clusters.
    pub k: usize,
    /// Independent restarts.
    pub n_init: usize,
    /// Iteration cap per restart.
    pub max_iter: usize,
    /// Stop once the summed squared centroid shift is at most this.
    pub tolerance: f32,
    /// RNG seed.
    pub seed: u64,
}

/// Best restart of a k-means run.
#[derive(Debug, Clone)]
pub struct KMeansFit {
    /// Label per input row.
    pub labels: Vec<Label>,
    /// Centroids (k × d).
    pub centroids: Array2<f32>,
    /// Sum of squared distances to assigned centroids.
    pub inertia: f64,
    /// Lloyd iterations used by the winning restart.
    pub n_iter: usize,
}

#[inline]
fn sq_dist(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl KMeans {
    /// Fit on `data` (n × d). Requires `1 <= k <= n`.
    pub fn fit(&self, data: &Array2<f32>) -> Result<KMeansFit> {
        let n = data.nrows();
        if self.k == 0 || self.k > n {
            return Err(VoynichError::Cluster(format!(
                "cannot form {} clusters from {} points",
                self.k, n
            )));
        }
        if data.iter().any(|x| !x.is_finite()) {
            return Err(VoynichError::Cluster("embeddings contain non-finite values".into()));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut best: Option<KMeansFit> = None;

        for run in 0..self.n_init.max(1) {
            let fit = self.single_run(data, &mut rng);
            tracing::debug!(run, inertia = fit.inertia, n_iter = fit.n_iter, "k-means restart");
            if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
                best = Some(fit);
            }
        }

        best.ok_or_else(|| VoynichError::Cluster("k-means produced no run".into()))
    }

    fn single_run(&self, data: &Array2<f32>, rng: &mut ChaCha8Rng) -> KMeansFit {
        let mut centroids = init_plus_plus(data, self.k, rng);
        let mut n_iter = 0;

        for it in 0..self.max_iter {
            n_iter = it + 1;
            let labels = assign(data, &centroids);
            let updated = update(data, &labels, &centroids);

            let shift: f32 = centroids
                .axis_iter(Axis(0))
                .zip(updated.axis_iter(Axis(0)))
                .map(|(a, b)| sq_dist(a, b))
                .sum();
            centroids = updated;
            if shift <= self.tolerance {
                break;
            }
        }

        // Final assignment against the final centroids.
        let labels = assign(data, &centroids);
        let inertia = data
            .axis_iter(Axis(0))
            .zip(&labels)
            .map(|(row, &l)| sq_dist(row, centroids.row(l as usize)) as f64)
            .sum();

        KMeansFit {
            labels,
            centroids,
            inertia,
            n_iter,
        }
    }
}

/// k-means++ seeding: each next centroid is drawn with probability
/// proportional to its squared distance from the nearest chosen one.
fn init_plus_plus(data: &Array2<f32>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f32> {
    let n = data.nrows();
    let mut centroids = Array2::zeros((k, data.ncols()));

    let first = rng.gen_range(0..n);
    centroids.row_mut(0).assign(&data.row(first));
    let mut closest: Vec<f32> = data
        .axis_iter(Axis(0))
        .map(|row| sq_dist(row, data.row(first)))
        .collect();

    for c in 1..k {
        let total: f64 = closest.iter().map(|&d| d as f64).sum();
        let pick = if total <= 0.0 {
            rng.gen_range(0..n)
        } else {
            let target = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            let mut chosen = n - 1;
            for (i, &d) in closest.iter().enumerate() {
                acc += d as f64;
                if acc >= target && d > 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        };

        centroids.row_mut(c).assign(&data.row(pick));
        for (i, row) in data.axis_iter(Axis(0)).enumerate() {
            let d = sq_dist(row, data.row(pick));
            if d < closest[i] {
                closest[i] = d;
            }
        }
    }

    centroids
}

/// Nearest centroid per row; ties go to the lower label.
fn assign(data: &Array2<f32>, centroids: &Array2<f32>) -> Vec<Label> {
    (0..data.nrows())
        .into_par_iter()
        .map(|i| {
            let row = data.row(i);
            let mut best = 0usize;
            let mut best_d = f32::INFINITY;
            for (c, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
                let d = sq_dist(row, centroid);
                if d < best_d {
                    best_d = d;
                    best = c;
                }
            }
            best as Label
        })
        .collect()
}

/// Recompute centroids as member means. An emptied cluster takes the point
/// farthest from its current centroid.
fn update(data: &Array2<f32>, labels: &[Label], previous: &Array2<f32>) -> Array2<f32> {
    let k = previous.nrows();
    let mut sums = Array2::<f32>::zeros(previous.raw_dim());
    let mut counts = vec![0usize; k];

    for (row, &l) in data.axis_iter(Axis(0)).zip(labels) {
        let mut s = sums.row_mut(l as usize);
        s += &row;
        counts[l as usize] += 1;
    }

    let mut taken: Vec<usize> = Vec::new();
    for c in 0..k {
        if counts[c] > 0 {
            let mean: Array1<f32> = sums.row(c).mapv(|x| x / counts[c] as f32);
            sums.row_mut(c).assign(&mean);
        } else {
            let far = data
                .axis_iter(Axis(0))
                .zip(labels)
                .enumerate()
                .filter(|(i, _)| !taken.contains(i))
                .map(|(i, (row, &l))| (i, sq_dist(row, previous.row(l as usize))))
                .fold((0usize, f32::NEG_INFINITY), |acc, cur| if cur.1 > acc.1 { cur } else { acc })
                .0;
            taken.push(far);
            sums.row_mut(c).assign(&data.row(far));
        }
    }

    sums
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> Array2<f32> {
        array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1],
            [-5.0, 5.0],
            [-5.1, 5.0],
        ]
    }

    fn km(k: usize, seed: u64) -> KMeans {
        KMeans {
            k,
            n_init: 5,
            max_iter: 100,
            tolerance: 1e-6,
            seed,
        }
    }

    #[test]
    fn separates_obvious_blobs() {
        let fit = km(3, 42).fit(&blobs()).unwrap();
        let l = &fit.labels;
        assert_eq!(l[0], l[1]);
        assert_eq!(l[1], l[2]);
        assert_eq!(l[3], l[4]);
        assert_eq!(l[4], l[5]);
        assert_eq!(l[6], l[7]);
        assert_ne!(l[0], l[3]);
        assert_ne!(l[0], l[6]);
        assert_ne!(l[3], l[6]);
        assert!(fit.inertia < 0.1);
    }

    #[test]
    fn same_seed_same_labels() {
        let a = km(3, 7).fit(&blobs()).unwrap();
        let b = km(3, 7).fit(&blobs()).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.inertia, b.inertia);
    }

    #[test]
    fn every_label_in_range() {
        let fit = km(4, 1).fit(&blobs()).unwrap();
        assert_eq!(fit.labels.len(), 8);
        assert!(fit.labels.iter().all(|&l| (l as usize) < 4));
    }

    #[test]
    fn k_larger_than_n_rejected() {
        let err = km(9, 1).fit(&blobs()).unwrap_err();
        assert!(matches!(err, VoynichError::Cluster(_)));
    }

    #[test]
    fn duplicate_points_do_not_panic() {
        let data = array![[1.0f32, 1.0], [1.0, 1.0], [1.0, 1.0]];
        let fit = km(2, 3).fit(&data).unwrap();
        assert_eq!(fit.labels.len(), 3);
    }
}
