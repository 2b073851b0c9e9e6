//! 2-D projections of the embedding space for plotting.
//!
//! The neighbour-graph reducer can fail on awkward inputs; PCA cannot. The
//! caller gets a [`Reduction`] that records which method produced the
//! coordinates and why the preferred one was abandoned.

use ndarray::{Array1, Array2, Axis};
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use thiserror::Error;

use crate::config::ReducerKind;

/// Why the neighbour-graph reducer gave up.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReductionError {
    /// Not enough points for the requested neighbourhood size.
    #[error("need at least {needed} points, got {got}")]
    TooFewPoints {
        /// Minimum required.
        needed: usize,
        /// Points supplied.
        got: usize,
    },
    /// The k-nearest-neighbour graph falls apart into several components.
    #[error("neighbour graph has {0} connected components")]
    Disconnected(usize),
    /// The eigen-solve produced NaN or infinite coordinates.
    #[error("non-finite coordinates")]
    NonFinite,
}

/// 2-D coordinates and the method that produced them.
#[derive(Debug, Clone)]
pub struct Reduction {
    /// n × 2 coordinates.
    pub coords: Array2<f32>,
    /// Method actually used.
    pub method: ReducerKind,
    /// Failure of the preferred method, if it was abandoned.
    pub fallback_reason: Option<ReductionError>,
}

/// Project with the preferred reducer, falling back to PCA.
pub fn project_2d(data: &Array2<f32>, preferred: ReducerKind, n_neighbors: usize, seed: u64) -> Reduction {
    match preferred {
        ReducerKind::Pca => Reduction {
            coords: pca_2d(data, seed),
            method: ReducerKind::Pca,
            fallback_reason: None,
        },
        ReducerKind::Spectral => match spectral_2d(data, n_neighbors, seed) {
            Ok(coords) => Reduction {
                coords,
                method: ReducerKind::Spectral,
                fallback_reason: None,
            },
            Err(e) => {
                tracing::warn!("Spectral reducer failed ({}); falling back to PCA for visualization", e);
                Reduction {
                    coords: pca_2d(data, seed),
                    method: ReducerKind::Pca,
                    fallback_reason: Some(e),
                }
            }
        },
    }
}

/// Top principal components by power iteration with deflation.
///
/// Always succeeds; degenerate inputs give zero columns.
pub fn pca_2d(data: &Array2<f32>, seed: u64) -> Array2<f32> {
    let (n, d) = data.dim();
    let mut out = Array2::zeros((n, 2));
    if n < 2 || d == 0 {
        return out;
    }

    let mean = data.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(d));
    let centered = data - &mean.insert_axis(Axis(0));
    let mut cov = centered.t().dot(&centered) / (n as f32 - 1.0);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for comp in 0..2.min(d) {
        let mut v = Array1::from_shape_fn(d, |_| rng.gen::<f32>() - 0.5);
        let norm = v.dot(&v).sqrt();
        if norm < 1e-10 {
            break;
        }
        v /= norm;

        for _ in 0..100 {
            let next = cov.dot(&v);
            let norm = next.dot(&next).sqrt();
            if norm < 1e-10 {
                break;
            }
            v = next / norm;
        }

        let lambda = v.dot(&cov.dot(&v));
        if !lambda.is_finite() || lambda <= 1e-12 {
            break;
        }

        let projected = centered.dot(&v);
        out.column_mut(comp).assign(&projected);

        let v_col = v.clone().insert_axis(Axis(1));
        let v_row = v.insert_axis(Axis(0));
        cov = &cov - &(v_col.dot(&v_row) * lambda);
    }

    out.mapv_inplace(|x| if x.is_finite() { x } else { 0.0 });
    out
}

/// Laplacian eigenmap of the symmetric k-nearest-neighbour graph.
pub fn spectral_2d(data: &Array2<f32>, n_neighbors: usize, seed: u64) -> Result<Array2<f32>, ReductionError> {
    let n = data.nrows();
    let k = n_neighbors.max(1);
    if n < k + 2 {
        return Err(ReductionError::TooFewPoints { needed: k + 2, got: n });
    }

    // k nearest neighbours per point, by squared euclidean distance.
    let knn: Vec<Vec<(usize, f32)>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let row = data.row(i);
            let mut dists: Vec<(usize, f32)> = (0..n)
                .filter(|&j| j != i)
                .map(|j| {
                    let other = data.row(j);
                    let d: f32 = row.iter().zip(other.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
                    (j, d)
                })
                .collect();
            dists.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
            dists.truncate(k);
            dists
        })
        .collect();

    let sigma2 = {
        let all: Vec<f32> = knn.iter().flatten().map(|(_, d)| *d).collect();
        let mean = all.iter().sum::<f32>() / all.len() as f32;
        if mean > 1e-12 { mean } else { 1.0 }
    };

    let mut graph: UnGraph<usize, f32> = UnGraph::with_capacity(n, n * k);
    let nodes: Vec<NodeIndex> = (0..n).map(|i| graph.add_node(i)).collect();
    for (i, neighbours) in knn.iter().enumerate() {
        for &(j, d) in neighbours {
            if graph.find_edge(nodes[i], nodes[j]).is_none() {
                graph.add_edge(nodes[i], nodes[j], (-d / sigma2).exp().max(1e-12));
            }
        }
    }

    let components = connected_components(&graph);
    if components != 1 {
        return Err(ReductionError::Disconnected(components));
    }

    let degree: Vec<f32> = nodes
        .iter()
        .map(|&v| graph.edges(v).map(|e| *e.weight()).sum::<f32>())
        .collect();
    let inv_sqrt: Vec<f32> = degree.iter().map(|d| 1.0 / d.sqrt()).collect();

    // M = (I + D^-1/2 W D^-1/2) / 2 shares eigenvectors with the normalized
    // Laplacian, with eigenvalues in [0, 1] in reverse order.
    let apply = |x: &Array1<f32>| -> Array1<f32> {
        let mut y = Array1::zeros(n);
        for (i, &v) in nodes.iter().enumerate() {
            let mut acc = 0.0;
            for e in graph.edges(v) {
                let j = (if e.source() == v { e.target() } else { e.source() }).index();
                acc += e.weight() * inv_sqrt[i] * inv_sqrt[j] * x[j];
            }
            y[i] = 0.5 * (x[i] + acc);
        }
        y
    };

    // Trivial top eigenvector: D^1/2 · 1.
    let mut basis: Vec<Array1<f32>> = Vec::with_capacity(3);
    let mut trivial = Array1::from_iter(degree.iter().map(|d| d.sqrt()));
    let tn = trivial.dot(&trivial).sqrt();
    trivial /= tn;
    basis.push(trivial);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = Array2::zeros((n, 2));
    for comp in 0..2 {
        let mut v = Array1::from_shape_fn(n, |_| rng.gen::<f32>() - 0.5);
        for _ in 0..300 {
            for b in &basis {
                let p = v.dot(b);
                v.scaled_add(-p, b);
            }
            let next = apply(&v);
            let norm = next.dot(&next).sqrt();
            if !norm.is_finite() || norm < 1e-12 {
                return Err(ReductionError::NonFinite);
            }
            v = next / norm;
        }
        for b in &basis {
            let p = v.dot(b);
            v.scaled_add(-p, b);
        }

        let coords = Array1::from_iter(v.iter().zip(&inv_sqrt).map(|(x, s)| x * s));
        out.column_mut(comp).assign(&coords);
        basis.push(v);
    }

    if out.iter().any(|x| !x.is_finite()) {
        return Err(ReductionError::NonFinite);
    }
    Ok(out)
}
