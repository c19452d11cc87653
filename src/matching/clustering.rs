//! K-means-like partitioning of structures by their pairwise RMSD.

use super::progress::Progress;
use crate::error::Result;

/// Upper bound on reassignment passes; the procedure normally settles in a handful.
const MAX_PASSES: usize = 1000;

/// Distances below this are treated as identical structures.
const ZERO_DISTANCE: f64 = 1e-5;

/// Cuts `items` into contiguous groups of `round(n / k)` items.
///
/// A short trailing group is merged into the one before it when it would exceed `k`
/// groups, so the result has at most `max(k, 2)` groups.
pub fn split<T: Clone>(items: &[T], k: usize) -> Vec<Vec<T>> {
    let n = items.len();
    let mut len = ((n as f64) / (k.max(1) as f64)).round_ties_even() as usize;
    len = len.max(1);

    let mut groups: Vec<Vec<T>> = Vec::new();
    let mut start = 0;
    while start < n {
        groups.push(items[start..start + len].to_vec());
        start += len;
        if start + len > n {
            len = n - start;
        }
    }

    if groups.len() > k && groups.len() > 2 {
        if let Some(last) = groups.pop() {
            if let Some(previous) = groups.last_mut() {
                previous.extend(last);
            }
        }
    }
    groups
}

/// Mean distance of `index` to the members of `cluster` other than itself.
fn cluster_distance(index: usize, cluster: &[usize], distances: &[Vec<f64>]) -> f64 {
    let row = &distances[index];
    let distance = if let [only] = cluster {
        row[*only]
    } else {
        let (sum, count) = cluster
            .iter()
            .filter(|&&j| j != index)
            .fold((0.0, 0usize), |(sum, count), &j| (sum + row[j], count + 1));
        if count == 0 { 0.0 } else { sum / count as f64 }
    };
    if distance < ZERO_DISTANCE { 0.0 } else { distance }
}

fn nearest_cluster(index: usize, clusters: &[Vec<usize>], distances: &[Vec<f64>]) -> usize {
    let mut nearest = 0;
    let mut best = f64::MAX;
    for (c, cluster) in clusters.iter().enumerate() {
        let d = cluster_distance(index, cluster, distances);
        if d < best {
            best = d;
            nearest = c;
        }
    }
    nearest
}

/// Partitions the rows of a symmetric distance matrix into about `k` clusters.
///
/// Starts from [`split`] and moves members of non-singleton clusters to the cluster with
/// the lowest mean distance until a pass moves nothing. Clusters are returned largest first.
///
/// # Errors
///
/// Returns [`Error::Cancelled`](crate::Error::Cancelled) when cancelled between clusters.
pub fn kmeans(k: usize, distances: &[Vec<f64>], progress: &Progress) -> Result<Vec<Vec<usize>>> {
    let indices: Vec<usize> = (0..distances.len()).collect();
    let mut clusters = split(&indices, k);

    let mut passes = 0;
    loop {
        let mut moves = 0;
        for c in 0..clusters.len() {
            progress.check()?;
            let mut i = 0;
            while i < clusters[c].len() {
                let member = clusters[c][i];
                let nearest = nearest_cluster(member, &clusters, distances);
                if nearest != c && clusters[c].len() > 1 {
                    clusters[c].remove(i);
                    clusters[nearest].push(member);
                    moves += 1;
                } else {
                    i += 1;
                }
            }
        }

        passes += 1;
        if moves == 0 {
            break;
        }
        if passes >= MAX_PASSES {
            tracing::warn!(passes, "k-means did not settle; keeping the last assignment");
            break;
        }
    }

    clusters.sort_by_key(|cluster| std::cmp::Reverse(cluster.len()));
    Ok(clusters)
}
