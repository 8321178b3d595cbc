//! Spearman rank correlation + permutation p-value (§4.6), grounded on
//! `original_source/src/correlation.c`.

/// Pearson correlation via Welford's online algorithm (numerically stable
/// for the rank vectors and the raw-value vectors alike).
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    assert_eq!(xs.len(), ys.len());
    let n = xs.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let (mut mean_x, mut mean_y) = (0.0, 0.0);
    let (mut m2_x, mut m2_y, mut c) = (0.0, 0.0, 0.0);
    for (i, (&x, &y)) in xs.iter().zip(ys.iter()).enumerate() {
        let i = i as f64 + 1.0;
        let dx = x - mean_x;
        mean_x += dx / i;
        m2_x += dx * (x - mean_x);
        let dy = y - mean_y;
        mean_y += dy / i;
        m2_y += dy * (y - mean_y);
        c += dx * (y - mean_y);
    }
    let denom = (m2_x * m2_y).sqrt();
    if denom == 0.0 {
        0.0
    } else {
        c / denom
    }
}

/// Ranks of `xs`, averaging ranks across ties (1-based).
pub fn compute_rank(xs: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let mut idx: Vec<usize> = (0..n).collect();
    idx.sort_by(|&a, &b| xs[a].partial_cmp(&xs[b]).unwrap());

    let mut ranks = vec![0.0; n];
    let mut i = 0usize;
    while i < n {
        let mut j = i + 1;
        while j < n && xs[idx[j]] == xs[idx[i]] {
            j += 1;
        }
        let avg_rank = ((i + 1)..=j).map(|r| r as f64).sum::<f64>() / (j - i) as f64;
        for &k in &idx[i..j] {
            ranks[k] = avg_rank;
        }
        i = j;
    }
    ranks
}

/// Spearman's rho: Pearson correlation of the two rank vectors.
pub fn spearman(xs: &[f64], ys: &[f64]) -> f64 {
    pearson(&compute_rank(xs), &compute_rank(ys))
}

/// Permutation p-value default from the reference (`PERMUTATION_SIZE`).
pub const PERMUTATION_SIZE: usize = 1001;

/// Two-sided permutation p-value for Spearman's rho: shuffle `ys` via
/// Fisher-Yates `permutations` times, count how often `|rho'| < |rho|`, and
/// report `(PERMUTATION_SIZE - count) / PERMUTATION_SIZE`.
pub fn spearman_permutation_test(xs: &[f64], ys: &[f64], rho: f64, permutations: usize) -> f64 {
    let y_ranks = compute_rank(ys);
    let x_ranks = compute_rank(xs);
    let mut shuffled = y_ranks.clone();
    let mut count_smaller = 0usize;

    for _ in 0..permutations {
        fisher_yates_shuffle(&mut shuffled);
        let rho2 = pearson(&x_ranks, &shuffled);
        if rho2.abs() < rho.abs() {
            count_smaller += 1;
        }
    }

    (permutations - count_smaller) as f64 / permutations as f64
}

fn fisher_yates_shuffle(xs: &mut [f64]) {
    for i in (1..xs.len()).rev() {
        let j = fastrand::usize(0..=i);
        xs.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn perfect_positive_correlation() {
        let xs = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        assert!(approx_eq!(f64, pearson(&xs, &ys), 1.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, spearman(&xs, &ys), 1.0, epsilon = 1e-9));
    }

    #[test]
    fn perfect_negative_correlation() {
        let xs = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = vec![10.0, 8.0, 6.0, 4.0, 2.0];
        assert!(approx_eq!(f64, spearman(&xs, &ys), -1.0, epsilon = 1e-9));
    }

    #[test]
    fn ties_get_averaged_ranks() {
        let xs = vec![1.0, 2.0, 2.0, 4.0];
        let ranks = compute_rank(&xs);
        assert_eq!(ranks, vec![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn permutation_pvalue_is_one_for_no_correlation_with_few_points() {
        // With only 2 points every permutation is perfectly (anti)correlated,
        // so nothing should ever be smaller in magnitude than |rho|=1.
        let xs = vec![1.0, 2.0];
        let ys = vec![1.0, 2.0];
        let rho = spearman(&xs, &ys);
        let p = spearman_permutation_test(&xs, &ys, rho, 101);
        assert!((0.0..=1.0).contains(&p));
    }
}
