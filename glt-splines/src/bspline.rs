//! Univariate B-spline routines.
//!
//! The span and basis evaluation follow Algorithms A2.1 and A2.3 in
//!
//! ```text
//! Piegl, Les, and Wayne Tiller. The NURBS Book. Springer, 1997.
//! ```

/// Open uniform knot vector on `[0, 1]` with `ncells` elements.
pub fn open_uniform_knots(ncells: usize, degree: usize) -> Vec<f64> {
    assert!(ncells > 0, "At least one element is required.");
    let mut knots = vec![0.0; degree];
    knots.extend((0..=ncells).map(|i| i as f64 / ncells as f64));
    knots.extend(std::iter::repeat(1.0).take(degree));
    knots
}

/// Number of basis functions defined by the knot vector.
pub fn num_basis(knots: &[f64], degree: usize) -> usize {
    knots.len() - degree - 1
}

/// Index `i` of the knot span with `knots[i] <= x < knots[i + 1]`.
///
/// Points at (or beyond) the right end of the domain are assigned to the last non-empty span.
pub fn find_span(knots: &[f64], degree: usize, x: f64) -> usize {
    let n = num_basis(knots, degree);
    if x >= knots[n] {
        return n - 1;
    }
    if x <= knots[degree] {
        return degree;
    }

    let (mut low, mut high) = (degree, n);
    let mut mid = (low + high) / 2;
    while x < knots[mid] || x >= knots[mid + 1] {
        if x < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Values and derivatives up to order `nderiv` of the `degree + 1` basis functions that are
/// non-zero on the given span, as `ders[k][j]` for derivative `k` of function `span - degree + j`.
pub fn basis_funs_all_ders(knots: &[f64], degree: usize, x: f64, span: usize, nderiv: usize) -> Vec<Vec<f64>> {
    let p = degree;
    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;

    for j in 1..=p {
        left[j] = x - knots[span + 1 - j];
        right[j] = knots[span + j] - x;
        let mut saved = 0.0;
        for r in 0..j {
            // Lower triangle holds the knot differences
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = ndu[r][j - 1] / ndu[j][r];
            // Upper triangle holds the basis functions
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }

    let n = nderiv.min(p);
    let mut ders = vec![vec![0.0; p + 1]; nderiv + 1];
    for j in 0..=p {
        ders[0][j] = ndu[j][p];
    }

    let mut a = vec![vec![0.0; p + 1]; 2];
    for r in 0..=p {
        let (mut s1, mut s2) = (0, 1);
        a[0][0] = 1.0;
        for k in 1..=n {
            let mut d = 0.0;
            let rk = r as isize - k as isize;
            let pk = p - k;
            if r >= k {
                a[s2][0] = a[s1][0] / ndu[pk + 1][rk as usize];
                d = a[s2][0] * ndu[rk as usize][pk];
            }
            let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
            let j2 = if (r as isize - 1) <= pk as isize { k - 1 } else { p - r };
            for j in j1..=j2 {
                let idx = (rk + j as isize) as usize;
                a[s2][j] = (a[s1][j] - a[s1][j - 1]) / ndu[pk + 1][idx];
                d += a[s2][j] * ndu[idx][pk];
            }
            if r <= pk {
                a[s2][k] = -a[s1][k - 1] / ndu[pk + 1][r];
                d += a[s2][k] * ndu[r][pk];
            }
            ders[k][r] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    let mut factor = p as f64;
    for k in 1..=n {
        for value in ders[k].iter_mut() {
            *value *= factor;
        }
        factor *= (p - k) as f64;
    }
    ders
}

/// Greville abscissae, the points at which the identity map is interpolated exactly.
pub fn greville_abscissae(knots: &[f64], degree: usize) -> Vec<f64> {
    (0..num_basis(knots, degree))
        .map(|i| {
            if degree == 0 {
                0.5 * (knots[i] + knots[i + 1])
            } else {
                knots[i + 1..=i + degree].iter().sum::<f64>() / degree as f64
            }
        })
        .collect()
}
