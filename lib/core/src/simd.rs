// SIMD kernels for the dense reduced vectors.
// AVX2/FMA on x86_64, NEON on aarch64, two-accumulator scalar loop elsewhere.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

// Below this length the feature probe costs more than it saves.
const MIN_DIM_SIZE_SIMD: usize = 16;

/// Dot product of two equal-length slices. Mismatched lengths yield 0.0.
#[inline]
pub fn dot_product_simd(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    #[cfg(target_arch = "x86_64")]
    {
        if a.len() >= MIN_DIM_SIZE_SIMD
            && is_x86_feature_detected!("avx2")
            && is_x86_feature_detected!("fma")
        {
            return unsafe { dot_product_avx2(a, b) };
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        if a.len() >= MIN_DIM_SIZE_SIMD && std::arch::is_aarch64_feature_detected!("neon") {
            return unsafe { dot_product_neon(a, b) };
        }
    }

    dot_product_scalar(a, b)
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2", enable = "fma")]
#[inline]
unsafe fn dot_product_avx2(a: &[f32], b: &[f32]) -> f32 {
    let dim = a.len();
    let mut i = 0;
    let mut acc = _mm256_setzero_ps();

    while i + 8 <= dim {
        let va = _mm256_loadu_ps(a.as_ptr().add(i));
        let vb = _mm256_loadu_ps(b.as_ptr().add(i));
        acc = _mm256_fmadd_ps(va, vb, acc);
        i += 8;
    }

    let high = _mm256_extractf128_ps(acc, 1);
    let low = _mm256_castps256_ps128(acc);
    let mut sum = _mm_add_ps(high, low);
    sum = _mm_hadd_ps(sum, sum);
    sum = _mm_hadd_ps(sum, sum);
    let mut dot = _mm_cvtss_f32(sum);

    while i < dim {
        dot += a[i] * b[i];
        i += 1;
    }
    dot
}

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
#[inline]
unsafe fn dot_product_neon(a: &[f32], b: &[f32]) -> f32 {
    let dim = a.len();
    let mut i = 0;
    let mut acc = vdupq_n_f32(0.0);

    while i + 4 <= dim {
        let va = vld1q_f32(a.as_ptr().add(i));
        let vb = vld1q_f32(b.as_ptr().add(i));
        acc = vfmaq_f32(acc, va, vb);
        i += 4;
    }

    let mut dot = vaddvq_f32(acc);
    while i < dim {
        dot += a[i] * b[i];
        i += 1;
    }
    dot
}

#[inline]
fn dot_product_scalar(a: &[f32], b: &[f32]) -> f32 {
    let mut even = 0.0f32;
    let mut odd = 0.0f32;

    let pairs = a.chunks_exact(2).zip(b.chunks_exact(2));
    for (x, y) in pairs {
        even += x[0] * y[0];
        odd += x[1] * y[1];
    }
    if a.len() % 2 == 1 {
        let last = a.len() - 1;
        even += a[last] * b[last];
    }
    even + odd
}

/// Euclidean norm.
#[inline]
pub fn norm_simd(v: &[f32]) -> f32 {
    dot_product_simd(v, v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_product_matches_scalar() {
        let a: Vec<f32> = (0..67).map(|i| (i as f32) * 0.25 - 3.0).collect();
        let b: Vec<f32> = (0..67).map(|i| 1.0 - (i as f32) * 0.1).collect();
        let expected: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        let got = dot_product_simd(&a, &b);
        assert!((got - expected).abs() < 1e-2, "{} vs {}", got, expected);
    }

    #[test]
    fn test_mismatched_lengths() {
        assert_eq!(dot_product_simd(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_norm() {
        assert!((norm_simd(&[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }
}
