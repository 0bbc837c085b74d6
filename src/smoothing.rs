use log::debug;
use serde::Serialize;

use crate::domain::DomainIndex;
use crate::geometry::{Geometry, NeighborTable};

/// FWHM 与高斯标准差之间的换算系数 (2 * sqrt(2 * ln 2))
const FWHM_TO_SIGMA: f32 = 2.354_82;

/// 迭代平滑的参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SmoothingOptions {
    /// 迭代次数
    pub iterations: u32,
    /// 为 true 时区域外体素原样保留，否则置零
    pub include_unmasked: bool,
}

impl Default for SmoothingOptions {
    fn default() -> Self {
        Self {
            iterations: 3,
            include_unmasked: true,
        }
    }
}

fn gaussian(distance: f32, sigma: f32) -> f32 {
    (-0.5 * (distance / sigma).powi(2)).exp()
}

/// 在区域内做 26 邻域高斯加权平均的迭代平滑
///
/// 每次迭代都只读取上一次迭代的结果；区域外的邻居不参与平均。
/// 高斯核的 FWHM 取平均体素间距。
pub fn smooth(
    field: &[f32],
    domain: &DomainIndex,
    geometry: &Geometry,
    options: SmoothingOptions,
) -> Vec<f32> {
    debug_assert_eq!(field.len(), geometry.voxel_count());

    let sigma = geometry.mean_spacing() / FWHM_TO_SIGMA;
    let spacing = geometry.spacing();
    let table = NeighborTable::with_weights(|class| gaussian(class.distance(spacing), sigma));
    let center_weight = gaussian(0.0, sigma);

    let mut current: Vec<f32> = if options.include_unmasked {
        field.to_vec()
    } else {
        field
            .iter()
            .enumerate()
            .map(|(i, &v)| if domain.contains(i) { v } else { 0.0 })
            .collect()
    };
    let mut next = current.clone();

    for iteration in 0..options.iterations {
        for &i in domain.indices() {
            let coords = geometry.coordinates(i);
            let mut sum = current[i] * center_weight;
            let mut total_weight = center_weight;

            for neighbor in table.iter() {
                let Some(j) = geometry.neighbor(coords, neighbor.offset) else {
                    continue;
                };
                if domain.contains(j) {
                    sum += current[j] * neighbor.weight;
                    total_weight += neighbor.weight;
                }
            }
            next[i] = sum / total_weight;
        }
        std::mem::swap(&mut current, &mut next);
        debug!("平滑迭代 {} / {} 完成", iteration + 1, options.iterations);
    }

    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn line(len: usize) -> Geometry {
        Geometry::new([len, 1, 1], [1.0, 1.0, 1.0]).unwrap()
    }

    #[test]
    fn constant_field_is_unchanged() {
        let geometry = Geometry::new([3, 3, 3], [1.0, 2.0, 1.0]).unwrap();
        let domain = DomainIndex::from_mask(&[1; 27]);
        let smoothed = smooth(&[4.0; 27], &domain, &geometry, SmoothingOptions::default());
        for v in smoothed {
            assert_abs_diff_eq!(v, 4.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn smoothing_pulls_values_towards_neighbours() {
        let geometry = line(3);
        let domain = DomainIndex::from_mask(&[1; 3]);
        let field = [0.0, 3.0, 0.0];
        let smoothed = smooth(&field, &domain, &geometry, SmoothingOptions::default());
        assert!(smoothed[1] < 3.0);
        assert!(smoothed[0] > 0.0);
        assert_abs_diff_eq!(smoothed[0], smoothed[2], epsilon = 1e-6);
    }

    #[test]
    fn voxels_outside_domain_are_neither_changed_nor_used() {
        let geometry = line(4);
        let domain = DomainIndex::from_mask(&[1, 1, 0, 0]);
        let field = [1.0, 1.0, 100.0, 7.0];

        let kept = smooth(&field, &domain, &geometry, SmoothingOptions::default());
        assert_abs_diff_eq!(kept[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(kept[1], 1.0, epsilon = 1e-6);
        assert_eq!(kept[2], 100.0);
        assert_eq!(kept[3], 7.0);

        let options = SmoothingOptions {
            include_unmasked: false,
            ..SmoothingOptions::default()
        };
        let zeroed = smooth(&field, &domain, &geometry, options);
        assert_eq!(&zeroed[2..], &[0.0, 0.0]);
    }

    #[test]
    fn zero_iterations_returns_input() {
        let geometry = line(3);
        let domain = DomainIndex::from_mask(&[1; 3]);
        let options = SmoothingOptions {
            iterations: 0,
            include_unmasked: true,
        };
        assert_eq!(smooth(&[1.0, 2.0, 3.0], &domain, &geometry, options), vec![1.0, 2.0, 3.0]);
    }
}
