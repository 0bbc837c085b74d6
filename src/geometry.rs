use serde::Serialize;
use thiserror::Error;

/// 网格几何错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// 体素间距必须为有限正数
    #[error("无效的体素间距 {spacing:?}: 每个轴的间距必须为有限正数")]
    InvalidSpacing { spacing: [f32; 3] },

    /// 数据长度与网格维度不匹配
    #[error("数据量不匹配: shape {shape:?} 需要 {expected} 个元素，但提供了 {provided} 个")]
    DataLengthMismatch {
        shape: [usize; 3],
        expected: usize,
        provided: usize,
    },
}

/// 三维规则网格的几何信息
///
/// 线性索引按 C 语言顺序 (x 变化最快，y 其次，z 最慢):
/// `index = z * nx * ny + y * nx + x`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Geometry {
    /// 网格维度 [nx, ny, nz]
    shape: [usize; 3],
    /// 物理体素间距 [dx, dy, dz]
    spacing: [f32; 3],
}

impl Geometry {
    /// 创建网格几何。维度为 0 的网格是合法的退化输入 (不含任何体素)。
    pub fn new(shape: [usize; 3], spacing: [f32; 3]) -> Result<Self, GeometryError> {
        if spacing.iter().any(|&d| !d.is_finite() || d <= 0.0) {
            return Err(GeometryError::InvalidSpacing { spacing });
        }
        Ok(Self { shape, spacing })
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn spacing(&self) -> [f32; 3] {
        self.spacing
    }

    /// 体素总数
    pub fn voxel_count(&self) -> usize {
        self.shape[0] * self.shape[1] * self.shape[2]
    }

    /// 检查数据长度是否与网格匹配
    pub fn check_len(&self, len: usize) -> Result<(), GeometryError> {
        let expected = self.voxel_count();
        if len != expected {
            return Err(GeometryError::DataLengthMismatch {
                shape: self.shape,
                expected,
                provided: len,
            });
        }
        Ok(())
    }

    /// 三维坐标 -> 线性索引
    #[inline]
    pub fn linear_index(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < self.shape[0] && y < self.shape[1] && z < self.shape[2]);
        (z * self.shape[1] + y) * self.shape[0] + x
    }

    /// 线性索引 -> 三维坐标
    #[inline]
    pub fn coordinates(&self, index: usize) -> [usize; 3] {
        debug_assert!(index < self.voxel_count());
        let [nx, ny, _] = self.shape;
        let x = index % nx;
        let y = (index / nx) % ny;
        let z = index / (nx * ny);
        [x, y, z]
    }

    /// 从种子体素中心到其自身边界的近似距离 (平均间距的一半)
    pub fn half_voxel(&self) -> f32 {
        let [dx, dy, dz] = self.spacing;
        ((dx + dy + dz) / 3.0) / 2.0
    }

    /// 平均体素间距
    pub fn mean_spacing(&self) -> f32 {
        let [dx, dy, dz] = self.spacing;
        (dx + dy + dz) / 3.0
    }

    /// 在 `index` 处沿 `offset` 方向的相邻体素，越界时返回 `None`。
    ///
    /// 每个非零分量所在的轴都单独检查边界，网格边界不做环绕。
    #[inline]
    pub fn neighbor(&self, coords: [usize; 3], offset: [i8; 3]) -> Option<usize> {
        let mut target = [0usize; 3];
        for axis in 0..3 {
            target[axis] = match offset[axis] {
                0 => coords[axis],
                -1 => coords[axis].checked_sub(1)?,
                _ => {
                    let next = coords[axis] + 1;
                    if next >= self.shape[axis] {
                        return None;
                    }
                    next
                }
            };
        }
        Some(self.linear_index(target[0], target[1], target[2]))
    }
}

/// 邻居类别，按偏移中非零分量所在的轴区分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborClass {
    FaceX,
    FaceY,
    FaceZ,
    EdgeXY,
    EdgeXZ,
    EdgeYZ,
    Corner,
}

impl NeighborClass {
    fn of(offset: [i8; 3]) -> Self {
        match (offset[0] != 0, offset[1] != 0, offset[2] != 0) {
            (true, false, false) => Self::FaceX,
            (false, true, false) => Self::FaceY,
            (false, false, true) => Self::FaceZ,
            (true, true, false) => Self::EdgeXY,
            (true, false, true) => Self::EdgeXZ,
            (false, true, true) => Self::EdgeYZ,
            _ => Self::Corner,
        }
    }

    /// 该类别邻居与中心体素之间的物理距离
    pub fn distance(self, spacing: [f32; 3]) -> f32 {
        let [dx, dy, dz] = spacing;
        match self {
            Self::FaceX => dx,
            Self::FaceY => dy,
            Self::FaceZ => dz,
            Self::EdgeXY => (dx * dx + dy * dy).sqrt(),
            Self::EdgeXZ => (dx * dx + dz * dz).sqrt(),
            Self::EdgeYZ => (dy * dy + dz * dz).sqrt(),
            Self::Corner => (dx * dx + dy * dy + dz * dz).sqrt(),
        }
    }
}

/// 26 邻域中的单个邻居
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub offset: [i8; 3],
    pub class: NeighborClass,
    pub weight: f32,
}

/// 26 邻域偏移表及其倒角权重，由网格几何一次性导出
#[derive(Debug, Clone)]
pub struct NeighborTable {
    neighbors: Vec<Neighbor>,
}

impl NeighborTable {
    /// 按给定函数为每个邻居类别计算权重
    pub fn with_weights(weight: impl Fn(NeighborClass) -> f32) -> Self {
        let mut neighbors = Vec::with_capacity(26);
        for dz in -1i8..=1 {
            for dy in -1i8..=1 {
                for dx in -1i8..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    let offset = [dx, dy, dz];
                    let class = NeighborClass::of(offset);
                    neighbors.push(Neighbor {
                        offset,
                        class,
                        weight: weight(class),
                    });
                }
            }
        }
        Self { neighbors }
    }

    /// 倒角距离权重: 面邻居为轴向间距，棱邻居为两轴斜边，角邻居为三维斜边
    pub fn chamfer(geometry: &Geometry) -> Self {
        let spacing = geometry.spacing();
        Self::with_weights(|class| class.distance(spacing))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.iter()
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rejects_non_positive_spacing() {
        assert!(Geometry::new([2, 2, 2], [1.0, 0.0, 1.0]).is_err());
        assert!(Geometry::new([2, 2, 2], [1.0, 1.0, -2.0]).is_err());
        assert!(Geometry::new([2, 2, 2], [f32::NAN, 1.0, 1.0]).is_err());
        assert!(Geometry::new([0, 0, 0], [1.0, 1.0, 1.0]).is_ok());
    }

    #[test]
    fn linear_index_and_coordinates_agree() {
        let geometry = Geometry::new([4, 3, 2], [1.0, 1.0, 1.0]).unwrap();
        for index in 0..geometry.voxel_count() {
            let [x, y, z] = geometry.coordinates(index);
            assert_eq!(geometry.linear_index(x, y, z), index);
        }
        assert_eq!(geometry.linear_index(1, 2, 1), 1 + 2 * 4 + 12);
    }

    #[test]
    fn half_voxel_uses_mean_spacing() {
        let geometry = Geometry::new([1, 1, 1], [2.0, 1.0, 1.0]).unwrap();
        assert_abs_diff_eq!(geometry.half_voxel(), 2.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn neighbor_table_partitions_into_weight_classes() {
        let geometry = Geometry::new([3, 3, 3], [1.0, 2.0, 3.0]).unwrap();
        let table = NeighborTable::chamfer(&geometry);
        assert_eq!(table.len(), 26);

        let count = |pred: fn(&Neighbor) -> bool| table.iter().filter(|n| pred(n)).count();
        assert_eq!(
            count(|n| n.offset.iter().filter(|&&c| c != 0).count() == 1),
            6
        );
        assert_eq!(
            count(|n| n.offset.iter().filter(|&&c| c != 0).count() == 2),
            12
        );
        assert_eq!(count(|n| n.class == NeighborClass::Corner), 8);

        for neighbor in table.iter() {
            let expected = neighbor
                .offset
                .iter()
                .zip(geometry.spacing())
                .map(|(&c, d)| f32::from(c.abs()) * d * d)
                .sum::<f32>()
                .sqrt();
            assert_abs_diff_eq!(neighbor.weight, expected, epsilon = 1e-6);
        }
    }

    #[test]
    fn neighbor_respects_every_perturbed_axis() {
        let geometry = Geometry::new([2, 2, 2], [1.0, 1.0, 1.0]).unwrap();
        assert_eq!(geometry.neighbor([0, 0, 0], [1, 1, 1]), Some(7));
        assert_eq!(geometry.neighbor([0, 0, 0], [-1, 0, 0]), None);
        assert_eq!(geometry.neighbor([1, 0, 0], [1, 1, 0]), None);
        assert_eq!(geometry.neighbor([1, 1, 1], [-1, -1, -1]), Some(0));
        assert_eq!(geometry.neighbor([1, 1, 0], [0, 0, -1]), None);
    }
}
