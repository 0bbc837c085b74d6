/// 计算区域 (domain) 的体素索引子集
///
/// 距离传播的每一轮扫描只遍历该子集，它通常比整个网格小几个数量级。
#[derive(Debug, Clone, Default)]
pub struct DomainIndex {
    /// 掩膜值 > 0 的体素线性索引，按网格扫描顺序排列
    indices: Vec<usize>,
    /// 每个体素是否属于计算区域
    membership: Vec<bool>,
}

impl DomainIndex {
    /// 从掩膜中提取所有值 > 0 的体素
    pub fn from_mask(mask: &[i32]) -> Self {
        let membership: Vec<bool> = mask.iter().map(|&value| value > 0).collect();
        let indices = membership
            .iter()
            .enumerate()
            .filter_map(|(i, &inside)| inside.then_some(i))
            .collect();
        Self {
            indices,
            membership,
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.membership.get(index).copied().unwrap_or(false)
    }

    /// 区域内体素数量 (nr_voi)
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// 网格体素总数
    pub fn voxel_count(&self) -> usize {
        self.membership.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_positive_voxels_in_scan_order() {
        let domain = DomainIndex::from_mask(&[0, 3, -1, 1, 0, 2]);
        assert_eq!(domain.indices(), &[1, 3, 5]);
        assert_eq!(domain.len(), 3);
        assert_eq!(domain.voxel_count(), 6);
        assert!(domain.contains(3));
        assert!(!domain.contains(2));
        assert!(!domain.contains(100));
    }

    #[test]
    fn empty_mask_gives_empty_domain() {
        let domain = DomainIndex::from_mask(&[0; 8]);
        assert!(domain.is_empty());
        assert!(DomainIndex::from_mask(&[]).is_empty());
    }
}
