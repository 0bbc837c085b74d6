use serde::Serialize;

/// 种子体素的判定方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SeedMode {
    /// 初始体积中所有非零体素均为种子
    NonZero,
    /// 仅取值等于给定标签的体素为种子
    Label(i32),
}

impl SeedMode {
    #[inline]
    pub fn is_seed(self, value: i32) -> bool {
        match self {
            Self::NonZero => value != 0,
            Self::Label(label) => value == label,
        }
    }
}

/// 每个体素是否为种子
#[derive(Debug, Clone)]
pub struct SeedField {
    seeds: Vec<bool>,
    count: usize,
}

impl SeedField {
    /// 将原始初始体积转换为种子标记
    pub fn label(raw: &[i32], mode: SeedMode) -> Self {
        let seeds: Vec<bool> = raw.iter().map(|&value| mode.is_seed(value)).collect();
        let count = seeds.iter().filter(|&&seed| seed).count();
        Self { seeds, count }
    }

    /// 直接由布尔标记构建
    pub fn from_flags(seeds: Vec<bool>) -> Self {
        let count = seeds.iter().filter(|&&seed| seed).count();
        Self { seeds, count }
    }

    #[inline]
    pub fn is_seed(&self, index: usize) -> bool {
        self.seeds.get(index).copied().unwrap_or(false)
    }

    /// 种子体素数量
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    /// 所有种子的线性索引
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.seeds
            .iter()
            .enumerate()
            .filter_map(|(i, &seed)| seed.then_some(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_zero_mode_takes_every_labelled_voxel() {
        let seeds = SeedField::label(&[0, 1, 2, -3, 0], SeedMode::NonZero);
        assert_eq!(seeds.count(), 3);
        assert_eq!(seeds.indices().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn label_mode_matches_exact_value_only() {
        let raw = [1, 2, 2, 1, 0];
        let seeds = SeedField::label(&raw, SeedMode::Label(2));
        assert_eq!(seeds.count(), 2);
        assert!(!seeds.is_seed(0));
        assert!(seeds.is_seed(1));
        assert!(seeds.is_seed(2));
        assert!(!seeds.is_seed(3));

        let seeds = SeedField::label(&raw, SeedMode::Label(0));
        assert_eq!(seeds.indices().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn empty_volume_has_no_seeds() {
        let seeds = SeedField::label(&[0; 10], SeedMode::NonZero);
        assert_eq!(seeds.count(), 0);
        assert!(!seeds.is_empty());
    }
}
