//! 测地距离的波前传播
//!
//! 在 26 邻域上用倒角权重做逐轮松弛：每一轮只展开代数 (generation) 等于当前轮次的
//! 体素，被更新的邻居标记为下一代。同一轮内后访问的体素能看到本轮先前写入的距离，
//! 结果由区域索引的扫描顺序唯一确定。

use log::{debug, trace};

use crate::domain::DomainIndex;
use crate::geometry::{Geometry, NeighborTable};
use crate::seeds::SeedField;

/// 传播结果
#[derive(Debug, Clone)]
pub struct Propagation {
    /// 每个体素的距离 (物理单位)，0 表示未到达
    pub distance: Vec<f32>,
    /// 每个体素最后被更新的轮次，0 表示从未更新
    pub generation: Vec<u32>,
    /// 被展开体素距离的最大值
    pub reached_max_distance: f32,
    /// 至少展开了一个体素的轮次数
    pub sweeps: u32,
    /// 所有轮次中被展开的体素总数
    pub expanded: usize,
}

/// 从种子体素出发在区域内传播距离
///
/// `max_distance` 为 `None` 时不设上限。给定上限时，超过上限的候选距离不会被接受，
/// 且一旦已展开体素的最大距离达到上限即停止扫描。种子总是取半个体素的距离，
/// 上限小于半个体素时种子保留该值，其余体素不被赋值。
pub fn propagate(
    domain: &DomainIndex,
    seeds: &SeedField,
    geometry: &Geometry,
    table: &NeighborTable,
    max_distance: Option<f32>,
) -> Propagation {
    let nr_voxels = geometry.voxel_count();
    debug_assert_eq!(domain.voxel_count(), nr_voxels);

    let mut distance = vec![0.0f32; nr_voxels];
    let mut generation = vec![0u32; nr_voxels];

    let half_voxel = geometry.half_voxel();
    // 区域外的种子不参与传播，也不写入距离
    for i in seeds.indices().filter(|&i| domain.contains(i)) {
        generation[i] = 1;
        distance[i] = half_voxel;
    }

    let cutoff = max_distance.unwrap_or(f32::MAX);
    let mut reached_max_distance = 0.0f32;
    let mut current = 1u32;
    let mut sweeps = 0u32;
    let mut expanded = 0usize;

    while reached_max_distance < cutoff {
        let mut active_count = 0usize;

        for &i in domain.indices() {
            if generation[i] != current {
                continue;
            }
            active_count += 1;

            let coords = geometry.coordinates(i);
            let source = distance[i];
            for neighbor in table.iter() {
                let Some(j) = geometry.neighbor(coords, neighbor.offset) else {
                    continue;
                };
                if !domain.contains(j) {
                    continue;
                }
                let d = source + neighbor.weight;
                if d > cutoff {
                    continue;
                }
                if d < distance[j] || distance[j] == 0.0 {
                    distance[j] = d;
                    generation[j] = current + 1;
                }
            }

            reached_max_distance = reached_max_distance.max(source);
        }

        if active_count == 0 {
            break;
        }
        trace!("第 {current} 轮展开了 {active_count} 个体素");

        expanded += active_count;
        sweeps += 1;
        current += 1;
    }

    debug!(
        "传播结束: {sweeps} 轮, 共展开 {expanded} 个体素, 最大距离 {reached_max_distance}"
    );

    Propagation {
        distance,
        generation,
        reached_max_distance,
        sweeps,
        expanded,
    }
}
