use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use crate::config::GeodistanceConfig;
use crate::domain::DomainIndex;
use crate::geometry::NeighborTable;
use crate::performance::PerformanceLog;
use crate::propagation::propagate;
use crate::seeds::{SeedField, SeedMode};
use crate::smoothing::smooth;
use crate::utils::parser::VolumeError;
use crate::utils::parser_registry::ParserRegistry;
use crate::utils::voxel_grid::VoxelGrid;

/// 距离计算的统计信息
#[derive(Debug, Clone, Serialize)]
pub struct DistanceStats {
    /// 区域内体素数量
    pub domain_voxels: usize,
    /// 种子体素数量
    pub seed_voxels: usize,
    /// 有效传播轮次
    pub sweeps: u32,
    /// 达到的最大距离
    pub reached_max_distance: f32,
    /// 是否执行了平滑
    pub smoothed: bool,
}

/// 一次完整运行的报告
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub config: GeodistanceConfig,
    pub stats: DistanceStats,
    pub output: PathBuf,
    pub timings: PerformanceLog,
}

/// 由已加载的区域与初始体积计算 (可选平滑后的) 距离场
///
/// 几何信息取自初始体积，两者的网格维度必须一致 (由调用方检查)。
pub fn compute_distances(
    domain_grid: &VoxelGrid,
    init_grid: &VoxelGrid,
    config: &GeodistanceConfig,
    perf: &mut PerformanceLog,
) -> (Vec<f32>, DistanceStats) {
    let geometry = init_grid.geometry;

    // ==================== 步骤 1: 提取区域体素子集 ====================
    let domain = perf.measure(
        "domain_index",
        || DomainIndex::from_mask(&domain_grid.as_i32()),
        |d| format!("{} 个区域体素", d.len()),
    );
    info!("  区域体素数 = {}", domain.len());

    // ==================== 步骤 2: 标记种子体素 ====================
    let seeds = perf.measure(
        "seeds",
        || SeedField::label(&init_grid.as_i32(), config.seed_mode),
        |s| format!("{} 个种子体素", s.count()),
    );
    match config.seed_mode {
        SeedMode::NonZero => info!("  初始体素数 = {}", seeds.count()),
        SeedMode::Label(label) => {
            info!("  初始体素数 (自定义标签 {label}) = {}", seeds.count());
        }
    }
    if let Some(max_distance) = config.max_distance {
        info!("  已选择最大距离模式, 最大距离 = {max_distance}");
        if max_distance < geometry.half_voxel() {
            warn!(
                "  最大距离 {max_distance} 小于半个体素 {}, 只有种子体素会被赋值",
                geometry.half_voxel()
            );
        }
    }

    // ==================== 步骤 3: 波前传播 ====================
    info!("  正在计算测地距离...");
    let table = NeighborTable::chamfer(&geometry);
    let propagation = perf.measure(
        "propagate",
        || propagate(&domain, &seeds, &geometry, &table, config.max_distance),
        |p| format!("{} 轮, 最大距离 {}", p.sweeps, p.reached_max_distance),
    );

    // ==================== 步骤 4: 平滑 ====================
    if config.max_distance.is_some() {
        info!("  最大距离模式下不对距离场做平滑");
    }
    let smoothed = config.smoothing_enabled();
    let distance = if smoothed {
        info!("  正在对距离场做轻度平滑...");
        perf.measure(
            "smooth",
            || smooth(&propagation.distance, &domain, &geometry, config.smoothing),
            |_| format!("{} 次迭代", config.smoothing.iterations),
        )
    } else {
        propagation.distance
    };

    let stats = DistanceStats {
        domain_voxels: domain.len(),
        seed_voxels: seeds.count(),
        sweeps: propagation.sweeps,
        reached_max_distance: propagation.reached_max_distance,
        smoothed,
    };
    (distance, stats)
}

fn load(registry: &ParserRegistry, path: &Path) -> Result<VoxelGrid, VolumeError> {
    let parser = registry.require_parser_for_file(path)?;
    let grid = parser.parse_from_file(path)?;

    let (lo, hi) = grid.value_range().unwrap_or((0.0, 0.0));
    info!("  文件: {}", path.display());
    info!(
        "    维度: {:?}, 体素间距: {:?}, 类型: {}, 取值范围: [{lo}, {hi}]",
        grid.get_shape(),
        grid.geometry.spacing(),
        grid.datatype
    );
    Ok(grid)
}

fn write_report(summary: &RunSummary, path: &Path) -> Result<(), VolumeError> {
    let file = File::create(path).map_err(|e| VolumeError::io(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .map_err(|e| VolumeError::io(path, e.into()))
}

/// 读取输入、计算距离并写出结果
pub fn run(config: &GeodistanceConfig, registry: &ParserRegistry) -> Result<RunSummary, VolumeError> {
    let mut perf = PerformanceLog::new();

    info!("geodistance: 测量从种子体素出发的测地距离");
    let init_grid = perf.measure("load_init", || load(registry, &config.init), |_| String::new())?;
    let domain_grid = perf.measure("load_domain", || load(registry, &config.domain), |_| String::new())?;

    if init_grid.get_shape() != domain_grid.get_shape() {
        return Err(VolumeError::ShapeMismatch {
            first: config.init.display().to_string(),
            first_shape: init_grid.get_shape(),
            second: config.domain.display().to_string(),
            second_shape: domain_grid.get_shape(),
        });
    }

    let (distance, stats) = compute_distances(&domain_grid, &init_grid, config, &mut perf);

    let output = config.output_path();
    let output_grid = init_grid
        .with_data(distance.into_iter().map(f64::from).collect())
        .map_err(|source| VolumeError::Geometry {
            path: output.display().to_string(),
            source,
        })?;
    let parser = registry.require_parser_for_file(&output)?;
    perf.measure(
        "write",
        || parser.write_to_file(&output_grid, &output),
        |_| output.display().to_string(),
    )?;
    info!("  已写出 {}", output.display());

    let summary = RunSummary {
        config: config.clone(),
        stats,
        output,
        timings: perf,
    };
    if let Some(report) = &config.report {
        write_report(&summary, report)?;
        info!("  运行报告: {}", report.display());
    }

    info!("完成。总耗时 {:.2}ms", summary.timings.total_ms());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;
    use crate::parsers::NiftiParser;
    use crate::utils::parser::VolumeParser;

    fn grid(shape: [usize; 3], data: Vec<f64>) -> VoxelGrid {
        VoxelGrid::new(Geometry::new(shape, [1.0, 1.0, 1.0]).unwrap(), data).unwrap()
    }

    #[test]
    fn cutoff_skips_smoothing_even_when_requested() {
        let n = 10;
        let len = n * n * n;
        let domain = grid([n, n, n], vec![1.0; len]);
        let mut init = vec![0.0; len];
        init[0] = 1.0;
        let init = grid([n, n, n], init);

        let mut config = GeodistanceConfig::new("d.nii".into(), "i.nii".into());
        config.max_distance = Some(3.0);
        let (distance, stats) = compute_distances(&domain, &init, &config, &mut PerformanceLog::new());

        assert!(!stats.smoothed);
        assert!(distance.iter().all(|&d| d <= 3.0));
        assert!(stats.reached_max_distance <= 3.0);
    }

    #[test]
    fn label_mode_on_shared_label_volume() {
        // 同一个标签体积同时作为区域与初始体积
        let labels = grid([5, 1, 1], vec![2.0, 1.0, 1.0, 1.0, 1.0]);
        let mut config = GeodistanceConfig::new("l.nii".into(), "l.nii".into());
        config.seed_mode = SeedMode::Label(2);
        config.smooth = false;
        let (distance, stats) = compute_distances(&labels, &labels, &config, &mut PerformanceLog::new());

        assert_eq!(stats.seed_voxels, 1);
        assert_eq!(stats.domain_voxels, 5);
        assert_eq!(distance, vec![0.5, 1.5, 2.5, 3.5, 4.5]);
    }

    #[test]
    fn run_writes_output_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let parser = NiftiParser::new();

        let domain_path = dir.path().join("domain.nii");
        let init_path = dir.path().join("init.nii.gz");
        let report_path = dir.path().join("report.json");
        parser.write_to_file(&grid([4, 4, 1], vec![1.0; 16]), &domain_path).unwrap();
        let mut init = vec![0.0; 16];
        init[5] = 3.0;
        parser.write_to_file(&grid([4, 4, 1], init), &init_path).unwrap();

        let mut config = GeodistanceConfig::new(domain_path, init_path);
        config.report = Some(report_path.clone());
        let summary = run(&config, &ParserRegistry::new()).unwrap();

        assert_eq!(summary.output, dir.path().join("init_geodistance.nii.gz"));
        assert!(summary.stats.smoothed);
        assert_eq!(summary.stats.seed_voxels, 1);

        let output = parser.parse_from_file(&summary.output).unwrap();
        assert_eq!(output.get_shape(), [4, 4, 1]);
        assert!(output.get_data().iter().all(|&d| d > 0.0));

        let report: serde_json::Value =
            serde_json::from_reader(File::open(&report_path).unwrap()).unwrap();
        assert_eq!(report["stats"]["domain_voxels"], 16);
        assert!(report["timings"]["records"].as_array().unwrap().len() >= 5);
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let parser = NiftiParser::new();
        let domain_path = dir.path().join("domain.nii");
        let init_path = dir.path().join("init.nii");
        parser.write_to_file(&grid([2, 2, 1], vec![1.0; 4]), &domain_path).unwrap();
        parser.write_to_file(&grid([4, 1, 1], vec![1.0; 4]), &init_path).unwrap();

        let config = GeodistanceConfig::new(domain_path, init_path);
        assert!(matches!(
            run(&config, &ParserRegistry::new()),
            Err(VolumeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeodistanceConfig::new(dir.path().join("nope.nii"), dir.path().join("init.nii"));
        assert!(matches!(
            run(&config, &ParserRegistry::new()),
            Err(VolumeError::Io { .. })
        ));
    }
}
