use crate::geometry::{Geometry, GeometryError};

/// 体素网格数据结构
/// 表示三维规则网格上的标量场数据
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    /// 网格维度与体素间距
    pub geometry: Geometry,
    /// 数据数组，按 C 语言顺序存储 (x变化最快，y其次，z最慢)
    /// 索引计算: index = k * nx * ny + j * nx + i
    pub data: Vec<f64>,
    /// 源文件的原始头部字节，写出结果时用作模板；合成数据时为空
    pub header: Vec<u8>,
    /// 源文件中的数据类型名称 (用于日志)
    pub datatype: &'static str,
}

impl VoxelGrid {
    /// 创建新的体素网格
    pub fn new(geometry: Geometry, data: Vec<f64>) -> Result<Self, GeometryError> {
        geometry.check_len(data.len())?;
        Ok(VoxelGrid {
            geometry,
            data,
            header: Vec::new(),
            datatype: "float64",
        })
    }

    /// 附带源文件头部信息
    pub fn with_header(mut self, header: Vec<u8>, datatype: &'static str) -> Self {
        self.header = header;
        self.datatype = datatype;
        self
    }

    /// 获取整个数据向量的引用
    pub fn get_data(&self) -> &[f64] {
        &self.data
    }

    /// 获取 shape
    pub fn get_shape(&self) -> [usize; 3] {
        self.geometry.shape()
    }

    /// 转换为 int32，小数部分向零截断
    pub fn as_i32(&self) -> Vec<i32> {
        self.data.iter().map(|&v| v as i32).collect()
    }

    /// 以相同几何与头部生成新的网格
    pub fn with_data(&self, data: Vec<f64>) -> Result<Self, GeometryError> {
        self.geometry.check_len(data.len())?;
        Ok(VoxelGrid {
            geometry: self.geometry,
            data,
            header: self.header.clone(),
            datatype: self.datatype,
        })
    }

    /// 数据的最小值与最大值，空网格返回 `None`
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.data.iter().fold(None, |range, &v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_data_length() {
        let geometry = Geometry::new([2, 2, 2], [1.0, 1.0, 1.0]).unwrap();
        assert!(VoxelGrid::new(geometry, vec![0.0; 7]).is_err());
        assert!(VoxelGrid::new(geometry, vec![0.0; 8]).is_ok());
    }

    #[test]
    fn integer_conversion_truncates_towards_zero() {
        let geometry = Geometry::new([4, 1, 1], [1.0, 1.0, 1.0]).unwrap();
        let grid = VoxelGrid::new(geometry, vec![1.9, -1.9, 0.4, 2.0]).unwrap();
        assert_eq!(grid.as_i32(), vec![1, -1, 0, 2]);
        assert_eq!(grid.value_range(), Some((-1.9, 2.0)));
    }
}
