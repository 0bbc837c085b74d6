use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::debug;

use crate::geometry::Geometry;
use crate::utils::parser::{VolumeError, VolumeParser};
use crate::utils::voxel_grid::VoxelGrid;

const FORMAT: &str = "NIfTI-1";
/// NIfTI-1 头部长度
const HEADER_SIZE: usize = 348;
/// 头部 + 4 字节扩展标记之后的数据起点
const DATA_OFFSET: usize = 352;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

// 头部字段偏移
const OFFSET_DIM: usize = 40;
const OFFSET_DATATYPE: usize = 70;
const OFFSET_BITPIX: usize = 72;
const OFFSET_PIXDIM: usize = 76;
const OFFSET_VOX_OFFSET: usize = 108;
const OFFSET_SCL_SLOPE: usize = 112;
const OFFSET_SCL_INTER: usize = 116;
const OFFSET_XYZT_UNITS: usize = 123;
const OFFSET_CAL_MAX: usize = 124;
const OFFSET_CAL_MIN: usize = 128;
const OFFSET_GLMAX: usize = 140;
const OFFSET_GLMIN: usize = 144;
const OFFSET_MAGIC: usize = 344;

const DT_FLOAT32: i16 = 16;
/// NIFTI_UNITS_MM
const UNITS_MM: u8 = 2;

/// 体素数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Datatype {
    U8,
    I8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl Datatype {
    fn from_code(code: i16) -> Option<Self> {
        Some(match code {
            2 => Self::U8,
            4 => Self::I16,
            8 => Self::I32,
            16 => Self::F32,
            64 => Self::F64,
            256 => Self::I8,
            512 => Self::U16,
            768 => Self::U32,
            _ => return None,
        })
    }

    fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::U8 => "uint8",
            Self::I8 => "int8",
            Self::I16 => "int16",
            Self::U16 => "uint16",
            Self::I32 => "int32",
            Self::U32 => "uint32",
            Self::F32 => "float32",
            Self::F64 => "float64",
        }
    }

    fn read<B: ByteOrder>(self, buf: &[u8]) -> f64 {
        match self {
            Self::U8 => f64::from(buf[0]),
            Self::I8 => f64::from(buf[0] as i8),
            Self::I16 => f64::from(B::read_i16(buf)),
            Self::U16 => f64::from(B::read_u16(buf)),
            Self::I32 => f64::from(B::read_i32(buf)),
            Self::U32 => f64::from(B::read_u32(buf)),
            Self::F32 => f64::from(B::read_f32(buf)),
            Self::F64 => B::read_f64(buf),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    /// 根据 sizeof_hdr 字段判断字节序
    fn detect(header: &[u8]) -> Option<Self> {
        if LittleEndian::read_i32(&header[0..4]) == HEADER_SIZE as i32 {
            Some(Self::Little)
        } else if BigEndian::read_i32(&header[0..4]) == HEADER_SIZE as i32 {
            Some(Self::Big)
        } else {
            None
        }
    }
}

/// 解析后的头部信息
#[derive(Debug, Clone)]
struct Header {
    shape: [usize; 3],
    spacing: [f32; 3],
    datatype: Datatype,
    vox_offset: usize,
    scl_slope: f32,
    scl_inter: f32,
}

fn invalid(path: &Path, message: impl Into<String>) -> VolumeError {
    VolumeError::InvalidHeader {
        path: path.display().to_string(),
        format: FORMAT,
        message: message.into(),
    }
}

fn parse_header<B: ByteOrder>(bytes: &[u8], path: &Path) -> Result<Header, VolumeError> {
    if &bytes[OFFSET_MAGIC..OFFSET_MAGIC + 3] != b"n+1" {
        return Err(invalid(path, "缺少单文件格式标识 'n+1'"));
    }

    let dim = |k: usize| B::read_i16(&bytes[OFFSET_DIM + 2 * k..]);
    let ndim = dim(0);
    if !(1..=7).contains(&ndim) {
        return Err(invalid(path, format!("dim[0] = {ndim} 超出范围")));
    }
    let mut shape = [1usize; 3];
    for (axis, extent) in shape.iter_mut().enumerate() {
        let k = axis + 1;
        if k as i16 <= ndim {
            let value = dim(k);
            *extent = usize::try_from(value)
                .map_err(|_| invalid(path, format!("dim[{k}] = {value} 为负数")))?;
        }
    }

    // 与常见读取实现一致: 非有限或为 0 的间距视为 1
    let mut spacing = [1.0f32; 3];
    for (axis, value) in spacing.iter_mut().enumerate() {
        let raw = B::read_f32(&bytes[OFFSET_PIXDIM + 4 * (axis + 1)..]);
        if raw.is_finite() && raw != 0.0 {
            *value = raw.abs();
        }
    }

    let code = B::read_i16(&bytes[OFFSET_DATATYPE..]);
    let datatype = Datatype::from_code(code).ok_or_else(|| VolumeError::UnsupportedDatatype {
        path: path.display().to_string(),
        code,
    })?;

    let vox_offset = B::read_f32(&bytes[OFFSET_VOX_OFFSET..]);
    let vox_offset = if vox_offset.is_finite() && vox_offset >= DATA_OFFSET as f32 {
        vox_offset as usize
    } else {
        DATA_OFFSET
    };

    Ok(Header {
        shape,
        spacing,
        datatype,
        vox_offset,
        scl_slope: B::read_f32(&bytes[OFFSET_SCL_SLOPE..]),
        scl_inter: B::read_f32(&bytes[OFFSET_SCL_INTER..]),
    })
}

fn parse_header_any(bytes: &[u8], path: &Path) -> Result<(Header, Endian), VolumeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(invalid(path, format!("文件长度 {} 小于头部长度", bytes.len())));
    }
    let endian = Endian::detect(bytes).ok_or_else(|| invalid(path, "sizeof_hdr 不是 348"))?;
    let header = match endian {
        Endian::Little => parse_header::<LittleEndian>(bytes, path)?,
        Endian::Big => parse_header::<BigEndian>(bytes, path)?,
    };
    Ok((header, endian))
}

fn read_voxels<B: ByteOrder>(header: &Header, bytes: &[u8]) -> Vec<f64> {
    let size = header.datatype.size();
    let apply_scaling = header.scl_slope.is_finite() && header.scl_slope != 0.0;
    let slope = f64::from(header.scl_slope);
    let inter = f64::from(header.scl_inter);

    bytes
        .chunks_exact(size)
        .map(|chunk| {
            let value = header.datatype.read::<B>(chunk);
            if apply_scaling {
                value * slope + inter
            } else {
                value
            }
        })
        .collect()
}

/// 打开文件，根据 gzip 魔数自动解压
fn open_reader(path: &Path) -> Result<Box<dyn Read>, VolumeError> {
    let file = File::open(path).map_err(|e| VolumeError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let compressed = reader
        .fill_buf()
        .map_err(|e| VolumeError::io(path, e))?
        .starts_with(&GZIP_MAGIC);

    if compressed {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

fn is_gzip_path(path: &Path) -> bool {
    path.to_string_lossy().to_lowercase().ends_with(".gz")
}

/// 构造 float32 输出头部；有模板时沿用模板的几何与方向信息
fn output_header(grid: &VoxelGrid) -> (Vec<u8>, Endian) {
    let template = (grid.header.len() >= HEADER_SIZE)
        .then(|| Endian::detect(&grid.header).map(|endian| (&grid.header[..HEADER_SIZE], endian)))
        .flatten();

    match template {
        Some((bytes, Endian::Little)) => (fill_header::<LittleEndian>(bytes.to_vec(), grid), Endian::Little),
        Some((bytes, Endian::Big)) => (fill_header::<BigEndian>(bytes.to_vec(), grid), Endian::Big),
        None => {
            let mut bytes = vec![0u8; HEADER_SIZE];
            LittleEndian::write_i32(&mut bytes[0..4], HEADER_SIZE as i32);
            LittleEndian::write_f32(&mut bytes[OFFSET_PIXDIM..], 1.0);
            bytes[OFFSET_XYZT_UNITS] = UNITS_MM;
            bytes[OFFSET_MAGIC..OFFSET_MAGIC + 4].copy_from_slice(b"n+1\0");
            (fill_header::<LittleEndian>(bytes, grid), Endian::Little)
        }
    }
}

fn fill_header<B: ByteOrder>(mut bytes: Vec<u8>, grid: &VoxelGrid) -> Vec<u8> {
    let shape = grid.geometry.shape();
    let spacing = grid.geometry.spacing();

    B::write_i16(&mut bytes[OFFSET_DIM..], 3);
    for k in 1..8 {
        let extent = if k <= 3 {
            i16::try_from(shape[k - 1]).unwrap_or(i16::MAX)
        } else {
            1
        };
        B::write_i16(&mut bytes[OFFSET_DIM + 2 * k..], extent);
    }
    for (axis, &d) in spacing.iter().enumerate() {
        B::write_f32(&mut bytes[OFFSET_PIXDIM + 4 * (axis + 1)..], d);
    }
    B::write_i16(&mut bytes[OFFSET_DATATYPE..], DT_FLOAT32);
    B::write_i16(&mut bytes[OFFSET_BITPIX..], 32);
    B::write_f32(&mut bytes[OFFSET_VOX_OFFSET..], DATA_OFFSET as f32);
    B::write_f32(&mut bytes[OFFSET_SCL_SLOPE..], 1.0);
    B::write_f32(&mut bytes[OFFSET_SCL_INTER..], 0.0);
    B::write_f32(&mut bytes[OFFSET_CAL_MAX..], 0.0);
    B::write_f32(&mut bytes[OFFSET_CAL_MIN..], 0.0);
    B::write_i32(&mut bytes[OFFSET_GLMAX..], 0);
    B::write_i32(&mut bytes[OFFSET_GLMIN..], 0);
    bytes
}

fn write_body<B: ByteOrder>(writer: &mut dyn Write, header: &[u8], data: &[f64]) -> std::io::Result<()> {
    writer.write_all(header)?;
    // 无扩展
    writer.write_all(&[0u8; DATA_OFFSET - HEADER_SIZE])?;
    for &value in data {
        writer.write_f32::<B>(value as f32)?;
    }
    Ok(())
}

/// NIfTI-1 单文件格式解析器 (.nii / .nii.gz)
#[derive(Debug, Default)]
pub struct NiftiParser;

impl NiftiParser {
    pub fn new() -> Self {
        NiftiParser
    }
}

impl VolumeParser for NiftiParser {
    fn supported_extensions(&self) -> Vec<&'static str> {
        vec!["nii", "nii.gz"]
    }

    fn name(&self) -> &'static str {
        "NIfTI Parser"
    }

    fn parse_from_file(&self, file_path: &Path) -> Result<VoxelGrid, VolumeError> {
        let mut bytes = Vec::new();
        open_reader(file_path)?
            .read_to_end(&mut bytes)
            .map_err(|e| VolumeError::io(file_path, e))?;

        let (header, endian) = parse_header_any(&bytes, file_path)?;
        let geometry = Geometry::new(header.shape, header.spacing).map_err(|source| {
            VolumeError::Geometry {
                path: file_path.display().to_string(),
                source,
            }
        })?;

        // 只读取第一个三维体积
        let end = geometry
            .voxel_count()
            .checked_mul(header.datatype.size())
            .and_then(|nbytes| header.vox_offset.checked_add(nbytes))
            .ok_or_else(|| invalid(file_path, format!("vox_offset = {} 超出范围", header.vox_offset)))?;
        if bytes.len() < end {
            return Err(invalid(
                file_path,
                format!("数据不足: 需要 {} 字节，文件只有 {} 字节", end, bytes.len()),
            ));
        }
        let body = &bytes[header.vox_offset..end];
        let data = match endian {
            Endian::Little => read_voxels::<LittleEndian>(&header, body),
            Endian::Big => read_voxels::<BigEndian>(&header, body),
        };
        debug!(
            "读取 {}: shape {:?}, 间距 {:?}, 类型 {}",
            file_path.display(),
            header.shape,
            header.spacing,
            header.datatype.name()
        );

        let grid = VoxelGrid::new(geometry, data).map_err(|source| VolumeError::Geometry {
            path: file_path.display().to_string(),
            source,
        })?;
        Ok(grid.with_header(bytes[..HEADER_SIZE].to_vec(), header.datatype.name()))
    }

    fn write_to_file(&self, grid: &VoxelGrid, file_path: &Path) -> Result<(), VolumeError> {
        let (header, endian) = output_header(grid);
        let file = File::create(file_path).map_err(|e| VolumeError::io(file_path, e))?;
        let buffered = BufWriter::new(file);

        let result = if is_gzip_path(file_path) {
            let mut encoder = GzEncoder::new(buffered, Compression::default());
            let written = match endian {
                Endian::Little => write_body::<LittleEndian>(&mut encoder, &header, &grid.data),
                Endian::Big => write_body::<BigEndian>(&mut encoder, &header, &grid.data),
            };
            written.and_then(|()| encoder.finish()?.flush())
        } else {
            let mut writer = buffered;
            let written = match endian {
                Endian::Little => write_body::<LittleEndian>(&mut writer, &header, &grid.data),
                Endian::Big => write_body::<BigEndian>(&mut writer, &header, &grid.data),
            };
            written.and_then(|()| writer.flush())
        };
        result.map_err(|e| VolumeError::io(file_path, e))
    }
}
