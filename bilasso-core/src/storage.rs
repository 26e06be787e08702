//! On-disk format for dense problem data.
//!
//! Custom matrix format:
//! 1. Header: 8 bytes for storage type (0 = columns, 1 = rows)
//! 2. Header: 8 bytes for number of rows
//! 3. Header: 8 bytes for number of columns
//! 4. Data: little-endian `f64` values in column- or row-major order
//!
//! Vectors are stored as single-column matrices.

extern crate nalgebra as na;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::utils::LassoError;

const HEADER_LEN: usize = 24;
const BATCH_SIZE: usize = 1024;

/// Configuration for where problem files live on the local file system.
///
/// # Example
///
/// ```rust
/// # use bilasso_core::storage::LocalConfig;
/// # use std::path::Path;
///
/// let config = LocalConfig::new(Path::new("/tmp/bilasso"), "exp1_");
/// assert_eq!(config.file_path("A"), Path::new("/tmp/bilasso/exp1_A.bin"));
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Root directory path for storing files
    pub root: PathBuf,
    /// Filename prefix for organizing files
    pub prefix: String,
}

impl LocalConfig {
    pub fn new(root: &Path, prefix: &str) -> Self {
        LocalConfig {
            root: root.to_path_buf(),
            prefix: prefix.to_string(),
        }
    }

    pub fn file_path(&self, id: &str) -> PathBuf {
        self.root
            .join(format!("{}{}", self.prefix, id))
            .with_extension("bin")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatrixStorageType {
    Columns = 0,
    Rows = 1,
}

impl std::fmt::Display for MatrixStorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatrixStorageType::Columns => write!(f, "Columns"),
            MatrixStorageType::Rows => write!(f, "Rows"),
        }
    }
}

impl TryFrom<u64> for MatrixStorageType {
    type Error = LassoError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MatrixStorageType::Columns),
            1 => Ok(MatrixStorageType::Rows),
            other => Err(LassoError::MalformedFile(format!(
                "invalid storage type {}",
                other
            ))),
        }
    }
}

/// Writes `matrix` to `file_path`, streaming in batches of columns or rows.
pub fn write_data_matrix_to_file(
    matrix: &na::DMatrix<f64>,
    file_path: &Path,
    storage_type: MatrixStorageType,
) -> Result<(), LassoError> {
    let file = File::create(file_path)?;
    let nrows = matrix.nrows();
    let ncols = matrix.ncols();
    let buf_size = match storage_type {
        MatrixStorageType::Columns => nrows * 8,
        MatrixStorageType::Rows => ncols * 8,
    };
    let mut writer = BufWriter::with_capacity(buf_size.max(HEADER_LEN), file);

    for value in [storage_type as u64, nrows as u64, ncols as u64] {
        writer.write_all(&value.to_le_bytes())?;
    }

    match storage_type {
        MatrixStorageType::Columns => {
            for start_col in (0..ncols).step_by(BATCH_SIZE) {
                let n_cols = (start_col + BATCH_SIZE).min(ncols) - start_col;
                for column in matrix.columns(start_col, n_cols).column_iter() {
                    for value in column.iter() {
                        writer.write_all(&value.to_le_bytes())?;
                    }
                }
            }
        }
        MatrixStorageType::Rows => {
            for start_row in (0..nrows).step_by(BATCH_SIZE) {
                let n_rows = (start_row + BATCH_SIZE).min(nrows) - start_row;
                for row in matrix.rows(start_row, n_rows).row_iter() {
                    for value in row.iter() {
                        writer.write_all(&value.to_le_bytes())?;
                    }
                }
            }
        }
    }

    writer.flush()?;
    Ok(())
}

/// Reads a matrix written by [`write_data_matrix_to_file`].
///
/// The file is memory-mapped and validated: a short header, an unknown
/// storage type or a body whose length disagrees with the header dimensions
/// is reported as [`LassoError::MalformedFile`].
pub fn read_data_matrix_from_file(file_path: &Path) -> Result<na::DMatrix<f64>, LassoError> {
    let file = File::open(file_path)?;
    // SAFETY: the mapping is only read while this function holds it and
    // problem files are not modified concurrently.
    let mmap = unsafe { Mmap::map(&file)? };

    if mmap.len() < HEADER_LEN {
        return Err(LassoError::MalformedFile(format!(
            "{}: {} bytes is shorter than the {}-byte header",
            file_path.display(),
            mmap.len(),
            HEADER_LEN
        )));
    }

    let storage_type = MatrixStorageType::try_from(read_u64(&mmap, 0))?;
    let nrows = read_u64(&mmap, 8) as usize;
    let ncols = read_u64(&mmap, 16) as usize;

    let expected = nrows
        .checked_mul(ncols)
        .and_then(|n| n.checked_mul(8))
        .and_then(|n| n.checked_add(HEADER_LEN))
        .ok_or_else(|| {
            LassoError::MalformedFile(format!(
                "{}: dimensions {}x{} overflow",
                file_path.display(),
                nrows,
                ncols
            ))
        })?;
    if mmap.len() != expected {
        return Err(LassoError::MalformedFile(format!(
            "{}: expected {} bytes for a {}x{} matrix, found {}",
            file_path.display(),
            expected,
            nrows,
            ncols,
            mmap.len()
        )));
    }

    let data = mmap[HEADER_LEN..]
        .chunks_exact(8)
        .map(|chunk| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            f64::from_le_bytes(bytes)
        });

    let matrix = match storage_type {
        MatrixStorageType::Columns => na::DMatrix::from_iterator(nrows, ncols, data),
        MatrixStorageType::Rows => na::DMatrix::from_row_iterator(nrows, ncols, data),
    };
    Ok(matrix)
}

pub fn write_vector_to_file(vector: &na::DVector<f64>, file_path: &Path) -> Result<(), LassoError> {
    let matrix = na::DMatrix::from_column_slice(vector.len(), 1, vector.as_slice());
    write_data_matrix_to_file(&matrix, file_path, MatrixStorageType::Columns)
}

pub fn read_vector_from_file(file_path: &Path) -> Result<na::DVector<f64>, LassoError> {
    let matrix = read_data_matrix_from_file(file_path)?;
    if matrix.ncols() != 1 {
        return Err(LassoError::MalformedFile(format!(
            "{}: expected a single column, found {}",
            file_path.display(),
            matrix.ncols()
        )));
    }
    Ok(na::DVector::from_column_slice(matrix.as_slice()))
}

/// Writes the design matrix `A` and target `b` (and `x_true` when known)
/// under the names used by the `generate_problem` and `lasso` binaries.
pub fn save_problem(
    config: &LocalConfig,
    x: &na::DMatrix<f64>,
    y: &na::DVector<f64>,
    x_true: Option<&na::DVector<f64>>,
) -> Result<(), LassoError> {
    std::fs::create_dir_all(&config.root)?;
    write_data_matrix_to_file(x, &config.file_path("A"), MatrixStorageType::Columns)?;
    write_vector_to_file(y, &config.file_path("b"))?;
    if let Some(x_true) = x_true {
        write_vector_to_file(x_true, &config.file_path("x_true"))?;
    }
    Ok(())
}

/// Loads a problem stored with [`save_problem`], checking that `A` and `b` agree.
pub fn load_problem(
    config: &LocalConfig,
) -> Result<(na::DMatrix<f64>, na::DVector<f64>), LassoError> {
    let x = read_data_matrix_from_file(&config.file_path("A"))?;
    let y = read_vector_from_file(&config.file_path("b"))?;
    if y.len() != x.nrows() {
        return Err(LassoError::DimensionMismatch {
            what: "target",
            expected: x.nrows(),
            found: y.len(),
        });
    }
    Ok((x, y))
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}
