use crate::pir_internals::{
    branch_opt_util,
    error::SimplePirError,
    params::{COMPRESSION_BASIS, COMPRESSION_FACTOR, PACKED_GUARD_ROWS},
    prg::Prg,
};
use rayon::prelude::*;
use std::ops::{Index, IndexMut};

/// Dense rectangular container of 64-bit unsigned cells, kept in row-major
/// order. Cell arithmetic wraps modulo 2^64 everywhere; reduction to a
/// working modulus is applied only where an operation says so. Congruence
/// modulo any power of two dividing 2^64 survives the wraparound, which is
/// what makes the deferred reduction sound.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: u64,
    cols: u64,
    elems: Vec<u64>,
}

impl Matrix {
    /// Creates a zero-filled matrix with the given number of rows and columns.
    /// A 0-by-0 matrix is valid; it acts as the neutral receiver of [`Matrix::concat`].
    pub fn new(rows: u64, cols: u64) -> Matrix {
        Matrix {
            rows,
            cols,
            elems: vec![0; (rows * cols) as usize],
        }
    }

    /// Creates a matrix with the given dimensions from a flat row-major value vector.
    ///
    /// # Arguments
    ///
    /// * `rows` - The number of rows in the matrix.
    /// * `cols` - The number of columns in the matrix.
    /// * `values` - The row-major cell values; the length must equal `rows * cols`.
    ///
    /// # Returns
    ///
    /// * `Result<Matrix, SimplePirError>` - The matrix, or a `ConfigurationError`
    ///   if the number of values does not match the dimensions.
    pub fn from_values(rows: u64, cols: u64, values: Vec<u64>) -> Result<Matrix, SimplePirError> {
        if branch_opt_util::likely((rows * cols) as usize == values.len()) {
            Ok(Matrix { rows, cols, elems: values })
        } else {
            Err(SimplePirError::ConfigurationError(format!(
                "a {}-by-{} matrix needs {} cells, got {}",
                rows,
                cols,
                rows * cols,
                values.len()
            )))
        }
    }

    /// Generates a matrix of uniformly random cells drawn from the given
    /// generator. The working modulus is `modulus` when nonzero, else
    /// `2^log_mod`; `log_mod = 64` selects the full 64-bit range.
    pub fn random(prg: &mut Prg, rows: u64, cols: u64, log_mod: u64, modulus: u64) -> Matrix {
        let m = if modulus != 0 {
            modulus
        } else if log_mod >= 64 {
            0
        } else {
            1u64 << log_mod
        };

        let mut mat = Matrix::new(rows, cols);
        for elem in mat.elems.iter_mut() {
            *elem = prg.uniform(m);
        }

        mat
    }

    /// Generates a matrix of discrete-Gaussian cells of width `sigma`.
    /// Negative draws are stored in two's complement, i.e. already wrapped
    /// modulo 2^64.
    pub fn gaussian(prg: &mut Prg, rows: u64, cols: u64, sigma: f64) -> Matrix {
        let mut mat = Matrix::new(rows, cols);
        for elem in mat.elems.iter_mut() {
            *elem = prg.gaussian(sigma) as u64;
        }

        mat
    }

    #[inline(always)]
    pub const fn num_rows(&self) -> u64 {
        self.rows
    }

    #[inline(always)]
    pub const fn num_cols(&self) -> u64 {
        self.cols
    }

    /// Number of cells, `rows * cols`.
    #[inline(always)]
    pub fn size(&self) -> u64 {
        self.rows * self.cols
    }

    /// Bounds-checked cell read.
    #[inline(always)]
    pub fn get(&self, i: u64, j: u64) -> Result<u64, SimplePirError> {
        self.check_bounds(i, j)?;
        Ok(self[(i as usize, j as usize)])
    }

    /// Bounds-checked cell write.
    #[inline(always)]
    pub fn set(&mut self, val: u64, i: u64, j: u64) -> Result<(), SimplePirError> {
        self.check_bounds(i, j)?;
        self[(i as usize, j as usize)] = val;
        Ok(())
    }

    /// Bounds-checked in-place cell increment, wrapping modulo 2^64.
    #[inline(always)]
    pub fn add_at(&mut self, val: u64, i: u64, j: u64) -> Result<(), SimplePirError> {
        self.check_bounds(i, j)?;
        let cell = &mut self[(i as usize, j as usize)];
        *cell = cell.wrapping_add(val);
        Ok(())
    }

    #[inline(always)]
    fn check_bounds(&self, i: u64, j: u64) -> Result<(), SimplePirError> {
        if branch_opt_util::unlikely(i >= self.rows) {
            return Err(SimplePirError::OutOfRange { index: i, bound: self.rows });
        }
        if branch_opt_util::unlikely(j >= self.cols) {
            return Err(SimplePirError::OutOfRange { index: j, bound: self.cols });
        }
        Ok(())
    }

    /// Shifts every cell up by `val`, wrapping modulo 2^64.
    pub fn add(&mut self, val: u64) {
        for elem in self.elems.iter_mut() {
            *elem = elem.wrapping_add(val);
        }
    }

    /// Shifts every cell down by `val`, wrapping modulo 2^64. Used to
    /// re-center plaintext cells around half the plaintext modulus.
    pub fn sub(&mut self, val: u64) {
        for elem in self.elems.iter_mut() {
            *elem = elem.wrapping_sub(val);
        }
    }

    /// Elementwise in-place addition; shapes must match exactly.
    pub fn matrix_add(&mut self, rhs: &Matrix) -> Result<(), SimplePirError> {
        if branch_opt_util::unlikely(!(self.rows == rhs.rows && self.cols == rhs.cols)) {
            return Err(dim_mismatch(self, rhs));
        }

        for (elem, other) in self.elems.iter_mut().zip(rhs.elems.iter()) {
            *elem = elem.wrapping_add(*other);
        }
        Ok(())
    }

    /// Elementwise in-place subtraction; shapes must match exactly.
    pub fn matrix_sub(&mut self, rhs: &Matrix) -> Result<(), SimplePirError> {
        if branch_opt_util::unlikely(!(self.rows == rhs.rows && self.cols == rhs.cols)) {
            return Err(dim_mismatch(self, rhs));
        }

        for (elem, other) in self.elems.iter_mut().zip(rhs.elems.iter()) {
            *elem = elem.wrapping_sub(*other);
        }
        Ok(())
    }

    /// Standard matrix product, dispatching to the specialized vector path
    /// when the right operand is a single column. Output rows are computed
    /// independently and in parallel; cell writes never alias.
    ///
    /// # Returns
    ///
    /// * `Result<Matrix, SimplePirError>` - The `lhs.rows`-by-`rhs.cols`
    ///   product, or a `DimensionMismatch` reporting both shapes.
    pub fn mul(lhs: &Matrix, rhs: &Matrix) -> Result<Matrix, SimplePirError> {
        if rhs.cols == 1 {
            return Self::mul_vec(lhs, rhs);
        }

        if branch_opt_util::unlikely(lhs.cols != rhs.rows) {
            return Err(dim_mismatch(lhs, rhs));
        }

        let mut elems = vec![0u64; (lhs.rows * rhs.cols) as usize];

        elems.par_iter_mut().enumerate().for_each(|(lin_idx, v)| {
            let r_idx = lin_idx / rhs.cols as usize;
            let c_idx = lin_idx - r_idx * rhs.cols as usize;

            *v = (0..lhs.cols as usize).fold(0u64, |acc, k| acc.wrapping_add(lhs[(r_idx, k)].wrapping_mul(rhs[(k, c_idx)])));
        });

        Matrix::from_values(lhs.rows, rhs.cols, elems)
    }

    /// Matrix-vector product. The vector may carry up to two extra
    /// zero-padding rows beyond `lhs.cols`; they are ignored.
    fn mul_vec(lhs: &Matrix, rhs: &Matrix) -> Result<Matrix, SimplePirError> {
        let padded = (lhs.cols == rhs.rows) || (lhs.cols + 1 == rhs.rows) || (lhs.cols + 2 == rhs.rows);
        if branch_opt_util::unlikely(!padded || rhs.cols != 1) {
            return Err(dim_mismatch(lhs, rhs));
        }

        let mut elems = vec![0u64; lhs.rows as usize];

        elems.par_iter_mut().enumerate().for_each(|(r_idx, v)| {
            *v = (0..lhs.cols as usize).fold(0u64, |acc, k| acc.wrapping_add(lhs[(r_idx, k)].wrapping_mul(rhs.elems[k])));
        });

        Matrix::from_values(lhs.rows, 1, elems)
    }

    /// Transposes the matrix in place. When either dimension is 1 this is a
    /// relabeling of the shape, with no data movement.
    pub fn transpose(&mut self) {
        if self.cols == 1 || self.rows == 1 {
            std::mem::swap(&mut self.rows, &mut self.cols);
            return;
        }

        let mut elems = vec![0u64; self.elems.len()];
        for i in 0..self.rows as usize {
            for j in 0..self.cols as usize {
                elems[j * self.rows as usize + i] = self[(i, j)];
            }
        }

        std::mem::swap(&mut self.rows, &mut self.cols);
        self.elems = elems;
    }

    /// Appends the rows of `rhs` below `self`. Column counts must agree,
    /// except that a 0-by-0 receiver adopts the operand's shape outright.
    pub fn concat(&mut self, rhs: &Matrix) -> Result<(), SimplePirError> {
        if self.rows == 0 && self.cols == 0 {
            self.rows = rhs.rows;
            self.cols = rhs.cols;
            self.elems = rhs.elems.clone();
            return Ok(());
        }

        if branch_opt_util::unlikely(self.cols != rhs.cols) {
            return Err(dim_mismatch(self, rhs));
        }

        self.rows += rhs.rows;
        self.elems.extend_from_slice(&rhs.elems);
        Ok(())
    }

    /// Appends `n` zero rows to a column vector, aligning a query with the
    /// column layout of a packed database.
    pub fn append_zeros(&mut self, n: u64) -> Result<(), SimplePirError> {
        self.concat(&Matrix::new(n, 1))
    }

    /// Copies the contiguous row range `[start, start + count)` into a new matrix.
    pub fn select_rows(&self, start: u64, count: u64) -> Result<Matrix, SimplePirError> {
        if branch_opt_util::unlikely(start + count > self.rows) {
            return Err(SimplePirError::OutOfRange {
                index: start + count,
                bound: self.rows,
            });
        }

        let begin = (start * self.cols) as usize;
        let end = ((start + count) * self.cols) as usize;

        Matrix::from_values(count, self.cols, self.elems[begin..end].to_vec())
    }

    fn drop_last_rows(&mut self, n: u64) {
        self.rows -= n;
        self.elems.truncate((self.rows * self.cols) as usize);
    }

    /// Reduces every cell modulo `p`.
    pub fn reduce_mod(&mut self, p: u64) {
        for elem in self.elems.iter_mut() {
            *elem %= p;
        }
    }

    /// Packs `compression` consecutive columns of `basis`-bit cells into one
    /// 64-bit word per output cell; the column count shrinks by the
    /// compression factor (rounding up), rows are unchanged. Cells must be
    /// below `2^basis` for the packing to be lossless.
    ///
    /// Only `basis = 10, compression = 3` is accepted: the inline digit
    /// accumulation of [`Matrix::mul_vec_packed`] is proven not to overflow
    /// a 64-bit word exactly for this combination.
    pub fn squish(&self, basis: u64, compression: u64) -> Result<Matrix, SimplePirError> {
        check_compression_config(basis, compression)?;

        let mut out = Matrix::new(self.rows, self.cols.div_ceil(compression));

        for i in 0..out.rows as usize {
            for j in 0..out.cols as usize {
                for k in 0..compression as usize {
                    let col = j * compression as usize + k;
                    if col < self.cols as usize {
                        let digit = self[(i, col)] << (k as u64 * basis);
                        let cell = &mut out[(i, j)];
                        *cell = cell.wrapping_add(digit);
                    }
                }
            }
        }

        Ok(out)
    }

    /// Exact inverse of [`Matrix::squish`]: extracts `compression` digits of
    /// `basis` bits from every packed word and restores the original
    /// `cols`-wide layout.
    pub fn unsquish(&self, basis: u64, compression: u64, cols: u64) -> Result<Matrix, SimplePirError> {
        check_compression_config(basis, compression)?;

        let base = 1u64 << basis;
        let mut out = Matrix::new(self.rows, cols);

        for i in 0..self.rows as usize {
            for j in 0..self.cols as usize {
                let mut word = self[(i, j)];
                for k in 0..compression as usize {
                    let col = j * compression as usize + k;
                    if col < cols as usize {
                        out[(i, col)] = word % base;
                    }
                    word /= base;
                }
            }
        }

        Ok(out)
    }

    /// Matrix-vector product of a squished matrix against an unsquished
    /// column vector, decomposing the packed digits inline instead of
    /// unsquishing first. The output is over-allocated by
    /// [`PACKED_GUARD_ROWS`] rows so the band-of-8 row loop may run past the
    /// true row count, then trimmed back before returning.
    ///
    /// # Arguments
    ///
    /// * `lhs` - The squished matrix.
    /// * `rhs` - The unsquished vector; `lhs.cols * compression` rows, one column.
    /// * `basis` - Bit width of the packed digits; must be 10.
    /// * `compression` - Digits per packed word; must be 3.
    ///
    /// # Returns
    ///
    /// * `Result<Matrix, SimplePirError>` - The `lhs.rows`-by-1 product.
    ///   Non-validated compression parameters are a `ConfigurationError`;
    ///   shape disagreement is a `DimensionMismatch`.
    pub fn mul_vec_packed(lhs: &Matrix, rhs: &Matrix, basis: u64, compression: u64) -> Result<Matrix, SimplePirError> {
        check_compression_config(basis, compression)?;

        if branch_opt_util::unlikely(lhs.cols * compression != rhs.rows || rhs.cols != 1) {
            return Err(dim_mismatch(lhs, rhs));
        }

        let digit_mask = (1u64 << basis) - 1;
        let true_rows = lhs.rows as usize;

        let mut elems = vec![0u64; true_rows + PACKED_GUARD_ROWS as usize];

        elems.par_chunks_mut(PACKED_GUARD_ROWS as usize).enumerate().for_each(|(band, chunk)| {
            let band_base = band * PACKED_GUARD_ROWS as usize;

            for (k, out_elem) in chunk.iter_mut().enumerate() {
                let i = band_base + k;
                if i >= true_rows {
                    break;
                }

                let mut acc = 0u64;
                for j in 0..lhs.cols as usize {
                    let word = lhs[(i, j)];
                    let at = j * 3;

                    acc = acc
                        .wrapping_add((word & digit_mask).wrapping_mul(rhs.elems[at]))
                        .wrapping_add(((word >> basis) & digit_mask).wrapping_mul(rhs.elems[at + 1]))
                        .wrapping_add(((word >> (2 * basis)) & digit_mask).wrapping_mul(rhs.elems[at + 2]));
                }

                *out_elem = acc;
            }
        });

        let mut out = Matrix::from_values(lhs.rows + PACKED_GUARD_ROWS, 1, elems)?;
        out.drop_last_rows(PACKED_GUARD_ROWS);

        Ok(out)
    }
}

#[inline(always)]
fn dim_mismatch(lhs: &Matrix, rhs: &Matrix) -> SimplePirError {
    SimplePirError::DimensionMismatch {
        lhs: (lhs.rows, lhs.cols),
        rhs: (rhs.rows, rhs.cols),
    }
}

#[inline(always)]
fn check_compression_config(basis: u64, compression: u64) -> Result<(), SimplePirError> {
    if branch_opt_util::unlikely(!(basis == COMPRESSION_BASIS && compression == COMPRESSION_FACTOR)) {
        return Err(SimplePirError::ConfigurationError(format!(
            "packed-word arithmetic is only validated for basis = {}, compression = {}; got basis = {}, compression = {}",
            COMPRESSION_BASIS, COMPRESSION_FACTOR, basis, compression
        )));
    }
    Ok(())
}

impl Index<(usize, usize)> for Matrix {
    type Output = u64;

    #[inline(always)]
    fn index(&self, index: (usize, usize)) -> &Self::Output {
        let (ridx, cidx) = index;
        unsafe { self.elems.get_unchecked(ridx * self.cols as usize + cidx) }
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    #[inline(always)]
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        let (ridx, cidx) = index;
        unsafe { self.elems.get_unchecked_mut(ridx * self.cols as usize + cidx) }
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use test_case::test_case;

    fn identity(n: u64) -> Matrix {
        let mut mat = Matrix::new(n, n);
        for i in 0..n as usize {
            mat[(i, i)] = 1;
        }
        mat
    }

    #[test_case(16, 16, vec![0u64; 256] => matches Ok(_); "element count matching dimensions is accepted")]
    #[test_case(16, 16, vec![0u64; 255] => matches Err(SimplePirError::ConfigurationError(_)); "element count below dimensions is rejected")]
    #[test_case(16, 16, vec![0u64; 257] => matches Err(SimplePirError::ConfigurationError(_)); "element count above dimensions is rejected")]
    fn from_values_checks_the_element_count(rows: u64, cols: u64, values: Vec<u64>) -> Result<Matrix, SimplePirError> {
        Matrix::from_values(rows, cols, values)
    }

    #[test_case(3, 4 => matches Err(SimplePirError::OutOfRange { index: 3, bound: 3 }); "row index at the bound")]
    #[test_case(0, 4 => matches Err(SimplePirError::OutOfRange { index: 4, bound: 4 }); "column index at the bound")]
    #[test_case(2, 3 => matches Ok(0); "last valid cell")]
    fn cell_access_is_bounds_checked(i: u64, j: u64) -> Result<u64, SimplePirError> {
        let mat = Matrix::new(3, 4);
        mat.get(i, j)
    }

    #[test]
    fn cell_arithmetic_wraps_at_the_word_boundary() {
        let mut mat = Matrix::from_values(1, 3, vec![u64::MAX, u64::MAX - 1, 1u64 << 63]).unwrap();

        mat.add(2);
        assert_eq!(mat.get(0, 0).unwrap(), 1);
        assert_eq!(mat.get(0, 1).unwrap(), 0);

        mat.sub(2);
        assert_eq!(mat.get(0, 0).unwrap(), u64::MAX);
        assert_eq!(mat.get(0, 2).unwrap(), 1u64 << 63);

        // 2^63 * 2 == 2^64 == 0 in cell arithmetic.
        let two = Matrix::from_values(3, 1, vec![2, 0, 0]).unwrap();
        let prod = Matrix::mul(&mat, &two).unwrap();
        assert_eq!(prod.get(0, 0).unwrap(), u64::MAX.wrapping_mul(2));

        let mut wrap = Matrix::from_values(1, 1, vec![1u64 << 63]).unwrap();
        let by_two = Matrix::from_values(1, 1, vec![2]).unwrap();
        let zero = Matrix::mul(&wrap, &by_two).unwrap();
        assert_eq!(zero.get(0, 0).unwrap(), 0);

        wrap.add_at(u64::MAX, 0, 0).unwrap();
        assert_eq!(wrap.get(0, 0).unwrap(), (1u64 << 63) - 1);
    }

    #[test_case((8, 4), (4, 8) => matches Ok(_); "inner dimensions agree")]
    #[test_case((8, 4), (8, 4) => matches Err(SimplePirError::DimensionMismatch { lhs: (8, 4), rhs: (8, 4) }); "inner dimensions disagree")]
    #[test_case((8, 4), (7, 1) => matches Err(SimplePirError::DimensionMismatch { .. }); "vector path rejects rows beyond the padding allowance")]
    #[test_case((8, 4), (6, 1) => matches Ok(_); "vector path accepts two rows of zero padding")]
    fn multiplication_validates_shapes(lhs_dim: (u64, u64), rhs_dim: (u64, u64)) -> Result<Matrix, SimplePirError> {
        let lhs = Matrix::new(lhs_dim.0, lhs_dim.1);
        let rhs = Matrix::new(rhs_dim.0, rhs_dim.1);
        Matrix::mul(&lhs, &rhs)
    }

    #[test]
    fn multiplication_by_identity_is_the_identity() {
        let mut prg = Prg::from_os_rng();

        for _ in 0..16 {
            let rows = 1 + prg.uniform(64);
            let cols = 2 + prg.uniform(64);

            let mat = Matrix::random(&mut prg, rows, cols, 0, 1024);

            let lhs = Matrix::mul(&identity(rows), &mat).unwrap();
            assert_eq!(lhs, mat);

            let rhs = Matrix::mul(&mat, &identity(cols)).unwrap();
            assert_eq!(rhs, mat);
        }
    }

    #[test]
    fn vector_product_ignores_zero_padding_rows() {
        let mut prg = Prg::from_os_rng();

        let mat = Matrix::random(&mut prg, 16, 7, 0, 1024);
        let mut vec = Matrix::random(&mut prg, 7, 1, 32, 0);

        let unpadded = Matrix::mul(&mat, &vec).unwrap();

        vec.append_zeros(2).unwrap();
        let padded = Matrix::mul(&mat, &vec).unwrap();

        assert_eq!(unpadded, padded);
    }

    #[test]
    fn elementwise_addition_and_subtraction_cancel() {
        let mut prg = Prg::from_os_rng();

        let mut mat = Matrix::random(&mut prg, 32, 32, 64, 0);
        let other = Matrix::random(&mut prg, 32, 32, 64, 0);
        let orig = mat.clone();

        mat.matrix_add(&other).unwrap();
        assert_ne!(mat, orig);

        mat.matrix_sub(&other).unwrap();
        assert_eq!(mat, orig);

        let shape_off = Matrix::new(32, 31);
        assert!(matches!(mat.matrix_add(&shape_off), Err(SimplePirError::DimensionMismatch { .. })));
        assert!(matches!(mat.matrix_sub(&shape_off), Err(SimplePirError::DimensionMismatch { .. })));
    }

    #[test]
    fn transpose_round_trips_and_relabels_vectors() {
        let mut prg = Prg::from_os_rng();

        let mut mat = Matrix::random(&mut prg, 12, 5, 32, 0);
        let orig = mat.clone();

        mat.transpose();
        assert_eq!(mat.num_rows(), 5);
        assert_eq!(mat.num_cols(), 12);
        assert_eq!(mat.get(3, 7).unwrap(), orig.get(7, 3).unwrap());

        mat.transpose();
        assert_eq!(mat, orig);

        let mut col = Matrix::random(&mut prg, 9, 1, 32, 0);
        let col_elems = col.elems.clone();
        col.transpose();
        assert_eq!((col.num_rows(), col.num_cols()), (1, 9));
        assert_eq!(col.elems, col_elems);
    }

    #[test]
    fn concat_stacks_rows_and_adopts_into_an_empty_receiver() {
        let mut prg = Prg::from_os_rng();

        let top = Matrix::random(&mut prg, 4, 3, 32, 0);
        let bottom = Matrix::random(&mut prg, 2, 3, 32, 0);

        let mut mat = Matrix::new(0, 0);
        mat.concat(&top).unwrap();
        assert_eq!(mat, top);

        mat.concat(&bottom).unwrap();
        assert_eq!(mat.num_rows(), 6);
        assert_eq!(mat.select_rows(0, 4).unwrap(), top);
        assert_eq!(mat.select_rows(4, 2).unwrap(), bottom);

        let wide = Matrix::new(2, 4);
        assert!(matches!(mat.concat(&wide), Err(SimplePirError::DimensionMismatch { .. })));
    }

    #[test]
    fn select_rows_checks_the_range() {
        let mat = Matrix::new(8, 2);

        assert!(mat.select_rows(6, 2).is_ok());
        assert!(matches!(mat.select_rows(6, 3), Err(SimplePirError::OutOfRange { index: 9, bound: 8 })));
    }

    #[test]
    fn reduce_mod_is_elementwise() {
        let mut mat = Matrix::from_values(1, 4, vec![0, 990, 991, u64::MAX]).unwrap();
        mat.reduce_mod(991);

        assert_eq!(mat.elems, vec![0, 990, 0, u64::MAX % 991]);
    }

    #[test_case(10, 3 => matches Ok(_); "validated combination is accepted")]
    #[test_case(10, 2 => matches Err(SimplePirError::ConfigurationError(_)); "other compression factors are rejected")]
    #[test_case(16, 3 => matches Err(SimplePirError::ConfigurationError(_)); "other bases are rejected")]
    fn compression_configuration_is_pinned(basis: u64, compression: u64) -> Result<Matrix, SimplePirError> {
        Matrix::new(4, 6).squish(basis, compression)
    }

    #[test]
    fn squish_then_unsquish_is_the_identity() {
        let mut prg = Prg::from_os_rng();

        for cols in [1u64, 2, 3, 4, 7, 30, 31, 32] {
            let mat = Matrix::random(&mut prg, 16, cols, COMPRESSION_BASIS, 0);

            let squished = mat.squish(COMPRESSION_BASIS, COMPRESSION_FACTOR).unwrap();
            assert_eq!(squished.num_cols(), cols.div_ceil(COMPRESSION_FACTOR));
            assert_eq!(squished.num_rows(), mat.num_rows());

            let unsquished = squished.unsquish(COMPRESSION_BASIS, COMPRESSION_FACTOR, cols).unwrap();
            assert_eq!(unsquished, mat);
        }
    }

    #[test]
    fn packed_product_matches_the_plain_product() {
        let mut prg = Prg::from_os_rng();

        for cols in [3u64, 5, 12, 31] {
            // 17 rows: the band-of-8 loop needs its guard rows here.
            let mat = Matrix::random(&mut prg, 17, cols, COMPRESSION_BASIS, 0);

            let padded_cols = cols.div_ceil(COMPRESSION_FACTOR) * COMPRESSION_FACTOR;
            let mut vec = Matrix::random(&mut prg, cols, 1, 32, 0);
            vec.append_zeros(padded_cols - cols).unwrap();

            let expected = Matrix::mul(&mat, &vec).unwrap();

            let squished = mat.squish(COMPRESSION_BASIS, COMPRESSION_FACTOR).unwrap();
            let got = Matrix::mul_vec_packed(&squished, &vec, COMPRESSION_BASIS, COMPRESSION_FACTOR).unwrap();

            assert_eq!(got, expected);
        }
    }

    #[test]
    fn packed_product_validates_shapes() {
        let squished = Matrix::new(8, 2);

        let short_vec = Matrix::new(5, 1);
        assert!(matches!(
            Matrix::mul_vec_packed(&squished, &short_vec, COMPRESSION_BASIS, COMPRESSION_FACTOR),
            Err(SimplePirError::DimensionMismatch { .. })
        ));

        let not_a_vec = Matrix::new(6, 2);
        assert!(matches!(
            Matrix::mul_vec_packed(&squished, &not_a_vec, COMPRESSION_BASIS, COMPRESSION_FACTOR),
            Err(SimplePirError::DimensionMismatch { .. })
        ));
    }
}
