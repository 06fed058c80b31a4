use crate::pir_internals::{
    branch_opt_util,
    error::SimplePirError,
    matrix::Matrix,
    params::{COMPRESSION_BASIS, COMPRESSION_FACTOR, Params, mod_pow2},
    prg::Prg,
};

/// Layout metadata describing how logical records map onto the cells of a
/// database matrix over the plaintext modulus.
#[derive(Clone, Debug, PartialEq)]
pub struct DbInfo {
    /// Number of logical records.
    pub num: u64,
    /// Number of bits per record.
    pub row_length: u64,
    /// Records packed per matrix cell, when a cell holds several records;
    /// 0 when a record instead spans several cells.
    pub packing: u64,
    /// Matrix cells per record; 1 when a record fits in one cell.
    pub ne: u64,
    /// Repetition factor of the scheme; must divide `ne`.
    pub x: u64,
    /// Plaintext modulus.
    pub p: u64,
    /// Logarithm of the ciphertext modulus.
    pub logq: u64,

    /// Digit width of the in-memory compression; 0 while uncompressed.
    pub basis: u64,
    /// Column-group size of the in-memory compression; 0 while uncompressed.
    pub squishing: u64,
    /// Column count before compression, kept for the inverse mapping.
    pub cols: u64,
}

impl DbInfo {
    #[inline(always)]
    pub fn mod_q(&self, x: u64) -> u64 {
        mod_pow2(x, self.logq)
    }
}

/// Server-held database: a record-layout description plus the owned matrix
/// holding the encoded records.
#[derive(Clone, Debug)]
pub struct Database {
    pub info: DbInfo,
    pub data: Matrix,
}

/// Extracts the `i`-th base-`p` digit of `m`.
pub fn base_p(p: u64, m: u64, i: u64) -> u64 {
    let mut m = m;
    for _ in 0..i {
        m /= p;
    }
    m % p
}

/// Recomposes a value from its base-`p` digits, least significant first.
pub fn reconstruct_from_base_p(p: u64, vals: &[u64]) -> u64 {
    let mut res = 0u64;
    let mut coeff = 1u64;

    for &v in vals {
        res = res.wrapping_add(coeff.wrapping_mul(v));
        coeff = coeff.wrapping_mul(p);
    }

    res
}

/// Number of base-`p` digits needed to hold a `num_bits`-bit value.
fn num_digits_base_p(p: u64, num_bits: u64) -> u64 {
    ((num_bits as f64) / (p as f64).log2()).ceil() as u64
}

/// Rebuilds one record from the matrix cells that encode it: undoes the
/// half-modulus centering of every cell (mod `2^logq`, then mod `p`),
/// recomposes the base-`p` digits, and, if several records share a cell,
/// extracts the wanted sub-field.
pub fn reconstruct_elem(vals: &[u64], index: u64, info: &DbInfo) -> u64 {
    let mut digits = Vec::with_capacity(vals.len());
    for &v in vals {
        digits.push(info.mod_q(v.wrapping_add(info.p / 2)) % info.p);
    }

    let mut val = reconstruct_from_base_p(info.p, &digits);

    if info.packing > 0 {
        val = base_p(1u64 << info.row_length, val, index % info.packing);
    }

    val
}

/// Classifies the packing regime for `num` records of `row_length` bits over
/// plaintext modulus `p`.
///
/// # Returns
///
/// * `Result<(u64, u64, u64), SimplePirError>` - A
///   `(db_elems, elems_per_record, records_per_elem)` triple: records short
///   enough to share a cell yield `(ceil(num/packing), 1, packing)`, longer
///   records span `ne` cells each and yield `(num * ne, ne, 0)`. A computed
///   cell count of zero or beyond `num` is an internal inconsistency.
pub fn num_db_entries(num: u64, row_length: u64, p: u64) -> Result<(u64, u64, u64), SimplePirError> {
    if (row_length as f64) <= (p as f64).log2() {
        let logp = (p as f64).log2().floor() as u64;
        let records_per_elem = logp / row_length;
        let db_elems = num.div_ceil(records_per_elem);

        if branch_opt_util::unlikely(db_elems == 0 || db_elems > num) {
            return Err(SimplePirError::ConfigurationError(format!(
                "packing {} records of {} bits over modulus {} yields {} cells",
                num, row_length, p, db_elems
            )));
        }

        return Ok((db_elems, 1, records_per_elem));
    }

    let ne = num_digits_base_p(p, row_length);
    Ok((num * ne, ne, 0))
}

/// Picks a database matrix shape `(l, m)` with `l * m >= db_elems`, `l` as
/// close to `sqrt(db_elems)` as possible while being a multiple of the
/// cells-per-record count.
pub fn approx_square_database_dims(num: u64, row_length: u64, p: u64) -> Result<(u64, u64), SimplePirError> {
    let (db_elems, elems_per_record, _) = num_db_entries(num, row_length, p)?;

    let mut l = (db_elems as f64).sqrt().floor() as u64;
    let rem = l % elems_per_record;
    if rem != 0 {
        l += elems_per_record - rem;
    }

    let m = db_elems.div_ceil(l);
    Ok((l, m))
}

/// As [`approx_square_database_dims`], but enforces a floor on the width to
/// bound per-query upload; when the square shape is narrower than
/// `lower_bound_m`, the width is pinned and the minimal compliant height is
/// solved for instead.
pub fn approx_database_dims(num: u64, row_length: u64, p: u64, lower_bound_m: u64) -> Result<(u64, u64), SimplePirError> {
    let (l, m) = approx_square_database_dims(num, row_length, p)?;
    if m >= lower_bound_m {
        return Ok((l, m));
    }

    let m = lower_bound_m;
    let (db_elems, elems_per_record, _) = num_db_entries(num, row_length, p)?;

    let mut l = db_elems.div_ceil(m);
    let rem = l % elems_per_record;
    if rem != 0 {
        l += elems_per_record - rem;
    }

    Ok((l, m))
}

impl Database {
    /// Builds an empty database shell: layout metadata populated and checked
    /// against the chosen matrix dimensions, no cells allocated yet.
    pub fn setup(num: u64, row_length: u64, p: &Params) -> Result<Database, SimplePirError> {
        if branch_opt_util::unlikely(num == 0 || row_length == 0) {
            return Err(SimplePirError::ConfigurationError("database must hold at least one record of at least one bit".to_string()));
        }

        let (db_elems, ne, packing) = num_db_entries(num, row_length, p.p)?;

        if branch_opt_util::unlikely(db_elems > p.l * p.m) {
            return Err(SimplePirError::ConfigurationError(format!(
                "database needs {} cells but the {}-by-{} matrix holds {}",
                db_elems,
                p.l,
                p.m,
                p.l * p.m
            )));
        }

        if branch_opt_util::unlikely(p.l % ne != 0) {
            return Err(SimplePirError::ConfigurationError(format!("cells per record ({}) must divide the matrix height ({})", ne, p.l)));
        }

        Ok(Database {
            info: DbInfo {
                num,
                row_length,
                packing,
                ne,
                x: ne,
                p: p.p,
                logq: p.logq,
                basis: 0,
                squishing: 0,
                cols: 0,
            },
            data: Matrix::new(0, 0),
        })
    }

    /// Encodes `values` (one per record, each below `2^row_length`) into a
    /// fresh database matrix and re-centers every cell around half the
    /// plaintext modulus.
    ///
    /// Short records are packed several to a cell by mixed-radix composition
    /// in base `2^row_length`; long records are decomposed into base-`p`
    /// digits written down a column of consecutive rows.
    pub fn new(num: u64, row_length: u64, p: &Params, values: &[u64]) -> Result<Database, SimplePirError> {
        let mut db = Database::setup(num, row_length, p)?;
        db.data = Matrix::new(p.l, p.m);

        if branch_opt_util::unlikely(values.len() as u64 != num) {
            return Err(SimplePirError::ConfigurationError(format!("expected {} record values, got {}", num, values.len())));
        }

        if db.info.packing > 0 {
            let mut at = 0u64;
            let mut cur = 0u64;
            let mut coeff = 1u64;

            for (i, &val) in values.iter().enumerate() {
                cur = cur.wrapping_add(val.wrapping_mul(coeff));
                coeff = coeff.wrapping_mul(1u64 << row_length);

                if ((i as u64 + 1) % db.info.packing == 0) || (i == values.len() - 1) {
                    db.data.set(cur, at / p.m, at % p.m)?;
                    at += 1;
                    cur = 0;
                    coeff = 1;
                }
            }
        } else {
            for (i, &val) in values.iter().enumerate() {
                let i = i as u64;
                for j in 0..db.info.ne {
                    db.data.set(base_p(db.info.p, val, j), (i / p.m) * db.info.ne + j, i % p.m)?;
                }
            }
        }

        // Map cells into [-p/2, p/2) ahead of the LWE noise added downstream.
        db.data.sub(p.p / 2);

        Ok(db)
    }

    /// Fills a database with uniformly random records in `[0, p)`.
    pub fn random(prg: &mut Prg, num: u64, row_length: u64, p: &Params) -> Result<Database, SimplePirError> {
        let mut db = Database::setup(num, row_length, p)?;
        db.data = Matrix::random(prg, p.l, p.m, 0, p.p);
        db.data.sub(p.p / 2);

        Ok(db)
    }

    /// Reads record `i` back out of the encoded matrix, inverting the
    /// packing performed by [`Database::new`]. Only valid while the database
    /// is in its unsquished representation.
    pub fn get_elem(&self, i: u64) -> Result<u64, SimplePirError> {
        if branch_opt_util::unlikely(i >= self.info.num) {
            return Err(SimplePirError::OutOfRange { index: i, bound: self.info.num });
        }

        let (mut row, mut col) = (i / self.data.num_cols(), i % self.data.num_cols());
        if self.info.packing > 0 {
            let cell_idx = i / self.info.packing;
            row = cell_idx / self.data.num_cols();
            col = cell_idx % self.data.num_cols();
        }

        let mut vals = Vec::with_capacity(self.info.ne as usize);
        for j in row * self.info.ne..(row + 1) * self.info.ne {
            vals.push(self.data.get(j, col)?);
        }

        Ok(reconstruct_elem(&vals, i, &self.info))
    }

    /// Compresses the matrix into the packed server-side layout, recording
    /// the compression parameters in the layout metadata. Requires the
    /// plaintext modulus to fit the digit width and the ciphertext modulus
    /// to cover a full packed word.
    pub fn squish(&mut self) -> Result<(), SimplePirError> {
        if branch_opt_util::unlikely(self.info.p > (1u64 << COMPRESSION_BASIS) || self.info.logq < COMPRESSION_BASIS * COMPRESSION_FACTOR) {
            return Err(SimplePirError::ConfigurationError(format!(
                "cannot pack modulus-{} cells into {}-bit digits under a 2^{} ciphertext modulus",
                self.info.p, COMPRESSION_BASIS, self.info.logq
            )));
        }

        self.info.basis = COMPRESSION_BASIS;
        self.info.squishing = COMPRESSION_FACTOR;
        self.info.cols = self.data.num_cols();

        self.data = self.data.squish(self.info.basis, self.info.squishing)?;
        Ok(())
    }

    /// Restores the readable layout recorded at squish time.
    pub fn unsquish(&mut self) -> Result<(), SimplePirError> {
        self.data = self.data.unsquish(self.info.basis, self.info.squishing, self.info.cols)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_case::test_case;

    fn params_for(num: u64, row_length: u64) -> Params {
        let (l, m) = approx_square_database_dims(num, row_length, 991).unwrap();
        Params {
            n: 1 << 10,
            sigma: 6.4,
            l,
            m,
            logq: 32,
            p: 991,
        }
    }

    #[test_case(4, 9 => (1, 1); "records at one cell each")]
    #[test_case(4, 3 => (1, 3); "several records per cell")]
    #[test_case(4, 12 => (2, 0); "records spanning several cells")]
    fn packing_regime_classification(num: u64, row_length: u64) -> (u64, u64) {
        let (_, ne, packing) = num_db_entries(num, row_length, 991).unwrap();
        (ne, packing)
    }

    #[test_case(1 << 10, 8)]
    #[test_case(1 << 10, 3)]
    #[test_case(1 << 10, 12)]
    #[test_case(1 << 14, 20)]
    #[test_case(10_000, 1)]
    #[test_case(777, 40)]
    fn square_dimensions_satisfy_the_layout_invariants(num: u64, row_length: u64) {
        let (db_elems, ne, _) = num_db_entries(num, row_length, 991).unwrap();
        let (l, m) = approx_square_database_dims(num, row_length, 991).unwrap();

        assert_eq!(l % ne, 0);
        assert!(l * m >= db_elems);
    }

    #[test]
    fn width_floor_pins_the_narrow_side() {
        let (_, square_m) = approx_square_database_dims(1 << 10, 8, 991).unwrap();
        assert!(square_m < 512);

        let (l, m) = approx_database_dims(1 << 10, 8, 991, 512).unwrap();
        let (db_elems, ne, _) = num_db_entries(1 << 10, 8, 991).unwrap();

        assert_eq!(m, 512);
        assert_eq!(l % ne, 0);
        assert!(l * m >= db_elems);

        // A floor below the square width changes nothing.
        let (square_l, square_m) = approx_square_database_dims(1 << 10, 8, 991).unwrap();
        assert_eq!(approx_database_dims(1 << 10, 8, 991, 2).unwrap(), (square_l, square_m));
    }

    #[test_case(9; "one record per cell")]
    #[test_case(3; "several records per cell")]
    #[test_case(12; "several cells per record")]
    fn encoded_records_read_back_exactly(row_length: u64) {
        const NUM: u64 = 4;

        let p = params_for(NUM, row_length);
        let vals = [1u64, 2, 3, 4];
        let db = Database::new(NUM, row_length, &p, &vals).unwrap();

        for i in 0..NUM {
            assert_eq!(db.get_elem(i).unwrap(), vals[i as usize]);
        }
    }

    #[test_case(8)]
    #[test_case(3)]
    #[test_case(17)]
    fn encoding_round_trips_at_scale(row_length: u64) {
        const NUM: u64 = 1000;

        let p = params_for(NUM, row_length);
        let mut prg = Prg::from_os_rng();

        let record_bound = if row_length >= 64 { 0 } else { 1u64 << row_length };
        let vals = (0..NUM).map(|_| prg.uniform(record_bound)).collect::<Vec<u64>>();

        let db = Database::new(NUM, row_length, &p, &vals).unwrap();

        for i in 0..NUM {
            assert_eq!(db.get_elem(i).unwrap(), vals[i as usize], "row_length = {}, i = {}", row_length, i);
        }
    }

    #[test]
    fn record_reads_are_bounds_checked() {
        let p = params_for(4, 8);
        let db = Database::new(4, 8, &p, &[1, 2, 3, 4]).unwrap();

        assert!(matches!(db.get_elem(4), Err(SimplePirError::OutOfRange { index: 4, bound: 4 })));
    }

    #[test]
    fn record_count_must_match_the_value_list() {
        let p = params_for(4, 8);
        assert!(matches!(Database::new(4, 8, &p, &[1, 2, 3]), Err(SimplePirError::ConfigurationError(_))));
    }

    #[test]
    fn empty_databases_are_rejected() {
        let p = params_for(4, 8);

        assert!(matches!(Database::setup(0, 8, &p), Err(SimplePirError::ConfigurationError(_))));
        assert!(matches!(Database::setup(4, 0, &p), Err(SimplePirError::ConfigurationError(_))));
    }

    #[test]
    fn undersized_matrix_dimensions_are_rejected() {
        let mut p = params_for(1 << 10, 8);
        p.l = 4;
        p.m = 4;

        assert!(matches!(Database::setup(1 << 10, 8, &p), Err(SimplePirError::ConfigurationError(_))));
    }

    #[test]
    fn squish_cycle_preserves_the_database() {
        let p = params_for(1000, 8);
        let mut prg = Prg::from_os_rng();

        let vals = (0..1000).map(|_| prg.uniform(1 << 8)).collect::<Vec<u64>>();
        let mut db = Database::new(1000, 8, &p, &vals).unwrap();
        let reference = db.data.clone();

        // The server-side cycle: undo centering, pack, later unpack and re-center.
        db.data.add(p.p / 2);
        db.squish().unwrap();
        assert_eq!(db.data.num_cols(), p.m.div_ceil(3));

        db.unsquish().unwrap();
        db.data.sub(p.p / 2);
        assert_eq!(db.data, reference);

        for i in 0..1000 {
            assert_eq!(db.get_elem(i).unwrap(), vals[i as usize]);
        }
    }

    #[test]
    fn squish_requires_compatible_moduli() {
        let p = params_for(1000, 8);
        let vals = vec![0u64; 1000];

        let mut db = Database::new(1000, 8, &p, &vals).unwrap();
        db.info.p = 2048;
        assert!(matches!(db.squish(), Err(SimplePirError::ConfigurationError(_))));

        let mut db = Database::new(1000, 8, &p, &vals).unwrap();
        db.info.logq = 16;
        assert!(matches!(db.squish(), Err(SimplePirError::ConfigurationError(_))));
    }
}
