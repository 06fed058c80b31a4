use crate::pir::{Bandwidth, Pir};
use crate::pir_internals::{
    branch_opt_util,
    database::{Database, DbInfo, approx_square_database_dims, reconstruct_elem},
    error::SimplePirError,
    matrix::Matrix,
    message::{CompressedState, Msg, MsgSlice, State},
    params::Params,
    prg::Prg,
};

/// The single-layer LWE scheme: the database is a roughly square matrix, the
/// client's query selects one column, and the offline hint lets the client
/// strip the LWE mask from one row of the answer.
pub struct SimplePir;

impl SimplePir {
    pub fn new() -> SimplePir {
        SimplePir
    }

    /// Stacks several equally-shaped databases into one, multiplying the
    /// record count and the matrix height by the number of inputs. Each
    /// input must exactly fill its matrix, so that record indexing into the
    /// stack stays aligned.
    pub fn concat_dbs(&self, dbs: &[Database], p: &mut Params) -> Result<Database, SimplePirError> {
        if branch_opt_util::unlikely(dbs.is_empty()) {
            return Err(SimplePirError::ConfigurationError("nothing to concatenate".to_string()));
        }

        if branch_opt_util::unlikely(dbs[0].info.num != p.l * p.m) {
            return Err(SimplePirError::ConfigurationError(format!(
                "concatenation requires each database to exactly fill its matrix ({} records vs. {}-by-{} cells)",
                dbs[0].info.num, p.l, p.m
            )));
        }

        let rows = dbs[0].data.num_rows();
        for db in dbs.iter().skip(1) {
            if branch_opt_util::unlikely(db.data.num_rows() != rows) {
                return Err(SimplePirError::DimensionMismatch {
                    lhs: (rows, dbs[0].data.num_cols()),
                    rhs: (db.data.num_rows(), db.data.num_cols()),
                });
            }
        }

        let mut data = Matrix::new(0, 0);
        for db in dbs {
            data.concat(&db.data.select_rows(0, rows)?)?;
        }

        let mut info = dbs[0].info.clone();
        info.num *= dbs.len() as u64;
        p.l *= dbs.len() as u64;

        Ok(Database { info, data })
    }
}

impl Default for SimplePir {
    fn default() -> Self {
        Self::new()
    }
}

fn shared_matrix(state: &State) -> Result<&Matrix, SimplePirError> {
    state
        .data
        .first()
        .ok_or_else(|| SimplePirError::ConfigurationError("state carries no matrix".to_string()))
}

fn msg_matrix(msg: &Msg) -> Result<&Matrix, SimplePirError> {
    msg.data
        .first()
        .ok_or_else(|| SimplePirError::ConfigurationError("message carries no matrix".to_string()))
}

impl Pir for SimplePir {
    fn name(&self) -> &'static str {
        "SimplePIR"
    }

    /// Escalates a candidate plaintext modulus from 2 upward, sizing the
    /// database for each candidate and asking the parameter table for the
    /// modulus it can actually support at that shape; the search stops at
    /// the first candidate the table undercuts, returning the previous
    /// (tight) parameter set.
    fn pick_params(&self, num: u64, row_length: u64, sec_dim: u64, logq: u64) -> Result<Params, SimplePirError> {
        let mut good: Option<Params> = None;
        let mut mod_p = 2u64;

        loop {
            let (l, m) = approx_square_database_dims(num, row_length, mod_p)?;
            let candidate = Params::pick(sec_dim, logq, l, m, m, false)?;

            if candidate.p < mod_p {
                return match good {
                    Some(params) => Ok(params),
                    None => {
                        branch_opt_util::cold();
                        Err(SimplePirError::ConfigurationError("parameter table undercut the very first candidate modulus".to_string()))
                    }
                };
            }

            good = Some(candidate);
            mod_p += 1;
        }
    }

    fn pick_params_given_dimensions(&self, l: u64, m: u64, sec_dim: u64, logq: u64) -> Result<Params, SimplePirError> {
        Params::pick(sec_dim, logq, l, m, m, false)
    }

    fn bandwidth(&self, _info: &DbInfo, p: &Params) -> Bandwidth {
        Bandwidth {
            offline_download_kb: (p.l * p.n * p.logq) as f64 / (8.0 * 1024.0),
            online_upload_kb: (p.m * p.logq) as f64 / (8.0 * 1024.0),
            online_download_kb: (p.l * p.logq) as f64 / (8.0 * 1024.0),
        }
    }

    /// The shared state is one uniformly random `m`-by-`n` matrix modulo
    /// `2^logq` -- the only public randomness in the scheme.
    fn init(&self, _info: &DbInfo, p: &Params, prg: &mut Prg) -> State {
        State::new(vec![Matrix::random(prg, p.m, p.n, p.logq, 0)])
    }

    fn init_compressed(&self, info: &DbInfo, p: &Params, prg: &mut Prg) -> (State, CompressedState) {
        let seed = prg.random_seed();
        let mut seeded = Prg::from_seed(&seed);

        (self.init(info, p, &mut seeded), CompressedState::new(seed))
    }

    fn decompress_state(&self, info: &DbInfo, p: &Params, comp: &CompressedState) -> State {
        let mut seeded = Prg::from_seed(&comp.seed);
        self.init(info, p, &mut seeded)
    }

    /// Computes the hint `H = DB * A` over the still-readable database, then
    /// undoes the cell centering and packs the database for answering.
    fn setup(&self, db: &mut Database, shared: &State, p: &Params) -> Result<(State, Msg), SimplePirError> {
        let a = shared_matrix(shared)?;
        let hint = Matrix::mul(&db.data, a)?;

        db.data.add(p.p / 2);
        db.squish()?;

        Ok((State::empty(), Msg::from_matrix(hint)))
    }

    fn fake_setup(&self, db: &mut Database, p: &Params) -> Result<(State, f64), SimplePirError> {
        let offline_download_kb = (p.l * p.n * p.logq) as f64 / (8.0 * 1024.0);

        db.data.add(p.p / 2);
        db.squish()?;

        Ok((State::empty(), offline_download_kb))
    }

    /// Encrypts a unit vector selecting column `i mod m`: a fresh LWE secret
    /// masks the query, a Gaussian error hides the selection, and the
    /// scaling factor lifts the indicator above the noise floor. The query
    /// is zero-padded up to the packed database's column alignment.
    fn query(&self, i: u64, shared: &State, p: &Params, info: &DbInfo, prg: &mut Prg) -> Result<(State, Msg), SimplePirError> {
        let a = shared_matrix(shared)?;

        let secret = Matrix::random(prg, p.n, 1, p.logq, 0);
        let err = Matrix::gaussian(prg, p.m, 1, p.sigma);

        let mut query = Matrix::mul(a, &secret)?;
        query.matrix_add(&err)?;
        query.add_at(p.delta(), i % p.m, 0)?;

        if info.squishing != 0 && p.m % info.squishing != 0 {
            query.append_zeros(info.squishing - (p.m % info.squishing))?;
        }

        Ok((State::new(vec![secret]), Msg::from_matrix(query)))
    }

    /// Partitions the packed database rows into one contiguous batch per
    /// query (the final batch absorbing any remainder) and concatenates the
    /// per-batch packed products, so a whole batch is answered in a single
    /// pass at the online-download cost of one query.
    fn answer(&self, db: &Database, queries: &MsgSlice, _server: &State, _shared: &State, _p: &Params) -> Result<Msg, SimplePirError> {
        let num_queries = queries.len() as u64;
        if branch_opt_util::unlikely(num_queries == 0) {
            return Err(SimplePirError::ConfigurationError("empty query batch".to_string()));
        }

        let mut ans = Matrix::new(0, 0);
        let mut batch_sz = db.data.num_rows() / num_queries;
        let mut last = 0u64;

        for (batch, query) in queries.data.iter().enumerate() {
            if batch as u64 == num_queries - 1 {
                batch_sz = db.data.num_rows() - last;
            }

            let block = Matrix::mul_vec_packed(&db.data.select_rows(last, batch_sz)?, msg_matrix(query)?, db.info.basis, db.info.squishing)?;
            ans.concat(&block)?;
            last += batch_sz;
        }

        Ok(Msg::from_matrix(ans))
    }

    /// Strips the deterministic bias (the centering of the database cells
    /// and the scaled indicator) via the query-sum offset, removes the LWE
    /// mask with the hint, then rounds each of the record's rows to a
    /// plaintext digit and recomposes them.
    fn recover(
        &self,
        i: u64,
        _batch_index: u64,
        offline: &Msg,
        query: &Msg,
        answer: &mut Msg,
        _shared: &State,
        client: &State,
        p: &Params,
        info: &DbInfo,
    ) -> Result<u64, SimplePirError> {
        let secret = shared_matrix(client)?;
        let hint = msg_matrix(offline)?;
        let query_vec = msg_matrix(query)?;

        let ratio = p.p / 2;
        let mut offset = 0u64;
        for j in 0..p.m {
            offset = offset.wrapping_add(ratio.wrapping_mul(query_vec.get(j, 0)?));
        }
        offset = p.mod_q(offset);
        offset = p.mod_q(offset.wrapping_neg());

        let interm = Matrix::mul(hint, secret)?;
        let ans = answer
            .data
            .first_mut()
            .ok_or_else(|| SimplePirError::ConfigurationError("message carries no matrix".to_string()))?;
        ans.matrix_sub(&interm)?;

        let row = i / p.m;
        let mut vals = Vec::with_capacity(info.ne as usize);
        for j in row * info.ne..(row + 1) * info.ne {
            let noised = p.mod_q(ans.get(j, 0)?).wrapping_add(offset);
            vals.push(p.round(noised));
        }

        // Put the answer back the way it was, it is shared across the batch.
        ans.matrix_add(&interm)?;

        Ok(reconstruct_elem(&vals, i, info))
    }

    fn reset(&self, db: &mut Database, p: &Params) -> Result<(), SimplePirError> {
        db.unsquish()?;
        db.data.sub(p.p / 2);
        Ok(())
    }
}
